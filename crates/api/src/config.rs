/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `4100`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Postgres connection URL. When absent, the volatile in-memory
    /// backend is used and all state is lost on restart.
    pub database_url: Option<String>,
    /// Base URL of the prover service.
    pub prover_url: String,
    /// Upper bound on a single prover call in seconds.
    pub prover_timeout_secs: u64,
    /// Processor polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum pending jobs picked up per processor tick.
    pub poll_batch_size: i64,
    /// Jobs untouched for this many hours are purged by the retention task.
    pub job_retention_hours: i64,
    /// Maximum concurrent webhook deliveries.
    pub webhook_max_concurrency: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `4100`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `DATABASE_URL`            | (unset: in-memory backend) |
    /// | `PROVER_URL`              | `http://localhost:4101`    |
    /// | `PROVER_TIMEOUT_SECS`     | `60`                       |
    /// | `POLL_INTERVAL_MS`        | `5000`                     |
    /// | `POLL_BATCH_SIZE`         | `10`                       |
    /// | `JOB_RETENTION_HOURS`     | `24`                       |
    /// | `WEBHOOK_MAX_CONCURRENCY` | `8`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "4100".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL").ok();

        let prover_url =
            std::env::var("PROVER_URL").unwrap_or_else(|_| "http://localhost:4101".into());

        let prover_timeout_secs: u64 = std::env::var("PROVER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("PROVER_TIMEOUT_SECS must be a valid u64");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let poll_batch_size: i64 = std::env::var("POLL_BATCH_SIZE")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("POLL_BATCH_SIZE must be a valid i64");

        let job_retention_hours: i64 = std::env::var("JOB_RETENTION_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .expect("JOB_RETENTION_HOURS must be a valid i64");

        let webhook_max_concurrency: usize = std::env::var("WEBHOOK_MAX_CONCURRENCY")
            .unwrap_or_else(|_| "8".into())
            .parse()
            .expect("WEBHOOK_MAX_CONCURRENCY must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            prover_url,
            prover_timeout_secs,
            poll_interval_ms,
            poll_batch_size,
            job_retention_hours,
            webhook_max_concurrency,
        }
    }
}
