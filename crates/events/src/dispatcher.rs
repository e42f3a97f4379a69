//! Subscription registry and non-blocking event fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;
use zrep_core::metrics::Component;
use zrep_core::{validation, CoreError, MetricsSink};

use crate::delivery::WebhookDelivery;
use crate::event::{EventData, EventKind, WebhookEvent};
use crate::subscription::{SubscribeRequest, Subscription, DEFAULT_EVENTS};

/// Owns all webhook subscription state and fans out events to matching
/// subscribers.
///
/// `dispatch` spawns one delivery task per matched subscription under a
/// semaphore bound and returns immediately; the triggering path (the job
/// processor) never waits on, and never observes, delivery outcomes.
#[derive(Clone)]
pub struct WebhookDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    subscriptions: RwLock<HashMap<String, Subscription>>,
    delivery: WebhookDelivery,
    semaphore: Arc<Semaphore>,
    metrics: Arc<MetricsSink>,
}

impl WebhookDispatcher {
    pub fn new(max_concurrency: usize, metrics: Arc<MetricsSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscriptions: RwLock::new(HashMap::new()),
                delivery: WebhookDelivery::new(),
                semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
                metrics,
            }),
        }
    }

    /// Register a new subscription.
    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription, CoreError> {
        validation::validate_address(&request.owner_address)?;
        validation::validate_callback_url(&request.callback_url)?;

        let subscription = Subscription {
            id: format!("wh_{}", Uuid::new_v4().simple()),
            owner_address: request.owner_address.to_lowercase(),
            callback_url: request.callback_url,
            events: request
                .events
                .unwrap_or_else(|| DEFAULT_EVENTS.to_vec()),
            secret: request.secret,
            active: true,
            created_at: Utc::now(),
            last_triggered_at: None,
        };

        let mut subs = self.inner.subscriptions.write().await;
        subs.insert(subscription.id.clone(), subscription.clone());
        tracing::info!(
            subscription_id = %subscription.id,
            owner_address = %subscription.owner_address,
            "Webhook subscription created",
        );
        Ok(subscription)
    }

    /// List subscriptions, optionally filtered by owner address.
    pub async fn list(&self, owner_address: Option<&str>) -> Vec<Subscription> {
        let subs = self.inner.subscriptions.read().await;
        let mut out: Vec<Subscription> = subs
            .values()
            .filter(|s| match owner_address {
                Some(owner) => s.owner_address.eq_ignore_ascii_case(owner),
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Remove a subscription.
    pub async fn unsubscribe(&self, id: &str) -> Result<(), CoreError> {
        let mut subs = self.inner.subscriptions.write().await;
        subs.remove(id).ok_or(CoreError::NotFound {
            entity: "webhook subscription",
            id: id.to_string(),
        })?;
        tracing::info!(subscription_id = %id, "Webhook subscription deleted");
        Ok(())
    }

    /// Fan an event out to every matching active subscription.
    ///
    /// Returns as soon as the delivery tasks are spawned. Failures are
    /// logged and counted; they never propagate to the caller.
    pub async fn dispatch(&self, event: EventKind, data: EventData) {
        let matched: Vec<Subscription> = {
            let subs = self.inner.subscriptions.read().await;
            subs.values().filter(|s| s.wants(event)).cloned().collect()
        };

        if matched.is_empty() {
            return;
        }

        tracing::info!(
            event = %event,
            subscription_count = matched.len(),
            "Dispatching webhooks",
        );

        let envelope = WebhookEvent {
            event,
            timestamp: Utc::now(),
            data,
        };

        for subscription in matched {
            let dispatcher = self.clone();
            let envelope = envelope.clone();
            tokio::spawn(async move {
                dispatcher.deliver_one(subscription, envelope).await;
            });
        }
    }

    async fn deliver_one(&self, subscription: Subscription, envelope: WebhookEvent) {
        let Ok(_permit) = Arc::clone(&self.inner.semaphore).acquire_owned().await else {
            return;
        };

        match self.inner.delivery.send(&subscription, &envelope).await {
            Ok(()) => {
                tracing::debug!(
                    subscription_id = %subscription.id,
                    event = %envelope.event,
                    "Webhook delivered",
                );
                let mut subs = self.inner.subscriptions.write().await;
                if let Some(sub) = subs.get_mut(&subscription.id) {
                    sub.last_triggered_at = Some(Utc::now());
                }
            }
            Err(e) => {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    event = %envelope.event,
                    error = %e,
                    "Webhook delivery failed",
                );
                self.inner.metrics.record_error(Component::Webhook);
            }
        }
    }
}
