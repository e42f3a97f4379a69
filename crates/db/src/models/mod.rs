//! Storage entity structs and DTOs.
//!
//! Each submodule contains:
//! - A `Serialize` entity struct shared by both storage backends
//! - A `Deserialize` create DTO for inserts
//! - An update DTO (all `Option` fields) for partial merges

pub mod job;
pub mod tier;
