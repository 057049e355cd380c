//! dusk-state — embedded state store for dusk.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for postponement tokens and a local instance registry.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns, keyed by
//! instance id or token string. The `StateStore` is `Clone` + `Send` +
//! `Sync` (backed by `Arc<Database>`) and implements both the
//! `InstanceRepository` and `TokenStore` capabilities from `dusk-core`.
//!
//! Single-use tokens rely on redb's serialized write transactions: the
//! token is removed and returned in one transaction, so only one caller can
//! ever observe it.

pub mod error;
pub mod record;
pub mod repository;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use record::InstanceRecord;
pub use store::StateStore;
