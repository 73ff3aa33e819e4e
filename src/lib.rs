// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod model;
pub mod observe;
pub mod pipeline;
pub mod repository;
pub mod store;
pub mod transform;
pub mod validator;

// Provider strategies + routing
pub mod normalize;

// ---- Re-exports for stable public API ----
pub use crate::error::{Error, Result};
pub use crate::model::{
    DataPoint, DateIndexedSnapshot, Field, MultiProviderSeries, Provider, Response,
    ResponseMeta, Series,
};
pub use crate::observe::{Observer, ObserverHandle, RecordingObserver, TracingObserver};
pub use crate::repository::Repository;
pub use crate::store::ResponseStore;
pub use crate::transform::Transformer;
pub use crate::validator::Validator;
