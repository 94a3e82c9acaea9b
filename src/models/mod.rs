//! Model artifact store
//!
//! - `metadata`: published version record and its merge rules
//! - `lock`: publish lock (create-exclusive file, bounded retry)
//! - `store`: atomic publish and verified load
//! - `handle`: the live model reference and reload
//! - `registry`: discovery/selection across version labels

pub mod handle;
pub mod lock;
pub mod metadata;
pub mod registry;
pub mod store;

pub use handle::{ModelHandle, ModelSnapshot, ReloadOutcome};
pub use lock::{LockPolicy, PublishLock};
pub use metadata::{merge_metadata, MetadataFragment, Metrics, ModelMetadata};
pub use registry::{ModelListing, ModelRegistry};
pub use store::{ModelStore, TrainedArtifact};
