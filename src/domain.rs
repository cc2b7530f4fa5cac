//! Domain layer: entities and pure business logic for the ingestion pipeline
//!
//! Everything in this layer is free of I/O so it can be tested in isolation.
//! Network and storage concerns live in `infrastructure`.

pub mod category;
pub mod gpu_spec;
pub mod normalize;
pub mod offer;
pub mod queue;

pub use category::{Category, CategorySlug};
pub use gpu_spec::GpuSpecPayload;
pub use normalize::normalize_offer;
pub use offer::{ExtractionSource, NormalizedOffer, OfferMeta, RawOffer, SyncReport, SyncSummary};
pub use queue::{QueueStatus, SpecQueueRow};
