//! Bulk image embedding pipeline: Fetch → Embed → Persist.
//!
//! Stages run as tokio tasks connected by two bounded queues. The raw queue
//! (`flume`, multi-consumer) carries decoded images one by one; the result
//! queue (`tokio::sync::mpsc`) carries embedded batches. Queues close when
//! their producers finish, which is how end of stream travels downstream. An
//! unrecoverable error cancels the run's token, stops every stage and is
//! returned from [`Pipeline::run`].

pub mod download;
pub mod pipeline;
pub mod signal;
pub mod stages;

pub use download::HttpDownloader;
pub use pipeline::{Pipeline, PipelineState, RunRequest};
pub use signal::{Latch, Shutdown, Signals};
