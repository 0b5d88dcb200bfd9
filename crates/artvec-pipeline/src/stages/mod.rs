//! The three pipeline stages. Each one runs as its own task and talks to its
//! neighbours only through the bounded queues and the shared signals.

pub mod embed;
pub mod fetch;
pub mod persist;

pub use embed::{run_embed, EmbedParams};
pub use fetch::{run_fetch, FetchCounts};
pub use persist::run_persist;
