//! Storage for the art inventory and its image embeddings.
//!
//! [`LanceStore`] is the persistent backend; [`MemoryStore`] implements the
//! same traits in memory for tests and dry runs.

pub mod lance;
pub mod memory;
pub mod schema;
pub mod search;
pub mod table;

pub use lance::LanceStore;
pub use memory::MemoryStore;
