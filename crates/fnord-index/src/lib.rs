pub mod background;
pub mod capability;
pub mod entry;
pub mod pipeline;
pub mod search;
pub mod store;

pub use background::BackgroundIndexer;
pub use capability::IndexerCapability;
pub use entry::IndexEntry;
pub use pipeline::{index_entry, next_stale_entry};
pub use search::{search, SearchResult};
pub use store::ProjectIndex;
