pub mod contract;
pub mod feed;
pub mod snapshot;

pub use feed::{FeedKind, GainerFeed, GainerItem, ThemeFeed};
pub use snapshot::{ResolvedSnapshot, SnapshotDate};
