mod matcher;
mod source;
mod store;
mod sync;
mod traits;

pub use matcher::{normalize, EffectiveBlockList};
pub use source::HttpListSource;
pub use store::{BlocklistStore, RawLists};
pub use sync::{now_millis, RemoteSync, SyncOutcome};
pub use traits::{ChannelMatcher, FetchError, ListSource};
