//! The Store and Observer collaborator interfaces, plus
//! dependency-free in-memory implementations sufficient to run the
//! `policyd` binary standalone and to exercise it in tests. The real HTTP
//! CRUD surface, realtime push channel, and persistent backend are
//! out-of-scope external collaborators that would implement these same
//! traits.

mod memory;
mod observer;
mod store;

pub use memory::MemoryStore;
pub use observer::{ChannelObserver, DecisionEvent, NullObserver, Observer, UPDATES_CHANNEL};
pub use store::Store;
