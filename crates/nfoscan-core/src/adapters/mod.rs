//! Offline collaborator implementations.
//!
//! | Adapter | Backing data |
//! |---------|--------------|
//! | [`SyntheticBroker`] | Deterministic catalog, spots and quotes derived from the universe |
//! | [`SnapshotBroker`] | JSON dump of a previous brokerage session |

mod snapshot;
mod synthetic;

pub use snapshot::{BrokerSnapshot, SnapshotBroker, SnapshotQuote};
pub use synthetic::SyntheticBroker;
