//! Chat pairing: the persisted pair map and the commands that edit it.
//!
//! A chat links itself to exactly one partner with `/link <id>`; from then
//! on the relay copies its private messages to that partner and back.

mod protocol;
mod store;

pub use protocol::{LinkError, PairingCommand, PairingProtocol, parse_link_target};
pub use store::{Linked, PairingStore};
