//! pairbridge: a Telegram webhook bot that relays messages between chats.
//!
//! Two relay modes share one webhook receiver:
//! - `pair`: chats link themselves one-to-one with `/link <id>` and every
//!   private message is copied to the partner
//! - `forward`: every message (optionally from one source chat) is copied
//!   into a fixed target chat

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod messenger;
pub mod observability;
pub mod pairing;
pub mod relay;
pub mod server;
pub mod telegram;

pub use config::Config;
pub use error::{ConfigError, DeliveryError, PairingStoreError, ServerError};
