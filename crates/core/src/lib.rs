//! # Reasonloop Core
//!
//! Domain types, traits, and error definitions shared by every Reasonloop
//! crate. Backends, channels and the reasoning engine are defined against
//! the traits here, so each can be swapped for a scripted stand-in in tests.

pub mod channel;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use error::{ChannelError, DecodeError, Error, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, Usage};
