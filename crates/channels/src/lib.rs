//! Chat channel implementations for Reasonloop.
//!
//! Channels connect the engine to wherever questions come from. The engine
//! itself only sees a progress sink; [`ChannelSink`] bridges the two.
//!
//! Available channels:
//! - **CLI**: interactive terminal chat (stdin/stdout)

pub mod cli;
pub mod sink;

pub use cli::CliChannel;
pub use sink::ChannelSink;
