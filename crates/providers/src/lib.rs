//! Text-generation backends for Reasonloop.
//!
//! All providers implement the `reasonloop_core::Provider` trait. The
//! capability client layers rate-limit fallback and JSON decoding on top.

pub mod capability;
pub mod openai_compat;
pub mod router;

pub use capability::{Backend, CapabilityClient, RetryPolicy};
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
