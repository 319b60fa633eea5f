//! Reasoning-text client.
//!
//! Each stage's query is wrapped in an instruction prompt ([`build_prompt`]),
//! sent to the generative-text service under the reasoning retry budget, and
//! the response is mined for tags ([`extract_metadata`]). When no key is
//! configured or every attempt fails, the fallback synthesizer provides the
//! text instead, so a narration always yields something usable.

mod client;
mod metadata;
mod prompt;

pub use client::{ReasoningClient, ReasoningOutcome, ReasoningSource};
pub use metadata::{extract_metadata, ReasoningMetadata, NO_SELF_CHECK};
pub use prompt::build_prompt;
