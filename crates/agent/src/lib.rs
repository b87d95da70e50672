//! The Reasonloop refinement engine.
//!
//! A session runs four role agents against one text-generation backend:
//!
//! 1. **Analyze** the question once into a problem statement and area
//! 2. **Hypothesize** an approach, informed by every rejected attempt so far
//! 3. **Solve**: turn the hypothesis into ordered steps
//! 4. **Validate**: score the solution; accept at or above the threshold
//!
//! Steps 2-4 repeat until acceptance or until the round budget is spent, in
//! which case the last solution is returned.

pub mod dialogue;
pub mod engine;
pub mod progress;
pub mod records;
pub mod roles;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dialogue::{format_dialogue, format_solution, split_for_delivery};
pub use engine::{
    EngineSettings, ReasoningEngine, ReasoningFailure, ReasoningOutcome, SessionStatus,
};
pub use progress::{FnSink, NoopSink, ProgressEvent, ProgressSink, RecordingSink, SinkError};
pub use records::{
    AttemptRecord, DialogueEntry, Hypothesis, ProblemAnalysis, Solution, ValidationResult,
};
