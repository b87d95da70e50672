//! Role agents.
//!
//! Each role turns typed context into one typed record with a single
//! capability call: a role preamble as the system message, the context as the
//! user message, and a JSON object back. None of them retry on a malformed
//! reply; the decode failure goes straight to the engine.

pub mod analyzer;
pub mod hypothesis;
pub mod solution;
pub mod validator;

pub use analyzer::Analyzer;
pub use hypothesis::HypothesisBuilder;
pub use solution::SolutionBuilder;
pub use validator::Validator;

use crate::records::ProblemAnalysis;

/// Dialogue speaker names.
pub const ANALYST: &str = "Analyst";
pub const HYPOTHESIS_GENERATOR: &str = "Hypothesis generator";
pub const SOLVER: &str = "Solver";
pub const VALIDATOR: &str = "Validator";

/// Header shared by every context message after analysis.
fn problem_context(analysis: &ProblemAnalysis) -> String {
    format!(
        "Problem: {}\nArea: {}",
        analysis.problem_statement, analysis.problem_area
    )
}
