//! Domain types for the explanation pipeline.

pub mod analysis;
pub mod error;
pub mod excerpt;
pub mod payload;

pub use analysis::{
    AnalysisResult, Explanation, FixSuggestion, RateLimitInfo, RateLimitUsage, StructuredFix,
};
pub use error::{ExplainError, Result};
pub use excerpt::{JobConclusion, LogExcerpt};
pub use payload::AnalysisPayload;
