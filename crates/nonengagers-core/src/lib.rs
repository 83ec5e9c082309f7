//! Engagement computation shared across nonengagers crates.
//!
//! Provides the validated user identity type, the pure non-engager set
//! difference, and the fetch-source trait that transports implement to feed it.

pub mod engagement_analyzer;
pub mod engagement_source;
pub mod errors;
pub mod identity;

pub use engagement_analyzer::{compute_non_engagers, EngagementReport};
pub use engagement_source::{analyze_message, EngagementSource, MessageRef, ThreadReplies};
pub use errors::{AnalyzeError, ApiError, InvalidInputError};
pub use identity::UserId;
