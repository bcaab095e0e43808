mod aggregate;
mod classify;
mod reference;

pub use aggregate::{ScoredSample, aggregate_submission, score_records};
pub use reference::ReferenceLookup;
