//! Transform stage: cleaning, hashtag and mention extraction, lexicon
//! sentiment, engagement bucketing and validation.
//!
//! Everything here is pure. [`Transformer::transform`] never fails; records
//! that should not be stored are filtered by [`Transformer::accept`].

pub mod clean;
pub mod engagement;
pub mod sentiment;
mod transformer;
pub mod validate;

pub use engagement::engagement_level;
pub use sentiment::Lexicon;
pub use transformer::{TransformStats, Transformer};
pub use validate::{validate, Rejection};
