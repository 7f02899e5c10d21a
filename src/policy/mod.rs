//! Per-URI scheduling policies
//!
//! Both evaluators are synchronous and run inline on the dispatch and completion
//! paths of the frontier.

mod quota;
mod wait;

pub use quota::{quota_annotation, QuotaCategory, QuotaEnforcer, QuotaMetric};
pub use wait::{WaitEvaluator, WaitPolicy};
