//! URI deduplication
//!
//! Every discovered URI passes through `UriUniqFilter` on its way to the frontier.

mod uniq;

pub use uniq::{FilterStats, UriReceiver, UriUniqFilter};
