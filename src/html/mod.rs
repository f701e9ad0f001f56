//! HTML instrumentation pass
//!
//! Link extraction and tracking injection share one anchor traversal over
//! the same parsed document model, so the N-th extracted link is always the
//! N-th rewritten anchor.

mod rewrite;

pub use rewrite::{TrackedLink, extract_links, inject_tracking};
