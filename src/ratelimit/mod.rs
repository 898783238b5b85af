//! Rate limiting for outbound API calls.

mod bucket;

pub use bucket::{TokenBucket, DEFAULT_MAX_REQUESTS, DEFAULT_REFILL_INTERVAL};
