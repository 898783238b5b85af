//! Misskey Poster - Rate-Limited Note Submission
//!
//! This crate posts notes to a Misskey instance while respecting the
//! instance's API quota. Outbound calls are throttled by a shared token
//! bucket, and every wait and request can be cancelled by the caller.

pub mod config;
pub mod context;
pub mod error;
pub mod misskey;
pub mod ratelimit;
