//! The fixed-window rate limiter: a `RateLimiterSet` of
//! `{key, value, condition}`-matched limiters, each tracking per-observed-
//! value hit counters in a `DashMap`.

mod limiter;

pub use limiter::{CheckResult, RateLimiterSet, ThrottleError};
