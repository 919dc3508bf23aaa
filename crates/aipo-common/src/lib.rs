//! Small shared building blocks used across the AIPO workspace: timestamps,
//! content hashing, and run-scoped cancellation.

pub mod cancellation;
pub mod hashing;
pub mod time;

pub use cancellation::{pair, Cancellation, CancellationHandle};
pub use hashing::{sha256_hex, sha256_hex_prefix};
pub use time::{format_iso8601, now_utc_iso8601};
