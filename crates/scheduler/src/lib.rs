//! Image Viewer Scheduler Library
//!
//! Bounds how much decode work runs at once.
//!
//! Fast scrolling through a thumbnail grid can request hundreds of decodes
//! within a second. The [`ConcurrencyLimiter`] gates them so only a fixed
//! number run simultaneously; the rest wait their turn in arrival order.
//!
//! # Example
//!
//! ```
//! use imgview_scheduler::ConcurrencyLimiter;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), imgview_scheduler::LimiterError> {
//! let limiter = ConcurrencyLimiter::new(4);
//!
//! let permit = limiter.acquire().await?;
//! // ... decode while holding the permit ...
//! limiter.release(permit);
//!
//! assert_eq!(limiter.available(), 4);
//! # Ok(())
//! # }
//! ```

mod limiter;

pub use limiter::{ConcurrencyLimiter, DecodePermit, LimiterError, LimiterStats};

/// Default number of decodes allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_DECODES: usize = 4;
