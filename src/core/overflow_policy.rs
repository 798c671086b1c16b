//! Overflow policies for the dispatch queue
//!
//! When a domain's queue is full, the policy decides what happens to the new
//! record. Every drop is counted; producers are never blocked indefinitely.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling queue overflow in async mode
///
/// # Example
///
/// ```
/// use domain_logger::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: drop the new record and count it
/// let policy = OverflowPolicy::default();
///
/// // Wait up to 100ms for space, then drop and count
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the new record and increment the overflow counter
    #[default]
    DropNewest,

    /// Wait for space up to the given duration, then drop and count
    BlockWithTimeout(Duration),
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when records are dropped due to queue overflow.
/// The parameter is the total count of dropped records so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
