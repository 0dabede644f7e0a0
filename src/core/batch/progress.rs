//! Throughput and ETA estimation
//!
//! Pure functions over the recorded completion timestamps and the
//! aggregate counters; recomputed for every snapshot. Skipped items
//! count as completed but record no timestamp, so they never distort
//! the observed throughput.

use chrono::{DateTime, Utc};

/// Observed average seconds per completed video
///
/// With two or more completions this is the span between the first and
/// last completion divided by the intervals between them; with exactly
/// one it is the time from batch start to that completion. Clock skew
/// can make either span negative, in which case it clamps to zero.
pub fn avg_secs_per_video(
    completions: &[DateTime<Utc>],
    batch_start: DateTime<Utc>,
) -> Option<f64> {
    match completions {
        [] => None,
        [only] => {
            let secs = only.signed_duration_since(batch_start).num_milliseconds() as f64 / 1000.0;
            Some(secs.max(0.0))
        }
        [first, .., last] => {
            let span = last.signed_duration_since(*first).num_milliseconds() as f64 / 1000.0;
            let intervals = (completions.len() - 1) as f64;
            Some((span / intervals).max(0.0))
        }
    }
}

/// Estimated seconds until the batch drains
///
/// Remaining items are assumed to spread evenly over the active
/// workers. `None` when nothing remains or no completion has been
/// observed yet.
pub fn eta_secs(
    total: usize,
    completed: usize,
    errors: usize,
    active_workers: usize,
    avg_secs: Option<f64>,
) -> Option<u64> {
    let remaining = total.saturating_sub(completed + errors);
    if remaining == 0 {
        return None;
    }

    let avg = avg_secs?;
    let workers = active_workers.max(1) as f64;
    Some((remaining as f64 / workers * avg).round() as u64)
}
