//! Turning window decisions into caller-facing results

use super::types::RateLimitResult;
use crate::core::window::{WindowDecision, WindowUsage};
use crate::utils::time::millis_to_datetime;
use std::time::Duration;

/// Build the result for one evaluation.
///
/// `consumed` is true when the admitted request was recorded, in which case
/// it counts against `remaining`.
pub(super) fn summarize(
    decision: &WindowDecision,
    now_millis: u64,
    consumed: bool,
) -> RateLimitResult {
    match decision {
        WindowDecision::Admitted { usage } => admitted(usage, now_millis, consumed),
        WindowDecision::Denied { usage } => denied(usage, now_millis),
    }
}

fn admitted(usage: &[WindowUsage], now_millis: u64, consumed: bool) -> RateLimitResult {
    let taken = u64::from(consumed);

    let remaining = usage
        .iter()
        .map(|u| u.limit.saturating_sub(u.count).saturating_sub(taken))
        .min()
        .unwrap_or(u64::MAX);

    let reset_millis = usage
        .iter()
        .map(|u| u.oldest_millis.unwrap_or(now_millis) + u.kind.duration_millis())
        .min()
        .unwrap_or(now_millis);

    RateLimitResult {
        allowed: true,
        remaining,
        reset_time: millis_to_datetime(reset_millis),
        retry_after: None,
        limited_by: None,
    }
}

fn denied(usage: &WindowUsage, now_millis: u64) -> RateLimitResult {
    let wait_millis = match usage.oldest_millis {
        Some(oldest) => (oldest + usage.kind.duration_millis()).saturating_sub(now_millis),
        None => usage.kind.duration_millis(),
    };

    RateLimitResult {
        allowed: false,
        remaining: 0,
        reset_time: millis_to_datetime(now_millis + wait_millis),
        retry_after: Some(Duration::from_millis(wait_millis)),
        limited_by: Some(usage.kind),
    }
}
