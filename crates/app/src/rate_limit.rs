use chrono::{DateTime, Duration, Utc};

/// Minimum spacing between successful uploads.
pub const UPLOAD_INTERVAL: Duration = Duration::minutes(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_at: DateTime<Utc> },
}

pub fn check_rate_limit(
    last_success_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval: Duration,
) -> RateDecision {
    match last_success_at {
        Some(last) if now < last + interval => RateDecision::Limited {
            retry_at: last + interval,
        },
        _ => RateDecision::Allowed,
    }
}
