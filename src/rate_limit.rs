//! Tracking of the `Retry-After` signal sent along `429 Too Many Requests` responses.
use chrono::{DateTime, Duration, Utc};

/// A "do not call before" gate.
///
/// The stored timestamp is never cleared: every check compares it against the current time, so
/// the gate opens by itself once the time has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryGate {
    retry_after: Option<DateTime<Utc>>,
}

impl RetryGate {
    /// Create an open gate.
    pub fn new() -> RetryGate {
        RetryGate::default()
    }

    /// Time before which no request should be sent, if any.
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        self.retry_after
    }

    /// Return `true` if a request at `now` would be sent too early.
    pub fn should_skip(&self, now: DateTime<Utc>) -> bool {
        self.retry_after.map_or(false, |retry_after| retry_after > now)
    }

    /// Record the value of a `Retry-After` header received at `now`.
    ///
    /// An integer is a number of seconds to wait from `now`. Anything else is parsed as an
    /// HTTP-date. A missing or unparseable header leaves the gate open rather than blocking
    /// requests indefinitely.
    pub fn record_retry_after(&mut self, header: Option<&str>, now: DateTime<Utc>) {
        self.retry_after = header.and_then(|header| parse_retry_after(header, now));
        if header.is_some() && self.retry_after.is_none() {
            log::warn!(target: "ofrep", "ignoring unparseable Retry-After header: {:?}", header);
        }
    }
}

fn parse_retry_after(header: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }

    if let Ok(seconds) = header.parse::<i64>() {
        return Duration::try_seconds(seconds).and_then(|delay| now.checked_add_signed(delay));
    }

    // HTTP-dates (e.g. "Wed, 21 Oct 2015 07:28:00 GMT") are a subset of RFC 2822 dates.
    DateTime::parse_from_rfc2822(header)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
