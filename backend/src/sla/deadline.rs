// Dual-path deadline resolution
//
// A document's deadline is either stored explicitly or derived from a
// reference timestamp plus the policy budget. Each path becomes a time window
// over the column that actually exists, answered with a plain range predicate.

use chrono::{DateTime, Utc};
use sentinel_shared::DocumentKind;

use super::policy::{warning_lookahead, BreachFlag, SlaMode, SlaPolicy};

/// Range predicate over a timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// `column < end`
    Before(DateTime<Utc>),
    /// `start <= column <= end`
    Between(DateTime<Utc>, DateTime<Utc>),
}

impl Window {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match *self {
            Window::Before(end) => at < end,
            Window::Between(start, end) => start <= at && at <= end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlinePath {
    /// Window applies to the explicit deadline field, which must be set.
    Explicit,
    /// Window applies to the reference field; the explicit field, if the
    /// policy has one, must be empty.
    Computed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DueFilter {
    pub kind: DocumentKind,
    pub path: DeadlinePath,
    pub window: Window,
    pub statuses: &'static [&'static str],
    /// Skip rows whose breach flag is already written.
    pub exclude_flagged: Option<BreachFlag>,
}

/// Builds the one or two queries whose union is the set of documents due
/// under `mode` at `now`.
pub fn due_filters(policy: &SlaPolicy, mode: SlaMode, now: DateTime<Utc>) -> Vec<DueFilter> {
    let exclude_flagged = match mode {
        SlaMode::Breach => policy.breach_flag,
        SlaMode::Warning => None,
    };

    let (explicit_window, computed_window) = match mode {
        SlaMode::Breach => (
            Window::Before(now),
            Window::Before(now - policy.duration),
        ),
        SlaMode::Warning => {
            let lookahead_end = now + warning_lookahead();
            (
                Window::Between(now, lookahead_end),
                Window::Between(now - policy.duration, lookahead_end - policy.duration),
            )
        }
    };

    let mut filters = Vec::with_capacity(2);
    if policy.explicit_deadline_field.is_some() {
        filters.push(DueFilter {
            kind: policy.kind,
            path: DeadlinePath::Explicit,
            window: explicit_window,
            statuses: policy.qualifying_statuses,
            exclude_flagged,
        });
    }
    filters.push(DueFilter {
        kind: policy.kind,
        path: DeadlinePath::Computed,
        window: computed_window,
        statuses: policy.qualifying_statuses,
        exclude_flagged,
    });
    filters
}
