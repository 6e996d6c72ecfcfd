//! Calendar math for deadline reminders.
//!
//! Day counts are normalised to midnight on both sides, so "due in 2 days" means the same thing
//! at 00:01 and at 23:59, and a reminder threshold matches exactly once per deliverable.

use chrono::{DateTime, NaiveDate, Utc};

/// Whole calendar days from `today` until `due`. Negative when the due date has passed.
pub fn days_until(today: NaiveDate, due: DateTime<Utc>) -> i64 {
    (due.date_naive() - today).num_days()
}

/// The dedupe key for a deadline-reminder notification. One key per
/// (deal, deliverable kind, due date) triple, so a threshold crossing is reported at most once
/// no matter how often the scan runs.
pub fn deadline_dedupe_key(deal_id: i64, kind: &str, due: DateTime<Utc>) -> String {
    format!("deadline-{deal_id}-{kind}-{}", due.date_naive())
}
