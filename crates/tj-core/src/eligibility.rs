//! Tag-based eligibility for (re)processing an entry.

use crate::entry::TimeEntry;

/// Why an entry will or will not be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// Carries the skip tag. Checked first, so it wins over every other tag.
    Skipped,
    /// Carries the success tag from an earlier run.
    AlreadyLogged,
}

/// Classifies an entry from its status tags.
///
/// A failed tag never blocks processing; failed entries are retried on every
/// run until they succeed or are explicitly skipped.
pub fn eligibility(entry: &TimeEntry, success_tag: &str, skip_tag: &str) -> Eligibility {
    if entry.tags.contains(skip_tag) {
        Eligibility::Skipped
    } else if entry.tags.contains(success_tag) {
        Eligibility::AlreadyLogged
    } else {
        Eligibility::Eligible
    }
}

pub fn is_eligible(entry: &TimeEntry, success_tag: &str, skip_tag: &str) -> bool {
    eligibility(entry, success_tag, skip_tag) == Eligibility::Eligible
}
