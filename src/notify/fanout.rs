// src/notify/fanout.rs

//! Detailed-vs-summary message planning.

use crate::notify::format;
use crate::pipeline::RunReport;

/// Messages for one category: one per item up to `threshold`, otherwise a
/// single numbered summary of all items.
fn plan_category<T>(
    items: &[T],
    threshold: usize,
    detail: fn(&T) -> String,
    summary: fn(&[T]) -> String,
) -> Vec<String> {
    match items.len() {
        0 => Vec::new(),
        n if n <= threshold => items.iter().map(detail).collect(),
        _ => vec![summary(items)],
    }
}

/// Plan the bot messages for a run: new hearings, then changes, then rulings.
pub fn plan_messages(report: &RunReport, threshold: usize) -> Vec<String> {
    let mut messages = plan_category(
        &report.new_hearings,
        threshold,
        format::new_hearing,
        format::new_hearings_summary,
    );
    messages.extend(plan_category(
        &report.changes,
        threshold,
        format::change,
        format::changes_summary,
    ));
    messages.extend(plan_category(
        &report.new_rulings,
        threshold,
        format::new_ruling,
        format::new_rulings_summary,
    ));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> Vec<usize> {
        (1..=n).collect()
    }

    fn plan(n: usize) -> Vec<String> {
        plan_category(
            &numbers(n),
            3,
            |i| format!("item {i}"),
            |all| format!("{} items", all.len()),
        )
    }

    #[test]
    fn test_at_threshold_sends_details() {
        assert_eq!(plan(3), vec!["item 1", "item 2", "item 3"]);
    }

    #[test]
    fn test_above_threshold_sends_one_summary() {
        assert_eq!(plan(5), vec!["5 items"]);
    }

    #[test]
    fn test_empty_category_sends_nothing() {
        assert!(plan(0).is_empty());
    }
}
