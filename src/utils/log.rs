// src/utils/log.rs

//! Structured console helpers on top of the `log` facade.
//!
//! Headers, steps and summaries give run output a consistent shape; the
//! backend (env_logger in the CLI) decides where it goes.

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Render a summary block as lines.
pub fn summary_lines(title: &str, items: &[(&str, String)]) -> Vec<String> {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(format!("[SUMMARY] {}", title));
    for (key, value) in items {
        lines.push(format!("    {}: {}", key, value));
    }
    lines
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    for line in summary_lines(title, items) {
        log::info!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines_layout() {
        let lines = summary_lines("Run", &[("new", "2".to_string()), ("errors", "0".into())]);
        assert_eq!(
            lines,
            vec!["[SUMMARY] Run", "    new: 2", "    errors: 0"]
        );
    }
}
