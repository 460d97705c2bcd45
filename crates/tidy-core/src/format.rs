//! Human-readable output helpers

/// Format a duration in milliseconds
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60000;
        let secs = (ms % 60000) / 1000;
        format!("{}m{}s", mins, secs)
    }
}

/// Quote a command line for display, the way a user would type it
pub fn shell_join<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| {
            let p = p.as_ref();
            if p.is_empty() {
                "''".to_string()
            } else if p.chars().any(|c| c.is_whitespace() || "'\"$`\\".contains(c)) {
                format!("'{}'", p.replace('\'', r"'\''"))
            } else {
                p.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
