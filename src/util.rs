//! Small formatting helpers shared by the runner and the renderers.

/// Truncate to at most `max` characters, appending an ellipsis when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{cut}...")
}

/// Compact token counts: `950`, `12.3k`, `2.0M`.
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Render whole seconds as `45s`, `1m23s`, `2h05m`.
pub fn format_duration_secs(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Render a millisecond duration: `850ms` below a second, seconds above.
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("héllø wörld", 5), "héllø...");
    }

    #[test]
    fn token_formatting() {
        assert_eq!(format_tokens(950), "950");
        assert_eq!(format_tokens(12_300), "12.3k");
        assert_eq!(format_tokens(2_000_000), "2.0M");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration_secs(45), "45s");
        assert_eq!(format_duration_secs(83), "1m23s");
        assert_eq!(format_duration_secs(7500), "2h05m");
        assert_eq!(format_duration_ms(850), "850ms");
        assert_eq!(format_duration_ms(2500), "2.5s");
    }
}
