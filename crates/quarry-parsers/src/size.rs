//! PBS size-string parsing.

/// Parse a PBS size string to bytes.
///
/// PBS writes sizes as an integer with an optional binary suffix:
/// "256mb", "4gb", "1024kb", "8192b". A bare integer is bytes.
///
/// Returns None for empty strings, placeholder values, word-counted sizes
/// ("8w") and anything else outside the byte grammar.
pub fn parse_size_bytes(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }

    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    let multiplier = match s[digits.len()..].to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        "tb" => 1024u64.pow(4),
        "pb" => 1024u64.pow(5),
        _ => return None,
    };

    value.checked_mul(multiplier)
}

/// Render bytes as the largest PBS size unit that divides them exactly,
/// suitable for `-l mem=` requests.
pub fn format_size_bytes(bytes: u64) -> String {
    const UNITS: &[(u64, &str)] = &[
        (1024u64.pow(5), "pb"),
        (1024u64.pow(4), "tb"),
        (1024 * 1024 * 1024, "gb"),
        (1024 * 1024, "mb"),
        (1024, "kb"),
    ];

    for (scale, suffix) in UNITS {
        if bytes > 0 && bytes % scale == 0 {
            return format!("{}{}", bytes / scale, suffix);
        }
    }
    format!("{bytes}b")
}
