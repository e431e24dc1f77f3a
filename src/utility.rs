//! Helpers for the `KEY=VALUE` configuration format.

use core::time::Duration;

/// Find the value of `key` in a block of `KEY=VALUE` lines.
///
/// Leading and trailing whitespace is ignored, as are blank lines and lines
/// starting with `#`. The last occurrence of a key wins.
///
/// # Returns
/// * `Option<&str>` - trimmed value, or `None` if the key is absent
pub fn find_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
        .last()
}

/// Parse a boolean value: `true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a whole number of milliseconds.
pub fn parse_millis(value: &str) -> Option<Duration> {
    value.parse::<u64>().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = r#"
# serial settings
X10_PORT = /dev/ttyUSB0
X10_BAUD=4800
X10_BAUD=9600
EMPTY=
"#;

    #[test]
    fn test_find_value() {
        assert_eq!(find_value(TEXT, "X10_PORT"), Some("/dev/ttyUSB0"));
        assert_eq!(find_value(TEXT, "X10_BAUD"), Some("9600"));
        assert_eq!(find_value(TEXT, "EMPTY"), Some(""));
        assert_eq!(find_value(TEXT, "MISSING"), None);
        assert_eq!(find_value(TEXT, "# serial settings"), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_millis("250"), Some(Duration::from_millis(250)));
        assert_eq!(parse_millis("-1"), None);
    }
}
