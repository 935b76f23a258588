//! Pure cell classifiers.
//!
//! Every function here takes a string slice, returns a boolean, and never
//! panics. The registry builds primitive parsers from these; the validator
//! engine exposes them to user expressions under `predicates.*`.

use std::sync::OnceLock;

use base64::Engine as _;
use regex::Regex;

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?%$").unwrap())
}

fn ratio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d+)/(\d+)$").unwrap())
}

fn http_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://[^\s/:?#]+(:\d+)?(/[^\s?#]*)?(\?[^\s#]*)?(#\S*)?$").unwrap()
    })
}

/// A single identifier segment: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A dotted identifier path. No leading, trailing, or consecutive dots.
pub fn is_name(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}

/// Decimal integer with optional sign.
pub fn is_integer_value(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// A number literal that parses and is not zero.
pub fn is_non_zero_number(s: &str) -> bool {
    matches!(s.parse::<f64>(), Ok(n) if n != 0.0 && n.is_finite())
}

/// `-?\d+(\.\d+)?%` or `-?\d+/\d+` with a non-zero denominator.
pub fn is_percent(s: &str) -> bool {
    if percent_re().is_match(s) {
        return true;
    }
    if let Some(caps) = ratio_re().captures(s) {
        return caps[2].parse::<u64>().map(|d| d != 0).unwrap_or(false);
    }
    false
}

/// `a/b` fraction with a non-zero denominator.
pub fn is_ratio(s: &str) -> bool {
    match ratio_re().captures(s) {
        Some(caps) => caps[2].parse::<u64>().map(|d| d != 0).unwrap_or(false),
        None => false,
    }
}

/// `http(s)://host[:port][/path][?query][#fragment]` with a non-empty host.
pub fn is_http_url(s: &str) -> bool {
    http_re().is_match(s)
}

/// Compiles under the `regex` crate.
pub fn is_regex(s: &str) -> bool {
    Regex::new(s).is_ok()
}

/// Windows reserved device names, forbidden as filenames even with an extension.
const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Portable file name: no path separators, no reserved device names, no
/// `<>:"|?*`, no triple dots, not blank.
pub fn is_filename(s: &str) -> bool {
    if s.trim().is_empty() || s.contains("...") {
        return false;
    }
    if s.chars().any(|c| matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*')) {
        return false;
    }
    let stem = s.split('.').next().unwrap_or("");
    let stem_upper = stem.to_ascii_uppercase();
    !RESERVED_DEVICE_NAMES.contains(&stem_upper.as_str())
}

pub fn is_valid_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

pub fn is_valid_ascii(s: &str) -> bool {
    s.is_ascii()
}

/// Even-length hexadecimal string.
pub fn is_hex_bytes(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Standard base64 with padding.
pub fn is_base64(s: &str) -> bool {
    base64::engine::general_purpose::STANDARD.decode(s).is_ok()
}

/// `X.Y.Z` semantic version.
pub fn is_version(s: &str) -> bool {
    semver::Version::parse(s).is_ok()
}

/// Version comparison operators accepted by `cmp_version`, longest first so
/// that `==` and `<=` win over their one-character prefixes.
pub const CMP_VERSION_OPS: &[&str] = &["==", "<=", ">=", "=", "<", ">", "~", "^"];

/// `(=|==|<|<=|>|>=|~|^)X.Y.Z`.
pub fn is_cmp_version(s: &str) -> bool {
    for op in CMP_VERSION_OPS {
        if let Some(rest) = s.strip_prefix(op) {
            return is_version(rest);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_accepts_underscore_start() {
        assert!(is_identifier("_foo"));
        assert!(is_identifier("a1_b2"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn name_rejects_bad_dots() {
        assert!(is_name("player.inventory.slot"));
        assert!(is_name("single"));
        assert!(!is_name(".leading"));
        assert!(!is_name("trailing."));
        assert!(!is_name("a..b"));
        assert!(!is_name(""));
    }

    #[test]
    fn integer_value() {
        assert!(is_integer_value("0"));
        assert!(is_integer_value("-42"));
        assert!(!is_integer_value("1.5"));
        assert!(!is_integer_value("-"));
        assert!(!is_integer_value("1e3"));
    }

    #[test]
    fn percent_forms() {
        assert!(is_percent("50%"));
        assert!(is_percent("-12.5%"));
        assert!(is_percent("1/2"));
        assert!(is_percent("-3/4"));
        assert!(!is_percent("1/0"));
        assert!(!is_percent("50"));
        assert!(!is_percent("%"));
    }

    #[test]
    fn http_url_needs_host() {
        assert!(is_http_url("http://example.com"));
        assert!(is_http_url("https://example.com:8080/path?q=1#frag"));
        assert!(!is_http_url("http://"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn filename_rejects_device_names() {
        assert!(is_filename("data.tsv"));
        assert!(!is_filename("CON"));
        assert!(!is_filename("con.txt"));
        assert!(!is_filename("LPT3.log"));
        assert!(!is_filename("a/b.tsv"));
        assert!(!is_filename("a...tsv"));
        assert!(!is_filename("  "));
        assert!(!is_filename("a<b"));
    }

    #[test]
    fn hex_and_base64() {
        assert!(is_hex_bytes("deadBEEF"));
        assert!(!is_hex_bytes("abc"));
        assert!(!is_hex_bytes(""));
        assert!(is_base64("aGVsbG8="));
        assert!(!is_base64("not base64!!"));
    }

    #[test]
    fn versions() {
        assert!(is_version("1.2.3"));
        assert!(!is_version("1.2"));
        assert!(is_cmp_version(">=1.0.0"));
        assert!(is_cmp_version("~2.1.0"));
        assert!(is_cmp_version("==1.0.0"));
        assert!(!is_cmp_version("1.0.0"));
        assert!(!is_cmp_version(">="));
    }

    #[test]
    fn regex_predicate() {
        assert!(is_regex(r"^\d+$"));
        assert!(!is_regex(r"("));
    }
}
