use std::sync::LazyLock;

use email_address::EmailAddress;
use regex::Regex;
use url::Url;

static FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));
static DISPLAY_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _-]+$").expect("valid regex"));
static SLUG_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Returns `true` if `value` can be used as a top-level document field name.
pub fn is_valid_field_name(value: &str) -> bool {
    FIELD_NAME.is_match(value)
}

/// Returns `true` if `value` only uses letters, digits, spaces, `_` and `-`.
pub fn is_valid_display_name(value: &str) -> bool {
    DISPLAY_NAME.is_match(value)
}

/// Lowercase, dash-separated slug for category urls.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    SLUG_SEPARATORS.replace_all(&lowered, "-").trim_matches('-').to_string()
}
