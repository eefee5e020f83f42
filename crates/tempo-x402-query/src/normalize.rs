//! Forces a JSON output encoding on inbound SQL.
//!
//! Textual only: a literal `format json` inside a string literal or a
//! comment counts as the directive being present.

/// Output directive appended to queries that don't name one.
pub const JSON_DIRECTIVE: &str = "FORMAT JSON";

/// True if `query` mentions the JSON output directive anywhere (ASCII case-insensitive).
///
/// `FORMAT` and `JSON` may be separated by any run of whitespace, as the
/// database accepts.
pub fn has_json_directive(query: &str) -> bool {
    let upper = query.to_ascii_uppercase();
    let words: Vec<&str> = upper.split_whitespace().collect();
    words
        .windows(2)
        .any(|pair| pair[0].ends_with("FORMAT") && pair[1].starts_with("JSON"))
}

/// Append ` FORMAT JSON` unless the caller already asked for it.
///
/// One trailing `;` is dropped before appending. `normalize(normalize(q)) == normalize(q)`.
pub fn normalize(query: &str) -> String {
    if has_json_directive(query) {
        return query.to_string();
    }

    let trimmed = query.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    format!("{body} {JSON_DIRECTIVE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_directive() {
        assert_eq!(normalize("SELECT 1"), "SELECT 1 FORMAT JSON");
    }

    #[test]
    fn test_trims_and_strips_one_terminator() {
        assert_eq!(normalize("  SELECT 1;  \n"), "SELECT 1 FORMAT JSON");
        assert_eq!(normalize("SELECT 1 ;"), "SELECT 1 FORMAT JSON");
        // only a single terminator is removed
        assert_eq!(normalize("SELECT 1;;"), "SELECT 1; FORMAT JSON");
    }

    #[test]
    fn test_existing_directive_is_untouched() {
        let q = "select * from trades format json";
        assert_eq!(normalize(q), q);
        let q = "SELECT 1 FORMAT JSONEachRow";
        assert_eq!(normalize(q), q);
    }

    #[test]
    fn test_directive_with_other_whitespace() {
        for q in [
            "SELECT 1 FORMAT  JSON",
            "SELECT 1 FORMAT\tJSON",
            "SELECT 1\nFORMAT\nJSON",
            "SELECT 1 format \r\n json;",
        ] {
            assert!(has_json_directive(q), "{q:?}");
            assert_eq!(normalize(q), q);
        }
    }

    #[test]
    fn test_format_without_json_still_appends() {
        assert!(!has_json_directive("SELECT format FROM t"));
        assert!(!has_json_directive("SELECT 1 FORMAT CSV"));
        assert!(!has_json_directive("SELECT 'JSON' AS format"));
    }

    #[test]
    fn test_directive_anywhere_counts() {
        let q = "SELECT 'FORMAT JSON' AS label";
        assert_eq!(normalize(q), q);
    }

    #[test]
    fn test_idempotent() {
        for q in [
            "SELECT 1",
            "SELECT 1;",
            "  select count() from events  ",
            "SELECT 1 Format Json",
            "SELECT 1 FORMAT  JSON",
            "SELECT 1 FORMAT\tJSON",
            "SELECT 1\nFORMAT\nJSON;",
            "",
        ] {
            let once = normalize(q);
            assert_eq!(normalize(&once), once, "not idempotent for {q:?}");
        }
    }

    #[test]
    fn test_directive_appended_exactly_once() {
        let out = normalize("SELECT number FROM system.numbers LIMIT 3");
        assert_eq!(out.matches(JSON_DIRECTIVE).count(), 1);
    }
}
