//! Line-oriented parser for IP-range CSV dumps.
//!
//! Each data line carries `start,end,country_code,country_name,region,city`.
//! Fields may be quoted; a quoted field can contain commas and `""` escapes.

/// Minimum number of fields a data line must carry.
pub const MIN_FIELDS: usize = 6;

const FIELD_START: usize = 0;
const FIELD_END: usize = 1;
const FIELD_COUNTRY: usize = 2;
const FIELD_REGION: usize = 4;
const FIELD_CITY: usize = 5;

/// Split one CSV line into fields, resolving quotes.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);

    fields
}

/// Normalize a raw field into an optional attribute value.
///
/// Whitespace and one layer of literal wrapping quotes are stripped; empty
/// strings and `-` are the null sentinel.
pub fn normalize_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();

    if unquoted.is_empty() || unquoted == "-" {
        None
    } else {
        Some(unquoted.to_string())
    }
}

/// A data line split into the columns the converter consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub start: String,
    pub end: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// What a single input line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Blank line or `#` comment.
    Skip,
    /// First line without enough fields, taken as a header.
    Header,
    /// Too few fields.
    Malformed,
    /// A usable data line.
    Data(RawRecord),
}

/// Classify a line. `index` is zero-based; only index 0 may be a header.
pub fn classify_line(index: usize, line: &str) -> Line {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return Line::Skip;
    }

    let fields = parse_line(line);
    if fields.len() < MIN_FIELDS {
        return if index == 0 {
            Line::Header
        } else {
            Line::Malformed
        };
    }

    Line::Data(RawRecord {
        start: unquote(&fields[FIELD_START]),
        end: unquote(&fields[FIELD_END]),
        country: normalize_field(&fields[FIELD_COUNTRY]),
        region: normalize_field(&fields[FIELD_REGION]),
        city: normalize_field(&fields[FIELD_CITY]),
    })
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line() {
        assert_eq!(parse_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_quoted_comma() {
        assert_eq!(parse_line(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn test_parse_escaped_quote() {
        assert_eq!(parse_line(r#"a,"b""c",d"#), vec!["a", "b\"c", "d"]);
    }

    #[test]
    fn test_parse_empty_fields() {
        assert_eq!(parse_line(",,"), vec!["", "", ""]);
        assert_eq!(parse_line(""), vec![""]);
    }

    #[test]
    fn test_normalize_field() {
        assert_eq!(normalize_field("US"), Some("US".to_string()));
        assert_eq!(normalize_field("  US "), Some("US".to_string()));
        assert_eq!(normalize_field("\"US\""), Some("US".to_string()));
        assert_eq!(normalize_field("-"), None);
        assert_eq!(normalize_field("\"-\""), None);
        assert_eq!(normalize_field(""), None);
        assert_eq!(normalize_field("\"\""), None);
    }

    #[test]
    fn test_classify_data_line() {
        let line = "16777216,16777471,US,United States,California,Los Angeles";
        match classify_line(3, line) {
            Line::Data(raw) => {
                assert_eq!(raw.start, "16777216");
                assert_eq!(raw.end, "16777471");
                assert_eq!(raw.country.as_deref(), Some("US"));
                assert_eq!(raw.region.as_deref(), Some("California"));
                assert_eq!(raw.city.as_deref(), Some("Los Angeles"));
            }
            other => panic!("expected data line, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_quoted_city_with_comma() {
        let line = r#""1","2","US","United States","Washington","Washington, D.C.""#;
        match classify_line(1, line) {
            Line::Data(raw) => {
                assert_eq!(raw.start, "1");
                assert_eq!(raw.city.as_deref(), Some("Washington, D.C."));
            }
            other => panic!("expected data line, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_skips_and_malformed() {
        assert_eq!(classify_line(5, ""), Line::Skip);
        assert_eq!(classify_line(5, "   "), Line::Skip);
        assert_eq!(classify_line(0, "# comment"), Line::Skip);
        assert_eq!(classify_line(0, "from,to,cc"), Line::Header);
        assert_eq!(classify_line(7, "1,2,US"), Line::Malformed);
    }

    #[test]
    fn test_classify_strips_carriage_return() {
        match classify_line(1, "1,2,-,-,-,Paris\r") {
            Line::Data(raw) => {
                assert_eq!(raw.country, None);
                assert_eq!(raw.city.as_deref(), Some("Paris"));
            }
            other => panic!("expected data line, got {:?}", other),
        }
    }
}
