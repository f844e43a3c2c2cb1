//! Flexible UK-format number parser.
//!
//! Accepts UK conventions (`,` thousands separator, `.` decimal point) and
//! rejects European-style input (`.` thousands, `,` decimal) with a
//! deterministic error message suggesting the UK equivalent, per spec.md
//! §4.1.

#[derive(Debug, Clone, thiserror::Error)]
pub enum NumberParseError {
    #[error("empty number")]
    Empty,
    #[error("invalid characters in number '{0}'")]
    InvalidCharacters(String),
    #[error("'{input}' looks like a European-format number; use UK format instead, e.g. '{suggestion}'")]
    EuropeanFormat { input: String, suggestion: String },
}

/// Parse a UK-style flexible number: `1234.5`, `1,234.5`, `1,234,567`,
/// `0,234` (see below), optionally signed.
pub fn parse_flexible_number(raw: &str) -> Result<f64, NumberParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NumberParseError::Empty);
    }

    let negative = trimmed.starts_with('-');
    let unsigned = trimmed.trim_start_matches(['+', '-']);

    if unsigned.is_empty()
        || !unsigned
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return Err(NumberParseError::InvalidCharacters(raw.to_string()));
    }

    let comma_count = unsigned.matches(',').count();
    let dot_count = unsigned.matches('.').count();

    let canonical_digits = match (comma_count, dot_count) {
        (0, 0) => unsigned.to_string(),
        (0, 1) => unsigned.to_string(),
        (0, _) => {
            // Multiple dots, no comma: dot used as a thousands separator
            // the European way (e.g. "1.234.567").
            let suggestion = unsigned.replace('.', ",");
            return Err(NumberParseError::EuropeanFormat {
                input: raw.to_string(),
                suggestion,
            });
        }
        (1, 0) => resolve_single_comma(raw, unsigned)?,
        (_, 0) => {
            // Multiple commas, no dot: plain UK thousands grouping, e.g.
            // "12,345,678".
            unsigned.chars().filter(|&c| c != ',').collect()
        }
        (_, 1) => resolve_commas_with_dot(raw, unsigned)?,
        (_, _) => {
            return Err(NumberParseError::InvalidCharacters(raw.to_string()));
        }
    };

    let value: f64 = canonical_digits
        .parse()
        .map_err(|_| NumberParseError::InvalidCharacters(raw.to_string()))?;

    Ok(if negative { -value } else { value })
}

/// A single comma with no decimal point is ambiguous: `1,234` could be UK
/// thousands grouping (`1234`) or a European decimal comma (`1.234`).
/// Resolved as thousands whenever the trailing run is exactly 3 digits —
/// the only case spec.md calls out explicitly covers an integer part with
/// ≥4 digits or a leading `0,`, but both are subsumed by "exactly 3
/// trailing digits ⇒ thousands", which is what we apply uniformly.
fn resolve_single_comma(raw: &str, unsigned: &str) -> Result<String, NumberParseError> {
    let idx = unsigned.find(',').unwrap();
    let (int_part, rest) = unsigned.split_at(idx);
    let frac_part = &rest[1..];

    let looks_like_thousands =
        frac_part.len() == 3 && frac_part.chars().all(|c| c.is_ascii_digit()) && !int_part.is_empty();

    if looks_like_thousands {
        Ok(format!("{int_part}{frac_part}"))
    } else {
        let suggestion = format!("{int_part}.{frac_part}");
        Err(NumberParseError::EuropeanFormat {
            input: raw.to_string(),
            suggestion,
        })
    }
}

/// One or more commas together with a single dot: either UK
/// (`1,234,567.89`, commas before the dot) or European
/// (`1.234.567,89` collapsed to one dot... but also the simple
/// `1.234,56` case, dot before comma).
fn resolve_commas_with_dot(raw: &str, unsigned: &str) -> Result<String, NumberParseError> {
    let dot_idx = unsigned.find('.').unwrap();
    let last_comma_idx = unsigned.rfind(',').unwrap();

    if last_comma_idx < dot_idx {
        // UK: commas group thousands ahead of the decimal point.
        Ok(unsigned.chars().filter(|&c| c != ',').collect())
    } else {
        // European: dot groups thousands, the (single, trailing) comma is
        // the decimal separator.
        let first_comma_idx = unsigned.find(',').unwrap();
        if first_comma_idx != last_comma_idx {
            // More than one comma after the dot makes no sense under
            // either convention.
            return Err(NumberParseError::InvalidCharacters(raw.to_string()));
        }
        let (int_part, rest) = unsigned.split_at(first_comma_idx);
        let frac_part = &rest[1..];
        let suggestion = format!("{}.{}", int_part.replace('.', ","), frac_part);
        Err(NumberParseError::EuropeanFormat {
            input: raw.to_string(),
            suggestion,
        })
    }
}

/// Canonical plain-decimal rendering of a value, used by the round-trip
/// property `format(parse(x)) == canonical(x)` (spec.md §8, P7). This is
/// intentionally ungrouped — grouping is a presentation concern for a
/// caller, not part of the engine's canonical form.
pub fn format_canonical(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        let s = format!("{value}");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integer() {
        assert_eq!(parse_flexible_number("1234").unwrap(), 1234.0);
    }

    #[test]
    fn parses_uk_decimal() {
        assert_eq!(parse_flexible_number("1234.5").unwrap(), 1234.5);
    }

    #[test]
    fn parses_uk_thousands_and_decimal() {
        assert_eq!(parse_flexible_number("1,234.56").unwrap(), 1234.56);
    }

    #[test]
    fn parses_uk_multi_group_thousands() {
        assert_eq!(parse_flexible_number("1,234,567").unwrap(), 1_234_567.0);
    }

    #[test]
    fn resolves_ambiguous_three_trailing_digits_as_thousands() {
        assert_eq!(parse_flexible_number("1,234").unwrap(), 1234.0);
        assert_eq!(parse_flexible_number("12,345").unwrap(), 12345.0);
        assert_eq!(parse_flexible_number("0,234").unwrap(), 234.0);
    }

    #[test]
    fn rejects_european_decimal_comma() {
        let err = parse_flexible_number("1,5").unwrap_err();
        match err {
            NumberParseError::EuropeanFormat { suggestion, .. } => {
                assert_eq!(suggestion, "1.5");
            }
            other => panic!("expected EuropeanFormat, got {other:?}"),
        }
    }

    #[test]
    fn rejects_european_thousands_dot_decimal_comma() {
        let err = parse_flexible_number("1.234,56").unwrap_err();
        match err {
            NumberParseError::EuropeanFormat { suggestion, .. } => {
                assert_eq!(suggestion, "1,234.56");
            }
            other => panic!("expected EuropeanFormat, got {other:?}"),
        }
    }

    #[test]
    fn rejects_european_multi_dot_thousands() {
        let err = parse_flexible_number("1.234.567").unwrap_err();
        match err {
            NumberParseError::EuropeanFormat { suggestion, .. } => {
                assert_eq!(suggestion, "1,234,567");
            }
            other => panic!("expected EuropeanFormat, got {other:?}"),
        }
    }

    #[test]
    fn parses_negative_numbers() {
        assert_eq!(parse_flexible_number("-1,234.5").unwrap(), -1234.5);
    }

    #[test]
    fn round_trips_through_canonical_format() {
        for raw in ["1234", "1,234.5", "0,234"] {
            let value = parse_flexible_number(raw).unwrap();
            let formatted = format_canonical(value);
            let reparsed = parse_flexible_number(&formatted).unwrap();
            assert!((reparsed - value).abs() < 1e-9);
        }
    }
}
