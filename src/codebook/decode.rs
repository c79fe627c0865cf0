//! Pure decoders for codebook value/format strings.

use crate::error::{RebuildError, RebuildResult};

use super::{CodeRange, LabelMap, RangeMap};

/// Left-hand side marking the "missing" category. It has no target-table row and is dropped.
pub const MISSING_SENTINEL: &str = "Missing";

/// Decode a `code=label`-per-line string into a [`LabelMap`].
///
/// Blank lines are ignored. Every other line must contain exactly one `=`; the trimmed left-hand
/// side must be an integer code (or [`MISSING_SENTINEL`], which is skipped) and the trimmed
/// right-hand side is the label.
pub fn decode_labels(variable: u32, raw: &str) -> RebuildResult<LabelMap> {
    let mut entries: Vec<(i64, String)> = Vec::new();
    for (lhs, rhs, line) in split_entries(variable, raw)? {
        if lhs == MISSING_SENTINEL {
            continue;
        }
        let code = parse_code(variable, lhs, line)?;
        if entries.iter().any(|(c, _)| *c == code) {
            return Err(malformed(variable, line, format!("duplicate code {code}")));
        }
        entries.push((code, rhs.to_string()));
    }
    Ok(LabelMap::from_entries(entries))
}

/// Decode a `code=range`-per-line string into a [`RangeMap`].
///
/// Right-hand side shapes:
///
/// - `"X to Y"`: lower `X`, upper `Y`
/// - open-ended phrases (`"2000 or later"`, `"10+"`, `"Over 500,000"`): lower `N`, no upper bound
/// - any other single-value phrase (`"Before 1920"`): lower `0`, upper `N`
///
/// Thousands separators inside numbers are accepted.
pub fn decode_ranges(variable: u32, raw: &str) -> RebuildResult<RangeMap> {
    let mut entries: Vec<(i64, CodeRange)> = Vec::new();
    for (lhs, rhs, line) in split_entries(variable, raw)? {
        if lhs == MISSING_SENTINEL {
            continue;
        }
        let code = parse_code(variable, lhs, line)?;
        if entries.iter().any(|(c, _)| *c == code) {
            return Err(malformed(variable, line, format!("duplicate code {code}")));
        }
        let range = parse_range(variable, rhs, line)?;
        entries.push((code, range));
    }
    Ok(RangeMap::from_entries(entries))
}

fn split_entries(variable: u32, raw: &str) -> RebuildResult<Vec<(&str, &str, &str)>> {
    let mut out = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(lhs), Some(rhs), None) => out.push((lhs.trim(), rhs.trim(), line)),
            _ => {
                return Err(malformed(
                    variable,
                    line,
                    "expected exactly one '=' separator".to_string(),
                ));
            }
        }
    }
    Ok(out)
}

fn parse_code(variable: u32, lhs: &str, line: &str) -> RebuildResult<i64> {
    lhs.parse::<i64>()
        .map_err(|e| malformed(variable, line, format!("code '{lhs}' is not an integer: {e}")))
}

fn parse_range(variable: u32, rhs: &str, line: &str) -> RebuildResult<CodeRange> {
    let tokens: Vec<&str> = rhs.split_whitespace().collect();

    if let Some(pos) = tokens.iter().position(|t| *t == "to") {
        // units or qualifiers may surround the bounds: "1,001 to 5,000 square feet"
        let lower = tokens[..pos]
            .iter()
            .rev()
            .find_map(|t| parse_bound_token(t))
            .ok_or_else(|| {
                let text = tokens[..pos].join(" ");
                malformed(variable, line, format!("lower bound '{text}' is not a number"))
            })?;
        let upper = tokens[pos + 1..]
            .iter()
            .find_map(|t| parse_bound_token(t))
            .ok_or_else(|| {
                let text = tokens[pos + 1..].join(" ");
                malformed(variable, line, format!("upper bound '{text}' is not a number"))
            })?;
        if lower > upper {
            return Err(malformed(
                variable,
                line,
                format!("lower bound {lower} exceeds upper bound {upper}"),
            ));
        }
        return Ok(CodeRange {
            lower,
            upper: Some(upper),
        });
    }

    let value = tokens
        .iter()
        .rev()
        .find_map(|t| parse_bound_token(t))
        .ok_or_else(|| malformed(variable, line, format!("no numeric bound in '{rhs}'")))?;

    if is_open_ended(rhs) {
        Ok(CodeRange {
            lower: value,
            upper: None,
        })
    } else {
        Ok(CodeRange {
            lower: 0,
            upper: Some(value),
        })
    }
}

fn is_open_ended(rhs: &str) -> bool {
    let lower = rhs.to_ascii_lowercase();
    const SUFFIXES: [&str; 5] = ["or later", "or more", "or over", "and over", "and later"];
    const PREFIXES: [&str; 4] = ["over ", "after ", "more than ", "greater than "];
    lower.trim_end().ends_with('+')
        || SUFFIXES.iter().any(|s| lower.ends_with(s))
        || PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn parse_bound_token(token: &str) -> Option<i64> {
    parse_number(token.trim_start_matches('$').trim_end_matches('+'))
}

fn parse_number(text: &str) -> Option<i64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<i64>().ok()
}

fn malformed(variable: u32, line: &str, message: String) -> RebuildError {
    RebuildError::MalformedCodebookEntry {
        variable,
        line: line.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_labels, decode_ranges};
    use crate::codebook::CodeRange;
    use crate::error::RebuildError;

    #[test]
    fn labels_keep_line_order_and_trim_both_sides() {
        let raw = " 1 = Northeast \n2=Midwest\n\n3=South\n4=West";
        let map = decode_labels(2, raw).unwrap();
        assert_eq!(
            map.iter().collect::<Vec<_>>(),
            vec![(1, "Northeast"), (2, "Midwest"), (3, "South"), (4, "West")]
        );
    }

    #[test]
    fn labels_drop_missing_sentinel_only() {
        let raw = "1=Yes\n2=No\nMissing=Not applicable";
        let map = decode_labels(62, raw).unwrap();
        assert_eq!(map.len(), 2);
        assert!(!map.iter().any(|(_, l)| l == "Not applicable"));

        // Absence of the sentinel is not an error either.
        assert_eq!(decode_labels(62, "1=Yes\n2=No").unwrap().len(), 2);
    }

    #[test]
    fn labels_round_trip_through_codebook_format() {
        let raw = "1=Office\n2=Laboratory\n5=Nonrefrigerated warehouse";
        let map = decode_labels(40, raw).unwrap();
        assert_eq!(map.to_codebook_string(), raw);
    }

    #[test]
    fn labels_reject_line_without_separator() {
        let err = decode_labels(40, "1=Office\nLaboratory").unwrap_err();
        match err {
            RebuildError::MalformedCodebookEntry { variable, line, .. } => {
                assert_eq!(variable, 40);
                assert_eq!(line, "Laboratory");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn labels_reject_line_with_two_separators() {
        let err = decode_labels(52, "1=a=b").unwrap_err();
        assert!(err.to_string().contains("exactly one '='"));
        assert!(err.to_string().contains("variable 52"));
    }

    #[test]
    fn labels_reject_non_integer_and_duplicate_codes() {
        assert!(decode_labels(2, "one=Northeast").is_err());
        let err = decode_labels(2, "1=Northeast\n1=Midwest").unwrap_err();
        assert!(err.to_string().contains("duplicate code 1"));
    }

    #[test]
    fn ranges_split_on_to_token() {
        let raw = "03=1946 to 1959\n04=1960 to 1969";
        let map = decode_ranges(22, raw).unwrap();
        assert_eq!(
            map.get(3),
            Some(CodeRange {
                lower: 1946,
                upper: Some(1959)
            })
        );
        assert_eq!(
            map.get(4),
            Some(CodeRange {
                lower: 1960,
                upper: Some(1969)
            })
        );
    }

    #[test]
    fn ranges_single_phrase_forces_zero_lower_bound() {
        let map = decode_ranges(22, "02=Before 1920").unwrap();
        assert_eq!(
            map.get(2),
            Some(CodeRange {
                lower: 0,
                upper: Some(1920)
            })
        );
    }

    #[test]
    fn ranges_open_ended_have_no_upper_bound() {
        let raw = "1=2000 or later\n2=10+\n3=Over 1,000,000";
        let map = decode_ranges(7, raw).unwrap();
        assert_eq!(map.get(1), Some(CodeRange { lower: 2000, upper: None }));
        assert_eq!(map.get(2), Some(CodeRange { lower: 10, upper: None }));
        assert_eq!(
            map.get(3),
            Some(CodeRange {
                lower: 1_000_000,
                upper: None
            })
        );
    }

    #[test]
    fn ranges_accept_thousands_separators() {
        let map = decode_ranges(6, "2=1,001 to 5,000").unwrap();
        assert_eq!(
            map.get(2),
            Some(CodeRange {
                lower: 1001,
                upper: Some(5000)
            })
        );
    }

    #[test]
    fn ranges_ignore_units_around_bounds() {
        let raw = "2=1,001 to 5,000 square feet\n3=Between 5,001 to 10,000 sq ft";
        let map = decode_ranges(6, raw).unwrap();
        assert_eq!(
            map.get(2),
            Some(CodeRange {
                lower: 1001,
                upper: Some(5000)
            })
        );
        assert_eq!(
            map.get(3),
            Some(CodeRange {
                lower: 5001,
                upper: Some(10_000)
            })
        );

        let err = decode_ranges(6, "4=some to many").unwrap_err();
        assert!(err.to_string().contains("lower bound 'some'"));
    }

    #[test]
    fn ranges_reject_inverted_bounds() {
        let err = decode_ranges(22, "03=1959 to 1946").unwrap_err();
        assert!(err.to_string().contains("exceeds upper bound"));
    }

    #[test]
    fn ranges_reject_phrase_without_number() {
        let err = decode_ranges(22, "09=Unknown").unwrap_err();
        assert!(err.to_string().contains("no numeric bound"));
    }
}
