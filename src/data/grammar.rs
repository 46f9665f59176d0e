//! Well-address notation used to designate blank wells.
//!
//! Tokens are comma separated, case-insensitive and may contain whitespace:
//!
//! * `A1`, `h12`      – a single well
//! * `C1:C3`          – an inclusive run within one row
//! * `12`             – every well of plate column 12 (sole token only)

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::well::{Well, ROWS};
use crate::error::{PlateError, Result};

static SINGLE_WELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-H])(1[0-2]|[1-9])$").expect("valid regex"));
static WELL_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-H])(1[0-2]|[1-9]):([A-H])(1[0-2]|[1-9])$").expect("valid regex")
});
static PLATE_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(1[0-2]|[1-9])$").expect("valid regex"));

/// A validated token, not yet expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Single(Well),
    Range { row: u8, first: u8, last: u8 },
    Column(u8),
}

/// Parse a well specification into an ordered, deduplicated list of wells.
///
/// ```
/// use rusty_plate::data::grammar::parse_well_spec;
///
/// let wells = parse_well_spec("H1:H3, A1").unwrap();
/// let names: Vec<String> = wells.iter().map(|w| w.to_string()).collect();
/// assert_eq!(names, ["H1", "H2", "H3", "A1"]);
/// ```
pub fn parse_well_spec(input: &str) -> Result<Vec<Well>> {
    let tokens = validate(input)?;

    let mut seen = HashSet::new();
    let mut wells = Vec::new();
    for token in tokens {
        for well in expand(token) {
            if seen.insert(well) {
                wells.push(well);
            }
        }
    }
    Ok(wells)
}

/// Check every token before anything is expanded.
fn validate(input: &str) -> Result<Vec<Token>> {
    let invalid = |reason: String| PlateError::InvalidWellSpecification {
        input: input.to_string(),
        reason,
    };

    let normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(invalid("no wells given".into()));
    }

    let raw: Vec<&str> = normalized.split(',').collect();
    let mut tokens = Vec::with_capacity(raw.len());
    for tok in &raw {
        let token = parse_token(tok)
            .ok_or_else(|| invalid(format!("'{tok}' is not a well, range or column")))?;
        tokens.push(token);
    }

    let has_column = tokens.iter().any(|t| matches!(t, Token::Column(_)));
    if has_column && tokens.len() > 1 {
        return Err(invalid(
            "column shorthand cannot be combined with other wells".into(),
        ));
    }
    Ok(tokens)
}

fn parse_token(tok: &str) -> Option<Token> {
    if SINGLE_WELL.is_match(tok) {
        return tok.parse().ok().map(Token::Single);
    }
    if let Some(caps) = WELL_RANGE.captures(tok) {
        let first_row = row_of(&caps[1])?;
        let last_row = row_of(&caps[3])?;
        let first: u8 = caps[2].parse().ok()?;
        let last: u8 = caps[4].parse().ok()?;
        if first_row != last_row || first >= last {
            return None;
        }
        return Some(Token::Range {
            row: first_row,
            first,
            last,
        });
    }
    if PLATE_COLUMN.is_match(tok) {
        return tok.parse().ok().map(Token::Column);
    }
    None
}

fn row_of(letter: &str) -> Option<u8> {
    let c = letter.chars().next()?;
    ROWS.iter().position(|&r| r == c).map(|p| p as u8)
}

fn expand(token: Token) -> Vec<Well> {
    match token {
        Token::Single(well) => vec![well],
        Token::Range { row, first, last } => {
            (first..=last).filter_map(|col| Well::new(row, col)).collect()
        }
        Token::Column(col) => Well::plate_column(col).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(input: &str) -> Vec<String> {
        parse_well_spec(input)
            .unwrap()
            .iter()
            .map(|w| w.to_string())
            .collect()
    }

    #[test]
    fn test_single_wells() {
        assert_eq!(names("H1, H2, H3"), ["H1", "H2", "H3"]);
        assert_eq!(
            names("A1, B2, C3, D4, E5, F6, G7, H8"),
            ["A1", "B2", "C3", "D4", "E5", "F6", "G7", "H8"]
        );
        assert_eq!(names(" h10 ,h11,H12"), ["H10", "H11", "H12"]);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(names("H1:H4"), ["H1", "H2", "H3", "H4"]);
        assert_eq!(names("A1, C1:C3"), ["A1", "C1", "C2", "C3"]);
        assert_eq!(names("b9:b12"), ["B9", "B10", "B11", "B12"]);
    }

    #[test]
    fn test_column_shorthand() {
        assert_eq!(
            names("12"),
            ["A12", "B12", "C12", "D12", "E12", "F12", "G12", "H12"]
        );
        assert_eq!(names(" 1 ").len(), 8);
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        assert_eq!(names("H2, H1:H3, H2"), ["H2", "H1", "H3"]);
    }

    #[test]
    fn test_invalid_inputs() {
        for input in ["X19", "A1:A13", "22", "", "   ", "A1,", "H4:H1", "H2:H2", "A1:B3", "0", "I1", "A1, 12", "12, 11"] {
            match parse_well_spec(input) {
                Err(PlateError::InvalidWellSpecification { input: reported, .. }) => {
                    assert_eq!(reported, input)
                }
                other => panic!("expected failure for {input:?}, got {other:?}"),
            }
        }
    }
}
