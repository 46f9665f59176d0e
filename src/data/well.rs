use std::fmt;
use std::str::FromStr;

use crate::error::{PlateError, Result};

/// Row letters of a 96-well plate, top to bottom.
pub const ROWS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// Number of columns per plate row.
pub const COLUMNS: u8 = 12;

/// Number of wells on a plate.
pub const WELL_COUNT: usize = 96;

// ---------------------------------------------------------------------------
// Well – one plate coordinate
// ---------------------------------------------------------------------------

/// A well coordinate such as `A1` or `H12`.
///
/// Ordering is the canonical row-major plate order (A1…A12, B1…, H12), which
/// is also the column order of every table in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Well {
    /// Zero-based row (0 = A).
    row: u8,
    /// One-based column (1..=12).
    column: u8,
}

impl Well {
    /// Build a well from a zero-based row and one-based column.
    pub fn new(row: u8, column: u8) -> Option<Self> {
        if (row as usize) < ROWS.len() && (1..=COLUMNS).contains(&column) {
            Some(Well { row, column })
        } else {
            None
        }
    }

    /// Well at the given canonical index (0 = A1, 95 = H12).
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= WELL_COUNT {
            return None;
        }
        Well::new((index / COLUMNS as usize) as u8, (index % COLUMNS as usize) as u8 + 1)
    }

    /// Canonical row-major index.
    pub fn index(&self) -> usize {
        self.row as usize * COLUMNS as usize + (self.column as usize - 1)
    }

    pub fn row_letter(&self) -> char {
        ROWS[self.row as usize]
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    /// All 96 wells in canonical order.
    pub fn all() -> impl Iterator<Item = Well> {
        (0..WELL_COUNT).filter_map(Well::from_index)
    }

    /// The eight wells of one plate column, A to H.
    pub fn plate_column(column: u8) -> Option<Vec<Well>> {
        (1..=COLUMNS).contains(&column).then(|| {
            (0..ROWS.len() as u8)
                .filter_map(|row| Well::new(row, column))
                .collect()
        })
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.column)
    }
}

impl FromStr for Well {
    type Err = PlateError;

    /// Case-insensitive `<Letter><1-12>`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| PlateError::InvalidWellSpecification {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let mut chars = s.trim().chars();
        let letter = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .ok_or_else(|| invalid("empty well"))?;
        let row = ROWS
            .iter()
            .position(|&r| r == letter)
            .ok_or_else(|| invalid("row letter must be A-H"))?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || digits.starts_with('0') {
            return Err(invalid("column must be a number from 1 to 12"));
        }
        let column: u8 = digits
            .parse()
            .map_err(|_| invalid("column must be a number from 1 to 12"))?;
        Well::new(row as u8, column).ok_or_else(|| invalid("column must be a number from 1 to 12"))
    }
}

// ---------------------------------------------------------------------------
// ColumnKey – the 99 recognised table columns
// ---------------------------------------------------------------------------

/// Number of metadata columns preceding the wells.
pub const METADATA_COLUMNS: usize = 3;

/// Total number of canonical columns (3 metadata + 96 wells).
pub const CANONICAL_WIDTH: usize = METADATA_COLUMNS + WELL_COUNT;

/// One of the recognised columns of a canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnKey {
    Cycle,
    Time,
    Temp,
    Well(Well),
}

impl ColumnKey {
    /// Key at a canonical position (0 = cycle, 3 = A1, 98 = H12).
    pub fn from_position(position: usize) -> Option<Self> {
        match position {
            0 => Some(ColumnKey::Cycle),
            1 => Some(ColumnKey::Time),
            2 => Some(ColumnKey::Temp),
            p => Well::from_index(p - METADATA_COLUMNS).map(ColumnKey::Well),
        }
    }

    pub fn position(&self) -> usize {
        match self {
            ColumnKey::Cycle => 0,
            ColumnKey::Time => 1,
            ColumnKey::Temp => 2,
            ColumnKey::Well(w) => METADATA_COLUMNS + w.index(),
        }
    }

    /// Whether blank correction applies to this column.
    pub fn is_well(&self) -> bool {
        matches!(self, ColumnKey::Well(_))
    }

    /// All canonical keys in order.
    pub fn canonical() -> impl Iterator<Item = ColumnKey> {
        (0..CANONICAL_WIDTH).filter_map(ColumnKey::from_position)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Cycle => write!(f, "cycle"),
            ColumnKey::Time => write!(f, "time"),
            ColumnKey::Temp => write!(f, "temp"),
            ColumnKey::Well(w) => write!(f, "{w}"),
        }
    }
}
