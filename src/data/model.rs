use std::fmt;

use super::well::{ColumnKey, Well, CANONICAL_WIDTH};
use crate::error::{PlateError, Result};

// ---------------------------------------------------------------------------
// CanonicalTable – one signal of one plate, well-indexed and cycle-ordered
// ---------------------------------------------------------------------------

/// Ordered map from canonical column to its readings, one per cycle.
///
/// The table holds a canonical prefix of the 99 recognised columns
/// (`cycle`, `time`, `temp`, `A1` … `H12`); a full plate uses all of them.
/// Every column always has exactly [`CanonicalTable::cycles`] entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    keys: Vec<ColumnKey>,
    values: Vec<Vec<f64>>,
    cycles: usize,
}

impl CanonicalTable {
    /// An empty table over the first `width` canonical columns.
    pub fn with_width(width: usize) -> Self {
        let keys: Vec<ColumnKey> = ColumnKey::canonical().take(width.min(CANONICAL_WIDTH)).collect();
        let values = vec![Vec::new(); keys.len()];
        CanonicalTable {
            keys,
            values,
            cycles: 0,
        }
    }

    /// Build a table from cycle rows. Every row must have the width of the first.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map_or(CANONICAL_WIDTH, |r| r.len());
        let mut table = CanonicalTable::with_width(width);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append one cycle.
    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.keys.len() {
            return Err(PlateError::CycleCountMismatch {
                column: format!("row {}", self.cycles),
                expected: self.keys.len(),
                found: row.len(),
            });
        }
        for (column, &value) in self.values.iter_mut().zip(row) {
            column.push(value);
        }
        self.cycles += 1;
        self.check_invariant()
    }

    /// Number of measurement cycles.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles == 0
    }

    pub fn keys(&self) -> &[ColumnKey] {
        &self.keys
    }

    /// Readings of a column, if the table holds it.
    pub fn column(&self, key: ColumnKey) -> Option<&[f64]> {
        let pos = key.position();
        (pos < self.keys.len()).then(|| self.values[pos].as_slice())
    }

    /// Readings of a well, if the table holds it.
    pub fn well(&self, well: Well) -> Option<&[f64]> {
        self.column(ColumnKey::Well(well))
    }

    /// Well columns present in this table, in canonical order.
    pub fn wells(&self) -> impl Iterator<Item = Well> + '_ {
        self.keys.iter().filter_map(|k| match k {
            ColumnKey::Well(w) => Some(*w),
            _ => None,
        })
    }

    /// Rewrite every well reading in place; metadata columns are untouched.
    pub fn map_wells<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(Well, usize, f64) -> f64,
    {
        for (key, column) in self.keys.iter().zip(self.values.iter_mut()) {
            if let ColumnKey::Well(well) = key {
                for (cycle, value) in column.iter_mut().enumerate() {
                    *value = f(*well, cycle, *value);
                }
            }
        }
        self.check_invariant()
    }

    /// Values of one cycle across all columns.
    pub fn row(&self, cycle: usize) -> Option<Vec<f64>> {
        (cycle < self.cycles).then(|| self.values.iter().map(|c| c[cycle]).collect())
    }

    /// Column names in order (`cycle`, `time`, `temp`, wells).
    pub fn names(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.to_string()).collect()
    }

    /// Every column must hold exactly `cycles` readings.
    pub fn check_invariant(&self) -> Result<()> {
        for (key, column) in self.keys.iter().zip(&self.values) {
            if column.len() != self.cycles {
                return Err(PlateError::CycleCountMismatch {
                    column: key.to_string(),
                    expected: self.cycles,
                    found: column.len(),
                });
            }
        }
        Ok(())
    }

    /// Detach from the canonical column set, e.g. before labeling.
    pub fn to_data_table(&self) -> DataTable {
        DataTable {
            names: self.names(),
            columns: self.values.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// PlateData – the OD and reporter tables of one plate
// ---------------------------------------------------------------------------

/// OD and reporter (FU) tables read from one intermediate file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateData {
    pub od: CanonicalTable,
    pub fu: CanonicalTable,
}

impl PlateData {
    /// Pair two tables; both must cover the same cycles and columns.
    pub fn new(od: CanonicalTable, fu: CanonicalTable) -> Result<Self> {
        if od.cycles() != fu.cycles() {
            return Err(PlateError::CycleCountMismatch {
                column: "reporter table".into(),
                expected: od.cycles(),
                found: fu.cycles(),
            });
        }
        if od.keys() != fu.keys() {
            return Err(PlateError::CycleCountMismatch {
                column: "reporter table width".into(),
                expected: od.width(),
                found: fu.width(),
            });
        }
        Ok(PlateData { od, fu })
    }

    pub fn cycles(&self) -> usize {
        self.od.cycles()
    }
}

// ---------------------------------------------------------------------------
// DataTable – free-form named numeric columns (labeled / merged output)
// ---------------------------------------------------------------------------

/// Named numeric columns of equal length.
///
/// Column names are free text (construct labels); missing cells are `NaN`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl DataTable {
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(PlateError::CycleCountMismatch {
                column: "header".into(),
                expected: columns.len(),
                found: names.len(),
            });
        }
        let expected = columns.first().map_or(0, |c| c.len());
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != expected {
                return Err(PlateError::CycleCountMismatch {
                    column: name.clone(),
                    expected,
                    found: column.len(),
                });
            }
        }
        Ok(DataTable { names, columns })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[index]).collect()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<f64>>) {
        (self.names, self.columns)
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} columns x {} rows", self.names.len(), self.len())
    }
}
