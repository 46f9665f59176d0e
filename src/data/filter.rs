use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::loader::UNNAMED_PREFIX;
use super::model::DataTable;
use crate::error::Result;

/// Axis columns kept once, at the front, in this order.
pub const AXIS_COLUMNS: [&str; 3] = ["cycle", "time", "temp"];

// ---------------------------------------------------------------------------
// Column filter: which labeled columns survive a merge
// ---------------------------------------------------------------------------

/// Exclusion keywords applied to column names.
///
/// A column is dropped when its name contains any keyword (case-sensitive
/// substring match). Axis columns are never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_exclude() -> Vec<String> {
    vec![UNNAMED_PREFIX.to_string(), "medium".to_string(), "blank".to_string()]
}

impl Default for ColumnFilter {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
        }
    }
}

impl ColumnFilter {
    pub fn new<S: Into<String>>(exclude: impl IntoIterator<Item = S>) -> Self {
        Self {
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a non-axis column is dropped.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude
            .iter()
            .any(|keyword| !keyword.is_empty() && name.contains(keyword.as_str()))
    }
}

/// Return the indices of the columns to keep, in output order.
///
/// * `cycle`, `time`, `temp` first (first occurrence of each, if present)
/// * every other non-excluded column, sorted lexicographically by name
pub fn select_columns(names: &[String], filter: &ColumnFilter) -> Vec<usize> {
    let mut selected: Vec<usize> = AXIS_COLUMNS
        .iter()
        .filter_map(|axis| names.iter().position(|n| n == axis))
        .collect();

    let mut rest: Vec<usize> = names
        .iter()
        .enumerate()
        .filter(|(_, name)| !AXIS_COLUMNS.contains(&name.as_str()) && !filter.is_excluded(name))
        .map(|(i, _)| i)
        .collect();
    rest.sort_by(|&a, &b| names[a].cmp(&names[b]));

    selected.extend(rest);
    selected
}

/// Reorder and filter the columns of a table.
pub fn sort_columns(table: &DataTable, filter: &ColumnFilter) -> Result<DataTable> {
    let keep = select_columns(table.names(), filter);
    let names = keep.iter().map(|&i| table.names()[i].clone()).collect();
    let columns = keep.iter().map(|&i| table.columns()[i].clone()).collect();
    DataTable::new(names, columns)
}

/// Remove repeated rows, keeping the first occurrence.
///
/// Rows compare bitwise, so `NaN` cells are equal to each other.
pub fn drop_duplicate_rows(table: &DataTable) -> Result<DataTable> {
    let mut seen: HashSet<Vec<u64>> = HashSet::new();
    let keep: Vec<usize> = (0..table.len())
        .filter(|&i| {
            let key = table.row(i).iter().map(|v| canonical_bits(*v)).collect();
            seen.insert(key)
        })
        .collect();

    let columns = table
        .columns()
        .iter()
        .map(|column| keep.iter().map(|&i| column[i]).collect())
        .collect();
    DataTable::new(table.names().to_vec(), columns)
}

fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}
