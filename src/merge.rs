//! Column-wise merge of labeled tables from several plates.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::data::filter::{drop_duplicate_rows, sort_columns, ColumnFilter, AXIS_COLUMNS};
use crate::data::loader::load_table;
use crate::data::model::DataTable;
use crate::error::{PlateError, Result};

/// A table to merge: already in memory, or a file to load.
#[derive(Debug, Clone)]
pub enum MergeInput {
    InMemory(DataTable),
    Path(PathBuf),
}

impl MergeInput {
    /// Materialise the table. Paths are loaded by extension.
    pub fn resolve(self) -> Result<DataTable> {
        match self {
            MergeInput::InMemory(table) => Ok(table),
            MergeInput::Path(path) => {
                if !path.is_file() {
                    return Err(PlateError::InvalidMergeInput(format!(
                        "{} is not a file",
                        path.display()
                    )));
                }
                load_table(&path)
            }
        }
    }
}

impl From<DataTable> for MergeInput {
    fn from(table: DataTable) -> Self {
        MergeInput::InMemory(table)
    }
}

impl From<PathBuf> for MergeInput {
    fn from(path: PathBuf) -> Self {
        MergeInput::Path(path)
    }
}

impl From<&Path> for MergeInput {
    fn from(path: &Path) -> Self {
        MergeInput::Path(path.to_path_buf())
    }
}

/// Merge tables side by side, then filter, sort and deduplicate.
///
/// The first table providing `cycle`/`time`/`temp` supplies the axis; those
/// columns from later tables are dropped. Repeated construct names get `.1`,
/// `.2` suffixes. Shorter tables are padded with `NaN`.
pub fn merge_and_sort(inputs: Vec<MergeInput>, filter: &ColumnFilter) -> Result<DataTable> {
    if inputs.is_empty() {
        return Err(PlateError::InvalidMergeInput("no tables to merge".into()));
    }
    let tables = inputs
        .into_iter()
        .map(MergeInput::resolve)
        .collect::<Result<Vec<_>>>()?;

    let merged = concat_columns(tables)?;
    debug!("Concatenated table: {merged}");
    let sorted = sort_columns(&merged, filter)?;
    let deduped = drop_duplicate_rows(&sorted)?;
    info!(
        "Merged table has {} columns and {} rows ({} duplicate rows removed)",
        deduped.names().len(),
        deduped.len(),
        sorted.len() - deduped.len()
    );
    Ok(deduped)
}

/// Sort a single labeled table the same way as a merge.
pub fn sort_table(input: MergeInput, filter: &ColumnFilter) -> Result<DataTable> {
    merge_and_sort(vec![input], filter)
}

fn concat_columns(tables: Vec<DataTable>) -> Result<DataTable> {
    let rows = tables.iter().map(DataTable::len).max().unwrap_or(0);
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::new();
    let mut columns = Vec::new();

    for table in tables {
        let (table_names, table_columns) = table.into_parts();
        for (name, mut column) in table_names.into_iter().zip(table_columns) {
            let is_axis = AXIS_COLUMNS.contains(&name.as_str());
            if is_axis && used.contains(&name) {
                continue;
            }
            let name = if is_axis { name } else { unused_name(&name, &used) };
            column.resize(rows, f64::NAN);
            used.insert(name.clone());
            names.push(name);
            columns.push(column);
        }
    }
    DataTable::new(names, columns)
}

fn unused_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("{name}.{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::writer::write_table;

    fn plate(labels: &[&str], rows: &[[f64; 2]]) -> DataTable {
        let mut names: Vec<String> = AXIS_COLUMNS.iter().map(|s| s.to_string()).collect();
        names.extend(labels.iter().map(|s| s.to_string()));
        let mut columns = vec![Vec::new(); names.len()];
        for (i, [a, b]) in rows.iter().enumerate() {
            columns[0].push(i as f64);
            columns[1].push(i as f64 * 15.0);
            columns[2].push(30.0);
            columns[3].push(*a);
            columns[4].push(*b);
        }
        DataTable::new(names, columns).unwrap()
    }

    #[test]
    fn test_merge_two_plates() {
        let first = plate(&["wt", "blank"], &[[0.1, 0.0], [0.2, 0.0]]);
        let second = plate(&["mut", "wt"], &[[0.3, 0.4], [0.5, 0.6]]);
        let merged = merge_and_sort(vec![first.into(), second.into()], &ColumnFilter::default()).unwrap();

        assert_eq!(merged.names(), ["cycle", "time", "temp", "mut", "wt", "wt.1"]);
        assert_eq!(merged.column("wt.1").unwrap(), &[0.4, 0.6]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_pads_shorter_tables() {
        let first = plate(&["a", "b"], &[[1.0, 2.0]]);
        let second = plate(&["c", "d"], &[[3.0, 4.0], [5.0, 6.0]]);
        let merged = merge_and_sort(vec![first.into(), second.into()], &ColumnFilter::default()).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged.column("a").unwrap()[1].is_nan());
        // The axis comes from the first table and is padded too.
        assert!(merged.column("cycle").unwrap()[1].is_nan());
    }

    #[test]
    fn test_sort_table_removes_duplicate_rows() {
        let table = plate(&["wt", "medium"], &[[0.1, 0.0], [0.1, 0.0]]);
        let (names, mut columns) = table.into_parts();
        columns[0] = vec![0.0, 0.0];
        columns[1] = vec![0.0, 0.0];
        let table = DataTable::new(names, columns).unwrap();

        let sorted = sort_table(table.into(), &ColumnFilter::default()).unwrap();
        assert_eq!(sorted.names(), ["cycle", "time", "temp", "wt"]);
        assert_eq!(sorted.len(), 1);
    }

    #[test]
    fn test_merge_from_paths() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a_bap.csv");
        let b = dir.path().join("b_bap.parquet");
        write_table(&plate(&["wt", "Unnamed: 5"], &[[0.1, 0.2]]), &a)?;
        write_table(&plate(&["mut", "ctrl"], &[[0.3, 0.4]]), &b)?;

        let merged = merge_and_sort(vec![a.into(), b.into()], &ColumnFilter::default())?;
        assert_eq!(merged.names(), ["cycle", "time", "temp", "ctrl", "mut", "wt"]);
        Ok(())
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            merge_and_sort(Vec::new(), &ColumnFilter::default()),
            Err(PlateError::InvalidMergeInput(_))
        ));
        let missing = MergeInput::from(Path::new("/nonexistent/plate.csv"));
        assert!(matches!(missing.resolve(), Err(PlateError::InvalidMergeInput(_))));
    }
}
