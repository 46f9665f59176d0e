//! Construct labeling ("baptize"): replace well coordinates in table headers
//! with the construct names of a plate-shaped name file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::well::{Well, COLUMNS, ROWS};
use crate::data::writer::write_text;
use crate::error::Result;

const SEP: char = ';';

/// Options for reading name files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOptions {
    /// Remove every `"` from the name file before parsing.
    #[serde(default)]
    pub strip_quotation_marks: bool,
}

// ---------------------------------------------------------------------------
// LabelMap
// ---------------------------------------------------------------------------

/// Well → construct label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap(BTreeMap<Well, String>);

impl LabelMap {
    pub fn get(&self, well: Well) -> Option<&str> {
        self.0.get(&well).map(String::as_str)
    }

    fn insert(&mut self, well: Well, label: impl Into<String>) {
        self.0.insert(well, label.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label for a cell whose text is exactly a canonical well name.
    fn for_cell(&self, cell: &str) -> Option<&str> {
        let well: Well = cell.parse().ok()?;
        (well.to_string() == cell).then(|| self.get(well)).flatten()
    }
}

/// Parse a name grid: rows starting with a row letter `A`–`H` give the
/// labels of columns 1–12 of that row. Every other row is ignored.
pub fn build_label_map(grid: &str) -> LabelMap {
    let mut map = LabelMap::default();
    for line in grid.lines() {
        let cells: Vec<&str> = line.split(SEP).collect();
        let Some(row) = cells
            .first()
            .and_then(|first| row_index(first.trim()))
        else {
            continue;
        };
        for column in 1..=COLUMNS {
            let (Some(cell), Some(well)) = (cells.get(column as usize), Well::new(row, column)) else {
                continue;
            };
            map.insert(well, cell.trim());
        }
    }
    debug!("Read {} construct labels", map.len());
    map
}

fn row_index(cell: &str) -> Option<u8> {
    let mut chars = cell.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    ROWS.iter().position(|&r| r == letter).map(|p| p as u8)
}

/// Substitute well-coordinate cells of a semicolon table with their labels.
///
/// Unmapped cells are trimmed and passed through. Every output line ends
/// with `\n`.
pub fn apply_labels(text: &str, labels: &LabelMap) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let cells: Vec<&str> = line
            .split(SEP)
            .map(|cell| labels.for_cell(cell).unwrap_or_else(|| cell.trim()))
            .collect();
        out.push_str(&cells.join(";"));
        out.push('\n');
    }
    out
}

/// Clean up a name file before parsing.
///
/// Spreadsheet exports sometimes separate cells with tabs instead of `;`;
/// those are converted, with a warning.
pub fn normalize_name_file(text: &str, options: &LabelOptions) -> String {
    let mut text = if options.strip_quotation_marks {
        text.replace('"', "")
    } else {
        text.to_string()
    };

    let tab_separated = text
        .lines()
        .find(|l| l.contains(SEP) || l.contains('\t'))
        .is_some_and(|l| !l.contains(SEP));
    if tab_separated {
        warn!("Name file is tab separated, converting tabs to '{SEP}'.");
        text = text.replace('\t', ";");
    }
    text
}

/// Path of the baptized copy of `data_file`: `<stem>_bap.csv` alongside it.
pub fn baptized_path(data_file: &Path) -> PathBuf {
    let name = data_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or(name);
    data_file.with_file_name(format!("{stem}_bap.csv"))
}

/// Label `data_file` with the constructs of `name_file`; returns the path
/// written.
pub fn baptize_file(data_file: &Path, name_file: &Path, options: &LabelOptions) -> Result<PathBuf> {
    let grid = normalize_name_file(&std::fs::read_to_string(name_file)?, options);
    let labels = build_label_map(&grid);
    if labels.is_empty() {
        warn!("{} holds no rows starting with A-H, nothing to label.", name_file.display());
    }
    let data = std::fs::read_to_string(data_file)?;

    let out = baptized_path(data_file);
    write_text(&apply_labels(&data, &labels), &out)?;
    debug!(
        "Baptized {} with {} -> {}",
        data_file.display(),
        name_file.display(),
        out.display()
    );
    Ok(out)
}
