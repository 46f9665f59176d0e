//! Single time point analysis: regroup one row of construct/condition values
//! by condition, optionally subtracting a background construct.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::loader::parse_reading;
use crate::data::writer::{format_decimal, write_text};
use crate::error::{PlateError, Result};

const SEP: char = ';';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderOptions {
    /// Biological replicates per construct and condition.
    #[serde(default = "default_replicates")]
    pub replicates: usize,

    /// Report `mean - background, combined sd, n` instead of raw values.
    #[serde(default)]
    pub background_subtraction: bool,

    /// Constructs whose name contains this keyword form the background.
    #[serde(default = "default_background_keyword")]
    pub background_keyword: String,
}

fn default_replicates() -> usize {
    3
}

fn default_background_keyword() -> String {
    "only".to_string()
}

impl Default for ReorderOptions {
    fn default() -> Self {
        Self {
            replicates: default_replicates(),
            background_subtraction: false,
            background_keyword: default_background_keyword(),
        }
    }
}

/// Values grouped by condition, then construct, in first-seen order.
type Groups = Vec<(String, Vec<(String, Vec<String>)>)>;

/// Regroup a two-line semicolon table.
///
/// Line one holds `<construct>,<condition>` names (replicate copies carry a
/// `.1`, `.2` suffix on the condition), line two the matching values.
pub fn reorder_single_point(text: &str, options: &ReorderOptions) -> Result<String> {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    let values: Vec<&str> = lines.next().unwrap_or_default().split(SEP).collect();

    let mut pairs = Vec::new();
    for (idx, cell) in header.split(SEP).enumerate() {
        if cell.trim().is_empty() {
            continue;
        }
        let (construct, condition) = split_name(cell)?;
        let value = values.get(idx).map(|v| v.trim()).unwrap_or_default();
        pairs.push((construct, condition, value.to_string()));
    }

    let groups = group(&pairs, options.replicates);
    check_cardinality(&groups)?;
    info!(
        "Captured the conditions {}",
        groups.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>().join(", ")
    );

    let mut out = String::new();
    out.push(SEP);
    if let Some((_, constructs)) = groups.first() {
        for (construct, _) in constructs {
            out.push_str(construct);
            out.push_str(&SEP.to_string().repeat(options.replicates));
        }
    }
    out.push('\n');

    if options.background_subtraction {
        let (bg_mean, bg_sd) = background(&pairs, &options.background_keyword)?;
        for (condition, constructs) in &groups {
            out.push_str(condition);
            out.push(SEP);
            for (construct, raw) in constructs {
                let numbers = parse_values(construct, raw)?;
                let mean = numbers.iter().mean() - bg_mean;
                let sd = (numbers.iter().std_dev().powi(2) + bg_sd.powi(2)).sqrt();
                let cells = [format_decimal(mean), format_decimal(sd), numbers.len().to_string()];
                out.push_str(&cells.join(";"));
                out.push(SEP);
            }
            out.push('\n');
        }
    } else {
        for (condition, constructs) in &groups {
            out.push_str(condition);
            out.push(SEP);
            for value in constructs.iter().flat_map(|(_, raw)| raw) {
                out.push_str(value);
                out.push(SEP);
            }
            out.push('\n');
        }
    }
    Ok(out)
}

/// Reorder `in_file` and write `<stem>_reordered[_and_bg_corrected].<ext>`
/// next to it.
pub fn reorder_file(in_file: &Path, options: &ReorderOptions) -> Result<PathBuf> {
    let text = std::fs::read_to_string(in_file)?;
    let out = reorder_single_point(&text, options)?;

    let stem = in_file.file_stem().and_then(|s| s.to_str()).unwrap_or("reordered");
    let suffix = if options.background_subtraction {
        "_reordered_and_bg_corrected"
    } else {
        "_reordered"
    };
    let name = match in_file.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}{suffix}.{ext}"),
        None => format!("{stem}{suffix}"),
    };
    let path = in_file.with_file_name(name);
    write_text(&out, &path)?;
    info!("Reordered {} -> {}", in_file.display(), path.display());
    Ok(path)
}

fn split_name(cell: &str) -> Result<(String, String)> {
    let mut parts = cell.split(',');
    let (Some(construct), Some(condition), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(PlateError::MalformedHeader(cell.to_string()));
    };
    // Replicate copies are marked with ".1", ".2", … on the condition.
    let condition = condition.split('.').next().unwrap_or_default().trim();
    Ok((construct.trim().to_string(), condition.to_string()))
}

fn group(pairs: &[(String, String, String)], replicates: usize) -> Groups {
    let mut groups: Groups = Vec::new();
    for (construct, condition, value) in pairs {
        let idx = match groups.iter().position(|(c, _)| c == condition) {
            Some(idx) => idx,
            None => {
                groups.push((condition.clone(), Vec::new()));
                groups.len() - 1
            }
        };
        let constructs = &mut groups[idx].1;
        let cidx = match constructs.iter().position(|(c, _)| c == construct) {
            Some(cidx) => cidx,
            None => {
                constructs.push((construct.clone(), Vec::new()));
                constructs.len() - 1
            }
        };
        let values = &mut constructs[cidx].1;
        if values.len() < replicates {
            values.push(value.clone());
        } else {
            warn!("Overflow in replicates for {construct}, {condition}");
        }
    }
    groups
}

fn check_cardinality(groups: &Groups) -> Result<()> {
    let Some((_, first)) = groups.first() else {
        return Ok(());
    };
    for (condition, constructs) in groups {
        if constructs.len() != first.len() {
            return Err(PlateError::UnequalCardinality {
                what: format!("constructs in condition '{condition}' and in the first condition"),
                left: constructs.len(),
                right: first.len(),
            });
        }
    }
    Ok(())
}

fn background(pairs: &[(String, String, String)], keyword: &str) -> Result<(f64, f64)> {
    let mut pool = Vec::new();
    for (construct, _, value) in pairs.iter().filter(|(c, _, _)| c.contains(keyword)) {
        debug!("Added {construct} to background constructs.");
        pool.push(parse_values(construct, std::slice::from_ref(value))?[0]);
    }
    if pool.is_empty() {
        return Err(PlateError::EmptyBlankSet(format!(
            "no background construct contains '{keyword}'"
        )));
    }
    Ok((pool.iter().mean(), pool.iter().std_dev()))
}

fn parse_values(construct: &str, raw: &[String]) -> Result<Vec<f64>> {
    raw.iter()
        .map(|v| {
            parse_reading(v).ok_or_else(|| PlateError::MalformedReading {
                line: 2,
                column: construct.to_string(),
                token: v.clone(),
            })
        })
        .collect()
}
