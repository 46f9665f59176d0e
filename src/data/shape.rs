//! Locate the OD and reporter blocks inside an intermediate export.
//!
//! The export carries no line counts, so the blocks are found by scanning for
//! the `Cycle` header and counting the integer-led rows that follow it.

use std::ops::RangeInclusive;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{PlateError, Result};

/// Lines preceding the first OD data row (reporter name + header).
pub const PREAMBLE_LINES: usize = 2;

/// Distance from the last OD range line to the first reporter data row
/// (blank separator, reporter name, header).
pub const FU_BLOCK_OFFSET: usize = 3;

/// Literal that opens a block header.
pub const CYCLE_MARKER: &str = "Cycle";

/// Fixed offsets of the intermediate layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRules {
    #[serde(default = "default_preamble_lines")]
    pub preamble_lines: usize,
    #[serde(default = "default_fu_block_offset")]
    pub fu_block_offset: usize,
}

fn default_preamble_lines() -> usize {
    PREAMBLE_LINES
}

fn default_fu_block_offset() -> usize {
    FU_BLOCK_OFFSET
}

impl Default for LayoutRules {
    fn default() -> Self {
        Self {
            preamble_lines: PREAMBLE_LINES,
            fu_block_offset: FU_BLOCK_OFFSET,
        }
    }
}

/// Zero-based, inclusive line ranges of both blocks.
///
/// Each range spans `cycles + 1` lines: the data rows plus the line that
/// terminated the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeLayout {
    pub od: RangeInclusive<usize>,
    pub fu: RangeInclusive<usize>,
    pub cycles: usize,
}

/// Scan `lines` and return the last detected OD/reporter block pair.
///
/// Every `Cycle` line arms counting; the first line whose leading field is
/// not an integer closes the block. Later blocks overwrite earlier ones.
/// The result is checked against the header lines it implies.
pub fn detect_shape<S: AsRef<str>>(lines: &[S], rules: &LayoutRules) -> Result<ShapeLayout> {
    let mut counting = false;
    let mut cycles = 0usize;
    let mut detected: Option<ShapeLayout> = None;

    for (idx, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if counting {
            if leading_integer(line).is_some() {
                cycles += 1;
            } else {
                counting = false;
                if cycles > 0 {
                    let od_end = rules.preamble_lines + cycles;
                    let fu_start = od_end + rules.fu_block_offset;
                    debug!("block of {cycles} cycles closed at line {idx}");
                    detected = Some(ShapeLayout {
                        od: rules.preamble_lines..=od_end,
                        fu: fu_start..=fu_start + cycles,
                        cycles,
                    });
                }
            }
        }
        if line.starts_with(CYCLE_MARKER) {
            counting = true;
            // Each section counts its own rows; counts are not carried over.
            cycles = 0;
        }
    }

    let layout = detected.ok_or_else(|| {
        PlateError::ShapeNotDetected("no 'Cycle' header followed by numbered rows".into())
    })?;
    validate(lines, rules, &layout)?;
    Ok(layout)
}

fn leading_integer(line: &str) -> Option<i64> {
    line.split_whitespace().next()?.parse().ok()
}

fn validate<S: AsRef<str>>(lines: &[S], rules: &LayoutRules, layout: &ShapeLayout) -> Result<()> {
    let is_header = |idx: Option<usize>| {
        idx.and_then(|i| lines.get(i))
            .is_some_and(|l| l.as_ref().starts_with(CYCLE_MARKER))
    };

    if !is_header(rules.preamble_lines.checked_sub(1)) {
        return Err(PlateError::ShapeNotDetected(format!(
            "expected the OD header on line {}",
            rules.preamble_lines
        )));
    }
    let fu_start = *layout.fu.start();
    if !is_header(fu_start.checked_sub(1)) {
        return Err(PlateError::ShapeNotDetected(format!(
            "expected the reporter header on line {fu_start}"
        )));
    }
    if fu_start + layout.cycles > lines.len() {
        return Err(PlateError::ShapeNotDetected(format!(
            "reporter block is shorter than {} cycles",
            layout.cycles
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(cycles: usize) -> Vec<String> {
        let mut lines = vec!["OD600".to_string(), "Cycle\tTime [min]\tTemp. [deg. C]\tA1".to_string()];
        for c in 0..cycles {
            lines.push(format!("{c}\t{}\t30.1\t0.1", c * 10));
        }
        lines.push(String::new());
        lines.push("lux".into());
        lines.push("Cycle\tTime [min]\tTemp. [deg. C]\tA1".into());
        for c in 0..cycles {
            lines.push(format!("{c}\t{}\t30.1\t120", c * 10));
        }
        lines
    }

    #[test]
    fn test_detects_both_blocks() {
        let layout = detect_shape(&export(5), &LayoutRules::default()).unwrap();
        assert_eq!(layout.cycles, 5);
        assert_eq!(layout.od, 2..=7);
        assert_eq!(layout.fu, 10..=15);
        assert_eq!(layout.od.clone().count(), 6);
        assert_eq!(layout.fu.clone().count(), 6);
    }

    #[test]
    fn test_trailing_blank_line_keeps_layout() {
        let mut lines = export(3);
        lines.push(String::new());
        let layout = detect_shape(&lines, &LayoutRules::default()).unwrap();
        assert_eq!(layout.od, 2..=5);
        assert_eq!(layout.fu, 8..=11);
    }

    #[test]
    fn test_last_block_pair_wins() {
        let mut lines = export(2);
        lines.push(String::new());
        lines.push("lux".into());
        lines.push("Cycle\tTime".into());
        for c in 0..4 {
            lines.push(format!("{c}\t0\t30"));
        }
        lines.push(String::new());
        // The last block (4 rows) overwrites the earlier detection and no
        // longer lines up with the reporter header.
        assert!(matches!(
            detect_shape(&lines, &LayoutRules::default()),
            Err(PlateError::ShapeNotDetected(_))
        ));
    }

    #[test]
    fn test_cycle_count_restarts_per_section() {
        // A closed reporter section must report its own 3 rows, not 3 + 3.
        let mut lines = export(3);
        lines.push("end of export".into());
        let layout = detect_shape(&lines, &LayoutRules::default()).unwrap();
        assert_eq!(layout.cycles, 3);
        assert_eq!(layout.fu, 8..=11);
    }

    #[test]
    fn test_missing_marker_fails() {
        let lines = ["OD600", "no header here", "0\t1\t2"];
        assert!(matches!(
            detect_shape(&lines, &LayoutRules::default()),
            Err(PlateError::ShapeNotDetected(_))
        ));
    }

    #[test]
    fn test_misplaced_header_fails() {
        let mut lines = export(2);
        lines.insert(0, "extra preamble".into());
        assert!(detect_shape(&lines, &LayoutRules::default()).is_err());
        let rules = LayoutRules {
            preamble_lines: 3,
            fu_block_offset: FU_BLOCK_OFFSET,
        };
        let layout = detect_shape(&lines, &rules).unwrap();
        assert_eq!(layout.od, 3..=5);
    }

    #[test]
    fn test_truncated_reporter_block_fails() {
        let mut lines = export(4);
        lines.truncate(lines.len() - 2);
        assert!(detect_shape(&lines, &LayoutRules::default()).is_err());
    }
}
