//! Blank correction and relative reporter units.
//!
//! Blank means are pooled over every reading of every blank well and all
//! cycles, then subtracted uniformly. Drift of the blank over time is not
//! modeled.

use log::info;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::model::{CanonicalTable, PlateData};
use crate::data::well::Well;
use crate::error::{PlateError, Result};

/// OD blank assumed when no clean blank wells are available.
pub const FIXED_OD_BLANK: f64 = 0.04;

/// Pooled statistics of the blank wells of one table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlankStatistic {
    pub mean: f64,
    /// Sample standard deviation, `NaN` for a single reading.
    pub std_dev: f64,
    pub readings: usize,
}

/// Switches for the correction step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionOptions {
    /// Replace the measured OD blank by `fixed_od_blank`. Experimental; only
    /// meant for runs without usable blank wells.
    #[serde(default)]
    pub use_fixed_od_blank: bool,

    #[serde(default = "default_fixed_od_blank")]
    pub fixed_od_blank: f64,

    /// Skip blank subtraction for the reporter (e.g. enzymatic luminescence
    /// without chemical background).
    #[serde(default)]
    pub exclude_reporter_blank: bool,
}

fn default_fixed_od_blank() -> f64 {
    FIXED_OD_BLANK
}

impl Default for CorrectionOptions {
    fn default() -> Self {
        Self {
            use_fixed_od_blank: false,
            fixed_od_blank: FIXED_OD_BLANK,
            exclude_reporter_blank: false,
        }
    }
}

/// What a correction run measured and applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionReport {
    pub od_blank: BlankStatistic,
    pub fu_blank: BlankStatistic,
    /// Value subtracted from OD readings.
    pub od_applied: f64,
    /// Value subtracted from reporter readings.
    pub fu_applied: f64,
}

/// Pool all readings of `blank_wells` across cycles and average them.
pub fn collect_blanks(table: &CanonicalTable, blank_wells: &[Well]) -> Result<BlankStatistic> {
    if blank_wells.is_empty() {
        return Err(PlateError::EmptyBlankSet("no blank wells given".into()));
    }

    let mut pooled = Vec::with_capacity(blank_wells.len() * table.cycles());
    for well in blank_wells {
        let readings = table
            .well(*well)
            .ok_or_else(|| PlateError::EmptyBlankSet(format!("blank well {well} is not in the table")))?;
        pooled.extend_from_slice(readings);
    }
    if pooled.is_empty() {
        return Err(PlateError::EmptyBlankSet("blank wells hold no readings".into()));
    }

    Ok(BlankStatistic {
        mean: pooled.iter().mean(),
        std_dev: pooled.iter().std_dev(),
        readings: pooled.len(),
    })
}

/// OD blank actually subtracted.
pub fn resolve_blank_value(measured: f64, use_fixed_od: bool, fixed_od: f64) -> f64 {
    if use_fixed_od {
        fixed_od
    } else {
        measured
    }
}

/// Reporter blank actually subtracted.
pub fn resolve_reporter_blank(measured: f64, exclude_reporter_blank: bool) -> f64 {
    if exclude_reporter_blank {
        0.0
    } else {
        measured
    }
}

/// Subtract `blank` from every well reading, flooring at zero.
pub fn correct(table: &mut CanonicalTable, blank: f64) -> Result<()> {
    table.map_wells(|_, _, value| (value - blank).max(0.0))
}

/// Overwrite `fu` with `fu / od` per well and cycle.
///
/// A zero OD yields `0`, which cannot be told apart from a true zero signal.
pub fn relativize(od: &CanonicalTable, fu: &mut CanonicalTable) -> Result<()> {
    if od.cycles() != fu.cycles() || od.keys() != fu.keys() {
        return Err(PlateError::CycleCountMismatch {
            column: "reporter table".into(),
            expected: od.cycles(),
            found: fu.cycles(),
        });
    }
    fu.map_wells(|well, cycle, value| {
        let denominator = od.well(well).map_or(0.0, |col| col[cycle]);
        relative(value, denominator)
    })
}

fn relative(fu: f64, od: f64) -> f64 {
    if od == 0.0 {
        0.0
    } else {
        fu / od
    }
}

/// Run the full correction on one plate.
///
/// Blank statistics come from the raw readings; OD is corrected before the
/// reporter is relativized against it. Afterwards `plate.fu` holds RRU.
pub fn correct_plate(
    plate: &mut PlateData,
    blank_wells: &[Well],
    options: &CorrectionOptions,
) -> Result<CorrectionReport> {
    let od_blank = collect_blanks(&plate.od, blank_wells)?;
    let fu_blank = collect_blanks(&plate.fu, blank_wells)?;

    let od_applied = resolve_blank_value(od_blank.mean, options.use_fixed_od_blank, options.fixed_od_blank);
    if options.use_fixed_od_blank {
        info!("Using fixed value for OD correction ({od_applied}) instead of blank from data.");
    } else {
        info!(
            "Determined {} as blank for OD (sd {:.4}, n = {}).",
            od_blank.mean, od_blank.std_dev, od_blank.readings
        );
    }

    let fu_applied = resolve_reporter_blank(fu_blank.mean, options.exclude_reporter_blank);
    if options.exclude_reporter_blank {
        info!("Excluded blank correction for reporter values.");
    } else {
        info!(
            "Determined {} as blank for reporter values (sd {:.4}, n = {}).",
            fu_blank.mean, fu_blank.std_dev, fu_blank.readings
        );
    }

    correct(&mut plate.od, od_applied)?;
    correct(&mut plate.fu, fu_applied)?;
    relativize(&plate.od, &mut plate.fu)?;

    Ok(CorrectionReport {
        od_blank,
        fu_blank,
        od_applied,
        fu_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    use crate::data::grammar::parse_well_spec;
    use crate::data::well::ColumnKey;

    /// One-cycle table where `readings` are assigned to wells in order and
    /// every other well reads `fill`.
    fn table(readings: &[(&str, f64)], fill: f64) -> CanonicalTable {
        let mut row = vec![0.0, 0.0, 30.0];
        row.extend(std::iter::repeat(fill).take(96));
        for (name, value) in readings {
            let well: Well = name.parse().unwrap();
            row[3 + well.index()] = *value;
        }
        CanonicalTable::from_rows(&[row]).unwrap()
    }

    fn at(table: &CanonicalTable, well: &str) -> f64 {
        table.well(well.parse().unwrap()).unwrap()[0]
    }

    #[test]
    fn test_blank_scenario() {
        let blanks = parse_well_spec("H10,H11,H12").unwrap();
        let mut od = table(
            &[("H10", 0.05), ("H11", 0.06), ("H12", 0.04), ("A1", 0.20), ("A2", 0.03)],
            0.1,
        );
        let stat = collect_blanks(&od, &blanks).unwrap();
        assert_approx_eq!(stat.mean, 0.05);
        assert_eq!(stat.readings, 3);

        correct(&mut od, stat.mean).unwrap();
        assert_approx_eq!(at(&od, "A1"), 0.15);
        assert_eq!(at(&od, "A2"), 0.0);
    }

    #[test]
    fn test_blanks_pool_across_cycles() {
        let mut first = vec![0.0, 0.0, 30.0];
        first.extend(std::iter::repeat(0.1).take(96));
        let mut second = first.clone();
        second[0] = 1.0;
        second[3] = 0.3;
        let od = CanonicalTable::from_rows(&[first, second]).unwrap();
        let stat = collect_blanks(&od, &["A1".parse().unwrap()]).unwrap();
        assert_approx_eq!(stat.mean, 0.2);
        assert_eq!(stat.readings, 2);
    }

    #[test]
    fn test_empty_blank_set() {
        let od = table(&[], 0.1);
        assert!(matches!(collect_blanks(&od, &[]), Err(PlateError::EmptyBlankSet(_))));

        let narrow = CanonicalTable::from_rows(&[vec![0.0, 0.0, 30.0, 0.1]]).unwrap();
        assert!(matches!(
            collect_blanks(&narrow, &["H12".parse().unwrap()]),
            Err(PlateError::EmptyBlankSet(_))
        ));
    }

    #[test]
    fn test_resolve_blanks() {
        assert_eq!(resolve_blank_value(0.07, false, FIXED_OD_BLANK), 0.07);
        assert_eq!(resolve_blank_value(0.07, true, 0.045), 0.045);
        assert_eq!(resolve_reporter_blank(12.0, false), 12.0);
        assert_eq!(resolve_reporter_blank(12.0, true), 0.0);
    }

    #[test]
    fn test_correct_is_idempotent_with_zero_blank() {
        let mut od = table(&[("A1", 0.2), ("B1", 0.01)], 0.08);
        correct(&mut od, 0.05).unwrap();
        let once = od.clone();
        correct(&mut od, 0.0).unwrap();
        assert_eq!(od, once);
    }

    #[test]
    fn test_correct_never_negative_and_keeps_metadata() {
        let mut od = table(&[("A1", -0.5), ("C3", 0.01)], 0.02);
        correct(&mut od, 0.05).unwrap();
        assert!(od.wells().all(|w| od.well(w).unwrap().iter().all(|&v| v >= 0.0)));
        assert_eq!(od.column(ColumnKey::Temp).unwrap(), &[30.0]);
    }

    #[test]
    fn test_relativize_is_total() {
        let od = table(&[("A1", 0.5), ("A2", 0.0)], 0.25);
        let mut fu = table(&[("A1", 100.0), ("A2", 80.0)], 10.0);
        relativize(&od, &mut fu).unwrap();
        assert_eq!(at(&fu, "A1"), 200.0);
        assert_eq!(at(&fu, "A2"), 0.0);
        assert_eq!(at(&fu, "B1"), 40.0);
        assert!(fu.wells().all(|w| fu.well(w).unwrap()[0].is_finite()));
        assert_eq!(at(&od, "A1"), 0.5);
    }

    #[test]
    fn test_correct_plate_order_of_operations() {
        let blanks = parse_well_spec("H12").unwrap();
        let od = table(&[("H12", 0.05), ("A1", 0.25)], 0.05);
        let fu = table(&[("H12", 10.0), ("A1", 110.0)], 10.0);
        let mut plate = PlateData::new(od, fu).unwrap();

        let report = correct_plate(&mut plate, &blanks, &CorrectionOptions::default()).unwrap();
        assert_approx_eq!(report.od_applied, 0.05);
        assert_approx_eq!(report.fu_applied, 10.0);
        assert_approx_eq!(at(&plate.od, "A1"), 0.2);
        assert_approx_eq!(at(&plate.fu, "A1"), 500.0);
        // Blank wells end up at zero OD, so their RRU is zero as well.
        assert_eq!(at(&plate.fu, "H12"), 0.0);
    }

    #[test]
    fn test_correct_plate_with_fixed_and_excluded_blanks() {
        let blanks = parse_well_spec("H12").unwrap();
        let od = table(&[("H12", 0.09), ("A1", 0.24)], 0.1);
        let fu = table(&[("H12", 10.0), ("A1", 50.0)], 10.0);
        let mut plate = PlateData::new(od, fu).unwrap();
        let options = CorrectionOptions {
            use_fixed_od_blank: true,
            fixed_od_blank: 0.04,
            exclude_reporter_blank: true,
        };

        let report = correct_plate(&mut plate, &blanks, &options).unwrap();
        assert_approx_eq!(report.od_blank.mean, 0.09);
        assert_eq!(report.od_applied, 0.04);
        assert_eq!(report.fu_applied, 0.0);
        assert_approx_eq!(at(&plate.od, "A1"), 0.2);
        assert_approx_eq!(at(&plate.fu, "A1"), 250.0);
    }
}
