//! Dose-response summaries: pre-induction mean, induction time delay and
//! dynamic range of reporter time courses measured at several inducer
//! concentrations.

use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::loader::parse_reading;
use crate::data::writer::format_decimal;
use crate::error::{PlateError, Result};

const SEP: char = ';';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseResponseOptions {
    /// Minute at which the inducer was added.
    #[serde(default = "default_induction_time")]
    pub induction_time: f64,

    /// Replicate columns per condition.
    #[serde(default = "default_replicates")]
    pub replicates: usize,

    /// Fully induced condition, e.g. `"500 uM"`.
    #[serde(default = "default_high_condition")]
    pub high_condition: String,

    /// Uninduced condition, e.g. `"0 uM"`.
    #[serde(default = "default_low_condition")]
    pub low_condition: String,

    /// Minutes at which the dynamic range is reported.
    #[serde(default = "default_summary_times")]
    pub summary_times: Vec<f64>,
}

fn default_induction_time() -> f64 {
    220.0
}

fn default_replicates() -> usize {
    3
}

fn default_high_condition() -> String {
    "500 uM".to_string()
}

fn default_low_condition() -> String {
    "0 uM".to_string()
}

fn default_summary_times() -> Vec<f64> {
    vec![840.0, 1120.0]
}

impl Default for DoseResponseOptions {
    fn default() -> Self {
        Self {
            induction_time: default_induction_time(),
            replicates: default_replicates(),
            high_condition: default_high_condition(),
            low_condition: default_low_condition(),
            summary_times: default_summary_times(),
        }
    }
}

/// One time course: per time point, the replicate values of every condition.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseResponseCurve {
    pub name: String,
    pub conditions: Vec<String>,
    /// `(minute, values[condition][replicate])` in file order.
    pub points: Vec<(f64, Vec<Vec<f64>>)>,
}

impl DoseResponseCurve {
    /// Parse a semicolon table whose header names the conditions after one
    /// leading cell, and whose rows hold a time followed by
    /// `conditions × replicates` values.
    pub fn parse(name: &str, text: &str, replicates: usize) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let Some((_, header)) = lines.next() else {
            return Err(PlateError::EmptyTable(name.to_string()));
        };
        let conditions: Vec<String> = header
            .split(SEP)
            .skip(1)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        let mut points: Vec<(f64, Vec<Vec<f64>>)> = Vec::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            let mut cells: Vec<&str> = line.split(SEP).map(str::trim).collect();
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            let time = parse_cell(cells.first().copied().unwrap_or_default(), line_no, "time")?;
            let values = &cells[1..];
            if replicates == 0 || values.len() != conditions.len() * replicates {
                return Err(PlateError::UnequalCardinality {
                    what: format!("values on line {line_no} and conditions × replicates"),
                    left: values.len(),
                    right: conditions.len() * replicates,
                });
            }

            let mut by_condition = Vec::with_capacity(conditions.len());
            for (condition, chunk) in conditions.iter().zip(values.chunks(replicates)) {
                let parsed = chunk
                    .iter()
                    .map(|v| parse_cell(v, line_no, condition))
                    .collect::<Result<Vec<f64>>>()?;
                by_condition.push(parsed);
            }

            // A repeated time point replaces the earlier row in place.
            match points.iter_mut().find(|(t, _)| *t == time) {
                Some(point) => point.1 = by_condition,
                None => points.push((time, by_condition)),
            }
        }

        if points.is_empty() {
            return Err(PlateError::EmptyTable(name.to_string()));
        }
        debug!("{name}: {} conditions, {} time points", conditions.len(), points.len());
        Ok(Self {
            name: name.to_string(),
            conditions,
            points,
        })
    }

    /// Read a curve from a file; its stem becomes the curve name.
    pub fn from_file(path: &Path, replicates: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        Self::parse(name, &text, replicates)
    }

    /// Index of the time point closest to `minute`; ties keep the earlier one.
    fn closest(&self, minute: f64) -> usize {
        let mut best = 0;
        let mut best_diff = f64::INFINITY;
        for (idx, (t, _)) in self.points.iter().enumerate() {
            let diff = (minute - t).abs();
            if diff < best_diff {
                best = idx;
                best_diff = diff;
            }
        }
        best
    }

    /// Column of `name`. Falls back to the bare concentration, so `"500 uM"`
    /// also finds a condition headed `"500"`.
    fn condition(&self, name: &str) -> Result<usize> {
        if let Some(idx) = self.conditions.iter().position(|c| c == name) {
            return Ok(idx);
        }
        let bare = name.split_whitespace().next().unwrap_or_default();
        self.conditions
            .iter()
            .position(|c| c == bare)
            .ok_or_else(|| PlateError::UnknownCondition {
                curve: self.name.clone(),
                condition: name.to_string(),
            })
    }

    /// Mean over every value of every condition at the point closest to the
    /// induction time.
    pub fn mean_before_induction(&self, options: &DoseResponseOptions) -> f64 {
        let (_, values) = &self.points[self.closest(options.induction_time)];
        values.iter().flatten().mean()
    }

    /// Minutes from induction until the high condition first reaches twice
    /// the pre-induction mean. `None` if it never does.
    pub fn time_delay(&self, options: &DoseResponseOptions) -> Result<Option<f64>> {
        let threshold = 2.0 * self.mean_before_induction(options);
        let high = self.condition(&options.high_condition)?;
        let reached = self
            .points
            .iter()
            .find(|(t, values)| *t > options.induction_time && values[high].iter().mean() >= threshold)
            .map(|(t, _)| t - options.induction_time);
        if reached.is_none() {
            info!("{}: response never doubled after induction", self.name);
        }
        Ok(reached)
    }

    /// Ratio of high to low condition means at the point closest to `minute`.
    /// `NaN` when the low mean is zero.
    pub fn dynamic_range_at(&self, minute: f64, options: &DoseResponseOptions) -> Result<f64> {
        let (_, values) = &self.points[self.closest(minute)];
        let high = values[self.condition(&options.high_condition)?].iter().mean();
        let low = values[self.condition(&options.low_condition)?].iter().mean();
        Ok(if low == 0.0 { f64::NAN } else { high / low })
    }
}

/// Summary table with one row per curve: name, rounded pre-induction mean,
/// time delay in minutes (`-1` if never reached) and the dynamic range at
/// every summary time, rounded to two decimals.
pub fn summary_table(curves: &[DoseResponseCurve], options: &DoseResponseOptions) -> Result<String> {
    let mut header = vec![
        "Name".to_string(),
        "Mean Before Induction".to_string(),
        "Time Delay [min]".to_string(),
    ];
    header.extend(options.summary_times.iter().map(|t| format!("Dynamic Range at t={t}")));

    let mut out = header.join(&SEP.to_string());
    out.push('\n');
    for curve in curves {
        let mut row = vec![
            curve.name.clone(),
            format_decimal(curve.mean_before_induction(options).round()),
            format_decimal(curve.time_delay(options)?.map_or(-1.0, f64::round)),
        ];
        for &minute in &options.summary_times {
            let range = curve.dynamic_range_at(minute, options)?;
            row.push(format_decimal((range * 100.0).round() / 100.0));
        }
        out.push_str(&row.join(&SEP.to_string()));
        out.push('\n');
    }
    Ok(out)
}

fn parse_cell(token: &str, line: usize, column: &str) -> Result<f64> {
    parse_reading(token).ok_or_else(|| PlateError::MalformedReading {
        line,
        column: column.to_string(),
        token: token.to_string(),
    })
}
