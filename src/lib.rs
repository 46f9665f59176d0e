//! Plate reader time-series processing.
//!
//! This crate provides tools for:
//! - Locating the OD and reporter blocks of an intermediate reader export
//! - Blank correction and relative reporter units (RRU)
//! - Labeling wells with construct names and merging plates
//! - Regrouping single time points by condition
//! - Dose-response summaries (time delay, dynamic range)
//!
//! # Example
//!
//! ```no_run
//! use rusty_plate::correction::{correct_plate, CorrectionOptions};
//! use rusty_plate::data::{grammar::parse_well_spec, loader::load_plate, shape::LayoutRules};
//!
//! let mut plate = load_plate("1234_results.txt".as_ref(), &LayoutRules::default()).unwrap();
//! let blanks = parse_well_spec("H10:H12").unwrap();
//! let report = correct_plate(&mut plate, &blanks, &CorrectionOptions::default()).unwrap();
//! println!("OD blank: {}", report.od_applied);
//! ```

pub mod cli;
pub mod config;
pub mod correction;
pub mod data;
pub mod dose_response;
pub mod error;
pub mod labels;
pub mod merge;
pub mod pipeline;
pub mod reorder;

pub use config::PipelineConfig;
pub use error::{PlateError, Result};
pub use pipeline::{Pipeline, RunRequest, RunState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
