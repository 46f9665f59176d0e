//! Batch run over a working directory: correct every intermediate result
//! file, then optionally label and merge the plates.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::PipelineConfig;
use crate::correction::{correct_plate, CorrectionReport};
use crate::data::grammar::parse_well_spec;
use crate::data::loader::load_plate;
use crate::data::writer::{write_corrected, write_table};
use crate::data::Well;
use crate::error::{PlateError, Result};
use crate::labels::{baptize_file, baptized_path};
use crate::merge::{merge_and_sort, MergeInput};

/// Suffix identifying intermediate result files.
pub const RESULTS_SUFFIX: &str = "results.txt";

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Correction,
    Labeling,
    Merge,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Correction => write!(f, "correction"),
            Step::Labeling => write!(f, "labeling"),
            Step::Merge => write!(f, "merge"),
        }
    }
}

/// User-facing outcome of each step, independent of how it is shown.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    messages: BTreeMap<Step, String>,
}

impl RunState {
    pub fn set_status(&mut self, step: Step, message: impl Into<String>) {
        self.messages.insert(step, message.into());
    }

    pub fn status(&self, step: Step) -> Option<&str> {
        self.messages.get(&step).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// One `step: message` line per finished step.
    pub fn report(&self) -> String {
        self.messages
            .iter()
            .map(|(step, message)| format!("{step}: {message}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Store either `ok(value)` or the error text for `step`.
    fn record<T>(&mut self, step: Step, result: &Result<T>, ok: impl FnOnce(&T) -> String) {
        let message = match result {
            Ok(value) => ok(value),
            Err(e) => format!("failed: {e}"),
        };
        self.set_status(step, message);
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Directory holding `<barcode>_results.txt` files; outputs go here too.
    pub work_dir: PathBuf,
    /// Directory of construct name grids, one per plate. Enables labeling.
    pub names_dir: Option<PathBuf>,
}

/// Files written for one plate.
#[derive(Debug, Clone)]
pub struct PlateOutput {
    pub barcode: String,
    pub od_corrected: PathBuf,
    pub relative_corrected: PathBuf,
    pub report: CorrectionReport,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub plates: Vec<PlateOutput>,
    pub baptized: Vec<PathBuf>,
    pub merged: Vec<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Reporter name as used in file names.
    pub fn reporter_tag(&self) -> String {
        self.config
            .reporter_name
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect()
    }

    /// Run every step, recording a status line per step in `state`.
    pub fn run(&self, request: &RunRequest, state: &mut RunState) -> Result<RunSummary> {
        state.clear();

        let plates = self.correct_all(&request.work_dir);
        state.record(Step::Correction, &plates, |p| format!("corrected {} plate(s)", p.len()));
        let mut summary = RunSummary {
            plates: plates?,
            ..Default::default()
        };

        let Some(names_dir) = &request.names_dir else {
            info!("No name files given, skipping labeling and merge.");
            return Ok(summary);
        };

        let baptized = self.baptize_all(&summary.plates, names_dir);
        state.record(Step::Labeling, &baptized, |b| format!("labeled {} file(s)", b.len()));
        summary.baptized = baptized?;

        let merged = self.merge_all(&request.work_dir, &summary.plates);
        state.record(Step::Merge, &merged, |m| {
            let names: Vec<String> = m
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            format!("wrote {}", names.join(", "))
        });
        summary.merged = merged?;
        Ok(summary)
    }

    /// Blank-correct every result file in `work_dir`.
    pub fn correct_all(&self, work_dir: &Path) -> Result<Vec<PlateOutput>> {
        let files = discover_results(work_dir)?;
        let blank_wells = parse_well_spec(&self.config.blank_wells)?;
        info!("Blank wells: {}", self.config.blank_wells);

        files.iter().map(|file| self.correct_file(file, &blank_wells)).collect()
    }

    /// Correct one result file and write both corrected tables next to it.
    pub fn correct_file(&self, file: &Path, blank_wells: &[Well]) -> Result<PlateOutput> {
        let mut plate = load_plate(file, &self.config.layout)?;
        let report = correct_plate(&mut plate, blank_wells, &self.config.correction)?;

        let stem = file_stem(file);
        let od_corrected = file.with_file_name(format!("{stem}_OD_corrected.csv"));
        let relative_corrected =
            file.with_file_name(format!("{stem}_relative_{}_corrected.csv", self.reporter_tag()));
        write_corrected(&plate.od, &od_corrected)?;
        write_corrected(&plate.fu, &relative_corrected)?;
        info!("Wrote {} and {}", od_corrected.display(), relative_corrected.display());

        Ok(PlateOutput {
            barcode: barcode(file),
            od_corrected,
            relative_corrected,
            report,
        })
    }

    /// Pair plates with name files by sorted position and label the two
    /// corrected files of each plate.
    pub fn baptize_all(&self, plates: &[PlateOutput], names_dir: &Path) -> Result<Vec<PathBuf>> {
        let name_files = sorted_files(names_dir, |_| true)?;
        if name_files.len() != plates.len() {
            return Err(PlateError::UnequalCardinality {
                what: "name files and barcodes".into(),
                left: name_files.len(),
                right: plates.len(),
            });
        }

        let mut baptized = Vec::with_capacity(2 * plates.len());
        for (plate, name_file) in plates.iter().zip(&name_files) {
            info!("Labeling plate {} with {}", plate.barcode, name_file.display());
            for file in [&plate.od_corrected, &plate.relative_corrected] {
                baptized.push(baptize_file(file, name_file, &self.config.labels)?);
            }
        }
        Ok(baptized)
    }

    /// Merge (several plates) or sort (one plate) the labeled tables.
    pub fn merge_all(&self, work_dir: &Path, plates: &[PlateOutput]) -> Result<Vec<PathBuf>> {
        let ext = self.config.output.merged_format.extension();
        let reporter = self.reporter_tag();
        let prefix = if plates.len() > 1 { "all" } else { "sorted" };

        let targets = [
            (format!("{prefix}_OD.{ext}"), plates.iter().map(|p| &p.od_corrected).collect::<Vec<_>>()),
            (
                format!("{prefix}_relative_{reporter}.{ext}"),
                plates.iter().map(|p| &p.relative_corrected).collect(),
            ),
        ];

        let mut written = Vec::new();
        for (name, sources) in targets {
            let inputs: Vec<MergeInput> = sources
                .into_iter()
                .map(|p| MergeInput::from(baptized_path(p)))
                .collect();
            let table = merge_and_sort(inputs, &self.config.merge)?;
            if table.names().len() <= 3 {
                warn!("{name} holds no construct columns after filtering");
            }
            let out = work_dir.join(&name);
            write_table(&table, &out)?;
            info!("Wrote {} ({table})", out.display());
            written.push(out);
        }
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// File discovery
// ---------------------------------------------------------------------------

/// Intermediate result files in `dir`, sorted by name.
pub fn discover_results(dir: &Path) -> Result<Vec<PathBuf>> {
    let files = sorted_files(dir, |name| name.ends_with(RESULTS_SUFFIX))?;
    if files.is_empty() {
        return Err(PlateError::NoInputFiles(dir.to_path_buf()));
    }
    info!("Found {} result file(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// Plate barcode: the file stem without `_results`.
pub fn barcode(file: &Path) -> String {
    file_stem(file).replace("_results", "")
}

fn sorted_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && keep(file_name(&path)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|n| n.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::data::loader::load_table;
    use crate::data::model::{CanonicalTable, PlateData};
    use crate::data::writer::format_intermediate;

    /// Two-cycle plate: OD 0.25 everywhere except the blank column 12
    /// (0.05); reporter 110 except blanks (10).
    fn export() -> String {
        let row = |cycle: f64, value: f64, blank: f64| {
            let mut row = vec![cycle, cycle * 15.0, 30.0];
            for well in Well::all() {
                row.push(if well.column() == 12 { blank } else { value });
            }
            row
        };
        let od = CanonicalTable::from_rows(&[row(0.0, 0.25, 0.05), row(1.0, 0.25, 0.05)]).unwrap();
        let fu = CanonicalTable::from_rows(&[row(0.0, 110.0, 10.0), row(1.0, 110.0, 10.0)]).unwrap();
        format_intermediate(&PlateData::new(od, fu).unwrap(), "lux")
    }

    fn grid(label: &str) -> String {
        let mut out = String::from(";1;2;3;4;5;6;7;8;9;10;11;12\n");
        for row in crate::data::well::ROWS {
            out += &format!("{row};{label};{label}_2;;;;;;;;;;blank\n");
        }
        out
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            blank_wells: "12".into(),
            reporter_name: "lux light".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_barcode() {
        assert_eq!(barcode(Path::new("/data/4711_results.txt")), "4711");
        assert_eq!(barcode(Path::new("plate_results.txt")), "plate");
    }

    #[test]
    fn test_missing_input_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = RunState::default();
        let request = RunRequest {
            work_dir: dir.path().to_path_buf(),
            names_dir: None,
        };
        let result = Pipeline::new(config()).run(&request, &mut state);
        assert!(matches!(result, Err(PlateError::NoInputFiles(_))));
        assert!(state.status(Step::Correction).unwrap().starts_with("failed"));
    }

    #[test]
    fn test_correction_only_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("1111_results.txt"), export())?;

        let mut state = RunState::default();
        let request = RunRequest {
            work_dir: dir.path().to_path_buf(),
            names_dir: None,
        };
        let summary = Pipeline::new(config()).run(&request, &mut state)?;

        assert_eq!(summary.plates.len(), 1);
        let plate = &summary.plates[0];
        assert_eq!(plate.barcode, "1111");
        assert_eq!(
            plate.relative_corrected,
            dir.path().join("1111_results_relative_lux_light_corrected.csv")
        );
        let od = load_table(&plate.od_corrected)?;
        assert!((od.column("A1").unwrap()[0] - 0.2).abs() < 1e-9);
        let rru = load_table(&plate.relative_corrected)?;
        assert!((rru.column("A1").unwrap()[1] - 500.0).abs() < 1e-6);
        assert_eq!(state.status(Step::Correction), Some("corrected 1 plate(s)"));
        assert_eq!(state.status(Step::Merge), None);
        Ok(())
    }

    #[test]
    fn test_full_run_merges_plates() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let names = tempfile::tempdir()?;
        std::fs::write(dir.path().join("1111_results.txt"), export())?;
        std::fs::write(dir.path().join("2222_results.txt"), export())?;
        std::fs::write(names.path().join("a_plate.csv"), grid("wt"))?;
        std::fs::write(names.path().join("b_plate.csv"), grid("mut"))?;

        let mut state = RunState::default();
        let request = RunRequest {
            work_dir: dir.path().to_path_buf(),
            names_dir: Some(names.path().to_path_buf()),
        };
        let summary = Pipeline::new(config()).run(&request, &mut state)?;

        assert_eq!(summary.baptized.len(), 4);
        assert_eq!(
            summary.merged,
            [dir.path().join("all_OD.csv"), dir.path().join("all_relative_lux_light.csv")]
        );
        let merged = load_table(&summary.merged[0])?;
        assert_eq!(&merged.names()[..3], ["cycle", "time", "temp"]);
        assert!(merged.names().iter().any(|n| n == "mut"));
        assert!(merged.names().iter().any(|n| n == "wt_2"));
        assert!(!merged.names().iter().any(|n| n.contains("blank")));
        assert_eq!(merged.len(), 2);
        assert!(state.report().contains("merge: wrote all_OD.csv"));
        Ok(())
    }

    #[test]
    fn test_single_plate_is_sorted_to_parquet() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let names = tempfile::tempdir()?;
        std::fs::write(dir.path().join("1111_results.txt"), export())?;
        std::fs::write(names.path().join("plate.csv"), grid("wt"))?;

        let mut cfg = config();
        cfg.output.merged_format = OutputFormat::Parquet;
        let request = RunRequest {
            work_dir: dir.path().to_path_buf(),
            names_dir: Some(names.path().to_path_buf()),
        };
        let summary = Pipeline::new(cfg).run(&request, &mut RunState::default())?;
        assert_eq!(summary.merged[0], dir.path().join("sorted_OD.parquet"));
        assert!(load_table(&summary.merged[1])?.column("wt").is_some());
        Ok(())
    }

    #[test]
    fn test_barcode_prefixes_keep_their_own_labels() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let names = tempfile::tempdir()?;
        std::fs::write(dir.path().join("1_results.txt"), export())?;
        std::fs::write(dir.path().join("11_results.txt"), export())?;
        std::fs::write(names.path().join("a.csv"), grid("plateA"))?;
        std::fs::write(names.path().join("b.csv"), grid("plateB"))?;

        let request = RunRequest {
            work_dir: dir.path().to_path_buf(),
            names_dir: Some(names.path().to_path_buf()),
        };
        let summary = Pipeline::new(config()).run(&request, &mut RunState::default())?;
        assert_eq!(summary.baptized.len(), 4);

        // "11_results.txt" sorts before "1_results.txt" and gets a.csv.
        let labels_of = |barcode: &str| -> Result<Vec<String>> {
            let plate = summary.plates.iter().find(|p| p.barcode == barcode).unwrap();
            Ok(load_table(&baptized_path(&plate.od_corrected))?.names().to_vec())
        };
        let eleven = labels_of("11")?;
        let one = labels_of("1")?;
        assert!(eleven.iter().any(|n| n == "plateA"));
        assert!(!eleven.iter().any(|n| n.starts_with("plateB")));
        assert!(one.iter().any(|n| n == "plateB"));
        assert!(!one.iter().any(|n| n.starts_with("plateA")));

        let merged = load_table(&summary.merged[0])?;
        assert!(merged.names().iter().any(|n| n == "plateA"));
        assert!(merged.names().iter().any(|n| n == "plateB"));
        Ok(())
    }

    #[test]
    fn test_name_file_count_must_match() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let names = tempfile::tempdir()?;
        std::fs::write(dir.path().join("1111_results.txt"), export())?;
        std::fs::write(names.path().join("a.csv"), grid("wt"))?;
        std::fs::write(names.path().join("b.csv"), grid("mut"))?;

        let mut state = RunState::default();
        let request = RunRequest {
            work_dir: dir.path().to_path_buf(),
            names_dir: Some(names.path().to_path_buf()),
        };
        let result = Pipeline::new(config()).run(&request, &mut state);
        assert!(matches!(
            result,
            Err(PlateError::UnequalCardinality { left: 2, right: 1, .. })
        ));
        assert!(state.status(Step::Labeling).unwrap().contains("unequal numbers"));
        Ok(())
    }
}
