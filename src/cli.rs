//! Command-line front end.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::config::{OutputFormat, PipelineConfig};
use crate::data::filter::ColumnFilter;
use crate::data::grammar::parse_well_spec;
use crate::data::writer::{preview, write_table, write_text};
use crate::dose_response::{summary_table, DoseResponseCurve};
use crate::labels::baptize_file;
use crate::merge::{merge_and_sort, MergeInput};
use crate::pipeline::{Pipeline, RunRequest, RunState};
use crate::reorder::reorder_file;

#[derive(Parser)]
#[command(name = "rusty-plate")]
#[command(about = "Plate reader time-series processing", version)]
pub struct Cli {
    /// Path to JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correct every `*results.txt` in a directory, then label and merge
    Run {
        /// Directory holding the intermediate result files
        work_dir: PathBuf,
        /// Directory of construct name files (enables labeling and merge)
        #[arg(short, long)]
        names: Option<PathBuf>,
        #[command(flatten)]
        correction: CorrectionArgs,
        /// Strip quotation marks from name files
        #[arg(long)]
        strip_quotes: bool,
        /// Format of the merged tables
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Correct a single intermediate result file
    Correct {
        file: PathBuf,
        #[command(flatten)]
        correction: CorrectionArgs,
    },

    /// Replace well coordinates in a table with construct names
    Baptize {
        data_file: PathBuf,
        name_file: PathBuf,
        /// Strip quotation marks from the name file
        #[arg(long)]
        strip_quotes: bool,
    },

    /// Merge labeled tables column-wise and sort the columns
    Merge {
        /// Labeled tables (.csv or .parquet)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output file (.csv or .parquet)
        #[arg(short, long)]
        output: PathBuf,
        /// Exclusion keywords, replacing the configured list
        #[arg(short, long)]
        exclude: Vec<String>,
        /// Print the first rows of the result
        #[arg(long)]
        preview: Option<usize>,
    },

    /// Regroup a single time point by condition
    Reorder {
        file: PathBuf,
        /// Replicates per construct and condition
        #[arg(short, long)]
        replicates: Option<usize>,
        /// Subtract the background constructs
        #[arg(short, long)]
        background: bool,
        /// Keyword marking background constructs
        #[arg(long)]
        keyword: Option<String>,
    },

    /// Summarize dose-response time courses (one CSV per construct)
    DoseResponse {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Minute of inducer addition
        #[arg(long)]
        induction_time: Option<f64>,
        /// Replicate columns per condition
        #[arg(short, long)]
        replicates: Option<usize>,
        /// Write the summary here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Expand a well specification, e.g. "H10:H12" or "12"
    Wells { spec: String },
}

#[derive(clap::Args)]
struct CorrectionArgs {
    /// Blank wells, e.g. "H10, H11, H12"
    #[arg(short, long)]
    blank_wells: Option<String>,
    /// Reporter name used in output file names
    #[arg(short, long)]
    reporter: Option<String>,
    /// Use the fixed OD blank instead of the measured one
    #[arg(long)]
    fixed_od_blank: bool,
    /// Do not blank-correct the reporter
    #[arg(long)]
    exclude_reporter_blank: bool,
}

impl CorrectionArgs {
    /// CLI flags override config values.
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(wells) = self.blank_wells {
            config.blank_wells = wells;
        }
        if let Some(reporter) = self.reporter {
            config.reporter_name = reporter;
        }
        config.correction.use_fixed_od_blank |= self.fixed_od_blank;
        config.correction.exclude_reporter_blank |= self.exclude_reporter_blank;
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_json(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            work_dir,
            names,
            correction,
            strip_quotes,
            format,
        } => {
            correction.apply(&mut config);
            config.labels.strip_quotation_marks |= strip_quotes;
            if let Some(format) = format {
                config.output.merged_format = format;
            }
            cmd_run(config, work_dir, names)
        }
        Commands::Correct { file, correction } => {
            correction.apply(&mut config);
            cmd_correct(config, &file)
        }
        Commands::Baptize {
            data_file,
            name_file,
            strip_quotes,
        } => {
            config.labels.strip_quotation_marks |= strip_quotes;
            let out = baptize_file(&data_file, &name_file, &config.labels)
                .with_context(|| format!("labeling {}", data_file.display()))?;
            println!("Wrote {}", out.display());
            Ok(())
        }
        Commands::Merge {
            inputs,
            output,
            exclude,
            preview,
        } => {
            if !exclude.is_empty() {
                config.merge = ColumnFilter::new(exclude);
            }
            cmd_merge(&config, inputs, &output, preview)
        }
        Commands::Reorder {
            file,
            replicates,
            background,
            keyword,
        } => {
            let mut options = config.reorder;
            options.replicates = replicates.unwrap_or(options.replicates);
            options.background_subtraction |= background;
            if let Some(keyword) = keyword {
                options.background_keyword = keyword;
            }
            let out = reorder_file(&file, &options)
                .with_context(|| format!("reordering {}", file.display()))?;
            println!("Wrote {}", out.display());
            Ok(())
        }
        Commands::DoseResponse {
            inputs,
            induction_time,
            replicates,
            output,
        } => {
            let mut options = config.dose_response;
            options.induction_time = induction_time.unwrap_or(options.induction_time);
            options.replicates = replicates.unwrap_or(options.replicates);
            let curves = inputs
                .iter()
                .map(|p| {
                    DoseResponseCurve::from_file(p, options.replicates)
                        .with_context(|| format!("reading {}", p.display()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let table = summary_table(&curves, &options)?;
            match output {
                Some(path) => {
                    write_text(&table, &path).with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{table}"),
            }
            Ok(())
        }
        Commands::Wells { spec } => {
            let wells = parse_well_spec(&spec)?;
            let names: Vec<String> = wells.iter().map(ToString::to_string).collect();
            println!("{}", names.join(", "));
            Ok(())
        }
    }
}

fn cmd_run(config: PipelineConfig, work_dir: PathBuf, names_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let request = RunRequest { work_dir, names_dir };
    let mut state = RunState::default();
    let result = Pipeline::new(config).run(&request, &mut state);

    println!("{}", state.report());
    let summary = result.with_context(|| format!("processing {}", request.work_dir.display()))?;
    for plate in &summary.plates {
        println!(
            "{}: OD blank {:.4}, reporter blank {:.2}",
            plate.barcode, plate.report.od_applied, plate.report.fu_applied
        );
    }
    Ok(())
}

fn cmd_correct(config: PipelineConfig, file: &Path) -> anyhow::Result<()> {
    let blank_wells = parse_well_spec(&config.blank_wells)?;
    let output = Pipeline::new(config)
        .correct_file(file, &blank_wells)
        .with_context(|| format!("correcting {}", file.display()))?;
    println!("Wrote {}", output.od_corrected.display());
    println!("Wrote {}", output.relative_corrected.display());
    Ok(())
}

fn cmd_merge(
    config: &PipelineConfig,
    inputs: Vec<PathBuf>,
    output: &Path,
    rows: Option<usize>,
) -> anyhow::Result<()> {
    if inputs.iter().any(|p| p == output) {
        bail!("output {} is also an input", output.display());
    }
    if inputs.len() == 1 {
        warn!("Only one input table, sorting without merging.");
    }
    let inputs: Vec<MergeInput> = inputs.into_iter().map(MergeInput::from).collect();
    let table = merge_and_sort(inputs, &config.merge)?;
    write_table(&table, output).with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {table} to {}", output.display());

    if let Some(rows) = rows {
        println!("{}", preview(&table, rows)?);
    }
    Ok(())
}
