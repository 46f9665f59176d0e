use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use log::debug;
use parquet::arrow::ArrowWriter;

use super::model::{CanonicalTable, DataTable, PlateData};
use super::well::ColumnKey;
use crate::error::{PlateError, Result};

/// Field separator of every delimited file the pipeline writes.
pub const SEP: u8 = b';';

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Write a blank-corrected table for spreadsheet use.
///
/// Semicolon separated, every cell (header included) followed by `;`,
/// decimal comma.
pub fn write_corrected(table: &CanonicalTable, path: &Path) -> Result<()> {
    write_csv(&table.to_data_table(), path)?;
    debug!("Wrote {} cycles to {}", table.cycles(), path.display());
    Ok(())
}

/// Write a labeled or merged table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – same convention as [`write_corrected`]
/// * `.parquet`      – one nullable Float64 column per table column
pub fn write_table(table: &DataTable, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => write_csv(table, path),
        "parquet" | "pq" => write_parquet(table, path),
        other => Err(PlateError::InvalidMergeInput(format!(
            "unsupported output extension '.{other}' for {}",
            path.display()
        ))),
    }
}

/// Render a reading with the regional decimal comma. `NaN` becomes empty.
pub fn format_decimal(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string().replace('.', ",")
    }
}

/// Pretty-print the first `rows` rows of a table.
pub fn preview(table: &DataTable, rows: usize) -> Result<String> {
    let batch = to_record_batch(table, rows.min(table.len()))?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn write_csv(table: &DataTable, path: &Path) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(SEP)
        .flexible(true)
        .from_writer(file);

    let mut header: Vec<&str> = table.names().iter().map(String::as_str).collect();
    header.push("");
    writer.write_record(&header)?;

    for i in 0..table.len() {
        let mut cells: Vec<String> = table.row(i).into_iter().map(format_decimal).collect();
        cells.push(String::new());
        writer.write_record(&cells)?;
    }

    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn to_record_batch(table: &DataTable, rows: usize) -> Result<RecordBatch> {
    let fields: Vec<Field> = table
        .names()
        .iter()
        .map(|name| Field::new(name, DataType::Float64, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .map(|column| {
            let values: Float64Array = column
                .iter()
                .take(rows)
                .map(|v| (!v.is_nan()).then_some(*v))
                .collect();
            Arc::new(values) as ArrayRef
        })
        .collect();

    Ok(RecordBatch::try_new(schema, arrays)?)
}

fn write_parquet(table: &DataTable, path: &Path) -> Result<()> {
    let batch = to_record_batch(table, table.len())?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Intermediate format
// ---------------------------------------------------------------------------

const INTERMEDIATE_AXIS: [&str; 3] = ["Cycle", "Time [min]", "Temp. [deg. C]"];

/// Render a plate in the tab separated intermediate layout read by
/// [`load_plate`](super::loader::load_plate).
pub fn format_intermediate(plate: &PlateData, reporter: &str) -> String {
    let mut out = String::new();
    for (name, table) in [("OD600", &plate.od), (reporter, &plate.fu)] {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(name);
        out.push('\n');

        let header: Vec<String> = table
            .keys()
            .iter()
            .map(|key| match key {
                ColumnKey::Well(well) => well.to_string(),
                axis => INTERMEDIATE_AXIS[axis.position()].to_string(),
            })
            .collect();
        out.push_str(&header.join("\t"));
        out.push('\n');

        for cycle in 0..table.cycles() {
            let row = table.row(cycle).unwrap_or_default();
            let cells: Vec<String> = row.iter().map(f64::to_string).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
    }
    out
}

/// Line-oriented text output (baptized files, reorder results).
pub fn write_text(text: &str, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}
