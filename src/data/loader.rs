use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::Path;

use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{CanonicalTable, DataTable, PlateData};
use super::shape::{detect_shape, LayoutRules};
use super::well::{ColumnKey, CANONICAL_WIDTH};
use crate::error::{PlateError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the OD and reporter tables of one intermediate result file.
///
/// Expected layout (tab separated):
///
/// ```text
/// OD600
/// Cycle  Time [min]  Temp. [deg. C]  A1 … H12
/// 0      0.0         30.1            0.051 …
/// …
///
/// lux
/// Cycle  Time [min]  Temp. [deg. C]  A1 … H12
/// 0      0.0         30.1            1204 …
/// ```
pub fn load_plate(path: &Path, rules: &LayoutRules) -> Result<PlateData> {
    let text = std::fs::read_to_string(path)?;
    let plate = load_plate_from_str(&text, rules)?;
    info!(
        "Loaded {} cycles x {} columns from {}",
        plate.cycles(),
        plate.od.width(),
        path.display()
    );
    Ok(plate)
}

/// Same as [`load_plate`] for text already in memory.
pub fn load_plate_from_str(text: &str, rules: &LayoutRules) -> Result<PlateData> {
    let lines: Vec<&str> = text.lines().collect();
    let layout = detect_shape(&lines, rules)?;
    debug!("OD rows {:?}, reporter rows {:?}", layout.od, layout.fu);

    let od = load_block(&lines, &layout.od)?;
    let fu = load_block(&lines, &layout.fu)?;
    PlateData::new(od, fu)
}

/// Parse a single reading. Accepts `.` or `,` as decimal separator.
pub fn parse_reading(token: &str) -> Option<f64> {
    let normalized = token.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Block loader
// ---------------------------------------------------------------------------

/// Read every non-blank line of `range` into a canonical table.
fn load_block(lines: &[&str], range: &RangeInclusive<usize>) -> Result<CanonicalTable> {
    let mut table: Option<CanonicalTable> = None;

    for idx in range.clone() {
        let Some(line) = lines.get(idx) else {
            break;
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let expected = table.as_ref().map_or(fields.len(), |t| t.width());
        if fields.len() != expected || fields.len() > CANONICAL_WIDTH {
            return Err(PlateError::RowWidth {
                line: line_no,
                expected: expected.min(CANONICAL_WIDTH),
                found: fields.len(),
            });
        }

        let row = fields
            .iter()
            .enumerate()
            .map(|(pos, tok)| {
                parse_reading(tok).ok_or_else(|| PlateError::MalformedReading {
                    line: line_no,
                    column: ColumnKey::from_position(pos)
                        .map_or_else(|| pos.to_string(), |k| k.to_string()),
                    token: tok.to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        table
            .get_or_insert_with(|| CanonicalTable::with_width(row.len()))
            .push_row(&row)?;
    }

    Ok(table.unwrap_or_else(|| CanonicalTable::with_width(CANONICAL_WIDTH)))
}

// ---------------------------------------------------------------------------
// Labeled / merged tables
// ---------------------------------------------------------------------------

/// Prefix given to columns without a header name.
pub const UNNAMED_PREFIX: &str = "Unnamed";

/// Load a labeled table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – semicolon separated, header row, `,` or `.` decimals
/// * `.parquet`      – one numeric column per table column
pub fn load_table(path: &Path) -> Result<DataTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => load_table_csv(path),
        "parquet" | "pq" => load_table_parquet(path),
        other => Err(PlateError::InvalidMergeInput(format!(
            "unsupported table extension '.{other}' for {}",
            path.display()
        ))),
    }
}

/// Semicolon CSV as written by the correction and baptize steps.
///
/// Empty header cells become `Unnamed: <idx>`, repeated names get `.1`, `.2`
/// suffixes, and empty or missing cells read as `NaN`.
fn load_table_csv(path: &Path) -> Result<DataTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)?;
    let names = unique_names(reader.headers()?.iter());
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let cell = record.get(col_idx).unwrap_or("").trim();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                parse_reading(cell).ok_or_else(|| PlateError::MalformedReading {
                    line: row_no + 2,
                    column: names[col_idx].clone(),
                    token: cell.to_string(),
                })?
            };
            column.push(value);
        }
    }

    DataTable::new(names, columns)
}

/// Parquet file with numeric columns (any type castable to Float64).
fn load_table_parquet(path: &Path) -> Result<DataTable> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for batch_result in reader {
        let batch = batch_result?;
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let values = cast(batch.column(col_idx), &DataType::Float64)?;
            let values = values
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    PlateError::InvalidMergeInput(format!("column '{}' is not numeric", names[col_idx]))
                })?;
            column.extend((0..values.len()).map(|i| {
                if values.is_null(i) {
                    f64::NAN
                } else {
                    values.value(i)
                }
            }));
        }
    }

    DataTable::new(unique_names(names.iter().map(String::as_str)), columns)
}

/// Header names with blanks replaced and repeats disambiguated.
fn unique_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.enumerate()
        .map(|(idx, name)| {
            let name = name.trim();
            let base = if name.is_empty() {
                format!("{UNNAMED_PREFIX}: {idx}")
            } else {
                name.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    use crate::data::well::Well;

    fn header() -> String {
        let mut cols = vec!["Cycle".to_string(), "Time [min]".into(), "Temp. [deg. C]".into()];
        cols.extend(Well::all().map(|w| w.to_string()));
        cols.join("\t")
    }

    fn data_row(cycle: usize, reading: &str) -> String {
        let mut cells = vec![cycle.to_string(), format!("{}", cycle * 15), "30.2".to_string()];
        cells.extend(std::iter::repeat(reading.to_string()).take(96));
        cells.join("\t") + "\t"
    }

    fn export(cycles: usize, od: &str, fu: &str) -> String {
        let mut out = format!("OD600\n{}\n", header());
        for c in 0..cycles {
            out += &data_row(c, od);
            out += "\n";
        }
        out += &format!("\nlux\n{}\n", header());
        for c in 0..cycles {
            out += &data_row(c, fu);
            out += "\n";
        }
        out
    }

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("0,25"), Some(0.25));
        assert_eq!(parse_reading("0.25"), Some(0.25));
        assert_eq!(parse_reading("12"), Some(12.0));
        assert_eq!(parse_reading("3.502e+003"), Some(3502.0));
        assert_eq!(parse_reading("OVER"), None);
        assert_eq!(parse_reading("nan"), None);
    }

    #[test]
    fn test_load_synthetic_export() {
        let plate = load_plate_from_str(&export(4, "0,2", "150"), &LayoutRules::default()).unwrap();
        assert_eq!(plate.cycles(), 4);
        assert_eq!(plate.od.width(), 99);
        assert_eq!(plate.od.column(ColumnKey::Cycle).unwrap(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(plate.od.column(ColumnKey::Time).unwrap(), &[0.0, 15.0, 30.0, 45.0]);
        let a1: Well = "A1".parse().unwrap();
        assert_eq!(plate.od.well(a1).unwrap(), &[0.2; 4]);
        assert_eq!(plate.fu.well(a1).unwrap(), &[150.0; 4]);
    }

    #[test]
    fn test_malformed_reading_reports_position() {
        let text = export(2, "0.2", "150").replacen("\t0.2\t", "\tx.y\t", 1);
        match load_plate_from_str(&text, &LayoutRules::default()) {
            Err(PlateError::MalformedReading { line, column, token }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "A1");
                assert_eq!(token, "x.y");
            }
            other => panic!("expected malformed reading, got {other:?}"),
        }
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let text = export(2, "0.2", "150").replacen("\t0.2\t\n", "\t\n", 1);
        assert!(matches!(
            load_plate_from_str(&text, &LayoutRules::default()),
            Err(PlateError::RowWidth { .. })
        ));
    }

    #[test]
    fn test_load_table_csv() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
        writeln!(file, "cycle;time;temp;wt;wt;;")?;
        writeln!(file, "0;0;30,1;0,5;0,6;;")?;
        writeln!(file, "1;15;30,2;0,7")?;
        file.flush()?;

        let table = load_table(file.path())?;
        assert_eq!(
            table.names(),
            ["cycle", "time", "temp", "wt", "wt.1", "Unnamed: 5", "Unnamed: 6"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("wt").unwrap(), &[0.5, 0.7]);
        assert!(table.column("wt.1").unwrap()[1].is_nan());
        Ok(())
    }

    #[test]
    fn test_load_table_rejects_unknown_extension() {
        assert!(matches!(
            load_table(Path::new("plate.xlsx")),
            Err(PlateError::InvalidMergeInput(_))
        ));
    }

    #[test]
    fn test_load_plate_from_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}", export(3, "0.1", "90"))?;
        file.flush()?;

        let plate = load_plate(file.path(), &LayoutRules::default())?;
        assert_eq!(plate.cycles(), 3);
        assert_eq!(plate.fu.cycles(), 3);
        Ok(())
    }
}
