use crate::error::{Result, ResultExt};
use crate::pipeline::FillResult;
use crate::provenance::FillRecord;
use crate::types::ObservationMatrix;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Convert a matrix back to a table: date column first, then stations in
/// input order.
pub fn filled_to_dataframe(matrix: &ObservationMatrix) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(matrix.n_stations() + 1);
    columns.push(Series::new(matrix.date_column().into(), matrix.timestamps()).into());
    for (idx, name) in matrix.stations().iter().enumerate() {
        columns.push(Series::new(name.as_str().into(), matrix.column(idx)).into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Sibling `.log` path of an output table.
pub fn log_path_for(csv_path: impl AsRef<Path>) -> PathBuf {
    csv_path.as_ref().with_extension("log")
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context(format!("Could not create {}", parent.display()))?;
    }
    Ok(())
}

/// Write the filled table as CSV.
pub fn write_filled_csv(matrix: &ObservationMatrix, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut df = filled_to_dataframe(matrix)?;

    ensure_parent(path)?;
    let mut file = File::create(path).context(format!("Could not create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)
        .context(format!("Failed to write {}", path.display()))?;

    info!("Filled table saved: {}", path.display());
    Ok(())
}

/// Write one provenance line per originally-missing cell.
pub fn write_provenance_log(record: &FillRecord, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let file = File::create(path).context(format!("Could not create {}", path.display()))?;
    record
        .write_log(BufWriter::new(file))
        .context(format!("Failed to write {}", path.display()))?;

    info!("Provenance log saved: {}", path.display());
    Ok(())
}

/// Write the filled table to `csv_path` and its log next to it.
///
/// Returns the log path.
pub fn write_outputs(result: &FillResult, csv_path: impl AsRef<Path>) -> Result<PathBuf> {
    let csv_path = csv_path.as_ref();
    write_filled_csv(&result.filled, csv_path)?;
    let log_path = log_path_for(csv_path);
    write_provenance_log(&result.record, &log_path)?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{load_csv, observations_from_dataframe};
    use crate::provenance::{DonorTrail, UnfilledReason};
    use crate::types::CellKey;
    use pretty_assertions::assert_eq;

    fn matrix() -> ObservationMatrix {
        ObservationMatrix::new(
            "date",
            vec!["2001-01-01".into(), "2001-01-02".into()],
            vec!["B".into(), "A".into()],
            vec![vec![Some(1.5), None], vec![Some(0.0), Some(2.25)]],
        )
        .unwrap()
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rain_gapfill_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_filled_to_dataframe_keeps_column_order() {
        let df = filled_to_dataframe(&matrix()).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["date", "B", "A"]);
        assert_eq!(df.column("B").unwrap().null_count(), 1);
    }

    #[test]
    fn test_log_path_for() {
        assert_eq!(log_path_for("out/filled.csv"), PathBuf::from("out/filled.log"));
        assert_eq!(log_path_for("filled"), PathBuf::from("filled.log"));
    }

    #[test]
    fn test_write_filled_csv_reads_back() {
        let dir = temp_dir("write_csv");
        let path = dir.join("filled.csv");
        write_filled_csv(&matrix(), &path).unwrap();

        let df = load_csv(&path).unwrap();
        let back = observations_from_dataframe(&df, None, None).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(back.stations(), matrix().stations());
        assert_eq!(back.timestamps(), matrix().timestamps());
        assert_eq!(back.get(0, 0), Some(1.5));
        assert_eq!(back.get(1, 0), None);
        assert_eq!(back.get(1, 1), Some(2.25));
    }

    #[test]
    fn test_write_provenance_log() {
        let mut record = FillRecord::new();
        record.record(
            CellKey::new("2001-01-02", "B"),
            DonorTrail::Unfilled {
                reason: UnfilledReason::NoEligibleDonors,
            },
        );
        let dir = temp_dir("write_log");
        let path = dir.join("filled.log");
        write_provenance_log(&record, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::remove_dir_all(&dir).ok();
        assert_eq!(content, "2001-01-02, B: Not filled\n");
    }
}
