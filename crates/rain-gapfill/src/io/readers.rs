use crate::config::FillConfig;
use crate::error::{GapFillError, Result, ResultExt};
use crate::types::{ObservationMatrix, Station};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Load a CSV file with fallback strategies.
///
/// Tries a standard comma-separated read first. A file that comes back as
/// a single column with semicolons in its header is re-read as a
/// semicolon-separated file with decimal commas. As a last resort blank
/// lines and doubled quotes are stripped before parsing.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    // Strategy 1: standard loading with quote handling
    match read_with(path, b',', false) {
        Ok(df) if !looks_semicolon_separated(&df) => {
            debug!("Loaded {} ({} rows, {} columns)", shown, df.height(), df.width());
            return Ok(df);
        }
        Ok(_) => debug!("{} looks semicolon-separated, retrying", shown),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    // Strategy 2: semicolon separator with decimal commas
    match read_with(path, b';', true) {
        Ok(df) if df.width() > 1 => return Ok(df),
        Ok(_) => debug!("Semicolon loading produced a single column"),
        Err(e) => debug!("Semicolon loading failed: {}", e),
    }

    // Strategy 3: pre-clean content
    let content = std::fs::read_to_string(path).context(format!("Could not read {}", shown))?;
    let cleaned = clean_csv_content(&content);
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .into_reader_with_file_handle(std::io::Cursor::new(cleaned))
        .finish()
        .context(format!("Failed to parse {}", shown))
}

fn read_with(path: &Path, separator: u8, decimal_comma: bool) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"'))
                .with_decimal_comma(decimal_comma),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
}

fn looks_semicolon_separated(df: &DataFrame) -> bool {
    df.width() == 1
        && df
            .get_column_names()
            .first()
            .is_some_and(|name| name.contains(';'))
}

fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build an observation matrix from a loaded table.
///
/// `date_column` defaults to the first column. Every other column is a
/// station; values that cannot be read as numbers, empty cells, NaN and
/// the optional `missing_value` sentinel all become missing.
pub fn observations_from_dataframe(
    df: &DataFrame,
    date_column: Option<&str>,
    missing_value: Option<f64>,
) -> Result<ObservationMatrix> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let date_column = match date_column {
        Some(name) => {
            if !names.iter().any(|n| n == name) {
                return Err(GapFillError::ColumnNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => names
            .first()
            .cloned()
            .ok_or_else(|| GapFillError::ShapeMismatch("table has no columns".to_string()))?,
    };

    let timestamps = df
        .column(&date_column)?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, ts)| {
            ts.map(str::to_string).ok_or_else(|| {
                GapFillError::ShapeMismatch(format!("empty timestamp on row {}", row + 1))
            })
        })
        .collect::<Result<Vec<String>>>()?;

    let mut stations = Vec::with_capacity(names.len().saturating_sub(1));
    let mut columns = Vec::with_capacity(names.len().saturating_sub(1));
    for name in names.iter().filter(|n| **n != date_column) {
        let values: Vec<Option<f64>> = numeric_values(df.column(name)?)
            .context(format!("Station column '{}' is not numeric", name))?
            .into_iter()
            .map(|v| v.filter(|x| Some(*x) != missing_value))
            .collect();
        stations.push(name.clone());
        columns.push(values);
    }

    ObservationMatrix::new(date_column, timestamps, stations, columns)
}

/// Read a column as floats. Text columns are parsed cell by cell,
/// accepting a decimal comma; unparseable cells become missing.
fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>> {
    if column.dtype() == &DataType::String {
        let parsed: Vec<Option<f64>> = column
            .str()?
            .into_iter()
            .map(|v| v.and_then(|text| text.trim().replace(',', ".").parse::<f64>().ok()))
            .collect();
        let unreadable = column.len() - column.null_count() - parsed.iter().flatten().count();
        if unreadable > 0 {
            warn!(
                "Column '{}': {} non-numeric cells treated as missing",
                column.name(),
                unreadable
            );
        }
        return Ok(parsed);
    }

    Ok(column.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

/// Build station geometries from a loaded table.
///
/// Rows with an empty code are skipped. Integral float codes are written
/// without a fractional part so they match column headers like `"2045"`.
pub fn stations_from_dataframe(
    df: &DataFrame,
    code_column: &str,
    x_column: &str,
    y_column: &str,
) -> Result<Vec<Station>> {
    for name in [code_column, x_column, y_column] {
        if df.column(name).is_err() {
            return Err(GapFillError::ColumnNotFound(name.to_string()));
        }
    }

    let codes = code_strings(df.column(code_column)?)?;
    let xs = numeric_values(df.column(x_column)?)?;
    let ys = numeric_values(df.column(y_column)?)?;

    let mut stations = Vec::with_capacity(df.height());
    for ((code, x), y) in codes.into_iter().zip(xs).zip(ys) {
        let Some(code) = code else {
            warn!("Skipping station row with an empty '{}'", code_column);
            continue;
        };
        stations.push(Station::new(
            code,
            x.unwrap_or(f64::NAN),
            y.unwrap_or(f64::NAN),
        ));
    }
    Ok(stations)
}

fn code_strings(column: &Column) -> Result<Vec<Option<String>>> {
    if matches!(column.dtype(), DataType::Float32 | DataType::Float64) {
        let floats = column.cast(&DataType::Float64)?;
        return Ok(floats
            .f64()?
            .into_iter()
            .map(|v| {
                v.map(|code| {
                    if code.fract() == 0.0 {
                        format!("{:.0}", code)
                    } else {
                        code.to_string()
                    }
                })
            })
            .collect());
    }

    Ok(column
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(|code| code.trim().to_string()).filter(|c| !c.is_empty()))
        .collect())
}

/// Load the observation table named by `path` using the config's
/// date column and missing-value sentinel.
pub fn read_observations(path: impl AsRef<Path>, config: &FillConfig) -> Result<ObservationMatrix> {
    let path = path.as_ref();
    let df = load_csv(path)?;
    let matrix = observations_from_dataframe(&df, config.date_column.as_deref(), config.missing_value)
        .context(format!("Invalid observation table {}", path.display()))?;
    info!(
        "Loaded {} timestamps x {} stations ({} missing cells)",
        matrix.n_timestamps(),
        matrix.n_stations(),
        matrix.missing_count()
    );
    Ok(matrix)
}

/// Load the station table named by `path` using the config's code and
/// coordinate columns.
pub fn read_stations(path: impl AsRef<Path>, config: &FillConfig) -> Result<Vec<Station>> {
    let path = path.as_ref();
    let df = load_csv(path)?;
    let stations = stations_from_dataframe(&df, &config.code_column, &config.x_column, &config.y_column)
        .context(format!("Invalid station table {}", path.display()))?;
    info!("Loaded {} station geometries", stations.len());
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "rain_gapfill_{}_{}.csv",
            name,
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    // ========================================================================
    // Observation tables
    // ========================================================================

    #[test]
    fn test_observations_first_column_is_date() {
        let df = df![
            "date" => ["2001-01-01", "2001-01-02", "2001-01-03"],
            "A" => [Some(1.0), None, Some(3.0)],
            "B" => [Some(2.0), Some(2.5), Some(f64::NAN)],
        ]
        .unwrap();

        let matrix = observations_from_dataframe(&df, None, None).unwrap();
        assert_eq!(matrix.date_column(), "date");
        assert_eq!(matrix.stations(), &["A".to_string(), "B".to_string()]);
        assert_eq!(matrix.timestamps()[1], "2001-01-02");
        assert_eq!(matrix.get(1, 0), None);
        assert_eq!(matrix.get(2, 1), None);
        assert_eq!(matrix.missing_count(), 2);
    }

    #[test]
    fn test_observations_named_date_column_and_sentinel() {
        let df = df![
            "A" => [1.0, -999.0],
            "when" => ["t1", "t2"],
            "B" => [-999.0, 4.0],
        ]
        .unwrap();

        let matrix = observations_from_dataframe(&df, Some("when"), Some(-999.0)).unwrap();
        assert_eq!(matrix.stations(), &["A".to_string(), "B".to_string()]);
        assert_eq!(matrix.get(1, 0), None);
        assert_eq!(matrix.get(0, 1), None);
        assert_eq!(matrix.get(1, 1), Some(4.0));
    }

    #[test]
    fn test_observations_unknown_date_column() {
        let df = df!["date" => ["t1"], "A" => [1.0]].unwrap();
        assert!(matches!(
            observations_from_dataframe(&df, Some("day"), None),
            Err(GapFillError::ColumnNotFound(name)) if name == "day"
        ));
    }

    #[test]
    fn test_observations_duplicate_timestamp() {
        let df = df!["date" => ["t1", "t1"], "A" => [1.0, 2.0]].unwrap();
        assert!(matches!(
            observations_from_dataframe(&df, None, None),
            Err(GapFillError::DuplicateTimestamp(_))
        ));
    }

    // ========================================================================
    // Station tables
    // ========================================================================

    #[test]
    fn test_stations_from_dataframe() {
        let df = df![
            "code" => ["A", "B"],
            "x" => [100.0, 200.0],
            "y" => [10.0, 20.0],
        ]
        .unwrap();

        let stations = stations_from_dataframe(&df, "code", "x", "y").unwrap();
        assert_eq!(
            stations,
            vec![Station::new("A", 100.0, 10.0), Station::new("B", 200.0, 20.0)]
        );
    }

    #[test]
    fn test_integral_float_codes_match_headers() {
        let df = df![
            "gauge" => [2045.0, 2046.5],
            "e" => [1.0, 2.0],
            "n" => [3.0, 4.0],
        ]
        .unwrap();

        let stations = stations_from_dataframe(&df, "gauge", "e", "n").unwrap();
        assert_eq!(stations[0].code, "2045");
        assert_eq!(stations[1].code, "2046.5");
    }

    #[test]
    fn test_integer_codes_and_missing_coordinates() {
        let df = df![
            "code" => [7i64, 8],
            "x" => [Some(1.0), None],
            "y" => [2.0, 3.0],
        ]
        .unwrap();

        let stations = stations_from_dataframe(&df, "code", "x", "y").unwrap();
        assert_eq!(stations[0].code, "7");
        assert!(stations[1].x.is_nan());
    }

    #[test]
    fn test_missing_station_column() {
        let df = df!["code" => ["A"], "x" => [1.0]].unwrap();
        assert!(matches!(
            stations_from_dataframe(&df, "code", "x", "y"),
            Err(GapFillError::ColumnNotFound(name)) if name == "y"
        ));
    }

    // ========================================================================
    // CSV loading
    // ========================================================================

    #[test]
    fn test_load_csv_comma() {
        let path = temp_csv("comma", "date,A,B\nt1,1.5,\nt2,2.0,3.0\n");
        let df = load_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(df.width(), 3);
        let matrix = observations_from_dataframe(&df, None, None).unwrap();
        assert_eq!(matrix.get(0, 0), Some(1.5));
        assert_eq!(matrix.get(0, 1), None);
    }

    #[test]
    fn test_load_csv_semicolon_with_decimal_comma() {
        let path = temp_csv("semicolon", "date;A;B\nt1;1,5;2\nt2;;3,25\n");
        let df = load_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let matrix = observations_from_dataframe(&df, None, None).unwrap();
        assert_eq!(matrix.stations(), &["A".to_string(), "B".to_string()]);
        assert_eq!(matrix.get(0, 0), Some(1.5));
        assert_eq!(matrix.get(1, 0), None);
        assert_eq!(matrix.get(1, 1), Some(3.25));
    }

    #[test]
    fn test_load_csv_missing_file() {
        assert!(load_csv("/definitely/not/here.csv").is_err());
    }
}
