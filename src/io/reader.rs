//! Aggregated per-region CSV ingestion.
//!
//! Accepts case-insensitive headers in arbitrary order, rejects schema
//! violations at the boundary, and applies the strict-positive floor to the
//! climate columns so downstream log transforms stay defined.

use crate::calendar::Epiweek;
use crate::core::{positive_floor, WeeklyRecord};
use crate::error::{ForecastError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Raw row as it appears in the aggregated CSV. Pressure columns are part
/// of the input schema but unused by the core; serde skips them.
#[derive(Debug, Deserialize)]
struct RawRow {
    epiweek: String,
    cases: i64,
    temp_min: f64,
    temp_med: f64,
    temp_max: f64,
    precip_min: f64,
    precip_med: f64,
    precip_max: f64,
    rel_humid_min: f64,
    rel_humid_med: f64,
    rel_humid_max: f64,
    #[serde(default)]
    thermal_range: Option<f64>,
    #[serde(default)]
    rainy_days: Option<f64>,
}

/// Read aggregated weekly records, sorted by epiweek.
pub fn read_aggregated_csv<R: Read>(input: R) -> Result<Vec<WeeklyRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    // Case-insensitive headers: lowercase before deserialization.
    let lowered: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    reader.set_headers(lowered);

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<RawRow>().enumerate() {
        let row = row.map_err(|e| {
            ForecastError::InvalidInput(format!("row {}: {e}", line + 2))
        })?;

        let epiweek = Epiweek::parse_yyyyww(&row.epiweek)?;
        if !seen.insert(epiweek) {
            return Err(ForecastError::InvalidInput(format!(
                "duplicate epiweek {epiweek}"
            )));
        }
        if row.cases < 0 {
            return Err(ForecastError::InvalidInput(format!(
                "negative case count at {epiweek}"
            )));
        }

        records.push(WeeklyRecord {
            epiweek,
            cases: row.cases as u32,
            temp_min: row.temp_min,
            temp_med: row.temp_med,
            temp_max: row.temp_max,
            precip_min: row.precip_min,
            precip_med: row.precip_med,
            precip_max: row.precip_max,
            rel_humid_min: row.rel_humid_min,
            rel_humid_med: row.rel_humid_med,
            rel_humid_max: row.rel_humid_max,
            thermal_range: row.thermal_range,
            rainy_days: row.rainy_days,
        });
    }

    if records.is_empty() {
        return Err(ForecastError::InvalidInput("empty input file".into()));
    }
    records.sort_by_key(|r| r.epiweek);

    floor_climate(&mut records);
    Ok(records)
}

/// Load and validate an aggregated CSV from disk.
pub fn load_aggregated_csv(path: &Path) -> Result<Vec<WeeklyRecord>> {
    let file = File::open(path)?;
    read_aggregated_csv(file)
}

/// Apply the strict-positive floor column by column: non-positive cells
/// become half the smallest positive value observed in that column.
fn floor_climate(records: &mut [WeeklyRecord]) {
    macro_rules! floor_column {
        ($field:ident) => {{
            let mut column: Vec<f64> = records.iter().map(|r| r.$field).collect();
            positive_floor(&mut column);
            for (record, value) in records.iter_mut().zip(column) {
                record.$field = value;
            }
        }};
    }
    floor_column!(temp_min);
    floor_column!(temp_med);
    floor_column!(temp_max);
    floor_column!(precip_min);
    floor_column!(precip_med);
    floor_column!(precip_max);
    floor_column!(rel_humid_min);
    floor_column!(rel_humid_med);
    floor_column!(rel_humid_max);
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "epiweek,cases,temp_min,temp_med,temp_max,precip_min,precip_med,precip_max,rel_humid_min,rel_humid_med,rel_humid_max";

    fn csv_with_rows(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn reads_valid_rows_sorted() {
        let data = csv_with_rows(&[
            "202342,15,18,24,31,0.1,0.6,2.1,55,72,90",
            "202341,10,18,24,31,0.1,0.6,2.1,55,72,90",
        ]);
        let records = read_aggregated_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].epiweek, Epiweek::new(2023, 41).unwrap());
        assert_eq!(records[0].cases, 10);
        assert_eq!(records[1].epiweek, Epiweek::new(2023, 42).unwrap());
    }

    #[test]
    fn headers_are_case_insensitive_and_order_free() {
        let data = "CASES,EPIWEEK,Temp_Min,temp_med,TEMP_MAX,precip_min,precip_med,precip_max,Rel_Humid_Min,rel_humid_med,rel_humid_max\n\
                    7,202341,18,24,31,0.1,0.6,2.1,55,72,90";
        let records = read_aggregated_csv(data.as_bytes()).unwrap();
        assert_eq!(records[0].cases, 7);
    }

    #[test]
    fn extra_pressure_columns_are_ignored() {
        let data = format!(
            "{HEADER},pressure_min,pressure_med,pressure_max\n\
             202341,5,18,24,31,0.1,0.6,2.1,55,72,90,1000,1010,1020"
        );
        let records = read_aggregated_csv(data.as_bytes()).unwrap();
        assert_eq!(records[0].cases, 5);
    }

    #[test]
    fn optional_columns_are_carried() {
        let data = format!(
            "{HEADER},thermal_range,rainy_days\n\
             202341,5,18,24,31,0.1,0.6,2.1,55,72,90,12.5,4"
        );
        let records = read_aggregated_csv(data.as_bytes()).unwrap();
        assert_eq!(records[0].thermal_range, Some(12.5));
        assert_eq!(records[0].rainy_days, Some(4.0));
    }

    #[test]
    fn rejects_duplicate_epiweeks() {
        let data = csv_with_rows(&[
            "202341,10,18,24,31,0.1,0.6,2.1,55,72,90",
            "202341,11,18,24,31,0.1,0.6,2.1,55,72,90",
        ]);
        assert!(matches!(
            read_aggregated_csv(data.as_bytes()),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_week_53_and_negative_cases() {
        let data = csv_with_rows(&["202353,10,18,24,31,0.1,0.6,2.1,55,72,90"]);
        assert!(matches!(
            read_aggregated_csv(data.as_bytes()),
            Err(ForecastError::InvalidEpiweek { .. })
        ));

        let data = csv_with_rows(&["202341,-3,18,24,31,0.1,0.6,2.1,55,72,90"]);
        assert!(matches!(
            read_aggregated_csv(data.as_bytes()),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_missing_numeric_cells() {
        let data = csv_with_rows(&["202341,10,18,,31,0.1,0.6,2.1,55,72,90"]);
        assert!(matches!(
            read_aggregated_csv(data.as_bytes()),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_malformed_epiweek_text() {
        let data = csv_with_rows(&["2023-41,10,18,24,31,0.1,0.6,2.1,55,72,90"]);
        assert!(read_aggregated_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn climate_zeros_get_the_positive_floor() {
        let data = csv_with_rows(&[
            "202341,10,18,24,31,0.0,0.6,2.1,55,72,90",
            "202342,12,18,24,31,0.4,0.6,2.1,55,72,90",
        ]);
        let records = read_aggregated_csv(data.as_bytes()).unwrap();
        assert_eq!(records[0].precip_min, 0.2);
    }

    #[test]
    fn empty_file_rejected() {
        let data = String::from(HEADER);
        assert!(matches!(
            read_aggregated_csv(data.as_bytes()),
            Err(ForecastError::InvalidInput(_))
        ));
    }
}
