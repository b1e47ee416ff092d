//! Forecast CSV emission.

use crate::error::{ForecastError, Result};
use crate::quantile::ForecastRow;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write forecast rows as UTF-8 CSV with LF terminators and the fixed
/// column order `date, lower_95 .. upper_95`.
pub fn write_forecast_csv<W: Write>(output: W, rows: &[ForecastRow]) -> Result<()> {
    if rows.is_empty() {
        return Err(ForecastError::InvalidInput(
            "refusing to write an empty forecast".into(),
        ));
    }
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(output);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a region's forecast to disk. The file is only created once the
/// rows exist, so a failed region never leaves a partial CSV behind.
pub fn save_forecast_csv(path: &Path, rows: &[ForecastRow]) -> Result<()> {
    let file = File::create(path)?;
    write_forecast_csv(file, rows)
}
