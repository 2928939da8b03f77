//! Per-iteration trace as CSV (one row per accepted update).

use anyhow::{Context, Result};
use hzcap::solver::IterationRecord;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

pub fn to_frame(records: &[IterationRecord]) -> PolarsResult<DataFrame> {
    let col_u64 = |f: fn(&IterationRecord) -> usize| -> Vec<u64> {
        records.iter().map(|r| f(r) as u64).collect()
    };
    let col_f64 =
        |f: fn(&IterationRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };
    df!(
        "iteration" => col_u64(|r| r.iteration),
        "action" => col_f64(|r| r.action),
        "quotient" => col_f64(|r| r.quotient),
        "step" => col_f64(|r| r.step),
        "scale" => col_f64(|r| r.scale),
        "backtracks" => col_u64(|r| r.backtracks),
        "violation" => col_f64(|r| r.violation)
    )
}

pub fn write_csv(path: &Path, records: &[IterationRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut df = to_frame(records)?;
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
