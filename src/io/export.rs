//! CSV export of run summaries and per-step trajectories.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::runner::BuildingRun;
use crate::sim::metrics::SummaryRecord;

/// Column header for trajectory export.
const TRAJECTORY_HEADER: &str = "building,controller,timestep,time_hr,load_kw,price,\
                                 emissions_rate,grid_kw,battery_kw,soc_kwh,soc_pct";

/// Exports summary rows to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_summary(rows: &[SummaryRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_summary_csv(rows, io::BufWriter::new(file))
}

/// Writes summary rows as CSV to any writer.
///
/// The header carries the human-readable column names (`Building`,
/// `Total Price Without Battery`, ...).
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_summary_csv(rows: &[SummaryRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports every step record of `runs` to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_trajectory(runs: &[BuildingRun], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_trajectory_csv(runs, io::BufWriter::new(file))
}

/// Writes one row per successful step, grouped by building then controller.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_trajectory_csv(runs: &[BuildingRun], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(TRAJECTORY_HEADER.split(',').map(str::trim))?;

    for run in runs {
        for report in &run.reports {
            for r in &report.records {
                wtr.write_record(&[
                    run.building.to_string(),
                    report.kind.to_string(),
                    r.timestep.to_string(),
                    format!("{:.2}", r.time_hr),
                    format!("{:.4}", r.load_kw),
                    format!("{:.4}", r.price),
                    format!("{:.4}", r.emissions_rate),
                    format!("{:.4}", r.grid_kw),
                    format!("{:.4}", r.battery_kw),
                    format!("{:.4}", r.soc_kwh),
                    format!("{:.2}", r.soc_pct),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::controller::ControllerKind;
    use crate::sim::driver::RunReport;
    use crate::sim::metrics::AggregateMetrics;
    use crate::sim::types::StepRecord;

    fn record(t: usize) -> StepRecord {
        StepRecord {
            timestep: t,
            time_hr: t as f64,
            load_kw: 5.0,
            price: 0.1,
            emissions_rate: 0.4,
            grid_kw: 3.0,
            battery_kw: 2.0,
            soc_kwh: 6.0,
            soc_pct: 38.46,
        }
    }

    fn runs(steps: usize) -> Vec<BuildingRun> {
        let report = |kind| RunReport {
            kind,
            records: (0..steps).map(record).collect(),
            metrics: AggregateMetrics::new(),
            skipped_steps: Vec::new(),
            aborted_at: None,
        };
        vec![BuildingRun {
            building: 1,
            reports: vec![report(ControllerKind::Optimization), report(ControllerKind::Embedded)],
        }]
    }

    #[test]
    fn summary_header_uses_report_column_names() {
        let rows = runs(0)[0].summaries();
        let mut buf = Vec::new();
        write_summary_csv(&rows, &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let first_line = output.as_deref().unwrap_or("").lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "Building,Controller,Total Price Without Battery,Total Price With Battery,\
             Price Saving,Total Emissions Without Battery,Total Emissions With Battery,\
             Emissions Saving (kg),Total Grid Energy Without Battery,\
             Total Grid Energy With Battery,Grid Energy Saving"
        );
        assert_eq!(output.as_deref().unwrap_or("").lines().count(), 3);
    }

    #[test]
    fn trajectory_row_count_matches_step_count() {
        let mut buf = Vec::new();
        write_trajectory_csv(&runs(24), &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let lines: Vec<&str> = output.as_deref().unwrap_or("").lines().collect();
        // 1 header + 2 controllers * 24 rows
        assert_eq!(lines.len(), 49);
        assert!(lines[1].starts_with("1,optimization,0,"));
        assert!(lines[25].starts_with("1,embedded,0,"));
    }

    #[test]
    fn trajectory_is_parseable() {
        let mut buf = Vec::new();
        write_trajectory_csv(&runs(3), &mut buf).ok();

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        let headers = rdr.headers().cloned().ok();
        assert_eq!(headers.as_ref().map(csv::StringRecord::len), Some(11));

        let mut row_count = 0;
        for record in rdr.records() {
            let rec = record.ok();
            assert!(rec.is_some(), "every row should parse");
            let rec = rec.as_ref();
            for i in 3..11 {
                let val: Result<f64, _> = rec.map(|r| r[i].parse()).unwrap_or(Ok(f64::NAN));
                assert!(val.is_ok(), "column {i} should parse as f64");
            }
            row_count += 1;
        }
        assert_eq!(row_count, 6);
    }

    #[test]
    fn deterministic_output() {
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        write_trajectory_csv(&runs(5), &mut buf1).ok();
        write_trajectory_csv(&runs(5), &mut buf2).ok();
        assert_eq!(buf1, buf2);
    }
}
