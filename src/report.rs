use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};

use crate::loader::{DateRange, LoadResult};
use crate::rank::{top_locations, RankedLocation};
use crate::stats::RunStats;
use crate::utils::format_number;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub stats: RunStats,
    pub date_range: Option<DateRange>,
    pub region_country: String,
    pub countries: Vec<RankedLocation>,
    pub subdivisions: Vec<RankedLocation>,
}

impl Report {
    pub fn build(result: &LoadResult, region_country: &str, top: usize) -> Self {
        Self {
            stats: result.stats,
            date_range: result.date_range,
            region_country: region_country.to_string(),
            countries: top_locations(&result.global, top),
            subdivisions: top_locations(&result.regional, top),
        }
    }
}

pub fn write_text_report<W: Write>(report: &Report, mut writer: W) -> io::Result<()> {
    let stats = &report.stats;

    writeln!(writer, "--- Access Log Analysis ---")?;
    if let Some(range) = &report.date_range {
        writeln!(
            writer,
            "Date range: {} to {} ({} days)",
            range.earliest.format("%B %-d, %Y"),
            range.latest.format("%B %-d, %Y"),
            format_number(range.days().max(0) as u64)
        )?;
    }
    writeln!(writer, "Lines read: {}", format_number(stats.total))?;
    writeln!(writer, "Requests counted: {}", format_number(stats.processed))?;
    writeln!(
        writer,
        "Requests ignored (filtered pages): {}",
        format_number(stats.ignored)
    )?;
    writeln!(
        writer,
        "Requests without location: {}",
        format_number(stats.nogeo)
    )?;
    if stats.malformed > 0 {
        writeln!(
            writer,
            "Malformed lines skipped: {}",
            format_number(stats.malformed)
        )?;
    }

    write_section(&mut writer, "countries", &report.countries)?;
    write_section(
        &mut writer,
        &format!("{} subdivisions", report.region_country),
        &report.subdivisions,
    )
}

fn write_section<W: Write>(writer: &mut W, title: &str, entries: &[RankedLocation]) -> io::Result<()> {
    writeln!(writer, "\nTop {} {}:", entries.len(), title)?;
    if entries.is_empty() {
        writeln!(writer, "  (no visits)")?;
    }
    for (rank, entry) in entries.iter().enumerate() {
        writeln!(
            writer,
            "{:>2}. {}: {} visits (top page: {}, {} visits)",
            rank + 1,
            entry.location,
            format_number(entry.visitors),
            entry.top_page.path,
            format_number(entry.top_page.visitors)
        )?;
    }
    Ok(())
}

/// Writes the report as text, or as JSON when `json` is set.
pub fn print_report_to<W: Write>(report: &Report, json: bool, writer: W) -> Result<()> {
    if json {
        write_json_report(report, writer)
    } else {
        write_text_report(report, writer)?;
        Ok(())
    }
}

pub fn write_json_report<W: Write>(report: &Report, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    Ok(())
}
