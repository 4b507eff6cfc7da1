use clap::Parser;
use std::path::PathBuf;

use crate::loader::{ParseErrorPolicy, DEFAULT_REGION_COUNTRY};
use crate::rank::DEFAULT_TOP;

#[derive(Parser, Debug)]
#[command(
    name = "geovisits",
    about = "Rank visitor countries and subdivisions, with their most visited pages, from a web server access log",
    version,
    long_about = None
)]
pub struct Args {
    /// Access log in combined log format
    pub log: PathBuf,

    /// MaxMind GeoLite2 or GeoIP2 City database
    #[arg(short, long)]
    pub geoip_db: PathBuf,

    /// Number of locations in each report (at most 10)
    #[arg(short, long, default_value_t = DEFAULT_TOP)]
    pub top: usize,

    /// Stop after this many counted requests; 0 reads the whole log
    #[arg(short, long, default_value_t = 0)]
    pub limit: u64,

    /// What to do with lines that do not parse
    #[arg(long, value_enum, default_value_t = ParseErrorPolicy::Abort)]
    pub on_parse_error: ParseErrorPolicy,

    /// ISO code of the country reported by subdivision (case-insensitive)
    #[arg(short, long, default_value = DEFAULT_REGION_COUNTRY, value_parser = parse_country_code)]
    pub country: String,

    /// Path to a file of extra ignore patterns
    #[arg(short = 'p', long)]
    pub ignore_patterns: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Accepts a two-letter ISO 3166-1 code in any case and returns it uppercased,
/// matching the codes the GeoIP database reports.
pub fn parse_country_code(value: &str) -> Result<String, String> {
    let code = value.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(format!("expected a two-letter country code, got {value:?}"))
    }
}
