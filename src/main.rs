use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::time::Instant;
use tracing::{error, info};

use geovisits::filter::load_ignore_patterns;
use geovisits::report::{print_report_to, Report};
use geovisits::utils::{default_workers, setup_logging, validate_args};
use geovisits::{Args, GeoIpResolver, LoaderConfig, LogLoader, PageFilter};

fn analyze(args: &Args) -> Result<Report> {
    let start_time = Instant::now();

    let extra_patterns = load_ignore_patterns(args.ignore_patterns.as_deref())?;
    let filter = PageFilter::with_extra_patterns(&extra_patterns)?;
    let resolver = GeoIpResolver::open(&args.geoip_db)?;
    info!(
        action = "configure",
        component = "analysis",
        ignore_patterns = filter.pattern_count(),
        geoip_db = ?args.geoip_db,
        "Filter and GeoIP database ready"
    );

    let config = LoaderConfig {
        limit: Some(args.limit),
        parse_errors: args.on_parse_error,
        region_country: args.country.clone(),
        workers: args.workers.unwrap_or_else(default_workers),
    };
    let result = LogLoader::new(&filter, &resolver, config)
        .load_path(&args.log)
        .with_context(|| format!("Failed to analyze {}", args.log.display()))?;

    let report = Report::build(&result, &args.country, args.top);
    info!(
        action = "complete",
        component = "analysis",
        duration_ms = start_time.elapsed().as_millis(),
        "Analysis completed"
    );
    Ok(report)
}

fn run(args: &Args) -> Result<()> {
    validate_args(args)?;
    let report = analyze(args)?;
    print_report_to(&report, args.json, io::stdout().lock())
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    if let Err(e) = run(&args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
