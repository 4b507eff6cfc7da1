use chrono::{DateTime, FixedOffset};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{LoadError, MalformedLine};
use crate::filter::PageFilter;
use crate::geo::{GeoResolver, Location};
use crate::request::parse_line;
use crate::stats::{AggregationStore, RunStats};

/// Stand-in for a request line without a path.
pub const UNKNOWN_PATH: &str = "unknown";

/// Country whose subdivisions get their own report unless configured otherwise.
pub const DEFAULT_REGION_COUNTRY: &str = "US";

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";
const BATCH_SIZE: usize = 10_000;
const PROGRESS_INTERVAL: u64 = 100_000;

/// What to do with a line that does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ParseErrorPolicy {
    /// Stop the run and report the line
    #[default]
    Abort,
    /// Count the line as malformed and keep going
    Skip,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Stop after this many processed lines. Zero or `None` reads everything.
    pub limit: Option<u64>,
    pub parse_errors: ParseErrorPolicy,
    /// ISO code of the country whose subdivisions are aggregated
    pub region_country: String,
    /// Threads used for parsing and geo lookups; 1 keeps everything on the
    /// calling thread
    pub workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            limit: None,
            parse_errors: ParseErrorPolicy::default(),
            region_country: DEFAULT_REGION_COUNTRY.to_string(),
            workers: 1,
        }
    }
}

/// Earliest and latest timestamp among processed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub earliest: DateTime<FixedOffset>,
    pub latest: DateTime<FixedOffset>,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        (self.latest - self.earliest).num_days()
    }

    fn include(range: &mut Option<DateRange>, at: DateTime<FixedOffset>) {
        match range {
            Some(range) => {
                if at < range.earliest {
                    range.earliest = at;
                }
                if at > range.latest {
                    range.latest = at;
                }
            }
            None => {
                *range = Some(DateRange {
                    earliest: at,
                    latest: at,
                })
            }
        }
    }
}

/// Everything one pass over a log produces.
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    /// Visits keyed by country name
    pub global: AggregationStore,
    /// Visits keyed by subdivision name, for the configured country only
    pub regional: AggregationStore,
    pub stats: RunStats,
    pub date_range: Option<DateRange>,
}

enum LineOutcome {
    Malformed(String),
    Ignored,
    NoGeo,
    Counted {
        path: String,
        timestamp: String,
        location: Location,
    },
}

enum Flow {
    Continue,
    Stop,
}

/// Runs parse, filter, resolve and aggregate over every line of a log.
pub struct LogLoader<'a, G: ?Sized> {
    filter: &'a PageFilter,
    resolver: &'a G,
    config: LoaderConfig,
}

impl<'a, G: GeoResolver + ?Sized> LogLoader<'a, G> {
    pub fn new(filter: &'a PageFilter, resolver: &'a G, config: LoaderConfig) -> Self {
        Self {
            filter,
            resolver,
            config,
        }
    }

    pub fn load_path(&self, path: &Path) -> Result<LoadResult, LoadError> {
        info!(action = "open", component = "log_loader", file_path = ?path, "Opening access log");
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }

    pub fn load<R: BufRead>(&self, reader: R) -> Result<LoadResult, LoadError> {
        let start_time = Instant::now();
        info!(
            action = "start",
            component = "log_loader",
            workers = self.config.workers,
            limit = ?self.config.limit,
            region_country = %self.config.region_country,
            "Starting log pass"
        );

        let result = if self.config.workers > 1 {
            self.load_parallel(reader)?
        } else {
            self.load_sequential(reader)?
        };

        let stats = result.stats;
        info!(
            action = "complete",
            component = "log_loader",
            total = stats.total,
            processed = stats.processed,
            ignored = stats.ignored,
            nogeo = stats.nogeo,
            malformed = stats.malformed,
            countries = result.global.len(),
            subdivisions = result.regional.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Log pass completed"
        );
        Ok(result)
    }

    fn load_sequential<R: BufRead>(&self, mut reader: R) -> Result<LoadResult, LoadError> {
        let mut result = LoadResult::default();
        let mut buf = Vec::new();
        while let Some(line) = read_line(&mut reader, &mut buf)? {
            let outcome = self.classify(&line);
            if let Flow::Stop = self.apply(&mut result, outcome)? {
                break;
            }
        }
        Ok(result)
    }

    // Lines are classified in parallel batch by batch, then applied in input
    // order, so counters, limit and abort line match the sequential pass.
    fn load_parallel<R: BufRead>(&self, mut reader: R) -> Result<LoadResult, LoadError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()?;
        let mut result = LoadResult::default();
        let mut buf = Vec::new();
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        loop {
            batch.clear();
            while batch.len() < BATCH_SIZE {
                match read_line(&mut reader, &mut buf)? {
                    Some(line) => batch.push(line),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }
            let at_end = batch.len() < BATCH_SIZE;

            let outcomes: Vec<LineOutcome> =
                pool.install(|| batch.par_iter().map(|line| self.classify(line)).collect());
            for outcome in outcomes {
                if let Flow::Stop = self.apply(&mut result, outcome)? {
                    return Ok(result);
                }
            }

            if at_end {
                break;
            }
        }
        Ok(result)
    }

    fn classify(&self, line: &str) -> LineOutcome {
        let request = match parse_line(line) {
            Ok(request) => request,
            Err(MalformedLine(raw)) => return LineOutcome::Malformed(raw),
        };

        let path = if request.path.is_empty() {
            UNKNOWN_PATH.to_string()
        } else {
            request.path
        };
        if !self.filter.is_countable(&path) {
            return LineOutcome::Ignored;
        }

        match self.resolver.resolve(&request.address) {
            Some(location) => LineOutcome::Counted {
                path,
                timestamp: request.timestamp,
                location,
            },
            None => LineOutcome::NoGeo,
        }
    }

    fn apply(&self, result: &mut LoadResult, outcome: LineOutcome) -> Result<Flow, LoadError> {
        let stats = &mut result.stats;
        stats.total += 1;
        if stats.total % PROGRESS_INTERVAL == 0 {
            debug!(
                action = "progress",
                component = "log_loader",
                total = stats.total,
                processed = stats.processed,
                "Log pass progress"
            );
        }

        match outcome {
            LineOutcome::Malformed(line) => match self.config.parse_errors {
                ParseErrorPolicy::Abort => {
                    return Err(LoadError::MalformedLine {
                        line_number: stats.total,
                        line,
                    })
                }
                ParseErrorPolicy::Skip => {
                    stats.malformed += 1;
                    warn!(action = "skip", component = "log_loader", line_number = stats.total, line = %line, "Skipping malformed line");
                }
            },
            LineOutcome::Ignored => stats.ignored += 1,
            LineOutcome::NoGeo => stats.nogeo += 1,
            LineOutcome::Counted {
                path,
                timestamp,
                location,
            } => {
                result.global.record(&location.country_name, &path);
                if location.in_country(&self.config.region_country) {
                    result.regional.record(&location.subdivision_name, &path);
                }
                stats.processed += 1;

                if let Ok(at) = DateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT) {
                    DateRange::include(&mut result.date_range, at);
                }

                if let Some(limit) = self.config.limit.filter(|limit| *limit > 0) {
                    if stats.processed == limit {
                        info!(action = "limit", component = "log_loader", limit, "Processing limit reached");
                        return Ok(Flow::Stop);
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }
}

/// Reads one line, dropping the line terminator. Invalid UTF-8 is replaced
/// rather than rejected.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
