use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

use crate::args::Args;
use crate::error::ConfigError;
use crate::rank::DEFAULT_TOP;

/// Logs to stderr so the report on stdout stays clean. `RUST_LOG` overrides
/// the level picked by `verbose`.
pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_writer(std::io::stderr)
        .init();
}

pub fn format_number(num: u64) -> String {
    let digits = num.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}

pub fn default_workers() -> usize {
    std::cmp::min(num_cpus::get(), 8)
}

pub fn validate_args(args: &Args) -> Result<(), ConfigError> {
    if args.top == 0 || args.top > DEFAULT_TOP {
        return Err(ConfigError::InvalidArgument(format!(
            "--top must be between 1 and {DEFAULT_TOP}"
        )));
    }

    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(ConfigError::InvalidArgument(
                "--workers must be greater than 0".to_string(),
            ));
        }
    }

    if !args.log.is_file() {
        return Err(ConfigError::MissingLog(args.log.clone()));
    }

    if !args.geoip_db.is_file() {
        return Err(ConfigError::MissingGeoDatabase(args.geoip_db.clone()));
    }

    if let Some(patterns) = &args.ignore_patterns {
        if !patterns.is_file() {
            return Err(ConfigError::MissingPatternFile(patterns.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::NamedTempFile;

    fn args_with(log: &NamedTempFile, db: &NamedTempFile, extra: &[&str]) -> Args {
        let mut argv = vec![
            "geovisits".to_string(),
            log.path().display().to_string(),
            "--geoip-db".to_string(),
            db.path().display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::parse_from(argv)
    }

    #[test]
    fn formats_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(100000), "100,000");
    }

    #[test]
    fn accepts_defaults() {
        let (log, db) = (NamedTempFile::new().unwrap(), NamedTempFile::new().unwrap());
        let args = args_with(&log, &db, &[]);
        assert_eq!(args.top, 10);
        assert_eq!(args.country, "US");
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn rejects_out_of_range_top() {
        let (log, db) = (NamedTempFile::new().unwrap(), NamedTempFile::new().unwrap());
        for top in ["0", "11"] {
            let args = args_with(&log, &db, &["--top", top]);
            assert!(matches!(
                validate_args(&args),
                Err(ConfigError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_workers() {
        let (log, db) = (NamedTempFile::new().unwrap(), NamedTempFile::new().unwrap());
        let args = args_with(&log, &db, &["--workers", "0"]);
        assert!(matches!(
            validate_args(&args),
            Err(ConfigError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_missing_inputs() {
        let db = NamedTempFile::new().unwrap();
        let args = Args::parse_from(vec![
            "geovisits".to_string(),
            "/nonexistent/access.log".to_string(),
            "--geoip-db".to_string(),
            db.path().display().to_string(),
        ]);
        assert!(matches!(
            validate_args(&args),
            Err(ConfigError::MissingLog(_))
        ));

        let log = NamedTempFile::new().unwrap();
        let args = Args::parse_from(vec![
            "geovisits".to_string(),
            log.path().display().to_string(),
            "--geoip-db".to_string(),
            "/nonexistent/city.mmdb".to_string(),
        ]);
        assert!(matches!(
            validate_args(&args),
            Err(ConfigError::MissingGeoDatabase(_))
        ));
    }

    #[test]
    fn parses_parse_error_policy() {
        let (log, db) = (NamedTempFile::new().unwrap(), NamedTempFile::new().unwrap());
        let args = args_with(&log, &db, &["--on-parse-error", "skip"]);
        assert_eq!(args.on_parse_error, crate::loader::ParseErrorPolicy::Skip);
    }
}
