use regex::{Regex, RegexSet};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::ConfigError;

// Built-in exclusions, compiled into the binary.
const DEFAULT_PATTERNS: &str = include_str!("../default_ignore_patterns.txt");

/// Decides which request paths count as page visits.
#[derive(Debug, Clone)]
pub struct PageFilter {
    excluded: RegexSet,
}

impl PageFilter {
    /// Filter with only the built-in exclusions.
    pub fn new() -> Self {
        Self::with_extra_patterns(&[]).expect("embedded ignore patterns compile")
    }

    /// Filter with the built-in exclusions plus operator supplied regexes.
    pub fn with_extra_patterns(extra: &[Regex]) -> Result<Self, ConfigError> {
        let patterns: Vec<&str> = pattern_lines(DEFAULT_PATTERNS)
            .map(|(_, pattern)| pattern)
            .chain(extra.iter().map(Regex::as_str))
            .collect();
        let excluded = RegexSet::new(patterns).map_err(ConfigError::PatternSet)?;
        Ok(Self { excluded })
    }

    pub fn is_countable(&self, path: &str) -> bool {
        !self.excluded.is_match(path)
    }

    pub fn pattern_count(&self) -> usize {
        self.excluded.len()
    }
}

impl Default for PageFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Reads additional exclusion regexes, one per line. Blank lines and `#`
/// comments are skipped. No path means no extra patterns.
pub fn load_ignore_patterns(pattern_file_path: Option<&Path>) -> anyhow::Result<Vec<Regex>> {
    let Some(path) = pattern_file_path else {
        return Ok(Vec::new());
    };

    let start_time = Instant::now();
    info!(action = "load", component = "pattern_file", file_path = ?path, "Loading ignore patterns from file");
    if !path.exists() {
        return Err(ConfigError::MissingPatternFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;
    let mut patterns = Vec::new();
    for (line, pattern) in pattern_lines(&content) {
        let regex =
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern { line, source })?;
        patterns.push(regex);
    }

    info!(
        action = "loaded",
        component = "pattern_file",
        pattern_count = patterns.len(),
        duration_ms = start_time.elapsed().as_millis(),
        file_path = ?path,
        "Loaded ignore patterns from file"
    );
    Ok(patterns)
}
