use regex::Regex;
use std::sync::LazyLock;

use crate::error::MalformedLine;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^(?P<address>\S+)\s+\S+\s+\S+\s+"#,
        r#"\[(?P<timestamp>[^\]]*)\]\s+"#,
        r#""(?P<request>(?:[^"\\]|\\.)*)"\s+"#,
        r#"(?P<status>\S+)\s+(?P<bytes>\S+)\s+"#,
        r#""(?P<referrer>(?:[^"\\]|\\.)*)"\s+"#,
        r#""(?P<user_agent>.*)"\s*$"#,
    ))
    .expect("combined log pattern is valid")
});

static REQUEST_LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<method>[A-Z]+) (?P<path>.*?)(?: (?P<protocol>HTTP/\S+))?$")
        .expect("request line pattern is valid")
});

/// One access log entry in combined log format.
///
/// Status and byte count are kept as the raw tokens, so a `-` survives.
/// When the quoted request line is not `METHOD PATH [PROTOCOL]`, `method`,
/// `path` and `protocol` are empty and only `raw_request` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub address: String,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub raw_request: String,
    pub status: String,
    pub bytes: String,
    pub referrer: String,
    pub user_agent: String,
}

pub fn parse_line(line: &str) -> Result<Request, MalformedLine> {
    let captures = LINE_PATTERN
        .captures(line)
        .ok_or_else(|| MalformedLine(line.to_string()))?;
    let field = |name: &str| {
        captures
            .name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    let raw_request = field("request");
    let (method, path, protocol) = split_request_line(&raw_request);

    Ok(Request {
        address: field("address"),
        timestamp: field("timestamp"),
        method,
        path,
        protocol,
        raw_request,
        status: field("status"),
        bytes: field("bytes"),
        referrer: field("referrer"),
        user_agent: field("user_agent"),
    })
}

fn split_request_line(raw: &str) -> (String, String, String) {
    match REQUEST_LINE_PATTERN.captures(raw) {
        Some(captures) => {
            let part = |name: &str| {
                captures
                    .name(name)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            };
            (part("method"), part("path"), part("protocol"))
        }
        None => (String::new(), String::new(), String::new()),
    }
}
