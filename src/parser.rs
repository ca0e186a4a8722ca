use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::rules::RuleSet;

lazy_static! {
    // Candidate lines look like "445/tcp  open  microsoft-ds  Windows Server 2019".
    // Anything else in the report (headers, closed/filtered ports, blank
    // lines) is skipped without comment.
    static ref OPEN_TCP_LINE: Regex =
        Regex::new(r"^(\d+)/tcp\s+open\s+(\S+)(?:\s+(.*\S))?\s*$").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot read scan report {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Deduplicated detection results: protocol tag to the ascending set of
/// ports it was observed on. Built fresh per parse, never persisted.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Detections {
    #[serde(flatten)]
    map: BTreeMap<String, BTreeSet<u16>>,
}

impl Detections {
    fn record(&mut self, proto: &str, port: u16) {
        self.map.entry(proto.to_string()).or_default().insert(port);
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn protocol_count(&self) -> usize {
        self.map.len()
    }

    pub fn pair_count(&self) -> usize {
        self.map.values().map(|ports| ports.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<u16>)> {
        self.map.iter().map(|(proto, ports)| (proto.as_str(), ports))
    }

    pub fn ports(&self, proto: &str) -> Option<Vec<u16>> {
        self.map.get(proto).map(|ports| ports.iter().copied().collect())
    }
}

/// Parse a saved Nmap report, applying the three detection strategies to
/// every open TCP line. Purely a function of its input: no side effects
/// beyond the returned map.
pub fn parse_report<R: BufRead>(reader: R, rules: &RuleSet) -> Detections {
    let mut detections = Detections::default();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            // Undecodable byte sequences mid-report are report noise, same
            // as a malformed line.
            Err(err) => {
                debug!("skipping unreadable line: {err}");
                continue;
            }
        };

        let captures = match OPEN_TCP_LINE.captures(&line) {
            Some(captures) => captures,
            None => continue,
        };

        // An admission-shaped line whose digits overflow a port number is
        // report noise too, not a reason to abort the run.
        let port: u16 = match captures[1].parse() {
            Ok(port) => port,
            Err(_) => {
                debug!("skipping line with out-of-range port: {line}");
                continue;
            }
        };
        let service = &captures[2];
        let banner = captures.get(3).map(|m| m.as_str());

        for proto in rules.protocols_for_port(port) {
            debug!("port match: {proto} on {port}");
            detections.record(proto, port);
        }
        for proto in rules.protocols_for_service(service) {
            debug!("service match: {proto} on {port} ({service})");
            detections.record(proto, port);
        }
        if let Some(banner) = banner {
            for proto in rules.protocols_for_banner(banner) {
                debug!("version match: {proto} on {port} ({banner})");
                detections.record(proto, port);
            }
        }
    }

    detections
}

/// Open and parse a report file. The only fatal failure in the whole
/// pipeline: an unreadable report means there is nothing to do.
pub fn parse_report_file(path: &Path, rules: &RuleSet) -> Result<Detections, ReportError> {
    let file = File::open(path).map_err(|source| ReportError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_report(BufReader::new(file), rules))
}
