//! Report built from the PID failure log Dataverse writes each month.
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::{hit_line, Report, HITS_HEADER};
use crate::month::Month;

pub const SUBJECT: &str = "PID Resolution Failure Report";

/// Failed resolutions of one identifier, in log order.
#[derive(Debug, PartialEq, Eq)]
pub struct Failures {
    pub pid: String,
    pub details: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Summary {
    /// Sorted by number of hits, most first.
    pub failures: Vec<Failures>,
    /// Entries dropped because they came from a blocklisted address.
    pub blocked: usize,
}

pub fn log_path(log_dir: &Path, month: Month) -> PathBuf {
    log_dir.join(format!("PIDFailures_{}.log", month.underscored()))
}

/// Aggregates the tab-separated `pid, uri, method, ip, time` lines that follow the header.
pub fn summarize(log: &str, blocklist: &[String]) -> Result<Summary> {
    let mut summary = Summary::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (n, line) in log.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let &[pid, uri, method, ip, time] = fields.as_slice() else {
            bail!("Malformed line {} in PID failure log: {line}", n + 1);
        };
        if blocklist.iter().any(|b| b == ip) {
            summary.blocked += 1;
            continue;
        }
        let slot = *index.entry(pid.to_string()).or_insert_with(|| {
            summary.failures.push(Failures {
                pid: pid.to_string(),
                details: Vec::new(),
            });
            summary.failures.len() - 1
        });
        summary.failures[slot]
            .details
            .push(format!("{method} {uri} from {ip} at {}", time.trim()));
    }
    // Stable, so ties keep first-seen order.
    summary
        .failures
        .sort_by(|a, b| b.details.len().cmp(&a.details.len()));
    Ok(summary)
}

pub fn render(summary: &Summary, base_url: &str) -> String {
    let mut body = HITS_HEADER.to_string();
    for f in &summary.failures {
        body.push_str(&hit_line(base_url, f.details.len(), &f.pid));
    }
    body.push_str("\n\nDetails:\n\n");
    if summary.blocked != 0 {
        body.push_str(&format!(
            "{} entries (not reported) from blocklisted IP addresses\n\n",
            summary.blocked
        ));
    }
    for f in &summary.failures {
        body.push_str(&format!("{}\n\t{}\n", f.pid, f.details.join("\n\t")));
    }
    body
}

/// Builds the report for the log at `path`; a missing log means a clean month.
pub fn report(path: &Path, blocklist: &[String], base_url: &str) -> Result<Report> {
    let body = if path.exists() {
        let log = read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        render(&summarize(&log, blocklist)?, base_url)
    } else {
        "No Failures this month\n\n".to_string()
    };
    Ok(Report {
        subject: SUBJECT.to_string(),
        body,
    })
}
