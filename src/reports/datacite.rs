//! Report built from DataCite's monthly DOI resolution reports.
//!
//! DataCite publishes one gzip-compressed HTML page per month. The state
//! file remembers the last month that was reported so each run only covers
//! the months published since.
use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use tracing::{info, warn};

use super::{hit_line, Report, HITS_HEADER};
use crate::client::get_reader;
use crate::month::Month;
use crate::text::parenthesized;

pub const SUBJECT: &str = "DataCite DOI Resolution Failure Reports";

#[derive(Debug, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub pid: String,
    pub hits: usize,
}

pub fn report_url(stats_url: &str, month: Month) -> String {
    format!(
        "{}/resolutions_{}.html",
        stats_url.trim_end_matches('/'),
        month.underscored()
    )
}

/// First month to report: the one after the recorded state, or the last complete month.
pub fn first_month(state_file: &Path, last_complete: Month) -> Result<Month> {
    if !state_file.exists() {
        return Ok(last_complete);
    }
    let state = fs::read_to_string(state_file)
        .with_context(|| format!("Could not read {}", state_file.display()))?;
    let line = state.lines().next().unwrap_or_default();
    Ok(Month::parse_underscored(line)?.next())
}

pub fn save_state(state_file: &Path, month: Month) -> Result<()> {
    fs::write(state_file, month.underscored())
        .with_context(|| format!("Could not write {}", state_file.display()))
}

/// Extracts the failure list of `account` from a report page.
///
/// The account's row is followed by a closed summary list and then the
/// list of failing DOIs, one `<a href=".../doi.org/{doi}">` line each, with
/// the hit count in parentheses two lines later. Returns `None` when the
/// account has no section on the page.
pub fn parse_report(html: &str, account: &str) -> Result<Option<Vec<ResolutionFailure>>> {
    let mut lines = html.lines();
    if !lines.by_ref().any(|l| l.contains(account)) {
        return Ok(None);
    }
    let mut past_summary = false;
    while let Some(line) = lines.next() {
        if line.contains("</ol>") {
            past_summary = true;
        } else if line.contains("<ol>") && past_summary {
            return parse_list(&mut lines).map(Some);
        }
    }
    Ok(None)
}

fn parse_list<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<Vec<ResolutionFailure>> {
    let mut failures = Vec::new();
    while let Some(line) = lines.next() {
        if line.starts_with("<a ") {
            let doi = line
                .split('"')
                .nth(1)
                .and_then(|href| href.split("doi.org/").nth(1))
                .with_context(|| format!("No DOI link in: {line}"))?;
            lines.next();
            let count_line = lines.next().unwrap_or_default();
            let hits = parenthesized(count_line)
                .and_then(|c| c.trim().parse().ok())
                .with_context(|| format!("No hit count for {doi} in: {count_line}"))?;
            failures.push(ResolutionFailure {
                pid: format!("doi:{doi}"),
                hits,
            });
        } else if line.contains("</ol>") {
            break;
        }
    }
    Ok(failures)
}

pub fn render_month(month: Month, failures: &[ResolutionFailure], base_url: &str) -> String {
    let mut section = format!("Report for {}\n\n{HITS_HEADER}", month.underscored());
    for f in failures {
        section.push_str(&hit_line(base_url, f.hits, &f.pid));
    }
    section.push_str("\n\n");
    section
}

fn fetch_report(stats_url: &str, month: Month) -> Result<Option<String>> {
    let url = report_url(stats_url, month);
    let reader = match get_reader(&url) {
        Ok(r) => r,
        Err(e) if e.is_status() => {
            info!("{e}");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let mut html = String::new();
    GzDecoder::new(reader)
        .read_to_string(&mut html)
        .with_context(|| format!("Could not decompress {url}"))?;
    Ok(Some(html))
}

pub struct Settings<'a> {
    pub stats_url: &'a str,
    pub doi_account: &'a str,
    pub state_file: &'a Path,
    pub base_url: &'a str,
}

/// Walks every unreported month up to `last_complete`, stopping at the first
/// month DataCite has not published yet.
pub fn report(settings: &Settings, last_complete: Month) -> Result<Report> {
    report_with(settings, last_complete, |m| fetch_report(settings.stats_url, m))
}

fn report_with(
    settings: &Settings,
    last_complete: Month,
    mut fetch: impl FnMut(Month) -> Result<Option<String>>,
) -> Result<Report> {
    let mut month = first_month(settings.state_file, last_complete)?;
    let mut body = String::new();
    let mut found_any = false;
    let mut attempted = None;
    while month <= last_complete {
        attempted = Some(month);
        let Some(html) = fetch(month)? else {
            break;
        };
        // Every published month gets a section, even when the account is absent.
        let failures = match parse_report(&html, settings.doi_account)? {
            Some(failures) => {
                found_any = true;
                failures
            }
            None => {
                warn!("{} has no section in {}", settings.doi_account, month.underscored());
                Vec::new()
            }
        };
        body.push_str(&render_month(month, &failures, settings.base_url));
        save_state(settings.state_file, month)?;
        month = month.next();
    }
    if !found_any {
        body.push_str(&format!(
            "No new monthly reports from DataCite. Next report expected: {}\n\n",
            attempted.unwrap_or(month).underscored()
        ));
    }
    Ok(Report {
        subject: SUBJECT.to_string(),
        body,
    })
}
