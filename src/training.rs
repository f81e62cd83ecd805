//! Lists training material from the crowdsourced Dataverse TV sheet.
use std::collections::HashMap;
use std::io::Write;

use anyhow::{bail, Result};

use crate::client::get_string;

const COLUMNS: [&str; 8] = [
    "Date",
    "Title",
    "Installation",
    "Type",
    "Target audience",
    "Training material",
    "YouTube ID",
    "Non-YouTube landing page",
];

/// Rows of a tab-separated export, keyed by the header row.
///
/// The header must name every column the listing reads.
pub fn parse_tsv(tsv: &str) -> Result<Vec<HashMap<&str, &str>>> {
    let mut lines = tsv.lines();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let missing: Vec<&str> = COLUMNS
        .into_iter()
        .filter(|c| !columns.contains(c))
        .collect();
    if !missing.is_empty() {
        bail!("Training sheet is missing columns: {}", missing.join(", "));
    }
    Ok(lines
        .filter(|l| !l.trim().is_empty())
        .map(|l| columns.iter().copied().zip(l.split('\t')).collect())
        .collect())
}

/// Formats a row flagged as training material; other rows yield `None`.
///
/// Trailing cells the export left off read as empty.
pub fn format_row(row: &HashMap<&str, &str>) -> Option<String> {
    let field = |name: &str| row.get(name).copied().unwrap_or_default();
    if field("Training material") != "1" {
        return None;
    }
    let link = match (field("Non-YouTube landing page"), field("YouTube ID")) {
        (url, _) if !url.is_empty() => url.to_string(),
        (_, id) if !id.is_empty() => format!("https://www.youtube.com/watch?v={id}"),
        _ => String::new(),
    };
    Some(format!(
        "Date: {}; Title: {}; Installation: {}; Type: {}; Target Audience: {}; Languages: EN; Links: {link}",
        field("Date"),
        field("Title"),
        field("Installation"),
        field("Type"),
        field("Target audience"),
    ))
}

pub fn print_training(tsv: &str, out: &mut impl Write) -> Result<()> {
    for line in parse_tsv(tsv)?.iter().filter_map(format_row) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub fn training(url: &str, out: &mut impl Write) -> Result<()> {
    print_training(&get_string(url)?, out)
}
