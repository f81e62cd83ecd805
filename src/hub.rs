//! Readers for the Dataverse Hub, which polls registered installations monthly.
use std::io::Write;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::client::{get_json, join};
use crate::month::{window_query, Month};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub dv_hub_id: String,
    pub name: String,
    pub hostname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Named {
    pub name: String,
}

/// Monthly metrics URL; without an id the Hub answers for every installation.
///
/// An explicit window matters: the bare endpoint returns every installation
/// that could ever be polled.
pub fn metrics_url(hub_url: &str, month: Month, dv_hub_id: Option<&str>) -> String {
    let mut url = join(
        hub_url,
        &format!("/api/installation/metrics/monthly?{}", window_query(month)),
    );
    if let Some(id) = dv_hub_id {
        url.push_str(&format!("&dvHubId={id}"));
    }
    url
}

pub fn installations_url(hub_url: &str) -> String {
    join(hub_url, "/api/installation")
}

/// Sorts by name, ignoring case.
pub fn sorted_by_name<T>(items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items
        .into_iter()
        .sorted_by_key(|i| name(i).to_lowercase())
        .collect()
}

/// Prints how many installations reported metrics in `month`, or their names.
pub fn installations(hub_url: &str, month: Month, list: bool, out: &mut impl Write) -> Result<()> {
    let reported: Vec<Named> = get_json(&metrics_url(hub_url, month, None))?;
    print_names_or_count(reported, list, out)
}

pub fn print_names_or_count(items: Vec<Named>, list: bool, out: &mut impl Write) -> Result<()> {
    if list {
        for i in sorted_by_name(items, |i| i.name.as_str()) {
            writeln!(out, "{}", i.name)?;
        }
    } else {
        writeln!(out, "{}", items.len())?;
    }
    Ok(())
}

/// Prints the valid `dvHubId`s.
pub fn list_sites(hub_url: &str, out: &mut impl Write) -> Result<()> {
    let sites: Vec<Installation> = get_json(&installations_url(hub_url))?;
    for i in sorted_by_name(sites, |i| i.name.as_str()) {
        writeln!(out, "{}", site_line(&i))?;
    }
    Ok(())
}

fn site_line(i: &Installation) -> String {
    let hostname = i.hostname.as_deref().unwrap_or("None");
    format!("{} {} {hostname}", i.dv_hub_id, i.name)
}

pub fn site_metrics(
    hub_url: &str,
    month: Month,
    dv_hub_id: &str,
    out: &mut impl Write,
) -> Result<()> {
    let records: Vec<Map<String, Value>> =
        get_json(&metrics_url(hub_url, month, Some(dv_hub_id)))?;
    print_site_metrics(&records, out)
}

/// Prints the installation record followed by its first metrics entry.
pub fn print_site_metrics(records: &[Map<String, Value>], out: &mut impl Write) -> Result<()> {
    let Some(record) = records.first() else {
        bail!("No metrics available. Add -v to see URL. Try -h for help.");
    };
    for (key, value) in record.iter().filter(|(k, _)| k.as_str() != "metrics") {
        writeln!(out, "{key}: {}", display_value(value))?;
    }
    let metrics = record
        .get("metrics")
        .and_then(|m| m.get(0))
        .and_then(Value::as_object)
        .context("Installation record has no metrics")?;
    for (key, value) in metrics {
        writeln!(out, "{key}: {}", display_value(value))?;
    }
    Ok(())
}

/// Strings print bare; everything else prints as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}
