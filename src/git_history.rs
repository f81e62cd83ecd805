//! Counts installations as recorded in the git history of the installations registry.
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use chrono::{Days, Local, NaiveDate};
use serde::Deserialize;
use tracing::info;

use crate::config::InstallationsGitConfig;
use crate::hub::{print_names_or_count, Named};

#[derive(Debug, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub installations: Vec<Named>,
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .filter(|_| s.len() == 10)
        .with_context(|| format!("Invalid date format: {s}. Expected format is YYYY-MM-DD."))
}

/// The registry as it stood at the end of `date`.
pub fn installations(
    conf: &InstallationsGitConfig,
    date: Option<NaiveDate>,
    list: bool,
    out: &mut impl Write,
) -> Result<()> {
    let requested = date.unwrap_or_else(|| Local::now().date_naive());
    // `--before` is exclusive, so look one day later.
    let before = requested
        .checked_add_days(Days::new(1))
        .context("Date out of range")?;
    info!("requested date {requested}, one day later {before}");

    clone_or_pull(&conf.repo_dir, &conf.repo_url)?;
    let commit = commit_before(&conf.repo_dir, before)?;
    info!("using commit {commit}");
    git(&conf.repo_dir, &["checkout", "--quiet", &commit])?;

    let registry = load_registry(&conf.repo_dir.join("data").join("data.json"))?;
    print_names_or_count(registry.installations, list, out)
}

pub fn load_registry(path: &Path) -> Result<Registry> {
    let file = File::open(path)
        .with_context(|| format!("JSON file not found: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Error decoding JSON from file {}", path.display()))
}

fn git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .stderr(Stdio::inherit())
        .output()
        .context("Could not run git")?;
    if !output.status.success() {
        bail!("git {} failed with {}", args.join(" "), output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn clone_or_pull(repo: &Path, url: &str) -> Result<()> {
    if repo.is_dir() {
        git(repo, &["checkout", "--quiet", "main"])?;
        git(repo, &["pull", "--quiet"])?;
        return Ok(());
    }
    let status = Command::new("git")
        .args(["clone", "--quiet", url])
        .arg(repo)
        .status()
        .context("Could not run git")?;
    if !status.success() {
        bail!("git clone {url} failed with {status}");
    }
    Ok(())
}

/// Midnight at the start of `before`; a bare date would make git use the current time of day.
fn cutoff(before: NaiveDate) -> String {
    before.format("%Y-%m-%d 00:00:00").to_string()
}

fn commit_before(repo: &Path, before: NaiveDate) -> Result<String> {
    let commit = git(repo, &["rev-list", "-n", "1", "--before", &cutoff(before), "main"])?;
    if commit.is_empty() {
        bail!("No commit found before the specified date.");
    }
    Ok(commit)
}
