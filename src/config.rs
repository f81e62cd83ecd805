use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const TRAINING_URL: &str = "https://docs.google.com/spreadsheets/d/1uVk_57Ek_A49sLZ5OKdI6QASKloWNzykni3kcYNzpxA/export?gid=0&format=tsv";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Dataverse installation
    pub server_url: String,
    /// API token sent as `X-Dataverse-key`
    pub api_token: Option<String>,
    /// Collection that new datasets are created in
    pub collection: String,
    /// Base URL of the Dataverse Hub
    pub hub_url: String,
    /// Seconds to wait between dataset creations
    pub pace_secs: u64,
    /// TSV export of the crowdsourced training sheet
    pub training_url: String,
    pub installations_git: InstallationsGitConfig,
    pub reports: ReportsConfig,
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            api_token: None,
            collection: "collection1".to_string(),
            hub_url: "https://hub.dataverse.org".to_string(),
            pace_secs: 2,
            training_url: TRAINING_URL.to_string(),
            installations_git: InstallationsGitConfig::default(),
            reports: ReportsConfig::default(),
            smtp: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct InstallationsGitConfig {
    pub repo_dir: PathBuf,
    pub repo_url: String,
}

impl Default for InstallationsGitConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("dataverse-installations"),
            repo_url: "https://github.com/IQSS/dataverse-installations.git".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory holding the `PIDFailures_MM_YYYY.log` files
    pub log_dir: PathBuf,
    /// IP addresses whose failures are counted but never reported
    pub blocklist: Vec<String>,
    /// DataCite account prefix, e.g. `GDCC.HARVARD`
    pub doi_account: String,
    /// Remembers the last DataCite report month that was processed
    pub state_file: PathBuf,
    pub datacite_stats_url: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/usr/local/payara6/domains/domain1/logs"),
            // UT Dorkbot / autoscan.infosec.utexas.edu
            blocklist: vec!["146.6.15.11".to_string()],
            doi_account: String::new(),
            state_file: PathBuf::from("/opt/pidreporting/dcpidreportstate"),
            datacite_stats_url: "https://stats.datacite.org/stats/resolution-report".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub sender: String,
    pub username: String,
    pub password: String,
    /// Comma-separated list of recipient addresses
    pub receivers: String,
}

fn default_smtp_port() -> u16 {
    465
}

impl SmtpConfig {
    pub fn receivers(&self) -> Vec<&str> {
        self.receivers
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }
}

impl Config {
    /// Applies `SERVER_URL`, `API_TOKEN` and `COLLECTION` on top of the file values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SERVER_URL") {
            self.server_url = url;
        }
        if let Some(token) = lookup("API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(collection) = lookup("COLLECTION") {
            self.collection = collection;
        }
    }

    pub fn api_token(&self) -> Result<&str> {
        self.api_token.as_deref().filter(|t| !t.is_empty()).context(
            "API token is required. Provide it via the --api-token argument or the API_TOKEN environment variable.",
        )
    }

    pub fn smtp(&self) -> Result<&SmtpConfig> {
        self.smtp
            .as_ref()
            .context("No [smtp] section in the configuration file (use --print to skip email)")
    }
}

fn fallback_path() -> Option<PathBuf> {
    let mut fb_path = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok()?;
    fb_path.push("dvtools");
    fb_path.push("config.toml");
    Some(fb_path)
}

/// Loads the configuration file (if any) and layers the environment on top.
///
/// An explicitly requested file must exist; the default location is optional.
pub fn load(path: Option<PathBuf>) -> Result<Config> {
    let mut conf = match path {
        Some(p) => parse(&p)?,
        None => match fallback_path().filter(|p| p.exists()) {
            Some(p) => parse(&p)?,
            None => Config::default(),
        },
    };
    conf.apply_env(|key| std::env::var(key).ok());
    Ok(conf)
}

fn parse(path: &Path) -> Result<Config> {
    let text = read_to_string(path)
        .with_context(|| format!("Could not read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let conf = Config::default();
        assert_eq!(conf.server_url, "http://localhost:8080");
        assert_eq!(conf.collection, "collection1");
        assert_eq!(conf.pace_secs, 2);
        assert!(conf.api_token.is_none());
        assert_eq!(conf.reports.blocklist, vec!["146.6.15.11"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
server_url = "https://demo.dataverse.org"

[reports]
doi_account = "GDCC.DEMO"

[smtp]
server = "smtp.example.com"
sender = "dv@example.com"
username = "dv"
password = "secret"
receivers = "a@example.com, b@example.com,"
"#
        )
        .unwrap();

        let conf = parse(&path).unwrap();
        assert_eq!(conf.server_url, "https://demo.dataverse.org");
        assert_eq!(conf.collection, "collection1");
        assert_eq!(conf.reports.doi_account, "GDCC.DEMO");
        assert_eq!(conf.reports.blocklist, vec!["146.6.15.11"]);
        let smtp = conf.smtp().unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.receivers(), vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("SERVER_URL", "https://beta.dataverse.org"),
            ("API_TOKEN", "abc"),
        ]
        .into_iter()
        .collect();
        let mut conf = Config::default();
        conf.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(conf.server_url, "https://beta.dataverse.org");
        assert_eq!(conf.api_token().unwrap(), "abc");
        assert_eq!(conf.collection, "collection1");
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let mut conf = Config::default();
        assert!(conf.api_token().is_err());
        conf.api_token = Some(String::new());
        assert!(conf.api_token().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(load(Some(PathBuf::from("/nonexistent/dvtools.toml"))).is_err());
    }
}
