mod client;
mod config;
mod croissant;
mod datasets;
mod git_history;
mod hub;
mod month;
mod notification;
mod reports;
mod text;
mod training;
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{command, Parser, Subcommand, ValueHint};
use tracing::info;
use tracing_subscriber::EnvFilter;

use self::client::Dataverse;
use self::month::Month;

#[derive(Parser, Debug)]
#[command(author, version, about = "Automation for Dataverse installations", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file that should be used
    #[arg(short, long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The base URL of the Dataverse installation such as https://demo.dataverse.org
    #[arg(short, long, global = true, value_name = "URL", value_hint = ValueHint::Url)]
    pub base_url: Option<String>,

    /// The API token to use (defaults to the API_TOKEN environment variable)
    #[arg(short, long, global = true)]
    pub api_token: Option<String>,

    /// Show more output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Display your notifications from a Dataverse installation
    Notifications {
        /// Don't pretty-print the JSON shown with --verbose
        #[arg(short, long)]
        ugly: bool,
    },

    /// Show a count or a list of installations reporting to the Hub
    Installations {
        /// A month in YYYY-MM format (defaults to the current month)
        #[arg(short, long)]
        date: Option<Month>,

        /// Print the installations instead of a count
        #[arg(short, long)]
        list: bool,
    },

    /// Show a count or a list of installations based on the registry's git history
    InstallationsGit {
        /// A date in YYYY-MM-DD format (defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Print the installations instead of a count
        #[arg(short, long)]
        list: bool,
    },

    /// Show metrics for one installation
    SiteMetrics {
        /// A month in YYYY-MM format (defaults to the current month)
        #[arg(short, long)]
        date: Option<Month>,

        /// A dvHubId from the Hub's installation list
        #[arg(short, long)]
        id: Option<String>,

        /// List the valid ids (dvHubId)
        #[arg(short, long)]
        list: bool,
    },

    /// Download a Croissant file from a draft dataset
    Croissant {
        /// The persistent identifier of the draft dataset such as doi:10.5072/FK2/XXXXXX
        #[arg(short, long)]
        pid: String,

        /// Directory to write the file to
        #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath)]
        output_dir: PathBuf,

        /// Don't pretty-print the JSON output
        #[arg(short, long)]
        ugly: bool,
    },

    /// Create one dataset per spreadsheet row
    CreateDatasets {
        /// Workbook whose second sheet holds the rows
        #[arg(long, default_value = "data.xlsx", value_hint = ValueHint::FilePath)]
        workbook: PathBuf,

        /// Dataset JSON used to create each dataset before its fields are filled in
        #[arg(long, default_value = "initial-dataset.json", value_hint = ValueHint::FilePath)]
        template: PathBuf,

        /// Collection to create datasets in (defaults to COLLECTION)
        #[arg(long)]
        collection: Option<String>,

        /// Stop after this many rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Email a summary of last month's PID failure log
    PidReport {
        /// Log file to read instead of last month's log in the configured directory
        #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,

        /// Print the report instead of emailing it
        #[arg(long)]
        print: bool,
    },

    /// Email the DataCite resolution failures published since the last run
    DataciteReport {
        /// Print the report instead of emailing it
        #[arg(long)]
        print: bool,
    },

    /// List training material from the crowdsourced sheet
    Training,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.verbose);

    let mut conf = config::load(cli_args.config)?;
    if let Some(url) = cli_args.base_url {
        conf.server_url = url;
    }
    if let Some(token) = cli_args.api_token {
        conf.api_token = Some(token);
    }
    let mut out = stdout().lock();

    match cli_args.command {
        Command::Notifications { ugly } => {
            let dataverse = Dataverse::new(&conf.server_url, Some(conf.api_token()?));
            info!("Fetching notifications from {}", conf.server_url);
            let response = dataverse.notifications()?;
            if cli_args.verbose {
                if ugly {
                    writeln!(out, "{response}")?;
                } else {
                    writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
                }
            }
            let notifications = notification::decode(response)?;
            notification::print_all(&notifications, &mut out)?;
        }
        Command::Installations { date, list } => {
            let month = date.unwrap_or_else(Month::current);
            hub::installations(&conf.hub_url, month, list, &mut out)?;
        }
        Command::InstallationsGit { date, list } => {
            let date = date.as_deref().map(git_history::parse_date).transpose()?;
            git_history::installations(&conf.installations_git, date, list, &mut out)?;
        }
        Command::SiteMetrics { date, id, list } => {
            if list {
                hub::list_sites(&conf.hub_url, &mut out)?;
                return Ok(());
            }
            let Some(id) = id else {
                bail!("You must provide an ID. See -h for help.");
            };
            let month = date.unwrap_or_else(Month::current);
            hub::site_metrics(&conf.hub_url, month, &id, &mut out)?;
        }
        Command::Croissant {
            pid,
            output_dir,
            ugly,
        } => {
            let dataverse = Dataverse::new(&conf.server_url, Some(conf.api_token()?));
            let now = chrono::Local::now().naive_local();
            let path = croissant::download(&dataverse, &pid, &output_dir, ugly, now)?;
            writeln!(out, "Saved Croissant to {}", path.display())?;
        }
        Command::CreateDatasets {
            workbook,
            template,
            collection,
            limit,
        } => {
            let dataverse = Dataverse::new(&conf.server_url, Some(conf.api_token()?));
            let template = datasets::load_template(&template)?;
            let rows = datasets::read_rows(&workbook)?;
            let opts = datasets::CreateOptions {
                collection: collection.as_deref().unwrap_or(&conf.collection),
                pace: Duration::from_secs(conf.pace_secs),
                limit,
            };
            let pids = datasets::create_all(&dataverse, &template, &rows, &opts)?;
            info!("created {} datasets", pids.len());
        }
        Command::PidReport { file, print } => {
            let path = file.unwrap_or_else(|| {
                reports::pid_log::log_path(&conf.reports.log_dir, Month::previous())
            });
            let report =
                reports::pid_log::report(&path, &conf.reports.blocklist, &conf.server_url)?;
            reports::deliver(&conf, &report, print, &mut out)?;
        }
        Command::DataciteReport { print } => {
            if conf.reports.doi_account.is_empty() {
                bail!("No DataCite account configured (reports.doi_account)");
            }
            let settings = reports::datacite::Settings {
                stats_url: &conf.reports.datacite_stats_url,
                doi_account: &conf.reports.doi_account,
                state_file: &conf.reports.state_file,
                base_url: &conf.server_url,
            };
            let report = reports::datacite::report(&settings, Month::previous())?;
            reports::deliver(&conf, &report, print, &mut out)?;
        }
        Command::Training => training::training(&conf.training_url, &mut out)?,
    }
    Ok(())
}
