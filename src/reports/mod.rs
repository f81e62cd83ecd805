//! Resolution failure reports for persistent identifiers, delivered by email.
pub mod datacite;
pub mod mailer;
pub mod pid_log;

use std::io::Write;

use anyhow::Result;

use crate::config::Config;

pub const HITS_HEADER: &str =
    "Hits\tDOI\tURI\n(Note: clicking links will record new failures unless these are drafts)\n";

#[derive(Debug)]
pub struct Report {
    pub subject: String,
    pub body: String,
}

/// One `{hits}\t{pid}\t{landing page}` line, preceded by a newline.
pub fn hit_line(base_url: &str, hits: usize, pid: &str) -> String {
    format!(
        "\n{hits}\t{pid}\t{}/dataset.xhtml?persistentId={pid}",
        base_url.trim_end_matches('/')
    )
}

/// Prints the report, or emails it to the configured receivers.
pub fn deliver(conf: &Config, report: &Report, print: bool, out: &mut impl Write) -> Result<()> {
    if print {
        writeln!(out, "Subject: {}\n\n{}", report.subject, report.body)?;
        return Ok(());
    }
    mailer::send(conf.smtp()?, report)
}
