use anyhow::{bail, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use super::Report;
use crate::config::SmtpConfig;

pub fn build_message(conf: &SmtpConfig, report: &Report) -> Result<Message> {
    let from: Mailbox = conf
        .sender
        .parse()
        .with_context(|| format!("Invalid sender address: {}", conf.sender))?;
    let mut builder = Message::builder()
        .from(from)
        .subject(report.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    let receivers = conf.receivers();
    if receivers.is_empty() {
        bail!("No receivers configured");
    }
    for receiver in receivers {
        let to: Mailbox = receiver
            .parse()
            .with_context(|| format!("Invalid receiver address: {receiver}"))?;
        builder = builder.to(to);
    }
    Ok(builder.body(report.body.clone())?)
}

/// Sends the report over SMTP with implicit TLS.
pub fn send(conf: &SmtpConfig, report: &Report) -> Result<()> {
    let message = build_message(conf, report)?;
    let transport = SmtpTransport::relay(&conf.server)
        .with_context(|| format!("Invalid SMTP server {}", conf.server))?
        .port(conf.port)
        .credentials(Credentials::new(
            conf.username.clone(),
            conf.password.clone(),
        ))
        .build();
    transport
        .send(&message)
        .with_context(|| format!("Could not send email via {}", conf.server))?;
    info!("sent \"{}\" to {}", report.subject, conf.receivers);
    Ok(())
}
