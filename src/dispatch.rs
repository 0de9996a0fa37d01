//!
//! Report delivery: the spreadsheet goes to local storage, the HTML body goes out over SMTP.
//!
use crate::config::Config;
use crate::render::html;
use crate::Result;
use lettre::message::{header::ContentType, Mailbox};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;

/// Write the encoded spreadsheet, replacing any existing file
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub async fn write_spreadsheet(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes).await?;
    tracing::info!("spreadsheet written to {}", path.display());
    Ok(())
}

/// Build the report email. The spreadsheet is not attached.
pub fn build_message(config: &Config, body: String) -> Result<Message> {
    let from: Mailbox = config.mail_from.parse()?;
    let to: Mailbox = config.mail_to.parse()?;

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(html::title(&config.environment))
        .header(ContentType::TEXT_HTML)
        .body(body)?)
}

/// Send the report email over plain SMTP and return the server response
#[tracing::instrument(skip_all, fields(host = %config.mail_host, port = config.mail_port))]
pub async fn send_email(config: &Config, body: String) -> Result<String> {
    let message = build_message(config, body)?;

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.mail_host.as_str())
        .port(config.mail_port)
        .build();

    let response = mailer.send(message).await?;
    let text = response
        .message()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!("email sent: {} {}", response.code(), text);
    Ok(format!("{} {}", response.code(), text))
}
