#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Sends a test email through the configured email service

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Command, CommandFactory, FromArgMatches, Parser};
use tracing::{error, info};
use transmail::{
    domain::email::{Email, EmailAddress},
    infrastructure::{
        config::EmailConfig,
        email::ServiceRegistry,
        templates::{LayoutRenderer, MESSAGE_LAYOUT},
    },
};

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
pub struct Args {
    /// The email configuration
    #[clap(flatten)]
    pub email: EmailConfig,

    /// Print the email services available in this build and exit
    #[arg(long)]
    pub list: bool,

    /// Recipient address, may be repeated
    #[arg(long = "to", required_unless_present = "list")]
    pub to: Vec<EmailAddress>,

    /// Send the email to the recipients as blind copies
    #[arg(long)]
    pub bcc: bool,

    /// The subject of the email
    #[arg(long, default_value = "Test email")]
    pub subject: String,

    /// The text of the email
    #[arg(long, default_value = "If you can read this, email delivery works.")]
    pub body: String,
}

/// The command line, with the sender only required when sending
fn command() -> Command {
    Args::command().mut_arg("from_email", |arg| {
        arg.required(false).required_unless_present("list")
    })
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let matches = command().get_matches();
    let registry = ServiceRegistry::default();

    if matches.get_flag("list") {
        for name in registry.supported() {
            println!("{name}");
        }

        return Ok(());
    }

    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    let mut email = Email::new(
        Arc::new(args.email),
        Arc::new(registry),
        Arc::new(LayoutRenderer::default()),
    )?;

    email
        .set_subject(args.subject.as_str())
        .set_layout(MESSAGE_LAYOUT)
        .set_text(args.body.as_str())
        .add_render_data("title", args.subject.as_str())
        .add_render_data("body", args.body.as_str());

    for to in &args.to {
        email.add_recipient(to.as_str(), "", args.bcc)?;
    }

    if !email.send().await? {
        error!("{} could not send the email: {:?}", email.service_name(), email.results());
        bail!("email delivery failed");
    }

    info!("sent through {}: {:?}", email.service_name(), email.results());

    Ok(())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_command() {
        command().debug_assert();
    }

    #[test]
    fn test_list_without_sender() -> TestResult {
        let matches = command().try_get_matches_from(["sendtestemail", "--list"])?;

        assert!(matches.get_flag("list"));

        Ok(())
    }

    #[test]
    fn test_send_requires_sender() {
        let result = command().try_get_matches_from(["sendtestemail", "--to", "b@y.com"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_send_arguments() -> TestResult {
        let matches = command().try_get_matches_from([
            "sendtestemail",
            "--from-email",
            "a@x.com",
            "--to",
            "b@y.com",
            "--to",
            "c@y.com",
            "--bcc",
        ])?;
        let args = Args::from_arg_matches(&matches)?;

        assert_eq!(args.email.from_email.as_str(), "a@x.com");
        assert_eq!(args.to.len(), 2);
        assert!(args.bcc);
        assert!(!args.list);

        Ok(())
    }
}
