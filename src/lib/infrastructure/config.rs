//! Email configuration, read from flags or the environment

use clap::Parser;

use crate::domain::email::{EmailAddress, Sender};

/// Email configuration
#[derive(Clone, Debug, Parser)]
pub struct EmailConfig {
    /// The default sender email address
    #[clap(long = "from-email", env = "EMAIL_FROM")]
    pub from_email: EmailAddress,

    /// The default sender name
    #[clap(long = "from-name", env = "EMAIL_FROM_NAME")]
    pub from_name: Option<String>,

    /// The email service used when none is chosen explicitly
    #[clap(long = "email-service", env = "EMAIL_SERVICE", default_value = "sparkpost")]
    pub service: String,

    /// SparkPost options
    #[clap(flatten)]
    pub sparkpost: SparkPostConfig,

    /// SMTP options
    #[clap(flatten)]
    pub smtp: SMTPConfig,
}

impl EmailConfig {
    /// The default sender
    pub fn sender(&self) -> Sender {
        Sender::new(self.from_email.clone(), self.from_name.clone())
    }
}

/// SparkPost configuration
#[derive(Clone, Debug, Parser)]
pub struct SparkPostConfig {
    /// The SparkPost API key
    #[clap(long = "sparkpost-api-key", env = "SPARKPOST_API_KEY")]
    pub api_key: Option<String>,

    /// The SparkPost API base URL
    #[clap(
        long = "sparkpost-endpoint",
        env = "SPARKPOST_ENDPOINT",
        default_value = "https://api.sparkpost.com/api/v1"
    )]
    pub endpoint: String,

    /// Request timeout, in seconds
    #[clap(long = "sparkpost-timeout", env = "SPARKPOST_TIMEOUT", default_value = "30")]
    pub timeout: u64,
}

/// SMTP configuration
#[derive(Clone, Default, Debug, Parser)]
pub struct SMTPConfig {
    /// The SMTP host
    #[clap(long = "smtp-host", env = "SMTP_HOST")]
    pub host: Option<String>,

    /// The SMTP port
    #[clap(long = "smtp-port", env = "SMTP_PORT", default_value = "587")]
    pub port: u16,

    /// The SMTP username
    #[clap(long = "smtp-user", env = "SMTP_USER")]
    pub username: Option<String>,

    /// The SMTP password
    #[clap(long = "smtp-password", env = "SMTP_PASSWORD")]
    pub password: Option<String>,

    /// Verify the TLS certificate
    #[clap(long = "smtp-verify-tls", env = "SMTP_VERIFY_TLS", default_value = "true")]
    pub verify_tls: bool,

    /// Enable STARTTLS (TLS upgrade on connection)
    #[clap(long = "smtp-starttls", env = "SMTP_STARTTLS", default_value = "true")]
    pub starttls: bool,
}
