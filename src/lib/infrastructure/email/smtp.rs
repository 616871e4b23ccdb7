//! SMTP email service implementation

use async_trait::async_trait;
use lettre::{
    message::{
        header::ContentType, Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    domain::email::{
        errors::{ServiceError, TransmissionError},
        Attachment, EmailAddress, MailService, Recipient, RecipientsData, SendOptions,
        SendResult, Sender, SubstitutionData,
    },
    infrastructure::config::{EmailConfig, SMTPConfig},
};

use super::ServiceFactory;

fn build_error(err: impl std::fmt::Display) -> TransmissionError {
    TransmissionError::Build(err.to_string())
}

/// SMTP email service.
///
/// Sends one MIME message per send. SMTP has no substitution engine, so
/// substitution data, metadata and send options are ignored.
#[derive(Debug, Clone)]
pub struct SmtpService {
    config: SMTPConfig,
    recipients: Vec<Recipient>,
    from: Option<Sender>,
    subject: String,
    html: Option<String>,
    text: Option<String>,
    attachments: Vec<Attachment>,
    images: Vec<Attachment>,
    results: Option<SendResult>,
}

impl SmtpService {
    /// Create a new SMTP service. Fails if no host is configured.
    ///
    /// No connection is made until the first send.
    pub fn new(config: &SMTPConfig) -> Result<Self, ServiceError> {
        let configured = config
            .host
            .as_deref()
            .is_some_and(|host| !host.trim().is_empty());

        if !configured {
            return Err(ServiceError::InvalidConfiguration(
                "SMTP_HOST is not set".to_string(),
            ));
        }

        Ok(Self {
            config: config.clone(),
            recipients: Vec::new(),
            from: None,
            subject: String::new(),
            html: None,
            text: None,
            attachments: Vec::new(),
            images: Vec::new(),
            results: None,
        })
    }

    /// Builds the transport. The connection pool needs a running tokio runtime.
    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransmissionError> {
        let host = self.config.host.as_deref().unwrap_or_default().trim();

        let parameters = TlsParameters::builder(host.to_string())
            .dangerous_accept_invalid_certs(!self.config.verify_tls)
            .build()
            .map_err(build_error)?;

        let tls = if self.config.starttls {
            Tls::Required(parameters)
        } else {
            Tls::Wrapper(parameters)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(self.config.port)
            .tls(tls);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    fn message(&self) -> Result<Message, TransmissionError> {
        let from = self
            .from
            .as_ref()
            .ok_or_else(|| build_error("the message has no sender"))?;

        let mut builder = Message::builder()
            .from(mailbox(&from.email, from.name.as_deref())?)
            .subject(self.subject.clone());

        for recipient in &self.recipients {
            let mailbox = mailbox(&recipient.email, Some(&recipient.name))?;

            builder = if recipient.bcc {
                builder.bcc(mailbox)
            } else {
                builder.to(mailbox)
            };
        }

        let mut body = match (&self.text, &self.html) {
            (Some(text), Some(html)) => MultiPart::alternative_plain_html(text.clone(), html.clone()),
            (None, Some(html)) => MultiPart::alternative().singlepart(SinglePart::html(html.clone())),
            (Some(text), None) => MultiPart::alternative().singlepart(SinglePart::plain(text.clone())),
            (None, None) => MultiPart::alternative().singlepart(SinglePart::plain(String::new())),
        };

        if !self.images.is_empty() {
            let mut related = MultiPart::related().multipart(body);

            for image in &self.images {
                related = related.singlepart(
                    MimeAttachment::new_inline(image.name.clone())
                        .body(image.decode().map_err(build_error)?, content_type(image)?),
                );
            }

            body = related;
        }

        if !self.attachments.is_empty() {
            let mut mixed = MultiPart::mixed().multipart(body);

            for attachment in &self.attachments {
                mixed = mixed.singlepart(
                    MimeAttachment::new(attachment.name.clone()).body(
                        attachment.decode().map_err(build_error)?,
                        content_type(attachment)?,
                    ),
                );
            }

            body = mixed;
        }

        builder.multipart(body).map_err(build_error)
    }

    async fn transmit(&self) -> Result<Value, TransmissionError> {
        let message = self.message()?;
        let transport = self.transport()?;

        debug!("sending SMTP message to {} recipient(s)", self.recipients.len());

        let response = transport
            .send(message)
            .await
            .map_err(|e| TransmissionError::Request(e.to_string()))?;

        Ok(json!({
            "code": response.code().to_string(),
            "message": response.message().collect::<Vec<_>>(),
        }))
    }
}

/// The display name travels separately from the address, so lettre quotes it.
fn mailbox(email: &EmailAddress, name: Option<&str>) -> Result<Mailbox, TransmissionError> {
    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    Ok(Mailbox::new(name, email.as_str().parse().map_err(build_error)?))
}

fn content_type(attachment: &Attachment) -> Result<ContentType, TransmissionError> {
    ContentType::parse(&attachment.mime_type).map_err(build_error)
}

#[async_trait]
impl MailService for SmtpService {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn set_recipients(&mut self, recipients: &[Recipient]) {
        self.recipients.clear();

        for recipient in recipients {
            if !self.recipients.iter().any(|r| r.email == recipient.email) {
                self.recipients.push(recipient.clone());
            }
        }
    }

    fn set_global_data(&mut self, _data: &SubstitutionData) {}

    fn set_metadata(&mut self, _metadata: &SubstitutionData) {}

    fn set_recipients_data(&mut self, _data: &RecipientsData) {}

    fn set_recipients_metadata(&mut self, _metadata: &RecipientsData) {}

    fn set_from(&mut self, from: &Sender) {
        self.from = Some(from.clone());
    }

    fn set_subject(&mut self, subject: &str) {
        self.subject = subject.to_string();
    }

    fn set_html(&mut self, html: &str) {
        self.html = (!html.is_empty()).then(|| html.to_string());
    }

    fn set_text(&mut self, text: &str) {
        self.text = (!text.is_empty()).then(|| text.to_string());
    }

    fn set_attachments(&mut self, attachments: &[Attachment]) {
        self.attachments = attachments.to_vec();
    }

    fn set_inline_images(&mut self, images: &[Attachment]) {
        self.images = images.to_vec();
    }

    fn set_send_options(&mut self, _options: &SendOptions) {}

    fn set_send_option(&mut self, _key: &str, _value: Value) {}

    async fn send(&mut self) -> bool {
        match self.transmit().await {
            Ok(payload) => {
                info!("SMTP server accepted message for {} recipient(s)", self.recipients.len());

                self.results = Some(SendResult::Delivered(payload));
                true
            }
            Err(err) => {
                warn!("SMTP transmission failed: {}", err);

                self.results = Some(SendResult::Failed(err));
                false
            }
        }
    }

    fn results(&self) -> Option<SendResult> {
        self.results.clone()
    }
}

impl ServiceFactory for SmtpService {
    const NAME: &'static str = "smtp";

    fn is_supported() -> bool {
        cfg!(feature = "smtp")
    }

    fn from_config(config: &EmailConfig) -> Result<Self, ServiceError> {
        Self::new(&config.smtp)
    }
}
