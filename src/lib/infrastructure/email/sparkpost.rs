//! SparkPost email service
//!
//! Sends one transmission per message through the SparkPost REST API. Recipients
//! carry their own substitution data and metadata, so personalization happens
//! on SparkPost's side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    domain::email::{
        errors::{ServiceError, TransmissionError},
        Attachment, MailService, Recipient, RecipientsData, SendOptions, SendResult, Sender,
        SubstitutionData,
    },
    infrastructure::config::{EmailConfig, SparkPostConfig},
};

use super::ServiceFactory;

/// `header_to` value that hides a blind copy from the other recipients
const UNDISCLOSED_RECIPIENTS: &str = "undisclosed-recipients:;";

#[derive(Clone, Debug, Serialize)]
struct Address {
    email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    header_to: Option<&'static str>,
}

#[derive(Clone, Debug, Serialize)]
struct InlineRecipient {
    address: Address,
    #[serde(skip_serializing_if = "Map::is_empty")]
    substitution_data: SubstitutionData,
    #[serde(skip_serializing_if = "Map::is_empty")]
    metadata: SubstitutionData,
}

#[derive(Debug, Serialize)]
struct File<'a> {
    #[serde(rename = "type")]
    mime_type: &'a str,
    name: &'a str,
    data: &'a str,
}

impl<'a> From<&'a Attachment> for File<'a> {
    fn from(attachment: &'a Attachment) -> Self {
        Self {
            mime_type: &attachment.mime_type,
            name: &attachment.name,
            data: &attachment.data,
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    from: &'a str,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<File<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    inline_images: Vec<File<'a>>,
}

/// The body of `POST /transmissions`
#[derive(Debug, Serialize)]
struct Transmission<'a> {
    options: &'a SendOptions,
    recipients: &'a [InlineRecipient],
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    substitution_data: Option<&'a SubstitutionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a SubstitutionData>,
}

/// Options sent when the caller does not override them
fn default_options() -> SendOptions {
    SendOptions::from_iter([
        ("transactional".to_string(), Value::Bool(true)),
        ("open_tracking".to_string(), Value::Bool(true)),
        ("click_tracking".to_string(), Value::Bool(true)),
        ("inline_css".to_string(), Value::Bool(false)),
    ])
}

impl From<reqwest::Error> for TransmissionError {
    fn from(err: reqwest::Error) -> Self {
        debug!("reqwest::Error -> TransmissionError");

        TransmissionError::Request(err.to_string())
    }
}

/// SparkPost email service
#[derive(Debug, Clone)]
pub struct SparkPostService {
    client: Client,
    endpoint: String,
    api_key: String,
    recipients: Vec<InlineRecipient>,
    substitution_data: SubstitutionData,
    metadata: SubstitutionData,
    from: String,
    subject: String,
    html: Option<String>,
    text: Option<String>,
    attachments: Vec<Attachment>,
    images: Vec<Attachment>,
    options: SendOptions,
    results: Option<SendResult>,
}

impl SparkPostService {
    /// Creates a SparkPost service. Fails if no API key is configured.
    pub fn new(config: &SparkPostConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::InvalidConfiguration("SPARKPOST_API_KEY is not set".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| ServiceError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            recipients: Vec::new(),
            substitution_data: SubstitutionData::new(),
            metadata: SubstitutionData::new(),
            from: String::new(),
            subject: String::new(),
            html: None,
            text: None,
            attachments: Vec::new(),
            images: Vec::new(),
            options: default_options(),
            results: None,
        })
    }

    fn recipient_mut(&mut self, email: &str) -> Option<&mut InlineRecipient> {
        self.recipients
            .iter_mut()
            .find(|recipient| recipient.address.email == email)
    }

    fn transmission(&self) -> Transmission<'_> {
        Transmission {
            options: &self.options,
            recipients: &self.recipients,
            content: Content {
                from: &self.from,
                subject: &self.subject,
                html: self.html.as_deref(),
                text: self.text.as_deref(),
                attachments: self.attachments.iter().map(File::from).collect(),
                inline_images: self.images.iter().map(File::from).collect(),
            },
            substitution_data: (!self.substitution_data.is_empty())
                .then_some(&self.substitution_data),
            metadata: (!self.metadata.is_empty()).then_some(&self.metadata),
        }
    }

    async fn transmit(&self) -> Result<Value, TransmissionError> {
        let url = format!("{}/transmissions", self.endpoint);

        debug!(
            "posting transmission to {} for {} recipient(s)",
            url,
            self.recipients.len()
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, &self.api_key)
            .json(&self.transmission())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransmissionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl MailService for SparkPostService {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn set_recipients(&mut self, recipients: &[Recipient]) {
        self.recipients.clear();

        for recipient in recipients {
            if self.recipient_mut(recipient.email.as_str()).is_some() {
                continue;
            }

            self.recipients.push(InlineRecipient {
                address: Address {
                    email: recipient.email.to_string(),
                    name: recipient.name.clone(),
                    header_to: recipient.bcc.then_some(UNDISCLOSED_RECIPIENTS),
                },
                substitution_data: SubstitutionData::new(),
                metadata: SubstitutionData::new(),
            });
        }
    }

    fn set_global_data(&mut self, data: &SubstitutionData) {
        self.substitution_data = data.clone();
    }

    fn set_metadata(&mut self, metadata: &SubstitutionData) {
        self.metadata = metadata.clone();
    }

    fn set_recipients_data(&mut self, data: &RecipientsData) {
        for (email, values) in data {
            match self.recipient_mut(email) {
                Some(recipient) => recipient.substitution_data = values.clone(),
                None => debug!("no recipient {} for substitution data", email),
            }
        }
    }

    fn set_recipients_metadata(&mut self, metadata: &RecipientsData) {
        for (email, values) in metadata {
            match self.recipient_mut(email) {
                Some(recipient) => recipient.metadata = values.clone(),
                None => debug!("no recipient {} for metadata", email),
            }
        }
    }

    fn set_from(&mut self, from: &Sender) {
        self.from = from.to_string();
    }

    fn set_subject(&mut self, subject: &str) {
        self.subject = subject.to_string();
    }

    fn set_html(&mut self, html: &str) {
        self.html = non_empty(html);
    }

    fn set_text(&mut self, text: &str) {
        self.text = non_empty(text);
    }

    fn set_attachments(&mut self, attachments: &[Attachment]) {
        self.attachments = attachments.to_vec();
    }

    fn set_inline_images(&mut self, images: &[Attachment]) {
        self.images = images.to_vec();
    }

    fn set_send_options(&mut self, options: &SendOptions) {
        self.options = default_options();
        self.options
            .extend(options.iter().map(|(key, value)| (key.clone(), value.clone())));
    }

    fn set_send_option(&mut self, key: &str, value: Value) {
        self.options.insert(key.to_string(), value);
    }

    async fn send(&mut self) -> bool {
        match self.transmit().await {
            Ok(payload) => {
                info!(
                    "SparkPost accepted transmission for {} recipient(s)",
                    self.recipients.len()
                );

                self.results = Some(SendResult::Delivered(payload));
                true
            }
            Err(err) => {
                warn!("SparkPost transmission failed: {}", err);

                self.results = Some(SendResult::Failed(err));
                false
            }
        }
    }

    fn results(&self) -> Option<SendResult> {
        self.results.clone()
    }
}

impl ServiceFactory for SparkPostService {
    const NAME: &'static str = "sparkpost";

    fn is_supported() -> bool {
        cfg!(feature = "sparkpost")
    }

    fn from_config(config: &EmailConfig) -> Result<Self, ServiceError> {
        Self::new(&config.sparkpost)
    }
}
