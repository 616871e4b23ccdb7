//! Email service contract

use std::{collections::BTreeMap, fmt};

use async_trait::async_trait;
use serde_json::{Map, Value};

#[cfg(test)]
use mockall::mock;

use super::{errors::TransmissionError, Attachment, Recipient, Sender};

/// Key/value pairs interpolated by a provider's template engine
pub type SubstitutionData = Map<String, Value>;

/// Substitution data (or metadata) keyed by recipient email address
pub type RecipientsData = BTreeMap<String, SubstitutionData>;

/// Provider specific transmission flags, passed through untouched
pub type SendOptions = Map<String, Value>;

/// The outcome of the last transmission.
#[derive(Clone, Debug, PartialEq)]
pub enum SendResult {
    /// The provider accepted the message and answered with this payload
    Delivered(Value),

    /// The transmission failed
    Failed(TransmissionError),
}

impl SendResult {
    /// Whether the transmission succeeded
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendResult::Delivered(_))
    }
}

/// An email service: one provider's way of delivering a message.
///
/// Setters only record state; nothing touches the network until [`MailService::send`].
/// Services ignore data their provider cannot express.
#[async_trait]
pub trait MailService: Send + Sync + fmt::Debug {
    /// The short name the service is registered under
    fn name(&self) -> &'static str;

    /// Replaces the recipients. The first entry per email address wins.
    fn set_recipients(&mut self, recipients: &[Recipient]);

    /// Sets the substitution data shared by every recipient
    fn set_global_data(&mut self, data: &SubstitutionData);

    /// Sets the metadata shared by every recipient
    fn set_metadata(&mut self, metadata: &SubstitutionData);

    /// Attaches substitution data to known recipients. Unknown addresses are ignored.
    fn set_recipients_data(&mut self, data: &RecipientsData);

    /// Attaches metadata to known recipients. Unknown addresses are ignored.
    fn set_recipients_metadata(&mut self, metadata: &RecipientsData);

    /// Sets the sender
    fn set_from(&mut self, from: &Sender);

    /// Sets the subject
    fn set_subject(&mut self, subject: &str);

    /// Sets the HTML body
    fn set_html(&mut self, html: &str);

    /// Sets the plain text body
    fn set_text(&mut self, text: &str);

    /// Sets the attachments
    fn set_attachments(&mut self, attachments: &[Attachment]);

    /// Sets the inline images
    fn set_inline_images(&mut self, images: &[Attachment]);

    /// Replaces the send options. Keys that are not given fall back to the
    /// service's defaults.
    fn set_send_options(&mut self, options: &SendOptions);

    /// Sets a single send option
    fn set_send_option(&mut self, key: &str, value: Value);

    /// Transmits the message.
    ///
    /// Failures are never raised: they are stored as the result and reported
    /// by returning `false`.
    async fn send(&mut self) -> bool;

    /// The result of the last [`MailService::send`], `None` before the first one.
    fn results(&self) -> Option<SendResult>;
}

#[cfg(test)]
mock! {
    pub MailService {}

    #[async_trait]
    impl MailService for MailService {
        fn name(&self) -> &'static str;
        fn set_recipients(&mut self, recipients: &[Recipient]);
        fn set_global_data(&mut self, data: &SubstitutionData);
        fn set_metadata(&mut self, metadata: &SubstitutionData);
        fn set_recipients_data(&mut self, data: &RecipientsData);
        fn set_recipients_metadata(&mut self, metadata: &RecipientsData);
        fn set_from(&mut self, from: &Sender);
        fn set_subject(&mut self, subject: &str);
        fn set_html(&mut self, html: &str);
        fn set_text(&mut self, text: &str);
        fn set_attachments(&mut self, attachments: &[Attachment]);
        fn set_inline_images(&mut self, images: &[Attachment]);
        fn set_send_options(&mut self, options: &SendOptions);
        fn set_send_option(&mut self, key: &str, value: Value);
        async fn send(&mut self) -> bool;
        fn results(&self) -> Option<SendResult>;
    }
}

#[cfg(test)]
impl fmt::Debug for MockMailService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockMailService").finish_non_exhaustive()
    }
}
