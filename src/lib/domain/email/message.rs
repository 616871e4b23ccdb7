//! Email message builder

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::infrastructure::{config::EmailConfig, email::ServiceRegistry};

use super::{
    errors::EmailError, Attachment, AttachmentData, EmailAddress, MailService, Recipient,
    RecipientsData, RenderData, Renderer, SendOptions, SendResult, Sender, SubstitutionData,
};

/// A transactional email.
///
/// Accumulates everything a message needs and hands it to an email service on
/// [`Email::send`]. [`Email::clear`] resets the per-send state so the same
/// builder can be reused for another set of recipients.
#[derive(Debug)]
pub struct Email<R>
where
    R: Renderer,
{
    config: Arc<EmailConfig>,
    registry: Arc<ServiceRegistry>,
    renderer: Arc<R>,
    service: Box<dyn MailService>,
    recipients: Vec<Recipient>,
    from: Option<Sender>,
    subject: String,
    layout: Option<String>,
    html: Option<String>,
    text: Option<String>,
    global_data: SubstitutionData,
    recipients_data: RecipientsData,
    metadata: SubstitutionData,
    recipients_metadata: RecipientsData,
    render_data: RenderData,
    attachments: Vec<Attachment>,
    inline_images: Vec<Attachment>,
    send_options: SendOptions,
}

impl<R> Email<R>
where
    R: Renderer,
{
    /// Creates an email using the service named in the configuration.
    ///
    /// # Returns
    /// An [`Err`] with [`EmailError::Service`] if that service cannot be resolved.
    pub fn new(
        config: Arc<EmailConfig>,
        registry: Arc<ServiceRegistry>,
        renderer: Arc<R>,
    ) -> Result<Self, EmailError> {
        let service = registry.resolve(&config.service, &config)?;

        Ok(Self::with_service(config, registry, renderer, service))
    }

    /// Creates an email using an already built service.
    pub fn with_service(
        config: Arc<EmailConfig>,
        registry: Arc<ServiceRegistry>,
        renderer: Arc<R>,
        service: Box<dyn MailService>,
    ) -> Self {
        Self {
            config,
            registry,
            renderer,
            service,
            recipients: Vec::new(),
            from: None,
            subject: String::new(),
            layout: None,
            html: None,
            text: None,
            global_data: SubstitutionData::new(),
            recipients_data: RecipientsData::new(),
            metadata: SubstitutionData::new(),
            recipients_metadata: RecipientsData::new(),
            render_data: RenderData::new(),
            attachments: Vec::new(),
            inline_images: Vec::new(),
            send_options: SendOptions::new(),
        }
    }

    /// Selects a service by name, or the configured default when `name` is `None`.
    ///
    /// Fails before anything is sent if the service is unknown or unsupported.
    pub fn set_service(&mut self, name: Option<&str>) -> Result<&mut Self, EmailError> {
        let name = name.unwrap_or(&self.config.service);

        self.service = self.registry.resolve(name, &self.config)?;

        Ok(self)
    }

    /// Replaces the service with an already built one
    pub fn use_service(&mut self, service: Box<dyn MailService>) -> &mut Self {
        self.service = service;
        self
    }

    /// The name of the active service
    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }

    /// The recipients, in the order they were added
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Replaces the recipients. Repeated addresses keep their first entry.
    pub fn set_recipients(&mut self, recipients: Vec<Recipient>) -> &mut Self {
        self.recipients.clear();

        for recipient in recipients {
            self.push_recipient(recipient);
        }

        self
    }

    /// Adds a recipient. An address that is already present is ignored.
    pub fn add_recipient(
        &mut self,
        email: &str,
        name: &str,
        bcc: bool,
    ) -> Result<&mut Self, EmailError> {
        let email = EmailAddress::new(email)?;

        self.push_recipient(Recipient::new(email, name, bcc));

        Ok(self)
    }

    /// Removes every recipient
    pub fn clear_recipients(&mut self) -> &mut Self {
        self.recipients.clear();
        self
    }

    fn push_recipient(&mut self, recipient: Recipient) {
        if self.recipients.iter().any(|r| r.email == recipient.email) {
            debug!("ignoring duplicate recipient {}", recipient.email);
            return;
        }

        self.recipients.push(recipient);
    }

    /// Sets the sender. Without one, the configured default is used.
    pub fn set_from(&mut self, email: &str, name: Option<&str>) -> Result<&mut Self, EmailError> {
        let email = EmailAddress::new(email)?;

        self.from = Some(Sender::new(email, name.map(str::to_string)));

        Ok(self)
    }

    /// The sender, falling back to the configured default
    pub fn from(&self) -> Sender {
        self.from.clone().unwrap_or_else(|| self.config.sender())
    }

    /// The subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Sets the subject
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = subject.into();
        self
    }

    /// The layout used to render the HTML body
    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    /// Sets the layout used to render the HTML body
    pub fn set_layout(&mut self, layout: impl Into<String>) -> &mut Self {
        self.layout = Some(layout.into());
        self
    }

    /// Sets the HTML body directly. A layout, when set, takes precedence.
    pub fn set_html(&mut self, html: impl Into<String>) -> &mut Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the plain text body
    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(text.into());
        self
    }

    /// Replaces the data the layout is rendered with
    pub fn set_render_data(&mut self, data: RenderData) -> &mut Self {
        self.render_data = data;
        self
    }

    /// Adds a value to the data the layout is rendered with
    pub fn add_render_data(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.render_data.insert(key.into(), value.into());
        self
    }

    /// Replaces the substitution data shared by every recipient
    pub fn set_global_data(&mut self, data: SubstitutionData) -> &mut Self {
        self.global_data = data;
        self
    }

    /// Adds a substitution value shared by every recipient
    pub fn add_global_data(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.global_data.insert(key.into(), value.into());
        self
    }

    /// Replaces the per-recipient substitution data, keyed by email address
    pub fn set_recipients_data(&mut self, data: RecipientsData) -> &mut Self {
        self.recipients_data = trim_keys(data);
        self
    }

    /// Sets the substitution data of one recipient
    pub fn set_recipient_data(
        &mut self,
        email: &str,
        data: SubstitutionData,
    ) -> Result<&mut Self, EmailError> {
        let email = EmailAddress::new(email)?;

        self.recipients_data.insert(email.into(), data);

        Ok(self)
    }

    /// Replaces the metadata shared by every recipient
    pub fn set_metadata(&mut self, metadata: SubstitutionData) -> &mut Self {
        self.metadata = metadata;
        self
    }

    /// Replaces the per-recipient metadata, keyed by email address
    pub fn set_recipients_metadata(&mut self, metadata: RecipientsData) -> &mut Self {
        self.recipients_metadata = trim_keys(metadata);
        self
    }

    /// Sets the metadata of one recipient
    pub fn set_recipient_metadata(
        &mut self,
        email: &str,
        metadata: SubstitutionData,
    ) -> Result<&mut Self, EmailError> {
        let email = EmailAddress::new(email)?;

        self.recipients_metadata.insert(email.into(), metadata);

        Ok(self)
    }

    fn warn_unknown_recipients(&self, kind: &str, data: &RecipientsData) {
        for email in data.keys() {
            if !self.recipients.iter().any(|r| r.email.as_str() == email) {
                warn!("ignoring {} for unknown recipient {}", kind, email);
            }
        }
    }

    /// Adds an attachment
    pub fn add_attachment(
        &mut self,
        name: &str,
        mime_type: &str,
        data: AttachmentData,
    ) -> Result<&mut Self, EmailError> {
        self.attachments
            .push(Attachment::new(name, mime_type, data)?);

        Ok(self)
    }

    /// Adds an inline image, referenced from the HTML body by `name`
    pub fn add_inline_image(
        &mut self,
        name: &str,
        mime_type: &str,
        data: AttachmentData,
    ) -> Result<&mut Self, EmailError> {
        self.inline_images
            .push(Attachment::new(name, mime_type, data)?);

        Ok(self)
    }

    /// Replaces the send options
    pub fn set_send_options(&mut self, options: SendOptions) -> &mut Self {
        self.send_options = options;
        self
    }

    /// Sets a single send option
    pub fn set_send_option(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.send_options.insert(key.into(), value.into());
        self
    }

    /// Resets recipients, data, attachments and options.
    ///
    /// The sender, subject, bodies, layout and service are kept.
    pub fn clear(&mut self) -> &mut Self {
        self.recipients.clear();
        self.global_data.clear();
        self.recipients_data.clear();
        self.metadata.clear();
        self.recipients_metadata.clear();
        self.render_data.clear();
        self.attachments.clear();
        self.inline_images.clear();
        self.send_options.clear();
        self
    }

    /// Sends the email through the active service.
    ///
    /// # Returns
    /// - [`Err`] with [`EmailError::EmptyRecipients`] if there is nobody to send to,
    ///   or with [`EmailError::Render`] if the layout fails to render.
    /// - [`Ok`] with whether the service accepted the message. Details of a
    ///   failed transmission are available from [`Email::results`].
    pub async fn send(&mut self) -> Result<bool, EmailError> {
        if self.recipients.is_empty() {
            return Err(EmailError::EmptyRecipients);
        }

        let from = self.from();

        self.warn_unknown_recipients("substitution data", &self.recipients_data);
        self.warn_unknown_recipients("metadata", &self.recipients_metadata);

        self.service.set_subject(&self.subject);
        self.service.set_from(&from);
        self.service.set_recipients(&self.recipients);
        self.service.set_global_data(&self.global_data);
        self.service.set_recipients_data(&self.recipients_data);
        self.service.set_metadata(&self.metadata);
        self.service.set_recipients_metadata(&self.recipients_metadata);
        self.service.set_inline_images(&self.inline_images);
        self.service.set_attachments(&self.attachments);
        self.service.set_send_options(&self.send_options);

        if let Some(layout) = &self.layout {
            let html = self.renderer.render(layout, &self.render_data)?;
            self.service.set_html(&html);
        } else if let Some(html) = &self.html {
            self.service.set_html(html);
        }

        if let Some(text) = &self.text {
            self.service.set_text(text);
        }

        let sent = self.service.send().await;

        if sent {
            info!(
                "email sent through {} to {} recipient(s)",
                self.service.name(),
                self.recipients.len()
            );
        } else {
            warn!("email could not be sent through {}", self.service.name());
        }

        Ok(sent)
    }

    /// The result of the last send, as reported by the service
    pub fn results(&self) -> Option<SendResult> {
        self.service.results()
    }
}

fn trim_keys(data: RecipientsData) -> RecipientsData {
    data.into_iter()
        .map(|(email, values)| (email.trim().to_string(), values))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use crate::{
        domain::email::{
            errors::{RenderError, ServiceError, TransmissionError},
            tests::{MockMailService, MockRenderer},
        },
        infrastructure::config::tests::email_config,
    };

    use super::*;

    fn email(service: MockMailService, renderer: MockRenderer) -> Email<MockRenderer> {
        Email::with_service(
            Arc::new(email_config()),
            Arc::new(ServiceRegistry::empty()),
            Arc::new(renderer),
            Box::new(service),
        )
    }

    /// Accepts the setter calls a test does not care about
    fn accept_setters(service: &mut MockMailService) {
        service.expect_name().return_const("mock");
        service.expect_set_subject().return_const(());
        service.expect_set_recipients().return_const(());
        service.expect_set_global_data().return_const(());
        service.expect_set_recipients_data().return_const(());
        service.expect_set_metadata().return_const(());
        service.expect_set_recipients_metadata().return_const(());
        service.expect_set_inline_images().return_const(());
        service.expect_set_attachments().return_const(());
        service.expect_set_send_options().return_const(());
    }

    #[tokio::test]
    async fn test_send_without_recipients_fails() -> TestResult {
        let mut service = MockMailService::new();
        service.expect_send().times(0);

        let mut renderer = MockRenderer::new();
        renderer.expect_render().times(0);

        let mut email = email(service, renderer);
        email.set_subject("Hi");

        let result = email.send().await;

        assert!(matches!(result, Err(EmailError::EmptyRecipients)));

        Ok(())
    }

    #[tokio::test]
    async fn test_send_pushes_message_into_service() -> TestResult {
        let mut service = MockMailService::new();

        service.expect_name().return_const("mock");
        service
            .expect_set_subject()
            .withf(|subject| subject == "Hi")
            .times(1)
            .return_const(());
        service
            .expect_set_from()
            .withf(|from| from.to_string() == "A <a@x.com>")
            .times(1)
            .return_const(());
        service
            .expect_set_recipients()
            .withf(|recipients| {
                recipients.len() == 1
                    && recipients[0].email.as_str() == "b@y.com"
                    && recipients[0].name == "B"
                    && !recipients[0].bcc
            })
            .times(1)
            .return_const(());
        service.expect_set_global_data().return_const(());
        service.expect_set_recipients_data().return_const(());
        service.expect_set_metadata().return_const(());
        service.expect_set_recipients_metadata().return_const(());
        service.expect_set_inline_images().return_const(());
        service.expect_set_attachments().return_const(());
        service.expect_set_send_options().return_const(());
        service
            .expect_set_html()
            .withf(|html| html == "<p>hi</p>")
            .times(1)
            .return_const(());
        service.expect_set_text().times(0);
        service.expect_send().times(1).returning(|| true);

        let mut email = email(service, MockRenderer::new());

        email
            .set_from("a@x.com", Some("A"))?
            .add_recipient("b@y.com", "B", false)?
            .set_subject("Hi")
            .set_html("<p>hi</p>");

        assert!(email.send().await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_send_renders_layout() -> TestResult {
        let mut service = MockMailService::new();
        accept_setters(&mut service);
        service.expect_set_from().return_const(());
        service
            .expect_set_html()
            .withf(|html| html == "<h1>Bonjour Ada</h1>")
            .times(1)
            .return_const(());
        service
            .expect_set_text()
            .withf(|text| text == "Bonjour Ada")
            .times(1)
            .return_const(());
        service.expect_send().times(1).returning(|| true);

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .withf(|layout, data| {
                layout == "emails/welcome" && data.get("name") == Some(&json!("Ada"))
            })
            .times(1)
            .returning(|_, _| Ok("<h1>Bonjour Ada</h1>".to_string()));

        let mut email = email(service, renderer);

        email
            .add_recipient("ada@example.com", "Ada", false)?
            .set_layout("emails/welcome")
            .set_html("<p>ignored</p>")
            .set_text("Bonjour Ada")
            .add_render_data("name", "Ada");

        assert!(email.send().await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_send_propagates_render_errors() -> TestResult {
        let mut service = MockMailService::new();
        accept_setters(&mut service);
        service.expect_set_from().return_const(());
        service.expect_set_html().times(0);
        service.expect_send().times(0);

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .returning(|layout, _| Err(RenderError::UnknownLayout(layout.to_string())));

        let mut email = email(service, renderer);

        email
            .add_recipient("ada@example.com", "Ada", false)?
            .set_layout("emails/missing");

        let result = email.send().await;

        assert!(matches!(
            result,
            Err(EmailError::Render(RenderError::UnknownLayout(_)))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_send_falls_back_to_configured_sender() -> TestResult {
        let mut service = MockMailService::new();
        accept_setters(&mut service);
        service
            .expect_set_from()
            .withf(|from| from.to_string() == "Transmail <noreply@example.com>")
            .times(1)
            .return_const(());
        service.expect_send().times(1).returning(|| true);

        let mut email = email(service, MockRenderer::new());
        email.add_recipient("b@y.com", "B", false)?;

        assert!(email.send().await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_transmission_is_a_value() -> TestResult {
        let mut service = MockMailService::new();
        accept_setters(&mut service);
        service.expect_set_from().return_const(());
        service.expect_send().times(1).returning(|| false);
        service.expect_results().returning(|| {
            Some(SendResult::Failed(TransmissionError::Request(
                "connection refused".to_string(),
            )))
        });

        let mut email = email(service, MockRenderer::new());
        email.add_recipient("b@y.com", "B", false)?;

        assert!(!email.send().await?);
        assert!(matches!(email.results(), Some(SendResult::Failed(_))));

        Ok(())
    }

    #[test]
    fn test_duplicate_recipients_are_ignored() -> TestResult {
        let mut email = email(MockMailService::new(), MockRenderer::new());

        email
            .add_recipient("b@y.com", "B", false)?
            .add_recipient("c@y.com", "C", true)?
            .add_recipient("b@y.com", "Someone else", true)?;

        assert_eq!(email.recipients().len(), 2);
        assert_eq!(email.recipients()[0].name, "B");
        assert!(!email.recipients()[0].bcc);

        Ok(())
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let mut email = email(MockMailService::new(), MockRenderer::new());

        let result = email.add_recipient("not an address", "", false);

        assert!(matches!(result, Err(EmailError::InvalidEmailAddress(_))));
        assert!(email.recipients().is_empty());
    }

    #[test]
    fn test_clear_keeps_sender_and_subject() -> TestResult {
        let mut email = email(MockMailService::new(), MockRenderer::new());

        email
            .set_from("a@x.com", Some("A"))?
            .set_subject("Hi")
            .add_recipient("b@y.com", "B", false)?
            .add_global_data("plan", "pro")
            .set_recipient_data("b@y.com", SubstitutionData::new())?
            .set_recipient_metadata("b@y.com", SubstitutionData::new())?
            .set_metadata(SubstitutionData::from_iter([("campaign".to_string(), json!("q3"))]))
            .add_render_data("name", "B")
            .set_send_option("open_tracking", false)
            .add_attachment("a.txt", "text/plain", b"hello".as_slice().into())?
            .add_inline_image("logo.png", "image/png", vec![137u8, 80, 78, 71].into())?;

        email.clear();

        assert!(email.recipients.is_empty());
        assert!(email.global_data.is_empty());
        assert!(email.recipients_data.is_empty());
        assert!(email.metadata.is_empty());
        assert!(email.recipients_metadata.is_empty());
        assert!(email.render_data.is_empty());
        assert!(email.send_options.is_empty());
        assert!(email.attachments.is_empty());
        assert!(email.inline_images.is_empty());

        assert_eq!(email.from().to_string(), "A <a@x.com>");
        assert_eq!(email.subject(), "Hi");

        Ok(())
    }

    #[test]
    fn test_recipient_data_keys_are_trimmed() -> TestResult {
        let mut email = email(MockMailService::new(), MockRenderer::new());
        let data = SubstitutionData::from_iter([("first_name".to_string(), json!("Bea"))]);

        email
            .set_recipient_data(" b@y.com ", data.clone())?
            .set_recipients_metadata(RecipientsData::from_iter([(
                "c@y.com\n".to_string(),
                data.clone(),
            )]));

        assert_eq!(email.recipients_data.get("b@y.com"), Some(&data));
        assert_eq!(email.recipients_metadata.get("c@y.com"), Some(&data));

        Ok(())
    }

    #[test]
    fn test_recipient_data_rejects_invalid_address() {
        let mut email = email(MockMailService::new(), MockRenderer::new());

        let result = email.set_recipient_metadata("nobody", SubstitutionData::new());

        assert!(matches!(result, Err(EmailError::InvalidEmailAddress(_))));
        assert!(email.recipients_metadata.is_empty());
    }

    #[tokio::test]
    async fn test_send_passes_recipient_data_to_service() -> TestResult {
        let mut service = MockMailService::new();
        service.expect_name().return_const("mock");
        service.expect_set_subject().return_const(());
        service.expect_set_from().return_const(());
        service.expect_set_recipients().return_const(());
        service.expect_set_global_data().return_const(());
        service
            .expect_set_recipients_data()
            .withf(|data| data.len() == 2 && data.contains_key("b@y.com"))
            .times(1)
            .return_const(());
        service.expect_set_metadata().return_const(());
        service
            .expect_set_recipients_metadata()
            .withf(|metadata| metadata.is_empty())
            .times(1)
            .return_const(());
        service.expect_set_inline_images().return_const(());
        service.expect_set_attachments().return_const(());
        service.expect_set_send_options().return_const(());
        service.expect_send().times(1).returning(|| true);

        let mut email = email(service, MockRenderer::new());

        email
            .add_recipient("b@y.com", "B", false)?
            .set_recipient_data("b@y.com", SubstitutionData::new())?
            .set_recipient_data("stranger@y.com", SubstitutionData::new())?;

        assert!(email.send().await?);

        Ok(())
    }

    #[test]
    fn test_email_is_debug() {
        let email = email(MockMailService::new(), MockRenderer::new());

        assert!(format!("{:?}", email).contains("MockMailService"));
    }

    #[test]
    fn test_set_service_rejects_unknown_service() {
        let mut email = email(MockMailService::new(), MockRenderer::new());

        let result = email.set_service(Some("carrier-pigeon"));

        assert!(matches!(
            result,
            Err(EmailError::Service(ServiceError::UnknownService(name))) if name == "carrier-pigeon"
        ));
    }

    #[test]
    fn test_use_service_replaces_service() {
        let mut first = MockMailService::new();
        first.expect_name().return_const("first");

        let mut second = MockMailService::new();
        second.expect_name().return_const("second");

        let mut email = email(first, MockRenderer::new());
        assert_eq!(email.service_name(), "first");

        email.use_service(Box::new(second));
        assert_eq!(email.service_name(), "second");
    }
}
