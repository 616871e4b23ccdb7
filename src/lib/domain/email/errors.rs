//! Error types for the email module

use css_inline::InlineError;
use thiserror::Error;
use tracing::debug;

use super::EmailAddressError;

/// Errors raised by the message builder
#[derive(Debug, Error)]
pub enum EmailError {
    /// The message has no recipients
    #[error("the email has no recipients")]
    EmptyRecipients,

    /// An address given to the builder is not a valid email address
    #[error("invalid email address: {0}")]
    InvalidEmailAddress(#[from] EmailAddressError),

    /// Attachment content declared as base64 could not be decoded
    #[error("attachment `{name}` is not valid base64")]
    InvalidAttachment {
        /// The attachment's file name
        name: String,
    },

    /// The layout could not be rendered
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The email service could not be resolved
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Unknown error
    #[error(transparent)]
    UnknownError(anyhow::Error),
}

impl From<anyhow::Error> for EmailError {
    fn from(err: anyhow::Error) -> Self {
        EmailError::UnknownError(err)
    }
}

/// Errors raised while resolving an email service by name
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No service is registered under that name
    #[error("unknown email service `{0}`")]
    UnknownService(String),

    /// The service exists but cannot run in this build
    #[error("email service `{0}` is not supported")]
    UnsupportedService(String),

    /// The service's configuration is missing or invalid
    #[error("invalid email service configuration: {0}")]
    InvalidConfiguration(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(anyhow::Error),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::UnknownError(err)
    }
}

/// Errors raised while rendering a layout
#[derive(Debug, Error)]
pub enum RenderError {
    /// No layout is registered under that name
    #[error("unknown layout `{0}`")]
    UnknownLayout(String),

    /// The template failed to render
    #[error("could not render template: {0}")]
    Template(#[from] askama::Error),

    /// CSS could not be inlined into the rendered HTML
    #[error("could not inline CSS: {0}")]
    CssInline(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(anyhow::Error),
}

impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        RenderError::UnknownError(err)
    }
}

impl From<InlineError> for RenderError {
    fn from(err: InlineError) -> Self {
        debug!("InlineError -> RenderError");

        RenderError::CssInline(err.to_string())
    }
}

/// A failed transmission, kept as the result of a send rather than raised.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransmissionError {
    /// The request never got a response from the provider
    #[error("transmission request failed: {0}")]
    Request(String),

    /// The provider answered with an error
    #[error("transmission rejected with status {status}: {body}")]
    Rejected {
        /// The response status code
        status: u16,

        /// The response body
        body: String,
    },

    /// The message could not be assembled for the provider
    #[error("could not build the message: {0}")]
    Build(String),
}
