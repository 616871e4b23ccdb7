//! Transactional email: the message model, the email service contract and the
//! message builder that drives it.

mod attachment;
mod email_address;
mod message;
mod recipient;
mod renderer;
mod service;

pub mod errors;

pub use attachment::{Attachment, AttachmentData};
pub use email_address::{EmailAddress, EmailAddressError};
pub use message::Email;
pub use recipient::{Recipient, Sender};
pub use renderer::{RenderData, Renderer};
pub use service::{MailService, RecipientsData, SendOptions, SendResult, SubstitutionData};
