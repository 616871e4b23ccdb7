//! Recipients and senders

use std::fmt;

use super::EmailAddress;

/// A message recipient, unique by email address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    /// The recipient's address
    pub email: EmailAddress,

    /// The display name, may be empty
    pub name: String,

    /// Whether the recipient is a blind copy
    pub bcc: bool,
}

impl Recipient {
    /// Creates a new recipient
    pub fn new(email: EmailAddress, name: impl Into<String>, bcc: bool) -> Self {
        Self {
            email,
            name: name.into(),
            bcc,
        }
    }
}

/// The sender of a message.
///
/// Displays as a header value: `Name <email>` when a display name is set,
/// the bare address otherwise. Names containing RFC 5322 specials are quoted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    /// The sender's address
    pub email: EmailAddress,

    /// The sender's display name
    pub name: Option<String>,
}

impl Sender {
    /// Creates a new sender
    pub fn new(email: EmailAddress, name: Option<String>) -> Self {
        Self { email, name }
    }
}

const SPECIALS: &[char] = &[
    '(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"',
];

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().map(str::trim) {
            Some(name) if name.contains(SPECIALS) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");

                write!(f, "\"{}\" <{}>", escaped, self.email)
            }
            Some(name) if !name.is_empty() => write!(f, "{} <{}>", name, self.email),
            _ => write!(f, "{}", self.email),
        }
    }
}
