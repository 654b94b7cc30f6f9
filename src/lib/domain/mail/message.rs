//! Mail message

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// One entry of an address-list field.
///
/// An entry is either a bare address or an address paired with a display
/// name, matching the two shapes a caller can hand to the address mutators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Address {
    /// A bare email address
    Bare(String),

    /// An email address with a display name
    Named {
        /// Display name
        name: String,
        /// Email address
        address: String,
    },
}

impl Address {
    /// Creates a bare address entry.
    pub fn bare(address: impl Into<String>) -> Self {
        Self::Bare(address.into())
    }

    /// Creates a named address entry.
    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Returns the email address of the entry.
    pub fn address(&self) -> &str {
        match self {
            Self::Bare(address) => address,
            Self::Named { address, .. } => address,
        }
    }

    /// Returns the display name of the entry, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Bare(_) => None,
            Self::Named { name, .. } => Some(name),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare(address) => write!(f, "{address}"),
            Self::Named { name, address } => write!(f, "{name} <{address}>"),
        }
    }
}

/// Conversion into a sequence of address entries.
///
/// Every address mutator accepts all caller shapes through this trait: a
/// bare string appends one bare entry, an `(address, name)` pair appends
/// one named entry, and a pre-built sequence appends all its entries in
/// order, unchanged.
pub trait IntoAddresses {
    /// Converts the value into the entries to append.
    fn into_addresses(self) -> Vec<Address>;
}

impl IntoAddresses for &str {
    fn into_addresses(self) -> Vec<Address> {
        vec![Address::bare(self)]
    }
}

impl IntoAddresses for String {
    fn into_addresses(self) -> Vec<Address> {
        vec![Address::Bare(self)]
    }
}

impl IntoAddresses for (&str, &str) {
    fn into_addresses(self) -> Vec<Address> {
        vec![Address::named(self.0, self.1)]
    }
}

impl IntoAddresses for (String, String) {
    fn into_addresses(self) -> Vec<Address> {
        vec![Address::named(self.0, self.1)]
    }
}

impl IntoAddresses for Address {
    fn into_addresses(self) -> Vec<Address> {
        vec![self]
    }
}

impl IntoAddresses for Vec<Address> {
    fn into_addresses(self) -> Vec<Address> {
        self
    }
}

impl IntoAddresses for &[Address] {
    fn into_addresses(self) -> Vec<Address> {
        self.to_vec()
    }
}

/// Options common to every attachment shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentOptions {
    /// Content type override for the attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Content id for an embedded (inline) attachment, unique per message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// An attachment descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Attachment {
    /// An attachment read from a file path at send time
    Path {
        /// Path of the file to attach
        path: PathBuf,
        /// Attachment options
        options: AttachmentOptions,
    },

    /// An attachment carrying its raw data directly
    Data {
        /// Raw attachment bytes
        content: Vec<u8>,
        /// File name presented to the recipient
        filename: String,
        /// Attachment options
        options: AttachmentOptions,
    },
}

/// An alternate body representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternative {
    /// Alternate body content
    pub content: String,

    /// Content type of the alternate body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// The single mutable mail value under construction.
///
/// Created empty when a [`Mailer`](super::Mailer) is constructed, mutated
/// exclusively by its chained calls, and consumed read-only exactly once by
/// the driver's send operation. Composition is append-only: no operation
/// removes or reorders existing entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Message {
    /// Sender addresses
    pub from: Vec<Address>,

    /// Primary recipients
    pub to: Vec<Address>,

    /// Carbon copy recipients
    pub cc: Vec<Address>,

    /// Blind carbon copy recipients
    pub bcc: Vec<Address>,

    /// Envelope sender addresses
    pub sender: Vec<Address>,

    /// Reply-to addresses
    pub reply_to: Vec<Address>,

    /// Subject line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Identifier of the message this one replies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,

    /// Plain text body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// HTML body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Apple Watch HTML body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_html: Option<String>,

    /// Attachments, in the order they were added
    pub attachments: Vec<Attachment>,

    /// Alternate body representations, in the order they were added
    pub alternatives: Vec<Alternative>,

    /// Opaque driver-specific payload, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
}

impl Message {
    /// Returns true when no field has been set yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
