use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How urgent a ticket is.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Should be handled soon.
    Medium,
    /// Needs attention now.
    High,
}

impl Priority {
    /// Returns the wire name of the priority.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// How a customer is contacted for a follow-up.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// An email.
    Email,
    /// A phone call.
    Phone,
    /// A WhatsApp message.
    Whatsapp,
}

impl Channel {
    /// Returns the wire name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Phone => "phone",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

/// A support ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// The customer the ticket is about.
    pub customer_id: String,
    /// One-line summary.
    pub summary: String,
    /// How urgent it is.
    pub priority: Priority,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A scheduled follow-up contact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Followup {
    /// The customer to contact.
    pub customer_id: String,
    /// When to contact them, as given (ISO 8601).
    pub datetime: String,
    /// How to contact them.
    pub channel: Channel,
    /// An address or number, if different from the customer's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// A record to be stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    /// A support ticket.
    Ticket(Ticket),
    /// A follow-up contact.
    Followup(Followup),
}

/// Lifecycle state of a stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// A ticket that has been opened.
    Created,
    /// A follow-up waiting for its date.
    Scheduled,
}

/// A record as kept by a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored<T> {
    /// The id allocated by the store.
    pub id: String,
    /// Where the record is in its lifecycle.
    pub status: RecordStatus,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
    /// The record itself.
    pub data: T,
}

/// A record returned by [`RecordStore::get`](super::RecordStore::get).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredRecord {
    /// A stored ticket.
    Ticket(Stored<Ticket>),
    /// A stored follow-up.
    Followup(Stored<Followup>),
}

impl StoredRecord {
    /// Returns the id of the record.
    #[inline]
    pub fn id(&self) -> &str {
        match self {
            StoredRecord::Ticket(ticket) => &ticket.id,
            StoredRecord::Followup(followup) => &followup.id,
        }
    }
}
