//! Wire envelope (JSON text frame).
//!
//! Unknown top-level fields are ignored on decode and absent fields are never
//! written as `null`, so old and new peers can talk to each other.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Envelope kind (field name is `type` in JSON).
///
/// A `type` string this client does not know decodes to `Other` instead of
/// failing, so subscribers can still see (and ignore) newer server messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Auth,
    JoinRoom,
    LeaveRoom,
    Message,
    EditMessage,
    DeleteMessage,
    System,
    Ack,
    Error,
    Heartbeat,
    Other(String),
}

impl EnvelopeKind {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeKind::Auth => "AUTH",
            EnvelopeKind::JoinRoom => "JOIN_ROOM",
            EnvelopeKind::LeaveRoom => "LEAVE_ROOM",
            EnvelopeKind::Message => "MESSAGE",
            EnvelopeKind::EditMessage => "EDIT_MESSAGE",
            EnvelopeKind::DeleteMessage => "DELETE_MESSAGE",
            EnvelopeKind::System => "SYSTEM",
            EnvelopeKind::Ack => "ACK",
            EnvelopeKind::Error => "ERROR",
            EnvelopeKind::Heartbeat => "HEARTBEAT",
            EnvelopeKind::Other(s) => s.as_str(),
        }
    }

    /// True for kinds this protocol version defines.
    pub fn is_known(&self) -> bool {
        !matches!(self, EnvelopeKind::Other(_))
    }
}

impl From<&str> for EnvelopeKind {
    fn from(s: &str) -> Self {
        match s {
            "AUTH" => EnvelopeKind::Auth,
            "JOIN_ROOM" => EnvelopeKind::JoinRoom,
            "LEAVE_ROOM" => EnvelopeKind::LeaveRoom,
            "MESSAGE" => EnvelopeKind::Message,
            "EDIT_MESSAGE" => EnvelopeKind::EditMessage,
            "DELETE_MESSAGE" => EnvelopeKind::DeleteMessage,
            "SYSTEM" => EnvelopeKind::System,
            "ACK" => EnvelopeKind::Ack,
            "ERROR" => EnvelopeKind::Error,
            "HEARTBEAT" => EnvelopeKind::Heartbeat,
            other => EnvelopeKind::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EnvelopeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EnvelopeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EnvelopeKind::from(s.as_str()))
    }
}

/// The structured unit exchanged over the connection.
///
/// Envelopes are values: fields are read through accessors and built with the
/// consuming `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<String>,
    /// Opaque extension fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<BTreeMap<String, String>>,
}

impl Envelope {
    pub fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            room_id: None,
            sender_id: None,
            content: None,
            timestamp: None,
            message_id: None,
            reply_to_message_id: None,
            payload: None,
        }
    }

    pub fn heartbeat() -> Self {
        Self::new(EnvelopeKind::Heartbeat)
    }

    pub fn join_room(room_id: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::JoinRoom).with_room_id(room_id)
    }

    pub fn leave_room(room_id: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::LeaveRoom).with_room_id(room_id)
    }

    pub fn with_room_id(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_reply_to_message_id(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to_message_id = Some(reply_to.into());
        self
    }

    /// Add one extension field; creates the payload map on first use.
    pub fn with_payload_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> &EnvelopeKind {
        &self.kind
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.sender_id.as_deref()
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn reply_to_message_id(&self) -> Option<&str> {
        self.reply_to_message_id.as_deref()
    }

    pub fn payload(&self) -> Option<&BTreeMap<String, String>> {
        self.payload.as_ref()
    }

    /// Look up a single extension field.
    pub fn payload_value(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_stable() {
        for kind in [
            EnvelopeKind::Auth,
            EnvelopeKind::JoinRoom,
            EnvelopeKind::LeaveRoom,
            EnvelopeKind::Message,
            EnvelopeKind::EditMessage,
            EnvelopeKind::DeleteMessage,
            EnvelopeKind::System,
            EnvelopeKind::Ack,
            EnvelopeKind::Error,
            EnvelopeKind::Heartbeat,
        ] {
            assert!(kind.is_known());
            assert_eq!(EnvelopeKind::from(kind.as_str()), kind);
        }
    }

    #[test]
    fn unrecognized_kind_is_kept_verbatim() {
        let kind = EnvelopeKind::from("TYPING");
        assert_eq!(kind, EnvelopeKind::Other("TYPING".into()));
        assert!(!kind.is_known());
        assert_eq!(kind.to_string(), "TYPING");
    }

    #[test]
    fn payload_entries_accumulate() {
        let env = Envelope::new(EnvelopeKind::System)
            .with_payload_entry("code", "AUTH_SUCCESS")
            .with_payload_entry("detail", "ok");
        assert_eq!(env.payload_value("code"), Some("AUTH_SUCCESS"));
        assert_eq!(env.payload().map(|p| p.len()), Some(2));
        assert_eq!(env.payload_value("missing"), None);
    }
}
