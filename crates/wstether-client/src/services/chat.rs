use chrono::{SecondsFormat, Utc};
use futures_util::stream::{Stream, StreamExt};
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use wstether_core::error::Result;
use wstether_core::protocol::{Envelope, EnvelopeKind};

use crate::realtime::{ConnectionManager, StatusObserver};

/// Typed view of one inbound chat envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    MessageReceived {
        message_id: String,
        sender_id: String,
        content: String,
        timestamp: String,
        reply_to_message_id: Option<String>,
    },
    MessageEdited {
        message_id: String,
        new_content: String,
        timestamp: String,
    },
    MessageDeleted {
        message_id: String,
        timestamp: String,
    },
    SystemMessage {
        content: String,
        timestamp: String,
    },
    Error {
        message: String,
    },
    /// Any other kind, carried by its wire name.
    Unknown(String),
}

impl ChatEvent {
    /// Missing text fields become empty strings; a missing timestamp becomes now.
    pub fn from_envelope(env: &Envelope) -> Self {
        let text = |v: Option<&str>| v.unwrap_or_default().to_string();
        let timestamp = || env.timestamp().map(str::to_string).unwrap_or_else(now_rfc3339);

        match env.kind() {
            EnvelopeKind::Message => ChatEvent::MessageReceived {
                message_id: text(env.message_id()),
                sender_id: text(env.sender_id()),
                content: text(env.content()),
                timestamp: timestamp(),
                reply_to_message_id: env.reply_to_message_id().map(str::to_string),
            },
            EnvelopeKind::EditMessage => ChatEvent::MessageEdited {
                message_id: text(env.message_id()),
                new_content: text(env.content()),
                timestamp: timestamp(),
            },
            EnvelopeKind::DeleteMessage => ChatEvent::MessageDeleted {
                message_id: text(env.message_id()),
                timestamp: timestamp(),
            },
            EnvelopeKind::System => ChatEvent::SystemMessage {
                content: text(env.content()),
                timestamp: timestamp(),
            },
            EnvelopeKind::Error => ChatEvent::Error {
                message: env.content().unwrap_or("Unknown error").to_string(),
            },
            other => ChatEvent::Unknown(other.as_str().to_string()),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Chat operations over a shared [`ConnectionManager`].
#[derive(Clone)]
pub struct ChatClient {
    manager: ConnectionManager,
}

impl ChatClient {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub async fn connect(&self, endpoint: &str, credential: SecretString) -> Result<()> {
        info!(endpoint, "chat connect");
        let res = self.manager.connect(endpoint, credential).await;
        match &res {
            Ok(()) => info!(endpoint, "chat connected"),
            Err(e) => error!(endpoint, error.code = e.code().as_str(), error = %e, "chat connect failed"),
        }
        res
    }

    pub async fn disconnect(&self) {
        self.manager.disconnect().await;
        info!("chat disconnected");
    }

    pub async fn status(&self) -> StatusObserver {
        self.manager.subscribe_status().await
    }

    pub async fn join_room(&self, room_id: &str) -> Result<()> {
        let res = self.manager.join_room(room_id).await;
        log_outcome("join_room", room_id, None, &res);
        res
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<()> {
        let res = self.manager.leave_room(room_id).await;
        log_outcome("leave_room", room_id, None, &res);
        res
    }

    /// Send a MESSAGE stamped with the current UTC time.
    pub async fn send_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
        message_id: &str,
        reply_to_message_id: Option<&str>,
    ) -> Result<()> {
        debug!(room = room_id, message_id, len = content.len(), "send_message");
        let mut env = Envelope::new(EnvelopeKind::Message)
            .with_room_id(room_id)
            .with_sender_id(sender_id)
            .with_content(content)
            .with_message_id(message_id)
            .with_timestamp(now_rfc3339());
        if let Some(reply_to) = reply_to_message_id {
            env = env.with_reply_to_message_id(reply_to);
        }
        let res = self.manager.send(&env).await;
        log_outcome("send_message", room_id, Some(message_id), &res);
        res
    }

    pub async fn edit_message(&self, room_id: &str, message_id: &str, new_content: &str) -> Result<()> {
        let env = Envelope::new(EnvelopeKind::EditMessage)
            .with_room_id(room_id)
            .with_message_id(message_id)
            .with_content(new_content)
            .with_timestamp(now_rfc3339());
        let res = self.manager.send(&env).await;
        log_outcome("edit_message", room_id, Some(message_id), &res);
        res
    }

    pub async fn delete_message(&self, room_id: &str, message_id: &str) -> Result<()> {
        let env = Envelope::new(EnvelopeKind::DeleteMessage)
            .with_room_id(room_id)
            .with_message_id(message_id)
            .with_timestamp(now_rfc3339());
        let res = self.manager.send(&env).await;
        log_outcome("delete_message", room_id, Some(message_id), &res);
        res
    }

    /// Typed events for one room, from now on.
    pub fn events(&self, room_id: &str) -> impl Stream<Item = ChatEvent> + Send + 'static {
        let room = room_id.to_string();
        self.manager
            .subscribe_inbound()
            .for_room(room.clone())
            .map(move |env| {
                let event = ChatEvent::from_envelope(&env);
                match &event {
                    ChatEvent::Error { message } => warn!(room = %room, detail = %message, "server error event"),
                    ChatEvent::Unknown(kind) => warn!(room = %room, kind = %kind, "unknown event kind"),
                    _ => debug!(room = %room, message_id = env.message_id().unwrap_or(""), "chat event"),
                }
                event
            })
    }
}

fn log_outcome(op: &'static str, room_id: &str, message_id: Option<&str>, res: &Result<()>) {
    match res {
        Ok(()) => info!(op, room = room_id, message_id = message_id.unwrap_or(""), "chat op sent"),
        Err(e) => warn!(
            op,
            room = room_id,
            message_id = message_id.unwrap_or(""),
            error.code = e.code().as_str(),
            error = %e,
            "chat op failed"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn message_maps_all_fields() {
        let env = Envelope::new(EnvelopeKind::Message)
            .with_room_id("r")
            .with_sender_id("u1")
            .with_content("hi")
            .with_message_id("m1")
            .with_reply_to_message_id("m0")
            .with_timestamp("2024-05-01T10:00:00Z");
        assert_eq!(
            ChatEvent::from_envelope(&env),
            ChatEvent::MessageReceived {
                message_id: "m1".into(),
                sender_id: "u1".into(),
                content: "hi".into(),
                timestamp: "2024-05-01T10:00:00Z".into(),
                reply_to_message_id: Some("m0".into()),
            }
        );
    }

    #[test]
    fn missing_fields_default() {
        let event = ChatEvent::from_envelope(&Envelope::new(EnvelopeKind::EditMessage));
        let ChatEvent::MessageEdited {
            message_id,
            new_content,
            timestamp,
        } = event
        else {
            panic!("expected MessageEdited");
        };
        assert!(message_id.is_empty());
        assert!(new_content.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
    }

    #[test]
    fn error_and_unknown_kinds() {
        assert_eq!(
            ChatEvent::from_envelope(&Envelope::new(EnvelopeKind::Error)),
            ChatEvent::Error {
                message: "Unknown error".into()
            }
        );
        assert_eq!(
            ChatEvent::from_envelope(&Envelope::new(EnvelopeKind::from("TYPING"))),
            ChatEvent::Unknown("TYPING".into())
        );
        assert_eq!(
            ChatEvent::from_envelope(&Envelope::heartbeat()),
            ChatEvent::Unknown("HEARTBEAT".into())
        );
    }
}
