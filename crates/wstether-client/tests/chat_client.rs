#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use futures_util::StreamExt;

use wstether_client::services::{ChatClient, ChatEvent};
use wstether_client::transport::SocketEvent;
use wstether_core::protocol::{codec, EnvelopeKind};

use support::{manager, settle, token, Step, ENDPOINT};

#[tokio::test(start_paused = true)]
async fn outbound_chat_operations() {
    let (m, transport) = manager([Step::Accept]);
    let chat = ChatClient::new(m);
    chat.connect(ENDPOINT, token()).await.unwrap();

    chat.send_message("room-42", "u1", "hello", "m1", Some("m0")).await.unwrap();
    chat.edit_message("room-42", "m1", "hello!").await.unwrap();
    chat.delete_message("room-42", "m1").await.unwrap();

    let sent: Vec<_> = transport
        .socket(0)
        .sent()
        .iter()
        .map(|f| codec::decode(f).unwrap())
        .collect();
    assert_eq!(sent.len(), 3);

    let msg = &sent[0];
    assert_eq!(msg.kind(), &EnvelopeKind::Message);
    assert_eq!(msg.room_id(), Some("room-42"));
    assert_eq!(msg.sender_id(), Some("u1"));
    assert_eq!(msg.content(), Some("hello"));
    assert_eq!(msg.message_id(), Some("m1"));
    assert_eq!(msg.reply_to_message_id(), Some("m0"));
    assert!(chrono::DateTime::parse_from_rfc3339(msg.timestamp().unwrap()).is_ok());

    assert_eq!(sent[1].kind(), &EnvelopeKind::EditMessage);
    assert_eq!(sent[1].content(), Some("hello!"));
    assert_eq!(sent[2].kind(), &EnvelopeKind::DeleteMessage);
    assert_eq!(sent[2].content(), None);
}

#[tokio::test(start_paused = true)]
async fn chat_operations_fail_when_disconnected() {
    let (m, _transport) = manager([]);
    let chat = ChatClient::new(m);
    let err = chat.send_message("r", "u1", "hi", "m1", None).await.unwrap_err();
    assert_eq!(err.code().as_str(), "NOT_CONNECTED");

    assert!(chat.join_room("r").await.is_err());
    assert!(chat.manager().is_member("r"));
}

#[tokio::test(start_paused = true)]
async fn room_events_are_typed_and_filtered() {
    let (m, transport) = manager([Step::Accept]);
    let chat = ChatClient::new(m);
    let events = chat.events("room-42");
    chat.connect(ENDPOINT, token()).await.unwrap();

    let socket = transport.socket(0);
    for frame in [
        r#"{"type":"MESSAGE","roomId":"room-42","senderId":"u2","content":"hi","messageId":"m9","timestamp":"2024-05-01T10:00:00Z"}"#,
        r#"{"type":"MESSAGE","roomId":"other","content":"not for us"}"#,
        r#"{"type":"DELETE_MESSAGE","roomId":"room-42","messageId":"m9","timestamp":"2024-05-01T10:01:00Z"}"#,
        r#"{"type":"ERROR","roomId":"room-42"}"#,
        r#"{"type":"TYPING","roomId":"room-42","senderId":"u2"}"#,
    ] {
        socket.emit(SocketEvent::Message(frame.to_string()));
    }
    settle().await;

    let got: Vec<ChatEvent> = events.take(4).collect().await;
    assert_eq!(
        got,
        vec![
            ChatEvent::MessageReceived {
                message_id: "m9".into(),
                sender_id: "u2".into(),
                content: "hi".into(),
                timestamp: "2024-05-01T10:00:00Z".into(),
                reply_to_message_id: None,
            },
            ChatEvent::MessageDeleted {
                message_id: "m9".into(),
                timestamp: "2024-05-01T10:01:00Z".into(),
            },
            ChatEvent::Error {
                message: "Unknown error".into()
            },
            ChatEvent::Unknown("TYPING".into()),
        ]
    );
}
