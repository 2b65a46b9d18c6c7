//! Conformance checks for the chat wire vocabulary through the public API.
//!
//! These exercise frame encoding and decoding exactly as a server would see
//! them, including the opaque passthrough for event types this client does
//! not know about.

use chatlink::protocol::{InboundEvent, OutboundFrame, decode_event};
use serde_json::{Value, json};

#[test]
fn outbound_frames_match_the_documented_shapes() {
    let message = OutboundFrame::ChatMessage {
        content: "hello".into(),
        api_key: None,
    };
    let encoded = message.encode().expect("encode");
    assert!(encoded.starts_with(r#"{"type":"#), "discriminant must lead: {encoded}");
    let value: Value = serde_json::from_str(&encoded).expect("valid JSON");
    assert_eq!(value, json!({"type": "chat_message", "content": "hello"}));

    let keyed = OutboundFrame::ChatMessage {
        content: "hello".into(),
        api_key: Some("key-1".into()),
    };
    let value: Value = serde_json::from_str(&keyed.encode().expect("encode")).expect("valid JSON");
    assert_eq!(
        value,
        json!({"type": "chat_message", "content": "hello", "api_key": "key-1"})
    );

    assert_eq!(
        OutboundFrame::Ping.encode().expect("encode"),
        r#"{"type":"ping"}"#
    );
}

#[test]
fn streaming_transcript_decodes_in_order() {
    let transcript = [
        r#"{"type":"user_message","message":{"content":"hi there"}}"#,
        r#"{"type":"assistant_typing","status":true}"#,
        r#"{"type":"assistant_message_chunk","chunk":"Hel"}"#,
        r#"{"type":"assistant_message_chunk","chunk":"lo!"}"#,
        r#"{"type":"assistant_typing","status":false}"#,
        r#"{"type":"assistant_message_complete","message":{"id":"m1","content":"Hello!","timestamp":"2025-03-01T12:00:00Z","model_used":"sonnet-mini","response_time_ms":180}}"#,
        r#"{"type":"pong"}"#,
    ];

    let events: Vec<InboundEvent> = transcript
        .iter()
        .map(|frame| decode_event(frame).expect("every transcript frame decodes"))
        .collect();

    assert!(matches!(events[0], InboundEvent::UserMessage { .. }));
    assert_eq!(events[1], InboundEvent::AssistantTyping { status: true });
    assert_eq!(events[4], InboundEvent::AssistantTyping { status: false });
    assert_eq!(events[6], InboundEvent::Pong);

    // Chunks assemble into exactly what the completion carries.
    let mut streamed = String::new();
    for event in &events {
        if let InboundEvent::AssistantMessageChunk { chunk } = event {
            streamed.push_str(chunk);
        }
    }
    assert_eq!(streamed, "Hello!");

    let InboundEvent::AssistantMessageComplete { message } = &events[5] else {
        panic!("expected a completion event");
    };
    assert_eq!(message.content, streamed);
    assert_eq!(message.model_used, "sonnet-mini");
    assert_eq!(message.response_time_ms, 180);
}

#[test]
fn offset_timestamps_normalize_to_utc() {
    let raw = r#"{"type":"assistant_message_complete","message":{"id":"m2","content":"ciao","timestamp":"2025-03-01T13:30:00+01:30","model_used":"sonnet-mini","response_time_ms":90}}"#;
    let InboundEvent::AssistantMessageComplete { message } =
        decode_event(raw).expect("decode")
    else {
        panic!("expected a completion event");
    };
    assert_eq!(message.timestamp.to_rfc3339(), "2025-03-01T12:00:00+00:00");
}

#[test]
fn unknown_event_types_pass_through_opaquely() {
    let event = decode_event(
        r#"{"type":"conversation_renamed","conversation_id":"c1","title":"Trip planning"}"#,
    )
    .expect("decode");

    let InboundEvent::Application { event_type, payload } = event else {
        panic!("expected an application event");
    };
    assert_eq!(event_type, "conversation_renamed");
    // The payload is the complete frame, discriminant included.
    assert_eq!(payload["type"], "conversation_renamed");
    assert_eq!(payload["title"], "Trip planning");
    assert_eq!(payload["conversation_id"], "c1");
}

#[test]
fn malformed_frames_fail_without_poisoning_later_ones() {
    assert!(decode_event("this is not JSON").is_err());
    assert!(decode_event(r#"{"no":"type"}"#).is_err());
    assert!(decode_event(r#"{"type":"assistant_typing","status":"yes"}"#).is_err());

    // A well-formed frame right after the garbage still decodes.
    assert_eq!(
        decode_event(r#"{"type":"assistant_message_chunk","chunk":"Hi"}"#).expect("decode"),
        InboundEvent::AssistantMessageChunk { chunk: "Hi".into() }
    );
}
