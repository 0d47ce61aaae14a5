//! Whole-body properties of the streaming protocol: the decoder must
//! reconstruct the same turn no matter how the network splits the body.

use agentprd_core::protocol::{
    DecodedStream, DecoderUpdate, GenerationEvent, StreamDecoder, StreamEncoder, StreamMetadata,
    ToolCallState, recover_metadata,
};
use agentprd_core::sessions::{ChatMessage, MessageRole};
use chrono::{TimeZone, Utc};
use serde_json::json;

fn sample_events() -> Vec<GenerationEvent> {
    vec![
        GenerationEvent::Text("Let me save ".into()),
        GenerationEvent::ToolCallStart {
            id: "c1".into(),
            name: "store_prd".into(),
        },
        GenerationEvent::ToolCall {
            id: "c1".into(),
            name: "store_prd".into(),
            args: json!({"title": "Checkout", "content": "# Goals\n- faster ✓"}),
        },
        GenerationEvent::ToolCallStart {
            id: "c2".into(),
            name: "get_note".into(),
        },
        GenerationEvent::ToolResult {
            id: "c1".into(),
            name: "store_prd".into(),
            result: json!({"status": "saved", "slug": "checkout"}),
        },
        GenerationEvent::StepFinish { continued: true },
        GenerationEvent::Text("that PRD — done. Ünïcödé\nsecond line".into()),
        GenerationEvent::StepFinish { continued: false },
    ]
}

fn message(role: MessageRole, content: &str, second: u32) -> ChatMessage {
    ChatMessage {
        role,
        content: content.into(),
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, second).unwrap(),
    }
}

fn sample_metadata() -> StreamMetadata {
    StreamMetadata {
        session_id: "session-42".into(),
        conversation_history: vec![
            message(MessageRole::User, "save the checkout PRD", 0),
            message(MessageRole::Assistant, "Let me save that PRD — done.", 4),
        ],
        needs_approval: false,
    }
}

fn encode(events: &[GenerationEvent], metadata: &StreamMetadata) -> Vec<u8> {
    let mut encoder = StreamEncoder::new();
    let mut body = String::new();
    for event in events {
        body.push_str(&encoder.encode(event));
    }
    body.push_str(&encoder.finish(metadata));
    body.into_bytes()
}

fn decode_in_pieces(pieces: &[&[u8]]) -> (DecodedStream, String) {
    let mut decoder = StreamDecoder::new();
    let mut live_text = String::new();
    let mut collect = |updates: Vec<DecoderUpdate>| {
        for update in updates {
            if let DecoderUpdate::Text(t) = update {
                live_text.push_str(&t);
            }
        }
    };
    for piece in pieces {
        collect(decoder.push(piece));
    }
    collect(decoder.finish());
    (decoder.into_decoded(), live_text)
}

#[test]
fn every_two_way_split_decodes_identically() {
    let body = encode(&sample_events(), &sample_metadata());
    let reference = StreamDecoder::decode(&body);

    for split in 0..=body.len() {
        let (head, tail) = body.split_at(split);
        let (decoded, live) = decode_in_pieces(&[head, tail]);
        assert_eq!(decoded, reference, "split at byte {split}");
        assert_eq!(live, reference.content, "live text at split {split}");
    }
}

#[test]
fn byte_by_byte_decodes_identically() {
    let body = encode(&sample_events(), &sample_metadata());
    let reference = StreamDecoder::decode(&body);
    let pieces: Vec<&[u8]> = body.chunks(1).collect();
    let (decoded, live) = decode_in_pieces(&pieces);
    assert_eq!(decoded, reference);
    assert_eq!(live, reference.content);
}

#[test]
fn encode_decode_round_trip() {
    let events = sample_events();
    let metadata = sample_metadata();
    let decoded = StreamDecoder::decode(&encode(&events, &metadata));

    let expected_text: String = events
        .iter()
        .filter_map(|e| match e {
            GenerationEvent::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(decoded.content, expected_text);

    let expected_events: Vec<_> = events.iter().filter_map(|e| e.to_tool_event()).collect();
    assert_eq!(decoded.tool_events, expected_events);
    assert_eq!(decoded.metadata, Some(metadata));
}

#[test]
fn active_set_is_split_independent() {
    let body = encode(&sample_events(), &sample_metadata());
    let reference = StreamDecoder::decode(&body);
    // c2 started but never reported a result
    assert_eq!(reference.active_tool_calls, vec!["c2".to_string()]);

    for split in (0..=body.len()).step_by(7) {
        let (head, tail) = body.split_at(split);
        let mut decoder = StreamDecoder::new();
        decoder.push(head);
        decoder.push(tail);
        decoder.finish();
        assert_eq!(decoder.tracker().active_count(), 1, "split at {split}");
        assert_eq!(decoder.tracker().state("c1"), Some(ToolCallState::Completed));
        assert_eq!(decoder.tracker().state("c2"), Some(ToolCallState::Started));
    }
}

#[test]
fn truncated_metadata_never_panics() {
    let body = encode(&sample_events(), &sample_metadata());
    let full = StreamDecoder::decode(&body);
    let text_len = body.len() - serde_json::to_string(&sample_metadata()).unwrap().len();

    for cut in text_len..body.len() {
        let decoded = StreamDecoder::decode(&body[..cut]);
        assert_eq!(decoded.content, full.content, "cut at {cut}");
        // A truncated object cannot be the full record
        assert_ne!(decoded.metadata, full.metadata, "cut at {cut}");
    }
}

#[test]
fn trailing_garbage_after_metadata_is_recovered() {
    let mut body = encode(&[GenerationEvent::Text("hi".into())], &sample_metadata());
    body.extend_from_slice(b"\r\n0\r\n}garbage{");
    let decoded = StreamDecoder::decode(&body);
    assert_eq!(decoded.content, "hi");
    assert_eq!(decoded.metadata, Some(sample_metadata()));
}

#[test]
fn recover_metadata_edge_cases() {
    assert!(recover_metadata("").is_none());
    assert!(recover_metadata("no braces at all").is_none());
    assert!(recover_metadata("{\"sessionId\": ").is_none());
    let meta = recover_metadata("junk {\"sessionId\":\"x\"} {\"more\":1}").unwrap();
    assert_eq!(meta.session_id, "x");
}

#[test]
fn missing_metadata_yields_content_only() {
    let mut encoder = StreamEncoder::new();
    let body = encoder.encode(&GenerationEvent::Text("partial answer".into()));
    let decoded = StreamDecoder::decode(body.as_bytes());
    assert_eq!(decoded.content, "partial answer");
    assert!(decoded.metadata.is_none());
}

#[test]
fn sentinel_lookalike_text_is_preserved_across_splits() {
    let text = "see \n__AGENTPRD_ and \n__AGENTPRD_METADATA without newline\n";
    let mut encoder = StreamEncoder::new();
    let mut body = encoder.encode(&GenerationEvent::Text(text.into()));
    body.push_str(&encoder.finish(&sample_metadata()));
    let bytes = body.as_bytes();

    for split in 0..=bytes.len() {
        let (decoded, _) = decode_in_pieces(&[&bytes[..split], &bytes[split..]]);
        assert_eq!(decoded.content, text, "split at {split}");
        assert!(decoded.metadata.is_some());
    }
}
