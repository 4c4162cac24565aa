// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Structured payload extraction from free-form model replies.
//!
//! Models wrap JSON in prose or markdown fences. The first well-formed JSON
//! object wins; a fenced block is preferred when one parses.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// First well-formed JSON object in `text`.
pub fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Some(fenced) = fenced_block(text) {
        if let Some(object) = scan_objects(fenced) {
            return Some(object);
        }
    }
    scan_objects(text)
}

/// Extract the first JSON object and deserialize it into `T`.
pub fn extract_payload<T: DeserializeOwned>(text: &str) -> Option<T> {
    first_json_object(text).and_then(|object| serde_json::from_value(Value::Object(object)).ok())
}

fn fenced_block(text: &str) -> Option<&str> {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                return Some(text[content_start..content_start + end_offset].trim());
            }
        }
    }
    None
}

fn scan_objects(text: &str) -> Option<Map<String, Value>> {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(offset, _)| {
            let mut stream = serde_json::Deserializer::from_str(&text[offset..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(Value::Object(object))) => Some(object),
                _ => None,
            }
        })
}
