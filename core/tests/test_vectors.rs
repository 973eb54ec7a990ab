//! Verify payload normalization and request shaping against JSON test
//! vectors stored in `test-vectors/`.
//!
//! `normalize.json` gives a JSON payload as a caller would pass it and the
//! wire form it must normalize to. Multipart cases only assert the variant
//! and that the entries come back untouched; their encoding is covered by
//! the transport.
//!
//! `build_request.json` gives a verb, path and payload and the request the
//! client must build from them.

use tribehr_core::client::user_agent;
use tribehr_core::{build_data, ClientConfig, NormalizedPayload, Payload, RequestBody, TribeHrClient};

#[test]
fn normalize_test_vectors() {
    let raw = include_str!("../../test-vectors/normalize.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let payload = Payload::from_json(&case["input"]).unwrap();
        let expected = &case["expected"];
        let normalized = build_data(&payload);

        match expected["kind"].as_str().unwrap() {
            "empty" => assert_eq!(normalized, NormalizedPayload::Empty, "{name}"),
            "raw" => assert_eq!(
                normalized,
                NormalizedPayload::Raw(expected["body"].as_str().unwrap().to_string()),
                "{name}"
            ),
            "form" => assert_eq!(
                normalized,
                NormalizedPayload::Form(expected["body"].as_str().unwrap().to_string()),
                "{name}"
            ),
            "multipart" => {
                let Payload::Structured(entries) = &payload else {
                    panic!("{name}: multipart input must be an object");
                };
                assert_eq!(normalized, NormalizedPayload::Multipart(entries.clone()), "{name}");
            }
            other => panic!("{name}: unknown kind {other}"),
        }
    }
}

#[test]
fn normalization_is_deterministic() {
    let raw = include_str!("../../test-vectors/normalize.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let payload = Payload::from_json(&case["input"]).unwrap();
        assert_eq!(build_data(&payload), build_data(&payload.clone()));
    }
}

#[test]
fn build_request_test_vectors() {
    let raw = include_str!("../../test-vectors/build_request.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();
    let client = TribeHrClient::new(ClientConfig::new("acme", "admin", "s3cret"));

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let payload = Payload::from_json(&case["payload"]).unwrap();
        let expected = &case["expected"];

        let req = client.build_request(
            case["path"].as_str().unwrap(),
            case["method"].as_str().unwrap(),
            &payload,
        );

        assert_eq!(req.method.as_str(), expected["method"].as_str().unwrap(), "{name}");
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}");
        assert_eq!(req.header("User-Agent"), Some(user_agent().as_str()), "{name}");

        let headers: Vec<(String, String)> = req
            .headers
            .iter()
            .filter(|(header, _)| header != "User-Agent")
            .cloned()
            .collect();
        let want: Vec<(String, String)> = serde_json::from_value(expected["headers"].clone()).unwrap();
        assert_eq!(headers, want, "{name}");

        match (&expected["body"], &req.body) {
            (serde_json::Value::Null, None) => {}
            (serde_json::Value::String(kind), Some(RequestBody::Multipart(_))) if kind == "multipart" => {}
            (body, Some(RequestBody::Encoded(encoded))) if body["encoded"].is_string() => {
                assert_eq!(encoded, body["encoded"].as_str().unwrap(), "{name}");
            }
            (want, got) => panic!("{name}: expected body {want}, got {got:?}"),
        }
    }
}
