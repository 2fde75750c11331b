//! End-to-end checks of the webhook intake path that do not need a
//! database: signature verification over raw bodies and payload walking.

use leadserver::security::signature;
use leadserver::shared::models::MessageKind;
use leadserver::whatsapp::inbound::{extract_content, WebhookPayload};

const APP_SECRET: &str = "shhh-app-secret";

fn sample_body() -> String {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "entry-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15551234567",
                        "phone_number_id": "111222333"
                    },
                    "contacts": [{
                        "wa_id": "5511988887777",
                        "profile": { "name": "Bruno" }
                    }],
                    "messages": [{
                        "id": "wamid.abc",
                        "from": "5511988887777",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": { "body": "Quero saber mais" }
                    }],
                    "statuses": [{
                        "id": "wamid.out1",
                        "status": "read",
                        "timestamp": "1700000050",
                        "recipient_id": "5511988887777"
                    }]
                }
            }]
        }]
    })
    .to_string()
}

#[test]
fn signed_body_passes_verification() {
    let body = sample_body();
    let header = signature::sign(APP_SECRET, body.as_bytes());
    assert!(header.starts_with("sha256="));
    assert!(signature::verify(APP_SECRET, body.as_bytes(), &header));
}

#[test]
fn tampered_body_fails_verification() {
    let body = sample_body();
    let header = signature::sign(APP_SECRET, body.as_bytes());
    let tampered = body.replace("Quero saber mais", "Quero cancelar");
    assert!(!signature::verify(APP_SECRET, tampered.as_bytes(), &header));
}

#[test]
fn wrong_secret_fails_verification() {
    let body = sample_body();
    let header = signature::sign(APP_SECRET, body.as_bytes());
    assert!(!signature::verify("other-secret", body.as_bytes(), &header));
}

#[test]
fn payload_carries_messages_and_statuses_together() {
    let payload: WebhookPayload = serde_json::from_str(&sample_body()).unwrap();
    assert_eq!(payload.object, "whatsapp_business_account");

    let value = &payload.entry[0].changes[0].value;
    assert_eq!(value.messages.len(), 1);
    assert_eq!(value.statuses.len(), 1);
    assert_eq!(value.metadata.phone_number_id.as_deref(), Some("111222333"));

    let (content, kind, media) = extract_content(&value.messages[0]).unwrap();
    assert_eq!(content, "Quero saber mais");
    assert_eq!(kind, MessageKind::Text);
    assert!(media.is_none());

    assert_eq!(value.statuses[0].status, "read");
}

#[test]
fn non_message_fields_are_distinguishable() {
    let body = serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "entry-2",
            "changes": [{
                "field": "account_update",
                "value": { "messaging_product": "whatsapp" }
            }]
        }]
    })
    .to_string();

    let payload: WebhookPayload = serde_json::from_str(&body).unwrap();
    assert_eq!(payload.entry[0].changes[0].field, "account_update");
    assert!(payload.entry[0].changes[0].value.messages.is_empty());
}
