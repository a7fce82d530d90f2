use super::booking::BookingId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event type the processor sends when a payment intent settles.
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Provider-shaped webhook envelope, deserialized at the boundary.
/// Signature verification happens in the external receiver before the
/// event reaches this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookData {
    pub object: PaymentIntent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units (pence).
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: IntentMetadata,
}

/// Metadata values arrive as strings, per processor convention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentMetadata {
    #[serde(default)]
    pub booking_id: Option<String>,
}

impl WebhookEvent {
    pub fn is_payment_succeeded(&self) -> bool {
        self.kind == PAYMENT_SUCCEEDED
    }
}

impl PaymentIntent {
    /// Minor units to pounds.
    pub fn amount_major(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.metadata
            .booking_id
            .as_deref()
            .and_then(|raw| raw.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_provider_payload() {
        let payload = r#"{
            "id": "evt_test_1",
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_test_1",
                    "amount": 5000,
                    "currency": "gbp",
                    "status": "succeeded",
                    "metadata": {
                        "booking_id": "1",
                        "mentee_id": "21",
                        "mentor_id": "7"
                    }
                }
            },
            "created": 1767225600
        }"#;
        let event: WebhookEvent = serde_json::from_str(payload).unwrap();
        assert!(event.is_payment_succeeded());
        assert_eq!(event.data.object.amount_major(), dec!(50.00));
        assert_eq!(event.data.object.booking_id(), Some(1));
    }

    #[test]
    fn test_missing_metadata_is_tolerated() {
        let payload = r#"{
            "id": "evt_test_2",
            "type": "charge.updated",
            "data": { "object": { "id": "ch_1", "amount": 100 } }
        }"#;
        let event: WebhookEvent = serde_json::from_str(payload).unwrap();
        assert!(!event.is_payment_succeeded());
        assert_eq!(event.data.object.booking_id(), None);
    }
}
