use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the payment collaborator reported for a reservation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "CANCELLED" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

/// One payment event per reservation, emitted by the external gateway. The
/// engine only consumes these; it never talks to the gateway itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub reservation_id: Uuid,
    pub outcome: PaymentOutcome,
    pub amount_cents: i32,
    pub method: Option<String>,
    /// Raw gateway payload, kept for reconciliation.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PaymentEvent {
    pub fn success(reservation_id: Uuid, amount_cents: i32) -> Self {
        Self {
            reservation_id,
            outcome: PaymentOutcome::Success,
            amount_cents,
            method: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn failure(reservation_id: Uuid, amount_cents: i32) -> Self {
        Self {
            reservation_id,
            outcome: PaymentOutcome::Failure,
            amount_cents,
            method: None,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Bookkeeping row for a reservation's payment, created PENDING together
/// with the hold and resolved by settlement, expiry, or cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub reservation_id: Uuid,
    pub amount_cents: i32,
    pub currency: String,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn pending(
        reservation_id: Uuid,
        amount_cents: i32,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reservation_id,
            amount_cents,
            currency: currency.into(),
            method: None,
            status: PaymentStatus::Pending,
            updated_at: now,
        }
    }
}
