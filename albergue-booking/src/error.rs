use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// No bed matched the requested stay, or the chosen bed was claimed by a
    /// concurrent request. Recoverable: retry with other dates.
    #[error("no bed available for the requested stay")]
    BedUnavailable,

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Payment arrived for a reservation that is no longer holding its bed
    /// (expired, cancelled, or already settled). Money has moved, so this is
    /// always surfaced to the caller for reconciliation.
    #[error("settlement conflict: reservation {0} is no longer holding its bed")]
    SettlementConflict(Uuid),

    /// The gateway reported the payment itself failed. Distinct from
    /// SettlementConflict so downstream refund and retry flows don't confuse
    /// the two.
    #[error("payment declined for reservation {0}")]
    PaymentDeclined(Uuid),

    #[error("not found: {0}")]
    NotFound(Uuid),

    #[error("check-out date must be after check-in date")]
    InvalidStay,

    #[error("storage error: {0}")]
    Store(String),
}

impl BookingError {
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        BookingError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
