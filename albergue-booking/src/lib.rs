pub mod availability;
pub mod error;
pub mod expiry;
pub mod lifecycle;
pub mod models;
pub mod payment;
pub mod settlement;
pub mod store;

pub use error::BookingError;
pub use models::{
    AvailabilitySummary, BookingRequest, HoldConfirmation, Reservation, ReservationStatus,
    StayRange,
};
pub use payment::{PaymentEvent, PaymentOutcome, PaymentRecord, PaymentStatus};
pub use settlement::SettlementCoordinator;
pub use store::BookingStore;
