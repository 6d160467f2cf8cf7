pub mod events;
pub mod pii;

pub use pii::{GuestRef, Masked};
