use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for guest-identifying data that masks its value in Debug and Display output.
///
/// Guest references arrive from the registration side already scoped for GDPR handling;
/// inside the engine they only need to survive round trips to the store and stay out of
/// log lines. Serialization passes the real value through so store implementations and
/// API responses see the actual reference.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

/// The engine's handle on a guest: an opaque reference issued by the registration system.
pub type GuestRef = Masked<String>;

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Masking is for log macros like tracing::info!("{:?}", reservation); persisted
        // and returned values carry the real reference.
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Masked(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}

impl From<&str> for Masked<String> {
    fn from(value: &str) -> Self {
        Masked(value.to_string())
    }
}
