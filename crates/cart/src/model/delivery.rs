//! Delivery intents and their string representation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How an item reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// Shipped to an address.
    Delivery,
    /// Collected by the customer at a location.
    Pickup,
    #[default]
    Unspecified,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Delivery => "delivery",
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::Unspecified => "unspecified",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = DeliveryIntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(DeliveryMethod::Delivery),
            "pickup" => Ok(DeliveryMethod::Pickup),
            "unspecified" => Ok(DeliveryMethod::Unspecified),
            other => Err(DeliveryIntentError::UnknownMethod(other.to_string())),
        }
    }
}

/// Kind of location a pickup happens at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryLocationType {
    Store,
    CollectionPoint,
}

impl DeliveryLocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryLocationType::Store => "store",
            DeliveryLocationType::CollectionPoint => "collection-point",
        }
    }

    /// Token used inside the intent string representation.
    fn representation_token(&self) -> &'static str {
        match self {
            DeliveryLocationType::Store => "store",
            DeliveryLocationType::CollectionPoint => "collectionpoint",
        }
    }
}

impl std::fmt::Display for DeliveryLocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised when parsing delivery intents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryIntentError {
    #[error("Unrecognized delivery intent: {0:?}")]
    Unrecognized(String),

    #[error("Unknown delivery method: {0:?}")]
    UnknownMethod(String),
}

/// Structured description of how a cart item should be delivered.
///
/// String representations:
///
/// ```text
/// delivery
/// pickup_autodetect
/// pickup_store_<location code>
/// pickup_collectionpoint_<location code>
/// unspecified
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeliveryIntent {
    pub method: DeliveryMethod,
    pub location_code: String,
    pub location_type: Option<DeliveryLocationType>,
}

impl DeliveryIntent {
    pub fn delivery() -> Self {
        Self {
            method: DeliveryMethod::Delivery,
            ..Self::default()
        }
    }

    /// Pickup at a location that still has to be detected.
    pub fn pickup_autodetect() -> Self {
        Self {
            method: DeliveryMethod::Pickup,
            ..Self::default()
        }
    }

    /// Pickup at a known location.
    pub fn pickup_at(location_type: DeliveryLocationType, code: impl Into<String>) -> Self {
        Self {
            method: DeliveryMethod::Pickup,
            location_code: code.into(),
            location_type: Some(location_type),
        }
    }

    pub fn unspecified() -> Self {
        Self::default()
    }

    /// Returns true for a pickup intent with no location code yet.
    pub fn needs_location_detection(&self) -> bool {
        self.method == DeliveryMethod::Pickup && self.location_code.is_empty()
    }

    /// Returns a copy of this intent bound to the given location.
    pub fn with_location(&self, location_type: DeliveryLocationType, code: impl Into<String>) -> Self {
        Self {
            method: self.method,
            location_code: code.into(),
            location_type: Some(location_type),
        }
    }
}

impl std::fmt::Display for DeliveryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.method {
            DeliveryMethod::Delivery => write!(f, "delivery"),
            DeliveryMethod::Unspecified => write!(f, "unspecified"),
            DeliveryMethod::Pickup if self.location_code.is_empty() => {
                write!(f, "pickup_autodetect")
            }
            DeliveryMethod::Pickup => {
                let location_type = self.location_type.unwrap_or(DeliveryLocationType::Store);
                write!(
                    f,
                    "pickup_{}_{}",
                    location_type.representation_token(),
                    self.location_code
                )
            }
        }
    }
}

impl std::str::FromStr for DeliveryIntent {
    type Err = DeliveryIntentError;

    /// Strict parse: only canonical representations are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("delivery"), None, None) => Ok(DeliveryIntent::delivery()),
            (Some("unspecified"), None, None) => Ok(DeliveryIntent::unspecified()),
            (Some("pickup"), Some("autodetect"), None) => Ok(DeliveryIntent::pickup_autodetect()),
            (Some("pickup"), Some("store"), Some(code)) if !code.is_empty() => Ok(
                DeliveryIntent::pickup_at(DeliveryLocationType::Store, code),
            ),
            (Some("pickup"), Some("collectionpoint"), Some(code)) if !code.is_empty() => Ok(
                DeliveryIntent::pickup_at(DeliveryLocationType::CollectionPoint, code),
            ),
            _ => Err(DeliveryIntentError::Unrecognized(s.to_string())),
        }
    }
}

/// Turns free-form intent strings from requests into [`DeliveryIntent`]s.
///
/// Lenient: a bare `pickup` means autodetect, anything unrecognized
/// resolves to an unspecified intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryIntentResolver;

impl DeliveryIntentResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, representation: &str) -> DeliveryIntent {
        let representation = representation.trim();
        if representation == "pickup" {
            return DeliveryIntent::pickup_autodetect();
        }

        match representation.parse() {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to unspecified delivery intent");
                DeliveryIntent::unspecified()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEPTED: &[&str] = &[
        "delivery",
        "unspecified",
        "pickup_autodetect",
        "pickup_store_berlin-mitte",
        "pickup_collectionpoint_cp_42",
    ];

    #[test]
    fn test_representation_round_trip() {
        for repr in ACCEPTED {
            let intent: DeliveryIntent = repr.parse().unwrap();
            assert_eq!(intent.to_string(), *repr);
        }
    }

    #[test]
    fn test_parse_store_pickup() {
        let intent: DeliveryIntent = "pickup_store_berlin-mitte".parse().unwrap();
        assert_eq!(intent.method, DeliveryMethod::Pickup);
        assert_eq!(intent.location_type, Some(DeliveryLocationType::Store));
        assert_eq!(intent.location_code, "berlin-mitte");
        assert!(!intent.needs_location_detection());
    }

    #[test]
    fn test_location_code_may_contain_separator() {
        let intent: DeliveryIntent = "pickup_collectionpoint_cp_42".parse().unwrap();
        assert_eq!(intent.location_code, "cp_42");
    }

    #[test]
    fn test_strict_parse_rejects_unknown() {
        assert!("pickup".parse::<DeliveryIntent>().is_err());
        assert!("pickup_store_".parse::<DeliveryIntent>().is_err());
        assert!("teleport".parse::<DeliveryIntent>().is_err());
    }

    #[test]
    fn test_resolver_is_lenient() {
        let resolver = DeliveryIntentResolver::new();
        assert_eq!(resolver.resolve("pickup"), DeliveryIntent::pickup_autodetect());
        assert_eq!(resolver.resolve("teleport"), DeliveryIntent::unspecified());
        assert_eq!(resolver.resolve(" delivery "), DeliveryIntent::delivery());
    }

    #[test]
    fn test_with_location_keeps_method() {
        let intent = DeliveryIntent::pickup_autodetect()
            .with_location(DeliveryLocationType::CollectionPoint, "cp-1");
        assert_eq!(intent.to_string(), "pickup_collectionpoint_cp-1");
    }

    #[test]
    fn test_delivery_method_parse() {
        assert_eq!("pickup".parse::<DeliveryMethod>(), Ok(DeliveryMethod::Pickup));
        assert!("drone".parse::<DeliveryMethod>().is_err());
    }
}
