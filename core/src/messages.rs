use std::collections::HashMap;

/// Client-side messages used when the backend gives nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericMessage {
    Unauthorized,
    NotFound,
    ServerError,
    ServiceUnavailable,
    Unexpected,
    Network,
    Fallback,
}

impl GenericMessage {
    /// Message for a non-OK status without a usable body
    pub fn for_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            500 => Self::ServerError,
            503 => Self::ServiceUnavailable,
            _ => Self::Fallback,
        }
    }

    /// Stable key used for overrides in configuration
    pub fn key(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Unexpected => "unexpected",
            Self::Network => "network",
            Self::Fallback => "generic",
        }
    }

    pub fn default_text(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Your session has expired. Please sign in again.",
            Self::NotFound => "The requested resource was not found.",
            Self::ServerError => "The server encountered an error. Please try again later.",
            Self::ServiceUnavailable => "The service is temporarily unavailable.",
            Self::Unexpected => "The server returned an unexpected response.",
            Self::Network => "A network error occurred. Check your connection.",
            Self::Fallback => "Something went wrong. Please try again.",
        }
    }
}

/// Resolves generic messages, preferring configured overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCatalog {
    overrides: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn text(&self, message: GenericMessage) -> String {
        self.overrides
            .get(message.key())
            .filter(|text| !text.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| message.default_text().to_string())
    }
}
