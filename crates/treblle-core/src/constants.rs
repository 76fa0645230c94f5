//! Constants shared across Treblle integrations.

/// Default Treblle collector endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://rocknrolla.treblle.com";

/// Value written in place of every masked field.
pub const MASK_MARKER: &str = "*****";

/// Field names masked regardless of configuration.
pub const DEFAULT_FIELDS_TO_MASK: &[&str] = &[
    "password",
    "pwd",
    "secret",
    "password_confirmation",
    "passwordConfirmation",
    "cc",
    "card_number",
    "cardNumber",
    "ccv",
    "ssn",
    "credit_score",
    "creditScore",
];

/// Largest request or response body, in bytes, captured into a payload.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Error type recorded when a response body is not valid JSON.
pub const INVALID_JSON_ERROR_TYPE: &str = "INVALID_JSON";

/// Error source recorded for errors detected after the handler completed.
pub const ON_SHUTDOWN_ERROR_SOURCE: &str = "onShutdown";

/// IP reported when the client address cannot be determined.
pub const UNKNOWN_IP: &str = "bogon";

/// Name of the header carrying the api key on outbound requests.
pub const API_KEY_HEADER: &str = "x-api-key";
