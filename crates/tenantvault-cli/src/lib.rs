use serde::Serialize;
use tenantvault_core::{ErrorMetadata, GatewayError};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Machine-readable failure printed to stderr.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error_code: &'static str,
    pub error_type: String,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
}

/// Describe a gateway error. Sensitive details are replaced by the client
/// message when `hide_sensitive` is set (production).
pub fn error_report(err: &GatewayError, hide_sensitive: bool) -> ErrorReport {
    let message = if hide_sensitive && err.is_sensitive() {
        err.client_message()
    } else {
        err.to_string()
    };

    ErrorReport {
        error_code: err.error_code(),
        error_type: err.error_type().to_string(),
        message,
        recoverable: err.is_recoverable(),
        suggested_action: err.suggested_action(),
    }
}
