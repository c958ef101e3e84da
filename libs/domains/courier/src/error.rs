//! Error types for the courier domain.

use thiserror::Error;

use crate::models::SubscriptionId;

/// Result type for courier operations.
pub type CourierResult<T> = Result<T, CourierError>;

/// Errors that can occur in the courier domain.
///
/// Dispatch never hands these back to the entity store that triggered an
/// event; they surface only from caller-facing services (recipient, template
/// and subscription administration).
#[derive(Debug, Error)]
pub enum CourierError {
    /// Entity type or site could not be resolved.
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Subscription does not exist (by id or title).
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Template does not exist.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Malformed template or missing context variable.
    #[error("Template rendering error: {0}")]
    TemplateRender(String),

    /// Mail delivery failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Recipient already subscribed to this subscription.
    #[error("{email} is already a recipient of '{subscription}'")]
    DuplicateRecipient { email: String, subscription: String },

    /// Invalid input such as an empty or malformed email address.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Subscription title already taken.
    #[error("Subscription with title '{0}' already exists")]
    DuplicateTitle(String),

    /// Template slug already taken.
    #[error("Template with slug '{0}' already exists")]
    DuplicateSlug(String),

    /// Template delete refused while subscriptions still reference it.
    #[error("Template '{slug}' is still used by {} subscription(s)", .subscriptions.len())]
    TemplateInUse {
        slug: String,
        subscriptions: Vec<SubscriptionId>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Whether the error should be reported to the caller as a rejection of
    /// their input rather than as a server fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CourierError::DuplicateRecipient { .. }
                | CourierError::Validation(_)
                | CourierError::DuplicateTitle(_)
                | CourierError::DuplicateSlug(_)
                | CourierError::TemplateInUse { .. }
                | CourierError::SubscriptionNotFound(_)
                | CourierError::TemplateNotFound(_)
        )
    }
}

impl From<handlebars::RenderError> for CourierError {
    fn from(err: handlebars::RenderError) -> Self {
        CourierError::TemplateRender(err.to_string())
    }
}

impl From<handlebars::TemplateError> for CourierError {
    fn from(err: handlebars::TemplateError) -> Self {
        CourierError::TemplateRender(err.to_string())
    }
}

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        CourierError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for CourierError {
    fn from(err: validator::ValidationErrors) -> Self {
        CourierError::Validation(err.to_string())
    }
}

impl From<core_config::ConfigError> for CourierError {
    fn from(err: core_config::ConfigError) -> Self {
        CourierError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_recipient_message_is_human_readable() {
        let err = CourierError::DuplicateRecipient {
            email: "ops@example.com".to_string(),
            subscription: "New orders".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ops@example.com is already a recipient of 'New orders'"
        );
        assert!(err.is_rejection());
    }

    #[test]
    fn test_transport_is_not_a_rejection() {
        assert!(!CourierError::Transport("connection refused".to_string()).is_rejection());
    }
}
