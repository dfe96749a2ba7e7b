//! Notification error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NotifyError {
    #[error("mailer command '{command}' failed: {message}")]
    MailerFailed { command: String, message: String },

    #[error("no maintainer recipients configured for {product}/{docset}")]
    NoRecipients { product: String, docset: String },
}
