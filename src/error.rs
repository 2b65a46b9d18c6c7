use thiserror::Error;

/// Errors raised while validating connection parameters.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported base URL scheme {scheme:?} (expected http, https, ws, or wss)")]
    UnsupportedScheme { scheme: String },

    #[error("base URL {url:?} has no host")]
    MissingHost { url: String },

    #[error("conversation id must not be empty")]
    EmptyConversationId,

    #[error("connection token must not be empty")]
    EmptyToken,
}

/// Errors returned by the send methods on [`ChatSocket`].
///
/// Sends never panic and are never queued: a send against a socket that is
/// not open is reported and dropped.
///
/// [`ChatSocket`]: crate::client::ChatSocket
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("chat socket is not open")]
    NotConnected,

    #[error("connection task is no longer running")]
    ChannelClosed,
}
