//! Connection target description and WebSocket URL construction.
//!
//! An [`Endpoint`] captures everything needed to dial one conversation's
//! socket: the backend origin, the conversation id, the credentials, and
//! the API variant. [`Endpoint::websocket_url`] is a pure function of that
//! state, so rebuilding the URL after a token rotation is just calling it
//! again.

use strum::Display;
use url::Url;

use crate::error::TransportError;

/// Backend endpoint variant.
///
/// The two variants differ only in the URL path segment; all protocol
/// behavior is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ApiVersion {
    /// Agent-oriented endpoint (`/api/v1/...`).
    #[default]
    #[strum(serialize = "v1")]
    V1,
    /// Workflow-oriented endpoint (`/api/v2/...`).
    #[strum(serialize = "v2")]
    V2,
}

impl ApiVersion {
    fn path_segment(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

/// Connection parameters for one conversation's chat socket.
///
/// Construction validates the base URL and required fields once; the
/// computed URL is then deterministic for the life of the endpoint (token
/// rotation swaps the credentials and the next [`websocket_url`] call picks
/// them up).
///
/// [`websocket_url`]: Endpoint::websocket_url
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// `host` or `host:port` extracted from the base URL.
    authority: String,
    /// Whether the base transport is TLS (https/wss), selecting `wss://`.
    secure: bool,
    conversation_id: String,
    token: String,
    authorization_token: Option<String>,
    version: ApiVersion,
}

impl Endpoint {
    /// Describe a conversation endpoint.
    ///
    /// `base_url` is the backend origin (`http://`, `https://`, `ws://` or
    /// `wss://`); any path on it is ignored. The socket scheme follows the
    /// base transport security: http maps to ws, https to wss.
    pub fn new(
        base_url: &str,
        conversation_id: impl Into<String>,
        token: impl Into<String>,
        authorization_token: Option<String>,
        version: ApiVersion,
    ) -> Result<Self, TransportError> {
        let conversation_id = conversation_id.into();
        if conversation_id.is_empty() {
            return Err(TransportError::EmptyConversationId);
        }
        let token = token.into();
        if token.is_empty() {
            return Err(TransportError::EmptyToken);
        }

        let base = Url::parse(base_url).map_err(|source| TransportError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        let secure = match base.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => {
                return Err(TransportError::UnsupportedScheme {
                    scheme: other.to_string(),
                });
            }
        };
        let host = base
            .host_str()
            .ok_or_else(|| TransportError::MissingHost {
                url: base_url.to_string(),
            })?;
        let authority = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            authority,
            secure,
            conversation_id,
            token,
            authorization_token,
            version,
        })
    }

    /// Conversation identifier this endpoint is bound to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Selected endpoint variant.
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Replace the credentials in place. The next [`websocket_url`] call
    /// reflects the new tokens.
    ///
    /// [`websocket_url`]: Endpoint::websocket_url
    pub(crate) fn set_tokens(&mut self, token: String, authorization_token: Option<String>) {
        self.token = token;
        self.authorization_token = authorization_token;
    }

    /// Build the connection URL.
    ///
    /// Deterministic for fixed endpoint state. Both tokens are
    /// percent-encoded so reserved characters survive the query string.
    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let mut url = format!(
            "{scheme}://{authority}/api/{version}/chat/ws/{conversation}?token={token}",
            authority = self.authority,
            version = self.version.path_segment(),
            conversation = self.conversation_id,
            token = urlencoding::encode(&self.token),
        );
        if let Some(authorization) = &self.authorization_token {
            url.push_str("&authorization_token=");
            url.push_str(&urlencoding::encode(authorization));
        }
        url
    }
}
