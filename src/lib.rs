pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod protocol;
pub mod reconnect;
pub mod types;

// Re-export the transport surface at crate root for convenience
pub use client::ChatSocket;
pub use config::TransportConfig;
pub use endpoint::{ApiVersion, Endpoint};
pub use error::{SendError, TransportError};
pub use handlers::EventHandlers;
pub use protocol::{AssistantMessage, InboundEvent, OutboundFrame};
pub use reconnect::ReconnectPolicy;
pub use types::{CloseEvent, ConnectionState};
