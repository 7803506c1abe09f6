pub mod adapter;
pub mod cache;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod request_log;
pub mod transport;
pub mod types;

pub use cache::{ResponseCache, ResponseKey, TtlCache};
pub use error::{ErrorCode, FailureReport, GatewayError};
pub use gateway::{LlmGateway, TextStream};
pub use transport::{HttpTransport, RetryExecutor, Transport, TransportError};
pub use types::*;
