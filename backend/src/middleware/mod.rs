//! Middleware and request extractors

pub mod caller;
pub mod panic;
pub mod request_id;

pub use caller::CallerId;
pub use panic::panic_response;
pub use request_id::{current_request_id, request_id_middleware, RequestId, X_REQUEST_ID};
