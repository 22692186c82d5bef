pub mod error_envelope;
pub mod metrics;
pub mod request_id;
pub mod security;

pub use error_envelope::error_envelope;
