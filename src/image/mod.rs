//! Image generation against the Qianfan text-to-image API.

pub mod generator;
pub mod transport;

pub use generator::{GenerateError, ImageGenerator, ImageOutcome};
pub use transport::{ImageTransport, QianfanTransport, TransportError};
