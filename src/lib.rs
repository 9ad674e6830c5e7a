// Image request handler library
//
// Decodes, authenticates and normalizes image transformation requests into an
// `ImageRequestInfo` for the transform stage.

pub mod config;
pub mod constants;
pub mod edits;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod request;
pub mod secrets;

pub use error::{ErrorKind, ImageRequestError};
pub use handler::ImageRequestHandler;
pub use request::{ImageHandlerEvent, ImageRequestInfo, RequestType, ResolvedRequest};
