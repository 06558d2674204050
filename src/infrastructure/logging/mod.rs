//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Text or JSON output on stderr
//! - Optional rolling JSON log file
//! - Secret scrubbing

pub mod logger;
pub mod secret_scrubbing;

pub use logger::LoggerImpl;
pub use secret_scrubbing::{ScrubbingMakeWriter, SecretScrubber};
