//! Dataclasses for the AESOP-Lite event PSOC
//!
//! Everything which goes over a wire lives here:
//! the event record, the output packet envelope,
//! the triplicated command frames, the tracker
//! hit lists and the error log which gets drained
//! by the host.
//!
//! All multi-byte fields on the wire are big endian.
//!

pub mod constants;
pub mod errors;
pub mod error_log;
pub mod serialization;
pub mod events;
pub mod packets;
pub mod commands;

#[macro_use] extern crate log;

pub use error_log::{ErrorLog,
                    ErrorRecord};
pub use errors::ErrorCode;

/// Create structures filled with random
/// values, mostly for testing
#[cfg(feature = "random")]
pub trait FromRandom {
  fn from_random() -> Self;
}
