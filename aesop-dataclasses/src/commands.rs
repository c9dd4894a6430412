//! Commands which can be issued to the event PSOC
//!
//! The host sends each command as one or more frames.
//! A frame is a 9 byte ASCII unit `S dddd xxW`, repeated
//! three times for majority voting and terminated by
//! CR LF. The first frame carries the command code and
//! the number of data bytes, every following frame one
//! data byte together with its (1-based) index.
//!
//! * `command_code` - the closed list of command codes
//! * `frame`        - voting, nibble decoding and the address byte
//! * `factory`      - host side encoders, one function per command
//!

pub mod command_code;
pub mod frame;
pub mod factory;

pub use command_code::CommandCode;
pub use frame::{AddressByte,
                CommandFrame,
                CommandUnit,
                decode_nibble,
                vote};
