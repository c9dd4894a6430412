//! Packets are the way data leaves the board.
//!
//! Every event and every command response is wrapped
//! in the same envelope, regardless if it goes out
//! over the USB serial link or over SPI to the main
//! PSOC.
//!
//! An output packet has the following layout
//!  HEAD     : [u8;3] = 0xDC 0x00 0xFF
//!  LENGTH   : u8     = echo data + payload
//!  ECHO     : u8     = command code or 0xDD for events
//!  N ECHO   : u8     = number of command data bytes echoed
//!  ECHODATA : [u8;N ECHO]
//!  PAYLOAD  : [u8;LENGTH - N ECHO]
//!  PADDING  : 0x01 0x02 until ECHODATA + PAYLOAD is a multiple of 3
//!  TAIL     : [u8;3] = 0xFF 0x00 0xFF

pub mod output_packet;

pub use crate::packets::output_packet::{OutputPacket,
                                        EVENT_ECHO,
                                        unpack_stream};
