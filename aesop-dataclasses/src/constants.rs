//! Global constants for the event PSOC
//!
//! Timeouts are given in ticks of the master
//! clock, which ticks every 5 ms (200 Hz).
//!

/// Version number reported by the firmware
pub const FIRMWARE_VERSION     : u8    = 1;

/// Address of the event PSOC as it appears in the
/// address byte of the command frames
pub const EVENT_PSOC_ADDRESS   : u8    = 0x08;

/// The master clock ticks per second
pub const TICKS_PER_SECOND     : u32   = 200;

//=========== Error log ===================

/// Capacity of the error log
pub const MAX_ERRORS           : usize = 64;

/// Reply to an error log drain when no errors were recorded
pub const NO_ERRORS_SENTINEL   : [u8;3] = [0x00, 0xEE, 0xFF];

//=========== TOF =========================

/// Entries in each of the TOF ring buffers
pub const TOF_BUFFER_SIZE      : usize = 64;

/// 10 ps units per reference clock period
pub const TOF_CLOCK_PERIOD     : i32   = 8333;

/// Offset applied when the 16 bit reference
/// counter rolled over between two channels
pub const TOF_ROLLOVER         : i32   = 500_000_000;

/// Above this reference count a channel may have
/// been measured just before the rollover
pub const TOF_REF_HIGH         : u16   = 49152;

/// Below this reference count a channel may have
/// been measured just after the rollover
pub const TOF_REF_LOW          : u16   = 16384;

/// Time of flight when no pair could be found
pub const TOF_NO_MEASUREMENT   : i16   = i16::MAX;

/// Diagnostic value for clock/reference when nothing was found
pub const TOF_NO_CANDIDATE     : u16   = 0xFFFF;

/// Maximum entries per channel in a TOF buffer dump
pub const TOF_DUMP_MAX_ENTRIES : usize = 21;

/// Size of the TOF chip configuration
pub const TOF_CONFIG_SIZE      : usize = 17;

//=========== Tracker =====================

/// Maximum number of tracker boards in the chain
pub const MAX_TKR_BOARDS       : usize = 8;

/// Maximum size of a single board hit list
pub const MAX_TKR_BOARD_BYTES  : usize = 203;

/// Maximum size of the tracker housekeeping payload
pub const MAX_TKR_HOUSEKEEPING : usize = 70;

/// Every board hit list starts with this byte
pub const TKR_HIT_LIST_ID      : u8    = 0xE7;

/// Packet identifiers on the tracker link
pub const TKR_EVT_DATA         : u8    = 0xD3;
pub const TKR_HOUSE_DATA       : u8    = 0xC7;
pub const TKR_ECHO_DATA        : u8    = 0xF1;

/// Housekeeping packets end with this byte
pub const TKR_HOUSE_TRAILER    : u8    = 0x0F;

/// Last byte of a placeholder hit list
pub const TKR_PLACEHOLDER_END  : u8    = 0x30;

//=========== Timeouts ====================

/// Wait for a single byte from the tracker
pub const TKR_READ_TIMEOUT     : u32   = 31;

/// Wait for the tracker transmit buffer
pub const TX_TIMEOUT           : u32   = 200;

/// A command has to be complete after this time
pub const CMD_TIMEOUT          : u32   = 200;

/// Wait for the digitizer after a trigger
pub const DAQ_TIMEOUT          : u32   = 20;

/// Attempts to get a ready status from the tracker
pub const TKR_STATUS_RETRIES   : u8    = 10;

//=========== Host link ===================

/// Maximum size of the main payload of an output packet
pub const MAX_DATA_OUT         : usize = 255;

/// Maximum number of data bytes a command can carry
pub const MAX_CMD_DATA         : usize = 15;

/// A single unit of a command on the wire
pub const CMD_UNIT_LENGTH      : usize = 9;

/// Three units plus CR LF
pub const CMD_LENGTH           : usize = 29;

/// Slots of the command ring filled by the UART interrupt
pub const CMD_RING_SLOTS       : usize = 32;

/// USB packets go out in chunks of this size
pub const USB_CHUNK_SIZE       : usize = 64;
