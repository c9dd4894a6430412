//! Error types
//!
//! `ErrorCode` is what ends up in the error log on the
//! board and gets drained by the host. The other errors
//! are for decoding things on the host side.

use std::error::Error;
use std::fmt;

/// Fault codes of the board error log
///
/// The discriminant is the value on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[repr(u8)]
pub enum ErrorCode {
  Unknown               = 0u8,
  DacLoad               = 1u8,
  DacRead               = 2u8,
  TofDacLoad            = 3u8,
  TofDacRead            = 4u8,
  CommandIgnored        = 5u8,
  TrackerReadTimeout    = 6u8,
  TrackerBadId          = 7u8,
  TrackerBadLength      = 8u8,
  TrackerBadEcho        = 9u8,
  GetTrackerDataFailed  = 10u8,
  TrackerBadFpga        = 11u8,
  TrackerBadTrailer     = 12u8,
  TrackerBadNData       = 13u8,
  DaqTimeout            = 14u8,
  TrackerNumBoards      = 15u8,
  TrackerBadBoardId     = 16u8,
  TrackerBoardShort     = 17u8,
  TrackerNoMemory       = 18u8,
  TxFailed              = 19u8,
  BadCommand            = 20u8,
  EventTooBig           = 21u8,
  BadByte               = 22u8,
  TrackerBadStatus      = 23u8,
  TrackerTriggerEnable  = 24u8,
  TrackerBadTriggerHead = 25u8,
  TrackerTooBig         = 26u8,
  TrackerLayerOrder     = 27u8,
  TrackerWrongDataType  = 28u8,
  CommandBufferOverflow = 29u8,
}

impl ErrorCode {
  pub fn to_string(&self) -> String {
    let name = match self {
      ErrorCode::Unknown               => "Unknown",
      ErrorCode::DacLoad               => "DacLoad",
      ErrorCode::DacRead               => "DacRead",
      ErrorCode::TofDacLoad            => "TofDacLoad",
      ErrorCode::TofDacRead            => "TofDacRead",
      ErrorCode::CommandIgnored        => "CommandIgnored",
      ErrorCode::TrackerReadTimeout    => "TrackerReadTimeout",
      ErrorCode::TrackerBadId          => "TrackerBadId",
      ErrorCode::TrackerBadLength      => "TrackerBadLength",
      ErrorCode::TrackerBadEcho        => "TrackerBadEcho",
      ErrorCode::GetTrackerDataFailed  => "GetTrackerDataFailed",
      ErrorCode::TrackerBadFpga        => "TrackerBadFpga",
      ErrorCode::TrackerBadTrailer     => "TrackerBadTrailer",
      ErrorCode::TrackerBadNData       => "TrackerBadNData",
      ErrorCode::DaqTimeout            => "DaqTimeout",
      ErrorCode::TrackerNumBoards      => "TrackerNumBoards",
      ErrorCode::TrackerBadBoardId     => "TrackerBadBoardId",
      ErrorCode::TrackerBoardShort     => "TrackerBoardShort",
      ErrorCode::TrackerNoMemory       => "TrackerNoMemory",
      ErrorCode::TxFailed              => "TxFailed",
      ErrorCode::BadCommand            => "BadCommand",
      ErrorCode::EventTooBig           => "EventTooBig",
      ErrorCode::BadByte               => "BadByte",
      ErrorCode::TrackerBadStatus      => "TrackerBadStatus",
      ErrorCode::TrackerTriggerEnable  => "TrackerTriggerEnable",
      ErrorCode::TrackerBadTriggerHead => "TrackerBadTriggerHead",
      ErrorCode::TrackerTooBig         => "TrackerTooBig",
      ErrorCode::TrackerLayerOrder     => "TrackerLayerOrder",
      ErrorCode::TrackerWrongDataType  => "TrackerWrongDataType",
      ErrorCode::CommandBufferOverflow => "CommandBufferOverflow",
    };
    String::from(name)
  }
}

impl From<u8> for ErrorCode {
  fn from(value : u8) -> Self {
    match value {
      1  => ErrorCode::DacLoad,
      2  => ErrorCode::DacRead,
      3  => ErrorCode::TofDacLoad,
      4  => ErrorCode::TofDacRead,
      5  => ErrorCode::CommandIgnored,
      6  => ErrorCode::TrackerReadTimeout,
      7  => ErrorCode::TrackerBadId,
      8  => ErrorCode::TrackerBadLength,
      9  => ErrorCode::TrackerBadEcho,
      10 => ErrorCode::GetTrackerDataFailed,
      11 => ErrorCode::TrackerBadFpga,
      12 => ErrorCode::TrackerBadTrailer,
      13 => ErrorCode::TrackerBadNData,
      14 => ErrorCode::DaqTimeout,
      15 => ErrorCode::TrackerNumBoards,
      16 => ErrorCode::TrackerBadBoardId,
      17 => ErrorCode::TrackerBoardShort,
      18 => ErrorCode::TrackerNoMemory,
      19 => ErrorCode::TxFailed,
      20 => ErrorCode::BadCommand,
      21 => ErrorCode::EventTooBig,
      22 => ErrorCode::BadByte,
      23 => ErrorCode::TrackerBadStatus,
      24 => ErrorCode::TrackerTriggerEnable,
      25 => ErrorCode::TrackerBadTriggerHead,
      26 => ErrorCode::TrackerTooBig,
      27 => ErrorCode::TrackerLayerOrder,
      28 => ErrorCode::TrackerWrongDataType,
      29 => ErrorCode::CommandBufferOverflow,
      _  => ErrorCode::Unknown,
    }
  }
}

impl fmt::Display for ErrorCode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<ErrorCode : {} ({})>", self.to_string(), *self as u8)
  }
}

/// Indicate issues with (de)serialization
#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum SerializationError {
  TailInvalid,
  HeadInvalid,
  StreamTooShort,
  ValueNotFound,
  WrongByteSize,
  JsonDecodingError,
  TomlDecodingError,
}

impl SerializationError {
  pub fn to_string(&self) -> String {
    match self {
      SerializationError::TailInvalid       => {return String::from("TailInvalid");},
      SerializationError::HeadInvalid       => {return String::from("HeadInvalid");},
      SerializationError::StreamTooShort    => {return String::from("StreamTooShort");},
      SerializationError::ValueNotFound     => {return String::from("ValueNotFound");},
      SerializationError::WrongByteSize     => {return String::from("WrongByteSize");},
      SerializationError::JsonDecodingError => {return String::from("JsonDecodingError");},
      SerializationError::TomlDecodingError => {return String::from("TomlDecodingError");},
    }
  }
}

impl fmt::Display for SerializationError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = self.to_string();
    write!(f, "<Serialization Error : {}>", repr)
  }
}

impl Error for SerializationError {
}

/// Reasons why a triplicated command frame
/// does not get accepted
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FrameError {
  /// The frame does not have three full units
  WrongLength,
  /// No two of the three copies agree. Carries the
  /// offending character of the second copy and its
  /// position within the unit.
  NoMajority(u8, u8),
  /// Start 'S' or end 'W' marker missing
  BadMarkers,
}

impl fmt::Display for FrameError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      FrameError::WrongLength          => String::from("WrongLength"),
      FrameError::NoMajority(chr, pos) => format!("NoMajority (char {chr:#04x} at {pos})"),
      FrameError::BadMarkers           => String::from("BadMarkers"),
    };
    write!(f, "<FrameError : {}>", repr)
  }
}

impl Error for FrameError {
}
