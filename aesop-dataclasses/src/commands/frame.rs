//! Command frames on the wire
//!
//! A unit is `S d d a a ' ' x x W` where `dd` is the data
//! byte (or the command code in the first frame) and `aa`
//! the address byte, both as ASCII hex nibbles.

use std::fmt;

use crate::constants::{CMD_UNIT_LENGTH,
                       MAX_CMD_DATA};
use crate::commands::CommandCode;
use crate::errors::FrameError;

const fn build_nibble_table() -> [u8;256] {
  let mut table = [0u8;256];
  let mut k = 1u8;
  while k <= 9 {
    table[(b'0' + k) as usize] = k;
    k += 1;
  }
  k = 0;
  while k < 6 {
    table[(b'A' + k) as usize] = 10 + k;
    table[(b'a' + k) as usize] = 10 + k;
    k += 1;
  }
  table
}

/// ASCII hex character to nibble. Anything which is not
/// a hex digit decodes to 0.
pub const NIBBLE_TABLE : [u8;256] = build_nibble_table();

pub fn decode_nibble(chr : u8) -> u8 {
  NIBBLE_TABLE[chr as usize]
}

pub fn encode_nibble(nibble : u8) -> u8 {
  b"0123456789ABCDEF"[(nibble & 0x0F) as usize]
}

/// Majority vote over the three copies of a unit
///
/// All three equal, or else the first pair, the first
/// and the third, the last pair agreeing (in this
/// order) gives the unit.
pub fn vote(raw : &[u8]) -> Result<[u8; CMD_UNIT_LENGTH], FrameError> {
  if raw.len() < 3*CMD_UNIT_LENGTH {
    return Err(FrameError::WrongLength);
  }
  let first  = &raw[0..CMD_UNIT_LENGTH];
  let second = &raw[CMD_UNIT_LENGTH..2*CMD_UNIT_LENGTH];
  let third  = &raw[2*CMD_UNIT_LENGTH..3*CMD_UNIT_LENGTH];
  let mut unit = [0u8; CMD_UNIT_LENGTH];
  if first == second || first == third {
    unit.copy_from_slice(first);
    return Ok(unit);
  }
  if second == third {
    unit.copy_from_slice(second);
    return Ok(unit);
  }
  // report the first position where the last two disagree
  for k in 0..CMD_UNIT_LENGTH {
    if second[k] != third[k] {
      return Err(FrameError::NoMajority(decode_nibble(second[k]), k as u8));
    }
  }
  // unreachable, second != third
  Err(FrameError::NoMajority(0, 0))
}

/// The address byte, decoded once
///
/// ```text
///  bit   7 6 | 5 4 3 2 | 1 0
///        cnt | target  | cnt
/// ```
/// The 4 bit count is the number of data bytes in the
/// first frame and the index of the data byte in all
/// following frames.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AddressByte {
  pub target     : u8,
  pub byte_count : u8,
}

impl AddressByte {
  pub fn new(target : u8, byte_count : u8) -> Self {
    Self {
      target     : target & 0x0F,
      byte_count : byte_count & 0x0F,
    }
  }

  pub fn to_u8(&self) -> u8 {
    ((self.byte_count & 0x0C) << 4) | ((self.target & 0x0F) << 2) | (self.byte_count & 0x03)
  }
}

impl From<u8> for AddressByte {
  fn from(byte : u8) -> Self {
    Self {
      target     : (byte & 0x3C) >> 2,
      byte_count : ((byte & 0xC0) >> 4) | (byte & 0x03),
    }
  }
}

impl fmt::Display for AddressByte {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<AddressByte: target {}, count {}>", self.target, self.byte_count)
  }
}

/// A single decoded unit
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CommandUnit {
  pub data_byte : u8,
  pub address   : AddressByte,
}

impl CommandUnit {

  pub fn new(data_byte : u8, address : AddressByte) -> Self {
    Self {
      data_byte,
      address,
    }
  }

  /// Decode a voted unit, requires the 'S' and 'W' markers
  pub fn from_unit(unit : &[u8; CMD_UNIT_LENGTH]) -> Result<Self, FrameError> {
    if unit[0] != b'S' || unit[8] != b'W' {
      return Err(FrameError::BadMarkers);
    }
    let data_byte = (decode_nibble(unit[1]) << 4) | decode_nibble(unit[2]);
    let address   = (decode_nibble(unit[3]) << 4) | decode_nibble(unit[4]);
    Ok(Self {
      data_byte,
      address : AddressByte::from(address),
    })
  }

  /// Vote and decode three copies of a unit
  pub fn decode(raw : &[u8]) -> Result<Self, FrameError> {
    let unit = vote(raw)?;
    Self::from_unit(&unit)
  }

  pub fn to_unit(&self) -> [u8; CMD_UNIT_LENGTH] {
    let address = self.address.to_u8();
    [b'S',
     encode_nibble(self.data_byte >> 4),
     encode_nibble(self.data_byte),
     encode_nibble(address >> 4),
     encode_nibble(address),
     b' ',
     b'0',
     b'0',
     b'W']
  }
}

/// A command being assembled from its frames
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CommandFrame {
  pub code       : u8,
  pub n_data     : u8,
  data           : [u8; MAX_CMD_DATA],
  n_received     : u8,
}

impl CommandFrame {

  pub fn new(code : u8, n_data : u8) -> Self {
    Self {
      code,
      n_data     : n_data.min(MAX_CMD_DATA as u8),
      data       : [0u8; MAX_CMD_DATA],
      n_received : 0,
    }
  }

  /// Store a data byte under its 1-based index.
  /// Index 0 is refused.
  pub fn add_byte(&mut self, index : u8, byte : u8) -> bool {
    if index == 0 || index as usize > MAX_CMD_DATA {
      return false;
    }
    self.data[(index - 1) as usize] = byte;
    self.n_received += 1;
    true
  }

  pub fn is_complete(&self) -> bool {
    self.n_received >= self.n_data
  }

  pub fn command(&self) -> CommandCode {
    CommandCode::from(self.code)
  }

  /// The declared data bytes
  pub fn data(&self) -> &[u8] {
    &self.data[0..self.n_data as usize]
  }

  /// Data byte k, 0 if the command did not carry it
  pub fn byte(&self, k : usize) -> u8 {
    if k < self.n_data as usize {
      return self.data[k];
    }
    0
  }
}

impl fmt::Display for CommandFrame {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<CommandFrame: {} data {:?} ({}/{})>",
           self.command(), self.data(), self.n_received, self.n_data)
  }
}
