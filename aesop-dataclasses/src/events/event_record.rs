//! The event record as it is sent to the host
//!
//! Layout (big endian):
//!
//! ```text
//!  0  "ZERO"
//!  4  run number             u16
//!  6  accepted event count   u32
//! 10  trigger time stamp     u32 (5 ms ticks)
//! 14  raw GO count           u32
//! 18  packed date/time       u32
//! 22  trigger status         u8
//! 23  T1 T2 T3 T4 G extra    6 x u16
//! 35  time of flight         i16 (10 ps)
//! 37  tracker trigger count  u16
//! 39  tracker cmd count      u8
//! 40  tracker pattern        u8
//! 41  TOF candidates A, B    2 x u8
//! 43  ref A, ref B, clk A, clk B  4 x u16
//! 51  number of boards       u8
//! 52  per board: address, length, hit list
//!     "FINI"
//! ```

use std::fmt;

use chrono::{NaiveDate,
             NaiveDateTime};

use crate::events::TofMeasurement;
use crate::serialization::{Serialization,
                           SerializationError,
                           parse_u8,
                           parse_u16,
                           parse_i16,
                           parse_u32};

cfg_if::cfg_if! {
  if #[cfg(feature = "random")]  {
    use crate::FromRandom;
    extern crate rand;
    use rand::Rng;
  }
}

/// Number of analog channels in the event
/// (T1, T2, T3, T4, Guard, spare)
pub const N_ADC_CHANNELS : usize = 6;

/// Pack a calendar date into the 32 bit time word
///
/// `(year-2000)<<26 | month<<22 | day<<17 | hour<<12 | minute<<6 | second`
pub fn pack_time_date(year   : u16,
                      month  : u8,
                      day    : u8,
                      hour   : u8,
                      minute : u8,
                      second : u8) -> u32 {
  let year_offset = year.saturating_sub(2000) as u32;
  (year_offset      << 26)
  | ((month as u32)  << 22)
  | ((day as u32)    << 17)
  | ((hour as u32)   << 12)
  | ((minute as u32) << 6)
  | (second as u32)
}

/// Reverse of `pack_time_date`. None if the word
/// does not describe a valid date.
pub fn unpack_time_date(word : u32) -> Option<NaiveDateTime> {
  let year   = 2000 + ((word >> 26) & 0x3F) as i32;
  let month  = (word >> 22) & 0x0F;
  let day    = (word >> 17) & 0x1F;
  let hour   = (word >> 12) & 0x1F;
  let minute = (word >> 6)  & 0x3F;
  let second = word & 0x3F;
  NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Everything in the event up to (and including)
/// the number of tracker boards
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EventHeader {
  pub run_number        : u16,
  pub event_count       : u32,
  pub time_stamp        : u32,
  pub go_count          : u32,
  pub time_date         : u32,
  pub trigger_status    : u8,
  pub adc               : [u16; N_ADC_CHANNELS],
  pub tof               : TofMeasurement,
  pub tkr_trigger_count : u16,
  pub tkr_cmd_count     : u8,
  pub tkr_trg_pattern   : u8,
  pub n_boards          : u8,
}

impl EventHeader {

  /// Serialized size including the "ZERO" marker
  pub const SIZE : usize = 52;

  pub fn new() -> Self {
    Self {
      run_number        : 0,
      event_count       : 0,
      time_stamp        : 0,
      go_count          : 0,
      time_date         : 0,
      trigger_status    : 0,
      adc               : [0u16; N_ADC_CHANNELS],
      tof               : TofMeasurement::new(),
      tkr_trigger_count : 0,
      tkr_cmd_count     : 0,
      tkr_trg_pattern   : 0,
      n_boards          : 0,
    }
  }

  pub fn to_bytestream(&self) -> Vec<u8> {
    let mut stream = Vec::<u8>::with_capacity(EventHeader::SIZE);
    stream.extend_from_slice(EventRecord::HEAD);
    stream.extend_from_slice(&self.run_number.to_be_bytes());
    stream.extend_from_slice(&self.event_count.to_be_bytes());
    stream.extend_from_slice(&self.time_stamp.to_be_bytes());
    stream.extend_from_slice(&self.go_count.to_be_bytes());
    stream.extend_from_slice(&self.time_date.to_be_bytes());
    stream.push(self.trigger_status);
    for ch in self.adc {
      stream.extend_from_slice(&ch.to_be_bytes());
    }
    stream.extend_from_slice(&self.tof.dt.to_be_bytes());
    stream.extend_from_slice(&self.tkr_trigger_count.to_be_bytes());
    stream.push(self.tkr_cmd_count);
    stream.push(self.tkr_trg_pattern);
    stream.push(self.tof.n_a);
    stream.push(self.tof.n_b);
    stream.extend_from_slice(&self.tof.ref_a.to_be_bytes());
    stream.extend_from_slice(&self.tof.ref_b.to_be_bytes());
    stream.extend_from_slice(&self.tof.clk_a.to_be_bytes());
    stream.extend_from_slice(&self.tof.clk_b.to_be_bytes());
    stream.push(self.n_boards);
    stream
  }

  /// Decode the header, pos has to point to "ZERO"
  pub fn from_bytestream(stream : &Vec<u8>,
                         pos    : &mut usize)
    -> Result<Self, SerializationError> {
    EventRecord::verify_head(stream, *pos, EventHeader::SIZE)?;
    *pos += EventRecord::HEAD.len();
    let mut header         = EventHeader::new();
    header.run_number      = parse_u16(stream, pos);
    header.event_count     = parse_u32(stream, pos);
    header.time_stamp      = parse_u32(stream, pos);
    header.go_count        = parse_u32(stream, pos);
    header.time_date       = parse_u32(stream, pos);
    header.trigger_status  = parse_u8(stream, pos);
    for ch in 0..N_ADC_CHANNELS {
      header.adc[ch] = parse_u16(stream, pos);
    }
    header.tof.dt            = parse_i16(stream, pos);
    header.tkr_trigger_count = parse_u16(stream, pos);
    header.tkr_cmd_count     = parse_u8(stream, pos);
    header.tkr_trg_pattern   = parse_u8(stream, pos);
    header.tof.n_a           = parse_u8(stream, pos);
    header.tof.n_b           = parse_u8(stream, pos);
    header.tof.ref_a         = parse_u16(stream, pos);
    header.tof.ref_b         = parse_u16(stream, pos);
    header.tof.clk_a         = parse_u16(stream, pos);
    header.tof.clk_b         = parse_u16(stream, pos);
    header.n_boards          = parse_u8(stream, pos);
    Ok(header)
  }
}

impl Default for EventHeader {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for EventHeader {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<EventHeader:");
    repr += &(format!("\n  run           : {}", self.run_number));
    repr += &(format!("\n  event         : {}", self.event_count));
    repr += &(format!("\n  time stamp    : {}", self.time_stamp));
    repr += &(format!("\n  GO count      : {}", self.go_count));
    match unpack_time_date(self.time_date) {
      None     => repr += &(format!("\n  date          : INVALID ({:#010x})", self.time_date)),
      Some(dt) => repr += &(format!("\n  date          : {}", dt)),
    }
    repr += &(format!("\n  trg status    : {:#04x}", self.trigger_status));
    repr += &(format!("\n  adc           : {:?}", self.adc));
    repr += &(format!("\n  tof dt [10ps] : {}", self.tof.dt));
    repr += &(format!("\n  tkr trg count : {}", self.tkr_trigger_count));
    repr += &(format!("\n  n boards      : {}", self.n_boards));
    write!(f, "{}>", repr)
  }
}

/// The hit list of a single board as it appears in the event
#[derive(Debug, Clone, PartialEq)]
pub struct BoardRecord {
  pub address  : u8,
  pub hit_list : Vec<u8>,
}

impl BoardRecord {
  pub fn new(address : u8, hit_list : &[u8]) -> Self {
    Self {
      address,
      hit_list : hit_list.to_vec(),
    }
  }

  /// The reason tag if this is a placeholder
  pub fn placeholder_tag(&self) -> Option<u8> {
    if self.hit_list.len() == 5 && self.hit_list[2] == 0 && self.hit_list[4] == 0x30 {
      return Some(self.hit_list[3]);
    }
    None
  }
}

/// Read board records until either n_boards are
/// done or the "FINI" trailer shows up (truncated events)
fn parse_board_records(stream   : &Vec<u8>,
                       pos      : &mut usize,
                       n_boards : u8)
  -> Result<Vec<BoardRecord>, SerializationError> {
  let mut boards = Vec::<BoardRecord>::with_capacity(n_boards as usize);
  for _ in 0..n_boards {
    if stream.len() >= *pos + 4 && &stream[*pos..*pos+4] == EventRecord::TAIL {
      debug!("Event truncated after {} boards", boards.len());
      break;
    }
    if stream.len() < *pos + 2 {
      return Err(SerializationError::StreamTooShort);
    }
    let address = parse_u8(stream, pos);
    let n_bytes = parse_u8(stream, pos) as usize;
    if stream.len() < *pos + n_bytes {
      return Err(SerializationError::StreamTooShort);
    }
    boards.push(BoardRecord::new(address, &stream[*pos..*pos + n_bytes]));
    *pos += n_bytes;
  }
  Ok(boards)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
  pub header : EventHeader,
  pub boards : Vec<BoardRecord>,
}

impl EventRecord {
  pub fn new() -> Self {
    Self {
      header : EventHeader::new(),
      boards : Vec::<BoardRecord>::new(),
    }
  }

  /// True if fewer boards made it into the
  /// record than announced in the header
  pub fn is_truncated(&self) -> bool {
    self.boards.len() < self.header.n_boards as usize
  }
}

impl Default for EventRecord {
  fn default() -> Self {
    Self::new()
  }
}

impl Serialization for EventRecord {
  const HEAD : &'static [u8] = b"ZERO";
  const TAIL : &'static [u8] = b"FINI";

  fn from_bytestream(stream : &Vec<u8>,
                     pos    : &mut usize)
    -> Result<Self, SerializationError> {
    let header = EventHeader::from_bytestream(stream, pos)?;
    let boards = parse_board_records(stream, pos, header.n_boards)?;
    Self::verify_tail(stream, *pos)?;
    *pos += Self::TAIL.len();
    Ok(Self {
      header,
      boards,
    })
  }

  fn to_bytestream(&self) -> Vec<u8> {
    let mut stream = self.header.to_bytestream();
    for brd in &self.boards {
      stream.push(brd.address);
      stream.push(brd.hit_list.len() as u8);
      stream.extend_from_slice(&brd.hit_list);
    }
    stream.extend_from_slice(Self::TAIL);
    stream
  }
}

impl fmt::Display for EventRecord {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<EventRecord:");
    repr += &(format!("\n{}", self.header));
    for brd in &self.boards {
      match brd.placeholder_tag() {
        Some(tag) => repr += &(format!("\n  -- board {} : placeholder (tag {tag})", brd.address)),
        None      => repr += &(format!("\n  -- board {} : {} bytes", brd.address, brd.hit_list.len())),
      }
    }
    if self.is_truncated() {
      repr += "\n  -- TRUNCATED";
    }
    write!(f, "{}>", repr)
  }
}

#[cfg(feature = "random")]
impl FromRandom for EventRecord {
  fn from_random() -> Self {
    let mut rng   = rand::thread_rng();
    let mut event = EventRecord::new();
    event.header.run_number   = rng.gen::<u16>();
    event.header.event_count  = rng.gen::<u32>();
    event.header.time_stamp   = rng.gen::<u32>();
    event.header.go_count     = rng.gen::<u32>();
    event.header.time_date    = rng.gen::<u32>();
    event.header.tof.dt       = rng.gen::<i16>();
    event.header.n_boards     = rng.gen_range(0..8);
    for brd in 0..event.header.n_boards {
      let n_bytes  = rng.gen_range(4..20);
      let mut hits = vec![0xE7u8, brd];
      for _ in 2..n_bytes {
        hits.push(rng.gen::<u8>());
      }
      event.boards.push(BoardRecord::new(brd, &hits));
    }
    event
  }
}

/// The reduced event which is sent in response to a
/// calibration read: only the tracker boards
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationEvent {
  pub boards : Vec<BoardRecord>,
}

impl Serialization for CalibrationEvent {
  const HEAD : &'static [u8] = b"ZERO";
  const TAIL : &'static [u8] = b"FINI";

  fn from_bytestream(stream : &Vec<u8>,
                     pos    : &mut usize)
    -> Result<Self, SerializationError> {
    Self::verify_head(stream, *pos, Self::HEAD.len() + 1 + Self::TAIL.len())?;
    *pos += Self::HEAD.len();
    let n_boards = parse_u8(stream, pos);
    let boards   = parse_board_records(stream, pos, n_boards)?;
    Self::verify_tail(stream, *pos)?;
    *pos += Self::TAIL.len();
    Ok(Self {
      boards
    })
  }

  fn to_bytestream(&self) -> Vec<u8> {
    let mut stream = Vec::<u8>::from(Self::HEAD);
    stream.push(self.boards.len() as u8);
    for brd in &self.boards {
      stream.push(brd.address);
      stream.push(brd.hit_list.len() as u8);
      stream.extend_from_slice(&brd.hit_list);
    }
    stream.extend_from_slice(Self::TAIL);
    stream
  }
}

#[cfg(test)]
mod test_event_record {
  use super::*;

  #[test]
  fn header_size_and_offsets() {
    let mut header        = EventHeader::new();
    header.run_number     = 0x0140;
    header.event_count    = 0x01020304;
    header.trigger_status = 0x5A;
    header.tof.dt         = -12;
    header.n_boards       = 3;
    let stream = header.to_bytestream();
    assert_eq!(stream.len(), EventHeader::SIZE);
    assert_eq!(&stream[0..4], b"ZERO");
    assert_eq!(&stream[4..6], &[0x01, 0x40]);
    assert_eq!(&stream[6..10], &[1, 2, 3, 4]);
    assert_eq!(stream[22], 0x5A);
    assert_eq!(&stream[35..37], &(-12i16).to_be_bytes());
    // no candidates -> 0xFFFF diagnostics
    assert_eq!(&stream[43..51], &[0xFF;8]);
    assert_eq!(stream[51], 3);
  }

  #[test]
  fn truncated_event_decodes() {
    let mut event = EventRecord::new();
    event.header.n_boards = 4;
    event.boards.push(BoardRecord::new(0, &[0xE7, 0, 1, 2]));
    let stream  = event.to_bytestream();
    let mut pos = 0usize;
    let decoded = EventRecord::from_bytestream(&stream, &mut pos).unwrap();
    assert!(decoded.is_truncated());
    assert_eq!(decoded.boards.len(), 1);
    assert_eq!(pos, stream.len());
  }

  #[test]
  fn time_word() {
    let word = pack_time_date(2024, 7, 18, 13, 45, 59);
    assert_eq!(word >> 26, 24);
    let dt = unpack_time_date(word).unwrap();
    assert_eq!(dt.to_string(), "2024-07-18 13:45:59");
    assert!(unpack_time_date(0).is_none());
  }
}
