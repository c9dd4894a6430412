//! The serial protocol to the chain of tracker boards
//!
//! Every request is `[fpga, code, n, data..]`. The tracker
//! answers with one of three packets, each starting with
//! a length byte and an identifier:
//!
//! * event data   `0xD3`
//! * housekeeping `0xC7`
//! * echo         `0xF1`
//!
//! Every byte read is bounded by a timeout. On a timeout
//! the read yields 0 and a fault is logged, so a silent
//! tracker can never hang the main loop. Broken event
//! data is replaced by placeholder hit lists.
//!

use std::fmt;

use aesop_dataclasses::{ErrorCode,
                        ErrorLog};
use aesop_dataclasses::constants::{MAX_DATA_OUT,
                                   MAX_TKR_BOARDS,
                                   MAX_TKR_BOARD_BYTES,
                                   MAX_TKR_HOUSEKEEPING,
                                   TKR_ECHO_DATA,
                                   TKR_EVT_DATA,
                                   TKR_HIT_LIST_ID,
                                   TKR_HOUSE_DATA,
                                   TKR_HOUSE_TRAILER,
                                   TKR_READ_TIMEOUT,
                                   TKR_STATUS_RETRIES,
                                   TX_TIMEOUT};
use aesop_dataclasses::events::{PlaceholderReason,
                                TrackerEvent};

use crate::control::{Clock,
                     TrackerPort};
use crate::registers::*;

/// Maximum number of bytes drained from a packet
/// with an unknown identifier
const MAX_UNKNOWN_DRAIN : u8 = 15;

/// Result of receiving a packet from the tracker
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[repr(u8)]
pub enum TrackerStatus {
  Ok              = 0,
  EchoMismatch    = 1,
  UnexpectedEvent = 53,
  WrongType       = 54,
  BadEventLength  = 55,
  BoardCount      = 56,
  BoardShort      = 57,
  BadBoardId      = 58,
  BadFpga         = 59,
}

impl TrackerStatus {
  pub fn is_ok(&self) -> bool {
    *self == TrackerStatus::Ok
  }
}

impl fmt::Display for TrackerStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let r = serde_json::to_string(self).unwrap_or(
      String::from("Error: cannot unwrap this TrackerStatus"));
    write!(f, "<TrackerStatus: {}>", r)
  }
}

/// The kind of packet the caller waits for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Expect {
  Any,
  EventData,
  Housekeeping,
  Echo,
}

impl Expect {
  pub fn id(&self) -> u8 {
    match self {
      Expect::Any          => 0,
      Expect::EventData    => TKR_EVT_DATA,
      Expect::Housekeeping => TKR_HOUSE_DATA,
      Expect::Echo         => TKR_ECHO_DATA,
    }
  }
}

/// A housekeeping packet as sent by a board
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Housekeeping {
  pub cmd_count : u16,
  pub fpga      : u8,
  /// The tracker command which was answered
  pub cmd_code  : u8,
  pub data      : Vec<u8>,
}

impl Housekeeping {
  /// Layout for the host
  /// [n+7, 0xC7, n, count hi, count lo, fpga, code, data..]
  pub fn to_bytes(&self) -> Vec<u8> {
    let n = self.data.len() as u8;
    let mut bytes = vec![n + 7,
                         TKR_HOUSE_DATA,
                         n,
                         (self.cmd_count >> 8) as u8,
                         (self.cmd_count & 0xFF) as u8,
                         self.fpga,
                         self.cmd_code];
    bytes.extend_from_slice(&self.data);
    bytes
  }
}

impl fmt::Display for Housekeeping {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<Housekeeping: fpga {} cmd {:#04x} count {} data {:?}>",
           self.fpga, self.cmd_code, self.cmd_count, self.data)
  }
}

/// Talks to the tracker and owns the hit list pool
pub struct TrackerEngine<P: TrackerPort, C: Clock> {
  port          : P,
  clock         : C,
  /// Hit lists of the current event
  pub event     : TrackerEvent,
  /// Boards configured in the chain
  pub n_boards  : u8,
  /// Last command code sent
  cmd_code      : u8,
  /// Command counter as reported by the tracker
  pub cmd_count : u16,
  housekeeping  : Option<Housekeeping>,
  reply         : Vec<u8>,
}

impl<P: TrackerPort, C: Clock> TrackerEngine<P, C> {

  pub fn new(port : P, clock : C, n_boards : u8) -> Self {
    Self {
      port,
      clock,
      event        : TrackerEvent::new(),
      n_boards     : n_boards.min(MAX_TKR_BOARDS as u8),
      cmd_code     : 0,
      cmd_count    : 0,
      housekeeping : None,
      reply        : Vec::new(),
    }
  }

  pub fn port(&mut self) -> &mut P {
    &mut self.port
  }

  pub fn set_boards(&mut self, n_boards : u8) {
    self.n_boards = n_boards.min(MAX_TKR_BOARDS as u8);
    info!("Tracker chain set to {} boards", self.n_boards);
  }

  pub fn clear_rx(&mut self) {
    self.port.clear_rx();
  }

  pub fn has_housekeeping(&self) -> bool {
    self.housekeeping.is_some()
  }

  pub fn take_housekeeping(&mut self) -> Option<Housekeeping> {
    self.housekeeping.take()
  }

  /// Bytes the last packet produced for the host
  pub fn take_reply(&mut self) -> Vec<u8> {
    std::mem::take(&mut self.reply)
  }

  /// Read a byte, giving up after the read timeout
  /// counted from `start`. The flag identifies the
  /// caller in the error log.
  fn get_byte(&mut self, start : u32, flag : u8, errors : &mut ErrorLog) -> u8 {
    loop {
      if self.port.rx_ready() {
        return self.port.read_byte();
      }
      let elapsed = self.clock.now().wrapping_sub(start);
      if elapsed > TKR_READ_TIMEOUT {
        errors.add(ErrorCode::TrackerReadTimeout, (elapsed & 0xFF) as u8, flag);
        return 0;
      }
    }
  }

  /// Send `[address, code, n, data..]` and wait until
  /// the transmit buffer is empty
  pub fn transmit(&mut self, address : u8, code : u8, data : &[u8], errors : &mut ErrorLog) -> bool {
    self.cmd_code = code;
    let mut bytes = vec![address, code, data.len() as u8];
    bytes.extend_from_slice(data);
    trace!("Tracker request {:?}", bytes);
    let start = self.clock.now();
    for byte in bytes {
      while self.port.tx_full() {
        if self.clock.now().wrapping_sub(start) > TX_TIMEOUT {
          errors.add(ErrorCode::TxFailed, code, 0xFF);
          return false;
        }
      }
      self.port.write_byte(byte);
    }
    while self.port.tx_pending() > 0 {
      if self.clock.now().wrapping_sub(start) > TX_TIMEOUT {
        errors.add(ErrorCode::TxFailed, code, 0xFF);
        return false;
      }
    }
    true
  }

  /// Receive and check a single packet
  pub fn receive_packet(&mut self, expect : Expect, errors : &mut ErrorLog) -> TrackerStatus {
    self.reply.clear();
    let start = self.clock.now();
    let len   = self.get_byte(start, 1, errors);
    let id    = self.get_byte(start, 2, errors);
    if id != expect.id() {
      match expect {
        Expect::Any => {
          if id == TKR_EVT_DATA {
            errors.add(ErrorCode::TrackerWrongDataType, id, 0);
            return TrackerStatus::UnexpectedEvent;
          }
        },
        Expect::EventData => {
          errors.add(ErrorCode::TrackerWrongDataType, id, TKR_EVT_DATA);
          self.event.fill_placeholders(self.n_boards, PlaceholderReason::WrongDataType);
          return TrackerStatus::WrongType;
        },
        _ => {
          errors.add(ErrorCode::TrackerWrongDataType, id, expect.id());
        }
      }
    }
    match id {
      TKR_EVT_DATA   => self.receive_event(len, start, errors),
      TKR_HOUSE_DATA => self.receive_housekeeping(len, start, errors),
      TKR_ECHO_DATA  => self.receive_echo(len, start, errors),
      _ => {
        errors.add(ErrorCode::TrackerBadId, id, len);
        for _ in 0..len.min(MAX_UNKNOWN_DRAIN) {
          let byte = self.get_byte(start, 3, errors);
          self.reply.push(byte);
        }
        TrackerStatus::Ok
      }
    }
  }

  fn receive_event(&mut self, len : u8, start : u32, errors : &mut ErrorLog) -> TrackerStatus {
    if len != 5 {
      errors.add(ErrorCode::TrackerBadLength, TKR_EVT_DATA, len);
      self.event.fill_placeholders(self.n_boards, PlaceholderReason::BadEventLength);
      return TrackerStatus::BadEventLength;
    }
    let trg_hi      = self.get_byte(start, 4, errors);
    let trg_lo      = self.get_byte(start, 5, errors);
    let cmd_count   = self.get_byte(start, 6, errors);
    let boards      = self.get_byte(start, 7, errors);
    let trg_pattern = boards & 0xC0;
    let n_boards    = boards & 0x3F;
    if n_boards != self.n_boards {
      errors.add(ErrorCode::TrackerNumBoards, n_boards, trg_pattern);
      self.event.fill_placeholders(self.n_boards, PlaceholderReason::BoardCount);
      self.event.trigger_count = u16::from_be_bytes([trg_hi, trg_lo]);
      self.event.cmd_count     = cmd_count;
      self.event.trg_pattern   = trg_pattern;
      return TrackerStatus::BoardCount;
    }
    self.event.trigger_count = u16::from_be_bytes([trg_hi, trg_lo]);
    self.event.cmd_count     = cmd_count;
    self.event.trg_pattern   = trg_pattern;
    self.event.n_boards      = n_boards;
    let mut status = TrackerStatus::Ok;
    for brd in 0..n_boards {
      let n_bytes = self.get_byte(start, 8, errors);
      if n_bytes < 4 {
        errors.add(ErrorCode::TrackerBoardShort, n_bytes, brd);
        for _ in 0..n_bytes {
          self.get_byte(start, 9, errors);
        }
        self.event.store_placeholder(brd as usize, PlaceholderReason::BoardShort);
        status = TrackerStatus::BoardShort;
        continue;
      }
      let board_id = self.get_byte(start, 10, errors);
      if board_id != TKR_HIT_LIST_ID {
        errors.add(ErrorCode::TrackerBadBoardId, board_id, brd);
        for _ in 1..n_bytes {
          self.get_byte(start, 11, errors);
        }
        self.event.store_placeholder(brd as usize, PlaceholderReason::BadBoardId);
        status = TrackerStatus::BadBoardId;
        continue;
      }
      let address = self.get_byte(start, 12, errors);
      if address > 8 {
        errors.add(ErrorCode::TrackerBadFpga, address, brd);
        status = TrackerStatus::BadFpga;
      }
      let layer = address & 0x07;
      if layer != brd {
        errors.add(ErrorCode::TrackerLayerOrder, layer, brd);
      }
      let mut n_keep = n_bytes as usize;
      if n_keep > MAX_TKR_BOARD_BYTES {
        errors.add(ErrorCode::TrackerTooBig, n_bytes, layer);
        n_keep = MAX_TKR_BOARD_BYTES;
      }
      let mut hits = [0u8; MAX_TKR_BOARD_BYTES];
      hits[0] = board_id;
      hits[1] = address;
      for k in 2..n_bytes as usize {
        let byte = self.get_byte(start, 13, errors);
        if k < MAX_TKR_BOARD_BYTES {
          hits[k] = byte;
        }
      }
      self.event.store_hits(layer as usize, &hits[0..n_keep]);
    }
    status
  }

  fn receive_housekeeping(&mut self, len : u8, start : u32, errors : &mut ErrorLog) -> TrackerStatus {
    let mut n_data = self.get_byte(start, 20, errors);
    if len as u16 != n_data as u16 + 6 {
      errors.add(ErrorCode::TrackerBadNData, len, n_data);
      n_data = len.saturating_sub(6);
    }
    let cnt_hi = self.get_byte(start, 21, errors);
    let cnt_lo = self.get_byte(start, 22, errors);
    let fpga   = self.get_byte(start, 23, errors);
    if fpga > 8 {
      errors.add(ErrorCode::TrackerBadFpga, self.cmd_code, fpga);
    }
    let echo   = self.get_byte(start, 24, errors);
    if echo != self.cmd_code {
      errors.add(ErrorCode::TrackerBadEcho, echo, self.cmd_code);
    }
    let mut data = Vec::<u8>::with_capacity(n_data as usize);
    for k in 0..n_data as usize {
      let byte = self.get_byte(start, 25, errors);
      if k < MAX_TKR_HOUSEKEEPING {
        data.push(byte);
      }
    }
    let trailer = *data.last().unwrap_or(&0);
    if trailer != TKR_HOUSE_TRAILER {
      errors.add(ErrorCode::TrackerBadTrailer, self.cmd_code, trailer);
    }
    self.cmd_count    = u16::from_be_bytes([cnt_hi, cnt_lo]);
    let hk = Housekeeping {
      cmd_count : self.cmd_count,
      fpga,
      cmd_code  : self.cmd_code,
      data,
    };
    debug!("Received {}", hk);
    self.housekeeping = Some(hk);
    TrackerStatus::Ok
  }

  fn receive_echo(&mut self, len : u8, start : u32, errors : &mut ErrorLog) -> TrackerStatus {
    if len != 4 {
      errors.add(ErrorCode::TrackerBadLength, TKR_ECHO_DATA, len);
    }
    let cnt_hi = self.get_byte(start, 30, errors);
    let cnt_lo = self.get_byte(start, 31, errors);
    let echo   = self.get_byte(start, 32, errors);
    self.cmd_count = u16::from_be_bytes([cnt_hi, cnt_lo]);
    self.reply     = vec![cnt_hi, cnt_lo, echo];
    if echo != self.cmd_code {
      errors.add(ErrorCode::TrackerBadEcho, echo, self.cmd_code);
      return TrackerStatus::EchoMismatch;
    }
    TrackerStatus::Ok
  }

  /// Send a command without data and consume the echo
  pub fn send_simple(&mut self, fpga : u8, code : u8, errors : &mut ErrorLog) {
    if !self.transmit(fpga, code, &[], errors) {
      return;
    }
    if code == TKR_NO_ECHO_1 || code == TKR_NO_ECHO_2 {
      return;
    }
    let status = self.receive_packet(Expect::Echo, errors);
    if !status.is_ok() {
      errors.add(ErrorCode::GetTrackerDataFailed, status as u8, code);
    }
    self.reply.clear();
  }

  /// Poll the tracker until it reports data ready.
  /// Only an actual status reply can be a bad status,
  /// a missing one is already logged as a timeout.
  pub fn check_data_ready(&mut self, errors : &mut ErrorLog) -> bool {
    let mut status = 0u8;
    for n_try in 0..TKR_STATUS_RETRIES {
      if self.transmit(0, TKR_STATUS, &[], errors) {
        self.receive_packet(Expect::Housekeeping, errors);
      }
      match self.housekeeping.take() {
        Some(hk) => status = *hk.data.first().unwrap_or(&0),
        None     => continue,
      }
      match status {
        TKR_READY     => return true,
        TKR_NOT_READY => (),
        _ => {
          errors.add(ErrorCode::TrackerBadStatus, status, n_try);
        }
      }
    }
    errors.add(ErrorCode::TrackerBadStatus, status, TKR_STATUS_RETRIES + 1);
    false
  }

  /// Ask for the event data of the last trigger
  pub fn read_event(&mut self, errors : &mut ErrorLog) -> TrackerStatus {
    self.transmit(0, TKR_READ_EVENT, &[0x00], errors);
    self.receive_packet(Expect::EventData, errors)
  }

  /// The tracker did not get ready in time
  pub fn fill_not_ready(&mut self) {
    self.event.fill_placeholders(self.n_boards, PlaceholderReason::TrackerNotReady);
  }

  pub fn reset_all_logic(&mut self, errors : &mut ErrorLog) {
    for brd in 0..self.n_boards {
      self.send_simple(brd, TKR_RESET_LOGIC, errors);
    }
  }

  /// Enable the tracker trigger. The echo stays
  /// available through `take_reply`.
  pub fn enable_trigger(&mut self, errors : &mut ErrorLog) -> TrackerStatus {
    if !self.transmit(0, TKR_TRIGGER_ENABLE, &[], errors) {
      return TrackerStatus::WrongType;
    }
    self.receive_packet(Expect::Echo, errors)
  }

  /// Length prefixed answer of an ASIC register read
  pub fn read_asic_data(&mut self, errors : &mut ErrorLog) -> Vec<u8> {
    let start   = self.clock.now();
    let n_bytes = self.get_byte(start, 40, errors);
    let mut data = vec![n_bytes];
    for k in 0..n_bytes {
      let byte = self.get_byte(start, 41, errors);
      if (k as usize) < MAX_DATA_OUT - 1 {
        data.push(byte);
      }
    }
    data
  }

  pub fn read_asic_config(&mut self, fpga : u8, chip : u8, errors : &mut ErrorLog) -> Vec<u8> {
    if !self.transmit(fpga, TKR_READ_ASIC_CONFIG, &[chip], errors) {
      return Vec::new();
    }
    self.read_asic_data(errors)
  }

  /// 4 bytes of a tracker I2C register read
  pub fn read_i2c_data(&mut self, errors : &mut ErrorLog) -> Vec<u8> {
    let start = self.clock.now();
    let mut data = Vec::<u8>::with_capacity(4);
    for _ in 0..4 {
      let byte = self.get_byte(start, 42, errors);
      data.push(byte);
    }
    data
  }

  /// Let a board calibrate the timing of its ASIC inputs
  pub fn calibrate_input_timing(&mut self, fpga : u8, errors : &mut ErrorLog) {
    debug!("Calibrating input timing of board {}", fpga);
    self.send_simple(fpga, TKR_CALIBRATE_INPUT, errors);
    self.clock.delay_ms(1);
    for chip in 0..TKR_N_ASICS {
      for _ in 0..5 {
        self.read_asic_config(fpga, chip, errors);
      }
    }
    self.clock.delay_ms(2);
    self.send_simple(fpga, TKR_SET_INPUT_DELAY, errors);
  }

  pub fn calibrate_all(&mut self, errors : &mut ErrorLog) {
    for brd in 0..self.n_boards {
      self.calibrate_input_timing(brd, errors);
    }
  }

  /// Program a mask register of one ASIC. Returns
  /// the echo for the host.
  ///
  /// # Arguments:
  ///
  /// * reg_type : 1 calibration, 2 data, anything else trigger
  pub fn load_mask(&mut self, fpga : u8, chip : u8, reg_type : u8, mask : u64, errors : &mut ErrorLog) -> Vec<u8> {
    let code = match reg_type {
      MASK_TYPE_CALIBRATION => TKR_LOAD_CAL_MASK,
      MASK_TYPE_DATA        => TKR_LOAD_DATA_MASK,
      _                     => TKR_LOAD_TRIGGER_MASK,
    };
    let mut data = vec![chip & 0x1F];
    data.extend_from_slice(&mask.to_be_bytes());
    if !self.transmit(fpga & 0x07, code, &data, errors) {
      return Vec::new();
    }
    let status = self.receive_packet(Expect::Echo, errors);
    if !status.is_ok() {
      errors.add(ErrorCode::GetTrackerDataFailed, status as u8, code);
    }
    self.take_reply()
  }

  /// The 9 bytes of trigger primitives a board returns
  /// after a calibration strobe
  pub fn read_board_trigger_data(&mut self, fpga : u8, errors : &mut ErrorLog) -> Vec<u8> {
    let start = self.clock.now();
    self.get_byte(start, 50, errors);
    let head = self.get_byte(start, 51, errors);
    let fpga_ret = (head & 0x38) >> 3;
    if fpga_ret != fpga {
      errors.add(ErrorCode::TrackerBadTriggerHead, fpga, fpga_ret);
    }
    let mut data = vec![head];
    for _ in 0..8 {
      let byte = self.get_byte(start, 52, errors);
      data.push(byte);
    }
    data
  }

  /// Fire the calibration strobe and read back
  /// the trigger data of one board
  pub fn cal_strobe(&mut self, fpga : u8, delay : u8, tag : u8, errors : &mut ErrorLog) -> Vec<u8> {
    let setting = ((delay & 0x3F) << 2) | (tag & 0x03);
    if !self.transmit(0, TKR_CAL_STROBE, &[0x1F, setting, fpga], errors) {
      return Vec::new();
    }
    self.read_board_trigger_data(fpga, errors)
  }

  /// Read the event following a calibration strobe
  pub fn read_cal_event(&mut self, tag : u8, errors : &mut ErrorLog) -> TrackerStatus {
    self.transmit(0, TKR_READ_EVENT, &[0x04 | (tag & 0x03)], errors);
    self.receive_packet(Expect::EventData, errors)
  }

  /// Forward an arbitrary command to the tracker. Returns
  /// None for codes which are reserved for the core.
  pub fn pass_through(&mut self, fpga : u8, code : u8, data : &[u8], errors : &mut ErrorLog) -> Option<Vec<u8>> {
    if code == TKR_INTERNAL_1 || code == TKR_INTERNAL_2 {
      warn!("Tracker command {:#04x} is reserved, not forwarded", code);
      return None;
    }
    if code == TKR_SET_LAYERS {
      if let Some(n_boards) = data.first() {
        self.set_boards(*n_boards);
      }
    }
    if !self.transmit(fpga, code, data, errors) {
      return Some(Vec::new());
    }
    match code {
      TKR_NO_ECHO_1 | TKR_NO_ECHO_2 => Some(Vec::new()),
      0x20..=0x25   => Some(self.read_asic_data(errors)),
      TKR_I2C_READ  => Some(self.read_i2c_data(errors)),
      _ => {
        let status = self.receive_packet(Expect::Any, errors);
        if !status.is_ok() {
          errors.add(ErrorCode::GetTrackerDataFailed, status as u8, code);
        }
        Some(self.take_reply())
      }
    }
  }
}

#[cfg(test)]
mod test_tracker {
  use super::*;
  use std::cell::Cell;
  use std::collections::VecDeque;

  #[derive(Default)]
  struct Script {
    rx : VecDeque<u8>,
    tx : Vec<u8>,
  }

  impl TrackerPort for Script {
    fn rx_ready(&mut self) -> bool { !self.rx.is_empty() }
    fn read_byte(&mut self) -> u8 { self.rx.pop_front().unwrap_or(0) }
    fn tx_full(&mut self) -> bool { false }
    fn write_byte(&mut self, byte : u8) { self.tx.push(byte) }
    fn tx_pending(&mut self) -> usize { 0 }
    fn clear_rx(&mut self) { self.rx.clear() }
  }

  #[derive(Default)]
  struct Steps(Cell<u32>);

  impl Clock for Steps {
    fn now(&self) -> u32 {
      self.0.set(self.0.get() + 1);
      self.0.get()
    }
    fn delay_ms(&self, _ms : u32) {}
  }

  fn engine(rx : &[u8], n_boards : u8) -> TrackerEngine<Script, Steps> {
    let mut port = Script::default();
    port.rx.extend(rx.iter());
    TrackerEngine::new(port, Steps::default(), n_boards)
  }

  #[test]
  fn good_event() {
    let rx = [5, 0xD3, 0x01, 0x02, 7, 0x80 | 2,
              4, 0xE7, 0x00, 0xAA, 0xBB,
              5, 0xE7, 0x01, 0x01, 0x02, 0x03];
    let mut tkr    = engine(&rx, 2);
    let mut errors = ErrorLog::new();
    assert_eq!(tkr.read_event(&mut errors), TrackerStatus::Ok);
    assert!(errors.is_empty());
    assert_eq!(tkr.port().tx, vec![0x00, 0x01, 0x01, 0x00]);
    assert_eq!(tkr.event.trigger_count, 0x0102);
    assert_eq!(tkr.event.trg_pattern, 0x80);
    assert_eq!(tkr.event.hit_list(0), Some(&[0xE7, 0x00, 0xAA, 0xBB][..]));
    assert_eq!(tkr.event.hit_list(1).unwrap().len(), 5);
  }

  #[test]
  fn bad_board_does_not_spoil_the_rest() {
    let rx = [5, 0xD3, 0x00, 0x01, 0, 2,
              4, 0x12, 0x00, 0xAA, 0xBB,
              4, 0xE7, 0x01, 0x01, 0x02];
    let mut tkr    = engine(&rx, 2);
    let mut errors = ErrorLog::new();
    assert_eq!(tkr.read_event(&mut errors), TrackerStatus::BadBoardId);
    assert_eq!(errors.count(ErrorCode::TrackerBadBoardId), 1);
    assert_eq!(tkr.event.hit_list(0), Some(&[0xE7, 0x00, 0x00, 5, 0x30][..]));
    assert_eq!(tkr.event.hit_list(1), Some(&[0xE7, 0x01, 0x01, 0x02][..]));
  }

  #[test]
  fn layer_order() {
    let rx = [5, 0xD3, 0x00, 0x01, 0, 1,
              4, 0xE7, 0x03, 0xAA, 0xBB];
    let mut tkr    = engine(&rx, 1);
    let mut errors = ErrorLog::new();
    assert_eq!(tkr.read_event(&mut errors), TrackerStatus::Ok);
    assert_eq!(errors.count(ErrorCode::TrackerLayerOrder), 1);
    assert!(tkr.event.hit_list(0).is_none());
    assert!(tkr.event.hit_list(3).is_some());
  }

  #[test]
  fn silent_tracker() {
    let mut tkr    = engine(&[], 3);
    let mut errors = ErrorLog::new();
    assert_eq!(tkr.read_event(&mut errors), TrackerStatus::WrongType);
    assert_eq!(errors.count(ErrorCode::TrackerReadTimeout), 2);
    assert_eq!(errors.count(ErrorCode::TrackerWrongDataType), 1);
    for brd in 0..3 {
      assert_eq!(tkr.event.hit_list(brd).unwrap()[3], PlaceholderReason::WrongDataType as u8);
    }
  }

  #[test]
  fn board_count_mismatch() {
    let rx = [5, 0xD3, 0x00, 0x09, 0, 0x40 | 1];
    let mut tkr    = engine(&rx, 2);
    let mut errors = ErrorLog::new();
    assert_eq!(tkr.read_event(&mut errors), TrackerStatus::BoardCount);
    assert_eq!(errors.records()[0].value0, 1);
    assert_eq!(errors.records()[0].value1, 0x40);
    assert_eq!(tkr.event.n_boards, 2);
    assert_eq!(tkr.event.trigger_count, 9);
    assert_eq!(tkr.event.hit_list(1).unwrap()[3], PlaceholderReason::BoardCount as u8);
  }

  #[test]
  fn oversized_board_is_truncated() {
    let mut rx = vec![5, 0xD3, 0x00, 0x01, 0, 1, 250, 0xE7, 0x00];
    rx.extend(std::iter::repeat(0x55).take(248));
    let mut tkr    = engine(&rx, 1);
    let mut errors = ErrorLog::new();
    assert_eq!(tkr.read_event(&mut errors), TrackerStatus::Ok);
    assert_eq!(errors.count(ErrorCode::TrackerTooBig), 1);
    assert_eq!(tkr.event.hit_list(0).unwrap().len(), MAX_TKR_BOARD_BYTES);
    assert!(!tkr.port().rx_ready());
  }

  #[test]
  fn echo_and_housekeeping() {
    let rx = [4, 0xF1, 0x00, 0x10, 0x65,
              4, 0xF1, 0x00, 0x11, 0x33];
    let mut tkr    = engine(&rx, 1);
    let mut errors = ErrorLog::new();
    assert_eq!(tkr.enable_trigger(&mut errors), TrackerStatus::Ok);
    assert_eq!(tkr.take_reply(), vec![0x00, 0x10, 0x65]);
    assert_eq!(tkr.cmd_count, 0x10);
    assert_eq!(tkr.enable_trigger(&mut errors), TrackerStatus::EchoMismatch);
    assert_eq!(errors.count(ErrorCode::TrackerBadEcho), 1);

    // housekeeping with a wrong trailer
    let rx = [8, 0xC7, 2, 0x00, 0x05, 0x00, 0x57, 0x59, 0x0E];
    let mut tkr    = engine(&rx, 1);
    let mut errors = ErrorLog::new();
    assert!(tkr.check_data_ready(&mut errors));
    assert_eq!(errors.count(ErrorCode::TrackerBadTrailer), 1);
    assert!(!tkr.has_housekeeping());
  }

  #[test]
  fn never_ready() {
    let mut rx = Vec::<u8>::new();
    for _ in 0..TKR_STATUS_RETRIES {
      rx.extend_from_slice(&[8, 0xC7, 2, 0x00, 0x05, 0x00, 0x57, 0x4E, 0x0F]);
    }
    let mut tkr    = engine(&rx, 1);
    let mut errors = ErrorLog::new();
    assert!(!tkr.check_data_ready(&mut errors));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.records()[0].code, ErrorCode::TrackerBadStatus);
    assert_eq!(errors.records()[0].value1, TKR_STATUS_RETRIES + 1);
  }

  #[test]
  fn silent_tracker_is_not_a_bad_status() {
    let mut tkr    = engine(&[], 1);
    let mut errors = ErrorLog::new();
    assert!(!tkr.check_data_ready(&mut errors));
    assert_eq!(errors.count(ErrorCode::TrackerBadStatus), 1);
    let last = errors.records().iter().filter(|r| r.code == ErrorCode::TrackerBadStatus).last().unwrap();
    assert_eq!(last.value0, 0);
    assert_eq!(last.value1, TKR_STATUS_RETRIES + 1);
  }

  #[test]
  fn garbled_status_counts_every_try() {
    let mut rx = Vec::<u8>::new();
    rx.extend_from_slice(&[8, 0xC7, 2, 0x00, 0x05, 0x00, 0x57, 0x33, 0x0F]);
    rx.extend_from_slice(&[8, 0xC7, 2, 0x00, 0x06, 0x00, 0x57, 0x59, 0x0F]);
    let mut tkr    = engine(&rx, 1);
    let mut errors = ErrorLog::new();
    assert!(tkr.check_data_ready(&mut errors));
    assert_eq!(errors.count(ErrorCode::TrackerBadStatus), 1);
    assert_eq!(errors.records()[0].value0, 0x33);
    assert_eq!(errors.records()[0].value1, 0);
  }

  #[test]
  fn pass_through_refuses_internal_codes() {
    let mut tkr    = engine(&[], 1);
    let mut errors = ErrorLog::new();
    assert!(tkr.pass_through(0, TKR_INTERNAL_1, &[], &mut errors).is_none());
    assert!(tkr.port().tx.is_empty());
    let reply = tkr.pass_through(0, TKR_NO_ECHO_1, &[], &mut errors).unwrap();
    assert!(reply.is_empty());
    assert!(errors.is_empty());
    tkr.pass_through(0, TKR_SET_LAYERS, &[4], &mut errors);
    assert_eq!(tkr.n_boards, 4);
  }

  #[test]
  fn trigger_head() {
    let rx = [0x00, 0x02 << 3, 1, 2, 3, 4, 5, 6, 7, 8];
    let mut tkr    = engine(&rx, 3);
    let mut errors = ErrorLog::new();
    let data = tkr.read_board_trigger_data(1, &mut errors);
    assert_eq!(data.len(), 9);
    assert_eq!(errors.count(ErrorCode::TrackerBadTriggerHead), 1);
  }
}
