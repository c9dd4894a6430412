//! Tracker data for a single trigger
//!
//! The hit lists live in a fixed pool of slots, one per
//! board/layer. A slot is filled by the tracker protocol
//! engine, copied out once by the packet builder and then
//! released, so it can be reused for the next event.

use std::fmt;

use crate::constants::{MAX_TKR_BOARDS,
                       MAX_TKR_BOARD_BYTES,
                       TKR_HIT_LIST_ID,
                       TKR_PLACEHOLDER_END};

/// Why a board got a placeholder instead of real data.
/// The value is written into the 4th byte of the
/// placeholder hit list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[repr(u8)]
pub enum PlaceholderReason {
  Unknown         = 0u8,
  WrongDataType   = 1u8,
  BadEventLength  = 2u8,
  BoardCount      = 3u8,
  BoardShort      = 4u8,
  BadBoardId      = 5u8,
  TrackerNotReady = 6u8,
  MissingHitList  = 7u8,
}

impl From<u8> for PlaceholderReason {
  fn from(value : u8) -> Self {
    match value {
      1 => PlaceholderReason::WrongDataType,
      2 => PlaceholderReason::BadEventLength,
      3 => PlaceholderReason::BoardCount,
      4 => PlaceholderReason::BoardShort,
      5 => PlaceholderReason::BadBoardId,
      6 => PlaceholderReason::TrackerNotReady,
      7 => PlaceholderReason::MissingHitList,
      _ => PlaceholderReason::Unknown,
    }
  }
}

impl fmt::Display for PlaceholderReason {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let r = serde_json::to_string(self).unwrap_or(
      String::from("Error: cannot unwrap this PlaceholderReason"));
    write!(f, "<PlaceholderReason: {}>", r)
  }
}

/// The 5 byte hit list standing in for a board
pub fn placeholder_hits(board : u8, reason : PlaceholderReason) -> [u8;5] {
  [TKR_HIT_LIST_ID, board, 0x00, reason as u8, TKR_PLACEHOLDER_END]
}

/// One slot of the hit list pool
#[derive(Debug, Clone)]
pub struct BoardHits {
  n_bytes  : u8,
  hit_list : [u8; MAX_TKR_BOARD_BYTES],
}

impl BoardHits {
  pub fn new() -> Self {
    Self {
      n_bytes  : 0,
      hit_list : [0u8; MAX_TKR_BOARD_BYTES],
    }
  }

  /// Copy a hit list into the slot, truncating
  /// at the maximum board size
  pub fn fill(&mut self, hits : &[u8]) {
    let n = hits.len().min(MAX_TKR_BOARD_BYTES);
    self.hit_list[0..n].copy_from_slice(&hits[0..n]);
    self.n_bytes = n as u8;
  }

  pub fn fill_placeholder(&mut self, board : u8, reason : PlaceholderReason) {
    self.fill(&placeholder_hits(board, reason));
  }

  pub fn len(&self) -> usize {
    self.n_bytes as usize
  }

  pub fn is_empty(&self) -> bool {
    self.n_bytes == 0
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.hit_list[0..self.n_bytes as usize]
  }

  pub fn release(&mut self) {
    self.n_bytes = 0;
  }
}

impl Default for BoardHits {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Debug, Clone)]
pub struct TrackerEvent {
  pub trigger_count : u16,
  pub cmd_count     : u8,
  /// bit 7 non-bending, bit 6 bending view
  pub trg_pattern   : u8,
  pub n_boards      : u8,
  slots             : [BoardHits; MAX_TKR_BOARDS],
}

impl TrackerEvent {

  pub fn new() -> Self {
    Self {
      trigger_count : 0,
      cmd_count     : 0,
      trg_pattern   : 0,
      n_boards      : 0,
      slots         : core::array::from_fn(|_| BoardHits::new()),
    }
  }

  pub fn store_hits(&mut self, board : usize, hits : &[u8]) {
    match self.slots.get_mut(board) {
      None       => error!("No hit list slot for board {board}!"),
      Some(slot) => slot.fill(hits),
    }
  }

  pub fn store_placeholder(&mut self, board : usize, reason : PlaceholderReason) {
    match self.slots.get_mut(board) {
      None       => error!("No hit list slot for board {board}!"),
      Some(slot) => slot.fill_placeholder(board as u8, reason),
    }
  }

  /// Replace the whole event by placeholders for
  /// `n_boards` boards, all with the same reason
  pub fn fill_placeholders(&mut self, n_boards : u8, reason : PlaceholderReason) {
    self.trigger_count = 0;
    self.cmd_count     = 0;
    self.trg_pattern   = 0;
    self.n_boards      = n_boards.min(MAX_TKR_BOARDS as u8);
    for brd in 0..self.n_boards as usize {
      self.store_placeholder(brd, reason);
    }
  }

  /// The hit list of a board, None if the slot is empty
  pub fn hit_list(&self, board : usize) -> Option<&[u8]> {
    match self.slots.get(board) {
      Some(slot) if !slot.is_empty() => Some(slot.as_slice()),
      _ => None,
    }
  }

  /// Hand back all slots. Releasing an already
  /// released slot does nothing.
  pub fn release(&mut self) {
    for slot in self.slots.iter_mut() {
      slot.release();
    }
  }

  /// Number of slots currently holding data
  pub fn n_filled(&self) -> usize {
    self.slots.iter().filter(|s| !s.is_empty()).count()
  }
}

impl Default for TrackerEvent {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for TrackerEvent {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<TrackerEvent:");
    repr += &(format!("\n  trigger count : {}", self.trigger_count));
    repr += &(format!("\n  cmd count     : {}", self.cmd_count));
    repr += &(format!("\n  pattern       : {:#04x}", self.trg_pattern));
    repr += &(format!("\n  n boards      : {}", self.n_boards));
    for brd in 0..self.n_boards as usize {
      match self.hit_list(brd) {
        None       => repr += &(format!("\n  -- board {brd} : EMPTY")),
        Some(hits) => repr += &(format!("\n  -- board {brd} : {} bytes", hits.len())),
      }
    }
    write!(f, "{}>", repr)
  }
}

#[cfg(test)]
mod test_tracker_event {
  use super::*;

  #[test]
  fn placeholders_for_all_boards() {
    let mut ev = TrackerEvent::new();
    ev.trigger_count = 42;
    ev.fill_placeholders(4, PlaceholderReason::BadEventLength);
    assert_eq!(ev.n_boards, 4);
    assert_eq!(ev.trigger_count, 0);
    for brd in 0..4 {
      assert_eq!(ev.hit_list(brd), Some(&[0xE7, brd as u8, 0x00, 0x02, 0x30][..]));
    }
    assert_eq!(ev.hit_list(4), None);
  }

  #[test]
  fn release_is_idempotent() {
    let mut ev = TrackerEvent::new();
    ev.n_boards = 2;
    ev.store_hits(0, &[0xE7, 0x00, 0x01, 0x02]);
    ev.store_hits(1, &[0xE7, 0x01, 0x01, 0x02, 0x05]);
    assert_eq!(ev.n_filled(), 2);
    ev.release();
    assert_eq!(ev.n_filled(), 0);
    ev.release();
    assert_eq!(ev.n_filled(), 0);
    assert_eq!(ev.hit_list(0), None);
  }

  #[test]
  fn slots_are_reused() {
    let mut ev = TrackerEvent::new();
    ev.store_hits(2, &[0xE7, 0x02, 0x01, 0x02, 0x03, 0x04]);
    ev.release();
    ev.store_hits(2, &[0xE7, 0x02, 0x09, 0x09]);
    assert_eq!(ev.hit_list(2), Some(&[0xE7, 0x02, 0x09, 0x09][..]));
    assert_eq!(ev.n_filled(), 1);
  }

  #[test]
  fn oversized_hits_get_truncated() {
    let mut ev   = TrackerEvent::new();
    let big_list = vec![0xE7u8; MAX_TKR_BOARD_BYTES + 20];
    ev.store_hits(3, &big_list);
    assert_eq!(ev.hit_list(3).map(|h| h.len()), Some(MAX_TKR_BOARD_BYTES));
    // out of range boards are refused
    ev.store_hits(MAX_TKR_BOARDS, &[0xE7]);
    assert_eq!(ev.hit_list(MAX_TKR_BOARDS), None);
  }
}
