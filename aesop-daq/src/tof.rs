//! TOF ring buffers and the correlation of the two
//! channels around a trigger
//!
//! Both channels keep the last 64 stop samples, each
//! tagged with the lower 16 bits of the master clock
//! at the time it was stored. At event build time the
//! correlator looks for the pair of hits, one per
//! channel, which are close to the trigger tag and
//! have the smallest absolute time difference.
//!

use aesop_dataclasses::constants::{TOF_BUFFER_SIZE,
                                   TOF_DUMP_MAX_ENTRIES,
                                   TOF_REF_HIGH,
                                   TOF_REF_LOW,
                                   TOF_ROLLOVER};
use aesop_dataclasses::events::{TofSample,
                                TofMeasurement};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TofChannel {
  A,
  B,
}

/// Circular buffer of TOF samples. The write
/// cursor always points to the oldest slot.
#[derive(Debug, Clone)]
pub struct TofBuffer {
  samples : [TofSample; TOF_BUFFER_SIZE],
  ptr     : usize,
}

impl TofBuffer {

  pub fn new() -> Self {
    Self {
      samples : [TofSample::default(); TOF_BUFFER_SIZE],
      ptr     : 0,
    }
  }

  /// Store a sample, overwriting the oldest one
  pub fn push(&mut self, sample : TofSample) {
    self.samples[self.ptr] = sample;
    self.ptr = (self.ptr + 1) % TOF_BUFFER_SIZE;
  }

  /// Mark all slots as empty and rewind the cursor
  pub fn clear(&mut self) {
    for sample in self.samples.iter_mut() {
      sample.filled = false;
    }
    self.ptr = 0;
  }

  pub fn cursor(&self) -> usize {
    self.ptr
  }

  /// Index of the most recently written slot
  pub fn latest_index(&self) -> usize {
    (self.ptr + TOF_BUFFER_SIZE - 1) % TOF_BUFFER_SIZE
  }

  pub fn get(&self, index : usize) -> Option<&TofSample> {
    self.samples.get(index)
  }

  pub fn n_filled(&self) -> usize {
    self.samples.iter().filter(|s| s.filled).count()
  }

  /// Filled samples from the newest to the oldest
  pub fn newest_first(&self) -> impl Iterator<Item = &TofSample> {
    (1..=TOF_BUFFER_SIZE)
      .map(move |k| &self.samples[(self.ptr + TOF_BUFFER_SIZE - k) % TOF_BUFFER_SIZE])
      .filter(|s| s.filled)
  }

  /// The latest sample as 9 bytes
  /// [ref hi, ref lo, 0, stop hi, stop lo, 0, clk hi, clk lo, index].
  /// The sample is consumed, so asking twice only gives data once.
  pub fn take_latest(&mut self) -> Vec<u8> {
    let idx    = self.latest_index();
    let sample = self.samples[idx];
    let mut bytes = vec![0u8;9];
    bytes[8] = idx as u8;
    if sample.filled {
      bytes[0] = (sample.reference() >> 8) as u8;
      bytes[1] = (sample.reference() & 0xFF) as u8;
      bytes[3] = (sample.stop() >> 8) as u8;
      bytes[4] = (sample.stop() & 0xFF) as u8;
      bytes[6] = (sample.clk_cnt >> 8) as u8;
      bytes[7] = (sample.clk_cnt & 0xFF) as u8;
      self.samples[idx].filled = false;
    }
    bytes
  }

  /// Up to 21 samples, newest first, 6 bytes each
  /// [ref hi, ref lo, stop hi, stop lo, clk hi, clk lo].
  /// Returns the number of filled samples alongside.
  fn dump(&self) -> (usize, Vec<u8>) {
    let mut bytes = Vec::<u8>::new();
    for sample in self.newest_first().take(TOF_DUMP_MAX_ENTRIES) {
      bytes.extend_from_slice(&sample.reference().to_be_bytes());
      bytes.extend_from_slice(&sample.stop().to_be_bytes());
      bytes.extend_from_slice(&sample.clk_cnt.to_be_bytes());
    }
    (self.n_filled(), bytes)
  }
}

impl Default for TofBuffer {
  fn default() -> Self {
    Self::new()
  }
}

/// Both channels, so that they can be locked together
#[derive(Debug, Clone, Default)]
pub struct TofBuffers {
  pub a : TofBuffer,
  pub b : TofBuffer,
}

impl TofBuffers {

  pub fn new() -> Self {
    Self {
      a : TofBuffer::new(),
      b : TofBuffer::new(),
    }
  }

  pub fn channel_mut(&mut self, channel : TofChannel) -> &mut TofBuffer {
    match channel {
      TofChannel::A => &mut self.a,
      TofChannel::B => &mut self.b,
    }
  }

  pub fn clear(&mut self) {
    self.a.clear();
    self.b.clear();
  }

  /// Correlate both channels against the trigger tag
  /// and empty the buffers for the next event
  pub fn correlate_and_clear(&mut self, trigger_tag : u16) -> TofMeasurement {
    let tof = correlate(&self.a, &self.b, trigger_tag);
    self.clear();
    tof
  }

  /// Debug dump of both channels
  ///
  /// Layout: [n_a, n_b, flag, A samples.., B samples..]
  /// where flag is 2 if either channel holds more than
  /// fits into a single response, 1 otherwise. Both
  /// channels are emptied.
  pub fn dump(&mut self) -> Vec<u8> {
    let (n_a, bytes_a) = self.a.dump();
    let (n_b, bytes_b) = self.b.dump();
    let n_a_sent = bytes_a.len() / 6;
    let n_b_sent = bytes_b.len() / 6;
    let mut flag = 1u8;
    if n_a > n_a_sent || n_b > n_b_sent {
      flag = 2;
    }
    let mut bytes = vec![n_a_sent as u8, n_b_sent as u8, flag];
    bytes.extend_from_slice(&bytes_a);
    bytes.extend_from_slice(&bytes_b);
    self.clear();
    bytes
  }
}

/// Time difference B - A in 10 ps, taking care
/// of the rollover of the reference counter
/// between the two stops
pub fn time_difference(a : &TofSample, b : &TofSample) -> i32 {
  let time_a = a.full_time();
  let time_b = b.full_time();
  if a.reference() > TOF_REF_HIGH && b.reference() < TOF_REF_LOW {
    time_b - (time_a - TOF_ROLLOVER)
  } else if b.reference() > TOF_REF_HIGH && a.reference() < TOF_REF_LOW {
    (time_b - TOF_ROLLOVER) - time_a
  } else {
    time_b - time_a
  }
}

/// Find the best pair of TOF hits for a trigger
///
/// Channel A candidates carry the clock tag T or T+1,
/// channel B candidates T or T-1, with T the trigger tag.
/// A pair qualifies if the tags are at most 1 apart.
/// Among qualifying pairs the one with the smallest |dt|
/// wins, the first found on ties (both channels are
/// scanned newest first, B outside). Pairs with
/// |dt| >= 32767 never win.
///
/// # Arguments:
///
/// * trigger_tag : lower 16 bits of the master clock at the GO
pub fn correlate(a : &TofBuffer, b : &TofBuffer, trigger_tag : u16) -> TofMeasurement {
  let mut tof = TofMeasurement::new();
  // A may be stamped one tick after the GO, B one tick before
  let cands_a : Vec<&TofSample> = a.newest_first()
    .filter(|s| s.clk_cnt == trigger_tag || s.clk_cnt == trigger_tag.wrapping_add(1))
    .collect();
  let cands_b : Vec<&TofSample> = b.newest_first()
    .filter(|s| s.clk_cnt == trigger_tag || s.clk_cnt == trigger_tag.wrapping_sub(1))
    .collect();
  tof.n_a = cands_a.len() as u8;
  tof.n_b = cands_b.len() as u8;
  let mut dt_min = i16::MAX as i32;
  for hit_b in cands_b.iter() {
    for hit_a in cands_a.iter() {
      let tag_diff = hit_a.clk_cnt.wrapping_sub(hit_b.clk_cnt);
      if tag_diff > 1 && tag_diff != u16::MAX {
        continue;
      }
      let dt = time_difference(hit_a, hit_b);
      if dt.abs() < dt_min.abs() {
        dt_min    = dt;
        tof.dt    = dt as i16;
        tof.ref_a = hit_a.reference();
        tof.ref_b = hit_b.reference();
        tof.clk_a = hit_a.clk_cnt;
        tof.clk_b = hit_b.clk_cnt;
      }
    }
  }
  tof
}
