//! Time of flight samples
//!
//! The TOF chip reports a 32 bit shift register value
//! per stop edge. The upper 16 bits are the count of
//! the reference clock at the time the chip locked,
//! the lower 16 bits the stop time within that
//! reference period in units of 10 ps.

use std::fmt;

use crate::constants::{TOF_CLOCK_PERIOD,
                       TOF_NO_CANDIDATE,
                       TOF_NO_MEASUREMENT};

cfg_if::cfg_if! {
  if #[cfg(feature = "random")]  {
    use crate::FromRandom;
    extern crate rand;
    use rand::Rng;
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct TofSample {
  pub shift_reg : u32,
  /// Master clock (5 ms ticks) when the sample
  /// was stored, truncated to 16 bits
  pub clk_cnt   : u16,
  pub filled    : bool,
}

impl TofSample {
  pub fn new(shift_reg : u32, clk_cnt : u16) -> Self {
    Self {
      shift_reg,
      clk_cnt,
      filled : true,
    }
  }

  pub fn reference(&self) -> u16 {
    ((self.shift_reg & 0xFFFF0000) >> 16) as u16
  }

  pub fn stop(&self) -> u16 {
    (self.shift_reg & 0x0000FFFF) as u16
  }

  /// The full time in units of 10 ps
  pub fn full_time(&self) -> i32 {
    self.reference() as i32 * TOF_CLOCK_PERIOD + self.stop() as i32
  }
}

impl fmt::Display for TofSample {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<TofSample: ref {}, stop {}, clk {}, filled {}>",
           self.reference(), self.stop(), self.clk_cnt, self.filled)
  }
}

#[cfg(feature = "random")]
impl FromRandom for TofSample {
  fn from_random() -> Self {
    let mut rng = rand::thread_rng();
    Self {
      shift_reg : rng.gen::<u32>(),
      clk_cnt   : rng.gen::<u16>(),
      filled    : true,
    }
  }
}

/// Result of the correlation of the two TOF channels
/// for a single trigger
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TofMeasurement {
  /// Time B - time A of the best pair, in 10 ps
  pub dt    : i16,
  /// Candidates found in channel A
  pub n_a   : u8,
  /// Candidates found in channel B
  pub n_b   : u8,
  pub ref_a : u16,
  pub ref_b : u16,
  pub clk_a : u16,
  pub clk_b : u16,
}

impl TofMeasurement {
  pub fn new() -> Self {
    Self {
      dt    : TOF_NO_MEASUREMENT,
      n_a   : 0,
      n_b   : 0,
      ref_a : TOF_NO_CANDIDATE,
      ref_b : TOF_NO_CANDIDATE,
      clk_a : TOF_NO_CANDIDATE,
      clk_b : TOF_NO_CANDIDATE,
    }
  }

  /// False if no pair of hits was found
  pub fn is_valid(&self) -> bool {
    self.dt != TOF_NO_MEASUREMENT
  }
}

impl Default for TofMeasurement {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for TofMeasurement {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<TofMeasurement:");
    if self.is_valid() {
      repr += &(format!("\n  dt [10ps]     : {}", self.dt));
    } else {
      repr += "\n  dt [10ps]     : NO MEASUREMENT";
    }
    repr += &(format!("\n  candidates    : A {} B {}", self.n_a, self.n_b));
    repr += &(format!("\n  reference A|B : {} | {}", self.ref_a, self.ref_b));
    repr += &(format!("\n  clock A|B     : {} | {}", self.clk_a, self.clk_b));
    write!(f, "{}>", repr)
  }
}

#[cfg(test)]
mod test_tof_sample {
  use super::*;

  #[test]
  fn split_shift_register() {
    let sample = TofSample::new(0x0003_0010, 1000);
    assert_eq!(sample.reference(), 3);
    assert_eq!(sample.stop(), 16);
    assert_eq!(sample.full_time(), 3*8333 + 16);
    assert!(sample.filled);
    assert!(!TofSample::default().filled);
  }

  #[test]
  fn no_measurement_default() {
    let m = TofMeasurement::default();
    assert!(!m.is_valid());
    assert_eq!(m.dt, 32767);
    assert_eq!(m.clk_a, 65535);
  }
}
