//! The process-wide configuration record
//!
//! Holds what the host configured through commands and
//! what gets written into the hardware at start up.
//! There is exactly one instance, owned by the `Daq`.

use std::fmt;

use serde::{Deserialize,
            Serialize};

use aesop_dataclasses::constants::{MAX_TKR_BOARDS,
                                   TOF_CONFIG_SIZE};

use crate::registers::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaqConfig {
  /// 8 bit VDAC thresholds of PMT channels 1-4
  pub thresholds         : [u8;4],
  /// 12 bit threshold of PMT channel 5
  pub dac_ch5            : u16,
  pub tof_dac            : [u16;2],
  pub tof_config         : [u8; TOF_CONFIG_SIZE],
  pub trigger_mask_e     : u8,
  pub trigger_mask_p     : u8,
  pub prescale_tkr       : u8,
  pub prescale_pmt       : u8,
  pub coincidence_window : u8,
  pub peak_reset_wait    : u8,
  /// 0 SPI to the main PSOC, 1 USB
  pub output_mode        : u8,
  pub n_tkr_boards       : u8,
}

impl DaqConfig {

  pub fn new() -> Self {
    Self {
      thresholds         : [THRESHOLD_DEFAULT;4],
      dac_ch5            : DAC_CH5_DEFAULT,
      tof_dac            : [TOF_DAC_DEFAULT;2],
      tof_config         : TOF_DEFAULT_CONFIG,
      trigger_mask_e     : TRIGGER_MASK_E_DEFAULT,
      trigger_mask_p     : TRIGGER_MASK_P_DEFAULT,
      prescale_tkr       : PRESCALE_DEFAULT,
      prescale_pmt       : PRESCALE_DEFAULT,
      coincidence_window : COINCIDENCE_WINDOW,
      peak_reset_wait    : PEAK_RESET_WAIT,
      output_mode        : OUTPUT_USB,
      n_tkr_boards       : N_TKR_BOARDS_DEFAULT,
    }
  }

  /// Back to the board defaults
  pub fn reset(&mut self) {
    *self = Self::new();
  }

  /// Threshold of an internal DAC channel (1-4)
  pub fn threshold(&self, channel : u8) -> Option<u8> {
    match channel {
      1..=4 => Some(self.thresholds[(channel - 1) as usize]),
      _     => None,
    }
  }

  pub fn set_threshold(&mut self, channel : u8, value : u8) -> bool {
    match channel {
      1..=4 => {
        self.thresholds[(channel - 1) as usize] = value;
        true
      },
      _ => false
    }
  }

  /// 1 selects the 'e' mask, 2 the 'p' mask
  pub fn trigger_mask(&self, which : u8) -> Option<u8> {
    match which {
      1 => Some(self.trigger_mask_e),
      2 => Some(self.trigger_mask_p),
      _ => None,
    }
  }

  pub fn set_trigger_mask(&mut self, which : u8, mask : u8) -> bool {
    match which {
      1 => self.trigger_mask_e = mask,
      2 => self.trigger_mask_p = mask,
      _ => return false,
    }
    true
  }

  pub fn set_prescale(&mut self, which : u8, value : u8) -> bool {
    match which {
      1 => self.prescale_tkr = value,
      2 => self.prescale_pmt = value,
      _ => return false,
    }
    true
  }

  pub fn set_output_mode(&mut self, mode : u8) -> bool {
    if mode != OUTPUT_SPI && mode != OUTPUT_USB {
      return false;
    }
    self.output_mode = mode;
    true
  }

  pub fn set_tkr_boards(&mut self, n_boards : u8) {
    self.n_tkr_boards = n_boards.min(MAX_TKR_BOARDS as u8);
  }
}

impl Default for DaqConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for DaqConfig {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<DaqConfig:");
    repr += &(format!("\n  thresholds       : {:?} | ch5 {}", self.thresholds, self.dac_ch5));
    repr += &(format!("\n  TOF DACs         : {:?}", self.tof_dac));
    repr += &(format!("\n  trigger masks    : e {:#04x} p {:#04x}", self.trigger_mask_e, self.trigger_mask_p));
    repr += &(format!("\n  prescales        : tkr {} pmt {}", self.prescale_tkr, self.prescale_pmt));
    repr += &(format!("\n  coinc. window    : {}", self.coincidence_window));
    repr += &(format!("\n  peak reset wait  : {}", self.peak_reset_wait));
    repr += &(format!("\n  output mode      : {}", if self.output_mode == OUTPUT_USB {"USB"} else {"SPI"}));
    repr += &(format!("\n  tracker boards   : {}", self.n_tkr_boards));
    write!(f, "{}>", repr)
  }
}

#[cfg(test)]
mod test_config {
  use super::*;

  #[test]
  fn accessors() {
    let mut cfg = DaqConfig::default();
    assert_eq!(cfg.threshold(1), Some(THRESHOLD_DEFAULT));
    assert!(cfg.set_threshold(4, 200));
    assert!(!cfg.set_threshold(5, 200));
    assert_eq!(cfg.threshold(4), Some(200));
    assert!(!cfg.set_output_mode(2));
    assert_eq!(cfg.output_mode, OUTPUT_USB);
    assert!(cfg.set_trigger_mask(2, 0x0F));
    assert_eq!(cfg.trigger_mask(2), Some(0x0F));
    assert_eq!(cfg.trigger_mask(3), None);
    cfg.set_tkr_boards(12);
    assert_eq!(cfg.n_tkr_boards, 8);
    cfg.reset();
    assert_eq!(cfg, DaqConfig::new());
  }
}
