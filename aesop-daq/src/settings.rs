//! Settings file for running the core on a host
//!
//! The `[config]` section is the initial board
//! configuration, `[sim]` steers the simulated
//! detector.
//!

use std::fmt;
use std::fs::File;
use std::io::{Read,
              Write};

use serde::{Deserialize,
            Serialize};

use aesop_dataclasses::errors::SerializationError;

use crate::config::DaqConfig;

/// Parameters of the simulated detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSettings {
  /// Mean rate of GO signals
  pub trigger_rate_hz : f32,
  /// Spread of the TOF hits around the trigger
  /// in master clock ticks
  pub tof_jitter      : u8,
  /// Boards answering on the simulated tracker link
  pub n_tkr_boards    : u8,
  /// Maximum number of hit bytes per board
  pub hits_per_board  : u8,
  /// Run the master clock with wall time instead
  /// of as fast as possible
  pub realtime        : bool,
}

impl SimSettings {
  pub fn new() -> Self {
    Self {
      trigger_rate_hz : 20.0,
      tof_jitter      : 1,
      n_tkr_boards    : 1,
      hits_per_board  : 12,
      realtime        : false,
    }
  }

  /// Ticks of the master clock between two GOs
  pub fn trigger_interval(&self) -> u32 {
    if self.trigger_rate_hz <= 0.0 {
      return u32::MAX;
    }
    let ticks = 200.0 / self.trigger_rate_hz;
    (ticks as u32).max(1)
  }
}

impl Default for SimSettings {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaqSettings {
  /// Run number used when none is given
  /// on the command line
  pub run_number   : u16,
  /// Read the tracker for every trigger
  pub read_tracker : bool,
  pub config       : DaqConfig,
  pub sim          : SimSettings,
}

impl DaqSettings {
  pub fn new() -> Self {
    Self {
      run_number   : 1,
      read_tracker : true,
      config       : DaqConfig::new(),
      sim          : SimSettings::new(),
    }
  }

  /// Write the settings to a toml file
  pub fn to_toml(&self, mut filename : String) {
    if !filename.ends_with(".toml") {
      filename += ".toml";
    }
    info!("Will write to file {}!", filename);
    match File::create(&filename) {
      Err(err) => {
        error!("Unable to open file {}! {}", filename, err);
      }
      Ok(mut file) => {
        match toml::to_string_pretty(&self) {
          Err(err) => {
            error!("Unable to serialize toml! {err}");
          }
          Ok(toml_string) => {
            match file.write_all(toml_string.as_bytes()) {
              Err(err) => error!("Unable to write to file {}! {}", filename, err),
              Ok(_)    => debug!("Wrote settings to {}!", filename)
            }
          }
        }
      }
    }
  }

  pub fn from_toml(filename : String) -> Result<DaqSettings, SerializationError> {
    match File::open(&filename) {
      Err(err) => {
        error!("Unable to open {}! {}", filename, err);
        return Err(SerializationError::TomlDecodingError);
      }
      Ok(mut file) => {
        let mut toml_string = String::from("");
        match file.read_to_string(&mut toml_string) {
          Err(err) => {
            error!("Unable to read {}! {}", filename, err);
            return Err(SerializationError::TomlDecodingError);
          }
          Ok(_) => {
            match toml::from_str(&toml_string) {
              Err(err) => {
                error!("Can't interpret toml! {}", err);
                return Err(SerializationError::TomlDecodingError);
              }
              Ok(settings) => {
                return Ok(settings);
              }
            }
          }
        }
      }
    }
  }
}

impl fmt::Display for DaqSettings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let disp : String;
    match toml::to_string(self) {
      Err(err) => {
        error!("Deserialization error! {err}");
        disp = String::from("-- DESERIALIZATION ERROR! --");
      }
      Ok(_disp) => {
        disp = _disp;
      }
    }
    write!(f, "<DaqSettings :\n{}>", disp)
  }
}

impl Default for DaqSettings {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod test_settings {
  use super::*;

  #[test]
  fn toml_roundtrip() {
    let mut settings = DaqSettings::new();
    settings.config.set_threshold(2, 17);
    settings.sim.n_tkr_boards = 4;
    let toml_string = toml::to_string(&settings).unwrap();
    let back : DaqSettings = toml::from_str(&toml_string).unwrap();
    assert_eq!(back, settings);
  }

  #[test]
  fn write_and_read() {
    let mut filename = std::env::temp_dir();
    filename.push("aesop-daq-settings-test.toml");
    let filename = filename.to_string_lossy().to_string();
    let settings = DaqSettings::default();
    settings.to_toml(filename.clone());
    let back = DaqSettings::from_toml(filename.clone()).unwrap();
    assert_eq!(back, settings);
    let _ = std::fs::remove_file(filename);
    assert!(DaqSettings::from_toml(String::from("/does/not/exist.toml")).is_err());
  }

  #[test]
  fn trigger_interval() {
    let mut sim = SimSettings::new();
    assert_eq!(sim.trigger_interval(), 10);
    sim.trigger_rate_hz = 0.0;
    assert_eq!(sim.trigger_interval(), u32::MAX);
  }
}
