//! Host side command encoders - one function per command
//!
//! Each function returns the full sequence of wire frames
//! (29 bytes each, three copies plus CR LF) which have to
//! be sent to the event PSOC.

use chrono::{Datelike,
             NaiveDateTime,
             Timelike};

use crate::constants::{EVENT_PSOC_ADDRESS,
                       MAX_CMD_DATA};
use crate::commands::{AddressByte,
                      CommandCode,
                      CommandUnit};

/// A unit tripled and terminated, as it goes on the wire
pub fn encode_unit(unit : &CommandUnit) -> Vec<u8> {
  let single = unit.to_unit();
  let mut frame = Vec::<u8>::with_capacity(3*single.len() + 2);
  for _ in 0..3 {
    frame.extend_from_slice(&single);
  }
  frame.extend_from_slice(b"\r\n");
  frame
}

/// Encode an arbitrary command code with its data
/// bytes for a board address
pub fn encode_raw(address : u8, code : u8, data : &[u8]) -> Vec<Vec<u8>> {
  let n_data = data.len().min(MAX_CMD_DATA);
  if data.len() > MAX_CMD_DATA {
    warn!("Command {code:#04x} has {} data bytes, only {} will be sent!", data.len(), MAX_CMD_DATA);
  }
  let mut frames = Vec::<Vec<u8>>::with_capacity(1 + n_data);
  let first = CommandUnit::new(code, AddressByte::new(address, n_data as u8));
  frames.push(encode_unit(&first));
  for (k, byte) in data.iter().take(n_data).enumerate() {
    let unit = CommandUnit::new(*byte, AddressByte::new(address, (k + 1) as u8));
    frames.push(encode_unit(&unit));
  }
  frames
}

/// Encode a command for the event PSOC
pub fn encode_command(code : CommandCode, data : &[u8]) -> Vec<Vec<u8>> {
  encode_raw(EVENT_PSOC_ADDRESS, code as u8, data)
}

/// Set a PMT threshold. Channels 1-4 are 8 bit,
/// channel 5 is a 12 bit DAC.
pub fn set_threshold_dac(channel : u8, value : u16) -> Vec<Vec<u8>> {
  if channel == 5 {
    return encode_command(CommandCode::LoadThresholdDac,
                          &[channel, (value >> 8) as u8, (value & 0xFF) as u8]);
  }
  encode_command(CommandCode::LoadThresholdDac, &[channel, (value & 0xFF) as u8])
}

pub fn read_threshold_dac(channel : u8) -> Vec<Vec<u8>> {
  encode_command(CommandCode::ReadThresholdDac, &[channel])
}

pub fn set_tof_dac(channel : u8, value : u16) -> Vec<Vec<u8>> {
  encode_command(CommandCode::LoadTofDac, &[channel, (value >> 8) as u8, (value & 0xFF) as u8])
}

pub fn read_errors() -> Vec<Vec<u8>> {
  encode_command(CommandCode::ReadErrors, &[])
}

pub fn get_version() -> Vec<Vec<u8>> {
  encode_command(CommandCode::Version, &[])
}

pub fn trigger_enable(enable : bool) -> Vec<Vec<u8>> {
  encode_command(CommandCode::TriggerEnable, &[enable as u8])
}

pub fn trigger_status() -> Vec<Vec<u8>> {
  encode_command(CommandCode::TriggerStatus, &[])
}

/// Start a run
///
/// # Arguments
///
/// * run_number   : will be in every event header
/// * read_tracker : read the tracker for every trigger
pub fn start_run(run_number : u16, read_tracker : bool) -> Vec<Vec<u8>> {
  encode_command(CommandCode::StartRun,
                 &[(run_number >> 8) as u8, (run_number & 0xFF) as u8, read_tracker as u8])
}

pub fn end_run() -> Vec<Vec<u8>> {
  encode_command(CommandCode::EndRun, &[])
}

pub fn set_coincidence_window(window : u8) -> Vec<Vec<u8>> {
  encode_command(CommandCode::SetCoincidenceWindow, &[window])
}

/// Mask 1 is the 'e' (tracker) trigger, mask 2 the 'p' (PMT) trigger
pub fn set_trigger_mask(mask : u8, value : u8) -> Vec<Vec<u8>> {
  encode_command(CommandCode::SetTriggerMask, &[mask, value])
}

pub fn set_prescale(which : u8, value : u8) -> Vec<Vec<u8>> {
  encode_command(CommandCode::SetPrescale, &[which, value])
}

pub fn set_output_mode(mode : u8) -> Vec<Vec<u8>> {
  encode_command(CommandCode::OutputMode, &[mode])
}

pub fn tof_dump() -> Vec<Vec<u8>> {
  encode_command(CommandCode::TofDump, &[])
}

/// Set the real time clock of the board
pub fn set_rtc(time : &NaiveDateTime) -> Vec<Vec<u8>> {
  let day_of_year = time.ordinal() as u16;
  let year        = time.year() as u16;
  encode_command(CommandCode::SetRtc,
                 &[time.second() as u8,
                   time.minute() as u8,
                   time.hour() as u8,
                   time.weekday().num_days_from_sunday() as u8,
                   time.day() as u8,
                   (day_of_year >> 8) as u8,
                   (day_of_year & 0xFF) as u8,
                   time.month() as u8,
                   (year >> 8) as u8,
                   (year & 0xFF) as u8])
}

/// Pass a command through to a tracker board
pub fn tracker_command(fpga : u8, code : u8, data : &[u8]) -> Vec<Vec<u8>> {
  let mut payload = vec![fpga, code, data.len() as u8];
  payload.extend_from_slice(data);
  encode_command(CommandCode::TrackerCommand, &payload)
}

/// Load a tracker ASIC mask register
///
/// # Arguments
///
/// * reg_type : 1 calibration, 2 data, 3 trigger mask
/// * fill     : invert the mask
/// * clusters : (number of channels, first channel)
pub fn tracker_mask(fpga     : u8,
                    chip     : u8,
                    reg_type : u8,
                    fill     : bool,
                    clusters : &[(u8, u8)]) -> Vec<Vec<u8>> {
  let mut payload = vec![fpga, chip, reg_type, fill as u8, clusters.len() as u8];
  for (nch, start) in clusters {
    payload.push(*nch);
    payload.push(*start);
  }
  encode_command(CommandCode::TrackerMask, &payload)
}

#[cfg(test)]
mod test_factory {
  use super::*;
  use crate::commands::CommandUnit;

  #[test]
  fn threshold_dac_frames() {
    let frames = set_threshold_dac(5, 0x0F05);
    assert_eq!(frames.len(), 4);
    for f in &frames {
      assert_eq!(f.len(), 29);
      assert_eq!(&f[27..29], b"\r\n");
    }
    let first = CommandUnit::decode(&frames[0]).unwrap();
    assert_eq!(first.data_byte, 0x01);
    assert_eq!(first.address.byte_count, 3);
    assert_eq!(first.address.target, 8);
    let third = CommandUnit::decode(&frames[2]).unwrap();
    assert_eq!(third.data_byte, 0x0F);
    assert_eq!(third.address.byte_count, 2);
  }

  #[test]
  fn too_much_data_is_cut() {
    let frames = encode_command(CommandCode::TrackerCommand, &[0u8;20]);
    assert_eq!(frames.len(), 1 + MAX_CMD_DATA);
  }
}
