//! The command handlers
//!
//! Every command code maps to a plain function with the
//! same signature. A handler reads the data bytes of the
//! command, does its work on the `Daq` and returns the
//! bytes for the response packet. An empty response
//! means no packet is sent at all.
//!
//! Faults of the protocol engines go straight into the
//! error log, a fault which belongs to the command itself
//! is handed back in the `Response`.

use aesop_dataclasses::{ErrorCode,
                        ErrorRecord};
use aesop_dataclasses::commands::{CommandCode,
                                  CommandFrame};
use aesop_dataclasses::constants::{FIRMWARE_VERSION,
                                   TOF_CONFIG_SIZE};

use crate::control::{load_dac,
                     load_i2c_reg,
                     read_dac,
                     read_i2c_reg,
                     BoardControl,
                     Clock,
                     Hardware,
                     Led,
                     RtcTime};
use crate::orchestrator::Daq;
use crate::packet_builder::build_calibration_event;
use crate::registers::*;

/// What a handler hands back to the dispatcher
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
  pub data  : Vec<u8>,
  pub fault : Option<ErrorRecord>,
}

impl Response {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn data(data : Vec<u8>) -> Self {
    Self {
      data,
      fault : None,
    }
  }

  /// No data, just a fault for the error log
  pub fn fault(code : ErrorCode, value0 : u8, value1 : u8) -> Self {
    Self {
      data  : Vec::new(),
      fault : Some(ErrorRecord::new(code, value0, value1)),
    }
  }

  pub fn with_fault(mut self, code : ErrorCode, value0 : u8, value1 : u8) -> Self {
    self.fault = Some(ErrorRecord::new(code, value0, value1));
    self
  }
}

pub type Handler<HW> = fn(&mut Daq<HW>, &CommandFrame) -> Response;

/// The dispatch table. Unknown codes have no handler.
pub fn handler_for<HW: Hardware>(code : CommandCode) -> Option<Handler<HW>> {
  let handler : Handler<HW> = match code {
    CommandCode::Unknown                => return None,
    CommandCode::LoadThresholdDac       => load_threshold_dac::<HW>,
    CommandCode::ReadThresholdDac       => read_threshold_dac::<HW>,
    CommandCode::ReadErrors             => read_errors::<HW>,
    CommandCode::LoadTofDac             => load_tof_dac::<HW>,
    CommandCode::ReadTofDac             => read_tof_dac::<HW>,
    CommandCode::Led                    => led::<HW>,
    CommandCode::Version                => version::<HW>,
    CommandCode::TofReset               => tof_reset::<HW>,
    CommandCode::TofConfigModify        => tof_config_modify::<HW>,
    CommandCode::TofConfigRead          => tof_config_read::<HW>,
    CommandCode::TrackerCommand         => tracker_command::<HW>,
    CommandCode::BusVoltage             => bus_voltage::<HW>,
    CommandCode::ShuntVoltage           => shunt_voltage::<HW>,
    CommandCode::Temperature            => temperature::<HW>,
    CommandCode::RtcRegisterRead        => rtc_register_read::<HW>,
    CommandCode::RtcRegisterWrite       => rtc_register_write::<HW>,
    CommandCode::BarometerRead          => barometer_read::<HW>,
    CommandCode::BarometerWrite         => barometer_write::<HW>,
    CommandCode::OutputMode             => output_mode::<HW>,
    CommandCode::SpiInit                => spi_init::<HW>,
    CommandCode::TofDebugOn             => tof_debug_on::<HW>,
    CommandCode::TofDebugOff            => tof_debug_off::<HW>,
    CommandCode::SavedSingles           => saved_singles::<HW>,
    CommandCode::TofCursors             => tof_cursors::<HW>,
    CommandCode::TofLatest              => tof_latest::<HW>,
    CommandCode::SetTriggerMask         => set_trigger_mask::<HW>,
    CommandCode::ReadSingles            => read_singles::<HW>,
    CommandCode::LogicReset             => logic_reset::<HW>,
    CommandCode::SetPrescale            => set_prescale::<HW>,
    CommandCode::SetCoincidenceWindow   => set_coincidence_window::<HW>,
    CommandCode::TriggerEnable          => trigger_enable::<HW>,
    CommandCode::StartRun               => start_run::<HW>,
    CommandCode::TriggerStatus          => trigger_status::<HW>,
    CommandCode::ReadTriggerMask        => read_trigger_mask::<HW>,
    CommandCode::TofDump                => tof_dump::<HW>,
    CommandCode::TrackerMask            => tracker_mask::<HW>,
    CommandCode::TrackerCalStrobe       => tracker_cal_strobe::<HW>,
    CommandCode::TrackerCalEvent        => tracker_cal_event::<HW>,
    CommandCode::EndRun                 => end_run::<HW>,
    CommandCode::SetRtc                 => set_rtc::<HW>,
    CommandCode::ReadRtc                => read_rtc::<HW>,
    CommandCode::TrackerReset           => tracker_reset::<HW>,
    CommandCode::TrackerCalibrateTiming => tracker_calibrate_timing::<HW>,
  };
  Some(handler)
}

/// While the trigger is armed only disabling the
/// trigger and ending the run get through
pub fn allowed_while_armed(cmd : &CommandFrame) -> bool {
  match cmd.command() {
    CommandCode::EndRun        => true,
    CommandCode::TriggerEnable => cmd.byte(0) == 0,
    _                          => false,
  }
}

/// Build the 64 bit mask of a tracker ASIC register from
/// (number of channels, first channel) pairs. Channel 0
/// is the most significant bit.
pub fn cluster_mask(clusters : &[u8]) -> u64 {
  let mut mask = 0u64;
  for pair in clusters.chunks_exact(2) {
    let n_ch  = pair[0] as u32;
    let first = pair[1] as u32;
    if n_ch == 0 {
      continue;
    }
    if n_ch + first > 64 {
      warn!("Cluster of {} channels at {} does not fit into the mask, skipping it", n_ch, first);
      continue;
    }
    let bits = if n_ch == 64 { u64::MAX } else { (1u64 << n_ch) - 1 };
    mask |= bits << (64 - n_ch - first);
  }
  mask
}

fn be16(value : u16) -> Vec<u8> {
  value.to_be_bytes().to_vec()
}

/// Two bytes of an I2C register, zeros if the device
/// does not answer
fn read_reg16<HW: Hardware>(daq : &mut Daq<HW>, address : u8, register : u8) -> Response {
  read_reg(daq, address, register, 2)
}

fn read_reg<HW: Hardware>(daq : &mut Daq<HW>, address : u8, register : u8, n_bytes : usize) -> Response {
  match read_i2c_reg(&mut daq.board, address, register, n_bytes) {
    Err(err) => {
      error!("Unable to read register {:#04x} of device {:#04x}! {}", register, address, err);
      Response::data(vec![0u8; n_bytes])
    }
    Ok(bytes) => Response::data(bytes)
  }
}

fn write_reg<HW: Hardware>(daq : &mut Daq<HW>, address : u8, register : u8, value : u8) -> Response {
  match load_i2c_reg(&mut daq.board, address, register, value) {
    Err(err) => error!("Unable to load register {:#04x} of device {:#04x}! {}", register, address, err),
    Ok(_)    => debug!("Loaded {:#04x} into register {:#04x} of device {:#04x}", value, register, address)
  }
  Response::empty()
}

fn tof_dac_address(channel : u8) -> Option<u8> {
  match channel {
    1 => Some(I2C_ADDRESS_TOF_DAC1),
    2 => Some(I2C_ADDRESS_TOF_DAC2),
    _ => None,
  }
}

//========== thresholds and DACs ============

fn load_threshold_dac<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let channel = cmd.byte(0);
  match channel {
    5 => {
      let value = u16::from_be_bytes([cmd.byte(1), cmd.byte(2)]);
      match load_dac(&mut daq.board, I2C_ADDRESS_DAC_CH5, value) {
        Err(err) => {
          return Response::fault(ErrorCode::DacLoad, err.code(), I2C_ADDRESS_DAC_CH5);
        }
        Ok(_) => {
          daq.config.dac_ch5 = value;
        }
      }
    },
    1..=4 => {
      daq.board.set_vdac(channel, cmd.byte(1));
      daq.config.set_threshold(channel, cmd.byte(1));
    },
    _ => {
      warn!("There is no threshold DAC {}", channel);
    }
  }
  Response::empty()
}

fn read_threshold_dac<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let channel = cmd.byte(0);
  if channel == 5 {
    return match read_dac(&mut daq.board, I2C_ADDRESS_DAC_CH5) {
      Err(err) => {
        Response::data(be16(0)).with_fault(ErrorCode::DacRead, err.code(), I2C_ADDRESS_DAC_CH5)
      }
      Ok(value) => Response::data(be16(value))
    };
  }
  Response::data(vec![daq.config.threshold(channel).unwrap_or(0)])
}

fn read_errors<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  Response::data(daq.errors.drain())
}

fn load_tof_dac<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let address = match tof_dac_address(cmd.byte(0)) {
    None => {
      warn!("There is no TOF DAC {}", cmd.byte(0));
      return Response::empty();
    }
    Some(address) => address
  };
  let value = u16::from_be_bytes([cmd.byte(1), cmd.byte(2)]);
  match load_dac(&mut daq.board, address, value) {
    Err(err) => Response::fault(ErrorCode::TofDacLoad, err.code(), address),
    Ok(_) => {
      daq.config.tof_dac[(cmd.byte(0) - 1) as usize] = value;
      Response::empty()
    }
  }
}

fn read_tof_dac<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let address = match tof_dac_address(cmd.byte(0)) {
    None    => return Response::empty(),
    Some(address) => address
  };
  match read_dac(&mut daq.board, address) {
    Err(err)  => Response::data(be16(0)).with_fault(ErrorCode::TofDacRead, err.code(), address),
    Ok(value) => Response::data(be16(value))
  }
}

//========== board ==========================

fn led<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  daq.board.set_led(Led::Heartbeat, cmd.byte(0) == 1);
  Response::empty()
}

fn version<HW: Hardware>(_daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  Response::data(vec![FIRMWARE_VERSION])
}

fn bus_voltage<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  read_reg16(daq, cmd.byte(0), INA226_BUS_V_REG)
}

/// Bit 15 is the sign, two's complement
fn shunt_voltage<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  read_reg16(daq, cmd.byte(0), INA226_SHUNT_V_REG)
}

fn temperature<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  read_reg16(daq, I2C_ADDRESS_TMP100, TMP100_TEMP_REG)
}

fn rtc_register_read<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  read_reg(daq, I2C_ADDRESS_RTC, cmd.byte(0), 1)
}

fn rtc_register_write<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  write_reg(daq, I2C_ADDRESS_RTC, cmd.byte(0), cmd.byte(1))
}

fn barometer_read<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  read_reg(daq, I2C_ADDRESS_BAROMETER, cmd.byte(0), 1)
}

fn barometer_write<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  write_reg(daq, I2C_ADDRESS_BAROMETER, cmd.byte(0), cmd.byte(1))
}

fn output_mode<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  if !daq.config.set_output_mode(cmd.byte(0)) {
    warn!("Output mode {} does not exist", cmd.byte(0));
  }
  Response::empty()
}

fn spi_init<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  daq.board.spi_reinit();
  Response::empty()
}

fn set_rtc<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let time = RtcTime::from_bytes(cmd.data());
  info!("Setting the real time clock to {}", time);
  daq.board.write_rtc(&time);
  Response::empty()
}

fn read_rtc<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  Response::data(daq.board.read_rtc().to_bytes().to_vec())
}

//========== TOF ============================

fn tof_reset<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  daq.board.tof_spi_write(&[TOF_POWER_ON_RESET]);
  Response::empty()
}

fn tof_config_modify<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let index = cmd.byte(0) as usize;
  if index >= TOF_CONFIG_SIZE {
    warn!("TOF configuration has no byte {}", index);
    return Response::empty();
  }
  daq.config.tof_config[index] = cmd.byte(1);
  daq.write_tof_config();
  Response::empty()
}

fn tof_config_read<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  Response::data(daq.board.tof_spi_read(TOF_READ_CONFIG, TOF_CONFIG_SIZE))
}

fn tof_debug_on<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  daq.isr.with_run(|run| run.tof_debug = true);
  Response::empty()
}

fn tof_debug_off<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  daq.isr.with_run(|run| run.tof_debug = false);
  Response::empty()
}

fn tof_cursors<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  let cursors = daq.isr.with_tof(|bufs| vec![bufs.a.cursor() as u8, bufs.b.cursor() as u8]);
  Response::data(cursors)
}

/// d0 = 0 for channel A, anything else B
fn tof_latest<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let latest = daq.isr.with_tof(|bufs| {
    if cmd.byte(0) == 0 {
      bufs.a.take_latest()
    } else {
      bufs.b.take_latest()
    }
  });
  Response::data(latest)
}

fn tof_dump<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  Response::data(daq.isr.with_tof(|bufs| bufs.dump()))
}

//========== singles ========================

fn singles_channel(cmd : &CommandFrame) -> Option<usize> {
  match cmd.byte(0) {
    1..=5 => Some((cmd.byte(0) - 1) as usize),
    _     => None,
  }
}

/// [rollovers hi, rollovers lo, hardware count]
/// as saved after the last event
fn saved_singles<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let ch = match singles_channel(cmd) {
    None     => return Response::data(vec![0, 0, 0]),
    Some(ch) => ch
  };
  let bytes = daq.isr.with_singles(|singles| {
    let count = singles.saved[ch].to_be_bytes();
    vec![count[0], count[1], singles.saved_hw[ch]]
  });
  Response::data(bytes)
}

fn read_singles<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let ch = match singles_channel(cmd) {
    None     => return Response::data(vec![0, 0, 0]),
    Some(ch) => ch
  };
  let hw    = daq.board.singles_hw_count(ch);
  let count = daq.isr.with_singles(|singles| singles.counts[ch]).to_be_bytes();
  Response::data(vec![count[0], count[1], hw])
}

//========== trigger and run control ========

fn set_trigger_mask<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let which = cmd.byte(0);
  let mask  = cmd.byte(1) & 0x0F;
  if daq.config.set_trigger_mask(which, mask) {
    daq.board.set_trigger_mask(which, mask);
  } else {
    warn!("There is no trigger mask {}", which);
  }
  Response::empty()
}

fn read_trigger_mask<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  Response::data(vec![daq.config.trigger_mask(cmd.byte(0)).unwrap_or(0)])
}

fn set_prescale<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  if daq.config.set_prescale(cmd.byte(0), cmd.byte(1)) {
    daq.board.set_prescale(cmd.byte(0), cmd.byte(1));
  }
  Response::empty()
}

fn set_coincidence_window<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  daq.config.coincidence_window = cmd.byte(0);
  daq.board.set_coincidence_window(cmd.byte(0));
  Response::empty()
}

/// 24 bit of the master clock, then reset
fn logic_reset<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  let now = daq.clock.now().to_be_bytes();
  daq.logic_reset();
  Response::data(now[1..4].to_vec())
}

fn trigger_enable<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  match cmd.byte(0) {
    0 => daq.set_trigger(false),
    1 => daq.set_trigger(true),
    _ => warn!("Trigger enable needs 0 or 1, not {}", cmd.byte(0)),
  }
  Response::empty()
}

fn trigger_status<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  Response::data(vec![daq.isr.trigger_enabled() as u8])
}

fn start_run<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let run_number   = u16::from_be_bytes([cmd.byte(0), cmd.byte(1)]);
  let read_tracker = cmd.byte(2) == 1;
  daq.isr.with_tof(|bufs| bufs.clear());
  daq.isr.reset_counters();
  daq.isr.with_run(|run| {
    run.run_number   = run_number;
    run.read_tracker = read_tracker;
  });
  daq.board.drain_tof_fifos();
  daq.set_trigger(true);
  daq.board.pulse_counter_reset();
  info!("Started run {}, tracker readout {}", run_number, read_tracker);
  if read_tracker {
    let status = daq.tracker.enable_trigger(&mut daq.errors);
    // the echo is not forwarded
    daq.tracker.take_reply();
    if !status.is_ok() {
      return Response::fault(ErrorCode::TrackerTriggerEnable, cmd.code, status as u8);
    }
  }
  Response::empty()
}

/// Total GO count, then accepted triggers,
/// 4 bytes each
fn end_run<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  let (go_count, event_count) = daq.isr.with_run(|run| {
    run.triggered = false;
    (run.go_count, run.event_count)
  });
  daq.set_trigger(false);
  info!("Run ended after {} GOs and {} events", go_count, event_count);
  let mut data = go_count.to_be_bytes().to_vec();
  data.extend_from_slice(&event_count.to_be_bytes());
  Response::data(data)
}

//========== tracker ========================

/// d0 fpga, d1 tracker command, d2 number of data bytes, data..
fn tracker_command<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let data    = cmd.data();
  let n_data  = cmd.byte(2) as usize;
  let payload = &data[data.len().min(3)..data.len().min(3 + n_data)];
  daq.board.set_led(Led::Tracker, true);
  let reply = daq.tracker.pass_through(cmd.byte(0), cmd.byte(1), payload, &mut daq.errors);
  daq.board.set_led(Led::Tracker, false);
  Response::data(reply.unwrap_or_default())
}

/// d0 fpga, d1 chip, d2 register type, d3 fill,
/// d4 number of clusters, then (channels, first) pairs
fn tracker_mask<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let data       = cmd.data();
  let n_clusters = cmd.byte(4) as usize;
  let available  = data.len().saturating_sub(5) / 2;
  if n_clusters > available {
    warn!("Mask command announces {} clusters but carries {}", n_clusters, available);
  }
  let n_clusters = n_clusters.min(available);
  let mut mask   = cluster_mask(data.get(5..5 + 2*n_clusters).unwrap_or(&[]));
  if cmd.byte(3) & 0x01 == 1 {
    mask = !mask;
  }
  daq.board.set_led(Led::Tracker, true);
  let echo = daq.tracker.load_mask(cmd.byte(0), cmd.byte(1), cmd.byte(2) & 0x03, mask, &mut daq.errors);
  daq.board.set_led(Led::Tracker, false);
  Response::data(echo)
}

/// d0 fpga, d1 delay, d2 trigger tag
fn tracker_cal_strobe<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let data = daq.tracker.cal_strobe(cmd.byte(0), cmd.byte(1), cmd.byte(2), &mut daq.errors);
  Response::data(data)
}

fn tracker_cal_event<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  let status = daq.tracker.read_cal_event(cmd.byte(0), &mut daq.errors);
  if !status.is_ok() {
    daq.errors.add(ErrorCode::GetTrackerDataFailed, status as u8, cmd.code);
    daq.tracker.clear_rx();
    daq.tracker.reset_all_logic(&mut daq.errors);
  }
  let stream = build_calibration_event(&mut daq.tracker.event, &mut daq.errors);
  Response::data(stream)
}

fn tracker_reset<HW: Hardware>(daq : &mut Daq<HW>, _cmd : &CommandFrame) -> Response {
  daq.tracker.reset_all_logic(&mut daq.errors);
  Response::empty()
}

/// d0 > 7 calibrates every board in the chain
fn tracker_calibrate_timing<HW: Hardware>(daq : &mut Daq<HW>, cmd : &CommandFrame) -> Response {
  if cmd.byte(0) > 7 {
    daq.tracker.calibrate_all(&mut daq.errors);
  } else {
    daq.tracker.calibrate_input_timing(cmd.byte(0), &mut daq.errors);
  }
  Response::empty()
}

#[cfg(test)]
mod test_handlers {
  use super::*;

  #[test]
  fn masks() {
    assert_eq!(cluster_mask(&[]), 0);
    assert_eq!(cluster_mask(&[1, 0]), 1u64 << 63);
    assert_eq!(cluster_mask(&[2, 62]), 0x3);
    assert_eq!(cluster_mask(&[4, 0, 1, 63]), 0xF000_0000_0000_0001);
    assert_eq!(cluster_mask(&[64, 0]), u64::MAX);
    // does not fit, and empty clusters add nothing
    assert_eq!(cluster_mask(&[3, 62, 0, 5]), 0);
  }

  #[test]
  fn gating() {
    let mut disable = CommandFrame::new(CommandCode::TriggerEnable as u8, 1);
    disable.add_byte(1, 0);
    let mut enable  = CommandFrame::new(CommandCode::TriggerEnable as u8, 1);
    enable.add_byte(1, 1);
    assert!(allowed_while_armed(&disable));
    assert!(!allowed_while_armed(&enable));
    assert!(allowed_while_armed(&CommandFrame::new(CommandCode::EndRun as u8, 0)));
    assert!(!allowed_while_armed(&CommandFrame::new(CommandCode::TriggerStatus as u8, 0)));
  }

  #[test]
  fn every_code_has_a_handler() {
    for cc in CommandCode::ALL {
      assert!(handler_for::<crate::sim::SimHardware>(cc).is_some(), "{}", cc);
    }
    assert!(handler_for::<crate::sim::SimHardware>(CommandCode::Unknown).is_none());
  }
}
