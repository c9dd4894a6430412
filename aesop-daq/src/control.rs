//! The peripherals around the core
//!
//! The core never touches hardware directly. Everything
//! goes through the traits in here, so the same code runs
//! against the real board or against the simulation in
//! `sim`.
//!
//! Convenience functions for the I2C devices (DACs, single
//! registers) sit on top of the `I2cBus` trait. They return
//! `Result<_, RegisterError>`, the callers convert failures
//! into error log records.
//!

use std::error::Error;
use std::fmt;

use chrono::{Datelike,
             NaiveDateTime,
             Timelike};

use aesop_dataclasses::events::pack_time_date;
use aesop_dataclasses::events::event_record::N_ADC_CHANNELS;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RegisterError {
  /// The bus master reported a non-zero status
  BusStatus(u8),
  /// The device did not answer in time
  Timeout,
}

impl RegisterError {
  /// The raw status as it goes into the error log
  pub fn code(&self) -> u8 {
    match self {
      RegisterError::BusStatus(status) => *status,
      RegisterError::Timeout           => 0xFF,
    }
  }
}

impl fmt::Display for RegisterError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let etype : String;
    match self {
      RegisterError::BusStatus(status) => {
        etype = format!("BusStatus({:#04x})", status);
      },
      RegisterError::Timeout => {
        etype = String::from("Timeout");
      },
    }
    write!(f, "<RegisterError: {}>", etype)
  }
}

impl Error for RegisterError {
}

/// The 8 bit hardware counter of the 200 Hz clock
pub trait TickTimer {
  /// Fine count, 0..200
  fn count(&self) -> u8;
  fn delay_ms(&self, ms : u32);
}

/// The master clock in 5 ms ticks
pub trait Clock {
  fn now(&self) -> u32;
  fn delay_ms(&self, ms : u32);
}

/// Byte level access to the tracker UART
pub trait TrackerPort {
  /// At least one byte is waiting in the receive FIFO
  fn rx_ready(&mut self) -> bool;
  fn read_byte(&mut self) -> u8;
  /// The transmit FIFO can not take another byte
  fn tx_full(&mut self) -> bool;
  fn write_byte(&mut self, byte : u8);
  /// Bytes still waiting to go out
  fn tx_pending(&mut self) -> usize;
  fn clear_rx(&mut self);
}

/// The I2C master
pub trait I2cBus {
  fn write(&mut self, address : u8, data : &[u8]) -> Result<(), RegisterError>;
  fn read(&mut self, address : u8, buffer : &mut [u8]) -> Result<(), RegisterError>;
}

/// The two links to the outside world
pub trait HostPort {
  /// The USB endpoint can take the next chunk
  fn usb_ready(&mut self) -> bool;
  fn usb_write(&mut self, data : &[u8]);
  /// Everything which arrived on the USB link
  /// since the last call
  fn usb_read(&mut self) -> Vec<u8>;
  /// Write to the main PSOC (SPI slave select is
  /// handled by the implementation)
  fn spi_write(&mut self, data : &[u8]);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Led {
  Heartbeat,
  Trigger,
  Tracker,
  Data,
}

/// Time and date as kept by the real time clock
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RtcTime {
  pub second       : u8,
  pub minute       : u8,
  pub hour         : u8,
  pub day_of_week  : u8,
  pub day_of_month : u8,
  pub day_of_year  : u16,
  pub month        : u8,
  pub year         : u16,
}

impl RtcTime {
  pub fn from_datetime(time : &NaiveDateTime) -> Self {
    Self {
      second       : time.second() as u8,
      minute       : time.minute() as u8,
      hour         : time.hour() as u8,
      day_of_week  : time.weekday().num_days_from_sunday() as u8,
      day_of_month : time.day() as u8,
      day_of_year  : time.ordinal() as u16,
      month        : time.month() as u8,
      year         : time.year() as u16,
    }
  }

  /// The 32 bit time word of the event header
  pub fn packed(&self) -> u32 {
    pack_time_date(self.year, self.month, self.day_of_month, self.hour, self.minute, self.second)
  }

  /// The 10 byte layout used by the set/get RTC commands
  pub fn to_bytes(&self) -> [u8;10] {
    [self.second,
     self.minute,
     self.hour,
     self.day_of_week,
     self.day_of_month,
     (self.day_of_year >> 8) as u8,
     (self.day_of_year & 0xFF) as u8,
     self.month,
     (self.year >> 8) as u8,
     (self.year & 0xFF) as u8]
  }

  /// Missing bytes are taken as 0
  pub fn from_bytes(bytes : &[u8]) -> Self {
    let b = |k : usize| -> u8 { *bytes.get(k).unwrap_or(&0) };
    Self {
      second       : b(0),
      minute       : b(1),
      hour         : b(2),
      day_of_week  : b(3),
      day_of_month : b(4),
      day_of_year  : ((b(5) as u16) << 8) | b(6) as u16,
      month        : b(7),
      year         : ((b(8) as u16) << 8) | b(9) as u16,
    }
  }
}

impl fmt::Display for RtcTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<RtcTime: {:04}-{:02}-{:02} {:02}:{:02}:{:02}>",
           self.year, self.month, self.day_of_month, self.hour, self.minute, self.second)
  }
}

/// Registers and small peripherals of the event PSOC
pub trait BoardControl {
  /// Gate the master trigger in hardware
  fn set_trigger_gate(&mut self, enable : bool);
  /// The peak detectors are digitized
  fn digitizer_done(&mut self) -> bool;
  /// Samples captured for the last trigger in event order
  /// (T1, T2, T3, T4, guard, spare)
  fn read_adc(&mut self) -> [u16; N_ADC_CHANNELS];
  fn clear_adc(&mut self);
  /// Internal 8 bit threshold DACs, channels 1-4
  fn set_vdac(&mut self, channel : u8, value : u8);
  /// 1 for the 'e' (tracker) mask, 2 for the 'p' (PMT) mask
  fn set_trigger_mask(&mut self, which : u8, mask : u8);
  /// 1 for the tracker, 2 for the PMT prescale
  fn set_prescale(&mut self, which : u8, value : u8);
  fn set_coincidence_window(&mut self, window : u8);
  fn set_peak_reset_wait(&mut self, wait : u8);
  /// The 8 bit hardware part of a singles counter (channel 0-4)
  fn singles_hw_count(&mut self, channel : usize) -> u8;
  fn pulse_logic_reset(&mut self);
  fn pulse_counter_reset(&mut self);
  fn set_led(&mut self, led : Led, on : bool);
  fn read_rtc(&mut self) -> RtcTime;
  fn write_rtc(&mut self, time : &RtcTime);
  /// Write a full transaction to the TOF chip
  fn tof_spi_write(&mut self, data : &[u8]);
  /// Send a read command to the TOF chip and return
  /// n_bytes of the answer
  fn tof_spi_read(&mut self, command : u8, n_bytes : usize) -> Vec<u8>;
  /// Discard everything in the TOF shift register FIFOs
  fn drain_tof_fifos(&mut self);
  fn spi_reinit(&mut self);
}

/// Bundles the peripheral types of a board
pub trait Hardware {
  type Board : BoardControl + I2cBus;
  type Port  : TrackerPort;
  type Host  : HostPort;
  type Clock : Clock + Clone;
}

/// Load an AD5622 12 bit DAC
pub fn load_dac<I: I2cBus>(bus : &mut I, address : u8, value : u16) -> Result<(), RegisterError> {
  trace!("Load DAC {:#04x} with {}", address, value);
  bus.write(address, &[((value & 0x0F00) >> 8) as u8, (value & 0x00FF) as u8])?;
  Ok(())
}

/// Read back the setting of an AD5622 DAC
pub fn read_dac<I: I2cBus>(bus : &mut I, address : u8) -> Result<u16, RegisterError> {
  let mut bytes = [0u8;2];
  bus.read(address, &mut bytes)?;
  let value = (((bytes[0] & 0x3F) as u16) << 6) | (((bytes[1] & 0xFC) as u16) >> 2);
  Ok(value)
}

/// Load a single byte register
pub fn load_i2c_reg<I: I2cBus>(bus : &mut I, address : u8, register : u8, value : u8) -> Result<(), RegisterError> {
  bus.write(address, &[register, value])?;
  Ok(())
}

/// Read n_bytes starting at a register
pub fn read_i2c_reg<I: I2cBus>(bus      : &mut I,
                               address  : u8,
                               register : u8,
                               n_bytes  : usize) -> Result<Vec<u8>, RegisterError> {
  bus.write(address, &[register])?;
  let mut bytes = vec![0u8; n_bytes];
  bus.read(address, &mut bytes)?;
  Ok(bytes)
}

#[cfg(test)]
mod test_control {
  use super::*;

  struct Echo {
    last : Vec<u8>,
  }

  impl I2cBus for Echo {
    fn write(&mut self, _address : u8, data : &[u8]) -> Result<(), RegisterError> {
      self.last = data.to_vec();
      Ok(())
    }
    fn read(&mut self, address : u8, buffer : &mut [u8]) -> Result<(), RegisterError> {
      if address == 0 {
        return Err(RegisterError::BusStatus(2));
      }
      // AD5622 readback: 2 leading zeros, 12 bit, 2 trailing zeros
      let value = ((self.last[0] as u16) << 8) | self.last[1] as u16;
      buffer[0] = ((value >> 6) & 0x3F) as u8;
      buffer[1] = ((value << 2) & 0xFC) as u8;
      Ok(())
    }
  }

  #[test]
  fn dac_readback() {
    let mut bus = Echo { last : Vec::new() };
    load_dac(&mut bus, 0x0E, 0x0F05).unwrap();
    assert_eq!(bus.last, vec![0x0F, 0x05]);
    assert_eq!(read_dac(&mut bus, 0x0E), Ok(0x0F05));
    assert_eq!(read_dac(&mut bus, 0x00), Err(RegisterError::BusStatus(2)));
    assert_eq!(RegisterError::BusStatus(2).code(), 2);
  }

  #[test]
  fn rtc_bytes() {
    let time = RtcTime {
      second       : 59,
      minute       : 45,
      hour         : 13,
      day_of_week  : 4,
      day_of_month : 18,
      day_of_year  : 200,
      month        : 7,
      year         : 2024,
    };
    let bytes = time.to_bytes();
    assert_eq!(bytes[8..10], [0x07, 0xE8]);
    assert_eq!(RtcTime::from_bytes(&bytes), time);
    assert_eq!(time.packed() >> 26, 24);
  }
}
