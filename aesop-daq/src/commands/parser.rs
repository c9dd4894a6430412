//! Assembles commands from their triplicated frames
//!
//! The parser is a small state machine:
//! `Awaiting` - `InFlight` (data bytes outstanding) - `Done`.
//! `Done` is left by `finish` once the response went out.

use aesop_dataclasses::{ErrorCode,
                        ErrorLog};
use aesop_dataclasses::commands::{CommandFrame,
                                  CommandUnit};
use aesop_dataclasses::constants::{CMD_TIMEOUT,
                                   EVENT_PSOC_ADDRESS};
use aesop_dataclasses::errors::FrameError;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CommandState {
  Awaiting,
  InFlight {
    frame   : CommandFrame,
    started : u32,
  },
  Done(CommandFrame),
}

#[derive(Debug, Clone)]
pub struct CommandParser {
  state          : CommandState,
  /// Commands started since power up
  pub n_commands : u32,
  /// Commands dropped because they were not completed in time
  pub n_timeouts : u32,
}

impl CommandParser {

  pub fn new() -> Self {
    Self {
      state      : CommandState::Awaiting,
      n_commands : 0,
      n_timeouts : 0,
    }
  }

  pub fn state(&self) -> &CommandState {
    &self.state
  }

  pub fn is_awaiting(&self) -> bool {
    self.state == CommandState::Awaiting
  }

  /// The response of the finished command went out
  pub fn finish(&mut self) {
    self.state = CommandState::Awaiting;
  }

  /// Drop a command which did not complete in time
  pub fn check_timeout(&mut self, now : u32) {
    if let CommandState::InFlight { frame, started } = self.state {
      if now.wrapping_sub(started) > CMD_TIMEOUT {
        warn!("{} timed out, dropping it", frame);
        self.n_timeouts += 1;
        self.state = CommandState::Awaiting;
      }
    }
  }

  /// Feed a raw 29 byte frame. Returns the command
  /// once all of its data bytes arrived.
  pub fn feed(&mut self, raw : &[u8], now : u32, errors : &mut ErrorLog) -> Option<CommandFrame> {
    let unit = match CommandUnit::decode(raw) {
      Err(FrameError::NoMajority(nibble, position)) => {
        errors.add(ErrorCode::BadCommand, nibble, position);
        return None;
      },
      Err(err) => {
        debug!("Rejected command frame {:?}! {}", raw, err);
        return None;
      },
      Ok(unit) => unit,
    };
    if unit.address.target != EVENT_PSOC_ADDRESS {
      trace!("Frame for address {} is not for us", unit.address.target);
      return None;
    }
    match self.state {
      CommandState::Awaiting => {
        let frame = CommandFrame::new(unit.data_byte, unit.address.byte_count);
        self.n_commands += 1;
        debug!("Start of {}", frame);
        if frame.is_complete() {
          self.state = CommandState::Done(frame);
          return Some(frame);
        }
        self.state = CommandState::InFlight {
          frame,
          started : now,
        };
        None
      },
      CommandState::InFlight { mut frame, started } => {
        if !frame.add_byte(unit.address.byte_count, unit.data_byte) {
          errors.add(ErrorCode::BadByte, frame.code, frame.n_data);
          self.state = CommandState::Awaiting;
          return None;
        }
        if frame.is_complete() {
          self.state = CommandState::Done(frame);
          return Some(frame);
        }
        self.state = CommandState::InFlight {
          frame,
          started,
        };
        None
      },
      CommandState::Done(frame) => {
        debug!("{} still being answered, dropping frame", frame);
        None
      }
    }
  }
}

impl Default for CommandParser {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod test_parser {
  use super::*;
  use aesop_dataclasses::commands::{factory,
                                    AddressByte,
                                    CommandCode};

  #[test]
  fn multi_frame_command() {
    let mut parser = CommandParser::new();
    let mut errors = ErrorLog::new();
    let frames = factory::encode_command(CommandCode::StartRun, &[0x01, 0x40, 1]);
    assert_eq!(frames.len(), 4);
    for frame in frames.iter().take(3) {
      assert!(parser.feed(frame, 0, &mut errors).is_none());
    }
    let cmd = parser.feed(&frames[3], 0, &mut errors).unwrap();
    assert_eq!(cmd.command(), CommandCode::StartRun);
    assert_eq!(cmd.data(), &[0x01, 0x40, 1]);
    assert!(!parser.is_awaiting());
    parser.finish();
    assert!(parser.is_awaiting());
    assert!(errors.is_empty());
  }

  #[test]
  fn no_majority() {
    let mut parser = CommandParser::new();
    let mut errors = ErrorLog::new();
    let mut frame  = factory::encode_command(CommandCode::Version, &[]).remove(0);
    // three different values for the first nibble
    frame[1]  = b'1';
    frame[10] = b'2';
    frame[19] = b'3';
    assert!(parser.feed(&frame, 0, &mut errors).is_none());
    assert_eq!(errors.count(ErrorCode::BadCommand), 1);
    assert!(parser.is_awaiting());
  }

  #[test]
  fn single_corrupt_copy_is_outvoted() {
    let mut parser = CommandParser::new();
    let mut errors = ErrorLog::new();
    let mut frame  = factory::encode_command(CommandCode::Version, &[]).remove(0);
    frame[11] = b'F';
    let cmd = parser.feed(&frame, 0, &mut errors).unwrap();
    assert_eq!(cmd.command(), CommandCode::Version);
    assert!(errors.is_empty());
  }

  #[test]
  fn zero_index_aborts() {
    let mut parser = CommandParser::new();
    let mut errors = ErrorLog::new();
    let frames = factory::encode_command(CommandCode::SetPrescale, &[1, 2]);
    parser.feed(&frames[0], 0, &mut errors);
    let bogus = factory::encode_unit(&CommandUnit::new(0x05, AddressByte::new(EVENT_PSOC_ADDRESS, 0)));
    assert!(parser.feed(&bogus, 0, &mut errors).is_none());
    assert_eq!(errors.count(ErrorCode::BadByte), 1);
    assert!(parser.is_awaiting());
  }

  #[test]
  fn timeout() {
    let mut parser = CommandParser::new();
    let mut errors = ErrorLog::new();
    let frames = factory::encode_command(CommandCode::SetPrescale, &[1, 2]);
    parser.feed(&frames[0], 100, &mut errors);
    parser.check_timeout(100 + CMD_TIMEOUT);
    assert!(!parser.is_awaiting());
    parser.check_timeout(101 + CMD_TIMEOUT);
    assert!(parser.is_awaiting());
    assert_eq!(parser.n_timeouts, 1);
  }

  #[test]
  fn other_address() {
    let mut parser = CommandParser::new();
    let mut errors = ErrorLog::new();
    let raw = factory::encode_raw(0x03, 0x07, &[]);
    assert!(parser.feed(&raw[0], 0, &mut errors).is_none());
    assert_eq!(parser.n_commands, 0);
  }
}
