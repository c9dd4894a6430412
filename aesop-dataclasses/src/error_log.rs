//! The bounded error log of the board
//!
//! Faults are recorded as (code, value0, value1)
//! triples. The log holds at most `MAX_ERRORS` records,
//! everything beyond that is dropped without a trace.
//! The host gets the content only when it asks for it.

use std::fmt;

use crate::constants::{MAX_ERRORS,
                       NO_ERRORS_SENTINEL};
use crate::errors::ErrorCode;

/// A single fault with two values giving context
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ErrorRecord {
  pub code   : ErrorCode,
  pub value0 : u8,
  pub value1 : u8,
}

impl ErrorRecord {
  pub fn new(code : ErrorCode, value0 : u8, value1 : u8) -> Self {
    Self {
      code,
      value0,
      value1,
    }
  }

  pub fn to_bytes(&self) -> [u8;3] {
    [self.code as u8, self.value0, self.value1]
  }
}

impl fmt::Display for ErrorRecord {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<ErrorRecord: {} [{:#04x}, {:#04x}]>", self.code, self.value0, self.value1)
  }
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
  records : Vec<ErrorRecord>,
}

impl ErrorLog {

  pub fn new() -> Self {
    Self {
      records : Vec::<ErrorRecord>::with_capacity(MAX_ERRORS),
    }
  }

  /// Record a fault. Returns false if the
  /// log was full and the record got dropped.
  pub fn add(&mut self, code : ErrorCode, value0 : u8, value1 : u8) -> bool {
    let record = ErrorRecord::new(code, value0, value1);
    if self.records.len() >= MAX_ERRORS {
      trace!("Error log full, dropping {}", record);
      return false;
    }
    warn!("Recorded {}", record);
    self.records.push(record);
    true
  }

  pub fn push(&mut self, record : ErrorRecord) -> bool {
    self.add(record.code, record.value0, record.value1)
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn records(&self) -> &[ErrorRecord] {
    &self.records
  }

  /// Count how often a certain code has been recorded
  pub fn count(&self, code : ErrorCode) -> usize {
    self.records.iter().filter(|r| r.code == code).count()
  }

  /// Empty the log and return its content in wire format
  ///
  /// The layout is `[code, v0, v1, code, v0, v1, ...]`,
  /// or the sentinel `[0x00, 0xEE, 0xFF]` if there was
  /// nothing to report.
  pub fn drain(&mut self) -> Vec<u8> {
    if self.records.is_empty() {
      return NO_ERRORS_SENTINEL.to_vec();
    }
    let mut stream = Vec::<u8>::with_capacity(3*self.records.len());
    for record in self.records.drain(..) {
      stream.extend_from_slice(&record.to_bytes());
    }
    stream
  }
}

impl Default for ErrorLog {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for ErrorLog {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<ErrorLog:");
    repr += &(format!("\n  n records : {} (max {})", self.records.len(), MAX_ERRORS));
    for record in &self.records {
      repr += &(format!("\n  {}", record));
    }
    write!(f, "{}>", repr)
  }
}

#[cfg(test)]
mod test_error_log {
  use super::*;

  #[test]
  fn drain_twice() {
    let mut log = ErrorLog::new();
    log.add(ErrorCode::BadCommand, 0x31, 4);
    log.add(ErrorCode::TxFailed, 0x57, 0xFF);
    let first = log.drain();
    assert_eq!(first, vec![20, 0x31, 4, 19, 0x57, 0xFF]);
    let second = log.drain();
    assert_eq!(second, NO_ERRORS_SENTINEL.to_vec());
  }

  #[test]
  fn full_log_drops_silently() {
    let mut log = ErrorLog::new();
    for k in 0..MAX_ERRORS {
      assert!(log.add(ErrorCode::DaqTimeout, k as u8, 0));
    }
    assert!(!log.add(ErrorCode::EventTooBig, 1, 2));
    assert_eq!(log.len(), MAX_ERRORS);
    assert_eq!(log.count(ErrorCode::EventTooBig), 0);
    let stream = log.drain();
    assert_eq!(stream.len(), 3*MAX_ERRORS);
    assert_eq!(stream[0], ErrorCode::DaqTimeout as u8);
    // the last one in is the last one which fit
    assert_eq!(stream[stream.len() - 2], (MAX_ERRORS - 1) as u8);
  }
}
