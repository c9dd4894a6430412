//! Serialization of events and responses into the
//! output stream
//!
//! The event is assembled straight from the tracker hit
//! list pool. Every slot is handed back to the pool once
//! its bytes are copied, even if the event had to be
//! truncated.
//!

use aesop_dataclasses::{ErrorCode,
                        ErrorLog};
use aesop_dataclasses::constants::{MAX_DATA_OUT,
                                   TX_TIMEOUT,
                                   USB_CHUNK_SIZE};
use aesop_dataclasses::events::{CalibrationEvent,
                                EventHeader,
                                EventRecord,
                                PlaceholderReason,
                                TrackerEvent};
use aesop_dataclasses::events::tracker_event::placeholder_hits;
use aesop_dataclasses::packets::OutputPacket;
use aesop_dataclasses::serialization::Serialization;

use crate::control::{Clock,
                     HostPort};
use crate::registers::OUTPUT_SPI;

/// Append `[address, length, hits..]` for the first n_boards
/// slots. Empty slots get a placeholder. Stops early if the
/// next board would not fit into a packet together with the
/// trailer.
fn append_boards(stream   : &mut Vec<u8>,
                 tracker  : &TrackerEvent,
                 n_boards : u8,
                 errors   : &mut ErrorLog) {
  for brd in 0..n_boards {
    let placeholder : [u8;5];
    let hits = match tracker.hit_list(brd as usize) {
      Some(hits) => hits,
      None => {
        placeholder = placeholder_hits(brd, PlaceholderReason::MissingHitList);
        &placeholder
      }
    };
    if stream.len() + 2 + hits.len() + EventRecord::TAIL.len() > MAX_DATA_OUT {
      errors.add(ErrorCode::EventTooBig, brd, hits.len() as u8);
      break;
    }
    stream.push(brd);
    stream.push(hits.len() as u8);
    stream.extend_from_slice(hits);
  }
}

/// Build the event record and release the hit list pool
///
/// # Arguments:
///
/// * header  : complete header, n_boards has to match the tracker event
/// * tracker : hit lists for the event, released afterwards
pub fn build_event(header  : &EventHeader,
                   tracker : &mut TrackerEvent,
                   errors  : &mut ErrorLog) -> Vec<u8> {
  let mut stream = header.to_bytestream();
  append_boards(&mut stream, tracker, header.n_boards, errors);
  stream.extend_from_slice(EventRecord::TAIL);
  tracker.release();
  stream
}

/// Build the tracker-only record answering a
/// calibration event read and release the pool
pub fn build_calibration_event(tracker : &mut TrackerEvent,
                               errors  : &mut ErrorLog) -> Vec<u8> {
  let mut stream = Vec::<u8>::from(CalibrationEvent::HEAD);
  stream.push(tracker.n_boards);
  append_boards(&mut stream, tracker, tracker.n_boards, errors);
  stream.extend_from_slice(CalibrationEvent::TAIL);
  tracker.release();
  stream
}

/// Send a packet over the selected link. USB goes in
/// chunks, each after waiting for the endpoint.
/// Returns false if the endpoint did not get ready in time.
pub fn send<H: HostPort, C: Clock>(host        : &mut H,
                                   clock       : &C,
                                   packet      : &OutputPacket,
                                   output_mode : u8,
                                   errors      : &mut ErrorLog) -> bool {
  let stream = packet.to_bytestream();
  trace!("Sending {} bytes, echo {:#04x}", stream.len(), packet.echo);
  if output_mode == OUTPUT_SPI {
    host.spi_write(&stream);
    return true;
  }
  for chunk in stream.chunks(USB_CHUNK_SIZE) {
    let start = clock.now();
    while !host.usb_ready() {
      if clock.now().wrapping_sub(start) > TX_TIMEOUT {
        errors.add(ErrorCode::TxFailed, packet.echo, 0x00);
        return false;
      }
    }
    host.usb_write(chunk);
  }
  true
}

#[cfg(test)]
mod test_packet_builder {
  use super::*;
  use aesop_dataclasses::events::BoardRecord;

  #[test]
  fn event_with_empty_slot() {
    let mut tkr = TrackerEvent::new();
    tkr.n_boards = 2;
    tkr.store_hits(0, &[0xE7, 0x00, 0x01, 0x02]);
    let mut header   = EventHeader::new();
    header.n_boards  = tkr.n_boards;
    let mut errors   = ErrorLog::new();
    let stream       = build_event(&header, &mut tkr, &mut errors);
    let mut pos      = 0usize;
    let event        = EventRecord::from_bytestream(&stream, &mut pos).unwrap();
    assert_eq!(event.boards[0], BoardRecord::new(0, &[0xE7, 0x00, 0x01, 0x02]));
    assert_eq!(event.boards[1].placeholder_tag(), Some(PlaceholderReason::MissingHitList as u8));
    assert_eq!(tkr.n_filled(), 0);
    assert!(errors.is_empty());
  }

  #[test]
  fn too_big_event_is_truncated() {
    let mut tkr  = TrackerEvent::new();
    tkr.n_boards = 3;
    for brd in 0..3u8 {
      let mut hits = vec![0xE7, brd];
      hits.extend(std::iter::repeat(0xAB).take(98));
      tkr.store_hits(brd as usize, &hits);
    }
    let mut header  = EventHeader::new();
    header.n_boards = 3;
    let mut errors  = ErrorLog::new();
    let stream      = build_event(&header, &mut tkr, &mut errors);
    assert!(stream.len() <= MAX_DATA_OUT);
    assert_eq!(errors.count(ErrorCode::EventTooBig), 1);
    let mut pos     = 0usize;
    let event       = EventRecord::from_bytestream(&stream, &mut pos).unwrap();
    assert!(event.is_truncated());
    assert_eq!(event.boards.len(), 1);
    assert_eq!(tkr.n_filled(), 0);
  }

  #[test]
  fn calibration_event() {
    let mut tkr  = TrackerEvent::new();
    tkr.n_boards = 1;
    tkr.store_hits(0, &[0xE7, 0x00, 0x10, 0x20]);
    let mut errors = ErrorLog::new();
    let stream = build_calibration_event(&mut tkr, &mut errors);
    assert_eq!(stream, vec![b'Z', b'E', b'R', b'O', 1, 0, 4, 0xE7, 0x00, 0x10, 0x20, b'F', b'I', b'N', b'I']);
  }
}
