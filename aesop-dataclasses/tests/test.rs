#[cfg(test)]
pub mod tests {

  extern crate rand;
  use rand::Rng;

  use aesop_dataclasses::commands::{CommandCode,
                                    CommandUnit};
  use aesop_dataclasses::commands::factory;
  use aesop_dataclasses::events::{BoardRecord,
                                  EventRecord,
                                  CalibrationEvent,
                                  TrackerEvent,
                                  PlaceholderReason};
  use aesop_dataclasses::packets::OutputPacket;
  use aesop_dataclasses::serialization::{Serialization,
                                         search_for_marker};

  #[test]
  fn event_in_packet_stream() {
    let mut rng = rand::thread_rng();
    let mut stream = Vec::<u8>::new();
    let mut events = Vec::<EventRecord>::new();
    for k in 0..20u32 {
      let mut event = EventRecord::new();
      event.header.run_number  = 320;
      event.header.event_count = k;
      event.header.time_stamp  = rng.gen::<u32>();
      event.header.tof.dt      = rng.gen_range(-2000..2000);
      event.header.n_boards    = rng.gen_range(0..5);
      for brd in 0..event.header.n_boards {
        let n_bytes  = rng.gen_range(4..30);
        let mut hits = vec![0xE7u8, brd];
        for _ in 2..n_bytes {
          hits.push(rng.gen::<u8>());
        }
        event.boards.push(BoardRecord::new(brd, &hits));
      }
      let packet = OutputPacket::event(event.to_bytestream());
      stream.extend_from_slice(&packet.to_bytestream());
      events.push(event);
    }
    let mut pos = 0usize;
    for event in events {
      let packet = OutputPacket::from_bytestream(&stream, &mut pos).unwrap();
      assert!(packet.is_event());
      let mut ev_pos = 0usize;
      let decoded = EventRecord::from_bytestream(&packet.payload, &mut ev_pos).unwrap();
      assert_eq!(decoded, event);
    }
    assert_eq!(pos, stream.len());
  }

  #[test]
  fn find_events_in_garbage() {
    let mut stream = vec![0x55u8, 0x12, 0x00];
    let event      = EventRecord::new();
    stream.extend_from_slice(&event.to_bytestream());
    let head = search_for_marker(EventRecord::HEAD, &stream, 0).unwrap();
    assert_eq!(head, 3);
    let mut pos = head;
    assert!(EventRecord::from_bytestream(&stream, &mut pos).is_ok());
  }

  #[test]
  fn calibration_event_from_tracker_event() {
    let mut tkr = TrackerEvent::new();
    tkr.n_boards = 2;
    tkr.store_hits(0, &[0xE7, 0x00, 0x12, 0x34]);
    tkr.store_placeholder(1, PlaceholderReason::BoardShort);
    let mut cal = CalibrationEvent { boards : Vec::new() };
    for brd in 0..tkr.n_boards as usize {
      cal.boards.push(BoardRecord::new(brd as u8, tkr.hit_list(brd).unwrap()));
    }
    let stream  = cal.to_bytestream();
    assert_eq!(&stream[0..5], &[b'Z', b'E', b'R', b'O', 2]);
    let mut pos = 0usize;
    let decoded = CalibrationEvent::from_bytestream(&stream, &mut pos).unwrap();
    assert_eq!(decoded.boards[1].placeholder_tag(), Some(PlaceholderReason::BoardShort as u8));
  }

  #[test]
  fn factory_frames_decode() {
    for code in CommandCode::ALL {
      let frames = factory::encode_command(code, &[1, 2, 3]);
      let first  = CommandUnit::decode(&frames[0]).unwrap();
      assert_eq!(CommandCode::from(first.data_byte), code);
      assert_eq!(first.address.byte_count, 3);
      for (k, frame) in frames.iter().skip(1).enumerate() {
        let unit = CommandUnit::decode(frame).unwrap();
        assert_eq!(unit.address.byte_count as usize, k + 1);
        assert_eq!(unit.data_byte as usize, k + 1);
      }
    }
  }

  #[cfg(feature = "random")]
  #[test]
  fn serialization_circle_test_for_event_record() {
    use aesop_dataclasses::FromRandom;
    for _ in 0..100 {
      let event   = EventRecord::from_random();
      let stream  = event.to_bytestream();
      let mut pos = 0usize;
      let decoded = EventRecord::from_bytestream(&stream, &mut pos).unwrap();
      assert_eq!(decoded, event);
    }
  }
}
