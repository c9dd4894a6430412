#[cfg(test)]
pub mod tests {

  extern crate rand;
  use rand::Rng;

  use chrono::NaiveDate;

  use aesop_dataclasses::ErrorCode;
  use aesop_dataclasses::commands::{factory,
                                    CommandCode};
  use aesop_dataclasses::constants::{NO_ERRORS_SENTINEL,
                                     TOF_NO_MEASUREMENT,
                                     TKR_HOUSE_DATA};
  use aesop_dataclasses::events::{CalibrationEvent,
                                  EventRecord,
                                  PlaceholderReason,
                                  TofSample};
  use aesop_dataclasses::packets::{OutputPacket,
                                   unpack_stream};
  use aesop_dataclasses::serialization::Serialization;

  use aesop_daq::{Daq,
                  DaqConfig};
  use aesop_daq::irq::MasterClock;
  use aesop_daq::control::{Clock,
                           RtcTime,
                           load_i2c_reg};
  use aesop_daq::registers::*;
  use aesop_daq::settings::SimSettings;
  use aesop_daq::sim::{build_daq,
                       InterruptSource,
                       SimHandles,
                       SimHardware};
  use aesop_daq::tof::{correlate,
                       TofBuffer,
                       TofBuffers,
                       TofChannel};

  fn sim_daq(n_boards : u8) -> (Daq<SimHardware>, SimHandles) {
    let mut config = DaqConfig::new();
    config.n_tkr_boards = n_boards;
    let mut sim = SimSettings::new();
    sim.n_tkr_boards = n_boards;
    let (mut daq, handles) = build_daq(config, &sim, true);
    daq.initialize();
    (daq, handles)
  }

  /// Send a command and return everything which came back
  fn run_command(daq : &mut Daq<SimHardware>, frames : Vec<Vec<u8>>) -> Vec<OutputPacket> {
    let n_frames = frames.len();
    daq.host_mut().send_frames(frames);
    for _ in 0..n_frames + 5 {
      daq.tick();
    }
    let mut stream = daq.host_mut().take_output();
    unpack_stream(&mut stream)
  }

  fn decode_event(packet : &OutputPacket) -> EventRecord {
    assert!(packet.is_event());
    let mut pos = 0usize;
    EventRecord::from_bytestream(&packet.payload, &mut pos).unwrap()
  }

  fn sample(reference : u16, stop : u16, clk : u16) -> TofSample {
    TofSample::new(((reference as u32) << 16) | stop as u32, clk)
  }

  #[test]
  fn go_without_tof_and_tracker() {
    let (mut daq, h) = sim_daq(3);
    let packets = run_command(&mut daq, factory::start_run(7, true));
    assert!(packets.is_empty());
    assert!(h.isr.trigger_enabled());
    h.tracker.set_silent(true);
    assert!(h.isr.go(h.timer.ticks(), 0x03));
    for _ in 0..3 {
      daq.tick();
    }
    let mut stream = daq.host_mut().take_output();
    let packets    = unpack_stream(&mut stream);
    assert_eq!(packets.len(), 1);
    let event = decode_event(&packets[0]);
    println!("{}", event);
    assert_eq!(event.header.run_number, 7);
    assert_eq!(event.header.event_count, 1);
    assert_eq!(event.header.trigger_status, 0x03);
    assert_eq!(event.header.tof.dt, TOF_NO_MEASUREMENT);
    assert_eq!(event.header.n_boards, 3);
    assert_eq!(event.boards.len(), 3);
    for brd in &event.boards {
      assert_eq!(brd.hit_list[0], 0xE7);
      assert_eq!(brd.placeholder_tag(), Some(PlaceholderReason::TrackerNotReady as u8));
    }
    assert_eq!(daq.errors().count(ErrorCode::TrackerBadStatus), 1);
    // the trigger is back once the event went out
    assert!(h.isr.trigger_enabled());
  }

  #[test]
  fn tof_pair_makes_it_into_the_event() {
    let (mut daq, h) = sim_daq(1);
    run_command(&mut daq, factory::start_run(1, false));
    h.isr.store_tof(TofChannel::A, (100 << 16) | 500, 1000);
    h.isr.store_tof(TofChannel::B, (100 << 16) | 800, 1000);
    assert!(h.isr.go(1000, 1));
    for _ in 0..3 {
      daq.tick();
    }
    let mut stream = daq.host_mut().take_output();
    let packets    = unpack_stream(&mut stream);
    let event      = decode_event(&packets[0]);
    assert_eq!(event.header.time_stamp, 1000);
    assert_eq!(event.header.tof.dt, 300);
    assert_eq!(event.header.tof.n_a, 1);
    assert_eq!(event.header.tof.n_b, 1);
    assert_eq!(event.header.tof.ref_a, 100);
    assert_eq!(event.header.tof.ref_b, 100);
    assert_eq!(event.header.tof.clk_a, 1000);
    assert_eq!(event.header.tof.clk_b, 1000);
    // no tracker readout in this run
    assert_eq!(event.boards[0].placeholder_tag(), Some(PlaceholderReason::TrackerNotReady as u8));
    assert_eq!(h.isr.with_tof(|bufs| bufs.a.n_filled() + bufs.b.n_filled()), 0);
  }

  #[test]
  fn threshold_dac_channel_5() {
    let (mut daq, _h) = sim_daq(1);
    let n_before = daq.board().writes_to(I2C_ADDRESS_DAC_CH5).len();
    run_command(&mut daq, factory::set_threshold_dac(5, 0x0F05));
    let writes = daq.board().writes_to(I2C_ADDRESS_DAC_CH5);
    assert_eq!(writes.len(), n_before + 1);
    assert_eq!(writes.last().unwrap(), &vec![0x0F, 0x05]);
    assert!(daq.errors().is_empty());
    assert_eq!(daq.config().dac_ch5, 0x0F05);
    let packets = run_command(&mut daq, factory::read_threshold_dac(5));
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].echo, 0x02);
    assert_eq!(packets[0].cmd_data, vec![5]);
    assert_eq!(packets[0].payload, vec![0x0F, 0x05]);
  }

  #[test]
  fn dac_failure_is_logged() {
    let (mut daq, _h) = sim_daq(1);
    daq.board_mut().i2c_dead.push(I2C_ADDRESS_DAC_CH5);
    run_command(&mut daq, factory::set_threshold_dac(5, 0x0123));
    assert_eq!(daq.errors().count(ErrorCode::DacLoad), 1);
    assert_eq!(daq.config().dac_ch5, DAC_CH5_DEFAULT);
  }

  #[test]
  fn set_and_read_the_clock() {
    let (mut daq, h) = sim_daq(1);
    let time = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap().and_hms_opt(15, 9, 26).unwrap();
    let expected = RtcTime::from_datetime(&time);
    assert!(run_command(&mut daq, factory::set_rtc(&time)).is_empty());
    assert_eq!(daq.board().rtc, expected);
    let packets = run_command(&mut daq, factory::encode_command(CommandCode::ReadRtc, &[]));
    assert_eq!(packets[0].payload, expected.to_bytes().to_vec());
    // the event header carries the packed clock
    run_command(&mut daq, factory::start_run(2, false));
    assert!(h.isr.go(10, 1));
    for _ in 0..3 {
      daq.tick();
    }
    let mut stream = daq.host_mut().take_output();
    let event = decode_event(&unpack_stream(&mut stream)[0]);
    assert_eq!(event.header.time_date, expected.packed());
  }

  #[test]
  fn bus_voltage_from_the_power_monitor() {
    let (mut daq, _h) = sim_daq(1);
    let monitor = 0x40u8;
    load_i2c_reg(daq.board_mut(), monitor, INA226_BUS_V_REG, 0x12).unwrap();
    load_i2c_reg(daq.board_mut(), monitor, INA226_BUS_V_REG + 1, 0x34).unwrap();
    let packets = run_command(&mut daq, factory::encode_command(CommandCode::BusVoltage, &[monitor]));
    assert_eq!(packets[0].payload, vec![0x12, 0x34]);
    assert_eq!(daq.board().writes_to(monitor).last().unwrap(), &vec![INA226_BUS_V_REG]);
    let packets = run_command(&mut daq, factory::encode_command(CommandCode::ShuntVoltage, &[monitor]));
    assert_eq!(packets[0].payload, vec![0x00, 0x12]);
  }

  #[test]
  fn commands_are_gated_while_armed() {
    let (mut daq, h) = sim_daq(1);
    daq.set_trigger(true);
    let packets = run_command(&mut daq, factory::get_version());
    assert!(packets.is_empty());
    assert_eq!(daq.errors().count(ErrorCode::CommandIgnored), 1);
    assert_eq!(daq.errors().len(), 1);
    // disabling the trigger is always possible
    let packets = run_command(&mut daq, factory::trigger_enable(false));
    assert!(packets.is_empty());
    assert!(!h.isr.trigger_enabled());
    let packets = run_command(&mut daq, factory::get_version());
    assert_eq!(packets[0].payload, vec![1]);
  }

  #[test]
  fn error_log_drained_twice() {
    let (mut daq, _h) = sim_daq(1);
    daq.set_trigger(true);
    run_command(&mut daq, factory::get_version());
    run_command(&mut daq, factory::trigger_enable(false));
    let first = run_command(&mut daq, factory::read_errors());
    assert_eq!(first[0].payload, vec![ErrorCode::CommandIgnored as u8, 0x07, 0x00]);
    let second = run_command(&mut daq, factory::read_errors());
    assert_eq!(second[0].payload, NO_ERRORS_SENTINEL.to_vec());
  }

  #[test]
  fn end_of_run_counts() {
    let (mut daq, h) = sim_daq(1);
    run_command(&mut daq, factory::start_run(3, false));
    for k in 0..4u32 {
      h.isr.go(100 + k, 1);
      daq.tick();
      daq.tick();
    }
    // trigger is re-armed after every event, but this one
    // comes while the previous is still being read
    h.isr.go(200, 1);
    h.isr.go(201, 1);
    daq.tick();
    daq.tick();
    let packets = run_command(&mut daq, factory::end_run());
    let response = packets.iter().find(|p| p.echo == 0x44).unwrap();
    let go_count    = u32::from_be_bytes(response.payload[0..4].try_into().unwrap());
    let event_count = u32::from_be_bytes(response.payload[4..8].try_into().unwrap());
    assert_eq!(go_count, 6);
    assert_eq!(event_count, 5);
    assert!(!h.isr.trigger_enabled());
  }

  #[test]
  fn bad_event_length_gives_placeholders() {
    let (mut daq, h) = sim_daq(2);
    run_command(&mut daq, factory::start_run(1, true));
    h.tracker.push_script(vec![8, TKR_HOUSE_DATA, 2, 0, 9, 0, TKR_STATUS, TKR_READY, 0x0F]);
    h.tracker.push_script(vec![6, 0xD3, 0, 1, 0, 0x82, 0x00]);
    h.isr.go(50, 1);
    for _ in 0..3 {
      daq.tick();
    }
    let mut stream = daq.host_mut().take_output();
    let packets    = unpack_stream(&mut stream);
    let event      = decode_event(&packets[0]);
    assert_eq!(daq.errors().count(ErrorCode::TrackerBadLength), 1);
    assert_eq!(event.boards.len(), 2);
    for brd in &event.boards {
      assert_eq!(brd.placeholder_tag(), Some(PlaceholderReason::BadEventLength as u8));
    }
    // tracker logic got reset after the failed read
    assert!(h.tracker.request_codes().contains(&TKR_RESET_LOGIC));
  }

  #[test]
  fn tracker_pass_through_returns_housekeeping() {
    let (mut daq, _h) = sim_daq(1);
    let packets = run_command(&mut daq, factory::tracker_command(0, TKR_STATUS, &[]));
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].echo, 0x10);
    let payload = &packets[0].payload;
    assert_eq!(payload[1], TKR_HOUSE_DATA);
    assert_eq!(payload[6], TKR_STATUS);
    assert_eq!(payload[7], TKR_READY);
    assert!(daq.errors().is_empty());
  }

  #[test]
  fn tracker_mask_register() {
    let (mut daq, h) = sim_daq(1);
    let packets = run_command(&mut daq, factory::tracker_mask(0, 3, MASK_TYPE_DATA, false, &[(4, 0), (2, 62)]));
    assert_eq!(packets[0].payload[2], TKR_LOAD_DATA_MASK);
    let state = h.tracker.state();
    let request = state.requests.last().unwrap();
    assert_eq!(request[1], TKR_LOAD_DATA_MASK);
    assert_eq!(request[3], 3);
    assert_eq!(request[4..12].to_vec(), vec![0xF0u8, 0, 0, 0, 0, 0, 0, 0x03]);
  }

  #[test]
  fn calibration_event() {
    let (mut daq, h) = sim_daq(2);
    let packets = run_command(&mut daq, factory::encode_command(CommandCode::TrackerCalEvent, &[1]));
    let mut pos = 0usize;
    let event = CalibrationEvent::from_bytestream(&packets[0].payload, &mut pos).unwrap();
    assert_eq!(event.boards.len(), 2);
    assert_eq!(event.boards[1].hit_list[0], 0xE7);
    let state = h.tracker.state();
    assert_eq!(state.requests.last().unwrap()[3], 0x05);
  }

  #[test]
  fn tof_debug_stream_goes_out_raw() {
    let (mut daq, h) = sim_daq(1);
    run_command(&mut daq, factory::encode_command(CommandCode::TofDebugOn, &[]));
    h.isr.store_tof(TofChannel::B, 0x11223344, 0x0506);
    daq.tick();
    let raw = daq.host_mut().take_output();
    assert_eq!(raw, vec![0xBB, 0x33, 0x44, 0x11, 0x22, 0x05, 0x06]);
  }

  #[test]
  fn commands_over_the_uart() {
    let (mut daq, h) = sim_daq(1);
    for frame in factory::get_version() {
      h.isr.uart_rx(&frame);
    }
    for _ in 0..3 {
      daq.tick();
    }
    let mut stream = daq.host_mut().take_output();
    let packets    = unpack_stream(&mut stream);
    assert_eq!(packets[0].echo, 0x07);
  }

  #[test]
  fn run_with_interrupt_source() {
    let (mut daq, h) = sim_daq(2);
    run_command(&mut daq, factory::start_run(42, true));
    let mut sim    = SimSettings::new();
    sim.tof_jitter = 0;
    let clock      = MasterClock::new(h.isr.clone(), h.timer.clone());
    let mut source = InterruptSource::new(h.isr.clone(), sim, 7);
    let mut stream = Vec::<u8>::new();
    for _ in 0..5000 {
      source.on_tick(clock.now());
      daq.tick();
      stream.extend(daq.host_mut().take_output());
    }
    let packets = unpack_stream(&mut stream);
    assert!(packets.len() > 10);
    for (k, packet) in packets.iter().enumerate() {
      let event = decode_event(packet);
      assert_eq!(event.header.run_number, 42);
      assert_eq!(event.header.event_count, k as u32 + 1);
      assert!(event.header.go_count >= event.header.event_count);
      assert!(event.header.tof.is_valid());
      assert!(event.header.tof.dt.abs() < 8333);
      assert_eq!(event.boards.len(), 2);
      for brd in &event.boards {
        assert_eq!(brd.hit_list[0], 0xE7);
        assert_eq!(brd.placeholder_tag(), None);
      }
    }
    assert_eq!(daq.stats.n_events as usize, packets.len());
    assert!(daq.errors().is_empty());
    println!("{}", daq.stats);
  }

  //========== correlator ===================

  /// Time difference B - A as documented for the board
  fn brute_force_dt(a : &TofSample, b : &TofSample) -> i32 {
    let ta = a.reference() as i32 * 8333 + a.stop() as i32;
    let tb = b.reference() as i32 * 8333 + b.stop() as i32;
    if a.reference() > 49152 && b.reference() < 16384 {
      tb - (ta - 500_000_000)
    } else if b.reference() > 49152 && a.reference() < 16384 {
      (tb - 500_000_000) - ta
    } else {
      tb - ta
    }
  }

  #[test]
  fn correlator_finds_the_best_pair() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
      let tag = rng.gen_range(10..60000u16);
      let mut bufs = TofBuffers::new();
      let reference = rng.gen_range(0..u16::MAX);
      for _ in 0..rng.gen_range(0..12) {
        let clk = tag.wrapping_add(rng.gen_range(0..5)).wrapping_sub(2);
        bufs.a.push(sample(reference.wrapping_add(rng.gen_range(0..2)), rng.gen_range(0..8333), clk));
      }
      for _ in 0..rng.gen_range(0..12) {
        let clk = tag.wrapping_add(rng.gen_range(0..5)).wrapping_sub(2);
        bufs.b.push(sample(reference.wrapping_add(rng.gen_range(0..2)), rng.gen_range(0..8333), clk));
      }
      let cands_a : Vec<TofSample> = bufs.a.newest_first()
        .filter(|s| s.clk_cnt == tag || s.clk_cnt == tag + 1).copied().collect();
      let cands_b : Vec<TofSample> = bufs.b.newest_first()
        .filter(|s| s.clk_cnt == tag || s.clk_cnt == tag - 1).copied().collect();
      let mut best : Option<i32> = None;
      for a in &cands_a {
        for b in &cands_b {
          if (a.clk_cnt as i32 - b.clk_cnt as i32).abs() > 1 {
            continue;
          }
          let dt = brute_force_dt(a, b).abs();
          if dt < i16::MAX as i32 && best.map_or(true, |x| dt < x) {
            best = Some(dt);
          }
        }
      }
      let tof = correlate(&bufs.a, &bufs.b, tag);
      assert_eq!(tof.n_a as usize, cands_a.len());
      assert_eq!(tof.n_b as usize, cands_b.len());
      match best {
        None     => assert_eq!(tof.dt, TOF_NO_MEASUREMENT),
        Some(dt) => assert_eq!((tof.dt as i32).abs(), dt),
      }
    }
  }

  #[test]
  fn ring_buffer_wraps() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
      let n = rng.gen_range(1..300usize);
      let mut buf = TofBuffer::new();
      for k in 0..n {
        buf.push(sample(k as u16, 0, k as u16));
      }
      assert_eq!(buf.cursor(), n % 64);
      assert_eq!(buf.n_filled(), n.min(64));
      let clks : Vec<u16> = buf.newest_first().map(|s| s.clk_cnt).collect();
      let expected : Vec<u16> = (n.saturating_sub(64)..n).rev().map(|k| k as u16).collect();
      assert_eq!(clks, expected);
    }
  }

  #[test]
  fn unused_hits_are_lost_at_the_next_trigger() {
    // Known data loss: both buffers are emptied after
    // every trigger, hits already stored for a trigger
    // shortly after are gone
    let mut bufs = TofBuffers::new();
    bufs.a.push(sample(10, 100, 100));
    bufs.b.push(sample(10, 200, 100));
    bufs.a.push(sample(10, 300, 103));
    let first = bufs.correlate_and_clear(100);
    assert_eq!(first.dt, 100);
    bufs.b.push(sample(10, 400, 103));
    let second = bufs.correlate_and_clear(103);
    assert_eq!(second.n_a, 0);
    assert_eq!(second.n_b, 1);
    assert!(!second.is_valid());
  }
}
