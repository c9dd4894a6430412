//! A simulated event PSOC board
//!
//! Implements all peripheral traits of `control` on the host,
//! so the core can run (and be tested) without hardware:
//!
//! * `SimTimer`        - the 8 bit fine counter of the master clock
//! * `SimTracker`      - a chain of tracker boards behind the UART
//! * `SimBoard`        - registers, ADCs, DACs, RTC and the TOF chip
//! * `SimHost`         - USB and SPI links to the outside
//! * `InterruptSource` - GO signals, TOF hits and singles
//!
//! The timer either steps by itself whenever it is read
//! (for tests, so timeouts expire) or is advanced from an
//! interrupt thread.

use std::collections::{HashMap,
                       VecDeque};
use std::sync::{Arc,
                Mutex,
                MutexGuard};
use std::sync::atomic::{AtomicU32,
                        Ordering};
use std::thread;
use std::time::Duration;

use chrono::Local;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use aesop_dataclasses::constants::{TICKS_PER_SECOND,
                                   TKR_ECHO_DATA,
                                   TKR_EVT_DATA,
                                   TKR_HIT_LIST_ID,
                                   TKR_HOUSE_DATA,
                                   TKR_HOUSE_TRAILER,
                                   TOF_CLOCK_PERIOD,
                                   TOF_CONFIG_SIZE};
use aesop_dataclasses::events::event_record::N_ADC_CHANNELS;

use crate::config::DaqConfig;
use crate::control::*;
use crate::irq::{IsrShared,
                 MasterClock};
use crate::orchestrator::Daq;
use crate::registers::*;
use crate::settings::SimSettings;
use crate::tof::TofChannel;

/// Milliseconds per master clock tick
const MS_PER_TICK : u32 = 5;

fn lock<T>(mutex : &Mutex<T>) -> MutexGuard<'_, T> {
  match mutex.lock() {
    Ok(guard)     => guard,
    Err(poisoned) => {
      error!("Simulation state lock was poisoned, continuing with the inner value!");
      poisoned.into_inner()
    }
  }
}

//========== timer ==========================

/// The fine count of the master clock
///
/// Every 200 ticks the 1 Hz interrupt is raised.
#[derive(Clone)]
pub struct SimTimer {
  ticks     : Arc<AtomicU32>,
  isr       : Arc<IsrShared>,
  /// Advance one tick on every read
  auto_step : bool,
  /// Delays sleep for real
  realtime  : bool,
}

impl SimTimer {
  pub fn new(isr : Arc<IsrShared>, auto_step : bool, realtime : bool) -> Self {
    Self {
      ticks : Arc::new(AtomicU32::new(0)),
      isr,
      auto_step,
      realtime,
    }
  }

  /// Let n ticks pass
  pub fn advance(&self, n_ticks : u32) {
    for _ in 0..n_ticks {
      let ticks = self.ticks.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
      if ticks % TICKS_PER_SECOND == 0 {
        self.isr.clk_1hz();
      }
    }
  }

  /// Ticks since the start of the simulation
  pub fn ticks(&self) -> u32 {
    self.ticks.load(Ordering::SeqCst)
  }
}

impl TickTimer for SimTimer {
  fn count(&self) -> u8 {
    if self.auto_step {
      self.advance(1);
    }
    (self.ticks() % TICKS_PER_SECOND) as u8
  }

  fn delay_ms(&self, ms : u32) {
    if self.realtime {
      thread::sleep(Duration::from_millis(ms as u64));
    } else if self.auto_step {
      self.advance(ms.div_ceil(MS_PER_TICK));
    }
  }
}

//========== tracker ========================

pub struct SimTrackerState {
  /// Boards answering in the chain
  pub n_boards       : u8,
  pub hits_per_board : u8,
  /// Answer to the status query
  pub ready          : bool,
  /// Do not answer at all
  pub silent         : bool,
  /// Canned answers, used before anything is generated
  pub script         : VecDeque<Vec<u8>>,
  /// Every complete request which was received
  pub requests       : Vec<Vec<u8>>,
  pub cmd_count      : u16,
  pub trigger_count  : u16,
  pub trigger_on     : bool,
  request            : Vec<u8>,
  rx                 : VecDeque<u8>,
  rng                : StdRng,
}

impl SimTrackerState {
  fn new(n_boards : u8, hits_per_board : u8) -> Self {
    Self {
      n_boards,
      hits_per_board,
      ready         : true,
      silent        : false,
      script        : VecDeque::new(),
      requests      : Vec::new(),
      cmd_count     : 0,
      trigger_count : 0,
      trigger_on    : false,
      request       : Vec::new(),
      rx            : VecDeque::new(),
      rng           : StdRng::seed_from_u64(0x7E57),
    }
  }

  fn receive(&mut self, byte : u8) {
    self.request.push(byte);
    if self.request.len() < 3 || self.request.len() < 3 + self.request[2] as usize {
      return;
    }
    let request = std::mem::take(&mut self.request);
    trace!("Simulated tracker got {:?}", request);
    self.requests.push(request.clone());
    self.cmd_count = self.cmd_count.wrapping_add(1);
    if self.silent {
      return;
    }
    if let Some(answer) = self.script.pop_front() {
      self.rx.extend(answer);
      return;
    }
    let answer = self.answer(&request);
    self.rx.extend(answer);
  }

  fn echo(&self, code : u8) -> Vec<u8> {
    let count = self.cmd_count.to_be_bytes();
    vec![4, TKR_ECHO_DATA, count[0], count[1], code]
  }

  fn housekeeping(&self, fpga : u8, code : u8, data : &[u8]) -> Vec<u8> {
    let count  = self.cmd_count.to_be_bytes();
    let n_data = (data.len() + 1) as u8;
    let mut answer = vec![n_data + 6, TKR_HOUSE_DATA, n_data, count[0], count[1], fpga, code];
    answer.extend_from_slice(data);
    answer.push(TKR_HOUSE_TRAILER);
    answer
  }

  fn event(&mut self) -> Vec<u8> {
    self.trigger_count = self.trigger_count.wrapping_add(1);
    let trg = self.trigger_count.to_be_bytes();
    let mut answer = vec![5, TKR_EVT_DATA, trg[0], trg[1], (self.cmd_count & 0xFF) as u8, 0x80 | self.n_boards];
    for brd in 0..self.n_boards {
      let n_hits = self.rng.gen_range(2..=self.hits_per_board.max(2));
      answer.push(n_hits + 2);
      answer.push(TKR_HIT_LIST_ID);
      answer.push(brd);
      for _ in 0..n_hits {
        answer.push(self.rng.gen::<u8>());
      }
    }
    answer
  }

  fn answer(&mut self, request : &[u8]) -> Vec<u8> {
    let fpga = request[0];
    let code = request[1];
    match code {
      TKR_NO_ECHO_1 | TKR_NO_ECHO_2 => Vec::new(),
      TKR_STATUS => {
        let status = if self.ready { TKR_READY } else { TKR_NOT_READY };
        self.housekeeping(fpga, code, &[status])
      },
      TKR_READ_EVENT => self.event(),
      TKR_TRIGGER_ENABLE => {
        self.trigger_on = true;
        self.echo(code)
      },
      TKR_SET_LAYERS => {
        self.n_boards = *request.get(3).unwrap_or(&self.n_boards);
        self.echo(code)
      },
      TKR_CAL_STROBE => {
        let target = *request.get(5).unwrap_or(&0);
        let mut answer = vec![9, (target & 0x07) << 3];
        for _ in 0..8 {
          answer.push(self.rng.gen::<u8>());
        }
        answer
      },
      0x20..=0x25 => vec![3, code, fpga, 0x00],
      TKR_I2C_READ => vec![fpga, 0x00, 0x12, 0x34],
      _ => self.echo(code),
    }
  }
}

/// The tracker chain behind the UART. Clones share
/// the same state, so a test can keep a handle.
#[derive(Clone)]
pub struct SimTracker {
  state : Arc<Mutex<SimTrackerState>>,
}

impl SimTracker {
  pub fn new(n_boards : u8, hits_per_board : u8) -> Self {
    Self {
      state : Arc::new(Mutex::new(SimTrackerState::new(n_boards, hits_per_board))),
    }
  }

  pub fn state(&self) -> MutexGuard<'_, SimTrackerState> {
    lock(&self.state)
  }

  /// Answer the next request with raw bytes
  pub fn push_script(&self, answer : Vec<u8>) {
    self.state().script.push_back(answer);
  }

  pub fn set_silent(&self, silent : bool) {
    self.state().silent = silent;
  }

  pub fn set_ready(&self, ready : bool) {
    self.state().ready = ready;
  }

  /// Command codes of all requests so far
  pub fn request_codes(&self) -> Vec<u8> {
    self.state().requests.iter().map(|r| r[1]).collect()
  }
}

impl TrackerPort for SimTracker {
  fn rx_ready(&mut self) -> bool {
    !self.state().rx.is_empty()
  }

  fn read_byte(&mut self) -> u8 {
    self.state().rx.pop_front().unwrap_or(0)
  }

  fn tx_full(&mut self) -> bool {
    false
  }

  fn write_byte(&mut self, byte : u8) {
    self.state().receive(byte);
  }

  fn tx_pending(&mut self) -> usize {
    0
  }

  fn clear_rx(&mut self) {
    self.state().rx.clear();
  }
}

//========== board ==========================

/// Registers and peripherals of the board
#[derive(Debug, Clone)]
pub struct SimBoard {
  pub trigger_gate       : bool,
  pub digitizer_stuck    : bool,
  pub adc                : [u16; N_ADC_CHANNELS],
  pub vdac               : [u8;4],
  pub trigger_masks      : [u8;2],
  pub prescales          : [u8;2],
  pub coincidence_window : u8,
  pub peak_reset_wait    : u8,
  pub singles_hw         : [u8; N_SINGLES],
  pub leds               : HashMap<String, bool>,
  pub rtc                : RtcTime,
  pub tof_config         : [u8; TOF_CONFIG_SIZE],
  /// Every SPI transaction to the TOF chip
  pub tof_spi            : Vec<Vec<u8>>,
  /// Every I2C write as (address, bytes)
  pub i2c_writes         : Vec<(u8, Vec<u8>)>,
  /// Devices which do not acknowledge
  pub i2c_dead           : Vec<u8>,
  pub n_logic_resets     : u32,
  pub n_counter_resets   : u32,
  pub n_fifo_drains      : u32,
  pub n_spi_inits        : u32,
  dacs                   : HashMap<u8, u16>,
  registers              : HashMap<(u8, u8), u8>,
  pointers               : HashMap<u8, u8>,
}

impl SimBoard {
  pub fn new() -> Self {
    Self {
      trigger_gate       : false,
      digitizer_stuck    : false,
      adc                : [0; N_ADC_CHANNELS],
      vdac               : [0;4],
      trigger_masks      : [0;2],
      prescales          : [0;2],
      coincidence_window : 0,
      peak_reset_wait    : 0,
      singles_hw         : [0; N_SINGLES],
      leds               : HashMap::new(),
      rtc                : RtcTime::from_datetime(&Local::now().naive_local()),
      tof_config         : [0; TOF_CONFIG_SIZE],
      tof_spi            : Vec::new(),
      i2c_writes         : Vec::new(),
      i2c_dead           : Vec::new(),
      n_logic_resets     : 0,
      n_counter_resets   : 0,
      n_fifo_drains      : 0,
      n_spi_inits        : 0,
      dacs               : HashMap::new(),
      registers          : HashMap::new(),
      pointers           : HashMap::new(),
    }
  }

  /// I2C writes which went to a single device
  pub fn writes_to(&self, address : u8) -> Vec<Vec<u8>> {
    self.i2c_writes.iter().filter(|(a, _)| *a == address).map(|(_, d)| d.clone()).collect()
  }

  fn is_dac(address : u8) -> bool {
    address == I2C_ADDRESS_DAC_CH5
      || address == I2C_ADDRESS_TOF_DAC1
      || address == I2C_ADDRESS_TOF_DAC2
  }
}

impl Default for SimBoard {
  fn default() -> Self {
    Self::new()
  }
}

impl I2cBus for SimBoard {
  fn write(&mut self, address : u8, data : &[u8]) -> Result<(), RegisterError> {
    if self.i2c_dead.contains(&address) {
      return Err(RegisterError::BusStatus(2));
    }
    self.i2c_writes.push((address, data.to_vec()));
    if Self::is_dac(address) && data.len() == 2 {
      self.dacs.insert(address, (((data[0] & 0x0F) as u16) << 8) | data[1] as u16);
      return Ok(());
    }
    if let Some(register) = data.first() {
      self.pointers.insert(address, *register);
      if let Some(value) = data.get(1) {
        self.registers.insert((address, *register), *value);
      }
    }
    Ok(())
  }

  fn read(&mut self, address : u8, buffer : &mut [u8]) -> Result<(), RegisterError> {
    if self.i2c_dead.contains(&address) {
      return Err(RegisterError::BusStatus(2));
    }
    if Self::is_dac(address) {
      let value = *self.dacs.get(&address).unwrap_or(&0);
      if buffer.len() >= 2 {
        buffer[0] = ((value >> 6) & 0x3F) as u8;
        buffer[1] = ((value << 2) & 0xFC) as u8;
      }
      return Ok(());
    }
    let start = *self.pointers.get(&address).unwrap_or(&0);
    for (k, byte) in buffer.iter_mut().enumerate() {
      let register = start.wrapping_add(k as u8);
      *byte = *self.registers.get(&(address, register)).unwrap_or(&0);
    }
    Ok(())
  }
}

impl BoardControl for SimBoard {
  fn set_trigger_gate(&mut self, enable : bool) {
    self.trigger_gate = enable;
  }

  fn digitizer_done(&mut self) -> bool {
    !self.digitizer_stuck
  }

  fn read_adc(&mut self) -> [u16; N_ADC_CHANNELS] {
    self.adc
  }

  fn clear_adc(&mut self) {
    self.adc = [0; N_ADC_CHANNELS];
  }

  fn set_vdac(&mut self, channel : u8, value : u8) {
    if let Some(vdac) = self.vdac.get_mut((channel as usize).wrapping_sub(1)) {
      *vdac = value;
    }
  }

  fn set_trigger_mask(&mut self, which : u8, mask : u8) {
    if let Some(reg) = self.trigger_masks.get_mut((which as usize).wrapping_sub(1)) {
      *reg = mask;
    }
  }

  fn set_prescale(&mut self, which : u8, value : u8) {
    if let Some(reg) = self.prescales.get_mut((which as usize).wrapping_sub(1)) {
      *reg = value;
    }
  }

  fn set_coincidence_window(&mut self, window : u8) {
    self.coincidence_window = window;
  }

  fn set_peak_reset_wait(&mut self, wait : u8) {
    self.peak_reset_wait = wait;
  }

  fn singles_hw_count(&mut self, channel : usize) -> u8 {
    *self.singles_hw.get(channel).unwrap_or(&0)
  }

  fn pulse_logic_reset(&mut self) {
    self.n_logic_resets += 1;
  }

  fn pulse_counter_reset(&mut self) {
    self.n_counter_resets += 1;
    self.singles_hw = [0; N_SINGLES];
  }

  fn set_led(&mut self, led : Led, on : bool) {
    self.leds.insert(format!("{:?}", led), on);
  }

  fn read_rtc(&mut self) -> RtcTime {
    self.rtc
  }

  fn write_rtc(&mut self, time : &RtcTime) {
    self.rtc = *time;
  }

  fn tof_spi_write(&mut self, data : &[u8]) {
    if data.first() == Some(&TOF_WRITE_CONFIG) {
      for (k, byte) in data[1..].iter().take(TOF_CONFIG_SIZE).enumerate() {
        self.tof_config[k] = *byte;
      }
    }
    self.tof_spi.push(data.to_vec());
  }

  fn tof_spi_read(&mut self, command : u8, n_bytes : usize) -> Vec<u8> {
    if command == TOF_READ_CONFIG {
      return self.tof_config.iter().copied().take(n_bytes).collect();
    }
    vec![0u8; n_bytes]
  }

  fn drain_tof_fifos(&mut self) {
    self.n_fifo_drains += 1;
  }

  fn spi_reinit(&mut self) {
    self.n_spi_inits += 1;
  }
}

//========== host ===========================

/// USB and SPI links. Everything sent is collected.
#[derive(Debug, Clone, Default)]
pub struct SimHost {
  pub usb_in     : VecDeque<Vec<u8>>,
  pub usb_out    : Vec<u8>,
  pub spi_out    : Vec<u8>,
  /// The USB endpoint never gets ready
  pub usb_stuck  : bool,
  pub usb_chunks : usize,
}

impl SimHost {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue a command as if it came in over USB
  pub fn send_frames(&mut self, frames : Vec<Vec<u8>>) {
    self.usb_in.extend(frames);
  }

  /// Everything which went out on either link
  pub fn take_output(&mut self) -> Vec<u8> {
    let mut output = std::mem::take(&mut self.usb_out);
    output.append(&mut self.spi_out);
    output
  }
}

impl HostPort for SimHost {
  fn usb_ready(&mut self) -> bool {
    !self.usb_stuck
  }

  fn usb_write(&mut self, data : &[u8]) {
    self.usb_chunks += 1;
    self.usb_out.extend_from_slice(data);
  }

  fn usb_read(&mut self) -> Vec<u8> {
    self.usb_in.pop_front().unwrap_or_default()
  }

  fn spi_write(&mut self, data : &[u8]) {
    self.spi_out.extend_from_slice(data);
  }
}

//========== the whole board ================

pub struct SimHardware;

impl Hardware for SimHardware {
  type Board = SimBoard;
  type Port  = SimTracker;
  type Host  = SimHost;
  type Clock = MasterClock<SimTimer>;
}

/// Handles to the parts of a simulated board
/// which stay accessible from outside the `Daq`
pub struct SimHandles {
  pub isr     : Arc<IsrShared>,
  pub timer   : SimTimer,
  pub tracker : SimTracker,
}

/// Assemble a `Daq` on top of a simulated board
pub fn build_daq(config   : DaqConfig,
                 sim      : &SimSettings,
                 auto_step : bool) -> (Daq<SimHardware>, SimHandles) {
  let isr     = Arc::new(IsrShared::new());
  let timer   = SimTimer::new(isr.clone(), auto_step, sim.realtime);
  let clock   = MasterClock::new(isr.clone(), timer.clone());
  let tracker = SimTracker::new(sim.n_tkr_boards, sim.hits_per_board);
  let daq     = Daq::<SimHardware>::new(isr.clone(),
                                        SimBoard::new(),
                                        tracker.clone(),
                                        SimHost::new(),
                                        clock,
                                        config);
  let handles = SimHandles {
    isr,
    timer,
    tracker,
  };
  (daq, handles)
}

//========== interrupts =====================

/// Raises GO, TOF and singles interrupts as the
/// clock goes
pub struct InterruptSource {
  isr        : Arc<IsrShared>,
  settings   : SimSettings,
  rng        : StdRng,
  next_go    : u32,
  pub n_go   : u32,
  pub n_acc  : u32,
}

impl InterruptSource {
  pub fn new(isr : Arc<IsrShared>, settings : SimSettings, seed : u64) -> Self {
    let next_go = settings.trigger_interval();
    Self {
      isr,
      settings,
      rng     : StdRng::seed_from_u64(seed),
      next_go,
      n_go    : 0,
      n_acc   : 0,
    }
  }

  /// A pair of TOF hits belonging to a particle
  /// crossing at master clock `now`
  pub fn tof_pair(&mut self, now : u32) {
    let reference = self.rng.gen_range(0..u16::MAX as u32);
    let stop_a    = self.rng.gen_range(0..TOF_CLOCK_PERIOD as u32);
    let stop_b    = self.rng.gen_range(0..TOF_CLOCK_PERIOD as u32);
    let (dt_a, dt_b) = if self.settings.tof_jitter > 0 {
      (self.rng.gen_range(0..=1u32), self.rng.gen_range(0..=1u32))
    } else {
      (0, 0)
    };
    self.isr.store_tof(TofChannel::A, (reference << 16) | stop_a, now.wrapping_add(dt_a));
    self.isr.store_tof(TofChannel::B, (reference << 16) | stop_b, now.wrapping_sub(dt_b));
  }

  /// Everything due at master clock `now`
  pub fn on_tick(&mut self, now : u32) {
    if now % 7 == 0 {
      let ch = self.rng.gen_range(0..N_SINGLES);
      if self.rng.gen_bool(0.1) {
        self.isr.singles_rollover(ch);
      }
    }
    if now < self.next_go {
      return;
    }
    self.tof_pair(now);
    let status = self.rng.gen_range(1..16u8);
    self.n_go += 1;
    if self.isr.go(now, status) {
      self.n_acc += 1;
    }
    self.next_go = now.saturating_add(self.settings.trigger_interval());
  }
}

#[cfg(test)]
mod test_sim {
  use super::*;

  #[test]
  fn timer_raises_1hz() {
    let isr   = Arc::new(IsrShared::new());
    let timer = SimTimer::new(isr.clone(), false, false);
    let clock = MasterClock::new(isr.clone(), timer.clone());
    timer.advance(199);
    assert_eq!(clock.now(), 199);
    timer.advance(1);
    assert_eq!(isr.coarse_ticks(), 200);
    assert_eq!(clock.now(), 200);
    timer.advance(250);
    assert_eq!(clock.now(), 450);
  }

  #[test]
  fn clock_starts_at_host_time() {
    let board = SimBoard::new();
    assert!(board.rtc.year >= 2024);
    assert!(board.rtc.month >= 1 && board.rtc.month <= 12);
  }

  #[test]
  fn dac_readback() {
    let mut board = SimBoard::new();
    load_dac(&mut board, I2C_ADDRESS_DAC_CH5, 0x0F05).unwrap();
    assert_eq!(read_dac(&mut board, I2C_ADDRESS_DAC_CH5), Ok(0x0F05));
    load_i2c_reg(&mut board, I2C_ADDRESS_RTC, 0x03, 0x42).unwrap();
    assert_eq!(read_i2c_reg(&mut board, I2C_ADDRESS_RTC, 0x03, 1), Ok(vec![0x42]));
    board.i2c_dead.push(I2C_ADDRESS_TMP100);
    assert!(read_i2c_reg(&mut board, I2C_ADDRESS_TMP100, 0, 2).is_err());
  }

  #[test]
  fn tracker_answers() {
    let mut tkr = SimTracker::new(2, 6);
    for byte in [0x00, TKR_STATUS, 0x00] {
      tkr.write_byte(byte);
    }
    let mut answer = Vec::new();
    while tkr.rx_ready() {
      answer.push(tkr.read_byte());
    }
    assert_eq!(answer, vec![8, TKR_HOUSE_DATA, 2, 0, 1, 0, TKR_STATUS, TKR_READY, TKR_HOUSE_TRAILER]);
    tkr.set_silent(true);
    tkr.write_byte(0);
    tkr.write_byte(TKR_READ_EVENT);
    tkr.write_byte(1);
    tkr.write_byte(0);
    assert!(!tkr.rx_ready());
    assert_eq!(tkr.request_codes(), vec![TKR_STATUS, TKR_READ_EVENT]);
  }
}
