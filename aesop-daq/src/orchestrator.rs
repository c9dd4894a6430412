//! The main loop of the event PSOC
//!
//! Two state machines are advanced by `Daq::tick`:
//!
//! * acquisition: `Idle` (armed, waiting for GO) - `Triggered`
//!   (trigger closed, event being read out and sent). The
//!   trigger is re-armed only after the event went out.
//! * command: `Awaiting` - `InFlight` - `Done`, kept by the
//!   `CommandParser`. A command is done once its response
//!   is sent.
//!
//! Events are only read out while no command is in
//! progress, and no new command is looked at while an
//! output packet is still pending.

use std::fmt;
use std::sync::Arc;

use aesop_dataclasses::{ErrorCode,
                        ErrorLog};
use aesop_dataclasses::commands::CommandFrame;
use aesop_dataclasses::constants::{CMD_LENGTH,
                                   DAQ_TIMEOUT,
                                   MAX_DATA_OUT,
                                   TKR_HOUSE_DATA};
use aesop_dataclasses::events::EventHeader;
use aesop_dataclasses::packets::OutputPacket;

use crate::commands::{allowed_while_armed,
                      handler_for,
                      CommandParser,
                      CommandState};
use crate::config::DaqConfig;
use crate::control::{load_dac,
                     BoardControl,
                     Clock,
                     Hardware,
                     HostPort,
                     Led};
use crate::irq::{IsrShared,
                 Trigger};
use crate::packet_builder;
use crate::registers::*;
use crate::tracker::TrackerEngine;

/// Wait for the peak detectors to settle after a reset
const LOGIC_RESET_DELAY_MS : u32 = 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcqState {
  Idle,
  Triggered,
}

impl fmt::Display for AcqState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let repr = match self {
      AcqState::Idle      => "Idle",
      AcqState::Triggered => "Triggered",
    };
    write!(f, "<AcqState: {}>", repr)
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputKind {
  Event,
  Response,
  Housekeeping,
}

/// A packet waiting to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOutput {
  pub packet : OutputPacket,
  pub kind   : OutputKind,
}

/// Counters of what went through the main loop
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DaqStatistics {
  pub n_events       : u64,
  pub n_responses    : u64,
  pub n_housekeeping : u64,
  pub n_ignored      : u64,
  pub n_tx_failed    : u64,
  pub n_ticks        : u64,
}

impl fmt::Display for DaqStatistics {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut repr = String::from("<DaqStatistics:");
    repr += &(format!("\n  events sent        : {}", self.n_events));
    repr += &(format!("\n  responses sent     : {}", self.n_responses));
    repr += &(format!("\n  housekeeping sent  : {}", self.n_housekeeping));
    repr += &(format!("\n  commands ignored   : {}", self.n_ignored));
    repr += &(format!("\n  failed sends       : {}", self.n_tx_failed));
    repr += &(format!("\n  main loop ticks    : {}", self.n_ticks));
    write!(f, "{}>", repr)
  }
}

/// Owns everything the main loop works with
pub struct Daq<HW: Hardware> {
  pub(crate) isr     : Arc<IsrShared>,
  pub(crate) board   : HW::Board,
  pub(crate) host    : HW::Host,
  pub(crate) clock   : HW::Clock,
  pub(crate) tracker : TrackerEngine<HW::Port, HW::Clock>,
  pub(crate) config  : DaqConfig,
  pub(crate) errors  : ErrorLog,
  pub(crate) parser  : CommandParser,
  acq                : AcqState,
  output             : Option<PendingOutput>,
  pub stats          : DaqStatistics,
}

impl<HW: Hardware> Daq<HW> {

  pub fn new(isr    : Arc<IsrShared>,
             board  : HW::Board,
             port   : HW::Port,
             host   : HW::Host,
             clock  : HW::Clock,
             config : DaqConfig) -> Self {
    let tracker = TrackerEngine::new(port, clock.clone(), config.n_tkr_boards);
    Self {
      isr,
      board,
      host,
      clock,
      tracker,
      config,
      errors  : ErrorLog::new(),
      parser  : CommandParser::new(),
      acq     : AcqState::Idle,
      output  : None,
      stats   : DaqStatistics::default(),
    }
  }

  pub fn isr(&self) -> &Arc<IsrShared> {
    &self.isr
  }

  pub fn board(&self) -> &HW::Board {
    &self.board
  }

  pub fn board_mut(&mut self) -> &mut HW::Board {
    &mut self.board
  }

  pub fn host_mut(&mut self) -> &mut HW::Host {
    &mut self.host
  }

  pub fn tracker_mut(&mut self) -> &mut TrackerEngine<HW::Port, HW::Clock> {
    &mut self.tracker
  }

  pub fn config(&self) -> &DaqConfig {
    &self.config
  }

  pub fn errors(&self) -> &ErrorLog {
    &self.errors
  }

  pub fn acq_state(&self) -> AcqState {
    self.acq
  }

  pub fn command_state(&self) -> &CommandState {
    self.parser.state()
  }

  pub fn output_pending(&self) -> bool {
    self.output.is_some()
  }

  /// Bring the hardware into the configured state.
  /// Leaves the trigger disabled.
  pub fn initialize(&mut self) {
    info!("Initializing the board with {}", self.config);
    for channel in 1..=4u8 {
      let value = self.config.thresholds[(channel - 1) as usize];
      self.board.set_vdac(channel, value);
    }
    match load_dac(&mut self.board, I2C_ADDRESS_DAC_CH5, self.config.dac_ch5) {
      Err(err) => {
        error!("Unable to load the threshold of channel 5! {}", err);
        self.errors.add(ErrorCode::DacLoad, err.code(), I2C_ADDRESS_DAC_CH5);
      }
      Ok(_) => ()
    }
    for (k, address) in [I2C_ADDRESS_TOF_DAC1, I2C_ADDRESS_TOF_DAC2].iter().enumerate() {
      match load_dac(&mut self.board, *address, self.config.tof_dac[k]) {
        Err(err) => {
          error!("Unable to load TOF DAC {}! {}", k + 1, err);
          self.errors.add(ErrorCode::TofDacLoad, err.code(), *address);
        }
        Ok(_) => ()
      }
    }
    self.board.tof_spi_write(&[TOF_POWER_ON_RESET]);
    self.write_tof_config();
    self.board.tof_spi_write(&[TOF_ENABLE]);
    self.board.set_trigger_mask(1, self.config.trigger_mask_e);
    self.board.set_trigger_mask(2, self.config.trigger_mask_p);
    self.board.set_prescale(1, self.config.prescale_tkr);
    self.board.set_prescale(2, self.config.prescale_pmt);
    self.board.set_coincidence_window(self.config.coincidence_window);
    self.board.set_peak_reset_wait(self.config.peak_reset_wait);
    self.tracker.set_boards(self.config.n_tkr_boards);
    self.set_trigger(false);
    self.logic_reset();
  }

  /// Write the full TOF chip configuration
  pub(crate) fn write_tof_config(&mut self) {
    let mut transaction = vec![TOF_WRITE_CONFIG];
    transaction.extend_from_slice(&self.config.tof_config);
    self.board.tof_spi_write(&transaction);
  }

  /// Open or close the master trigger
  pub fn set_trigger(&mut self, enable : bool) {
    self.isr.set_trigger_enabled(enable);
    self.board.set_trigger_gate(enable);
  }

  /// Zero the clock and the counters, pulse the logic
  /// and counter resets and drop any tracker data
  pub fn logic_reset(&mut self) {
    self.board.set_led(Led::Trigger, true);
    self.isr.reset_counters();
    self.board.pulse_logic_reset();
    self.board.pulse_counter_reset();
    self.clock.delay_ms(LOGIC_RESET_DELAY_MS);
    self.board.set_led(Led::Trigger, false);
    self.tracker.event.release();
    debug!("Logic reset done");
  }

  /// One pass of the main loop
  pub fn tick(&mut self) {
    self.stats.n_ticks += 1;
    if let Some((slot, count)) = self.isr.take_ring_overflow() {
      self.errors.add(ErrorCode::CommandBufferOverflow, slot, count);
    }
    if self.output.is_none() && self.parser.is_awaiting() && self.acq == AcqState::Idle {
      if let Some(trg) = self.isr.take_trigger() {
        self.read_out_event(trg);
      }
    }
    self.transmit();
    self.parser.check_timeout(self.clock.now());
    if self.output.is_none() {
      if let Some(raw) = self.fetch_command() {
        let now = self.clock.now();
        if let Some(cmd) = self.parser.feed(&raw, now, &mut self.errors) {
          self.execute(&cmd);
        }
      }
    }
    if self.output.is_none() && self.parser.is_awaiting() && !self.isr.trigger_enabled() {
      if let Some(hk) = self.tracker.take_housekeeping() {
        debug!("Forwarding {}", hk);
        self.output = Some(PendingOutput {
          packet : OutputPacket::new(TKR_HOUSE_DATA, &[], hk.to_bytes()),
          kind   : OutputKind::Housekeeping,
        });
        self.transmit();
      }
    }
    self.flush_tof_debug();
  }

  /// A command from the USB link, else the
  /// oldest one from the UART ring
  fn fetch_command(&mut self) -> Option<Vec<u8>> {
    let usb = self.host.usb_read();
    if usb.len() == CMD_LENGTH {
      return Some(usb);
    }
    if !usb.is_empty() {
      debug!("Ignoring {} bytes from USB which are not a command", usb.len());
    }
    self.isr.next_command().map(|raw| raw.to_vec())
  }

  /// Run the handler of a complete command and
  /// queue its response
  fn execute(&mut self, cmd : &CommandFrame) {
    if self.isr.trigger_enabled() && !allowed_while_armed(cmd) {
      self.errors.add(ErrorCode::CommandIgnored, cmd.code, 0);
      self.stats.n_ignored += 1;
      self.parser.finish();
      return;
    }
    let handler = match handler_for::<HW>(cmd.command()) {
      None => {
        warn!("No handler for command code {:#04x}", cmd.code);
        self.parser.finish();
        return;
      }
      Some(handler) => handler
    };
    debug!("Executing {}", cmd);
    let response = handler(self, cmd);
    if let Some(fault) = response.fault {
      self.errors.push(fault);
    }
    let mut payload = response.data;
    if payload.is_empty() && !self.isr.trigger_enabled() {
      if let Some(hk) = self.tracker.take_housekeeping() {
        payload = hk.to_bytes();
      }
    }
    if payload.is_empty() {
      self.parser.finish();
      return;
    }
    let max_payload = MAX_DATA_OUT - cmd.data().len();
    if payload.len() > max_payload {
      warn!("Response to {:#04x} has {} bytes, truncating to {}", cmd.code, payload.len(), max_payload);
      payload.truncate(max_payload);
    }
    self.output = Some(PendingOutput {
      packet : OutputPacket::new(cmd.code, cmd.data(), payload),
      kind   : OutputKind::Response,
    });
  }

  /// Build the event for an accepted trigger
  fn read_out_event(&mut self, trg : Trigger) {
    self.acq = AcqState::Triggered;
    self.board.set_led(Led::Trigger, true);
    let time_date = self.board.read_rtc().packed();
    let start = self.clock.now();
    while !self.board.digitizer_done() {
      if self.clock.now().wrapping_sub(start) > DAQ_TIMEOUT {
        self.errors.add(ErrorCode::DaqTimeout,
                        (trg.event_count & 0xFF) as u8,
                        ((trg.event_count >> 8) & 0xFF) as u8);
        break;
      }
    }
    let adc = self.board.read_adc();
    if trg.read_tracker && self.tracker.check_data_ready(&mut self.errors) {
      self.board.set_led(Led::Tracker, true);
      let status = self.tracker.read_event(&mut self.errors);
      if !status.is_ok() {
        self.errors.add(ErrorCode::GetTrackerDataFailed, status as u8, 0x77);
        self.tracker.clear_rx();
        self.tracker.reset_all_logic(&mut self.errors);
      }
      self.board.set_led(Led::Tracker, false);
    } else {
      self.tracker.fill_not_ready();
    }
    let tag = (trg.time_stamp & 0xFFFF) as u16;
    let tof = self.isr.with_tof(|bufs| bufs.correlate_and_clear(tag));
    trace!("TOF for trigger tag {}: dt {} ({} A, {} B)", tag, tof.dt, tof.n_a, tof.n_b);

    let mut header           = EventHeader::new();
    header.run_number        = trg.run_number;
    header.event_count       = trg.event_count;
    header.time_stamp        = trg.time_stamp;
    header.go_count          = trg.go_count;
    header.time_date         = time_date;
    header.trigger_status    = trg.status;
    header.adc               = adc;
    header.tof               = tof;
    header.tkr_trigger_count = self.tracker.event.trigger_count;
    header.tkr_cmd_count     = self.tracker.event.cmd_count;
    header.tkr_trg_pattern   = self.tracker.event.trg_pattern;
    header.n_boards          = self.tracker.event.n_boards;
    let stream = packet_builder::build_event(&header, &mut self.tracker.event, &mut self.errors);
    self.board.clear_adc();

    let mut hw = [0u8; N_SINGLES];
    for (ch, count) in hw.iter_mut().enumerate() {
      *count = self.board.singles_hw_count(ch);
    }
    self.isr.save_singles(hw);
    self.board.set_led(Led::Trigger, false);
    debug!("Event {} of run {} with {} bytes", trg.event_count, trg.run_number, stream.len());
    self.output = Some(PendingOutput {
      packet : OutputPacket::event(stream),
      kind   : OutputKind::Event,
    });
  }

  /// Send the pending packet. Re-arms the trigger after
  /// an event, finishes the command after a response.
  fn transmit(&mut self) {
    let pending = match self.output.take() {
      None          => return,
      Some(pending) => pending
    };
    self.board.set_led(Led::Data, true);
    if !packet_builder::send(&mut self.host,
                             &self.clock,
                             &pending.packet,
                             self.config.output_mode,
                             &mut self.errors) {
      self.stats.n_tx_failed += 1;
    }
    self.board.set_led(Led::Data, false);
    match pending.kind {
      OutputKind::Event => {
        self.stats.n_events += 1;
        self.acq = AcqState::Idle;
        self.set_trigger(true);
      },
      OutputKind::Response => {
        self.stats.n_responses += 1;
        self.parser.finish();
      },
      OutputKind::Housekeeping => {
        self.stats.n_housekeeping += 1;
      }
    }
  }

  /// Records of the TOF debug stream go out raw
  /// over USB while nothing else is being sent
  fn flush_tof_debug(&mut self) {
    if self.output.is_some() {
      return;
    }
    let records = self.isr.take_tof_debug();
    if records.is_empty() {
      return;
    }
    if self.host.usb_ready() {
      self.host.usb_write(&records);
    } else {
      trace!("USB not ready, dropping {} bytes of TOF debug data", records.len());
    }
  }
}
