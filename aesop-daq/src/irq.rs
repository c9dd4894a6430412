//! State shared between the interrupt handlers and
//! the main loop
//!
//! Everything an interrupt can touch sits in `IsrShared`,
//! each part behind its own `IrqCell`. Interrupt entry
//! points are plain methods taking the values the
//! hardware latched (master clock, trigger status, shift
//! register). They only count, append and set flags.
//!

use std::cell::RefCell;
use std::sync::Arc;

use critical_section::Mutex;

use aesop_dataclasses::constants::{CMD_LENGTH,
                                   CMD_RING_SLOTS,
                                   TICKS_PER_SECOND};
use aesop_dataclasses::events::TofSample;

use crate::control::{Clock,
                     TickTimer};
use crate::registers::N_SINGLES;
use crate::tof::{TofBuffers,
                 TofChannel};

/// Maximum number of records waiting in the
/// TOF debug stream
const MAX_TOF_DEBUG_RECORDS : usize = 64;

/// A value which is only ever accessed inside a
/// critical section
pub struct IrqCell<T> {
  inner : Mutex<RefCell<T>>,
}

impl<T> IrqCell<T> {
  pub const fn new(value : T) -> Self {
    Self {
      inner : Mutex::new(RefCell::new(value)),
    }
  }

  /// Run f with exclusive access to the value.
  /// Do not nest calls on the same cell.
  pub fn with<R>(&self, f : impl FnOnce(&mut T) -> R) -> R {
    critical_section::with(|cs| {
      let mut value = self.inner.borrow_ref_mut(cs);
      f(&mut *value)
    })
  }
}

impl<T: Default> Default for IrqCell<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}

#[derive(Debug, Clone, Default)]
pub struct RunState {
  pub run_number      : u16,
  /// GOs accepted while the trigger was enabled
  pub event_count     : u32,
  /// All GOs, including dead time
  pub go_count        : u32,
  pub trigger_enabled : bool,
  pub read_tracker    : bool,
  pub triggered       : bool,
  /// Master clock at the last accepted GO
  pub time_stamp      : u32,
  pub trg_status      : u8,
  pub tof_debug       : bool,
}

/// What the main loop needs to know about
/// an accepted trigger
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Trigger {
  pub time_stamp   : u32,
  pub status       : u8,
  pub event_count  : u32,
  pub go_count     : u32,
  pub run_number   : u16,
  pub read_tracker : bool,
}

/// Rollover counts of the 8 bit hardware singles
/// counters, and the copy taken after the last event
#[derive(Debug, Clone, Default)]
pub struct Singles {
  pub counts   : [u16; N_SINGLES],
  pub saved    : [u16; N_SINGLES],
  pub saved_hw : [u8; N_SINGLES],
}

/// Commands received byte by byte on the secondary UART
#[derive(Debug, Clone)]
pub struct CommandRing {
  slots    : [[u8; CMD_LENGTH]; CMD_RING_SLOTS],
  n_bytes  : usize,
  write    : usize,
  read     : usize,
  n_ready  : usize,
  overflow : Option<(u8, u8)>,
}

impl CommandRing {

  pub fn new() -> Self {
    Self {
      slots    : [[0u8; CMD_LENGTH]; CMD_RING_SLOTS],
      n_bytes  : 0,
      write    : 0,
      read     : 0,
      n_ready  : 0,
      overflow : None,
    }
  }

  /// Store a received byte. Bytes arriving while all
  /// slots hold complete commands are dropped.
  pub fn push(&mut self, byte : u8) {
    if self.n_ready == CMD_RING_SLOTS {
      let (slot, count) = self.overflow.unwrap_or((self.write as u8, 0));
      self.overflow = Some((slot, count.saturating_add(1)));
      return;
    }
    self.slots[self.write][self.n_bytes] = byte;
    self.n_bytes += 1;
    if self.n_bytes == CMD_LENGTH {
      self.n_bytes  = 0;
      self.n_ready += 1;
      self.write    = (self.write + 1) % CMD_RING_SLOTS;
    }
  }

  /// The oldest complete command
  pub fn pop(&mut self) -> Option<[u8; CMD_LENGTH]> {
    if self.n_ready == 0 {
      return None;
    }
    let cmd = self.slots[self.read];
    self.read     = (self.read + 1) % CMD_RING_SLOTS;
    self.n_ready -= 1;
    Some(cmd)
  }

  pub fn n_ready(&self) -> usize {
    self.n_ready
  }

  /// Slot and number of dropped bytes since the last call
  pub fn take_overflow(&mut self) -> Option<(u8, u8)> {
    self.overflow.take()
  }
}

impl Default for CommandRing {
  fn default() -> Self {
    Self::new()
  }
}

/// Everything the interrupt handlers share with the main loop
#[derive(Default)]
pub struct IsrShared {
  coarse    : IrqCell<u32>,
  run       : IrqCell<RunState>,
  tof       : IrqCell<TofBuffers>,
  singles   : IrqCell<Singles>,
  cmd_ring  : IrqCell<CommandRing>,
  tof_debug : IrqCell<Vec<u8>>,
}

impl IsrShared {

  pub fn new() -> Self {
    Self::default()
  }

  //========== interrupt entry points =========

  /// GO interrupt. Returns true if the trigger was
  /// accepted, in which case the caller has to close
  /// the hardware trigger gate.
  pub fn go(&self, now : u32, trg_status : u8) -> bool {
    self.run.with(|run| {
      run.go_count = run.go_count.wrapping_add(1);
      if !run.trigger_enabled {
        return false;
      }
      run.trigger_enabled = false;
      run.trg_status      = trg_status;
      run.event_count     = run.event_count.wrapping_add(1);
      run.triggered       = true;
      run.time_stamp      = now;
      true
    })
  }

  /// Shift register FIFO of a TOF channel has data.
  /// With the debug stream on, a 7 byte record
  /// [0xAA or 0xBB, stop hi, stop lo, ref hi, ref lo, clk hi, clk lo]
  /// is queued for the host.
  pub fn store_tof(&self, channel : TofChannel, shift_reg : u32, now : u32) {
    let clk = (now & 0xFFFF) as u16;
    self.tof.with(|bufs| bufs.channel_mut(channel).push(TofSample::new(shift_reg, clk)));
    if self.run.with(|run| run.tof_debug) {
      let tag = match channel {
        TofChannel::A => 0xAA,
        TofChannel::B => 0xBB,
      };
      let record = [tag,
                    ((shift_reg & 0x0000FF00) >> 8)  as u8,
                    (shift_reg & 0x000000FF)         as u8,
                    ((shift_reg & 0xFF000000) >> 24) as u8,
                    ((shift_reg & 0x00FF0000) >> 16) as u8,
                    (clk >> 8)   as u8,
                    (clk & 0xFF) as u8];
      self.tof_debug.with(|out| {
        if out.len() < MAX_TOF_DEBUG_RECORDS * record.len() {
          out.extend_from_slice(&record);
        }
      });
    }
  }

  /// 1 Hz interrupt of the master clock
  pub fn clk_1hz(&self) {
    self.coarse.with(|coarse| *coarse = coarse.wrapping_add(TICKS_PER_SECOND));
  }

  /// Terminal count of a hardware singles counter
  pub fn singles_rollover(&self, channel : usize) {
    self.singles.with(|singles| {
      if let Some(count) = singles.counts.get_mut(channel) {
        *count = count.wrapping_add(1);
      }
    });
  }

  /// Secondary UART received bytes
  pub fn uart_rx(&self, bytes : &[u8]) {
    self.cmd_ring.with(|ring| {
      for byte in bytes {
        ring.push(*byte);
      }
    });
  }

  //========== main loop side =================

  pub fn coarse_ticks(&self) -> u32 {
    self.coarse.with(|coarse| *coarse)
  }

  /// Consume the triggered flag
  pub fn take_trigger(&self) -> Option<Trigger> {
    self.run.with(|run| {
      if !run.triggered {
        return None;
      }
      run.triggered = false;
      Some(Trigger {
        time_stamp   : run.time_stamp,
        status       : run.trg_status,
        event_count  : run.event_count,
        go_count     : run.go_count,
        run_number   : run.run_number,
        read_tracker : run.read_tracker,
      })
    })
  }

  pub fn trigger_enabled(&self) -> bool {
    self.run.with(|run| run.trigger_enabled)
  }

  pub fn set_trigger_enabled(&self, enable : bool) {
    self.run.with(|run| run.trigger_enabled = enable);
  }

  pub fn with_run<R>(&self, f : impl FnOnce(&mut RunState) -> R) -> R {
    self.run.with(f)
  }

  pub fn with_tof<R>(&self, f : impl FnOnce(&mut TofBuffers) -> R) -> R {
    self.tof.with(f)
  }

  pub fn with_singles<R>(&self, f : impl FnOnce(&mut Singles) -> R) -> R {
    self.singles.with(f)
  }

  /// Keep the singles counters as they were after an event
  pub fn save_singles(&self, hw : [u8; N_SINGLES]) {
    self.singles.with(|singles| {
      singles.saved    = singles.counts;
      singles.saved_hw = hw;
    });
  }

  /// Zero the master clock, the singles and the GO counters
  pub fn reset_counters(&self) {
    self.coarse.with(|coarse| *coarse = 0);
    self.singles.with(|singles| singles.counts = [0; N_SINGLES]);
    self.run.with(|run| {
      run.event_count = 0;
      run.go_count    = 0;
    });
  }

  pub fn next_command(&self) -> Option<[u8; CMD_LENGTH]> {
    self.cmd_ring.with(|ring| ring.pop())
  }

  pub fn take_ring_overflow(&self) -> Option<(u8, u8)> {
    self.cmd_ring.with(|ring| ring.take_overflow())
  }

  pub fn take_tof_debug(&self) -> Vec<u8> {
    self.tof_debug.with(std::mem::take)
  }
}

/// The master clock: coarse count kept by the 1 Hz
/// interrupt plus the fine count of the hardware timer
#[derive(Clone)]
pub struct MasterClock<T: TickTimer> {
  isr   : Arc<IsrShared>,
  timer : T,
}

impl<T: TickTimer> MasterClock<T> {
  pub fn new(isr : Arc<IsrShared>, timer : T) -> Self {
    Self {
      isr,
      timer,
    }
  }
}

impl<T: TickTimer> Clock for MasterClock<T> {
  fn now(&self) -> u32 {
    let fine = self.timer.count() as u32;
    self.isr.coarse_ticks().wrapping_add(fine)
  }

  fn delay_ms(&self, ms : u32) {
    self.timer.delay_ms(ms);
  }
}
