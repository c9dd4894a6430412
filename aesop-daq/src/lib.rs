//! # Event PSOC core for AESOP-Lite
//!
//! Everything between the hardware trigger (GO) and
//! the bytes leaving the board:
//!
//! * interrupt shared state and the interrupt entry points (`irq`)
//! * TOF ring buffers and the correlator (`tof`)
//! * the serial protocol to the tracker boards (`tracker`)
//! * the triplicated command protocol and its handlers (`commands`)
//! * building of the output packets (`packet_builder`)
//! * the main loop state machines (`orchestrator`)
//!
//! The peripherals are abstracted by the traits in
//! `control`. A simulated board which implements all
//! of them lives in `sim`, so the whole core can run
//! on a host.
//!

pub mod registers;
pub mod control;
pub mod irq;
pub mod tof;
pub mod tracker;
pub mod commands;
pub mod packet_builder;
pub mod config;
pub mod settings;
pub mod orchestrator;
pub mod sim;

#[macro_use] extern crate log;
extern crate env_logger;

use std::io::Write;

use colored::{
  Colorize,
  ColoredString,
};
use log::Level;

pub use orchestrator::Daq;
pub use config::DaqConfig;
pub use settings::DaqSettings;

/// Make sure that the loglevel is in color, even though not using pretty_env logger
pub fn color_log(level : &Level) -> ColoredString {
  match level {
    Level::Error    => String::from(" ERROR!").red(),
    Level::Warn     => String::from(" WARN  ").yellow(),
    Level::Info     => String::from(" Info  ").green(),
    Level::Debug    => String::from(" debug ").blue(),
    Level::Trace    => String::from(" trace ").cyan(),
  }
}

/// Set up the environmental (env) logger
/// with our format
///
/// Ensure that the lines and module paths
/// are printed in the logging output
pub fn init_env_logger() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format(|buf, record| {
    writeln!( buf, "[{level}][{module_path}:{line}] {args}",
      level = color_log(&record.level()),
      module_path = record.module_path().unwrap_or("<unknown>"),
      line = record.line().unwrap_or(0),
      args = record.args()
      )
    }).init();
}
