//! # aesop-daq
//!
//! Runs the event PSOC core against the simulated
//! board. The interrupts (GO, TOF, singles, 1 Hz) are
//! raised from their own thread, commands can be typed
//! on stdin as hex bytes (`<code> <data>...`) and reach
//! the core through the secondary UART.
//!
//! Everything the core sends out is written to a
//! binary file and summarized in the log.

use std::fs::File;
use std::io::{self,
              BufRead,
              Write};
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool,
                        Ordering};
use std::thread;
use std::time::Duration;

#[macro_use] extern crate log;

use clap::Parser;
use crossbeam_channel::{unbounded,
                        Receiver,
                        Sender};
use signal_hook::consts::{SIGINT,
                          SIGTERM};

use aesop_dataclasses::commands::CommandCode;
use aesop_dataclasses::commands::factory;
use aesop_dataclasses::events::EventRecord;
use aesop_dataclasses::packets::{OutputPacket,
                                 unpack_stream};
use aesop_dataclasses::serialization::Serialization;

use aesop_daq::{init_env_logger,
                DaqSettings};
use aesop_daq::control::Clock;
use aesop_daq::irq::MasterClock;
use aesop_daq::sim::{build_daq,
                     InterruptSource};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Settings file (toml). Without it, the defaults are used
  #[arg(short, long)]
  config : Option<String>,
  /// Stop the run after this many events. 0 runs until
  /// interrupted (Ctrl+C)
  #[arg(short, long, default_value_t = 100)]
  n_events : u32,
  /// Overwrite the run number from the settings
  #[arg(short, long)]
  run_number : Option<u16>,
  /// Read the tracker for every trigger (overwrites the settings)
  #[arg(long)]
  read_tracker : Option<bool>,
  /// Overwrite the number of tracker boards
  #[arg(long)]
  n_boards : Option<u8>,
  /// The raw output stream goes here
  #[arg(short, long, default_value = "aesop-run.bin")]
  output : String,
  /// Write the default settings to this file and exit
  #[arg(long)]
  write_default_config : Option<String>,
  /// Read commands from stdin
  #[arg(long, default_value_t = false)]
  stdin_commands : bool,
  /// Debug output, unless RUST_LOG is set
  #[arg(short, long, default_value_t = false)]
  verbose : bool,
}

/// Parse a line like "3C 00 01 01" into the
/// frames of a command
fn parse_command_line(line : &str) -> Option<Vec<Vec<u8>>> {
  let mut bytes = Vec::<u8>::new();
  for token in line.split_whitespace() {
    match u8::from_str_radix(token.trim_start_matches("0x"), 16) {
      Err(err) => {
        warn!("Can not parse {} as hex byte! {}", token, err);
        return None;
      }
      Ok(byte) => bytes.push(byte),
    }
  }
  if bytes.is_empty() {
    return None;
  }
  Some(factory::encode_command(CommandCode::from(bytes[0]), &bytes[1..]))
}

fn stdin_reader(cmd_sender : Sender<Vec<u8>>) {
  let stdin = io::stdin();
  for line in stdin.lock().lines() {
    match line {
      Err(err) => {
        error!("Unable to read from stdin! {err}");
        break;
      }
      Ok(line) => {
        if let Some(frames) = parse_command_line(&line) {
          for frame in frames {
            match cmd_sender.send(frame) {
              Err(err) => error!("Can not send command frame! {err}"),
              Ok(_)    => ()
            }
          }
        }
      }
    }
  }
}

fn log_packet(packet : &OutputPacket, n_events : &mut u32) {
  if packet.is_event() {
    *n_events += 1;
    let mut pos = 0usize;
    match EventRecord::from_bytestream(&packet.payload, &mut pos) {
      Err(err) => error!("Unable to decode event! {err}"),
      Ok(event) => {
        debug!("{}", event);
        if event.header.event_count % 100 == 0 {
          info!("Event {} (GO {}), TOF dt {}",
                event.header.event_count, event.header.go_count, event.header.tof.dt);
        }
      }
    }
    return;
  }
  info!("Response to {} : {:02x?}", CommandCode::from(packet.echo), packet.payload);
}

fn main() {
  let args = Args::parse();
  if args.verbose && std::env::var("RUST_LOG").is_err() {
    std::env::set_var("RUST_LOG", "debug");
  }
  init_env_logger();

  if let Some(filename) = args.write_default_config {
    DaqSettings::default().to_toml(filename);
    exit(0);
  }

  let mut settings = match args.config {
    None => DaqSettings::default(),
    Some(filename) => {
      match DaqSettings::from_toml(filename.clone()) {
        Err(err) => {
          error!("Unable to load settings from {}! {}", filename, err);
          exit(1);
        }
        Ok(settings) => settings,
      }
    }
  };
  if let Some(run_number) = args.run_number {
    settings.run_number = run_number;
  }
  if let Some(read_tracker) = args.read_tracker {
    settings.read_tracker = read_tracker;
  }
  if let Some(n_boards) = args.n_boards {
    settings.config.n_tkr_boards = n_boards;
    settings.sim.n_tkr_boards    = n_boards;
  }
  info!("Using {}", settings);

  let signal = Arc::new(AtomicBool::new(false));
  for sig in [SIGINT, SIGTERM] {
    match signal_hook::flag::register(sig, signal.clone()) {
      Err(err) => error!("Unable to register signal handler! {err}"),
      Ok(_)    => ()
    }
  }

  let mut output = match File::create(&args.output) {
    Err(err) => {
      error!("Unable to open {}! {}", args.output, err);
      exit(1);
    }
    Ok(file) => file,
  };

  let (mut daq, handles) = build_daq(settings.config.clone(), &settings.sim, false);

  let (cmd_sender, cmd_receiver) : (Sender<Vec<u8>>, Receiver<Vec<u8>>) = unbounded();
  if args.stdin_commands {
    let stdin_thread = thread::Builder::new()
      .name("stdin".into())
      .spawn(move || stdin_reader(cmd_sender));
    match stdin_thread {
      Err(err) => error!("Unable to start stdin thread! {err}"),
      Ok(_)    => info!("Reading commands from stdin"),
    }
  }

  // interrupts and the master clock
  let isr       = handles.isr.clone();
  let timer     = handles.timer.clone();
  let irq_stop  = Arc::new(AtomicBool::new(false));
  let irq_flag  = irq_stop.clone();
  let sim       = settings.sim.clone();
  let irq_thread = thread::Builder::new()
    .name("interrupts".into())
    .spawn(move || {
      let clock      = MasterClock::new(isr.clone(), timer.clone());
      let mut source = InterruptSource::new(isr.clone(), sim.clone(), 42);
      let tick       = if sim.realtime {
        Duration::from_millis(5)
      } else {
        Duration::from_micros(20)
      };
      while !irq_flag.load(Ordering::Relaxed) {
        timer.advance(1);
        source.on_tick(clock.now());
        while let Ok(frame) = cmd_receiver.try_recv() {
          isr.uart_rx(&frame);
        }
        thread::sleep(tick);
      }
      info!("Interrupt source raised {} GOs, {} accepted", source.n_go, source.n_acc);
    });

  daq.initialize();
  daq.host_mut().send_frames(factory::start_run(settings.run_number, settings.read_tracker));
  info!("Starting run {}", settings.run_number);

  let mut stream   = Vec::<u8>::new();
  let mut n_events = 0u32;
  let mut ending   = false;
  let mut done     = false;
  while !done {
    daq.tick();
    let bytes = daq.host_mut().take_output();
    if !bytes.is_empty() {
      match output.write_all(&bytes) {
        Err(err) => error!("Unable to write to {}! {}", args.output, err),
        Ok(_)    => ()
      }
      stream.extend_from_slice(&bytes);
      for packet in unpack_stream(&mut stream) {
        log_packet(&packet, &mut n_events);
        if packet.echo == CommandCode::EndRun as u8 {
          info!("Run ended, {}", daq.stats);
        }
        // the error log is requested last
        if ending && packet.echo == CommandCode::ReadErrors as u8 {
          done = true;
        }
      }
    }
    let enough = args.n_events > 0 && n_events >= args.n_events;
    if !ending && (enough || signal.load(Ordering::Relaxed)) {
      debug!("Sending end of run");
      daq.host_mut().send_frames(factory::end_run());
      daq.host_mut().send_frames(factory::read_errors());
      ending = true;
    }
  }

  irq_stop.store(true, Ordering::Relaxed);
  match irq_thread {
    Err(err) => error!("Interrupt thread did not start! {err}"),
    Ok(handle) => {
      if handle.join().is_err() {
        error!("Interrupt thread panicked!");
      }
    }
  }
  info!("Wrote {} events to {}", n_events, args.output);
}
