use std::fmt;

cfg_if::cfg_if! {
  if #[cfg(feature = "random")]  {
    use crate::FromRandom;
    extern crate rand;
    use rand::Rng;
  }
}

/// Every command the event PSOC understands
///
/// Codes which are not in this list get decoded
/// as `Unknown` and produce no response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[repr(u8)]
pub enum CommandCode {
  Unknown                 = 0x00,
  LoadThresholdDac        = 0x01,
  ReadThresholdDac        = 0x02,
  ReadErrors              = 0x03,
  LoadTofDac              = 0x04,
  ReadTofDac              = 0x05,
  Led                     = 0x06,
  Version                 = 0x07,
  TofReset                = 0x0C,
  TofConfigModify         = 0x0D,
  TofConfigRead           = 0x0E,
  TrackerCommand          = 0x10,
  BusVoltage              = 0x20,
  ShuntVoltage            = 0x21,
  Temperature             = 0x22,
  RtcRegisterRead         = 0x23,
  RtcRegisterWrite        = 0x24,
  BarometerRead           = 0x26,
  BarometerWrite          = 0x27,
  OutputMode              = 0x30,
  SpiInit                 = 0x31,
  TofDebugOn              = 0x32,
  SavedSingles            = 0x33,
  TofCursors              = 0x34,
  TofLatest               = 0x35,
  SetTriggerMask          = 0x36,
  ReadSingles             = 0x37,
  LogicReset              = 0x38,
  SetPrescale             = 0x39,
  SetCoincidenceWindow    = 0x3A,
  TriggerEnable           = 0x3B,
  StartRun                = 0x3C,
  TriggerStatus           = 0x3D,
  ReadTriggerMask         = 0x3E,
  TofDebugOff             = 0x3F,
  TofDump                 = 0x40,
  TrackerMask             = 0x41,
  TrackerCalStrobe        = 0x42,
  TrackerCalEvent         = 0x43,
  EndRun                  = 0x44,
  SetRtc                  = 0x45,
  ReadRtc                 = 0x46,
  TrackerReset            = 0x47,
  TrackerCalibrateTiming  = 0x48,
}

impl CommandCode {
  pub const ALL : [CommandCode;43] = [
    CommandCode::LoadThresholdDac,
    CommandCode::ReadThresholdDac,
    CommandCode::ReadErrors,
    CommandCode::LoadTofDac,
    CommandCode::ReadTofDac,
    CommandCode::Led,
    CommandCode::Version,
    CommandCode::TofReset,
    CommandCode::TofConfigModify,
    CommandCode::TofConfigRead,
    CommandCode::TrackerCommand,
    CommandCode::BusVoltage,
    CommandCode::ShuntVoltage,
    CommandCode::Temperature,
    CommandCode::RtcRegisterRead,
    CommandCode::RtcRegisterWrite,
    CommandCode::BarometerRead,
    CommandCode::BarometerWrite,
    CommandCode::OutputMode,
    CommandCode::SpiInit,
    CommandCode::TofDebugOn,
    CommandCode::SavedSingles,
    CommandCode::TofCursors,
    CommandCode::TofLatest,
    CommandCode::SetTriggerMask,
    CommandCode::ReadSingles,
    CommandCode::LogicReset,
    CommandCode::SetPrescale,
    CommandCode::SetCoincidenceWindow,
    CommandCode::TriggerEnable,
    CommandCode::StartRun,
    CommandCode::TriggerStatus,
    CommandCode::ReadTriggerMask,
    CommandCode::TofDebugOff,
    CommandCode::TofDump,
    CommandCode::TrackerMask,
    CommandCode::TrackerCalStrobe,
    CommandCode::TrackerCalEvent,
    CommandCode::EndRun,
    CommandCode::SetRtc,
    CommandCode::ReadRtc,
    CommandCode::TrackerReset,
    CommandCode::TrackerCalibrateTiming,
  ];
}

impl From<u8> for CommandCode {
  fn from(value : u8) -> Self {
    for cc in CommandCode::ALL {
      if cc as u8 == value {
        return cc;
      }
    }
    CommandCode::Unknown
  }
}

impl fmt::Display for CommandCode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let r = serde_json::to_string(self).unwrap_or(
      String::from("Error: cannot unwrap this CommandCode"));
    write!(f, "<CommandCode: {} ({:#04x})>", r, *self as u8)
  }
}

#[cfg(feature = "random")]
impl FromRandom for CommandCode {
  fn from_random() -> Self {
    let mut rng = rand::thread_rng();
    let idx     = rng.gen_range(0..CommandCode::ALL.len());
    CommandCode::ALL[idx]
  }
}

#[test]
fn command_codes_round_trip() {
  for cc in CommandCode::ALL {
    assert_eq!(CommandCode::from(cc as u8), cc);
  }
  assert_eq!(CommandCode::from(0x25), CommandCode::Unknown);
  assert_eq!(CommandCode::from(0xFF), CommandCode::Unknown);
}
