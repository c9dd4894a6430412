//! Addresses, register pointers and command codes
//! of the peripherals around the event PSOC.
//!
//! I2C addresses are 7 bit.

//========== I2C =========================

/// AD5622 12 bit DAC for the threshold of PMT channel 5
pub const I2C_ADDRESS_DAC_CH5    : u8 = 0x0E;
/// AD5622 DACs for the two TOF discriminators
pub const I2C_ADDRESS_TOF_DAC1   : u8 = 0x0C;
pub const I2C_ADDRESS_TOF_DAC2   : u8 = 0x0F;
pub const I2C_ADDRESS_TMP100     : u8 = 0x48;
pub const I2C_ADDRESS_BAROMETER  : u8 = 0x70;
pub const I2C_ADDRESS_RTC        : u8 = 0x6F;

pub const TMP100_TEMP_REG        : u8 = 0x00;

/// INA226 power monitor registers
pub const INA226_SHUNT_V_REG     : u8 = 0x01;
pub const INA226_BUS_V_REG       : u8 = 0x02;

//========== TOF chip (AS6501) ===========

pub const TOF_POWER_ON_RESET     : u8 = 0x30;
pub const TOF_WRITE_CONFIG       : u8 = 0x80;
pub const TOF_READ_CONFIG        : u8 = 0x40;
pub const TOF_ENABLE             : u8 = 0x18;

/// Power up configuration of the TOF chip.
///
/// Stop A/B, reference clock and LVDS active, 16 bit
/// reference and stop counters, 8333 reference clock
/// divisions (10 ps LSB at 12 MHz).
pub const TOF_DEFAULT_CONFIG     : [u8;17] = [0xB5, 0x05, 0x0C, 0x8D, 0x20, 0x00, 0x00, 0x08, 0xA1,
                                              0x13, 0x00, 0x0A, 0xCC, 0xCC, 0xF1, 0x7D, 0x00];

//========== Tracker command codes =======

pub const TKR_READ_EVENT         : u8 = 0x01;
pub const TKR_CAL_STROBE         : u8 = 0x02;
pub const TKR_RESET_LOGIC        : u8 = 0x04;
pub const TKR_SET_LAYERS         : u8 = 0x0F;
pub const TKR_LOAD_DATA_MASK     : u8 = 0x13;
pub const TKR_LOAD_TRIGGER_MASK  : u8 = 0x14;
pub const TKR_LOAD_CAL_MASK      : u8 = 0x15;
pub const TKR_READ_ASIC_CONFIG   : u8 = 0x22;
pub const TKR_I2C_READ           : u8 = 0x46;
pub const TKR_INTERNAL_1         : u8 = 0x52;
pub const TKR_INTERNAL_2         : u8 = 0x53;
pub const TKR_STATUS             : u8 = 0x57;
pub const TKR_TRIGGER_ENABLE     : u8 = 0x65;
pub const TKR_NO_ECHO_1          : u8 = 0x67;
pub const TKR_NO_ECHO_2          : u8 = 0x6C;
pub const TKR_CALIBRATE_INPUT    : u8 = 0x81;
pub const TKR_SET_INPUT_DELAY    : u8 = 0x82;

/// Answers to the status query
pub const TKR_READY              : u8 = 0x59;
pub const TKR_NOT_READY          : u8 = 0x4E;

/// Number of ASICs on a tracker board
pub const TKR_N_ASICS            : u8 = 12;

//========== Mask register types =========

pub const MASK_TYPE_CALIBRATION  : u8 = 1;
pub const MASK_TYPE_DATA         : u8 = 2;

//========== Output modes ================

pub const OUTPUT_SPI             : u8 = 0;
pub const OUTPUT_USB             : u8 = 1;

//========== Board defaults ==============

/// 8 bit VDAC thresholds, 4 mV/count
pub const THRESHOLD_DEFAULT      : u8  = 5;
pub const DAC_CH5_DEFAULT        : u16 = 0x000F;
pub const TOF_DAC_DEFAULT        : u16 = 0x00FF;
pub const TRIGGER_MASK_E_DEFAULT : u8  = 0x01;
pub const TRIGGER_MASK_P_DEFAULT : u8  = 0x05;
pub const PRESCALE_DEFAULT       : u8  = 255;
pub const COINCIDENCE_WINDOW     : u8  = 12;
/// 12 MHz ticks the peak detectors need to settle
pub const PEAK_RESET_WAIT        : u8  = 72;
pub const N_TKR_BOARDS_DEFAULT   : u8  = 1;

/// Number of PMT singles counters
pub const N_SINGLES              : usize = 5;
