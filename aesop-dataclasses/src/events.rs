//! Events and their building blocks
//!
//! * `TofSample`    - one entry of the TOF ring buffers
//! * `TrackerEvent` - what the tracker chain delivered for a trigger
//! * `EventRecord`  - the assembled event as it goes to the host
//!

pub mod tof_sample;
pub mod tracker_event;
pub mod event_record;

pub use tof_sample::{TofSample,
                     TofMeasurement};
pub use tracker_event::{BoardHits,
                        PlaceholderReason,
                        TrackerEvent};
pub use event_record::{EventHeader,
                       BoardRecord,
                       EventRecord,
                       CalibrationEvent,
                       pack_time_date};
