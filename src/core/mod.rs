pub mod error;
pub mod frame;
pub mod log;
pub mod profile;
pub mod sample;

pub use error::PlaybackError;
pub use frame::{Frame, FrameEntry};
pub use log::TrackLog;
pub use profile::{AircraftProfile, RegistrationBook};
pub use sample::{parse_timestamp, TrackSample};
