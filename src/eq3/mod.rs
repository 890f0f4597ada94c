pub mod codec;
pub mod types;

pub use codec::{Command, round_to_half};
pub use types::{
    Battery, Boost, Device, DeviceList, DisplayState, Event, Mode, SettableMode, Status, Window,
};
