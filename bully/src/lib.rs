#![deny(clippy::as_conversions)]

mod cluster;
mod directory;
mod duration;
mod process;
mod task;

pub use bully_api::{Message, MessageKind, ProcessId};
pub use cluster::*;
pub use directory::*;
pub use duration::{parse_duration, DurationParseError};
pub use process::*;
