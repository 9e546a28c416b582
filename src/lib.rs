#![deny(clippy::pedantic)]

pub mod block;
pub mod blocks;
pub mod click;
pub mod config;
pub mod error;
pub mod output;
pub mod protocol;
pub mod registry;
pub mod runner;

pub use block::{Block, BlockKey, BlockState, Status, Update};
pub use error::{BlockError, ConfigError, Error, ProtocolError, RegistrationError};
pub use protocol::{ClickEvent, I3Block};
pub use runner::{Runner, Settings};
