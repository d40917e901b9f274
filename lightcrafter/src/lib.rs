//! Control of DLP LightCrafter projectors over their TCP command interface.

pub mod bitplanes;
pub mod command;
pub mod config;
pub mod error;
pub mod flags;
pub mod framing;
pub mod io_adapter;
pub mod lightcrafter;
pub mod packet;
pub mod pattern;
pub mod sequence;
pub mod types;

pub use crate::{
    config::{LightCrafterConf, SequenceSettings},
    error::{DeviceError, Error, Result},
    io_adapter::{
        std_io::StdIoAdapter,
        tcp::{connect_tcp, ConnectionId, TcpAdapter},
        IoAdapter,
    },
    lightcrafter::LightCrafter,
    pattern::{fits_budget, Pattern, PatternData},
    sequence::SequenceState,
};
