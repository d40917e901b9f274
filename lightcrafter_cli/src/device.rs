use clap::Args;
use lightcrafter::{config::DEFAULT_ADDRESS, LightCrafter, LightCrafterConf, TcpAdapter};
use simple_eyre::{eyre::WrapErr, Result};
use std::{path::PathBuf, time::Duration};

#[derive(Args)]
pub struct DeviceConf {
    /// Projector address as <host>:<port>
    #[clap(short, long, value_parser, default_value = DEFAULT_ADDRESS)]
    pub device: String,

    /// Deadline for every read and write in milliseconds, 0 waits forever
    #[clap(long, value_parser, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Packed pattern images are stored as <basename><index>.bmp
    #[clap(long, value_parser, value_hint = clap::ValueHint::FilePath)]
    pub image_basename: Option<PathBuf>,
}

pub type TcpLightCrafter = LightCrafter<TcpAdapter>;

impl DeviceConf {
    pub fn conf(&self) -> LightCrafterConf {
        let default = LightCrafterConf::default();
        LightCrafterConf {
            address: self.device.clone(),
            timeout: match self.timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            image_basename: self
                .image_basename
                .clone()
                .unwrap_or(default.image_basename),
        }
    }

    pub fn open_lightcrafter(&self) -> Result<TcpLightCrafter> {
        LightCrafter::connect(self.conf())
            .wrap_err_with(|| format!("Could not connect to {}", self.device))
    }
}
