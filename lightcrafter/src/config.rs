use crate::{
    flags::{LedColor, TriggerType},
    types::CameraTriggerSetting,
};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_ADDRESS: &str = "192.168.1.100:21845";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How to reach a projector and where to keep packed pattern images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightCrafterConf {
    /// `"<host>:<port>"`
    pub address: String,
    /// Deadline for a single read or write, `None` blocks forever
    pub timeout: Option<Duration>,
    /// Packed bitplane images are written as `<basename><plane>.bmp`
    pub image_basename: PathBuf,
}

impl Default for LightCrafterConf {
    fn default() -> Self {
        LightCrafterConf {
            address: DEFAULT_ADDRESS.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            image_basename: std::env::temp_dir().join("lightcrafter_plane"),
        }
    }
}

/// Sequence level settings. Exposure and period are used by patterns that do not set their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSettings {
    pub led_color: LedColor,
    pub trigger_type: TriggerType,
    /// Microseconds
    pub trigger_delay: u32,
    pub exposure: u32,
    pub period: u32,
    pub camera_trigger: Option<CameraTriggerSetting>,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        SequenceSettings {
            led_color: LedColor::default(),
            trigger_type: TriggerType::default(),
            trigger_delay: 0,
            // One 60Hz frame
            exposure: 16_667,
            period: 16_667,
            camera_trigger: None,
        }
    }
}
