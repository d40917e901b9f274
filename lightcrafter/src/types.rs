use crate::{
    error::{Error, Result},
    flags::{Code, LedColor, PatternType, Polarity, TriggerType},
    framing::Link,
    io_adapter::IoAdapter,
};
use core::fmt::{self, Display};

/// Largest current accepted by any of the LED drivers
pub const MAX_LED_CURRENT: u16 = 1024;
/// Size of the NUL padded revision string
pub const REVISION_SIZE: usize = 32;

/// Records exchanged as a fixed sequence of little-endian fields
pub trait Record: Sized {
    fn encode<IO: IoAdapter>(&self, link: &mut Link<IO>) -> Result<()>;
    fn decode<IO: IoAdapter>(link: &mut Link<IO>) -> Result<Self>;
}

fn get_bool<IO: IoAdapter>(link: &mut Link<IO>) -> Result<bool> {
    Ok(link.get_int(1)? != 0)
}

fn get_code<T: Code, IO: IoAdapter>(link: &mut Link<IO>) -> Result<T> {
    T::try_from_code(link.get_int(1)? as u8)
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct LedCurrent {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl LedCurrent {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("red", self.red), ("green", self.green), ("blue", self.blue)] {
            if value > MAX_LED_CURRENT {
                return Err(Error::InvalidParameter(format!(
                    "{} LED current {} is above {}",
                    name, value, MAX_LED_CURRENT
                )));
            }
        }
        Ok(())
    }
}

impl Record for LedCurrent {
    fn encode<IO: IoAdapter>(&self, link: &mut Link<IO>) -> Result<()> {
        link.put_int(self.red.into(), 2)?;
        link.put_int(self.green.into(), 2)?;
        link.put_int(self.blue.into(), 2)
    }

    fn decode<IO: IoAdapter>(link: &mut Link<IO>) -> Result<Self> {
        Ok(LedCurrent {
            red: link.get_int(2)? as u16,
            green: link.get_int(2)? as u16,
            blue: link.get_int(2)? as u16,
        })
    }
}

impl Display for LedCurrent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R: {}, G: {}, B: {}", self.red, self.green, self.blue)
    }
}

/// Image orientation on the DMD
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct DisplaySetting {
    pub long_axis_flip: bool,
    pub short_axis_flip: bool,
    pub rotate: bool,
}

impl Record for DisplaySetting {
    fn encode<IO: IoAdapter>(&self, link: &mut Link<IO>) -> Result<()> {
        link.put_int(self.long_axis_flip.into(), 1)?;
        link.put_int(self.short_axis_flip.into(), 1)?;
        link.put_int(self.rotate.into(), 1)
    }

    fn decode<IO: IoAdapter>(link: &mut Link<IO>) -> Result<Self> {
        Ok(DisplaySetting {
            long_axis_flip: get_bool(link)?,
            short_axis_flip: get_bool(link)?,
            rotate: get_bool(link)?,
        })
    }
}

impl Display for DisplaySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            concat!(
                "Long axis flip: {}\n",
                "Short axis flip: {}\n",
                "Rotate: {}",
            ),
            self.long_axis_flip, self.short_axis_flip, self.rotate
        ))
    }
}

/// Timing and trigger configuration shared by every pattern of a sequence. Times are
/// in microseconds.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct PatternSequenceSetting {
    pub bit_depth: u8,
    pub pattern_count: u16,
    pub pattern_type: PatternType,
    pub trigger_type: TriggerType,
    pub trigger_delay: u32,
    pub trigger_period: u32,
    pub exposure: u32,
    pub led_color: LedColor,
    pub repeat: bool,
}

impl Record for PatternSequenceSetting {
    fn encode<IO: IoAdapter>(&self, link: &mut Link<IO>) -> Result<()> {
        link.put_int(self.bit_depth.into(), 1)?;
        link.put_int(self.pattern_count.into(), 2)?;
        link.put_int(self.pattern_type.to_code().into(), 1)?;
        link.put_int(self.trigger_type.to_code().into(), 1)?;
        link.put_int(self.trigger_delay, 4)?;
        link.put_int(self.trigger_period, 4)?;
        link.put_int(self.exposure, 4)?;
        link.put_int(self.led_color.to_code().into(), 1)?;
        link.put_int(self.repeat.into(), 1)
    }

    fn decode<IO: IoAdapter>(link: &mut Link<IO>) -> Result<Self> {
        Ok(PatternSequenceSetting {
            bit_depth: link.get_int(1)? as u8,
            pattern_count: link.get_int(2)? as u16,
            pattern_type: get_code(link)?,
            trigger_type: get_code(link)?,
            trigger_delay: link.get_int(4)?,
            trigger_period: link.get_int(4)?,
            exposure: link.get_int(4)?,
            led_color: get_code(link)?,
            repeat: get_bool(link)?,
        })
    }
}

impl Display for PatternSequenceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            concat!(
                "Bit depth: {}\n",
                "Pattern count: {}\n",
                "Pattern type: {:?}\n",
                "Trigger type: {:?}\n",
                "Trigger delay: {}us\n",
                "Trigger period: {}us\n",
                "Exposure: {}us\n",
                "LED: {:?}\n",
                "Repeat: {}",
            ),
            self.bit_depth,
            self.pattern_count,
            self.pattern_type,
            self.trigger_type,
            self.trigger_delay,
            self.trigger_period,
            self.exposure,
            self.led_color,
            self.repeat
        ))
    }
}

/// Output trigger for a camera synchronized with the pattern sequence
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct CameraTriggerSetting {
    pub enabled: bool,
    pub polarity: Polarity,
    /// Microseconds between pattern start and trigger pulse
    pub delay: u32,
    pub pulse_width: u32,
}

impl Record for CameraTriggerSetting {
    fn encode<IO: IoAdapter>(&self, link: &mut Link<IO>) -> Result<()> {
        link.put_int(self.enabled.into(), 1)?;
        link.put_int(self.polarity.to_code().into(), 1)?;
        link.put_int(self.delay, 4)?;
        link.put_int(self.pulse_width, 4)
    }

    fn decode<IO: IoAdapter>(link: &mut Link<IO>) -> Result<Self> {
        Ok(CameraTriggerSetting {
            enabled: get_bool(link)?,
            polarity: get_code(link)?,
            delay: link.get_int(4)?,
            pulse_width: link.get_int(4)?,
        })
    }
}

impl Display for CameraTriggerSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            concat!(
                "Enabled: {}\n",
                "Polarity: {:?}\n",
                "Delay: {}us\n",
                "Pulse width: {}us",
            ),
            self.enabled, self.polarity, self.delay, self.pulse_width
        ))
    }
}

/// Strips NUL padding from a fixed size string field
pub(crate) fn parse_padded_str(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}
