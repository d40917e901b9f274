use crate::error::{Error, Result};
use core::fmt::{self, Display};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use strum::{EnumIter, IntoEnumIterator};

/// Shared code conversion for one byte enums. u8 is an ambiguous type, so conversion stays
/// explicit instead of going through `TryFrom`/`From`.
pub trait Code: Sized + FromPrimitive + ToPrimitive + Copy {
    const NAME: &'static str;

    fn try_from_code(c: u8) -> Result<Self> {
        Self::from_u8(c).ok_or(Error::InvalidCode(c, Self::NAME))
    }

    fn to_code(self) -> u8 {
        // All implementors are fieldless enums with u8 discriminants
        self.to_u8().unwrap_or_default()
    }
}

#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy)]
pub enum DisplayMode {
    StaticImage = 0x00,
    InternalTestPattern = 0x01,
    HdmiVideo = 0x02,
    PatternSequence = 0x04,
}

impl Code for DisplayMode {
    const NAME: &'static str = "display mode";
}

#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum PowerMode {
    #[default]
    Normal = 0x00,
    Standby = 0x01,
}

impl Code for PowerMode {
    const NAME: &'static str = "power mode";
}

/// Test patterns built into the controller
#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy)]
pub enum TestPattern {
    Checkerboard = 0x00,
    SolidBlack = 0x01,
    SolidWhite = 0x02,
    SolidGreen = 0x03,
    SolidBlue = 0x04,
    SolidRed = 0x05,
    VerticalLines = 0x06,
    HorizontalLines = 0x07,
    FineVerticalLines = 0x08,
    FineHorizontalLines = 0x09,
    DiagonalLines = 0x0A,
    VerticalRamp = 0x0B,
    HorizontalRamp = 0x0C,
    AnsiCheckerboard = 0x0D,
}

impl Code for TestPattern {
    const NAME: &'static str = "test pattern";
}

/// LED used for a pattern sequence
#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LedColor {
    Red = 0x00,
    #[default]
    Green = 0x01,
    Blue = 0x02,
}

impl Code for LedColor {
    const NAME: &'static str = "LED color";
}

#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum TriggerType {
    /// Patterns advance on an advance command
    Command = 0x00,
    /// Patterns advance every trigger period
    #[default]
    Auto = 0x01,
    ExternalPositive = 0x02,
    ExternalNegative = 0x03,
    CameraPositive = 0x04,
    CameraNegative = 0x05,
}

impl Code for TriggerType {
    const NAME: &'static str = "trigger type";
}

#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum PatternType {
    #[default]
    Normal = 0x00,
    /// Every pattern is followed by its inverse
    Inverted = 0x01,
}

impl Code for PatternType {
    const NAME: &'static str = "pattern type";
}

#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Polarity {
    #[default]
    ActiveHigh = 0x00,
    ActiveLow = 0x01,
}

impl Code for Polarity {
    const NAME: &'static str = "polarity";
}

/// Component whose revision string is requested
#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum RevisionTarget {
    #[default]
    Controller = 0x00,
    Fpga = 0x10,
    Msp430 = 0x20,
}

impl Code for RevisionTarget {
    const NAME: &'static str = "revision target";
}

/// Lists accepted values of an enum, used in CLI help and error messages
pub fn list_values<T: IntoEnumIterator + fmt::Debug>() -> String {
    T::iter()
        .map(|v| format!("{:?}", v))
        .collect::<Vec<String>>()
        .join(", ")
}

impl Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:?} ({:#04x})", self, self.to_code()))
    }
}

impl Display for TestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:?} ({:#04x})", self, self.to_code()))
    }
}
