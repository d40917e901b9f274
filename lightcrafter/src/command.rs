use core::fmt::{self, Display};

/// Command understood by the projector, sent in bytes 1-2 of a packet header
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum CommandId {
    Revision,
    DisplayMode,
    PowerMode,
    TestPattern,
    LedCurrent,
    StaticImage,
    StaticColor,
    DisplaySetting,
    PatternSequenceSetting,
    PatternDefinition,
    PatternSequenceStart,
    PatternSequenceAdvance,
    CameraTrigger,
}

impl CommandId {
    /// Convert command enum into its 16 bit wire code
    pub fn code(self) -> u16 {
        use CommandId::*;
        match self {
            Revision => 0x0100,
            DisplayMode => 0x0101,
            PowerMode => 0x0102,
            TestPattern => 0x0103,
            LedCurrent => 0x0104,
            StaticImage => 0x0105,
            StaticColor => 0x0106,
            DisplaySetting => 0x0107,
            PatternDefinition => 0x0401,
            PatternSequenceStart => 0x0402,
            PatternSequenceAdvance => 0x0403,
            CameraTrigger => 0x0404,
            PatternSequenceSetting => 0x0480,
        }
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CommandId::*;
        let name = match self {
            Revision => "Revision",
            DisplayMode => "Display mode",
            PowerMode => "Power mode",
            TestPattern => "Test pattern",
            LedCurrent => "LED current",
            StaticImage => "Static image",
            StaticColor => "Static color",
            DisplaySetting => "Display setting",
            PatternSequenceSetting => "Pattern sequence setting",
            PatternDefinition => "Pattern definition",
            PatternSequenceStart => "Pattern sequence start",
            PatternSequenceAdvance => "Pattern sequence advance",
            CameraTrigger => "Camera trigger",
        };
        write!(f, "{} ({:#06x})", name, self.code())
    }
}
