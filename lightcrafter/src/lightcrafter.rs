use crate::{
    command::CommandId,
    config::LightCrafterConf,
    error::{Error, Result},
    flags::{Code, DisplayMode, PowerMode, RevisionTarget, TestPattern},
    framing::Link,
    io_adapter::{
        tcp::{connect_tcp, ConnectionId, TcpAdapter},
        IoAdapter,
    },
    packet::PacketKind,
    sequence::SequenceCompiler,
    types::{
        parse_padded_str, CameraTriggerSetting, DisplaySetting, LedCurrent,
        PatternSequenceSetting, Record, REVISION_SIZE,
    },
};
use std::path::Path;

/// Number of patterns a sequence can address
pub const MAX_PATTERNS: u8 = 96;

pub struct LightCrafter<IO: IoAdapter> {
    link: Option<Link<IO>>,
    connection: Option<ConnectionId>,
    pub(crate) conf: LightCrafterConf,
    pub(crate) sequence: SequenceCompiler,
}

impl<IO: IoAdapter> LightCrafter<IO> {
    /// Wraps an already opened stream
    pub fn new(io: IO) -> Self {
        Self::with_conf(io, LightCrafterConf::default())
    }

    pub fn with_conf(io: IO, conf: LightCrafterConf) -> Self {
        LightCrafter {
            link: Some(Link::new(io)),
            connection: None,
            conf,
            sequence: SequenceCompiler::default(),
        }
    }

    /// False after `close` or once the stream got out of sync with the device
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().map_or(false, Link::is_valid)
    }

    /// Address the projector was reached at, if it was opened with `connect`
    pub fn connection(&self) -> Option<&ConnectionId> {
        self.connection.as_ref()
    }

    pub fn conf(&self) -> &LightCrafterConf {
        &self.conf
    }

    /// Drops the link and hands back the underlying stream
    pub fn close(&mut self) -> Option<IO> {
        self.connection = None;
        self.sequence.invalidate();
        self.link.take().map(Link::into_inner)
    }

    /// Runs one exchange for `command`, tagging any failure with the command it came from
    pub(crate) fn command<T>(
        &mut self,
        command: CommandId,
        exchange: impl FnOnce(&mut Link<IO>) -> Result<T>,
    ) -> Result<T> {
        let res = match self.link.as_mut() {
            Some(link) if link.is_valid() => exchange(link),
            _ => Err(Error::NotConnected),
        };
        res.map_err(|e| Error::Command {
            command,
            source: Box::new(e),
        })
    }

    fn write(&mut self, command: CommandId, payload: &[u8]) -> Result<()> {
        self.command(command, |link| {
            link.send_command(PacketKind::Write, command, payload)?;
            Ok(())
        })
    }

    fn write_record<R: Record>(&mut self, command: CommandId, record: &R) -> Result<()> {
        self.command(command, |link| {
            link.begin(PacketKind::Write, command)?;
            record.encode(link)?;
            link.finish()
        })
    }

    fn read_record<R: Record>(&mut self, command: CommandId) -> Result<R> {
        self.command(command, |link| {
            link.send_command(PacketKind::Read, command, &[])?;
            R::decode(link)
        })
    }

    fn read_code<T: Code>(&mut self, command: CommandId) -> Result<T> {
        self.command(command, |link| {
            link.send_command(PacketKind::Read, command, &[])?;
            T::try_from_code(link.get_int(1)? as u8)
        })
    }

    /// Gets the revision string of one of the projector components
    pub fn get_revision(&mut self, target: RevisionTarget) -> Result<String> {
        self.command(CommandId::Revision, |link| {
            link.send_command(PacketKind::Read, CommandId::Revision, &[target.to_code()])?;
            let mut raw = [0u8; REVISION_SIZE];
            link.get_bytes(&mut raw)?;
            Ok(parse_padded_str(&raw))
        })
    }

    pub fn get_display_mode(&mut self) -> Result<DisplayMode> {
        self.read_code(CommandId::DisplayMode)
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) -> Result<()> {
        if mode == DisplayMode::HdmiVideo {
            return Err(Error::InvalidParameter(
                "video input is not supported".to_string(),
            ));
        }
        self.write(CommandId::DisplayMode, &[mode.to_code()])
    }

    pub fn set_power_mode(&mut self, mode: PowerMode) -> Result<()> {
        self.write(CommandId::PowerMode, &[mode.to_code()])
    }

    pub fn get_test_pattern(&mut self) -> Result<TestPattern> {
        self.read_code(CommandId::TestPattern)
    }

    pub fn set_test_pattern(&mut self, pattern: TestPattern) -> Result<()> {
        self.write(CommandId::TestPattern, &[pattern.to_code()])
    }

    pub fn get_led_current(&mut self) -> Result<LedCurrent> {
        self.read_record(CommandId::LedCurrent)
    }

    pub fn set_led_current(&mut self, current: LedCurrent) -> Result<()> {
        current.validate()?;
        self.write_record(CommandId::LedCurrent, &current)
    }

    /// Uploads a 608x684 BMP shown while in static image mode
    pub fn set_static_image(&mut self, path: &Path) -> Result<()> {
        self.command(CommandId::StaticImage, |link| {
            link.begin(PacketKind::Write, CommandId::StaticImage)?;
            link.put_file(path)?;
            link.finish()
        })
    }

    /// Fills the static image with a 24 bit `0xRRGGBB` color
    pub fn set_static_color(&mut self, rgb: u32) -> Result<()> {
        if rgb > 0xFF_FFFF {
            return Err(Error::InvalidParameter(format!(
                "color {:#x} does not fit into 24 bits",
                rgb
            )));
        }
        self.write(CommandId::StaticColor, &rgb.to_le_bytes())
    }

    pub fn get_display_setting(&mut self) -> Result<DisplaySetting> {
        self.read_record(CommandId::DisplaySetting)
    }

    pub fn set_display_setting(&mut self, setting: DisplaySetting) -> Result<()> {
        self.write_record(CommandId::DisplaySetting, &setting)
    }

    pub fn get_pattern_sequence_setting(&mut self) -> Result<PatternSequenceSetting> {
        self.read_record(CommandId::PatternSequenceSetting)
    }

    pub fn set_pattern_sequence_setting(&mut self, setting: PatternSequenceSetting) -> Result<()> {
        if !(1..=8).contains(&setting.bit_depth) {
            return Err(Error::InvalidBitDepth(setting.bit_depth));
        }
        self.write_record(CommandId::PatternSequenceSetting, &setting)
    }

    pub fn get_camera_trigger(&mut self) -> Result<CameraTriggerSetting> {
        self.read_record(CommandId::CameraTrigger)
    }

    pub fn set_camera_trigger(&mut self, setting: CameraTriggerSetting) -> Result<()> {
        self.write_record(CommandId::CameraTrigger, &setting)
    }

    fn check_pattern_index(index: u8) -> Result<()> {
        if index >= MAX_PATTERNS {
            return Err(Error::InvalidParameter(format!(
                "pattern index {} is above {}",
                index,
                MAX_PATTERNS - 1
            )));
        }
        Ok(())
    }

    /// Stores a BMP image as pattern `index` of the current sequence
    pub fn define_pattern(&mut self, index: u8, path: &Path) -> Result<()> {
        Self::check_pattern_index(index)?;
        self.command(CommandId::PatternDefinition, |link| {
            link.begin(PacketKind::Write, CommandId::PatternDefinition)?;
            link.put_int(index.into(), 1)?;
            let size = link.put_file(path)?;
            log::debug!("Defining pattern {} from {:?} ({} bytes)", index, path, size);
            link.finish()
        })
    }

    /// Downloads pattern `index` into a BMP file, returns its size
    pub fn read_pattern(&mut self, index: u8, path: &Path) -> Result<u64> {
        Self::check_pattern_index(index)?;
        self.command(CommandId::PatternDefinition, |link| {
            link.send_command(PacketKind::Read, CommandId::PatternDefinition, &[index])?;
            link.get_file(path, 0)
        })
    }

    /// Starts or stops playback of the sequence stored on the device
    pub(crate) fn set_sequence_running(&mut self, running: bool) -> Result<()> {
        self.write(CommandId::PatternSequenceStart, &[running.into()])
    }

    /// Shows the next pattern, used with command triggered sequences
    pub(crate) fn send_advance(&mut self) -> Result<()> {
        self.write(CommandId::PatternSequenceAdvance, &[])
    }
}

impl LightCrafter<TcpAdapter> {
    /// Opens a TCP connection to the projector at `conf.address`
    pub fn connect(conf: LightCrafterConf) -> Result<Self> {
        let id: ConnectionId = conf.address.parse()?;
        let io = connect_tcp(&id, conf.timeout)?;
        let mut lc = Self::with_conf(io, conf);
        lc.connection = Some(id);
        Ok(lc)
    }

    pub fn disconnect(&mut self) {
        let id = self.connection.clone();
        if let Some(io) = self.close() {
            io.shutdown();
            if let Some(id) = id {
                log::info!("Disconnected from {}", id);
            }
        }
    }
}
