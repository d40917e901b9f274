use crate::device::DeviceConf;
use clap::{Args, Parser, Subcommand};
use lightcrafter::flags::{
    list_values, Code, DisplayMode, LedColor, Polarity, PowerMode, RevisionTarget, TestPattern,
    TriggerType,
};
use num_traits::FromPrimitive;
use simple_eyre::{eyre::eyre, Result};
use std::{fmt::Debug, path::PathBuf};
use strum::IntoEnumIterator;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Get revision of a projector component
    Revision(RevisionConf),
    /// What the projector is showing
    DisplayMode(DisplayModeCommand),
    /// Built-in test patterns
    TestPattern(TestPatternCommand),
    /// LED driver currents
    LedCurrent(LedCurrentCommand),
    /// Switch between normal operation and standby
    Power(PowerConf),
    /// Upload a 608x684 BMP shown in static image mode
    StaticImage(StaticImageConf),
    /// Fill the static image with a single color
    StaticColor(StaticColorConf),
    /// Project a solid white or black image
    Solid(SolidCommand),
    /// Image flip and rotation
    DisplaySetting(DisplaySettingCommand),
    /// Camera trigger output
    CameraTrigger(CameraTriggerCommand),
    /// Pattern sequence playback
    Sequence(SequenceCommand),
    /// Patterns stored on the projector
    Pattern(PatternCommand),
}

/// Parses an enum either by its name, ignoring case, dashes and underscores, or by its code
fn parse_code<T: Code + IntoEnumIterator + Debug>(s: &str) -> Result<T> {
    let normalized: String = s
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase();
    if let Some(v) = T::iter().find(|v| format!("{:?}", v).to_lowercase() == normalized) {
        return Ok(v);
    }
    parse_int(s)
        .ok()
        .and_then(|n| u8::try_from(n).ok())
        .and_then(T::from_u8)
        .ok_or_else(|| eyre!("Invalid {} {:?}, expected one of: {}", T::NAME, s, list_values::<T>()))
}

/// Parses decimal or 0x prefixed hex numbers
fn parse_int(s: &str) -> Result<u32> {
    let s = s.trim();
    let res = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    res.map_err(|e| eyre!("Invalid number {:?}: {}", s, e))
}

/// Parses `#RRGGBB`, `0xRRGGBB` or `RRGGBB`
fn parse_rgb(s: &str) -> Result<u32> {
    let hex = s
        .trim()
        .trim_start_matches('#')
        .trim_start_matches("0x");
    if hex.len() != 6 {
        return Err(eyre!("Color should have 6 hex digits, got {:?}", s));
    }
    u32::from_str_radix(hex, 16).map_err(|e| eyre!("Invalid color {:?}: {}", s, e))
}

#[derive(Args)]
pub struct RevisionConf {
    /// One of: controller, fpga, msp430
    #[clap(value_parser = parse_code::<RevisionTarget>, default_value = "controller")]
    pub target: RevisionTarget,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct DisplayModeCommand {
    #[clap(subcommand)]
    pub command: DisplayModeCommands,
}

#[derive(Subcommand)]
pub enum DisplayModeCommands {
    /// Get current display mode
    Get(DeviceConf),
    /// Set display mode
    Set(SetDisplayModeConf),
}

#[derive(Args)]
pub struct SetDisplayModeConf {
    /// One of: static-image, internal-test-pattern, pattern-sequence
    #[clap(value_parser = parse_code::<DisplayMode>)]
    pub mode: DisplayMode,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct TestPatternCommand {
    #[clap(subcommand)]
    pub command: TestPatternCommands,
}

#[derive(Subcommand)]
pub enum TestPatternCommands {
    /// Get selected test pattern
    Get(DeviceConf),
    /// Select a test pattern
    Set(SetTestPatternConf),
}

#[derive(Args)]
pub struct SetTestPatternConf {
    /// Pattern name, e.g. checkerboard or vertical-ramp, or its code
    #[clap(value_parser = parse_code::<TestPattern>)]
    pub pattern: TestPattern,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct LedCurrentCommand {
    #[clap(subcommand)]
    pub command: LedCurrentCommands,
}

#[derive(Subcommand)]
pub enum LedCurrentCommands {
    /// Get LED currents
    Get(DeviceConf),
    /// Set LED currents, each in 0..=1024
    Set(SetLedCurrentConf),
}

#[derive(Args)]
pub struct SetLedCurrentConf {
    #[clap(value_parser)]
    pub red: u16,
    #[clap(value_parser)]
    pub green: u16,
    #[clap(value_parser)]
    pub blue: u16,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct PowerConf {
    /// normal or standby
    #[clap(value_parser = parse_code::<PowerMode>)]
    pub mode: PowerMode,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct StaticImageConf {
    #[clap(value_parser, value_hint = clap::ValueHint::FilePath)]
    pub image: PathBuf,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct StaticColorConf {
    /// Color as #RRGGBB
    #[clap(value_parser = parse_rgb)]
    pub color: u32,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct SolidCommand {
    #[clap(subcommand)]
    pub command: SolidCommands,
}

#[derive(Subcommand)]
pub enum SolidCommands {
    White(DeviceConf),
    Black(DeviceConf),
}

#[derive(Args)]
pub struct DisplaySettingCommand {
    #[clap(subcommand)]
    pub command: DisplaySettingCommands,
}

#[derive(Subcommand)]
pub enum DisplaySettingCommands {
    /// Get flip and rotation
    Get(DeviceConf),
    /// Set flip and rotation, omitted flags are turned off
    Set(SetDisplaySettingConf),
}

#[derive(Args)]
pub struct SetDisplaySettingConf {
    #[clap(long)]
    pub long_axis_flip: bool,
    #[clap(long)]
    pub short_axis_flip: bool,
    #[clap(long)]
    pub rotate: bool,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct CameraTriggerCommand {
    #[clap(subcommand)]
    pub command: CameraTriggerCommands,
}

#[derive(Subcommand)]
pub enum CameraTriggerCommands {
    /// Get camera trigger configuration
    Get(DeviceConf),
    /// Configure camera trigger
    Set(SetCameraTriggerConf),
}

#[derive(Args)]
pub struct CameraTriggerArgs {
    /// active-high or active-low
    #[clap(long, value_parser = parse_code::<Polarity>, default_value = "active-high")]
    pub polarity: Polarity,
    /// Microseconds from pattern start to trigger pulse
    #[clap(long, value_parser = parse_int, default_value = "0")]
    pub trigger_delay_us: u32,
    /// Trigger pulse width in microseconds
    #[clap(long, value_parser = parse_int, default_value = "100")]
    pub pulse_width_us: u32,
}

#[derive(Args)]
pub struct SetCameraTriggerConf {
    /// Turn the trigger output off
    #[clap(long)]
    pub disable: bool,
    #[clap(flatten)]
    pub trigger: CameraTriggerArgs,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct SequenceCommand {
    #[clap(subcommand)]
    pub command: SequenceCommands,
}

#[derive(Subcommand)]
pub enum SequenceCommands {
    /// Upload patterns and start playing them
    Play(PlayConf),
    /// Stop playback
    Stop(DeviceConf),
    /// Show next pattern of a command triggered sequence
    Advance(DeviceConf),
    /// Get sequence settings stored on the projector
    Settings(DeviceConf),
}

#[derive(Args)]
pub struct PlayConf {
    /// 608x684 images, in playback order
    #[clap(value_parser, required = true, value_hint = clap::ValueHint::FilePath)]
    pub patterns: Vec<PathBuf>,
    /// Bits per pixel, 1 to 8
    #[clap(short, long, value_parser, default_value_t = 1)]
    pub bit_depth: u8,
    /// Exposure of every pattern in microseconds
    #[clap(long, value_parser = parse_int, default_value = "16667")]
    pub exposure_us: u32,
    /// Time between patterns in microseconds
    #[clap(long, value_parser = parse_int, default_value = "16667")]
    pub period_us: u32,
    /// red, green or blue
    #[clap(long, value_parser = parse_code::<LedColor>, default_value = "green")]
    pub led: LedColor,
    /// What advances the sequence: auto, command, external-positive, ...
    #[clap(long, value_parser = parse_code::<TriggerType>, default_value = "auto")]
    pub trigger: TriggerType,
    /// Delay after an external trigger in microseconds
    #[clap(long, value_parser = parse_int, default_value = "0")]
    pub delay_us: u32,
    /// Loop until stopped
    #[clap(short, long)]
    pub repeat: bool,
    /// Drive the camera trigger output while playing
    #[clap(long)]
    pub camera_trigger: bool,
    #[clap(flatten)]
    pub camera: CameraTriggerArgs,
    #[clap(flatten)]
    pub device: DeviceConf,
}

#[derive(Args)]
pub struct PatternCommand {
    #[clap(subcommand)]
    pub command: PatternCommands,
}

#[derive(Subcommand)]
pub enum PatternCommands {
    /// Save a stored pattern as BMP
    Download(DownloadPatternConf),
}

#[derive(Args)]
pub struct DownloadPatternConf {
    #[clap(value_parser)]
    pub index: u8,
    /// Path to a file where the pattern should be stored
    #[clap(short, long, value_parser, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
    #[clap(flatten)]
    pub device: DeviceConf,
}
