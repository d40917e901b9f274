mod cli;
mod device;

use clap::Parser;
use image::GrayImage;
use lightcrafter::{
    types::{CameraTriggerSetting, DisplaySetting, LedCurrent},
    Pattern, PatternData, SequenceSettings,
};
use simple_eyre::{eyre::WrapErr, Result};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use cli::*;
use device::DeviceConf;

fn main() -> Result<()> {
    simple_eyre::install()?;
    let cli = Cli::parse();
    env_logger::init();

    match &cli.command {
        Commands::Revision(conf) => get_revision(conf),
        Commands::DisplayMode(subcomm) => match &subcomm.command {
            DisplayModeCommands::Get(conf) => get_display_mode(conf),
            DisplayModeCommands::Set(conf) => set_display_mode(conf),
        },
        Commands::TestPattern(subcomm) => match &subcomm.command {
            TestPatternCommands::Get(conf) => get_test_pattern(conf),
            TestPatternCommands::Set(conf) => set_test_pattern(conf),
        },
        Commands::LedCurrent(subcomm) => match &subcomm.command {
            LedCurrentCommands::Get(conf) => get_led_current(conf),
            LedCurrentCommands::Set(conf) => set_led_current(conf),
        },
        Commands::Power(conf) => set_power(conf),
        Commands::StaticImage(conf) => set_static_image(conf),
        Commands::StaticColor(conf) => set_static_color(conf),
        Commands::Solid(subcomm) => match &subcomm.command {
            SolidCommands::White(conf) => conf.open_lightcrafter()?.project_solid_white().map_err(Into::into),
            SolidCommands::Black(conf) => conf.open_lightcrafter()?.project_solid_black().map_err(Into::into),
        },
        Commands::DisplaySetting(subcomm) => match &subcomm.command {
            DisplaySettingCommands::Get(conf) => get_display_setting(conf),
            DisplaySettingCommands::Set(conf) => set_display_setting(conf),
        },
        Commands::CameraTrigger(subcomm) => match &subcomm.command {
            CameraTriggerCommands::Get(conf) => get_camera_trigger(conf),
            CameraTriggerCommands::Set(conf) => set_camera_trigger(conf),
        },
        Commands::Sequence(subcomm) => match &subcomm.command {
            SequenceCommands::Play(conf) => play_sequence(conf),
            SequenceCommands::Stop(conf) => conf.open_lightcrafter()?.stop_sequence().map_err(Into::into),
            SequenceCommands::Advance(conf) => conf.open_lightcrafter()?.advance_sequence().map_err(Into::into),
            SequenceCommands::Settings(conf) => get_sequence_settings(conf),
        },
        Commands::Pattern(subcomm) => match &subcomm.command {
            PatternCommands::Download(conf) => download_pattern(conf),
        },
    }
}

/// Returns std::io::Write stream with coloring enabled if program is run interactively
fn get_stdout() -> StandardStream {
    StandardStream::stdout(if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

/// Prints a highlighted title followed by plain content
fn print_titled(title: &str, content: &str) -> Result<()> {
    let mut stdout = get_stdout();
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    writeln!(&mut stdout, "{}", title)?;
    stdout.reset()?;
    writeln!(&mut stdout, "{}", content)?;
    Ok(())
}

fn get_revision(conf: &RevisionConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    let revision = lc.get_revision(conf.target)?;
    print_titled(&format!("{:?} revision:", conf.target), &revision)
}

fn get_display_mode(conf: &DeviceConf) -> Result<()> {
    let mut lc = conf.open_lightcrafter()?;
    println!("Current display mode: {}", lc.get_display_mode()?);
    Ok(())
}

fn set_display_mode(conf: &SetDisplayModeConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_display_mode(conf.mode)?;
    Ok(())
}

fn get_test_pattern(conf: &DeviceConf) -> Result<()> {
    let mut lc = conf.open_lightcrafter()?;
    println!("Current test pattern: {}", lc.get_test_pattern()?);
    Ok(())
}

fn set_test_pattern(conf: &SetTestPatternConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_test_pattern(conf.pattern)?;
    Ok(())
}

fn get_led_current(conf: &DeviceConf) -> Result<()> {
    let mut lc = conf.open_lightcrafter()?;
    println!("LED current: {}", lc.get_led_current()?);
    Ok(())
}

fn set_led_current(conf: &SetLedCurrentConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_led_current(LedCurrent {
        red: conf.red,
        green: conf.green,
        blue: conf.blue,
    })?;
    Ok(())
}

fn set_power(conf: &PowerConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_power_mode(conf.mode)?;
    Ok(())
}

fn set_static_image(conf: &StaticImageConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_static_image(&conf.image)
        .wrap_err_with(|| format!("Could not upload {:?}", conf.image))
}

fn set_static_color(conf: &StaticColorConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_static_color(conf.color)?;
    Ok(())
}

fn get_display_setting(conf: &DeviceConf) -> Result<()> {
    let mut lc = conf.open_lightcrafter()?;
    print_titled("Display setting:", &lc.get_display_setting()?.to_string())
}

fn set_display_setting(conf: &SetDisplaySettingConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_display_setting(DisplaySetting {
        long_axis_flip: conf.long_axis_flip,
        short_axis_flip: conf.short_axis_flip,
        rotate: conf.rotate,
    })?;
    Ok(())
}

fn camera_trigger(enabled: bool, args: &CameraTriggerArgs) -> CameraTriggerSetting {
    CameraTriggerSetting {
        enabled,
        polarity: args.polarity,
        delay: args.trigger_delay_us,
        pulse_width: args.pulse_width_us,
    }
}

fn get_camera_trigger(conf: &DeviceConf) -> Result<()> {
    let mut lc = conf.open_lightcrafter()?;
    print_titled("Camera trigger:", &lc.get_camera_trigger()?.to_string())
}

fn set_camera_trigger(conf: &SetCameraTriggerConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    lc.set_camera_trigger(camera_trigger(!conf.disable, &conf.trigger))?;
    Ok(())
}

fn sequence_settings(conf: &PlayConf) -> SequenceSettings {
    SequenceSettings {
        led_color: conf.led,
        trigger_type: conf.trigger,
        trigger_delay: conf.delay_us,
        exposure: conf.exposure_us,
        period: conf.period_us,
        camera_trigger: conf
            .camera_trigger
            .then(|| camera_trigger(true, &conf.camera)),
    }
}

fn play_sequence(conf: &PlayConf) -> Result<()> {
    let patterns: Vec<Pattern> = conf
        .patterns
        .iter()
        .map(|path| Pattern::new(conf.bit_depth, PatternData::File(path.clone())))
        .collect();
    let count = patterns.len();
    let mut lc = conf.device.open_lightcrafter()?;
    lc.prepare_sequence(patterns, sequence_settings(conf))?;
    lc.start_sequence(0, count, conf.repeat)
        .wrap_err("Could not start pattern sequence")?;
    log::info!("Playing {} patterns", count);
    Ok(())
}

fn get_sequence_settings(conf: &DeviceConf) -> Result<()> {
    let mut lc = conf.open_lightcrafter()?;
    print_titled(
        "Pattern sequence settings:",
        &lc.get_pattern_sequence_setting()?.to_string(),
    )
}

fn download_pattern(conf: &DownloadPatternConf) -> Result<()> {
    let mut lc = conf.device.open_lightcrafter()?;
    let size = lc.read_pattern(conf.index, &conf.output)?;
    log::debug!("Stored {} bytes into {:?}", size, conf.output);
    let img: GrayImage = image::open(&conf.output)
        .wrap_err("Projector returned an unreadable image")?
        .to_luma8();
    println!(
        "Pattern {} ({}x{}) saved to {:?}",
        conf.index,
        img.width(),
        img.height(),
        conf.output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightcrafter::flags::{LedColor, Polarity, TriggerType};
    use std::path::PathBuf;

    fn play_args(extra: &[&str]) -> PlayConf {
        let mut args = vec!["lightcrafter_cli", "sequence", "play", "a.bmp", "b.bmp"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Sequence(SequenceCommand {
                command: SequenceCommands::Play(conf),
            }) => conf,
            _ => panic!("parsed into a different command"),
        }
    }

    #[test]
    fn play_defaults() {
        let conf = play_args(&[]);
        assert_eq!(conf.patterns, vec![PathBuf::from("a.bmp"), PathBuf::from("b.bmp")]);
        let settings = sequence_settings(&conf);
        assert_eq!(settings, SequenceSettings::default());
    }

    #[test]
    fn play_with_camera_trigger() {
        let conf = play_args(&[
            "--led",
            "red",
            "--trigger",
            "command",
            "--camera-trigger",
            "--polarity",
            "active-low",
            "--pulse-width-us",
            "0x20",
        ]);
        let settings = sequence_settings(&conf);
        assert_eq!(settings.led_color, LedColor::Red);
        assert_eq!(settings.trigger_type, TriggerType::Command);
        assert_eq!(
            settings.camera_trigger,
            Some(CameraTriggerSetting {
                enabled: true,
                polarity: Polarity::ActiveLow,
                delay: 0,
                pulse_width: 32,
            })
        );
    }
}
