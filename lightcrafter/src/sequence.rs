//! Pattern sequence compilation and playback.
//!
//! Starting a sequence validates the requested patterns, packs them into bitplane images,
//! uploads the images together with a sequence setting record and starts playback. The last
//! uploaded range is remembered, starting it again only sends the start command.

use crate::{
    bitplanes::{BitplaneImage, BITPLANE_BUDGET},
    config::SequenceSettings,
    error::{Error, Result},
    flags::{DisplayMode, LedColor, PatternType, TriggerType},
    io_adapter::IoAdapter,
    lightcrafter::LightCrafter,
    pattern::{check_homogeneous, exposure_bounds, fits_budget, is_padded, packed_depth, resolve, Pattern, ResolvedPattern},
    types::PatternSequenceSetting,
};
use scopeguard::{guard, ScopeGuard};
use std::path::{Path, PathBuf};

/// Bit depth of the packed images, as the device sees them while they are uploaded
const IMAGE_BIT_DEPTH: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceState {
    /// Nothing uploaded, or the upload is no longer valid
    #[default]
    Idle,
    Validating,
    Packing,
    Uploading,
    /// Uploaded and stopped
    Ready,
    Started,
}

/// Slice of the prepared patterns that was uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceRange {
    start: usize,
    count: usize,
    repeat: bool,
}

/// Output of validation and packing, ready to be uploaded
#[derive(Debug)]
pub(crate) struct CompiledSequence {
    pub images: Vec<PathBuf>,
    pub setting: PatternSequenceSetting,
}

#[derive(Default)]
pub(crate) struct SequenceCompiler {
    patterns: Vec<Pattern>,
    settings: SequenceSettings,
    state: SequenceState,
    previous: Option<SequenceRange>,
    // Allocated on first use
    planes: Option<BitplaneImage>,
}

impl SequenceCompiler {
    fn prepare(&mut self, patterns: Vec<Pattern>, settings: SequenceSettings) {
        self.patterns = patterns;
        self.settings = settings;
        self.invalidate();
    }

    /// Forgets what was uploaded, the next start goes through the full upload
    pub(crate) fn invalidate(&mut self) {
        self.previous = None;
        self.state = SequenceState::Idle;
    }

    fn range(&self, start: usize, count: usize, repeat: bool) -> Result<SequenceRange> {
        let len = self.patterns.len();
        if len == 0 {
            return Err(Error::NoSequencePrepared);
        }
        match start.checked_add(count) {
            Some(end) if count > 0 && end <= len => Ok(SequenceRange {
                start,
                count,
                repeat,
            }),
            _ => Err(Error::InvalidSequenceRange {
                start,
                end: start.saturating_add(count),
                len,
            }),
        }
    }

    fn is_loaded(&self, range: SequenceRange) -> bool {
        matches!(self.state, SequenceState::Ready | SequenceState::Started)
            && self.previous == Some(range)
    }

    /// Validates the patterns of `range` and writes their packed images next to `basename`
    fn compile(&mut self, range: SequenceRange, basename: &Path) -> Result<CompiledSequence> {
        self.state = SequenceState::Validating;
        let patterns = &self.patterns[range.start..range.start + range.count];
        let resolved = patterns
            .iter()
            .map(|p| resolve(p, &self.settings))
            .collect::<Result<Vec<_>>>()?;
        check_homogeneous(&resolved)?;
        let first = &resolved[0];
        if !fits_budget(first.bit_depth, resolved.len()) {
            return Err(Error::ExceedsBitplaneBudget {
                bit_depth: first.bit_depth,
                count: resolved.len(),
            });
        }

        self.state = SequenceState::Packing;
        let planes = self.planes.get_or_insert_with(BitplaneImage::new);
        pack(planes, &resolved)?;
        let images = planes.save_all(basename)?;
        log::debug!(
            "Packed {} patterns of bit depth {} into {} images",
            resolved.len(),
            first.bit_depth,
            images.len()
        );

        let max_patterns = BITPLANE_BUDGET / first.bit_depth as usize;
        Ok(CompiledSequence {
            images,
            setting: PatternSequenceSetting {
                bit_depth: first.bit_depth,
                pattern_count: max_patterns.min(range.count) as u16,
                pattern_type: first.pattern_type,
                trigger_type: self.settings.trigger_type,
                trigger_delay: self.settings.trigger_delay,
                trigger_period: first.period,
                exposure: first.exposure,
                led_color: first.color,
                repeat: range.repeat,
            },
        })
    }
}

/// Packs every pattern into consecutive bits of the stack, in sequence order
pub(crate) fn pack(planes: &mut BitplaneImage, patterns: &[ResolvedPattern]) -> Result<()> {
    planes.clear();
    for (index, pattern) in patterns.iter().enumerate() {
        let depth = packed_depth(pattern.bit_depth);
        let offset = index * depth;
        let mask = ((1u16 << pattern.bit_depth) - 1) as u8;
        let shift = u8::from(is_padded(pattern.bit_depth));
        for (col, row, px) in pattern.pixels.enumerate_pixels() {
            let value = (px.0[0] & mask) << shift;
            if !planes.add(col, row, offset, depth, value) {
                return Err(Error::ExceedsBitplaneBudget {
                    bit_depth: pattern.bit_depth,
                    count: patterns.len(),
                });
            }
        }
    }
    Ok(())
}

/// Record accepting every uploaded image as one 8 bit pattern
fn staging_setting(images: usize, led_color: LedColor) -> Result<PatternSequenceSetting> {
    let (exposure, _) = exposure_bounds(IMAGE_BIT_DEPTH)?;
    Ok(PatternSequenceSetting {
        bit_depth: IMAGE_BIT_DEPTH,
        pattern_count: images as u16,
        pattern_type: PatternType::Normal,
        trigger_type: TriggerType::Command,
        trigger_delay: 0,
        trigger_period: exposure,
        exposure,
        led_color,
        repeat: false,
    })
}

impl<IO: IoAdapter> LightCrafter<IO> {
    /// Replaces the patterns available to `start_sequence`
    pub fn prepare_sequence(&mut self, patterns: Vec<Pattern>, settings: SequenceSettings) -> Result<()> {
        if patterns.is_empty() {
            return Err(Error::EmptySequence);
        }
        log::debug!("Prepared sequence of {} patterns", patterns.len());
        self.sequence.prepare(patterns, settings);
        Ok(())
    }

    pub fn sequence_state(&self) -> SequenceState {
        self.sequence.state
    }

    /// Plays `count` prepared patterns beginning at `start`. Uploads them unless the same
    /// range is already on the device.
    pub fn start_sequence(&mut self, start: usize, count: usize, repeat: bool) -> Result<()> {
        let range = self.sequence.range(start, count, repeat)?;
        if self.sequence.is_loaded(range) {
            log::info!("Patterns {}..{} already uploaded, starting", start, start + count);
            self.set_sequence_running(true)?;
            self.sequence.state = SequenceState::Started;
            return Ok(());
        }

        // Any failure from here on leaves the device in an unknown state
        let mut lc = guard(self, |lc| lc.sequence.invalidate());
        lc.sequence.invalidate();
        let basename = lc.conf.image_basename.clone();
        let compiled = lc.sequence.compile(range, &basename)?;
        log::info!(
            "Uploading patterns {}..{} as {} images",
            start,
            start + count,
            compiled.images.len()
        );
        lc.sequence.state = SequenceState::Uploading;
        lc.upload(&compiled)?;
        lc.set_sequence_running(true)?;

        let lc = ScopeGuard::into_inner(lc);
        lc.sequence.previous = Some(range);
        lc.sequence.state = SequenceState::Started;
        Ok(())
    }

    fn upload(&mut self, compiled: &CompiledSequence) -> Result<()> {
        self.set_display_mode(DisplayMode::PatternSequence)?;
        self.set_pattern_sequence_setting(staging_setting(
            compiled.images.len(),
            compiled.setting.led_color,
        )?)?;
        for (index, path) in compiled.images.iter().enumerate() {
            self.define_pattern(index as u8, path)?;
        }
        self.set_pattern_sequence_setting(compiled.setting)?;
        if let Some(camera) = self.sequence.settings.camera_trigger {
            self.set_camera_trigger(camera)?;
        }
        Ok(())
    }

    pub fn stop_sequence(&mut self) -> Result<()> {
        self.set_sequence_running(false)?;
        if self.sequence.state == SequenceState::Started {
            self.sequence.state = SequenceState::Ready;
        }
        Ok(())
    }

    /// Moves a command triggered sequence to its next pattern
    pub fn advance_sequence(&mut self) -> Result<()> {
        self.send_advance()
    }

    /// Fills the whole image with one `0xRRGGBB` color. Any uploaded sequence has to be
    /// uploaded again afterwards.
    pub fn project_solid_color(&mut self, rgb: u32) -> Result<()> {
        self.sequence.invalidate();
        self.set_display_mode(DisplayMode::StaticImage)?;
        self.set_static_color(rgb)
    }

    pub fn project_solid_white(&mut self) -> Result<()> {
        self.project_solid_color(0xFF_FFFF)
    }

    pub fn project_solid_black(&mut self) -> Result<()> {
        self.project_solid_color(0x00_0000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bitplanes::{HEIGHT, WIDTH},
        pattern::PatternData,
    };
    use claims::*;
    use image::{GrayImage, Luma};
    use pretty_assertions::assert_eq;

    fn filled(value: u8) -> PatternData {
        PatternData::Image(GrayImage::from_pixel(WIDTH, HEIGHT, Luma([value])))
    }

    fn compiler(patterns: Vec<Pattern>) -> SequenceCompiler {
        let mut compiler = SequenceCompiler::default();
        compiler.prepare(patterns, SequenceSettings::default());
        compiler
    }

    fn first_pixels(compiler: &SequenceCompiler) -> Vec<u8> {
        let planes = compiler.planes.as_ref().unwrap();
        (0..planes.used_planes())
            .map(|i| planes.plane(i).unwrap().get_pixel(0, 0).0[0])
            .collect()
    }

    #[test]
    fn one_bit_patterns_fill_consecutive_bits() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = (0..10)
            .map(|i| Pattern::new(1, filled(if i % 3 == 0 { 0xFF } else { 0x00 })))
            .collect();
        let mut compiler = compiler(patterns);
        let range = compiler.range(0, 10, false).unwrap();
        let compiled = compiler.compile(range, &dir.path().join("p")).unwrap();
        assert_eq!(compiled.images.len(), 2);
        // Patterns 0, 3, 6, 9 are lit
        assert_eq!(first_pixels(&compiler), vec![0b0100_1001, 0b10]);
        assert_eq!(compiled.setting.bit_depth, 1);
        assert_eq!(compiled.setting.pattern_count, 10);
    }

    #[test]
    fn padded_depth_moves_values_up() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = vec![Pattern::new(5, filled(0b1_0011)), Pattern::new(5, filled(0xFF))];
        let mut compiler = compiler(patterns);
        let range = compiler.range(0, 2, true).unwrap();
        let compiled = compiler.compile(range, &dir.path().join("p")).unwrap();
        // 0b10011 << 1 in bits 0..6, 0b11111 << 1 in bits 6..12
        assert_eq!(first_pixels(&compiler), vec![0b1010_0110, 0b1111]);
        assert!(compiled.setting.repeat);
        assert_eq!(compiled.setting.bit_depth, 5);
    }

    #[test]
    fn unpadded_depth_is_tight() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = vec![Pattern::new(3, filled(0b101)), Pattern::new(3, filled(0b011))];
        let mut compiler = compiler(patterns);
        let range = compiler.range(0, 2, false).unwrap();
        compiler.compile(range, &dir.path().join("p")).unwrap();
        assert_eq!(first_pixels(&compiler), vec![0b011_101]);
    }

    #[test]
    fn sub_range_is_validated_alone() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = vec![
            Pattern::new(2, filled(1)),
            Pattern::new(4, filled(1)),
            Pattern::new(4, filled(2)),
        ];
        let mut compiler = compiler(patterns);
        let whole = compiler.range(0, 3, false).unwrap();
        assert_matches!(
            compiler.compile(whole, &dir.path().join("p")),
            Err(Error::HeterogeneousSequence { index: 1, .. })
        );
        let tail = compiler.range(1, 2, false).unwrap();
        assert_ok!(compiler.compile(tail, &dir.path().join("p")));
    }

    #[test]
    fn too_many_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = (0..13).map(|_| Pattern::new(8, filled(0))).collect();
        let mut compiler = compiler(patterns);
        let range = compiler.range(0, 13, false).unwrap();
        assert_matches!(
            compiler.compile(range, &dir.path().join("p")),
            Err(Error::ExceedsBitplaneBudget {
                bit_depth: 8,
                count: 13
            })
        );
        // Validation failed before anything was packed
        assert!(compiler.planes.is_none());
    }

    #[test]
    fn range_checks() {
        let empty = SequenceCompiler::default();
        assert_matches!(empty.range(0, 1, false), Err(Error::NoSequencePrepared));
        let compiler = compiler(vec![Pattern::new(1, filled(0)); 3]);
        assert_ok!(compiler.range(2, 1, false));
        assert_matches!(
            compiler.range(2, 2, false),
            Err(Error::InvalidSequenceRange {
                start: 2,
                end: 4,
                len: 3
            })
        );
        assert_err!(compiler.range(0, 0, false));
        assert_err!(compiler.range(usize::MAX, 2, false));
    }
}
