use crate::{
    bitplanes::{BITPLANE_BUDGET, HEIGHT, WIDTH},
    config::SequenceSettings,
    error::{Error, Result},
    flags::{LedColor, PatternType},
};
use image::GrayImage;
use std::{borrow::Cow, path::PathBuf};

/// Shortest and longest exposure in microseconds, indexed by bit depth - 1
const EXPOSURE_BOUNDS: [(u32, u32); 8] = [
    (250, 2_000_000),
    (666, 5_000_000),
    (1_470, 5_000_000),
    (1_600, 5_000_000),
    (2_000, 5_000_000),
    (2_500, 5_000_000),
    (4_500, 5_000_000),
    (8_333, 5_000_000),
];

/// Patterns that only fill the planes with their value moved up by one bit
const PADDED_DEPTHS: [u8; 2] = [5, 7];

/// Where the pixels of a pattern come from
#[derive(Debug, Clone, PartialEq)]
pub enum PatternData {
    File(PathBuf),
    Image(GrayImage),
}

/// One monochrome image of a sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub bit_depth: u8,
    /// Sequence LED when unset
    pub color: Option<LedColor>,
    /// Sequence exposure when unset
    pub exposure: Option<u32>,
    /// Sequence period when unset
    pub period: Option<u32>,
    pub pattern_type: PatternType,
    pub data: PatternData,
}

impl Pattern {
    pub fn new(bit_depth: u8, data: PatternData) -> Self {
        Pattern {
            bit_depth,
            color: None,
            exposure: None,
            period: None,
            pattern_type: PatternType::default(),
            data,
        }
    }
}

/// Pattern with defaults applied and pixels loaded
#[derive(Debug)]
pub(crate) struct ResolvedPattern<'a> {
    pub bit_depth: u8,
    pub color: LedColor,
    pub exposure: u32,
    pub period: u32,
    pub pattern_type: PatternType,
    pub pixels: Cow<'a, GrayImage>,
}

/// Exposure range supported for a bit depth
pub fn exposure_bounds(bit_depth: u8) -> Result<(u32, u32)> {
    match bit_depth {
        1..=8 => Ok(EXPOSURE_BOUNDS[bit_depth as usize - 1]),
        _ => Err(Error::InvalidBitDepth(bit_depth)),
    }
}

/// Whether patterns of this depth are stored with one bit of padding
pub fn is_padded(bit_depth: u8) -> bool {
    PADDED_DEPTHS.contains(&bit_depth)
}

/// Bits one pattern takes in the bitplane stack
pub fn packed_depth(bit_depth: u8) -> usize {
    if is_padded(bit_depth) {
        bit_depth as usize + 1
    } else {
        bit_depth as usize
    }
}

/// Whether `count` patterns of `bit_depth` can be stored on the device at once. The device
/// keeps patterns in banks of 24 bitplanes; a sequence has to fit one bank, or split over
/// 2 or 4 banks with every bank holding whole patterns. The per bank count is truncated, as
/// the projector firmware does.
pub fn fits_budget(bit_depth: u8, count: usize) -> bool {
    let depth = bit_depth as usize;
    if depth == 0 {
        return false;
    }
    let bitplanes = match depth.checked_mul(count) {
        Some(bitplanes) if bitplanes <= BITPLANE_BUDGET => bitplanes,
        _ => return false,
    };
    if bitplanes <= 24 {
        return true;
    }
    [2, 4].iter().any(|banks| {
        let per_bank = bitplanes / banks;
        per_bank <= 24 && per_bank % depth == 0
    })
}

fn check_size(width: u32, height: u32) -> Result<()> {
    if (width, height) != (WIDTH, HEIGHT) {
        return Err(Error::InvalidImageSize {
            width,
            height,
            expected_width: WIDTH,
            expected_height: HEIGHT,
        });
    }
    Ok(())
}

/// Applies sequence defaults and checks one pattern against the hardware limits, in order:
/// bit depth, exposure range, period, pixel data.
pub(crate) fn resolve<'a>(
    pattern: &'a Pattern,
    settings: &SequenceSettings,
) -> Result<ResolvedPattern<'a>> {
    let bit_depth = pattern.bit_depth;
    let (min, max) = exposure_bounds(bit_depth)?;
    let exposure = pattern.exposure.unwrap_or(settings.exposure);
    if !(min..=max).contains(&exposure) {
        return Err(Error::ExposureOutOfRange {
            bit_depth,
            exposure,
            min,
            max,
        });
    }
    let period = pattern.period.unwrap_or(settings.period);
    if period < exposure {
        return Err(Error::PeriodShorterThanExposure { exposure, period });
    }
    let pixels = match &pattern.data {
        PatternData::File(path) => Cow::Owned(image::open(path)?.to_luma8()),
        PatternData::Image(img) => Cow::Borrowed(img),
    };
    check_size(pixels.width(), pixels.height())?;

    Ok(ResolvedPattern {
        bit_depth,
        color: pattern.color.unwrap_or(settings.led_color),
        exposure,
        period,
        pattern_type: pattern.pattern_type,
        pixels,
    })
}

/// All patterns have to share one setting record, so they must agree on everything in it
pub(crate) fn check_homogeneous(patterns: &[ResolvedPattern]) -> Result<()> {
    let first = match patterns.first() {
        Some(first) => first,
        None => return Err(Error::EmptySequence),
    };
    for (index, p) in patterns.iter().enumerate().skip(1) {
        let field = if p.bit_depth != first.bit_depth {
            "bit depth"
        } else if p.color != first.color {
            "color"
        } else if p.exposure != first.exposure {
            "exposure"
        } else if p.period != first.period {
            "period"
        } else if p.pattern_type != first.pattern_type {
            "pattern type"
        } else {
            continue;
        };
        return Err(Error::HeterogeneousSequence { index, field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    fn blank() -> PatternData {
        PatternData::Image(GrayImage::new(WIDTH, HEIGHT))
    }

    fn with_exposure(bit_depth: u8, exposure: u32) -> Pattern {
        Pattern {
            exposure: Some(exposure),
            period: Some(exposure),
            ..Pattern::new(bit_depth, blank())
        }
    }

    #[test]
    fn documented_budget_values() {
        assert!(fits_budget(1, 90));
        assert!(!fits_budget(1, 97));
        assert!(!fits_budget(8, 13));
        assert!(fits_budget(8, 12));
    }

    #[test]
    fn budget_near_boundaries() {
        assert!(fits_budget(1, 96));
        assert!(fits_budget(1, 24));
        assert!(fits_budget(1, 25));
        assert!(fits_budget(1, 91));
        assert!(fits_budget(4, 6));
        // 27 / 4 truncates to 6, which holds two 3 bit patterns
        assert!(fits_budget(3, 9));
        // 30 / 2 = 15 is divisible by 3
        assert!(fits_budget(3, 10));
        // 33 / 2 = 16 and 33 / 4 = 8 both split 3 bit patterns
        assert!(!fits_budget(3, 11));
        // 39 / 4 truncates to 9
        assert!(fits_budget(3, 13));
        // 30 / 2 = 15 and 30 / 4 = 7 are odd
        assert!(!fits_budget(2, 15));
        // 26 / 4 truncates to 6
        assert!(fits_budget(2, 13));
        // 6 * 5 = 30, banks of 15 or 7 planes split patterns
        assert!(!fits_budget(6, 5));
        // 6 * 8 = 48, 48 / 2 = 24 is divisible by 6
        assert!(fits_budget(6, 8));
        // 5 * 16 = 80, 80 / 4 = 20 is divisible by 5
        assert!(fits_budget(5, 16));
        assert!(!fits_budget(5, 17));
        assert!(!fits_budget(5, 11));
        assert!(fits_budget(7, 12));
        assert!(!fits_budget(7, 5));
        assert!(!fits_budget(2, 49));
        assert!(!fits_budget(0, 1));
    }

    #[test]
    fn budget_with_huge_count() {
        assert!(!fits_budget(8, usize::MAX / 4));
        assert!(!fits_budget(1, usize::MAX));
    }

    #[test]
    fn exposure_table_edges() {
        let settings = SequenceSettings::default();
        assert_matches!(
            resolve(&with_exposure(1, 249), &settings),
            Err(Error::ExposureOutOfRange { min: 250, .. })
        );
        assert_ok!(resolve(&with_exposure(1, 250), &settings));
        assert_matches!(
            resolve(&with_exposure(1, 2_000_001), &settings),
            Err(Error::ExposureOutOfRange {
                max: 2_000_000,
                ..
            })
        );
        assert_ok!(resolve(&with_exposure(2, 2_000_001), &settings));
        assert_err!(resolve(&with_exposure(8, 8_332), &settings));
        assert_ok!(resolve(&with_exposure(8, 8_333), &settings));
    }

    #[test]
    fn validation_order() {
        let settings = SequenceSettings::default();
        // Bad bit depth wins over a bad exposure
        assert_matches!(
            resolve(&with_exposure(9, 1), &settings),
            Err(Error::InvalidBitDepth(9))
        );
        assert_matches!(
            resolve(&with_exposure(0, 10_000), &settings),
            Err(Error::InvalidBitDepth(0))
        );
        let short_period = Pattern {
            period: Some(9_000),
            ..with_exposure(8, 10_000)
        };
        assert_matches!(
            resolve(&short_period, &settings),
            Err(Error::PeriodShorterThanExposure {
                exposure: 10_000,
                period: 9_000
            })
        );
        let missing = Pattern::new(8, PatternData::File("/nonexistent/pattern.bmp".into()));
        assert_err!(resolve(&missing, &settings));
    }

    #[test]
    fn defaults_come_from_sequence() {
        let settings = SequenceSettings {
            exposure: 5_000,
            period: 6_000,
            led_color: LedColor::Blue,
            ..SequenceSettings::default()
        };
        let pattern = Pattern::new(4, blank());
        let resolved = resolve(&pattern, &settings).unwrap();
        assert_eq!(resolved.exposure, 5_000);
        assert_eq!(resolved.period, 6_000);
        assert_eq!(resolved.color, LedColor::Blue);
    }

    #[test]
    fn image_size_must_match_device() {
        let pattern = Pattern::new(1, PatternData::Image(GrayImage::new(640, 480)));
        assert_matches!(
            resolve(&pattern, &SequenceSettings::default()),
            Err(Error::InvalidImageSize {
                width: 640,
                height: 480,
                ..
            })
        );
    }

    #[test]
    fn mixed_bit_depths_are_rejected() {
        let settings = SequenceSettings::default();
        let patterns = [Pattern::new(4, blank()), Pattern::new(5, blank())];
        let resolved: Vec<_> = patterns
            .iter()
            .map(|p| resolve(p, &settings).unwrap())
            .collect();
        assert_matches!(
            check_homogeneous(&resolved),
            Err(Error::HeterogeneousSequence {
                index: 1,
                field: "bit depth"
            })
        );
    }

    #[test]
    fn mixed_colors_are_rejected() {
        let settings = SequenceSettings::default();
        let red = Pattern {
            color: Some(LedColor::Red),
            ..Pattern::new(1, blank())
        };
        let patterns = [Pattern::new(1, blank()), Pattern::new(1, blank()), red];
        let resolved: Vec<_> = patterns
            .iter()
            .map(|p| resolve(p, &settings).unwrap())
            .collect();
        assert_matches!(
            check_homogeneous(&resolved),
            Err(Error::HeterogeneousSequence {
                index: 2,
                field: "color"
            })
        );
        assert_ok!(check_homogeneous(&resolved[..2]));
        assert_matches!(check_homogeneous(&[]), Err(Error::EmptySequence));
    }

    #[test]
    fn padded_depths() {
        assert_eq!(packed_depth(5), 6);
        assert_eq!(packed_depth(7), 8);
        assert_eq!(packed_depth(6), 6);
        assert_eq!(packed_depth(1), 1);
    }
}
