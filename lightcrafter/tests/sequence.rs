use claims::*;
use image::{GrayImage, Luma};
use lightcrafter::{
    bitplanes::{HEIGHT, WIDTH},
    error::DeviceError,
    flags::{LedColor, Polarity, TriggerType},
    types::CameraTriggerSetting,
    Error, LightCrafter, LightCrafterConf, Pattern, PatternData, SequenceSettings, SequenceState,
    StdIoAdapter,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use utilities::FakeProjector;

const PATTERN_DEFINITION: u16 = 0x0401;
const SEQUENCE_START: u16 = 0x0402;
const SEQUENCE_SETTING: u16 = 0x0480;

type FakeLightCrafter = LightCrafter<StdIoAdapter<FakeProjector>>;

fn projector(device: &FakeProjector) -> (FakeLightCrafter, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let conf = LightCrafterConf {
        image_basename: dir.path().join("plane"),
        ..LightCrafterConf::default()
    };
    (LightCrafter::with_conf(StdIoAdapter::new(device.clone()), conf), dir)
}

fn stripes(bit_depth: u8, count: usize) -> Vec<Pattern> {
    (0..count)
        .map(|i| {
            let img = GrayImage::from_fn(WIDTH, HEIGHT, |col, _| {
                Luma([if (col as usize >> i) & 1 == 1 { 0xFF } else { 0x00 }])
            });
            Pattern::new(bit_depth, PatternData::Image(img))
        })
        .collect()
}

fn commands(device: &FakeProjector) -> Vec<u16> {
    device.transfers().iter().map(|t| t.command).collect()
}

#[test]
fn same_range_is_uploaded_once() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    lc.prepare_sequence(stripes(1, 4), SequenceSettings::default())
        .unwrap();
    assert_eq!(lc.sequence_state(), SequenceState::Idle);

    lc.start_sequence(0, 4, false).unwrap();
    assert_eq!(lc.sequence_state(), SequenceState::Started);
    assert_eq!(
        commands(&device),
        vec![0x0101, SEQUENCE_SETTING, PATTERN_DEFINITION, SEQUENCE_SETTING, SEQUENCE_START]
    );

    device.clear_history();
    lc.start_sequence(0, 4, false).unwrap();
    let sent = device.transfers();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command, SEQUENCE_START);
    assert_eq!(sent[0].payload, vec![0x01]);
}

#[test]
fn different_range_is_uploaded_again() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    lc.prepare_sequence(stripes(1, 8), SequenceSettings::default())
        .unwrap();
    lc.start_sequence(0, 4, false).unwrap();
    device.clear_history();
    lc.start_sequence(0, 4, true).unwrap();
    assert_eq!(device.transfers_for(PATTERN_DEFINITION).len(), 1);
    device.clear_history();
    lc.start_sequence(4, 4, true).unwrap();
    assert_eq!(device.transfers_for(PATTERN_DEFINITION).len(), 1);
}

#[test]
fn upload_records() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    let settings = SequenceSettings {
        led_color: LedColor::Red,
        trigger_type: TriggerType::Command,
        trigger_delay: 100,
        exposure: 10_000,
        period: 12_000,
        camera_trigger: Some(CameraTriggerSetting {
            enabled: true,
            polarity: Polarity::ActiveLow,
            delay: 5,
            pulse_width: 50,
        }),
    };
    // 12 patterns of 2 bits fill 3 images
    lc.prepare_sequence(stripes(2, 12), settings).unwrap();
    lc.start_sequence(0, 12, true).unwrap();

    let records = device.transfers_for(SEQUENCE_SETTING);
    assert_eq!(records.len(), 2);
    // Staging record: 3 images of 8 bits, command triggered
    assert_eq!(records[0].payload[0], 8);
    assert_eq!(&records[0].payload[1..3], &[3, 0]);
    assert_eq!(records[0].payload[4], 0x00);
    // Real record
    assert_eq!(
        records[1].payload,
        vec![
            2, 12, 0, 0, 0, 100, 0, 0, 0, 0xE0, 0x2E, 0, 0, 0x10, 0x27, 0, 0, 0, 1
        ]
    );

    let images = device.transfers_for(PATTERN_DEFINITION);
    assert_eq!(images.len(), 3);
    let indices: Vec<u8> = images.iter().map(|t| t.payload[0]).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    // Payload after the index is a BMP file
    assert_eq!(&images[0].payload[1..3], b"BM");

    let camera = device.transfers_for(0x0404);
    assert_eq!(camera[0].payload, vec![1, 1, 5, 0, 0, 0, 50, 0, 0, 0]);
}

#[test]
fn validation_failure_sends_nothing() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    let mut patterns = stripes(4, 2);
    patterns[1].bit_depth = 5;
    lc.prepare_sequence(patterns, SequenceSettings::default())
        .unwrap();
    assert_matches!(
        lc.start_sequence(0, 2, false),
        Err(Error::HeterogeneousSequence {
            index: 1,
            field: "bit depth"
        })
    );
    assert!(device.transfers().is_empty());
    assert_eq!(lc.sequence_state(), SequenceState::Idle);

    let short = Pattern {
        exposure: Some(100),
        ..stripes(1, 1).remove(0)
    };
    lc.prepare_sequence(vec![short], SequenceSettings::default())
        .unwrap();
    assert_matches!(
        lc.start_sequence(0, 1, false),
        Err(Error::ExposureOutOfRange { bit_depth: 1, .. })
    );
    assert!(device.transfers().is_empty());
}

#[test]
fn failed_upload_forces_reupload() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    lc.prepare_sequence(stripes(1, 4), SequenceSettings::default())
        .unwrap();
    lc.start_sequence(0, 4, false).unwrap();

    // Second range fails half way through
    device.fail_with(PATTERN_DEFINITION, vec![4]);
    let err = lc.start_sequence(1, 3, false).unwrap_err();
    assert_eq!(err.device_error(), Some(DeviceError::OutOfResource));
    assert_eq!(lc.sequence_state(), SequenceState::Idle);

    // Even the range that was fine before goes through the full upload
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    lc.prepare_sequence(stripes(1, 4), SequenceSettings::default())
        .unwrap();
    lc.start_sequence(0, 4, false).unwrap();
    device.busy_on(SEQUENCE_SETTING);
    let err = lc.start_sequence(0, 2, false).unwrap_err();
    assert_eq!(err.device_error(), Some(DeviceError::Busy));
    device.clear_history();
    assert_err!(lc.start_sequence(0, 4, false));
    assert_eq!(commands(&device), vec![0x0101, SEQUENCE_SETTING]);
}

#[test]
fn solid_color_invalidates_upload() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    lc.prepare_sequence(stripes(1, 2), SequenceSettings::default())
        .unwrap();
    lc.start_sequence(0, 2, false).unwrap();
    lc.project_solid_white().unwrap();
    assert_eq!(lc.sequence_state(), SequenceState::Idle);
    let color = device.transfers_for(0x0106);
    assert_eq!(color[0].payload, vec![0xFF, 0xFF, 0xFF, 0x00]);
    assert_eq!(device.transfers_for(0x0101).last().unwrap().payload, vec![0x00]);

    device.clear_history();
    lc.start_sequence(0, 2, false).unwrap();
    assert_eq!(device.transfers_for(PATTERN_DEFINITION).len(), 1);
}

#[test]
fn stop_and_advance() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    lc.prepare_sequence(stripes(8, 2), SequenceSettings::default())
        .unwrap();
    lc.start_sequence(0, 2, true).unwrap();
    lc.advance_sequence().unwrap();
    lc.stop_sequence().unwrap();
    assert_eq!(lc.sequence_state(), SequenceState::Ready);
    let starts = device.transfers_for(SEQUENCE_START);
    assert_eq!(starts.last().unwrap().payload, vec![0x00]);
    assert_eq!(device.transfers_for(0x0403).len(), 1);

    // Stopped sequence restarts without upload
    device.clear_history();
    lc.start_sequence(0, 2, true).unwrap();
    assert_eq!(commands(&device), vec![SEQUENCE_START]);
}

#[test]
fn start_without_prepare() {
    let device = FakeProjector::new();
    let (mut lc, _dir) = projector(&device);
    assert_matches!(lc.start_sequence(0, 1, false), Err(Error::NoSequencePrepared));
    assert_matches!(
        lc.prepare_sequence(vec![], SequenceSettings::default()),
        Err(Error::EmptySequence)
    );
}
