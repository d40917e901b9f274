use criterion::{criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use lightcrafter::{
    bitplanes::{BitplaneImage, HEIGHT, WIDTH},
    packet::Packet,
};
use manifest_dir_macros::exist_relative_path;
use utilities::parse_hex_str;

const REVISION_RESPONSE: &'static str = include_str!(exist_relative_path!("resources/test/revision_response.txt"));

fn bench_decoding_packets(c: &mut Criterion) {
    let (_, packet) = parse_hex_str(REVISION_RESPONSE).expect("Could not parse hex file");
    c.bench_function("revision packet", |b| b.iter(|| Packet::decode(&packet)));
}

fn bench_packing_bitplanes(c: &mut Criterion) {
    let img = GrayImage::from_fn(WIDTH, HEIGHT, |col, row| Luma([(col ^ row) as u8]));
    let mut planes = BitplaneImage::new();
    c.bench_function("pack 4 bit pattern", |b| {
        b.iter(|| {
            for (col, row, px) in img.enumerate_pixels() {
                planes.add(col, row, 36, 4, px.0[0]);
            }
        })
    });
}

criterion_group!(benches, bench_decoding_packets, bench_packing_bitplanes);
criterion_main!(benches);
