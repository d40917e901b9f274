//! Stack of 8 bit planes holding packed 1 bit patterns.
//!
//! Bit `n` of the stack lives in plane `n / 8`, at bit `n % 8` of every pixel. A value of
//! several bits may straddle two neighbouring planes.

use crate::error::Result;
use image::{GrayImage, ImageFormat, Luma};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// DMD columns
pub const WIDTH: u32 = 608;
/// DMD rows
pub const HEIGHT: u32 = 684;
/// Total number of 1 bit patterns the device holds
pub const BITPLANE_BUDGET: usize = 96;
pub const PLANE_COUNT: usize = BITPLANE_BUDGET / 8;

pub struct BitplaneImage {
    planes: Vec<GrayImage>,
    /// Number of planes touched since the last `clear`
    used: usize,
}

impl Default for BitplaneImage {
    fn default() -> Self {
        Self::new()
    }
}

impl BitplaneImage {
    pub fn new() -> Self {
        BitplaneImage {
            planes: (0..PLANE_COUNT)
                .map(|_| GrayImage::new(WIDTH, HEIGHT))
                .collect(),
            used: 0,
        }
    }

    /// ORs the low `bit_count` bits of `value` into the stack starting at bit `bit_offset`.
    /// Returns false without touching anything when the bits do not fit.
    pub fn add(&mut self, col: u32, row: u32, bit_offset: usize, bit_count: usize, value: u8) -> bool {
        if bit_offset + bit_count > BITPLANE_BUDGET || bit_count > 8 || col >= WIDTH || row >= HEIGHT {
            return false;
        }
        if bit_count == 0 {
            return true;
        }
        let mask = ((1u16 << bit_count) - 1) as u8;
        let shifted = u16::from(value & mask) << (bit_offset % 8);
        let plane = bit_offset / 8;

        self.planes[plane].get_pixel_mut(col, row).0[0] |= shifted as u8;
        let overflow = (shifted >> 8) as u8;
        if (bit_offset % 8) + bit_count > 8 {
            self.planes[plane + 1].get_pixel_mut(col, row).0[0] |= overflow;
            self.used = self.used.max(plane + 2);
        } else {
            self.used = self.used.max(plane + 1);
        }
        true
    }

    pub fn clear(&mut self) {
        for plane in self.planes.iter_mut() {
            for px in plane.pixels_mut() {
                *px = Luma([0]);
            }
        }
        self.used = 0;
    }

    /// Number of planes holding packed bits
    pub fn used_planes(&self) -> usize {
        self.used
    }

    pub fn plane(&self, index: usize) -> Option<&GrayImage> {
        self.planes[..self.used].get(index)
    }

    /// Writes every used plane as `<basename><index>.bmp`, stopping at the first failure.
    /// Files already written are left in place.
    pub fn save_all(&self, basename: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.used);
        for (i, plane) in self.planes[..self.used].iter().enumerate() {
            let mut name = OsString::from(basename.as_os_str());
            name.push(format!("{}.bmp", i));
            let path = PathBuf::from(name);
            plane.save_with_format(&path, ImageFormat::Bmp)?;
            log::trace!("Saved bitplane image {:?}", path);
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;
    use pretty_assertions::assert_eq;

    fn px(img: &BitplaneImage, plane: usize, col: u32, row: u32) -> u8 {
        img.planes[plane].get_pixel(col, row).0[0]
    }

    #[test]
    fn pack_within_one_plane() {
        let mut img = BitplaneImage::new();
        assert!(img.add(3, 4, 2, 3, 0b101));
        assert_eq!(px(&img, 0, 3, 4), 0b1_0100);
        assert_eq!(img.used_planes(), 1);
        // Bits above bit_count are masked away
        assert!(img.add(3, 4, 5, 2, 0xFF));
        assert_eq!(px(&img, 0, 3, 4), 0b111_0100);
    }

    #[test]
    fn pack_across_planes() {
        let mut img = BitplaneImage::new();
        assert!(img.add(0, 0, 6, 4, 0b1011));
        assert_eq!(px(&img, 0, 0, 0), 0b1100_0000);
        assert_eq!(px(&img, 1, 0, 0), 0b10);
        assert_eq!(img.used_planes(), 2);
    }

    #[test]
    fn rejected_adds_do_not_mutate() {
        let mut img = BitplaneImage::new();
        assert!(!img.add(0, 0, 90, 7, 0xFF));
        assert!(!img.add(0, 0, 0, 9, 0xFF));
        assert!(!img.add(WIDTH, 0, 0, 1, 1));
        assert!(!img.add(0, HEIGHT, 0, 1, 1));
        assert_eq!(img.used_planes(), 0);
        assert!(img.planes.iter().all(|p| p.pixels().all(|v| v.0[0] == 0)));
        // Last bit of the budget is still reachable
        assert!(img.add(0, 0, 95, 1, 1));
        assert_eq!(px(&img, 11, 0, 0), 0x80);
    }

    #[test]
    fn add_after_clear_is_repeatable() {
        let mut img = BitplaneImage::new();
        img.add(10, 20, 13, 5, 0b10110);
        let once: Vec<u8> = img.planes[1].as_raw().clone();
        img.clear();
        assert_eq!(img.used_planes(), 0);
        img.add(10, 20, 13, 5, 0b10110);
        assert_eq!(img.planes[1].as_raw(), &once);
    }

    #[test]
    fn save_used_planes() {
        let dir = tempfile::tempdir().unwrap();
        let basename = dir.path().join("plane");
        let mut img = BitplaneImage::new();
        // Zero values still count as used
        img.add(0, 0, 16, 1, 0);
        let paths = img.save_all(&basename).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("plane0.bmp"),
                dir.path().join("plane1.bmp"),
                dir.path().join("plane2.bmp")
            ]
        );
        let reloaded = assert_ok!(image::open(&paths[2])).to_luma8();
        assert_eq!(reloaded.dimensions(), (WIDTH, HEIGHT));
    }

    #[test]
    fn save_fails_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = BitplaneImage::new();
        img.add(0, 0, 0, 8, 0xAA);
        assert_err!(img.save_all(&dir.path().join("missing").join("plane")));
    }
}
