#![allow(dead_code)]

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub const RED: [u8; 3] = [255, 0, 0];
pub const DARK_RED: [u8; 3] = [200, 10, 10];
pub const ORANGE: [u8; 3] = [240, 120, 20];
pub const BLUE: [u8; 3] = [0, 0, 255];
pub const GREEN: [u8; 3] = [0, 200, 0];

pub fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(vec![]);
    DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// 纯色 PNG 图片
pub fn solid_png(color: [u8; 3]) -> Vec<u8> {
    encode(RgbImage::from_pixel(32, 32, Rgb(color)), ImageFormat::Png)
}

/// 纯色 BMP 图片，像素与同色的 PNG 完全一致
pub fn solid_bmp(color: [u8; 3]) -> Vec<u8> {
    encode(RgbImage::from_pixel(32, 32, Rgb(color)), ImageFormat::Bmp)
}
