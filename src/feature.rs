use image::DynamicImage;
use image::imageops::FilterType;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::error::Result;

/// 计算特征前，图片统一缩放到的边长
pub const CANONICAL_SIZE: u32 = 224;
/// 灰度直方图的桶数，覆盖 0..=255
pub const GRAY_BINS: usize = 256;
/// 色相直方图的桶数，采用 8 位 HSV 约定，色相范围为 0..180
pub const HUE_BINS: usize = 180;
/// 饱和度直方图的桶数，覆盖 0..=255
pub const SAT_BINS: usize = 256;
pub const DESCRIPTOR_LEN: usize = GRAY_BINS + HUE_BINS + SAT_BINS;

/// 特征提取器的版本标识，写入设备库文件，不同版本的描述符不可比较
pub const EXTRACTOR_VERSION: &str = "hist-v1:224x224:gray256:hue180:sat256:l2";

#[derive(Error, Debug)]
#[error("描述符长度为 {0}，应为 {expected}", expected = DESCRIPTOR_LEN)]
pub struct InvalidDescriptorLength(pub usize);

/// 图片描述符
///
/// 由三段独立 L2 归一化的直方图依次拼接而成：灰度、色相、饱和度
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<f32>")]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn gray(&self) -> &[f32] {
        &self.0[..GRAY_BINS]
    }

    pub fn hue(&self) -> &[f32] {
        &self.0[GRAY_BINS..GRAY_BINS + HUE_BINS]
    }

    pub fn saturation(&self) -> &[f32] {
        &self.0[GRAY_BINS + HUE_BINS..]
    }
}

impl TryFrom<Vec<f32>> for Descriptor {
    type Error = InvalidDescriptorLength;

    fn try_from(value: Vec<f32>) -> Result<Self, Self::Error> {
        if value.len() != DESCRIPTOR_LEN {
            return Err(InvalidDescriptorLength(value.len()));
        }
        Ok(Self(value))
    }
}

impl Serialize for Descriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// 颜色直方图特征提取器
///
/// 对同一张图片总是产生相同的描述符，与调用顺序无关
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// 解码图片，无法识别或损坏的数据返回 [`crate::DeviceError::ImageDecode`]
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }

    pub fn extract(&self, image: &DynamicImage) -> Descriptor {
        let image = image.resize_exact(CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle);
        let rgb = image.to_rgb8();

        let mut gray = [0f64; GRAY_BINS];
        let mut hue = [0f64; HUE_BINS];
        let mut sat = [0f64; SAT_BINS];
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            gray[luma(r, g, b)] += 1.0;
            let (h, s) = hue_saturation(r, g, b);
            hue[h] += 1.0;
            sat[s] += 1.0;
        }

        let mut values = Vec::with_capacity(DESCRIPTOR_LEN);
        for hist in [&gray[..], &hue[..], &sat[..]] {
            push_normalized(&mut values, hist);
        }
        Descriptor(values)
    }

    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<Descriptor> {
        let image = self.decode(bytes)?;
        Ok(self.extract(&image))
    }

    /// 并行计算多张图片的描述符，结果顺序与输入一致，任意一张解码失败则整体失败
    pub fn extract_batch<B>(&self, images: &[B]) -> Result<Vec<Descriptor>>
    where
        B: AsRef<[u8]> + Sync,
    {
        images.par_iter().map(|bytes| self.extract_bytes(bytes.as_ref())).collect()
    }
}

fn luma(r: u8, g: u8, b: u8) -> usize {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    (y.round() as usize).min(GRAY_BINS - 1)
}

/// 返回 8 位 HSV 约定下的 (色相, 饱和度)，色相为角度的一半
fn hue_saturation(r: u8, g: u8, b: u8) -> (usize, usize) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { (255.0 * delta / max).round() } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else {
        let degree = if max == r {
            60.0 * (g - b) / delta
        } else if max == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        let degree = if degree < 0.0 { degree + 360.0 } else { degree };
        (degree / 2.0).round()
    };

    (h as usize % HUE_BINS, (s as usize).min(SAT_BINS - 1))
}

fn push_normalized(values: &mut Vec<f32>, hist: &[f64]) {
    let norm = hist.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        values.extend(hist.iter().map(|v| (v / norm) as f32));
    } else {
        values.extend(std::iter::repeat_n(0.0, hist.len()));
    }
}
