use serde::Serialize;

use crate::feature::Descriptor;
use crate::store::DeviceRecord;

/// 默认相似度阈值
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// 识别结果
///
/// - 设备库为空或没有可比较的描述符：`(None, 0.0)`
/// - 最佳相似度低于阈值：`(None, 最佳相似度)`
/// - 识别成功：`(Some(设备名), 相似度)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub device: Option<String>,
    pub confidence: f32,
}

/// 计算余弦相似度，任意一个向量为零向量时返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na * nb).sqrt()).clamp(-1.0, 1.0) as f32
}

/// 最近邻匹配器
///
/// 设备的得分是查询描述符与该设备所有描述符相似度的最大值，任意一张训练图片足够接近即可。
/// 得分相同时，设备库遍历顺序中靠前的设备胜出。
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 设备得分，没有描述符的设备返回 None
    pub fn device_score(&self, query: &Descriptor, record: &DeviceRecord) -> Option<f32> {
        record
            .descriptors
            .iter()
            .map(|des| cosine_similarity(query.as_slice(), des.as_slice()))
            .reduce(f32::max)
    }

    pub fn find_best<'a, I>(&self, query: &Descriptor, devices: I) -> MatchResult
    where
        I: IntoIterator<Item = &'a DeviceRecord>,
    {
        let mut best: Option<(&str, f32)> = None;
        for record in devices {
            let Some(score) = self.device_score(query, record) else {
                continue;
            };
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((record.name.as_str(), score));
            }
        }

        match best {
            Some((name, score)) if score >= self.threshold => {
                MatchResult { device: Some(name.to_owned()), confidence: score }
            }
            Some((_, score)) => MatchResult { device: None, confidence: score },
            None => MatchResult { device: None, confidence: 0.0 },
        }
    }

    /// 所有可比较设备的得分，按得分降序排列，得分相同时保持设备库顺序
    pub fn rank<'a, I>(&self, query: &Descriptor, devices: I) -> Vec<(f32, String)>
    where
        I: IntoIterator<Item = &'a DeviceRecord>,
    {
        let mut result = devices
            .into_iter()
            .filter_map(|record| Some((self.device_score(query, record)?, record.name.clone())))
            .collect::<Vec<_>>();
        result.sort_by(|a, b| b.0.total_cmp(&a.0));
        result
    }
}
