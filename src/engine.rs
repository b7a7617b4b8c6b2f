use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info};
use serde::Serialize;

use crate::automation::{Automation, AutomationModule, CommandOutcome};
use crate::error::Result;
use crate::feature::FeatureExtractor;
use crate::matcher::{MatchResult, Matcher};
use crate::metrics;
use crate::store::{DeviceDetails, DeviceRecord, DeviceStore, DeviceSummary};

/// 表示“接受任何识别结果”的设备名
pub const VISUAL_TARGET: &str = "visual_target";

/// 识别结果与调用方期望的设备之间的比对结论
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// 识别成功并且与期望一致，可以执行命令
    Resolved { device: String, confidence: f32 },
    /// 识别出的设备与期望的设备不一致
    Mismatch { recognized: String, requested: String, confidence: f32 },
    /// 没有设备达到相似度阈值
    NotRecognized { confidence: f32 },
}

impl Resolution {
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Resolved { confidence, .. }
            | Self::Mismatch { confidence, .. }
            | Self::NotRecognized { confidence } => *confidence,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolved { .. } => "resolved",
            Self::Mismatch { .. } => "mismatch",
            Self::NotRecognized { .. } => "not_recognized",
        }
    }
}

/// 一次命令处理的完整结果：自动化模块的返回值加上识别信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    #[serde(flatten)]
    pub outcome: CommandOutcome,
    pub recognized_device: Option<String>,
    pub target_device: Option<String>,
    pub confidence: f32,
    pub requested_device: String,
    /// 比对结论：`resolved`、`mismatch` 或 `not_recognized`
    pub status: &'static str,
    #[serde(skip)]
    pub resolution: Resolution,
}

/// 期望的设备名与识别出的设备名互为子串（不区分大小写）时视为一致
pub fn fuzzy_accepts(requested: &str, recognized: &str) -> bool {
    let requested = requested.to_lowercase();
    let recognized = recognized.to_lowercase();
    recognized.contains(&requested) || requested.contains(&recognized)
}

/// 将识别结果与期望的设备名比对
pub fn resolve(matched: &MatchResult, requested: &str) -> Resolution {
    let confidence = matched.confidence;
    let Some(device) = &matched.device else {
        return Resolution::NotRecognized { confidence };
    };
    if requested == VISUAL_TARGET || fuzzy_accepts(requested, device) {
        Resolution::Resolved { device: device.clone(), confidence }
    } else {
        Resolution::Mismatch {
            recognized: device.clone(),
            requested: requested.to_owned(),
            confidence,
        }
    }
}

/// 设备识别引擎
pub struct RecognitionEngine<A = Automation> {
    store: DeviceStore,
    extractor: FeatureExtractor,
    matcher: Matcher,
    automation: A,
}

impl<A: AutomationModule> RecognitionEngine<A> {
    pub fn new(store: DeviceStore, matcher: Matcher, automation: A) -> Self {
        Self { store, extractor: FeatureExtractor, matcher, automation }
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn automation(&self) -> &A {
        &self.automation
    }

    pub fn register<B: AsRef<[u8]> + Sync>(&self, name: &str, images: &[B]) -> Result<DeviceRecord> {
        self.store.register(name, images)
    }

    pub fn add_images<B: AsRef<[u8]> + Sync>(&self, name: &str, images: &[B]) -> Result<DeviceRecord> {
        self.store.add_images(name, images)
    }

    pub fn delete_image(&self, name: &str, image: &str) -> Result<DeviceRecord> {
        self.store.delete_image(name, image)
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.store.rename(old, new)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.store.delete(name)
    }

    pub fn list(&self) -> Vec<DeviceSummary> {
        self.store.list()
    }

    pub fn get(&self, name: &str) -> Result<DeviceDetails> {
        self.store.get(name)
    }

    pub fn image_path(&self, name: &str, image: &str) -> Result<PathBuf> {
        self.store.image_path(name, image)
    }

    pub fn reindex(&self) -> Result<usize> {
        self.store.reindex()
    }

    /// 识别图片中的设备
    pub fn recognize(&self, image: &[u8]) -> Result<MatchResult> {
        let start = Instant::now();
        let query = self.extractor.extract_bytes(image)?;
        let devices = self.store.snapshot();
        let result = self.matcher.find_best(&query, devices.values());
        let elapsed = start.elapsed().as_secs_f32();
        metrics::observe_recognition_duration(elapsed);
        debug!(
            "识别结果: {:?}，置信度 {:.4}，共 {} 个设备，耗时 {:.3}s",
            result.device,
            result.confidence,
            devices.len(),
            elapsed
        );
        Ok(result)
    }

    /// 返回所有设备与图片的相似度，按相似度降序排列
    pub fn rank(&self, image: &[u8]) -> Result<Vec<(f32, String)>> {
        let query = self.extractor.extract_bytes(image)?;
        Ok(self.matcher.rank(&query, self.store.snapshot().values()))
    }

    /// 根据比对结论执行命令，只有 [`Resolution::Resolved`] 会调用自动化模块
    pub async fn execute(&self, resolution: Resolution, requested: &str, action: &str) -> CommandReport {
        metrics::inc_recognition(resolution.kind(), resolution.confidence());
        let confidence = resolution.confidence();
        let status = resolution.kind();
        match &resolution {
            Resolution::Resolved { device, .. } => {
                info!("执行命令: {} -> {}，置信度 {:.2}", device, action, confidence);
                let outcome = self.automation.execute_command(device, action).await;
                CommandReport {
                    outcome,
                    recognized_device: Some(device.clone()),
                    target_device: Some(device.clone()),
                    confidence,
                    requested_device: requested.to_owned(),
                    status,
                    resolution,
                }
            }
            Resolution::Mismatch { recognized, requested: wanted, .. } => {
                let message = format!(
                    "Recognized '{}' but requested '{}'. Confidence: {:.2}",
                    recognized, wanted, confidence
                );
                info!("{}", message);
                CommandReport {
                    outcome: CommandOutcome::failure(requested, action, message),
                    recognized_device: Some(recognized.clone()),
                    target_device: None,
                    confidence,
                    requested_device: requested.to_owned(),
                    status,
                    resolution,
                }
            }
            Resolution::NotRecognized { .. } => {
                let message =
                    format!("Could not recognize any device in image. Confidence: {:.2}", confidence);
                info!("{}", message);
                CommandReport {
                    outcome: CommandOutcome::failure(requested, action, message),
                    recognized_device: None,
                    target_device: None,
                    confidence,
                    requested_device: requested.to_owned(),
                    status,
                    resolution,
                }
            }
        }
    }

    /// 识别图片中的设备，与期望的设备比对，一致时通过自动化模块执行命令
    ///
    /// 只有图片无法解码时返回错误，识别失败和设备不一致都作为结果返回
    pub async fn recognize_and_resolve(
        &self,
        image: &[u8],
        requested: &str,
        action: &str,
    ) -> Result<CommandReport> {
        let matched = self.recognize(image)?;
        let resolution = resolve(&matched, requested);
        Ok(self.execute(resolution, requested, action).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(device: Option<&str>, confidence: f32) -> MatchResult {
        MatchResult { device: device.map(str::to_owned), confidence }
    }

    #[test]
    fn test_fuzzy_accepts() {
        assert!(fuzzy_accepts("lamp", "lamp"));
        // 只比较子串，缺字母的名字不算一致
        assert!(!fuzzy_accepts("lmp", "lamp"));
        assert!(fuzzy_accepts("LAMP", "desk lamp"));
        assert!(fuzzy_accepts("kitchen light", "Light"));
        // 双向包含比较宽松
        assert!(fuzzy_accepts("light", "nightlight"));
        assert!(!fuzzy_accepts("tv", "lamp"));
    }

    #[test]
    fn test_resolve_visual_target() {
        let resolution = resolve(&matched(Some("lamp"), 0.93), VISUAL_TARGET);
        assert_eq!(resolution, Resolution::Resolved { device: "lamp".into(), confidence: 0.93 });
    }

    #[test]
    fn test_resolve_fuzzy() {
        let resolution = resolve(&matched(Some("Desk Lamp"), 0.8), "lamp");
        assert_eq!(resolution, Resolution::Resolved { device: "Desk Lamp".into(), confidence: 0.8 });
    }

    #[test]
    fn test_resolve_mismatch() {
        let resolution = resolve(&matched(Some("lamp"), 0.99), "tv");
        assert_eq!(
            resolution,
            Resolution::Mismatch { recognized: "lamp".into(), requested: "tv".into(), confidence: 0.99 }
        );
        assert_eq!(resolution.kind(), "mismatch");
    }

    #[test]
    fn test_resolve_misspelled_name() {
        let resolution = resolve(&matched(Some("lamp"), 0.95), "lmp");
        assert_eq!(
            resolution,
            Resolution::Mismatch { recognized: "lamp".into(), requested: "lmp".into(), confidence: 0.95 }
        );
    }

    #[test]
    fn test_resolve_not_recognized() {
        let resolution = resolve(&matched(None, 0.42), VISUAL_TARGET);
        assert_eq!(resolution, Resolution::NotRecognized { confidence: 0.42 });
        assert_eq!(resolution.confidence(), 0.42);
    }
}
