use std::io;

use thiserror::Error;

/// 设备识别引擎的错误类型
///
/// 识别失败（没有设备达到阈值）和设备不一致都不是错误，而是正常的识别结果，见 [`crate::engine::Resolution`]
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 图片无法解码，需要调用方重新拍摄
    #[error("无法解码图片: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("设备不存在: {0}")]
    UnknownDevice(String),
    #[error("设备 {device} 中不存在图片 {image}")]
    UnknownImage { device: String, image: String },
    #[error("设备已存在: {0}")]
    DuplicateDevice(String),
    #[error("至少需要一张图片")]
    EmptyImageSet,
    #[error("无效的设备名称: {0:?}")]
    InvalidDeviceName(String),
    /// 设备库由其他版本的特征提取器生成，其中的描述符不能与当前版本比较
    #[error("设备库的特征提取器版本为 {found}，当前版本为 {expected}，请先执行 reindex")]
    ExtractorMismatch { found: String, expected: String },
    /// 读写设备库或图片文件失败，内存中的设备库保持为最后一次成功写入的状态
    #[error("设备库持久化失败: {0}")]
    Persistence(#[from] io::Error),
}

pub type Result<T, E = DeviceError> = std::result::Result<T, E>;
