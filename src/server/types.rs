use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::DeviceSummary;

/// 命令处理请求，字段缺失时返回统一的错误信息，因此全部为可选
#[derive(TryFromMultipart)]
pub struct ProcessCommandRequest {
    #[form_data(limit = "10MiB")]
    pub image: Option<Bytes>,
    pub device: Option<String>,
    pub action: Option<String>,
}

/// 命令处理表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct ProcessCommandForm {
    /// 拍摄的图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
    /// 期望的设备名，`visual_target` 表示接受任何识别结果
    pub device: String,
    /// 要执行的动作，如 `on`、`off`
    pub action: String,
}

/// 注册设备请求
#[derive(TryFromMultipart)]
pub struct RegisterRequest {
    pub name: String,
    #[form_data(limit = "10MiB")]
    pub images: Vec<Bytes>,
}

/// 注册设备表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct RegisterForm {
    /// 设备名称
    pub name: String,
    /// 设备图片，可以是多张
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub images: String,
}

/// 添加图片请求
#[derive(TryFromMultipart)]
pub struct AddImagesRequest {
    #[form_data(limit = "10MiB")]
    pub images: Vec<Bytes>,
}

/// 添加图片表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AddImagesForm {
    /// 新增的设备图片，可以是多张
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub images: String,
}

/// 重命名请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameRequest {
    /// 新的设备名称
    pub new_name: String,
}

/// 设备列表响应
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceSummary>,
}
