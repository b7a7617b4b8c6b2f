use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use image::ImageFormat;
use log::{info, warn};
use serde_json::{Value, json};
use tokio::task::block_in_place;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::DeviceError;
use crate::engine::{Resolution, resolve};
use crate::store::DeviceDetails;

fn check_token(state: &AppState, token: &str) -> Result<()> {
    if token != state.token {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

/// 识别图片中的设备并执行命令
#[utoipa::path(
    post,
    path = "/api/process_command",
    request_body(content = ProcessCommandForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "识别成功，返回自动化模块的执行结果"),
        (status = 400, description = "缺少参数、图片无效或识别出的设备与期望不一致"),
        (status = 404, description = "没有识别出任何设备"),
    )
)]
pub async fn process_command_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<ProcessCommandRequest>,
) -> Result<Response> {
    let ProcessCommandRequest { image, device, action } = data.0;
    let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
    let (Some(image), Some(device), Some(action)) = (image, non_empty(device), non_empty(action))
    else {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow::anyhow!("Missing image, device, or action"),
        ));
    };

    info!("收到命令: {} -> {}，图片大小 {} 字节", device, action, image.len());

    let matched = match block_in_place(|| state.engine.recognize(&image)) {
        Ok(matched) => matched,
        Err(DeviceError::ImageDecode(e)) => {
            warn!("无法解码上传的图片: {}", e);
            return Err(AppError::new(StatusCode::BAD_REQUEST, anyhow::anyhow!("Invalid image data")));
        }
        Err(e) => return Err(e.into()),
    };

    let resolution = resolve(&matched, &device);
    let report = state.engine.execute(resolution, &device, &action).await;
    let status = match report.resolution {
        Resolution::Resolved { .. } => StatusCode::OK,
        Resolution::Mismatch { .. } => StatusCode::BAD_REQUEST,
        Resolution::NotRecognized { .. } => StatusCode::NOT_FOUND,
    };
    Ok((status, Json(report)).into_response())
}

/// 列出所有设备
#[utoipa::path(
    get,
    path = "/api/devices",
    responses(
        (status = 200, body = DeviceListResponse),
    )
)]
pub async fn list_devices_handler(State(state): State<Arc<AppState>>) -> Json<DeviceListResponse> {
    Json(DeviceListResponse { devices: state.engine.list() })
}

/// 查看设备详情
#[utoipa::path(
    get,
    path = "/api/devices/{name}",
    params(("name" = String, Path, description = "设备名称")),
    responses(
        (status = 200, body = DeviceDetails),
        (status = 404, description = "设备不存在"),
    )
)]
pub async fn device_details_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DeviceDetails>> {
    let details = block_in_place(|| state.engine.get(&name))?;
    Ok(Json(details))
}

/// 注册新设备
#[utoipa::path(
    post,
    path = "/api/devices",
    request_body(content = RegisterForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "注册成功"),
        (status = 409, description = "设备已存在"),
    ),
    security(("token" = []))
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    data: TypedMultipart<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    check_token(&state, &token)?;
    let record = block_in_place(|| state.engine.register(&data.name, &data.images))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "name": record.name,
            "image_count": record.image_count,
        })),
    ))
}

/// 为设备添加图片
#[utoipa::path(
    post,
    path = "/api/devices/{name}/images",
    params(("name" = String, Path, description = "设备名称")),
    request_body(content = AddImagesForm, content_type = "multipart/form-data"),
    security(("token" = []))
)]
pub async fn add_images_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(name): Path<String>,
    data: TypedMultipart<AddImagesRequest>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    let record = block_in_place(|| state.engine.add_images(&name, &data.images))?;
    Ok(Json(json!({
        "success": true,
        "name": record.name,
        "image_count": record.image_count,
    })))
}

/// 删除设备的一张图片
#[utoipa::path(
    delete,
    path = "/api/devices/{name}/images/{image}",
    params(
        ("name" = String, Path, description = "设备名称"),
        ("image" = String, Path, description = "图片文件名"),
    ),
    security(("token" = []))
)]
pub async fn delete_image_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path((name, image)): Path<(String, String)>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    let record = block_in_place(|| state.engine.delete_image(&name, &image))?;
    Ok(Json(json!({
        "success": true,
        "name": record.name,
        "image_count": record.image_count,
    })))
}

/// 重命名设备
#[utoipa::path(
    post,
    path = "/api/devices/{name}/rename",
    params(("name" = String, Path, description = "设备名称")),
    request_body = RenameRequest,
    security(("token" = []))
)]
pub async fn rename_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(name): Path<String>,
    Json(data): Json<RenameRequest>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    block_in_place(|| state.engine.rename(&name, &data.new_name))?;
    Ok(Json(json!({ "success": true, "name": data.new_name })))
}

/// 删除设备及其全部图片
#[utoipa::path(
    delete,
    path = "/api/devices/{name}",
    params(("name" = String, Path, description = "设备名称")),
    security(("token" = []))
)]
pub async fn delete_device_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    block_in_place(|| state.engine.delete(&name))?;
    Ok(Json(json!({ "success": true })))
}

/// 获取设备图片的原始内容
#[utoipa::path(
    get,
    path = "/device_images/{name}/{image}",
    params(
        ("name" = String, Path, description = "设备名称"),
        ("image" = String, Path, description = "图片文件名"),
    ),
    responses(
        (status = 200, content_type = "application/octet-stream"),
        (status = 404, description = "设备或图片不存在"),
    )
)]
pub async fn device_image_handler(
    State(state): State<Arc<AppState>>,
    Path((name, image)): Path<(String, String)>,
) -> Result<Response> {
    let (path, bytes) = block_in_place(|| -> Result<_> {
        let path = state.engine.image_path(&name, &image)?;
        let bytes = std::fs::read(&path)?;
        Ok((path, bytes))
    })?;
    let mime = ImageFormat::from_path(&path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}
