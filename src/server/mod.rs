mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use self::error::AppError;
pub use self::state::*;

struct TokenAddon;

impl Modify for TokenAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::process_command_handler,
        api::list_devices_handler,
        api::device_details_handler,
        api::register_handler,
        api::add_images_handler,
        api::delete_image_handler,
        api::rename_handler,
        api::delete_device_handler,
        api::device_image_handler,
    ),
    components(schemas(
        types::ProcessCommandForm,
        types::RegisterForm,
        types::AddImagesForm,
        types::RenameRequest,
        types::DeviceListResponse,
        crate::store::DeviceSummary,
        crate::store::DeviceDetails,
    )),
    modifiers(&TokenAddon)
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/process_command", post(api::process_command_handler))
        .route("/api/devices", get(api::list_devices_handler).post(api::register_handler))
        .route(
            "/api/devices/{name}",
            get(api::device_details_handler).delete(api::delete_device_handler),
        )
        .route("/api/devices/{name}/images", post(api::add_images_handler))
        .route("/api/devices/{name}/images/{image}", delete(api::delete_image_handler))
        .route("/api/devices/{name}/rename", post(api::rename_handler))
        .route("/device_images/{name}/{image}", get(api::device_image_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
