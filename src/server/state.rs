use std::sync::Arc;

use crate::RecognitionEngine;

/// 应用状态
pub struct AppState {
    /// 设备识别引擎
    pub engine: RecognitionEngine,
    /// 修改设备时使用的鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(engine: RecognitionEngine, token: String) -> Arc<Self> {
        Arc::new(AppState { engine, token })
    }
}
