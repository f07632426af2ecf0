// ==========================================
// PCB产线排产系统 - 工厂事件接入端点
// ==========================================
// 职责: POST /factory/failure (multipart/form-data)
// 字段: image (必填, 二进制) / description (可选) / po_id (可选)
// 响应: {"status": "accepted"|"unresolved"|"error", "message": ...}
// 状态码: 200 accepted/unresolved, 400 报文非法, 500 内部错误
// ==========================================

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::orchestrator::{Orchestrator, OrchestratorError};

/// 失败照片大小上限 (字节)
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// 端点响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureAck {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_order: Option<String>,
}

impl FailureAck {
    fn accepted(po_id: String, so: Option<String>) -> Self {
        Self {
            status: "accepted".to_string(),
            message: "factory failure notification delivered".to_string(),
            production_order_id: Some(po_id),
            sales_order: so,
        }
    }

    fn unresolved(message: String) -> Self {
        Self {
            status: "unresolved".to_string(),
            message,
            production_order_id: None,
            sales_order: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            production_order_id: None,
            sales_order: None,
        }
    }
}

/// 构建工厂事件路由
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/factory/failure", post(handle_failure))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(orchestrator)
}

/// POST /factory/failure
async fn handle_failure(
    State(orchestrator): State<Arc<Orchestrator>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<FailureAck>) {
    let mut image: Option<Vec<u8>> = None;
    let mut description = String::new();
    let mut po_id: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                match name.as_str() {
                    "image" => match field.bytes().await {
                        Ok(bytes) => image = Some(bytes.to_vec()),
                        Err(e) => {
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(FailureAck::error(format!("unreadable image field: {e}"))),
                            );
                        }
                    },
                    "description" => {
                        description = field.text().await.unwrap_or_default();
                    }
                    "po_id" => {
                        let value = field.text().await.unwrap_or_default();
                        if !value.is_empty() {
                            po_id = Some(value);
                        }
                    }
                    other => {
                        warn!("忽略未知表单字段: {other}");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(FailureAck::error(format!("malformed multipart body: {e}"))),
                );
            }
        }
    }

    let Some(image) = image else {
        return (
            StatusCode::BAD_REQUEST,
            Json(FailureAck::error(
                "no image provided; send multipart form with an 'image' field".to_string(),
            )),
        );
    };

    info!(
        bytes = image.len(),
        po_id = po_id.as_deref().unwrap_or("-"),
        "收到工厂失败事件"
    );

    match orchestrator
        .handle_factory_failure(image, description, po_id, Utc::now())
        .await
    {
        Ok(dispatch) => (
            StatusCode::OK,
            Json(FailureAck::accepted(
                dispatch.production_order_id,
                dispatch.sales_order_internal_id,
            )),
        ),
        Err(OrchestratorError::Unresolved(message)) => {
            info!("失败事件无法匹配: {message}");
            (StatusCode::OK, Json(FailureAck::unresolved(message)))
        }
        Err(e) => {
            warn!("失败事件处理内部错误: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FailureAck::error(e.to_string())),
            )
        }
    }
}
