//! 统一错误处理
//!
//! 提供应用级错误类型 [`AppError`] 及其 HTTP 映射。
//!
//! 调度语义上的"失败"有两种完全不同的形态：
//! - 业务性缺货（无骑手、全部拒单）是正常结果，HTTP 200 + `status: unmatched`；
//! - 基础设施错误（存储不可用、评分服务超时）才会走到这里。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::dispatch::DispatchError;
use crate::geo::GeoError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// 依赖暂不可用，调用方可重试 (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Unavailable(msg) => {
                tracing::error!(error = %msg, "dependency unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    "A backing service is unavailable".to_string(),
                )
            }
            AppError::Internal(msg) => {
                // 记录内部错误但不暴露详细信息
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl From<GeoError> for AppError {
    fn from(e: GeoError) -> Self {
        match e {
            GeoError::InvalidCoordinates { .. } => AppError::Validation(e.to_string()),
            GeoError::Store(inner) => inner.into(),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::PlanNotFound(order_id) => {
                AppError::NotFound(format!("no pending offer for order {}", order_id))
            }
            DispatchError::WrongCourier { .. } | DispatchError::OfferGone { .. } => {
                AppError::Conflict(e.to_string())
            }
            DispatchError::Store(inner) => inner.into(),
            DispatchError::Geo(inner) => inner.into(),
            DispatchError::Scoring { .. } => AppError::Unavailable(e.to_string()),
            DispatchError::PlanCorrupt(..) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}
