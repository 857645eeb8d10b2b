//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`orders`] - 订单调度接口
//! - [`couriers`] - 骑手位置与状态接口

pub mod couriers;
pub mod health;
pub mod orders;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::core::ServerState;
use crate::metrics;

// Re-export common types for handlers
pub use crate::utils::{AppError, AppResult};

/// 组装全部路由
pub fn router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(couriers::router())
        .route("/metrics", get(|| async { metrics::render() }))
        .layer(TraceLayer::new_for_http())
}
