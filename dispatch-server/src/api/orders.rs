//! 订单调度路由
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /orders | POST | 提交订单并执行完整撮合流程 |
//! | /orders/{id}/resolve | POST | 骑手对当前 offer 的接受/拒绝 |
//! | /orders/{id}/complete | POST | 行程完成/取消回报 |

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use shared::{
    CourierId, DispatchStatus, Order, ResolveOfferRequest, SubmitOrderRequest, SubmitOrderResponse,
};

use crate::core::ServerState;
use crate::dispatch::{DispatchOutcome, ResolveOutcome};
use crate::metrics;
use crate::utils::AppResult;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/orders", post(submit_order))
        .route("/orders/{id}/resolve", post(resolve_offer))
        .route("/orders/{id}/complete", post(complete_trip))
}

/// 提交订单，阻塞至撮合结束（受 MATCH_DEADLINE 限制，不会悬挂）
async fn submit_order(
    State(state): State<ServerState>,
    Json(req): Json<SubmitOrderRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let started = Instant::now();

    let order = Order {
        id: req
            .order_id
            .clone()
            .unwrap_or_else(|| format!("ORD-{}", uuid::Uuid::new_v4())),
        pickup_lat: req.pickup_lat,
        pickup_lon: req.pickup_lon,
        dropoff_lat: req.dropoff_lat,
        dropoff_lon: req.dropoff_lon,
        distance_km: req.distance_km,
        shipping_fee: req.shipping_fee,
        cod_amount: req.cod_amount,
        vehicle_class: req.vehicle_class,
        service_tier: req.service_tier,
        is_raining: req.is_raining,
        created_at: chrono::Utc::now(),
    };

    let outcome = state.orchestrator.dispatch(&order).await;
    let elapsed = started.elapsed();
    metrics::MATCH_LATENCY.observe(elapsed.as_secs_f64());
    let processing_time_ms = elapsed.as_millis() as u64;

    let response = match outcome {
        Ok(DispatchOutcome::Matched {
            courier_id,
            probability,
        }) => (
            StatusCode::OK,
            Json(SubmitOrderResponse {
                status: DispatchStatus::Matched,
                driver_id: Some(courier_id),
                score: Some(probability),
                reason: None,
                processing_time_ms,
            }),
        ),
        Ok(DispatchOutcome::Unmatched { reason }) => (
            StatusCode::OK,
            Json(SubmitOrderResponse {
                status: DispatchStatus::Unmatched,
                driver_id: None,
                score: None,
                reason: Some(reason.as_str().to_string()),
                processing_time_ms,
            }),
        ),
        // 基础设施性失败：结果可重试，用 502 区别于业务性缺货
        Err(err) => {
            tracing::error!(order_id = %order.id, error = %err, "dispatch failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(SubmitOrderResponse {
                    status: DispatchStatus::Failed,
                    driver_id: None,
                    score: None,
                    reason: Some("dispatch_error".to_string()),
                    processing_time_ms,
                }),
            )
        }
    };

    Ok(response.into_response())
}

/// 决议响应
#[derive(Debug, Serialize)]
pub struct ResolveOfferResponse {
    pub order_id: String,
    /// accepted | reoffered | exhausted
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<CourierId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// 骑手对当前 offer 的决定；拒绝会沿既有序列继续寻找下一位骑手
async fn resolve_offer(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
    Json(req): Json<ResolveOfferRequest>,
) -> AppResult<Json<ResolveOfferResponse>> {
    let outcome = state
        .orchestrator
        .resolve_offer(&order_id, &req.courier_id, req.accepted)
        .await?;

    let response = match outcome {
        ResolveOutcome::Accepted { courier_id } => ResolveOfferResponse {
            order_id,
            outcome: "accepted",
            driver_id: Some(courier_id),
            score: None,
        },
        ResolveOutcome::Reoffered {
            courier_id,
            probability,
        } => ResolveOfferResponse {
            order_id,
            outcome: "reoffered",
            driver_id: Some(courier_id),
            score: Some(probability),
        },
        ResolveOutcome::Exhausted => ResolveOfferResponse {
            order_id,
            outcome: "exhausted",
            driver_id: None,
            score: None,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CompleteTripRequest {
    pub courier_id: CourierId,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct CompleteTripResponse {
    pub status: &'static str,
}

/// 行程结束回报；仅入队状态更新事件，立即返回
async fn complete_trip(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
    Json(req): Json<CompleteTripRequest>,
) -> Json<CompleteTripResponse> {
    state
        .orchestrator
        .complete_trip(&order_id, &req.courier_id, req.cancelled);
    Json(CompleteTripResponse { status: "ok" })
}
