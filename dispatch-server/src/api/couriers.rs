//! 骑手路由
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /couriers/{id}/location | PUT | GPS 位置上报（写入地理索引） |
//! | /couriers/{id} | GET | 档案 + 实时状态（调试/运维） |

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use validator::Validate;

use shared::{CourierView, LocationUpdateRequest};

use crate::core::ServerState;
use crate::geo;
use crate::utils::{AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/couriers/{id}/location", put(update_location))
        .route("/couriers/{id}", get(get_courier))
}

#[derive(Debug, Serialize)]
pub struct LocationUpdateResponse {
    pub status: &'static str,
    /// 当前所在 H3 cell
    pub cell: String,
}

/// 位置上报；跨 cell 移动时自动迁移索引成员
async fn update_location(
    State(state): State<ServerState>,
    Path(courier_id): Path<String>,
    Json(req): Json<LocationUpdateRequest>,
) -> AppResult<Json<LocationUpdateResponse>> {
    req.validate()?;

    state
        .geo
        .upsert_location(&courier_id, req.lat, req.lon, req.vehicle_class)
        .await?;

    let cell = geo::cell_for(req.lat, req.lon)?.to_string();
    Ok(Json(LocationUpdateResponse { status: "ok", cell }))
}

async fn get_courier(
    State(state): State<ServerState>,
    Path(courier_id): Path<String>,
) -> AppResult<Json<CourierView>> {
    let profile = state.fleet.profile(&courier_id).await?;
    let courier_state = state.fleet.state(&courier_id).await?;

    if profile.is_none() && courier_state.is_none() {
        return Err(AppError::NotFound(format!(
            "courier {} is not registered",
            courier_id
        )));
    }

    Ok(Json(CourierView {
        courier_id,
        profile,
        state: courier_state,
    }))
}
