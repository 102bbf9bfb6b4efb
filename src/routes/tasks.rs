// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Sweep trigger routes.
//!
//! These endpoints are called by an external scheduler, not directly by
//! players. They are protected by the scheduler token in routes/mod.rs.

use crate::db::Store;
use crate::error::Result;
use crate::services::SweepReport;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use std::sync::Arc;

/// Task handler routes (called by the scheduler).
pub fn routes<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/tasks/expiry-sweep", post(expiry_sweep::<S>))
        .route("/tasks/proximity-sweep", post(proximity_sweep::<S>))
}

async fn expiry_sweep<S: Store>(State(state): State<Arc<AppState<S>>>) -> Result<Json<SweepReport>> {
    tracing::info!("Expiry sweep triggered");
    Ok(Json(state.sweeps.run_expiry_sweep(Utc::now()).await?))
}

async fn proximity_sweep<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<SweepReport>> {
    tracing::info!("Proximity sweep triggered");
    Ok(Json(state.sweeps.run_proximity_sweep(Utc::now()).await?))
}
