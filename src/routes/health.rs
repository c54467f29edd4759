use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub compute: ComponentHealth,
    pub storage: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
}

impl ComponentHealth {
    fn from_configured(configured: bool) -> Self {
        Self {
            status: if configured { "configured" } else { "missing" }.to_string(),
        }
    }
}

/// GET /health: liveness plus which integrations are configured.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let compute = state.config.require_compute().is_ok();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        checks: HealthChecks {
            compute: ComponentHealth::from_configured(compute),
            storage: ComponentHealth::from_configured(state.storage.is_some()),
        },
    })
}
