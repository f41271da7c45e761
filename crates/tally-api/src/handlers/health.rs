use axum::extract::State;
use axum::Json;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::AppState;

/// Liveness. Reports `degraded` when the database does not answer.
pub async fn health(State(state): State<AppState>) -> Json<JsonValue> {
    let database = match &state.db {
        Some(db) => match db.ping().await {
            Ok(()) => {
                tally_db::log_pool_metrics(db.pool());
                "up"
            }
            Err(e) => {
                warn!(subsystem = "api", error = %e, "Health check database ping failed");
                "down"
            }
        },
        None => "unchecked",
    };

    Json(json!({
        "status": if database == "down" { "degraded" } else { "ok" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}
