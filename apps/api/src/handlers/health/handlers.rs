use super::checks::{check_document_store, check_postgres, check_redis};
use super::*;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let postgres = check_postgres(state.postgres_pool.clone()).await;
    let redis = check_redis(state.redis_client.clone()).await;
    let document_store = check_document_store(state.document_database.clone()).await;

    let ready = is_available(postgres.status)
        && is_available(redis.status)
        && is_available(document_store.status);
    let status = if ready { "ok" } else { "degraded" };
    let http_status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            postgres,
            redis,
            document_store,
        }),
    )
}

fn is_available(status: &str) -> bool {
    matches!(status, "ok" | "disabled")
}
