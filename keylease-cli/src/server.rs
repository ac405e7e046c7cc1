use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tokio::time::MissedTickBehavior;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;

use keylease_core::clock::{Clock, SystemClock};
use keylease_core::error::LockError;
use keylease_core::manager::LockManager;
use keylease_core::types::LockRecord;

use crate::handlers::*;

pub type AppState = Arc<LockManager>;

type ApiKey = Option<Arc<str>>;
type ApiFailure = (StatusCode, Json<ApiResponse<()>>);

pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    /// Seconds between background sweeps; 0 disables the sweeper task
    pub sweep_interval_secs: u64,
    /// Upper bound on concurrently blocked `/wait` requests
    pub max_waiters: usize,
    pub api_key: Option<String>,
}

pub async fn run(manager: LockManager, options: ServeOptions) -> anyhow::Result<()> {
    let state: AppState = Arc::new(manager);
    let api_key: ApiKey = options
        .api_key
        .filter(|key| !key.is_empty())
        .map(Arc::from);

    if api_key.is_some() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No KEYLEASE_API_KEY set, server is open (dev mode)");
    }

    if options.sweep_interval_secs > 0 {
        spawn_sweeper(state.clone(), Duration::from_secs(options.sweep_interval_secs));
    } else {
        tracing::info!("Periodic sweeper disabled; relying on inline and lazy cleanup");
    }

    let app = router(state, api_key, options.max_waiters);

    let addr = format!("{}:{}", options.host, options.port);
    tracing::info!("🔒 keylease server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("keylease server stopped");
    Ok(())
}

pub fn router(state: AppState, api_key: ApiKey, max_waiters: usize) -> Router {
    Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        // Protected routes
        .route("/locks", get(list_locks).post(acquire_lock))
        .route("/locks/{key}", get(lock_status).delete(release_lock))
        .route(
            "/locks/{key}/wait",
            post(wait_lock).layer(GlobalConcurrencyLimitLayer::new(max_waiters.max(1))),
        )
        .route("/sweep", post(sweep))
        .layer(middleware::from_fn_with_state(api_key, auth_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ─── Periodic Sweeper ───────────────────────────────────────────────────────

fn spawn_sweeper(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tracing::info!(interval_secs = every.as_secs(), "🧹 Periodic sweeper enabled");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let manager = state.clone();
            match tokio::task::spawn_blocking(move || manager.cleanup_expired_locks()).await {
                Ok(Ok(0)) => {}
                Ok(Ok(deleted)) => tracing::info!(deleted, "Expired locks swept"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Periodic sweep failed"),
                Err(e) => tracing::error!(error = %e, "Periodic sweep task panicked"),
            }
        }
    })
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    State(api_key): State<ApiKey>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // No API key configured: allow all requests (dev mode)
    let Some(expected_key) = api_key else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if token == &*expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("🚫 Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Blocking Bridge ────────────────────────────────────────────────────────

/// Store calls may block (SQLite I/O, waiter sleeps), so they run on the
/// blocking pool rather than on the async workers.
async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiFailure>
where
    F: FnOnce(&LockManager) -> keylease_core::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let manager = state.clone();
    tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Lock task panicked");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "lock task failed")
        })?
        .map_err(lock_failure)
}

fn failure(status: StatusCode, msg: impl Into<String>) -> ApiFailure {
    (status, Json(ApiResponse::err(msg)))
}

fn lock_failure(e: LockError) -> ApiFailure {
    match e {
        LockError::EmptyKey | LockError::InvalidConfig(_) => {
            failure(StatusCode::BAD_REQUEST, e.to_string())
        }
        _ => {
            tracing::error!(error = %e, "Lock store failure");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn check_key(lock_key: &str) -> Result<(), ApiFailure> {
    validate_lock_key(lock_key).map_err(|e| failure(StatusCode::BAD_REQUEST, e))
}

fn now_ms() -> u64 {
    SystemClock.now_ms()
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Result<Json<ApiResponse<HealthResponse>>, ApiFailure> {
    let stored_locks = run_blocking(&state, |m| m.list_locks()).await?.len();
    Ok(Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        stored_locks,
        version: env!("CARGO_PKG_VERSION").to_string(),
        config: state.config().clone(),
    })))
}

async fn list_locks(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<LockInfo>>>, ApiFailure> {
    let records = run_blocking(&state, |m| m.list_locks()).await?;
    let now = now_ms();
    let locks = records
        .iter()
        .map(|record| LockInfo::from_record(record, now))
        .collect();
    Ok(Json(ApiResponse::ok(locks)))
}

async fn acquire_lock(
    State(state): State<AppState>,
    Json(req): Json<AcquireLockRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiFailure> {
    if let Err(e) = req.validate() {
        return Err(failure(StatusCode::BAD_REQUEST, e));
    }

    let lock_key = req.lock_key.clone();
    let holder_id = req.holder_id().to_string();
    let (acquired, current): (Option<LockRecord>, Option<LockRecord>) =
        run_blocking(&state, move |m| match m.try_acquire(&lock_key, &holder_id)? {
            Some(record) => Ok((Some(record), None)),
            None => Ok((None, m.holder(&lock_key)?)),
        })
        .await?;

    let now = now_ms();
    match acquired {
        Some(record) => {
            tracing::info!(
                lock_key = %record.lock_key,
                holder_id = %record.holder_id,
                expires_at = record.expires_at,
                "Lock acquired"
            );
            Ok((
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "success": true,
                    "data": LockInfo::from_record(&record, now),
                })),
            ))
        }
        None => {
            tracing::info!(lock_key = %req.lock_key, "Lock contended");
            Ok((
                StatusCode::CONFLICT,
                Json(serde_json::json!({
                    "success": false,
                    "reason": "CONTENDED",
                    "held_by": current.as_ref().map(|r| r.holder_id.clone()),
                    "retry_after_ms": current.as_ref().map(|r| r.remaining_ms(now)),
                })),
            ))
        }
    }
}

async fn lock_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<LockStatusResponse>>, ApiFailure> {
    check_key(&key)?;
    let lookup_key = key.clone();
    let record = run_blocking(&state, move |m| m.holder(&lookup_key)).await?;
    let now = now_ms();
    Ok(Json(ApiResponse::ok(LockStatusResponse {
        lock_key: key,
        locked: record.is_some(),
        lock: record.as_ref().map(|r| LockInfo::from_record(r, now)),
    })))
}

async fn release_lock(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ReleaseQuery>,
) -> Result<(StatusCode, Json<ApiResponse<ReleaseResponse>>), ApiFailure> {
    check_key(&key)?;
    let lock_key = key.clone();
    let released = match query.holder {
        Some(holder) => run_blocking(&state, move |m| m.release_owned(&lock_key, &holder)).await?,
        None => {
            run_blocking(&state, move |m| m.release(&lock_key)).await?;
            true
        }
    };

    if released {
        tracing::info!(lock_key = %key, "Lock released");
        Ok((
            StatusCode::OK,
            Json(ApiResponse::ok(ReleaseResponse { lock_key: key, released })),
        ))
    } else {
        tracing::info!(lock_key = %key, "Owned release rejected");
        Ok((
            StatusCode::CONFLICT,
            Json(ApiResponse::ok(ReleaseResponse { lock_key: key, released })),
        ))
    }
}

async fn wait_lock(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<WaitResponse>>, ApiFailure> {
    check_key(&key)?;
    let lock_key = key.clone();
    let released = run_blocking(&state, move |m| m.wait_for_lock_release(&lock_key)).await?;
    tracing::debug!(lock_key = %key, released, "Wait finished");
    Ok(Json(ApiResponse::ok(WaitResponse { lock_key: key, released })))
}

async fn sweep(State(state): State<AppState>) -> Result<Json<ApiResponse<SweepResponse>>, ApiFailure> {
    let deleted = run_blocking(&state, |m| m.cleanup_expired_locks()).await?;
    tracing::info!(deleted, "Expired locks swept");
    Ok(Json(ApiResponse::ok(SweepResponse { deleted })))
}
