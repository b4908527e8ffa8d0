use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use helpdesk_shared::constants::{HEADER_USER_ID, HEADER_USER_ROLE};
use helpdesk_shared::visibility::is_accessible;
use helpdesk_shared::{
    FeedQuery, MutationReport, Notification, NotificationFeed, NotificationId, NotificationKind,
    Role, UserId, Viewer,
};
use helpdesk_store::Database;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::alerts::Alerts;
use crate::config::ServerConfig;
use crate::error::ServerError;

pub type SharedFeed = Arc<Mutex<NotificationFeed<Database>>>;

#[derive(Clone)]
pub struct AppState {
    pub feed: SharedFeed,
    pub alerts: Arc<Alerts>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route(
            "/notifications",
            get(list_notifications)
                .post(create_notification)
                .delete(clear_visible),
        )
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
        .route("/notifications/:id/open", post(open_notification))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    accepts_producers: bool,
}

/// Query-string spelling of a [`FeedQuery`].
#[derive(Debug, Default, Deserialize)]
struct FeedParams {
    category: Option<String>,
    role: Option<String>,
    sort: Option<String>,
}

impl FeedParams {
    fn to_query(&self) -> Result<FeedQuery, ServerError> {
        Ok(FeedQuery::parse(
            self.category.as_deref(),
            self.role.as_deref(),
            self.sort.as_deref(),
        )?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedResponse {
    notifications: Vec<Notification>,
    has_unread: bool,
    unread_count: usize,
}

#[derive(Serialize)]
struct OpenResponse {
    link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNotificationRequest {
    title: String,
    message: String,
    #[serde(rename = "type")]
    kind: NotificationKind,
    user_id: String,
    user_role: Role,
    link: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        accepts_producers: state.config.producer_token.is_some(),
    })
}

/// The viewer identity asserted by the upstream auth gateway.
fn viewer_from_headers(headers: &HeaderMap) -> Result<Viewer, ServerError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let id = header(HEADER_USER_ID)
        .ok_or_else(|| ServerError::Unauthorized(format!("missing {HEADER_USER_ID} header")))?;
    let role = header(HEADER_USER_ROLE)
        .ok_or_else(|| ServerError::Unauthorized(format!("missing {HEADER_USER_ROLE} header")))?;

    Ok(Viewer::new(id, Role::from(role)))
}

fn verify_producer_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.producer_token else {
        return Err(ServerError::Forbidden(
            "Notification intake is disabled (no PRODUCER_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid producer token".into()));
    }

    Ok(())
}

async fn list_notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedResponse>, ServerError> {
    let viewer = viewer_from_headers(&headers)?;
    let query = params.to_query()?;

    let mut feed = state.feed.lock().await;
    state.alerts.sync_or_warn(&mut feed);

    let notifications = feed.visible(&viewer, &query).to_vec();
    Ok(Json(FeedResponse {
        notifications,
        has_unread: feed.has_unread(&viewer),
        unread_count: feed.unread_count(&viewer),
    }))
}

async fn create_notification(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), ServerError> {
    verify_producer_token(&headers, &state.config)?;

    if req.title.trim().is_empty() {
        return Err(ServerError::BadRequest("title must not be empty".into()));
    }
    if req.user_id.trim().is_empty() {
        return Err(ServerError::BadRequest("userId must not be empty".into()));
    }

    let mut notification = Notification::new(
        req.title,
        req.message,
        req.kind,
        UserId::new(req.user_id),
        req.user_role,
    );
    notification.link = req.link.filter(|l| !l.is_empty());

    let mut feed = state.feed.lock().await;
    feed.store().insert_notification(&notification)?;
    if let Some(arrived) = feed.insert_local(notification.clone()) {
        state.alerts.announce_arrival(&arrived);
    }

    info!(
        id = %notification.id,
        kind = %notification.kind,
        user = %notification.user_id,
        "Notification created"
    );

    Ok((StatusCode::CREATED, Json(notification)))
}

async fn mark_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<Json<MutationReport>, ServerError> {
    let viewer = viewer_from_headers(&headers)?;
    let mut feed = state.feed.lock().await;
    state.alerts.sync_or_warn(&mut feed);
    ensure_accessible(&feed, &viewer, &id)?;
    Ok(Json(feed.mark_one_read(&viewer, &id)))
}

async fn open_notification(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<Json<OpenResponse>, ServerError> {
    let viewer = viewer_from_headers(&headers)?;
    let mut feed = state.feed.lock().await;
    state.alerts.sync_or_warn(&mut feed);
    ensure_accessible(&feed, &viewer, &id)?;
    Ok(Json(OpenResponse {
        link: feed.open(&viewer, &id),
    }))
}

async fn mark_all_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<MutationReport>, ServerError> {
    let viewer = viewer_from_headers(&headers)?;
    let query = params.to_query()?;

    let mut feed = state.feed.lock().await;
    let visible = feed.visible(&viewer, &query).to_vec();
    let report = feed.mark_all_visible_read(&viewer, &visible);

    info!(viewer = %viewer.id, requested = report.requested, failed = report.failed, "Marked visible notifications read");
    Ok(Json(report))
}

async fn clear_visible(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<MutationReport>, ServerError> {
    let viewer = viewer_from_headers(&headers)?;
    let query = params.to_query()?;

    let mut feed = state.feed.lock().await;
    let visible = feed.visible(&viewer, &query).to_vec();
    let report = feed.clear_visible(&visible);

    info!(viewer = %viewer.id, requested = report.requested, failed = report.failed, "Cleared visible notifications");
    Ok(Json(report))
}

fn ensure_accessible(
    feed: &NotificationFeed<Database>,
    viewer: &Viewer,
    id: &NotificationId,
) -> Result<(), ServerError> {
    feed.notifications()
        .iter()
        .find(|n| n.id == *id && is_accessible(viewer, n))
        .map(|_| ())
        .ok_or_else(|| ServerError::NotFound(format!("notification {id}")))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
