use crate::auth::AuthUser;
use crate::directory::Directory;
use crate::error::{DirectoryError, Result};
use crate::model::{
    AuthResponse, Credentials, DirectoryStats, NewRoom, ProfileUpdate, RoomFilter, RoomPatch,
    RoomRecord, Registration,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::Utc;
use roomlink_core::{PlayerIdentity, RoomId};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_directory_route(directory: Directory) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/me", get(me).put(update_me))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:room_id", patch(update_room).delete(delete_room))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(directory)
}

/// Unwrap a JSON body, keeping the `{code, message}` error shape
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY => {
            Err(DirectoryError::Unprocessable(rejection.body_text()))
        }
        Err(rejection) => Err(DirectoryError::Validation(rejection.body_text())),
    }
}

/// Run argon2 and sled work off the async workers
async fn blocking<T: Send + 'static>(
    work: impl FnOnce() -> Result<T> + Send + 'static,
) -> Result<T> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DirectoryError::Internal(format!("worker failed: {}", e)))?
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

async fn stats(State(directory): State<Directory>) -> Result<Json<DirectoryStats>> {
    Ok(Json(directory.stats()?))
}

async fn register(
    State(directory): State<Directory>,
    payload: std::result::Result<Json<Registration>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let registration = body(payload)?;
    let response = blocking(move || directory.register(&registration)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(directory): State<Directory>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let credentials = body(payload)?;
    let response = blocking(move || directory.login(&credentials)).await?;
    Ok(Json(response))
}

async fn me(
    State(directory): State<Directory>,
    AuthUser(caller): AuthUser,
) -> Result<Json<PlayerIdentity>> {
    Ok(Json(directory.me(&caller.id)?))
}

async fn update_me(
    State(directory): State<Directory>,
    AuthUser(caller): AuthUser,
    payload: std::result::Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let update = body(payload)?;
    update.validate()?;
    Ok(Json(directory.update_me(&caller.id, &update)?))
}

async fn list_rooms(
    State(directory): State<Directory>,
    AuthUser(caller): AuthUser,
    filter: std::result::Result<Query<RoomFilter>, QueryRejection>,
) -> Result<Json<Vec<RoomRecord>>> {
    let Query(filter) = filter.map_err(|e| DirectoryError::Validation(e.body_text()))?;
    Ok(Json(directory.list_rooms(&caller, &filter)?))
}

async fn create_room(
    State(directory): State<Directory>,
    AuthUser(caller): AuthUser,
    payload: std::result::Result<Json<NewRoom>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomRecord>)> {
    let room = body(payload)?;
    let (record, created) = directory.create_room_record(&caller, room)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(record)))
}

async fn update_room(
    State(directory): State<Directory>,
    AuthUser(caller): AuthUser,
    Path(room_id): Path<String>,
    payload: std::result::Result<Json<RoomPatch>, JsonRejection>,
) -> Result<Json<RoomRecord>> {
    let patch = body(payload)?;
    let record = directory.update_room_record(&caller, &RoomId::from(room_id), patch)?;
    Ok(Json(record))
}

async fn delete_room(
    State(directory): State<Directory>,
    AuthUser(caller): AuthUser,
    Path(room_id): Path<String>,
) -> Result<StatusCode> {
    directory.delete_room_record(&caller, &RoomId::from(room_id))?;
    Ok(StatusCode::NO_CONTENT)
}
