use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use herald_db::Database;
use herald_notify::dispatcher::Dispatcher;
use herald_notify::hooks::HookRegistry;
use herald_notify::settings::{SettingValue, Settings};
use herald_types::api::{
    AddMemberRequest, CreateRoomRequest, CreateRoomResponse, EditMessageRequest, SendMessageRequest,
    SetHighlightsRequest, UpdateSettingRequest,
};
use herald_types::models::{Message, Room};

use crate::gateway;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub hooks: HookRegistry,
    pub settings: Settings,
    pub dispatcher: Dispatcher,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}/members", post(add_member))
        .route("/rooms/{room_id}/messages", post(send_message))
        .route("/rooms/{room_id}/messages/{message_id}", patch(edit_message))
        .route("/rooms/{room_id}/subscriptions", get(list_subscriptions))
        .route("/rooms/{room_id}/subscriptions/{user_id}/highlights", put(set_highlights))
        .route("/teams/{team_id}/members", post(add_team_member))
        .route("/settings/{key}", put(update_setting))
        .route("/users/{user_id}/events", get(user_events))
        .with_state(state)
}

/// Run a blocking DB call off the async runtime, mapping failures to 500.
async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("database error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn load_room(state: &AppState, room_id: &str) -> Result<Room, StatusCode> {
    let rid = room_id.to_string();
    blocking(state, move |db| db.get_room(&rid))
        .await?
        .ok_or(StatusCode::NOT_FOUND)
}

/// Hook failures never undo the save; they are logged and the request succeeds.
async fn run_after_save(state: &AppState, message: Message, room: Room) {
    let message_id = message.id.clone();
    if let Err(e) = state.hooks.run(Arc::new(message), Arc::new(room)).await {
        error!("after-save hooks failed for message {}: {:#}", message_id, e);
    }
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let room_id = Uuid::new_v4().to_string();

    let rid = room_id.clone();
    blocking(&state, move |db| db.create_room(&rid, req.kind, &req.member_ids)).await?;

    info!("Room {} created", room_id);
    Ok((StatusCode::CREATED, Json(CreateRoomResponse { id: room_id })))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<StatusCode, StatusCode> {
    load_room(&state, &room_id).await?;
    blocking(&state, move |db| db.add_room_member(&room_id, &req.user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.body.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let room = load_room(&state, &room_id).await?;
    if !room.member_ids.contains(&req.sender_id) {
        return Err(StatusCode::FORBIDDEN);
    }

    // Replies may only attach to a parent in the same room
    if let Some(thread_id) = req.thread_id.clone() {
        let parent = blocking(&state, move |db| db.get_message(&thread_id)).await?;
        if parent.is_none_or(|p| p.room_id != room.id) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let mut message = Message::new(Uuid::new_v4().to_string(), room_id, req.sender_id, req.body);
    message.thread_id = req.thread_id;
    message.show_in_room = req.show_in_room;
    message.mentions = req.mentions;
    if let Some(created_at) = req.created_at {
        message.created_at = created_at;
    }

    let msg = message.clone();
    blocking(&state, move |db| db.insert_message(&msg)).await?;

    run_after_save(&state, message.clone(), room).await;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(String, String)>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let room = load_room(&state, &room_id).await?;

    let edited_at = chrono::Utc::now();
    let rid = room.id.clone();
    let message = blocking(&state, move |db| {
        if !db.edit_message(&rid, &message_id, &req.body, req.mentions.as_deref(), &edited_at)? {
            return Ok(None);
        }
        db.get_message(&message_id)
    })
    .await?
    .ok_or(StatusCode::NOT_FOUND)?;

    run_after_save(&state, message.clone(), room).await;

    Ok(Json(message))
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    load_room(&state, &room_id).await?;
    let subs = blocking(&state, move |db| db.list_subscriptions(&room_id)).await?;
    Ok(Json(subs))
}

pub async fn set_highlights(
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
    Json(req): Json<SetHighlightsRequest>,
) -> Result<StatusCode, StatusCode> {
    let updated = blocking(&state, move |db| db.set_highlights(&room_id, &user_id, &req.highlights)).await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

pub async fn add_team_member(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<StatusCode, StatusCode> {
    blocking(&state, move |db| db.add_team_member(&team_id, &req.user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> Result<StatusCode, StatusCode> {
    let value = match req.value {
        serde_json::Value::Bool(b) => SettingValue::Bool(b),
        serde_json::Value::String(s) => SettingValue::Str(s),
        _ => return Err(StatusCode::BAD_REQUEST),
    };

    state.settings.set(&key, value).map_err(|e| {
        warn!("Rejected setting {}: {}", key, e);
        StatusCode::BAD_REQUEST
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Realtime event stream for one user: broadcasts plus events targeted at them.
pub async fn user_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| gateway::handle_connection(socket, dispatcher, user_id))
}
