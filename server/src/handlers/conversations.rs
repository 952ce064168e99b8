//! Messaging desk handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use barangay_core::{Conversation, ConversationKey, Message, MessagingDesk, USERS_ROOT};

use crate::{
    database::Database,
    error::{AppError, Result},
    models::*,
    AppState,
};

use super::AuthUser;

/// A desk mirroring the current `users` subtree.
async fn load_desk(state: &AppState) -> Result<MessagingDesk<Arc<Database>>> {
    let users = state.db.value_at(USERS_ROOT).await?;
    let mut desk = MessagingDesk::new(Arc::clone(&state.db));
    desk.apply_snapshot(&users);
    Ok(desk)
}

pub async fn list_conversations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Conversation>>> {
    let desk = load_desk(&state).await?;
    let term = query.search.unwrap_or_default();

    Ok(Json(desk.search(&term).into_iter().cloned().collect()))
}

/// Open a conversation: every unread citizen message flips to read in one
/// write. Returns the conversation as it now stands.
pub async fn open_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, complaint_id)): Path<(String, String)>,
) -> Result<Json<Conversation>> {
    let key = ConversationKey::new(&user_id, &complaint_id);
    let mut desk = load_desk(&state).await?;

    let before = desk.find(&key).map(|c| c.unread_count).unwrap_or(0);
    desk.open_conversation(&key).await?;

    let conversation = desk
        .open_conversation_view()
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("conversation {}/{}", user_id, complaint_id)))?;

    if before > 0 {
        tracing::info!(
            "{} read {} message(s) in {}/{}",
            auth.email,
            before,
            user_id,
            complaint_id
        );
    }

    Ok(Json(conversation))
}

pub async fn reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, complaint_id)): Path<(String, String)>,
    Json(req): Json<ReplyRequest>,
) -> Result<Json<Message>> {
    let limit = state.config.limits.max_message_length;
    if req.text.trim().chars().count() > limit {
        return Err(AppError::BadRequest(format!(
            "reply is longer than {} characters",
            limit
        )));
    }

    let key = ConversationKey::new(&user_id, &complaint_id);
    let mut desk = load_desk(&state).await?;
    let message = desk.send_reply(&key, &req.text).await?;

    tracing::info!("{} replied in {}/{}", auth.email, user_id, complaint_id);

    Ok(Json(message))
}
