//! Stored forum and thread documents.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;

use crate::server::error::ApiError;
use crate::server::{stored_document, ServerState};

/// GET /forum/forum/:id
pub(crate) async fn forum(
    State(state): State<Arc<ServerState>>,
    Path(forum_id): Path<String>,
) -> Result<Response, ApiError> {
    stored_document(&state, &["forum", "forum", &forum_id]).await
}

/// GET /forum/thread/:id
pub(crate) async fn thread(
    State(state): State<Arc<ServerState>>,
    Path(thread_id): Path<String>,
) -> Result<Response, ApiError> {
    stored_document(&state, &["forum", "thread", &thread_id]).await
}
