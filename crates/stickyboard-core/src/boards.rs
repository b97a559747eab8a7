//! Board directory operations.

use crate::ephemeral::epoch_ms;
use crate::model::{Board, BoardId, UserId};
use crate::store::{DocumentStore, StoreError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board title must not be empty")]
    EmptyTitle,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create a board owned by `owner`. The title is validated before any
/// remote call is made.
pub fn create_board<S: DocumentStore>(
    store: &mut S,
    owner: UserId,
    title: &str,
) -> Result<Board, BoardError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BoardError::EmptyTitle);
    }
    let mut board = Board::new(title, owner);
    board.last_edited_ms = epoch_ms();
    store.upsert_board(board.id, board.to_document())?;
    Ok(board)
}

/// Boards owned by `owner`, most recently edited first.
pub fn list_boards<S: DocumentStore>(
    store: &mut S,
    owner: UserId,
) -> Result<Vec<Board>, BoardError> {
    let mut boards: Vec<Board> = store
        .list_boards(owner)?
        .iter()
        .map(|(id, doc)| Board::from_document(*id, doc))
        .collect();
    boards.sort_by_key(|b| std::cmp::Reverse(b.last_edited_ms));
    Ok(boards)
}

/// Bump the board's last-edited timestamp. Called after any content write
/// so the directory sorts active boards first.
pub fn touch_board<S: DocumentStore>(store: &mut S, id: BoardId) -> Result<(), BoardError> {
    store.upsert_board(id, json!({ "lastEdited": epoch_ms() }))?;
    Ok(())
}

/// Delete a board and return the owner's refreshed directory listing. On a
/// failed delete the listing is refetched anyway, so callers never render
/// an optimistic removal the backend rejected.
pub fn delete_board<S: DocumentStore>(
    store: &mut S,
    owner: UserId,
    id: BoardId,
) -> Result<Vec<Board>, BoardError> {
    if let Err(e) = store.delete_board(id) {
        log::warn!("board delete failed, refreshing listing: {}", e);
    }
    list_boards(store, owner)
}
