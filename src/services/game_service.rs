use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::RosterPlayerEntity,
    dto::{
        common::Identity,
        game::{BoardChargeRequest, PointsRequest, RotationRequest, SelectionRequest, StartGameRequest},
        slot::SlotView,
    },
    error::ServiceError,
    services::{sse_events, workspace_service},
    state::{SharedState, board::SlotBoard, transitions::run_transition},
};

/// Current view of the slot opened on the caller's device.
pub async fn slot_view(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
) -> Result<SlotView, ServiceError> {
    let workspace = workspace_service::acquire(state, identity).await?;
    let mut guard = workspace.lock().await;
    let board = guard.board_mut(slot_id)?;
    Ok(SlotView::from(&*board))
}

/// Replace the players chosen for the next game.
pub async fn set_selection(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    request: SelectionRequest,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, roster| {
        board.set_selection(request.players, roster)
    })
    .await
}

/// Add a roster player to the selection, or remove them when already selected.
pub async fn toggle_selection(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    name: String,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, roster| {
        board.toggle_selection(&name, roster)
    })
    .await
}

/// Start a pending game from the selection. Nothing is written until settlement.
pub async fn start_game(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    request: StartGameRequest,
) -> Result<SlotView, ServiceError> {
    let is_rotation = request.is_rotation_game.unwrap_or(false);
    let board_charge = request
        .board_charge
        .unwrap_or(state.config().default_board_charge);

    with_board(state, identity, slot_id, |board, roster| {
        let session = board.start_game(roster, is_rotation, board_charge)?;
        info!(
            slot_id = %slot_id,
            game_number = session.game_number,
            players = session.players.len(),
            board_charge,
            "game started"
        );
        Ok(())
    })
    .await
}

/// Record the points lost by one player of the game being entered.
pub async fn set_points(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    name: String,
    request: PointsRequest,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, _| {
        board.set_points(&name, request.points)
    })
    .await
}

/// Mark a player as having left the game being entered.
pub async fn drop_player(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    name: String,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, _| {
        board.drop_player(&name)?;
        info!(slot_id = %slot_id, player = %name, "player dropped");
        Ok(())
    })
    .await
}

pub async fn set_rotation(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    request: RotationRequest,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, _| {
        board.set_rotation(request.value)
    })
    .await
}

pub async fn set_board_charge(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    request: BoardChargeRequest,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, _| {
        board.set_board_charge(request.value)
    })
    .await
}

/// Re-open the most recently settled game of the slot for correction.
pub async fn begin_edit(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    game_id: Uuid,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, _| {
        let session = board.begin_edit(game_id)?;
        info!(slot_id = %slot_id, game_number = session.game_number, "editing settled game");
        Ok(())
    })
    .await
}

/// Discard the pending game or the edit without writing anything.
pub async fn cancel(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
) -> Result<SlotView, ServiceError> {
    with_board(state, identity, slot_id, |board, _| {
        board.cancel()?;
        info!(slot_id = %slot_id, "game entry cancelled");
        Ok(())
    })
    .await
}

/// Settle the pending game, or save the edit, and write the record.
///
/// The board only moves on once the store accepted the write; on failure or
/// timeout the entered values stay in place so the user can retry.
pub async fn settle(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
) -> Result<SlotView, ServiceError> {
    let workspace = workspace_service::acquire(state, identity).await?;
    let mut guard = workspace.lock().await;
    let store = guard.store();
    let owner = guard.owner().to_string();

    let (board, roster) = guard.board_and_roster(slot_id)?;
    let (event, record) = board.prepare_settlement(SystemTime::now())?;
    let write = record.clone();

    run_transition(
        board.machine_mut(),
        event,
        state.transition_timeout(),
        move || async move {
            store
                .save_game(&owner, write)
                .await
                .map_err(ServiceError::from)
        },
    )
    .await?;

    info!(
        slot_id = %slot_id,
        game_id = %record.id,
        game_number = record.game_number,
        winner = record.winner_player_name.as_deref().unwrap_or_default(),
        points_transferred = record.points_transferred,
        "game settled"
    );
    board.complete_settlement(record, roster)?;
    let view = SlotView::from(&*board);

    sse_events::publish_slot_view(&guard);
    Ok(view)
}

/// Run a synchronous board operation and publish the resulting view.
async fn with_board<F>(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
    operation: F,
) -> Result<SlotView, ServiceError>
where
    F: FnOnce(&mut SlotBoard, &[RosterPlayerEntity]) -> Result<(), ServiceError>,
{
    let workspace = workspace_service::acquire(state, identity).await?;
    let mut guard = workspace.lock().await;
    let (board, roster) = guard.board_and_roster(slot_id)?;
    operation(board, roster)?;
    let view = SlotView::from(&*board);

    sse_events::publish_slot_view(&guard);
    Ok(view)
}
