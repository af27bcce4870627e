#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
pub mod subscription;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::models::{GameEntity, RosterPlayerEntity, SlotEntity};
use crate::dao::storage::StorageResult;

/// Collection touched by a write, used to route change notifications to the
/// subscriptions that watch it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionPath {
    /// `slots` of a user.
    Slots { owner: String },
    /// `slots/{slot_id}/games` of a user.
    Games { owner: String, slot_id: Uuid },
    /// `roster` of a user.
    Roster { owner: String },
}

/// Notification emitted after a collection changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: CollectionPath,
}

/// Abstraction over the per-user document store holding slots, games and the roster.
///
/// Listing operations return documents in their display order: slots newest
/// first, games by descending game number, roster entries by name.
pub trait ScoreStore: Send + Sync {
    fn list_slots(&self, owner: &str) -> BoxFuture<'static, StorageResult<Vec<SlotEntity>>>;
    fn find_slot(&self, owner: &str, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<SlotEntity>>>;
    fn save_slot(&self, owner: &str, slot: SlotEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a slot together with its games. Returns `false` when the slot did not exist.
    fn delete_slot(&self, owner: &str, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_games(
        &self,
        owner: &str,
        slot_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Insert or overwrite a game record in place.
    fn save_game(&self, owner: &str, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_roster(&self, owner: &str)
    -> BoxFuture<'static, StorageResult<Vec<RosterPlayerEntity>>>;
    fn save_roster_player(
        &self,
        owner: &str,
        player: RosterPlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_roster_player(&self, owner: &str, id: Uuid)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Register a new listener for change notifications.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
