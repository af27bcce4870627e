//! Process-local [`ScoreStore`] used by default and by the test-suite.

use std::{
    cmp::Reverse,
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{GameEntity, RosterPlayerEntity, SlotEntity},
    score_store::{ChangeEvent, CollectionPath, ScoreStore},
    storage::{StorageError, StorageResult},
};

const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Debug, Default, Clone)]
struct OwnerData {
    slots: IndexMap<Uuid, SlotEntity>,
    games: HashMap<Uuid, IndexMap<Uuid, GameEntity>>,
    roster: IndexMap<Uuid, RosterPlayerEntity>,
}

/// In-memory document store keyed by owner.
#[derive(Clone)]
pub struct MemoryScoreStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    owners: DashMap<String, OwnerData>,
    changes: broadcast::Sender<ChangeEvent>,
    offline: AtomicBool,
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                owners: DashMap::new(),
                changes,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate a connectivity loss: every operation fails until switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live change listeners (one per open subscription).
    pub fn listener_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store is offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "offline"),
            ));
        }
        Ok(())
    }

    fn notify(&self, path: CollectionPath) {
        let _ = self.inner.changes.send(ChangeEvent { path });
    }

    fn read<T>(&self, owner: &str, f: impl FnOnce(&OwnerData) -> T) -> StorageResult<T> {
        self.ensure_online()?;
        Ok(match self.inner.owners.get(owner) {
            Some(data) => f(data.value()),
            None => f(&OwnerData::default()),
        })
    }

    fn write<T>(&self, owner: &str, f: impl FnOnce(&mut OwnerData) -> T) -> StorageResult<T> {
        self.ensure_online()?;
        let mut entry = self.inner.owners.entry(owner.to_owned()).or_default();
        Ok(f(entry.value_mut()))
    }
}

fn ready<T: Send + 'static>(value: StorageResult<T>) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(async move { value })
}

impl ScoreStore for MemoryScoreStore {
    fn list_slots(&self, owner: &str) -> BoxFuture<'static, StorageResult<Vec<SlotEntity>>> {
        ready(self.read(owner, |data| {
            let mut slots = data.slots.values().cloned().collect::<Vec<_>>();
            slots.sort_by_key(|slot| Reverse(slot.created_at));
            slots
        }))
    }

    fn find_slot(
        &self,
        owner: &str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SlotEntity>>> {
        ready(self.read(owner, |data| data.slots.get(&id).cloned()))
    }

    fn save_slot(&self, owner: &str, slot: SlotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.write(owner, |data| {
            data.slots.insert(slot.id, slot);
        });
        if result.is_ok() {
            self.notify(CollectionPath::Slots {
                owner: owner.to_owned(),
            });
        }
        ready(result)
    }

    fn delete_slot(&self, owner: &str, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let result = self.write(owner, |data| {
            let removed = data.slots.shift_remove(&id).is_some();
            let had_games = data.games.remove(&id).is_some_and(|games| !games.is_empty());
            (removed, had_games)
        });

        ready(result.map(|(removed, had_games)| {
            if had_games {
                self.notify(CollectionPath::Games {
                    owner: owner.to_owned(),
                    slot_id: id,
                });
            }
            if removed {
                self.notify(CollectionPath::Slots {
                    owner: owner.to_owned(),
                });
            }
            removed
        }))
    }

    fn list_games(
        &self,
        owner: &str,
        slot_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        ready(self.read(owner, |data| {
            let mut games = data
                .games
                .get(&slot_id)
                .map(|games| games.values().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            games.sort_by_key(|game| Reverse(game.game_number));
            games
        }))
    }

    fn save_game(&self, owner: &str, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let slot_id = game.slot_id;
        let result = self.write(owner, |data| {
            data.games.entry(slot_id).or_default().insert(game.id, game);
        });
        if result.is_ok() {
            self.notify(CollectionPath::Games {
                owner: owner.to_owned(),
                slot_id,
            });
        }
        ready(result)
    }

    fn list_roster(
        &self,
        owner: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<RosterPlayerEntity>>> {
        ready(self.read(owner, |data| {
            let mut roster = data.roster.values().cloned().collect::<Vec<_>>();
            roster.sort_by_key(|player| player.name.to_lowercase());
            roster
        }))
    }

    fn save_roster_player(
        &self,
        owner: &str,
        player: RosterPlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.write(owner, |data| {
            data.roster.insert(player.id, player);
        });
        if result.is_ok() {
            self.notify(CollectionPath::Roster {
                owner: owner.to_owned(),
            });
        }
        ready(result)
    }

    fn delete_roster_player(
        &self,
        owner: &str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let result = self.write(owner, |data| data.roster.shift_remove(&id).is_some());
        if let Ok(true) = result {
            self.notify(CollectionPath::Roster {
                owner: owner.to_owned(),
            });
        }
        ready(result)
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(self.ensure_online())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(self.ensure_online())
    }
}
