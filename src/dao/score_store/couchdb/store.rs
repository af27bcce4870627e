use std::{cmp::Reverse, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{GameEntity, RosterPlayerEntity, SlotEntity},
    score_store::{ChangeEvent, ScoreStore, subscription::TaskGuard},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    feed,
    models::{
        AllDocsResponse, BulkDeleteRequest, CouchDocument, DeletedDocument, RevisionOnly,
        game_doc_id, games_prefix, key_range, roster_doc_id, roster_prefix, slot_doc_id,
        slots_prefix,
    },
};

const CHANGE_FEED_CAPACITY: usize = 64;

/// HTTP access to one CouchDB database.
#[derive(Clone)]
pub(super) struct CouchEndpoint {
    client: Client,
    base_url: Url,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchEndpoint {
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.database);
            path.extend(segments);
        }
        url
    }

    pub(super) fn request(&self, method: Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(segments));
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    pub(super) fn database(&self) -> &str {
        &self.database
    }
}

/// [`ScoreStore`] backed by a CouchDB database. Every user's documents share the
/// database and are namespaced by an owner prefix in their identifier.
#[derive(Clone)]
pub struct CouchScoreStore {
    endpoint: CouchEndpoint,
    changes: broadcast::Sender<ChangeEvent>,
    _feed: Arc<TaskGuard>,
}

impl CouchScoreStore {
    /// Establish a connection to CouchDB, ensure the database exists and start
    /// following its change feed.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| CouchDaoError::InvalidBaseUrl {
                url: config.base_url.clone(),
            })?;
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let endpoint = CouchEndpoint {
            client,
            base_url,
            database,
            auth,
        };

        ensure_database(&endpoint).await?;

        let (changes, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let feed = tokio::spawn(feed::follow_changes(endpoint.clone(), changes.clone()));

        Ok(Self {
            endpoint,
            changes,
            _feed: Arc::new(TaskGuard::new(feed)),
        })
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .endpoint
            .request(Method::GET, &[doc_id])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .endpoint
            .request(Method::PUT, &[doc_id])
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    /// Insert or replace a document, reusing the stored revision when present.
    async fn upsert<T>(&self, doc_id: String, body: T) -> CouchResult<()>
    where
        T: Serialize,
    {
        let rev = self
            .get_document::<RevisionOnly>(&doc_id)
            .await?
            .map(|existing| existing.rev);
        let document = CouchDocument {
            id: doc_id.clone(),
            rev,
            body,
        };
        self.put_document(&doc_id, &document).await
    }

    /// Delete a document. Returns `false` when it did not exist.
    async fn delete_document(&self, doc_id: &str) -> CouchResult<bool> {
        let Some(existing) = self.get_document::<RevisionOnly>(doc_id).await? else {
            return Ok(false);
        };

        let response = self
            .endpoint
            .request(Method::DELETE, &[doc_id])
            .query(&[("rev", existing.rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let (start_key, end_key) = key_range(prefix);
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", start_key),
            ("endkey", end_key),
        ];

        let response = self
            .endpoint
            .request(Method::GET, &[ALL_DOCS])
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: row.id.clone(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn delete_games_of(&self, owner: &str, slot_id: Uuid) -> CouchResult<()> {
        const BULK_DOCS: &str = "_bulk_docs";
        let games = self
            .list_documents::<RevisionBody>(&games_prefix(owner, slot_id))
            .await?;
        if games.is_empty() {
            return Ok(());
        }

        let request = BulkDeleteRequest {
            docs: games
                .into_iter()
                .filter_map(|doc| {
                    doc.rev.map(|rev| DeletedDocument {
                        id: doc.id,
                        rev,
                        deleted: true,
                    })
                })
                .collect(),
        };

        let response = self
            .endpoint
            .request(Method::POST, &[BULK_DOCS])
            .json(&request)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            })
        }
    }
}

/// Body of a document we only need the revision of.
#[derive(Debug, serde::Deserialize)]
struct RevisionBody {}

async fn ensure_database(endpoint: &CouchEndpoint) -> CouchResult<()> {
    let database = endpoint.database().to_string();
    let response = endpoint
        .request(Method::GET, &[])
        .send()
        .await
        .map_err(|source| CouchDaoError::Database {
            database: database.clone(),
            step: "query",
            source,
        })?;

    match response.status() {
        StatusCode::OK => Ok(()),
        StatusCode::NOT_FOUND => {
            let create = endpoint
                .request(Method::PUT, &[])
                .send()
                .await
                .map_err(|source| CouchDaoError::Database {
                    database: database.clone(),
                    step: "create",
                    source,
                })?;
            if create.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::DatabaseStatus {
                    database,
                    status: create.status(),
                })
            }
        }
        other => Err(CouchDaoError::DatabaseStatus {
            database,
            status: other,
        }),
    }
}

impl ScoreStore for CouchScoreStore {
    fn list_slots(&self, owner: &str) -> BoxFuture<'static, StorageResult<Vec<SlotEntity>>> {
        let store = self.clone();
        let prefix = slots_prefix(owner);
        Box::pin(async move {
            let mut slots = store
                .list_documents::<SlotEntity>(&prefix)
                .await?
                .into_iter()
                .map(|doc| doc.body)
                .collect::<Vec<_>>();
            slots.sort_by_key(|slot| Reverse(slot.created_at));
            Ok(slots)
        })
    }

    fn find_slot(
        &self,
        owner: &str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SlotEntity>>> {
        let store = self.clone();
        let doc_id = slot_doc_id(owner, id);
        Box::pin(async move {
            let doc = store
                .get_document::<CouchDocument<SlotEntity>>(&doc_id)
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn save_slot(&self, owner: &str, slot: SlotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let doc_id = slot_doc_id(owner, slot.id);
        Box::pin(async move { store.upsert(doc_id, slot).await.map_err(Into::into) })
    }

    fn delete_slot(&self, owner: &str, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let owner = owner.to_owned();
        Box::pin(async move {
            store.delete_games_of(&owner, id).await?;
            Ok(store.delete_document(&slot_doc_id(&owner, id)).await?)
        })
    }

    fn list_games(
        &self,
        owner: &str,
        slot_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        let prefix = games_prefix(owner, slot_id);
        Box::pin(async move {
            let mut games = store
                .list_documents::<GameEntity>(&prefix)
                .await?
                .into_iter()
                .map(|doc| doc.body)
                .collect::<Vec<_>>();
            games.sort_by_key(|game| Reverse(game.game_number));
            Ok(games)
        })
    }

    fn save_game(&self, owner: &str, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let doc_id = game_doc_id(owner, game.slot_id, game.id);
        Box::pin(async move { store.upsert(doc_id, game).await.map_err(Into::into) })
    }

    fn list_roster(
        &self,
        owner: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<RosterPlayerEntity>>> {
        let store = self.clone();
        let prefix = roster_prefix(owner);
        Box::pin(async move {
            let mut roster = store
                .list_documents::<RosterPlayerEntity>(&prefix)
                .await?
                .into_iter()
                .map(|doc| doc.body)
                .collect::<Vec<_>>();
            roster.sort_by_key(|player| player.name.to_lowercase());
            Ok(roster)
        })
    }

    fn save_roster_player(
        &self,
        owner: &str,
        player: RosterPlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let doc_id = roster_doc_id(owner, player.id);
        Box::pin(async move { store.upsert(doc_id, player).await.map_err(Into::into) })
    }

    fn delete_roster_player(
        &self,
        owner: &str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let doc_id = roster_doc_id(owner, id);
        Box::pin(async move { Ok(store.delete_document(&doc_id).await?) })
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let database = store.endpoint.database().to_string();
            let response = store
                .endpoint
                .request(Method::GET, &[])
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: database.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: database,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { ensure_database(&store.endpoint).await.map_err(Into::into) })
    }
}
