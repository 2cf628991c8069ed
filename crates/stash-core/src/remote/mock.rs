//! In-memory remote used by tests.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    EntityPayload, RemoteApi, RemoteError, RemoteFolder, RemotePage, RemoteQuery, RemoteResult,
    RemoteSnippet,
};
use crate::models::{EntityId, EntityKind, ListFilters};
use crate::util::now_ms;

type InFlightHook =
    Box<dyn Fn(EntityPayload) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(EntityKind),
    Update(EntityKind, EntityId),
    Delete(EntityKind, EntityId),
    List,
    Get(EntityId),
}

#[derive(Default)]
struct State {
    snippets: BTreeMap<EntityId, RemoteSnippet>,
    folders: BTreeMap<EntityId, RemoteFolder>,
    next_id: u64,
    offline: bool,
    failing_bodies: HashSet<String>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct MockRemote {
    state: Mutex<State>,
    in_flight: Mutex<Option<InFlightHook>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a network error while offline
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Creates and updates whose snippet body or folder name equals `text` fail
    pub fn fail_for(&self, text: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_bodies
            .insert(text.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing_bodies.clear();
    }

    /// Run `hook` between receiving a create/update and answering it, once.
    pub fn on_next_write<F, Fut>(&self, hook: F)
    where
        F: Fn(EntityPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.in_flight.lock().unwrap() = Some(Box::new(move |payload| Box::pin(hook(payload))));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn snippets(&self) -> Vec<RemoteSnippet> {
        self.state
            .lock()
            .unwrap()
            .snippets
            .values()
            .cloned()
            .collect()
    }

    pub fn folders(&self) -> Vec<RemoteFolder> {
        self.state
            .lock()
            .unwrap()
            .folders
            .values()
            .cloned()
            .collect()
    }

    pub fn snippet(&self, id: &EntityId) -> Option<RemoteSnippet> {
        self.state.lock().unwrap().snippets.get(id).cloned()
    }

    /// Seed a server-side snippet that the client has never seen
    pub fn insert_snippet(&self, snippet: RemoteSnippet) {
        self.state
            .lock()
            .unwrap()
            .snippets
            .insert(snippet.id.clone(), snippet);
    }

    fn check(&self, call: Call, payload: Option<&EntityPayload>) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.offline {
            return Err(RemoteError::Network("offline".to_string()));
        }
        let text = match payload {
            Some(EntityPayload::Snippet(payload)) => Some(payload.body.as_str()),
            Some(EntityPayload::Folder(payload)) => Some(payload.name.as_str()),
            None => None,
        };
        if text.is_some_and(|text| state.failing_bodies.contains(text)) {
            return Err(RemoteError::Server {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn run_in_flight_hook(&self, payload: &EntityPayload) {
        let hook = self.in_flight.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(payload.clone()).await;
        }
    }
}

fn apply(state: &mut State, id: &EntityId, payload: &EntityPayload, created_at: i64) {
    let now = now_ms();
    match payload {
        EntityPayload::Snippet(payload) => {
            state.snippets.insert(
                id.clone(),
                RemoteSnippet {
                    id: id.clone(),
                    body: payload.body.clone(),
                    tags: payload.tags.clone(),
                    folder_id: payload.folder_id.clone(),
                    created_at,
                    updated_at: now,
                },
            );
        }
        EntityPayload::Folder(payload) => {
            state.folders.insert(
                id.clone(),
                RemoteFolder {
                    id: id.clone(),
                    name: payload.name.clone(),
                    color: payload.color.clone(),
                    icon: payload.icon.clone(),
                    parent_id: payload.parent_id.clone(),
                    position: payload.position,
                    created_at,
                    updated_at: now,
                },
            );
        }
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn create(&self, payload: &EntityPayload) -> RemoteResult<EntityId> {
        self.check(Call::Create(payload.kind()), Some(payload))?;
        self.run_in_flight_hook(payload).await;

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = EntityId::from(format!("srv-{}-{}", payload.kind(), state.next_id));
        apply(&mut state, &id, payload, now_ms());
        Ok(id)
    }

    async fn update(&self, id: &EntityId, payload: &EntityPayload) -> RemoteResult<()> {
        self.check(Call::Update(payload.kind(), id.clone()), Some(payload))?;
        self.run_in_flight_hook(payload).await;

        let mut state = self.state.lock().unwrap();
        let created_at = match payload.kind() {
            EntityKind::Snippet => state.snippets.get(id).map(|s| s.created_at),
            EntityKind::Folder => state.folders.get(id).map(|f| f.created_at),
        }
        .ok_or(RemoteError::NotFound)?;
        apply(&mut state, id, payload, created_at);
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> RemoteResult<()> {
        self.check(Call::Delete(kind, id.clone()), None)?;
        let mut state = self.state.lock().unwrap();
        let removed = match kind {
            EntityKind::Snippet => state.snippets.remove(id).is_some(),
            EntityKind::Folder => state.folders.remove(id).is_some(),
        };
        if removed {
            Ok(())
        } else {
            Err(RemoteError::NotFound)
        }
    }

    async fn list_snippets(&self, query: &RemoteQuery) -> RemoteResult<RemotePage<RemoteSnippet>> {
        self.check(Call::List, None)?;
        let state = self.state.lock().unwrap();
        let mut rows = state
            .snippets
            .values()
            .filter(|snippet| {
                query
                    .folder_id
                    .as_ref()
                    .map_or(true, |folder| snippet.folder_id.as_ref() == Some(folder))
            })
            .filter(|snippet| {
                query
                    .tag
                    .as_ref()
                    .map_or(true, |tag| snippet.tags.contains(tag))
            })
            .filter(|snippet| {
                query.query.as_ref().map_or(true, |text| {
                    snippet
                        .body
                        .to_lowercase()
                        .contains(&text.trim().to_lowercase())
                })
            })
            .cloned()
            .map(|remote| (remote.clone().into_snippet(), remote))
            .collect::<Vec<_>>();
        let order = ListFilters {
            sort_by: query.sort_by,
            sort_order: query.sort_order,
            ..ListFilters::default()
        };
        rows.sort_by(|left, right| order.compare(&left.0, &right.0));

        // Cursors are plain offsets into the sorted rows.
        let offset = query
            .cursor
            .as_deref()
            .map_or(0, |cursor| cursor.parse::<usize>().unwrap());
        let total = rows.len();
        let end = offset.saturating_add(query.limit).min(total);
        Ok(RemotePage {
            items: rows
                .into_iter()
                .skip(offset)
                .take(query.limit)
                .map(|(_, remote)| remote)
                .collect(),
            next_cursor: (end < total).then(|| end.to_string()),
        })
    }

    async fn list_folders(&self) -> RemoteResult<Vec<RemoteFolder>> {
        self.check(Call::List, None)?;
        Ok(self.folders())
    }

    async fn get_snippet(&self, id: &EntityId) -> RemoteResult<RemoteSnippet> {
        self.check(Call::Get(id.clone()), None)?;
        self.snippet(id).ok_or(RemoteError::NotFound)
    }
}
