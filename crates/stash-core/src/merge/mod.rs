//! Read path: remote snapshot merged with locally pending records.
//!
//! A record with an unpushed local edit is shown with the edit, and a record
//! pending remote deletion never reappears. When the remote cannot be reached,
//! reads degrade to the local store.

use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::AuthState;
use crate::models::{EntityId, Folder, ListFilters, Snippet, SyncEntity};
use crate::remote::{RemoteApi, RemoteError, RemoteQuery, RemoteResult};
use crate::services::LocalStore;
use crate::{Error, Result};

/// Page size used when the filters carry no explicit limit
pub const DEFAULT_PAGE_SIZE: usize = 100;

pub struct MergeView {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    auth: Arc<dyn AuthState>,
    page_size: usize,
}

/// One page of a merged snippet listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedPage {
    pub items: Vec<Snippet>,
    /// Pass back as [`ListFilters::cursor`] to read the next page; `None` on the last one
    pub next_cursor: Option<String>,
}

/// Where a listing resumes: a remote cursor, then rows to skip after it.
///
/// Encoded as `<skip>:<remote cursor>`. Local listings use `skip` as an offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PageCursor {
    remote: Option<String>,
    skip: usize,
}

impl PageCursor {
    fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("invalid page cursor: {raw}"));
        let (skip, remote) = raw.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            remote: (!remote.is_empty()).then(|| remote.to_string()),
            skip: skip.parse().map_err(|_| invalid())?,
        })
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.skip, self.remote.as_deref().unwrap_or_default())
    }
}

/// A remote row that survived shadowing, with the position it was read at
struct RemoteRow {
    snippet: Snippet,
    at: PageCursor,
}

/// Ids that name the folder a listing is filtered by
struct FolderScope {
    ids: HashSet<EntityId>,
    /// `None` when the folder has never reached the remote store
    server_id: Option<EntityId>,
}

fn in_listing(filters: &ListFilters, scope: Option<&FolderScope>, snippet: &Snippet) -> bool {
    filters.matches_text(snippet)
        && scope.map_or(true, |scope| scope.contains(snippet.folder_id.as_ref()))
}

impl FolderScope {
    fn contains(&self, folder_id: Option<&EntityId>) -> bool {
        folder_id.is_some_and(|folder_id| self.ids.contains(folder_id))
    }
}

impl MergeView {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteApi>, auth: Arc<dyn AuthState>) -> Self {
        Self {
            store,
            remote,
            auth,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// One page of snippets matching `filters`, sorted as requested.
    ///
    /// `limit` (the page size when unset) bounds the page after the merge.
    /// Pending local records join the first page only, i.e. when `cursor` is unset.
    pub async fn list(&self, filters: &ListFilters) -> Result<MergedPage> {
        let start = filters
            .cursor
            .as_deref()
            .map(PageCursor::parse)
            .transpose()?
            .unwrap_or_default();
        let page_len = filters.limit.unwrap_or(self.page_size);
        if page_len == 0 {
            return Ok(MergedPage::default());
        }

        let scope = self.folder_scope(filters.folder_id.as_ref()).await?;
        let matches = |snippet: &Snippet| in_listing(filters, scope.as_ref(), snippet);

        if !self.auth.is_authenticated() {
            return self.list_local(filters, &start, page_len, matches).await;
        }

        // A local change hides the remote copy whether or not the change still matches.
        let pending = self.store.pending_push::<Snippet>().await?;
        let tombstones = self.store.pending_delete::<Snippet>().await?;
        let hidden = shadowed_server_ids(&pending, &tombstones);

        let (remote_rows, remote_next) = match &scope {
            // The remote store cannot hold anything filed under a folder it never saw.
            Some(FolderScope {
                server_id: None, ..
            }) => (Vec::new(), None),
            _ => {
                let query = RemoteQuery::from_filters(
                    filters,
                    scope.as_ref().and_then(|scope| scope.server_id.clone()),
                    page_len,
                );
                match self
                    .fetch_remote(query, start.clone(), page_len, &hidden)
                    .await
                {
                    Ok(fetched) => fetched,
                    Err(error) => {
                        tracing::warn!("Remote list failed, showing local snippets: {}", error);
                        return self.list_local(filters, &start, page_len, matches).await;
                    }
                }
            }
        };

        let mut merged = remote_rows
            .into_iter()
            .enumerate()
            .map(|(order, row)| (row.snippet, Some((order, row.at))))
            .collect::<Vec<_>>();
        if filters.cursor.is_none() {
            merged.extend(
                pending
                    .into_iter()
                    .filter(|snippet| matches(snippet))
                    .map(|snippet| (snippet, None)),
            );
        }
        merged.sort_by(|left, right| filters.compare(&left.0, &right.0));

        // The next page starts at the earliest remote row that did not fit.
        let overflow = merged.split_off(page_len.min(merged.len()));
        let next = overflow
            .into_iter()
            .filter_map(|(_, origin)| origin)
            .min_by_key(|(order, _)| *order)
            .map(|(_, at)| at)
            .or(remote_next);

        Ok(MergedPage {
            items: merged.into_iter().map(|(snippet, _)| snippet).collect(),
            next_cursor: next.as_ref().map(PageCursor::encode),
        })
    }

    /// Every snippet matching `filters`, following cursors to the last page.
    ///
    /// `limit` and `cursor` on the input are ignored.
    pub async fn list_all(&self, filters: &ListFilters) -> Result<Vec<Snippet>> {
        let mut filters = ListFilters {
            limit: None,
            cursor: None,
            ..filters.clone()
        };
        let mut seen = HashSet::new();
        let mut snippets = Vec::new();
        loop {
            let page = self.list(&filters).await?;
            snippets.extend(
                page.items
                    .into_iter()
                    .filter(|snippet| seen.insert(snippet.id.clone())),
            );
            match page.next_cursor {
                Some(next) if filters.cursor.as_ref() != Some(&next) => {
                    filters.cursor = Some(next);
                }
                _ => break,
            }
        }
        if self.auth.is_authenticated() {
            // The first page keeps only `page_size` of the pending records.
            let scope = self.folder_scope(filters.folder_id.as_ref()).await?;
            snippets.extend(
                self.store
                    .pending_push::<Snippet>()
                    .await?
                    .into_iter()
                    .filter(|snippet| in_listing(&filters, scope.as_ref(), snippet))
                    .filter(|snippet| seen.insert(snippet.id.clone())),
            );
        }
        snippets.sort_by(|left, right| filters.compare(left, right));
        Ok(snippets)
    }

    /// Fetch one snippet by any id a caller may hold.
    ///
    /// A locally tombstoned snippet is `None` even while the remote still has it.
    pub async fn get(&self, id: &EntityId) -> Result<Option<Snippet>> {
        let resolved = self.store.resolve(id).await?;
        let local = self.store.find::<Snippet>(&resolved).await?;

        match &local {
            Some(snippet) if snippet.deleted => return Ok(None),
            Some(snippet) if snippet.is_pending() || !self.auth.is_authenticated() => {
                return Ok(local);
            }
            None if !self.auth.is_authenticated() => return Ok(None),
            _ => {}
        }

        let remote_id = local
            .as_ref()
            .and_then(|snippet| snippet.server_id.clone())
            .unwrap_or(resolved);
        match self.remote.get_snippet(&remote_id).await {
            Ok(remote) => Ok(Some(remote.into_snippet())),
            Err(RemoteError::NotFound) => Ok(None),
            Err(error) => {
                if local.is_some() {
                    tracing::warn!("Remote get failed, showing local copy: {}", error);
                    Ok(local)
                } else {
                    Err(error.into())
                }
            }
        }
    }

    /// All folders, ordered by position then name.
    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        let mut folders = if self.auth.is_authenticated() {
            match self.remote.list_folders().await {
                Ok(remote) => {
                    let pending = self.store.pending_push::<Folder>().await?;
                    let tombstones = self.store.pending_delete::<Folder>().await?;
                    merge_records(
                        pending,
                        &tombstones,
                        remote.into_iter().map(crate::remote::RemoteFolder::into_folder).collect(),
                    )
                }
                Err(error) => {
                    tracing::warn!("Remote folder list failed, showing local folders: {}", error);
                    self.store.list_folders().await?
                }
            }
        } else {
            self.store.list_folders().await?
        };

        folders.sort_by(|left, right| {
            left.position
                .cmp(&right.position)
                .then_with(|| left.name.to_lowercase().cmp(&right.name.to_lowercase()))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(folders)
    }

    /// Read remote rows from `start` until `want` unshadowed rows are collected.
    ///
    /// Each request asks only for the rows still missing, so every row read is
    /// either kept or shadowed and the returned position resumes right after them.
    async fn fetch_remote(
        &self,
        base: RemoteQuery,
        start: PageCursor,
        want: usize,
        hidden: &HashSet<EntityId>,
    ) -> RemoteResult<(Vec<RemoteRow>, Option<PageCursor>)> {
        let mut rows = Vec::new();
        let mut position = start;
        while rows.len() < want {
            let query = RemoteQuery {
                limit: want - rows.len() + position.skip,
                cursor: position.remote.clone(),
                ..base.clone()
            };
            let page = self.remote.list_snippets(&query).await?;
            if page.items.is_empty() {
                return Ok((rows, None));
            }
            for (index, item) in page.items.into_iter().enumerate().skip(position.skip) {
                if hidden.contains(&item.id) {
                    continue;
                }
                rows.push(RemoteRow {
                    snippet: item.into_snippet(),
                    at: PageCursor {
                        remote: position.remote.clone(),
                        skip: index,
                    },
                });
            }
            let Some(next) = page.next_cursor else {
                return Ok((rows, None));
            };
            position = PageCursor {
                remote: Some(next),
                skip: 0,
            };
        }
        Ok((rows, Some(position)))
    }

    async fn list_local(
        &self,
        filters: &ListFilters,
        start: &PageCursor,
        page_len: usize,
        matches: impl Fn(&Snippet) -> bool,
    ) -> Result<MergedPage> {
        let mut snippets = self
            .store
            .list_snippets()
            .await?
            .into_iter()
            .filter(|snippet| matches(snippet))
            .collect::<Vec<_>>();
        snippets.sort_by(|left, right| filters.compare(left, right));

        let end = start.skip.saturating_add(page_len);
        let next_cursor = (end < snippets.len()).then(|| {
            PageCursor {
                remote: None,
                skip: end,
            }
            .encode()
        });
        Ok(MergedPage {
            items: snippets.into_iter().skip(start.skip).take(page_len).collect(),
            next_cursor,
        })
    }

    /// Every id the requested folder may appear under, and its server id.
    async fn folder_scope(&self, folder_id: Option<&EntityId>) -> Result<Option<FolderScope>> {
        let Some(folder_id) = folder_id else {
            return Ok(None);
        };
        let mut ids = HashSet::from([folder_id.clone()]);
        let Some(folder) = self.store.find::<Folder>(folder_id).await? else {
            // Unknown locally; assume the caller holds a server id.
            return Ok(Some(FolderScope {
                ids,
                server_id: Some(folder_id.clone()),
            }));
        };
        ids.insert(folder.id.clone());
        if let Some(server_id) = &folder.server_id {
            ids.insert(server_id.clone());
        }
        Ok(Some(FolderScope {
            ids,
            server_id: folder.server_id,
        }))
    }
}

/// Server ids whose remote copy is superseded by a local edit or tombstone.
fn shadowed_server_ids<T: SyncEntity>(pending: &[T], tombstones: &[T]) -> HashSet<EntityId> {
    pending
        .iter()
        .chain(tombstones)
        .filter_map(|record| record.server_id().cloned())
        .collect()
}

/// Pending local records plus every remote record not shadowed by one of them
/// or by a local tombstone.
fn merge_records<T: SyncEntity>(pending: Vec<T>, tombstones: &[T], remote: Vec<T>) -> Vec<T> {
    let hidden = shadowed_server_ids(&pending, tombstones);
    let mut merged = pending;
    merged.extend(
        remote
            .into_iter()
            .filter(|record| !hidden.contains(record.id())),
    );
    merged
}
