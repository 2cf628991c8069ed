//! REST client for the remote snippet store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    EntityPayload, RemoteApi, RemoteError, RemoteFolder, RemotePage, RemoteQuery, RemoteResult,
    RemoteSnippet,
};
use crate::models::{EntityId, EntityKind};
use crate::util::{excerpt, non_blank, parse_endpoint, EndpointError};

/// JSON-over-HTTP implementation of [`RemoteApi`]
#[derive(Clone)]
pub struct HttpRemoteApi {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteApi {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteApi")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: EntityId,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl HttpRemoteApi {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteError::Network(error.to_string()))?;
        Ok(Self {
            base_url,
            access_token: access_token.into(),
            client,
        })
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/v1/{}", self.base_url, kind.namespace())
    }

    fn item_url(&self, kind: EntityKind, id: &EntityId) -> String {
        format!(
            "{}/{}",
            self.collection_url(kind),
            urlencoding::encode(id.as_str())
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| RemoteError::Network(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create(&self, payload: &EntityPayload) -> RemoteResult<EntityId> {
        let request = self.client.post(self.collection_url(payload.kind()));
        let request = match payload {
            EntityPayload::Snippet(body) => request.json(body),
            EntityPayload::Folder(body) => request.json(body),
        };
        let created: CreatedResponse = self.send_json(request).await?;
        Ok(created.id)
    }

    async fn update(&self, id: &EntityId, payload: &EntityPayload) -> RemoteResult<()> {
        let request = self.client.patch(self.item_url(payload.kind(), id));
        let request = match payload {
            EntityPayload::Snippet(body) => request.json(body),
            EntityPayload::Folder(body) => request.json(body),
        };
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> RemoteResult<()> {
        self.send(self.client.delete(self.item_url(kind, id)))
            .await?;
        Ok(())
    }

    async fn list_snippets(&self, query: &RemoteQuery) -> RemoteResult<RemotePage<RemoteSnippet>> {
        let request = self
            .client
            .get(self.collection_url(EntityKind::Snippet))
            .query(&query_pairs(query));
        self.send_json(request).await
    }

    async fn list_folders(&self) -> RemoteResult<Vec<RemoteFolder>> {
        let page: RemotePage<RemoteFolder> = self
            .send_json(self.client.get(self.collection_url(EntityKind::Folder)))
            .await?;
        Ok(page.items)
    }

    async fn get_snippet(&self, id: &EntityId) -> RemoteResult<RemoteSnippet> {
        self.send_json(self.client.get(self.item_url(EntityKind::Snippet, id)))
            .await
    }
}

fn query_pairs(query: &RemoteQuery) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("sortBy", query.sort_by.as_str().to_string()),
        ("sortOrder", query.sort_order.as_str().to_string()),
        ("limit", query.limit.to_string()),
    ];
    if let Some(text) = non_blank(query.query.clone()) {
        pairs.push(("query", text));
    }
    if let Some(tag) = non_blank(query.tag.clone()) {
        pairs.push(("tag", tag));
    }
    if let Some(folder_id) = &query.folder_id {
        pairs.push(("folderId", folder_id.to_string()));
    }
    if let Some(cursor) = non_blank(query.cursor.clone()) {
        pairs.push(("cursor", cursor));
    }
    pairs
}

fn map_status(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(body);
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            RemoteError::Validation(message.unwrap_or_else(|| format!("HTTP {}", status.as_u16())))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized,
        _ => RemoteError::Server {
            status: status.as_u16(),
            message: message.unwrap_or_default(),
        },
    }
}

fn parse_api_error(body: &str) -> Option<String> {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return non_blank(Some(message));
        }
    }
    non_blank(Some(excerpt(body)))
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    parse_endpoint(&raw).map_err(|error| {
        RemoteError::Validation(
            match error {
                EndpointError::Missing => "remote base URL must not be empty",
                EndpointError::NotHttp => "remote base URL must be http:// or https:// with a host",
            }
            .to_string(),
        )
    })
}
