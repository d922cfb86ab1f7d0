/**
 * REST API Client
 *
 * Bulk load and mutation endpoints for every entity type. Each collection
 * lives under `/{resource}`; lists are paginated, mutations return the
 * authoritative entity wrapped in the standard response envelope.
 */
use crate::shared::api::{ApiPaginatedResponse, ApiResponse, PageRequest};
use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;
use crate::shared::models::{Entity, EntityId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// Request/response access to one entity collection
#[allow(async_fn_in_trait)]
pub trait EntityApi<E: Entity> {
    async fn list(&self, request: &PageRequest) -> Result<ApiPaginatedResponse<E>, SyncError>;
    async fn create(&self, draft: &E) -> Result<E, SyncError>;
    async fn update(&self, id: EntityId, changes: &E::Changes) -> Result<E, SyncError>;
    async fn delete(&self, id: EntityId) -> Result<(), SyncError>;
}

/// HTTP client for the port operations API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::connection(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            timeout: config.request_timeout(),
        })
    }

    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.auth_token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, SyncError> {
        tracing::debug!("[Api] {}", operation);
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::timeout(operation, self.timeout)
                } else {
                    SyncError::from(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let error = error_for_status(status, &body);
        tracing::warn!("[Api] {} failed: {}", operation, error);
        Err(error)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, SyncError> {
        let bytes = response.bytes().await.map_err(SyncError::from)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Map a non-success response to the error taxonomy
fn error_for_status(status: StatusCode, body: &str) -> SyncError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.to_string()
            }
        });
    match status {
        StatusCode::CONFLICT => SyncError::conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::validation("request", message)
        }
        _ => SyncError::http(status.as_u16(), message),
    }
}

impl<E: Entity> EntityApi<E> for ApiClient {
    async fn list(&self, request: &PageRequest) -> Result<ApiPaginatedResponse<E>, SyncError> {
        let path = format!("/{}", E::KIND.resource_path());
        let builder = self.client.get(self.url(&path)).query(&request.query_pairs());
        let response = self.send(&format!("GET {}", path), builder).await?;
        let page: ApiPaginatedResponse<E> = Self::read_json(response).await?;
        tracing::info!(
            "[Api] Loaded {} {} (total {})",
            page.data.len(),
            E::KIND,
            page.total_items
        );
        Ok(page)
    }

    async fn create(&self, draft: &E) -> Result<E, SyncError> {
        let path = format!("/{}", E::KIND.resource_path());
        let builder = self.client.post(self.url(&path)).json(draft);
        let response = self.send(&format!("POST {}", path), builder).await?;
        let envelope: ApiResponse<E> = Self::read_json(response).await?;
        Ok(envelope.data)
    }

    async fn update(&self, id: EntityId, changes: &E::Changes) -> Result<E, SyncError> {
        let path = format!("/{}/{}", E::KIND.resource_path(), id);
        let builder = self.client.put(self.url(&path)).json(changes);
        let response = self.send(&format!("PUT {}", path), builder).await?;
        let envelope: ApiResponse<E> = Self::read_json(response).await?;
        Ok(envelope.data)
    }

    async fn delete(&self, id: EntityId) -> Result<(), SyncError> {
        let path = format!("/{}/{}", E::KIND.resource_path(), id);
        let builder = self.client.delete(self.url(&path));
        self.send(&format!("DELETE {}", path), builder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, r#"{"message":"berth already taken"}"#),
            SyncError::Conflict { ref message } if message == "berth already taken"
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "bad range"),
            SyncError::Validation { ref message, .. } if message == "bad range"
        ));
        assert!(matches!(
            error_for_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            SyncError::Http { status: 503, ref message } if message == "Service Unavailable"
        ));
    }

    #[test]
    fn test_url_joining() {
        let config = SyncConfig::builder()
            .api_base_url("http://api.test/v1/")
            .build()
            .unwrap();
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.url("/clearances/4"), "http://api.test/v1/clearances/4");
    }
}
