use std::time::{Duration, SystemTime};

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::types::{
    AlbumDetail, AlbumSummary, AssetPage, BulkIdResult, Person, PeopleResponse, SearchResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:2283";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ImmichError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("api returned {status}: {body}")]
    Api {
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct ImmichClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    with_people: bool,
    page: u32,
    size: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAlbumRequest<'a> {
    album_name: &'a str,
}

#[derive(Serialize)]
struct BulkIdsRequest<'a> {
    ids: &'a [String],
}

impl ImmichClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ImmichError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> Result<Self, ImmichError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches one page of the metadata search with detected people included.
    pub async fn search_assets_page(&self, page: u32, size: u32) -> Result<AssetPage, ImmichError> {
        let url = self.endpoint("api/search/metadata")?;
        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(&SearchRequest {
                with_people: true,
                page,
                size,
            })
            .send()
            .await?;
        let payload: SearchResponse = Self::handle_response(response).await?;
        Ok(payload.assets)
    }

    pub async fn list_people(&self) -> Result<Vec<Person>, ImmichError> {
        let url = self.endpoint("api/people")?;
        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let payload: PeopleResponse = Self::handle_response(response).await?;
        Ok(payload.people)
    }

    pub async fn list_albums(&self) -> Result<Vec<AlbumSummary>, ImmichError> {
        let url = self.endpoint("api/albums")?;
        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn get_album(&self, album_id: &str) -> Result<AlbumDetail, ImmichError> {
        let mut url = self.endpoint(&format!("api/albums/{album_id}"))?;
        url.query_pairs_mut().append_pair("withoutAssets", "false");
        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_album(&self, name: &str) -> Result<AlbumSummary, ImmichError> {
        let url = self.endpoint("api/albums")?;
        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(&CreateAlbumRequest { album_name: name })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn add_assets(
        &self,
        album_id: &str,
        asset_ids: &[String],
    ) -> Result<Vec<BulkIdResult>, ImmichError> {
        let url = self.endpoint(&format!("api/albums/{album_id}/assets"))?;
        let response = self
            .http
            .put(url)
            .header("x-api-key", &self.api_key)
            .json(&BulkIdsRequest { ids: asset_ids })
            .send()
            .await?;
        Self::handle_bulk_response(response).await
    }

    /// Bulk removal is a DELETE carrying a JSON body.
    pub async fn remove_assets(
        &self,
        album_id: &str,
        asset_ids: &[String],
    ) -> Result<Vec<BulkIdResult>, ImmichError> {
        let url = self.endpoint(&format!("api/albums/{album_id}/assets"))?;
        let response = self
            .http
            .delete(url)
            .header("x-api-key", &self.api_key)
            .json(&BulkIdsRequest { ids: asset_ids })
            .send()
            .await?;
        Self::handle_bulk_response(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ImmichError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Bulk membership calls may answer 204 or an empty body; that is a success
    /// with no per-id results.
    async fn handle_bulk_response(
        response: reqwest::Response,
    ) -> Result<Vec<BulkIdResult>, ImmichError> {
        if !response.status().is_success() {
            return Self::handle_response(response).await;
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ImmichError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            Err(ImmichError::Api {
                status,
                body,
                retry_after,
            })
        }
    }
}

impl ImmichError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            ImmichError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    /// Rate limits, transient statuses, and transport timeouts or refused connections.
    pub fn is_retryable(&self) -> bool {
        match self {
            ImmichError::Request(err) => err.is_timeout() || err.is_connect(),
            _ => matches!(
                self.classification(),
                Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
            ),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ImmichError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ImmichError::Api { status, .. } => Some(*status),
            ImmichError::Request(err) => err.status(),
            ImmichError::Url(_) | ImmichError::Decode(_) => None,
        }
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(
        at.duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn classifies_statuses() {
        assert_eq!(
            classify_api_status(StatusCode::UNAUTHORIZED),
            ApiErrorClass::Auth
        );
        assert_eq!(
            classify_api_status(StatusCode::TOO_MANY_REQUESTS),
            ApiErrorClass::RateLimit
        );
        assert_eq!(
            classify_api_status(StatusCode::BAD_GATEWAY),
            ApiErrorClass::Transient
        );
        assert_eq!(
            classify_api_status(StatusCode::NOT_FOUND),
            ApiErrorClass::Permanent
        );
    }

    #[test]
    fn retry_after_accepts_delta_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_after_in_the_past_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), Some(Duration::ZERO));
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let client = ImmichClient::with_base_url("http://nas.local/immich", "key").unwrap();
        let url = client.endpoint("/api/albums").unwrap();
        assert_eq!(url.as_str(), "http://nas.local/immich/api/albums");
    }
}
