//! Plex Media Server 客户端
//!
//! 使用 JSON 接口（Accept: application/json），Token 通过 X-Plex-Token 头传递。
//! 分析请求使用独立的短超时 Client：超时视为「已发出、未确认」，不算失败。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::clients::{
    AnalyzeAck, ClientError, Episode, LibraryProvider, Marker, MarkerKind, Show,
};
use crate::core::{EpisodeId, ShowId};

const TOKEN_HEADER: &str = "X-Plex-Token";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(rename = "MediaContainer")]
    container: MediaContainer,
}

#[derive(Debug, Default, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "Marker", default)]
    markers: Vec<PlexMarker>,
}

#[derive(Debug, Deserialize)]
struct PlexMarker {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "startTimeOffset", default)]
    start: u64,
    #[serde(rename = "endTimeOffset", default)]
    end: u64,
}

impl Metadata {
    fn id(&self) -> Result<u64, ClientError> {
        self.rating_key
            .parse()
            .map_err(|_| ClientError::Decode(format!("invalid ratingKey '{}'", self.rating_key)))
    }

    fn into_episode(self) -> Result<Episode, ClientError> {
        let id = EpisodeId(self.id()?);
        Ok(Episode {
            id,
            title: self.title,
            markers: self
                .markers
                .into_iter()
                .map(|m| Marker::new(MarkerKind::parse(&m.kind), m.start, m.end))
                .collect(),
        })
    }
}

pub struct PlexClient {
    client: Client,
    /// 只用于 analyze 的短超时 Client
    analyze_client: Client,
    base_url: String,
    token: String,
}

impl PlexClient {
    /// 建立客户端并请求 /identity 验证服务可达
    pub async fn connect(
        url: &str,
        token: &str,
        timeout_secs: u64,
        analyze_timeout_secs: u64,
    ) -> Result<Self, ClientError> {
        let plex = Self::new(url, token, timeout_secs, analyze_timeout_secs)?;
        let resp = plex.get("/identity").send().await?;
        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        Ok(plex)
    }

    fn new(
        url: &str,
        token: &str,
        timeout_secs: u64,
        analyze_timeout_secs: u64,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers.clone())
            .build()?;
        let analyze_client = Client::builder()
            .timeout(Duration::from_secs(analyze_timeout_secs))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            analyze_client,
            base_url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header(TOKEN_HEADER, &self.token)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }

    async fn metadata(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Metadata>, ClientError> {
        let resp: Response = self.fetch(self.get(path).query(query)).await?;
        Ok(resp.container.metadata)
    }
}

#[async_trait]
impl LibraryProvider for PlexClient {
    async fn get_show(&self, id: ShowId) -> Option<Show> {
        match self.metadata(&format!("/library/metadata/{}", id), &[]).await {
            Ok(items) => items.into_iter().next().map(|m| Show {
                id,
                title: m.title,
            }),
            Err(e) => {
                tracing::debug!(show = %id, error = %e, "show lookup failed");
                None
            }
        }
    }

    async fn episodes(&self, show: &Show) -> Result<Vec<Episode>, ClientError> {
        self.metadata(&format!("/library/metadata/{}/allLeaves", show.id), &[])
            .await?
            .into_iter()
            .map(Metadata::into_episode)
            .collect()
    }

    async fn reload(&self, episode: &mut Episode) -> Result<(), ClientError> {
        let fresh = self
            .metadata(
                &format!("/library/metadata/{}", episode.id),
                &[("includeMarkers", "1")],
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Decode(format!("episode {} vanished", episode.id)))?
            .into_episode()?;
        episode.title = fresh.title;
        episode.markers = fresh.markers;
        Ok(())
    }

    async fn analyze(&self, episode: &Episode) -> Result<AnalyzeAck, ClientError> {
        let result = self
            .analyze_client
            .put(self.url(&format!("/library/metadata/{}/analyze", episode.id)))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => Ok(AnalyzeAck::Accepted),
            Ok(resp) => Err(ClientError::Status(resp.status())),
            // 连接都没建立起来，服务端不可能收到请求
            Err(e) if e.is_connect() => Err(ClientError::Request(e)),
            Err(e) if e.is_timeout() => Ok(AnalyzeAck::Unconfirmed),
            Err(e) => Err(ClientError::Request(e)),
        }
    }
}
