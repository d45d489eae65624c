//! Tautulli API v2 客户端
//!
//! 所有请求走 `GET {url}/api/v2?apikey=..&cmd=..`，响应信封 `response.result` 必须为 success。
//! 历史记录中的 rating_key 可能是数字也可能是字符串，统一按 u64 解析，解析不了的行直接忽略。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::clients::{ClientError, WatchHistoryProvider};
use crate::core::{EpisodeId, ShowId, WatchedSet};

#[derive(Debug, Deserialize)]
struct Envelope {
    response: EnvelopeBody,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    #[serde(default)]
    result: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct TautulliUser {
    user_id: u64,
    #[serde(default)]
    username: String,
}

pub struct TautulliClient {
    client: Client,
    base_url: String,
    api_key: String,
    /// 每个用户单次拉取的历史条数上限
    history_length: u32,
}

impl TautulliClient {
    pub fn new(
        url: &str,
        api_key: &str,
        timeout_secs: u64,
        history_length: u32,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            history_length,
        })
    }

    async fn request(&self, cmd: &str, params: &[(&str, String)]) -> Result<Value, ClientError> {
        let resp = self
            .client
            .get(format!("{}/api/v2", self.base_url))
            .query(&[("apikey", self.api_key.as_str()), ("cmd", cmd)])
            .query(params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        let envelope: Envelope = resp.json().await?;
        unwrap_envelope(envelope)
    }

    /// 用户名 -> user_id（不区分大小写）；不存在返回 None
    async fn user_id(&self, username: &str) -> Result<Option<u64>, ClientError> {
        let data = self.request("get_users", &[]).await?;
        let users: Vec<TautulliUser> =
            serde_json::from_value(data).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(find_user_id(&users, username))
    }
}

/// 用户名不区分大小写匹配；user_id 0 也是合法用户
fn find_user_id(users: &[TautulliUser], username: &str) -> Option<u64> {
    users
        .iter()
        .find(|u| u.username.eq_ignore_ascii_case(username))
        .map(|u| u.user_id)
}

fn unwrap_envelope(envelope: Envelope) -> Result<Value, ClientError> {
    let body = envelope.response;
    if body.result != "success" {
        let message = body.message.unwrap_or(body.result);
        return Err(ClientError::Api(format!("Tautulli API error: {}", message)));
    }
    Ok(body.data)
}

/// 数字或数字字符串 -> u64
fn as_key(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 把 get_history 的行并入 watched；只保留 date >= cutoff（Unix 秒）的记录
fn collect_history(rows: &[Value], cutoff: i64, watched: &mut WatchedSet) {
    for row in rows {
        let date = as_key(row.get("date")).map(|d| d as i64).unwrap_or(0);
        if date < cutoff {
            continue;
        }
        let show = as_key(row.get("grandparent_rating_key"));
        let episode = as_key(row.get("rating_key"));
        match (show, episode) {
            (Some(show), Some(episode)) => watched.record(ShowId(show), EpisodeId(episode)),
            _ => tracing::debug!(row = %row, "skipping history row without rating keys"),
        }
    }
}

#[async_trait]
impl WatchHistoryProvider for TautulliClient {
    async fn watched(
        &self,
        usernames: &[String],
        lookback_days: u32,
    ) -> Result<WatchedSet, ClientError> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(i64::from(lookback_days)))
            .timestamp();
        let mut watched = WatchedSet::new();

        for username in usernames {
            let Some(user_id) = self.user_id(username).await? else {
                tracing::debug!(user = %username, "user not found in Tautulli, skipping");
                continue;
            };
            let data = self
                .request(
                    "get_history",
                    &[
                        ("user_id", user_id.to_string()),
                        ("media_type", "episode".to_string()),
                        ("length", self.history_length.to_string()),
                    ],
                )
                .await?;
            let rows = data
                .get("data")
                .and_then(|v| v.as_array())
                .map(Vec::as_slice)
                .unwrap_or_default();
            collect_history(rows, cutoff, &mut watched);
        }

        Ok(watched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Vec<TautulliUser> {
        serde_json::from_value(json!([
            {"user_id": 0, "username": "Local"},
            {"user_id": 7, "username": "alice"},
            {"user_id": 9}
        ]))
        .unwrap()
    }

    #[test]
    fn test_find_user_id_ignores_case() {
        assert_eq!(find_user_id(&users(), "ALICE"), Some(7));
        assert_eq!(find_user_id(&users(), "alice"), Some(7));
    }

    #[test]
    fn test_find_user_id_missing_user() {
        assert_eq!(find_user_id(&users(), "bob"), None);
        assert_eq!(find_user_id(&[], "alice"), None);
    }

    #[test]
    fn test_find_user_id_zero_is_a_user() {
        assert_eq!(find_user_id(&users(), "local"), Some(0));
    }

    #[test]
    fn test_envelope_success() {
        let envelope: Envelope = serde_json::from_value(json!({
            "response": {"result": "success", "message": null, "data": [{"user_id": 1, "username": "Alice"}]}
        }))
        .unwrap();
        let data = unwrap_envelope(envelope).unwrap();
        let users: Vec<TautulliUser> = serde_json::from_value(data).unwrap();
        assert_eq!(users[0].user_id, 1);
        assert_eq!(users[0].username, "Alice");
    }

    #[test]
    fn test_envelope_error() {
        let envelope: Envelope = serde_json::from_value(json!({
            "response": {"result": "error", "message": "Invalid apikey", "data": {}}
        }))
        .unwrap();
        let err = unwrap_envelope(envelope).unwrap_err();
        assert!(err.to_string().contains("Invalid apikey"));
    }

    #[test]
    fn test_collect_history_applies_cutoff_and_mixed_keys() {
        let rows = vec![
            json!({"date": 2_000, "rating_key": 101, "grandparent_rating_key": 10}),
            json!({"date": "2500", "rating_key": "102", "grandparent_rating_key": "10"}),
            json!({"date": 500, "rating_key": 201, "grandparent_rating_key": 20}),
            json!({"date": 3_000, "rating_key": 301, "grandparent_rating_key": ""}),
        ];
        let mut watched = WatchedSet::new();
        collect_history(&rows, 1_000, &mut watched);

        assert_eq!(watched.shows.iter().copied().collect::<Vec<_>>(), vec![ShowId(10)]);
        assert!(watched.contains_episode(EpisodeId(101)));
        assert!(watched.contains_episode(EpisodeId(102)));
        assert!(!watched.contains_episode(EpisodeId(201)));
        assert!(!watched.contains_episode(EpisodeId(301)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = TautulliClient::new("http://tautulli:8181/", "key", 30, 1000).unwrap();
        assert_eq!(client.base_url, "http://tautulli:8181");
    }
}
