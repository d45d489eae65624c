//! 外部服务抽象
//!
//! 观看记录（Tautulli / Mock）实现 WatchHistoryProvider；媒体库（Plex / Mock）实现 LibraryProvider。
//! 引擎只依赖这两个 trait，便于测试时替换为内存实现。

use async_trait::async_trait;
use thiserror::Error;

use crate::clients::{AnalyzeAck, Episode, Show};
use crate::core::{ShowId, WatchedSet};

/// 客户端层错误（网络、HTTP 状态、API 信封、响应解析）
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("API error: {0}")]
    Api(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// 观看记录服务：按用户名 + 回看天数汇总看过的节目与剧集
#[async_trait]
pub trait WatchHistoryProvider: Send + Sync {
    /// 找不到的用户名直接跳过，不算错误
    async fn watched(&self, usernames: &[String], lookback_days: u32)
        -> Result<WatchedSet, ClientError>;
}

/// 媒体库服务：节目 / 剧集查询、标记刷新与分析触发
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    /// 查询节目；不存在或请求失败一律返回 None
    async fn get_show(&self, id: ShowId) -> Option<Show>;

    /// 节目下全部剧集（按媒体库顺序）
    async fn episodes(&self, show: &Show) -> Result<Vec<Episode>, ClientError>;

    /// 重新拉取剧集元数据（含最新的标记列表）
    async fn reload(&self, episode: &mut Episode) -> Result<(), ClientError>;

    /// 触发分析，不等待分析完成
    async fn analyze(&self, episode: &Episode) -> Result<AnalyzeAck, ClientError>;
}
