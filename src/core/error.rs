//! 检测器错误类型
//!
//! Config / Connection / HistoryFetch / Persist 会中止本次运行；ShowNotFound / AnalyzeRequest
//! 只在引擎内部转成日志或 Outcome，不向上传播。

use thiserror::Error;

use crate::core::{EpisodeId, ShowId};

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Missing required config: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to connect: {0}")]
    Connection(String),

    #[error("Failed to get watch history: {0}")]
    HistoryFetch(String),

    #[error("Show {0} not found")]
    ShowNotFound(ShowId),

    #[error("Failed to analyze {0}: {1}")]
    AnalyzeRequest(EpisodeId, String),

    #[error("Failed to persist state: {0}")]
    Persist(#[from] std::io::Error),
}

impl From<config::ConfigError> for DetectorError {
    fn from(e: config::ConfigError) -> Self {
        DetectorError::Config(e.to_string())
    }
}
