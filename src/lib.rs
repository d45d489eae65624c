//! Plex Intro Detector - 按观看记录触发 Plex 片头/片尾标记分析
//!
//! 模块划分：
//! - **clients**: Tautulli（观看记录）与 Plex（媒体库）客户端抽象、HTTP 实现与 Mock
//! - **config**: 应用配置加载（TOML + 环境变量）与校验
//! - **core**: 对账引擎、运行驱动、定时调度、错误与关闭信号
//! - **observability**: 日志初始化
//! - **store**: 已处理剧集集合与状态文件持久化

pub mod clients;
pub mod config;
pub mod core;
pub mod observability;
pub mod store;

pub use crate::config::{load_config, Config};
pub use crate::core::{ReconciliationEngine, RunOptions, RunReport};
