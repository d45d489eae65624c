//! 状态文件持久化
//!
//! 单个 JSON 数组（整数 ID）。文件不存在或内容无法解析时视为「没有历史状态」，不报错；
//! 写入时自动创建父目录，先写临时文件再 rename 覆盖。

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::core::EpisodeId;
use crate::store::AnalyzedState;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载已处理集合；任何读取或解析失败都返回空集合
    pub async fn load(&self) -> AnalyzedState {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AnalyzedState::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read state file, starting empty");
                return AnalyzedState::new();
            }
        };
        match serde_json::from_str::<Vec<EpisodeId>>(&data) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "State file is not a list of ids, starting empty");
                AnalyzedState::new()
            }
        }
    }

    /// 覆盖写入；父目录不存在时自动创建
    pub async fn save(&self, state: &AnalyzedState) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string(&state.sorted())?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
