//! 已处理剧集集合（AnalyzedState）及其 JSON 文件持久化

pub mod persistence;

use std::collections::HashSet;

use crate::core::EpisodeId;

pub use persistence::StateStore;

/// 已处理的剧集 ID。只增不减；重复插入无副作用，清空只能由运维删除状态文件
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalyzedState {
    ids: HashSet<EpisodeId>,
}

impl AnalyzedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回是否为新插入
    pub fn insert(&mut self, id: EpisodeId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: EpisodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// 升序排列，用于序列化（重新加载时顺序无关）
    pub fn sorted(&self) -> Vec<EpisodeId> {
        let mut ids: Vec<EpisodeId> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<EpisodeId> for AnalyzedState {
    fn from_iter<I: IntoIterator<Item = EpisodeId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut state = AnalyzedState::new();
        assert!(state.insert(EpisodeId(9)));
        assert!(!state.insert(EpisodeId(9)));
        assert_eq!(state.len(), 1);
        assert!(state.contains(EpisodeId(9)));
    }

    #[test]
    fn test_sorted() {
        let state: AnalyzedState = [EpisodeId(30), EpisodeId(4), EpisodeId(12)]
            .into_iter()
            .collect();
        assert_eq!(state.sorted(), vec![EpisodeId(4), EpisodeId(12), EpisodeId(30)]);
    }
}
