//! 外部服务层：观看记录（Tautulli）与媒体库（Plex）客户端、抽象与 Mock 实现

pub mod mock;
pub mod plex;
pub mod tautulli;
pub mod traits;
pub mod types;

pub use mock::{MockHistory, MockLibrary};
pub use plex::PlexClient;
pub use tautulli::TautulliClient;
pub use traits::{ClientError, LibraryProvider, WatchHistoryProvider};
pub use types::{AnalyzeAck, Episode, Marker, MarkerKind, Show};
