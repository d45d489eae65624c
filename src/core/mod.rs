//! 核心层：领域类型、错误、对账引擎、运行驱动与关闭信号

pub mod driver;
pub mod engine;
pub mod error;
pub mod shutdown;
pub mod state;
pub mod types;

pub use driver::{connect, run_once, run_pass, Scheduler, Services};
pub use engine::{ReconciliationEngine, RunOptions, RunReport};
pub use error::DetectorError;
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{Outcome, RunStats};
pub use types::{EpisodeId, ShowId, WatchedSet};
