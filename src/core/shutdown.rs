//! 关闭信号处理
//!
//! 定时模式下监听 Ctrl+C / SIGTERM：正在进行的一次运行会完整结束（状态照常保存），
//! 之后不再进入下一轮；等待间隔中收到信号则立即退出。

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// 关闭信号管理器；只记录第一次触发的原因
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
    reason: OnceLock<ShutdownReason>,
}

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM（容器停止）
    Signal,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown_token: CancellationToken::new(),
            reason: OnceLock::new(),
        }
    }

    /// 触发关闭
    pub fn shutdown(&self, reason: ShutdownReason) {
        let _ = self.reason.set(reason);
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// 第一次触发关闭时的原因
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, stopping after the current run...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, stopping after the current run...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
