//! 进程关闭钩子
//!
//! 在独立的命名线程上运行一个 current-thread tokio runtime，等待 Ctrl-C / SIGTERM
//! 或者来自持有者的指令。收到信号后执行一次关闭回调。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::constants::SHUTDOWN_HOOK_THREAD_NAME;
use crate::error::{ContainerError, ContainerResult};

enum HookCommand {
    Cancel,
    Trigger,
}

/// 已注册的关闭钩子
pub struct ShutdownHook {
    commands: Mutex<Option<oneshot::Sender<HookCommand>>>,
    fired: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ShutdownHook {
    /// 启动钩子线程，`on_signal` 最多执行一次
    pub fn spawn<F>(on_signal: F) -> ContainerResult<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let fired = Arc::new(AtomicBool::new(false));
        let thread_fired = Arc::clone(&fired);

        let thread = thread::Builder::new()
            .name(SHUTDOWN_HOOK_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::warn!("Failed to start shutdown hook runtime: {}", e);
                        return;
                    }
                };

                let fire = runtime.block_on(async move {
                    tokio::select! {
                        _ = wait_for_signal() => true,
                        command = rx => matches!(command, Ok(HookCommand::Trigger)),
                    }
                });

                if fire {
                    thread_fired.store(true, Ordering::SeqCst);
                    tracing::info!("Shutdown signal received, closing application context");
                    on_signal();
                }
            })
            .map_err(|e| ContainerError::illegal_state(format!("Failed to spawn shutdown hook thread: {}", e)))?;

        tracing::debug!("Registered shutdown hook thread '{}'", SHUTDOWN_HOOK_THREAD_NAME);
        Ok(Self {
            commands: Mutex::new(Some(tx)),
            fired,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// 取消钩子；钩子已经在执行时返回 false
    pub fn cancel(&self) -> bool {
        if self.fired.load(Ordering::SeqCst) {
            return false;
        }
        match self.commands.lock().take() {
            Some(tx) => tx.send(HookCommand::Cancel).is_ok(),
            None => false,
        }
    }

    /// 不等待进程信号，直接触发关闭回调
    pub fn trigger(&self) -> bool {
        match self.commands.lock().take() {
            Some(tx) => tx.send(HookCommand::Trigger).is_ok(),
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// 等待钩子线程结束；不能在钩子线程内部调用
    pub fn join(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!("Shutdown hook thread panicked");
            }
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::debug!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
