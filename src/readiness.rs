//! 就绪同步器
//!
//! 模块的启动过程本身不可观察，只能看到它的副作用（发布调用表面）或失败。
//! [`await_ready`] 让两者赛跑：
//!
//! - 表面被发布：取消轮询，返回表面
//! - 执行任务先结束：若表面在退出前已经发布，仍然返回该表面（之后的调用报告
//!   [`crate::BridgeError::Terminated`]）；否则返回执行失败
//!
//! 正常退出和崩溃遵循同一规则，结果不取决于轮询间隔。
//! 赛跑本身没有超时，模块既不发布也不失败时加载会一直挂起。

use crate::error::{ExecutionFailure, LoadError, LoadResult};
use crate::surface::ModuleSurface;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;

type Published = Option<Arc<dyn ModuleSurface>>;

/// 轮询间隔的下限，`tokio::time::interval` 不接受零间隔
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 就绪检测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStrategy {
    /// 以固定间隔检查槽位
    Poll { interval: Duration },
    /// 等待模块发布时的通知
    Signal,
}

impl Default for ReadinessStrategy {
    fn default() -> Self {
        ReadinessStrategy::Poll {
            interval: Duration::from_millis(100),
        }
    }
}

/// 模块发布调用表面的槽位
///
/// 每次加载新建一个槽位，通过 [`SurfacePublisher`] 交给模块，
/// 加载方从这里取回表面。
#[derive(Clone)]
pub struct SurfaceSlot {
    tx: Arc<watch::Sender<Published>>,
    polls: Arc<AtomicU64>,
}

impl SurfaceSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            polls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn publisher(&self) -> SurfacePublisher {
        SurfacePublisher {
            tx: self.tx.clone(),
        }
    }

    /// 当前发布的表面，不计入轮询次数
    pub fn peek(&self) -> Option<Arc<dyn ModuleSurface>> {
        self.tx.borrow().clone()
    }

    /// 轮询检查的累计次数
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    fn poll_once(&self) -> Option<Arc<dyn ModuleSurface>> {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.peek()
    }

    async fn poll(&self, interval: Duration) -> Arc<dyn ModuleSurface> {
        let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(surface) = self.poll_once() {
                tracing::debug!(target: "readiness", polls = self.poll_count(), "surface observed");
                return surface;
            }
        }
    }

    async fn published(&self) -> Arc<dyn ModuleSurface> {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(surface) = rx.borrow_and_update().clone() {
                return surface;
            }
            if rx.changed().await.is_err() {
                // 发送端与槽位同生命周期，不会先于槽位关闭
                std::future::pending::<()>().await;
            }
        }
    }

    async fn wait(&self, strategy: ReadinessStrategy) -> Arc<dyn ModuleSurface> {
        match strategy {
            ReadinessStrategy::Poll { interval } => self.poll(interval).await,
            ReadinessStrategy::Signal => self.published().await,
        }
    }
}

impl Default for SurfaceSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// 模块一侧的发布句柄
#[derive(Clone)]
pub struct SurfacePublisher {
    tx: Arc<watch::Sender<Published>>,
}

impl SurfacePublisher {
    /// 发布调用表面；重复发布会替换之前的表面
    pub fn publish(&self, surface: Arc<dyn ModuleSurface>) {
        tracing::debug!(target: "readiness", "surface published");
        self.tx.send_replace(Some(surface));
    }
}

/// 等待表面发布或执行失败，以先发生者为准
pub async fn await_ready(
    slot: &SurfaceSlot,
    exit: oneshot::Receiver<Result<(), ExecutionFailure>>,
    strategy: ReadinessStrategy,
) -> LoadResult<Arc<dyn ModuleSurface>> {
    tracing::debug!(target: "readiness", ?strategy, "waiting for engine surface");

    tokio::select! {
        biased;

        surface = slot.wait(strategy) => Ok(surface),
        outcome = exit => {
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(failure)) => Some(failure),
                Err(_) => Some(ExecutionFailure::Crashed("execution task was dropped".to_string())),
            };
            // 退出前已经发布的表面优先于退出结果
            match (slot.peek(), failure) {
                (Some(surface), failure) => {
                    if let Some(failure) = failure {
                        tracing::warn!(target: "readiness", %failure, "module failed right after publishing its surface");
                    }
                    Ok(surface)
                }
                (None, Some(failure)) => Err(LoadError::ModuleExecution(failure)),
                (None, None) => Err(LoadError::ModuleExecution(ExecutionFailure::ExitedBeforeReady)),
            }
        },
    }
}
