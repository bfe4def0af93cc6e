//! 桥接入口
//!
//! [`Bridge`] 把加载器、就绪同步器、调用编组器和绑定表面注册表串起来：
//! 启动模块 → 等待表面发布（与模块崩溃赛跑）→ 校验导出 → 返回 [`Engine`] 句柄。
//! 加载失败时不会留下半加载的状态，已启动的执行任务随错误一起被丢弃。

use crate::config::BridgeConfig;
use crate::error::{ExecutionFailure, LoadError, LoadResult};
use crate::loader::{self, ModuleHost, StartedModule};
use crate::marshal::Marshaller;
use crate::readiness;
use crate::surface::{self, Engine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 一个宿主会话中的桥接层
pub struct Bridge {
    config: BridgeConfig,
    host: Arc<dyn ModuleHost>,
    loading: AtomicBool,
}

impl Bridge {
    pub fn new(config: BridgeConfig, host: Arc<dyn ModuleHost>) -> Self {
        Self {
            config,
            host,
            loading: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// 加载配置中的模块
    pub async fn load(&self) -> LoadResult<Engine> {
        let path = self.config.module.path.clone();
        self.load_from(&path).await
    }

    /// 加载指定路径的模块
    ///
    /// 同一时间只允许一次加载，并发的第二次调用返回 [`LoadError::AlreadyLoading`]。
    /// 配置在启动模块之前校验，无效时返回 [`LoadError::Config`]。
    pub async fn load_from(&self, path: &str) -> LoadResult<Engine> {
        let _guard = LoadGuard::acquire(&self.loading)?;
        self.config.validate()?;
        let contract = &self.config.contract;
        tracing::info!(
            target: "bridge",
            path,
            generation = %contract.generation,
            convention = %contract.convention,
            "loading engine module"
        );

        let StartedModule { slot, mut task } =
            loader::start(self.host.as_ref(), path, self.config.module.prefer_streaming).await?;
        let exit = task.take_exit().ok_or_else(|| {
            LoadError::ModuleExecution(ExecutionFailure::Crashed(
                "exit signal already consumed".to_string(),
            ))
        })?;

        let surface = readiness::await_ready(&slot, exit, self.config.readiness.strategy()).await?;
        let exports = surface::verify_exports(surface.as_ref(), contract.strict_surface)?;

        let marshaller = Marshaller::new(surface, contract.convention);
        let engine = Engine::new(marshaller, contract.generation.codec(), exports, task);
        tracing::info!(target: "bridge", "engine ready");
        Ok(engine)
    }
}

/// 标记一次进行中的加载，离开作用域时释放
struct LoadGuard<'a>(&'a AtomicBool);

impl<'a> LoadGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> LoadResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LoadError::AlreadyLoading)?;
        Ok(Self(flag))
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
