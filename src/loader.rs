//! 模块加载器
//!
//! 在宿主运行时垫片中实例化二进制模块，并把它的执行作为后台任务启动。
//! 加载流程：
//!
//! 1. 检查运行时垫片是否存在，缺失时立即返回 [`LoadError::ShimMissing`]
//! 2. 获取模块：垫片支持边下载边编译时使用流式来源，否则先完整读入缓冲区
//! 3. 实例化模块
//! 4. 启动执行，不等待其完成（模块作为常驻服务运行）

use crate::error::{ExecutionFailure, LoadError, LoadResult};
use crate::readiness::{SurfacePublisher, SurfaceSlot};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt, TryStreamExt};
use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// 模块字节流
pub type ByteStream = BoxStream<'static, io::Result<Vec<u8>>>;

/// 模块来源
pub enum ModuleSource {
    /// 已完整读入的模块
    Buffered(Vec<u8>),
    /// 分块到达的模块，可以边下载边编译
    Streaming(ByteStream),
}

impl ModuleSource {
    /// 收集成完整的字节
    pub async fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            ModuleSource::Buffered(bytes) => Ok(bytes),
            ModuleSource::Streaming(chunks) => chunks.try_concat().await,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ModuleSource::Streaming(_))
    }
}

/// 宿主环境：提供运行时垫片和模块获取能力
pub trait ModuleHost: Send + Sync {
    /// 运行时垫片，不存在时返回 `None`
    fn shim(&self) -> Option<Arc<dyn RuntimeShim>>;

    /// 诊断信息中使用的垫片名称
    fn shim_name(&self) -> &str {
        "wasm_exec"
    }

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, io::Result<Vec<u8>>>;

    /// 流式获取；宿主不支持时返回 `None`
    fn fetch_streaming<'a>(&'a self, _path: &'a str) -> Option<BoxFuture<'a, io::Result<ByteStream>>> {
        None
    }
}

/// 宿主运行时垫片，由模块的编译工具链提供
pub trait RuntimeShim: Send + Sync {
    /// 能否直接从字节流编译
    fn supports_streaming(&self) -> bool {
        false
    }

    fn instantiate(&self, source: ModuleSource) -> BoxFuture<'_, LoadResult<Box<dyn ModuleInstance>>>;
}

/// 已实例化、尚未运行的模块
pub trait ModuleInstance: Send {
    /// 运行模块。模块启动完成后通过 `publisher` 发布调用表面，
    /// 之后通常一直运行；返回即表示模块已退出。
    fn run(self: Box<Self>, publisher: SurfacePublisher) -> BoxFuture<'static, Result<(), ExecutionFailure>>;
}

/// 正在后台执行的模块
///
/// 丢弃时中止执行任务。
pub struct ModuleTask {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    exit: Option<oneshot::Receiver<Result<(), ExecutionFailure>>>,
}

impl ModuleTask {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 取出退出信号，只能取一次
    pub(crate) fn take_exit(&mut self) -> Option<oneshot::Receiver<Result<(), ExecutionFailure>>> {
        self.exit.take()
    }
}

impl Drop for ModuleTask {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.handle.abort();
    }
}

/// 已启动的模块：执行任务和它将要发布表面的槽位
pub struct StartedModule {
    pub slot: SurfaceSlot,
    pub task: ModuleTask,
}

/// 获取、实例化并启动模块
pub async fn start(
    host: &dyn ModuleHost,
    path: &str,
    prefer_streaming: bool,
) -> LoadResult<StartedModule> {
    let shim = host
        .shim()
        .ok_or_else(|| LoadError::ShimMissing(host.shim_name().to_string()))?;

    let fetch_error = |source| LoadError::Fetch {
        path: path.to_string(),
        source,
    };

    let streaming = if prefer_streaming && shim.supports_streaming() {
        host.fetch_streaming(path)
    } else {
        None
    };
    let source = match streaming {
        Some(open) => ModuleSource::Streaming(open.await.map_err(fetch_error)?),
        None => ModuleSource::Buffered(host.fetch(path).await.map_err(fetch_error)?),
    };

    tracing::info!(
        target: "loader",
        path,
        streaming = source.is_streaming(),
        "instantiating module"
    );
    let instance = shim.instantiate(source).await?;

    let slot = SurfaceSlot::new();
    let task = spawn(instance, slot.publisher());
    Ok(StartedModule { slot, task })
}

/// 在后台运行模块，退出结果先记录日志，再通过退出信号送出
fn spawn(instance: Box<dyn ModuleInstance>, publisher: SurfacePublisher) -> ModuleTask {
    let running = Arc::new(AtomicBool::new(true));
    let (exit_tx, exit_rx) = oneshot::channel();

    let flag = running.clone();
    let handle = tokio::spawn(async move {
        let outcome = match AssertUnwindSafe(instance.run(publisher)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(ExecutionFailure::Panicked(panic_message(panic.as_ref()))),
        };
        flag.store(false, Ordering::Release);

        match &outcome {
            Ok(()) => tracing::info!(target: "loader", "module exited"),
            Err(failure) => tracing::error!(target: "loader", %failure, "module execution failed"),
        }
        let _ = exit_tx.send(outcome);
    });

    ModuleTask {
        handle,
        running,
        exit: Some(exit_rx),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// 从本地目录读取模块的宿主
pub struct FsHost {
    root: PathBuf,
    shim: Option<Arc<dyn RuntimeShim>>,
    shim_name: String,
    chunk_size: usize,
}

impl FsHost {
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            shim: None,
            shim_name: "wasm_exec".to_string(),
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_shim(mut self, name: impl Into<String>, shim: Arc<dyn RuntimeShim>) -> Self {
        self.shim_name = name.into();
        self.shim = Some(shim);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl ModuleHost for FsHost {
    fn shim(&self) -> Option<Arc<dyn RuntimeShim>> {
        self.shim.clone()
    }

    fn shim_name(&self) -> &str {
        &self.shim_name
    }

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        tokio::fs::read(self.root.join(path)).boxed()
    }

    fn fetch_streaming<'a>(&'a self, path: &'a str) -> Option<BoxFuture<'a, io::Result<ByteStream>>> {
        Some(open_chunks(self.root.join(path), self.chunk_size).boxed())
    }
}

async fn open_chunks(path: PathBuf, chunk_size: usize) -> io::Result<ByteStream> {
    let file = tokio::fs::File::open(path).await?;
    let chunks = stream::try_unfold(file, move |file| next_chunk(file, chunk_size));
    Ok(chunks.boxed())
}

async fn next_chunk(
    mut file: tokio::fs::File,
    chunk_size: usize,
) -> io::Result<Option<(Vec<u8>, tokio::fs::File)>> {
    let mut buf = vec![0u8; chunk_size];
    let read = file.read(&mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    buf.truncate(read);
    Ok(Some((buf, file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fs_host_reads_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("main.wasm")).unwrap();
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        file.write_all(&payload).unwrap();

        let host = FsHost::new(dir.path()).with_chunk_size(64);
        assert_eq!(host.fetch("main.wasm").await.unwrap(), payload);

        let chunks = host.fetch_streaming("main.wasm").unwrap().await.unwrap();
        let streamed = ModuleSource::Streaming(chunks).into_bytes().await.unwrap();
        assert_eq!(streamed, payload);
    }

    #[tokio::test]
    async fn test_missing_shim() {
        let host = FsHost::new(".");
        let err = start(&host, "main.wasm", true).await.err().unwrap();
        assert!(matches!(err, LoadError::ShimMissing(name) if name == "wasm_exec"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(payload.as_ref()), "kaboom");
    }
}
