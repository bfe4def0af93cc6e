//! 集成测试公共设施
//!
//! 一个极简的内存规则引擎（只用于测试桥接协议，不是真实的 Scouts 规则），
//! 以及模拟的运行时垫片和宿主。

#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::stream;
use futures::{FutureExt, StreamExt};
use scouts_bridge::{
    BridgeConfig, ByteStream, CallConvention, CurrentTurn, ExecutionFailure, Footprint,
    Invocation, LoadError, LoadResult, ModuleHost, ModuleInstance, ModuleSource, ModuleSurface,
    Move, MoveCodec, Operation, PastTurn, Piece, Player, Point, PossibleMoves, RuntimeShim,
    SurfacePublisher, WireGeneration,
};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WIDTH: u32 = 6;
pub const HEIGHT: u32 = 6;
pub const PLAY_LIMIT: u32 = 2;
pub const MAX_SCOUTS: usize = 3;

/// 合法的模块头
pub const WASM_MAGIC: &[u8] = b"\0asm\x01\0\0\0";

pub const MODULE_PATH: &str = "main.wasm";

#[derive(Debug, Clone)]
struct GameState {
    pieces: Vec<Piece>,
    past: Vec<PastTurn>,
    current: CurrentTurn,
}

impl GameState {
    fn new() -> Self {
        Self {
            pieces: Vec::new(),
            past: Vec::new(),
            current: CurrentTurn::begin(Player::One),
        }
    }

    fn home_row(player: Player) -> u32 {
        match player {
            Player::One => 0,
            Player::Two => HEIGHT - 1,
        }
    }

    fn forward(player: Player) -> i64 {
        match player {
            Player::One => 1,
            Player::Two => -1,
        }
    }

    fn occupied(&self, point: Point) -> bool {
        self.pieces.iter().any(|piece| piece.occupies(point))
    }

    fn in_bounds(point: Point) -> bool {
        point.x < WIDTH && point.y < HEIGHT
    }

    fn has_boulder(&self, player: Player) -> bool {
        self.pieces
            .iter()
            .any(|piece| matches!(piece, Piece::Boulder { player: p, .. } if *p == player))
    }

    fn can_place_boulder(&self, player: Player) -> bool {
        self.current.player == player && self.current.plays == 0 && !self.has_boulder(player)
    }

    fn possible_moves(&self, player: Player) -> PossibleMoves {
        if player != self.current.player || self.current.plays >= PLAY_LIMIT {
            return PossibleMoves::default();
        }

        let mut moves = Vec::new();
        let scouts: Vec<Point> = self
            .pieces
            .iter()
            .filter_map(|piece| match piece {
                Piece::Scout {
                    player: p,
                    position,
                    ..
                } if *p == player => Some(*position),
                _ => None,
            })
            .collect();

        if scouts.len() < MAX_SCOUTS {
            let row = Self::home_row(player);
            for x in 0..WIDTH {
                let position = Point::new(x, row);
                if !self.occupied(position) {
                    moves.push(Move::PlaceScout { position });
                }
            }
        }

        for from in scouts {
            if let Some(to) = from.offset(0, Self::forward(player)) {
                if Self::in_bounds(to) && !self.occupied(to) {
                    moves.push(Move::Dash { from, to });
                }
            }
        }

        moves.push(Move::Skip);
        PossibleMoves {
            moves,
            can_place_boulder: self.can_place_boulder(player),
        }
    }

    fn apply(&mut self, player: Player, mv: Move) -> Result<(), String> {
        if player != self.current.player {
            return Err(format!("it is not player {player}'s turn"));
        }
        if self.current.plays >= PLAY_LIMIT {
            return Err("turn has reached its play limit".to_string());
        }

        match mv {
            Move::Boulder { anchor } => {
                if !self.can_place_boulder(player) {
                    return Err("cannot place a boulder now".to_string());
                }
                let footprint = Footprint::at(anchor)
                    .ok_or_else(|| format!("boulder does not fit at {anchor}"))?;
                let fits = footprint
                    .points()
                    .iter()
                    .all(|p| Self::in_bounds(*p) && !self.occupied(*p));
                if !fits {
                    return Err(format!("boulder does not fit at {anchor}"));
                }
                self.pieces.push(Piece::Boulder { player, footprint });
            }
            other => {
                if !self.possible_moves(player).contains(&other) {
                    return Err(format!("illegal move: {other}"));
                }
                match other {
                    Move::PlaceScout { position } => self.pieces.push(Piece::Scout {
                        player,
                        position,
                        returning: false,
                    }),
                    Move::Dash { from, to } | Move::Jump { from, to } => {
                        for piece in &mut self.pieces {
                            if let Piece::Scout { position, .. } = piece {
                                if *position == from {
                                    *position = to;
                                }
                            }
                        }
                    }
                    Move::Boulder { .. } | Move::Skip => {}
                }
            }
        }

        self.current.moves.push(mv);
        self.current.plays += 1;
        if mv == Move::Skip || self.current.plays >= PLAY_LIMIT {
            let next = CurrentTurn::begin(player.opponent());
            let finished = std::mem::replace(&mut self.current, next);
            self.past.push(finished.into_past());
        }
        Ok(())
    }
}

/// 内存中的测试引擎，以指定的编码代际和调用约定应答
pub struct TestEngine {
    codec: Arc<dyn MoveCodec>,
    convention: CallConvention,
    exports: Vec<Operation>,
    state: Mutex<GameState>,
    calls: AtomicUsize,
}

impl TestEngine {
    pub fn new(generation: WireGeneration, convention: CallConvention) -> Arc<Self> {
        Self::with_exports(generation, convention, Operation::ALL.to_vec())
    }

    pub fn with_exports(
        generation: WireGeneration,
        convention: CallConvention,
        exports: Vec<Operation>,
    ) -> Arc<Self> {
        Arc::new(Self {
            codec: generation.codec(),
            convention,
            exports,
            state: Mutex::new(GameState::new()),
            calls: AtomicUsize::new(0),
        })
    }

    /// 收到的调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn player_arg(args: &[Value]) -> Result<Player, String> {
        let raw = args
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| "missing player".to_string())?;
        Player::try_from(raw).map_err(|err| format!("invalid player: {err}"))
    }

    fn handle(&self, operation: Operation, args: &[Value]) -> Result<Value, String> {
        let mut state = self.state.lock().map_err(|_| "engine state poisoned".to_string())?;
        let codec = self.codec.as_ref();
        match operation {
            Operation::ResetGame => {
                *state = GameState::new();
                Ok(Value::Null)
            }
            Operation::BoardPieces => Ok(Value::Array(
                state.pieces.iter().map(|p| codec.encode_piece(p)).collect(),
            )),
            Operation::PastTurns => Ok(Value::Array(
                state.past.iter().map(|t| codec.encode_past_turn(t)).collect(),
            )),
            Operation::CurrentTurn => Ok(codec.encode_current_turn(&state.current)),
            Operation::MakeMove => {
                let player = Self::player_arg(args)?;
                let raw = args.get(1).ok_or_else(|| "missing move".to_string())?;
                let mv = codec
                    .decode_move(raw)
                    .map_err(|err| format!("cannot unmarshal move: {err}"))?;
                state
                    .apply(player, mv)
                    .map_err(|err| format!("cannot apply move: {err}"))?;
                Ok(Value::Null)
            }
            Operation::PossibleMoves => {
                let player = Self::player_arg(args)?;
                Ok(codec.encode_possible_moves(&state.possible_moves(player)))
            }
        }
    }
}

impl ModuleSurface for TestEngine {
    fn exports(&self) -> Vec<Operation> {
        self.exports.clone()
    }

    fn invoke(&self, operation: Operation, args: Vec<Value>) -> Invocation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Invocation::from_result(self.convention, self.handle(operation, &args))
    }
}

/// 模块的启动行为
#[derive(Debug, Clone, Copy)]
pub enum Boot {
    /// 延迟后发布表面，然后一直运行
    PublishAfter(Duration),
    /// 延迟后崩溃，不发布表面
    CrashAfter(Duration),
    /// 发布表面，延迟后崩溃
    PublishThenCrash(Duration),
    /// 发布表面后立即正常退出
    PublishThenExit,
    /// 不发布表面直接退出
    ExitImmediately,
    /// 启动时 panic
    Panic,
}

pub struct TestModule {
    boot: Boot,
    engine: Arc<TestEngine>,
}

impl ModuleInstance for TestModule {
    fn run(
        self: Box<Self>,
        publisher: SurfacePublisher,
    ) -> BoxFuture<'static, Result<(), ExecutionFailure>> {
        let TestModule { boot, engine } = *self;
        async move {
            match boot {
                Boot::PublishAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    publisher.publish(engine);
                    std::future::pending::<()>().await;
                    Ok(())
                }
                Boot::CrashAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(ExecutionFailure::Crashed("runtime error: nil map".to_string()))
                }
                Boot::PublishThenCrash(delay) => {
                    publisher.publish(engine);
                    tokio::time::sleep(delay).await;
                    Err(ExecutionFailure::Crashed("runtime error: index out of range".to_string()))
                }
                Boot::PublishThenExit => {
                    publisher.publish(engine);
                    Ok(())
                }
                Boot::ExitImmediately => Ok(()),
                Boot::Panic => panic!("engine failed to boot"),
            }
        }
        .boxed()
    }
}

/// 模拟的运行时垫片
pub struct TestShim {
    streaming: bool,
    boot: Boot,
    engine: Arc<TestEngine>,
    instantiations: AtomicUsize,
    last_streaming: AtomicBool,
}

impl TestShim {
    pub fn new(boot: Boot, engine: Arc<TestEngine>, streaming: bool) -> Arc<Self> {
        Arc::new(Self {
            streaming,
            boot,
            engine,
            instantiations: AtomicUsize::new(0),
            last_streaming: AtomicBool::new(false),
        })
    }

    pub fn instantiations(&self) -> usize {
        self.instantiations.load(Ordering::SeqCst)
    }

    /// 最近一次实例化是否使用了流式来源
    pub fn used_streaming(&self) -> bool {
        self.last_streaming.load(Ordering::SeqCst)
    }
}

impl RuntimeShim for TestShim {
    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn instantiate(&self, source: ModuleSource) -> BoxFuture<'_, LoadResult<Box<dyn ModuleInstance>>> {
        async move {
            self.last_streaming.store(source.is_streaming(), Ordering::SeqCst);
            let bytes = source
                .into_bytes()
                .await
                .map_err(|err| LoadError::Instantiate(err.to_string()))?;
            if !bytes.starts_with(b"\0asm") {
                return Err(LoadError::Instantiate("bad magic number".to_string()));
            }
            self.instantiations.fetch_add(1, Ordering::SeqCst);
            let module: Box<dyn ModuleInstance> = Box::new(TestModule {
                boot: self.boot,
                engine: self.engine.clone(),
            });
            Ok(module)
        }
        .boxed()
    }
}

/// 内存中的宿主
pub struct TestHost {
    shim: Option<Arc<TestShim>>,
    files: HashMap<String, Vec<u8>>,
    streaming: bool,
}

impl TestHost {
    pub fn new(shim: Option<Arc<TestShim>>) -> Self {
        let mut files = HashMap::new();
        files.insert(MODULE_PATH.to_string(), WASM_MAGIC.to_vec());
        Self {
            shim,
            files,
            streaming: true,
        }
    }

    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

impl ModuleHost for TestHost {
    fn shim(&self) -> Option<Arc<dyn RuntimeShim>> {
        self.shim.clone().map(|shim| shim as Arc<dyn RuntimeShim>)
    }

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        futures::future::ready(self.read(path)).boxed()
    }

    fn fetch_streaming<'a>(&'a self, path: &'a str) -> Option<BoxFuture<'a, io::Result<ByteStream>>> {
        if !self.streaming {
            return None;
        }
        let result = self.read(path).map(|bytes| {
            let chunks: Vec<io::Result<Vec<u8>>> =
                bytes.chunks(3).map(|chunk| Ok(chunk.to_vec())).collect();
            stream::iter(chunks).boxed()
        });
        Some(futures::future::ready(result).boxed())
    }
}

/// 测试用配置：快速轮询
pub fn fast_config(generation: WireGeneration, convention: CallConvention) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.module.path = MODULE_PATH.to_string();
    config.contract.generation = generation;
    config.contract.convention = convention;
    config.readiness.poll_interval_ms = 5;
    config
}

/// 四种契约组合
pub fn all_contracts() -> Vec<(WireGeneration, CallConvention)> {
    let mut contracts = Vec::new();
    for generation in [WireGeneration::Structured, WireGeneration::Compact] {
        for convention in [CallConvention::DirectAsync, CallConvention::Tuple] {
            contracts.push((generation, convention));
        }
    }
    contracts
}
