//! 绑定表面注册表
//!
//! 引擎启动完成后对宿主公开的六个操作，以及包装它们的类型化句柄 [`Engine`]。
//! 规则本身（走法合法性、胜负、棋盘几何）完全在引擎内部，桥接层不做任何推断。

use crate::codec::{as_array, MoveCodec, WireGeneration};
use crate::contract::{CurrentTurn, Move, PastTurn, Piece, Player, PossibleMoves};
use crate::error::{BridgeError, BridgeResult, LoadError, LoadResult};
use crate::loader::ModuleTask;
use crate::marshal::{CallConvention, Invocation, Marshaller};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// 引擎公开的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ResetGame,
    BoardPieces,
    PastTurns,
    CurrentTurn,
    MakeMove,
    PossibleMoves,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::ResetGame,
        Operation::BoardPieces,
        Operation::PastTurns,
        Operation::CurrentTurn,
        Operation::MakeMove,
        Operation::PossibleMoves,
    ];

    /// 模块导出时使用的名字
    pub const fn name(self) -> &'static str {
        match self {
            Operation::ResetGame => "resetGame",
            Operation::BoardPieces => "boardPieces",
            Operation::PastTurns => "pastTurns",
            Operation::CurrentTurn => "currentTurn",
            Operation::MakeMove => "makeMove",
            Operation::PossibleMoves => "possibleMoves",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Operation::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 模块启动后发布的原始调用表面
///
/// 参数与返回值都是线上编码后的 JSON 值，返回形状由调用约定决定。
pub trait ModuleSurface: Send + Sync {
    /// 导出的操作，默认全部六个
    fn exports(&self) -> Vec<Operation> {
        Operation::ALL.to_vec()
    }

    fn invoke(&self, operation: Operation, args: Vec<Value>) -> Invocation;
}

/// 检查发布的表面是否导出了全部操作
///
/// 非严格模式下只记录警告，缺失的操作在调用时报告契约不匹配。
pub(crate) fn verify_exports(
    surface: &dyn ModuleSurface,
    strict: bool,
) -> LoadResult<Vec<Operation>> {
    let exports = surface.exports();
    let missing: Vec<&'static str> = Operation::ALL
        .into_iter()
        .filter(|op| !exports.contains(op))
        .map(Operation::name)
        .collect();

    if missing.is_empty() {
        return Ok(exports);
    }
    if strict {
        return Err(LoadError::IncompleteSurface(missing));
    }
    tracing::warn!(target: "engine", ?missing, "engine surface is incomplete");
    Ok(exports)
}

/// 类型化的绑定表面：恰好六个操作
pub trait BindingSurface: Send + Sync {
    /// 重置棋盘、回合历史和当前回合计数；幂等
    fn reset_game(&self) -> BoxFuture<'_, BridgeResult<()>>;

    /// 当前棋盘上所有棋子的快照
    fn board_pieces(&self) -> BoxFuture<'_, BridgeResult<Vec<Piece>>>;

    /// 按时间顺序的全部已结束回合
    fn past_turns(&self) -> BoxFuture<'_, BridgeResult<Vec<PastTurn>>>;

    /// 进行中的回合
    fn current_turn(&self) -> BoxFuture<'_, BridgeResult<CurrentTurn>>;

    /// 为 `player` 提交一步走法；非当前玩家、非法走法或超出步数上限时失败
    fn make_move<'a>(&'a self, player: Player, mv: &'a Move) -> BoxFuture<'a, BridgeResult<()>>;

    /// `player` 当前的合法走法，无副作用
    fn possible_moves(&self, player: Player) -> BoxFuture<'_, BridgeResult<PossibleMoves>>;
}

/// 已就绪引擎的句柄
///
/// 由 [`crate::Bridge::load`] 返回。丢弃句柄会中止模块的后台执行。
pub struct Engine {
    marshaller: Marshaller,
    codec: Arc<dyn MoveCodec>,
    exports: Vec<Operation>,
    module: ModuleTask,
}

impl Engine {
    pub(crate) fn new(
        marshaller: Marshaller,
        codec: Arc<dyn MoveCodec>,
        exports: Vec<Operation>,
        module: ModuleTask,
    ) -> Self {
        Self {
            marshaller,
            codec,
            exports,
            module,
        }
    }

    pub fn generation(&self) -> WireGeneration {
        self.codec.generation()
    }

    pub fn convention(&self) -> CallConvention {
        self.marshaller.convention()
    }

    /// 模块的后台执行是否仍在运行
    pub fn is_running(&self) -> bool {
        self.module.is_running()
    }

    pub fn exports(&self) -> &[Operation] {
        &self.exports
    }

    /// 停止模块
    pub fn shutdown(self) {
        tracing::info!(target: "engine", "shutting down engine");
        drop(self);
    }

    async fn call(&self, operation: Operation, args: Vec<Value>) -> BridgeResult<Value> {
        if !self.exports.contains(&operation) {
            return Err(BridgeError::ContractMismatch {
                operation,
                detail: "operation is not exported by this engine build".to_string(),
            });
        }
        if !self.module.is_running() {
            return Err(BridgeError::Terminated);
        }
        self.marshaller.unwrap(operation, args).await
    }

    pub async fn reset_game(&self) -> BridgeResult<()> {
        self.call(Operation::ResetGame, Vec::new()).await?;
        tracing::debug!(target: "engine", "game reset");
        Ok(())
    }

    pub async fn board_pieces(&self) -> BridgeResult<Vec<Piece>> {
        let value = self.call(Operation::BoardPieces, Vec::new()).await?;
        let pieces = as_array(&value, "piece list")?
            .iter()
            .map(|piece| self.codec.decode_piece(piece))
            .collect::<Result<_, _>>()?;
        Ok(pieces)
    }

    pub async fn past_turns(&self) -> BridgeResult<Vec<PastTurn>> {
        let value = self.call(Operation::PastTurns, Vec::new()).await?;
        let turns = as_array(&value, "turn list")?
            .iter()
            .map(|turn| self.codec.decode_past_turn(turn))
            .collect::<Result<_, _>>()?;
        Ok(turns)
    }

    pub async fn current_turn(&self) -> BridgeResult<CurrentTurn> {
        let value = self.call(Operation::CurrentTurn, Vec::new()).await?;
        Ok(self.codec.decode_current_turn(&value)?)
    }

    pub async fn make_move(&self, player: Player, mv: &Move) -> BridgeResult<()> {
        let args = vec![json!(player.as_u8()), self.codec.encode_move(mv)];
        self.call(Operation::MakeMove, args).await?;
        tracing::debug!(target: "engine", %player, %mv, "move accepted");
        Ok(())
    }

    pub async fn possible_moves(&self, player: Player) -> BridgeResult<PossibleMoves> {
        let value = self
            .call(Operation::PossibleMoves, vec![json!(player.as_u8())])
            .await?;
        Ok(self.codec.decode_possible_moves(&value)?)
    }
}

impl BindingSurface for Engine {
    fn reset_game(&self) -> BoxFuture<'_, BridgeResult<()>> {
        Engine::reset_game(self).boxed()
    }

    fn board_pieces(&self) -> BoxFuture<'_, BridgeResult<Vec<Piece>>> {
        Engine::board_pieces(self).boxed()
    }

    fn past_turns(&self) -> BoxFuture<'_, BridgeResult<Vec<PastTurn>>> {
        Engine::past_turns(self).boxed()
    }

    fn current_turn(&self) -> BoxFuture<'_, BridgeResult<CurrentTurn>> {
        Engine::current_turn(self).boxed()
    }

    fn make_move<'a>(&'a self, player: Player, mv: &'a Move) -> BoxFuture<'a, BridgeResult<()>> {
        Engine::make_move(self, player, mv).boxed()
    }

    fn possible_moves(&self, player: Player) -> BoxFuture<'_, BridgeResult<PossibleMoves>> {
        Engine::possible_moves(self, player).boxed()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("generation", &self.generation())
            .field("convention", &self.convention())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Partial;

    impl ModuleSurface for Partial {
        fn exports(&self) -> Vec<Operation> {
            vec![
                Operation::ResetGame,
                Operation::MakeMove,
                Operation::PossibleMoves,
            ]
        }

        fn invoke(&self, _operation: Operation, _args: Vec<Value>) -> Invocation {
            Invocation::resolved(Value::Null)
        }
    }

    #[test]
    fn test_operation_names() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("undo"), None);
    }

    #[test]
    fn test_strict_surface_check() {
        let err = verify_exports(&Partial, true).unwrap_err();
        match err {
            LoadError::IncompleteSurface(missing) => {
                assert_eq!(missing, vec!["boardPieces", "pastTurns", "currentTurn"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(verify_exports(&Partial, false).unwrap().len(), 3);
    }
}
