//! 线上编码
//!
//! 项目历史中出现过两代互不兼容的 `Move` 编码：
//!
//! - **structured**: `{"type": <tag>, "move": {...}}`，坐标为 `{"X", "Y"}` 对象
//! - **compact**: 单个格式化字符串，例如 `"dash 1,2 3,4"`，棋子坐标为 `[x, y]` 数组
//!
//! 两种编码都不是自描述的，所以一次部署只能在配置中选定一代，
//! 绝不做自动探测。回合、棋子等记录的外层结构两代共用，
//! 只有坐标和走法的编码不同。

mod compact;
mod structured;

pub use compact::CompactCodec;
pub use structured::StructuredCodec;

use crate::contract::{
    CurrentTurn, Footprint, Move, PastTurn, Piece, Player, Point, PossibleMoves,
};
use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// 编码代际
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireGeneration {
    Structured,
    Compact,
}

impl WireGeneration {
    pub const fn name(self) -> &'static str {
        match self {
            WireGeneration::Structured => "structured",
            WireGeneration::Compact => "compact",
        }
    }

    /// 该代际对应的编解码器
    pub fn codec(self) -> Arc<dyn MoveCodec> {
        match self {
            WireGeneration::Structured => Arc::new(StructuredCodec),
            WireGeneration::Compact => Arc::new(CompactCodec),
        }
    }
}

impl fmt::Display for WireGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for WireGeneration {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" => Ok(WireGeneration::Structured),
            "compact" => Ok(WireGeneration::Compact),
            other => Err(CodecError::Malformed {
                what: "wire generation",
                detail: other.to_string(),
            }),
        }
    }
}

/// 一代线上编码的编解码能力
///
/// 实现者只需处理坐标和走法；棋子与回合记录的外层结构由默认方法完成。
pub trait MoveCodec: Send + Sync + fmt::Debug {
    fn generation(&self) -> WireGeneration;

    /// 记录（棋子）中坐标的编码
    fn encode_point(&self, point: Point) -> Value;

    fn decode_point(&self, value: &Value) -> CodecResult<Point>;

    fn encode_move(&self, mv: &Move) -> Value;

    fn decode_move(&self, value: &Value) -> CodecResult<Move>;

    fn encode_moves(&self, moves: &[Move]) -> Value {
        Value::Array(moves.iter().map(|mv| self.encode_move(mv)).collect())
    }

    fn decode_moves(&self, value: &Value) -> CodecResult<Vec<Move>> {
        as_array(value, "move list")?
            .iter()
            .map(|mv| self.decode_move(mv))
            .collect()
    }

    fn encode_piece(&self, piece: &Piece) -> Value {
        match piece {
            Piece::Scout {
                player,
                position,
                returning,
            } => json!({
                "kind": "scout",
                "player": player.as_u8(),
                "position": self.encode_point(*position),
                "returning": returning,
            }),
            Piece::Boulder { player, footprint } => json!({
                "kind": "boulder",
                "player": player.as_u8(),
                "position": footprint
                    .points()
                    .iter()
                    .map(|p| self.encode_point(*p))
                    .collect::<Vec<_>>(),
            }),
        }
    }

    fn decode_piece(&self, value: &Value) -> CodecResult<Piece> {
        let wire = WirePiece::deserialize(value).map_err(malformed("piece"))?;
        let player = Player::try_from(wire.player)?;
        match wire.kind.as_str() {
            "scout" => Ok(Piece::Scout {
                player,
                position: self.decode_point(&wire.position)?,
                returning: wire.returning,
            }),
            "boulder" => {
                let points = as_array(&wire.position, "boulder footprint")?
                    .iter()
                    .map(|p| self.decode_point(p))
                    .collect::<CodecResult<Vec<_>>>()?;
                let points: [Point; 4] =
                    points.try_into().map_err(|points: Vec<Point>| {
                        CodecError::Malformed {
                            what: "boulder footprint",
                            detail: format!("expected 4 points, got {}", points.len()),
                        }
                    })?;
                Ok(Piece::Boulder {
                    player,
                    footprint: Footprint::try_from(points)?,
                })
            }
            other => Err(CodecError::Malformed {
                what: "piece",
                detail: format!("unknown kind `{other}`"),
            }),
        }
    }

    fn encode_past_turn(&self, turn: &PastTurn) -> Value {
        json!({
            "player": turn.player.as_u8(),
            "moves": self.encode_moves(&turn.moves),
        })
    }

    fn decode_past_turn(&self, value: &Value) -> CodecResult<PastTurn> {
        let wire = WireTurn::deserialize(value).map_err(malformed("past turn"))?;
        Ok(PastTurn {
            player: Player::try_from(wire.player)?,
            moves: self.decode_moves(&wire.moves)?,
        })
    }

    fn encode_current_turn(&self, turn: &CurrentTurn) -> Value {
        json!({
            "player": turn.player.as_u8(),
            "moves": self.encode_moves(&turn.moves),
            "plays": turn.plays,
        })
    }

    fn decode_current_turn(&self, value: &Value) -> CodecResult<CurrentTurn> {
        let wire = WireTurn::deserialize(value).map_err(malformed("current turn"))?;
        let plays = wire.plays.ok_or_else(|| CodecError::Malformed {
            what: "current turn",
            detail: "missing field `plays`".to_string(),
        })?;
        Ok(CurrentTurn {
            player: Player::try_from(wire.player)?,
            moves: self.decode_moves(&wire.moves)?,
            plays,
        })
    }

    fn encode_possible_moves(&self, possible: &PossibleMoves) -> Value {
        json!({
            "moves": self.encode_moves(&possible.moves),
            "can_place_boulder": possible.can_place_boulder,
        })
    }

    fn decode_possible_moves(&self, value: &Value) -> CodecResult<PossibleMoves> {
        let wire = WirePossibleMoves::deserialize(value).map_err(malformed("possible moves"))?;
        let moves = self.decode_moves(&wire.moves)?;
        if let Some(boulder) = moves.iter().find(|mv| mv.is_boulder()) {
            return Err(CodecError::Malformed {
                what: "possible moves",
                detail: format!("boulder move {boulder:?} listed as a candidate"),
            });
        }
        Ok(PossibleMoves {
            moves,
            can_place_boulder: wire.can_place_boulder,
        })
    }
}

#[derive(Deserialize)]
struct WirePiece {
    kind: String,
    player: i64,
    position: Value,
    #[serde(default)]
    returning: bool,
}

#[derive(Deserialize)]
struct WireTurn {
    player: i64,
    #[serde(default)]
    moves: Value,
    plays: Option<u32>,
}

#[derive(Deserialize)]
struct WirePossibleMoves {
    #[serde(default)]
    moves: Value,
    #[serde(default)]
    can_place_boulder: bool,
}

/// 解码列表，`null` 视为空列表（引擎对空切片可能返回 null）
pub(crate) fn as_array<'v>(value: &'v Value, what: &'static str) -> CodecResult<&'v [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(&[]),
        other => Err(CodecError::Malformed {
            what,
            detail: format!("expected an array, got {other}"),
        }),
    }
}

fn malformed(what: &'static str) -> impl Fn(serde_json::Error) -> CodecError {
    move |err| CodecError::Malformed {
        what,
        detail: err.to_string(),
    }
}
