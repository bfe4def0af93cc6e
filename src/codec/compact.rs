//! compact 编码：走法为单个字符串，如 `"place_scout 3,0"`、`"dash 1,2 1,5"`、`"skip"`；
//! 棋子坐标为 `[x, y]` 数组

use super::{MoveCodec, WireGeneration};
use crate::contract::{Move, MoveKind, Point};
use crate::error::{CodecError, CodecResult};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompactCodec;

impl MoveCodec for CompactCodec {
    fn generation(&self) -> WireGeneration {
        WireGeneration::Compact
    }

    fn encode_point(&self, point: Point) -> Value {
        json!([point.x, point.y])
    }

    /// 同时接受 `[x, y]` 和早期的 `"x,y"` 字符串
    fn decode_point(&self, value: &Value) -> CodecResult<Point> {
        match value {
            Value::String(s) => s.parse(),
            Value::Array(items) if items.len() == 2 => {
                let coord = |v: &Value| {
                    v.as_u64()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| CodecError::MalformedPoint(value.to_string()))
                };
                Ok(Point::new(coord(&items[0])?, coord(&items[1])?))
            }
            other => Err(CodecError::MalformedPoint(other.to_string())),
        }
    }

    fn encode_move(&self, mv: &Move) -> Value {
        Value::String(mv.to_string())
    }

    fn decode_move(&self, value: &Value) -> CodecResult<Move> {
        value
            .as_str()
            .ok_or_else(|| CodecError::MalformedMove(format!("expected a string, got {value}")))?
            .parse()
    }
}

/// 走法的紧凑记法，日志中也使用这种形式
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.kind().tag();
        match self {
            Move::PlaceScout { position } => write!(f, "{tag} {position}"),
            Move::Dash { from, to } | Move::Jump { from, to } => write!(f, "{tag} {from} {to}"),
            Move::Boulder { anchor } => write!(f, "{tag} {anchor}"),
            Move::Skip => f.write_str(tag),
        }
    }
}

impl FromStr for Move {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| CodecError::MalformedMove(s.to_string()))?;
        let kind = MoveKind::from_tag(tag)?;
        let args: Vec<&str> = parts.collect();

        let arity = match kind {
            MoveKind::PlaceScout | MoveKind::Boulder => 1,
            MoveKind::Dash | MoveKind::Jump => 2,
            MoveKind::Skip => 0,
        };
        if args.len() != arity {
            return Err(CodecError::MalformedMove(format!(
                "`{s}`: {tag} takes {arity} point(s), got {}",
                args.len()
            )));
        }

        let point = |i: usize| args[i].parse::<Point>();
        Ok(match kind {
            MoveKind::PlaceScout => Move::PlaceScout { position: point(0)? },
            MoveKind::Dash => Move::Dash {
                from: point(0)?,
                to: point(1)?,
            },
            MoveKind::Jump => Move::Jump {
                from: point(0)?,
                to: point(1)?,
            },
            MoveKind::Boulder => Move::Boulder { anchor: point(0)? },
            MoveKind::Skip => Move::Skip,
        })
    }
}
