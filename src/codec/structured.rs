//! structured 编码：`{"type": <tag>, "move": {...}}`，坐标为 `{"X", "Y"}`

use super::{MoveCodec, WireGeneration};
use crate::contract::{Move, MoveKind, Point};
use crate::error::{CodecError, CodecResult};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredCodec;

#[derive(Deserialize)]
struct WirePoint {
    #[serde(rename = "X")]
    x: u32,
    #[serde(rename = "Y")]
    y: u32,
}

#[derive(Deserialize)]
struct WireMove {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, rename = "move")]
    body: Value,
}

impl StructuredCodec {
    fn field(&self, body: &Map<String, Value>, name: &str) -> CodecResult<Point> {
        let value = body
            .get(name)
            .ok_or_else(|| CodecError::MalformedMove(format!("missing field `{name}`")))?;
        self.decode_point(value)
    }
}

impl MoveCodec for StructuredCodec {
    fn generation(&self) -> WireGeneration {
        WireGeneration::Structured
    }

    fn encode_point(&self, point: Point) -> Value {
        json!({ "X": point.x, "Y": point.y })
    }

    fn decode_point(&self, value: &Value) -> CodecResult<Point> {
        let wire = WirePoint::deserialize(value)
            .map_err(|err| CodecError::MalformedPoint(format!("{value}: {err}")))?;
        Ok(Point::new(wire.x, wire.y))
    }

    fn encode_move(&self, mv: &Move) -> Value {
        let body = match *mv {
            Move::PlaceScout { position } => json!({ "position": self.encode_point(position) }),
            Move::Dash { from, to } | Move::Jump { from, to } => json!({
                "from": self.encode_point(from),
                "to": self.encode_point(to),
            }),
            Move::Boulder { anchor } => json!({ "anchor": self.encode_point(anchor) }),
            Move::Skip => json!({}),
        };
        json!({ "type": mv.kind().tag(), "move": body })
    }

    fn decode_move(&self, value: &Value) -> CodecResult<Move> {
        let wire = WireMove::deserialize(value)
            .map_err(|err| CodecError::MalformedMove(format!("{value}: {err}")))?;
        let kind = MoveKind::from_tag(&wire.kind)?;

        let empty = Map::new();
        let body = match &wire.body {
            Value::Object(body) => body,
            Value::Null => &empty,
            other => {
                return Err(CodecError::MalformedMove(format!(
                    "move body must be an object, got {other}"
                )))
            }
        };

        Ok(match kind {
            MoveKind::PlaceScout => Move::PlaceScout {
                position: self.field(body, "position")?,
            },
            MoveKind::Dash => Move::Dash {
                from: self.field(body, "from")?,
                to: self.field(body, "to")?,
            },
            MoveKind::Jump => Move::Jump {
                from: self.field(body, "from")?,
                to: self.field(body, "to")?,
            },
            MoveKind::Boulder => Move::Boulder {
                anchor: self.field(body, "anchor")?,
            },
            MoveKind::Skip => Move::Skip,
        })
    }
}
