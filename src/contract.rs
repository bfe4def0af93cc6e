//! 数据契约
//!
//! 宿主与规则引擎之间交换的值：玩家、坐标、走法、棋子以及回合记录。
//! 这些类型与具体的线上编码无关，编码由 [`crate::codec`] 负责。

use crate::error::CodecError;
use std::fmt;

/// 玩家，只有两种身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Player {
    /// 先手玩家 (`1`)
    One = 1,
    /// 后手玩家 (`2`)
    Two = 2,
}

impl Player {
    /// 两位玩家，按行动顺序排列
    pub const BOTH: [Player; 2] = [Player::One, Player::Two];

    /// 线上使用的整数值
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// 对手
    pub const fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }
}

impl TryFrom<i64> for Player {
    type Error = CodecError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(CodecError::InvalidPlayer(other)),
        }
    }
}

impl TryFrom<u8> for Player {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Player::try_from(i64::from(value))
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> Self {
        player.as_u8()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// 棋盘坐标，原点位于左上角
///
/// 上界由规则引擎决定，桥接层只保证分量非负。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// 按偏移量平移；结果为负时返回 `None`
    pub fn offset(self, dx: i64, dy: i64) -> Option<Self> {
        let x = u32::try_from(i64::from(self.x) + dx).ok()?;
        let y = u32::try_from(i64::from(self.y) + dy).ok()?;
        Some(Self { x, y })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl std::str::FromStr for Point {
    type Err = CodecError;

    /// 解析 `"x,y"` 形式的坐标
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CodecError::MalformedPoint(s.to_string());
        let (x, y) = s.split_once(',').ok_or_else(malformed)?;
        let x = x.trim().parse::<u32>().map_err(|_| malformed())?;
        let y = y.trim().parse::<u32>().map_err(|_| malformed())?;
        Ok(Point::new(x, y))
    }
}

/// 走法类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    PlaceScout,
    Dash,
    Jump,
    Boulder,
    Skip,
}

impl MoveKind {
    pub const ALL: [MoveKind; 5] = [
        MoveKind::PlaceScout,
        MoveKind::Dash,
        MoveKind::Jump,
        MoveKind::Boulder,
        MoveKind::Skip,
    ];

    /// 线上标签
    pub const fn tag(self) -> &'static str {
        match self {
            MoveKind::PlaceScout => "place_scout",
            MoveKind::Dash => "dash",
            MoveKind::Jump => "jump",
            MoveKind::Boulder => "boulder",
            MoveKind::Skip => "skip",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, CodecError> {
        MoveKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| CodecError::UnknownMoveType(tag.to_string()))
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 玩家可以执行的一步走法
///
/// 每个变体只携带该动作需要的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// 在某点放置一个侦察兵
    PlaceScout { position: Point },
    /// 侦察兵沿无阻挡直线移动
    Dash { from: Point, to: Point },
    /// 侦察兵越过中间的棋子
    Jump { from: Point, to: Point },
    /// 放置巨石，`anchor` 为 2×2 占地的参考角
    Boulder { anchor: Point },
    /// 结束本回合，不影响棋盘
    Skip,
}

impl Move {
    pub const fn kind(&self) -> MoveKind {
        match self {
            Move::PlaceScout { .. } => MoveKind::PlaceScout,
            Move::Dash { .. } => MoveKind::Dash,
            Move::Jump { .. } => MoveKind::Jump,
            Move::Boulder { .. } => MoveKind::Boulder,
            Move::Skip => MoveKind::Skip,
        }
    }

    pub const fn is_boulder(&self) -> bool {
        matches!(self, Move::Boulder { .. })
    }
}

/// 巨石占据的 2×2 区域
///
/// 以最小坐标的角作为锚点保存，因此任何顺序给出的同一区域都相等。
/// 锚点的两个分量都小于 `u32::MAX`，四个占用点总能表示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Footprint {
    anchor: Point,
}

impl Footprint {
    /// 以 `anchor` 为左上角的区域；右下角超出坐标范围时返回 `None`
    pub const fn at(anchor: Point) -> Option<Self> {
        if anchor.x == u32::MAX || anchor.y == u32::MAX {
            return None;
        }
        Some(Self { anchor })
    }

    pub const fn anchor(&self) -> Point {
        self.anchor
    }

    /// 四个占用点，顺序固定为 左上、右上、左下、右下
    pub fn points(&self) -> [Point; 4] {
        let Point { x, y } = self.anchor;
        [
            Point::new(x, y),
            Point::new(x + 1, y),
            Point::new(x, y + 1),
            Point::new(x + 1, y + 1),
        ]
    }

    pub fn contains(&self, point: Point) -> bool {
        self.points().contains(&point)
    }
}

impl TryFrom<[Point; 4]> for Footprint {
    type Error = CodecError;

    /// 校验四个点恰好组成连续的 2×2 方块
    fn try_from(points: [Point; 4]) -> Result<Self, Self::Error> {
        let min_x = points.iter().map(|p| p.x).min().unwrap_or_default();
        let min_y = points.iter().map(|p| p.y).min().unwrap_or_default();
        let footprint =
            Footprint::at(Point::new(min_x, min_y)).ok_or_else(|| CodecError::Malformed {
                what: "boulder footprint",
                detail: format!("{points:?} exceeds the coordinate range"),
            })?;

        let mut expected = footprint.points();
        let mut given = points;
        expected.sort();
        given.sort();
        if expected != given {
            return Err(CodecError::Malformed {
                what: "boulder footprint",
                detail: format!("{points:?} is not a contiguous 2x2 block"),
            });
        }
        Ok(footprint)
    }
}

/// 棋盘上的棋子快照，由引擎返回，宿主只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Piece {
    Scout {
        player: Player,
        position: Point,
        /// 侦察兵正在返回己方底线
        returning: bool,
    },
    Boulder {
        player: Player,
        footprint: Footprint,
    },
}

impl Piece {
    pub const fn player(&self) -> Player {
        match self {
            Piece::Scout { player, .. } | Piece::Boulder { player, .. } => *player,
        }
    }

    /// 棋子是否占据某点
    pub fn occupies(&self, point: Point) -> bool {
        match self {
            Piece::Scout { position, .. } => *position == point,
            Piece::Boulder { footprint, .. } => footprint.contains(point),
        }
    }
}

/// 已结束的回合，走法顺序即回放顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastTurn {
    pub player: Player,
    pub moves: Vec<Move>,
}

/// 进行中的回合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTurn {
    pub player: Player,
    pub moves: Vec<Move>,
    /// 本回合已提交的步数
    pub plays: u32,
}

impl CurrentTurn {
    /// 新回合的起始状态
    pub fn begin(player: Player) -> Self {
        Self {
            player,
            moves: Vec::new(),
            plays: 0,
        }
    }

    /// 归档为 [`PastTurn`]，丢弃 `plays`
    pub fn into_past(self) -> PastTurn {
        PastTurn {
            player: self.player,
            moves: self.moves,
        }
    }
}

/// 玩家当前可执行的走法
///
/// `moves` 从不包含巨石走法，巨石是否可放只通过 `can_place_boulder` 报告，
/// 调用方只能通过尝试提交来得知具体位置是否合法。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PossibleMoves {
    pub moves: Vec<Move>,
    pub can_place_boulder: bool,
}

impl PossibleMoves {
    pub fn contains(&self, mv: &Move) -> bool {
        self.moves.contains(mv)
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}
