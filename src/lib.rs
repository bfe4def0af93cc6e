//! # Scouts Bridge
//!
//! Host-side bridge to a sandboxed Scouts rule engine module.
//!
//! The rules of the game live entirely inside an opaque binary module. This
//! crate loads that module through a host runtime shim, waits for it to boot
//! and publish its call surface, and exposes the six engine operations as a
//! typed, `Result`-returning handle.
//!
//! ## Features
//!
//! - **Module Loader**: buffered or streaming instantiation through a pluggable runtime shim
//! - **Readiness Synchronizer**: races surface publication against module crashes
//! - **Call Marshaller**: normalizes the direct-async and tuple calling conventions
//! - **Wire Codecs**: the structured and compact Move encodings, selected by configuration
//! - **Binding Surface**: `resetGame`, `boardPieces`, `pastTurns`, `currentTurn`, `makeMove`, `possibleMoves`
//!
//! ### Example
//!
//! ```ignore
//! use scouts_bridge::{Bridge, BridgeConfig, FsHost, Move, Player};
//!
//! let host = FsHost::new("dist").with_shim("wasm_exec", shim);
//! let bridge = Bridge::new(BridgeConfig::load_or_default(), Arc::new(host));
//! let engine = bridge.load().await?;
//!
//! engine.reset_game().await?;
//! engine.make_move(Player::One, &Move::Skip).await?;
//! ```
//!
//! ## Modules
//!
//! - [`contract`]: values exchanged with the engine
//! - [`codec`]: versioned wire encodings
//! - [`loader`]: module fetching, instantiation and startup
//! - [`readiness`]: boot-completion detection
//! - [`marshal`]: call conventions and error unwrapping
//! - [`surface`]: the engine operations and the [`Engine`] handle

/// Helper macros
#[macro_use]
pub mod macros;

/// Bridge entry point tying loading and readiness together
pub mod bridge;
/// Versioned wire encodings for moves and records
pub mod codec;
/// Configuration system
pub mod config;
/// Data contract shared with the engine
pub mod contract;
/// Error types
pub mod error;
/// Module loader and host abstractions
pub mod loader;
/// Logging setup
pub mod logging;
/// Call marshalling and result unwrapping
pub mod marshal;
/// Readiness synchronization
pub mod readiness;
/// Binding surface registry and typed engine handle
pub mod surface;

pub use bridge::Bridge;
pub use codec::{CompactCodec, MoveCodec, StructuredCodec, WireGeneration};
pub use config::{BridgeConfig, ConfigError, ConfigResult};
pub use contract::{
    CurrentTurn, Footprint, Move, MoveKind, PastTurn, Piece, Player, Point, PossibleMoves,
};
pub use error::{
    BridgeError, BridgeResult, CodecError, CodecResult, EngineError, ExecutionFailure, LoadError,
    LoadResult,
};
pub use loader::{ByteStream, FsHost, ModuleHost, ModuleInstance, ModuleSource, RuntimeShim};
pub use marshal::{CallConvention, Invocation, Marshaller};
pub use readiness::{ReadinessStrategy, SurfacePublisher, SurfaceSlot};
pub use surface::{BindingSurface, Engine, ModuleSurface, Operation};
