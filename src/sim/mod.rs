//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (level elements in resolution rank order)
//! - No rendering or platform dependencies

pub mod character;
pub mod collision;
pub mod encounter;
pub mod level;
pub mod pursuit;
pub mod state;
pub mod tick;
pub mod timer;

pub use character::{Character, Form};
pub use collision::{ResolveContext, ResolveReport, resolve_character};
pub use encounter::{
    EncounterLayout, EncounterOutcome, EncounterPhase, EncounterSession, FeasibilityReport,
    analyze_feasibility, adjust_for_feasibility,
};
pub use level::{GeometryElement, GeometryKind, LevelSession};
pub use pursuit::{PursuerPhase, PursuitRoster};
pub use state::{
    EffectKind, GameEvent, GamePhase, GameState, PendingTransition, Snapshot, Transition,
};
pub use tick::{Action, TickInput, tick};
pub use timer::{AbilityTimer, TimerClass};
