//! Shape Shift - a form-switching action platformer core
//!
//! Core modules:
//! - `sim`: Deterministic fixed-step simulation (abilities, collision, cart encounter)
//! - `levels`: Built-in level layouts and JSON level loading
//! - `settings`: Key bindings and other key/value preferences

pub mod levels;
pub mod settings;
pub mod sim;

pub use levels::{LevelData, LevelId};
pub use settings::{KeyBindings, Settings};

use glam::Vec2;

/// Game configuration constants
///
/// Speeds and accelerations are per-step literals tuned for 60 Hz.
/// Durations are in seconds and are consumed through `SIM_DT`.
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one step per rendered frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;
    /// Simulation steps per second
    pub const TICKS_PER_SECOND: u64 = 60;

    /// Viewport dimensions (one screen of level)
    pub const VIEW_WIDTH: f32 = 1280.0;
    pub const VIEW_HEIGHT: f32 = 720.0;

    /// Character bounding box
    pub const PLAYER_WIDTH: f32 = 48.0;
    pub const PLAYER_HEIGHT: f32 = 64.0;

    // === Locomotion ===
    pub const BASE_SPEED: f32 = 5.0;
    pub const AGILE_SPEED: f32 = 7.0;
    pub const CHARGE_SPEED: f32 = 10.0;
    pub const FATIGUE_SPEED: f32 = 2.2;
    pub const GRAVITY: f32 = 0.6;
    /// Caster falls a little heavier outside of levitation
    pub const CASTER_GRAVITY: f32 = 0.8;
    pub const SLOW_TIME_FACTOR: f32 = 0.3;

    pub const HEAVY_JUMP_VELOCITY: f32 = -12.0;
    pub const AGILE_JUMP_VELOCITY: f32 = -18.0;
    pub const AGILE_DOUBLE_JUMP_VELOCITY: f32 = -16.0;
    pub const AGILE_AIR_KICK_VELOCITY: f32 = -14.0;
    pub const CASTER_JUMP_VELOCITY: f32 = -15.0;

    // === Form A: charge ===
    pub const CHARGE_ACTIVE: f32 = 1.5;
    pub const CHARGE_FATIGUE: f32 = 3.0;
    /// Runs alongside fatigue, so both elapse together
    pub const CHARGE_COOLDOWN: f32 = CHARGE_FATIGUE;

    // === Form B: dash ===
    pub const DASH_SPEED: f32 = 15.0;
    pub const DASH_ACTIVE: f32 = 0.2;
    pub const DASH_COOLDOWN: f32 = 1.2;

    // === Form C: levitation, platforms, slow time ===
    pub const LEVITATE_MAX: f32 = 2.0;
    pub const MAGIC_PLATFORM_WIDTH: f32 = 80.0;
    pub const MAGIC_PLATFORM_HEIGHT: f32 = 16.0;
    pub const MAGIC_PLATFORM_GAP: f32 = 8.0;
    pub const MAGIC_PLATFORM_LIFETIME: f32 = 2.0;
    pub const MAGIC_PLATFORM_COOLDOWN: f32 = 2.6;
    pub const SLOW_TIME_ACTIVE: f32 = 3.0;
    pub const SLOW_TIME_COOLDOWN: f32 = 5.0;

    // === Form D: vine and impulse ===
    pub const VINE_COOLDOWN: f32 = 1.5;
    pub const VINE_DRIFT_X: f32 = 6.0;
    pub const VINE_DRIFT_Y: f32 = 10.0;
    pub const VINE_LEVER_GRACE: f32 = 0.8;
    pub const VINE_LEVER_REACH: f32 = 60.0;
    pub const IMPULSE_STRENGTH: f32 = 36.0;
    pub const IMPULSE_VERTICAL_SCALE: f32 = 0.55;
    pub const IMPULSE_ACTIVE: f32 = 0.32;
    pub const IMPULSE_COOLDOWN: f32 = 3.0;

    // === Collision ===
    /// A foot this close to a wall's top edge stands on it instead of being pushed
    pub const WALL_STEP_TOLERANCE: f32 = 8.0;
    pub const HAZARD_SINK_VELOCITY: f32 = 8.0;
    pub const HAZARD_SINK_PUSH: f32 = 12.0;
    pub const INTERACT_RADIUS: f32 = 80.0;
    pub const BRANCH_BREAK_LOAD: f32 = 0.5;
    pub const BRANCH_SAG_LOAD: f32 = 1.2;
    pub const BRANCH_SAG_OFFSET: f32 = 18.0;

    // === Rail cart ===
    pub const CART_WIDTH: f32 = 60.0;
    pub const CART_HEIGHT: f32 = 40.0;
    pub const CART_LAUNCH_SPEED: f32 = 4.0;
    pub const CART_BASE_SPEED: f32 = 6.0;
    pub const CART_SPEED_EASING: f32 = 0.04;
    pub const CART_MULTIPLIER_STEP: f32 = 0.0004;
    pub const CART_MULTIPLIER_MAX: f32 = 2.2;
    pub const CART_JUMP_ASCENT_RATE: f32 = 16.0;
    pub const CART_JUMP_MAX_HEIGHT: f32 = 220.0;
    pub const CART_JUMP_DESCENT_RATE: f32 = 6.0;
    pub const CART_JUMP_MIN_HOLD_HEIGHT: f32 = 90.0;
    pub const CART_JUMP_HOLD_BONUS: f32 = 10.0;
    /// Margin kept below the jump ceiling when lowering obstacles
    pub const FEASIBILITY_MARGIN: f32 = 5.0;
    pub const FLIGHT_DURATION: f32 = 1.2;
    pub const FLIGHT_PEAK_SCALE: f32 = 0.9;
    pub const FLIGHT_LANDING_OVERSHOOT: f32 = 40.0;
    pub const CART_DEATH_DURATION: f32 = 1.5;
    /// Distance before the finish line where the ride hands over to the final cutscene
    pub const CART_FINISH_MARGIN: f32 = 300.0;

    // === Cinematic ===
    pub const ZOOM_IN_DURATION: f32 = 2.2;
    pub const READY_DURATION: f32 = 1.4;
    pub const COUNTDOWN_DURATION: f32 = 3.0;

    // === Fairies ===
    pub const MAX_ENGAGED_PURSUERS: usize = 2;
    pub const PURSUER_WAIT: f32 = 1.0;
    pub const PURSUER_BLOCK: f32 = 3.0;
    pub const PURSUER_CLEARANCE: f32 = 45.0;
    pub const SWARM_SIZE: usize = 6;
    pub const WANDERER_COUNT: usize = 3;
    pub const WANDERER_RESTART_DELAY: f32 = 1.0;
}

/// Axis-aligned rectangle in world space (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle of the given size centred on `center`
    pub fn centered(center: Vec2, w: f32, h: f32) -> Self {
        Self::new(center.x - w / 2.0, center.y - h / 2.0, w, h)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Strict AABB overlap (touching edges do not count)
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert a tick count to seconds of simulated time
#[inline]
pub fn ticks_to_secs(ticks: u64) -> f32 {
    ticks as f32 * consts::SIM_DT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_overlap_excludes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.overlaps(&Rect::new(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.overlaps(&Rect::new(0.0, 10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_rect_centered() {
        let r = Rect::centered(Vec2::new(50.0, 50.0), 20.0, 10.0);
        assert_eq!(r, Rect::new(40.0, 45.0, 20.0, 10.0));
        assert_eq!(r.center(), Vec2::new(50.0, 50.0));
    }
}
