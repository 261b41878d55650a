//! Game state and core simulation types
//!
//! Everything `tick` mutates lives in `GameState`. Renderers only ever see
//! a `Snapshot` and the drained `GameEvent`s.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::character::{Character, Form, MagicPlatform, Vine};
use super::encounter::{EncounterPhase, EncounterSession, FeasibilityReport, Obstacle, Ramp};
use super::level::{GeometryElement, LevelSession};
use super::pursuit::PursuerPhase;
use super::tick::TickInput;
use super::timer::{TimerClass, TimerId};
use crate::consts::*;
use crate::levels::{LevelData, LevelId};
use crate::{Rect, ticks_to_secs};

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Free platforming
    Playing,
    /// Cart cinematic or ride in progress
    Riding,
    /// Game is paused
    Paused,
    /// Goal door reached; waiting for the host to enter the next level
    LevelComplete,
    /// Cart reached the end of the rails
    EncounterComplete,
}

/// Visual/audio effect requests for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    FormShift,
    ChargeBurst,
    DashTrail,
    AirKick,
    DoubleJump,
    SlowTime,
    PlatformConjured,
    VineCast,
    VineFaded,
    ImpulseBurst,
    BranchSnap,
    Debris,
    Sparkle,
    Splash,
    LeverPulled,
    CrystalFusion,
    Respawn,
    CartSpark,
    RampRaised,
    CartCrash,
    FairyRelease,
}

/// Something the presentation layer should react to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Effect { kind: EffectKind, pos: Vec2 },
    FormChanged(Form),
    GemCollected,
    LevelEntered(LevelId),
    LevelReset,
    LevelComplete(LevelId),
    PlayerRespawned,
    EncounterStarted,
    RideStarted,
    EncounterRestarted,
    EncounterComplete,
}

/// Deferred state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    RestartLevel,
    RestartEncounter,
}

/// A transition that fires once `time_ticks` reaches `due_tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransition {
    pub due_tick: u64,
    pub to: Transition,
}

/// Complete game state (deterministic)
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub phase: GamePhase,
    /// Authored layout of the current level (restored on reset)
    pub level_data: LevelData,
    pub level: LevelSession,
    pub character: Character,
    pub encounter: Option<EncounterSession>,
    /// Encounter as rolled on level entry (restored on reset)
    pub initial_encounter: Option<EncounterSession>,
    /// Levels the player may enter, indexed by `LevelId::index`
    pub unlocked: [bool; LevelId::ALL.len()],
    pub camera_x: f32,
    pub pending: Option<PendingTransition>,
    /// Input of the previous step (edge detection)
    pub prev_input: TickInput,
    pub(crate) events: Vec<GameEvent>,
}

impl GameState {
    /// Create a new game state at the first level
    pub fn new(seed: u64) -> Self {
        Self::with_level(seed, LevelData::builtin(LevelId::Lab))
    }

    /// Create a new game state starting in an arbitrary (possibly loaded) level
    pub fn with_level(seed: u64, data: LevelData) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let level = LevelSession::new(&data);
        let character = Character::new(data.spawn);
        let encounter = data
            .encounter
            .clone()
            .map(|layout| EncounterSession::new(layout, data.width, &mut rng));
        let mut unlocked = [false; LevelId::ALL.len()];
        unlocked[data.id.index()] = true;

        let mut state = Self {
            seed,
            rng,
            time_ticks: 0,
            phase: GamePhase::Playing,
            level_data: data,
            level,
            character,
            initial_encounter: encounter.clone(),
            encounter,
            unlocked,
            camera_x: 0.0,
            pending: None,
            prev_input: TickInput::default(),
            events: Vec::new(),
        };
        state.follow_character();
        state
    }

    /// Move to a built-in level
    pub fn enter_level(&mut self, id: LevelId) {
        if !self.unlocked[id.index()] {
            log::debug!("{} is still locked", id.name());
            return;
        }
        self.load_level(LevelData::builtin(id));
    }

    /// Replace the current level with `data` and start it from the spawn
    pub fn load_level(&mut self, data: LevelData) {
        log::info!("Entering level {}", data.id.name());
        self.unlocked[data.id.index()] = true;
        self.initial_encounter = data
            .encounter
            .clone()
            .map(|layout| EncounterSession::new(layout, data.width, &mut self.rng));
        self.level_data = data;
        self.restore_level();
        self.events.push(GameEvent::LevelEntered(self.level_data.id));
    }

    /// Full restart of the current level: geometry, character, encounter
    pub fn reset_level(&mut self) {
        log::info!("Resetting level {}", self.level_data.id.name());
        self.restore_level();
        self.events.push(GameEvent::LevelReset);
    }

    fn restore_level(&mut self) {
        let data = &self.level_data;
        self.level = LevelSession::new(data);
        self.character.reset(data.spawn);
        self.encounter = self.initial_encounter.clone();
        self.pending = None;
        self.phase = GamePhase::Playing;
        self.follow_character();
    }

    /// Put the character back on the spawn point; the level keeps its state
    pub fn reset_player_position(&mut self) {
        log::info!("Respawning at {:?}", self.level.spawn);
        let fell_at = self.character.center();
        self.character.respawn(self.level.spawn);
        self.events.push(GameEvent::Effect {
            kind: EffectKind::Splash,
            pos: fell_at,
        });
        self.events.push(GameEvent::Effect {
            kind: EffectKind::Respawn,
            pos: self.character.center(),
        });
        self.events.push(GameEvent::PlayerRespawned);
        self.follow_character();
    }

    /// Back to the cart's start and the zoom-in
    pub fn restart_encounter(&mut self) {
        let Some(encounter) = self.encounter.as_mut() else {
            log::debug!("No encounter to restart");
            return;
        };
        encounter.restart();
        self.camera_x = encounter.camera_x;
        self.pending = None;
        self.phase = GamePhase::Riding;
        self.events.push(GameEvent::EncounterRestarted);
    }

    /// Board the cart and start the cinematic
    pub fn start_encounter(&mut self) {
        let Some(encounter) = self.encounter.as_mut() else {
            log::debug!("Level has no encounter");
            return;
        };
        encounter.board(&mut self.events);
        if encounter.is_riding() {
            self.level.set_vehicle_activated();
            self.camera_x = encounter.camera_x;
            self.phase = GamePhase::Riding;
        }
    }

    /// Mark the level finished and unlock the next one
    pub fn complete_level(&mut self) {
        let id = self.level.id;
        log::info!("Level {} complete", id.name());
        if let Some(next) = id.next() {
            self.unlocked[next.index()] = true;
        }
        self.phase = GamePhase::LevelComplete;
        self.events.push(GameEvent::LevelComplete(id));
    }

    /// Queue a transition `delay` seconds from now. An already queued one wins.
    pub fn schedule(&mut self, to: Transition, delay: f32) {
        if let Some(pending) = self.pending {
            log::debug!("{:?} ignored, {:?} already queued", to, pending.to);
            return;
        }
        let due_tick = self.time_ticks + (delay * TICKS_PER_SECOND as f32).round() as u64;
        self.pending = Some(PendingTransition { due_tick, to });
    }

    /// Character input is ignored while a restart is queued
    pub fn is_frozen(&self) -> bool {
        self.pending.is_some()
    }

    pub fn follow_character(&mut self) {
        let max = (self.level.width - VIEW_WIDTH).max(0.0);
        self.camera_x = (self.character.center().x - VIEW_WIDTH / 2.0).clamp(0.0, max);
    }

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Serializable view of everything a renderer needs
    pub fn snapshot(&self) -> Snapshot {
        let c = &self.character;
        Snapshot {
            tick: self.time_ticks,
            time: ticks_to_secs(self.time_ticks),
            phase: self.phase,
            level: self.level.id,
            camera_x: self.camera_x,
            unlocked: self.unlocked,
            gem_collected: self.level.gem_collected(),
            character: CharacterView {
                rect: c.rect(),
                form: c.form,
                on_ground: c.on_ground,
                facing: c.facing,
                charging: c.is_charging(),
                platforms: c.platforms.clone(),
                vine: c.vine,
            },
            cooldowns: c
                .timers
                .iter()
                .map(|(id, t)| CooldownView {
                    id,
                    class: t.class,
                    remaining: t.remaining,
                    duration: t.duration,
                })
                .collect(),
            geometry: self.level.elements.clone(),
            patrollers: self.level.patrollers.iter().map(|p| p.rect).collect(),
            wanderers: self.level.wanderers.iter().map(|w| w.hit_rect()).collect(),
            encounter: self.encounter.as_ref().map(EncounterView::from_session),
        }
    }
}

/// Timer state for the cooldown HUD
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CooldownView {
    pub id: TimerId,
    pub class: TimerClass,
    pub remaining: f32,
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterView {
    pub rect: Rect,
    pub form: Form,
    pub on_ground: bool,
    pub facing: f32,
    pub charging: bool,
    pub platforms: Vec<MagicPlatform>,
    pub vine: Option<Vine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PursuerView {
    pub rect: Rect,
    pub phase: PursuerPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterView {
    pub phase: EncounterPhase,
    pub countdown: f32,
    pub cart: Rect,
    pub elevation: f32,
    pub rider: Rect,
    pub progress: f32,
    pub death_timer: f32,
    pub ramps: Vec<Ramp>,
    pub obstacles: Vec<Obstacle>,
    pub feasibility: Option<FeasibilityReport>,
    pub pursuers: Vec<PursuerView>,
    pub swarm: Vec<Vec2>,
}

impl EncounterView {
    fn from_session(s: &EncounterSession) -> Self {
        let v = &s.vehicle;
        Self {
            phase: s.phase,
            countdown: s.countdown,
            cart: Rect::new(v.pos.x, v.pos.y - v.elevation(), CART_WIDTH, CART_HEIGHT),
            elevation: v.elevation(),
            rider: s.rider_rect(),
            progress: s.progress(),
            death_timer: s.death_timer,
            ramps: s.ramps.clone(),
            obstacles: s.obstacles.clone(),
            feasibility: s.feasibility.clone(),
            pursuers: s
                .pursuit
                .pursuers
                .iter()
                .filter(|p| p.phase.is_engaged() || p.phase == PursuerPhase::Withdrawing)
                .map(|p| PursuerView {
                    rect: p.hit_rect(),
                    phase: p.phase,
                })
                .collect(),
            swarm: s
                .pursuit
                .swarm
                .iter()
                .filter(|f| !f.released)
                .map(|f| f.pos)
                .collect(),
        }
    }
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    /// Simulated seconds
    pub time: f32,
    pub phase: GamePhase,
    pub level: LevelId,
    pub camera_x: f32,
    pub unlocked: [bool; LevelId::ALL.len()],
    pub gem_collected: bool,
    pub character: CharacterView,
    pub cooldowns: Vec<CooldownView>,
    pub geometry: Vec<GeometryElement>,
    pub patrollers: Vec<Rect>,
    pub wanderers: Vec<Rect>,
    pub encounter: Option<EncounterView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::GeometryKind;
    use crate::sim::tick::{Action, tick};

    #[test]
    fn test_new_state_starts_in_lab() {
        let state = GameState::new(1);
        assert_eq!(state.level.id, LevelId::Lab);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.character.pos, state.level.spawn);
        assert_eq!(state.unlocked, [true, false, false]);
        assert!(state.encounter.is_none());
    }

    #[test]
    fn test_locked_level_is_refused() {
        let mut state = GameState::new(1);
        state.enter_level(LevelId::Cave);
        assert_eq!(state.level.id, LevelId::Lab);

        state.complete_level();
        assert!(state.unlocked[LevelId::Forest.index()]);
        state.enter_level(LevelId::Forest);
        assert_eq!(state.level.id, LevelId::Forest);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.drain_events().contains(&GameEvent::LevelEntered(LevelId::Forest)));
    }

    #[test]
    fn test_hazard_sinks_then_respawns() {
        let mut state = GameState::with_level(3, LevelData::builtin(LevelId::Forest));
        state.level.patrollers.clear();
        state.character.pos = Vec2::new(1000.0, 576.0);
        state.character.on_ground = true;
        state.drain_events();

        let idle = TickInput::default();
        let mut last_y = state.character.pos.y;
        let mut respawned = false;
        for _ in 0..30 {
            tick(&mut state, &idle, SIM_DT);
            if state.drain_events().contains(&GameEvent::PlayerRespawned) {
                respawned = true;
                break;
            }
            assert!(state.character.sinking);
            assert!(state.character.vel.y > 0.0);
            assert!(state.character.pos.y >= last_y);
            last_y = state.character.pos.y;
        }
        assert!(respawned);
        assert_eq!(state.character.pos, state.level.spawn);
        assert_eq!(state.character.vel, Vec2::ZERO);
        assert!(!state.character.sinking);
    }

    #[test]
    fn test_reset_level_restores_everything() {
        let mut state = GameState::with_level(5, LevelData::builtin(LevelId::Lab));
        for e in &mut state.level.elements {
            match &mut e.kind {
                GeometryKind::DestructibleWall { broken, .. } => *broken = true,
                GeometryKind::Collectible { collected } => *collected = true,
                _ => {}
            }
        }
        state.character.pos = Vec2::new(900.0, 100.0);
        state.character.vel = Vec2::new(3.0, -4.0);
        state.character.timers.charge_cooldown.start(CHARGE_COOLDOWN);
        state.schedule(Transition::RestartLevel, 1.0);

        state.reset_level();

        assert_eq!(state.level, LevelSession::new(&state.level_data));
        assert_eq!(state.character.pos, state.level.spawn);
        assert_eq!(state.character.vel, Vec2::ZERO);
        assert!(state.character.timers.iter().all(|(_, t)| t.is_ready()));
        assert!(state.pending.is_none());
        assert!(!state.level.gem_collected());
        assert!(state.drain_events().contains(&GameEvent::LevelReset));
    }

    #[test]
    fn test_reset_level_restores_initial_encounter() {
        let mut state = GameState::with_level(11, LevelData::builtin(LevelId::Cave));
        let initial = state.encounter.clone();
        assert!(initial.is_some());

        state.start_encounter();
        for _ in 0..200 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert_ne!(state.encounter, initial);

        state.reset_level();
        assert_eq!(state.encounter, initial);
        assert_eq!(state.phase, GamePhase::Playing);

        state.reset_level();
        assert_eq!(state.encounter, initial);
    }

    #[test]
    fn test_first_scheduled_transition_wins() {
        let mut state = GameState::new(1);
        state.time_ticks = 10;
        state.schedule(Transition::RestartEncounter, CART_DEATH_DURATION);
        state.schedule(Transition::RestartLevel, 0.0);
        assert_eq!(
            state.pending,
            Some(PendingTransition {
                due_tick: 100,
                to: Transition::RestartEncounter
            })
        );
        assert!(state.is_frozen());
    }

    #[test]
    fn test_snapshot_carries_hud_timers() {
        let mut state = GameState::new(9);
        state.character.timers.charge_active.start(CHARGE_ACTIVE);
        let snap = state.snapshot();
        let charge = snap
            .cooldowns
            .iter()
            .find(|c| c.id == TimerId::ChargeActive)
            .expect("charge timer listed");
        assert_eq!(charge.remaining, CHARGE_ACTIVE);
        assert_eq!(charge.class, TimerClass::ActiveWindow);
        assert!(snap.character.charging);
        assert!(serde_json::to_string(&snap).is_ok());
    }

    #[test]
    fn test_form_keys_switch_and_report() {
        let mut state = GameState::new(2);
        state.drain_events();
        tick(&mut state, &TickInput::default().with(Action::Form2), SIM_DT);
        assert_eq!(state.character.form, Form::Ninja);
        assert!(state.drain_events().contains(&GameEvent::FormChanged(Form::Ninja)));
    }
}
