//! Fixed timestep simulation tick
//!
//! Core game loop that advances simulation deterministically.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::character::AbilityContext;
use super::collision::{ResolveContext, resolve_character};
use super::encounter::EncounterOutcome;
use super::pursuit::Wanderer;
use super::state::{EffectKind, GameEvent, GamePhase, GameState, Transition};
use crate::consts::*;

/// Logical input actions (bound to keys in `Settings`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    MoveLeft,
    MoveRight,
    JumpBasic,
    /// Jump that also sustains the caster's levitation
    HeroJump,
    AbilityPrimary,
    AbilitySecondary,
    Form1,
    Form2,
    Form3,
    Form4,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::MoveLeft,
        Action::MoveRight,
        Action::JumpBasic,
        Action::HeroJump,
        Action::AbilityPrimary,
        Action::AbilitySecondary,
        Action::Form1,
        Action::Form2,
        Action::Form3,
        Action::Form4,
    ];

    #[inline]
    fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    /// Bit set of held actions
    pub held: u16,
    /// Last known pointer position in screen coordinates
    pub pointer: Option<Vec2>,
    /// Pause toggle
    pub pause: bool,
}

impl TickInput {
    #[inline]
    pub fn is_action_pressed(&self, action: Action) -> bool {
        self.held & action.bit() != 0
    }

    pub fn set(&mut self, action: Action, pressed: bool) {
        if pressed {
            self.held |= action.bit();
        } else {
            self.held &= !action.bit();
        }
    }

    /// Builder form of `set(action, true)`
    pub fn with(mut self, action: Action) -> Self {
        self.set(action, true);
        self
    }

    pub fn with_pointer(mut self, pointer: Vec2) -> Self {
        self.pointer = Some(pointer);
        self
    }

    /// Either jump binding
    #[inline]
    pub fn jump_held(&self) -> bool {
        self.is_action_pressed(Action::JumpBasic) || self.is_action_pressed(Action::HeroJump)
    }

    /// -1, +1, or `None` when neither or both directions are held
    pub fn horizontal_axis(&self) -> Option<f32> {
        match (
            self.is_action_pressed(Action::MoveLeft),
            self.is_action_pressed(Action::MoveRight),
        ) {
            (true, false) => Some(-1.0),
            (false, true) => Some(1.0),
            _ => None,
        }
    }
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing | GamePhase::Riding => {
                log::debug!("Paused in {:?}", state.phase);
                state.phase = GamePhase::Paused;
                state.prev_input = *input;
                return;
            }
            GamePhase::Paused => {
                state.phase = if state.encounter.as_ref().is_some_and(|e| e.is_riding()) {
                    GamePhase::Riding
                } else {
                    GamePhase::Playing
                };
            }
            _ => {}
        }
    }

    // Don't tick if paused or finished
    match state.phase {
        GamePhase::Paused | GamePhase::LevelComplete | GamePhase::EncounterComplete => return,
        _ => {}
    }

    state.time_ticks += 1;

    if let Some(pending) = state.pending
        && state.time_ticks >= pending.due_tick
    {
        log::info!("Running {:?}", pending.to);
        state.pending = None;
        match pending.to {
            Transition::RestartLevel => state.reset_level(),
            Transition::RestartEncounter => state.restart_encounter(),
        }
        state.prev_input = *input;
        return;
    }

    if state.phase == GamePhase::Riding {
        tick_encounter(state, input, dt);
    } else {
        tick_exploration(state, input, dt);
    }

    state.prev_input = *input;
}

fn tick_exploration(state: &mut GameState, input: &TickInput, dt: f32) {
    let frozen = state.is_frozen();

    if !frozen {
        let ctx = AbilityContext {
            level: state.level.id,
            camera_x: state.camera_x,
        };
        let prev = state.prev_input;
        state.character.update(input, &prev, &ctx, dt, &mut state.events);
    }

    let resolve_ctx = ResolveContext {
        interact: !frozen && input.is_action_pressed(Action::AbilityPrimary),
        dt,
    };
    let report = resolve_character(&mut state.character, &mut state.level, &resolve_ctx, &mut state.events);

    if report.submerged {
        state.reset_player_position();
    }

    if report.crystal_activated && state.level.wanderers.is_empty() {
        log::info!("Crystal woke the cave fairies");
        state.level.wanderers = Wanderer::spawn_all(&mut state.rng);
    }

    if report.board_vehicle {
        state.start_encounter();
        return;
    }

    if report.goal_reached {
        state.complete_level();
        return;
    }

    let body = state.character.rect();
    for p in &mut state.level.patrollers {
        p.step();
    }
    if state.level.patrollers.iter().any(|p| p.rect.overlaps(&body)) {
        log::info!("Caught by a patroller");
        state.events.push(GameEvent::Effect {
            kind: EffectKind::Debris,
            pos: state.character.center(),
        });
        state.reset_level();
        return;
    }

    let width = state.level.width;
    let mut caught = false;
    for w in &mut state.level.wanderers {
        caught |= w.update(state.character.pos, &body, width);
    }
    if caught && !frozen {
        log::info!("Caught by a cave fairy, restarting in {}s", WANDERER_RESTART_DELAY);
        state.schedule(Transition::RestartLevel, WANDERER_RESTART_DELAY);
    }

    state.follow_character();
}

fn tick_encounter(state: &mut GameState, input: &TickInput, dt: f32) {
    let level_id = state.level.id;
    state.character.handle_form_input(input, level_id, &mut state.events);

    let outcome = match state.encounter.as_mut() {
        Some(encounter) => {
            let outcome = encounter.update(input, state.character.form, &mut state.rng, dt, &mut state.events);
            state.camera_x = encounter.camera_x;
            // The character rides along for the renderer
            let rider = encounter.rider_rect();
            state.character.pos = Vec2::new(rider.x, rider.y);
            state.character.prev_pos = state.character.pos;
            state.character.vel = Vec2::ZERO;
            outcome
        }
        None => {
            log::warn!("Riding without an encounter");
            EncounterOutcome::Continue
        }
    };

    match outcome {
        EncounterOutcome::Continue | EncounterOutcome::RideStarted => {}
        EncounterOutcome::Crashed => state.schedule(Transition::RestartEncounter, CART_DEATH_DURATION),
        EncounterOutcome::Lethal => state.reset_level(),
        EncounterOutcome::Complete => state.phase = GamePhase::EncounterComplete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::{LevelData, LevelId};
    use crate::sim::character::Form;
    use crate::sim::encounter::{CinematicPhase, EncounterPhase};
    use crate::sim::level::GeometryKind;
    use crate::sim::state::PendingTransition;

    fn cave() -> GameState {
        let mut state = GameState::with_level(11, LevelData::builtin(LevelId::Cave));
        state.drain_events();
        state
    }

    /// Stand next to the cart with the lever already pulled
    fn at_cart(state: &mut GameState) {
        for e in &mut state.level.elements {
            if let GeometryKind::Lever { pulled } = &mut e.kind {
                *pulled = true;
            }
        }
        let cart = state.level.vehicle_rect().expect("cave has a cart");
        state.character.pos = Vec2::new(cart.x, GROUND_TOP - PLAYER_HEIGHT);
        state.character.on_ground = true;
    }

    const GROUND_TOP: f32 = VIEW_HEIGHT - 80.0;

    fn ride(state: &mut GameState) {
        at_cart(state);
        tick(state, &TickInput::default().with(Action::AbilityPrimary), SIM_DT);
        assert_eq!(state.phase, GamePhase::Riding);
    }

    #[test]
    fn test_input_axis() {
        let both = TickInput::default().with(Action::MoveLeft).with(Action::MoveRight);
        assert_eq!(both.horizontal_axis(), None);
        assert_eq!(TickInput::default().with(Action::MoveLeft).horizontal_axis(), Some(-1.0));
        assert!(TickInput::default().with(Action::HeroJump).jump_held());
        let mut input = TickInput::default().with(Action::Form3);
        input.set(Action::Form3, false);
        assert_eq!(input, TickInput::default());
    }

    #[test]
    fn test_pause_toggle_freezes_time() {
        let mut state = GameState::new(1);
        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &pause, SIM_DT);
        assert_eq!(state.phase, GamePhase::Paused);
        let t = state.time_ticks;
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.time_ticks, t);
        tick(&mut state, &pause, SIM_DT);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.time_ticks, t + 1);
    }

    #[test]
    fn test_cart_needs_lever() {
        let mut state = cave();
        let cart = state.level.vehicle_rect().expect("cave has a cart");
        state.character.pos = Vec2::new(cart.x, GROUND_TOP - PLAYER_HEIGHT);
        tick(&mut state, &TickInput::default().with(Action::AbilityPrimary), SIM_DT);
        assert_eq!(state.phase, GamePhase::Playing);

        ride(&mut state);
        let encounter = state.encounter.as_ref().expect("encounter");
        assert_eq!(encounter.phase, EncounterPhase::Cinematic(CinematicPhase::ZoomIn));
        assert!(state.drain_events().contains(&GameEvent::EncounterStarted));
    }

    #[test]
    fn test_pit_crash_restarts_at_zoom_in() {
        let mut state = cave();
        ride(&mut state);
        let encounter = state.encounter.as_mut().expect("encounter");
        encounter.phase = EncounterPhase::Ride;
        encounter.obstacles.clear();
        encounter.pursuit.swarm.clear();
        let start_x = encounter.layout.cart_start.x;
        let pit = encounter.ramps[0].pit_start();
        encounter.vehicle.pos.x = pit + 1.0;

        tick(&mut state, &TickInput::default(), SIM_DT);
        let encounter = state.encounter.as_ref().expect("encounter");
        assert_eq!(encounter.death_timer, CART_DEATH_DURATION);
        let due = state.time_ticks + (CART_DEATH_DURATION * TICKS_PER_SECOND as f32) as u64;
        assert_eq!(
            state.pending,
            Some(PendingTransition {
                due_tick: due,
                to: Transition::RestartEncounter
            })
        );

        while state.pending.is_some() {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert_eq!(state.time_ticks, due);
        let encounter = state.encounter.as_ref().expect("encounter");
        assert_eq!(encounter.phase, EncounterPhase::Cinematic(CinematicPhase::ZoomIn));
        assert_eq!(encounter.vehicle.pos.x, start_x);
        assert!(!encounter.is_dying());
        assert_eq!(state.phase, GamePhase::Riding);
    }

    #[test]
    fn test_lethal_obstacle_resets_level() {
        let mut state = cave();
        ride(&mut state);
        let encounter = state.encounter.as_mut().expect("encounter");
        encounter.phase = EncounterPhase::Ride;
        encounter.pursuit.swarm.clear();
        let beam = encounter.obstacles[0].x;
        encounter.vehicle.pos.x = beam - 40.0;

        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(!state.level.lever_pulled());
        assert_eq!(state.character.pos, state.level.spawn);
        let encounter = state.encounter.as_ref().expect("encounter");
        assert_eq!(encounter.phase, EncounterPhase::Exploration);
    }

    #[test]
    fn test_crystal_wakes_wanderers_and_contact_schedules_restart() {
        let mut state = cave();
        state.character.pos = Vec2::new(900.0, GROUND_TOP - PLAYER_HEIGHT);
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert!(state.level.crystal_activated());
        assert_eq!(state.level.wanderers.len(), WANDERER_COUNT);

        let body = state.character.rect();
        state.level.wanderers[0].pos = body.center();
        state.level.wanderers[0].vel = Vec2::ZERO;
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert!(state.is_frozen());

        // Frozen: movement input does nothing
        let x = state.character.pos.x;
        tick(&mut state, &TickInput::default().with(Action::MoveRight), SIM_DT);
        assert_eq!(state.character.pos.x, x);

        for _ in 0..TICKS_PER_SECOND {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert!(!state.is_frozen());
        assert!(state.level.wanderers.is_empty());
        assert!(!state.level.crystal_activated());
    }

    #[test]
    fn test_patroller_contact_resets_level() {
        let mut state = GameState::with_level(4, LevelData::builtin(LevelId::Forest));
        let worm = state.level.patrollers[0].rect;
        state.character.pos = Vec2::new(worm.x, GROUND_TOP - PLAYER_HEIGHT);
        state.character.timers.dash_cooldown.start(DASH_COOLDOWN);
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.character.pos, state.level.spawn);
        assert!(state.character.timers.dash_cooldown.is_ready());
        assert!(state.drain_events().contains(&GameEvent::LevelReset));
    }

    #[test]
    fn test_breach_door_completes_lab() {
        let mut state = GameState::new(8);
        let door = state
            .level
            .elements
            .iter()
            .find(|e| matches!(e.kind, GeometryKind::GoalDoor { .. }))
            .map(|e| e.rect)
            .expect("lab has a door");
        // The door sits on the high platform
        state.character.pos = Vec2::new(door.x, door.bottom() - PLAYER_HEIGHT);

        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.phase, GamePhase::Playing);

        tick(&mut state, &TickInput::default().with(Action::AbilityPrimary), SIM_DT);
        assert_eq!(state.phase, GamePhase::LevelComplete);
        assert!(state.unlocked[LevelId::Forest.index()]);
        assert!(state.drain_events().contains(&GameEvent::LevelComplete(LevelId::Lab)));
    }

    #[test]
    fn test_form_switch_allowed_on_the_cart() {
        let mut state = cave();
        ride(&mut state);
        tick(&mut state, &TickInput::default().with(Action::Form3), SIM_DT);
        assert_eq!(state.character.form, Form::Mage);
        tick(&mut state, &TickInput::default().with(Action::Form1), SIM_DT);
        assert_eq!(state.character.form, Form::Destroyer);
        assert_eq!(state.phase, GamePhase::Riding);
    }
}
