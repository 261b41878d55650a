//! The playable character and its per-form ability state machine
//!
//! One `update` per step turns held input into velocity and ability
//! activations, then integrates position with a plain Euler step. The
//! collision resolver corrects the result afterwards.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{EffectKind, GameEvent};
use super::tick::{Action, TickInput};
use super::timer::{AbilityTimer, AbilityTimers, TimerClass};
use crate::Rect;
use crate::consts::*;
use crate::levels::LevelId;

/// The four mutually exclusive character forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Form {
    /// Form A: heavy, breaks walls and trees with a timed charge
    #[default]
    Destroyer,
    /// Form B: fast, double jump and dash
    Ninja,
    /// Form C: levitation, magic platforms, slow time
    Mage,
    /// Form D: vine cast and vine impulse
    Druid,
}

impl Form {
    pub const ALL: [Form; 4] = [Form::Destroyer, Form::Ninja, Form::Mage, Form::Druid];

    /// The action that selects this form
    pub fn action(self) -> Action {
        match self {
            Form::Destroyer => Action::Form1,
            Form::Ninja => Action::Form2,
            Form::Mage => Action::Form3,
            Form::Druid => Action::Form4,
        }
    }

    /// The druid only awakens after the first level
    pub fn available_in(self, level: LevelId) -> bool {
        self != Form::Druid || level != LevelId::Lab
    }

    fn jump_velocity(self) -> f32 {
        match self {
            Form::Ninja => AGILE_JUMP_VELOCITY,
            Form::Mage => CASTER_JUMP_VELOCITY,
            Form::Destroyer | Form::Druid => HEAVY_JUMP_VELOCITY,
        }
    }
}

/// Ephemeral standing platform conjured by the mage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicPlatform {
    pub rect: Rect,
    pub lifetime: AbilityTimer,
}

/// A cast vine line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vine {
    /// Character top-left at cast time (drift reference)
    pub origin: Vec2,
    /// Character centre at cast time (line start)
    pub start: Vec2,
    /// World-space target
    pub target: Vec2,
}

impl Vine {
    pub fn direction(&self) -> Vec2 {
        (self.target - self.start).normalize_or_zero()
    }
}

/// Per-step context the ability state machine needs from the session
#[derive(Debug, Clone, Copy)]
pub struct AbilityContext {
    pub level: LevelId,
    pub camera_x: f32,
}

/// The single controllable character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Top-left corner
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    /// Position before this step's integration
    pub prev_pos: Vec2,
    pub on_ground: bool,
    pub form: Form,
    /// +1 right, -1 left
    pub facing: f32,
    pub timers: AbilityTimers,
    pub can_double_jump: bool,
    pub air_kick_used: bool,
    pub levitating: bool,
    pub dash_dir: f32,
    pub platforms: Vec<MagicPlatform>,
    pub vine: Option<Vine>,
    /// Caught in a hazard fluid last step
    pub sinking: bool,
}

impl Character {
    pub fn new(spawn: Vec2) -> Self {
        Self {
            pos: spawn,
            vel: Vec2::ZERO,
            size: Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT),
            prev_pos: spawn,
            on_ground: false,
            form: Form::default(),
            facing: 1.0,
            timers: AbilityTimers::default(),
            can_double_jump: false,
            air_kick_used: false,
            levitating: false,
            dash_dir: 1.0,
            platforms: Vec::new(),
            vine: None,
            sinking: false,
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.pos.x, self.pos.y, self.size.x, self.size.y)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.pos + self.size / 2.0
    }

    /// Y of the bottom edge
    #[inline]
    pub fn foot(&self) -> f32 {
        self.pos.y + self.size.y
    }

    pub fn is_charging(&self) -> bool {
        self.form == Form::Destroyer && self.timers.charge_active.is_running()
    }

    pub fn slow_factor(&self) -> f32 {
        if self.timers.slow_time_active.is_running() {
            SLOW_TIME_FACTOR
        } else {
            1.0
        }
    }

    /// Move back to a spawn point, dropping all transient motion state.
    /// Cooldowns keep running.
    pub fn respawn(&mut self, spawn: Vec2) {
        self.pos = spawn;
        self.prev_pos = spawn;
        self.vel = Vec2::ZERO;
        self.on_ground = false;
        self.can_double_jump = false;
        self.air_kick_used = false;
        self.levitating = false;
        self.timers.levitate.clear();
        self.platforms.clear();
        self.vine = None;
        self.sinking = false;
    }

    /// Full reset for a level restart: respawn and clear every timer
    pub fn reset(&mut self, spawn: Vec2) {
        self.respawn(spawn);
        self.timers.clear_all();
        self.dash_dir = 1.0;
        self.facing = 1.0;
    }

    /// Switch form, clearing the vacated form's ability state.
    ///
    /// Committed world effects (broken walls, live platforms) are untouched.
    pub fn switch_form(&mut self, form: Form, events: &mut Vec<GameEvent>) {
        if form == self.form {
            return;
        }
        let t = &mut self.timers;
        match self.form {
            Form::Destroyer => {
                t.charge_active.clear();
                t.charge_fatigue.clear();
                t.charge_cooldown.clear();
            }
            Form::Ninja => {
                t.dash_active.clear();
                t.dash_cooldown.clear();
            }
            Form::Mage => {
                t.levitate.clear();
                t.platform_cooldown.clear();
                t.slow_time_active.clear();
                t.slow_time_cooldown.clear();
                self.levitating = false;
            }
            Form::Druid => {
                t.vine_cooldown.clear();
                t.vine_grace.clear();
                t.impulse_active.clear();
                t.impulse_cooldown.clear();
                self.vine = None;
            }
        }
        log::debug!("Form {:?} -> {:?}", self.form, form);
        self.form = form;
        events.push(GameEvent::FormChanged(form));
        events.push(GameEvent::Effect {
            kind: EffectKind::FormShift,
            pos: self.center(),
        });
    }

    /// Advance the character by one step (input → velocity → abilities → position)
    pub fn update(
        &mut self,
        input: &TickInput,
        prev: &TickInput,
        ctx: &AbilityContext,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) {
        self.handle_form_input(input, ctx.level, events);

        self.timers.tick_cooldowns(dt);
        self.tick_windows(dt, events);

        if self.on_ground {
            self.can_double_jump = true;
            self.air_kick_used = false;
            self.levitating = false;
        }

        self.trigger_abilities(input, ctx, events);
        self.apply_horizontal(input);
        self.apply_vertical(input, prev, dt, events);
        self.check_vine_drift();

        // Euler step
        self.prev_pos = self.pos;
        self.pos += self.vel;
        if self.sinking {
            self.pos.y += HAZARD_SINK_PUSH;
        }

        if self.form == Form::Mage
            && input.is_action_pressed(Action::AbilityPrimary)
            && self.timers.platform_cooldown.is_ready()
            && self.platforms.is_empty()
        {
            self.spawn_platform(events);
        }
        for p in &mut self.platforms {
            p.lifetime.tick(dt);
        }
        self.platforms.retain(|p| p.lifetime.is_running());
    }

    pub(crate) fn handle_form_input(&mut self, input: &TickInput, level: LevelId, events: &mut Vec<GameEvent>) {
        if !self.form.available_in(level) {
            self.switch_form(Form::Destroyer, events);
        }
        for form in Form::ALL {
            if input.is_action_pressed(form.action()) && form != self.form {
                if form.available_in(level) {
                    self.switch_form(form, events);
                } else {
                    log::debug!("{:?} is not available in {:?}", form, level);
                }
                break;
            }
        }
    }

    /// Count down active/fatigue windows and run their expiry transitions
    fn tick_windows(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let t = &mut self.timers;

        // Charge: active -> fatigue (+ cooldown) -> idle
        if t.charge_active.is_running() {
            t.charge_active.tick(dt);
            if t.charge_active.is_ready() {
                t.charge_fatigue.start(CHARGE_FATIGUE);
                t.charge_cooldown.start(CHARGE_COOLDOWN);
                log::debug!("Charge spent, fatigue for {}s", CHARGE_FATIGUE);
            }
        } else if t.charge_fatigue.is_running() {
            t.charge_fatigue.tick(dt);
        }

        t.dash_active.tick(dt);
        t.slow_time_active.tick(dt);
        t.impulse_active.tick(dt);

        if t.vine_grace.is_running() {
            t.vine_grace.tick(dt);
            if t.vine_grace.is_ready() && self.vine.take().is_some() {
                events.push(GameEvent::Effect {
                    kind: EffectKind::VineFaded,
                    pos: self.center(),
                });
            }
        }
    }

    fn trigger_abilities(&mut self, input: &TickInput, ctx: &AbilityContext, events: &mut Vec<GameEvent>) {
        let primary = input.is_action_pressed(Action::AbilityPrimary);
        let secondary = input.is_action_pressed(Action::AbilitySecondary);
        let center = self.center();
        let t = &mut self.timers;

        match self.form {
            Form::Destroyer => {
                if secondary
                    && t.charge_active.is_ready()
                    && t.charge_fatigue.is_ready()
                    && t.charge_cooldown.is_ready()
                {
                    t.charge_active.start(CHARGE_ACTIVE);
                    events.push(GameEvent::Effect {
                        kind: EffectKind::ChargeBurst,
                        pos: center,
                    });
                }
            }
            Form::Ninja => {
                if primary && t.dash_cooldown.is_ready() {
                    t.dash_active.start(DASH_ACTIVE);
                    t.dash_cooldown.start(DASH_COOLDOWN);
                    self.dash_dir = input.horizontal_axis().unwrap_or(self.facing);
                    events.push(GameEvent::Effect {
                        kind: EffectKind::DashTrail,
                        pos: center,
                    });
                }
                if secondary && !self.on_ground && !self.air_kick_used {
                    self.vel.y = AGILE_AIR_KICK_VELOCITY;
                    self.air_kick_used = true;
                    events.push(GameEvent::Effect {
                        kind: EffectKind::AirKick,
                        pos: center,
                    });
                }
            }
            Form::Mage => {
                if secondary && t.slow_time_cooldown.is_ready() {
                    t.slow_time_active.start(SLOW_TIME_ACTIVE);
                    t.slow_time_cooldown.start(SLOW_TIME_COOLDOWN);
                    events.push(GameEvent::Effect {
                        kind: EffectKind::SlowTime,
                        pos: center,
                    });
                }
            }
            Form::Druid => {
                if primary && t.vine_cooldown.is_ready() {
                    let pointer = input
                        .pointer
                        .unwrap_or(Vec2::new(VIEW_WIDTH / 2.0, VIEW_HEIGHT / 2.0));
                    self.vine = Some(Vine {
                        origin: self.pos,
                        start: center,
                        target: pointer + Vec2::new(ctx.camera_x, 0.0),
                    });
                    t.vine_cooldown.start(VINE_COOLDOWN);
                    t.vine_grace.clear();
                    events.push(GameEvent::Effect {
                        kind: EffectKind::VineCast,
                        pos: center,
                    });
                }
                if secondary && t.impulse_cooldown.is_ready() {
                    if let Some(vine) = self.vine {
                        let dir = vine.direction();
                        self.vel = Vec2::new(
                            dir.x * IMPULSE_STRENGTH,
                            dir.y * IMPULSE_STRENGTH * IMPULSE_VERTICAL_SCALE,
                        );
                        self.on_ground = false;
                        t.impulse_active.start(IMPULSE_ACTIVE);
                        t.impulse_cooldown.start(IMPULSE_COOLDOWN);
                        events.push(GameEvent::Effect {
                            kind: EffectKind::ImpulseBurst,
                            pos: center,
                        });
                    }
                }
            }
        }
    }

    fn apply_horizontal(&mut self, input: &TickInput) {
        let slow = self.slow_factor();
        let speed = match self.form {
            Form::Ninja => AGILE_SPEED * slow,
            Form::Destroyer if self.timers.charge_active.is_running() => CHARGE_SPEED,
            Form::Destroyer if self.timers.charge_fatigue.is_running() => FATIGUE_SPEED * slow,
            _ => BASE_SPEED * slow,
        };

        if let Some(dir) = input.horizontal_axis() {
            self.facing = dir;
        }

        if self.timers.dash_active.is_running() {
            self.vel.x = self.dash_dir * DASH_SPEED * slow;
        } else if self.timers.impulse_active.is_running() {
            // Impulse owns horizontal motion for its window
        } else {
            self.vel.x = input.horizontal_axis().map_or(0.0, |dir| dir * speed);
        }
    }

    fn apply_vertical(
        &mut self,
        input: &TickInput,
        prev: &TickInput,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) {
        let slow = self.slow_factor();

        if !self.on_ground {
            if self.form == Form::Mage {
                let hovering = self.levitating
                    && input.is_action_pressed(Action::HeroJump)
                    && self.timers.levitate.is_running();
                if hovering {
                    // Levitation holds the fall, it never lifts
                    self.vel.y = self.vel.y.max(0.0);
                    self.timers.levitate.tick(dt);
                } else {
                    self.vel.y += CASTER_GRAVITY * slow;
                }
            } else {
                self.vel.y += GRAVITY * slow;
            }
        }

        let jump_held = input.jump_held();
        let jump_edge = jump_held && !prev.jump_held();

        if jump_held && self.on_ground {
            self.vel.y = self.form.jump_velocity() * slow;
            self.on_ground = false;
            match self.form {
                Form::Ninja => self.can_double_jump = true,
                Form::Mage => {
                    self.levitating = true;
                    self.timers.levitate.start(LEVITATE_MAX);
                }
                _ => {}
            }
        } else if self.form == Form::Ninja && jump_edge && self.can_double_jump && !self.on_ground {
            self.vel.y = AGILE_DOUBLE_JUMP_VELOCITY * slow;
            self.can_double_jump = false;
            events.push(GameEvent::Effect {
                kind: EffectKind::DoubleJump,
                pos: self.center(),
            });
        }
    }

    /// The vine snaps once the druid walks away from where it was cast
    fn check_vine_drift(&mut self) {
        if self.timers.vine_grace.is_running() {
            return;
        }
        if let Some(vine) = self.vine {
            let drift = (self.pos - vine.origin).abs();
            if drift.x > VINE_DRIFT_X || drift.y > VINE_DRIFT_Y {
                self.vine = None;
            }
        }
    }

    fn spawn_platform(&mut self, events: &mut Vec<GameEvent>) {
        let rect = Rect::new(
            self.pos.x,
            self.foot() + MAGIC_PLATFORM_GAP,
            MAGIC_PLATFORM_WIDTH,
            MAGIC_PLATFORM_HEIGHT,
        );
        let mut lifetime = AbilityTimer::new(TimerClass::ActiveWindow);
        lifetime.start(MAGIC_PLATFORM_LIFETIME);
        self.platforms.push(MagicPlatform { rect, lifetime });
        self.timers.platform_cooldown.start(MAGIC_PLATFORM_COOLDOWN);
        events.push(GameEvent::Effect {
            kind: EffectKind::PlatformConjured,
            pos: rect.center(),
        });
    }

    /// Keep the vine alive for a short while after it pulled something
    pub fn grant_vine_grace(&mut self) {
        self.timers.vine_grace.start(VINE_LEVER_GRACE);
    }
}
