//! Rail cart encounter
//!
//! A scripted minigame attached to a level's vehicle:
//! exploration → cinematic (zoom in → ready → countdown) → ride → complete.
//! Crashing into a pit starts a death sequence that ends back at the
//! zoom-in with the cart at its start position.

use std::f32::consts::PI;

use glam::Vec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::character::Form;
use super::pursuit::{PursuitContext, PursuitRoster};
use super::state::{EffectKind, GameEvent};
use super::tick::{Action, TickInput};
use crate::Rect;
use crate::consts::*;

/// Scripted lead-in before the ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CinematicPhase {
    ZoomIn,
    Ready,
    Countdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterPhase {
    /// Free platforming around the parked cart
    Exploration,
    Cinematic(CinematicPhase),
    Ride,
    /// Terminal: handed over to the closing cutscene
    Complete,
}

/// Obstacle type with its per-type data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObstacleKind {
    /// Overhead beam: jump at least `height` to pass
    LowBeam { height: f32 },
    /// Smash it with the heavy form, or crash
    BreakableRock {
        #[serde(default)]
        broken: bool,
    },
    /// Stalagmite: jump over it
    FloorSpike,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f32,
    pub kind: ObstacleKind,
}

impl Obstacle {
    pub const fn new(x: f32, kind: ObstacleKind) -> Self {
        Self { x, kind }
    }

    /// Elevation needed to pass, for obstacles that are jumped
    pub fn required_clearance(&self) -> Option<f32> {
        match self.kind {
            ObstacleKind::LowBeam { height } => Some(height),
            ObstacleKind::FloorSpike => Some(SPIKE_CLEARANCE),
            ObstacleKind::BreakableRock { .. } => None,
        }
    }
}

const SPIKE_CLEARANCE: f32 = 80.0;
const BEAM_REACH: f32 = 80.0;
const ROCK_BREAK_REACH: f32 = 80.0;
const CRASH_REACH: f32 = 40.0;
const RAMP_LEVER_NEAR: f32 = 120.0;
const RAMP_LEVER_FAR: f32 = 20.0;
const FLIGHT_TRIGGER_BEFORE: f32 = 5.0;
const FLIGHT_TRIGGER_AFTER: f32 = 30.0;

/// Authored ramp over a pit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampPlacement {
    pub x: f32,
    pub ramp_width: f32,
    pub ramp_height: f32,
    pub pit_width: f32,
}

/// Ramp with its per-attempt flags
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub placement: RampPlacement,
    pub activated: bool,
    pub flight_started: bool,
}

impl Ramp {
    pub fn new(placement: RampPlacement) -> Self {
        Self {
            placement,
            activated: false,
            flight_started: false,
        }
    }

    /// The x range where the ramp lever can be thrown
    pub fn lever_window(&self) -> (f32, f32) {
        (self.placement.x - RAMP_LEVER_NEAR, self.placement.x - RAMP_LEVER_FAR)
    }

    pub fn ramp_end(&self) -> f32 {
        self.placement.x + self.placement.ramp_width
    }

    pub fn pit_start(&self) -> f32 {
        self.ramp_end()
    }

    pub fn pit_end(&self) -> f32 {
        self.pit_start() + self.placement.pit_width
    }

    /// Where pursuers must not spawn
    pub fn danger_zone(&self) -> (f32, f32) {
        (self.placement.x - 450.0, self.pit_end() + 50.0)
    }
}

/// Everything a level needs to host the encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterLayout {
    pub cart_start: Vec2,
    /// Reaching this x completes the encounter
    pub finish_x: f32,
    pub ramps: Vec<RampPlacement>,
    pub obstacles: Vec<Obstacle>,
}

/// Ballistic hop across a pit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub start_x: f32,
    pub end_x: f32,
    /// Seconds flown
    pub progress: f32,
    pub duration: f32,
    pub peak: f32,
}

impl Flight {
    pub fn t(&self) -> f32 {
        (self.progress / self.duration).min(1.0)
    }

    /// Half-sine arc
    pub fn height(&self) -> f32 {
        (PI * self.t()).sin() * self.peak
    }

    pub fn x(&self) -> f32 {
        crate::lerp(self.start_x, self.end_x, self.t())
    }
}

/// The rail cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Top-left of the cart body on the rails
    pub pos: Vec2,
    pub speed: f32,
    pub speed_multiplier: f32,
    /// Height of a rider jump, zero while a flight is active
    pub jump_height: f32,
    /// Still ascending
    pub jumping: bool,
    pub flight: Option<Flight>,
}

impl Vehicle {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            speed: 0.0,
            speed_multiplier: 1.0,
            jump_height: 0.0,
            jumping: false,
            flight: None,
        }
    }

    /// Height above the rails, from a jump or a flight
    pub fn elevation(&self) -> f32 {
        self.flight.map_or(self.jump_height, |f| f.height())
    }

    fn drive(&mut self, dt: f32) {
        if let Some(flight) = &mut self.flight {
            flight.progress += dt;
            self.pos.x = flight.x();
            if flight.t() >= 1.0 {
                self.flight = None;
            }
            return;
        }
        let target = CART_BASE_SPEED * self.speed_multiplier;
        self.speed += (target - self.speed) * CART_SPEED_EASING;
        self.pos.x += self.speed;
        self.speed_multiplier = (self.speed_multiplier + CART_MULTIPLIER_STEP).min(CART_MULTIPLIER_MAX);
    }

    /// Rider jump: fixed ascent, a hold bonus past the guaranteed height,
    /// then a slow fall. Height stays within `[0, CART_JUMP_MAX_HEIGHT]`.
    fn update_jump(&mut self, held: bool) {
        if self.jumping {
            let mut increment = CART_JUMP_ASCENT_RATE;
            if held && self.jump_height >= CART_JUMP_MIN_HOLD_HEIGHT {
                increment += CART_JUMP_HOLD_BONUS * (1.0 - self.jump_height / CART_JUMP_MAX_HEIGHT);
            }
            self.jump_height += increment;
            if self.jump_height >= CART_JUMP_MAX_HEIGHT {
                self.jump_height = CART_JUMP_MAX_HEIGHT;
                self.jumping = false;
            }
            if !held && self.jump_height >= CART_JUMP_MIN_HOLD_HEIGHT {
                self.jumping = false;
            }
        } else if self.jump_height > 0.0 {
            self.jump_height = (self.jump_height - CART_JUMP_DESCENT_RATE).max(0.0);
        }

        if held && !self.jumping && self.jump_height == 0.0 && self.flight.is_none() {
            self.jumping = true;
        }
    }
}

/// One beam or spike the analyzer looked at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClearanceRequirement {
    pub x: f32,
    pub required: f32,
}

/// Whether every jumpable obstacle can be cleared by a maximum jump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityReport {
    pub max_jump: f32,
    pub required_max: f32,
    pub requirements: Vec<ClearanceRequirement>,
    pub viable: bool,
    /// Obstacles were lowered to make the ride passable
    pub adjusted: bool,
}

pub fn analyze_feasibility(obstacles: &[Obstacle]) -> FeasibilityReport {
    let requirements: Vec<ClearanceRequirement> = obstacles
        .iter()
        .filter_map(|o| {
            o.required_clearance()
                .map(|required| ClearanceRequirement { x: o.x, required })
        })
        .collect();
    let required_max = requirements.iter().map(|r| r.required).fold(0.0, f32::max);

    FeasibilityReport {
        max_jump: CART_JUMP_MAX_HEIGHT,
        required_max,
        requirements,
        viable: required_max <= CART_JUMP_MAX_HEIGHT,
        adjusted: false,
    }
}

/// Lower any beam that cannot be cleared to just under the jump ceiling
pub fn adjust_for_feasibility(obstacles: &mut [Obstacle], report: FeasibilityReport) -> FeasibilityReport {
    if report.viable {
        return report;
    }
    let mut lowered = 0;
    for o in obstacles.iter_mut() {
        if let ObstacleKind::LowBeam { height } = &mut o.kind {
            if *height > CART_JUMP_MAX_HEIGHT {
                *height = CART_JUMP_MAX_HEIGHT - FEASIBILITY_MARGIN;
                lowered += 1;
            }
        }
    }
    if lowered == 0 {
        log::warn!("Ride is not passable and nothing could be lowered");
        return report;
    }
    log::info!("Lowered {} beam(s) to keep the ride passable", lowered);
    FeasibilityReport {
        adjusted: true,
        ..analyze_feasibility(obstacles)
    }
}

/// What the session has to do after an encounter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterOutcome {
    Continue,
    /// The ride just started
    RideStarted,
    /// Fell into a pit; the death sequence is running
    Crashed,
    /// Hit an obstacle or a fairy: the whole level restarts
    Lethal,
    Complete,
}

/// Encounter state owned by the level session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterSession {
    pub layout: EncounterLayout,
    pub level_width: f32,
    pub phase: EncounterPhase,
    /// Seconds in the current cinematic phase
    pub phase_timer: f32,
    pub countdown: f32,
    pub vehicle: Vehicle,
    pub ramps: Vec<Ramp>,
    pub obstacles: Vec<Obstacle>,
    pub feasibility: Option<FeasibilityReport>,
    /// Remaining death sequence, zero when alive
    pub death_timer: f32,
    pub pursuit: PursuitRoster,
    /// Roster as first rolled; every attempt starts from it
    pub opening_roster: PursuitRoster,
    /// Seconds since the ride began
    pub ride_clock: f32,
    pub camera_x: f32,
}

impl EncounterSession {
    pub fn new(layout: EncounterLayout, level_width: f32, rng: &mut Pcg32) -> Self {
        let vehicle = Vehicle::new(layout.cart_start);
        let ramps = layout.ramps.iter().copied().map(Ramp::new).collect();
        let obstacles = layout.obstacles.clone();
        let pursuit = PursuitRoster::new(layout.cart_start.x, rng);
        Self {
            layout,
            level_width,
            phase: EncounterPhase::Exploration,
            phase_timer: 0.0,
            countdown: 0.0,
            vehicle,
            ramps,
            obstacles,
            feasibility: None,
            death_timer: 0.0,
            opening_roster: pursuit.clone(),
            pursuit,
            ride_clock: 0.0,
            camera_x: 0.0,
        }
    }

    pub fn is_riding(&self) -> bool {
        matches!(self.phase, EncounterPhase::Cinematic(_) | EncounterPhase::Ride)
    }

    pub fn is_dying(&self) -> bool {
        self.death_timer > 0.0
    }

    /// Ride progress in percent
    pub fn progress(&self) -> f32 {
        let start = self.layout.cart_start.x;
        let span = (self.layout.finish_x - start).max(1.0);
        ((self.vehicle.pos.x - start) / span * 100.0).clamp(0.0, 100.0)
    }

    /// The rider's body, lifted by the cart's elevation
    pub fn rider_rect(&self) -> Rect {
        let v = &self.vehicle;
        let bottom = v.pos.y + 10.0 - v.elevation();
        Rect::new(
            v.pos.x + CART_WIDTH / 2.0 - PLAYER_WIDTH / 2.0,
            bottom - PLAYER_HEIGHT,
            PLAYER_WIDTH,
            PLAYER_HEIGHT,
        )
    }

    fn danger_zones(&self) -> Vec<(f32, f32)> {
        self.ramps.iter().map(Ramp::danger_zone).collect()
    }

    fn follow_camera(&mut self, divisor: f32) {
        let max = (self.level_width - VIEW_WIDTH).max(0.0);
        self.camera_x = (self.vehicle.pos.x - VIEW_WIDTH / divisor).clamp(0.0, max);
    }

    /// Put every per-attempt piece back to the authored layout and run the
    /// feasibility pass
    fn rebuild(&mut self) {
        self.vehicle = Vehicle::new(self.layout.cart_start);
        self.ramps = self.layout.ramps.iter().copied().map(Ramp::new).collect();
        self.obstacles = self.layout.obstacles.clone();
        self.pursuit = self.opening_roster.clone();
        let report = analyze_feasibility(&self.obstacles);
        self.feasibility = Some(adjust_for_feasibility(&mut self.obstacles, report));
        self.death_timer = 0.0;
        self.ride_clock = 0.0;
        self.phase = EncounterPhase::Cinematic(CinematicPhase::ZoomIn);
        self.phase_timer = 0.0;
        self.countdown = 0.0;
        self.follow_camera(3.0);
    }

    /// Leave exploration: the rider boarded the cart
    pub fn board(&mut self, events: &mut Vec<GameEvent>) {
        if self.phase != EncounterPhase::Exploration {
            log::debug!("Board ignored in {:?}", self.phase);
            return;
        }
        self.rebuild();
        log::info!("Encounter started, feasibility {:?}", self.feasibility);
        events.push(GameEvent::EncounterStarted);
        events.push(GameEvent::Effect {
            kind: EffectKind::CartSpark,
            pos: self.vehicle.pos,
        });
    }

    /// Back to the zoom-in after a crash
    pub fn restart(&mut self) {
        self.rebuild();
        log::info!("Encounter restarted at x={}", self.vehicle.pos.x);
    }

    /// Advance the cinematic or the ride by one step
    pub fn update(
        &mut self,
        input: &TickInput,
        form: Form,
        rng: &mut Pcg32,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> EncounterOutcome {
        match self.phase {
            EncounterPhase::Exploration | EncounterPhase::Complete => EncounterOutcome::Continue,
            EncounterPhase::Cinematic(phase) => self.update_cinematic(phase, rng, dt, events),
            EncounterPhase::Ride => self.update_ride(input, form, rng, dt, events),
        }
    }

    fn update_cinematic(
        &mut self,
        phase: CinematicPhase,
        rng: &mut Pcg32,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> EncounterOutcome {
        self.phase_timer += dt;
        self.follow_camera(3.0);
        match phase {
            CinematicPhase::ZoomIn => {
                if self.phase_timer > ZOOM_IN_DURATION {
                    self.phase = EncounterPhase::Cinematic(CinematicPhase::Ready);
                    self.phase_timer = 0.0;
                }
            }
            CinematicPhase::Ready => {
                if self.phase_timer > READY_DURATION {
                    self.phase = EncounterPhase::Cinematic(CinematicPhase::Countdown);
                    self.phase_timer = 0.0;
                    self.countdown = COUNTDOWN_DURATION;
                }
            }
            CinematicPhase::Countdown => {
                self.countdown -= dt;
                if self.countdown <= 0.0 {
                    self.countdown = 0.0;
                    self.phase = EncounterPhase::Ride;
                    self.phase_timer = 0.0;
                    self.vehicle.speed = CART_LAUNCH_SPEED;
                    self.vehicle.speed_multiplier = 1.0;
                    let zones = self.danger_zones();
                    let ctx = self.pursuit_context(&zones);
                    self.pursuit.release_opening(&ctx, rng, events);
                    log::info!("Ride started");
                    events.push(GameEvent::RideStarted);
                    return EncounterOutcome::RideStarted;
                }
            }
        }
        EncounterOutcome::Continue
    }

    fn pursuit_context<'a>(&self, zones: &'a [(f32, f32)]) -> PursuitContext<'a> {
        PursuitContext {
            camera_x: self.camera_x,
            cart_pos: self.vehicle.pos,
            rider: self.rider_rect(),
            elevation: self.vehicle.elevation(),
            speed_multiplier: self.vehicle.speed_multiplier,
            clock: self.ride_clock,
            danger_zones: zones,
        }
    }

    fn update_ride(
        &mut self,
        input: &TickInput,
        form: Form,
        rng: &mut Pcg32,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> EncounterOutcome {
        if self.is_dying() {
            self.death_timer = (self.death_timer - dt).max(0.0);
            self.vehicle.speed = 0.0;
            return EncounterOutcome::Continue;
        }

        self.ride_clock += dt;
        let interact = input.is_action_pressed(Action::AbilityPrimary);
        self.vehicle.drive(dt);

        for ramp in &mut self.ramps {
            let (from, to) = ramp.lever_window();
            let x = self.vehicle.pos.x;
            if !ramp.activated && interact && x > from && x < to {
                ramp.activated = true;
                log::debug!("Ramp at {} raised", ramp.placement.x);
                events.push(GameEvent::Effect {
                    kind: EffectKind::RampRaised,
                    pos: Vec2::new(ramp.placement.x - 80.0, self.vehicle.pos.y),
                });
            }
        }

        if self.vehicle.flight.is_none() {
            let x = self.vehicle.pos.x;
            if let Some(ramp) = self.ramps.iter_mut().find(|r| {
                r.activated
                    && !r.flight_started
                    && x >= r.ramp_end() - FLIGHT_TRIGGER_BEFORE
                    && x < r.ramp_end() + FLIGHT_TRIGGER_AFTER
            }) {
                ramp.flight_started = true;
                self.vehicle.flight = Some(Flight {
                    start_x: ramp.ramp_end(),
                    end_x: ramp.pit_end() + FLIGHT_LANDING_OVERSHOOT,
                    progress: 0.0,
                    duration: FLIGHT_DURATION,
                    peak: ramp.placement.ramp_height * FLIGHT_PEAK_SCALE,
                });
                self.vehicle.jump_height = 0.0;
                self.vehicle.jumping = false;
                events.push(GameEvent::Effect {
                    kind: EffectKind::CartSpark,
                    pos: self.vehicle.pos,
                });
            }
        }

        if self.vehicle.flight.is_none() {
            let x = self.vehicle.pos.x;
            let in_pit = self
                .ramps
                .iter()
                .any(|r| x > r.pit_start() && x < r.pit_end() && !r.flight_started);
            if in_pit {
                self.death_timer = CART_DEATH_DURATION;
                self.vehicle.speed = 0.0;
                log::info!("Cart fell into a pit at x={}", x);
                events.push(GameEvent::Effect {
                    kind: EffectKind::CartCrash,
                    pos: self.vehicle.pos + Vec2::new(0.0, 60.0),
                });
                return EncounterOutcome::Crashed;
            }
        }

        self.vehicle.update_jump(input.jump_held());

        if self.vehicle.flight.is_none() && self.check_obstacles(form, interact, events) {
            return EncounterOutcome::Lethal;
        }

        self.follow_camera(2.0);

        let zones = self.danger_zones();
        let ctx = self.pursuit_context(&zones);
        if let Some(hit) = self.pursuit.update(&ctx, rng, dt, events) {
            log::info!("Ride ended by {:?}", hit);
            return EncounterOutcome::Lethal;
        }

        if self.vehicle.pos.x >= self.layout.finish_x {
            self.phase = EncounterPhase::Complete;
            log::info!("Encounter complete");
            events.push(GameEvent::EncounterComplete);
            return EncounterOutcome::Complete;
        }

        EncounterOutcome::Continue
    }

    /// Returns true on a lethal hit
    fn check_obstacles(&mut self, form: Form, interact: bool, events: &mut Vec<GameEvent>) -> bool {
        let x = self.vehicle.pos.x;
        let elevation = self.vehicle.elevation();
        for obstacle in &mut self.obstacles {
            let distance = (x - obstacle.x).abs();
            match &mut obstacle.kind {
                ObstacleKind::LowBeam { height } => {
                    if distance < BEAM_REACH && elevation < *height {
                        log::info!("Cart hit a beam at {}", obstacle.x);
                        return true;
                    }
                }
                ObstacleKind::BreakableRock { broken } => {
                    if *broken || distance >= ROCK_BREAK_REACH {
                        continue;
                    }
                    if form == Form::Destroyer && interact {
                        *broken = true;
                        events.push(GameEvent::Effect {
                            kind: EffectKind::Debris,
                            pos: Vec2::new(obstacle.x, self.vehicle.pos.y),
                        });
                    } else if distance < CRASH_REACH {
                        log::info!("Cart hit a rock at {}", obstacle.x);
                        return true;
                    }
                }
                ObstacleKind::FloorSpike => {
                    if distance < CRASH_REACH && elevation < SPIKE_CLEARANCE {
                        log::info!("Cart hit a spike at {}", obstacle.x);
                        return true;
                    }
                }
            }
        }
        false
    }
}
