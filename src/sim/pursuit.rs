//! Fairy pursuit during the rail ride, plus the cave's ambient wanderers
//!
//! Pursuers run a one-way phase machine:
//! idle → moving toward target → waiting → descending → blocking →
//! withdrawing → inactive. Every release goes through
//! [`PursuitRoster::release_next`], which keeps at most
//! `MAX_ENGAGED_PURSUERS` on screen.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::state::{EffectKind, GameEvent};
use crate::Rect;
use crate::consts::*;

/// Phase of a pursuing fairy, in the only order it can advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PursuerPhase {
    Idle,
    MovingTowardTarget,
    Waiting,
    Descending,
    Blocking,
    Withdrawing,
    Inactive,
}

impl PursuerPhase {
    /// On screen and still a threat to the ride
    pub fn is_engaged(self) -> bool {
        matches!(
            self,
            PursuerPhase::MovingTowardTarget
                | PursuerPhase::Waiting
                | PursuerPhase::Descending
                | PursuerPhase::Blocking
        )
    }
}

/// A fairy that flies ahead of the cart and blocks the rails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pursuer {
    /// Centre
    pub pos: Vec2,
    pub vel: Vec2,
    pub phase: PursuerPhase,
    pub phase_timer: f32,
    /// Side of the square hit-box
    pub hitbox: f32,
    pub target_y: f32,
}

impl Pursuer {
    pub fn idle() -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            phase: PursuerPhase::Idle,
            phase_timer: 0.0,
            hitbox: 0.0,
            target_y: VIEW_HEIGHT - 160.0,
        }
    }

    fn launch(pos: Vec2, vx: f32, hitbox: f32) -> Self {
        Self {
            pos,
            vel: Vec2::new(vx, 0.0),
            phase: PursuerPhase::MovingTowardTarget,
            phase_timer: 0.0,
            hitbox,
            target_y: VIEW_HEIGHT - 160.0,
        }
    }

    pub fn hit_rect(&self) -> Rect {
        Rect::centered(self.pos, self.hitbox, self.hitbox)
    }

    fn enter(&mut self, phase: PursuerPhase) {
        log::debug!("Pursuer {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.phase_timer = 0.0;
    }
}

/// Member of the trailing swarm; each one may later be released as a pursuer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmFairy {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Seconds until this fairy tries to attack
    pub activation_timer: f32,
    pub released: bool,
}

/// Which pursuer to bring on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Release {
    /// One of the reserved roster slots, at a given spawn point and speed
    Reserved {
        slot: usize,
        pos: Vec2,
        vx: f32,
        hitbox: f32,
    },
    /// A swarm fairy peeling off toward the front
    Swarm(usize),
}

/// Per-step view of the ride that the pursuers react to
#[derive(Debug, Clone, Copy)]
pub struct PursuitContext<'a> {
    pub camera_x: f32,
    pub cart_pos: Vec2,
    /// Rider hit-box, already lifted by the cart's elevation
    pub rider: Rect,
    pub elevation: f32,
    pub speed_multiplier: f32,
    /// Seconds since the ride began (drives the idle wobble)
    pub clock: f32,
    /// World x ranges where a pursuer must not appear
    pub danger_zones: &'a [(f32, f32)],
}

/// What ended the ride, if anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PursuitHit {
    Pursuer(usize),
    Swarm(usize),
}

/// All fairies of one encounter attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PursuitRoster {
    /// The first two entries are the reserved slots
    pub pursuers: Vec<Pursuer>,
    pub swarm: Vec<SwarmFairy>,
}

const RESERVED_SLOTS: usize = 2;

/// Move a spawn point out of any danger zone, `backoff` px before it
pub fn safe_spawn_x(x: f32, zones: &[(f32, f32)], backoff: f32) -> f32 {
    zones
        .iter()
        .find(|(start, end)| x >= *start && x <= *end)
        .map_or(x, |(start, _)| start - backoff)
}

impl PursuitRoster {
    pub fn new(cart_x: f32, rng: &mut Pcg32) -> Self {
        let swarm = (0..SWARM_SIZE)
            .map(|_| SwarmFairy {
                pos: Vec2::new(
                    cart_x - 400.0 - rng.random::<f32>() * 250.0,
                    60.0 + rng.random::<f32>() * 140.0,
                ),
                vel: Vec2::new(
                    2.0 + rng.random::<f32>() * 1.5,
                    (rng.random::<f32>() - 0.5) * 1.5,
                ),
                activation_timer: 3.0 + rng.random::<f32>() * 5.0,
                released: false,
            })
            .collect();

        Self {
            pursuers: vec![Pursuer::idle(); RESERVED_SLOTS],
            swarm,
        }
    }

    pub fn engaged(&self) -> usize {
        self.pursuers.iter().filter(|p| p.phase.is_engaged()).count()
    }

    /// Bring the requested pursuer on screen if the roster allows it.
    ///
    /// A reserved slot needs every engaged pursuer to have reached
    /// `Descending` and room under the cap. A swarm fairy needs the screen
    /// to be clear. Returns whether the release happened.
    pub fn release_next(&mut self, release: Release, events: &mut Vec<GameEvent>) -> bool {
        let engaged = self.engaged();
        match release {
            Release::Reserved {
                slot,
                pos,
                vx,
                hitbox,
            } => {
                let Some(target) = self.pursuers.get(slot) else {
                    return false;
                };
                let settled = self
                    .pursuers
                    .iter()
                    .filter(|p| p.phase.is_engaged())
                    .all(|p| p.phase >= PursuerPhase::Descending);
                if target.phase != PursuerPhase::Idle || !settled || engaged >= MAX_ENGAGED_PURSUERS {
                    log::debug!("Reserved pursuer {} held back ({} engaged)", slot, engaged);
                    return false;
                }
                self.pursuers[slot] = Pursuer::launch(pos, vx, hitbox);
                events.push(GameEvent::Effect {
                    kind: EffectKind::FairyRelease,
                    pos,
                });
                true
            }
            Release::Swarm(index) => {
                if engaged > 0 {
                    return false;
                }
                let Some(fairy) = self.swarm.get_mut(index) else {
                    return false;
                };
                if fairy.released {
                    return false;
                }
                fairy.released = true;
                let pos = fairy.pos;
                self.pursuers.push(Pursuer::launch(pos, 10.0, 20.0));
                events.push(GameEvent::Effect {
                    kind: EffectKind::FairyRelease,
                    pos,
                });
                true
            }
        }
    }

    /// Release the first reserved pursuer when the ride starts
    pub fn release_opening(&mut self, ctx: &PursuitContext, rng: &mut Pcg32, events: &mut Vec<GameEvent>) {
        let x = safe_spawn_x(ctx.cart_pos.x - 300.0, ctx.danger_zones, 100.0);
        let y = 80.0 + rng.random::<f32>() * 40.0;
        self.release_next(
            Release::Reserved {
                slot: 0,
                pos: Vec2::new(x, y),
                vx: 8.0,
                hitbox: 20.0,
            },
            events,
        );
    }

    /// Advance every fairy by one step. Returns the first lethal contact.
    pub fn update(
        &mut self,
        ctx: &PursuitContext,
        rng: &mut Pcg32,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> Option<PursuitHit> {
        if let Some(hit) = self.update_swarm(ctx, rng, dt, events) {
            return Some(hit);
        }

        let mut relay = false;
        let right_edge = ctx.camera_x + VIEW_WIDTH;
        for (i, p) in self.pursuers.iter_mut().enumerate() {
            if !p.phase.is_engaged() && p.phase != PursuerPhase::Withdrawing {
                continue;
            }
            p.phase_timer += dt;
            let wobble = ctx.clock + i as f32;
            match p.phase {
                PursuerPhase::MovingTowardTarget => {
                    p.pos.x += p.vel.x;
                    p.pos.y += (wobble * 3.3).sin() * 0.8;
                    if p.pos.x - ctx.camera_x > VIEW_WIDTH - 100.0 {
                        p.target_y = VIEW_HEIGHT - 160.0;
                        p.enter(PursuerPhase::Waiting);
                    }
                }
                PursuerPhase::Waiting => {
                    p.pos.y += (wobble * 5.0).sin() * 0.6;
                    p.pos.x = right_edge - 80.0;
                    if p.phase_timer >= PURSUER_WAIT {
                        p.vel.x = 0.0;
                        p.enter(PursuerPhase::Descending);
                        relay = true;
                    }
                }
                PursuerPhase::Descending => {
                    let dy = p.target_y - p.pos.y;
                    p.pos.y += (dy * 0.12).clamp(0.4, 4.5);
                    p.pos.x = right_edge - 80.0 + (wobble * 4.0).sin() * 6.0;
                    if dy.abs() < 6.0 {
                        p.pos.y = p.target_y;
                        p.enter(PursuerPhase::Blocking);
                    }
                }
                PursuerPhase::Blocking => {
                    p.pos.y += (wobble * 3.3).sin() * 0.6;
                    if ctx.elevation < PURSUER_CLEARANCE && ctx.rider.overlaps(&p.hit_rect()) {
                        log::info!("Rider hit by pursuer {}", i);
                        return Some(PursuitHit::Pursuer(i));
                    }
                    if p.phase_timer > PURSUER_BLOCK {
                        p.vel = Vec2::new(-3.0, -2.0);
                        p.enter(PursuerPhase::Withdrawing);
                    }
                }
                PursuerPhase::Withdrawing => {
                    p.pos += p.vel;
                    if p.pos.x < ctx.camera_x - 100.0 || p.pos.y < -100.0 {
                        p.enter(PursuerPhase::Inactive);
                    }
                }
                PursuerPhase::Idle | PursuerPhase::Inactive => {}
            }
        }

        if relay && self.pursuers.get(1).is_some_and(|p| p.phase == PursuerPhase::Idle) {
            let x = safe_spawn_x(ctx.cart_pos.x - 600.0, ctx.danger_zones, 200.0);
            let y = 70.0 + rng.random::<f32>() * 60.0;
            self.release_next(
                Release::Reserved {
                    slot: 1,
                    pos: Vec2::new(x, y),
                    vx: 14.0,
                    hitbox: 18.0,
                },
                events,
            );
        }

        None
    }

    fn update_swarm(
        &mut self,
        ctx: &PursuitContext,
        rng: &mut Pcg32,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> Option<PursuitHit> {
        let boost = 1.0 + ctx.speed_multiplier * 0.5;
        for i in 0..self.swarm.len() {
            let fairy = &mut self.swarm[i];
            let target = Vec2::new(
                ctx.cart_pos.x - 200.0 - (i % 5) as f32 * 40.0,
                100.0 + (ctx.clock * 5.0 + i as f32).sin() * 50.0,
            );
            fairy.vel.x += (target.x - fairy.pos.x) * 0.005;
            fairy.vel.y += (target.y - fairy.pos.y) * 0.003;
            fairy.vel.x = fairy.vel.x.clamp(-6.0 * boost, 6.0 * boost);
            fairy.vel.y = fairy.vel.y.clamp(-4.0 * boost, 4.0 * boost);
            fairy.pos += fairy.vel;

            if !fairy.released && fairy.activation_timer > 0.0 {
                fairy.activation_timer -= dt;
                if fairy.activation_timer <= 0.0
                    && !self.release_next(Release::Swarm(i), events)
                {
                    self.swarm[i].activation_timer = rng.random_range(2.0..5.0);
                }
            }

            if self.swarm[i].pos.distance(ctx.cart_pos) < 30.0 {
                log::info!("Cart caught by swarm fairy {}", i);
                return Some(PursuitHit::Swarm(i));
            }
        }
        None
    }
}

/// Ambient cave fairy woken by the crystal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wanderer {
    /// Centre
    pub pos: Vec2,
    pub vel: Vec2,
    pub chasing: bool,
}

impl Wanderer {
    const HITBOX: f32 = 25.0;
    const CHASE_RADIUS: f32 = 300.0;
    const CHASE_ACCEL: f32 = 0.002;
    const MAX_SPEED: f32 = 3.0;

    pub fn spawn_all(rng: &mut Pcg32) -> Vec<Wanderer> {
        (0..WANDERER_COUNT)
            .map(|i| Wanderer {
                pos: Vec2::new(
                    300.0 + i as f32 * 250.0 + rng.random::<f32>() * 100.0,
                    50.0 + rng.random::<f32>() * 100.0,
                ),
                vel: Vec2::new(
                    (rng.random::<f32>() - 0.5) * 2.0,
                    (rng.random::<f32>() - 0.5) * 2.0,
                ),
                chasing: false,
            })
            .collect()
    }

    pub fn hit_rect(&self) -> Rect {
        Rect::centered(self.pos, Self::HITBOX, Self::HITBOX)
    }

    /// Drift, bounce and chase `target` (the character's top-left).
    /// Returns true on contact with `body`.
    pub fn update(&mut self, target: Vec2, body: &Rect, level_width: f32) -> bool {
        self.pos += self.vel;
        if self.pos.x < 0.0 || self.pos.x > level_width {
            self.vel.x = -self.vel.x;
        }
        if self.pos.y < 20.0 || self.pos.y > 200.0 {
            self.vel.y = -self.vel.y;
        }

        let delta = target - self.pos;
        if delta.length() < Self::CHASE_RADIUS {
            self.chasing = true;
            self.vel += delta * Self::CHASE_ACCEL;
            self.vel = self.vel.clamp(Vec2::splat(-Self::MAX_SPEED), Vec2::splat(Self::MAX_SPEED));
        }

        body.overlaps(&self.hit_rect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn ctx<'a>(camera_x: f32, cart_x: f32, zones: &'a [(f32, f32)]) -> PursuitContext<'a> {
        let cart_pos = Vec2::new(cart_x, 600.0);
        PursuitContext {
            camera_x,
            cart_pos,
            rider: Rect::new(cart_x + 6.0, 546.0, PLAYER_WIDTH, PLAYER_HEIGHT),
            elevation: 0.0,
            speed_multiplier: 1.0,
            clock: 0.0,
            danger_zones: zones,
        }
    }

    fn quiet_roster(rng: &mut Pcg32) -> PursuitRoster {
        let mut roster = PursuitRoster::new(1200.0, rng);
        roster.swarm.clear();
        roster
    }

    #[test]
    fn test_safe_spawn_moves_out_of_zone() {
        let zones = [(2800.0, 3620.0)];
        assert_eq!(safe_spawn_x(3000.0, &zones, 100.0), 2700.0);
        assert_eq!(safe_spawn_x(2000.0, &zones, 100.0), 2000.0);
    }

    #[test]
    fn test_reserved_release_waits_for_descent() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut roster = quiet_roster(&mut rng);
        let mut events = Vec::new();
        let slot = |slot| Release::Reserved {
            slot,
            pos: Vec2::new(900.0, 100.0),
            vx: 8.0,
            hitbox: 20.0,
        };

        assert!(roster.release_next(slot(0), &mut events));
        assert!(!roster.release_next(slot(1), &mut events));
        roster.pursuers[0].phase = PursuerPhase::Descending;
        assert!(roster.release_next(slot(1), &mut events));
        assert_eq!(roster.engaged(), 2);
    }

    #[test]
    fn test_swarm_release_needs_clear_screen() {
        let mut rng = Pcg32::seed_from_u64(2);
        let mut roster = PursuitRoster::new(1200.0, &mut rng);
        let mut events = Vec::new();
        roster.pursuers[0].phase = PursuerPhase::Blocking;
        assert!(!roster.release_next(Release::Swarm(0), &mut events));
        roster.pursuers[0].phase = PursuerPhase::Inactive;
        assert!(roster.release_next(Release::Swarm(0), &mut events));
        assert!(roster.swarm[0].released);
        assert!(!roster.release_next(Release::Swarm(0), &mut events));
    }

    #[test]
    fn test_blocked_swarm_release_is_rescheduled() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut roster = PursuitRoster::new(1200.0, &mut rng);
        roster.pursuers[0].phase = PursuerPhase::MovingTowardTarget;
        roster.pursuers[0].pos = Vec2::new(1300.0, 100.0);
        roster.swarm.truncate(1);
        roster.swarm[0].activation_timer = SIM_DT / 2.0;
        let mut events = Vec::new();
        roster.update(&ctx(0.0, 5000.0, &[]), &mut rng, SIM_DT, &mut events);
        let t = roster.swarm[0].activation_timer;
        assert!((2.0..5.0).contains(&t), "rescheduled to {}", t);
        assert!(!roster.swarm[0].released);
    }

    #[test]
    fn test_pursuer_runs_full_phase_cycle() {
        let mut rng = Pcg32::seed_from_u64(4);
        let mut roster = quiet_roster(&mut rng);
        let mut events = Vec::new();
        // Rider far behind so blocking is harmless
        let c = ctx(0.0, -2000.0, &[]);
        roster.release_opening(&c, &mut rng, &mut events);
        assert_eq!(roster.pursuers[0].phase, PursuerPhase::MovingTowardTarget);

        let mut last = roster.pursuers[0].phase;
        let mut saw_blocking = false;
        for _ in 0..2000 {
            assert_eq!(roster.update(&c, &mut rng, SIM_DT, &mut events), None);
            let phase = roster.pursuers[0].phase;
            assert!(phase >= last);
            saw_blocking |= phase == PursuerPhase::Blocking;
            last = phase;
            if phase == PursuerPhase::Inactive {
                break;
            }
        }
        assert!(saw_blocking);
        assert_eq!(last, PursuerPhase::Inactive);
        // The relay slot was released when slot 0 started descending
        assert_ne!(roster.pursuers[1].phase, PursuerPhase::Idle);
    }

    #[test]
    fn test_descent_snaps_to_rail_height() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut roster = quiet_roster(&mut rng);
        roster.pursuers[1].phase = PursuerPhase::Inactive;
        let p = &mut roster.pursuers[0];
        p.phase = PursuerPhase::Descending;
        p.pos = Vec2::new(1200.0, 100.0);
        p.hitbox = 20.0;
        let mut events = Vec::new();
        let c = ctx(0.0, -2000.0, &[]);
        for _ in 0..600 {
            roster.update(&c, &mut rng, SIM_DT, &mut events);
            if roster.pursuers[0].phase == PursuerPhase::Blocking {
                break;
            }
        }
        assert_eq!(roster.pursuers[0].phase, PursuerPhase::Blocking);
        assert_eq!(roster.pursuers[0].pos.y, VIEW_HEIGHT - 160.0);
    }

    #[test]
    fn test_blocking_pursuer_needs_clearance() {
        let mut rng = Pcg32::seed_from_u64(6);
        let mut roster = quiet_roster(&mut rng);
        let p = &mut roster.pursuers[0];
        p.phase = PursuerPhase::Blocking;
        p.hitbox = 20.0;
        p.pos = Vec2::new(1230.0, VIEW_HEIGHT - 160.0);
        let mut events = Vec::new();

        let mut low = ctx(600.0, 1200.0, &[]);
        low.elevation = 10.0;
        assert_eq!(
            roster.clone().update(&low, &mut rng, SIM_DT, &mut events),
            Some(PursuitHit::Pursuer(0))
        );

        let mut high = low;
        high.elevation = PURSUER_CLEARANCE;
        assert_eq!(roster.update(&high, &mut rng, SIM_DT, &mut events), None);
    }

    #[test]
    fn test_wanderer_chase_is_capped() {
        let mut w = Wanderer {
            pos: Vec2::new(100.0, 100.0),
            vel: Vec2::ZERO,
            chasing: false,
        };
        let far_body = Rect::new(5000.0, 0.0, 48.0, 64.0);
        for _ in 0..200 {
            w.update(Vec2::new(350.0, 150.0), &far_body, 10240.0);
            assert!(w.vel.x.abs() <= 3.0 && w.vel.y.abs() <= 3.0);
        }
        assert!(w.chasing);
    }

    #[test]
    fn test_wanderer_contact() {
        let mut w = Wanderer {
            pos: Vec2::new(124.0, 300.0),
            vel: Vec2::ZERO,
            chasing: false,
        };
        let body = Rect::new(100.0, 280.0, 48.0, 64.0);
        assert!(w.update(Vec2::new(100.0, 280.0), &body, 10240.0));
    }

    proptest! {
        #[test]
        fn prop_engaged_never_exceeds_cap(seed in any::<u64>(), steps in 1usize..1500, speed in 2.0f32..14.0) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut roster = PursuitRoster::new(1200.0, &mut rng);
            let mut events = Vec::new();
            let mut cart_x = 1200.0;
            let mut c = ctx(cart_x - VIEW_WIDTH / 2.0, cart_x, &[]);
            roster.release_opening(&c, &mut rng, &mut events);
            for i in 0..steps {
                cart_x += speed;
                c = ctx(cart_x - VIEW_WIDTH / 2.0, cart_x, &[]);
                c.elevation = 200.0;
                c.clock = i as f32 * SIM_DT;
                roster.update(&c, &mut rng, SIM_DT, &mut events);
                prop_assert!(roster.engaged() <= MAX_ENGAGED_PURSUERS);
            }
        }
    }
}
