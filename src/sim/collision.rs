//! Character vs level geometry
//!
//! Resolution runs once per step against the already-integrated position.
//! Elements are visited in `LevelSession::resolve_order` and each geometry
//! type has its own response. There is no sweep: fast motion can tunnel
//! through thin geometry.

use glam::Vec2;

use super::character::{Character, Form};
use super::level::{BranchState, GeometryElement, GeometryKind, LevelSession};
use super::state::{EffectKind, GameEvent};
use crate::Rect;
use crate::consts::*;

/// A foot this close to a top edge counts as resting on it
const REST_EPSILON: f32 = 0.01;

/// Per-step inputs to the resolver
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext {
    /// `ability_primary` held this step
    pub interact: bool,
    pub dt: f32,
}

/// Everything the resolver noticed that the session has to act on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Fully sunk in a hazard fluid
    pub submerged: bool,
    pub goal_reached: bool,
    /// Asked to board the vehicle with the lever already pulled
    pub board_vehicle: bool,
    pub crystal_activated: bool,
    pub lever_pulled: bool,
    pub gem_collected: bool,
    pub destroyed: u32,
}

/// Resolve the character against all level geometry, its own magic
/// platforms and the world bounds.
pub fn resolve_character(
    c: &mut Character,
    level: &mut LevelSession,
    ctx: &ResolveContext,
    events: &mut Vec<GameEvent>,
) -> ResolveReport {
    let was_sinking = c.sinking;
    c.on_ground = false;
    c.sinking = false;

    let mut report = ResolveReport::default();
    let lever_ready = level.lever_pulled();

    for k in 0..level.resolve_order.len() {
        let idx = level.resolve_order[k];
        let element = &mut level.elements[idx];
        match element.kind {
            GeometryKind::Ground => {
                if !was_sinking {
                    resolve_ground(c, &element.rect);
                }
            }
            GeometryKind::OneWayPlatform { .. } => resolve_branch(c, element, ctx.dt, events),
            GeometryKind::SolidWall => resolve_wall(c, &element.rect),
            GeometryKind::HazardFluid => {
                if resolve_hazard(c, &element.rect) {
                    report.submerged = true;
                }
            }
            GeometryKind::DestructibleWall { .. } | GeometryKind::DestructibleTree { .. } => {
                if resolve_destructible(c, element, ctx.interact, events) {
                    report.destroyed += 1;
                }
            }
            GeometryKind::Collectible { .. } => {
                if resolve_collectible(c, element, events) {
                    report.gem_collected = true;
                }
            }
            GeometryKind::Lever { .. } => {
                if resolve_lever(c, element, ctx.interact, events) {
                    report.lever_pulled = true;
                }
            }
            GeometryKind::Vehicle { activated } => {
                let near = c.center().distance(element.rect.center()) < INTERACT_RADIUS;
                if !activated && near && ctx.interact && c.form == Form::Destroyer {
                    if lever_ready || report.lever_pulled {
                        report.board_vehicle = true;
                    } else {
                        log::debug!("Cart is locked until the lever is pulled");
                    }
                }
            }
            GeometryKind::Crystal { .. } => {
                if resolve_crystal(c, element, events) {
                    report.crystal_activated = true;
                }
            }
            GeometryKind::GoalDoor { requires_breach } => {
                if c.rect().overlaps(&element.rect) {
                    let breach = c.form == Form::Destroyer && (ctx.interact || c.is_charging());
                    if !requires_breach || breach {
                        report.goal_reached = true;
                    }
                }
            }
        }
    }

    resolve_magic_platforms(c);
    clamp_to_world(c, level.width);

    report
}

fn stand_on(c: &mut Character, top: f32) {
    c.pos.y = top - c.size.y;
    c.vel.y = 0.0;
    c.on_ground = true;
}

/// Foot exactly on `rect`'s top edge, not moving up
fn resting_on(c: &Character, rect: &Rect) -> bool {
    (c.foot() - rect.y).abs() <= REST_EPSILON
        && c.pos.x < rect.right()
        && c.pos.x + c.size.x > rect.x
        && c.vel.y >= 0.0
}

/// Was above `top` before this step's move, and is falling
fn landing_from_above(c: &Character, top: f32) -> bool {
    c.vel.y >= 0.0 && c.prev_pos.y + c.size.y <= top + REST_EPSILON
}

fn push_out_laterally(c: &mut Character, rect: &Rect) {
    if c.center().x < rect.center().x {
        c.pos.x = rect.x - c.size.x - 1.0;
    } else {
        c.pos.x = rect.right() + 1.0;
    }
    c.vel.x = 0.0;
}

fn resolve_ground(c: &mut Character, rect: &Rect) {
    if c.rect().overlaps(rect) || resting_on(c, rect) {
        stand_on(c, rect.y);
    }
}

fn resolve_branch(c: &mut Character, element: &mut GeometryElement, dt: f32, events: &mut Vec<GameEvent>) {
    let rect = element.effective_rect();
    let GeometryKind::OneWayPlatform { branch } = &mut element.kind else {
        return;
    };
    if branch.is_some_and(|b| b.broken) {
        return;
    }

    let standing = (c.rect().overlaps(&rect) || resting_on(c, &rect)) && landing_from_above(c, rect.y);
    if standing {
        stand_on(c, rect.y);
    }

    let Some(state) = branch.as_mut() else {
        return;
    };
    if standing {
        load_branch(state, dt, rect.center(), events);
    } else if state.load > 0.0 {
        state.load = (state.load - dt).max(0.0);
        if state.load <= 0.0 {
            state.sagging = false;
        }
    }
}

fn load_branch(state: &mut BranchState, dt: f32, at: Vec2, events: &mut Vec<GameEvent>) {
    state.load += dt;
    if state.brittle && !state.broken && state.load > BRANCH_BREAK_LOAD {
        state.broken = true;
        log::debug!("Branch snapped at {:?}", at);
        events.push(GameEvent::Effect {
            kind: EffectKind::BranchSnap,
            pos: at,
        });
    }
    if state.load > BRANCH_SAG_LOAD {
        state.sagging = true;
    }
}

/// Roots and similar blockers: stand on top when the foot is close to
/// the top edge, otherwise get pushed out sideways.
fn resolve_wall(c: &mut Character, rect: &Rect) {
    if c.rect().overlaps(rect) {
        if c.foot() <= rect.y + WALL_STEP_TOLERANCE {
            stand_on(c, rect.y);
        } else {
            push_out_laterally(c, rect);
        }
    } else if resting_on(c, rect) {
        stand_on(c, rect.y);
    }
}

/// Returns true once the character is submerged
fn resolve_hazard(c: &mut Character, rect: &Rect) -> bool {
    if c.form == Form::Mage || !c.rect().overlaps(rect) {
        return false;
    }
    c.sinking = true;
    c.vel.y += HAZARD_SINK_VELOCITY;
    c.pos.y > rect.y
}

/// Destroy-check first, push-out otherwise. Returns true if destroyed.
fn resolve_destructible(
    c: &mut Character,
    element: &mut GeometryElement,
    interact: bool,
    events: &mut Vec<GameEvent>,
) -> bool {
    let rect = element.rect;
    let breakable = match element.kind {
        GeometryKind::DestructibleWall { fragile, broken } => {
            if broken {
                return false;
            }
            fragile
        }
        GeometryKind::DestructibleTree { broken } => {
            if broken {
                return false;
            }
            true
        }
        _ => return false,
    };
    if !c.rect().overlaps(&rect) {
        return false;
    }

    let smashing = c.form == Form::Destroyer && (interact || c.is_charging());
    if breakable && smashing {
        match &mut element.kind {
            GeometryKind::DestructibleWall { broken, .. } | GeometryKind::DestructibleTree { broken } => {
                *broken = true;
            }
            _ => {}
        }
        log::debug!("Destroyed {:?} at {:?}", element.kind, rect);
        events.push(GameEvent::Effect {
            kind: EffectKind::Debris,
            pos: rect.center(),
        });
        return true;
    }

    push_out_laterally(c, &rect);
    false
}

fn resolve_collectible(c: &Character, element: &mut GeometryElement, events: &mut Vec<GameEvent>) -> bool {
    let rect = element.rect;
    match &mut element.kind {
        GeometryKind::Collectible { collected } if !*collected && c.rect().overlaps(&rect) => {
            *collected = true;
            events.push(GameEvent::GemCollected);
            events.push(GameEvent::Effect {
                kind: EffectKind::Sparkle,
                pos: rect.center(),
            });
            true
        }
        _ => false,
    }
}

/// Pulled by the heavy form up close, or by the druid's vine from afar
fn resolve_lever(
    c: &mut Character,
    element: &mut GeometryElement,
    interact: bool,
    events: &mut Vec<GameEvent>,
) -> bool {
    let center = element.rect.center();
    let GeometryKind::Lever { pulled } = &mut element.kind else {
        return false;
    };
    if *pulled {
        return false;
    }

    let by_hand = c.form == Form::Destroyer
        && interact
        && c.center().distance(center) < INTERACT_RADIUS;
    let by_vine = c.form == Form::Druid
        && c.vine
            .is_some_and(|vine| vine.target.distance(center) < VINE_LEVER_REACH);
    if !by_hand && !by_vine {
        return false;
    }

    *pulled = true;
    if by_vine {
        c.grant_vine_grace();
    }
    log::info!("Lever pulled ({})", if by_vine { "vine" } else { "hand" });
    events.push(GameEvent::Effect {
        kind: EffectKind::LeverPulled,
        pos: center,
    });
    true
}

fn resolve_crystal(c: &Character, element: &mut GeometryElement, events: &mut Vec<GameEvent>) -> bool {
    let center = element.rect.center();
    match &mut element.kind {
        GeometryKind::Crystal { activated }
            if !*activated && c.center().distance(center) < INTERACT_RADIUS =>
        {
            *activated = true;
            events.push(GameEvent::Effect {
                kind: EffectKind::CrystalFusion,
                pos: center,
            });
            true
        }
        _ => false,
    }
}

fn resolve_magic_platforms(c: &mut Character) {
    for i in 0..c.platforms.len() {
        let rect = c.platforms[i].rect;
        if (c.rect().overlaps(&rect) || resting_on(c, &rect)) && landing_from_above(c, rect.y) {
            stand_on(c, rect.y);
        }
    }
}

/// Clamp horizontally into the level and stand on the bottom of the view
fn clamp_to_world(c: &mut Character, level_width: f32) {
    c.pos.x = c.pos.x.clamp(0.0, (level_width - c.size.x).max(0.0));
    if c.foot() >= VIEW_HEIGHT {
        stand_on(c, VIEW_HEIGHT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::{LevelData, LevelId};
    use crate::sim::character::{MagicPlatform, Vine};
    use crate::sim::timer::{AbilityTimer, TimerClass};
    use proptest::prelude::*;

    fn session(elements: Vec<GeometryElement>) -> LevelSession {
        LevelSession::new(&LevelData {
            id: LevelId::Forest,
            width: 2000.0,
            spawn: Vec2::ZERO,
            elements,
            patrollers: Vec::new(),
            encounter: None,
        })
    }

    fn ground() -> GeometryElement {
        GeometryElement::new(GeometryKind::Ground, Rect::new(0.0, 640.0, 2000.0, 80.0))
    }

    fn at(x: f32, y: f32, form: Form) -> Character {
        let mut c = Character::new(Vec2::new(x, y));
        c.form = form;
        c
    }

    fn resolve(c: &mut Character, level: &mut LevelSession, interact: bool) -> ResolveReport {
        let mut events = Vec::new();
        resolve_character(
            c,
            level,
            &ResolveContext {
                interact,
                dt: SIM_DT,
            },
            &mut events,
        )
    }

    #[test]
    fn test_ground_snap_and_rest() {
        let mut level = session(vec![ground()]);
        let mut c = at(100.0, 580.0, Form::Ninja);
        c.vel.y = 5.0;
        resolve(&mut c, &mut level, false);
        assert_eq!(c.pos.y, 576.0);
        assert_eq!(c.vel.y, 0.0);
        assert!(c.on_ground);

        // Touching the top exactly keeps the character grounded
        resolve(&mut c, &mut level, false);
        assert!(c.on_ground);
    }

    #[test]
    fn test_one_way_platform_passes_from_below() {
        let plat = GeometryElement::new(
            GeometryKind::OneWayPlatform { branch: None },
            Rect::new(0.0, 300.0, 200.0, 20.0),
        );
        let mut level = session(vec![plat]);
        let mut c = at(50.0, 290.0, Form::Ninja);
        c.prev_pos = Vec2::new(50.0, 310.0);
        c.vel.y = -10.0;
        resolve(&mut c, &mut level, false);
        assert!(!c.on_ground);
        assert_eq!(c.pos.y, 290.0);

        let mut c = at(50.0, 240.0, Form::Ninja);
        c.prev_pos = Vec2::new(50.0, 230.0);
        c.vel.y = 10.0;
        resolve(&mut c, &mut level, false);
        assert!(c.on_ground);
        assert_eq!(c.pos.y, 236.0);
    }

    #[test]
    fn test_brittle_branch_breaks_after_load() {
        let branch = GeometryElement::new(
            GeometryKind::OneWayPlatform {
                branch: Some(BranchState {
                    brittle: true,
                    ..BranchState::default()
                }),
            },
            Rect::new(0.0, 300.0, 200.0, 20.0),
        );
        let mut level = session(vec![branch]);
        let mut c = at(50.0, 236.0, Form::Mage);
        let mut steps = 0;
        loop {
            c.prev_pos = c.pos;
            resolve(&mut c, &mut level, false);
            steps += 1;
            if matches!(
                level.elements[0].kind,
                GeometryKind::OneWayPlatform {
                    branch: Some(BranchState { broken: true, .. })
                }
            ) {
                break;
            }
            assert!(steps < 60);
        }
        assert!(steps > 29);
        c.prev_pos = c.pos;
        resolve(&mut c, &mut level, false);
        assert!(!c.on_ground);
    }

    #[test]
    fn test_wall_push_and_step() {
        let wall = GeometryElement::new(GeometryKind::SolidWall, Rect::new(500.0, 300.0, 60.0, 340.0));
        let mut level = session(vec![ground(), wall]);

        let mut c = at(460.0, 576.0, Form::Destroyer);
        c.vel.x = 5.0;
        resolve(&mut c, &mut level, false);
        assert_eq!(c.pos.x, 500.0 - PLAYER_WIDTH - 1.0);
        assert_eq!(c.vel.x, 0.0);

        let mut c = at(510.0, 300.0 - PLAYER_HEIGHT + 5.0, Form::Destroyer);
        c.vel.y = 5.0;
        resolve(&mut c, &mut level, false);
        assert_eq!(c.pos.y, 300.0 - PLAYER_HEIGHT);
        assert!(c.on_ground);
    }

    #[test]
    fn test_destroy_check_runs_before_push_back() {
        let wall = GeometryElement::new(
            GeometryKind::DestructibleWall {
                fragile: true,
                broken: false,
            },
            Rect::new(500.0, 120.0, 48.0, 520.0),
        );
        let mut level = session(vec![ground(), wall]);

        let mut c = at(460.0, 576.0, Form::Ninja);
        resolve(&mut c, &mut level, true);
        assert_eq!(c.pos.x, 500.0 - PLAYER_WIDTH - 1.0);

        let mut c = at(460.0, 576.0, Form::Destroyer);
        let report = resolve(&mut c, &mut level, true);
        assert_eq!(report.destroyed, 1);
        assert_eq!(c.pos.x, 460.0);
        assert!(matches!(
            level.elements[1].kind,
            GeometryKind::DestructibleWall { broken: true, .. }
        ));
    }

    #[test]
    fn test_charge_breaks_tree_without_interact() {
        let tree = GeometryElement::new(
            GeometryKind::DestructibleTree { broken: false },
            Rect::new(500.0, 460.0, 80.0, 180.0),
        );
        let mut level = session(vec![ground(), tree]);
        let mut c = at(470.0, 576.0, Form::Destroyer);
        c.timers.charge_active.start(1.0);
        let report = resolve(&mut c, &mut level, false);
        assert_eq!(report.destroyed, 1);
    }

    #[test]
    fn test_hazard_sinks_non_caster() {
        let mud = GeometryElement::new(GeometryKind::HazardFluid, Rect::new(0.0, 620.0, 2000.0, 80.0));
        let mut level = session(vec![ground(), mud]);

        let mut mage = at(100.0, 576.0, Form::Mage);
        let report = resolve(&mut mage, &mut level, false);
        assert!(!report.submerged && !mage.sinking && mage.on_ground);

        let mut c = at(100.0, 576.0, Form::Destroyer);
        resolve(&mut c, &mut level, false);
        assert!(c.sinking);
        assert_eq!(c.vel.y, HAZARD_SINK_VELOCITY);

        c.pos.y = 630.0;
        let report = resolve(&mut c, &mut level, false);
        assert!(report.submerged);
    }

    #[test]
    fn test_lever_pulled_by_vine_grants_grace() {
        let lever = GeometryElement::new(GeometryKind::Lever { pulled: false }, Rect::new(1240.0, 120.0, 20.0, 30.0));
        let mut level = session(vec![ground(), lever]);
        let mut c = at(1100.0, 576.0, Form::Druid);
        c.vine = Some(Vine {
            origin: c.pos,
            start: c.center(),
            target: Vec2::new(1255.0, 140.0),
        });
        let report = resolve(&mut c, &mut level, false);
        assert!(report.lever_pulled);
        assert!(level.lever_pulled());
        assert!(c.timers.vine_grace.is_running());
    }

    #[test]
    fn test_vehicle_boarding_requires_lever() {
        let lever = GeometryElement::new(GeometryKind::Lever { pulled: false }, Rect::new(1240.0, 120.0, 20.0, 30.0));
        let cart = GeometryElement::new(
            GeometryKind::Vehicle { activated: false },
            Rect::new(1200.0, 600.0, CART_WIDTH, CART_HEIGHT),
        );
        let mut level = session(vec![ground(), lever, cart]);
        let mut c = at(1190.0, 576.0, Form::Destroyer);
        assert!(!resolve(&mut c, &mut level, true).board_vehicle);

        for e in &mut level.elements {
            if let GeometryKind::Lever { pulled } = &mut e.kind {
                *pulled = true;
            }
        }
        assert!(resolve(&mut c, &mut level, true).board_vehicle);
        assert!(!resolve(&mut c, &mut level, false).board_vehicle);
    }

    #[test]
    fn test_breach_door_needs_heavy_form() {
        let door = GeometryElement::new(
            GeometryKind::GoalDoor {
                requires_breach: true,
            },
            Rect::new(100.0, 560.0, 64.0, 80.0),
        );
        let mut level = session(vec![ground(), door]);
        let mut c = at(110.0, 576.0, Form::Ninja);
        assert!(!resolve(&mut c, &mut level, true).goal_reached);
        c.form = Form::Destroyer;
        assert!(!resolve(&mut c, &mut level, false).goal_reached);
        assert!(resolve(&mut c, &mut level, true).goal_reached);
    }

    #[test]
    fn test_magic_platform_supports() {
        let mut level = session(vec![ground()]);
        let mut c = at(100.0, 300.0, Form::Mage);
        c.prev_pos = Vec2::new(100.0, 295.0);
        c.vel.y = 5.0;
        let mut lifetime = AbilityTimer::new(TimerClass::ActiveWindow);
        lifetime.start(2.0);
        c.platforms.push(MagicPlatform {
            rect: Rect::new(100.0, 360.0, 80.0, 16.0),
            lifetime,
        });
        resolve(&mut c, &mut level, false);
        assert!(c.on_ground);
        assert_eq!(c.foot(), 360.0);
    }

    #[test]
    fn test_world_bounds() {
        let mut level = session(vec![]);
        let mut c = at(-30.0, 700.0, Form::Ninja);
        resolve(&mut c, &mut level, false);
        assert_eq!(c.pos.x, 0.0);
        assert_eq!(c.foot(), VIEW_HEIGHT);
        assert!(c.on_ground);

        let mut c = at(5000.0, 100.0, Form::Ninja);
        resolve(&mut c, &mut level, false);
        assert_eq!(c.pos.x, 2000.0 - PLAYER_WIDTH);
    }

    proptest! {
        #[test]
        fn prop_resolve_is_idempotent(
            x in 0.0f32..1900.0,
            y in 0.0f32..650.0,
            vx in -15.0f32..15.0,
            vy in -18.0f32..20.0,
            dy in -20.0f32..20.0,
        ) {
            // Separated geometry: no two elements within a body width of each other.
            // No brittle branches: every resolve on one adds load time.
            let elements = vec![
                ground(),
                GeometryElement::new(GeometryKind::OneWayPlatform { branch: None }, Rect::new(150.0, 400.0, 200.0, 20.0)),
                GeometryElement::new(GeometryKind::SolidWall, Rect::new(800.0, 300.0, 60.0, 340.0)),
                GeometryElement::new(
                    GeometryKind::DestructibleWall { fragile: true, broken: false },
                    Rect::new(1400.0, 200.0, 48.0, 440.0),
                ),
            ];
            let mut level = session(elements);
            let mut c = at(x, y, Form::Ninja);
            c.vel = Vec2::new(vx, vy);
            c.prev_pos = Vec2::new(x - vx, y - dy);

            resolve(&mut c, &mut level, false);
            let once = (c.pos, c.vel, c.on_ground, c.sinking);
            resolve(&mut c, &mut level, false);
            prop_assert_eq!(once, (c.pos, c.vel, c.on_ground, c.sinking));
        }
    }
}
