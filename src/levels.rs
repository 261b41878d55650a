//! Level catalogue
//!
//! Static level layouts. Geometry is authored data: the simulation copies it
//! into a `LevelSession` and never writes back. Levels can also be loaded
//! from JSON with the same shape as `LevelData`'s serde representation.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::Rect;
use crate::consts::*;
use crate::sim::encounter::{EncounterLayout, Obstacle, ObstacleKind, RampPlacement};
use crate::sim::level::{BranchState, GeometryElement, GeometryKind, Patroller};

/// Built-in levels, in play order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LevelId {
    #[default]
    Lab,
    Forest,
    Cave,
}

impl LevelId {
    pub const ALL: [LevelId; 3] = [LevelId::Lab, LevelId::Forest, LevelId::Cave];

    pub fn index(self) -> usize {
        match self {
            LevelId::Lab => 0,
            LevelId::Forest => 1,
            LevelId::Cave => 2,
        }
    }

    /// The level unlocked by completing this one
    pub fn next(self) -> Option<LevelId> {
        match self {
            LevelId::Lab => Some(LevelId::Forest),
            LevelId::Forest => Some(LevelId::Cave),
            LevelId::Cave => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LevelId::Lab => "Laboratory",
            LevelId::Forest => "Forest",
            LevelId::Cave => "Fairy Cave",
        }
    }
}

/// Authored description of one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    pub id: LevelId,
    pub width: f32,
    /// Character top-left at level start
    pub spawn: Vec2,
    /// Geometry in authoring order
    pub elements: Vec<GeometryElement>,
    #[serde(default)]
    pub patrollers: Vec<Patroller>,
    /// Rail encounter attached to this level's vehicle
    #[serde(default)]
    pub encounter: Option<EncounterLayout>,
}

/// Y coordinate measured up from the bottom of the view
const fn up(n: f32) -> f32 {
    VIEW_HEIGHT - n
}

const GROUND_Y: f32 = up(80.0);

fn el(kind: GeometryKind, x: f32, y: f32, w: f32, h: f32) -> GeometryElement {
    GeometryElement::new(kind, Rect::new(x, y, w, h))
}

fn branch(x: f32, y: f32, w: f32, h: f32, brittle: bool) -> GeometryElement {
    el(
        GeometryKind::OneWayPlatform {
            branch: Some(BranchState {
                brittle,
                ..BranchState::default()
            }),
        },
        x,
        y,
        w,
        h,
    )
}

fn platform(x: f32, y: f32, w: f32, h: f32) -> GeometryElement {
    el(GeometryKind::OneWayPlatform { branch: None }, x, y, w, h)
}

fn worm(x: f32, dir: f32, min_x: f32, max_x: f32, speed: f32) -> Patroller {
    Patroller {
        rect: Rect::new(x, up(100.0), 64.0, 28.0),
        dir,
        min_x,
        max_x,
        speed,
    }
}

impl LevelData {
    /// One of the hand-authored levels
    pub fn builtin(id: LevelId) -> Self {
        match id {
            LevelId::Lab => Self::lab(),
            LevelId::Forest => Self::forest(),
            LevelId::Cave => Self::cave(),
        }
    }

    /// Parse a level from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let data: Self = serde_json::from_str(json)?;
        log::info!(
            "Loaded level {:?}: {} elements, width {}",
            data.id,
            data.elements.len(),
            data.width
        );
        Ok(data)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn lab() -> Self {
        let width = 1600.0;
        Self {
            id: LevelId::Lab,
            width,
            spawn: Vec2::new(120.0, 0.0),
            elements: vec![
                el(GeometryKind::Ground, 0.0, GROUND_Y, width, 80.0),
                el(
                    GeometryKind::DestructibleWall {
                        fragile: true,
                        broken: false,
                    },
                    480.0,
                    up(600.0),
                    48.0,
                    520.0,
                ),
                platform(1100.0, up(520.0), 120.0, 20.0),
                el(
                    GeometryKind::Collectible { collected: false },
                    1220.0,
                    up(560.0),
                    24.0,
                    24.0,
                ),
                platform(1400.0, up(620.0), 120.0, 20.0),
                el(
                    GeometryKind::GoalDoor {
                        requires_breach: true,
                    },
                    1450.0,
                    up(700.0),
                    64.0,
                    80.0,
                ),
            ],
            patrollers: Vec::new(),
            encounter: None,
        }
    }

    fn forest() -> Self {
        let width = VIEW_WIDTH * 6.0;
        Self {
            id: LevelId::Forest,
            width,
            spawn: Vec2::new(50.0, 300.0),
            elements: vec![
                el(GeometryKind::Ground, 0.0, GROUND_Y, width, 80.0),
                // Low branches
                branch(380.0, up(180.0), 180.0, 24.0, true),
                branch(900.0, up(220.0), 160.0, 24.0, true),
                branch(1200.0, up(240.0), 140.0, 24.0, true),
                // Giant root
                el(GeometryKind::SolidWall, 1400.0, up(420.0), 60.0, 340.0),
                el(GeometryKind::HazardFluid, 900.0, up(100.0), 1200.0, 80.0),
                // Mid and high branches
                branch(1800.0, up(340.0), 140.0, 20.0, true),
                branch(2600.0, up(520.0), 140.0, 20.0, false),
                branch(3100.0, up(380.0), 120.0, 20.0, false),
                branch(3700.0, up(320.0), 120.0, 20.0, true),
                branch(4100.0, up(280.0), 140.0, 20.0, true),
                el(GeometryKind::SolidWall, 4400.0, up(400.0), 60.0, 320.0),
                branch(4600.0, up(450.0), 160.0, 20.0, false),
                branch(5000.0, up(380.0), 140.0, 20.0, true),
                el(GeometryKind::SolidWall, 5300.0, up(500.0), 60.0, 420.0),
                branch(5500.0, up(420.0), 180.0, 20.0, false),
                el(
                    GeometryKind::Collectible { collected: false },
                    5600.0,
                    up(460.0),
                    24.0,
                    24.0,
                ),
                el(
                    GeometryKind::GoalDoor {
                        requires_breach: false,
                    },
                    width - 100.0,
                    up(600.0),
                    64.0,
                    80.0,
                ),
                el(
                    GeometryKind::DestructibleTree { broken: false },
                    2200.0,
                    up(260.0),
                    80.0,
                    180.0,
                ),
                el(
                    GeometryKind::DestructibleTree { broken: false },
                    3300.0,
                    up(280.0),
                    100.0,
                    200.0,
                ),
            ],
            patrollers: vec![
                worm(800.0, 1.0, 800.0, 1100.0, 1.4),
                worm(1400.0, -1.0, 1400.0, 1700.0, 1.3),
                worm(2000.0, 1.0, 2000.0, 2200.0, 1.4),
                worm(2700.0, -1.0, 2600.0, 2900.0, 1.2),
                worm(3200.0, 1.0, 3200.0, 3500.0, 1.3),
                worm(3800.0, -1.0, 3800.0, 4100.0, 1.5),
                worm(4300.0, 1.0, 4300.0, 4600.0, 1.4),
            ],
            encounter: None,
        }
    }

    fn cave() -> Self {
        let width = VIEW_WIDTH * 8.0;
        let cart_x = 1200.0;
        Self {
            id: LevelId::Cave,
            width,
            spawn: Vec2::new(50.0, 300.0),
            elements: vec![
                el(GeometryKind::Ground, 0.0, GROUND_Y, width, 80.0),
                el(
                    GeometryKind::Crystal { activated: false },
                    900.0,
                    up(150.0),
                    40.0,
                    60.0,
                ),
                // High lever, out of reach without the vine
                el(
                    GeometryKind::Lever { pulled: false },
                    cart_x + 40.0,
                    120.0,
                    20.0,
                    30.0,
                ),
                el(
                    GeometryKind::Vehicle { activated: false },
                    cart_x,
                    up(120.0),
                    CART_WIDTH,
                    CART_HEIGHT,
                ),
            ],
            patrollers: Vec::new(),
            encounter: Some(EncounterLayout {
                cart_start: Vec2::new(cart_x, up(120.0)),
                finish_x: width - CART_FINISH_MARGIN,
                ramps: vec![
                    RampPlacement {
                        x: 3250.0,
                        ramp_width: 130.0,
                        ramp_height: 90.0,
                        pit_width: 320.0,
                    },
                    RampPlacement {
                        x: 6750.0,
                        ramp_width: 140.0,
                        ramp_height: 100.0,
                        pit_width: 360.0,
                    },
                ],
                obstacles: vec![
                    Obstacle::new(2000.0, ObstacleKind::LowBeam { height: 50.0 }),
                    Obstacle::new(2950.0, ObstacleKind::LowBeam { height: 55.0 }),
                    Obstacle::new(4400.0, ObstacleKind::BreakableRock { broken: false }),
                    Obstacle::new(5600.0, ObstacleKind::FloorSpike),
                    Obstacle::new(6075.0, ObstacleKind::LowBeam { height: 65.0 }),
                    Obstacle::new(7900.0, ObstacleKind::BreakableRock { broken: false }),
                    Obstacle::new(8050.0, ObstacleKind::LowBeam { height: 48.0 }),
                ],
            }),
        }
    }
}
