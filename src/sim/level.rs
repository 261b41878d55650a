//! Level geometry and the per-attempt level session
//!
//! Geometry arrives as static data (`LevelData`). The session owns a working
//! copy whose mutable flags (broken, pulled, activated, ...) live only until
//! the next reset.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pursuit::Wanderer;
use crate::Rect;
use crate::consts::*;
use crate::levels::{LevelData, LevelId};

/// Load state of a branch that bends and may snap under the character
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BranchState {
    /// Snaps once the character has stood on it long enough
    pub brittle: bool,
    #[serde(default)]
    pub load: f32,
    #[serde(default)]
    pub sagging: bool,
    #[serde(default)]
    pub broken: bool,
}

/// Geometry type tag with its type-specific fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometryKind {
    Ground,
    /// Can be jumped through from below
    OneWayPlatform {
        #[serde(default)]
        branch: Option<BranchState>,
    },
    SolidWall,
    /// Mud/water: sinks anyone but the caster form
    HazardFluid,
    /// Breakable by the heavy form when `fragile`, otherwise solid
    DestructibleWall {
        fragile: bool,
        #[serde(default)]
        broken: bool,
    },
    DestructibleTree {
        #[serde(default)]
        broken: bool,
    },
    Collectible {
        #[serde(default)]
        collected: bool,
    },
    GoalDoor {
        /// Door must be smashed open by the heavy form
        #[serde(default)]
        requires_breach: bool,
    },
    Lever {
        #[serde(default)]
        pulled: bool,
    },
    Vehicle {
        #[serde(default)]
        activated: bool,
    },
    Crystal {
        #[serde(default)]
        activated: bool,
    },
}

impl GeometryKind {
    /// Fixed resolution order: supports first, then blockers, hazards,
    /// destructibles, pickups and finally interactive elements.
    pub fn resolve_rank(&self) -> u8 {
        match self {
            GeometryKind::Ground | GeometryKind::OneWayPlatform { .. } => 0,
            GeometryKind::SolidWall => 1,
            GeometryKind::HazardFluid => 2,
            GeometryKind::DestructibleWall { .. } | GeometryKind::DestructibleTree { .. } => 3,
            GeometryKind::Collectible { .. } => 4,
            GeometryKind::Lever { .. } | GeometryKind::Vehicle { .. } | GeometryKind::Crystal { .. } => 5,
            GeometryKind::GoalDoor { .. } => 6,
        }
    }
}

/// One piece of level geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryElement {
    pub kind: GeometryKind,
    pub rect: Rect,
}

impl GeometryElement {
    pub const fn new(kind: GeometryKind, rect: Rect) -> Self {
        Self { kind, rect }
    }

    /// Collision rect, accounting for a sagging branch
    pub fn effective_rect(&self) -> Rect {
        match self.kind {
            GeometryKind::OneWayPlatform {
                branch: Some(BranchState { sagging: true, .. }),
            } => Rect {
                y: self.rect.y + BRANCH_SAG_OFFSET,
                ..self.rect
            },
            _ => self.rect,
        }
    }
}

/// Ground critter walking back and forth between two x bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Patroller {
    pub rect: Rect,
    /// +1 right, -1 left
    pub dir: f32,
    pub min_x: f32,
    pub max_x: f32,
    pub speed: f32,
}

impl Patroller {
    pub fn step(&mut self) {
        self.rect.x += self.dir * self.speed;
        if self.rect.x < self.min_x || self.rect.x > self.max_x {
            self.dir = -self.dir;
        }
    }
}

/// Mutable per-attempt copy of a level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSession {
    pub id: LevelId,
    pub width: f32,
    pub spawn: Vec2,
    pub elements: Vec<GeometryElement>,
    pub patrollers: Vec<Patroller>,
    /// Ambient fairies woken by the crystal
    pub wanderers: Vec<Wanderer>,
    /// Element indices sorted by resolution rank (stable)
    #[serde(skip)]
    pub resolve_order: Vec<usize>,
}

impl LevelSession {
    pub fn new(data: &LevelData) -> Self {
        let mut resolve_order: Vec<usize> = (0..data.elements.len()).collect();
        resolve_order.sort_by_key(|&i| data.elements[i].kind.resolve_rank());

        Self {
            id: data.id,
            width: data.width,
            spawn: data.spawn,
            elements: data.elements.clone(),
            patrollers: data.patrollers.clone(),
            wanderers: Vec::new(),
            resolve_order,
        }
    }

    /// Whether the level's lever has been pulled (levels without a lever count as pulled)
    pub fn lever_pulled(&self) -> bool {
        let mut levers = self.elements.iter().filter_map(|e| match e.kind {
            GeometryKind::Lever { pulled } => Some(pulled),
            _ => None,
        });
        levers.all(|pulled| pulled)
    }

    pub fn crystal_activated(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e.kind, GeometryKind::Crystal { activated: true }))
    }

    pub fn gem_collected(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e.kind, GeometryKind::Collectible { collected: true }))
    }

    /// Rect of the first vehicle element (the cart parked at the rail head)
    pub fn vehicle_rect(&self) -> Option<Rect> {
        self.elements.iter().find_map(|e| match e.kind {
            GeometryKind::Vehicle { .. } => Some(e.rect),
            _ => None,
        })
    }

    pub fn set_vehicle_activated(&mut self) {
        for e in &mut self.elements {
            if let GeometryKind::Vehicle { activated } = &mut e.kind {
                *activated = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_order_puts_supports_first() {
        let session = LevelSession::new(&LevelData::builtin(LevelId::Forest));
        let ranks: Vec<u8> = session
            .resolve_order
            .iter()
            .map(|&i| session.elements[i].kind.resolve_rank())
            .collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ranks.len(), session.elements.len());
    }

    #[test]
    fn test_sagging_branch_lowers_rect() {
        let mut el = GeometryElement::new(
            GeometryKind::OneWayPlatform {
                branch: Some(BranchState::default()),
            },
            Rect::new(0.0, 100.0, 50.0, 20.0),
        );
        assert_eq!(el.effective_rect().y, 100.0);
        if let GeometryKind::OneWayPlatform { branch: Some(b) } = &mut el.kind {
            b.sagging = true;
        }
        assert_eq!(el.effective_rect().y, 100.0 + BRANCH_SAG_OFFSET);
    }

    #[test]
    fn test_patroller_turns_at_bounds() {
        let mut p = Patroller {
            rect: Rect::new(100.0, 0.0, 64.0, 28.0),
            dir: 1.0,
            min_x: 100.0,
            max_x: 102.0,
            speed: 1.5,
        };
        p.step();
        assert_eq!(p.dir, 1.0);
        p.step();
        assert_eq!(p.dir, -1.0);
    }

    #[test]
    fn test_lever_gate() {
        let mut session = LevelSession::new(&LevelData::builtin(LevelId::Cave));
        assert!(!session.lever_pulled());
        for e in &mut session.elements {
            if let GeometryKind::Lever { pulled } = &mut e.kind {
                *pulled = true;
            }
        }
        assert!(session.lever_pulled());
    }
}
