//! Ability timers
//!
//! Every ability gate in the game is one of these: a remaining duration that
//! counts down once per step and never goes below zero.

use serde::{Deserialize, Serialize};

/// What a timer gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerClass {
    /// Minimum time before the ability can be triggered again
    Cooldown,
    /// The ability's primary effect is in force
    ActiveWindow,
    /// Post-ability penalty (degraded locomotion)
    FatigueWindow,
}

/// A single named countdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityTimer {
    pub remaining: f32,
    /// Length of the last window started (for HUD fill ratios)
    pub duration: f32,
    pub class: TimerClass,
}

impl AbilityTimer {
    pub const fn new(class: TimerClass) -> Self {
        Self {
            remaining: 0.0,
            duration: 0.0,
            class,
        }
    }

    /// Advance by `dt`, clamping at zero
    #[inline]
    pub fn tick(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.remaining <= 0.0
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        !self.is_ready()
    }

    /// Start (or restart) the window
    pub fn start(&mut self, duration: f32) {
        self.remaining = duration.max(0.0);
        self.duration = duration.max(0.0);
    }

    pub fn clear(&mut self) {
        self.remaining = 0.0;
    }

    /// Remaining fraction in [0, 1] (0 when idle)
    pub fn fraction(&self) -> f32 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.remaining / self.duration).clamp(0.0, 1.0)
        }
    }
}

/// Identifies a timer in the character's bag (used by the HUD snapshot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerId {
    ChargeActive,
    ChargeFatigue,
    ChargeCooldown,
    DashActive,
    DashCooldown,
    Levitate,
    PlatformCooldown,
    SlowTimeActive,
    SlowTimeCooldown,
    VineCooldown,
    VineGrace,
    ImpulseActive,
    ImpulseCooldown,
}

/// The character's full set of ability timers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityTimers {
    pub charge_active: AbilityTimer,
    pub charge_fatigue: AbilityTimer,
    pub charge_cooldown: AbilityTimer,
    pub dash_active: AbilityTimer,
    pub dash_cooldown: AbilityTimer,
    /// Remaining levitation budget for the current jump
    pub levitate: AbilityTimer,
    pub platform_cooldown: AbilityTimer,
    pub slow_time_active: AbilityTimer,
    pub slow_time_cooldown: AbilityTimer,
    pub vine_cooldown: AbilityTimer,
    /// Keeps the vine alive after it pulled a lever
    pub vine_grace: AbilityTimer,
    pub impulse_active: AbilityTimer,
    pub impulse_cooldown: AbilityTimer,
}

impl Default for AbilityTimers {
    fn default() -> Self {
        use TimerClass::*;
        Self {
            charge_active: AbilityTimer::new(ActiveWindow),
            charge_fatigue: AbilityTimer::new(FatigueWindow),
            charge_cooldown: AbilityTimer::new(Cooldown),
            dash_active: AbilityTimer::new(ActiveWindow),
            dash_cooldown: AbilityTimer::new(Cooldown),
            levitate: AbilityTimer::new(ActiveWindow),
            platform_cooldown: AbilityTimer::new(Cooldown),
            slow_time_active: AbilityTimer::new(ActiveWindow),
            slow_time_cooldown: AbilityTimer::new(Cooldown),
            vine_cooldown: AbilityTimer::new(Cooldown),
            vine_grace: AbilityTimer::new(ActiveWindow),
            impulse_active: AbilityTimer::new(ActiveWindow),
            impulse_cooldown: AbilityTimer::new(Cooldown),
        }
    }
}

impl AbilityTimers {
    /// All timers, in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (TimerId, &AbilityTimer)> {
        [
            (TimerId::ChargeActive, &self.charge_active),
            (TimerId::ChargeFatigue, &self.charge_fatigue),
            (TimerId::ChargeCooldown, &self.charge_cooldown),
            (TimerId::DashActive, &self.dash_active),
            (TimerId::DashCooldown, &self.dash_cooldown),
            (TimerId::Levitate, &self.levitate),
            (TimerId::PlatformCooldown, &self.platform_cooldown),
            (TimerId::SlowTimeActive, &self.slow_time_active),
            (TimerId::SlowTimeCooldown, &self.slow_time_cooldown),
            (TimerId::VineCooldown, &self.vine_cooldown),
            (TimerId::VineGrace, &self.vine_grace),
            (TimerId::ImpulseActive, &self.impulse_active),
            (TimerId::ImpulseCooldown, &self.impulse_cooldown),
        ]
        .into_iter()
    }

    /// Cooldowns that keep running while their ability is idle.
    ///
    /// Active windows are not included: their expiry triggers follow-up
    /// transitions, so the ability state machine ticks them itself.
    pub fn tick_cooldowns(&mut self, dt: f32) {
        self.charge_cooldown.tick(dt);
        self.dash_cooldown.tick(dt);
        self.platform_cooldown.tick(dt);
        self.slow_time_cooldown.tick(dt);
        self.vine_cooldown.tick(dt);
        self.impulse_cooldown.tick(dt);
    }

    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, id: TimerId) -> &AbilityTimer {
        match id {
            TimerId::ChargeActive => &self.charge_active,
            TimerId::ChargeFatigue => &self.charge_fatigue,
            TimerId::ChargeCooldown => &self.charge_cooldown,
            TimerId::DashActive => &self.dash_active,
            TimerId::DashCooldown => &self.dash_cooldown,
            TimerId::Levitate => &self.levitate,
            TimerId::PlatformCooldown => &self.platform_cooldown,
            TimerId::SlowTimeActive => &self.slow_time_active,
            TimerId::SlowTimeCooldown => &self.slow_time_cooldown,
            TimerId::VineCooldown => &self.vine_cooldown,
            TimerId::VineGrace => &self.vine_grace,
            TimerId::ImpulseActive => &self.impulse_active,
            TimerId::ImpulseCooldown => &self.impulse_cooldown,
        }
    }
}
