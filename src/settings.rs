//! Game settings and preferences
//!
//! Key bindings and display toggles, persisted as JSON next to the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sim::state::EffectKind;
use crate::sim::tick::{Action, TickInput};

/// Keys bound to each action, as DOM-style key codes (`"KeyA"`, `"Space"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub move_left: Vec<String>,
    pub move_right: Vec<String>,
    pub jump_basic: Vec<String>,
    pub hero_jump: Vec<String>,
    pub ability_primary: Vec<String>,
    pub ability_secondary: Vec<String>,
    pub form1: Vec<String>,
    pub form2: Vec<String>,
    pub form3: Vec<String>,
    pub form4: Vec<String>,
    /// Single jump binding from before the split into basic and hero jump
    #[serde(skip_serializing)]
    jump: Option<Vec<String>>,
}

fn keys(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            move_left: keys(&["KeyA", "ArrowLeft"]),
            move_right: keys(&["KeyD", "ArrowRight"]),
            jump_basic: keys(&["KeyW", "ArrowUp"]),
            hero_jump: keys(&["Space"]),
            ability_primary: keys(&["KeyE"]),
            ability_secondary: keys(&["KeyQ"]),
            form1: keys(&["Digit1"]),
            form2: keys(&["Digit2"]),
            form3: keys(&["Digit3"]),
            form4: keys(&["Digit4"]),
            jump: None,
        }
    }
}

impl KeyBindings {
    pub fn keys(&self, action: Action) -> &[String] {
        match action {
            Action::MoveLeft => &self.move_left,
            Action::MoveRight => &self.move_right,
            Action::JumpBasic => &self.jump_basic,
            Action::HeroJump => &self.hero_jump,
            Action::AbilityPrimary => &self.ability_primary,
            Action::AbilitySecondary => &self.ability_secondary,
            Action::Form1 => &self.form1,
            Action::Form2 => &self.form2,
            Action::Form3 => &self.form3,
            Action::Form4 => &self.form4,
        }
    }

    fn keys_mut(&mut self, action: Action) -> &mut Vec<String> {
        match action {
            Action::MoveLeft => &mut self.move_left,
            Action::MoveRight => &mut self.move_right,
            Action::JumpBasic => &mut self.jump_basic,
            Action::HeroJump => &mut self.hero_jump,
            Action::AbilityPrimary => &mut self.ability_primary,
            Action::AbilitySecondary => &mut self.ability_secondary,
            Action::Form1 => &mut self.form1,
            Action::Form2 => &mut self.form2,
            Action::Form3 => &mut self.form3,
            Action::Form4 => &mut self.form4,
        }
    }

    /// Bind `key` to `action` only, removing it from any other action
    pub fn rebind(&mut self, action: Action, key: &str) {
        for other in Action::ALL {
            self.keys_mut(other).retain(|k| k != key);
        }
        self.keys_mut(action).push(key.to_string());
    }

    /// Every action `key` is bound to
    pub fn actions_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = Action> + 'a {
        Action::ALL
            .into_iter()
            .filter(move |&a| self.keys(a).iter().any(|k| k == key))
    }

    /// Build a tick input from the set of currently held keys
    pub fn input_for<'a>(&self, held: impl IntoIterator<Item = &'a str>) -> TickInput {
        let mut input = TickInput::default();
        for key in held {
            for action in self.actions_for(key) {
                input.set(action, true);
            }
        }
        input
    }

    /// Move a legacy `jump` binding onto both jump actions
    fn migrate(&mut self) {
        if let Some(jump) = self.jump.take() {
            log::info!("Migrating legacy jump binding {:?}", jump);
            self.jump_basic = jump.clone();
            self.hero_jump = jump;
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub key_bindings: KeyBindings,
    /// Draw the per-ability cooldown bars
    pub show_cooldown_hud: bool,
    /// Skip purely cosmetic effects (trails, sparkles)
    pub reduced_effects: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_bindings: KeyBindings::default(),
            show_cooldown_hud: true,
            reduced_effects: false,
        }
    }
}

impl Settings {
    /// Parse settings, falling back to defaults on malformed input
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Settings>(json) {
            Ok(mut settings) => {
                settings.key_bindings.migrate();
                settings
            }
            Err(e) => {
                log::warn!("Invalid settings ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Whether an effect request should reach the presentation layer
    pub fn effect_enabled(&self, kind: EffectKind) -> bool {
        if !self.reduced_effects {
            return true;
        }
        !matches!(
            kind,
            EffectKind::DashTrail | EffectKind::Sparkle | EffectKind::CartSpark | EffectKind::FormShift
        )
    }

    /// Load settings from a file, or defaults if it is missing or broken
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                log::info!("Loaded settings from {}", path.display());
                Self::from_json(&json)
            }
            Err(e) => {
                log::info!("Using default settings ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) {
        let result = self
            .to_json()
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(path, json));
        match result {
            Ok(()) => log::info!("Settings saved"),
            Err(e) => log::warn!("Could not save settings to {}: {}", path.display(), e),
        }
    }
}
