//! Shape Shift entry point
//!
//! Headless native runner: drives the simulation with a fixed-step
//! accumulator from a scripted input track and prints the final snapshot.
//!
//! Usage: `shape-shift [level.json] [seconds]`

use std::path::Path;

use shape_shift::consts::*;
use shape_shift::levels::LevelData;
use shape_shift::settings::Settings;
use shape_shift::sim::{GameEvent, GamePhase, GameState, TickInput, tick};

const SETTINGS_FILE: &str = "shape-shift-settings.json";
const DEFAULT_SECONDS: f32 = 20.0;
/// Host frame length, deliberately off the simulation rate
const FRAME_DT: f32 = 1.0 / 50.0;

/// Game instance holding all state
struct Game {
    state: GameState,
    settings: Settings,
    accumulator: f32,
    input: TickInput,
    effects_shown: usize,
}

impl Game {
    fn new(state: GameState, settings: Settings) -> Self {
        Self {
            state,
            settings,
            accumulator: 0.0,
            input: TickInput::default(),
            effects_shown: 0,
        }
    }

    /// Run simulation ticks
    fn update(&mut self, dt: f32) {
        let dt = dt.min(0.1);
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let input = self.input;
            tick(&mut self.state, &input, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;

            // Clear one-shot inputs after processing
            self.input.pause = false;
        }

        for event in self.state.drain_events() {
            match event {
                GameEvent::Effect { kind, pos } => {
                    if self.settings.effect_enabled(kind) {
                        self.effects_shown += 1;
                        log::trace!("Effect {:?} at {:?}", kind, pos);
                    }
                }
                GameEvent::LevelComplete(id) => {
                    if let Some(next) = id.next() {
                        self.state.enter_level(next);
                    }
                }
                other => log::debug!("{:?}", other),
            }
        }
    }

    /// Scripted player: run right, hop every second, charge through walls
    fn script(&mut self, frame: u32) {
        let mut held = vec!["KeyD"];
        if frame % 50 < 12 {
            held.push("Space");
        }
        if frame % 200 == 0 {
            held.push("KeyQ");
        }
        if self.state.phase == GamePhase::Riding || frame % 40 < 4 {
            held.push("KeyE");
        }
        self.input = TickInput {
            pause: self.input.pause,
            ..self.settings.key_bindings.input_for(held)
        };
    }
}

fn load_state(seed: u64, level_path: Option<&str>) -> GameState {
    let Some(path) = level_path else {
        return GameState::new(seed);
    };
    let data = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| LevelData::from_json(&json).map_err(|e| e.to_string()));
    match data {
        Ok(data) => GameState::with_level(seed, data),
        Err(e) => {
            log::warn!("Could not load level {}: {}", path, e);
            GameState::new(seed)
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Shape Shift (native) starting...");

    let args: Vec<String> = std::env::args().collect();
    let seconds = args
        .get(2)
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(DEFAULT_SECONDS);

    let settings = Settings::load(Path::new(SETTINGS_FILE));
    let state = load_state(0x5eed, args.get(1).map(String::as_str));
    let mut game = Game::new(state, settings);

    let frames = (seconds / FRAME_DT) as u32;
    for frame in 0..frames {
        game.script(frame);
        game.update(FRAME_DT);
        if game.state.phase == GamePhase::EncounterComplete {
            break;
        }
    }

    log::info!(
        "Stopped after {} ticks in {:?} ({} effects)",
        game.state.time_ticks,
        game.state.phase,
        game.effects_shown
    );
    match serde_json::to_string_pretty(&game.state.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(e) => log::warn!("Could not serialize snapshot: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
