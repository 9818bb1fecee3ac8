//! AI player generation and per-tick behavior derivation.
//!
//! Players are generated once at match creation from the room's seeded rng
//! and never mutated afterwards; behavior is ephemeral scratch state derived
//! each pass.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Sprint,
    PowerShot,
    IronWall,
    SecondWind,
    CurveBall,
    Intercept,
}

pub const ABILITY_POOL: [Ability; 6] = [
    Ability::Sprint,
    Ability::PowerShot,
    Ability::IronWall,
    Ability::SecondWind,
    Ability::CurveBall,
    Ability::Intercept,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Aggressive,
    Balanced,
    Defensive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Stats {
    pub speed: f64,
    pub power: f64,
    pub defense: f64,
    pub stamina: f64,
}

impl Stats {
    pub fn total(&self) -> f64 {
        self.speed + self.power + self.defense + self.stamina
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPlayer {
    pub id: u32,
    pub name: String,
    /// 1-3 distinct abilities from the fixed pool
    pub abilities: Vec<Ability>,
    pub stats: Stats,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Shoot,
    Pass,
    Advance,
    Defend,
}

/// Scratch output of one behavior pass; never stored on the player.
#[derive(Debug, Clone, Copy)]
pub struct Behavior {
    pub action: PlayerAction,
    /// Index of the teammate targeted by a pass, if any
    pub target: Option<usize>,
    pub priority: f64,
}

const FIRST_NAMES: [&str; 10] = [
    "Axel", "Brio", "Cova", "Dex", "Enzo", "Falk", "Gio", "Hale", "Iris", "Jett",
];
const LAST_NAMES: [&str; 10] = [
    "Vance", "Okafor", "Silva", "Reiner", "Tanaka", "Moss", "Kade", "Arlo", "Petrov", "Quinn",
];

fn random_stat(rng: &mut ChaCha8Rng) -> f64 {
    rng.gen_range(5.0..15.0)
}

fn generate_player(rng: &mut ChaCha8Rng, id: u32) -> AiPlayer {
    let name = format!(
        "{} {}",
        FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())],
        LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())]
    );

    let ability_count = rng.gen_range(1..=3);
    let mut pool = ABILITY_POOL.to_vec();
    pool.shuffle(rng);
    pool.truncate(ability_count);

    let strategy = match rng.gen_range(0..3) {
        0 => Strategy::Aggressive,
        1 => Strategy::Balanced,
        _ => Strategy::Defensive,
    };

    AiPlayer {
        id,
        name,
        abilities: pool,
        stats: Stats {
            speed: random_stat(rng),
            power: random_stat(rng),
            defense: random_stat(rng),
            stamina: random_stat(rng),
        },
        strategy,
    }
}

/// Generate one team. Player ids are namespaced by team so the two squads
/// never collide.
pub fn generate_squad(rng: &mut ChaCha8Rng, team: u8, size: usize) -> Vec<AiPlayer> {
    (0..size)
        .map(|i| generate_player(rng, (team as u32) * 100 + i as u32))
        .collect()
}

/// Mean defense across a squad; the resistance a shooter works against.
pub fn mean_defense(squad: &[AiPlayer]) -> f64 {
    if squad.is_empty() {
        return 0.0;
    }
    squad.iter().map(|p| p.stats.defense).sum::<f64>() / squad.len() as f64
}

/// Aggregate strength used for initial odds before any bets exist.
pub fn squad_strength(squad: &[AiPlayer]) -> f64 {
    squad.iter().map(|p| p.stats.total()).sum()
}

/// Derive what a player wants to do this pass from its stats and strategy.
pub fn derive_behavior(player: &AiPlayer, squad_size: usize, rng: &mut ChaCha8Rng) -> Behavior {
    let shoot_bias = match player.strategy {
        Strategy::Aggressive => 0.5,
        Strategy::Balanced => 0.3,
        Strategy::Defensive => 0.1,
    };

    let roll: f64 = rng.gen();
    let (action, target) = if roll < shoot_bias {
        (PlayerAction::Shoot, None)
    } else if roll < shoot_bias + 0.25 {
        (PlayerAction::Pass, Some(rng.gen_range(0..squad_size)))
    } else if roll < shoot_bias + 0.45 {
        (PlayerAction::Advance, None)
    } else {
        (PlayerAction::Defend, None)
    };

    let priority = match action {
        PlayerAction::Shoot => player.stats.power,
        PlayerAction::Pass | PlayerAction::Advance => player.stats.speed,
        PlayerAction::Defend => player.stats.defense,
    } / 15.0;

    Behavior {
        action,
        target,
        priority,
    }
}
