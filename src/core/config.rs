//! Firing configuration with documented constants
//!
//! All tunable numbers for loading, firing and failure live here. The shipped
//! defaults match `data/firing.toml`; a TOML file may override any subset.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::combat::outcome::Difficulty;
use crate::core::error::{ArmsError, Result};
use crate::core::types::Tick;
use crate::formula::Formula;
use crate::weapons::musket::failure::FAILURE_PARAMS;
use crate::world::spatial::Precipitation;

/// Configuration for the firing systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiringConfig {
    /// Ticks during which dropped projectiles and fragments cannot be picked up
    ///
    /// Keeps a shooter from instantly recovering the arrow they just loosed.
    pub pickup_grace_ticks: Tick,

    /// Ticks before a projectile fragment decays out of the world
    pub fragment_decay_ticks: Tick,

    /// Notice difficulty for bystanders seeing a projectile that was not aimed
    pub flight_notice_difficulty: Difficulty,

    pub bow: BowConfig,
    pub musket: MusketConfig,
    pub energy: EnergyConfig,
    pub sound: SoundConfig,
}

impl Default for FiringConfig {
    fn default() -> Self {
        Self {
            pickup_grace_ticks: 10,
            fragment_decay_ticks: 600,
            flight_notice_difficulty: Difficulty::Hard,
            bow: BowConfig::default(),
            musket: MusketConfig::default(),
            energy: EnergyConfig::default(),
            sound: SoundConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BowConfig {
    /// Ticks to draw the string to full tension
    pub draw_ticks: Tick,
    /// Stamina spent per draw
    pub draw_stamina: f32,
    /// Free limbs needed besides the one holding the bow
    pub free_limbs_required: u8,
}

impl Default for BowConfig {
    fn default() -> Self {
        Self {
            draw_ticks: 3,
            draw_stamina: 5.0,
            free_limbs_required: 1,
        }
    }
}

/// Fixed explosive profile of a burst barrel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplosionProfile {
    pub shrapnel: f32,
    pub shockwave: f32,
    pub burning: f32,
}

impl Default for ExplosionProfile {
    fn default() -> Self {
        Self {
            shrapnel: 12.0,
            shockwave: 8.0,
            burning: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusketConfig {
    pub clean_ticks: Tick,
    pub powder_ticks: Tick,
    pub ball_ticks: Tick,
    pub cartridge_ticks: Tick,
    pub ram_ticks: Tick,
    pub tap_ticks: Tick,
    pub unjam_ticks: Tick,

    /// Difficulty of the operate check that scales every loading step
    pub operate_difficulty: Difficulty,

    /// Loading powder outdoors at or above this precipitation wets it
    pub wetting_precipitation: Precipitation,

    /// Chance (0..1) that a loaded charge fails to fire
    pub misfire_chance: Formula,

    /// Chance (0..1) that a misfire also fouls the mechanism
    pub jam_chance: Formula,

    pub catastrophe: ExplosionProfile,
}

/// Shipped misfire formula over [`FAILURE_PARAMS`]
pub const DEFAULT_MISFIRE_CHANCE: &str = "clamp(0.08 + skipped_cleaning * 0.15 + precipitation * 0.04 \
     + wet_powder * 0.5 + tap_loaded * 0.1 - wadding * 0.02 \
     - skill * 0.0005 - quality * 0.004 + (1 - condition) * 0.2 \
     - cartridge * cartridge_quality * 0.003, 0, 1)";

/// Shipped jam formula over [`FAILURE_PARAMS`]
pub const DEFAULT_JAM_CHANCE: &str = "clamp(0.1 + skipped_cleaning * 0.25 + wet_powder * 0.2 \
     + tap_loaded * 0.15 + (1 - condition) * 0.3 - quality * 0.01, 0, 1)";

impl Default for MusketConfig {
    fn default() -> Self {
        Self {
            clean_ticks: 20,
            powder_ticks: 10,
            ball_ticks: 10,
            cartridge_ticks: 12,
            ram_ticks: 15,
            tap_ticks: 4,
            unjam_ticks: 30,
            operate_difficulty: Difficulty::Normal,
            wetting_precipitation: Precipitation::Heavy,
            misfire_chance: Formula::builtin(DEFAULT_MISFIRE_CHANCE),
            jam_chance: Formula::builtin(DEFAULT_JAM_CHANCE),
            catastrophe: ExplosionProfile::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Ticks between recharge steps of a charging power pack
    pub recharge_interval_ticks: Tick,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            recharge_interval_ticks: 10,
        }
    }
}

/// How a report is described by distance, as fractions of its audible radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub near_fraction: f32,
    pub far_fraction: f32,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            near_fraction: 0.34,
            far_fraction: 0.67,
        }
    }
}

impl FiringConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FiringConfig = toml::from_str(content)?;
        config.validate().map_err(ArmsError::Config)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.sound.near_fraction <= 0.0
            || self.sound.near_fraction >= self.sound.far_fraction
            || self.sound.far_fraction > 1.0
        {
            return Err(format!(
                "sound fractions must satisfy 0 < near ({}) < far ({}) <= 1",
                self.sound.near_fraction, self.sound.far_fraction
            ));
        }

        if self.bow.draw_stamina < 0.0 {
            return Err("bow.draw_stamina must not be negative".into());
        }

        if self.energy.recharge_interval_ticks == 0 {
            return Err("energy.recharge_interval_ticks must be positive".into());
        }

        let musket = &self.musket;
        let durations = [
            ("clean_ticks", musket.clean_ticks),
            ("powder_ticks", musket.powder_ticks),
            ("ball_ticks", musket.ball_ticks),
            ("cartridge_ticks", musket.cartridge_ticks),
            ("ram_ticks", musket.ram_ticks),
            ("tap_ticks", musket.tap_ticks),
            ("unjam_ticks", musket.unjam_ticks),
        ];
        for (name, ticks) in durations {
            if ticks == 0 {
                return Err(format!("musket.{} must be positive", name));
            }
        }
        if musket.tap_ticks > musket.ram_ticks {
            return Err(format!(
                "musket.tap_ticks ({}) should not exceed musket.ram_ticks ({})",
                musket.tap_ticks, musket.ram_ticks
            ));
        }

        for formula in [&musket.misfire_chance, &musket.jam_chance] {
            formula
                .check_params(&FAILURE_PARAMS)
                .map_err(|e| e.to_string())?;
        }

        let blast = &musket.catastrophe;
        if blast.shrapnel < 0.0 || blast.shockwave < 0.0 || blast.burning < 0.0 {
            return Err("musket.catastrophe damage must not be negative".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FiringConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builtin_failure_formulas_parse() {
        let musket = MusketConfig::default();
        for (source, formula) in [
            (DEFAULT_MISFIRE_CHANCE, &musket.misfire_chance),
            (DEFAULT_JAM_CHANCE, &musket.jam_chance),
        ] {
            let parsed = Formula::parse(source).unwrap();
            assert_eq!(formula, &parsed);
            assert!(parsed.check_params(&FAILURE_PARAMS).is_ok());
        }

        let mut params = crate::formula::FormulaParams::new().with("condition", 1.0);
        for name in FAILURE_PARAMS {
            if params.get(name).is_none() {
                params.set(name, 0.0);
            }
        }
        let rammed = musket.misfire_chance.evaluate(&params).unwrap();
        params.set("tap_loaded", 1.0);
        let tapped = musket.misfire_chance.evaluate(&params).unwrap();
        assert!(rammed > 0.0);
        assert!(tapped > rammed);
    }

    #[test]
    fn test_shipped_toml_matches_defaults() {
        let shipped = FiringConfig::from_toml_str(include_str!("../../data/firing.toml")).unwrap();
        assert_eq!(shipped, FiringConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FiringConfig::from_toml_str("pickup_grace_ticks = 3\n[bow]\ndraw_ticks = 7\n")
            .unwrap();
        assert_eq!(config.pickup_grace_ticks, 3);
        assert_eq!(config.bow.draw_ticks, 7);
        assert_eq!(config.bow.draw_stamina, BowConfig::default().draw_stamina);
    }

    #[test]
    fn test_rejects_unknown_formula_params() {
        let result = FiringConfig::from_toml_str("[musket]\njam_chance = \"mystery * 2\"\n");
        assert!(matches!(result, Err(ArmsError::Config(_))));
    }

    #[test]
    fn test_rejects_inverted_sound_fractions() {
        let mut config = FiringConfig::default();
        config.sound.near_fraction = 0.8;
        config.sound.far_fraction = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_durations() {
        let mut config = FiringConfig::default();
        config.musket.ram_ticks = 0;
        assert!(config.validate().is_err());
    }
}
