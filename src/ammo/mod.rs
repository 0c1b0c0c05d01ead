//! Ammunition types and units
//!
//! An `AmmunitionType` is shared catalog data; an `AmmunitionUnit` is the
//! per-item state (which type, how well made, whether already fired).

pub mod catalog;

pub use catalog::AmmoCatalog;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::formula::{Formula, FormulaParams};
use crate::world::body::DamageKind;

/// Catalog key of an ammunition type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmmoTypeId(pub String);

impl From<&str> for AmmoTypeId {
    fn from(value: &str) -> Self {
        AmmoTypeId(value.to_string())
    }
}

impl std::fmt::Display for AmmoTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a projectile announces itself in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoCategory {
    Arcing,
    Laser,
    Subsonic,
    Supersonic,
}

impl EchoCategory {
    /// Flight template; `{ammo}` is the projectile
    pub fn flight_template(&self) -> &'static str {
        match self {
            EchoCategory::Arcing => "{ammo} arcs overhead.",
            EchoCategory::Laser => "A searing flash of light streaks past.",
            EchoCategory::Subsonic => "{ammo} whistles past.",
            EchoCategory::Supersonic => "{ammo} cracks past with a sharp whiz.",
        }
    }
}

/// Parameters every damage formula is evaluated with
pub const DAMAGE_PARAMS: [&str; 5] = ["quality", "degree", "range", "pointblank", "melee"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageProfile {
    pub kind: DamageKind,
    pub damage: Formula,
    pub pain: Formula,
    pub stun: Formula,
}

/// Inputs to the damage formulas for one shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotParams {
    pub quality: f32,
    /// Degree of the opposed outcome
    pub degree: f32,
    /// Distance in cells
    pub range: f32,
    pub pointblank: bool,
    pub melee: bool,
}

impl ShotParams {
    pub fn to_formula_params(&self) -> FormulaParams {
        FormulaParams::new()
            .with("quality", self.quality)
            .with("degree", self.degree)
            .with("range", self.range)
            .with_flag("pointblank", self.pointblank)
            .with_flag("melee", self.melee)
    }
}

/// Evaluated damage for one shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDamage {
    pub amount: f32,
    pub pain: f32,
    pub stun: f32,
    pub kind: DamageKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmunitionType {
    pub id: AmmoTypeId,
    pub name: String,
    pub damage: DamageProfile,
    pub echo: EchoCategory,
    /// Audible radius of the report, in cells
    #[serde(default)]
    pub loudness: u32,
    /// Chance (0..1) the projectile breaks when it strikes something
    pub break_on_hit: f64,
    /// Chance (0..1) the projectile breaks when it misses
    pub break_on_miss: f64,
    /// Weapon-family compatibility tags
    pub tags: Vec<String>,
    /// Name the unit takes once fired (the bullet of a cartridge)
    #[serde(default)]
    pub projectile: Option<String>,
    /// Name of the spent case left behind
    #[serde(default)]
    pub casing: Option<String>,
}

impl AmmunitionType {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Evaluate damage, pain and stun for one shot.
    ///
    /// Fails only when a formula is broken, never as a gameplay outcome.
    pub fn evaluate(&self, shot: &ShotParams) -> Result<ResolvedDamage> {
        let params = shot.to_formula_params();
        Ok(ResolvedDamage {
            amount: self.damage.damage.evaluate(&params)?.max(0.0),
            pain: self.damage.pain.evaluate(&params)?.max(0.0),
            stun: self.damage.stun.evaluate(&params)?.max(0.0),
            kind: self.damage.kind,
        })
    }

    pub fn fired_name(&self) -> &str {
        self.projectile.as_deref().unwrap_or(&self.name)
    }
}

/// One physical round, arrow, ball or cartridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmunitionUnit {
    pub type_id: AmmoTypeId,
    pub quality: f32,
    /// Set once the unit has been fired; a fired unit is never loaded again
    #[serde(default)]
    pub fired: bool,
}

impl AmmunitionUnit {
    pub fn new(type_id: &str, quality: f32) -> Self {
        Self {
            type_id: AmmoTypeId::from(type_id),
            quality,
            fired: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrow() -> AmmunitionType {
        AmmunitionType {
            id: "test-arrow".into(),
            name: "test arrow".to_string(),
            damage: DamageProfile {
                kind: DamageKind::Piercing,
                damage: Formula::parse("quality + degree * 2 - range").unwrap(),
                pain: Formula::parse("if pointblank then 4 else 2").unwrap(),
                stun: Formula::constant(0.0),
            },
            echo: EchoCategory::Arcing,
            loudness: 0,
            break_on_hit: 0.3,
            break_on_miss: 0.1,
            tags: vec!["arrow".to_string()],
            projectile: None,
            casing: None,
        }
    }

    #[test]
    fn test_evaluate_uses_all_params() {
        let shot = ShotParams {
            quality: 5.0,
            degree: 2.0,
            range: 1.0,
            pointblank: true,
            melee: false,
        };
        let dmg = arrow().evaluate(&shot).unwrap();
        assert_eq!(dmg.amount, 8.0);
        assert_eq!(dmg.pain, 4.0);
        assert_eq!(dmg.kind, DamageKind::Piercing);
    }

    #[test]
    fn test_negative_damage_clamped() {
        let shot = ShotParams {
            quality: 0.0,
            degree: 0.0,
            range: 9.0,
            pointblank: false,
            melee: false,
        };
        assert_eq!(arrow().evaluate(&shot).unwrap().amount, 0.0);
    }

    #[test]
    fn test_unknown_param_is_programming_error() {
        let mut broken = arrow();
        broken.damage.stun = Formula::parse("velocity * 2").unwrap();
        let shot = ShotParams {
            quality: 1.0,
            degree: 1.0,
            range: 1.0,
            pointblank: false,
            melee: false,
        };
        assert!(broken.evaluate(&shot).is_err());
    }

    #[test]
    fn test_fired_name_prefers_projectile() {
        let mut cartridge = arrow();
        assert_eq!(cartridge.fired_name(), "test arrow");
        cartridge.projectile = Some("bullet".to_string());
        assert_eq!(cartridge.fired_name(), "bullet");
    }
}
