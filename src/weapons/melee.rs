//! Striking with a ranged weapon
//!
//! Melee is categorical: a weapon has an Edge, a Mass and a Reach, and the
//! melee layer resolves exchanges from those categories. Firearms and bows
//! only need to say what they fight as.

use serde::{Deserialize, Serialize};

/// Sharpness category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Razor,
    Sharp,
    /// Stocks, butts, grips and limbs
    Blunt,
}

/// Weight category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mass {
    /// Pistols, bows (<1.5kg)
    Light,
    /// Carbines, energy rifles
    Medium,
    /// Long muskets
    Heavy,
}

/// Distance category, determines strike order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reach {
    Grapple,
    Short,
    Medium,
    /// A musket with its bayonet fixed
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponSpecial {
    Piercing,
    TwoHanded,
    /// Not built for it; the weapon may be damaged by hard use
    Improvised,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeleeProfile {
    pub edge: Edge,
    pub mass: Mass,
    pub reach: Reach,
    pub special: Vec<WeaponSpecial>,
}

impl MeleeProfile {
    pub fn has_special(&self, special: WeaponSpecial) -> bool {
        self.special.contains(&special)
    }

    /// Musket with a bayonet fixed: fights as a spear
    pub fn bayonet_spear() -> Self {
        Self {
            edge: Edge::Sharp,
            mass: Mass::Heavy,
            reach: Reach::Long,
            special: vec![WeaponSpecial::Piercing, WeaponSpecial::TwoHanded],
        }
    }

    /// Musket swung by the barrel
    pub fn musket_club() -> Self {
        Self {
            edge: Edge::Blunt,
            mass: Mass::Heavy,
            reach: Reach::Medium,
            special: vec![WeaponSpecial::TwoHanded, WeaponSpecial::Improvised],
        }
    }

    /// Handgun or carbine used to strike
    pub fn pistol_whip(mass: Mass) -> Self {
        Self {
            edge: Edge::Blunt,
            mass,
            reach: Reach::Short,
            special: vec![WeaponSpecial::Improvised],
        }
    }

    /// Bows and energy weapons
    pub fn light_blunt() -> Self {
        Self {
            edge: Edge::Blunt,
            mass: Mass::Light,
            reach: Reach::Short,
            special: vec![WeaponSpecial::Improvised],
        }
    }
}

impl Default for MeleeProfile {
    fn default() -> Self {
        Self::light_blunt()
    }
}
