//! Body zones, damage and the wound oracle
//!
//! The firing engine hands `Damage` to a `DamageIntake` and only reads back
//! the wounds it produced. `BodyLedger` is the reference oracle.

use ahash::AHashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::core::rng;
use crate::core::types::{ActorId, ItemId, WoundId};

/// Wound severity categories (not f32)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WoundSeverity {
    /// No wound
    None,
    /// Cosmetic only
    Scratch,
    /// Painful but functional
    Minor,
    /// Impaired function, bleeding
    Serious,
    /// Disabled, severe bleeding
    Critical,
    /// Limb gone / organ destroyed
    Destroyed,
}

impl WoundSeverity {
    /// Severity of a hit after soak has been subtracted
    pub fn from_damage(amount: f32) -> Self {
        if amount <= 0.0 {
            WoundSeverity::None
        } else if amount < 3.0 {
            WoundSeverity::Scratch
        } else if amount < 8.0 {
            WoundSeverity::Minor
        } else if amount < 15.0 {
            WoundSeverity::Serious
        } else if amount < 25.0 {
            WoundSeverity::Critical
        } else {
            WoundSeverity::Destroyed
        }
    }
}

/// Body zones for hit location (11 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyZone {
    Head,
    Neck,
    /// Center mass, most hits land here
    Torso,
    ArmLeft,
    ArmRight,
    HandLeft,
    HandRight,
    LegLeft,
    LegRight,
    FootLeft,
    FootRight,
}

impl BodyZone {
    pub fn all() -> [BodyZone; 11] {
        [
            BodyZone::Head,
            BodyZone::Neck,
            BodyZone::Torso,
            BodyZone::ArmLeft,
            BodyZone::ArmRight,
            BodyZone::HandLeft,
            BodyZone::HandRight,
            BodyZone::LegLeft,
            BodyZone::LegRight,
            BodyZone::FootLeft,
            BodyZone::FootRight,
        ]
    }

    /// Relative probability of being hit when standing (sums to 1.0)
    pub fn hit_weight_standing(&self) -> f32 {
        match self {
            BodyZone::Torso => 0.35,
            BodyZone::ArmLeft | BodyZone::ArmRight => 0.10,
            BodyZone::LegLeft | BodyZone::LegRight => 0.12,
            BodyZone::Head => 0.08,
            BodyZone::Neck => 0.03,
            BodyZone::HandLeft | BodyZone::HandRight => 0.03,
            BodyZone::FootLeft | BodyZone::FootRight => 0.02,
        }
    }

    /// Pick a zone by standing hit weight
    pub fn random_weighted(rng: &mut dyn RngCore) -> BodyZone {
        let mut remaining = rng::unit(rng) as f32;
        for zone in BodyZone::all() {
            let weight = zone.hit_weight_standing();
            if remaining < weight {
                return zone;
            }
            remaining -= weight;
        }
        BodyZone::Torso
    }

    pub fn describe(&self) -> &'static str {
        match self {
            BodyZone::Head => "head",
            BodyZone::Neck => "neck",
            BodyZone::Torso => "torso",
            BodyZone::ArmLeft => "left arm",
            BodyZone::ArmRight => "right arm",
            BodyZone::HandLeft => "left hand",
            BodyZone::HandRight => "right hand",
            BodyZone::LegLeft => "left leg",
            BodyZone::LegRight => "right leg",
            BodyZone::FootLeft => "left foot",
            BodyZone::FootRight => "right foot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    Ballistic,
    Piercing,
    Energy,
    Shrapnel,
    Shockwave,
    Burning,
    Crushing,
}

impl DamageKind {
    /// Projectiles of this kind can remain embedded in a wound
    pub fn can_lodge(&self) -> bool {
        matches!(self, DamageKind::Ballistic | DamageKind::Piercing)
    }
}

/// Something that can take damage: a body or an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Actor(ActorId),
    Item(ItemId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Damage {
    pub amount: f32,
    pub pain: f32,
    pub stun: f32,
    pub kind: DamageKind,
    pub zone: Option<BodyZone>,
    /// Item that dealt the damage
    pub source: Option<ItemId>,
    /// Projectile that may stay in the wound
    pub lodgeable: Option<ItemId>,
}

impl Damage {
    pub fn new(amount: f32, kind: DamageKind) -> Self {
        Self {
            amount,
            pain: 0.0,
            stun: 0.0,
            kind,
            zone: None,
            source: None,
            lodgeable: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wound {
    pub id: WoundId,
    pub target: Target,
    pub zone: Option<BodyZone>,
    pub severity: WoundSeverity,
    pub kind: DamageKind,
    /// Projectile embedded in this wound
    pub lodged: Option<ItemId>,
}

/// Boundary to the wound system
pub trait DamageIntake {
    fn has_body(&self, target: Target) -> bool;

    /// Apply damage and return every wound it caused (possibly none)
    fn passive_damage(&mut self, target: Target, damage: &Damage) -> Vec<Wound>;
}

/// Accumulated pain and stun on one actor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyState {
    pub pain: f32,
    pub stun: f32,
}

/// Reference wound oracle: flat soak, severity bands, lodging rule
#[derive(Debug, Clone)]
pub struct BodyLedger {
    /// Subtracted from every hit on a body
    pub body_soak: f32,
    /// Subtracted from every hit on an item
    pub item_soak: f32,
    wounds: Vec<Wound>,
    states: AHashMap<ActorId, BodyState>,
    item_damage: AHashMap<ItemId, f32>,
    next_wound: u64,
}

impl Default for BodyLedger {
    fn default() -> Self {
        Self {
            body_soak: 1.0,
            item_soak: 4.0,
            wounds: Vec::new(),
            states: AHashMap::new(),
            item_damage: AHashMap::new(),
            next_wound: 0,
        }
    }
}

impl BodyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wounds(&self) -> &[Wound] {
        &self.wounds
    }

    pub fn wounds_of(&self, target: Target) -> Vec<&Wound> {
        self.wounds.iter().filter(|w| w.target == target).collect()
    }

    pub fn state(&self, actor: ActorId) -> BodyState {
        self.states.get(&actor).copied().unwrap_or_default()
    }

    pub fn item_damage(&self, item: ItemId) -> f32 {
        self.item_damage.get(&item).copied().unwrap_or(0.0)
    }

    fn record(&mut self, target: Target, zone: Option<BodyZone>, severity: WoundSeverity, damage: &Damage, lodged: Option<ItemId>) -> Wound {
        self.next_wound += 1;
        let wound = Wound {
            id: WoundId(self.next_wound),
            target,
            zone,
            severity,
            kind: damage.kind,
            lodged,
        };
        self.wounds.push(wound.clone());
        wound
    }
}

impl DamageIntake for BodyLedger {
    fn has_body(&self, target: Target) -> bool {
        matches!(target, Target::Actor(_))
    }

    fn passive_damage(&mut self, target: Target, damage: &Damage) -> Vec<Wound> {
        match target {
            Target::Actor(actor) => {
                let state = self.states.entry(actor).or_default();
                state.pain += damage.pain;
                state.stun += damage.stun;

                let severity = WoundSeverity::from_damage(damage.amount - self.body_soak);
                if severity == WoundSeverity::None {
                    return Vec::new();
                }
                // Through-and-through above Serious, bounced off below Minor
                let lodged = damage.lodgeable.filter(|_| {
                    damage.kind.can_lodge()
                        && matches!(severity, WoundSeverity::Minor | WoundSeverity::Serious)
                });
                let zone = Some(damage.zone.unwrap_or(BodyZone::Torso));
                vec![self.record(target, zone, severity, damage, lodged)]
            }
            Target::Item(item) => {
                let effective = damage.amount - self.item_soak;
                if effective <= 0.0 {
                    return Vec::new();
                }
                *self.item_damage.entry(item).or_insert(0.0) += effective;
                let severity = WoundSeverity::from_damage(effective);
                vec![self.record(target, None, severity, damage, None)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_hit_weights_sum_to_one() {
        let total: f32 = BodyZone::all()
            .iter()
            .map(|z| z.hit_weight_standing())
            .sum();
        assert!((total - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_random_zone_extremes() {
        assert_eq!(BodyZone::random_weighted(&mut StepRng::new(0, 0)), BodyZone::Head);
        let mut seeded = rng::seeded(5);
        let zones: Vec<BodyZone> = (0..200)
            .map(|_| BodyZone::random_weighted(&mut seeded))
            .collect();
        assert!(zones.contains(&BodyZone::Torso));
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(WoundSeverity::from_damage(0.0), WoundSeverity::None);
        assert_eq!(WoundSeverity::from_damage(2.0), WoundSeverity::Scratch);
        assert_eq!(WoundSeverity::from_damage(5.0), WoundSeverity::Minor);
        assert_eq!(WoundSeverity::from_damage(10.0), WoundSeverity::Serious);
        assert_eq!(WoundSeverity::from_damage(30.0), WoundSeverity::Destroyed);
    }

    #[test]
    fn test_piercing_minor_wound_lodges() {
        let mut ledger = BodyLedger::new();
        let mut damage = Damage::new(6.0, DamageKind::Piercing);
        damage.lodgeable = Some(ItemId(7));
        damage.zone = Some(BodyZone::ArmLeft);
        let wounds = ledger.passive_damage(Target::Actor(ActorId(1)), &damage);
        assert_eq!(wounds.len(), 1);
        assert_eq!(wounds[0].lodged, Some(ItemId(7)));
        assert_eq!(wounds[0].zone, Some(BodyZone::ArmLeft));
    }

    #[test]
    fn test_critical_wound_passes_through() {
        let mut ledger = BodyLedger::new();
        let mut damage = Damage::new(20.0, DamageKind::Ballistic);
        damage.lodgeable = Some(ItemId(7));
        let wounds = ledger.passive_damage(Target::Actor(ActorId(1)), &damage);
        assert_eq!(wounds[0].severity, WoundSeverity::Critical);
        assert_eq!(wounds[0].lodged, None);
    }

    #[test]
    fn test_energy_never_lodges() {
        let mut ledger = BodyLedger::new();
        let mut damage = Damage::new(6.0, DamageKind::Energy);
        damage.lodgeable = Some(ItemId(7));
        let wounds = ledger.passive_damage(Target::Actor(ActorId(1)), &damage);
        assert_eq!(wounds[0].lodged, None);
    }

    #[test]
    fn test_soaked_hit_leaves_no_wound_but_hurts() {
        let mut ledger = BodyLedger::new();
        let mut damage = Damage::new(0.5, DamageKind::Crushing);
        damage.pain = 2.0;
        let actor = ActorId(1);
        assert!(ledger.passive_damage(Target::Actor(actor), &damage).is_empty());
        assert_eq!(ledger.state(actor).pain, 2.0);
    }

    #[test]
    fn test_item_damage_accumulates() {
        let mut ledger = BodyLedger::new();
        let shield = Target::Item(ItemId(3));
        assert!(ledger.passive_damage(shield, &Damage::new(3.0, DamageKind::Piercing)).is_empty());
        assert_eq!(ledger.passive_damage(shield, &Damage::new(10.0, DamageKind::Piercing)).len(), 1);
        assert_eq!(ledger.item_damage(ItemId(3)), 6.0);
        assert!(!ledger.has_body(shield));
    }
}
