//! Weapon families and their capabilities
//!
//! A weapon is one item with several independent capabilities: it can be
//! fired (`RangedFireable`), swung (`MeleeUsable`) and, for some families,
//! switched (`Switchable`). Callers ask `Weapon` for the capability they need.
//!
//! Every `can_*` query is `why_cannot_*().is_none()`, so the boolean and the
//! explanation walk the same branches in the same order.

pub mod bow;
pub mod common;
pub mod energy;
pub mod magazine;
pub mod melee;
pub mod musket;
pub mod persistence;
pub mod revolver;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::combat::env::FireEnv;
use crate::combat::resolution::{FireOutcome, ShotRequest};
use crate::core::error::Result;
use crate::core::types::{ActorId, ItemId, TaskId, Tick};
use crate::world::body::Wound;
use crate::world::inventory::Feasibility;
use crate::world::items::ItemArena;

pub use bow::Bow;
pub use common::{WeaponCore, WeaponProfile};
pub use energy::EnergyWeapon;
pub use magazine::{Feed, MagazineWeapon};
pub use melee::MeleeProfile;
pub use musket::{LoadStage, Musket, MusketStep};
pub use revolver::{Chamber, Revolver};

/// Why an action cannot be taken right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Refusal {
    Incapacitated,
    NotWielded,
    Busy,
    SafetyOn,
    AlreadySafe,
    AlreadyUnsafe,
    NotReadied,
    AlreadyReadied,
    NotLoaded,
    AlreadyLoaded,
    Full,
    NothingToUnload,
    IncompatibleAmmunition,
    NeedsFreeHand,
    TooTired,
    Jammed,
    NotJammed,
    CylinderClosed,
    CylinderOpen,
    AlreadyOpen,
    AlreadyClosed,
    NoPower,
    WrongStage,
    NoBayonet,
    BayonetFitted,
    MissingItems,
    NotEnoughHands,
    NotEnoughWielders,
}

impl Refusal {
    /// Map a failed plan onto the refusal the actor sees
    pub fn from_feasibility(feasibility: Feasibility) -> Option<Refusal> {
        match feasibility {
            Feasibility::Feasible => None,
            Feasibility::NotFeasibleMissingItems => Some(Refusal::MissingItems),
            Feasibility::NotFeasibleNotEnoughHands => Some(Refusal::NotEnoughHands),
            Feasibility::NotFeasibleNotEnoughWielders => Some(Refusal::NotEnoughWielders),
        }
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Refusal::Incapacitated => "you are in no state to do that",
            Refusal::NotWielded => "you are not holding that weapon",
            Refusal::Busy => "you are busy with something else",
            Refusal::SafetyOn => "the safety is on",
            Refusal::AlreadySafe => "the safety is already on",
            Refusal::AlreadyUnsafe => "the safety is already off",
            Refusal::NotReadied => "the weapon is not readied",
            Refusal::AlreadyReadied => "the weapon is already readied",
            Refusal::NotLoaded => "the weapon is not loaded",
            Refusal::AlreadyLoaded => "the weapon is already loaded",
            Refusal::Full => "there is no room for more ammunition",
            Refusal::NothingToUnload => "there is nothing to unload",
            Refusal::IncompatibleAmmunition => "that ammunition does not fit",
            Refusal::NeedsFreeHand => "you need a free hand",
            Refusal::TooTired => "you are too tired",
            Refusal::Jammed => "the weapon is jammed",
            Refusal::NotJammed => "the weapon is not jammed",
            Refusal::CylinderClosed => "the cylinder is closed",
            Refusal::CylinderOpen => "the cylinder is open",
            Refusal::AlreadyOpen => "the cylinder is already open",
            Refusal::AlreadyClosed => "the cylinder is already closed",
            Refusal::NoPower => "the power pack is drained",
            Refusal::WrongStage => "that step does not come next",
            Refusal::NoBayonet => "there is no bayonet fitted",
            Refusal::BayonetFitted => "a bayonet is already fitted",
            Refusal::MissingItems => "you do not have what you need",
            Refusal::NotEnoughHands => "you do not have enough free hands",
            Refusal::NotEnoughWielders => "there is nobody able to do that",
        };
        write!(f, "{}", text)
    }
}

/// Result of a load, unload, ready, unready or switch action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Done,
    /// A timed continuation was scheduled
    Started { task: TaskId, completes_at: Tick },
    Refused(Refusal),
}

/// Result of pulling the trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FireReport {
    Fired(FireOutcome),
    /// Readied with nothing loaded
    NothingLoaded,
    /// The revolver's current chamber held no live round
    EmptyChamber { chamber: usize },
    Misfire { jammed: bool },
    /// The barrel burst; wounds dealt to the wielder and the weapon
    Catastrophe { wounds: Vec<Wound> },
    Refused(Refusal),
}

impl FireReport {
    pub fn outcome(&self) -> Option<&FireOutcome> {
        match self {
            FireReport::Fired(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Load, ready and fire
pub trait RangedFireable {
    fn core(&self) -> &WeaponCore;

    fn is_readied(&self) -> bool {
        self.core().readied
    }

    /// Whether anything is loaded that a trigger pull could discharge
    fn is_loaded(&self, items: &ItemArena) -> bool;

    /// `ammo` names the item to load; `None` lets the planner pick
    fn why_cannot_load(&self, env: &FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Option<Refusal>;

    fn can_load(&self, env: &FireEnv, actor: ActorId, ammo: Option<ItemId>) -> bool {
        self.why_cannot_load(env, actor, ammo).is_none()
    }

    fn load(&mut self, env: &mut FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Result<ActionOutcome>;

    fn why_cannot_unload(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal>;

    fn can_unload(&self, env: &FireEnv, actor: ActorId) -> bool {
        self.why_cannot_unload(env, actor).is_none()
    }

    fn unload(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome>;

    fn why_cannot_ready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal>;

    fn can_ready(&self, env: &FireEnv, actor: ActorId) -> bool {
        self.why_cannot_ready(env, actor).is_none()
    }

    fn ready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome>;

    fn why_cannot_unready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal>;

    fn can_unready(&self, env: &FireEnv, actor: ActorId) -> bool {
        self.why_cannot_unready(env, actor).is_none()
    }

    fn unready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome>;

    fn why_cannot_fire(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal>;

    /// Ready to fire: `fire` may only be called when this holds
    fn ready_to_fire(&self, env: &FireEnv, actor: ActorId) -> bool {
        self.why_cannot_fire(env, actor).is_none()
    }

    /// Pull the trigger. Calling this when not ready to fire is a
    /// programming error and returns `ArmsError::Invariant`.
    fn fire(&mut self, env: &mut FireEnv, request: &ShotRequest) -> Result<FireReport>;
}

/// A safety catch
pub trait Switchable {
    fn safety_engaged(&self) -> bool;

    fn why_cannot_switch(&self, env: &FireEnv, actor: ActorId, engage: bool) -> Option<Refusal>;

    fn can_switch(&self, env: &FireEnv, actor: ActorId, engage: bool) -> bool {
        self.why_cannot_switch(env, actor, engage).is_none()
    }

    fn switch(&mut self, env: &mut FireEnv, actor: ActorId, engage: bool) -> Result<ActionOutcome>;
}

/// Something that must be opened to be loaded and closed to be fired
pub trait Lockable {
    fn is_open(&self) -> bool;

    fn why_cannot_open(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal>;

    fn can_open(&self, env: &FireEnv, actor: ActorId) -> bool {
        self.why_cannot_open(env, actor).is_none()
    }

    fn open(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome>;

    fn why_cannot_close(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal>;

    fn can_close(&self, env: &FireEnv, actor: ActorId) -> bool {
        self.why_cannot_close(env, actor).is_none()
    }

    fn close(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome>;
}

/// Striking with the weapon in hand-to-hand
pub trait MeleeUsable {
    fn melee_profile(&self, items: &ItemArena) -> MeleeProfile;
}

#[derive(Debug, Clone)]
pub enum Weapon {
    Bow(Bow),
    Magazine(MagazineWeapon),
    Revolver(Revolver),
    Energy(EnergyWeapon),
    Musket(Musket),
}

impl Weapon {
    pub fn id(&self) -> ItemId {
        self.as_ranged().core().id
    }

    pub fn family(&self) -> &'static str {
        match self {
            Weapon::Bow(_) => "bow",
            Weapon::Magazine(_) => "magazine",
            Weapon::Revolver(_) => "revolver",
            Weapon::Energy(_) => "energy",
            Weapon::Musket(_) => "musket",
        }
    }

    pub fn as_ranged(&self) -> &dyn RangedFireable {
        match self {
            Weapon::Bow(w) => w,
            Weapon::Magazine(w) => w,
            Weapon::Revolver(w) => w,
            Weapon::Energy(w) => w,
            Weapon::Musket(w) => w,
        }
    }

    pub fn as_ranged_mut(&mut self) -> &mut dyn RangedFireable {
        match self {
            Weapon::Bow(w) => w,
            Weapon::Magazine(w) => w,
            Weapon::Revolver(w) => w,
            Weapon::Energy(w) => w,
            Weapon::Musket(w) => w,
        }
    }

    pub fn as_switchable(&self) -> Option<&dyn Switchable> {
        match self {
            Weapon::Magazine(w) => Some(w),
            Weapon::Energy(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_switchable_mut(&mut self) -> Option<&mut dyn Switchable> {
        match self {
            Weapon::Magazine(w) => Some(w),
            Weapon::Energy(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_lockable(&self) -> Option<&dyn Lockable> {
        match self {
            Weapon::Revolver(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_lockable_mut(&mut self) -> Option<&mut dyn Lockable> {
        match self {
            Weapon::Revolver(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_melee(&self) -> &dyn MeleeUsable {
        match self {
            Weapon::Bow(w) => w,
            Weapon::Magazine(w) => w,
            Weapon::Revolver(w) => w,
            Weapon::Energy(w) => w,
            Weapon::Musket(w) => w,
        }
    }

    /// A scheduled continuation for this weapon was voided
    pub fn task_voided(&mut self, task: TaskId) {
        match self {
            Weapon::Bow(w) => w.task_voided(task),
            Weapon::Musket(w) => w.task_voided(task),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feasibility_maps_to_refusals() {
        assert_eq!(Refusal::from_feasibility(Feasibility::Feasible), None);
        assert_eq!(
            Refusal::from_feasibility(Feasibility::NotFeasibleNotEnoughHands),
            Some(Refusal::NotEnoughHands)
        );
        assert_eq!(
            Refusal::from_feasibility(Feasibility::NotFeasibleMissingItems),
            Some(Refusal::MissingItems)
        );
    }

    #[test]
    fn test_refusals_have_messages() {
        assert_eq!(Refusal::SafetyOn.to_string(), "the safety is on");
        assert_eq!(Refusal::NotLoaded.to_string(), "the weapon is not loaded");
    }

    #[test]
    fn test_fire_report_outcome_only_when_fired() {
        assert!(FireReport::NothingLoaded.outcome().is_none());
        assert!(FireReport::Misfire { jammed: true }.outcome().is_none());
    }
}
