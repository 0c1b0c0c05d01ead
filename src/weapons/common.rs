//! State and helpers shared by every weapon family

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combat::env::FireEnv;
use crate::combat::resolution::ShotAmmo;
use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, ItemId};
use crate::formula::Formula;
use crate::weapons::Refusal;
use crate::world::inventory::{ItemQuery, LoadTemplate};
use crate::world::items::{ItemKind, Location};

/// Static description of a weapon model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    pub name: String,
    /// Ammunition tags the weapon accepts
    pub ammo_tags: Vec<String>,
    /// Added to every shot's damage; same parameters as ammunition damage
    pub bonus: Formula,
    /// Report radius of the action itself, in cells
    pub loudness: u32,
    /// Build quality, 0-10
    pub quality: f32,
}

impl WeaponProfile {
    pub fn new(name: &str, ammo_tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            ammo_tags: ammo_tags.iter().map(|t| t.to_string()).collect(),
            bonus: Formula::constant(0.0),
            loudness: 0,
            quality: 5.0,
        }
    }

    pub fn with_bonus(mut self, bonus: Formula) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn with_loudness(mut self, loudness: u32) -> Self {
        self.loudness = loudness;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }
}

/// Flags every family carries
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponCore {
    pub id: ItemId,
    pub profile: WeaponProfile,
    /// Safety catch engaged; only switchable families ever set it
    pub safety: bool,
    pub readied: bool,
    /// Wear, 0 (ruined) to 1 (pristine)
    pub condition: f32,
}

impl WeaponCore {
    pub fn new(id: ItemId, profile: WeaponProfile) -> Self {
        Self {
            id,
            profile,
            safety: false,
            readied: false,
            condition: 1.0,
        }
    }

    /// Whether `actor` is able to use the weapon at all
    pub fn why_cannot_hold(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        let Some(wielder) = env.actors.get(actor) else {
            return Some(Refusal::NotEnoughWielders);
        };
        if wielder.incapacitated {
            return Some(Refusal::Incapacitated);
        }
        match env.items.get(self.id) {
            Some(item) if item.location == Location::Carried(actor) => None,
            _ => Some(Refusal::NotWielded),
        }
    }

    /// `why_cannot_hold`, plus no timed action already running
    pub fn why_cannot_handle(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.why_cannot_hold(env, actor).or_else(|| {
            env.scheduler
                .is_busy(actor)
                .then_some(Refusal::Busy)
        })
    }

    /// Who is holding the weapon, if anyone
    pub fn wielder(&self, env: &FireEnv) -> Option<ActorId> {
        match env.items.get(self.id)?.location {
            Location::Carried(actor) => Some(actor),
            _ => None,
        }
    }

    /// Plan for picking one compatible round out of the actor's pockets
    pub fn round_template(&self) -> LoadTemplate {
        LoadTemplate::new()
            .require("loaditem", ItemQuery::ammunition(&self.profile.ammo_tags))
            .hands(1)
    }

    /// Whether the actor can supply a round, either the one named or any
    pub fn why_cannot_take_round(
        &self,
        env: &FireEnv,
        actor: ActorId,
        ammo: Option<ItemId>,
    ) -> Option<Refusal> {
        let Some(id) = ammo else {
            return Refusal::from_feasibility(env.feasibility(actor, &self.round_template()));
        };
        let Some(item) = env.items.get(id) else {
            return Some(Refusal::MissingItems);
        };
        if item.location != Location::Carried(actor) {
            return Some(Refusal::MissingItems);
        }
        let query = ItemQuery::ammunition(&self.profile.ammo_tags);
        if !query.matches(item, env.catalog) {
            return Some(Refusal::IncompatibleAmmunition);
        }
        None
    }

    /// Take a single round for loading, splitting it off its stack
    pub fn take_round(
        &self,
        env: &mut FireEnv,
        actor: ActorId,
        ammo: Option<ItemId>,
    ) -> Result<ItemId> {
        match ammo {
            Some(id) => env.items.split_one(id),
            None => env.bind(actor, &self.round_template())?.require("loaditem"),
        }
    }

    /// The error returned when `fire` is called while not ready to fire
    pub fn not_ready(&self, refusal: Refusal) -> ArmsError {
        ArmsError::Invariant(format!(
            "fire called on {:?} while not ready: {}",
            self.id, refusal
        ))
    }
}

/// Set a round off: mark it fired, rename it to its projectile and spawn
/// its casing inside the weapon. The projectile leaves the weapon.
pub fn discharge(env: &mut FireEnv, round: ItemId, weapon: ItemId) -> Result<ShotAmmo> {
    let catalog = env.catalog;
    let unit = env.items.ammo(round)?.clone();
    if unit.fired {
        return Err(ArmsError::Invariant(format!(
            "{:?} was already fired",
            round
        )));
    }
    let ty = catalog.get(&unit.type_id)?;

    let waste = ty.casing.as_ref().map(|casing| {
        env.items.spawn(
            casing,
            ItemKind::Casing {
                from: ty.id.clone(),
            },
            Location::InWeapon(weapon),
        )
    });

    let item = env.items.require_mut(round)?;
    if let Some(projectile) = &ty.projectile {
        item.name = projectile.clone();
    }
    if let ItemKind::Ammunition(unit) = &mut item.kind {
        unit.fired = true;
    }
    env.items.detach(round, Location::Nowhere)?;
    debug!(?round, ?weapon, ?waste, "round discharged");

    Ok(ShotAmmo {
        type_id: unit.type_id,
        quality: unit.quality,
        item: Some(round),
        waste,
    })
}

/// Return a loaded item to the actor's hands
pub fn return_to(env: &mut FireEnv, item: ItemId, actor: ActorId) -> Result<()> {
    env.items.detach(item, Location::Carried(actor))
}
