//! Cylinder revolvers
//!
//! The cylinder has a fixed number of chambers. Chambers are loaded and
//! emptied with the cylinder open; the weapon only fires closed. Every
//! trigger pull advances the cylinder by one, whether or not the chamber
//! under the hammer held a live round.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::combat::env::FireEnv;
use crate::combat::propagation::{eject_casing, propagate_report};
use crate::combat::resolution::{resolve_shot, ShotRequest};
use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, ItemId};
use crate::weapons::common::{discharge, return_to, WeaponCore, WeaponProfile};
use crate::weapons::melee::{Mass, MeleeProfile};
use crate::weapons::{ActionOutcome, FireReport, Lockable, MeleeUsable, RangedFireable, Refusal};
use crate::world::items::ItemArena;
use crate::world::narrative::{Emote, EmoteStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chamber {
    Empty,
    Live(ItemId),
    /// Holds the spent case until the cylinder is emptied
    Spent(ItemId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Revolver {
    pub core: WeaponCore,
    chambers: Vec<Chamber>,
    current: usize,
    open: bool,
}

impl Revolver {
    pub fn new(id: ItemId, profile: WeaponProfile, chamber_count: usize) -> Result<Self> {
        Self::from_parts(
            WeaponCore::new(id, profile),
            vec![Chamber::Empty; chamber_count],
            0,
            false,
        )
    }

    pub fn six_shooter(id: ItemId) -> Result<Self> {
        Self::new(
            id,
            WeaponProfile::new("a six-shot revolver", &["pistol"]).with_loudness(4),
            6,
        )
    }

    /// Rebuild a revolver from stored state. An out-of-range current
    /// chamber is wrapped back into the cylinder.
    pub fn from_parts(
        core: WeaponCore,
        chambers: Vec<Chamber>,
        current: usize,
        open: bool,
    ) -> Result<Self> {
        if chambers.is_empty() {
            return Err(ArmsError::Invariant(format!(
                "revolver {:?} needs at least one chamber",
                core.id
            )));
        }
        let wrapped = current % chambers.len();
        if wrapped != current {
            warn!(id = ?core.id, current, "current chamber out of range, wrapped");
        }
        Ok(Self {
            core,
            chambers,
            current: wrapped,
            open,
        })
    }

    pub fn chambers(&self) -> &[Chamber] {
        &self.chambers
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn why_cannot_load_chamber(
        &self,
        env: &FireEnv,
        actor: ActorId,
        index: usize,
        ammo: Option<ItemId>,
    ) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if !self.open {
            return Some(Refusal::CylinderClosed);
        }
        match self.chambers.get(index) {
            Some(Chamber::Empty) => self.core.why_cannot_take_round(env, actor, ammo),
            _ => Some(Refusal::Full),
        }
    }

    /// Load one particular chamber
    pub fn load_chamber(
        &mut self,
        env: &mut FireEnv,
        actor: ActorId,
        index: usize,
        ammo: Option<ItemId>,
    ) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_load_chamber(env, actor, index, ammo) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let round = self.core.take_round(env, actor, ammo)?;
        env.items.attach(round, self.core.id)?;
        self.chambers[index] = Chamber::Live(round);
        debug!(weapon = ?self.core.id, index, ?round, "chamber loaded");
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} slides {ammo} into {weapon}.")
                .actor("actor", actor)
                .item("ammo", round)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn first_empty(&self) -> Option<usize> {
        self.chambers.iter().position(|c| *c == Chamber::Empty)
    }
}

impl Lockable for Revolver {
    fn is_open(&self) -> bool {
        self.open
    }

    fn why_cannot_open(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| self.open.then_some(Refusal::AlreadyOpen))
    }

    /// Swing the cylinder out. The hammer is let down.
    fn open(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_open(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.open = true;
        self.core.readied = false;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} swings out the cylinder of {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_close(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| (!self.open).then_some(Refusal::AlreadyClosed))
    }

    fn close(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_close(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.open = false;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} snaps the cylinder of {weapon} shut.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }
}

impl RangedFireable for Revolver {
    fn core(&self) -> &WeaponCore {
        &self.core
    }

    fn is_loaded(&self, _items: &ItemArena) -> bool {
        self.chambers.iter().any(|c| matches!(c, Chamber::Live(_)))
    }

    fn why_cannot_load(&self, env: &FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Option<Refusal> {
        let index = self.first_empty().unwrap_or(self.chambers.len());
        self.why_cannot_load_chamber(env, actor, index, ammo)
    }

    /// Load the first empty chamber
    fn load(&mut self, env: &mut FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Result<ActionOutcome> {
        let index = self.first_empty().unwrap_or(self.chambers.len());
        self.load_chamber(env, actor, index, ammo)
    }

    fn why_cannot_unload(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if !self.open {
            return Some(Refusal::CylinderClosed);
        }
        self.chambers
            .iter()
            .all(|c| *c == Chamber::Empty)
            .then_some(Refusal::NothingToUnload)
    }

    /// Live rounds go back to the actor; spent cases drop to the ground
    fn unload(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unload(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let at = env.actor_position(actor)?;
        for index in 0..self.chambers.len() {
            match self.chambers[index] {
                Chamber::Live(round) => return_to(env, round, actor)?,
                Chamber::Spent(casing) => eject_casing(env, casing, at)?,
                Chamber::Empty => {}
            }
            self.chambers[index] = Chamber::Empty;
        }
        env.emit_at(
            at,
            Emote::new("{actor} empties the cylinder of {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_ready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.open {
            return Some(Refusal::CylinderOpen);
        }
        self.core.readied.then_some(Refusal::AlreadyReadied)
    }

    /// Cock the hammer
    fn ready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_ready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.core.readied = true;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} thumbs back the hammer of {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_unready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| (!self.core.readied).then_some(Refusal::NotReadied))
    }

    fn unready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.core.readied = false;
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_fire(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.open {
            return Some(Refusal::CylinderOpen);
        }
        (!self.core.readied).then_some(Refusal::NotReadied)
    }

    /// Fire the chamber under the hammer. The hammer stays back (double
    /// action) and the cylinder turns by one regardless of the result.
    fn fire(&mut self, env: &mut FireEnv, request: &ShotRequest) -> Result<FireReport> {
        if let Some(refusal) = self.why_cannot_fire(env, request.actor) {
            return Err(self.core.not_ready(refusal));
        }
        let index = self.current;
        self.current = (self.current + 1) % self.chambers.len();
        let actor = request.actor;
        let at = env.actor_position(actor)?;

        let Chamber::Live(round) = self.chambers[index] else {
            env.emit_at(
                at,
                Emote::new("{actor} pulls the trigger of {weapon}. Click. No round.")
                    .actor("actor", actor)
                    .item("weapon", self.core.id)
                    .styled(EmoteStyle::Failure),
            );
            debug!(weapon = ?self.core.id, index, "empty chamber");
            return Ok(FireReport::EmptyChamber { chamber: index });
        };

        env.emit_at(
            at,
            Emote::new("{actor} fires {weapon}!")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        let shot = discharge(env, round, self.core.id)?;
        self.chambers[index] = match shot.waste {
            Some(casing) => Chamber::Spent(casing),
            None => Chamber::Empty,
        };
        let catalog = env.catalog;
        let loudness = catalog
            .get(&shot.type_id)?
            .loudness
            .max(self.core.profile.loudness);
        let outcome = resolve_shot(env, self.core.id, &self.core.profile, request, shot)?;
        propagate_report(env, at, loudness, "gunshot");
        Ok(FireReport::Fired(outcome))
    }
}

impl MeleeUsable for Revolver {
    fn melee_profile(&self, _items: &ItemArena) -> MeleeProfile {
        MeleeProfile::pistol_whip(Mass::Light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ammo::AmmunitionUnit;
    use crate::core::types::{CellId, Position};
    use crate::weapons::Weapon;
    use crate::world::items::{ItemKind, Location};
    use crate::world::World;

    fn gunslinger() -> (World, ActorId, ItemId) {
        let mut world = World::new(5);
        let actor = world.actors.spawn("Cass", Position::ground(CellId(2)));
        world.items.spawn_stack(
            "a pistol round",
            ItemKind::Ammunition(AmmunitionUnit::new("pistol-round", 5.0)),
            Location::Carried(actor),
            12,
        );
        let gun = world
            .spawn_weapon("a six-shot revolver", Location::Carried(actor), |id| {
                Ok(Weapon::Revolver(Revolver::six_shooter(id)?))
            })
            .unwrap();
        (world, actor, gun)
    }

    fn with_revolver<T>(world: &mut World, id: ItemId, f: impl FnOnce(&mut Revolver, &mut FireEnv) -> T) -> T {
        let (weapons, mut env) = world.split();
        match weapons.get_mut(&id) {
            Some(Weapon::Revolver(r)) => f(r, &mut env),
            _ => panic!("not a revolver"),
        }
    }

    #[test]
    fn test_zero_chambers_rejected() {
        let profile = WeaponProfile::new("a broken revolver", &["pistol"]);
        assert!(Revolver::new(ItemId(1), profile, 0).is_err());
    }

    #[test]
    fn test_from_parts_wraps_current() {
        let core = WeaponCore::new(ItemId(1), WeaponProfile::new("r", &["pistol"]));
        let r = Revolver::from_parts(core, vec![Chamber::Empty; 3], 7, false).unwrap();
        assert_eq!(r.current(), 1);
    }

    #[test]
    fn test_load_needs_open_cylinder() {
        let (mut world, actor, gun) = gunslinger();
        with_revolver(&mut world, gun, |r, env| {
            assert_eq!(r.why_cannot_load(env, actor, None), Some(Refusal::CylinderClosed));
            r.open(env, actor).unwrap();
            assert_eq!(r.why_cannot_open(env, actor), Some(Refusal::AlreadyOpen));
            for _ in 0..6 {
                assert_eq!(r.load(env, actor, None).unwrap(), ActionOutcome::Done);
            }
            assert_eq!(r.why_cannot_load(env, actor, None), Some(Refusal::Full));
            assert_eq!(r.why_cannot_ready(env, actor), Some(Refusal::CylinderOpen));
        });
    }

    #[test]
    fn test_empty_chamber_clicks_and_advances() {
        let (mut world, actor, gun) = gunslinger();
        with_revolver(&mut world, gun, |r, env| {
            r.ready(env, actor).unwrap();
            let report = r.fire(env, &ShotRequest::into_the_air(actor)).unwrap();
            assert_eq!(report, FireReport::EmptyChamber { chamber: 0 });
            assert_eq!(r.current(), 1);
            assert!(r.core.readied);
        });
        assert!(world.log.mentions("Click. No round."));
    }

    #[test]
    fn test_fired_chamber_holds_casing_until_unloaded() {
        let (mut world, actor, gun) = gunslinger();
        let casing = with_revolver(&mut world, gun, |r, env| {
            r.open(env, actor).unwrap();
            r.load(env, actor, None).unwrap();
            r.close(env, actor).unwrap();
            r.ready(env, actor).unwrap();
            r.fire(env, &ShotRequest::into_the_air(actor)).unwrap();
            let Chamber::Spent(casing) = r.chambers()[0] else {
                panic!("expected a spent case");
            };
            r.open(env, actor).unwrap();
            r.unload(env, actor).unwrap();
            assert!(r.chambers().iter().all(|c| *c == Chamber::Empty));
            casing
        });
        assert!(matches!(
            world.items.require(casing).unwrap().location,
            Location::Ground(_)
        ));
    }
}
