//! Magazine-fed firearms: detachable box or internal tube
//!
//! Readiness is mechanical. `ready` works the action: whatever sits in the
//! chamber (live round or spent case) is thrown clear and the first
//! compatible round is fed from the magazine. Every shot cycles the action
//! the same way.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combat::env::FireEnv;
use crate::combat::propagation::{eject_casing, propagate_report};
use crate::combat::resolution::{resolve_shot, ShotRequest};
use crate::core::error::Result;
use crate::core::types::{ActorId, ItemId, Position};
use crate::weapons::common::{discharge, return_to, WeaponCore, WeaponProfile};
use crate::weapons::melee::{Mass, MeleeProfile};
use crate::weapons::{ActionOutcome, FireReport, MeleeUsable, RangedFireable, Refusal, Switchable};
use crate::world::inventory::{ItemQuery, LoadTemplate};
use crate::world::items::{ItemArena, ItemKind, Location};
use crate::world::narrative::Emote;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Feed {
    /// Box magazine swapped as a unit
    Detachable { magazine: Option<ItemId> },
    /// Rounds loaded one at a time into the weapon itself
    InternalTube { capacity: usize, rounds: Vec<ItemId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MagazineWeapon {
    pub core: WeaponCore,
    pub feed: Feed,
    pub chamber: Option<ItemId>,
    pub heft: Mass,
}

impl MagazineWeapon {
    pub fn new(id: ItemId, profile: WeaponProfile, feed: Feed, heft: Mass) -> Self {
        Self {
            core: WeaponCore::new(id, profile),
            feed,
            chamber: None,
            heft,
        }
    }

    /// Self-loading pistol with a detachable box
    pub fn pistol(id: ItemId) -> Self {
        Self::new(
            id,
            WeaponProfile::new("a service pistol", &["pistol"]).with_loudness(4),
            Feed::Detachable { magazine: None },
            Mass::Light,
        )
    }

    /// Lever rifle with a five-round tube
    pub fn tube_rifle(id: ItemId) -> Self {
        Self::new(
            id,
            WeaponProfile::new("a lever rifle", &["rifle"])
                .with_loudness(6)
                .with_quality(6.0),
            Feed::InternalTube {
                capacity: 5,
                rounds: Vec::new(),
            },
            Mass::Medium,
        )
    }

    /// Rounds waiting in the feed, in feed order
    pub fn feed_rounds(&self, items: &ItemArena) -> Vec<ItemId> {
        match &self.feed {
            Feed::Detachable { magazine: Some(mag) } => items
                .magazine(*mag)
                .map(|m| m.rounds.clone())
                .unwrap_or_default(),
            Feed::Detachable { magazine: None } => Vec::new(),
            Feed::InternalTube { rounds, .. } => rounds.clone(),
        }
    }

    fn next_round(&self, env: &FireEnv) -> Option<ItemId> {
        let query = ItemQuery::ammunition(&self.core.profile.ammo_tags);
        self.feed_rounds(env.items).into_iter().find(|id| {
            env.items
                .get(*id)
                .map_or(false, |item| query.matches(item, env.catalog))
        })
    }

    fn magazine_template(&self) -> LoadTemplate {
        LoadTemplate::new()
            .require(
                "magazine",
                ItemQuery::LoadedMagazine {
                    tags: self.core.profile.ammo_tags.clone(),
                },
            )
            .hands(1)
    }

    /// Throw out spent cases and any live round, then feed the next one.
    /// Returns true if a round is now chambered.
    fn cycle_action(&mut self, env: &mut FireEnv, at: Position) -> Result<bool> {
        let weapon = self.core.id;
        let casings = env
            .items
            .ids_where(|i| i.location == Location::InWeapon(weapon) && matches!(i.kind, ItemKind::Casing { .. }));
        for casing in casings {
            eject_casing(env, casing, at)?;
        }
        if let Some(live) = self.chamber.take() {
            env.items.detach(live, Location::Ground(at))?;
            env.emit_at(
                at,
                Emote::new("{ammo} is thrown clear of {weapon}.")
                    .item("ammo", live)
                    .item("weapon", weapon),
            );
        }

        let Some(round) = self.next_round(env) else {
            self.core.readied = false;
            return Ok(false);
        };
        if let Feed::InternalTube { rounds, .. } = &mut self.feed {
            rounds.retain(|r| *r != round);
        }
        // Out of the box magazine (or tube) and into the chamber
        env.items.detach(round, Location::InWeapon(weapon))?;
        self.chamber = Some(round);
        self.core.readied = true;
        debug!(?weapon, ?round, "round chambered");
        Ok(true)
    }
}

impl RangedFireable for MagazineWeapon {
    fn core(&self) -> &WeaponCore {
        &self.core
    }

    fn is_loaded(&self, items: &ItemArena) -> bool {
        self.chamber.is_some() || !self.feed_rounds(items).is_empty()
    }

    fn why_cannot_load(&self, env: &FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        match &self.feed {
            Feed::Detachable { magazine: Some(_) } => Some(Refusal::AlreadyLoaded),
            Feed::Detachable { magazine: None } => match ammo {
                None => Refusal::from_feasibility(env.feasibility(actor, &self.magazine_template())),
                Some(id) => match env.items.get(id) {
                    Some(item) if item.location == Location::Carried(actor) => match &item.kind {
                        ItemKind::Magazine(m)
                            if m.tags.iter().any(|t| self.core.profile.ammo_tags.contains(t)) =>
                        {
                            None
                        }
                        _ => Some(Refusal::IncompatibleAmmunition),
                    },
                    _ => Some(Refusal::MissingItems),
                },
            },
            Feed::InternalTube { capacity, rounds } => {
                if rounds.len() >= *capacity {
                    Some(Refusal::Full)
                } else {
                    self.core.why_cannot_take_round(env, actor, ammo)
                }
            }
        }
    }

    fn load(&mut self, env: &mut FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_load(env, actor, ammo) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let weapon = self.core.id;
        let at = env.actor_position(actor)?;
        if matches!(self.feed, Feed::Detachable { .. }) {
            let mag = match ammo {
                Some(id) => id,
                None => env.bind(actor, &self.magazine_template())?.require("magazine")?,
            };
            env.items.attach(mag, weapon)?;
            self.feed = Feed::Detachable {
                magazine: Some(mag),
            };
            env.emit_at(
                at,
                Emote::new("{actor} slaps {magazine} into {weapon}.")
                    .actor("actor", actor)
                    .item("magazine", mag)
                    .item("weapon", weapon),
            );
        } else {
            let round = self.core.take_round(env, actor, ammo)?;
            env.items.attach(round, weapon)?;
            if let Feed::InternalTube { rounds, .. } = &mut self.feed {
                rounds.push(round);
            }
            env.emit_at(
                at,
                Emote::new("{actor} thumbs {ammo} into {weapon}.")
                    .actor("actor", actor)
                    .item("ammo", round)
                    .item("weapon", weapon),
            );
        }
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_unload(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core.why_cannot_handle(env, actor).or_else(|| {
            let empty = match &self.feed {
                Feed::Detachable { magazine } => magazine.is_none(),
                Feed::InternalTube { rounds, .. } => rounds.is_empty(),
            };
            (empty && self.chamber.is_none()).then_some(Refusal::NothingToUnload)
        })
    }

    /// Drops the magazine (box) or empties the tube into the actor's hands.
    /// A chambered round is cleared only once the feed is empty.
    fn unload(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unload(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let feed_empty = match &mut self.feed {
            Feed::Detachable { magazine } => match magazine.take() {
                Some(mag) => {
                    return_to(env, mag, actor)?;
                    false
                }
                None => true,
            },
            Feed::InternalTube { rounds, .. } => {
                let taken: Vec<ItemId> = rounds.drain(..).collect();
                for round in &taken {
                    return_to(env, *round, actor)?;
                }
                taken.is_empty()
            }
        };
        if feed_empty {
            if let Some(round) = self.chamber.take() {
                return_to(env, round, actor)?;
                self.core.readied = false;
            }
        }
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} unloads {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_ready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| self.next_round(env).is_none().then_some(Refusal::NotLoaded))
    }

    fn ready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_ready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} works the action of {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        self.cycle_action(env, at)?;
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_unready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| self.chamber.is_none().then_some(Refusal::NotReadied))
    }

    fn unready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        if let Some(round) = self.chamber.take() {
            return_to(env, round, actor)?;
        }
        self.core.readied = false;
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_fire(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.core.safety {
            return Some(Refusal::SafetyOn);
        }
        self.chamber.is_none().then_some(Refusal::NotReadied)
    }

    fn fire(&mut self, env: &mut FireEnv, request: &ShotRequest) -> Result<FireReport> {
        if let Some(refusal) = self.why_cannot_fire(env, request.actor) {
            return Err(self.core.not_ready(refusal));
        }
        let Some(round) = self.chamber.take() else {
            return Err(self.core.not_ready(Refusal::NotReadied));
        };
        let actor = request.actor;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} fires {weapon}!")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        let shot = discharge(env, round, self.core.id)?;
        let catalog = env.catalog;
        let loudness = catalog
            .get(&shot.type_id)?
            .loudness
            .max(self.core.profile.loudness);
        let outcome = resolve_shot(env, self.core.id, &self.core.profile, request, shot)?;
        propagate_report(env, at, loudness, "gunshot");
        self.cycle_action(env, at)?;
        Ok(FireReport::Fired(outcome))
    }
}

impl Switchable for MagazineWeapon {
    fn safety_engaged(&self) -> bool {
        self.core.safety
    }

    fn why_cannot_switch(&self, env: &FireEnv, actor: ActorId, engage: bool) -> Option<Refusal> {
        self.core.why_cannot_handle(env, actor).or(match (engage, self.core.safety) {
            (true, true) => Some(Refusal::AlreadySafe),
            (false, false) => Some(Refusal::AlreadyUnsafe),
            _ => None,
        })
    }

    fn switch(&mut self, env: &mut FireEnv, actor: ActorId, engage: bool) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_switch(env, actor, engage) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.core.safety = engage;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} flicks the safety of {weapon} {state}.")
                .actor("actor", actor)
                .item("weapon", self.core.id)
                .text("state", if engage { "on" } else { "off" }),
        );
        Ok(ActionOutcome::Done)
    }
}

impl MeleeUsable for MagazineWeapon {
    fn melee_profile(&self, _items: &ItemArena) -> MeleeProfile {
        MeleeProfile::pistol_whip(self.heft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ammo::AmmunitionUnit;
    use crate::combat::resolution::AmmoDisposal;
    use crate::core::types::CellId;
    use crate::weapons::Weapon;
    use crate::world::body::Target;
    use crate::world::items::Magazine;
    use crate::world::World;

    fn shooter(build: fn(ItemId) -> MagazineWeapon) -> (World, ActorId, ItemId) {
        let mut world = World::new(21);
        let actor = world.actors.spawn("Bram", Position::ground(CellId(2)));
        let gun = world
            .spawn_weapon("a firearm", Location::Carried(actor), |id| {
                Ok(Weapon::Magazine(build(id)))
            })
            .unwrap();
        (world, actor, gun)
    }

    fn filled_magazine(world: &mut World, actor: ActorId, rounds: usize) -> ItemId {
        let mag = world.items.spawn(
            "a pistol magazine",
            ItemKind::Magazine(Magazine::new(8, &["pistol"])),
            Location::Carried(actor),
        );
        for _ in 0..rounds {
            world.items.spawn(
                "a pistol round",
                ItemKind::Ammunition(AmmunitionUnit::new("pistol-round", 5.0)),
                Location::InMagazine(mag),
            );
        }
        mag
    }

    fn with_gun<T>(
        world: &mut World,
        id: ItemId,
        f: impl FnOnce(&mut MagazineWeapon, &mut FireEnv) -> T,
    ) -> T {
        let (weapons, mut env) = world.split();
        match weapons.get_mut(&id) {
            Some(Weapon::Magazine(gun)) => f(gun, &mut env),
            _ => panic!("not a magazine weapon"),
        }
    }

    #[test]
    fn test_ready_chambers_first_round() {
        let (mut world, actor, gun) = shooter(MagazineWeapon::pistol);
        let mag = filled_magazine(&mut world, actor, 3);
        let first = world.items.magazine(mag).unwrap().rounds[0];
        with_gun(&mut world, gun, |g, env| {
            assert_eq!(g.why_cannot_ready(env, actor), Some(Refusal::NotLoaded));
            assert_eq!(g.load(env, actor, None).unwrap(), ActionOutcome::Done);
            assert_eq!(g.ready(env, actor).unwrap(), ActionOutcome::Done);
            assert_eq!(g.chamber, Some(first));
        });
        assert_eq!(world.items.magazine(mag).unwrap().rounds.len(), 2);
    }

    #[test]
    fn test_safety_blocks_fire() {
        let (mut world, actor, gun) = shooter(MagazineWeapon::pistol);
        filled_magazine(&mut world, actor, 1);
        with_gun(&mut world, gun, |g, env| {
            g.load(env, actor, None).unwrap();
            g.ready(env, actor).unwrap();
            assert_eq!(g.switch(env, actor, true).unwrap(), ActionOutcome::Done);
            assert_eq!(g.why_cannot_fire(env, actor), Some(Refusal::SafetyOn));
            assert_eq!(
                g.why_cannot_switch(env, actor, true),
                Some(Refusal::AlreadySafe)
            );
            g.switch(env, actor, false).unwrap();
            assert!(g.ready_to_fire(env, actor));
        });
    }

    #[test]
    fn test_fire_ejects_casing_and_rechambers() {
        let (mut world, actor, gun) = shooter(MagazineWeapon::pistol);
        let target = world.actors.spawn("the target", Position::ground(CellId(3)));
        filled_magazine(&mut world, actor, 2);
        let report = with_gun(&mut world, gun, |g, env| {
            g.load(env, actor, None).unwrap();
            g.ready(env, actor).unwrap();
            g.fire(env, &ShotRequest::at(actor, Target::Actor(target)))
        })
        .unwrap();
        let outcome = report.outcome().unwrap();
        let casing = outcome.waste.unwrap();
        assert_eq!(
            world.items.require(casing).unwrap().location,
            Location::Ground(Position::ground(CellId(2)))
        );
        assert!(!matches!(outcome.disposal, AmmoDisposal::Dissipated));
        match world.weapon(gun).unwrap() {
            Weapon::Magazine(g) => assert!(g.chamber.is_some()),
            _ => unreachable!(),
        }
        assert!(world.log.mentions("A deafening {noun} rings out!"));
    }

    #[test]
    fn test_last_round_leaves_weapon_unready() {
        let (mut world, actor, gun) = shooter(MagazineWeapon::pistol);
        filled_magazine(&mut world, actor, 1);
        with_gun(&mut world, gun, |g, env| {
            g.load(env, actor, None).unwrap();
            g.ready(env, actor).unwrap();
            g.fire(env, &ShotRequest::into_the_air(actor)).unwrap();
            assert!(g.chamber.is_none());
            assert!(!g.core.readied);
            assert_eq!(g.why_cannot_fire(env, actor), Some(Refusal::NotReadied));
        });
    }

    #[test]
    fn test_tube_fills_to_capacity() {
        let (mut world, actor, gun) = shooter(MagazineWeapon::tube_rifle);
        world.items.spawn_stack(
            "a rifle round",
            ItemKind::Ammunition(AmmunitionUnit::new("rifle-round", 5.0)),
            Location::Carried(actor),
            8,
        );
        with_gun(&mut world, gun, |g, env| {
            for _ in 0..5 {
                assert_eq!(g.load(env, actor, None).unwrap(), ActionOutcome::Done);
            }
            assert_eq!(
                g.load(env, actor, None).unwrap(),
                ActionOutcome::Refused(Refusal::Full)
            );
            g.ready(env, actor).unwrap();
            assert_eq!(g.feed_rounds(env.items).len(), 4);
            assert_eq!(g.unload(env, actor).unwrap(), ActionOutcome::Done);
            assert!(g.feed_rounds(env.items).is_empty());
            assert!(g.chamber.is_some());
        });
    }

    #[test]
    fn test_racking_again_throws_live_round() {
        let (mut world, actor, gun) = shooter(MagazineWeapon::pistol);
        filled_magazine(&mut world, actor, 2);
        let thrown = with_gun(&mut world, gun, |g, env| {
            g.load(env, actor, None).unwrap();
            g.ready(env, actor).unwrap();
            let first = g.chamber.unwrap();
            g.ready(env, actor).unwrap();
            first
        });
        assert!(matches!(
            world.items.require(thrown).unwrap().location,
            Location::Ground(_)
        ));
    }
}
