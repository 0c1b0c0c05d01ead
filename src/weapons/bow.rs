//! Bows and crossbows
//!
//! Loaded (an arrow nocked) and readied (the string drawn) are independent.
//! Drawing takes a timed continuation and stamina; firing clears both.

use tracing::debug;

use crate::combat::env::FireEnv;
use crate::combat::propagation::propagate_report;
use crate::combat::resolution::{resolve_shot, ShotRequest};
use crate::core::error::Result;
use crate::core::types::{ActorId, ItemId, TaskId};
use crate::weapons::common::{discharge, return_to, WeaponCore, WeaponProfile};
use crate::weapons::melee::MeleeProfile;
use crate::weapons::{ActionOutcome, FireReport, MeleeUsable, RangedFireable, Refusal};
use crate::world::items::ItemArena;
use crate::world::narrative::Emote;
use crate::world::scheduler::TaskKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Bow {
    pub core: WeaponCore,
    pub nocked: Option<ItemId>,
    /// Draw in progress
    pub drawing: Option<TaskId>,
}

impl Bow {
    pub fn new(id: ItemId, profile: WeaponProfile) -> Self {
        Self {
            core: WeaponCore::new(id, profile),
            nocked: None,
            drawing: None,
        }
    }

    pub fn longbow(id: ItemId) -> Self {
        Self::new(id, WeaponProfile::new("a longbow", &["arrow"]))
    }

    pub fn crossbow(id: ItemId) -> Self {
        Self::new(
            id,
            WeaponProfile::new("a crossbow", &["bolt"]).with_quality(6.0),
        )
    }

    /// The draw finished: the bow is now readied
    pub fn complete_draw(&mut self, env: &mut FireEnv, task: TaskId, actor: ActorId) -> Result<()> {
        if self.drawing != Some(task) {
            debug!(?task, "stale draw completion ignored");
            return Ok(());
        }
        self.drawing = None;
        self.core.readied = true;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} holds {weapon} at full draw.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(())
    }

    pub fn task_voided(&mut self, task: TaskId) {
        if self.drawing == Some(task) {
            self.drawing = None;
        }
    }
}

impl RangedFireable for Bow {
    fn core(&self) -> &WeaponCore {
        &self.core
    }

    fn is_loaded(&self, _items: &ItemArena) -> bool {
        self.nocked.is_some()
    }

    fn why_cannot_load(&self, env: &FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| self.nocked.map(|_| Refusal::AlreadyLoaded))
            .or_else(|| self.core.why_cannot_take_round(env, actor, ammo))
    }

    fn load(&mut self, env: &mut FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_load(env, actor, ammo) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let arrow = self.core.take_round(env, actor, ammo)?;
        env.items.attach(arrow, self.core.id)?;
        self.nocked = Some(arrow);
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} nocks {ammo} to {weapon}.")
                .actor("actor", actor)
                .item("ammo", arrow)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_unload(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core.why_cannot_handle(env, actor).or_else(|| {
            if self.nocked.is_none() {
                Some(Refusal::NothingToUnload)
            } else if self.core.readied {
                Some(Refusal::AlreadyReadied)
            } else {
                None
            }
        })
    }

    fn unload(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unload(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        if let Some(arrow) = self.nocked.take() {
            return_to(env, arrow, actor)?;
        }
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_ready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.core.readied {
            return Some(Refusal::AlreadyReadied);
        }
        let wielder = env.actors.get(actor)?;
        if wielder.free_hands < env.config.bow.free_limbs_required {
            return Some(Refusal::NeedsFreeHand);
        }
        if wielder.stamina < env.config.bow.draw_stamina {
            return Some(Refusal::TooTired);
        }
        None
    }

    fn ready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_ready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let stamina = env.config.bow.draw_stamina;
        env.actors.require_mut(actor)?.spend_stamina(stamina);

        let draw_ticks = env.config.bow.draw_ticks;
        if draw_ticks == 0 {
            self.core.readied = true;
            return Ok(ActionOutcome::Done);
        }
        let completes_at = env.now + draw_ticks;
        let task = env.scheduler.schedule(
            Some(actor),
            completes_at,
            TaskKind::BowDraw {
                weapon: self.core.id,
            },
        );
        self.drawing = Some(task);
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} begins to draw {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Started { task, completes_at })
    }

    fn why_cannot_unready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        // A draw in progress keeps the archer busy but may still be let down
        self.core.why_cannot_hold(env, actor).or_else(|| {
            (!self.core.readied && self.drawing.is_none()).then_some(Refusal::NotReadied)
        })
    }

    fn unready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        if let Some(task) = self.drawing.take() {
            env.scheduler.cancel(task);
        }
        self.core.readied = false;
        if let Some(arrow) = self.nocked.take() {
            return_to(env, arrow, actor)?;
        }
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} eases the string of {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_fire(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| (!self.core.readied).then_some(Refusal::NotReadied))
    }

    fn fire(&mut self, env: &mut FireEnv, request: &ShotRequest) -> Result<FireReport> {
        if let Some(refusal) = self.why_cannot_fire(env, request.actor) {
            return Err(self.core.not_ready(refusal));
        }
        let actor = request.actor;
        let at = env.actor_position(actor)?;
        self.core.readied = false;

        let Some(arrow) = self.nocked.take() else {
            env.emit_at(
                at,
                Emote::new("{actor} releases the string of {weapon}, but nothing was loaded.")
                    .actor("actor", actor)
                    .item("weapon", self.core.id),
            );
            return Ok(FireReport::NothingLoaded);
        };

        env.emit_at(
            at,
            Emote::new("{actor} looses {ammo} from {weapon}.")
                .actor("actor", actor)
                .item("ammo", arrow)
                .item("weapon", self.core.id),
        );
        let shot = discharge(env, arrow, self.core.id)?;
        let catalog = env.catalog;
        let loudness = catalog
            .get(&shot.type_id)?
            .loudness
            .max(self.core.profile.loudness);
        let outcome = resolve_shot(env, self.core.id, &self.core.profile, request, shot)?;
        propagate_report(env, at, loudness, "twang");
        Ok(FireReport::Fired(outcome))
    }
}

impl MeleeUsable for Bow {
    fn melee_profile(&self, _items: &ItemArena) -> MeleeProfile {
        MeleeProfile::light_blunt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ammo::AmmunitionUnit;
    use crate::core::types::{CellId, Position};
    use crate::weapons::Weapon;
    use crate::world::body::Target;
    use crate::world::items::{ItemKind, Location};
    use crate::world::World;

    fn range() -> (World, ActorId, ItemId) {
        let mut world = World::new(11);
        let archer = world.actors.spawn("Ada", Position::ground(CellId(2)));
        let bow = world
            .spawn_weapon("a longbow", Location::Carried(archer), |id| {
                Ok(Weapon::Bow(Bow::longbow(id)))
            })
            .unwrap();
        (world, archer, bow)
    }

    fn with_bow<T>(world: &mut World, id: ItemId, f: impl FnOnce(&mut Bow, &mut FireEnv) -> T) -> T {
        let (weapons, mut env) = world.split();
        match weapons.get_mut(&id) {
            Some(Weapon::Bow(bow)) => f(bow, &mut env),
            _ => panic!("not a bow"),
        }
    }

    #[test]
    fn test_load_splits_quiver() {
        let (mut world, archer, bow) = range();
        let quiver = world.items.spawn_stack(
            "a broadhead arrow",
            ItemKind::Ammunition(AmmunitionUnit::new("broadhead-arrow", 5.0)),
            Location::Carried(archer),
            6,
        );
        let outcome = with_bow(&mut world, bow, |b, env| b.load(env, archer, None)).unwrap();
        assert_eq!(outcome, ActionOutcome::Done);
        assert_eq!(world.items.require(quiver).unwrap().quantity, 5);
        let nocked = world.items.contents_of(bow);
        assert_eq!(nocked.len(), 1);
        assert_ne!(nocked[0], quiver);
    }

    #[test]
    fn test_load_without_arrows_is_refused() {
        let (mut world, archer, bow) = range();
        let outcome = with_bow(&mut world, bow, |b, env| {
            assert!(!b.can_load(env, archer, None));
            b.load(env, archer, None)
        })
        .unwrap();
        assert_eq!(outcome, ActionOutcome::Refused(Refusal::MissingItems));
    }

    #[test]
    fn test_draw_is_timed_and_costs_stamina() {
        let (mut world, archer, bow) = range();
        let outcome = with_bow(&mut world, bow, |b, env| b.ready(env, archer)).unwrap();
        let ActionOutcome::Started { completes_at, .. } = outcome else {
            panic!("expected a timed draw, got {:?}", outcome);
        };
        assert_eq!(completes_at, 3);
        assert_eq!(world.actors.require(archer).unwrap().stamina, 95.0);
        assert!(!world.weapon(bow).unwrap().as_ranged().is_readied());
        // Busy while drawing
        with_bow(&mut world, bow, |b, env| {
            assert_eq!(b.why_cannot_fire(env, archer), Some(Refusal::Busy));
        });
    }

    #[test]
    fn test_ready_needs_free_hand_and_stamina() {
        let (mut world, archer, bow) = range();
        world.actors.require_mut(archer).unwrap().free_hands = 0;
        with_bow(&mut world, bow, |b, env| {
            assert_eq!(b.why_cannot_ready(env, archer), Some(Refusal::NeedsFreeHand));
        });
        let actor = world.actors.require_mut(archer).unwrap();
        actor.free_hands = 2;
        actor.stamina = 1.0;
        with_bow(&mut world, bow, |b, env| {
            assert_eq!(b.why_cannot_ready(env, archer), Some(Refusal::TooTired));
            assert!(!b.can_ready(env, archer));
        });
    }

    #[test]
    fn test_unready_returns_arrow_and_cancels_draw() {
        let (mut world, archer, bow) = range();
        world.items.spawn(
            "a broadhead arrow",
            ItemKind::Ammunition(AmmunitionUnit::new("broadhead-arrow", 5.0)),
            Location::Carried(archer),
        );
        with_bow(&mut world, bow, |b, env| {
            b.load(env, archer, None).unwrap();
            b.ready(env, archer).unwrap();
            assert!(b.can_unready(env, archer));
            assert_eq!(b.unready(env, archer).unwrap(), ActionOutcome::Done);
            assert!(b.nocked.is_none());
            assert!(b.drawing.is_none());
        });
        assert!(world.scheduler.is_empty());
        assert_eq!(world.items.contents_of(bow).len(), 0);
    }

    #[test]
    fn test_fire_clears_loaded_and_readied() {
        let (mut world, archer, bow) = range();
        let dummy = world.actors.spawn("the straw dummy", Position::ground(CellId(4)));
        world.items.spawn(
            "a broadhead arrow",
            ItemKind::Ammunition(AmmunitionUnit::new("broadhead-arrow", 5.0)),
            Location::Carried(archer),
        );
        with_bow(&mut world, bow, |b, env| b.load(env, archer, None)).unwrap();
        with_bow(&mut world, bow, |b, env| b.ready(env, archer)).unwrap();
        world.advance_to(3).unwrap();

        let report = with_bow(&mut world, bow, |b, env| {
            assert!(b.ready_to_fire(env, archer));
            b.fire(env, &ShotRequest::at(archer, Target::Actor(dummy)))
        })
        .unwrap();
        assert!(report.outcome().is_some());
        let bow_state = world.weapon(bow).unwrap().as_ranged();
        assert!(!bow_state.is_readied());
        assert!(!bow_state.is_loaded(&world.items));
    }

    #[test]
    fn test_fire_when_not_ready_is_an_error() {
        let (mut world, archer, bow) = range();
        let result = with_bow(&mut world, bow, |b, env| {
            b.fire(env, &ShotRequest::into_the_air(archer))
        });
        assert!(result.is_err());
    }
}
