//! Caller layer
//!
//! Every entry point asks the weapon why it cannot act before acting, so a
//! refused action never touches state. Timed continuations come back in
//! through `complete_task` when the world's clock reaches them.

pub mod catalog;

pub use catalog::{ActionCategory, WeaponAction};

use tracing::{debug, info, warn};

use crate::combat::env::FireEnv;
use crate::combat::resolution::ShotRequest;
use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, ItemId};
use crate::weapons::energy;
use crate::weapons::melee::MeleeProfile;
use crate::weapons::{ActionOutcome, FireReport, Refusal, Weapon};
use crate::world::scheduler::{ScheduledTask, TaskKind};
use crate::world::World;

fn with_weapon<T>(
    world: &mut World,
    weapon: ItemId,
    f: impl FnOnce(&mut Weapon, &mut FireEnv) -> Result<T>,
) -> Result<T> {
    let (weapons, mut env) = world.split();
    let w = weapons
        .get_mut(&weapon)
        .ok_or(ArmsError::ItemNotFound(weapon))?;
    f(w, &mut env)
}

fn unsupported(weapon: &Weapon, what: &'static str) -> ArmsError {
    ArmsError::WrongItemKind(weapon.id(), what)
}

/// Why `actor` cannot perform `action` with `weapon` right now
pub fn why_cannot(
    world: &mut World,
    actor: ActorId,
    weapon: ItemId,
    action: WeaponAction,
) -> Result<Option<Refusal>> {
    with_weapon(world, weapon, |w, env| {
        let env: &FireEnv = env;
        let refusal = match (action, &*w) {
            (WeaponAction::Load { ammo }, w) => w.as_ranged().why_cannot_load(env, actor, ammo),
            (WeaponAction::Unload, w) => w.as_ranged().why_cannot_unload(env, actor),
            (WeaponAction::Ready, w) => w.as_ranged().why_cannot_ready(env, actor),
            (WeaponAction::Unready, w) => w.as_ranged().why_cannot_unready(env, actor),
            (WeaponAction::EngageSafety | WeaponAction::DisengageSafety, w) => {
                let engage = action == WeaponAction::EngageSafety;
                w.as_switchable()
                    .ok_or_else(|| unsupported(w, "a weapon with a safety"))?
                    .why_cannot_switch(env, actor, engage)
            }
            (WeaponAction::OpenCylinder | WeaponAction::CloseCylinder, w) => {
                let lock = w.as_lockable().ok_or_else(|| unsupported(w, "a revolver"))?;
                if action == WeaponAction::OpenCylinder {
                    lock.why_cannot_open(env, actor)
                } else {
                    lock.why_cannot_close(env, actor)
                }
            }
            (WeaponAction::LoadChamber { index, ammo }, Weapon::Revolver(r)) => {
                r.why_cannot_load_chamber(env, actor, index, ammo)
            }
            (WeaponAction::Musket(step), Weapon::Musket(m)) => m.why_cannot_step(env, actor, step),
            (WeaponAction::AttachBayonet, Weapon::Musket(m)) => m.why_cannot_attach_bayonet(env, actor),
            (WeaponAction::DetachBayonet, Weapon::Musket(m)) => m.why_cannot_detach_bayonet(env, actor),
            (WeaponAction::LoadChamber { .. }, w) => return Err(unsupported(w, "a revolver")),
            (_, w) => return Err(unsupported(w, "a musket")),
        };
        Ok(refusal)
    })
}

/// Perform `action`, or report why it was refused
pub fn perform(
    world: &mut World,
    actor: ActorId,
    weapon: ItemId,
    action: WeaponAction,
) -> Result<ActionOutcome> {
    let outcome = with_weapon(world, weapon, |w, env| match (action, w) {
        (WeaponAction::Load { ammo }, w) => w.as_ranged_mut().load(env, actor, ammo),
        (WeaponAction::Unload, w) => w.as_ranged_mut().unload(env, actor),
        (WeaponAction::Ready, w) => w.as_ranged_mut().ready(env, actor),
        (WeaponAction::Unready, w) => w.as_ranged_mut().unready(env, actor),
        (WeaponAction::EngageSafety | WeaponAction::DisengageSafety, w) => {
            let engage = action == WeaponAction::EngageSafety;
            let id = w.id();
            match w.as_switchable_mut() {
                Some(s) => s.switch(env, actor, engage),
                None => Err(ArmsError::WrongItemKind(id, "a weapon with a safety")),
            }
        }
        (WeaponAction::OpenCylinder | WeaponAction::CloseCylinder, w) => {
            let id = w.id();
            match w.as_lockable_mut() {
                Some(lock) if action == WeaponAction::OpenCylinder => lock.open(env, actor),
                Some(lock) => lock.close(env, actor),
                None => Err(ArmsError::WrongItemKind(id, "a revolver")),
            }
        }
        (WeaponAction::LoadChamber { index, ammo }, Weapon::Revolver(r)) => {
            r.load_chamber(env, actor, index, ammo)
        }
        (WeaponAction::Musket(step), Weapon::Musket(m)) => m.begin_step(env, actor, step),
        (WeaponAction::AttachBayonet, Weapon::Musket(m)) => m.attach_bayonet(env, actor),
        (WeaponAction::DetachBayonet, Weapon::Musket(m)) => m.detach_bayonet(env, actor),
        (WeaponAction::LoadChamber { .. }, w) => Err(unsupported(w, "a revolver")),
        (_, w) => Err(unsupported(w, "a musket")),
    })?;
    debug!(?actor, ?weapon, action = action.describe(), ?outcome, "weapon action");
    Ok(outcome)
}

pub fn try_load(world: &mut World, actor: ActorId, weapon: ItemId, ammo: Option<ItemId>) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::Load { ammo })
}

pub fn try_unload(world: &mut World, actor: ActorId, weapon: ItemId) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::Unload)
}

pub fn try_ready(world: &mut World, actor: ActorId, weapon: ItemId) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::Ready)
}

pub fn try_unready(world: &mut World, actor: ActorId, weapon: ItemId) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::Unready)
}

pub fn try_switch_safety(world: &mut World, actor: ActorId, weapon: ItemId, engage: bool) -> Result<ActionOutcome> {
    let action = if engage {
        WeaponAction::EngageSafety
    } else {
        WeaponAction::DisengageSafety
    };
    perform(world, actor, weapon, action)
}

pub fn try_musket_step(
    world: &mut World,
    actor: ActorId,
    weapon: ItemId,
    step: crate::weapons::MusketStep,
) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::Musket(step))
}

pub fn try_open_cylinder(world: &mut World, actor: ActorId, weapon: ItemId) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::OpenCylinder)
}

pub fn try_close_cylinder(world: &mut World, actor: ActorId, weapon: ItemId) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::CloseCylinder)
}

pub fn try_attach_bayonet(world: &mut World, actor: ActorId, weapon: ItemId) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::AttachBayonet)
}

pub fn try_detach_bayonet(world: &mut World, actor: ActorId, weapon: ItemId) -> Result<ActionOutcome> {
    perform(world, actor, weapon, WeaponAction::DetachBayonet)
}

/// Fire if ready; otherwise report why not without touching the weapon
pub fn try_fire(world: &mut World, weapon: ItemId, request: &ShotRequest) -> Result<FireReport> {
    let report = with_weapon(world, weapon, |w, env| {
        if let Some(refusal) = w.as_ranged().why_cannot_fire(env, request.actor) {
            return Ok(FireReport::Refused(refusal));
        }
        w.as_ranged_mut().fire(env, request)
    })?;
    match &report {
        FireReport::Fired(outcome) => {
            info!(?weapon, resolution = ?outcome.resolution, damage = outcome.damage, "shot fired")
        }
        FireReport::Refused(refusal) => debug!(?weapon, %refusal, "fire refused"),
        other => info!(?weapon, report = ?other, "trigger pulled without a shot"),
    }
    Ok(report)
}

pub fn melee_profile(world: &World, weapon: ItemId) -> Result<MeleeProfile> {
    Ok(world.weapon(weapon)?.as_melee().melee_profile(&world.items))
}

/// The weapon a scheduled task belongs to, if any
pub fn task_weapon(kind: &TaskKind) -> Option<ItemId> {
    match kind {
        TaskKind::BowDraw { weapon } | TaskKind::MusketStep { weapon, .. } => Some(*weapon),
        TaskKind::Recharge { .. } | TaskKind::FragmentDecay { .. } => None,
    }
}

/// Run the continuation of a task that has come due
pub fn complete_task(world: &mut World, task: ScheduledTask) -> Result<()> {
    let ScheduledTask { id, actor, kind, .. } = task;
    match kind {
        TaskKind::BowDraw { weapon } => {
            let actor = actor.ok_or_else(|| ArmsError::Invariant(format!("draw {:?} has no actor", id)))?;
            let (weapons, mut env) = world.split();
            match weapons.get_mut(&weapon) {
                Some(Weapon::Bow(bow)) => bow.complete_draw(&mut env, id, actor),
                _ => {
                    warn!(task = ?id, ?weapon, "draw completed for a missing bow");
                    Ok(())
                }
            }
        }
        TaskKind::MusketStep { weapon, step, bound } => {
            let actor = actor.ok_or_else(|| ArmsError::Invariant(format!("musket step {:?} has no actor", id)))?;
            let (weapons, mut env) = world.split();
            match weapons.get_mut(&weapon) {
                Some(Weapon::Musket(musket)) => musket.complete_step(&mut env, id, actor, step, &bound),
                _ => {
                    warn!(task = ?id, ?weapon, "musket step completed for a missing musket");
                    Ok(())
                }
            }
        }
        TaskKind::Recharge { pack } => {
            let (_, mut env) = world.split();
            energy::recharge_step(&mut env, id, pack)
        }
        TaskKind::FragmentDecay { item } => {
            if world.items.remove(item).is_some() {
                debug!(?item, "fragment decayed");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ammo::AmmunitionUnit;
    use crate::core::types::{CellId, Position};
    use crate::weapons::{Bow, MagazineWeapon};
    use crate::world::body::Target;
    use crate::world::items::{ItemKind, Location};

    fn archer() -> (World, ActorId, ItemId) {
        let mut world = World::new(9);
        let actor = world.actors.spawn("Wren", Position::ground(CellId(2)));
        let bow = world
            .spawn_weapon("a longbow", Location::Carried(actor), |id| Ok(Weapon::Bow(Bow::longbow(id))))
            .unwrap();
        (world, actor, bow)
    }

    #[test]
    fn test_fire_when_not_ready_is_refused_not_an_error() {
        let (mut world, actor, bow) = archer();
        let request = ShotRequest::into_the_air(actor);
        let report = try_fire(&mut world, bow, &request).unwrap();
        assert_eq!(report, FireReport::Refused(Refusal::NotReadied));
    }

    #[test]
    fn test_draw_completes_through_the_scheduler() {
        let (mut world, actor, bow) = archer();
        let outcome = try_ready(&mut world, actor, bow).unwrap();
        let ActionOutcome::Started { completes_at, .. } = outcome else {
            panic!("expected a timed draw");
        };
        world.advance_to(completes_at).unwrap();
        assert!(world.weapon(bow).unwrap().as_ranged().is_readied());
        assert!(!world.scheduler.is_busy(actor));
    }

    #[test]
    fn test_safety_on_a_bow_is_a_kind_error() {
        let (mut world, actor, bow) = archer();
        let result = try_switch_safety(&mut world, actor, bow, true);
        assert!(matches!(result, Err(ArmsError::WrongItemKind(_, _))));
    }

    #[test]
    fn test_why_cannot_matches_perform() {
        let mut world = World::new(9);
        let actor = world.actors.spawn("Cass", Position::ground(CellId(2)));
        let gun = world
            .spawn_weapon("a pistol", Location::Carried(actor), |id| {
                Ok(Weapon::Magazine(MagazineWeapon::pistol(id)))
            })
            .unwrap();
        let action = WeaponAction::Load { ammo: None };
        let refusal = why_cannot(&mut world, actor, gun, action).unwrap();
        assert_eq!(refusal, Some(Refusal::MissingItems));
        assert_eq!(
            perform(&mut world, actor, gun, action).unwrap(),
            ActionOutcome::Refused(Refusal::MissingItems)
        );
    }

    #[test]
    fn test_fragment_decay_removes_item() {
        let (mut world, _, _) = archer();
        let fragment = world.items.spawn(
            "a broken arrow",
            ItemKind::Fragment {
                from: crate::ammo::AmmoTypeId("broadhead-arrow".into()),
            },
            Location::Ground(Position::ground(CellId(2))),
        );
        world
            .scheduler
            .schedule(None, 5, TaskKind::FragmentDecay { item: fragment });
        world.advance_to(5).unwrap();
        assert!(!world.items.contains(fragment));
    }

    #[test]
    fn test_loaded_bow_fires_through_try_fire() {
        let (mut world, actor, bow) = archer();
        let target = world.actors.spawn("Mara", Position::ground(CellId(2)));
        world.items.spawn(
            "a broadhead arrow",
            ItemKind::Ammunition(AmmunitionUnit::new("broadhead-arrow", 5.0)),
            Location::Carried(actor),
        );
        try_load(&mut world, actor, bow, None).unwrap();
        let ActionOutcome::Started { completes_at, .. } = try_ready(&mut world, actor, bow).unwrap() else {
            panic!("expected a timed draw");
        };
        world.advance_to(completes_at).unwrap();
        let report = try_fire(&mut world, bow, &ShotRequest::at(actor, Target::Actor(target))).unwrap();
        assert!(matches!(report, FireReport::Fired(_)));
        assert_eq!(melee_profile(&world, bow).unwrap(), MeleeProfile::light_blunt());
    }
}
