//! The world the firing core runs against
//!
//! Each collaborator lives in its own module behind a trait; `World` owns one
//! reference implementation of each plus the weapons themselves, and lends
//! them out as a `FireEnv` for the duration of one action.

pub mod actor;
pub mod body;
pub mod inventory;
pub mod items;
pub mod narrative;
pub mod scheduler;
pub mod spatial;

use ahash::AHashMap;
use rand::RngCore;
use tracing::{debug, warn};

use crate::actions;
use crate::ammo::AmmoCatalog;
use crate::combat::env::FireEnv;
use crate::core::config::FiringConfig;
use crate::core::error::{ArmsError, Result};
use crate::core::rng;
use crate::core::types::{ActorId, ItemId, Tick};
use crate::weapons::Weapon;

use actor::ActorRoster;
use body::BodyLedger;
use inventory::PocketPlanner;
use items::{ItemArena, ItemKind, Location};
use narrative::{EmoteRef, NarrativeLog};
use scheduler::Scheduler;
use spatial::{RoomMap, SpatialModel};

pub struct World {
    pub now: Tick,
    pub actors: ActorRoster,
    pub items: ItemArena,
    pub weapons: AHashMap<ItemId, Weapon>,
    pub rooms: RoomMap,
    pub bodies: BodyLedger,
    pub scheduler: Scheduler,
    pub catalog: AmmoCatalog,
    pub config: FiringConfig,
    pub planner: PocketPlanner,
    pub log: NarrativeLog,
    rng: Box<dyn RngCore>,
}

impl World {
    /// Empty world on the default range with the shipped catalog and config
    pub fn new(seed: u64) -> Self {
        Self::with_parts(
            RoomMap::firing_range(),
            AmmoCatalog::with_defaults(),
            FiringConfig::default(),
            Box::new(rng::seeded(seed)),
        )
    }

    pub fn with_parts(
        rooms: RoomMap,
        catalog: AmmoCatalog,
        config: FiringConfig,
        rng: Box<dyn RngCore>,
    ) -> Self {
        Self {
            now: 0,
            actors: ActorRoster::new(),
            items: ItemArena::new(),
            weapons: AHashMap::new(),
            rooms,
            bodies: BodyLedger::new(),
            scheduler: Scheduler::new(),
            catalog,
            config,
            planner: PocketPlanner,
            log: NarrativeLog::new(),
            rng,
        }
    }

    /// Swap the random source (tests inject mock generators here)
    pub fn set_rng(&mut self, rng: Box<dyn RngCore>) {
        self.rng = rng;
    }

    /// Create the item for a weapon and register its firing state
    pub fn spawn_weapon(
        &mut self,
        name: &str,
        location: Location,
        build: impl FnOnce(ItemId) -> Result<Weapon>,
    ) -> Result<ItemId> {
        let id = self.items.spawn(name, ItemKind::Weapon, location);
        let weapon = build(id)?;
        if weapon.id() != id {
            self.items.remove(id);
            return Err(ArmsError::Invariant(format!(
                "weapon built for {:?} reports id {:?}",
                id,
                weapon.id()
            )));
        }
        self.weapons.insert(id, weapon);
        Ok(id)
    }

    pub fn weapon(&self, id: ItemId) -> Result<&Weapon> {
        self.weapons.get(&id).ok_or(ArmsError::ItemNotFound(id))
    }

    /// Lend out the weapons and an environment over everything else
    pub fn split(&mut self) -> (&mut AHashMap<ItemId, Weapon>, FireEnv<'_>) {
        let env = FireEnv {
            now: self.now,
            actors: &mut self.actors,
            items: &mut self.items,
            catalog: &self.catalog,
            spatial: &self.rooms,
            bodies: &mut self.bodies,
            planner: &self.planner,
            output: &mut self.log,
            scheduler: &mut self.scheduler,
            config: &self.config,
            rng: self.rng.as_mut(),
        };
        (&mut self.weapons, env)
    }

    /// Run every continuation due up to and including `until`
    pub fn advance_to(&mut self, until: Tick) -> Result<()> {
        while let Some(task) = self.scheduler.pop_due(until) {
            self.now = self.now.max(task.due);
            debug!(task = ?task.id, due = task.due, "running scheduled task");
            actions::complete_task(self, task)?;
        }
        self.now = self.now.max(until);
        Ok(())
    }

    /// Knock an actor out; their in-progress sequences are voided
    pub fn incapacitate(&mut self, actor: ActorId) -> Result<()> {
        self.actors.require_mut(actor)?.incapacitated = true;
        for task in self.scheduler.cancel_for_actor(actor) {
            warn!(task = ?task.id, ?actor, "voided in-progress task");
            if let Some(weapon) = actions::task_weapon(&task.kind) {
                if let Some(w) = self.weapons.get_mut(&weapon) {
                    w.task_voided(task.id);
                }
            }
        }
        Ok(())
    }

    /// Plain-text rendering of a reference, for sinks and the runner
    pub fn describe(&self, reference: &EmoteRef) -> String {
        match reference {
            EmoteRef::Actor(id) => self.actors.name(*id),
            EmoteRef::Item(id) => self.items.name(*id),
            EmoteRef::Cell(id) => self.rooms.cell_name(*id),
            EmoteRef::Text(text) => text.clone(),
        }
    }

    /// Every logged emote rendered to text, in order, sentence-cased
    pub fn rendered_log(&self) -> Vec<String> {
        self.log
            .entries()
            .iter()
            .map(|(_, emote)| capitalise(&emote.render(|r| self.describe(r))))
            .collect()
    }
}

fn capitalise(line: &str) -> String {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CellId, Position};

    #[test]
    fn test_advance_moves_clock() {
        let mut world = World::new(1);
        world.advance_to(25).unwrap();
        assert_eq!(world.now, 25);
        // Never runs backwards
        world.advance_to(10).unwrap();
        assert_eq!(world.now, 25);
    }

    #[test]
    fn test_fragment_decay_removes_item() {
        let mut world = World::new(1);
        let shard = world.items.spawn(
            "arrow fragments",
            ItemKind::Fragment {
                from: "broadhead-arrow".into(),
            },
            Location::Ground(Position::ground(CellId(3))),
        );
        world
            .scheduler
            .schedule(None, 5, scheduler::TaskKind::FragmentDecay { item: shard });
        world.advance_to(4).unwrap();
        assert!(world.items.contains(shard));
        world.advance_to(5).unwrap();
        assert!(!world.items.contains(shard));
    }

    #[test]
    fn test_capitalise() {
        assert_eq!(capitalise("the bow twangs."), "The bow twangs.");
        assert_eq!(capitalise(""), "");
    }

    #[test]
    fn test_incapacitate_missing_actor() {
        let mut world = World::new(1);
        assert!(world.incapacitate(ActorId(99)).is_err());
    }
}
