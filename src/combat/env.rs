//! Borrowed view of the world for one action

use rand::RngCore;

use crate::ammo::AmmoCatalog;
use crate::core::config::FiringConfig;
use crate::core::error::{ArmsError, Result};
use crate::core::rng;
use crate::core::types::{ActorId, Position, Tick};
use crate::world::actor::ActorRoster;
use crate::world::body::{DamageIntake, Target};
use crate::world::inventory::{BoundItems, Feasibility, InventoryPlanner, LoadTemplate};
use crate::world::items::ItemArena;
use crate::world::narrative::{Audience, Emote, OutputSink};
use crate::world::scheduler::Scheduler;
use crate::world::spatial::SpatialModel;

/// Everything a weapon may touch while it loads, readies or fires.
///
/// All randomness goes through `rng`; nothing else in the crate owns a
/// generator.
pub struct FireEnv<'a> {
    pub now: Tick,
    pub actors: &'a mut ActorRoster,
    pub items: &'a mut ItemArena,
    pub catalog: &'a AmmoCatalog,
    pub spatial: &'a dyn SpatialModel,
    pub bodies: &'a mut dyn DamageIntake,
    pub planner: &'a dyn InventoryPlanner,
    pub output: &'a mut dyn OutputSink,
    pub scheduler: &'a mut Scheduler,
    pub config: &'a FiringConfig,
    pub rng: &'a mut dyn RngCore,
}

impl<'a> FireEnv<'a> {
    pub fn actor_position(&self, actor: ActorId) -> Result<Position> {
        Ok(self.actors.require(actor)?.position)
    }

    pub fn target_position(&self, target: Target) -> Result<Position> {
        match target {
            Target::Actor(actor) => self.actor_position(actor),
            Target::Item(item) => {
                self.items.require(item)?;
                self.items
                    .position_of(item, &*self.actors)
                    .ok_or_else(|| ArmsError::Invariant(format!("{:?} is not in the world", item)))
            }
        }
    }

    pub fn feasibility(&self, actor: ActorId, template: &LoadTemplate) -> Feasibility {
        self.planner
            .evaluate(actor, template, &*self.actors, &*self.items, self.catalog)
    }

    /// Execute a load plan, binding (and splitting off) the items it needs
    pub fn bind(&mut self, actor: ActorId, template: &LoadTemplate) -> Result<BoundItems> {
        self.planner
            .execute(actor, template, &*self.actors, &mut *self.items, self.catalog)
    }

    pub fn roll(&mut self, chance: f64) -> bool {
        rng::roll(&mut *self.rng, chance)
    }

    /// Emit to everyone at a position's cell
    pub fn emit_at(&mut self, position: Position, emote: Emote) {
        self.output.emit(
            Audience::Cell {
                cell: position.cell,
                layer: None,
            },
            emote,
        );
    }
}
