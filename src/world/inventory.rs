//! Inventory planning boundary
//!
//! A weapon describes what a load step needs as a `LoadTemplate`; the planner
//! says whether the actor can satisfy it and, on execution, binds concrete
//! items to the template's roles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ammo::AmmoCatalog;
use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, ItemId};
use crate::world::actor::ActorRoster;
use crate::world::items::{Item, ItemArena, ItemKind, ToolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feasibility {
    Feasible,
    NotFeasibleMissingItems,
    NotFeasibleNotEnoughHands,
    NotFeasibleNotEnoughWielders,
}

/// What kind of item satisfies a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemQuery {
    /// Unfired ammunition carrying any of these tags
    Ammunition { tags: Vec<String> },
    /// A magazine accepting any of these tags with at least one round in it
    LoadedMagazine { tags: Vec<String> },
    Powder,
    Wadding,
    Tool(ToolKind),
    /// Either tool will do
    AnyTool(Vec<ToolKind>),
    PowerPack,
    Bayonet,
    Specific(ItemId),
}

impl ItemQuery {
    pub fn ammunition(tags: &[String]) -> Self {
        ItemQuery::Ammunition {
            tags: tags.to_vec(),
        }
    }

    pub fn matches(&self, item: &Item, catalog: &AmmoCatalog) -> bool {
        match (self, &item.kind) {
            (ItemQuery::Ammunition { tags }, ItemKind::Ammunition(unit)) => {
                !unit.fired && catalog.compatible(&unit.type_id, tags)
            }
            (ItemQuery::LoadedMagazine { tags }, ItemKind::Magazine(mag)) => {
                !mag.rounds.is_empty() && mag.tags.iter().any(|t| tags.contains(t))
            }
            (ItemQuery::Powder, ItemKind::Powder { .. }) => true,
            (ItemQuery::Wadding, ItemKind::Wadding) => true,
            (ItemQuery::Tool(wanted), ItemKind::Tool(kind)) => wanted == kind,
            (ItemQuery::AnyTool(wanted), ItemKind::Tool(kind)) => wanted.contains(kind),
            (ItemQuery::PowerPack, ItemKind::PowerPack(_)) => true,
            (ItemQuery::Bayonet, ItemKind::Bayonet) => true,
            (ItemQuery::Specific(id), _) => item.id == *id,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub role: String,
    pub query: ItemQuery,
    /// Optional roles are bound when available and never block a plan
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadTemplate {
    pub requirements: Vec<Requirement>,
    pub hands_needed: u8,
}

impl LoadTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, role: &str, query: ItemQuery) -> Self {
        self.requirements.push(Requirement {
            role: role.to_string(),
            query,
            optional: false,
        });
        self
    }

    pub fn optional(mut self, role: &str, query: ItemQuery) -> Self {
        self.requirements.push(Requirement {
            role: role.to_string(),
            query,
            optional: true,
        });
        self
    }

    pub fn hands(mut self, hands: u8) -> Self {
        self.hands_needed = hands;
        self
    }
}

/// Items bound to the roles of an executed template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundItems {
    roles: BTreeMap<String, ItemId>,
}

impl BoundItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, role: &str, item: ItemId) {
        self.roles.insert(role.to_string(), item);
    }

    pub fn get(&self, role: &str) -> Option<ItemId> {
        self.roles.get(role).copied()
    }

    pub fn require(&self, role: &str) -> Result<ItemId> {
        self.get(role)
            .ok_or_else(|| ArmsError::Invariant(format!("no item bound to role '{}'", role)))
    }

    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.roles.values().copied()
    }
}

/// Boundary to the inventory-planning collaborator
pub trait InventoryPlanner {
    fn evaluate(
        &self,
        actor: ActorId,
        template: &LoadTemplate,
        actors: &ActorRoster,
        items: &ItemArena,
        catalog: &AmmoCatalog,
    ) -> Feasibility;

    fn execute(
        &self,
        actor: ActorId,
        template: &LoadTemplate,
        actors: &ActorRoster,
        items: &mut ItemArena,
        catalog: &AmmoCatalog,
    ) -> Result<BoundItems>;
}

/// Planner that only looks at what the actor is carrying
#[derive(Debug, Clone, Copy, Default)]
pub struct PocketPlanner;

impl PocketPlanner {
    fn find(
        actor: ActorId,
        query: &ItemQuery,
        items: &ItemArena,
        catalog: &AmmoCatalog,
        taken: &[ItemId],
    ) -> Option<ItemId> {
        items.carried_by(actor).into_iter().find(|id| {
            !taken.contains(id)
                && items
                    .get(*id)
                    .map_or(false, |item| query.matches(item, catalog))
        })
    }
}

impl InventoryPlanner for PocketPlanner {
    fn evaluate(
        &self,
        actor: ActorId,
        template: &LoadTemplate,
        actors: &ActorRoster,
        items: &ItemArena,
        catalog: &AmmoCatalog,
    ) -> Feasibility {
        let Some(wielder) = actors.get(actor) else {
            return Feasibility::NotFeasibleNotEnoughWielders;
        };
        if wielder.incapacitated {
            return Feasibility::NotFeasibleNotEnoughWielders;
        }
        if wielder.free_hands < template.hands_needed {
            return Feasibility::NotFeasibleNotEnoughHands;
        }
        let mut taken = Vec::new();
        for req in &template.requirements {
            match Self::find(actor, &req.query, items, catalog, &taken) {
                Some(id) => taken.push(id),
                None if req.optional => {}
                None => return Feasibility::NotFeasibleMissingItems,
            }
        }
        Feasibility::Feasible
    }

    fn execute(
        &self,
        actor: ActorId,
        template: &LoadTemplate,
        actors: &ActorRoster,
        items: &mut ItemArena,
        catalog: &AmmoCatalog,
    ) -> Result<BoundItems> {
        let verdict = self.evaluate(actor, template, actors, items, catalog);
        if verdict != Feasibility::Feasible {
            return Err(ArmsError::Invariant(format!(
                "executed an infeasible load plan ({:?})",
                verdict
            )));
        }
        let mut bound = BoundItems::new();
        let mut taken = Vec::new();
        for req in &template.requirements {
            if let Some(id) = Self::find(actor, &req.query, items, catalog, &taken) {
                taken.push(id);
                // Stacks give up a single unit; the rest stays in the pocket
                let single = match req.query {
                    ItemQuery::Tool(_) | ItemQuery::AnyTool(_) => id,
                    _ => items.split_one(id)?,
                };
                bound.bind(&req.role, single);
            }
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ammo::AmmunitionUnit;
    use crate::core::types::{CellId, Position};
    use crate::world::items::Location;

    fn setup() -> (ActorRoster, ItemArena, AmmoCatalog, ActorId) {
        let mut actors = ActorRoster::new();
        let archer = actors.spawn("Ada", Position::ground(CellId(2)));
        (actors, ItemArena::new(), AmmoCatalog::with_defaults(), archer)
    }

    fn arrows() -> ItemQuery {
        ItemQuery::ammunition(&["arrow".to_string()])
    }

    #[test]
    fn test_missing_items() {
        let (actors, items, catalog, archer) = setup();
        let template = LoadTemplate::new().require("loaditem", arrows()).hands(1);
        assert_eq!(
            PocketPlanner.evaluate(archer, &template, &actors, &items, &catalog),
            Feasibility::NotFeasibleMissingItems
        );
    }

    #[test]
    fn test_not_enough_hands_checked_before_items() {
        let (mut actors, items, catalog, archer) = setup();
        actors.get_mut(archer).unwrap().free_hands = 0;
        let template = LoadTemplate::new().require("loaditem", arrows()).hands(1);
        assert_eq!(
            PocketPlanner.evaluate(archer, &template, &actors, &items, &catalog),
            Feasibility::NotFeasibleNotEnoughHands
        );
    }

    #[test]
    fn test_incapacitated_actor_cannot_wield() {
        let (mut actors, items, catalog, archer) = setup();
        actors.get_mut(archer).unwrap().incapacitated = true;
        assert_eq!(
            PocketPlanner.evaluate(archer, &LoadTemplate::new(), &actors, &items, &catalog),
            Feasibility::NotFeasibleNotEnoughWielders
        );
    }

    #[test]
    fn test_execute_splits_stack() {
        let (actors, mut items, catalog, archer) = setup();
        let quiver = items.spawn_stack(
            "arrow",
            ItemKind::Ammunition(AmmunitionUnit::new("broadhead-arrow", 5.0)),
            Location::Carried(archer),
            12,
        );
        let template = LoadTemplate::new().require("loaditem", arrows());
        let bound = PocketPlanner
            .execute(archer, &template, &actors, &mut items, &catalog)
            .unwrap();
        let arrow = bound.get("loaditem").unwrap();
        assert_ne!(arrow, quiver);
        assert_eq!(items.get(quiver).unwrap().quantity, 11);
    }

    #[test]
    fn test_optional_roles_do_not_block() {
        let (actors, mut items, catalog, archer) = setup();
        items.spawn(
            "powder horn",
            ItemKind::Powder { quality: 5.0, wet: false },
            Location::Carried(archer),
        );
        let template = LoadTemplate::new()
            .require("powder", ItemQuery::Powder)
            .optional("wadding", ItemQuery::Wadding);
        let bound = PocketPlanner
            .execute(archer, &template, &actors, &mut items, &catalog)
            .unwrap();
        assert!(bound.get("powder").is_some());
        assert!(bound.get("wadding").is_none());
    }
}
