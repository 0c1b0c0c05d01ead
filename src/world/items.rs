//! Item arena with explicit ownership transfer
//!
//! Every physical object lives here keyed by `ItemId`. Containment is
//! recorded only on the contained item (`Location`), plus the ordered round
//! list of a detachable magazine; `attach` and `detach` keep both in step so
//! removing one side cannot leave a dangling back-reference.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::ammo::{AmmoTypeId, AmmunitionUnit};
use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, CombatId, ItemId, Position, Tick, WoundId};
use crate::world::actor::ActorRoster;
use crate::world::body::Target;

/// Where an item currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// In flight or otherwise outside the world
    Nowhere,
    Carried(ActorId),
    Ground(Position),
    /// Loaded into, or mounted on, a weapon or other host item
    InWeapon(ItemId),
    /// Held in a detachable magazine's round list
    InMagazine(ItemId),
    /// Embedded in a wound
    Lodged { target: Target, wound: WoundId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolKind {
    Ramrod,
    CleaningKit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Magazine {
    pub capacity: usize,
    /// Next round to feed is at index 0
    pub rounds: Vec<ItemId>,
    /// Ammunition tags this magazine accepts
    pub tags: Vec<String>,
}

impl Magazine {
    pub fn new(capacity: usize, tags: &[&str]) -> Self {
        Self {
            capacity,
            rounds: Vec::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.rounds.len() >= self.capacity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerPack {
    pub capacity: f32,
    pub charge: f32,
    /// Charge regained per recharge step; zero for single-use packs
    pub recharge_rate: f32,
}

impl PowerPack {
    pub fn new(capacity: f32, recharge_rate: f32) -> Self {
        Self {
            capacity,
            charge: capacity,
            recharge_rate,
        }
    }

    pub fn is_full(&self) -> bool {
        self.charge >= self.capacity
    }

    pub fn is_rechargeable(&self) -> bool {
        self.recharge_rate > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    Ammunition(AmmunitionUnit),
    /// Spent case left behind by a cartridge
    Casing { from: AmmoTypeId },
    /// Short-lived remains of a broken projectile
    Fragment { from: AmmoTypeId },
    Magazine(Magazine),
    Powder { quality: f32, wet: bool },
    Wadding,
    Tool(ToolKind),
    PowerPack(PowerPack),
    Bayonet,
    Weapon,
    /// Furniture, walls and anything else that can stop a shot
    Scenery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub location: Location,
    pub quantity: u32,
    /// Nobody may pick the item up before this tick
    pub no_pickup_until: Option<Tick>,
    /// Fight the item was dropped in
    pub combat: Option<CombatId>,
}

impl Item {
    pub fn can_pick_up(&self, now: Tick) -> bool {
        self.no_pickup_until.map_or(true, |until| now >= until)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemArena {
    items: AHashMap<ItemId, Item>,
    next_id: u64,
}

impl ItemArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, name: &str, kind: ItemKind, location: Location) -> ItemId {
        self.spawn_stack(name, kind, location, 1)
    }

    pub fn spawn_stack(
        &mut self,
        name: &str,
        kind: ItemKind,
        location: Location,
        quantity: u32,
    ) -> ItemId {
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.items.insert(
            id,
            Item {
                id,
                name: name.to_string(),
                kind,
                location: Location::Nowhere,
                quantity: quantity.max(1),
                no_pickup_until: None,
                combat: None,
            },
        );
        // A fresh item has no previous host, so placing it cannot fail
        // except for a full magazine, which leaves it Nowhere.
        if let Err(e) = self.place(id, location) {
            tracing::warn!("spawned {:?} could not be placed: {}", id, e);
        }
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn require(&self, id: ItemId) -> Result<&Item> {
        self.items.get(&id).ok_or(ArmsError::ItemNotFound(id))
    }

    pub fn require_mut(&mut self, id: ItemId) -> Result<&mut Item> {
        self.items.get_mut(&id).ok_or(ArmsError::ItemNotFound(id))
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn name(&self, id: ItemId) -> String {
        self.items
            .get(&id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "something".to_string())
    }

    /// Destroy an item, unhooking it from any magazine that lists it
    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        self.unhook(id);
        self.items.remove(&id)
    }

    /// Place `item` inside `host`. Magazines take it onto their round list.
    pub fn attach(&mut self, item: ItemId, host: ItemId) -> Result<()> {
        let host_is_magazine = matches!(self.require(host)?.kind, ItemKind::Magazine(_));
        let location = if host_is_magazine {
            Location::InMagazine(host)
        } else {
            Location::InWeapon(host)
        };
        self.detach(item, location)
    }

    /// Take `item` out of wherever it is and put it at `to`
    pub fn detach(&mut self, item: ItemId, to: Location) -> Result<()> {
        self.require(item)?;
        self.unhook(item);
        self.place(item, to)
    }

    fn unhook(&mut self, item: ItemId) {
        let previous = match self.items.get(&item) {
            Some(i) => i.location,
            None => return,
        };
        if let Location::InMagazine(mag) = previous {
            if let Some(Item {
                kind: ItemKind::Magazine(m),
                ..
            }) = self.items.get_mut(&mag)
            {
                m.rounds.retain(|r| *r != item);
            }
        }
        if let Some(i) = self.items.get_mut(&item) {
            i.location = Location::Nowhere;
        }
    }

    fn place(&mut self, item: ItemId, to: Location) -> Result<()> {
        if let Location::InMagazine(mag) = to {
            match self.items.get_mut(&mag) {
                Some(Item {
                    kind: ItemKind::Magazine(m),
                    ..
                }) => {
                    if m.is_full() {
                        return Err(ArmsError::Invariant(format!(
                            "magazine {:?} is full",
                            mag
                        )));
                    }
                    m.rounds.push(item);
                }
                Some(_) => return Err(ArmsError::WrongItemKind(mag, "a magazine")),
                None => return Err(ArmsError::ItemNotFound(mag)),
            }
        }
        self.require_mut(item)?.location = to;
        Ok(())
    }

    /// Take one unit off a stack. Returns the item itself for singletons.
    pub fn split_one(&mut self, id: ItemId) -> Result<ItemId> {
        let item = self.require_mut(id)?;
        if item.quantity <= 1 {
            return Ok(id);
        }
        item.quantity -= 1;
        let (name, kind, location) = (item.name.clone(), item.kind.clone(), item.location);
        let location = match location {
            // The split unit is not on the magazine's list yet
            Location::InMagazine(_) => Location::Nowhere,
            other => other,
        };
        Ok(self.spawn(&name, kind, location))
    }

    /// Items carried by an actor, ascending by id
    pub fn carried_by(&self, actor: ActorId) -> Vec<ItemId> {
        self.ids_where(|i| i.location == Location::Carried(actor))
    }

    /// Items loaded into or mounted on a host, ascending by id
    pub fn contents_of(&self, host: ItemId) -> Vec<ItemId> {
        self.ids_where(|i| i.location == Location::InWeapon(host))
    }

    pub fn ids_where(&self, pred: impl Fn(&Item) -> bool) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .items
            .values()
            .filter(|i| pred(i))
            .map(|i| i.id)
            .collect();
        ids.sort();
        ids
    }

    /// The ammunition unit of an item
    pub fn ammo(&self, id: ItemId) -> Result<&AmmunitionUnit> {
        match &self.require(id)?.kind {
            ItemKind::Ammunition(unit) => Ok(unit),
            _ => Err(ArmsError::WrongItemKind(id, "ammunition")),
        }
    }

    pub fn magazine(&self, id: ItemId) -> Result<&Magazine> {
        match &self.require(id)?.kind {
            ItemKind::Magazine(m) => Ok(m),
            _ => Err(ArmsError::WrongItemKind(id, "a magazine")),
        }
    }

    pub fn power_pack(&self, id: ItemId) -> Result<&PowerPack> {
        match &self.require(id)?.kind {
            ItemKind::PowerPack(p) => Ok(p),
            _ => Err(ArmsError::WrongItemKind(id, "a power pack")),
        }
    }

    pub fn power_pack_mut(&mut self, id: ItemId) -> Result<&mut PowerPack> {
        match &mut self.require_mut(id)?.kind {
            ItemKind::PowerPack(p) => Ok(p),
            _ => Err(ArmsError::WrongItemKind(id, "a power pack")),
        }
    }

    /// Resolve the world position of an item through its hosts
    pub fn position_of(&self, id: ItemId, actors: &ActorRoster) -> Option<Position> {
        let mut current = id;
        // Containment chains are short; the bound guards against cycles
        for _ in 0..16 {
            match self.items.get(&current)?.location {
                Location::Nowhere => return None,
                Location::Carried(actor) => return actors.get(actor).map(|a| a.position),
                Location::Ground(pos) => return Some(pos),
                Location::InWeapon(host) | Location::InMagazine(host) => current = host,
                Location::Lodged { target, .. } => match target {
                    Target::Actor(actor) => return actors.get(actor).map(|a| a.position),
                    Target::Item(host) => current = host,
                },
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CellId;

    fn round() -> ItemKind {
        ItemKind::Ammunition(AmmunitionUnit::new("pistol-round", 5.0))
    }

    #[test]
    fn test_attach_to_magazine_tracks_rounds() {
        let mut items = ItemArena::new();
        let mag = items.spawn("magazine", ItemKind::Magazine(Magazine::new(2, &["pistol"])), Location::Nowhere);
        let a = items.spawn("round", round(), Location::Nowhere);
        let b = items.spawn("round", round(), Location::Nowhere);
        items.attach(a, mag).unwrap();
        items.attach(b, mag).unwrap();
        assert_eq!(items.magazine(mag).unwrap().rounds, vec![a, b]);
        assert_eq!(items.get(a).unwrap().location, Location::InMagazine(mag));

        let c = items.spawn("round", round(), Location::Nowhere);
        assert!(items.attach(c, mag).is_err());
        assert_eq!(items.get(c).unwrap().location, Location::Nowhere);
    }

    #[test]
    fn test_detach_unhooks_from_magazine() {
        let mut items = ItemArena::new();
        let mag = items.spawn("magazine", ItemKind::Magazine(Magazine::new(2, &[])), Location::Nowhere);
        let a = items.spawn("round", round(), Location::InMagazine(mag));
        items.detach(a, Location::Carried(ActorId(1))).unwrap();
        assert!(items.magazine(mag).unwrap().rounds.is_empty());
        assert_eq!(items.carried_by(ActorId(1)), vec![a]);
    }

    #[test]
    fn test_remove_unhooks_from_magazine() {
        let mut items = ItemArena::new();
        let mag = items.spawn("magazine", ItemKind::Magazine(Magazine::new(2, &[])), Location::Nowhere);
        let a = items.spawn("round", round(), Location::InMagazine(mag));
        assert!(items.remove(a).is_some());
        assert!(items.magazine(mag).unwrap().rounds.is_empty());
    }

    #[test]
    fn test_split_one_from_stack() {
        let mut items = ItemArena::new();
        let stack = items.spawn_stack("arrow", round(), Location::Carried(ActorId(1)), 3);
        let single = items.split_one(stack).unwrap();
        assert_ne!(single, stack);
        assert_eq!(items.get(stack).unwrap().quantity, 2);
        assert_eq!(items.get(single).unwrap().quantity, 1);
        assert_eq!(items.get(single).unwrap().location, Location::Carried(ActorId(1)));
    }

    #[test]
    fn test_split_one_of_singleton_is_identity() {
        let mut items = ItemArena::new();
        let one = items.spawn("arrow", round(), Location::Nowhere);
        assert_eq!(items.split_one(one).unwrap(), one);
    }

    #[test]
    fn test_position_resolves_through_hosts() {
        let mut actors = ActorRoster::new();
        let archer = actors.spawn("Ada", Position::ground(CellId(3)));
        let mut items = ItemArena::new();
        let gun = items.spawn("gun", ItemKind::Weapon, Location::Carried(archer));
        let mag = items.spawn("magazine", ItemKind::Magazine(Magazine::new(5, &[])), Location::InWeapon(gun));
        let r = items.spawn("round", round(), Location::InMagazine(mag));
        assert_eq!(items.position_of(r, &actors), Some(Position::ground(CellId(3))));

        let loose = items.spawn("round", round(), Location::Nowhere);
        assert_eq!(items.position_of(loose, &actors), None);
    }

    #[test]
    fn test_pickup_grace() {
        let mut items = ItemArena::new();
        let id = items.spawn("arrow", round(), Location::Nowhere);
        items.get_mut(id).unwrap().no_pickup_until = Some(10);
        assert!(!items.get(id).unwrap().can_pick_up(9));
        assert!(items.get(id).unwrap().can_pick_up(10));
    }
}
