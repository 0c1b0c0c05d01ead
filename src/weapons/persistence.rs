//! Save/restore of weapon state
//!
//! Snapshots hold discrete state and item references only; the items
//! themselves live in the arena and are saved with it. Restoring
//! re-resolves every reference against the arena: a missing or repeated
//! reference is logged and dropped, never fatal.
//!
//! In-progress timed steps are not saved. A weapon restored mid-draw or
//! mid-load is simply at its last completed stage.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ammo::AmmoTypeId;
use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, ItemId};
use crate::weapons::magazine::Feed;
use crate::weapons::melee::Mass;
use crate::weapons::{
    Bow, Chamber, EnergyWeapon, LoadStage, Lockable, MagazineWeapon, Musket, Revolver, Weapon, WeaponCore,
    WeaponProfile,
};
use crate::world::items::{ItemArena, Location};
use crate::world::World;

/// Current save format
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    pub id: ItemId,
    pub profile: WeaponProfile,
    pub safety: bool,
    pub readied: bool,
    pub condition: f32,
    /// Who was holding it
    pub wielder: Option<ActorId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum WeaponSnapshot {
    Bow {
        core: CoreSnapshot,
        nocked: Option<ItemId>,
    },
    Magazine {
        core: CoreSnapshot,
        feed: Feed,
        chamber: Option<ItemId>,
        heft: Mass,
    },
    Revolver {
        core: CoreSnapshot,
        chambers: Vec<Chamber>,
        current: usize,
        open: bool,
    },
    Energy {
        core: CoreSnapshot,
        pack: Option<ItemId>,
        wattage: f32,
        bolt: AmmoTypeId,
    },
    Musket {
        core: CoreSnapshot,
        /// `LoadStage` index; anything past 4 restores as unloaded
        stage: u8,
        needs_cleaning: bool,
        jammed: bool,
        tap_loaded: bool,
        skipped_cleaning: bool,
        wet_powder: bool,
        wadding: bool,
        bayonet: Option<ItemId>,
        charge: Vec<ItemId>,
    },
}

/// Everything saved for a world's weapons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorySnapshot {
    pub version: u32,
    pub weapons: Vec<WeaponSnapshot>,
}

impl WeaponSnapshot {
    pub fn id(&self) -> ItemId {
        self.core().id
    }

    pub fn core(&self) -> &CoreSnapshot {
        match self {
            WeaponSnapshot::Bow { core, .. }
            | WeaponSnapshot::Magazine { core, .. }
            | WeaponSnapshot::Revolver { core, .. }
            | WeaponSnapshot::Energy { core, .. }
            | WeaponSnapshot::Musket { core, .. } => core,
        }
    }
}

fn snapshot_core(core: &WeaponCore, items: &ItemArena) -> CoreSnapshot {
    let wielder = match items.get(core.id).map(|i| i.location) {
        Some(Location::Carried(actor)) => Some(actor),
        _ => None,
    };
    CoreSnapshot {
        id: core.id,
        profile: core.profile.clone(),
        safety: core.safety,
        readied: core.readied,
        condition: core.condition,
        wielder,
    }
}

pub fn snapshot(weapon: &Weapon, items: &ItemArena) -> WeaponSnapshot {
    match weapon {
        Weapon::Bow(bow) => WeaponSnapshot::Bow {
            core: snapshot_core(&bow.core, items),
            nocked: bow.nocked,
        },
        Weapon::Magazine(gun) => WeaponSnapshot::Magazine {
            core: snapshot_core(&gun.core, items),
            feed: gun.feed.clone(),
            chamber: gun.chamber,
            heft: gun.heft,
        },
        Weapon::Revolver(revolver) => WeaponSnapshot::Revolver {
            core: snapshot_core(&revolver.core, items),
            chambers: revolver.chambers().to_vec(),
            current: revolver.current(),
            open: revolver.is_open(),
        },
        Weapon::Energy(gun) => WeaponSnapshot::Energy {
            core: snapshot_core(&gun.core, items),
            pack: gun.pack,
            wattage: gun.wattage,
            bolt: gun.bolt.clone(),
        },
        Weapon::Musket(musket) => WeaponSnapshot::Musket {
            core: snapshot_core(&musket.core, items),
            stage: musket.stage.index(),
            needs_cleaning: musket.needs_cleaning,
            jammed: musket.jammed,
            tap_loaded: musket.tap_loaded,
            skipped_cleaning: musket.skipped_cleaning,
            wet_powder: musket.wet_powder,
            wadding: musket.wadding,
            bayonet: musket.bayonet,
            charge: musket.barrel_contents(items),
        },
    }
}

pub fn to_json(snapshot: &WeaponSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

pub fn from_json(json: &str) -> Result<WeaponSnapshot> {
    Ok(serde_json::from_str(json)?)
}

/// Re-resolves references for one weapon being restored. `claimed` holds
/// every item already taken by this or an earlier weapon in the same restore.
struct Resolver<'a> {
    items: &'a mut ItemArena,
    weapon: ItemId,
    claimed: &'a mut AHashSet<ItemId>,
}

impl<'a> Resolver<'a> {
    fn new(items: &'a mut ItemArena, weapon: ItemId, claimed: &'a mut AHashSet<ItemId>) -> Self {
        Self {
            items,
            weapon,
            claimed,
        }
    }

    /// The reference if it still names a distinct item, put back inside the weapon
    fn resolve(&mut self, id: ItemId) -> Result<Option<ItemId>> {
        if !self.items.contains(id) {
            warn!(weapon = ?self.weapon, item = ?id, "referenced item is gone, skipped");
            return Ok(None);
        }
        if !self.claimed.insert(id) {
            warn!(weapon = ?self.weapon, item = ?id, "item already claimed, skipped");
            return Ok(None);
        }
        if self.items.require(id)?.location != Location::InWeapon(self.weapon) {
            debug!(weapon = ?self.weapon, item = ?id, "reattaching item");
            self.items.attach(id, self.weapon)?;
        }
        Ok(Some(id))
    }

    fn resolve_opt(&mut self, id: Option<ItemId>) -> Result<Option<ItemId>> {
        match id {
            Some(id) => self.resolve(id),
            None => Ok(None),
        }
    }

    fn core(&mut self, saved: &CoreSnapshot) -> Result<WeaponCore> {
        let item = self.items.require(saved.id)?;
        if let Some(actor) = saved.wielder {
            if item.location != Location::Carried(actor) {
                warn!(weapon = ?saved.id, ?actor, "weapon was not with its wielder, returned");
                self.items.detach(saved.id, Location::Carried(actor))?;
            }
        }
        let mut core = WeaponCore::new(saved.id, saved.profile.clone());
        core.safety = saved.safety;
        core.readied = saved.readied;
        core.condition = saved.condition;
        Ok(core)
    }
}

/// Rebuild a weapon from its snapshot. The weapon's own item must exist.
pub fn restore(snapshot: &WeaponSnapshot, items: &mut ItemArena) -> Result<Weapon> {
    restore_claiming(snapshot, items, &mut AHashSet::new())
}

/// As [`restore`], skipping any referenced item already in `claimed`
fn restore_claiming(
    snapshot: &WeaponSnapshot,
    items: &mut ItemArena,
    claimed: &mut AHashSet<ItemId>,
) -> Result<Weapon> {
    let mut resolver = Resolver::new(items, snapshot.id(), claimed);
    let weapon = match snapshot {
        WeaponSnapshot::Bow { core, nocked } => {
            let mut bow = Bow::new(core.id, core.profile.clone());
            bow.core = resolver.core(core)?;
            bow.nocked = resolver.resolve_opt(*nocked)?;
            Weapon::Bow(bow)
        }
        WeaponSnapshot::Magazine {
            core,
            feed,
            chamber,
            heft,
        } => {
            let core = resolver.core(core)?;
            let feed = match feed {
                Feed::Detachable { magazine } => Feed::Detachable {
                    magazine: resolver.resolve_opt(*magazine)?,
                },
                Feed::InternalTube { capacity, rounds } => {
                    let mut kept = Vec::new();
                    for round in rounds {
                        if kept.len() >= *capacity {
                            warn!(weapon = ?core.id, item = ?round, "tube over capacity, skipped");
                            continue;
                        }
                        kept.extend(resolver.resolve(*round)?);
                    }
                    Feed::InternalTube {
                        capacity: *capacity,
                        rounds: kept,
                    }
                }
            };
            let mut gun = MagazineWeapon::new(core.id, core.profile.clone(), feed, *heft);
            gun.chamber = resolver.resolve_opt(*chamber)?;
            gun.core = core;
            Weapon::Magazine(gun)
        }
        WeaponSnapshot::Revolver {
            core,
            chambers,
            current,
            open,
        } => {
            let core = resolver.core(core)?;
            let mut restored = Vec::with_capacity(chambers.len());
            for chamber in chambers {
                let chamber = match *chamber {
                    Chamber::Empty => Chamber::Empty,
                    Chamber::Live(id) => resolver.resolve(id)?.map_or(Chamber::Empty, Chamber::Live),
                    Chamber::Spent(id) => resolver.resolve(id)?.map_or(Chamber::Empty, Chamber::Spent),
                };
                restored.push(chamber);
            }
            Weapon::Revolver(Revolver::from_parts(core, restored, *current, *open)?)
        }
        WeaponSnapshot::Energy {
            core,
            pack,
            wattage,
            bolt,
        } => {
            let mut gun = EnergyWeapon::new(core.id, core.profile.clone(), *wattage, &bolt.0);
            gun.core = resolver.core(core)?;
            gun.pack = resolver.resolve_opt(*pack)?;
            Weapon::Energy(gun)
        }
        WeaponSnapshot::Musket {
            core,
            stage,
            needs_cleaning,
            jammed,
            tap_loaded,
            skipped_cleaning,
            wet_powder,
            wadding,
            bayonet,
            charge,
        } => {
            let mut musket = Musket::new(core.id, core.profile.clone());
            musket.core = resolver.core(core)?;
            musket.stage = LoadStage::from_index(*stage).unwrap_or_else(|| {
                warn!(weapon = ?core.id, stage, "invalid load stage, restored as unloaded");
                LoadStage::Unloaded
            });
            musket.needs_cleaning = *needs_cleaning;
            musket.jammed = *jammed;
            musket.tap_loaded = *tap_loaded;
            musket.skipped_cleaning = *skipped_cleaning;
            musket.wet_powder = *wet_powder;
            musket.wadding = *wadding;
            musket.bayonet = resolver.resolve_opt(*bayonet)?;
            for item in charge {
                resolver.resolve(*item)?;
            }
            Weapon::Musket(musket)
        }
    };
    Ok(weapon)
}

/// Snapshot every weapon in the world, ordered by id
pub fn save_armory(world: &World) -> Result<String> {
    let mut ids: Vec<ItemId> = world.weapons.keys().copied().collect();
    ids.sort();
    let weapons = ids
        .into_iter()
        .filter_map(|id| world.weapons.get(&id))
        .map(|w| snapshot(w, &world.items))
        .collect();
    let armory = ArmorySnapshot {
        version: SNAPSHOT_VERSION,
        weapons,
    };
    Ok(serde_json::to_string_pretty(&armory)?)
}

/// Restore saved weapons into the world, replacing any with the same id.
/// Weapons whose own item is gone are skipped, and an item referenced by
/// more than one weapon stays with the first. Returns how many came back.
pub fn restore_armory(world: &mut World, json: &str) -> Result<usize> {
    let armory: ArmorySnapshot = serde_json::from_str(json)?;
    if armory.version != SNAPSHOT_VERSION {
        return Err(ArmsError::Config(format!(
            "unsupported weapon snapshot version {}",
            armory.version
        )));
    }
    let mut restored = 0;
    let mut claimed = AHashSet::new();
    for saved in &armory.weapons {
        if !world.items.contains(saved.id()) {
            warn!(weapon = ?saved.id(), "weapon item is gone, not restored");
            continue;
        }
        let weapon = restore_claiming(saved, &mut world.items, &mut claimed)?;
        world.weapons.insert(saved.id(), weapon);
        restored += 1;
    }
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ammo::AmmunitionUnit;
    use crate::core::types::{CellId, Position};
    use crate::world::items::ItemKind;

    fn round(world: &mut World, host: ItemId) -> ItemId {
        world.items.spawn(
            "a pistol round",
            ItemKind::Ammunition(AmmunitionUnit::new("pistol-round", 5.0)),
            Location::InWeapon(host),
        )
    }

    #[test]
    fn test_revolver_round_trip_is_idempotent() {
        let mut world = World::new(1);
        let actor = world.actors.spawn("Cass", Position::ground(CellId(2)));
        let id = world
            .spawn_weapon("a six-shot revolver", Location::Carried(actor), |id| {
                Ok(Weapon::Revolver(Revolver::six_shooter(id)?))
            })
            .unwrap();
        let a = round(&mut world, id);
        let b = round(&mut world, id);
        let mut chambers = vec![Chamber::Empty; 6];
        chambers[0] = Chamber::Live(a);
        chambers[2] = Chamber::Spent(b);
        let core = WeaponCore::new(id, WeaponProfile::new("a six-shot revolver", &["pistol"]));
        let revolver = Revolver::from_parts(core, chambers, 2, false).unwrap();
        world.weapons.insert(id, Weapon::Revolver(revolver));

        let first = to_json(&snapshot(world.weapon(id).unwrap(), &world.items)).unwrap();
        let restored = restore(&from_json(&first).unwrap(), &mut world.items).unwrap();
        let second = to_json(&snapshot(&restored, &world.items)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_reference_is_skipped() {
        let mut world = World::new(1);
        let actor = world.actors.spawn("Cass", Position::ground(CellId(2)));
        let id = world
            .spawn_weapon("a longbow", Location::Carried(actor), |id| Ok(Weapon::Bow(Bow::longbow(id))))
            .unwrap();
        let saved = WeaponSnapshot::Bow {
            core: snapshot_core(&Bow::longbow(id).core, &world.items),
            nocked: Some(ItemId(999)),
        };
        let Weapon::Bow(bow) = restore(&saved, &mut world.items).unwrap() else {
            panic!("not a bow");
        };
        assert_eq!(bow.nocked, None);
    }

    #[test]
    fn test_duplicate_reference_is_skipped() {
        let mut world = World::new(1);
        let actor = world.actors.spawn("Cass", Position::ground(CellId(2)));
        let id = world
            .spawn_weapon("a six-shot revolver", Location::Carried(actor), |id| {
                Ok(Weapon::Revolver(Revolver::six_shooter(id)?))
            })
            .unwrap();
        let a = round(&mut world, id);
        let mut saved = snapshot(world.weapon(id).unwrap(), &world.items);
        if let WeaponSnapshot::Revolver { chambers, .. } = &mut saved {
            chambers[0] = Chamber::Live(a);
            chambers[1] = Chamber::Live(a);
        }
        let Weapon::Revolver(revolver) = restore(&saved, &mut world.items).unwrap() else {
            panic!("not a revolver");
        };
        assert_eq!(revolver.chambers()[0], Chamber::Live(a));
        assert_eq!(revolver.chambers()[1], Chamber::Empty);
    }

    #[test]
    fn test_invalid_musket_stage_restores_unloaded() {
        let mut world = World::new(1);
        let actor = world.actors.spawn("Ezra", Position::ground(CellId(2)));
        let id = world
            .spawn_weapon("a flintlock musket", Location::Carried(actor), |id| {
                Ok(Weapon::Musket(Musket::flintlock(id)))
            })
            .unwrap();
        let mut saved = snapshot(world.weapon(id).unwrap(), &world.items);
        if let WeaponSnapshot::Musket { stage, jammed, .. } = &mut saved {
            *stage = 9;
            *jammed = true;
        }
        let Weapon::Musket(musket) = restore(&saved, &mut world.items).unwrap() else {
            panic!("not a musket");
        };
        assert_eq!(musket.stage, LoadStage::Unloaded);
        assert!(musket.jammed);
    }

    #[test]
    fn test_snapshot_json_is_tagged_by_family() {
        let saved = WeaponSnapshot::Bow {
            core: CoreSnapshot {
                id: ItemId(3),
                profile: WeaponProfile::new("a longbow", &["arrow"]),
                safety: false,
                readied: false,
                condition: 1.0,
                wielder: None,
            },
            nocked: None,
        };
        let json = to_json(&saved).unwrap();
        assert!(json.contains("\"family\":\"bow\""));
    }

    #[test]
    fn test_armory_rejects_unknown_version() {
        let mut world = World::new(1);
        let result = restore_armory(&mut world, "{\"version\": 7, \"weapons\": []}");
        assert!(matches!(result, Err(ArmsError::Config(_))));
    }
}
