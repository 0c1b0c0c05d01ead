//! Save and restore integration tests

use firelock::actions::{self, WeaponAction};
use firelock::ammo::AmmunitionUnit;
use firelock::core::types::{ActorId, CellId, ItemId, Position};
use firelock::weapons::persistence::{restore_armory, save_armory};
use firelock::weapons::{
    Bow, Chamber, Feed, LoadStage, MagazineWeapon, Musket, Revolver, Weapon, WeaponProfile,
};
use firelock::world::items::{ItemKind, Location, Magazine};
use firelock::world::World;

fn pistol_round(world: &mut World, location: Location) -> ItemId {
    world.items.spawn(
        "a pistol round",
        ItemKind::Ammunition(AmmunitionUnit::new("pistol-round", 5.0)),
        location,
    )
}

/// A shooter carrying a half-loaded musket, a revolver with a gap in the
/// cylinder and a pistol with its safety on
fn armed_world() -> (World, ActorId, [ItemId; 3]) {
    let mut world = World::new(3);
    let actor = world.actors.spawn("Ezra", Position::ground(CellId(1)));
    let carried = Location::Carried(actor);

    let musket = world
        .spawn_weapon("a flintlock musket", carried, |id| {
            Ok(Weapon::Musket(Musket::flintlock(id)))
        })
        .unwrap();
    world.items.spawn(
        "a measure of powder",
        ItemKind::Powder {
            quality: 4.0,
            wet: true,
        },
        Location::InWeapon(musket),
    );
    world.items.spawn(
        "a musket ball",
        ItemKind::Ammunition(AmmunitionUnit::new("musket-ball", 5.0)),
        Location::InWeapon(musket),
    );
    if let Some(Weapon::Musket(m)) = world.weapons.get_mut(&musket) {
        m.stage = LoadStage::Balled;
        m.wet_powder = true;
        m.skipped_cleaning = true;
    }

    let revolver = world
        .spawn_weapon("a revolver", carried, |id| {
            Ok(Weapon::Revolver(Revolver::new(
                id,
                WeaponProfile::new("a revolver", &["pistol"]),
                3,
            )?))
        })
        .unwrap();
    let a = pistol_round(&mut world, Location::InWeapon(revolver));
    let b = pistol_round(&mut world, Location::InWeapon(revolver));
    if let Some(Weapon::Revolver(rev)) = world.weapons.get_mut(&revolver) {
        let core = rev.core.clone();
        *rev = Revolver::from_parts(
            core,
            vec![Chamber::Live(a), Chamber::Empty, Chamber::Live(b)],
            1,
            false,
        )
        .unwrap();
    }

    let pistol = world
        .spawn_weapon("a pistol", carried, |id| {
            Ok(Weapon::Magazine(MagazineWeapon::pistol(id)))
        })
        .unwrap();
    let magazine = world.items.spawn(
        "a pistol magazine",
        ItemKind::Magazine(Magazine::new(8, &["pistol"])),
        carried,
    );
    for _ in 0..3 {
        let round = pistol_round(&mut world, Location::Nowhere);
        world.items.attach(round, magazine).unwrap();
    }
    actions::perform(&mut world, actor, pistol, WeaponAction::Load { ammo: Some(magazine) }).unwrap();
    actions::perform(&mut world, actor, pistol, WeaponAction::Ready).unwrap();
    actions::perform(&mut world, actor, pistol, WeaponAction::EngageSafety).unwrap();

    (world, actor, [musket, revolver, pistol])
}

#[test]
fn test_save_restore_save_is_idempotent() {
    let (mut world, _, ids) = armed_world();
    let saved = save_armory(&world).unwrap();

    world.weapons.clear();
    assert_eq!(restore_armory(&mut world, &saved).unwrap(), 3);
    assert_eq!(save_armory(&world).unwrap(), saved);
    for id in ids {
        assert!(world.weapon(id).is_ok());
    }
}

#[test]
fn test_restored_state_matches_what_was_saved() {
    let (mut world, _, [musket, revolver, pistol]) = armed_world();
    let saved = save_armory(&world).unwrap();
    world.weapons.clear();
    restore_armory(&mut world, &saved).unwrap();

    match world.weapon(musket).unwrap() {
        Weapon::Musket(m) => {
            assert_eq!(m.stage, LoadStage::Balled);
            assert!(m.wet_powder);
            assert!(m.skipped_cleaning);
            assert!(!m.jammed);
            assert_eq!(m.barrel_contents(&world.items).len(), 2);
        }
        other => panic!("restored as {}", other.family()),
    }
    match world.weapon(revolver).unwrap() {
        Weapon::Revolver(rev) => {
            assert_eq!(rev.current(), 1);
            assert_eq!(rev.chambers()[1], Chamber::Empty);
            assert!(matches!(rev.chambers()[0], Chamber::Live(_)));
            assert!(matches!(rev.chambers()[2], Chamber::Live(_)));
        }
        other => panic!("restored as {}", other.family()),
    }
    match world.weapon(pistol).unwrap() {
        Weapon::Magazine(gun) => {
            assert!(gun.core.safety);
            assert!(gun.chamber.is_some());
            assert!(matches!(gun.feed, Feed::Detachable { magazine: Some(_) }));
        }
        other => panic!("restored as {}", other.family()),
    }
}

#[test]
fn test_weapon_whose_item_is_gone_is_skipped() {
    let (mut world, _, [musket, revolver, pistol]) = armed_world();
    let saved = save_armory(&world).unwrap();
    world.weapons.clear();
    world.items.remove(revolver);

    assert_eq!(restore_armory(&mut world, &saved).unwrap(), 2);
    assert!(world.weapon(revolver).is_err());
    assert!(world.weapon(musket).is_ok());
    assert!(world.weapon(pistol).is_ok());
}

#[test]
fn test_garbled_save_is_an_error() {
    let (mut world, _, _) = armed_world();
    assert!(restore_armory(&mut world, "{ not json").is_err());
    assert!(restore_armory(&mut world, r#"{"version": 99, "weapons": []}"#).is_err());
}

#[test]
fn test_item_claimed_by_two_weapons_is_skipped() {
    let mut world = World::new(3);
    let actor = world.actors.spawn("Wren", Position::ground(CellId(1)));
    let carried = Location::Carried(actor);
    let first = world
        .spawn_weapon("a longbow", carried, |id| Ok(Weapon::Bow(Bow::longbow(id))))
        .unwrap();
    let second = world
        .spawn_weapon("a longbow", carried, |id| Ok(Weapon::Bow(Bow::longbow(id))))
        .unwrap();
    let arrow = world.items.spawn(
        "a broadhead arrow",
        ItemKind::Ammunition(AmmunitionUnit::new("broadhead-arrow", 5.0)),
        Location::InWeapon(first),
    );
    for id in [first, second] {
        if let Some(Weapon::Bow(bow)) = world.weapons.get_mut(&id) {
            bow.nocked = Some(arrow);
        }
    }
    let saved = save_armory(&world).unwrap();
    world.weapons.clear();

    assert_eq!(restore_armory(&mut world, &saved).unwrap(), 2);
    let nocked = |world: &World, id| match world.weapon(id).unwrap() {
        Weapon::Bow(bow) => bow.nocked,
        other => panic!("restored as {}", other.family()),
    };
    assert_eq!(nocked(&world, first), Some(arrow));
    assert_eq!(nocked(&world, second), None);
    assert_eq!(
        world.items.get(arrow).unwrap().location,
        Location::InWeapon(first)
    );
}
