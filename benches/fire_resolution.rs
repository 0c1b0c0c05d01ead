use criterion::{black_box, criterion_group, criterion_main, Criterion};

use firelock::ammo::AmmunitionUnit;
use firelock::combat::resolution::{resolve_shot, ShotAmmo};
use firelock::combat::ShotRequest;
use firelock::core::types::{CellId, Position};
use firelock::weapons::{Bow, Weapon};
use firelock::world::body::Target;
use firelock::world::items::{ItemKind, Location};
use firelock::world::World;

fn bench_resolve_shot(c: &mut Criterion) {
    c.bench_function("resolve_shot_arrow", |b| {
        let mut world = World::new(7);
        let archer = world.actors.spawn("Wren", Position::ground(CellId(2)));
        let target = world.actors.spawn("Mara", Position::ground(CellId(4)));
        let bow = world
            .spawn_weapon("a longbow", Location::Carried(archer), |id| {
                Ok(Weapon::Bow(Bow::longbow(id)))
            })
            .unwrap();
        let profile = match world.weapon(bow).unwrap() {
            Weapon::Bow(b) => b.core.profile.clone(),
            _ => unreachable!(),
        };
        let request = ShotRequest::at(archer, Target::Actor(target));

        b.iter(|| {
            let arrow = world.items.spawn(
                "a broadhead arrow",
                ItemKind::Ammunition(AmmunitionUnit::new("broadhead-arrow", 5.0)),
                Location::Nowhere,
            );
            let ammo = ShotAmmo {
                type_id: "broadhead-arrow".into(),
                quality: 5.0,
                item: Some(arrow),
                waste: None,
            };
            let (_, mut env) = world.split();
            black_box(resolve_shot(&mut env, bow, &profile, &request, ammo).unwrap());
            world.log.clear();
        });
    });
}

criterion_group!(benches, bench_resolve_shot);
criterion_main!(benches);
