//! Misfire, jam and catastrophe
//!
//! Pulling the trigger on a musket is decided in tiers before any normal
//! shot resolution happens:
//!
//! 1. more than two charges of powder or shot in the barrel: it bursts
//! 2. nothing in the barrel: the pan flashes and nothing happens
//! 3. a malformed or unseated charge always misfires; a proper one misfires
//!    on the misfire formula
//! 4. a misfire fouls the lock on the jam formula
//! 5. otherwise the charge fires like any other projectile
//!
//! Every path ends with the barrel fouled and the stage back at 0. A charge
//! that misfired stays in the barrel.

use tracing::{debug, info};

use crate::ammo::AmmoCatalog;
use crate::combat::env::FireEnv;
use crate::combat::propagation::propagate_report;
use crate::combat::resolution::{resolve_shot, ShotRequest};
use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, ItemId};
use crate::formula::FormulaParams;
use crate::weapons::common::discharge;
use crate::weapons::musket::{LoadStage, Musket, BALL_TAG, CARTRIDGE_TAG};
use crate::weapons::FireReport;
use crate::world::actor::Skill;
use crate::world::body::{BodyZone, Damage, DamageKind, Target, Wound};
use crate::world::items::{ItemArena, ItemKind};
use crate::world::narrative::{Emote, EmoteStyle};

/// Parameters the misfire and jam formulas may reference
pub const FAILURE_PARAMS: [&str; 10] = [
    "skill",
    "skipped_cleaning",
    "precipitation",
    "quality",
    "condition",
    "cartridge",
    "cartridge_quality",
    "wadding",
    "wet_powder",
    "tap_loaded",
];

/// More powder-or-shot items than this and the barrel bursts
pub const CATASTROPHE_THRESHOLD: usize = 2;

/// What is down the barrel, sorted by role
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Charge {
    pub powder: Vec<ItemId>,
    pub balls: Vec<ItemId>,
    pub cartridges: Vec<ItemId>,
    pub wadding: Vec<ItemId>,
    /// Anything that has no business in a barrel
    pub other: Vec<ItemId>,
}

impl Charge {
    pub fn inspect(musket: &Musket, items: &ItemArena, catalog: &AmmoCatalog) -> Charge {
        let mut charge = Charge::default();
        for id in musket.barrel_contents(items) {
            let Some(item) = items.get(id) else { continue };
            match &item.kind {
                ItemKind::Powder { .. } => charge.powder.push(id),
                ItemKind::Wadding => charge.wadding.push(id),
                ItemKind::Ammunition(unit) if !unit.fired => match catalog.get(&unit.type_id) {
                    Ok(ty) if ty.has_tag(CARTRIDGE_TAG) => charge.cartridges.push(id),
                    Ok(ty) if ty.has_tag(BALL_TAG) => charge.balls.push(id),
                    _ => charge.other.push(id),
                },
                _ => charge.other.push(id),
            }
        }
        charge
    }

    /// Powder, balls and cartridges
    pub fn load_count(&self) -> usize {
        self.powder.len() + self.balls.len() + self.cartridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.load_count() == 0 && self.wadding.is_empty() && self.other.is_empty()
    }

    /// Powder and ball, or a single cartridge, and at most one wad
    pub fn is_well_formed(&self) -> bool {
        let loose = self.powder.len() == 1 && self.balls.len() == 1 && self.cartridges.is_empty();
        let cartridge = self.cartridges.len() == 1 && self.powder.is_empty() && self.balls.is_empty();
        self.other.is_empty() && self.wadding.len() <= 1 && (loose || cartridge)
    }

    pub fn all(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.powder
            .iter()
            .chain(&self.balls)
            .chain(&self.cartridges)
            .chain(&self.wadding)
            .chain(&self.other)
            .copied()
    }
}

/// Formula inputs for the misfire and jam rolls
pub fn failure_params(musket: &Musket, env: &FireEnv, actor: ActorId, charge: &Charge) -> Result<FormulaParams> {
    let wielder = env.actors.require(actor)?;
    let cell = wielder.position.cell;
    let precipitation = if env.spatial.is_outdoors(cell) {
        env.spatial.precipitation(cell).intensity()
    } else {
        0.0
    };
    let cartridge_quality = match charge.cartridges.first() {
        Some(id) => env.items.ammo(*id)?.quality,
        None => 0.0,
    };
    let damp = charge.powder.iter().any(|id| {
        env.items
            .get(*id)
            .map_or(false, |i| matches!(i.kind, ItemKind::Powder { wet: true, .. }))
    });
    Ok(FormulaParams::new()
        .with("skill", wielder.skill(Skill::OperateMusket))
        .with_flag("skipped_cleaning", musket.skipped_cleaning)
        .with("precipitation", precipitation)
        .with("quality", musket.core.profile.quality)
        .with("condition", musket.core.condition)
        .with_flag("cartridge", !charge.cartridges.is_empty())
        .with("cartridge_quality", cartridge_quality)
        .with_flag("wadding", musket.wadding || !charge.wadding.is_empty())
        .with_flag("wet_powder", musket.wet_powder || damp)
        .with_flag("tap_loaded", musket.tap_loaded))
}

/// Pull the trigger on a readied musket
pub(crate) fn discharge_musket(
    musket: &mut Musket,
    env: &mut FireEnv,
    request: &ShotRequest,
) -> Result<FireReport> {
    let actor = request.actor;
    let at = env.actor_position(actor)?;
    let charge = Charge::inspect(musket, &*env.items, env.catalog);
    debug!(weapon = ?musket.core.id, ?charge, stage = ?musket.stage, "musket trigger pulled");

    let report = if charge.load_count() > CATASTROPHE_THRESHOLD {
        let wounds = catastrophe(musket, env, actor, &charge)?;
        FireReport::Catastrophe { wounds }
    } else if charge.is_empty() {
        env.emit_at(
            at,
            Emote::new("The pan of {weapon} flashes, but nothing was loaded.")
                .item("weapon", musket.core.id)
                .styled(EmoteStyle::Failure),
        );
        FireReport::NothingLoaded
    } else {
        let forced = !charge.is_well_formed() || musket.stage < LoadStage::Rammed;
        let params = failure_params(musket, env, actor, &charge)?;
        let misfired = forced || {
            let chance = env.config.musket.misfire_chance.evaluate(&params)?;
            env.roll(chance as f64)
        };
        if misfired {
            let chance = env.config.musket.jam_chance.evaluate(&params)?;
            let jammed = env.roll(chance as f64);
            misfire(musket, env, actor, jammed, forced)?;
            FireReport::Misfire { jammed }
        } else {
            fire_charge(musket, env, request, &charge)?
        }
    };

    musket.reset_after_fire();
    Ok(report)
}

fn misfire(musket: &mut Musket, env: &mut FireEnv, actor: ActorId, jammed: bool, forced: bool) -> Result<()> {
    let at = env.actor_position(actor)?;
    info!(weapon = ?musket.core.id, jammed, forced, "musket misfired");
    env.emit_at(
        at,
        Emote::new("The powder in the pan of {weapon} flashes, but the charge fails to fire.")
            .item("weapon", musket.core.id)
            .styled(EmoteStyle::Failure),
    );
    if jammed {
        musket.jammed = true;
        env.emit_at(
            at,
            Emote::new("The lock of {weapon} fouls and jams.")
                .item("weapon", musket.core.id)
                .styled(EmoteStyle::Failure),
        );
    }
    Ok(())
}

/// The barrel bursts: the charge is gone and the blast hurts the wielder
/// and everything they carry
fn catastrophe(musket: &mut Musket, env: &mut FireEnv, actor: ActorId, charge: &Charge) -> Result<Vec<Wound>> {
    let at = env.actor_position(actor)?;
    let weapon = musket.core.id;
    info!(?weapon, ?actor, charges = charge.load_count(), "musket burst");
    env.emit_at(
        at,
        Emote::new("{weapon} explodes in the hands of {actor}!")
            .actor("actor", actor)
            .item("weapon", weapon)
            .styled(EmoteStyle::Failure),
    );

    for id in charge.all() {
        env.items.remove(id);
    }

    let blast = env.config.musket.catastrophe.clone();
    let hits = [
        (DamageKind::Shrapnel, blast.shrapnel, BodyZone::Head),
        (DamageKind::Shockwave, blast.shockwave, BodyZone::HandLeft),
        (DamageKind::Burning, blast.burning, BodyZone::HandRight),
    ];

    let mut wounds = Vec::new();
    for (kind, amount, zone) in hits {
        let mut damage = Damage::new(amount, kind);
        damage.pain = amount * 0.5;
        damage.zone = Some(zone);
        damage.source = Some(weapon);
        wounds.extend(env.bodies.passive_damage(Target::Actor(actor), &damage));
    }

    let mut carried = env.items.carried_by(actor);
    if !carried.contains(&weapon) {
        carried.push(weapon);
    }
    for item in carried {
        for (kind, amount) in [(DamageKind::Shockwave, blast.shockwave), (DamageKind::Burning, blast.burning)] {
            let mut damage = Damage::new(amount, kind);
            damage.source = Some(weapon);
            wounds.extend(env.bodies.passive_damage(Target::Item(item), &damage));
        }
    }

    musket.core.condition = (musket.core.condition - 0.5).max(0.0);
    propagate_report(env, at, musket.core.profile.loudness + 2, "explosion");
    Ok(wounds)
}

fn fire_charge(
    musket: &mut Musket,
    env: &mut FireEnv,
    request: &ShotRequest,
    charge: &Charge,
) -> Result<FireReport> {
    let actor = request.actor;
    let at = env.actor_position(actor)?;
    let weapon = musket.core.id;
    let projectile = match (charge.cartridges.first(), charge.balls.first()) {
        (Some(cartridge), _) => *cartridge,
        (None, Some(ball)) => *ball,
        (None, None) => {
            return Err(ArmsError::Invariant(format!(
                "{:?} fired with no projectile in a well-formed charge",
                weapon
            )))
        }
    };

    env.emit_at(
        at,
        Emote::new("{actor} fires {weapon} with a roar and a cloud of smoke.")
            .actor("actor", actor)
            .item("weapon", weapon),
    );
    // Powder and wad burn away
    for id in charge.powder.iter().chain(&charge.wadding) {
        env.items.remove(*id);
    }
    let shot = discharge(env, projectile, weapon)?;
    let catalog = env.catalog;
    let loudness = catalog
        .get(&shot.type_id)?
        .loudness
        .max(musket.core.profile.loudness);
    let outcome = resolve_shot(env, weapon, &musket.core.profile, request, shot)?;
    propagate_report(env, at, loudness, "musket shot");
    Ok(FireReport::Fired(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ammo::AmmunitionUnit;
    use crate::core::types::{CellId, Position};
    use crate::weapons::{RangedFireable, Weapon};
    use crate::world::items::Location;
    use crate::world::spatial::Precipitation;
    use crate::world::World;
    use rand::rngs::mock::StepRng;

    struct Range {
        world: World,
        shooter: ActorId,
        target: ActorId,
        musket: ItemId,
    }

    fn range(rng: StepRng) -> Range {
        let mut world = World::new(5);
        world.set_rng(Box::new(rng));
        let shooter = world.actors.spawn("Ezra", Position::ground(CellId(2)));
        let target = world.actors.spawn("Mara", Position::ground(CellId(2)));
        let musket = world
            .spawn_weapon("a flintlock musket", Location::Carried(shooter), |id| {
                Ok(Weapon::Musket(Musket::flintlock(id)))
            })
            .unwrap();
        Range {
            world,
            shooter,
            target,
            musket,
        }
    }

    fn put_in_barrel(world: &mut World, musket: ItemId, name: &str, kind: ItemKind) -> ItemId {
        world.items.spawn(name, kind, Location::InWeapon(musket))
    }

    fn powder() -> ItemKind {
        ItemKind::Powder { quality: 5.0, wet: false }
    }

    fn ball() -> ItemKind {
        ItemKind::Ammunition(AmmunitionUnit::new("musket-ball", 5.0))
    }

    fn prime(world: &mut World, musket: ItemId, stage: LoadStage) {
        match world.weapons.get_mut(&musket) {
            Some(Weapon::Musket(m)) => {
                m.stage = stage;
                m.core.readied = true;
            }
            _ => panic!("not a musket"),
        }
    }

    fn pull(r: &mut Range) -> FireReport {
        let request = ShotRequest::at(r.shooter, Target::Actor(r.target));
        let (weapons, mut env) = r.world.split();
        match weapons.get_mut(&r.musket) {
            Some(Weapon::Musket(m)) => m.fire(&mut env, &request).unwrap(),
            _ => panic!("not a musket"),
        }
    }

    fn musket(world: &World, id: ItemId) -> &Musket {
        match world.weapon(id).unwrap() {
            Weapon::Musket(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_failure_params_are_known_to_formulas() {
        let config = crate::core::config::MusketConfig::default();
        config.misfire_chance.check_params(&FAILURE_PARAMS).unwrap();
        config.jam_chance.check_params(&FAILURE_PARAMS).unwrap();
    }

    #[test]
    fn test_proper_charge_fires() {
        // High stream: no misfire roll succeeds
        let mut r = range(StepRng::new(u64::MAX, 0));
        put_in_barrel(&mut r.world, r.musket, "a measure of powder", powder());
        let shot = put_in_barrel(&mut r.world, r.musket, "a musket ball", ball());
        prime(&mut r.world, r.musket, LoadStage::Rammed);

        let report = pull(&mut r);
        assert!(matches!(report, FireReport::Fired(_)), "{:?}", report);
        assert!(r.world.items.contents_of(r.musket).is_empty());
        assert!(r.world.items.ammo(shot).unwrap().fired);
        let m = musket(&r.world, r.musket);
        assert_eq!(m.stage, LoadStage::Unloaded);
        assert!(m.needs_cleaning);
        assert!(!m.core.readied);
    }

    #[test]
    fn test_three_charges_burst_regardless_of_rolls() {
        let mut r = range(StepRng::new(u64::MAX, 0));
        put_in_barrel(&mut r.world, r.musket, "a measure of powder", powder());
        put_in_barrel(&mut r.world, r.musket, "a musket ball", ball());
        put_in_barrel(&mut r.world, r.musket, "a musket ball", ball());
        prime(&mut r.world, r.musket, LoadStage::Rammed);

        let report = pull(&mut r);
        let FireReport::Catastrophe { wounds } = report else {
            panic!("expected a burst, got {:?}", report);
        };
        assert!(wounds.iter().any(|w| w.target == Target::Actor(r.shooter)));
        assert!(r.world.items.contents_of(r.musket).is_empty());
        assert!(r.world.log.mentions("explodes"));
        let m = musket(&r.world, r.musket);
        assert_eq!(m.stage, LoadStage::Unloaded);
        assert!(m.core.condition < 1.0);
    }

    #[test]
    fn test_empty_barrel_reports_nothing_loaded() {
        let mut r = range(StepRng::new(0, 0));
        prime(&mut r.world, r.musket, LoadStage::Rammed);
        assert_eq!(pull(&mut r), FireReport::NothingLoaded);
        assert!(musket(&r.world, r.musket).needs_cleaning);
    }

    #[test]
    fn test_wet_powder_misfires_and_jams() {
        // Low stream: every roll with any chance succeeds
        let mut r = range(StepRng::new(0, 0));
        r.world.rooms.set_precipitation(CellId(2), Precipitation::Heavy);
        put_in_barrel(&mut r.world, r.musket, "a measure of powder", powder());
        put_in_barrel(&mut r.world, r.musket, "a musket ball", ball());
        prime(&mut r.world, r.musket, LoadStage::Rammed);
        if let Some(Weapon::Musket(m)) = r.world.weapons.get_mut(&r.musket) {
            m.wet_powder = true;
        }

        assert_eq!(pull(&mut r), FireReport::Misfire { jammed: true });
        let m = musket(&r.world, r.musket);
        assert!(m.jammed);
        assert_eq!(m.stage, LoadStage::Unloaded);
        assert!(m.needs_cleaning);
        assert!(!m.wet_powder);
        // The dud charge is still down the barrel
        assert_eq!(r.world.items.contents_of(r.musket).len(), 2);
    }

    #[test]
    fn test_unrammed_charge_always_misfires() {
        let mut r = range(StepRng::new(u64::MAX, 0));
        put_in_barrel(&mut r.world, r.musket, "a measure of powder", powder());
        put_in_barrel(&mut r.world, r.musket, "a musket ball", ball());
        prime(&mut r.world, r.musket, LoadStage::Balled);
        assert_eq!(pull(&mut r), FireReport::Misfire { jammed: false });
    }

    #[test]
    fn test_charge_sorting() {
        let mut r = range(StepRng::new(0, 0));
        put_in_barrel(&mut r.world, r.musket, "a measure of powder", powder());
        put_in_barrel(&mut r.world, r.musket, "a scrap of wadding", ItemKind::Wadding);
        put_in_barrel(
            &mut r.world,
            r.musket,
            "a pistol round",
            ItemKind::Ammunition(AmmunitionUnit::new("pistol-round", 5.0)),
        );
        let charge = Charge::inspect(musket(&r.world, r.musket), &r.world.items, &r.world.catalog);
        assert_eq!(charge.powder.len(), 1);
        assert_eq!(charge.wadding.len(), 1);
        assert_eq!(charge.other.len(), 1);
        assert_eq!(charge.load_count(), 1);
        assert!(!charge.is_well_formed());
    }
}
