//! Fire resolution
//!
//! Turns one discharged projectile plus already-resolved check outcomes into
//! narrative, damage and exactly one disposal of the projectile.
//!
//! Order of resolution:
//! 1. no target: into the sky/ceiling, projectile comes down in the firing cell
//! 2. flight narration in every cell between shooter and target
//! 3. damage, pain and stun from the ammunition plus the weapon bonus
//! 4. a good shot spoiled by cover strikes the cover
//! 5. a defender win is a miss
//! 6. an obstruction in the line of fire takes the shot
//! 7. otherwise the target takes it: ricochet, lodge, or break/fall

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ammo::{AmmoTypeId, AmmunitionType, ShotParams};
use crate::combat::env::FireEnv;
use crate::combat::outcome::{CheckOutcome, OpposedOutcome};
use crate::core::error::Result;
use crate::core::types::{ActorId, ItemId, Position, WoundId};
use crate::weapons::common::WeaponProfile;
use crate::world::body::{BodyZone, Damage, Target, Wound};
use crate::world::items::{ItemKind, Location};
use crate::world::narrative::{Audience, Emote, EmoteRef, EmoteStyle};
use crate::world::scheduler::TaskKind;

/// Cover between shooter and target, with the check that decides whether it
/// gets in the way
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverCheck {
    pub item: ItemId,
    pub outcome: CheckOutcome,
}

/// Everything decided about a shot before the weapon goes off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotRequest {
    pub actor: ActorId,
    pub target: Option<Target>,
    /// The shooter's aim check
    pub shot: CheckOutcome,
    pub cover: Option<CoverCheck>,
    pub defense: OpposedOutcome,
    /// Called shot; rolled by hit weight when absent
    pub zone: Option<BodyZone>,
    /// Something stepping into the line of fire
    pub obstruction: Option<Target>,
    /// Unaimed deliveries are only noticed on a notice check
    pub aimed: bool,
    /// Shot taken inside a melee exchange
    pub melee: bool,
    /// Extra template emitted with a miss
    pub defense_narrative: Option<String>,
}

impl ShotRequest {
    /// A clean, aimed shot the attacker wins by one degree
    pub fn at(actor: ActorId, target: Target) -> Self {
        Self {
            actor,
            target: Some(target),
            shot: CheckOutcome::Success,
            cover: None,
            defense: OpposedOutcome::attacker(1),
            zone: None,
            obstruction: None,
            aimed: true,
            melee: false,
            defense_narrative: None,
        }
    }

    /// A shot with nothing to hit
    pub fn into_the_air(actor: ActorId) -> Self {
        Self {
            target: None,
            aimed: false,
            ..Self::at(actor, Target::Actor(actor))
        }
    }

    pub fn with_defense(mut self, defense: OpposedOutcome) -> Self {
        self.defense = defense;
        self
    }

    pub fn with_cover(mut self, item: ItemId, outcome: CheckOutcome) -> Self {
        self.cover = Some(CoverCheck { item, outcome });
        self
    }

    pub fn with_obstruction(mut self, obstruction: Target) -> Self {
        self.obstruction = Some(obstruction);
        self
    }

    pub fn with_zone(mut self, zone: BodyZone) -> Self {
        self.zone = Some(zone);
        self
    }
}

/// The projectile as it leaves the weapon
#[derive(Debug, Clone, PartialEq)]
pub struct ShotAmmo {
    pub type_id: AmmoTypeId,
    pub quality: f32,
    /// Physical projectile; energy weapons have none
    pub item: Option<ItemId>,
    /// Casing or other waste produced by the discharge
    pub waste: Option<ItemId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShotResolution {
    IntoTheAir,
    StruckCover { cover: ItemId },
    Missed,
    Obstructed { by: Target },
    Hit,
    Ricochet,
}

/// What became of the projectile. Exactly one per resolved shot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AmmoDisposal {
    Lodged { target: Target, wound: WoundId },
    Broke { fragment: ItemId, at: Position },
    Fell { at: Position },
    /// Nothing physical was left (energy bolts)
    Dissipated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireOutcome {
    pub resolution: ShotResolution,
    /// Whoever or whatever actually took the shot
    pub struck: Option<Target>,
    pub wounds: Vec<Wound>,
    pub disposal: AmmoDisposal,
    pub waste: Option<ItemId>,
    /// Damage the shot carried (0 when nothing was struck)
    pub damage: f32,
}

fn ammo_ref(ammo: &ShotAmmo, ty: &AmmunitionType) -> EmoteRef {
    match ammo.item {
        Some(item) => EmoteRef::Item(item),
        None => EmoteRef::Text(ty.fired_name().to_string()),
    }
}

fn emit_pair(env: &mut FireEnv, origin: Position, at: Position, emote: Emote) {
    if origin.cell != at.cell {
        env.emit_at(origin, emote.clone());
    }
    env.emit_at(at, emote);
}

/// Shared disposal: roll to break, otherwise drop where it ended up.
///
/// A broken projectile becomes a decaying fragment; an intact one lands on
/// the ground tagged with the shooter's fight. Both carry a pickup grace.
pub fn break_or_fall(
    env: &mut FireEnv,
    ammo: &ShotAmmo,
    ty: &AmmunitionType,
    shooter: ActorId,
    at: Position,
    struck: bool,
) -> Result<AmmoDisposal> {
    let Some(item) = ammo.item else {
        return Ok(AmmoDisposal::Dissipated);
    };
    let chance = if struck { ty.break_on_hit } else { ty.break_on_miss };
    let grace = env.now + env.config.pickup_grace_ticks;

    if env.roll(chance) {
        env.items.remove(item);
        let fragment = env.items.spawn(
            &format!("fragments of {}", ty.fired_name()),
            ItemKind::Fragment { from: ty.id.clone() },
            Location::Ground(at),
        );
        env.items.require_mut(fragment)?.no_pickup_until = Some(grace);
        let decay_at = env.now + env.config.fragment_decay_ticks;
        env.scheduler
            .schedule(None, decay_at, TaskKind::FragmentDecay { item: fragment });
        env.emit_at(
            at,
            Emote::new("{fragment} scatter across the ground.").item("fragment", fragment),
        );
        debug!(?item, ?fragment, "projectile broke");
        return Ok(AmmoDisposal::Broke { fragment, at });
    }

    env.items.detach(item, Location::Ground(at))?;
    let combat = env.actors.get(shooter).and_then(|a| a.combat);
    let dropped = env.items.require_mut(item)?;
    dropped.no_pickup_until = Some(grace);
    dropped.combat = combat;
    env.emit_at(at, Emote::new("{ammo} falls to the ground.").item("ammo", item));
    Ok(AmmoDisposal::Fell { at })
}

fn narrate_flight(
    env: &mut FireEnv,
    origin: Position,
    at: Position,
    ty: &AmmunitionType,
    ammo: &EmoteRef,
    aimed: bool,
) {
    let Some(path) = env.spatial.path_between(origin.cell, at.cell) else {
        return;
    };
    if path.len() <= 2 {
        return;
    }
    let notice = env.config.flight_notice_difficulty;
    for cell in &path[1..path.len() - 1] {
        let mut emote = Emote::new(ty.echo.flight_template()).with("ammo", ammo.clone());
        if !aimed {
            emote = emote.noticed(notice);
        }
        env.output.emit(
            Audience::Cell {
                cell: *cell,
                layer: None,
            },
            emote,
        );
    }
}

/// Resolve one discharged projectile against the request
pub fn resolve_shot(
    env: &mut FireEnv,
    weapon: ItemId,
    profile: &WeaponProfile,
    request: &ShotRequest,
    ammo: ShotAmmo,
) -> Result<FireOutcome> {
    let catalog = env.catalog;
    let ty = catalog.get(&ammo.type_id)?;
    let origin = env.actor_position(request.actor)?;
    let projectile = ammo_ref(&ammo, ty);

    let Some(target) = request.target else {
        let overhead = if env.spatial.is_outdoors(origin.cell) {
            "sky"
        } else {
            "ceiling"
        };
        env.emit_at(
            origin,
            Emote::new("{actor} fires {ammo} into the {overhead}.")
                .actor("actor", request.actor)
                .with("ammo", projectile)
                .text("overhead", overhead),
        );
        let disposal = break_or_fall(env, &ammo, ty, request.actor, origin, false)?;
        info!(?weapon, "shot fired into the {}", overhead);
        return Ok(FireOutcome {
            resolution: ShotResolution::IntoTheAir,
            struck: None,
            wounds: Vec::new(),
            disposal,
            waste: ammo.waste,
            damage: 0.0,
        });
    };

    let at = env.target_position(target)?;
    narrate_flight(env, origin, at, ty, &projectile, request.aimed);

    let range = env
        .spatial
        .distance_between(origin.cell, at.cell)
        .unwrap_or(0);
    let shot = ShotParams {
        quality: ammo.quality,
        degree: request.defense.degree as f32,
        range: range as f32,
        pointblank: range == 0,
        melee: request.melee,
    };
    let resolved = ty.evaluate(&shot)?;
    let bonus = profile.bonus.evaluate(&shot.to_formula_params())?;
    let mut damage = Damage {
        amount: (resolved.amount + bonus).max(0.0),
        pain: resolved.pain,
        stun: resolved.stun,
        kind: resolved.kind,
        zone: None,
        source: Some(weapon),
        lodgeable: None,
    };

    let finish = |resolution: ShotResolution,
                  struck: Option<Target>,
                  wounds: Vec<Wound>,
                  disposal: AmmoDisposal,
                  damage: f32|
     -> Result<FireOutcome> {
        info!(?weapon, ?resolution, ?disposal, "shot resolved");
        Ok(FireOutcome {
            resolution,
            struck,
            wounds,
            disposal,
            waste: ammo.waste,
            damage,
        })
    };

    // A shot that would have landed, spoiled by cover
    if let Some(cover) = request.cover {
        if request.shot.is_success() && !cover.outcome.is_success() {
            let cover_at = env.target_position(Target::Item(cover.item))?;
            emit_pair(
                env,
                origin,
                cover_at,
                Emote::new("{ammo} slams into {cover}.")
                    .with("ammo", projectile.clone())
                    .item("cover", cover.item)
                    .styled(EmoteStyle::Miss),
            );
            let wounds = env.bodies.passive_damage(Target::Item(cover.item), &damage);
            let disposal = break_or_fall(env, &ammo, ty, request.actor, cover_at, true)?;
            return finish(
                ShotResolution::StruckCover { cover: cover.item },
                Some(Target::Item(cover.item)),
                wounds,
                disposal,
                damage.amount,
            );
        }
    }

    if request.defense.favors_defender() {
        emit_pair(
            env,
            origin,
            at,
            Emote::new("{ammo} misses {target}.")
                .with("ammo", projectile.clone())
                .with("target", target.into())
                .styled(EmoteStyle::Miss),
        );
        if let Some(extra) = &request.defense_narrative {
            env.emit_at(
                at,
                Emote::new(extra)
                    .actor("actor", request.actor)
                    .with("target", target.into())
                    .styled(EmoteStyle::Miss),
            );
        }
        let disposal = break_or_fall(env, &ammo, ty, request.actor, at, false)?;
        return finish(ShotResolution::Missed, None, Vec::new(), disposal, 0.0);
    }

    if let Some(obstruction) = request.obstruction {
        let blocked_at = env.target_position(obstruction)?;
        emit_pair(
            env,
            origin,
            blocked_at,
            Emote::new("{obstruction} is caught in the line of fire!")
                .with("obstruction", obstruction.into())
                .styled(EmoteStyle::Hit),
        );
        if env.bodies.has_body(obstruction) {
            damage.zone = Some(BodyZone::random_weighted(&mut *env.rng));
        }
        let wounds = env.bodies.passive_damage(obstruction, &damage);
        let disposal = break_or_fall(env, &ammo, ty, request.actor, blocked_at, true)?;
        return finish(
            ShotResolution::Obstructed { by: obstruction },
            Some(obstruction),
            wounds,
            disposal,
            damage.amount,
        );
    }

    if env.bodies.has_body(target) {
        damage.zone = Some(
            request
                .zone
                .unwrap_or_else(|| BodyZone::random_weighted(&mut *env.rng)),
        );
    }
    damage.lodgeable = ammo.item;
    let wounds = env.bodies.passive_damage(target, &damage);

    if wounds.is_empty() {
        emit_pair(
            env,
            origin,
            at,
            Emote::new("{ammo} glances harmlessly off {target}.")
                .with("ammo", projectile)
                .with("target", target.into())
                .styled(EmoteStyle::Miss),
        );
        let disposal = break_or_fall(env, &ammo, ty, request.actor, at, true)?;
        return finish(
            ShotResolution::Ricochet,
            Some(target),
            wounds,
            disposal,
            damage.amount,
        );
    }

    let where_hit = damage.zone.map(|z| z.describe()).unwrap_or("body");
    let hit = if damage.zone.is_some() {
        Emote::new("{ammo} hits {target} in the {zone}!").text("zone", where_hit)
    } else {
        Emote::new("{ammo} hits {target}!")
    };
    emit_pair(
        env,
        origin,
        at,
        hit.with("ammo", projectile)
            .with("target", target.into())
            .styled(EmoteStyle::Hit),
    );

    let lodged = ammo
        .item
        .and_then(|item| wounds.iter().find(|w| w.lodged == Some(item)));
    let disposal = match (ammo.item, lodged) {
        (Some(item), Some(wound)) => {
            env.items.detach(
                item,
                Location::Lodged {
                    target,
                    wound: wound.id,
                },
            )?;
            env.emit_at(
                at,
                Emote::new("{ammo} lodges in {target}'s wound.")
                    .item("ammo", item)
                    .with("target", target.into()),
            );
            AmmoDisposal::Lodged {
                target,
                wound: wound.id,
            }
        }
        _ => break_or_fall(env, &ammo, ty, request.actor, at, true)?,
    };
    finish(
        ShotResolution::Hit,
        Some(target),
        wounds,
        disposal,
        damage.amount,
    )
}
