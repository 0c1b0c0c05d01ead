//! Energy weapons fed from a power pack
//!
//! There are no rounds: each shot draws a fixed wattage from the inserted
//! pack and produces a bolt with no physical remains. A rechargeable pack
//! registers a repeating recharge task while it is below capacity.

use tracing::debug;

use crate::ammo::AmmoTypeId;
use crate::combat::env::FireEnv;
use crate::combat::propagation::propagate_report;
use crate::combat::resolution::{resolve_shot, ShotAmmo, ShotRequest};
use crate::core::error::Result;
use crate::core::types::{ActorId, ItemId, TaskId};
use crate::weapons::common::{return_to, WeaponCore, WeaponProfile};
use crate::weapons::melee::MeleeProfile;
use crate::weapons::{ActionOutcome, FireReport, MeleeUsable, RangedFireable, Refusal, Switchable};
use crate::world::inventory::{ItemQuery, LoadTemplate};
use crate::world::items::{ItemArena, ItemKind, Location};
use crate::world::narrative::{Emote, EmoteStyle};
use crate::world::scheduler::TaskKind;

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyWeapon {
    pub core: WeaponCore,
    pub pack: Option<ItemId>,
    /// Charge drawn per shot
    pub wattage: f32,
    /// Catalog profile of the bolt
    pub bolt: AmmoTypeId,
}

impl EnergyWeapon {
    pub fn new(id: ItemId, profile: WeaponProfile, wattage: f32, bolt: &str) -> Self {
        Self {
            core: WeaponCore::new(id, profile),
            pack: None,
            wattage,
            bolt: AmmoTypeId::from(bolt),
        }
    }

    pub fn laser_carbine(id: ItemId) -> Self {
        Self::new(
            id,
            WeaponProfile::new("a laser carbine", &["energy"])
                .with_loudness(3)
                .with_quality(6.0),
            25.0,
            "energy-bolt",
        )
    }

    /// Whether the inserted pack can deliver one more shot
    pub fn has_power(&self, items: &ItemArena) -> bool {
        self.pack
            .and_then(|pack| items.power_pack(pack).ok())
            .map_or(false, |p| p.charge >= self.wattage)
    }

    fn pack_template() -> LoadTemplate {
        LoadTemplate::new()
            .require("pack", ItemQuery::PowerPack)
            .hands(1)
    }
}

/// Register a recharge task for `pack` if it needs one and has none
pub fn ensure_recharging(env: &mut FireEnv, pack: ItemId) -> Result<Option<TaskId>> {
    let power = env.items.power_pack(pack)?;
    if !power.is_rechargeable() || power.is_full() {
        return Ok(None);
    }
    let existing = env
        .scheduler
        .find(|t| t.kind == TaskKind::Recharge { pack })
        .map(|t| t.id);
    if existing.is_some() {
        return Ok(existing);
    }
    let every = env.config.energy.recharge_interval_ticks;
    let task = env
        .scheduler
        .schedule_repeating(env.now + every, every, TaskKind::Recharge { pack });
    debug!(?pack, ?task, "recharge registered");
    Ok(Some(task))
}

/// One recharge step. Deregisters once the pack is full or gone.
pub fn recharge_step(env: &mut FireEnv, task: TaskId, pack: ItemId) -> Result<()> {
    let Some(item) = env.items.get_mut(pack) else {
        env.scheduler.cancel(task);
        debug!(?pack, "pack left the world, recharge dropped");
        return Ok(());
    };
    let ItemKind::PowerPack(power) = &mut item.kind else {
        env.scheduler.cancel(task);
        return Ok(());
    };
    power.charge = (power.charge + power.recharge_rate).min(power.capacity);
    if power.is_full() {
        env.scheduler.cancel(task);
        debug!(?pack, "pack full, recharge done");
    }
    Ok(())
}

impl RangedFireable for EnergyWeapon {
    fn core(&self) -> &WeaponCore {
        &self.core
    }

    fn is_loaded(&self, items: &ItemArena) -> bool {
        self.has_power(items)
    }

    fn why_cannot_load(&self, env: &FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.pack.is_some() {
            return Some(Refusal::AlreadyLoaded);
        }
        let Some(id) = ammo else {
            return Refusal::from_feasibility(env.feasibility(actor, &Self::pack_template()));
        };
        match env.items.get(id) {
            Some(item) if item.location == Location::Carried(actor) => {
                (!matches!(item.kind, ItemKind::PowerPack(_))).then_some(Refusal::IncompatibleAmmunition)
            }
            _ => Some(Refusal::MissingItems),
        }
    }

    fn load(&mut self, env: &mut FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_load(env, actor, ammo) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let pack = match ammo {
            Some(id) => id,
            None => env.bind(actor, &Self::pack_template())?.require("pack")?,
        };
        env.items.attach(pack, self.core.id)?;
        self.pack = Some(pack);
        ensure_recharging(env, pack)?;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} clicks {pack} into {weapon}.")
                .actor("actor", actor)
                .item("pack", pack)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_unload(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| self.pack.is_none().then_some(Refusal::NothingToUnload))
    }

    fn unload(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unload(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        if let Some(pack) = self.pack.take() {
            return_to(env, pack, actor)?;
        }
        self.core.readied = false;
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_ready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.core.readied {
            return Some(Refusal::AlreadyReadied);
        }
        (!self.has_power(env.items)).then_some(Refusal::NoPower)
    }

    fn ready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_ready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.core.readied = true;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{weapon} hums as it powers up.").item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_unready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| (!self.core.readied).then_some(Refusal::NotReadied))
    }

    fn unready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.core.readied = false;
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_fire(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if !self.core.readied {
            return Some(Refusal::NotReadied);
        }
        if self.core.safety {
            return Some(Refusal::SafetyOn);
        }
        (!self.has_power(env.items)).then_some(Refusal::NoPower)
    }

    fn fire(&mut self, env: &mut FireEnv, request: &ShotRequest) -> Result<FireReport> {
        if let Some(refusal) = self.why_cannot_fire(env, request.actor) {
            return Err(self.core.not_ready(refusal));
        }
        let Some(pack) = self.pack else {
            return Err(self.core.not_ready(Refusal::NoPower));
        };
        let actor = request.actor;
        let at = env.actor_position(actor)?;

        let power = env.items.power_pack_mut(pack)?;
        power.charge -= self.wattage;
        let remaining = power.charge;
        debug!(weapon = ?self.core.id, remaining, "charge drawn");

        env.emit_at(
            at,
            Emote::new("{actor} fires {weapon}!")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        let shot = ShotAmmo {
            type_id: self.bolt.clone(),
            quality: self.core.profile.quality,
            item: None,
            waste: None,
        };
        let catalog = env.catalog;
        let loudness = catalog
            .get(&self.bolt)?
            .loudness
            .max(self.core.profile.loudness);
        let outcome = resolve_shot(env, self.core.id, &self.core.profile, request, shot)?;
        propagate_report(env, at, loudness, "crackle of discharge");

        if !self.has_power(env.items) {
            self.core.readied = false;
            env.emit_at(
                at,
                Emote::new("{weapon} whines and powers down.")
                    .item("weapon", self.core.id)
                    .styled(EmoteStyle::Failure),
            );
        }
        ensure_recharging(env, pack)?;
        Ok(FireReport::Fired(outcome))
    }
}

impl Switchable for EnergyWeapon {
    fn safety_engaged(&self) -> bool {
        self.core.safety
    }

    fn why_cannot_switch(&self, env: &FireEnv, actor: ActorId, engage: bool) -> Option<Refusal> {
        self.core.why_cannot_handle(env, actor).or(match (engage, self.core.safety) {
            (true, true) => Some(Refusal::AlreadySafe),
            (false, false) => Some(Refusal::AlreadyUnsafe),
            _ => None,
        })
    }

    fn switch(&mut self, env: &mut FireEnv, actor: ActorId, engage: bool) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_switch(env, actor, engage) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.core.safety = engage;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} thumbs the safety of {weapon} {state}.")
                .actor("actor", actor)
                .item("weapon", self.core.id)
                .text("state", if engage { "on" } else { "off" }),
        );
        Ok(ActionOutcome::Done)
    }
}

impl MeleeUsable for EnergyWeapon {
    fn melee_profile(&self, _items: &ItemArena) -> MeleeProfile {
        MeleeProfile::light_blunt()
    }
}
