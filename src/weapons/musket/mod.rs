//! Muzzle-loading muskets
//!
//! Loading is a ladder of timed steps, each needing its own items:
//!
//! ```text
//! 0 unloaded --clean--> 1 cleaned --powder--> 2 powdered --ball--> 3 loaded --ram/tap--> 4 rammed
//!      \________________________\--cartridge-------------------------^
//! ```
//!
//! Loading powder or a cartridge straight from stage 0 skips the cleaning.
//! Firing, misfiring, jamming and drawing the charge all drop the stage
//! back to 0.

pub mod failure;
pub mod steps;

pub use steps::MusketStep;

use serde::{Deserialize, Serialize};

use crate::combat::env::FireEnv;
use crate::combat::resolution::ShotRequest;
use crate::core::error::Result;
use crate::core::types::{ActorId, ItemId, TaskId};
use crate::weapons::common::{return_to, WeaponCore, WeaponProfile};
use crate::weapons::melee::MeleeProfile;
use crate::weapons::{ActionOutcome, FireReport, MeleeUsable, RangedFireable, Refusal};
use crate::world::inventory::{ItemQuery, LoadTemplate};
use crate::world::items::{ItemArena, Location};
use crate::world::narrative::Emote;

/// Tag of loose musket balls
pub const BALL_TAG: &str = "musket-ball";
/// Tag of paper cartridges (powder and ball in one)
pub const CARTRIDGE_TAG: &str = "musket-cartridge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoadStage {
    Unloaded,
    Cleaned,
    Powdered,
    Balled,
    Rammed,
}

impl LoadStage {
    pub fn index(&self) -> u8 {
        match self {
            LoadStage::Unloaded => 0,
            LoadStage::Cleaned => 1,
            LoadStage::Powdered => 2,
            LoadStage::Balled => 3,
            LoadStage::Rammed => 4,
        }
    }

    pub fn from_index(index: u8) -> Option<LoadStage> {
        match index {
            0 => Some(LoadStage::Unloaded),
            1 => Some(LoadStage::Cleaned),
            2 => Some(LoadStage::Powdered),
            3 => Some(LoadStage::Balled),
            4 => Some(LoadStage::Rammed),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            LoadStage::Unloaded => "unloaded",
            LoadStage::Cleaned => "clean and empty",
            LoadStage::Powdered => "charged with powder",
            LoadStage::Balled => "loaded but not rammed",
            LoadStage::Rammed => "loaded and rammed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Musket {
    pub core: WeaponCore,
    pub stage: LoadStage,
    pub needs_cleaning: bool,
    pub jammed: bool,
    /// Seated by tapping rather than ramming
    pub tap_loaded: bool,
    /// Loaded on a fouled barrel
    pub skipped_cleaning: bool,
    pub wet_powder: bool,
    pub wadding: bool,
    pub bayonet: Option<ItemId>,
    /// Step in progress
    pub pending: Option<(TaskId, MusketStep)>,
}

impl Musket {
    pub fn new(id: ItemId, profile: WeaponProfile) -> Self {
        Self {
            core: WeaponCore::new(id, profile),
            stage: LoadStage::Unloaded,
            needs_cleaning: false,
            jammed: false,
            tap_loaded: false,
            skipped_cleaning: false,
            wet_powder: false,
            wadding: false,
            bayonet: None,
            pending: None,
        }
    }

    pub fn flintlock(id: ItemId) -> Self {
        Self::new(
            id,
            WeaponProfile::new("a flintlock musket", &[BALL_TAG, CARTRIDGE_TAG]).with_loudness(5),
        )
    }

    /// Everything down the barrel (the bayonet rides outside it)
    pub fn barrel_contents(&self, items: &ItemArena) -> Vec<ItemId> {
        let bayonet = self.bayonet;
        items
            .contents_of(self.core.id)
            .into_iter()
            .filter(|id| Some(*id) != bayonet)
            .collect()
    }

    /// Back to stage 0 with a fouled barrel. Every discharge attempt ends here.
    pub fn reset_after_fire(&mut self) {
        self.stage = LoadStage::Unloaded;
        self.needs_cleaning = true;
        self.core.readied = false;
        self.tap_loaded = false;
        self.skipped_cleaning = false;
        self.wet_powder = false;
        self.wadding = false;
    }

    pub fn task_voided(&mut self, task: TaskId) {
        if self.pending.map(|(t, _)| t) == Some(task) {
            self.pending = None;
        }
    }

    fn bayonet_template() -> LoadTemplate {
        LoadTemplate::new()
            .require("bayonet", ItemQuery::Bayonet)
            .hands(2)
    }

    pub fn why_cannot_attach_bayonet(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| self.bayonet.map(|_| Refusal::BayonetFitted))
            .or_else(|| Refusal::from_feasibility(env.feasibility(actor, &Self::bayonet_template())))
    }

    pub fn attach_bayonet(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_attach_bayonet(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let bayonet = env.bind(actor, &Self::bayonet_template())?.require("bayonet")?;
        env.items.attach(bayonet, self.core.id)?;
        self.bayonet = Some(bayonet);
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} fixes {bayonet} to {weapon}.")
                .actor("actor", actor)
                .item("bayonet", bayonet)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    pub fn why_cannot_detach_bayonet(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        self.core
            .why_cannot_handle(env, actor)
            .or_else(|| self.bayonet.is_none().then_some(Refusal::NoBayonet))
    }

    pub fn detach_bayonet(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_detach_bayonet(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        if let Some(bayonet) = self.bayonet.take() {
            return_to(env, bayonet, actor)?;
        }
        Ok(ActionOutcome::Done)
    }
}

impl RangedFireable for Musket {
    fn core(&self) -> &WeaponCore {
        &self.core
    }

    fn is_loaded(&self, items: &ItemArena) -> bool {
        !self.barrel_contents(items).is_empty()
    }

    fn why_cannot_load(&self, env: &FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        match self.next_step(env, actor, ammo) {
            Ok(step) => self.why_cannot_step(env, actor, step),
            Err(refusal) => Some(refusal),
        }
    }

    /// Start whichever loading step comes next
    fn load(&mut self, env: &mut FireEnv, actor: ActorId, ammo: Option<ItemId>) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_load(env, actor, ammo) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        match self.next_step(env, actor, ammo) {
            Ok(step) => self.begin_step(env, actor, step),
            Err(refusal) => Ok(ActionOutcome::Refused(refusal)),
        }
    }

    fn why_cannot_unload(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.jammed {
            return Some(Refusal::Jammed);
        }
        (self.stage == LoadStage::Unloaded && self.barrel_contents(&*env.items).is_empty())
            .then_some(Refusal::NothingToUnload)
    }

    /// Draw the charge: loose components go back to the actor
    fn unload(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_unload(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        for item in self.barrel_contents(&*env.items) {
            return_to(env, item, actor)?;
        }
        self.stage = LoadStage::Unloaded;
        self.core.readied = false;
        self.tap_loaded = false;
        self.wet_powder = false;
        self.wadding = false;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} draws the charge from {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Done)
    }

    fn why_cannot_ready(&self, env: &FireEnv, actor: ActorId) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        if self.jammed {
            return Some(Refusal::Jammed);
        }
        self.core.readied.then_some(Refusal::AlreadyReadied)
    }

    /// Prime the pan and cock the lock
    fn ready(&mut self, env: &mut FireEnv, actor: ActorId) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_ready(env, actor) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        self.core.readied = true;
        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new("{actor} primes the pan and cocks {weapon}.")
                .actor("actor", actor)
                .item("weapon", self.core.id),
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
        if self.jammed {
            return Some(Refusal::Jammed);
        }
        (!self.core.readied).then_some(Refusal::NotReadied)
    }

    fn fire(&mut self, env: &mut FireEnv, request: &ShotRequest) -> Result<FireReport> {
        if let Some(refusal) = self.why_cannot_fire(env, request.actor) {
            return Err(self.core.not_ready(refusal));
        }
        failure::discharge_musket(self, env, request)
    }
}

impl MeleeUsable for Musket {
    fn melee_profile(&self, items: &ItemArena) -> MeleeProfile {
        let fixed = self.bayonet.map_or(false, |b| {
            items
                .get(b)
                .map_or(false, |i| i.location == Location::InWeapon(self.core.id))
        });
        if fixed {
            MeleeProfile::bayonet_spear()
        } else {
            MeleeProfile::musket_club()
        }
    }
}
