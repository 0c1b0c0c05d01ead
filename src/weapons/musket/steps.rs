//! Timed loading steps
//!
//! Each step binds its items when it starts and only moves them into the
//! barrel when its task completes. An interrupted step loses its progress
//! but not its items.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combat::env::FireEnv;
use crate::combat::outcome::{skill_check, CheckOutcome};
use crate::core::error::Result;
use crate::core::types::{ActorId, ItemId, TaskId, Tick};
use crate::weapons::musket::{LoadStage, Musket, BALL_TAG, CARTRIDGE_TAG};
use crate::weapons::{ActionOutcome, Refusal};
use crate::world::actor::Skill;
use crate::world::inventory::{BoundItems, Feasibility, ItemQuery, LoadTemplate};
use crate::world::items::{ItemKind, Location, ToolKind};
use crate::world::narrative::{Emote, EmoteStyle};
use crate::world::scheduler::TaskKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MusketStep {
    Clean,
    LoadPowder,
    LoadCartridge,
    LoadBall,
    Ram,
    /// Seat the charge by tapping the butt instead of ramming
    TapLoad,
    Unjam,
}

impl MusketStep {
    pub fn template(&self) -> LoadTemplate {
        let template = LoadTemplate::new().hands(2);
        match self {
            MusketStep::Clean => template.require(
                "tool",
                ItemQuery::AnyTool(vec![ToolKind::Ramrod, ToolKind::CleaningKit]),
            ),
            MusketStep::LoadPowder => template
                .require("powder", ItemQuery::Powder)
                .optional("wadding", ItemQuery::Wadding),
            MusketStep::LoadCartridge => template.require(
                "cartridge",
                ItemQuery::Ammunition {
                    tags: vec![CARTRIDGE_TAG.to_string()],
                },
            ),
            MusketStep::LoadBall => template.require(
                "ball",
                ItemQuery::Ammunition {
                    tags: vec![BALL_TAG.to_string()],
                },
            ),
            MusketStep::Ram => template.require("tool", ItemQuery::Tool(ToolKind::Ramrod)),
            MusketStep::TapLoad => template,
            MusketStep::Unjam => template.require("tool", ItemQuery::Tool(ToolKind::CleaningKit)),
        }
    }

    /// Whether the step may start from `stage`
    pub fn allowed_from(&self, stage: LoadStage) -> bool {
        match self {
            MusketStep::Clean => stage == LoadStage::Unloaded,
            MusketStep::LoadPowder | MusketStep::LoadCartridge => {
                matches!(stage, LoadStage::Unloaded | LoadStage::Cleaned)
            }
            MusketStep::LoadBall => stage == LoadStage::Powdered,
            MusketStep::Ram | MusketStep::TapLoad => stage == LoadStage::Balled,
            MusketStep::Unjam => true,
        }
    }

    fn base_ticks(&self, env: &FireEnv) -> Tick {
        let config = &env.config.musket;
        match self {
            MusketStep::Clean => config.clean_ticks,
            MusketStep::LoadPowder => config.powder_ticks,
            MusketStep::LoadCartridge => config.cartridge_ticks,
            MusketStep::LoadBall => config.ball_ticks,
            MusketStep::Ram => config.ram_ticks,
            MusketStep::TapLoad => config.tap_ticks,
            MusketStep::Unjam => config.unjam_ticks,
        }
    }

    fn begin_text(&self) -> &'static str {
        match self {
            MusketStep::Clean => "{actor} begins swabbing out the barrel of {weapon}.",
            MusketStep::LoadPowder => "{actor} pours a measure of powder down {weapon}.",
            MusketStep::LoadCartridge => "{actor} bites open a cartridge and pours it down {weapon}.",
            MusketStep::LoadBall => "{actor} drops a ball down the barrel of {weapon}.",
            MusketStep::Ram => "{actor} draws the ramrod and rams the charge of {weapon} home.",
            MusketStep::TapLoad => "{actor} taps the butt of {weapon} on the ground to seat the charge.",
            MusketStep::Unjam => "{actor} sets to clearing the fouled lock of {weapon}.",
        }
    }
}

/// How much longer (or shorter) a step takes for each grade of operate check
fn duration_factor(outcome: CheckOutcome) -> f32 {
    match outcome {
        CheckOutcome::Critical => 0.5,
        CheckOutcome::Success => 0.75,
        CheckOutcome::MarginalSuccess => 1.0,
        CheckOutcome::MarginalFailure => 1.25,
        CheckOutcome::Failure => 1.5,
        CheckOutcome::Fumble => 2.0,
    }
}

impl Musket {
    /// The step `load` would start next
    pub fn next_step(
        &self,
        env: &FireEnv,
        actor: ActorId,
        ammo: Option<ItemId>,
    ) -> std::result::Result<MusketStep, Refusal> {
        if self.jammed {
            return Err(Refusal::Jammed);
        }
        match self.stage {
            LoadStage::Unloaded if self.needs_cleaning => Ok(MusketStep::Clean),
            LoadStage::Unloaded | LoadStage::Cleaned => {
                let wants_cartridge = match ammo.and_then(|id| env.items.get(id)) {
                    Some(item) => ItemQuery::Ammunition {
                        tags: vec![CARTRIDGE_TAG.to_string()],
                    }
                    .matches(item, env.catalog),
                    None => env
                        .feasibility(actor, &MusketStep::LoadCartridge.template())
                        == Feasibility::Feasible,
                };
                if wants_cartridge {
                    Ok(MusketStep::LoadCartridge)
                } else {
                    Ok(MusketStep::LoadPowder)
                }
            }
            LoadStage::Powdered => Ok(MusketStep::LoadBall),
            LoadStage::Balled => Ok(MusketStep::Ram),
            LoadStage::Rammed => Err(Refusal::AlreadyLoaded),
        }
    }

    pub fn why_cannot_step(&self, env: &FireEnv, actor: ActorId, step: MusketStep) -> Option<Refusal> {
        if let Some(refusal) = self.core.why_cannot_handle(env, actor) {
            return Some(refusal);
        }
        match (step, self.jammed) {
            (MusketStep::Unjam, false) => return Some(Refusal::NotJammed),
            (MusketStep::Unjam, true) => {}
            (_, true) => return Some(Refusal::Jammed),
            (_, false) => {}
        }
        if !step.allowed_from(self.stage) {
            return Some(Refusal::WrongStage);
        }
        Refusal::from_feasibility(env.feasibility(actor, &step.template()))
    }

    pub fn can_step(&self, env: &FireEnv, actor: ActorId, step: MusketStep) -> bool {
        self.why_cannot_step(env, actor, step).is_none()
    }

    /// Bind the step's items and schedule its completion. The operate check
    /// decides how long it takes.
    pub fn begin_step(&mut self, env: &mut FireEnv, actor: ActorId, step: MusketStep) -> Result<ActionOutcome> {
        if let Some(refusal) = self.why_cannot_step(env, actor, step) {
            return Ok(ActionOutcome::Refused(refusal));
        }
        let bound = env.bind(actor, &step.template())?;

        let skill = env.actors.require(actor)?.skill(Skill::OperateMusket);
        let check = skill_check(&mut *env.rng, skill, env.config.musket.operate_difficulty);
        let ticks = ((step.base_ticks(env) as f32 * duration_factor(check)).round() as Tick).max(1);
        let completes_at = env.now + ticks;

        let task = env.scheduler.schedule(
            Some(actor),
            completes_at,
            TaskKind::MusketStep {
                weapon: self.core.id,
                step,
                bound,
            },
        );
        self.pending = Some((task, step));
        debug!(?step, ?check, ticks, weapon = ?self.core.id, "musket step started");

        let at = env.actor_position(actor)?;
        env.emit_at(
            at,
            Emote::new(step.begin_text())
                .actor("actor", actor)
                .item("weapon", self.core.id),
        );
        Ok(ActionOutcome::Started { task, completes_at })
    }

    /// Loading outdoors in heavy weather soaks the charge
    fn weather_wets(&self, env: &FireEnv, actor: ActorId) -> Result<bool> {
        let cell = env.actor_position(actor)?.cell;
        Ok(env.spatial.is_outdoors(cell)
            && env.spatial.precipitation(cell) >= env.config.musket.wetting_precipitation)
    }

    fn into_barrel(&self, env: &mut FireEnv, item: ItemId) -> Result<()> {
        env.items.attach(item, self.core.id)
    }

    pub fn complete_step(
        &mut self,
        env: &mut FireEnv,
        task: TaskId,
        actor: ActorId,
        step: MusketStep,
        bound: &BoundItems,
    ) -> Result<()> {
        if self.pending.map(|(t, _)| t) != Some(task) {
            debug!(?task, "stale musket step ignored");
            return Ok(());
        }
        self.pending = None;
        let at = env.actor_position(actor)?;

        let missing = bound.items().any(|item| {
            env.items
                .get(item)
                .map_or(true, |i| i.location != Location::Carried(actor))
        });
        if missing {
            env.emit_at(
                at,
                Emote::new("{actor} fumbles with {weapon}, missing something needed.")
                    .actor("actor", actor)
                    .item("weapon", self.core.id)
                    .styled(EmoteStyle::Failure),
            );
            return Ok(());
        }

        match step {
            MusketStep::Clean => {
                self.stage = LoadStage::Cleaned;
                self.needs_cleaning = false;
                self.skipped_cleaning = false;
            }
            MusketStep::LoadPowder => {
                let powder = bound.require("powder")?;
                let damp = matches!(env.items.require(powder)?.kind, ItemKind::Powder { wet: true, .. });
                let wet = damp || self.weather_wets(env, actor)?;
                self.into_barrel(env, powder)?;
                if let Some(wadding) = bound.get("wadding") {
                    self.into_barrel(env, wadding)?;
                    self.wadding = true;
                }
                if self.stage == LoadStage::Unloaded {
                    self.skipped_cleaning = self.needs_cleaning;
                }
                self.wet_powder |= wet;
                self.stage = LoadStage::Powdered;
            }
            MusketStep::LoadCartridge => {
                let cartridge = bound.require("cartridge")?;
                let wet = self.weather_wets(env, actor)?;
                self.into_barrel(env, cartridge)?;
                if self.stage == LoadStage::Unloaded {
                    self.skipped_cleaning = self.needs_cleaning;
                }
                self.wet_powder |= wet;
                self.stage = LoadStage::Balled;
            }
            MusketStep::LoadBall => {
                let ball = bound.require("ball")?;
                self.into_barrel(env, ball)?;
                self.stage = LoadStage::Balled;
            }
            MusketStep::Ram => {
                self.tap_loaded = false;
                self.stage = LoadStage::Rammed;
            }
            MusketStep::TapLoad => {
                self.tap_loaded = true;
                self.stage = LoadStage::Rammed;
            }
            MusketStep::Unjam => {
                for item in self.barrel_contents(&*env.items) {
                    env.items.remove(item);
                }
                self.jammed = false;
                self.needs_cleaning = true;
                self.stage = LoadStage::Unloaded;
                self.tap_loaded = false;
                self.skipped_cleaning = false;
                self.wet_powder = false;
                self.wadding = false;
            }
        }
        debug!(?step, stage = ?self.stage, weapon = ?self.core.id, "musket step complete");

        let text = if step == MusketStep::Unjam {
            "{actor} clears the lock of {weapon}; it is {state}."
        } else {
            "{weapon} is now {state}."
        };
        env.emit_at(
            at,
            Emote::new(text)
                .actor("actor", actor)
                .item("weapon", self.core.id)
                .text("state", self.stage.describe()),
        );
        Ok(())
    }
}
