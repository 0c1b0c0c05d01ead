//! Headless firing range
//!
//! Runs one or all weapon families through load, ready and fire on the
//! default range and prints the narrative.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use firelock::actions::{self, WeaponAction};
use firelock::ammo::{AmmoCatalog, AmmunitionUnit};
use firelock::combat::ShotRequest;
use firelock::core::error::{ArmsError, Result};
use firelock::core::rng;
use firelock::core::types::{ActorId, CellId, ItemId, Position};
use firelock::core::FiringConfig;
use firelock::weapons::{
    ActionOutcome, Bow, EnergyWeapon, FireReport, MagazineWeapon, Musket, MusketStep, Refusal,
    Revolver, Weapon,
};
use firelock::world::actor::Skill;
use firelock::world::body::Target;
use firelock::world::items::{ItemKind, Location, Magazine, PowerPack, ToolKind};
use firelock::world::spatial::{Precipitation, RoomMap};
use firelock::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Bow,
    Revolver,
    Magazine,
    Energy,
    Musket,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Weather {
    Clear,
    Light,
    Heavy,
    Storm,
}

impl Weather {
    fn precipitation(self) -> Precipitation {
        match self {
            Weather::Clear => Precipitation::None,
            Weather::Light => Precipitation::Light,
            Weather::Heavy => Precipitation::Heavy,
            Weather::Storm => Precipitation::Storm,
        }
    }
}

/// Firing range - run weapons through their paces and print what happens
#[derive(Parser, Debug)]
#[command(name = "range_sim")]
#[command(about = "Load, ready and fire weapons on a headless range")]
struct Args {
    /// Which weapon family to run
    #[arg(long, value_enum, default_value = "all")]
    scenario: Scenario,

    /// Random seed for deterministic runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Firing configuration (TOML); the shipped defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ammunition catalog (TOML); the shipped catalog otherwise
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Shots per weapon
    #[arg(long, default_value_t = 3)]
    shots: u32,

    /// Weather over the firing line
    #[arg(long, value_enum, default_value = "clear")]
    weather: Weather,
}

struct Range {
    world: World,
    shooter: ActorId,
    target: ActorId,
}

impl Range {
    fn new(args: &Args, config: &FiringConfig, catalog: &AmmoCatalog) -> Self {
        let mut rooms = RoomMap::firing_range();
        rooms.set_precipitation(CellId(2), args.weather.precipitation());
        let mut world = World::with_parts(
            rooms,
            catalog.clone(),
            config.clone(),
            Box::new(rng::seeded(args.seed)),
        );
        let shooter = world.actors.spawn("Ezra", Position::ground(CellId(2)));
        let target = world.actors.spawn("the straw man", Position::ground(CellId(4)));
        if let Some(actor) = world.actors.get_mut(shooter) {
            actor.skills.insert(Skill::OperateMusket, 55.0);
            actor.skills.insert(Skill::Archery, 50.0);
            actor.skills.insert(Skill::Marksmanship, 50.0);
        }
        Self {
            world,
            shooter,
            target,
        }
    }

    fn carry(&mut self, name: &str, kind: ItemKind, count: u32) -> ItemId {
        self.world
            .items
            .spawn_stack(name, kind, Location::Carried(self.shooter), count)
    }

    fn rounds(&mut self, type_id: &str, name: &str, count: u32) -> ItemId {
        self.carry(name, ItemKind::Ammunition(AmmunitionUnit::new(type_id, 5.0)), count)
    }

    /// Perform an action and let any timed part of it finish
    fn act(&mut self, weapon: ItemId, action: WeaponAction) -> Result<ActionOutcome> {
        let outcome = actions::perform(&mut self.world, self.shooter, weapon, action)?;
        if let ActionOutcome::Started { completes_at, .. } = outcome {
            self.world.advance_to(completes_at)?;
        }
        Ok(outcome)
    }

    fn fire(&mut self, weapon: ItemId) -> Result<FireReport> {
        let request = ShotRequest::at(self.shooter, Target::Actor(self.target));
        let report = actions::try_fire(&mut self.world, weapon, &request)?;
        let now = self.world.now + 1;
        self.world.advance_to(now)?;
        Ok(report)
    }
}

fn run_bow(range: &mut Range, shots: u32) -> Result<()> {
    let bow = range
        .world
        .spawn_weapon("a longbow", Location::Carried(range.shooter), |id| {
            Ok(Weapon::Bow(Bow::longbow(id)))
        })?;
    range.rounds("broadhead-arrow", "a broadhead arrow", shots);
    for _ in 0..shots {
        range.act(bow, WeaponAction::Load { ammo: None })?;
        range.act(bow, WeaponAction::Ready)?;
        range.fire(bow)?;
    }
    Ok(())
}

fn run_revolver(range: &mut Range, shots: u32) -> Result<()> {
    let revolver = range
        .world
        .spawn_weapon("a six-shot revolver", Location::Carried(range.shooter), |id| {
            Ok(Weapon::Revolver(Revolver::six_shooter(id)?))
        })?;
    range.rounds("pistol-round", "a pistol round", 4);
    range.act(revolver, WeaponAction::OpenCylinder)?;
    while let ActionOutcome::Done = range.act(revolver, WeaponAction::Load { ammo: None })? {}
    range.act(revolver, WeaponAction::CloseCylinder)?;
    range.act(revolver, WeaponAction::Ready)?;
    for _ in 0..shots.max(5) {
        range.fire(revolver)?;
    }
    Ok(())
}

fn run_magazine(range: &mut Range, shots: u32) -> Result<()> {
    let pistol = range
        .world
        .spawn_weapon("a semi-automatic pistol", Location::Carried(range.shooter), |id| {
            Ok(Weapon::Magazine(MagazineWeapon::pistol(id)))
        })?;
    let magazine = range.carry(
        "a pistol magazine",
        ItemKind::Magazine(Magazine::new(8, &["pistol"])),
        1,
    );
    for _ in 0..shots {
        let round = range.world.items.spawn(
            "a pistol round",
            ItemKind::Ammunition(AmmunitionUnit::new("pistol-round", 5.0)),
            Location::Nowhere,
        );
        range.world.items.attach(round, magazine)?;
    }
    range.act(pistol, WeaponAction::Load { ammo: Some(magazine) })?;
    range.act(pistol, WeaponAction::Ready)?;
    range.act(pistol, WeaponAction::EngageSafety)?;
    range.fire(pistol)?;
    range.act(pistol, WeaponAction::DisengageSafety)?;
    for _ in 0..=shots {
        range.fire(pistol)?;
    }
    Ok(())
}

fn run_energy(range: &mut Range, shots: u32) -> Result<()> {
    let carbine = range
        .world
        .spawn_weapon("a laser carbine", Location::Carried(range.shooter), |id| {
            Ok(Weapon::Energy(EnergyWeapon::laser_carbine(id)))
        })?;
    range.carry(
        "a power pack",
        ItemKind::PowerPack(PowerPack::new(100.0, 5.0)),
        1,
    );
    range.act(carbine, WeaponAction::Load { ammo: None })?;
    for _ in 0..shots.max(5) {
        if let ActionOutcome::Refused(refusal) = range.act(carbine, WeaponAction::Ready)? {
            if refusal != Refusal::AlreadyReadied {
                println!("  (cannot ready: {})", refusal);
            }
        }
        range.fire(carbine)?;
    }
    let later = range.world.now + 200;
    range.world.advance_to(later)?;
    Ok(())
}

fn run_musket(range: &mut Range, shots: u32) -> Result<()> {
    let musket = range
        .world
        .spawn_weapon("a flintlock musket", Location::Carried(range.shooter), |id| {
            Ok(Weapon::Musket(Musket::flintlock(id)))
        })?;
    range.carry("a measure of powder", ItemKind::Powder { quality: 5.0, wet: false }, shots);
    range.rounds("musket-ball", "a musket ball", shots);
    range.carry("a scrap of wadding", ItemKind::Wadding, shots);
    range.carry("a ramrod", ItemKind::Tool(ToolKind::Ramrod), 1);
    range.carry("a cleaning kit", ItemKind::Tool(ToolKind::CleaningKit), 1);

    for _ in 0..shots {
        loop {
            match range.act(musket, WeaponAction::Load { ammo: None })? {
                ActionOutcome::Refused(Refusal::AlreadyLoaded) => break,
                ActionOutcome::Refused(Refusal::Jammed) => {
                    let unjam = range.act(musket, WeaponAction::Musket(MusketStep::Unjam))?;
                    if let ActionOutcome::Refused(refusal) = unjam {
                        println!("  (cannot unjam: {})", refusal);
                        return Ok(());
                    }
                }
                ActionOutcome::Refused(refusal) => {
                    println!("  (cannot load: {})", refusal);
                    return Ok(());
                }
                _ => {}
            }
        }
        range.act(musket, WeaponAction::Ready)?;
        range.fire(musket)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FiringConfig::load(path)?,
        None => FiringConfig::default(),
    };
    config.validate().map_err(ArmsError::Config)?;
    let catalog = match &args.catalog {
        Some(path) => AmmoCatalog::load(path)?,
        None => AmmoCatalog::with_defaults(),
    };

    let scenarios: Vec<(Scenario, fn(&mut Range, u32) -> Result<()>)> = vec![
        (Scenario::Bow, run_bow),
        (Scenario::Revolver, run_revolver),
        (Scenario::Magazine, run_magazine),
        (Scenario::Energy, run_energy),
        (Scenario::Musket, run_musket),
    ];

    for (scenario, run) in scenarios {
        if args.scenario != Scenario::All && args.scenario != scenario {
            continue;
        }
        println!("=== {:?} (seed {}) ===", scenario, args.seed);
        let mut range = Range::new(&args, &config, &catalog);
        run(&mut range, args.shots)?;
        for line in range.world.rendered_log() {
            println!("{}", line);
        }
        let wounds = range.world.bodies.wounds_of(Target::Actor(range.target)).len();
        println!("--- {} wound(s) on the target, tick {}\n", wounds, range.world.now);
    }
    Ok(())
}
