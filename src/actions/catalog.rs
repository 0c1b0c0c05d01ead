//! Weapon action definitions

use serde::{Deserialize, Serialize};

use crate::core::types::ItemId;
use crate::weapons::MusketStep;

/// One command a wielder can give their weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponAction {
    Load { ammo: Option<ItemId> },
    Unload,
    Ready,
    Unready,
    EngageSafety,
    DisengageSafety,
    OpenCylinder,
    CloseCylinder,
    LoadChamber { index: usize, ammo: Option<ItemId> },
    Musket(MusketStep),
    AttachBayonet,
    DetachBayonet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Loading,
    Handling,
    Maintenance,
}

impl WeaponAction {
    pub fn category(&self) -> ActionCategory {
        match self {
            WeaponAction::Load { .. }
            | WeaponAction::Unload
            | WeaponAction::LoadChamber { .. } => ActionCategory::Loading,
            WeaponAction::Musket(MusketStep::Clean | MusketStep::Unjam) => {
                ActionCategory::Maintenance
            }
            WeaponAction::Musket(_) => ActionCategory::Loading,
            WeaponAction::Ready
            | WeaponAction::Unready
            | WeaponAction::EngageSafety
            | WeaponAction::DisengageSafety
            | WeaponAction::OpenCylinder
            | WeaponAction::CloseCylinder => ActionCategory::Handling,
            WeaponAction::AttachBayonet | WeaponAction::DetachBayonet => {
                ActionCategory::Maintenance
            }
        }
    }

    /// Whether the action may run as a timed continuation for some family
    pub fn may_take_time(&self) -> bool {
        matches!(
            self,
            WeaponAction::Ready | WeaponAction::Load { .. } | WeaponAction::Musket(_)
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            WeaponAction::Load { .. } => "load",
            WeaponAction::Unload => "unload",
            WeaponAction::Ready => "ready",
            WeaponAction::Unready => "unready",
            WeaponAction::EngageSafety => "engage the safety",
            WeaponAction::DisengageSafety => "release the safety",
            WeaponAction::OpenCylinder => "open the cylinder",
            WeaponAction::CloseCylinder => "close the cylinder",
            WeaponAction::LoadChamber { .. } => "load a chamber",
            WeaponAction::Musket(MusketStep::Clean) => "clean",
            WeaponAction::Musket(MusketStep::LoadPowder) => "load powder",
            WeaponAction::Musket(MusketStep::LoadCartridge) => "load a cartridge",
            WeaponAction::Musket(MusketStep::LoadBall) => "load a ball",
            WeaponAction::Musket(MusketStep::Ram) => "ram",
            WeaponAction::Musket(MusketStep::TapLoad) => "tap-load",
            WeaponAction::Musket(MusketStep::Unjam) => "unjam",
            WeaponAction::AttachBayonet => "fix the bayonet",
            WeaponAction::DetachBayonet => "unfix the bayonet",
        }
    }
}
