use thiserror::Error;

use crate::core::types::{ActorId, ItemId};
use crate::formula::FormulaError;

/// Fatal errors: data or logic defects that abort the current action.
///
/// Gameplay failures (misfires, jams, "not loaded", "safety on") are never
/// reported through this type.
#[derive(Error, Debug)]
pub enum ArmsError {
    #[error("Item not found: {0:?}")]
    ItemNotFound(ItemId),

    #[error("Actor not found: {0:?}")]
    ActorNotFound(ActorId),

    #[error("Unknown ammunition type: {0}")]
    UnknownAmmunition(String),

    #[error("Item {0:?} is not {1}")]
    WrongItemKind(ItemId, &'static str),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArmsError>;
