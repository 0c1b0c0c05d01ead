//! Shot resolution and its side effects

pub mod env;
pub mod outcome;
pub mod propagation;
pub mod resolution;

pub use env::FireEnv;
pub use outcome::{skill_check, CheckOutcome, Difficulty, Direction, OpposedOutcome};
pub use resolution::{
    resolve_shot, AmmoDisposal, CoverCheck, FireOutcome, ShotAmmo, ShotRequest, ShotResolution,
};
