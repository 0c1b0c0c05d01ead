//! Firelock - ranged weapon loading, firing and ballistic resolution
//!
//! Weapons are state machines over items in an arena. Loading, readying
//! and firing are driven through `actions`, which borrow the `World` as a
//! `FireEnv` for the length of one action; timed steps come back through
//! the world's scheduler.

pub mod actions;
pub mod ammo;
pub mod combat;
pub mod core;
pub mod formula;
pub mod weapons;
pub mod world;
