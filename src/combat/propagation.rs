//! Sound of a discharge and the casing it leaves
//!
//! The report is heard in every cell within the loudness radius. How it is
//! described depends on how far away the listener is as a fraction of that
//! radius; other layers of the firing cell hear it muffled.

use tracing::debug;

use crate::combat::env::FireEnv;
use crate::core::error::Result;
use crate::core::types::{CellId, ItemId, Position};
use crate::world::items::Location;
use crate::world::narrative::{Audience, Emote, EmoteStyle};

/// Announce a report of `loudness` cells from `origin`.
///
/// Returns the cells that heard it, origin first. A loudness of zero is
/// silent.
pub fn propagate_report(
    env: &mut FireEnv,
    origin: Position,
    loudness: u32,
    noun: &str,
) -> Vec<CellId> {
    if loudness == 0 {
        return Vec::new();
    }
    let sound = env.config.sound.clone();
    let mut heard = Vec::new();

    for (cell, distance) in env.spatial.cells_in_vicinity(origin.cell, loudness) {
        heard.push(cell);
        if distance == 0 {
            env.output.emit(
                Audience::Cell {
                    cell,
                    layer: Some(origin.layer),
                },
                Emote::new("A deafening {noun} rings out!")
                    .text("noun", noun)
                    .styled(EmoteStyle::Sound),
            );
            continue;
        }

        let toward = env
            .spatial
            .path_between(cell, origin.cell)
            .and_then(|path| path.get(1).copied())
            .unwrap_or(origin.cell);
        let fraction = distance as f32 / loudness as f32;
        let emote = if fraction <= sound.near_fraction {
            Emote::new("A loud {noun} rings out close by, from the direction of {toward}.")
                .cell("toward", toward)
        } else if fraction <= sound.far_fraction {
            Emote::new("You hear a {noun} from the direction of {toward}.").cell("toward", toward)
        } else {
            Emote::new("You hear a faint, distant {noun}.")
        };
        env.output.emit(
            Audience::Cell { cell, layer: None },
            emote.text("noun", noun).styled(EmoteStyle::Sound),
        );
    }

    for layer in env.spatial.adjacent_layers(origin) {
        env.output.emit(
            Audience::Cell {
                cell: origin.cell,
                layer: Some(layer),
            },
            Emote::new("A muffled {noun} sounds from {where}.")
                .text("noun", noun)
                .text("where", origin.layer.describe())
                .styled(EmoteStyle::Sound),
        );
    }

    debug!(cells = heard.len(), loudness, "report propagated");
    heard
}

/// Throw a spent casing out of the action onto the ground
pub fn eject_casing(env: &mut FireEnv, casing: ItemId, at: Position) -> Result<()> {
    env.items.detach(casing, Location::Ground(at))?;
    env.emit_at(
        at,
        Emote::new("{casing} clatters to the ground.").item("casing", casing),
    );
    Ok(())
}
