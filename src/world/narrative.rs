//! Structured narrative output
//!
//! Player-visible text leaves the firing core as templates with `{key}`
//! tokens bound to actors, items and cells. Rendering to plain text is the
//! sink's business.

use serde::{Deserialize, Serialize};

use crate::combat::outcome::Difficulty;
use crate::core::types::{ActorId, CellId, ItemId, Layer};
use crate::world::body::Target;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmoteRef {
    Actor(ActorId),
    Item(ItemId),
    Cell(CellId),
    Text(String),
}

impl From<Target> for EmoteRef {
    fn from(target: Target) -> Self {
        match target {
            Target::Actor(actor) => EmoteRef::Actor(actor),
            Target::Item(item) => EmoteRef::Item(item),
        }
    }
}

/// Who is allowed to perceive an emote
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Visibility {
    Always,
    /// Only observers passing a notice check at this difficulty
    NoticeCheck(Difficulty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmoteStyle {
    Action,
    Sound,
    Hit,
    Miss,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emote {
    pub template: String,
    pub tokens: Vec<(String, EmoteRef)>,
    pub visibility: Visibility,
    pub style: EmoteStyle,
}

impl Emote {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            tokens: Vec::new(),
            visibility: Visibility::Always,
            style: EmoteStyle::Action,
        }
    }

    pub fn with(mut self, key: &str, reference: EmoteRef) -> Self {
        self.tokens.push((key.to_string(), reference));
        self
    }

    pub fn actor(mut self, key: &str, actor: ActorId) -> Self {
        self.tokens.push((key.to_string(), EmoteRef::Actor(actor)));
        self
    }

    pub fn item(mut self, key: &str, item: ItemId) -> Self {
        self.tokens.push((key.to_string(), EmoteRef::Item(item)));
        self
    }

    pub fn cell(mut self, key: &str, cell: CellId) -> Self {
        self.tokens.push((key.to_string(), EmoteRef::Cell(cell)));
        self
    }

    pub fn text(mut self, key: &str, text: &str) -> Self {
        self.tokens
            .push((key.to_string(), EmoteRef::Text(text.to_string())));
        self
    }

    pub fn styled(mut self, style: EmoteStyle) -> Self {
        self.style = style;
        self
    }

    pub fn noticed(mut self, difficulty: Difficulty) -> Self {
        self.visibility = Visibility::NoticeCheck(difficulty);
        self
    }

    /// Substitute every token using `resolve` for the display names
    pub fn render(&self, resolve: impl Fn(&EmoteRef) -> String) -> String {
        let mut out = self.template.clone();
        for (key, reference) in &self.tokens {
            out = out.replace(&format!("{{{}}}", key), &resolve(reference));
        }
        out
    }
}

/// Who an emote is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Audience {
    /// Everyone in a cell, optionally restricted to one layer
    Cell { cell: CellId, layer: Option<Layer> },
    Actor(ActorId),
}

/// Boundary to the output-handling collaborator
pub trait OutputSink {
    fn emit(&mut self, audience: Audience, emote: Emote);
}

/// Sink that keeps everything, in order
#[derive(Debug, Clone, Default)]
pub struct NarrativeLog {
    entries: Vec<(Audience, Emote)>,
}

impl NarrativeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(Audience, Emote)] {
        &self.entries
    }

    /// True if any template contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.entries.iter().any(|(_, e)| e.template.contains(needle))
    }

    pub fn to_cell(&self, cell: CellId) -> Vec<&Emote> {
        self.entries
            .iter()
            .filter(|(audience, _)| matches!(audience, Audience::Cell { cell: c, .. } if *c == cell))
            .map(|(_, e)| e)
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OutputSink for NarrativeLog {
    fn emit(&mut self, audience: Audience, emote: Emote) {
        tracing::trace!(template = %emote.template, "emote");
        self.entries.push((audience, emote));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_tokens() {
        let emote = Emote::new("{actor} looses {ammo} at {target}.")
            .actor("actor", ActorId(1))
            .item("ammo", ItemId(2))
            .actor("target", ActorId(3));
        let text = emote.render(|r| match r {
            EmoteRef::Actor(ActorId(1)) => "Ada".to_string(),
            EmoteRef::Actor(_) => "the dummy".to_string(),
            EmoteRef::Item(_) => "an arrow".to_string(),
            _ => String::new(),
        });
        assert_eq!(text, "Ada looses an arrow at the dummy.");
    }

    #[test]
    fn test_log_filters_by_cell() {
        let mut log = NarrativeLog::new();
        log.emit(
            Audience::Cell { cell: CellId(1), layer: None },
            Emote::new("bang"),
        );
        log.emit(Audience::Actor(ActorId(4)), Emote::new("whisper"));
        assert_eq!(log.to_cell(CellId(1)).len(), 1);
        assert!(log.mentions("whisper"));
        assert!(!log.mentions("thunder"));
    }

    #[test]
    fn test_notice_gate() {
        let emote = Emote::new("something flashes past").noticed(Difficulty::Hard);
        assert_eq!(emote.visibility, Visibility::NoticeCheck(Difficulty::Hard));
    }
}
