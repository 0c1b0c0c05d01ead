//! Actors: anything with hands that can wield a weapon

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{ArmsError, Result};
use crate::core::types::{ActorId, CombatId, Position};

/// Skills consulted by the firing systems (values 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    OperateMusket,
    Archery,
    Marksmanship,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub position: Position,
    pub free_hands: u8,
    pub stamina: f32,
    pub max_stamina: f32,
    pub skills: AHashMap<Skill, f32>,
    /// The fight this actor is part of, if any
    pub combat: Option<CombatId>,
    pub incapacitated: bool,
}

impl Actor {
    pub fn new(id: ActorId, name: &str, position: Position) -> Self {
        Self {
            id,
            name: name.to_string(),
            position,
            free_hands: 2,
            stamina: 100.0,
            max_stamina: 100.0,
            skills: AHashMap::new(),
            combat: None,
            incapacitated: false,
        }
    }

    /// Skill value, 0 when untrained
    pub fn skill(&self, skill: Skill) -> f32 {
        self.skills.get(&skill).copied().unwrap_or(0.0)
    }

    /// Spend stamina if enough remains
    pub fn spend_stamina(&mut self, amount: f32) -> bool {
        if self.stamina < amount {
            return false;
        }
        self.stamina -= amount;
        true
    }
}

/// Id-indexed store of every actor
#[derive(Debug, Clone, Default)]
pub struct ActorRoster {
    actors: AHashMap<ActorId, Actor>,
    next_id: u64,
}

impl ActorRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, name: &str, position: Position) -> ActorId {
        self.next_id += 1;
        let id = ActorId(self.next_id);
        self.actors.insert(id, Actor::new(id, name, position));
        id
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    pub fn require(&self, id: ActorId) -> Result<&Actor> {
        self.actors.get(&id).ok_or(ArmsError::ActorNotFound(id))
    }

    pub fn require_mut(&mut self, id: ActorId) -> Result<&mut Actor> {
        self.actors.get_mut(&id).ok_or(ArmsError::ActorNotFound(id))
    }

    pub fn name(&self, id: ActorId) -> String {
        self.actors
            .get(&id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "someone".to_string())
    }

    /// Actor ids in ascending order
    pub fn ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.actors.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
