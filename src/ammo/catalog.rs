//! Ammunition catalog loaded from TOML

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{AmmoTypeId, AmmunitionType, DAMAGE_PARAMS};
use crate::core::error::{ArmsError, Result};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    ammunition: Vec<AmmunitionType>,
}

#[derive(Debug, Clone, Default)]
pub struct AmmoCatalog {
    types: BTreeMap<AmmoTypeId, AmmunitionType>,
}

impl AmmoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog shipped in `data/ammunition.toml`
    pub fn with_defaults() -> Self {
        match Self::from_toml_str(include_str!("../../data/ammunition.toml")) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("shipped ammunition catalog is invalid: {}", e);
                Self::new()
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut catalog = Self::new();
        for ammo in file.ammunition {
            catalog.insert(ammo)?;
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Add a type after validating it
    pub fn insert(&mut self, ammo: AmmunitionType) -> Result<()> {
        Self::validate_type(&ammo).map_err(ArmsError::Config)?;
        if self.types.contains_key(&ammo.id) {
            return Err(ArmsError::Config(format!(
                "duplicate ammunition id '{}'",
                ammo.id
            )));
        }
        self.types.insert(ammo.id.clone(), ammo);
        Ok(())
    }

    fn validate_type(ammo: &AmmunitionType) -> std::result::Result<(), String> {
        for (what, p) in [("break_on_hit", ammo.break_on_hit), ("break_on_miss", ammo.break_on_miss)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(format!("{}: {} must be within 0..1, got {}", ammo.id, what, p));
            }
        }
        if ammo.tags.is_empty() {
            return Err(format!("{}: at least one compatibility tag is required", ammo.id));
        }
        let profile = &ammo.damage;
        for formula in [&profile.damage, &profile.pain, &profile.stun] {
            formula
                .check_params(&DAMAGE_PARAMS)
                .map_err(|e| format!("{}: {}", ammo.id, e))?;
        }
        Ok(())
    }

    pub fn get(&self, id: &AmmoTypeId) -> Result<&AmmunitionType> {
        self.types
            .get(id)
            .ok_or_else(|| ArmsError::UnknownAmmunition(id.0.clone()))
    }

    /// Whether a type carries any of the weapon's tags
    pub fn compatible(&self, id: &AmmoTypeId, tags: &[String]) -> bool {
        self.types
            .get(id)
            .map_or(false, |ammo| tags.iter().any(|t| ammo.has_tag(t)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &AmmoTypeId> {
        self.types.keys()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
