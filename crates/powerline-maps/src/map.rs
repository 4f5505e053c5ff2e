//! Board definitions and their structural validation.

use std::collections::{BTreeMap, HashSet};

use powerline_protocol::MapSummary;
use serde::{Deserialize, Serialize};

use crate::MapError;

/// Player-count bounds for a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCount {
    pub min: usize,
    pub max: usize,
    /// Counts the board plays best with.
    #[serde(default)]
    pub recommended: Vec<usize>,
}

impl PlayerCount {
    /// Returns `true` if `players` is within `min..=max`.
    pub fn allows(&self, players: usize) -> bool {
        (self.min..=self.max).contains(&players)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// An undirected link between two cities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityLink {
    pub from: String,
    pub to: String,
    /// Connection cost. Signed on the wire so a negative value is reported
    /// as a validation error instead of a parse error.
    pub cost: i64,
}

/// When the game advances between steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTriggers {
    /// Player count → number of cities one player must reach for step 2.
    #[serde(default)]
    pub step2_cities: BTreeMap<usize, u32>,
    /// Whether drawing the "step 3" card triggers step 3.
    #[serde(default = "default_true")]
    pub step3_on_card: bool,
}

fn default_true() -> bool {
    true
}

/// Supply and pricing of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRules {
    pub initial_supply: u32,
    pub max_supply: u32,
    /// Price per unit, cheapest slot first.
    #[serde(default)]
    pub prices: Vec<u32>,
    /// Player count → units restocked per step (step 1, 2, 3).
    #[serde(default)]
    pub resupply: BTreeMap<usize, Vec<u32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinConditions {
    /// Player count → cities that end the game.
    #[serde(default)]
    pub end_game_cities: BTreeMap<usize, u32>,
}

/// Game parameters carried with a board.
///
/// This layer validates only what it must (`starting_money`); the rest is
/// passed through to the game engine untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRules {
    pub starting_money: i64,
    #[serde(default)]
    pub phase_triggers: PhaseTriggers,
    /// Resource name (`coal`, `oil`, ...) → supply table.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRules>,
    /// Index = cities powered, value = income.
    #[serde(default)]
    pub earnings: Vec<u32>,
    #[serde(default)]
    pub win_conditions: WinConditions,
}

/// One immutable board definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub player_count: PlayerCount,
    #[serde(default)]
    pub regions: Vec<Region>,
    pub cities: Vec<City>,
    #[serde(default)]
    pub connections: Vec<CityLink>,
    pub rules: MapRules,
}

impl MapData {
    /// Checks every structural rule a board must satisfy.
    pub fn validate(&self) -> Result<(), MapError> {
        let id = self.id.as_str();
        if id.trim().is_empty() {
            return Err(MapError::invalid(id, "id is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(MapError::invalid(id, "name is empty"));
        }
        if self.cities.is_empty() {
            return Err(MapError::invalid(id, "map has no cities"));
        }

        let pc = &self.player_count;
        if pc.min < 2 {
            return Err(MapError::invalid(id, format!("min players {} is below 2", pc.min)));
        }
        if pc.max < pc.min {
            return Err(MapError::invalid(
                id,
                format!("max players {} is below min {}", pc.max, pc.min),
            ));
        }
        if let Some(bad) = pc.recommended.iter().find(|n| !pc.allows(**n)) {
            return Err(MapError::invalid(
                id,
                format!("recommended count {bad} is outside {}..={}", pc.min, pc.max),
            ));
        }

        let regions: HashSet<&str> = self.regions.iter().map(|r| r.id.as_str()).collect();
        let mut cities = HashSet::with_capacity(self.cities.len());
        for city in &self.cities {
            if city.id.trim().is_empty() {
                return Err(MapError::invalid(id, "city with empty id"));
            }
            if !cities.insert(city.id.as_str()) {
                return Err(MapError::invalid(id, format!("duplicate city '{}'", city.id)));
            }
            if !regions.is_empty() && !regions.contains(city.region.as_str()) {
                return Err(MapError::invalid(
                    id,
                    format!("city '{}' is in unknown region '{}'", city.id, city.region),
                ));
            }
        }

        for link in &self.connections {
            for end in [&link.from, &link.to] {
                if !cities.contains(end.as_str()) {
                    return Err(MapError::invalid(
                        id,
                        format!("connection {}-{} references unknown city '{end}'", link.from, link.to),
                    ));
                }
            }
            if link.from == link.to {
                return Err(MapError::invalid(id, format!("connection loops on '{}'", link.from)));
            }
            if link.cost < 0 {
                return Err(MapError::invalid(
                    id,
                    format!("connection {}-{} has negative cost {}", link.from, link.to, link.cost),
                ));
            }
        }

        if self.rules.starting_money <= 0 {
            return Err(MapError::invalid(id, "starting money must be positive"));
        }

        Ok(())
    }

    /// Listing row for this board.
    pub fn summary(&self) -> MapSummary {
        MapSummary {
            map_id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            min_players: self.player_count.min,
            max_players: self.player_count.max,
            recommended_players: self.player_count.recommended.clone(),
            city_count: self.cities.len(),
        }
    }
}
