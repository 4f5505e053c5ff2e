//! The map catalog: every board the server knows, indexed by ID.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use powerline_protocol::MapSummary;

use crate::path::CityGraph;
use crate::{MapData, MapError, Route};

struct LoadedMap {
    data: Arc<MapData>,
    graph: CityGraph,
}

/// Read-only set of validated boards.
///
/// Built once and shared behind an `Arc`; there is no mutable state, so no
/// locking is needed to read it.
#[derive(Default)]
pub struct MapCatalog {
    maps: BTreeMap<String, LoadedMap>,
}

impl MapCatalog {
    /// A catalog with no maps. Lobbies created against it carry no map.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads every `*.json` file in `dir`.
    ///
    /// Files are read in sorted path order. Any unreadable, unparsable, or
    /// invalid file (or a duplicate ID) fails the whole load.
    pub fn load_all(dir: impl AsRef<Path>) -> Result<Self, MapError> {
        let dir = dir.as_ref();
        let io_err = |source| MapError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut maps = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = std::fs::read(&path).map_err(|source| MapError::Io {
                path: path.clone(),
                source,
            })?;
            let map: MapData = serde_json::from_slice(&raw)
                .map_err(|source| MapError::Parse { path: path.clone(), source })?;
            tracing::debug!(map_id = %map.id, path = %path.display(), "parsed map");
            maps.push(map);
        }

        let catalog = Self::from_maps(maps)?;
        tracing::info!(dir = %dir.display(), maps = catalog.len(), "map catalog loaded");
        Ok(catalog)
    }

    /// Builds a catalog from in-memory definitions, with the same
    /// validation as [`load_all`](Self::load_all).
    pub fn from_maps(maps: impl IntoIterator<Item = MapData>) -> Result<Self, MapError> {
        let mut catalog = Self::default();
        for map in maps {
            map.validate()?;
            if catalog.maps.contains_key(&map.id) {
                return Err(MapError::Duplicate(map.id));
            }
            let graph = CityGraph::new(&map);
            catalog.maps.insert(
                map.id.clone(),
                LoadedMap {
                    data: Arc::new(map),
                    graph,
                },
            );
        }
        Ok(catalog)
    }

    /// Looks up a board by ID.
    pub fn get(&self, map_id: &str) -> Option<Arc<MapData>> {
        self.maps.get(map_id).map(|m| Arc::clone(&m.data))
    }

    pub fn contains(&self, map_id: &str) -> bool {
        self.maps.contains_key(map_id)
    }

    /// Summaries of every board, ordered by ID.
    pub fn list(&self) -> Vec<MapSummary> {
        self.maps.values().map(|m| m.data.summary()).collect()
    }

    /// The lowest map ID, used when a lobby doesn't pick a board.
    pub fn first_id(&self) -> Option<&str> {
        self.maps.keys().next().map(String::as_str)
    }

    /// Cheapest route between two cities of a board, treating every
    /// connection as bidirectional.
    ///
    /// `None` if the map or either city is unknown, or `to` is
    /// unreachable from `from`.
    pub fn shortest_path(&self, map_id: &str, from: &str, to: &str) -> Option<Route> {
        self.maps.get(map_id)?.graph.shortest_path(from, to)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::tests::linear_map;

    #[test]
    fn test_from_maps_indexes_by_id() {
        let catalog = MapCatalog::from_maps([linear_map("beta"), linear_map("alpha")]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("alpha"));
        assert_eq!(catalog.get("beta").unwrap().id, "beta");
        assert!(catalog.get("gamma").is_none());
        assert_eq!(catalog.first_id(), Some("alpha"));
    }

    #[test]
    fn test_from_maps_rejects_duplicates() {
        let result = MapCatalog::from_maps([linear_map("x"), linear_map("x")]);
        assert!(matches!(result, Err(MapError::Duplicate(id)) if id == "x"));
    }

    #[test]
    fn test_from_maps_fails_fast_on_invalid_map() {
        let mut bad = linear_map("bad");
        bad.rules.starting_money = -5;
        let result = MapCatalog::from_maps([linear_map("good"), bad]);
        assert!(matches!(result, Err(MapError::Invalid { map_id, .. }) if map_id == "bad"));
    }

    #[test]
    fn test_list_is_ordered_by_id() {
        let catalog = MapCatalog::from_maps([linear_map("b"), linear_map("a")]).unwrap();
        let ids: Vec<String> = catalog.list().into_iter().map(|s| s.map_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_shortest_path_through_catalog() {
        let catalog = MapCatalog::from_maps([linear_map("m")]).unwrap();

        let route = catalog.shortest_path("m", "a", "c").expect("found");
        assert_eq!(route.cities, vec!["a", "b", "c"]);
        assert_eq!(route.cost, 8);

        assert!(catalog.shortest_path("m", "a", "d").is_none());
        assert!(catalog.shortest_path("nope", "a", "c").is_none());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = MapCatalog::empty();
        assert!(catalog.is_empty());
        assert!(catalog.first_id().is_none());
        assert!(catalog.list().is_empty());
    }
}
