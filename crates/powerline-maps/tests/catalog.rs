//! Loading the catalog from a directory of map files.

use std::fs;
use std::path::Path;

use powerline_maps::{MapCatalog, MapError};

fn map_json(id: &str) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "name": "Map {id}",
            "description": "test board",
            "player_count": {{ "min": 2, "max": 5, "recommended": [3, 4] }},
            "regions": [{{ "id": "west", "name": "West" }}],
            "cities": [
                {{ "id": "a", "name": "Alpha", "region": "west", "x": 0, "y": 0 }},
                {{ "id": "b", "name": "Bravo", "region": "west", "x": 1, "y": 0 }},
                {{ "id": "c", "name": "Charlie", "region": "west", "x": 2, "y": 0 }}
            ],
            "connections": [
                {{ "from": "a", "to": "b", "cost": 5 }},
                {{ "from": "b", "to": "c", "cost": 3 }}
            ],
            "rules": {{
                "starting_money": 50,
                "earnings": [10, 22, 33],
                "resources": {{
                    "coal": {{ "initial_supply": 24, "max_supply": 24, "prices": [1, 2, 3] }}
                }}
            }}
        }}"#
    )
}

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

// =========================================================================
// Happy path
// =========================================================================

#[test]
fn test_load_all_reads_every_json_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.json", &map_json("usa"));
    write(dir.path(), "a.json", &map_json("germany"));

    let catalog = MapCatalog::load_all(dir.path()).unwrap();

    assert_eq!(catalog.len(), 2);
    let germany = catalog.get("germany").unwrap();
    assert_eq!(germany.name, "Map germany");
    assert_eq!(germany.player_count.recommended, vec![3, 4]);
    assert_eq!(germany.rules.resources["coal"].prices, vec![1, 2, 3]);
    assert_eq!(catalog.first_id(), Some("germany"));
}

#[test]
fn test_load_all_ignores_non_json_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "usa.json", &map_json("usa"));
    write(dir.path(), "README.md", "# maps");
    write(dir.path(), "usa.json.bak", "not json at all");

    let catalog = MapCatalog::load_all(dir.path()).unwrap();
    assert_eq!(catalog.len(), 1);
}

#[test]
fn test_loaded_map_answers_shortest_path() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "usa.json", &map_json("usa"));

    let catalog = MapCatalog::load_all(dir.path()).unwrap();
    let route = catalog.shortest_path("usa", "a", "c").unwrap();
    assert_eq!(route.cities, vec!["a", "b", "c"]);
    assert_eq!(route.cost, 8);
    assert!(catalog.shortest_path("usa", "a", "d").is_none());
}

#[test]
fn test_empty_directory_gives_empty_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = MapCatalog::load_all(dir.path()).unwrap();
    assert!(catalog.is_empty());
}

// =========================================================================
// Fail-fast
// =========================================================================

#[test]
fn test_load_all_fails_on_unparsable_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.json", &map_json("good"));
    write(dir.path(), "broken.json", "{ \"id\": ");

    let err = MapCatalog::load_all(dir.path()).err().unwrap();
    assert!(matches!(err, MapError::Parse { ref path, .. } if path.ends_with("broken.json")));
}

#[test]
fn test_load_all_fails_on_invalid_map() {
    let dir = tempfile::tempdir().unwrap();
    let bad = map_json("bad").replace(r#""to": "c""#, r#""to": "z""#);
    write(dir.path(), "bad.json", &bad);

    let err = MapCatalog::load_all(dir.path()).err().unwrap();
    assert!(matches!(err, MapError::Invalid { ref map_id, .. } if map_id == "bad"));
}

#[test]
fn test_load_all_fails_on_duplicate_ids() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "one.json", &map_json("same"));
    write(dir.path(), "two.json", &map_json("same"));

    let err = MapCatalog::load_all(dir.path()).err().unwrap();
    assert!(matches!(err, MapError::Duplicate(ref id) if id == "same"));
}

#[test]
fn test_load_all_fails_on_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    let err = MapCatalog::load_all(&missing).err().unwrap();
    assert!(matches!(err, MapError::Io { .. }));
}

// =========================================================================
// Shipped boards
// =========================================================================

#[test]
fn test_shipped_maps_load_and_route() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../maps");
    let catalog = MapCatalog::load_all(&dir).unwrap();

    let usa = catalog.get("usa").expect("usa board ships with the server");
    assert_eq!(usa.cities.len(), 12);
    assert_eq!(usa.regions.len(), 3);

    let route = catalog.shortest_path("usa", "boston", "atlanta").unwrap();
    assert_eq!(route.cost, 25);
    assert_eq!(
        route.cities,
        vec!["boston", "new_york", "philadelphia", "norfolk", "raleigh", "atlanta"]
    );
}
