use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use sonuc_crawler::domain::Plate;
use sonuc_crawler::error::CrawlError;
use sonuc_crawler::registry::SeedRegistry;

#[test]
fn keyed_registry_lookup() {
    let registry = SeedRegistry::from_json(
        r#"{
            "1": {"id": 101, "name": "Adana"},
            "34": {"id": 1, "name": "Istanbul"},
            "6": {"id": 2, "name": "Ankara"}
        }"#,
    )
    .unwrap();

    assert_eq!(registry.len(), 3);
    let seed = registry.lookup(Plate::new(34)).unwrap();
    assert_eq!(seed.id, 1);
    assert_eq!(seed.name, "Istanbul");
    let names = registry
        .seeds()
        .iter()
        .map(|seed| seed.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Adana", "Ankara", "Istanbul"]);
}

#[test]
fn sequential_registry_keeps_file_order() {
    let registry = SeedRegistry::from_json(
        r#"[
            {"id": 1, "name": "Istanbul", "plate": 34},
            {"id": 9, "name": "Unplated"},
            {"id": 2, "name": "Ankara", "plate": 6}
        ]"#,
    )
    .unwrap();

    let ids = registry.seeds().iter().map(|seed| seed.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 9, 2]);
    assert_eq!(registry.lookup(Plate::new(6)).unwrap().name, "Ankara");
}

#[test]
fn unknown_plate_is_city_not_found() {
    let registry = SeedRegistry::from_json(r#"{"34": {"id": 1, "name": "Istanbul"}}"#).unwrap();
    let err = registry.lookup(Plate::new(35)).unwrap_err();
    assert_matches!(err, CrawlError::CityNotFound(ref plate) if plate == "35");
    assert!(err.is_lookup());
}

#[test]
fn load_registry_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let path = root.join("cities.json");
    fs::write(path.as_std_path(), r#"{"34": {"id": 1, "name": "Istanbul"}}"#).unwrap();

    let registry = SeedRegistry::load(&path).unwrap();
    assert!(!registry.is_empty());
}

#[test]
fn missing_registry_file_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let err = SeedRegistry::load(&root.join("cities.json")).unwrap_err();
    assert_matches!(err, CrawlError::RegistryRead(_));
}

#[test]
fn malformed_keyed_entry_names_the_missing_field() {
    let err = SeedRegistry::from_json(r#"{"34": {"name": "Istanbul"}}"#).unwrap_err();
    assert_matches!(err, CrawlError::RegistryParse(ref message) if message.contains("missing field `id`"));
}

#[test]
fn malformed_sequential_entry_names_the_bad_field() {
    let err = SeedRegistry::from_json(r#"[{"id": "one", "name": "Istanbul"}]"#).unwrap_err();
    assert_matches!(err, CrawlError::RegistryParse(ref message) if message.contains("invalid type"));
}

#[test]
fn scalar_registry_is_rejected() {
    assert_matches!(
        SeedRegistry::from_json("34"),
        Err(CrawlError::RegistryParse(_))
    );
}

#[test]
fn plates_compare_numerically() {
    let registry = SeedRegistry::from_json(
        r#"{"06": {"id": 2, "name": "Ankara"}, "34": {"id": 1, "name": "Istanbul"}}"#,
    )
    .unwrap();
    let ankara: Plate = "6".parse().unwrap();
    let istanbul: Plate = "034".parse().unwrap();
    assert_eq!(registry.lookup(ankara).unwrap().name, "Ankara");
    assert_eq!(registry.lookup(istanbul).unwrap().name, "Istanbul");
}
