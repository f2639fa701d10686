//! Entity files on disk: round trips, unknown formats, malformed input.

use sprite_shared::{
    entity::{Entity, EntityList},
    error::StoreError,
    store::{EntityStore, Format, StoreOutcome},
};
use sprite_tests::temp_path;

fn scene(n: usize) -> EntityList {
    (0..n as i32)
        .map(|i| Entity::new(i * 10 - 50, -i, 8 + i, 16 * (i + 1)))
        .collect()
}

#[test]
fn json_and_xml_round_trip_any_length() -> anyhow::Result<()> {
    for ext in ["json", "xml"] {
        for n in [0, 1, 2, 7] {
            let store = EntityStore::new(temp_path(&format!("scene.{ext}")));
            let saved = scene(n);
            assert_eq!(store.save(&saved)?, StoreOutcome::Completed { entities: n });

            let mut loaded = EntityList::from(vec![Entity::default()]);
            assert_eq!(store.load(&mut loaded)?, StoreOutcome::Completed { entities: n });
            assert_eq!(loaded, saved, "{ext} with {n} entities");
        }
    }
    Ok(())
}

#[test]
fn extreme_values_round_trip() -> anyhow::Result<()> {
    let saved = EntityList::from(vec![
        Entity::new(i32::MIN, i32::MAX, 0, -1),
        Entity::new(-1, 0, i32::MAX, i32::MIN),
    ]);
    for ext in ["json", "xml"] {
        let store = EntityStore::new(temp_path(&format!("extreme.{ext}")));
        store.save(&saved)?;
        let mut loaded = EntityList::new();
        store.load(&mut loaded)?;
        assert_eq!(loaded, saved);
    }
    Ok(())
}

#[test]
fn save_replaces_longer_previous_content() -> anyhow::Result<()> {
    for ext in ["json", "xml"] {
        let store = EntityStore::new(temp_path(&format!("shrink.{ext}")));
        store.save(&scene(20))?;
        store.save(&scene(1))?;
        let mut loaded = EntityList::new();
        store.load(&mut loaded)?;
        assert_eq!(loaded, scene(1));
    }
    Ok(())
}

#[test]
fn save_leaves_no_temporary_file() -> anyhow::Result<()> {
    let path = temp_path("tidy.json");
    EntityStore::new(&path).save(&scene(3))?;
    let dir = path.parent().expect("temp path has a parent");
    let names: Vec<_> = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, vec![std::ffi::OsString::from("tidy.json")]);
    Ok(())
}

#[test]
fn read_returns_owned_list() -> anyhow::Result<()> {
    for ext in ["json", "xml"] {
        let store = EntityStore::new(temp_path(&format!("owned.{ext}")));
        store.save(&scene(3))?;
        assert_eq!(store.read()?, Some(scene(3)));
    }
    assert_eq!(EntityStore::new(temp_path("owned.txt")).read()?, None);
    assert!(matches!(
        EntityStore::new(temp_path("absent.xml")).read(),
        Err(StoreError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn unknown_format_save_writes_nothing() -> anyhow::Result<()> {
    let fresh = temp_path("x.txt");
    let store = EntityStore::new(&fresh);
    assert_eq!(store.format(), Format::Unknown);
    assert_eq!(store.save(&scene(2))?, StoreOutcome::Skipped);
    assert!(!fresh.exists());

    let existing = temp_path("notes.txt");
    std::fs::write(&existing, "keep me")?;
    assert_eq!(EntityStore::new(&existing).save(&scene(2))?, StoreOutcome::Skipped);
    assert_eq!(std::fs::read_to_string(&existing)?, "keep me");
    Ok(())
}

#[test]
fn unknown_format_load_leaves_list() -> anyhow::Result<()> {
    let path = temp_path("x.txt");
    std::fs::write(&path, r#"{"entities": []}"#)?;
    let mut list = scene(3);
    assert_eq!(EntityStore::new(&path).load(&mut list)?, StoreOutcome::Skipped);
    assert_eq!(list, scene(3));
    Ok(())
}

#[test]
fn uppercase_extension_is_unknown() -> anyhow::Result<()> {
    let path = temp_path("scene.JSON");
    assert_eq!(EntityStore::new(&path).save(&scene(1))?, StoreOutcome::Skipped);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn missing_file_is_not_found_and_list_untouched() {
    let mut list = scene(2);
    let err = EntityStore::new(temp_path("absent.json"))
        .load(&mut list)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(err.needs_bootstrap());
    assert_eq!(list, scene(2));
}

#[test]
fn schema_mismatch_is_parse_error_and_list_untouched() -> anyhow::Result<()> {
    let cases = [
        (
            "partial.json",
            r#"{"entities": [{"x": 1, "y": 2, "w": 3, "h": 4}, {"x": 5, "y": 6}]}"#,
        ),
        ("wrong_root.json", r#"[{"x": 1, "y": 2, "w": 3, "h": 4}]"#),
        (
            "wrong_root.xml",
            "<sprites><sprite><x>1</x><y>2</y><w>3</w><h>4</h></sprite></sprites>",
        ),
        (
            "wrong_child.xml",
            "<entities><sprite><x>1</x><y>2</y><w>3</w><h>4</h></sprite></entities>",
        ),
        ("foreign.xml", "<config><name>hello</name></config>"),
        (
            "partial.xml",
            "<entities><entity><x>1</x><y>2</y><w>3</w><h>4</h></entity><entity><x>5</x></entity></entities>",
        ),
    ];
    for (name, body) in cases {
        let path = temp_path(name);
        std::fs::write(&path, body)?;
        let mut list = scene(4);
        let err = EntityStore::new(&path).load(&mut list).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "{name}: {err}");
        assert!(err.needs_bootstrap());
        assert_eq!(list, scene(4), "{name} partially populated the list");
    }
    Ok(())
}

#[test]
fn syntax_errors_are_parse_errors() -> anyhow::Result<()> {
    for (name, body) in [
        ("truncated.json", r#"{"entities": [{"x": 1"#),
        ("truncated.xml", "<entities><entity><x>1</x>"),
    ] {
        let path = temp_path(name);
        std::fs::write(&path, body)?;
        let err = EntityStore::new(&path)
            .load(&mut EntityList::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "{name}: {err}");
    }
    Ok(())
}

#[test]
fn binary_garbage_is_parse_error() -> anyhow::Result<()> {
    let path = temp_path("garbage.json");
    std::fs::write(&path, [0xff, 0x00, 0xfe, 0x7b])?;
    let err = EntityStore::new(&path)
        .load(&mut EntityList::new())
        .unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }));
    Ok(())
}

#[test]
fn write_into_missing_directory_is_write_error() {
    let path = temp_path("gone").join("sub").join("scene.json");
    let err = EntityStore::new(&path).save(&scene(1)).unwrap_err();
    assert!(matches!(err, StoreError::Write { .. }));
    assert!(!err.needs_bootstrap());
}
