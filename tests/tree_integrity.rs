use std::sync::Arc;

use chrono::NaiveDateTime;
use condb::construct::{Directory, Variation};
use condb::error::CondbError;

fn directory(id: u64, parent_id: u64, name: &str) -> Arc<Directory> {
    Arc::new(Directory::new(
        id,
        parent_id,
        name.to_string(),
        NaiveDateTime::default(),
        NaiveDateTime::default(),
        String::new(),
    ))
}

#[test]
fn full_path_joins_ancestor_names() {
    let root = directory(0, 0, "");
    let a = directory(1, 0, "a");
    let b = directory(2, 1, "b");
    Directory::add_subdirectory(&root, Arc::clone(&a)).unwrap();
    Directory::add_subdirectory(&a, Arc::clone(&b)).unwrap();

    assert_eq!(root.full_path(), "");
    assert_eq!(a.full_path(), "/a");
    assert_eq!(b.full_path(), "/a/b");
    assert_eq!(b.parent().unwrap().name(), "a");
}

#[test]
fn second_attach_is_rejected() {
    let root = directory(0, 0, "");
    let other = directory(9, 0, "other");
    let a = directory(1, 0, "a");
    Directory::add_subdirectory(&root, Arc::clone(&a)).unwrap();

    let err = Directory::add_subdirectory(&other, Arc::clone(&a)).unwrap_err();
    assert!(matches!(err, CondbError::AlreadyParented(ref name) if name == "a"));
    let err = Directory::add_subdirectory(&root, Arc::clone(&a)).unwrap_err();
    assert!(matches!(err, CondbError::AlreadyParented(_)));
    // the rejected attach left the child lists alone
    assert_eq!(root.subdirectories().len(), 1);
    assert!(other.subdirectories().is_empty());
}

#[test]
fn attaching_a_node_to_itself_is_rejected() {
    let a = directory(1, 0, "a");
    assert!(matches!(
        Directory::add_subdirectory(&a, Arc::clone(&a)),
        Err(CondbError::AlreadyParented(_))
    ));
}

#[test]
fn cached_paths_refresh_on_attach() {
    let root = directory(0, 0, "");
    let a = directory(1, 0, "a");
    let c = directory(3, 1, "c");

    // read before any attach so the stale value is definitely cached
    assert_eq!(c.full_path(), "c");
    Directory::add_subdirectory(&root, Arc::clone(&a)).unwrap();
    Directory::add_subdirectory(&a, Arc::clone(&c)).unwrap();
    assert_eq!(c.full_path(), "/a/c");
}

#[test]
fn dispose_clears_the_whole_subtree() {
    let root = directory(0, 0, "");
    let a = directory(1, 0, "a");
    let b = directory(2, 1, "b");
    let c = directory(3, 1, "c");
    let d = directory(4, 2, "d");
    Directory::add_subdirectory(&root, Arc::clone(&a)).unwrap();
    Directory::add_subdirectory(&a, Arc::clone(&b)).unwrap();
    Directory::add_subdirectory(&a, Arc::clone(&c)).unwrap();
    Directory::add_subdirectory(&b, Arc::clone(&d)).unwrap();

    root.dispose_subdirectories();

    assert!(root.subdirectories().is_empty());
    assert!(a.subdirectories().is_empty());
    assert!(b.subdirectories().is_empty());
    assert!(a.parent().is_none());
    assert!(d.parent().is_none());
}

#[test]
fn variation_set_parent_links_both_ways() {
    let default = Arc::new(Variation::new(1, 0, "default".to_string()));
    let calib = Arc::new(Variation::new(2, 1, "calib".to_string()));
    let test = Arc::new(Variation::new(3, 1, "test".to_string()));

    Variation::set_parent(&calib, &default).unwrap();
    Variation::set_parent(&test, &default).unwrap();

    assert_eq!(calib.parent().unwrap().name(), "default");
    let children = default.children();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].name(), "calib");
    assert_eq!(children[1].name(), "test");
}

#[test]
fn variation_reparenting_is_rejected() {
    let default = Arc::new(Variation::new(1, 0, "default".to_string()));
    let other = Arc::new(Variation::new(2, 0, "other".to_string()));
    let calib = Arc::new(Variation::new(3, 1, "calib".to_string()));

    Variation::set_parent(&calib, &default).unwrap();
    let err = Variation::set_parent(&calib, &other).unwrap_err();
    assert!(matches!(err, CondbError::AlreadyParented(ref name) if name == "calib"));
    assert!(other.children().is_empty());

    assert!(matches!(
        Variation::set_parent(&other, &other),
        Err(CondbError::AlreadyParented(_))
    ));
}
