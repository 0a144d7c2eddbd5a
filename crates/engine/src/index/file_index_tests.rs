use super::*;
use crate::{
    error::IndexError,
    index::{HEADER_SIZE, IndexManager},
    node::NodeType,
};
use std::path::PathBuf;

fn scratch() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let path = tmp.path().join("manifest.idx");
    (tmp, path)
}

fn file(path: &str, size: u64) -> FileNodeInfo {
    FileNodeInfo::new(path, NodeType::File, size, 1_700_000_000)
}

#[test]
fn three_files_round_trip_in_insertion_order() {
    let (_tmp, path) = scratch();
    {
        let mut mgr = FileIndexManager::open(&path, true, None).expect("create");
        mgr.add_node(ListType::Files, file("a.txt", 10)).expect("add");
        mgr.add_node(ListType::Files, file("b.txt", 20)).expect("add");
        mgr.add_node(ListType::Files, file("c.txt", 30)).expect("add");
        mgr.save().expect("save");
    }

    let mut mgr = FileIndexManager::open(&path, false, None).expect("reopen");
    assert!(!mgr.is_write_mode());
    let nodes = mgr.read_all(ListType::Files).expect("read files");

    let got: Vec<(&str, u64)> = nodes.iter().map(|n| (n.path(), n.size())).collect();
    assert_eq!(got, vec![("a.txt", 10), ("b.txt", 20), ("c.txt", 30)]);
    assert!(nodes.iter().all(|n| n.node_type() == NodeType::File));
}

#[test]
fn counts_match_adds_before_and_after_save() {
    let (_tmp, path) = scratch();
    let mut mgr = FileIndexManager::open(&path, true, None).expect("create");

    let dirs = ["wp-content", "wp-content/uploads"];
    for d in dirs {
        mgr.add_node(ListType::Dirs, FileNodeInfo::new(d, NodeType::Dir, 0, -1))
            .expect("add dir");
    }
    mgr.add_node(ListType::Files, file("wp-config.php", 3)).expect("add file");
    mgr.add_node(ListType::Delete, file("old.php", 0)).expect("add delete");

    let expected = vec![
        (ListType::Files, 1),
        (ListType::Dirs, 2),
        (ListType::Installer, 0),
        (ListType::Delete, 1),
    ];
    assert_eq!(mgr.counts().expect("counts"), expected);
    mgr.save().expect("save");
    assert_eq!(mgr.counts().expect("counts"), expected);
}

#[test]
fn reset_clears_every_list_and_shrinks_file() {
    let (_tmp, path) = scratch();
    let mut mgr = FileIndexManager::open(&path, true, None).expect("create");
    for t in ListType::ALL {
        mgr.add_node(t, file("x", 1)).expect("add");
    }
    mgr.save().expect("save");

    mgr.reset().expect("reset");
    for t in ListType::ALL {
        assert_eq!(mgr.count(t).expect("count"), 0, "{t} after reset");
    }
    assert_eq!(mgr.file_len().expect("len"), HEADER_SIZE);
}

#[test]
fn root_path_map_rewrites_written_paths() {
    let (_tmp, path) = scratch();
    let map = RootPathMap::new("/srv/www/site/", "site");
    let mut mgr = FileIndexManager::open(&path, true, Some(map)).expect("create");

    mgr.add_node(ListType::Dirs, FileNodeInfo::new("/srv/www/site", NodeType::Dir, 0, -1))
        .expect("add root");
    mgr.add_node(ListType::Files, file("/srv/www/site/index.php", 5))
        .expect("add nested");
    mgr.add_node(ListType::Files, file("/srv/www/sitemap.xml", 7))
        .expect("add sibling");
    mgr.save().expect("save");

    let dirs: Vec<String> = mgr
        .read_all(ListType::Dirs)
        .expect("dirs")
        .into_iter()
        .map(|n| n.path().to_string())
        .collect();
    let files: Vec<String> = mgr
        .read_all(ListType::Files)
        .expect("files")
        .into_iter()
        .map(|n| n.path().to_string())
        .collect();

    assert_eq!(dirs, ["site"]);
    assert_eq!(files, ["site/index.php", "/srv/www/sitemap.xml"]);
}

#[test]
fn root_path_map_cases() {
    let map = RootPathMap::new("/srv/www", "backup/root");
    let cases: &[(&str, Option<&str>)] = &[
        ("/srv/www", Some("backup/root")),
        ("/srv/www/a/b.php", Some("backup/root/a/b.php")),
        ("/srv/wwwroot/a.php", None),
        ("/srv", None),
    ];
    for (input, expected) in cases {
        assert_eq!(map.remap(input).as_deref(), *expected, "remap({input:?})");
    }

    let to_empty = RootPathMap::new("/srv/www", "");
    assert_eq!(to_empty.remap("/srv/www/a.php").as_deref(), Some("a.php"));
}

#[test]
fn root_path_map_parses_old_eq_new() {
    let map: RootPathMap = "/var/www/=site".parse().expect("parse");
    assert_eq!(map.root(), "/var/www");
    assert_eq!(map.new_root(), "site");

    assert!("no-separator".parse::<RootPathMap>().is_err());
    assert!("=site".parse::<RootPathMap>().is_err());
}

#[test]
fn list_type_parses_case_insensitively() {
    assert_eq!("FILES".parse::<ListType>(), Ok(ListType::Files));
    assert_eq!("delete".parse::<ListType>(), Ok(ListType::Delete));
    assert!("archives".parse::<ListType>().is_err());
}

#[test]
fn generic_manager_with_file_kind_reads_same_file() {
    let (_tmp, path) = scratch();
    {
        let mut mgr = FileIndexManager::open(&path, true, None).expect("create");
        mgr.add_node(ListType::Installer, file("installer.php", 9))
            .expect("add");
    }

    let mut raw = IndexManager::open(&path, false, FileIndex::default()).expect("open generic");
    let nodes: Vec<FileNodeInfo> = raw
        .iterate(ListType::Installer.as_u32(), 0)
        .expect("iterate")
        .collect::<crate::error::Result<_>>()
        .expect("decode");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].path(), "installer.php");
    assert!(matches!(raw.count(42), Err(IndexError::UnknownList(42))));
}
