use manidx_runtime::DEFAULT_SYSTEM_SKIP_PREFIXES;

use super::*;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn ignore_options_default_values() {
    let opts = IgnoreOptions::default();
    assert!(opts.use_default_patterns);
    assert!(opts.extra_patterns.is_empty());
    assert!(opts.extra_ignore_files.is_empty());
}

#[test]
fn default_engine_ignores_nothing() {
    let engine = IgnoreEngine::default();
    assert!(!engine.is_ignored(Path::new("wp-content/uploads/x.php"), false));
}

#[test]
fn ignore_engine_without_defaults_does_not_ignore_arbitrary_path() {
    let tmp = tempdir().expect("create temp dir");
    let root = tmp.path();

    let opts = IgnoreOptions {
        use_default_patterns: false,
        ..IgnoreOptions::default()
    };

    let engine = IgnoreEngine::new(root, Some(opts)).expect("build ignore engine");

    assert!(!engine.is_ignored(&root.join(".git"), true));
    assert!(!engine.is_ignored(&root.join("some_file.txt"), false));
}

#[test]
fn ignore_engine_defaults_skip_vcs_and_os_junk() {
    let tmp = tempdir().expect("create temp dir");
    let root = tmp.path();

    let engine = IgnoreEngine::with_defaults(root).expect("build ignore engine with defaults");

    let cases: &[(&str, bool, bool)] = &[
        (".git", true, true),
        (".git/objects/ab", false, true),
        ("node_modules", true, true),
        (".DS_Store", false, true),
        ("wp-content", true, false),
        ("wp-content/index.php", false, false),
    ];

    for (rel, is_dir, expected) in cases {
        assert_eq!(
            engine.is_ignored(&root.join(rel), *is_dir),
            *expected,
            "is_ignored({rel:?}, dir={is_dir})"
        );
    }
}

#[test]
fn ignore_engine_applies_extra_patterns_and_files() {
    use std::io::Write;

    let tmp = tempdir().expect("create temp dir");
    let root = tmp.path();

    let ignore_path = root.join(".backupignore");
    {
        let mut f = std::fs::File::create(&ignore_path).expect("create ignore file");
        writeln!(f, "cache/").unwrap();
    }

    let opts = IgnoreOptions {
        use_default_patterns: false,
        extra_patterns: vec!["*.log".to_string()],
        extra_ignore_files: vec![ignore_path].into_boxed_slice(),
    };

    let engine = IgnoreEngine::new(root, Some(opts)).expect("build ignore engine");

    assert!(engine.is_ignored(&root.join("debug.log"), false));
    assert!(engine.is_ignored(&root.join("cache"), true));
    assert!(!engine.is_ignored(&root.join("wp-config.php"), false));
}

#[test]
fn user_excludes_basic_inclusion() {
    let ux = UserExcludes::new(vec![PathBuf::from("root")]);

    assert!(ux.is_excluded(Path::new("root/file.txt")));
    assert!(!ux.is_excluded(Path::new("other/file.txt")));
    assert!(
        !ux.is_excluded(Path::new("rootless/file.txt")),
        "prefix match must be component-wise"
    );
}

#[test]
fn user_excludes_add_root_collapses_children_when_parent_added() {
    let mut ux = UserExcludes::new(Vec::new());

    ux.add_root(PathBuf::from("root/sub"));
    ux.add_root(PathBuf::from("root"));

    assert_eq!(ux.roots(), &[PathBuf::from("root")]);
    assert!(ux.is_excluded(Path::new("root/sub/file.txt")));
    assert!(ux.is_excluded(Path::new("root/other/file.txt")));
}

#[test]
fn user_excludes_add_root_ignores_child_when_parent_already_present() {
    let mut ux = UserExcludes::new(vec![PathBuf::from("root")]);
    ux.add_root(PathBuf::from("root/sub"));

    assert_eq!(ux.roots().len(), 1);
}

#[test]
fn user_excludes_with_system_defaults_covers_configured_prefixes() {
    let ux = UserExcludes::with_system_defaults();

    for prefix in DEFAULT_SYSTEM_SKIP_PREFIXES {
        let base = PathBuf::from(prefix);
        let base = base.canonicalize().unwrap_or(base);

        assert!(
            ux.is_excluded(&base.join("some_child")),
            "system default prefix {prefix:?} should exclude its subtree",
        );
    }
}
