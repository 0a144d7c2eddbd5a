use super::*;
use crate::{
    binary::{FieldFormat, Value},
    index::header::TYPE_TAG_LEN,
};
use std::io::Write;

/// Minimal kind used to exercise the manager on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Note {
    text: String,
    seq: u64,
}

impl Record for Note {
    fn formats() -> &'static [FieldFormat] {
        &[FieldFormat::Str, FieldFormat::U64]
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Str(self.text.clone()), Value::U64(self.seq)]
    }

    fn from_values(values: Vec<Value>) -> Result<Self> {
        match values.as_slice() {
            [Value::Str(text), Value::U64(seq)] => Ok(Note {
                text: text.clone(),
                seq: *seq,
            }),
            other => Err(IndexError::Format(format!("bad note {other:?}"))),
        }
    }
}

#[derive(Default)]
struct Notes {
    upper: bool,
}

impl IndexKind for Notes {
    type Record = Note;
    const TYPE_TAG: [u8; TYPE_TAG_LEN] = *b"0000000a0b0c";
    const LISTS: &'static [u32] = &[10, 20];

    fn before_write(&self, record: &mut Note) {
        if self.upper {
            record.text = record.text.to_uppercase();
        }
    }
}

struct OtherKind;

impl IndexKind for OtherKind {
    type Record = Note;
    const TYPE_TAG: [u8; TYPE_TAG_LEN] = *b"ffffffffffff";
    const LISTS: &'static [u32] = &[10, 20];
}

fn note(text: &str, seq: u64) -> Note {
    Note {
        text: text.to_string(),
        seq,
    }
}

fn texts(mgr: &mut IndexManager<Notes>, list: u32, seek: u64) -> Vec<String> {
    mgr.iterate(list, seek)
        .expect("iterate")
        .map(|r| r.expect("record").text)
        .collect()
}

fn scratch() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let path = tmp.path().join("notes.idx");
    (tmp, path)
}

/// Temp segments left in the index directory.
fn segment_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .expect("read_dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".manidx-seg-"))
        .count()
}

#[test]
fn open_creates_header_only_file() {
    let (_tmp, path) = scratch();

    let mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
    assert!(!mgr.is_write_mode());
    assert_eq!(mgr.count(10).expect("count"), 0);
    assert_eq!(fs::metadata(&path).expect("stat").len(), HEADER_SIZE);
}

#[test]
fn open_initialises_zero_length_file() {
    let (_tmp, path) = scratch();
    File::create(&path).expect("touch");

    let mgr = IndexManager::open(&path, true, Notes::default()).expect("open empty file");
    assert_eq!(mgr.header().list_count, 2);
}

#[test]
fn open_missing_without_create_fails() {
    let (_tmp, path) = scratch();

    match IndexManager::open(&path, false, Notes::default()) {
        Err(IndexError::Io(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
        Err(other) => panic!("expected NotFound, got {other:?}"),
        Ok(_) => panic!("expected NotFound, got an index"),
    }
    assert!(!path.exists());
}

#[test]
fn open_with_wrong_kind_is_type_mismatch() {
    let (_tmp, path) = scratch();
    drop(IndexManager::open(&path, true, Notes::default()).expect("create"));

    assert!(matches!(
        IndexManager::open(&path, false, OtherKind),
        Err(IndexError::TypeMismatch { .. })
    ));
}

#[test]
fn open_garbage_file_is_corrupt() {
    let (_tmp, path) = scratch();
    let mut f = File::create(&path).expect("create");
    f.write_all(&[0xAB; HEADER_SIZE as usize]).expect("write");
    drop(f);

    assert!(matches!(
        IndexManager::open(&path, false, Notes::default()),
        Err(IndexError::Corrupt(_))
    ));
}

#[test]
fn add_enters_write_mode_and_counts_staged_records() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");

    mgr.add(10, note("a", 1)).expect("add");
    mgr.add(10, note("b", 2)).expect("add");
    mgr.add(20, note("z", 3)).expect("add");

    assert!(mgr.is_write_mode());
    assert_eq!(mgr.count(10).expect("count"), 2);
    assert_eq!(mgr.count(20).expect("count"), 1);
    assert_eq!(texts(&mut mgr, 10, 0), ["a", "b"]);

    mgr.save().expect("save");
    assert!(!mgr.is_write_mode());
    assert_eq!(mgr.count(10).expect("count"), 2);
    assert_eq!(mgr.count(20).expect("count"), 1);
    assert_eq!(texts(&mut mgr, 10, 0), ["a", "b"]);
    assert_eq!(texts(&mut mgr, 20, 0), ["z"]);
}

#[test]
fn save_lays_lists_out_contiguously() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");

    mgr.add(20, note("second-list", 1)).expect("add");
    mgr.add(10, note("first-list", 2)).expect("add");
    mgr.save().expect("save");

    let h = *mgr.header();
    let first = h.desc(10).expect("list 10");
    let second = h.desc(20).expect("list 20");
    assert_eq!(first.offset, HEADER_SIZE);
    assert_eq!(second.offset, first.offset + first.size);
    assert_eq!(
        fs::metadata(&path).expect("stat").len(),
        second.offset + second.size
    );
}

#[test]
fn records_survive_reopen_and_append_across_sessions() {
    let (_tmp, path) = scratch();
    {
        let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
        mgr.add(10, note("a", 1)).expect("add");
        mgr.add(20, note("x", 2)).expect("add");
        mgr.close().expect("close");
    }
    {
        let mut mgr = IndexManager::open(&path, false, Notes::default()).expect("reopen");
        assert_eq!(texts(&mut mgr, 10, 0), ["a"]);
        mgr.add(10, note("b", 3)).expect("append");
        // Staged view already includes the earlier session's records.
        assert_eq!(texts(&mut mgr, 10, 0), ["a", "b"]);
    }
    let mut mgr = IndexManager::open(&path, false, Notes::default()).expect("reopen");
    assert_eq!(texts(&mut mgr, 10, 0), ["a", "b"]);
    assert_eq!(texts(&mut mgr, 20, 0), ["x"]);
}

#[test]
fn drop_saves_pending_writes_and_removes_segments() {
    let (tmp, path) = scratch();
    {
        let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
        mgr.add(10, note("kept", 1)).expect("add");
        assert_eq!(segment_files(tmp.path()), 2, "one segment per list");
    }
    assert_eq!(segment_files(tmp.path()), 0);

    let mut mgr = IndexManager::open(&path, false, Notes::default()).expect("reopen");
    assert_eq!(texts(&mut mgr, 10, 0), ["kept"]);
}

#[test]
fn iterate_seek_skips_records_in_both_modes() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
    for (i, t) in ["a", "b", "c"].iter().enumerate() {
        mgr.add(10, note(t, i as u64)).expect("add");
    }

    assert_eq!(texts(&mut mgr, 10, 1), ["b", "c"]);
    mgr.save().expect("save");
    assert_eq!(texts(&mut mgr, 10, 1), ["b", "c"]);
    assert!(texts(&mut mgr, 10, 3).is_empty());
}

#[test]
fn before_write_hook_transforms_records() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes { upper: true }).expect("create");

    mgr.add(10, note("shout", 1)).expect("add");
    mgr.save().expect("save");
    assert_eq!(texts(&mut mgr, 10, 0), ["SHOUT"]);
}

#[test]
fn unknown_list_is_rejected_without_entering_write_mode() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");

    assert!(matches!(
        mgr.add(99, note("x", 0)),
        Err(IndexError::UnknownList(99))
    ));
    assert!(!mgr.is_write_mode());
    assert!(matches!(mgr.count(99), Err(IndexError::UnknownList(99))));
    assert!(mgr.iterate(99, 0).is_err());
}

#[test]
fn reset_empties_lists_and_truncates_to_header() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
    mgr.add(10, note("a", 1)).expect("add");
    mgr.add(20, note("b", 2)).expect("add");
    mgr.save().expect("save");
    assert!(fs::metadata(&path).expect("stat").len() > HEADER_SIZE);

    mgr.add(10, note("staged", 3)).expect("add");
    mgr.reset().expect("reset");

    assert!(!mgr.is_write_mode());
    for list in Notes::LISTS {
        assert_eq!(mgr.count(*list).expect("count"), 0);
    }
    assert_eq!(fs::metadata(&path).expect("stat").len(), HEADER_SIZE);

    drop(mgr);
    let mgr = IndexManager::open(&path, false, Notes::default()).expect("reopen");
    assert_eq!(mgr.count(10).expect("count"), 0);
}

#[test]
fn truncated_list_data_is_detected_on_open() {
    let (_tmp, path) = scratch();
    {
        let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
        mgr.add(10, note("abc", 1)).expect("add");
    }
    let len = fs::metadata(&path).expect("stat").len();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .expect("open")
        .set_len(len - 1)
        .expect("truncate");

    assert!(matches!(
        IndexManager::open(&path, false, Notes::default()),
        Err(IndexError::Corrupt(_))
    ));
}

#[test]
fn corrupt_terminator_surfaces_during_iteration() {
    let (_tmp, path) = scratch();
    {
        let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
        mgr.add(10, note("abc", 1)).expect("add");
    }
    // Overwrite the final byte (the record's newline).
    let len = fs::metadata(&path).expect("stat").len();
    let mut f = OpenOptions::new().write(true).open(&path).expect("open");
    f.seek(SeekFrom::Start(len - 1)).expect("seek");
    f.write_all(b"#").expect("write");
    drop(f);

    let mut mgr = IndexManager::open(&path, false, Notes::default()).expect("reopen");
    let results: Vec<_> = mgr.iterate(10, 0).expect("iterate").collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(IndexError::Corrupt(_))));
}

#[test]
fn concurrent_readers_share_the_index() {
    let (_tmp, path) = scratch();
    {
        let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
        mgr.add(10, note("a", 1)).expect("add");
    }

    let mut first = IndexManager::open(&path, false, Notes::default()).expect("reader 1");
    let mut second = IndexManager::open(&path, false, Notes::default()).expect("reader 2");
    assert_eq!(texts(&mut first, 10, 0), ["a"]);
    assert_eq!(texts(&mut second, 10, 0), ["a"]);
}

/// Whether a second, independent handle can take the lock right now.
fn lockable(path: &Path, exclusive: bool) -> bool {
    let other = File::open(path).expect("second handle");
    if exclusive {
        other.try_lock().is_ok()
    } else {
        other.try_lock_shared().is_ok()
    }
}

#[test]
fn write_mode_holds_the_exclusive_lock_until_save_or_reset() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");

    assert!(lockable(&path, false), "read mode shares");
    assert!(!lockable(&path, true), "read mode still blocks writers");

    mgr.add(10, note("a", 1)).expect("add");
    assert!(!lockable(&path, false), "write mode blocks readers");

    mgr.save().expect("save");
    assert!(lockable(&path, false), "save demotes to shared");
    assert!(!lockable(&path, true));

    mgr.add(10, note("b", 2)).expect("add");
    assert!(!lockable(&path, false));
    mgr.reset().expect("reset");
    assert!(lockable(&path, false), "reset demotes to shared");

    drop(mgr);
    assert!(lockable(&path, true), "drop releases the lock");
}

#[test]
fn failed_merge_leaves_an_empty_valid_index() {
    let (_tmp, path) = scratch();
    let mut mgr = IndexManager::open(&path, true, Notes::default()).expect("create");
    mgr.add(10, note("a", 1)).expect("add");
    mgr.save().expect("save");

    mgr.add(10, note("b", 2)).expect("add");
    // Flush the staged segment, then cut it short behind the manager's back.
    assert_eq!(texts(&mut mgr, 10, 0), ["a", "b"]);
    let segment = mgr
        .segments
        .as_ref()
        .and_then(|s| s.iter().find(|l| l.list_type() == 10))
        .expect("segment for list 10")
        .path()
        .to_path_buf();
    OpenOptions::new()
        .write(true)
        .open(&segment)
        .expect("open segment")
        .set_len(1)
        .expect("shrink segment");

    assert!(matches!(mgr.save(), Err(IndexError::SizeMismatch { .. })));
    assert!(mgr.is_write_mode(), "staged data is kept for a retry");

    let mut on_disk = File::open(&path).expect("open index");
    let header = IndexHeader::read_from(&mut on_disk).expect("header");
    let len = fs::metadata(&path).expect("stat").len();
    header
        .validate(&path, &Notes::TYPE_TAG, len)
        .expect("header still valid");
    assert_eq!(header.desc(10).map(|d| d.count), Some(0));
}
