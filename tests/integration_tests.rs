//! Integration tests for ff
//!
//! Builds a small fixture tree and drives the whole pipeline through
//! the library API: walking, exclusion, matching, sorting, slicing,
//! JSON records and the cross-run metadata cache.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use ff::cache::MetaCache;
use ff::config::{CliArgs, Config};
use ff::output;
use ff::registry::Registry;
use ff::search::Search;
use tempfile::TempDir;

/// foo (4 bytes), baz (10 bytes), BAR (symlink to foo), dir/,
/// dir/dir/, dir/dir/empty (0 bytes), dir/empty_dir/, .hidden
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut f = std::fs::File::create(dir.path().join("foo")).unwrap();
    f.write_all(b"1234").unwrap();
    drop(f);
    let mut f = std::fs::File::create(dir.path().join("baz")).unwrap();
    f.write_all(b"0123456789").unwrap();
    drop(f);
    std::os::unix::fs::symlink("foo", dir.path().join("BAR")).unwrap();
    std::fs::create_dir_all(dir.path().join("dir/dir")).unwrap();
    std::fs::File::create(dir.path().join("dir/dir/empty")).unwrap();
    std::fs::create_dir(dir.path().join("dir/empty_dir")).unwrap();
    std::fs::File::create(dir.path().join(".hidden")).unwrap();
    dir
}

fn config_for(dir: &TempDir, args: &[&str]) -> Config {
    let mut argv = vec!["ff".to_string(), "--no-cache".to_string()];
    argv.extend(args.iter().map(|s| s.to_string()));
    argv.push("-D".to_string());
    argv.push(dir.path().to_string_lossy().into_owned());
    Config::from_args(CliArgs::parse_from(argv)).unwrap()
}

fn search(dir: &TempDir, args: &[&str]) -> Search {
    let config = config_for(dir, args);
    let registry = Arc::new(Registry::with_builtins().unwrap());
    Search::start(config, registry).unwrap()
}

fn relpaths(search: Search) -> HashSet<String> {
    search.results().map(|ctx| ctx.entry.relpath.clone()).collect()
}

#[test]
fn test_sorted_listing_excludes_hidden() {
    let dir = fixture();
    let config = config_for(&dir, &["-H", "-S"]);
    let registry = Arc::new(Registry::with_builtins().unwrap());
    let search = Search::start(config.clone(), registry.clone()).unwrap();

    let contexts: Vec<_> = search.results().collect();
    let sorted = output::sort_contexts(
        &registry,
        contexts,
        config.sort.as_ref().unwrap(),
        config.reverse,
    )
    .unwrap();
    let paths: Vec<String> = sorted.into_iter().map(|ctx| ctx.entry.relpath.clone()).collect();

    assert_eq!(
        paths,
        vec!["BAR", "baz", "dir", "dir/dir", "dir/dir/empty", "dir/empty_dir", "foo"]
    );
}

#[test]
fn test_zero_size_set() {
    let dir = fixture();
    let found = relpaths(search(&dir, &["-H", "size=0"]));
    let expected: HashSet<String> = ["BAR", "dir", "dir/dir", "dir/dir/empty", "dir/empty_dir"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn test_json_records_for_files() {
    let dir = fixture();
    let config = config_for(&dir, &["-H", "--json", "-o", "name,size", "type=f", "-S", "name"]);
    let registry = Arc::new(Registry::with_builtins().unwrap());
    let search = Search::start(config.clone(), registry.clone()).unwrap();

    let contexts: Vec<_> = search.results().collect();
    let sorted = output::sort_contexts(
        &registry,
        contexts,
        config.sort.as_ref().unwrap(),
        false,
    )
    .unwrap();

    let fields = output::parse_fields(&registry, &config.output).unwrap();
    let records: Vec<serde_json::Value> = sorted
        .into_iter()
        .map(|mut ctx| output::json_record(&mut ctx, &fields))
        .collect();

    let expected = serde_json::json!([
        {"name": "baz", "size": 10},
        {"name": "empty", "size": 0},
        {"name": "foo", "size": 4},
    ]);
    assert_eq!(serde_json::Value::Array(records), expected);
}

#[test]
fn test_count_matches_result_set_size() {
    let dir = fixture();
    let found = relpaths(search(&dir, &["-H"]));
    assert_eq!(found.len(), 7);

    // Breakdown by type: 3 directories, 3 files, 1 symlink.
    let by_type = |t: &str| {
        relpaths(search(&dir, &["-H", &format!("type={t}")])).len()
    };
    assert_eq!(by_type("d"), 3);
    assert_eq!(by_type("f"), 3);
    assert_eq!(by_type("l"), 1);
}

#[test]
fn test_fail_flag_counts_zero_matches() {
    let dir = fixture();
    let search = search(&dir, &["name=quux", "--fail"]);
    let counters = search.counters.clone();
    let found = relpaths(search);
    assert!(found.is_empty());
    assert_eq!(counters.matched.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn test_reverse_page_slice() {
    let dir = fixture();
    let config = config_for(&dir, &["-H", "-S", "-R", "-l", "2,1"]);
    let registry = Arc::new(Registry::with_builtins().unwrap());
    let search = Search::start(config.clone(), registry.clone()).unwrap();

    let contexts: Vec<_> = search.results().collect();
    let sorted = output::sort_contexts(
        &registry,
        contexts,
        config.sort.as_ref().unwrap(),
        config.reverse,
    )
    .unwrap();
    let limited = output::apply_limit(&config, sorted);
    let paths: Vec<String> = limited.into_iter().map(|ctx| ctx.entry.relpath.clone()).collect();

    // Reverse alphabetical order, second page of two.
    assert_eq!(paths, vec!["dir/dir/empty", "dir/dir"]);
}

#[test]
fn test_empty_slice_yields_nothing() {
    let dir = fixture();
    for slice in [":0", "0:0"] {
        let config = config_for(&dir, &["-H", "-S", "-l", slice]);
        let registry = Arc::new(Registry::with_builtins().unwrap());
        let search = Search::start(config.clone(), registry).unwrap();
        let contexts: Vec<_> = search.results().collect();
        assert!(output::apply_limit(&config, contexts).is_empty());
    }
}

#[test]
fn test_negative_slice_clamps() {
    let dir = fixture();
    let config = config_for(&dir, &["-H", "-S", "-l", "-100:"]);
    let registry = Arc::new(Registry::with_builtins().unwrap());
    let search = Search::start(config.clone(), registry).unwrap();
    let contexts: Vec<_> = search.results().collect();
    // |start| > N clamps to the whole set.
    assert_eq!(output::apply_limit(&config, contexts).len(), 7);
}

#[test]
fn test_ignore_file_exclusion() {
    let dir = fixture();
    let mut f = std::fs::File::create(dir.path().join(".gitignore")).unwrap();
    writeln!(f, "baz").unwrap();
    writeln!(f, "dir/").unwrap();
    drop(f);

    let found = relpaths(search(&dir, &["-H", "-I"]));
    assert!(!found.contains("baz"));
    assert!(!found.contains("dir"));
    // Pruned: nothing below dir/ shows up either.
    assert!(!found.contains("dir/dir"));
    assert!(found.contains("foo"));
    // The ignore file itself is hidden and excluded by -H.
    assert!(!found.contains(".gitignore"));
}

#[test]
fn test_exclusion_equals_filtered_difference() {
    // For a non-directory exclusion X: results(-e X) == results() \ matches(X).
    let dir = fixture();
    let all = relpaths(search(&dir, &["-H", "type=f"]));
    let excluded = relpaths(search(&dir, &["-H", "type=f", "-e", "name=baz"]));
    let matching: HashSet<String> =
        ["baz"].iter().map(|s| s.to_string()).collect();
    let expected: HashSet<String> = all.difference(&matching).cloned().collect();
    assert_eq!(excluded, expected);
}

#[test]
fn test_cache_is_fully_honored_on_second_run() {
    let dir = fixture();
    let cache_file = tempfile::tempdir().unwrap();
    let cache_path = cache_file.path().join("ff.db");
    let cache_arg = format!("--cache={}", cache_path.display());

    let run = |first: bool| {
        let mut argv = vec!["ff".to_string(), cache_arg.clone(), "text=no".to_string()];
        argv.push("-D".to_string());
        argv.push(dir.path().to_string_lossy().into_owned());
        let config = Config::from_args(CliArgs::parse_from(argv)).unwrap();
        let registry = Arc::new(Registry::with_builtins().unwrap());
        let search = Search::start(config, registry).unwrap();
        let cache = search.cache.clone().unwrap();
        let found: Vec<_> = search.results().collect();
        let (hits, misses) = cache.stats();
        if first {
            assert_eq!(hits, 0);
            assert!(misses > 0);
        } else {
            // Unchanged tree: every lookup must be a hit.
            assert_eq!(misses, 0);
            assert!(hits > 0);
        }
        found.len()
    };

    let first = run(true);
    let second = run(false);
    assert_eq!(first, second);
}

#[test]
fn test_cache_invalidation_after_modification() {
    let dir = fixture();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache_path = cache_dir.path().join("ff.db");

    let cache = MetaCache::open(&cache_path).unwrap();
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(dir.path().join("foo")).unwrap();
    let mtime_ns = meta.mtime() * 1_000_000_000 + meta.mtime_nsec();
    let key = dir.path().join("foo").to_string_lossy().into_owned();
    cache.put(
        &key,
        "file.text",
        mtime_ns,
        meta.len(),
        &ff::cache::CachedResult::Value(ff::types::Value::Boolean(true)),
    );

    // Same stat: honored.
    assert!(cache.get(&key, "file.text", mtime_ns, meta.len()).is_some());
    // One nanosecond difference: evicted.
    assert!(cache.get(&key, "file.text", mtime_ns + 1, meta.len()).is_none());
    assert!(cache.get(&key, "file.text", mtime_ns, meta.len()).is_none());
}

#[test]
fn test_symlink_follow_changes_type() {
    let dir = fixture();
    let without = relpaths(search(&dir, &["type=l"]));
    assert_eq!(
        without,
        ["BAR"].iter().map(|s| s.to_string()).collect::<HashSet<_>>()
    );

    // With -L the symlink reports the target's type.
    let with = relpaths(search(&dir, &["-L", "type=l"]));
    assert!(with.is_empty());
    let files = relpaths(search(&dir, &["-L", "type=f", "name=BAR"]));
    assert_eq!(files.len(), 1);
}

#[test]
fn test_one_file_system_keeps_same_device() {
    // Everything in the fixture is on one device, so --mount changes
    // nothing.
    let dir = fixture();
    let plain = relpaths(search(&dir, &["-H"]));
    let mounted = relpaths(search(&dir, &["-H", "--one-file-system"]));
    assert_eq!(plain, mounted);
}
