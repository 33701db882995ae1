//! Configuration types for ff
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - The result-slice grammar for `-l/--limit`
//!
//! Arguments from the `FF_OPTIONS` environment variable are prepended
//! to every invocation; positional tokens are auto-discriminated into
//! tests and directories.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use tracing::warn;

use crate::error::{Error, Result};
use crate::ignore::IGNORE_NAMES;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// How to treat the case of text comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CaseMode {
    /// Lowercase patterns compare case-insensitively, patterns with
    /// uppercase letters compare sensitively.
    Smart,
    Ignore,
    Sensitive,
}

/// When to colorize the `path` attribute in record output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Never,
    Auto,
    Always,
}

/// What to do when an `-x` subprocess fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HaltMode {
    /// Ignore the failure and continue (the default).
    Never,
    /// Stop dispatching new work but let in-flight jobs drain.
    Soon,
    /// Attempt prompt termination of in-flight subprocesses.
    Now,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMode {
    Off,
    /// One array of objects.
    Json,
    /// One object per line.
    Jsonl,
}

/// ff - a tool for finding files in the filesystem
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ff",
    version,
    about = "Find files in the filesystem with a typed query language",
    disable_help_flag = true,
    after_help = "EXAMPLES:\n    \
        ff type=f size+=100M\n    \
        ff -H 'ext=rs' src\n    \
        ff -S size -R -l :10 type=f\n    \
        ff --count type\n    \
        ff type=f -x grep -l TODO"
)]
pub struct CliArgs {
    /// Tests for matching, or directories to search
    #[arg(value_name = "TEST/DIRECTORY")]
    pub tests: Vec<String>,

    /// Show this help message or the help for a particular plugin
    #[arg(
        short = 'h',
        long = "help",
        value_name = "PLUGIN",
        num_args = 0..=1,
        default_missing_value = "all"
    )]
    pub help: Option<String>,

    /// Show a full help in man page format
    #[arg(long)]
    pub help_full: bool,

    /// Show all available attributes for searching, sorting and output
    #[arg(long)]
    pub help_attributes: bool,

    /// Show a list of available plugins
    #[arg(long)]
    pub help_plugins: bool,

    /// Show a list of available types
    #[arg(long)]
    pub help_types: bool,

    /// Location of the metadata cache (default ~/.cache/ff.db)
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Do not read or write the metadata cache
    #[arg(long)]
    pub no_cache: bool,

    /// Remove stale entries from the metadata cache and exit
    #[arg(long)]
    pub clean_cache: bool,

    /// Number of worker threads (default: one per CPU core)
    #[arg(short = 'j', long, value_name = "NUM")]
    pub jobs: Option<usize>,

    /// Search entries in this path (may be repeated)
    #[arg(short = 'D', long = "directory", value_name = "PATH", action = ArgAction::Append)]
    pub directories: Vec<String>,

    /// Exclude entries that match the given test (may be repeated)
    #[arg(short = 'e', long = "exclude", value_name = "TEST", action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Do not show hidden files and directories
    #[arg(short = 'H', long = "hide")]
    pub hide: bool,

    /// Do not show files matched by .(git|fd|ff)ignore files
    #[arg(short = 'I', long = "ignore")]
    pub ignore: bool,

    /// Do not read ignore files from parent directories
    #[arg(long)]
    pub no_parent_ignore: bool,

    /// Comma-separated list of recognized ignore file names
    #[arg(long = "ignore-files", value_name = "LIST")]
    pub ignore_files: Option<String>,

    /// Show only entries at a depth within RANGE (e.g. `1-3`, `-2`, `2-`)
    #[arg(short = 'd', long = "depth", value_name = "RANGE")]
    pub depth: Option<String>,

    /// How to treat the case of text attributes
    #[arg(short = 'c', long = "case", value_name = "MODE", value_enum, default_value = "smart")]
    pub case: CaseMode,

    /// Follow symbolic links
    #[arg(short = 'L', long = "follow")]
    pub follow_symlinks: bool,

    /// Do not descend into different file systems
    #[arg(long = "one-file-system", visible_aliases = ["mount", "xdev"])]
    pub one_file_system: bool,

    /// Execute a command for each search result
    #[arg(
        short = 'x',
        long = "exec",
        value_name = "CMD",
        num_args = 1..,
        allow_hyphen_values = true
    )]
    pub exec: Option<Vec<String>>,

    /// Execute a command once with all search results
    #[arg(
        short = 'X',
        long = "exec-batch",
        value_name = "CMD",
        num_args = 1..,
        allow_hyphen_values = true
    )]
    pub exec_batch: Option<Vec<String>>,

    /// When to stop after a subprocess failure
    #[arg(long, value_name = "WHEN", value_enum, default_value = "never")]
    pub halt: HaltMode,

    /// When to use colors: never, auto, always
    #[arg(short = 'C', long = "color", value_name = "WHEN", value_enum)]
    pub color: Option<ColorMode>,

    /// Show absolute instead of relative paths
    #[arg(short = 'a', long = "absolute-path")]
    pub absolute_path: bool,

    /// Separate results by the null character
    #[arg(short = '0', long = "print0")]
    pub print0: bool,

    /// Produce output similar to `ls -l`
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Sort entries by path or any other attribute list
    #[arg(
        short = 'S',
        long = "sort",
        value_name = "ATTRS",
        num_args = 0..=1,
        default_missing_value = "file.path"
    )]
    pub sort: Option<String>,

    /// Reverse the sort order
    #[arg(short = 'R', long = "reverse")]
    pub reverse: bool,

    /// Print statistics about the attribute list instead of results
    #[arg(
        long,
        value_name = "ATTRS",
        num_args = 0..=1,
        default_missing_value = "file.size,file.type"
    )]
    pub count: Option<String>,

    /// Limit output to a slice `[start]:[stop]` or a page `size,page`
    #[arg(short = 'l', long = "limit", value_name = "SLICE", allow_hyphen_values = true)]
    pub limit: Option<String>,

    /// Print only the first entry (same as `-l :1`)
    #[arg(short = '1')]
    pub first: bool,

    /// Print each entry using a comma-separated attribute template
    #[arg(short = 'o', long = "output", value_name = "ATTRS")]
    pub output: Option<String>,

    /// Separate attributes of --output with STRING (default one space)
    #[arg(long = "sep", value_name = "STRING", default_value = " ")]
    pub separator: String,

    /// Show entries even if attribute values are missing
    #[arg(long)]
    pub all: bool,

    /// Print results as one big JSON array
    #[arg(long, conflicts_with = "jsonl")]
    pub json: bool,

    /// Print results as one JSON object per line
    #[arg(long, visible_alias = "ndjson")]
    pub jsonl: bool,

    /// Exit with status 1 if there are no results
    #[arg(long)]
    pub fail: bool,

    /// Use 1K=1000 instead of 1K=1024 for sizes
    #[arg(long)]
    pub si: bool,
}

/// The `[start]:[stop]` / `size,page` forms of `-l/--limit`, with
/// python-style negative indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
}

impl Slice {
    pub fn parse(input: &str) -> std::result::Result<Slice, String> {
        let input = input.trim();

        if let Some((size, page)) = input.split_once(',') {
            let size: i64 = size
                .parse()
                .map_err(|_| format!("invalid page size in {input:?}"))?;
            let page: i64 = page
                .parse()
                .map_err(|_| format!("invalid page number in {input:?}"))?;
            if size <= 0 || page < 0 {
                return Err(format!("invalid page window {input:?}"));
            }
            return Ok(Slice {
                start: Some(size * page),
                stop: Some(size * (page + 1)),
            });
        }

        if let Some((start, stop)) = input.split_once(':') {
            let parse_index = |s: &str, what: &str| -> std::result::Result<Option<i64>, String> {
                if s.is_empty() {
                    Ok(None)
                } else {
                    s.parse()
                        .map(Some)
                        .map_err(|_| format!("invalid {what} index in {input:?}"))
                }
            };
            return Ok(Slice {
                start: parse_index(start, "start")?,
                stop: parse_index(stop, "stop")?,
            });
        }

        // A bare number keeps the original `-l N` meaning: at most N
        // entries from the front.
        let n: i64 = input
            .parse()
            .map_err(|_| format!("invalid slice {input:?}"))?;
        if n < 0 {
            Ok(Slice { start: Some(n), stop: None })
        } else {
            Ok(Slice { start: None, stop: Some(n) })
        }
    }

    /// Resolve against a result count, clamping like a python slice.
    pub fn resolve(&self, n: usize) -> (usize, usize) {
        let n = n as i64;
        let index = |i: i64| -> i64 {
            if i < 0 {
                (n + i).max(0)
            } else {
                i.min(n)
            }
        };
        let start = index(self.start.unwrap_or(0));
        let stop = index(self.stop.unwrap_or(n));
        if start >= stop {
            (start as usize, start as usize)
        } else {
            (start as usize, stop as usize)
        }
    }

    /// How many leading results satisfy this slice, if that is known
    /// without seeing the whole result set. Enables early exit when
    /// no sort is requested.
    pub fn upper_bound(&self) -> Option<usize> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) if start >= 0 && stop >= 0 => Some(stop.max(0) as usize),
            (None, Some(stop)) if stop >= 0 => Some(stop as usize),
            _ => None,
        }
    }
}

/// One `-d` depth range, inclusive on both ends.
pub type DepthRange = (u32, Option<u32>);

fn parse_depth_ranges(input: &str) -> std::result::Result<Vec<DepthRange>, String> {
    let mut ranges = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if let Some((start, stop)) = part.split_once('-') {
            let mut start: u32 = if start.is_empty() {
                0
            } else {
                start.parse().map_err(|_| format!("invalid range {part:?}"))?
            };
            let mut stop: Option<u32> = if stop.is_empty() {
                None
            } else {
                Some(stop.parse().map_err(|_| format!("invalid range {part:?}"))?)
            };
            if let Some(s) = stop {
                if s < start {
                    stop = Some(start);
                    start = s;
                }
            }
            ranges.push((start, stop));
        } else {
            let n: u32 = part.parse().map_err(|_| format!("invalid range {part:?}"))?;
            ranges.push((n, Some(n)));
        }
    }
    Ok(ranges)
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub directories: Vec<String>,
    /// Matcher tokens, already wrapped with the depth tests.
    pub tokens: Vec<String>,
    /// Exclusion tokens including the implicit hide/ignore/samedev ones.
    pub exclude_tokens: Vec<String>,
    pub jobs: usize,
    pub case: CaseMode,
    pub follow_symlinks: bool,
    pub ignore_file_names: Vec<String>,
    pub no_parent_ignore: bool,
    pub cache_path: Option<PathBuf>,
    pub clean_cache: bool,
    pub plugin_dirs: Vec<PathBuf>,
    pub color: ColorMode,
    pub absolute: bool,
    pub terminator: char,
    pub sort: Option<Vec<String>>,
    pub reverse: bool,
    pub count: Option<Vec<String>>,
    pub limit: Option<Slice>,
    pub output: Vec<String>,
    pub separator: String,
    pub all: bool,
    pub json: JsonMode,
    pub si: bool,
    pub fail: bool,
    pub exec: Option<Vec<String>>,
    pub exec_batch: Option<Vec<String>>,
    pub halt: HaltMode,
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn default_cache_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(Path::new(&home).join(".cache").join("ff.db"))
}

impl Config {
    /// Create and validate the configuration from CLI arguments.
    pub fn from_args(args: CliArgs) -> Result<Config> {
        if args.count.is_some() && (args.exec.is_some() || args.exec_batch.is_some()) {
            return Err(Error::Usage(
                "--exec and --exec-batch cannot be used together with --count".to_string(),
            ));
        }
        if args.count.is_some() && (args.limit.is_some() || args.first) {
            return Err(Error::Usage(
                "--limit cannot be used together with --count".to_string(),
            ));
        }
        if args.exec.is_some() && args.exec_batch.is_some() {
            return Err(Error::Usage(
                "use either --exec or --exec-batch, not both".to_string(),
            ));
        }

        let json = if args.json {
            JsonMode::Json
        } else if args.jsonl {
            JsonMode::Jsonl
        } else {
            JsonMode::Off
        };

        let mut tests = args.tests.clone();
        let mut directories = args.directories.clone();
        discriminate_directories(&mut tests, &mut directories)?;

        let mut exclude_tokens = args.exclude.clone();
        if args.ignore {
            exclude_tokens.push("ignored=yes".to_string());
        }
        if args.one_file_system {
            exclude_tokens.push("samedev=no".to_string());
        }
        if args.hide {
            exclude_tokens.push("hide=yes".to_string());
        }

        let mut tokens = tests;
        if let Some(depth) = &args.depth {
            let ranges = parse_depth_ranges(depth).map_err(Error::Usage)?;
            tokens = wrap_depth_tests(&ranges, tokens, &mut exclude_tokens);
        }

        let mut limit = match &args.limit {
            Some(spec) => Some(Slice::parse(spec).map_err(Error::Usage)?),
            None => None,
        };
        if limit.is_none() && args.first {
            limit = Some(Slice { start: None, stop: Some(1) });
        }
        if limit.is_some() && args.sort.is_none() {
            warn!("--limit without --sort selects from an unstable order");
        }

        let mut sort = args.sort.as_deref().map(split_list);
        let count = args.count.as_deref().map(split_list);
        if count.is_some() && sort.is_some() {
            warn!("--sort has no effect with --count");
            sort = None;
        }

        let mut output = match &args.output {
            Some(list) => split_list(list),
            None if args.verbose => {
                // An `ls -l`-like preset.
                vec![
                    "mode:h".to_string(),
                    "links".to_string(),
                    "size:h".to_string(),
                    "time:h".to_string(),
                    "path".to_string(),
                ]
            }
            None => vec!["path".to_string()],
        };
        if (args.exec.is_some() || args.exec_batch.is_some() || count.is_some())
            && args.output.is_some()
        {
            warn!("--output has no effect with --exec, --exec-batch and --count");
            output = vec!["path".to_string()];
        }

        let jobs = match args.jobs {
            Some(0) | None => num_cpus::get(),
            Some(n) => n,
        };
        if jobs > MAX_WORKERS {
            return Err(Error::Usage(format!(
                "invalid worker count {jobs}: must be between 1 and {MAX_WORKERS}"
            )));
        }

        let cache_path = if args.no_cache {
            None
        } else {
            args.cache.clone().or_else(default_cache_path)
        };

        let color = match args.color {
            Some(mode) => mode,
            None if std::env::var_os("NO_COLOR").is_some() => ColorMode::Never,
            None => ColorMode::Auto,
        };
        // JSON output is for machines: no color, stable absolute paths.
        let (color, absolute, all) = if json != JsonMode::Off {
            (ColorMode::Never, true, true)
        } else {
            (color, args.absolute_path, args.all)
        };

        let ignore_file_names = match &args.ignore_files {
            Some(list) => split_list(list),
            None => IGNORE_NAMES.iter().map(|s| s.to_string()).collect(),
        };

        let plugin_dirs = std::env::var("FF_PLUGIN_DIRS")
            .map(|dirs| dirs.split(':').filter(|d| !d.is_empty()).map(PathBuf::from).collect())
            .unwrap_or_default();

        Ok(Config {
            directories,
            tokens,
            exclude_tokens,
            jobs,
            case: args.case,
            follow_symlinks: args.follow_symlinks,
            ignore_file_names,
            no_parent_ignore: args.no_parent_ignore,
            cache_path,
            clean_cache: args.clean_cache,
            plugin_dirs,
            color,
            absolute,
            terminator: if args.print0 { '\0' } else { '\n' },
            sort,
            reverse: args.reverse,
            count,
            limit,
            output,
            separator: args.separator.replace("\\t", "\t").replace("\\n", "\n"),
            all,
            json,
            si: args.si,
            fail: args.fail,
            exec: args.exec,
            exec_batch: args.exec_batch,
            halt: args.halt,
        })
    }
}

/// Positional arguments are tests or directories: a token is a
/// directory iff it contains a `/` and names an existing directory.
/// Directory arguments are only picked up from the start and the end
/// of the token list.
fn discriminate_directories(tests: &mut Vec<String>, directories: &mut Vec<String>) -> Result<()> {
    if directories.is_empty() {
        let looks_like_dir = |token: &str| token.contains('/') && Path::new(token).is_dir();

        while let Some(first) = tests.first() {
            if looks_like_dir(first) {
                directories.push(tests.remove(0));
            } else {
                break;
            }
        }
        while let Some(last) = tests.last() {
            if looks_like_dir(last) {
                directories.push(tests.pop().unwrap());
            } else {
                break;
            }
        }
    }

    if directories.is_empty() {
        directories.push(".".to_string());
    }

    // Nested start directories would yield duplicates.
    for a in directories.iter() {
        for b in directories.iter() {
            if a == b {
                continue;
            }
            let abs_a = std::path::absolute(a)?;
            let abs_b = std::path::absolute(b)?;
            if abs_a.starts_with(&abs_b) {
                return Err(Error::Usage(format!("{a:?} is a sub-directory of {b:?}")));
            }
        }
    }

    Ok(())
}

/// Turn `-d` ranges into depth tests wrapped around the main
/// expression, and add an upper-bound exclusion so the walker does
/// not descend deeper than necessary.
fn wrap_depth_tests(
    ranges: &[DepthRange],
    tests: Vec<String>,
    exclude_tokens: &mut Vec<String>,
) -> Vec<String> {
    if ranges.iter().all(|(_, stop)| stop.is_some()) {
        let max = ranges.iter().filter_map(|(_, stop)| *stop).max().unwrap_or(0);
        exclude_tokens.push(format!("depth+{max}"));
    }

    let mut tokens = vec!["{{".to_string()];
    for (i, (start, stop)) in ranges.iter().enumerate() {
        match stop {
            Some(stop) if stop == start => tokens.push(format!("depth={start}")),
            _ => {
                tokens.push(format!("depth+={start}"));
                if let Some(stop) = stop {
                    tokens.push(format!("depth-={stop}"));
                }
            }
        }
        if i < ranges.len() - 1 {
            tokens.push("OR".to_string());
        }
    }
    tokens.push("}}".to_string());

    if !tests.is_empty() {
        tokens.push("{{".to_string());
        tokens.extend(tests);
        tokens.push("}}".to_string());
    }
    tokens
}

/// Join `FF_OPTIONS` with the command-line arguments.
pub fn collect_argv() -> Vec<String> {
    let mut argv: Vec<String> = vec![std::env::args().next().unwrap_or_else(|| "ff".to_string())];
    if let Ok(options) = std::env::var("FF_OPTIONS") {
        if let Some(extra) = shlex::split(&options) {
            argv.extend(extra);
        } else {
            warn!("unbalanced quotes in FF_OPTIONS, ignoring it");
        }
    }
    argv.extend(std::env::args().skip(1));
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["ff"];
        argv.extend(args);
        Config::from_args(CliArgs::parse_from(argv))
    }

    #[test]
    fn test_slice_parse_range() {
        assert_eq!(Slice::parse(":10").unwrap(), Slice { start: None, stop: Some(10) });
        assert_eq!(Slice::parse("5:").unwrap(), Slice { start: Some(5), stop: None });
        assert_eq!(Slice::parse("2:4").unwrap(), Slice { start: Some(2), stop: Some(4) });
        assert_eq!(Slice::parse("-3:").unwrap(), Slice { start: Some(-3), stop: None });
        assert_eq!(Slice::parse(":").unwrap(), Slice { start: None, stop: None });
    }

    #[test]
    fn test_slice_parse_page() {
        // Page windows are half-open: size 2, page 1 is entries 2..4.
        assert_eq!(Slice::parse("2,1").unwrap(), Slice { start: Some(2), stop: Some(4) });
        assert_eq!(Slice::parse("10,0").unwrap(), Slice { start: Some(0), stop: Some(10) });
        assert!(Slice::parse("0,1").is_err());
    }

    #[test]
    fn test_slice_resolve_clamps() {
        let slice = Slice::parse("-10:").unwrap();
        assert_eq!(slice.resolve(3), (0, 3));
        let slice = Slice::parse(":10").unwrap();
        assert_eq!(slice.resolve(3), (0, 3));
        let slice = Slice::parse(":0").unwrap();
        assert_eq!(slice.resolve(3), (0, 0));
        let slice = Slice::parse("0:0").unwrap();
        assert_eq!(slice.resolve(3), (0, 0));
        let slice = Slice::parse("-2:").unwrap();
        assert_eq!(slice.resolve(10), (8, 10));
        let slice = Slice::parse(":-2").unwrap();
        assert_eq!(slice.resolve(10), (0, 8));
    }

    #[test]
    fn test_depth_ranges() {
        assert_eq!(parse_depth_ranges("2").unwrap(), vec![(2, Some(2))]);
        assert_eq!(parse_depth_ranges("1-3").unwrap(), vec![(1, Some(3))]);
        assert_eq!(parse_depth_ranges("-3").unwrap(), vec![(0, Some(3))]);
        assert_eq!(parse_depth_ranges("2-").unwrap(), vec![(2, None)]);
        assert_eq!(parse_depth_ranges("3-1").unwrap(), vec![(1, Some(3))]);
        assert_eq!(
            parse_depth_ranges("1,3-4").unwrap(),
            vec![(1, Some(1)), (3, Some(4))]
        );
        assert!(parse_depth_ranges("x").is_err());
    }

    #[test]
    fn test_depth_wrapping() {
        let mut exclude = Vec::new();
        let tokens = wrap_depth_tests(
            &[(1, Some(2))],
            vec!["type=f".to_string()],
            &mut exclude,
        );
        assert_eq!(
            tokens,
            vec!["{{", "depth+=1", "depth-=2", "}}", "{{", "type=f", "}}"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
        assert_eq!(exclude, vec!["depth+2".to_string()]);

        // No exclusion when a range is open-ended.
        let mut exclude = Vec::new();
        wrap_depth_tests(&[(1, None)], vec![], &mut exclude);
        assert!(exclude.is_empty());
    }

    #[test]
    fn test_implicit_exclusions() {
        let config = config_from(&["-H", "-I", "--mount"]).unwrap();
        assert!(config.exclude_tokens.contains(&"hide=yes".to_string()));
        assert!(config.exclude_tokens.contains(&"ignored=yes".to_string()));
        assert!(config.exclude_tokens.contains(&"samedev=no".to_string()));
    }

    #[test]
    fn test_conflicts() {
        assert!(config_from(&["--count", "type", "-x", "echo"]).is_err());
        assert!(config_from(&["--count", "type", "-X", "echo"]).is_err());
        assert!(config_from(&["--count", "type", "-l", ":5"]).is_err());
    }

    #[test]
    fn test_first_is_limit_one() {
        let config = config_from(&["-1"]).unwrap();
        assert_eq!(config.limit, Some(Slice { start: None, stop: Some(1) }));
    }

    #[test]
    fn test_json_implies_all_and_absolute() {
        let config = config_from(&["--json"]).unwrap();
        assert_eq!(config.json, JsonMode::Json);
        assert!(config.all);
        assert!(config.absolute);
        assert_eq!(config.color, ColorMode::Never);
    }

    #[test]
    fn test_verbose_preset() {
        let config = config_from(&["-v"]).unwrap();
        assert_eq!(config.output.len(), 5);
        assert_eq!(config.output[0], "mode:h");
    }

    #[test]
    fn test_directory_discrimination() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let sub = sub.to_string_lossy().into_owned();

        let config = config_from(&["type=f", &sub]).unwrap();
        assert_eq!(config.directories, vec![sub]);
        assert_eq!(config.tokens, vec!["type=f".to_string()]);

        // Without a slash a token is never a directory.
        let config = config_from(&["type=f"]).unwrap();
        assert_eq!(config.directories, vec![".".to_string()]);
    }

    #[test]
    fn test_nested_directories_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        let outer = dir.path().join("a").to_string_lossy().into_owned();
        let inner = dir.path().join("a/b").to_string_lossy().into_owned();
        let err = config_from(&["-D", &outer, "-D", &inner]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EX_USAGE);
    }

    #[test]
    fn test_separator_unescaping() {
        let config = config_from(&["--sep", "\\t"]).unwrap();
        assert_eq!(config.separator, "\t");
    }
}
