//! Gitignore-style pattern engine
//!
//! Implements the core gitignore(5) semantics: negation with `!`,
//! directory-only patterns with a trailing `/`, and anchoring: a
//! pattern that contains a `/` before its last character matches
//! against the path relative to the directory of the ignore file,
//! a plain pattern matches against the basename only.
//!
//! The same [`Glob`] type backs the `%` operator of the expression
//! language, where a leading `/` anchors against the attribute value
//! from its start regardless of whether the value begins with `/`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// The default set of recognized ignore file names.
pub const IGNORE_NAMES: &[&str] = &[".gitignore", ".ignore", ".fdignore", ".ffignore"];

/// A single gitignore-style pattern compiled to a regular expression.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
    include: bool,
    anchored: bool,
    dir_only: bool,
}

impl Glob {
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Glob, String> {
        let original = pattern.to_string();
        let mut pattern = pattern;

        if let Some(rest) = pattern.strip_prefix("\\#") {
            pattern = rest;
        }

        let include = !pattern.starts_with('!');
        let mut pattern = pattern.strip_prefix('!').unwrap_or(pattern);
        if let Some(rest) = pattern.strip_prefix("\\!") {
            pattern = rest;
        }

        // A slash at the start or in the middle anchors the pattern
        // against the whole relative path.
        let anchored = match pattern.find('/') {
            Some(pos) => pos < pattern.len().saturating_sub(1),
            None => false,
        };
        if anchored {
            pattern = pattern.trim_start_matches('/');
        }

        let dir_only = pattern.ends_with('/');
        let pattern = pattern.trim_end_matches('/');

        let regex_pattern = translate(pattern);
        let regex = RegexBuilder::new(&regex_pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| format!("invalid glob pattern {original:?}: {e}"))?;

        Ok(Glob {
            pattern: original,
            regex,
            include,
            anchored,
            dir_only,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a match adds (`true`) or removes (`!`-pattern, `false`)
    /// the path from the matched set.
    pub fn include(&self) -> bool {
        self.include
    }

    pub fn anchored(&self) -> bool {
        self.anchored
    }

    pub fn dir_only(&self) -> bool {
        self.dir_only
    }

    /// Match a relative path against the pattern. Anchored patterns
    /// match the whole path, plain ones the basename.
    pub fn matches(&self, path: &str, basename: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        let path = path.trim_start_matches('/');
        let candidate = if self.anchored { path } else { basename };
        self.regex.is_match(candidate)
    }
}

/// Translate one glob pattern into an anchored regular expression.
fn translate(pattern: &str) -> String {
    // The alternation order matters, the `**` forms must win over `*`.
    static TOKEN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let token = TOKEN.get_or_init(|| {
        Regex::new(r"/\*\*/|\*\*/|/\*\*|\*|\?|\[![^\]]+\]|\[[^\]]+\]").unwrap()
    });

    let mut out = String::from("^");
    let mut last = 0;
    for m in token.find_iter(pattern) {
        out.push_str(&regex::escape(&pattern[last..m.start()]));
        match m.as_str() {
            "/**/" => out.push_str("(?:/|/.+/)"),
            "**/" => out.push_str("(?:.+/)?"),
            "/**" => out.push_str("(?:/.+)?"),
            "*" => out.push_str("[^/]*"),
            "?" => out.push_str("[^/]"),
            tok if tok.starts_with("[!") => {
                out.push_str("[^");
                out.push_str(&tok[2..tok.len() - 1]);
                out.push(']');
            }
            tok => {
                out.push('[');
                out.push_str(&tok[1..tok.len() - 1]);
                out.push(']');
            }
        }
        last = m.end();
    }
    out.push_str(&regex::escape(&pattern[last..]));
    out.push('$');
    out
}

/// One parsed ignore file with its patterns in file order.
#[derive(Debug)]
pub struct IgnoreFile {
    dirname: PathBuf,
    path: PathBuf,
    globs: Vec<Glob>,
}

impl IgnoreFile {
    /// Read and parse `name` inside `dirname`. Unparseable lines are
    /// skipped with a warning.
    pub fn load(dirname: &Path, name: &str) -> std::io::Result<IgnoreFile> {
        let path = dirname.join(name);
        let file = File::open(&path)?;

        let mut globs = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let pattern = line.trim();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }
            match Glob::new(pattern, false) {
                Ok(glob) => globs.push(glob),
                Err(err) => warn!("{}: {}", path.display(), err),
            }
        }

        Ok(IgnoreFile {
            dirname: dirname.to_path_buf(),
            path,
            globs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The stack of ignore rule sets that applies to one directory.
///
/// Pushing returns a new stack so that sibling subtrees share their
/// common prefix; the per-file rule sets are reference counted.
#[derive(Debug, Clone, Default)]
pub struct IgnoreStack {
    files: Vec<Arc<IgnoreFile>>,
}

impl IgnoreStack {
    pub fn new() -> IgnoreStack {
        IgnoreStack::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn push(&self, file: Arc<IgnoreFile>) -> IgnoreStack {
        let mut files = self.files.clone();
        files.push(file);
        IgnoreStack { files }
    }

    /// Match an absolute path against all rule sets bottom-up. Later
    /// rules override earlier ones. Returns whether the path is
    /// ignored and, if so, the ignore file holding the winning rule.
    pub fn matches(&self, abspath: &Path, name: &str, is_dir: bool) -> (bool, Option<PathBuf>) {
        let mut ignored = false;
        let mut winner = None;

        for file in &self.files {
            let relpath = match abspath.strip_prefix(&file.dirname) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => continue,
            };
            for glob in &file.globs {
                if glob.matches(&relpath, name, is_dir) {
                    ignored = glob.include();
                    winner = Some(file.path.clone());
                }
            }
        }

        (ignored, if ignored { winner } else { None })
    }
}

/// Find ignore files in the parent directories of `dir`, outermost
/// first, the way git looks for .gitignore files above the work tree.
pub fn parent_ignore_files(dir: &Path, names: &[String]) -> Vec<(PathBuf, String)> {
    let mut found = Vec::new();
    let mut ancestors: Vec<&Path> = dir.ancestors().collect();
    ancestors.reverse();
    for parent in ancestors {
        for name in names {
            if parent.join(name).is_file() {
                found.push((parent.to_path_buf(), name.clone()));
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str) -> Glob {
        Glob::new(pattern, false).unwrap()
    }

    #[test]
    fn test_basename_pattern() {
        let g = glob("*.txt");
        assert!(!g.anchored());
        assert!(g.matches("some/dir/note.txt", "note.txt", false));
        assert!(!g.matches("note.txt.bak", "note.txt.bak", false));
    }

    #[test]
    fn test_anchored_pattern() {
        let g = glob("/build");
        assert!(g.anchored());
        assert!(g.matches("build", "build", true));
        assert!(!g.matches("src/build", "build", true));
    }

    #[test]
    fn test_middle_slash_anchors() {
        let g = glob("src/*.rs");
        assert!(g.anchored());
        assert!(g.matches("src/main.rs", "main.rs", false));
        assert!(!g.matches("other/src/main.rs", "main.rs", false));
    }

    #[test]
    fn test_dir_only_pattern() {
        let g = glob("target/");
        assert!(g.dir_only());
        assert!(g.matches("target", "target", true));
        assert!(!g.matches("target", "target", false));
    }

    #[test]
    fn test_negation() {
        let g = glob("!important.log");
        assert!(!g.include());
        assert!(g.matches("important.log", "important.log", false));
    }

    #[test]
    fn test_double_star() {
        let g = glob("a/**/b");
        assert!(g.matches("a/b", "b", false));
        assert!(g.matches("a/x/b", "b", false));
        assert!(g.matches("a/x/y/b", "b", false));
        assert!(!g.matches("a/xb", "xb", false));
    }

    #[test]
    fn test_char_class() {
        let g = glob("file[0-9].txt");
        assert!(g.matches("file1.txt", "file1.txt", false));
        assert!(!g.matches("filex.txt", "filex.txt", false));
        let g = glob("file[!0-9].txt");
        assert!(g.matches("filex.txt", "filex.txt", false));
        assert!(!g.matches("file1.txt", "file1.txt", false));
    }

    #[test]
    fn test_question_mark() {
        let g = glob("?.rs");
        assert!(g.matches("a.rs", "a.rs", false));
        assert!(!g.matches("ab.rs", "ab.rs", false));
        assert!(!g.matches("a/b.rs", "b.rs", true));
    }

    #[test]
    fn test_case_insensitive() {
        let g = Glob::new("*.TXT", true).unwrap();
        assert!(g.matches("note.txt", "note.txt", false));
    }

    #[test]
    fn test_stack_negation_overrides() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join(".gitignore")).unwrap();
        writeln!(f, "*.log").unwrap();
        writeln!(f, "!keep.log").unwrap();
        drop(f);

        let file = Arc::new(IgnoreFile::load(dir.path(), ".gitignore").unwrap());
        let stack = IgnoreStack::new().push(file);

        let (ignored, winner) = stack.matches(&dir.path().join("debug.log"), "debug.log", false);
        assert!(ignored);
        assert_eq!(winner.unwrap(), dir.path().join(".gitignore"));

        let (ignored, winner) = stack.matches(&dir.path().join("keep.log"), "keep.log", false);
        assert!(!ignored);
        assert!(winner.is_none());
    }

    #[test]
    fn test_parent_ignore_files() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a/b");
        std::fs::create_dir_all(&sub).unwrap();
        let mut f = File::create(dir.path().join("a/.gitignore")).unwrap();
        writeln!(f, "*.tmp").unwrap();
        drop(f);

        let names = vec![".gitignore".to_string()];
        let found = parent_ignore_files(&sub, &names);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, dir.path().join("a"));
    }
}
