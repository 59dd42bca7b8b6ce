//! Filesystem removal behind the `rm` and `rmexcept` builtins.
//!
//! Both share one traversal: a depth-first, post-order walk that never follows
//! symbolic links. Every entry below a directory is processed before removal
//! of the directory itself is attempted, since `rmdir(2)` refuses non-empty
//! directories. A failure on one entry is reported and the walk moves on.

use crate::error::{Result, ShellError};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Options accepted by `rm`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionFlags {
    /// Walk directories and remove everything below them.
    pub recursive: bool,
    /// Attempt removals silently: failures are not reported.
    pub force: bool,
    /// Print each path after it has been removed.
    pub verbose: bool,
}

/// One target to remove, already resolved to an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    /// Absolute path of the entry to remove.
    pub target: PathBuf,
    pub flags: DeletionFlags,
}

/// Counts of what a removal did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub removed: usize,
    pub failed: usize,
    pub kept: usize,
}

/// Where removal outcomes are written.
pub struct Reporter<'a> {
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
    report: DeletionReport,
}

impl<'a> Reporter<'a> {
    /// Verbose and `kept:` lines go to `out`, failures to `err`.
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self {
            out,
            err,
            report: DeletionReport::default(),
        }
    }

    /// Totals for everything reported so far.
    pub fn finish(self) -> DeletionReport {
        self.report
    }

    fn removed(&mut self, path: &Path, flags: DeletionFlags) -> io::Result<()> {
        trace!(path = %path.display(), "removed");
        self.report.removed += 1;
        if flags.verbose {
            writeln!(self.out, "{}", path.display())?;
        }
        Ok(())
    }

    fn failed(&mut self, path: &Path, error: io::Error, flags: DeletionFlags) -> io::Result<()> {
        debug!(path = %path.display(), %error, force = flags.force, "removal failed");
        self.report.failed += 1;
        if !flags.force {
            writeln!(self.err, "sh: {}: {}", path.display(), error)?;
        }
        Ok(())
    }

    fn kept(&mut self, name: &OsStr) -> io::Result<()> {
        self.report.kept += 1;
        writeln!(self.out, "kept: {}", name.to_string_lossy())
    }
}

impl DeletionRequest {
    /// Remove `target` according to `flags`.
    pub fn new(target: impl Into<PathBuf>, flags: DeletionFlags) -> Self {
        Self {
            target: target.into(),
            flags,
        }
    }

    /// Carry out the request, writing outcomes through `reporter`.
    ///
    /// Only failures to write the report are returned as errors; removal
    /// failures are counted and reported per entry.
    pub fn execute(&self, reporter: &mut Reporter<'_>) -> io::Result<()> {
        debug!(target = %self.target.display(), flags = ?self.flags, "deletion request");
        if self.flags.recursive {
            remove_tree(&self.target, self.flags, reporter)
        } else {
            // unlink(2) only; a directory target fails with EISDIR and is left alone.
            match fs::remove_file(&self.target) {
                Ok(()) => reporter.removed(&self.target, self.flags),
                Err(e) => reporter.failed(&self.target, e, self.flags),
            }
        }
    }
}

fn remove_tree(path: &Path, flags: DeletionFlags, reporter: &mut Reporter<'_>) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => return reporter.failed(path, e, flags),
    };

    // symlink_metadata never reports a link as a directory, so links are
    // removed as entries and never descended into.
    if !metadata.is_dir() {
        return match fs::remove_file(path) {
            Ok(()) => reporter.removed(path, flags),
            Err(e) => reporter.failed(path, e, flags),
        };
    }

    match fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(entry) => remove_tree(&entry.path(), flags, reporter)?,
                    Err(e) => reporter.failed(path, e, flags)?,
                }
            }
        }
        // Still try the directory itself; rmdir reports why it cannot go.
        Err(e) => reporter.failed(path, e, flags)?,
    }

    match fs::remove_dir(path) {
        Ok(()) => reporter.removed(path, flags),
        Err(e) => reporter.failed(path, e, flags),
    }
}

/// Remove every direct entry of `dir` whose name is not in `keep`.
///
/// Names are compared for exact equality with the entry's file name. Removed
/// entries go through the same post-order walk as `rm -r` and are printed;
/// preserved ones are reported as kept. Entries are handled in name order.
pub fn remove_except(
    dir: &Path,
    keep: &[OsString],
    reporter: &mut Reporter<'_>,
) -> Result<DeletionReport> {
    let path_error = |source| ShellError::Path {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = fs::read_dir(dir)
        .map_err(path_error)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(path_error)?;
    names.sort();

    let before = reporter.report;
    let flags = DeletionFlags {
        recursive: true,
        force: false,
        verbose: true,
    };
    for name in names {
        if keep.iter().any(|k| *k == name) {
            reporter.kept(&name)?;
            continue;
        }
        remove_tree(&dir.join(&name), flags, reporter)?;
    }

    let after = reporter.report;
    Ok(DeletionReport {
        removed: after.removed - before.removed,
        failed: after.failed - before.failed,
        kept: after.kept - before.kept,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn run(request: &DeletionRequest) -> (DeletionReport, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut reporter = Reporter::new(&mut out, &mut err);
        request.execute(&mut reporter).unwrap();
        let report = reporter.finish();
        (
            report,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn names_in(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn recursive(verbose: bool) -> DeletionFlags {
        DeletionFlags {
            recursive: true,
            verbose,
            ..Default::default()
        }
    }

    #[test]
    fn removes_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "x").unwrap();

        let (report, out, err) = run(&DeletionRequest::new(&file, DeletionFlags::default()));
        assert_eq!(report.removed, 1);
        assert!(out.is_empty() && err.is_empty());
        assert!(!file.exists());
    }

    #[test]
    fn non_recursive_refuses_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("inner"), "x").unwrap();

        let (report, _, err) = run(&DeletionRequest::new(&sub, DeletionFlags::default()));
        assert_eq!(report.failed, 1);
        assert!(err.starts_with("sh: "));
        assert!(sub.join("inner").exists());
    }

    #[test]
    fn force_silences_failures_but_still_counts_them() {
        let dir = tempfile::tempdir().unwrap();
        let flags = DeletionFlags {
            force: true,
            ..Default::default()
        };
        let (report, out, err) = run(&DeletionRequest::new(dir.path().join("ghost"), flags));
        assert_eq!(report.failed, 1);
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn recursive_removes_the_whole_tree_in_post_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("d")).unwrap();
        fs::write(root.join("a/b/c/leaf"), "x").unwrap();
        fs::write(root.join("a/file"), "x").unwrap();
        fs::write(root.join("top"), "x").unwrap();

        let (report, out, err) = run(&DeletionRequest::new(&root, recursive(true)));
        assert!(err.is_empty(), "{err}");
        assert_eq!(report.removed, 8);
        assert!(!root.exists());

        let order: Vec<&str> = out.lines().collect();
        let position = |p: &Path| order.iter().position(|l| Path::new(l) == p).unwrap();
        for line in &order {
            let removed = Path::new(line);
            for ancestor in removed.ancestors().skip(1) {
                if ancestor.starts_with(&root) {
                    assert!(position(removed) < position(ancestor), "{line} after parent");
                }
            }
        }
        assert_eq!(Path::new(order.last().unwrap()), root);
    }

    #[cfg(unix)]
    #[test]
    fn recursive_removes_links_without_following_them() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("precious"), "x").unwrap();
        let root = dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let (report, _, err) = run(&DeletionRequest::new(&root, recursive(false)));
        assert!(err.is_empty(), "{err}");
        assert_eq!(report.removed, 2);
        assert!(!root.exists());
        assert!(outside.join("precious").exists());
    }

    #[test]
    fn recursive_on_a_plain_file_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "x").unwrap();
        let (report, _, _) = run(&DeletionRequest::new(&file, recursive(false)));
        assert_eq!(report.removed, 1);
        assert!(!file.exists());
    }

    #[test]
    fn remove_except_keeps_only_named_entries() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        fs::create_dir_all(dir.path().join("d/nested")).unwrap();

        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut reporter = Reporter::new(&mut out, &mut err);
        let keep = vec![OsString::from("a"), OsString::from("b")];
        let report = remove_except(dir.path(), &keep, &mut reporter).unwrap();

        assert_eq!(report.kept, 2);
        assert_eq!(report.removed, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(names_in(dir.path()), BTreeSet::from([String::from("a"), String::from("b")]));
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("kept: a") && out.contains("kept: b"));
        assert!(out.contains(&dir.path().join("c").display().to_string()));
    }

    #[test]
    fn remove_except_matches_names_not_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x"), "x").unwrap();

        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut reporter = Reporter::new(&mut out, &mut err);
        let keep = vec![dir.path().join("x").into_os_string()];
        let report = remove_except(dir.path(), &keep, &mut reporter).unwrap();

        assert_eq!(report.removed, 1);
        assert!(names_in(dir.path()).is_empty());
    }

    /// A directory whose entries cannot be unlinked until it is dropped.
    #[cfg(unix)]
    struct ReadOnlyDir(PathBuf);

    #[cfg(unix)]
    impl ReadOnlyDir {
        /// `None` when permissions are not enforced for this user (root).
        fn lock(path: &Path) -> Option<Self> {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o555)).unwrap();
            let guard = Self(path.to_path_buf());
            let check = path.join(".write-check");
            if fs::write(&check, "").is_ok() {
                fs::remove_file(&check).unwrap();
                return None;
            }
            Some(guard)
        }
    }

    #[cfg(unix)]
    impl Drop for ReadOnlyDir {
        fn drop(&mut self) {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.0, fs::Permissions::from_mode(0o755));
        }
    }

    #[cfg(unix)]
    #[test]
    fn recursive_reports_a_failed_entry_and_removes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::write(root.join("locked/stuck"), "x").unwrap();
        fs::write(root.join("a"), "x").unwrap();
        fs::write(root.join("z"), "x").unwrap();
        let Some(_guard) = ReadOnlyDir::lock(&root.join("locked")) else {
            return;
        };

        let (report, out, err) = run(&DeletionRequest::new(&root, recursive(true)));
        assert!(!root.join("a").exists());
        assert!(!root.join("z").exists());
        assert!(root.join("locked/stuck").exists());
        assert!(out.contains(&root.join("a").display().to_string()), "{out}");
        assert!(out.contains(&root.join("z").display().to_string()), "{out}");
        assert!(
            err.contains(&format!("sh: {}: ", root.join("locked/stuck").display())),
            "{err}"
        );
        assert_eq!(report.removed, 2);
        // stuck, then locked and tree are not empty
        assert_eq!(report.failed, 3);
    }

    #[cfg(unix)]
    #[test]
    fn remove_except_reports_a_failed_entry_and_removes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("locked")).unwrap();
        fs::write(dir.path().join("locked/stuck"), "x").unwrap();
        for name in ["a", "keep", "z"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let Some(_guard) = ReadOnlyDir::lock(&dir.path().join("locked")) else {
            return;
        };

        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut reporter = Reporter::new(&mut out, &mut err);
        let report = remove_except(dir.path(), &[OsString::from("keep")], &mut reporter).unwrap();

        assert_eq!(
            names_in(dir.path()),
            BTreeSet::from([String::from("keep"), String::from("locked")])
        );
        assert_eq!(report.removed, 2);
        assert_eq!(report.kept, 1);
        assert_eq!(report.failed, 2);
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("stuck"), "{err}");
        assert!(String::from_utf8(out).unwrap().contains("kept: keep"));
    }

    #[test]
    fn remove_except_on_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut reporter = Reporter::new(&mut out, &mut err);
        let result = remove_except(&dir.path().join("nope"), &[OsString::from("a")], &mut reporter);
        assert!(matches!(result, Err(ShellError::Path { .. })));
    }
}
