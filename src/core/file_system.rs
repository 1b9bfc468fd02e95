use super::models::{FileRecord, PLACEHOLDER_FILE_NAME};
use super::path_utils::PATH_SEPARATOR;
use ignore::{
    DirEntry, WalkBuilder,
    overrides::{Override, OverrideBuilder},
};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/*
 * This module imports a stencil bundle from a directory on disk. The walk
 * respects ignore files (like .gitignore) and optional exclude patterns, and
 * turns every readable UTF-8 file into a `FileRecord` whose path is the file's
 * location relative to the directory, rooted at `/`.
 */

#[derive(Debug)]
pub enum ImportError {
    NotADirectory(PathBuf),
    Walk(ignore::Error),
    Read(io::Error),
}

impl From<io::Error> for ImportError {
    fn from(err: io::Error) -> Self {
        ImportError::Read(err)
    }
}

impl From<ignore::Error> for ImportError {
    fn from(err: ignore::Error) -> Self {
        ImportError::Walk(err)
    }
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::NotADirectory(p) => write!(f, "Not a bundle directory: {p:?}"),
            ImportError::Walk(e) => write!(f, "Could not walk the bundle directory: {e}"),
            ImportError::Read(e) => write!(f, "Could not read a bundle file: {e}"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Walk(e) => Some(e),
            ImportError::Read(e) => Some(e),
            ImportError::NotADirectory(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

/*
 * Defines the operations for reading a bundle from the file system, so the
 * binary and tests can swap in other sources.
 */
pub trait FileSystemScannerOperations: Send + Sync {
    /*
     * Reads every non-ignored file below `root_path` into a record list sorted
     * by path. `exclude_patterns` use gitignore syntax; a leading `!`
     * re-includes.
     */
    fn import_bundle(&self, root_path: &Path, exclude_patterns: &[String])
    -> Result<Vec<FileRecord>>;
}

pub struct CoreFileSystemScanner {}

impl CoreFileSystemScanner {
    pub fn new() -> Self {
        CoreFileSystemScanner {}
    }
}

impl Default for CoreFileSystemScanner {
    fn default() -> Self {
        Self::new()
    }
}

/*
 * Hidden entries are skipped, except placeholders, which are what keeps empty
 * folders in a bundle. The walk root is always kept even if its own name is
 * hidden (temporary directories often are).
 */
fn is_visible_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !name.starts_with('.') || name == PLACEHOLDER_FILE_NAME
}

/* `/`-rooted bundle path for a file below `root_path`. */
fn bundle_path(root_path: &Path, file_path: &Path) -> Option<String> {
    let relative = file_path.strip_prefix(root_path).ok()?;
    let mut bundle = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                bundle.push(PATH_SEPARATOR);
                bundle.push_str(segment.to_str()?);
            }
            _ => return None,
        }
    }
    if bundle.is_empty() { None } else { Some(bundle) }
}

/*
 * Turns gitignore-style exclude patterns into walker overrides. In override
 * syntax a plain glob whitelists, so every exclude is negated and a leading
 * `!` (re-include) is stripped. Blank lines and `#` comments are skipped.
 */
fn override_pattern(pattern: &str) -> Option<String> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    match trimmed.strip_prefix('!') {
        Some(included) => {
            let included = included.trim();
            (!included.is_empty()).then(|| included.to_string())
        }
        None => Some(format!("!{trimmed}")),
    }
}

fn exclude_overrides(root_path: &Path, exclude_patterns: &[String]) -> Option<Override> {
    let patterns: Vec<String> = exclude_patterns
        .iter()
        .filter_map(|p| override_pattern(p))
        .collect();
    if patterns.is_empty() {
        return None;
    }
    let mut builder = OverrideBuilder::new(root_path);
    for pattern in &patterns {
        if let Err(err) = builder.add(pattern) {
            log::warn!("FileSystemScanner: Skipping exclude pattern '{pattern}': {err}");
        }
    }
    builder
        .build()
        .inspect_err(|err| log::warn!("FileSystemScanner: Exclude patterns not applied: {err}"))
        .ok()
}

impl FileSystemScannerOperations for CoreFileSystemScanner {
    fn import_bundle(
        &self,
        root_path: &Path,
        exclude_patterns: &[String],
    ) -> Result<Vec<FileRecord>> {
        if !root_path.is_dir() {
            return Err(ImportError::NotADirectory(root_path.to_path_buf()));
        }
        log::debug!("FileSystemScanner: Importing bundle from {root_path:?}");

        let mut walker_builder = WalkBuilder::new(root_path);
        walker_builder
            .standard_filters(true)
            .parents(true)
            .git_global(false) // Hermetic: ignore the user's global gitignore.
            .git_ignore(true)
            .git_exclude(true)
            .ignore(true)
            .require_git(false)
            .hidden(false)
            .filter_entry(is_visible_entry)
            .sort_by_file_path(|a, b| a.cmp(b));

        if let Some(overrides) = exclude_overrides(root_path, exclude_patterns) {
            walker_builder.overrides(overrides);
        }

        let mut records = Vec::new();
        for entry_result in walker_builder.build() {
            let entry = entry_result?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(path) = bundle_path(root_path, entry.path()) else {
                log::warn!(
                    "FileSystemScanner: Skipping {:?}, not representable as a bundle path",
                    entry.path()
                );
                continue;
            };
            match fs::read_to_string(entry.path()) {
                Ok(content) => records.push(FileRecord::new(path, content)),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    log::warn!("FileSystemScanner: Skipping non UTF-8 file {path}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        log::debug!(
            "FileSystemScanner: Imported {} file(s) from {:?}",
            records.len(),
            root_path
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::FileKind;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(base: &Path, relative: &str, content: &[u8]) -> io::Result<()> {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(content)?;
        Ok(())
    }

    fn setup_bundle_dir(base: &Path) -> io::Result<()> {
        write_file(base, "stencil.yml", b"stencil:\n  id: demo\n  name: Demo\n")?;
        write_file(base, "templates/model.ftl", b"${name}")?;
        write_file(base, "templates/java_shared.yml", b"shared: true\n")?;
        write_file(base, "partials/.gitkeep", b"")?;
        write_file(base, ".hidden/secret.txt", b"nope")?;
        write_file(base, "build/out.txt", b"generated")?;
        write_file(base, "binary.bin", &[0xff, 0xfe, 0x00])?;
        write_file(base, ".gitignore", b"build/\n")?;
        Ok(())
    }

    #[test]
    fn test_import_bundle_reads_and_classifies_files() -> Result<()> {
        // Arrange
        let dir = tempdir()?;
        setup_bundle_dir(dir.path())?;
        let scanner = CoreFileSystemScanner::new();

        // Act
        let records = scanner.import_bundle(dir.path(), &[])?;

        // Assert
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/partials/.gitkeep",
                "/stencil.yml",
                "/templates/java_shared.yml",
                "/templates/model.ftl",
            ]
        );
        assert_eq!(records[0].kind, FileKind::Placeholder);
        assert_eq!(records[1].kind, FileKind::MainConfig);
        assert_eq!(records[2].kind, FileKind::SharedConfig);
        assert_eq!(records[3].kind, FileKind::Template);
        assert_eq!(records[3].content, "${name}");
        Ok(())
    }

    #[test]
    fn test_import_bundle_applies_exclude_patterns() -> Result<()> {
        let dir = tempdir()?;
        setup_bundle_dir(dir.path())?;
        let scanner = CoreFileSystemScanner::new();

        let records = scanner.import_bundle(dir.path(), &["*.yml".to_string()])?;

        assert!(records.iter().all(|r| !r.path.ends_with(".yml")));
        assert!(records.iter().any(|r| r.path == "/templates/model.ftl"));
        Ok(())
    }

    #[test]
    fn test_override_pattern_negates_excludes_and_keeps_reincludes() {
        assert_eq!(override_pattern("*.yml"), Some("!*.yml".to_string()));
        assert_eq!(override_pattern(" !keep.yml "), Some("keep.yml".to_string()));
        assert_eq!(override_pattern("!"), None);
        assert_eq!(override_pattern("# note"), None);
        assert_eq!(override_pattern("   "), None);
        assert!(exclude_overrides(Path::new("/base"), &["# only a comment".to_string()]).is_none());
    }

    #[test]
    fn test_import_bundle_rejects_non_directory() {
        let scanner = CoreFileSystemScanner::new();
        let result = scanner.import_bundle(Path::new("/definitely/not/a/dir"), &[]);
        assert!(matches!(result, Err(ImportError::NotADirectory(_))));
    }

    #[test]
    fn test_bundle_path_is_rooted_and_slash_separated() {
        let root = Path::new("/base");
        assert_eq!(
            bundle_path(root, &root.join("a").join("b.ftl")),
            Some("/a/b.ftl".to_string())
        );
        assert_eq!(bundle_path(root, root), None);
        assert_eq!(bundle_path(root, Path::new("/elsewhere/x")), None);
    }
}
