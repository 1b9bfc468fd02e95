/*
 * This module provides utility functions for path manipulation. It covers two
 * kinds of paths: the virtual, `/`-rooted paths that address files inside a
 * stencil bundle, and the real platform directories the application uses to
 * persist its own settings.
 *
 * Bundle paths are plain strings, never `PathBuf`s, because they describe
 * records in a bundle rather than files on disk. The rules enforced here are the
 * boundary rules every mutation and every store operation shares.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

pub const PATH_SEPARATOR: char = '/';
pub const ROOT_PATH: &str = "/";

/*
 * Violations of the bundle path rules. `Traversal` is kept separate from the
 * other malformed shapes so callers can surface it as a security-relevant
 * rejection.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRuleViolation {
    Traversal(String),
    Invalid(String),
}

impl std::fmt::Display for PathRuleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathRuleViolation::Traversal(p) => write!(f, "Path traversal is not allowed: {p}"),
            PathRuleViolation::Invalid(p) => write!(f, "Invalid stencil path: {p}"),
        }
    }
}

impl std::error::Error for PathRuleViolation {}

/*
 * Validates a path addressing a file (or the parent folder of a file) inside a
 * bundle. The path must be absolute, must not contain `..` or `.` segments, and
 * only the root itself may end with a separator.
 */
pub fn validate_stencil_path(path: &str) -> Result<(), PathRuleViolation> {
    if !path.starts_with(PATH_SEPARATOR) {
        return Err(PathRuleViolation::Invalid(path.to_string()));
    }
    if path == ROOT_PATH {
        return Ok(());
    }
    for segment in path.split(PATH_SEPARATOR).skip(1) {
        match segment {
            ".." => return Err(PathRuleViolation::Traversal(path.to_string())),
            "." | "" => return Err(PathRuleViolation::Invalid(path.to_string())),
            _ => {}
        }
    }
    Ok(())
}

/*
 * Validates a single path segment such as a file name typed by the operator.
 */
pub fn validate_segment_name(name: &str) -> Result<(), PathRuleViolation> {
    if name == ".." {
        return Err(PathRuleViolation::Traversal(name.to_string()));
    }
    if name.trim().is_empty() || name == "." || name.contains(PATH_SEPARATOR) {
        return Err(PathRuleViolation::Invalid(name.to_string()));
    }
    Ok(())
}

pub fn join_path(parent_path: &str, name: &str) -> String {
    if parent_path == ROOT_PATH {
        format!("{ROOT_PATH}{name}")
    } else {
        format!("{parent_path}{PATH_SEPARATOR}{name}")
    }
}

// Last segment of a bundle path; the whole input when it has no separator.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

pub fn parent_of(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(0) | None => ROOT_PATH,
        Some(idx) => &path[..idx],
    }
}

/*
 * Retrieves the application's primary local configuration directory.
 * This function determines the platform-specific path for local (non-roaming)
 * application configuration data and ensures the directory exists, creating it
 * if necessary.
 *
 * Returns `None` if the directory could not be determined or created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!(
                    "PathUtils: Failed to create base app config directory {config_path:?}: {e}"
                );
                return None;
            }
            log::debug!("PathUtils: Created base app config directory: {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}
