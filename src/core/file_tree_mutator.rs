/*
 * Create, rename and delete operations over the flat record list. Every
 * operation takes the current list by reference and returns a new list; on
 * failure the caller's list is untouched, so there is never a partial
 * mutation to roll back.
 *
 * Folders are virtual. Renaming or deleting a folder is not supported;
 * "creating a folder" creates a placeholder record inside it so the folder
 * appears in the tree.
 */
use crate::core::models::{FileRecord, PLACEHOLDER_FILE_NAME};
use crate::core::path_utils::{
    self, PATH_SEPARATOR, PathRuleViolation, join_path, validate_segment_name,
    validate_stencil_path,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTreeError {
    DuplicatePath(String),
    NotFound(String),
    PathTraversal(String),
    InvalidPath(String),
}

impl From<PathRuleViolation> for FileTreeError {
    fn from(violation: PathRuleViolation) -> Self {
        match violation {
            PathRuleViolation::Traversal(p) => FileTreeError::PathTraversal(p),
            PathRuleViolation::Invalid(p) => FileTreeError::InvalidPath(p),
        }
    }
}

impl std::fmt::Display for FileTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileTreeError::DuplicatePath(p) => write!(f, "A file already exists at {p}"),
            FileTreeError::NotFound(p) => write!(f, "No file at {p}"),
            FileTreeError::PathTraversal(p) => write!(f, "Path traversal is not allowed: {p}"),
            FileTreeError::InvalidPath(p) => write!(f, "Invalid path: {p}"),
        }
    }
}

impl std::error::Error for FileTreeError {}

pub type Result<T> = std::result::Result<T, FileTreeError>;

/*
 * A path is taken when a record has exactly that path, or when records live
 * below it (it is a virtual folder).
 */
fn path_is_taken(records: &[FileRecord], path: &str) -> bool {
    let folder_prefix = format!("{path}{PATH_SEPARATOR}");
    records
        .iter()
        .any(|r| r.path == path || r.path.starts_with(&folder_prefix))
}

/*
 * Returns the nearest ancestor of `path` that is a file record. A file cannot
 * also be a folder, so nothing may be placed below it.
 */
pub fn file_ancestor_of<'a>(records: &[FileRecord], path: &'a str) -> Option<&'a str> {
    let mut current = path_utils::parent_of(path);
    while current != path_utils::ROOT_PATH {
        if records.iter().any(|r| r.path == current) {
            return Some(current);
        }
        current = path_utils::parent_of(current);
    }
    None
}

/*
 * Appends a new empty record `<parent_path>/<file_name>`, with its kind
 * inferred from the file name.
 */
pub fn create_file(
    records: &[FileRecord],
    parent_path: &str,
    file_name: &str,
) -> Result<Vec<FileRecord>> {
    validate_stencil_path(parent_path)?;
    validate_segment_name(file_name)?;
    let new_path = join_path(parent_path, file_name);
    if let Some(file_path) = file_ancestor_of(records, &new_path) {
        return Err(FileTreeError::DuplicatePath(file_path.to_string()));
    }
    if path_is_taken(records, &new_path) {
        return Err(FileTreeError::DuplicatePath(new_path));
    }
    log::debug!("FileTreeMutator: Creating {new_path}");
    let mut updated = records.to_vec();
    updated.push(FileRecord::new(new_path, String::new()));
    Ok(updated)
}

/*
 * Makes `<parent_path>/<folder_name>` visible by creating a placeholder record
 * inside it.
 */
pub fn create_folder(
    records: &[FileRecord],
    parent_path: &str,
    folder_name: &str,
) -> Result<Vec<FileRecord>> {
    validate_stencil_path(parent_path)?;
    validate_segment_name(folder_name)?;
    let folder_path = join_path(parent_path, folder_name);
    if records.iter().any(|r| r.path == folder_path) {
        return Err(FileTreeError::DuplicatePath(folder_path));
    }
    if let Some(file_path) = file_ancestor_of(records, &folder_path) {
        return Err(FileTreeError::DuplicatePath(file_path.to_string()));
    }
    create_file(records, &folder_path, PLACEHOLDER_FILE_NAME)
}

/*
 * Moves a single file record. Name and kind are re-derived from the new path;
 * no other record is touched. Renaming a file onto its own path is a no-op.
 */
pub fn rename_file(records: &[FileRecord], old_path: &str, new_path: &str) -> Result<Vec<FileRecord>> {
    validate_stencil_path(new_path)?;
    if new_path == path_utils::ROOT_PATH {
        return Err(FileTreeError::InvalidPath(new_path.to_string()));
    }
    let Some(idx) = records.iter().position(|r| r.path == old_path) else {
        return Err(FileTreeError::NotFound(old_path.to_string()));
    };
    if old_path == new_path {
        return Ok(records.to_vec());
    }
    if let Some(file_path) = file_ancestor_of(records, new_path) {
        return Err(FileTreeError::DuplicatePath(file_path.to_string()));
    }
    if path_is_taken(records, new_path) {
        return Err(FileTreeError::DuplicatePath(new_path.to_string()));
    }
    log::debug!("FileTreeMutator: Renaming {old_path} -> {new_path}");
    let mut updated = records.to_vec();
    updated[idx] = records[idx].with_path(new_path);
    Ok(updated)
}

/*
 * Removes the record with exactly `path`. Returns `NotFound` when absent;
 * callers treat that as a no-op.
 */
pub fn delete_file(records: &[FileRecord], path: &str) -> Result<Vec<FileRecord>> {
    if !records.iter().any(|r| r.path == path) {
        return Err(FileTreeError::NotFound(path.to_string()));
    }
    log::debug!("FileTreeMutator: Deleting {path}");
    Ok(records.iter().filter(|r| r.path != path).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::FileKind;

    fn bundle() -> Vec<FileRecord> {
        vec![
            FileRecord::new("/stencil.yml", "stencil:\n  id: demo\n"),
            FileRecord::new("/src/model.ftl", "${name}"),
            FileRecord::new("/src/view.ftl", "<#if x></#if>"),
        ]
    }

    #[test]
    fn test_create_file_appends_empty_editable_record() {
        let records = bundle();
        let updated = create_file(&records, "/src", "service.ftl").unwrap();
        assert_eq!(updated.len(), 4);
        let created = updated.last().unwrap();
        assert_eq!(created.path, "/src/service.ftl");
        assert_eq!(created.name, "service.ftl");
        assert_eq!(created.kind, FileKind::Template);
        assert!(created.content.is_empty());
        assert!(created.editable);
        assert_eq!(records.len(), 3, "input must not be mutated");
    }

    #[test]
    fn test_create_file_at_root() {
        let updated = create_file(&bundle(), "/", "notes.md").unwrap();
        assert!(updated.iter().any(|r| r.path == "/notes.md"));
    }

    #[test]
    fn test_create_file_rejects_duplicates_and_folder_collisions() {
        let records = bundle();
        assert_eq!(
            create_file(&records, "/src", "model.ftl"),
            Err(FileTreeError::DuplicatePath("/src/model.ftl".to_string()))
        );
        assert_eq!(
            create_file(&records, "/", "src"),
            Err(FileTreeError::DuplicatePath("/src".to_string()))
        );
    }

    #[test]
    fn test_create_file_rejects_traversal() {
        let records = bundle();
        assert!(matches!(
            create_file(&records, "/src/..", "x.ftl"),
            Err(FileTreeError::PathTraversal(_))
        ));
        assert!(matches!(
            create_file(&records, "/src", ".."),
            Err(FileTreeError::PathTraversal(_))
        ));
        assert!(matches!(
            create_file(&records, "/src", "a/b.ftl"),
            Err(FileTreeError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_create_folder_adds_placeholder() {
        let updated = create_folder(&bundle(), "/src", "partials").unwrap();
        let placeholder = updated.last().unwrap();
        assert_eq!(placeholder.path, "/src/partials/.gitkeep");
        assert_eq!(placeholder.kind, FileKind::Placeholder);
        assert!(!placeholder.editable);
        assert!(matches!(
            create_folder(&updated, "/src", "partials"),
            Err(FileTreeError::DuplicatePath(_))
        ));
    }

    #[test]
    fn test_rename_updates_path_and_name_only_for_target() {
        let records = bundle();
        let updated = rename_file(&records, "/src/model.ftl", "/src/entity.ftl").unwrap();
        let renamed = &updated[1];
        assert_eq!(renamed.path, "/src/entity.ftl");
        assert_eq!(renamed.name, "entity.ftl");
        assert_eq!(renamed.content, "${name}");
        assert_eq!(updated[0], records[0]);
        assert_eq!(updated[2], records[2]);
    }

    #[test]
    fn test_rename_to_existing_path_leaves_list_unchanged() {
        let records = bundle();
        let before = records.clone();
        let result = rename_file(&records, "/src/model.ftl", "/src/view.ftl");
        assert_eq!(
            result,
            Err(FileTreeError::DuplicatePath("/src/view.ftl".to_string()))
        );
        assert_eq!(records, before);
    }

    #[test]
    fn test_rename_missing_and_invalid_targets() {
        let records = bundle();
        assert!(matches!(
            rename_file(&records, "/nope.ftl", "/x.ftl"),
            Err(FileTreeError::NotFound(_))
        ));
        assert!(matches!(
            rename_file(&records, "/src/model.ftl", "/../model.ftl"),
            Err(FileTreeError::PathTraversal(_))
        ));
        assert_eq!(
            rename_file(&records, "/src/model.ftl", "/src/model.ftl").unwrap(),
            records
        );
    }

    #[test]
    fn test_delete_removes_exact_path_only() {
        let records = bundle();
        let updated = delete_file(&records, "/src/model.ftl").unwrap();
        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|r| r.path != "/src/model.ftl"));

        assert_eq!(
            delete_file(&records, "/src"),
            Err(FileTreeError::NotFound("/src".to_string()))
        );
    }

    #[test]
    fn test_create_file_below_a_file_is_rejected() {
        let records = bundle();
        assert_eq!(
            create_file(&records, "/src/model.ftl", "child.ftl"),
            Err(FileTreeError::DuplicatePath("/src/model.ftl".to_string()))
        );
    }

    #[test]
    fn test_create_folder_below_a_file_is_rejected() {
        let records = bundle();
        assert_eq!(
            create_folder(&records, "/src/model.ftl", "partials"),
            Err(FileTreeError::DuplicatePath("/src/model.ftl".to_string()))
        );
    }

    #[test]
    fn test_rename_below_a_file_is_rejected() {
        let records = bundle();
        assert_eq!(
            rename_file(&records, "/stencil.yml", "/src/model.ftl/stencil.yml"),
            Err(FileTreeError::DuplicatePath("/src/model.ftl".to_string()))
        );
        assert_eq!(file_ancestor_of(&records, "/src/model.ftl/a/b.ftl"), Some("/src/model.ftl"));
        assert_eq!(file_ancestor_of(&records, "/src/other.ftl"), None);
    }
}
