/*
 * The multi-document editing session over one stencil bundle. It owns the
 * working set of file records, the open tabs with their dirty flags, the
 * active tab pointer, and the latest lint result of every open document.
 *
 * Linting is synchronous: every open and every edit re-lints exactly that one
 * document and replaces only its entry in the aggregate diagnostic set. The
 * session never talks to a UI; confirmation for closing dirty tabs is a
 * `CloseOutcome` the caller must act on.
 */
use crate::core::checksum_utils::{checksum_map, content_checksum};
use crate::core::config_linter::ConfigLinter;
use crate::core::diagnostics::{Diagnostic, DiagnosticCounts, DiagnosticSet};
use crate::core::file_tree::{FileTreeNode, build_file_tree};
use crate::core::file_tree_mutator::{self, FileTreeError};
use crate::core::models::{
    FileKind, FileRecord, MAIN_CONFIG_PATH, OpenTab, PLACEHOLDER_FILE_NAME, StencilSettings,
    TabEvent, TabTransition, VersionSnapshot, transition_tab,
};
use crate::core::path_utils::{file_name_of, join_path};
use crate::core::serial::Serial;
use crate::core::stencil_store::{
    LoadedStencil, SaveRequest, SaveResponse, StencilStoreOperations, StoreError,
};
use crate::core::template_linter::TemplateLinter;
use std::collections::{BTreeSet, HashMap};
use time::OffsetDateTime;

#[derive(Debug)]
pub enum SessionError {
    NotFound(String),
    NotOpen(String),
    NotEditable(String),
    FileTree(FileTreeError),
    Store(StoreError),
    SaveRejected(String),
}

impl From<FileTreeError> for SessionError {
    fn from(err: FileTreeError) -> Self {
        SessionError::FileTree(err)
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotFound(p) => write!(f, "No file at {p}"),
            SessionError::NotOpen(p) => write!(f, "{p} is not open"),
            SessionError::NotEditable(p) => write!(f, "{p} is not editable"),
            SessionError::FileTree(e) => write!(f, "{e}"),
            SessionError::Store(e) => write!(f, "{e}"),
            SessionError::SaveRejected(id) => write!(f, "The store did not accept the save of {id}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::FileTree(e) => Some(e),
            SessionError::Store(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed { new_active: Option<String> },
    NeedsConfirmation,
    NotOpen,
}

/* What replacing the working set did to the open tabs. */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSetChange {
    pub dirty_paths: Vec<String>,
    pub closed_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EditingSession {
    stencil_id: String,
    serial: Option<Serial>,
    settings: StencilSettings,
    files: Vec<FileRecord>,
    versions: Vec<VersionSnapshot>,
    open_tabs: Vec<OpenTab>,
    active_path: Option<String>,
    diagnostics: DiagnosticSet,
    saved_checksums: HashMap<String, String>,
    template_linter: TemplateLinter,
    config_linter: ConfigLinter,
}

impl EditingSession {
    /* A session over an unsaved working set; every record is its own baseline. */
    pub fn new(stencil_id: &str, files: Vec<FileRecord>) -> Self {
        let settings = files
            .iter()
            .find(|f| f.path == MAIN_CONFIG_PATH)
            .and_then(|f| StencilSettings::from_config_text(&f.content))
            .unwrap_or_default();
        EditingSession {
            stencil_id: stencil_id.to_string(),
            serial: None,
            settings,
            saved_checksums: checksum_map(&files),
            files,
            versions: Vec::new(),
            open_tabs: Vec::new(),
            active_path: None,
            diagnostics: DiagnosticSet::new(),
            template_linter: TemplateLinter::new(),
            config_linter: ConfigLinter::default(),
        }
    }

    pub fn from_loaded(loaded: LoadedStencil) -> Self {
        log::debug!(
            "EditingSession: Starting session for '{}' at {} ({} file(s), {} version(s))",
            loaded.stencil_id,
            loaded.serial,
            loaded.files.len(),
            loaded.versions.len()
        );
        let mut session = EditingSession::new(&loaded.stencil_id, loaded.files);
        session.serial = Some(loaded.serial);
        session.settings = loaded.config;
        session.versions = loaded.versions;
        session
    }

    pub fn stencil_id(&self) -> &str {
        &self.stencil_id
    }

    pub fn serial(&self) -> Option<&Serial> {
        self.serial.as_ref()
    }

    pub fn settings(&self) -> &StencilSettings {
        &self.settings
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn versions(&self) -> &[VersionSnapshot] {
        &self.versions
    }

    pub fn set_versions(&mut self, versions: Vec<VersionSnapshot>) {
        self.versions = versions;
    }

    pub fn tabs(&self) -> &[OpenTab] {
        &self.open_tabs
    }

    pub fn tab(&self, path: &str) -> Option<&OpenTab> {
        self.open_tabs.iter().find(|t| t.path == path)
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.tab(path).is_some()
    }

    pub fn active_path(&self) -> Option<&str> {
        self.active_path.as_deref()
    }

    pub fn active_tab(&self) -> Option<&OpenTab> {
        self.active_path.as_deref().and_then(|p| self.tab(p))
    }

    pub fn tree(&self) -> FileTreeNode {
        build_file_tree(&self.files)
    }

    pub fn expected_variables(&self) -> &[String] {
        self.template_linter.expected_variables()
    }

    /* Replaces the expected-variable list and re-lints every open template. */
    pub fn set_expected_variables(&mut self, expected_variables: Vec<String>) {
        self.template_linter = TemplateLinter::with_expected_variables(expected_variables);
        self.relint_open_tabs();
    }

    /*
     * Opens a tab for an existing record, or activates the tab if it is
     * already open. The document is linted on open.
     */
    pub fn open(&mut self, path: &str) -> Result<()> {
        let Some(record) = self.file(path) else {
            return Err(SessionError::NotFound(path.to_string()));
        };
        if !self.is_open(path) {
            log::debug!("EditingSession: Opening tab {path}");
            let tab = OpenTab::for_record(record);
            self.open_tabs.push(tab);
            self.lint_path(path);
        }
        self.active_path = Some(path.to_string());
        Ok(())
    }

    pub fn set_active(&mut self, path: &str) -> Result<()> {
        if !self.is_open(path) {
            return Err(SessionError::NotOpen(path.to_string()));
        }
        self.active_path = Some(path.to_string());
        Ok(())
    }

    /*
     * Replaces the content of an open document, marks its tab dirty and
     * re-lints only that document.
     */
    pub fn edit(&mut self, path: &str, new_content: &str) -> Result<()> {
        let Some(idx) = self.open_tabs.iter().position(|t| t.path == path) else {
            return Err(SessionError::NotOpen(path.to_string()));
        };
        let Some(record) = self.files.iter_mut().find(|f| f.path == path) else {
            return Err(SessionError::NotFound(path.to_string()));
        };
        if !record.editable {
            return Err(SessionError::NotEditable(path.to_string()));
        }
        record.content = new_content.to_string();
        if record.path == MAIN_CONFIG_PATH
            && let Some(settings) = StencilSettings::from_config_text(new_content)
        {
            self.settings = settings;
        }
        if let TabTransition::Keep(tab) = transition_tab(&self.open_tabs[idx], TabEvent::Edit) {
            self.open_tabs[idx] = tab;
        }
        self.lint_path(path);
        Ok(())
    }

    /*
     * Closes a tab. A dirty tab is only closed when `confirmed` is set;
     * otherwise nothing changes. When the active tab closes, the first
     * remaining tab in open order becomes active.
     */
    pub fn close(&mut self, path: &str, confirmed: bool) -> CloseOutcome {
        let Some(idx) = self.open_tabs.iter().position(|t| t.path == path) else {
            return CloseOutcome::NotOpen;
        };
        match transition_tab(&self.open_tabs[idx], TabEvent::Close { confirmed }) {
            TabTransition::NeedsConfirmation => CloseOutcome::NeedsConfirmation,
            TabTransition::Keep(_) | TabTransition::Remove => {
                self.remove_tab(idx);
                CloseOutcome::Closed {
                    new_active: self.active_path.clone(),
                }
            }
        }
    }

    fn remove_tab(&mut self, idx: usize) {
        let tab = self.open_tabs.remove(idx);
        log::debug!("EditingSession: Closed tab {}", tab.path);
        self.diagnostics.remove(&tab.path);
        if self.active_path.as_deref() == Some(tab.path.as_str()) {
            self.active_path = self.open_tabs.first().map(|t| t.path.clone());
        }
    }

    /*
     * Sends the whole working set to the store. On success every dirty flag
     * is cleared, the new serial becomes current and the saved baseline is
     * reset. On failure the session is left exactly as it was.
     */
    pub fn save(
        &mut self,
        store: &dyn StencilStoreOperations,
        author: &str,
        message: Option<String>,
    ) -> Result<SaveResponse> {
        let request = SaveRequest {
            stencil_id: self.stencil_id.clone(),
            base_serial: self.serial.clone(),
            files: self.files.clone(),
            author: author.to_string(),
            message: message.clone(),
        };
        let response = store.save_stencil(&request)?;
        if !response.success {
            log::warn!(
                "EditingSession: Store reported failure saving '{}'",
                self.stencil_id
            );
            return Err(SessionError::SaveRejected(self.stencil_id.clone()));
        }

        for tab in self.open_tabs.iter_mut() {
            if let TabTransition::Keep(saved) = transition_tab(tab, TabEvent::Save) {
                *tab = saved;
            }
        }
        self.serial = Some(response.new_serial.clone());
        self.saved_checksums = checksum_map(&self.files);

        match store.get_version_history(&self.stencil_id) {
            Ok(history) => self.versions = history,
            Err(e) => {
                log::warn!("EditingSession: Could not refresh version history after save: {e}");
                for v in self.versions.iter_mut() {
                    v.is_active = false;
                }
                self.versions.insert(
                    0,
                    VersionSnapshot {
                        serial: response.new_serial.clone(),
                        created_at: OffsetDateTime::now_utc(),
                        created_by: author.to_string(),
                        is_active: true,
                        message,
                        files: self.files.clone(),
                    },
                );
            }
        }
        log::debug!(
            "EditingSession: Saved '{}' as {}",
            self.stencil_id,
            response.new_serial
        );
        Ok(response)
    }

    /* Creates an empty file and opens it. Returns the new path. */
    pub fn create_file(&mut self, parent_path: &str, file_name: &str) -> Result<String> {
        self.files = file_tree_mutator::create_file(&self.files, parent_path, file_name)?;
        let new_path = join_path(parent_path, file_name);
        self.open(&new_path)?;
        Ok(new_path)
    }

    /* Creates a folder via its placeholder record. Returns the placeholder path. */
    pub fn create_folder(&mut self, parent_path: &str, folder_name: &str) -> Result<String> {
        self.files = file_tree_mutator::create_folder(&self.files, parent_path, folder_name)?;
        Ok(join_path(&join_path(parent_path, folder_name), PLACEHOLDER_FILE_NAME))
    }

    /*
     * Renames a file. An open tab follows the record with its dirty flag and
     * active state; the document is re-linted since its kind may change.
     */
    pub fn rename_file(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        self.files = file_tree_mutator::rename_file(&self.files, old_path, new_path)?;
        if old_path == new_path {
            return Ok(());
        }
        if let Some(tab) = self.open_tabs.iter_mut().find(|t| t.path == old_path) {
            tab.path = new_path.to_string();
            tab.name = file_name_of(new_path).to_string();
            tab.kind = FileKind::classify(&tab.name);
            self.diagnostics.rename(old_path, new_path);
            if self.active_path.as_deref() == Some(old_path) {
                self.active_path = Some(new_path.to_string());
            }
            self.lint_path(new_path);
        }
        Ok(())
    }

    /*
     * Deletes a file record, closing its tab without confirmation (the caller
     * is expected to have confirmed the delete). Deleting a missing path is a
     * no-op and returns `false`.
     */
    pub fn delete_file(&mut self, path: &str) -> Result<bool> {
        match file_tree_mutator::delete_file(&self.files, path) {
            Ok(updated) => {
                self.files = updated;
                if let Some(idx) = self.open_tabs.iter().position(|t| t.path == path) {
                    self.remove_tab(idx);
                }
                self.diagnostics.remove(path);
                Ok(true)
            }
            Err(FileTreeError::NotFound(_)) => {
                log::debug!("EditingSession: Delete of missing {path} ignored");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /*
     * Replaces the whole working set, e.g. with the files of a past snapshot.
     * Tabs whose record disappeared are closed; tabs whose path exists in both
     * sets are marked dirty. The main configuration document is opened when it
     * is not already, dirty only if it differs from the saved baseline. Every
     * open document is re-linted.
     */
    pub fn install_working_set(&mut self, files: Vec<FileRecord>) -> WorkingSetChange {
        let mut change = WorkingSetChange::default();
        let new_paths: BTreeSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
        let closed: Vec<String> = self
            .open_tabs
            .iter()
            .filter(|t| !new_paths.contains(t.path.as_str()))
            .map(|t| t.path.clone())
            .collect();

        self.files = files;
        for path in &closed {
            if let Some(idx) = self.open_tabs.iter().position(|t| &t.path == path) {
                self.remove_tab(idx);
            }
        }
        change.closed_paths = closed;

        for tab in self.open_tabs.iter_mut() {
            if let TabTransition::Keep(edited) = transition_tab(tab, TabEvent::Edit) {
                *tab = edited;
            }
            change.dirty_paths.push(tab.path.clone());
        }

        if !self.is_open(MAIN_CONFIG_PATH)
            && let Some(config) = self.file(MAIN_CONFIG_PATH)
        {
            let differs = self.saved_checksums.get(MAIN_CONFIG_PATH)
                != Some(&content_checksum(&config.content));
            let mut tab = OpenTab::for_record(config);
            tab.dirty = differs;
            if differs {
                change.dirty_paths.push(tab.path.clone());
            }
            self.open_tabs.push(tab);
            if self.active_path.is_none() {
                self.active_path = Some(MAIN_CONFIG_PATH.to_string());
            }
        }

        if let Some(settings) = self
            .file(MAIN_CONFIG_PATH)
            .and_then(|f| StencilSettings::from_config_text(&f.content))
        {
            self.settings = settings;
        }
        self.relint_open_tabs();
        log::debug!(
            "EditingSession: Installed {} file(s); {} tab(s) dirty, {} closed",
            self.files.len(),
            change.dirty_paths.len(),
            change.closed_paths.len()
        );
        change
    }

    pub fn diagnostics_for(&self, path: &str) -> &[Diagnostic] {
        self.diagnostics.for_path(path)
    }

    pub fn all_diagnostics(&self) -> &DiagnosticSet {
        &self.diagnostics
    }

    pub fn counts(&self) -> DiagnosticCounts {
        self.diagnostics.counts()
    }

    pub fn error_count(&self) -> usize {
        self.counts().errors
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.open_tabs.iter().any(|t| t.dirty) || !self.changed_paths().is_empty()
    }

    /*
     * Paths whose content differs from the saved baseline, including records
     * added or removed since the last save or load. Sorted.
     */
    pub fn changed_paths(&self) -> Vec<String> {
        let current = checksum_map(&self.files);
        let mut changed: BTreeSet<String> = current
            .iter()
            .filter(|(path, sum)| self.saved_checksums.get(*path) != Some(*sum))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            self.saved_checksums
                .keys()
                .filter(|path| !current.contains_key(*path))
                .cloned(),
        );
        changed.into_iter().collect()
    }

    fn lint_path(&mut self, path: &str) {
        let Some(record) = self.file(path) else {
            self.diagnostics.remove(path);
            return;
        };
        let findings = match record.kind {
            FileKind::Template => self.template_linter.lint(path, &record.content),
            FileKind::MainConfig => self.config_linter.lint(path, &record.content),
            _ => Vec::new(),
        };
        self.diagnostics.replace(path, findings);
    }

    fn relint_open_tabs(&mut self) {
        let paths: Vec<String> = self.open_tabs.iter().map(|t| t.path.clone()).collect();
        for path in paths {
            self.lint_path(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stencil_store::CoreStencilStore;
    use tempfile::TempDir;

    const CONFIG: &str = "stencil:\n  id: java-service\n  name: Java Service\n";

    fn bundle() -> Vec<FileRecord> {
        vec![
            FileRecord::new(MAIN_CONFIG_PATH, CONFIG),
            FileRecord::new("/templates/model.ftl", "<#if x>${x}</#if>"),
            FileRecord::new("/templates/view.ftl", "${name}"),
            FileRecord::new("/README.md", "docs"),
            FileRecord::new("/partials/.gitkeep", ""),
        ]
    }

    fn session() -> EditingSession {
        EditingSession::new("java-service", bundle())
    }

    #[test]
    fn test_open_appends_tab_once_and_activates() {
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.open("/templates/view.ftl").unwrap();
        s.open("/templates/model.ftl").unwrap();

        let paths: Vec<&str> = s.tabs().iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["/templates/model.ftl", "/templates/view.ftl"]);
        assert_eq!(s.active_path(), Some("/templates/model.ftl"));
        assert!(s.tabs().iter().all(|t| !t.dirty));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut s = session();
        assert!(matches!(s.open("/nope.ftl"), Err(SessionError::NotFound(_))));
        assert!(s.tabs().is_empty());
    }

    #[test]
    fn test_edit_marks_dirty_and_relints_only_that_path() {
        // Arrange
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.open("/templates/view.ftl").unwrap();
        s.edit("/templates/view.ftl", "<#list xs as x>").unwrap();
        let view_findings = s.diagnostics_for("/templates/view.ftl").to_vec();
        assert_eq!(view_findings.len(), 1);

        // Act
        s.edit("/templates/model.ftl", "</#if>").unwrap();

        // Assert
        assert!(s.tab("/templates/model.ftl").unwrap().dirty);
        assert_eq!(s.diagnostics_for("/templates/model.ftl").len(), 1);
        assert_eq!(s.diagnostics_for("/templates/view.ftl"), view_findings.as_slice());
        assert_eq!(s.file("/templates/model.ftl").unwrap().content, "</#if>");
        assert_eq!(s.error_count(), 2);
    }

    #[test]
    fn test_edit_requires_open_editable_document() {
        let mut s = session();
        assert!(matches!(
            s.edit("/templates/model.ftl", "x"),
            Err(SessionError::NotOpen(_))
        ));
        s.open("/partials/.gitkeep").unwrap();
        assert!(matches!(
            s.edit("/partials/.gitkeep", "x"),
            Err(SessionError::NotEditable(_))
        ));
    }

    #[test]
    fn test_main_config_is_linted_with_schema() {
        let mut s = session();
        s.open(MAIN_CONFIG_PATH).unwrap();
        assert!(s.diagnostics_for(MAIN_CONFIG_PATH).is_empty());

        s.edit(MAIN_CONFIG_PATH, "stencil:\n  name: Java Service\n").unwrap();
        let findings = s.diagnostics_for(MAIN_CONFIG_PATH);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("stencil.id:"));
    }

    #[test]
    fn test_other_kinds_have_no_diagnostics() {
        let mut s = session();
        s.open("/README.md").unwrap();
        s.edit("/README.md", "<#if unbalanced").unwrap();
        assert!(s.diagnostics_for("/README.md").is_empty());
    }

    #[test]
    fn test_close_dirty_tab_needs_confirmation() {
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.open("/templates/view.ftl").unwrap();
        s.edit("/templates/view.ftl", "changed").unwrap();

        assert_eq!(s.close("/templates/view.ftl", false), CloseOutcome::NeedsConfirmation);
        assert!(s.is_open("/templates/view.ftl"));
        assert_eq!(s.active_path(), Some("/templates/view.ftl"));

        assert_eq!(
            s.close("/templates/view.ftl", true),
            CloseOutcome::Closed {
                new_active: Some("/templates/model.ftl".to_string())
            }
        );
        assert_eq!(s.close("/templates/view.ftl", true), CloseOutcome::NotOpen);
    }

    #[test]
    fn test_close_last_tab_clears_active_and_diagnostics() {
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.edit("/templates/model.ftl", "<#if x>").unwrap();
        s.edit("/templates/model.ftl", "<#if x></#if>").unwrap();
        s.edit("/templates/model.ftl", "<#if x>").unwrap();
        assert_eq!(s.counts().errors, 1);

        let outcome = s.close("/templates/model.ftl", true);

        assert_eq!(outcome, CloseOutcome::Closed { new_active: None });
        assert_eq!(s.active_path(), None);
        assert!(s.all_diagnostics().counts().is_empty());
    }

    #[test]
    fn test_closing_inactive_tab_keeps_active() {
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.open("/templates/view.ftl").unwrap();
        assert_eq!(
            s.close("/templates/model.ftl", false),
            CloseOutcome::Closed {
                new_active: Some("/templates/view.ftl".to_string())
            }
        );
    }

    #[test]
    fn test_edit_twice_stays_dirty_and_save_clears() -> std::result::Result<(), Box<dyn std::error::Error>> {
        // Arrange
        let dir = TempDir::new()?;
        let store = CoreStencilStore::new(dir.path().to_path_buf());
        let mut s = session();
        s.open("/templates/view.ftl")?;

        // Act
        s.edit("/templates/view.ftl", "${other}")?;
        s.edit("/templates/view.ftl", "${other}")?;
        assert!(s.tab("/templates/view.ftl").unwrap().dirty);
        assert!(s.has_unsaved_changes());
        let response = s.save(&store, "dev@example.com", Some("rename".to_string()))?;

        // Assert
        assert!(!s.tab("/templates/view.ftl").unwrap().dirty);
        assert_eq!(s.serial(), Some(&response.new_serial));
        assert!(s.changed_paths().is_empty());
        assert!(!s.has_unsaved_changes());
        assert_eq!(s.versions().len(), 1);
        assert_eq!(s.versions()[0].serial, response.new_serial);
        Ok(())
    }

    #[test]
    fn test_failed_save_changes_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let store = CoreStencilStore::new(dir.path().to_path_buf());
        let mut s = session();
        s.open("/templates/view.ftl").unwrap();
        s.edit("/templates/view.ftl", "x").unwrap();
        s.delete_file(MAIN_CONFIG_PATH).unwrap();

        let result = s.save(&store, "dev", None);

        assert!(matches!(
            result,
            Err(SessionError::Store(StoreError::MissingMainConfig(_)))
        ));
        assert!(s.tab("/templates/view.ftl").unwrap().dirty);
        assert_eq!(s.serial(), None);
    }

    #[test]
    fn test_changed_paths_reports_edits_additions_and_removals() {
        let mut s = session();
        s.open("/templates/view.ftl").unwrap();
        s.edit("/templates/view.ftl", "${changed}").unwrap();
        s.create_file("/templates", "new.ftl").unwrap();
        s.delete_file("/README.md").unwrap();

        assert_eq!(
            s.changed_paths(),
            vec!["/README.md", "/templates/new.ftl", "/templates/view.ftl"]
        );
    }

    #[test]
    fn test_create_file_opens_it() {
        let mut s = session();
        let path = s.create_file("/templates", "service.ftl").unwrap();
        assert_eq!(path, "/templates/service.ftl");
        assert_eq!(s.active_path(), Some("/templates/service.ftl"));
        assert!(s.tree().find("/templates/service.ftl").is_some());

        assert!(matches!(
            s.create_file("/templates", "service.ftl"),
            Err(SessionError::FileTree(FileTreeError::DuplicatePath(_)))
        ));
    }

    #[test]
    fn test_create_folder_adds_placeholder_without_opening() {
        let mut s = session();
        let path = s.create_folder("/", "docs").unwrap();
        assert_eq!(path, "/docs/.gitkeep");
        assert!(s.file("/docs/.gitkeep").is_some());
        assert!(s.tabs().is_empty());
        assert!(s.tree().find("/docs").is_some_and(|n| n.is_folder()));
    }

    #[test]
    fn test_rename_moves_tab_dirty_flag_active_and_diagnostics() {
        // Arrange
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.edit("/templates/model.ftl", "<#if x>").unwrap();

        // Act
        s.rename_file("/templates/model.ftl", "/templates/entity.ftl")
            .unwrap();

        // Assert
        let tab = s.tab("/templates/entity.ftl").expect("tab follows rename");
        assert!(tab.dirty);
        assert_eq!(tab.name, "entity.ftl");
        assert_eq!(s.active_path(), Some("/templates/entity.ftl"));
        assert!(s.diagnostics_for("/templates/model.ftl").is_empty());
        let findings = s.diagnostics_for("/templates/entity.ftl");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "/templates/entity.ftl");
    }

    #[test]
    fn test_rename_to_other_kind_clears_template_findings() {
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.edit("/templates/model.ftl", "<#if x>").unwrap();
        s.rename_file("/templates/model.ftl", "/templates/model.txt")
            .unwrap();
        assert_eq!(s.tab("/templates/model.txt").unwrap().kind, FileKind::Other);
        assert!(s.all_diagnostics().counts().is_empty());
    }

    #[test]
    fn test_rename_conflict_leaves_session_unchanged() {
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        let before = s.files().to_vec();
        assert!(s
            .rename_file("/templates/model.ftl", "/templates/view.ftl")
            .is_err());
        assert_eq!(s.files(), before.as_slice());
        assert!(s.is_open("/templates/model.ftl"));
    }

    #[test]
    fn test_delete_closes_tab_and_missing_is_noop() {
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.edit("/templates/model.ftl", "<#if x>").unwrap();

        assert!(s.delete_file("/templates/model.ftl").unwrap());
        assert!(!s.is_open("/templates/model.ftl"));
        assert!(s.all_diagnostics().counts().is_empty());
        assert_eq!(s.active_path(), None);

        assert!(!s.delete_file("/templates/model.ftl").unwrap());
    }

    #[test]
    fn test_install_working_set_marks_shared_tabs_dirty_and_closes_missing() {
        // Arrange
        let mut s = session();
        s.open("/templates/model.ftl").unwrap();
        s.open("/README.md").unwrap();
        let replacement = vec![
            FileRecord::new(MAIN_CONFIG_PATH, CONFIG),
            FileRecord::new("/templates/model.ftl", "<#list xs as x>"),
        ];

        // Act
        let change = s.install_working_set(replacement);

        // Assert
        assert_eq!(change.closed_paths, vec!["/README.md"]);
        assert_eq!(change.dirty_paths, vec!["/templates/model.ftl"]);
        assert!(s.tab("/templates/model.ftl").unwrap().dirty);
        let config_tab = s.tab(MAIN_CONFIG_PATH).expect("config opened");
        assert!(!config_tab.dirty, "unchanged config is not dirty");
        assert_eq!(s.diagnostics_for("/templates/model.ftl").len(), 1);
        assert_eq!(s.active_path(), Some("/templates/model.ftl"));
    }

    #[test]
    fn test_set_expected_variables_relints_open_templates() {
        let mut s = session();
        s.open("/templates/view.ftl").unwrap();
        assert!(s.diagnostics_for("/templates/view.ftl").is_empty());

        s.set_expected_variables(vec!["name".to_string(), "package".to_string()]);

        let findings = s.diagnostics_for("/templates/view.ftl");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("package"));
        assert_eq!(s.counts().infos, 1);
    }
}
