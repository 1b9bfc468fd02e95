use crate::app_logic::confirmation::{
    ConfirmationId, ConfirmationQueue, ConfirmationRequest, PendingAction,
};
use crate::core::{
    BundleDiff, CloseOutcome, Diagnostic, DiagnosticCounts, EditingSession, FileTreeNode, OpenTab,
    Serial, SessionError, StencilStoreOperations, StoreError, VersionSnapshot, compare_versions,
    restore_snapshot,
};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Information,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: MessageSeverity,
    pub message: String,
}

/*
 * Instructions for the attached UI. The logic layer only enqueues them; the
 * UI drains them with `try_dequeue_command`.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    PopulateTree(FileTreeNode),
    UpdateTabs {
        tabs: Vec<OpenTab>,
        active: Option<String>,
    },
    ShowDocument {
        path: String,
        content: String,
    },
    UpdateDiagnostics {
        path: String,
        diagnostics: Vec<Diagnostic>,
        counts: DiagnosticCounts,
    },
    ShowHistory(Vec<VersionSnapshot>),
    ShowDiff(BundleDiff),
    ShowConfirmation(ConfirmationRequest),
    Notify(Notification),
}

#[derive(Debug)]
pub enum EditorError {
    NoStencilLoaded,
    UnknownConfirmation(ConfirmationId),
    Session(SessionError),
    Store(StoreError),
}

impl From<SessionError> for EditorError {
    fn from(err: SessionError) -> Self {
        EditorError::Session(err)
    }
}

impl From<StoreError> for EditorError {
    fn from(err: StoreError) -> Self {
        EditorError::Store(err)
    }
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::NoStencilLoaded => write!(f, "No stencil is loaded"),
            EditorError::UnknownConfirmation(id) => {
                write!(f, "Confirmation {id} is not pending")
            }
            EditorError::Session(e) => write!(f, "{e}"),
            EditorError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditorError::Session(e) => Some(e),
            EditorError::Store(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

/*
 * Orchestrates one editing session on behalf of the operator. It owns the
 * session, talks to the stencil store through `StencilStoreOperations`, routes
 * destructive actions through the confirmation queue, and reports every
 * outcome as queued `EditorCommand`s. Failures are both returned to the caller
 * and queued as error notifications; they never leave the session partially
 * updated.
 */
pub struct StencilEditorLogic {
    store: Arc<dyn StencilStoreOperations>,
    author: String,
    session: Option<EditingSession>,
    expected_variables: Vec<String>,
    confirmations: ConfirmationQueue,
    synthetic_commands: VecDeque<EditorCommand>,
}

impl StencilEditorLogic {
    pub fn new(store: Arc<dyn StencilStoreOperations>, author: &str) -> Self {
        StencilEditorLogic {
            store,
            author: author.to_string(),
            session: None,
            expected_variables: Vec::new(),
            confirmations: ConfirmationQueue::new(),
            synthetic_commands: VecDeque::new(),
        }
    }

    pub fn session(&self) -> Option<&EditingSession> {
        self.session.as_ref()
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn pending_confirmations(&self) -> &[ConfirmationRequest] {
        self.confirmations.pending()
    }

    pub fn try_dequeue_command(&mut self) -> Option<EditorCommand> {
        self.synthetic_commands.pop_front()
    }

    /* Drains every queued command, oldest first. */
    pub fn drain_commands(&mut self) -> Vec<EditorCommand> {
        self.synthetic_commands.drain(..).collect()
    }

    fn enqueue(&mut self, command: EditorCommand) {
        self.synthetic_commands.push_back(command);
    }

    fn notify(&mut self, severity: MessageSeverity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            MessageSeverity::Error => log::error!("AppLogic: {message}"),
            MessageSeverity::Warning => log::warn!("AppLogic: {message}"),
            MessageSeverity::Information => log::info!("AppLogic: {message}"),
        }
        self.enqueue(EditorCommand::Notify(Notification { severity, message }));
    }

    fn fail<T>(&mut self, err: EditorError) -> Result<T> {
        self.notify(MessageSeverity::Error, err.to_string());
        Err(err)
    }

    fn session_mut(&mut self) -> Result<&mut EditingSession> {
        self.session.as_mut().ok_or(EditorError::NoStencilLoaded)
    }

    fn require_session(&mut self) -> Result<()> {
        if self.session.is_none() {
            return self.fail(EditorError::NoStencilLoaded);
        }
        Ok(())
    }

    fn push_tree(&mut self) {
        if let Some(session) = &self.session {
            let tree = session.tree();
            self.enqueue(EditorCommand::PopulateTree(tree));
        }
    }

    fn push_tabs(&mut self) {
        if let Some(session) = &self.session {
            let command = EditorCommand::UpdateTabs {
                tabs: session.tabs().to_vec(),
                active: session.active_path().map(str::to_string),
            };
            self.enqueue(command);
        }
    }

    fn push_diagnostics(&mut self, path: &str) {
        if let Some(session) = &self.session {
            let command = EditorCommand::UpdateDiagnostics {
                path: path.to_string(),
                diagnostics: session.diagnostics_for(path).to_vec(),
                counts: session.counts(),
            };
            self.enqueue(command);
        }
    }

    fn push_document(&mut self, path: &str) {
        if let Some(record) = self.session.as_ref().and_then(|s| s.file(path)) {
            let command = EditorCommand::ShowDocument {
                path: record.path.clone(),
                content: record.content.clone(),
            };
            self.enqueue(command);
        }
    }

    fn push_open_documents(&mut self) {
        let paths: Vec<String> = self
            .session
            .as_ref()
            .map(|s| s.tabs().iter().map(|t| t.path.clone()).collect())
            .unwrap_or_default();
        for path in paths {
            self.push_document(&path);
            self.push_diagnostics(&path);
        }
    }

    fn push_history(&mut self) {
        if let Some(session) = &self.session {
            let command = EditorCommand::ShowHistory(session.versions().to_vec());
            self.enqueue(command);
        }
    }

    /*
     * Names checked by the template linter in every session loaded from now on
     * (and the current one).
     */
    pub fn set_expected_variables(&mut self, expected_variables: Vec<String>) {
        self.expected_variables = expected_variables.clone();
        if let Some(session) = self.session.as_mut() {
            session.set_expected_variables(expected_variables);
        }
        self.push_open_documents();
    }

    /*
     * Loads a stencil (its active version when `serial` is `None`) and starts a
     * fresh session. On failure the current session stays as it was.
     */
    pub fn load_stencil(&mut self, stencil_id: &str, serial: Option<&Serial>) -> Result<()> {
        log::debug!("AppLogic: Loading stencil '{stencil_id}' ({serial:?})");
        let loaded = match self.store.load_stencil(stencil_id, serial) {
            Ok(loaded) => loaded,
            Err(e) => return self.fail(e.into()),
        };
        let loaded_serial = loaded.serial.clone();
        let mut session = EditingSession::from_loaded(loaded);
        if !self.expected_variables.is_empty() {
            session.set_expected_variables(self.expected_variables.clone());
        }
        self.session = Some(session);
        self.confirmations.clear();

        self.push_tree();
        self.push_tabs();
        self.push_history();
        self.notify(
            MessageSeverity::Information,
            format!("Loaded stencil '{stencil_id}' version {loaded_serial}."),
        );
        Ok(())
    }

    pub fn open_file(&mut self, path: &str) -> Result<()> {
        self.require_session()?;
        if let Err(e) = self.session_mut()?.open(path) {
            return self.fail(e.into());
        }
        self.push_document(path);
        self.push_diagnostics(path);
        self.push_tabs();
        Ok(())
    }

    pub fn activate_tab(&mut self, path: &str) -> Result<()> {
        self.require_session()?;
        if let Err(e) = self.session_mut()?.set_active(path) {
            return self.fail(e.into());
        }
        self.push_tabs();
        Ok(())
    }

    pub fn edit_file(&mut self, path: &str, content: &str) -> Result<()> {
        self.require_session()?;
        if let Err(e) = self.session_mut()?.edit(path, content) {
            return self.fail(e.into());
        }
        self.push_diagnostics(path);
        self.push_tabs();
        Ok(())
    }

    /*
     * Closes a tab, asking for confirmation first when it has unsaved edits.
     * Returns the confirmation request when one was filed.
     */
    pub fn request_close(&mut self, path: &str) -> Result<Option<ConfirmationRequest>> {
        self.require_session()?;
        match self.session_mut()?.close(path, false) {
            CloseOutcome::Closed { .. } => {
                self.push_diagnostics(path);
                self.push_tabs();
                Ok(None)
            }
            CloseOutcome::NeedsConfirmation => {
                let request = self.confirmations.request(
                    "Close tab",
                    format!("{path} has unsaved changes. Close it and discard them?"),
                    PendingAction::CloseTab {
                        path: path.to_string(),
                    },
                );
                self.enqueue(EditorCommand::ShowConfirmation(request.clone()));
                Ok(Some(request))
            }
            CloseOutcome::NotOpen => self.fail(SessionError::NotOpen(path.to_string()).into()),
        }
    }

    /*
     * Saves the working set. With outstanding error diagnostics the save waits
     * for a confirmation naming the error count; otherwise it runs directly.
     */
    pub fn request_save(&mut self, message: Option<String>) -> Result<Option<ConfirmationRequest>> {
        self.require_session()?;
        let error_count = self.session_mut()?.error_count();
        if error_count == 0 {
            let author = self.author.clone();
            self.perform_save(&author, message)?;
            return Ok(None);
        }
        let noun = if error_count == 1 { "error" } else { "errors" };
        let request = self.confirmations.request(
            "Save with errors",
            format!("The stencil has {error_count} {noun}. Save anyway?"),
            PendingAction::Save {
                author: self.author.clone(),
                message,
            },
        );
        self.enqueue(EditorCommand::ShowConfirmation(request.clone()));
        Ok(Some(request))
    }

    pub fn request_delete(&mut self, path: &str) -> Result<ConfirmationRequest> {
        self.require_session()?;
        if self.session_mut()?.file(path).is_none() {
            return self.fail(SessionError::NotFound(path.to_string()).into());
        }
        let request = self.confirmations.request(
            "Delete file",
            format!("Delete {path}? This cannot be undone before the next save."),
            PendingAction::DeleteFile {
                path: path.to_string(),
            },
        );
        self.enqueue(EditorCommand::ShowConfirmation(request.clone()));
        Ok(request)
    }

    pub fn request_restore(&mut self, serial: &Serial) -> Result<ConfirmationRequest> {
        self.require_session()?;
        let request = self.confirmations.request(
            "Restore version",
            format!(
                "Replace the working files with version {serial}? Unsaved changes will be lost. \
                 Nothing is saved until you save explicitly."
            ),
            PendingAction::Restore {
                serial: serial.clone(),
            },
        );
        self.enqueue(EditorCommand::ShowConfirmation(request.clone()));
        Ok(request)
    }

    /* Runs (when `confirmed`) or drops a pending action. */
    pub fn resolve_confirmation(&mut self, id: ConfirmationId, confirmed: bool) -> Result<()> {
        let Some(request) = self.confirmations.take(id) else {
            return self.fail(EditorError::UnknownConfirmation(id));
        };
        if !confirmed {
            log::debug!("AppLogic: Confirmation {id} declined; {:?} dropped", request.action);
            return Ok(());
        }
        match request.action {
            PendingAction::CloseTab { path } => self.perform_close(&path),
            PendingAction::DeleteFile { path } => self.perform_delete(&path),
            PendingAction::Save { author, message } => self.perform_save(&author, message),
            PendingAction::Restore { serial } => self.perform_restore(&serial),
        }
    }

    fn perform_close(&mut self, path: &str) -> Result<()> {
        match self.session_mut()?.close(path, true) {
            CloseOutcome::Closed { .. } => {
                self.push_diagnostics(path);
                self.push_tabs();
                Ok(())
            }
            _ => self.fail(SessionError::NotOpen(path.to_string()).into()),
        }
    }

    fn perform_delete(&mut self, path: &str) -> Result<()> {
        match self.session_mut()?.delete_file(path) {
            Ok(true) => {
                self.push_tree();
                self.push_diagnostics(path);
                self.push_tabs();
                self.notify(MessageSeverity::Information, format!("Deleted {path}."));
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => self.fail(e.into()),
        }
    }

    fn perform_save(&mut self, author: &str, message: Option<String>) -> Result<()> {
        let store = Arc::clone(&self.store);
        let result = self.session_mut()?.save(store.as_ref(), author, message);
        match result {
            Ok(response) => {
                self.push_tabs();
                self.push_history();
                self.notify(
                    MessageSeverity::Information,
                    format!("Saved as version {}.", response.new_serial),
                );
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn perform_restore(&mut self, serial: &Serial) -> Result<()> {
        let store = Arc::clone(&self.store);
        let result = restore_snapshot(self.session_mut()?, store.as_ref(), serial);
        match result {
            Ok(report) => {
                self.push_tree();
                self.push_tabs();
                self.push_open_documents();
                self.notify(
                    MessageSeverity::Information,
                    format!(
                        "Restored version {} ({} modified tab(s)). Save to keep it.",
                        report.restored_serial,
                        report.dirty_paths.len()
                    ),
                );
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn create_file(&mut self, parent_path: &str, file_name: &str) -> Result<String> {
        self.require_session()?;
        match self.session_mut()?.create_file(parent_path, file_name) {
            Ok(path) => {
                self.push_tree();
                self.push_document(&path);
                self.push_diagnostics(&path);
                self.push_tabs();
                Ok(path)
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn create_folder(&mut self, parent_path: &str, folder_name: &str) -> Result<String> {
        self.require_session()?;
        match self.session_mut()?.create_folder(parent_path, folder_name) {
            Ok(path) => {
                self.push_tree();
                Ok(path)
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn rename_file(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        self.require_session()?;
        if let Err(e) = self.session_mut()?.rename_file(old_path, new_path) {
            return self.fail(e.into());
        }
        self.push_tree();
        self.push_diagnostics(old_path);
        self.push_diagnostics(new_path);
        self.push_tabs();
        Ok(())
    }

    /* Re-fetches the version list from the store. */
    pub fn refresh_history(&mut self) -> Result<()> {
        self.require_session()?;
        let stencil_id = self.session_mut()?.stencil_id().to_string();
        match self.store.get_version_history(&stencil_id) {
            Ok(history) => {
                self.session_mut()?.set_versions(history);
                self.push_history();
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn compare_versions(&mut self, old_serial: &Serial, new_serial: &Serial) -> Result<BundleDiff> {
        self.require_session()?;
        let stencil_id = self.session_mut()?.stencil_id().to_string();
        match compare_versions(self.store.as_ref(), &stencil_id, old_serial, new_serial) {
            Ok(diff) => {
                self.enqueue(EditorCommand::ShowDiff(diff.clone()));
                Ok(diff)
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /* Paths changed since the last save or load. */
    pub fn pending_changes(&self) -> Vec<String> {
        self.session
            .as_ref()
            .map(EditingSession::changed_paths)
            .unwrap_or_default()
    }
}
