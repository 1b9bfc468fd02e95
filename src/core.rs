/*
 * This module consolidates the core, platform-agnostic logic of the stencil
 * editor: the bundle data model, the template and configuration linters, the
 * derived file tree and its mutations, the editing session, version diffing
 * and restore, and the collaborator abstractions (`StencilStoreOperations`,
 * `FileSystemScannerOperations`, `ConfigManagerOperations`) that keep storage
 * replaceable in tests.
 */
pub mod checksum_utils;
pub mod config;
pub mod config_linter;
pub mod diagnostics;
pub mod editing_session;
pub mod file_system;
pub mod file_tree;
pub mod file_tree_mutator;
pub mod models;
pub mod path_utils;
pub mod serial;
pub mod stencil_store;
pub mod template_linter;
pub mod tree_navigation;
pub mod version_diff;

// Re-export key structures and enums
pub use models::{
    FileKind, FileRecord, MAIN_CONFIG_PATH, OpenTab, StencilSettings, TabEvent, TabTransition,
    VersionSnapshot, transition_tab,
};
pub use serial::{Serial, SerialError};

pub use diagnostics::{Diagnostic, DiagnosticCounts, DiagnosticSet, Severity};

pub use config_linter::{ConfigLinter, ConfigSchema, FieldFormat, FieldRule};
pub use template_linter::{TemplateLinter, lint_template};

pub use file_tree::{FileTreeNode, NodeKind, build_file_tree};
pub use file_tree_mutator::FileTreeError;

pub use editing_session::{CloseOutcome, EditingSession, SessionError, WorkingSetChange};
pub use version_diff::{
    BundleDiff, DiffStat, FileDiff, FileStatus, RestoreReport, compare_versions, diff_bundles,
    diff_stat, restore_snapshot,
};

// Re-export storage related items
pub use stencil_store::{
    CoreStencilStore, LoadedStencil, SaveRequest, SaveResponse, StencilStoreOperations, StoreError,
};

// Re-export file system related items
pub use file_system::{CoreFileSystemScanner, FileSystemScannerOperations, ImportError};

// Re-export config related items
pub use config::{AppSettings, ConfigError, ConfigManagerOperations, CoreConfigManager};

pub use tree_navigation::{KeyboardHub, NavKey, NavOutcome, Subscription, TreeNavigator, TreeView};
