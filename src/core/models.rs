/*
 * Core data structures of a stencil bundle: the path-addressed file records,
 * the naming conventions used to classify them, the per-document editing tab,
 * and the immutable version snapshot.
 *
 * The file tree shown to the operator is never stored here; it is derived from
 * the flat record list by `file_tree::build_file_tree` on every change.
 */
use crate::core::path_utils;
use crate::core::serial::Serial;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const MAIN_CONFIG_FILE_NAME: &str = "stencil.yml";
pub const MAIN_CONFIG_PATH: &str = "/stencil.yml";
pub const SHARED_CONFIG_GLOB: &str = "*_shared.yml";
pub const TEMPLATE_EXTENSION: &str = "ftl";
pub const PLACEHOLDER_FILE_NAME: &str = ".gitkeep";
pub const STENCIL_CONFIG_BLOCK_KEY: &str = "stencil";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    MainConfig,
    SharedConfig,
    Template,
    Placeholder,
    Other,
}

impl FileKind {
    /*
     * Classifies a file purely by its name. The conventions only decide how a
     * record is linted and displayed; they never influence the tree shape.
     */
    pub fn classify(file_name: &str) -> FileKind {
        if file_name == MAIN_CONFIG_FILE_NAME {
            return FileKind::MainConfig;
        }
        if file_name == PLACEHOLDER_FILE_NAME {
            return FileKind::Placeholder;
        }
        let is_shared_config = Pattern::new(SHARED_CONFIG_GLOB)
            .map(|pattern| pattern.matches(file_name))
            .unwrap_or(false);
        if is_shared_config {
            return FileKind::SharedConfig;
        }
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && ext == TEMPLATE_EXTENSION => {
                FileKind::Template
            }
            _ => FileKind::Other,
        }
    }

    pub fn is_editable(self) -> bool {
        self != FileKind::Placeholder
    }
}

/*
 * One artifact in a stencil bundle. `name` and `kind` are always derived from
 * `path`; use `FileRecord::new` or `with_path` so they never drift apart.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub content: String,
    pub kind: FileKind,
    pub editable: bool,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let name = path_utils::file_name_of(&path).to_string();
        let kind = FileKind::classify(&name);
        FileRecord {
            path,
            name,
            content: content.into(),
            kind,
            editable: kind.is_editable(),
        }
    }

    /* Returns a copy moved to `new_path`, with name and kind re-derived. */
    pub fn with_path(&self, new_path: &str) -> Self {
        FileRecord::new(new_path, self.content.clone())
    }
}

/*
 * One document currently open for editing. `dirty` is a monotonic "touched
 * since the last save or load" flag: it is never cleared by editing the text
 * back to its saved value.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenTab {
    pub path: String,
    pub name: String,
    pub kind: FileKind,
    pub dirty: bool,
}

impl OpenTab {
    pub fn for_record(record: &FileRecord) -> Self {
        OpenTab {
            path: record.path.clone(),
            name: record.name.clone(),
            kind: record.kind,
            dirty: false,
        }
    }
}

/*
 * Events that drive the per-tab state machine:
 * `clean --edit--> dirty --save--> clean`, `dirty --close+confirm--> removed`,
 * `clean --close--> removed`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabEvent {
    Edit,
    Save,
    Close { confirmed: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabTransition {
    Keep(OpenTab),
    Remove,
    NeedsConfirmation,
}

/* Pure transition function of the tab state machine. */
pub fn transition_tab(tab: &OpenTab, event: TabEvent) -> TabTransition {
    match event {
        TabEvent::Edit => TabTransition::Keep(OpenTab {
            dirty: true,
            ..tab.clone()
        }),
        TabEvent::Save => TabTransition::Keep(OpenTab {
            dirty: false,
            ..tab.clone()
        }),
        TabEvent::Close { confirmed } => {
            if tab.dirty && !confirmed {
                TabTransition::NeedsConfirmation
            } else {
                TabTransition::Remove
            }
        }
    }
}

/*
 * An immutable saved revision of the whole bundle. `is_active` is computed by
 * the store when the snapshot is listed or loaded; it is not authoritative on
 * disk.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub serial: Serial,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub files: Vec<FileRecord>,
}

impl VersionSnapshot {
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }
}

/*
 * The descriptive fields of the `stencil` block in the main configuration
 * document. Deserialization is lenient; validity is the configuration linter's
 * job, not the loader's.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilSettings {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
}

impl StencilSettings {
    pub fn from_config_text(text: &str) -> Option<StencilSettings> {
        let document: serde_yaml::Value = match serde_yaml::from_str(text) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("StencilSettings: Main configuration does not parse: {e}");
                return None;
            }
        };
        let block = document.get(STENCIL_CONFIG_BLOCK_KEY)?.clone();
        match serde_yaml::from_value(block) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log::warn!("StencilSettings: '{STENCIL_CONFIG_BLOCK_KEY}' block is malformed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_naming_convention() {
        assert_eq!(FileKind::classify("stencil.yml"), FileKind::MainConfig);
        assert_eq!(FileKind::classify("java_shared.yml"), FileKind::SharedConfig);
        assert_eq!(FileKind::classify("Model.java.ftl"), FileKind::Template);
        assert_eq!(FileKind::classify(".gitkeep"), FileKind::Placeholder);
        assert_eq!(FileKind::classify("README.md"), FileKind::Other);
        assert_eq!(FileKind::classify("other.yml"), FileKind::Other);
        assert_eq!(FileKind::classify(".ftl"), FileKind::Other);
    }

    #[test]
    fn test_file_record_new_derives_name_and_kind() {
        let record = FileRecord::new("/templates/model.ftl", "${name}");
        assert_eq!(record.name, "model.ftl");
        assert_eq!(record.kind, FileKind::Template);
        assert!(record.editable);

        let placeholder = FileRecord::new("/empty/.gitkeep", "");
        assert_eq!(placeholder.kind, FileKind::Placeholder);
        assert!(!placeholder.editable);
    }

    #[test]
    fn test_with_path_reclassifies() {
        let record = FileRecord::new("/a.ftl", "x");
        let moved = record.with_path("/docs/a.md");
        assert_eq!(moved.name, "a.md");
        assert_eq!(moved.kind, FileKind::Other);
        assert_eq!(moved.content, "x");
    }

    #[test]
    fn test_tab_state_machine_transitions() {
        let clean = OpenTab::for_record(&FileRecord::new("/a.ftl", ""));
        assert!(!clean.dirty);

        let dirty = match transition_tab(&clean, TabEvent::Edit) {
            TabTransition::Keep(tab) => tab,
            other => panic!("unexpected transition {other:?}"),
        };
        assert!(dirty.dirty);

        assert_eq!(
            transition_tab(&dirty, TabEvent::Close { confirmed: false }),
            TabTransition::NeedsConfirmation
        );
        assert_eq!(
            transition_tab(&dirty, TabEvent::Close { confirmed: true }),
            TabTransition::Remove
        );
        assert_eq!(
            transition_tab(&clean, TabEvent::Close { confirmed: false }),
            TabTransition::Remove
        );
        assert_eq!(
            transition_tab(&dirty, TabEvent::Save),
            TabTransition::Keep(clean.clone())
        );
    }

    #[test]
    fn test_stencil_settings_from_config_text() {
        let text = "stencil:\n  id: java-service\n  name: Java Service\n  version: 1.2.0\nother: 1\n";
        let settings = StencilSettings::from_config_text(text).expect("settings");
        assert_eq!(settings.id, "java-service");
        assert_eq!(settings.name, "Java Service");
        assert_eq!(settings.version.as_deref(), Some("1.2.0"));
        assert_eq!(settings.description, None);

        assert!(StencilSettings::from_config_text("other: 1").is_none());
        assert!(StencilSettings::from_config_text("stencil: [").is_none());
    }
}
