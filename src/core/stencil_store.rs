/*
 * This module is the boundary to wherever stencil versions are stored. The
 * editing core only talks to the `StencilStoreOperations` trait; the concrete
 * `CoreStencilStore` keeps every saved snapshot as a pretty-printed JSON file
 * under `<root>/<stencil_id>/versions/<serial>.json`, with the active serial
 * recorded in `<root>/<stencil_id>/active_serial.txt`.
 *
 * Store calls are blocking. A remote implementation would perform its network
 * round trip inside the call; callers never apply a partial result.
 */
use crate::core::file_tree_mutator::file_ancestor_of;
use crate::core::models::{FileRecord, MAIN_CONFIG_PATH, StencilSettings, VersionSnapshot};
use crate::core::path_utils::{PathRuleViolation, validate_stencil_path};
use crate::core::serial::{Serial, SerialError};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const SNAPSHOT_FILE_EXTENSION: &str = "json";
const VERSIONS_SUBFOLDER_NAME: &str = "versions";
const ACTIVE_SERIAL_FILENAME: &str = "active_serial.txt";

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serde(serde_json::Error),
    StencilNotFound(String),
    VersionNotFound(String),
    MissingMainConfig(String),
    InvalidPath(PathRuleViolation),
    DuplicatePath(String),
    InvalidSerial(SerialError),
    InvalidStencilId(String),
    Rejected(String),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err)
    }
}

impl From<PathRuleViolation> for StoreError {
    fn from(err: PathRuleViolation) -> Self {
        StoreError::InvalidPath(err)
    }
}

impl From<SerialError> for StoreError {
    fn from(err: SerialError) -> Self {
        StoreError::InvalidSerial(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Serde(e) => write!(f, "Serialization/Deserialization error: {e}"),
            StoreError::StencilNotFound(id) => write!(f, "Stencil not found: {id}"),
            StoreError::VersionNotFound(serial) => write!(f, "Version not found: {serial}"),
            StoreError::MissingMainConfig(id) => write!(
                f,
                "Stencil {id} has no main configuration file ({MAIN_CONFIG_PATH})"
            ),
            StoreError::InvalidPath(e) => write!(f, "{e}"),
            StoreError::DuplicatePath(p) => write!(f, "Bundle contains {p} more than once"),
            StoreError::InvalidSerial(e) => write!(f, "{e}"),
            StoreError::InvalidStencilId(id) => write!(
                f,
                "Invalid stencil id: {id}. Contains invalid characters or is empty."
            ),
            StoreError::Rejected(reason) => write!(f, "Save rejected: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Serde(e) => Some(e),
            StoreError::InvalidPath(e) => Some(e),
            StoreError::InvalidSerial(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/* Everything the editor needs to start a session on one stencil version. */
#[derive(Debug, Clone)]
pub struct LoadedStencil {
    pub stencil_id: String,
    pub serial: Serial,
    pub config: StencilSettings,
    pub files: Vec<FileRecord>,
    pub versions: Vec<VersionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub stencil_id: String,
    /* The serial the edited working set was loaded from, if any. */
    pub base_serial: Option<Serial>,
    pub files: Vec<FileRecord>,
    pub author: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResponse {
    pub new_serial: Serial,
    pub success: bool,
}

pub fn is_valid_stencil_id(stencil_id: &str) -> bool {
    !stencil_id.trim().is_empty()
        && stencil_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/*
 * Checks the boundary rules on a bundle about to be saved: every path obeys
 * the path rules, no two records share a path, no record sits below another
 * record, and the main configuration file is present.
 */
pub fn validate_bundle(stencil_id: &str, files: &[FileRecord]) -> Result<()> {
    let mut seen = HashSet::new();
    for record in files {
        validate_stencil_path(&record.path)?;
        if !seen.insert(record.path.as_str()) {
            return Err(StoreError::DuplicatePath(record.path.clone()));
        }
    }
    for record in files {
        if let Some(file_path) = file_ancestor_of(files, &record.path) {
            return Err(StoreError::Rejected(format!(
                "{} is stored below the file {file_path}",
                record.path
            )));
        }
    }
    if !files.iter().any(|f| f.path == MAIN_CONFIG_PATH) {
        return Err(StoreError::MissingMainConfig(stencil_id.to_string()));
    }
    Ok(())
}

pub trait StencilStoreOperations: Send + Sync {
    /*
     * Loads one version of a stencil (the active one when `serial` is `None`)
     * together with its version history. Fails when the stencil, the version,
     * or its main configuration file cannot be found.
     */
    fn load_stencil(&self, stencil_id: &str, serial: Option<&Serial>) -> Result<LoadedStencil>;
    fn load_snapshot(&self, stencil_id: &str, serial: &Serial) -> Result<VersionSnapshot>;
    fn save_stencil(&self, request: &SaveRequest) -> Result<SaveResponse>;
    /* Newest first. */
    fn get_version_history(&self, stencil_id: &str) -> Result<Vec<VersionSnapshot>>;
}

type Clock = Box<dyn Fn() -> OffsetDateTime + Send + Sync>;

pub struct CoreStencilStore {
    root: PathBuf,
    clock: Clock,
}

impl CoreStencilStore {
    pub fn new(root: PathBuf) -> Self {
        CoreStencilStore {
            root,
            clock: Box::new(OffsetDateTime::now_utc),
        }
    }

    /* Replaces the time source used to stamp and serialize new snapshots. */
    pub fn with_clock(mut self, clock: impl Fn() -> OffsetDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn stencil_dir(&self, stencil_id: &str) -> Result<PathBuf> {
        if !is_valid_stencil_id(stencil_id) {
            return Err(StoreError::InvalidStencilId(stencil_id.to_string()));
        }
        Ok(self.root.join(stencil_id))
    }

    fn existing_stencil_dir(&self, stencil_id: &str) -> Result<PathBuf> {
        let dir = self.stencil_dir(stencil_id)?;
        if !dir.join(VERSIONS_SUBFOLDER_NAME).is_dir() {
            log::debug!("CoreStencilStore: No versions directory for stencil '{stencil_id}'");
            return Err(StoreError::StencilNotFound(stencil_id.to_string()));
        }
        Ok(dir)
    }

    fn snapshot_file(stencil_dir: &Path, serial: &Serial) -> PathBuf {
        stencil_dir
            .join(VERSIONS_SUBFOLDER_NAME)
            .join(format!("{serial}.{SNAPSHOT_FILE_EXTENSION}"))
    }

    fn list_serials(stencil_dir: &Path) -> Result<Vec<Serial>> {
        let versions_dir = stencil_dir.join(VERSIONS_SUBFOLDER_NAME);
        let mut serials = Vec::new();
        if !versions_dir.is_dir() {
            return Ok(serials);
        }
        for entry_result in fs::read_dir(versions_dir)? {
            let path = entry_result?.path();
            if path.is_file()
                && let Some(ext) = path.extension()
                && ext == SNAPSHOT_FILE_EXTENSION
                && let Some(stem) = path.file_stem()
            {
                match Serial::parse(&stem.to_string_lossy()) {
                    Ok(serial) => serials.push(serial),
                    Err(e) => log::warn!("CoreStencilStore: Ignoring {path:?}: {e}"),
                }
            }
        }
        serials.sort_unstable();
        Ok(serials)
    }

    fn read_active_serial(stencil_dir: &Path) -> Result<Option<Serial>> {
        let file_path = stencil_dir.join(ACTIVE_SERIAL_FILENAME);
        if !file_path.exists() {
            return Ok(None);
        }
        let mut contents = String::new();
        File::open(&file_path)?.read_to_string(&mut contents)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Serial::parse(trimmed)?))
        }
    }

    /* Snapshots are immutable: an existing snapshot file is never replaced. */
    fn write_new_snapshot(file_path: &Path, snapshot: &VersionSnapshot) -> Result<()> {
        let file = match File::options().write(true).create_new(true).open(file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                log::warn!("CoreStencilStore: Snapshot {file_path:?} already exists");
                return Err(StoreError::Rejected(format!(
                    "version {} was saved concurrently",
                    snapshot.serial
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(())
    }

    fn write_active_serial(stencil_dir: &Path, serial: &Serial) -> Result<()> {
        let mut file = File::create(stencil_dir.join(ACTIVE_SERIAL_FILENAME))?;
        file.write_all(serial.as_str().as_bytes())?;
        Ok(())
    }

    /*
     * The active serial is the recorded pointer when present, otherwise the
     * newest snapshot on disk.
     */
    fn resolve_active_serial(stencil_dir: &Path, serials: &[Serial]) -> Result<Option<Serial>> {
        match Self::read_active_serial(stencil_dir)? {
            Some(serial) => Ok(Some(serial)),
            None => Ok(serials.last().cloned()),
        }
    }

    fn read_snapshot(
        stencil_dir: &Path,
        serial: &Serial,
        active: Option<&Serial>,
    ) -> Result<VersionSnapshot> {
        let file_path = Self::snapshot_file(stencil_dir, serial);
        if !file_path.exists() {
            return Err(StoreError::VersionNotFound(serial.to_string()));
        }
        let reader = BufReader::new(File::open(&file_path)?);
        let mut snapshot: VersionSnapshot = serde_json::from_reader(reader)?;
        snapshot.is_active = active == Some(serial);
        Ok(snapshot)
    }
}

impl StencilStoreOperations for CoreStencilStore {
    fn load_stencil(&self, stencil_id: &str, serial: Option<&Serial>) -> Result<LoadedStencil> {
        log::trace!("CoreStencilStore: Loading stencil '{stencil_id}' at {serial:?}");
        let dir = self.existing_stencil_dir(stencil_id)?;
        let serials = Self::list_serials(&dir)?;
        let active = Self::resolve_active_serial(&dir, &serials)?;
        let target = match serial.cloned().or_else(|| active.clone()) {
            Some(s) => s,
            None => return Err(StoreError::StencilNotFound(stencil_id.to_string())),
        };

        let snapshot = Self::read_snapshot(&dir, &target, active.as_ref())?;
        let Some(main_config) = snapshot.file(MAIN_CONFIG_PATH) else {
            return Err(StoreError::MissingMainConfig(stencil_id.to_string()));
        };
        let config = StencilSettings::from_config_text(&main_config.content).unwrap_or_default();
        let versions = self.get_version_history(stencil_id)?;
        log::debug!(
            "CoreStencilStore: Loaded stencil '{stencil_id}' version {target} with {} file(s)",
            snapshot.files.len()
        );
        Ok(LoadedStencil {
            stencil_id: stencil_id.to_string(),
            serial: target,
            config,
            files: snapshot.files,
            versions,
        })
    }

    fn load_snapshot(&self, stencil_id: &str, serial: &Serial) -> Result<VersionSnapshot> {
        let dir = self.existing_stencil_dir(stencil_id)?;
        let serials = Self::list_serials(&dir)?;
        let active = Self::resolve_active_serial(&dir, &serials)?;
        Self::read_snapshot(&dir, serial, active.as_ref())
    }

    /*
     * Writes a new snapshot of the complete bundle and makes it active. The
     * new serial is derived from the store's clock and the serials already
     * used on that day.
     */
    fn save_stencil(&self, request: &SaveRequest) -> Result<SaveResponse> {
        log::trace!(
            "CoreStencilStore: Saving stencil '{}' ({} file(s))",
            request.stencil_id,
            request.files.len()
        );
        let dir = self.stencil_dir(&request.stencil_id)?;
        validate_bundle(&request.stencil_id, &request.files)?;

        fs::create_dir_all(dir.join(VERSIONS_SUBFOLDER_NAME))?;
        let existing = Self::list_serials(&dir)?;
        let now = (self.clock)();
        let new_serial = Serial::next_for_date(now.date(), &existing)?;

        let snapshot = VersionSnapshot {
            serial: new_serial.clone(),
            created_at: now,
            created_by: request.author.clone(),
            is_active: true,
            message: request.message.clone(),
            files: request.files.clone(),
        };
        let file_path = Self::snapshot_file(&dir, &new_serial);
        Self::write_new_snapshot(&file_path, &snapshot)?;
        Self::write_active_serial(&dir, &new_serial)?;

        log::debug!(
            "CoreStencilStore: Saved stencil '{}' as {new_serial} (based on {:?}) to {file_path:?}",
            request.stencil_id,
            request.base_serial
        );
        Ok(SaveResponse {
            new_serial,
            success: true,
        })
    }

    fn get_version_history(&self, stencil_id: &str) -> Result<Vec<VersionSnapshot>> {
        let dir = self.existing_stencil_dir(stencil_id)?;
        let serials = Self::list_serials(&dir)?;
        let active = Self::resolve_active_serial(&dir, &serials)?;
        let mut history = serials
            .iter()
            .rev()
            .map(|serial| Self::read_snapshot(&dir, serial, active.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        history.sort_by(|a, b| b.serial.cmp(&a.serial));
        log::debug!(
            "CoreStencilStore: Found {} version(s) for stencil '{stencil_id}'",
            history.len()
        );
        Ok(history)
    }
}
