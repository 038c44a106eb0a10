use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::model::Status;

pub const TOKEN_KEY: &str = "token";
pub const CURRENT_LIST_ID_KEY: &str = "currentListId";
pub const CURRENT_LIST_TITLE_KEY: &str = "currentListTitle";
pub const EDIT_TASK_ID_KEY: &str = "editTaskId";
pub const VIEW_MODE_KEY: &str = "viewMode";

/// Durable key-value state shared across pages. Reads and writes never fail from the
/// caller's point of view.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySessionStore {
    entries: BTreeMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// JSON object on disk, rewritten atomically after every mutation.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileSessionStore {
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let path = path.to_path_buf();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed reading {}", path.display()))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("failed parsing {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        info!(
            session = %path.display(),
            keys = entries.len(),
            "opened session store"
        );

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) {
        if let Err(err) = save_json_atomic(&self.path, &self.entries) {
            error!(session = %self.path.display(), error = %err, "failed to persist session");
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist();
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist();
        }
    }
}

#[tracing::instrument(skip(path, entries))]
fn save_json_atomic(path: &Path, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = entries.len(), "saving session atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string_pretty(entries)?;
    writeln!(temp, "{serialized}")?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    ListView,
    KanbanBucket(Status),
    FullKanban,
}

impl ViewMode {
    pub fn storage_value(&self) -> String {
        match self {
            Self::ListView => "list".to_string(),
            Self::KanbanBucket(status) => format!("bucket:{status}"),
            Self::FullKanban => "kanban".to_string(),
        }
    }

    pub fn from_storage_value(raw: &str) -> Option<Self> {
        match raw.trim() {
            "list" => Some(Self::ListView),
            "kanban" => Some(Self::FullKanban),
            other => other
                .strip_prefix("bucket:")
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .map(|raw| Self::KanbanBucket(Status::parse(raw))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub current_list_id: Option<String>,
    pub current_list_title: Option<String>,
    pub view_mode: ViewMode,
    pub edit_task_id: Option<String>,
}

/// Typed accessors over a [`SessionStore`]. Every selection change goes through here so
/// list, bucket and board selections stay mutually exclusive.
#[derive(Debug)]
pub struct Session<S> {
    store: S,
}

impl<S: SessionStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn token(&self) -> Option<String> {
        non_empty(self.store.get(TOKEN_KEY))
    }

    pub fn set_token(&mut self, token: &str) {
        self.store.set(TOKEN_KEY, token);
    }

    pub fn selection(&self) -> Selection {
        let view_mode = self
            .store
            .get(VIEW_MODE_KEY)
            .and_then(|raw| ViewMode::from_storage_value(&raw))
            .unwrap_or_default();

        Selection {
            current_list_id: non_empty(self.store.get(CURRENT_LIST_ID_KEY)),
            current_list_title: non_empty(self.store.get(CURRENT_LIST_TITLE_KEY)),
            view_mode,
            edit_task_id: non_empty(self.store.get(EDIT_TASK_ID_KEY)),
        }
    }

    pub fn current_list_id(&self) -> Option<String> {
        non_empty(self.store.get(CURRENT_LIST_ID_KEY))
    }

    pub fn select_list(&mut self, list_id: &str, title: &str) {
        debug!(list_id, title, "persisting list selection");
        self.store.set(CURRENT_LIST_ID_KEY, list_id);
        self.store.set(CURRENT_LIST_TITLE_KEY, title);
        self.store
            .set(VIEW_MODE_KEY, &ViewMode::ListView.storage_value());
    }

    pub fn select_bucket(&mut self, status: &Status) {
        debug!(%status, "persisting bucket selection");
        self.clear_list_selection();
        self.store.set(
            VIEW_MODE_KEY,
            &ViewMode::KanbanBucket(status.clone()).storage_value(),
        );
    }

    pub fn enter_full_kanban(&mut self) {
        debug!("persisting full board selection");
        self.clear_list_selection();
        self.store
            .set(VIEW_MODE_KEY, &ViewMode::FullKanban.storage_value());
    }

    pub fn clear_list_selection(&mut self) {
        self.store.remove(CURRENT_LIST_ID_KEY);
        self.store.remove(CURRENT_LIST_TITLE_KEY);
    }

    /// Remembers the task for the edit page. An empty list reference leaves the current
    /// list untouched.
    pub fn set_edit_task(&mut self, task_id: &str, list_id: &str) {
        self.store.set(EDIT_TASK_ID_KEY, task_id);
        if !list_id.trim().is_empty() {
            self.store.set(CURRENT_LIST_ID_KEY, list_id);
        }
    }

    pub fn edit_task_id(&self) -> Option<String> {
        non_empty(self.store.get(EDIT_TASK_ID_KEY))
    }

    pub fn clear_edit_task(&mut self) {
        self.store.remove(EDIT_TASK_ID_KEY);
    }

    pub fn logout(&mut self) {
        for key in [
            TOKEN_KEY,
            CURRENT_LIST_ID_KEY,
            CURRENT_LIST_TITLE_KEY,
            EDIT_TASK_ID_KEY,
            VIEW_MODE_KEY,
        ] {
            self.store.remove(key);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
