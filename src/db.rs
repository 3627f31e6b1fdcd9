use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Key of the single record that holds every notebook and note.
pub const DB_KEY: &str = "notekeeperDB";
const BACKUP_KEY: &str = "notekeeperDB.bak";
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub notebook_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Epoch milliseconds.
    pub posted_on: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Notebook {
    pub id: String,
    pub name: String,
    /// Most recently created first.
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Everything that is persisted, as one serialized value.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Library {
    #[serde(default)]
    pub notebooks: Vec<Notebook>,
}

impl Library {
    fn notebook_mut(&mut self, notebook_id: &str) -> StoreResult<&mut Notebook> {
        self.notebooks
            .iter_mut()
            .find(|nb| nb.id == notebook_id)
            .ok_or_else(|| StoreError::notebook_not_found(notebook_id))
    }

    fn note_mut(&mut self, note_id: &str) -> StoreResult<&mut Note> {
        self.notebooks
            .iter_mut()
            .flat_map(|nb| nb.notes.iter_mut())
            .find(|note| note.id == note_id)
            .ok_or_else(|| StoreError::note_not_found(note_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteInput {
    pub title: String,
    pub text: String,
}

impl NoteInput {
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.text.is_empty()
    }
}

/// Fields to merge into an existing note. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub text: Option<String>,
}

impl From<NoteInput> for NotePatch {
    fn from(input: NoteInput) -> Self {
        Self {
            title: Some(input.title),
            text: Some(input.text),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Notebook/note storage backed by one JSON record in SQLite.
///
/// Every operation loads the record fresh, so changes made through another
/// handle on the same database are never missed.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        info!("Opened store at {:?}", path);
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self { conn };
        store.create_tables()?;
        store.init_record()?;
        Ok(store)
    }

    fn create_tables(&self) -> StoreResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT
            );",
            [],
        )?;
        Ok(())
    }

    /// First run writes an empty library. A record that no longer parses is
    /// moved aside to `notekeeperDB.bak` and replaced.
    fn init_record(&self) -> StoreResult<()> {
        match self.get_kv(DB_KEY)? {
            None => {
                info!("No stored notebooks found, starting empty");
                self.write(&Library::default())
            }
            Some(raw) => match serde_json::from_str::<Library>(&raw) {
                Ok(library) => {
                    debug!("Loaded {} notebooks", library.notebooks.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("Stored notebooks are corrupt ({}), backing up and resetting", e);
                    self.set_kv(BACKUP_KEY, &raw)?;
                    self.write(&Library::default())
                }
            },
        }
    }

    fn get_kv(&self, key: &str) -> StoreResult<Option<String>> {
        let res: Result<String, rusqlite::Error> = self.conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match res {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_kv(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn read(&self) -> StoreResult<Library> {
        match self.get_kv(DB_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(StoreError::CorruptState),
            None => Ok(Library::default()),
        }
    }

    fn write(&self, library: &Library) -> StoreResult<()> {
        let raw = serde_json::to_string(library)?;
        self.set_kv(DB_KEY, &raw)
    }

    pub fn create_notebook(&self, name: &str) -> StoreResult<Notebook> {
        let mut library = self.read()?;

        let notebook = Notebook {
            id: new_id(),
            name: display_name(name),
            notes: Vec::new(),
        };
        library.notebooks.push(notebook.clone());

        self.write(&library)?;
        debug!("Created notebook {} ({:?})", notebook.id, notebook.name);
        Ok(notebook)
    }

    pub fn create_note(&self, notebook_id: &str, input: NoteInput) -> StoreResult<Note> {
        let mut library = self.read()?;
        let notebook = library.notebook_mut(notebook_id)?;

        let note = Note {
            id: new_id(),
            notebook_id: notebook_id.to_string(),
            title: input.title,
            text: input.text,
            posted_on: Utc::now().timestamp_millis(),
        };
        notebook.notes.insert(0, note.clone());

        self.write(&library)?;
        debug!("Created note {} in notebook {}", note.id, notebook_id);
        Ok(note)
    }

    pub fn list_notebooks(&self) -> StoreResult<Vec<Notebook>> {
        Ok(self.read()?.notebooks)
    }

    pub fn list_notes(&self, notebook_id: &str) -> StoreResult<Vec<Note>> {
        let library = self.read()?;
        library
            .notebooks
            .into_iter()
            .find(|nb| nb.id == notebook_id)
            .map(|nb| nb.notes)
            .ok_or_else(|| StoreError::notebook_not_found(notebook_id))
    }

    pub fn find_notebook(&self, notebook_id: &str) -> StoreResult<Notebook> {
        self.read()?
            .notebooks
            .into_iter()
            .find(|nb| nb.id == notebook_id)
            .ok_or_else(|| StoreError::notebook_not_found(notebook_id))
    }

    pub fn find_note(&self, note_id: &str) -> StoreResult<Note> {
        self.read()?
            .notebooks
            .into_iter()
            .flat_map(|nb| nb.notes)
            .find(|note| note.id == note_id)
            .ok_or_else(|| StoreError::note_not_found(note_id))
    }

    pub fn rename_notebook(&self, notebook_id: &str, name: &str) -> StoreResult<Notebook> {
        let mut library = self.read()?;
        let notebook = library.notebook_mut(notebook_id)?;
        notebook.name = display_name(name);
        let renamed = notebook.clone();

        self.write(&library)?;
        debug!("Renamed notebook {} to {:?}", notebook_id, renamed.name);
        Ok(renamed)
    }

    pub fn update_note(&self, note_id: &str, patch: NotePatch) -> StoreResult<Note> {
        let mut library = self.read()?;
        let note = library.note_mut(note_id)?;
        if let Some(title) = patch.title {
            note.title = title;
        }
        if let Some(text) = patch.text {
            note.text = text;
        }
        let updated = note.clone();

        self.write(&library)?;
        debug!("Updated note {}", note_id);
        Ok(updated)
    }

    pub fn delete_notebook(&self, notebook_id: &str) -> StoreResult<()> {
        let mut library = self.read()?;
        let before = library.notebooks.len();
        library.notebooks.retain(|nb| nb.id != notebook_id);
        if library.notebooks.len() == before {
            return Err(StoreError::notebook_not_found(notebook_id));
        }

        self.write(&library)?;
        debug!("Deleted notebook {}", notebook_id);
        Ok(())
    }

    /// Removes a note and hands back what is left in its notebook.
    pub fn delete_note(&self, notebook_id: &str, note_id: &str) -> StoreResult<Vec<Note>> {
        let mut library = self.read()?;
        let notebook = library.notebook_mut(notebook_id)?;
        let before = notebook.notes.len();
        notebook.notes.retain(|note| note.id != note_id);
        if notebook.notes.len() == before {
            return Err(StoreError::note_not_found(note_id));
        }
        let remaining = notebook.notes.clone();

        self.write(&library)?;
        debug!("Deleted note {} from notebook {}", note_id, notebook_id);
        Ok(remaining)
    }

    pub fn export(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.read()?)?)
    }

    pub fn clear(&self) -> StoreResult<()> {
        info!("Clearing all notebooks");
        self.write(&Library::default())
    }
}
