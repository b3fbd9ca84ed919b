// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::info;

use crate::config;
use crate::error::Error;
use crate::session::Session;

/// The persistence collaborator for session lifecycle operations. The engine
/// core holds no storage logic; implementations own the durable format.
pub trait Store: Send + Sync {
    /// Loads the session with the given id, or SessionNotFound.
    fn load(&self, id: &str) -> Result<Session, Error>;
    /// Saves the session under its id, overwriting any previous save.
    fn save(&self, session: &Session) -> Result<(), Error>;
    /// Deletes the session with the given id, or SessionNotFound.
    fn delete(&self, id: &str) -> Result<(), Error>;
    /// Lists the ids of all saved sessions.
    fn list(&self) -> Result<Vec<String>, Error>;
}

/// A store that keeps one YAML file per session in a directory.
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Creates a store over the given directory.
    pub fn new(dir: &Path) -> FsStore {
        FsStore {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, Error> {
        if id.is_empty() || id.contains(['/', '\\']) {
            return Err(Error::InvalidParameter(format!(
                "session id {:?} is not a valid file name",
                id
            )));
        }
        Ok(self.dir.join(format!("{}.yaml", id)))
    }

    fn store_fault(e: io::Error) -> Error {
        Error::EngineFault(format!("session store: {}", e))
    }
}

impl Store for FsStore {
    fn load(&self, id: &str) -> Result<Session, Error> {
        let path = self.path_for(id)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::SessionNotFound(id.to_string()))
            }
            Err(e) => return Err(FsStore::store_fault(e)),
        };

        let parsed: config::Session = serde_yml::from_str(&contents).map_err(|e| {
            Error::InvalidParameter(format!("malformed session file {}: {}", path.display(), e))
        })?;
        parsed.to_session()
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        let path = self.path_for(session.id())?;
        fs::create_dir_all(&self.dir).map_err(FsStore::store_fault)?;

        let persisted = config::Session::from_session(session);
        let yaml = serde_yml::to_string(&persisted).map_err(|e| {
            Error::EngineFault(format!("session store: serializing {}: {}", session.id(), e))
        })?;
        fs::write(&path, yaml).map_err(FsStore::store_fault)?;

        info!(id = session.id(), path = %path.display(), "Saved session.");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::SessionNotFound(id.to_string()))
            }
            Err(e) => Err(FsStore::store_fault(e)),
        }
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FsStore::store_fault(e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(FsStore::store_fault)?.path();
            if path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// An in-memory store for tests and scratch sessions.
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, config::Session>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> MemoryStore {
        MemoryStore {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> MemoryStore {
        MemoryStore::new()
    }
}

impl Store for MemoryStore {
    fn load(&self, id: &str) -> Result<Session, Error> {
        self.sessions
            .lock()
            .get(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?
            .to_session()
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        self.sessions.lock().insert(
            session.id().to_string(),
            config::Session::from_session(session),
        );
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        self.sessions
            .lock()
            .remove(id)
            .map(|_unused| ())
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        let mut ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
