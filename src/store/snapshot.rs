use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::models::{Equipment, Movement, Parameter, SystemLogEntry, User};

/// Every inventory table as one JSON document. Missing tables read as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Crate version that wrote the file.
    pub written_by: String,
    pub saved_at: String,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    #[serde(default)]
    pub movements: Vec<Movement>,
    #[serde(default)]
    pub system_log: Vec<SystemLogEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            written_by: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: String::new(),
            users: Vec::new(),
            parameters: Vec::new(),
            equipment: Vec::new(),
            movements: Vec::new(),
            system_log: Vec::new(),
        }
    }
}

/// The snapshot file inside the data directory.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the tables. A missing file gives empty tables. An unreadable
    /// one is renamed to `<name>.corrupt-<unix secs>` and also gives empty
    /// tables, so the next save cannot overwrite it.
    pub fn load(&self) -> io::Result<Snapshot> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(e),
        };
        match serde_json::from_str::<Snapshot>(&text) {
            Ok(tables) => {
                debug!(
                    path = %self.path.display(),
                    written_by = %tables.written_by,
                    saved_at = %tables.saved_at,
                    "Snapshot read"
                );
                Ok(tables)
            }
            Err(e) => {
                let aside = self.quarantine_path();
                std::fs::rename(&self.path, &aside)?;
                warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Inventory snapshot unreadable, moved aside and starting empty"
                );
                Ok(Snapshot::default())
            }
        }
    }

    /// Replace the file with `tables`: write a sibling `.tmp`, fsync, rename.
    /// On unix the file is owner-only since it holds password hashes.
    pub fn save(&self, tables: &Snapshot) -> io::Result<()> {
        let mut image = tables.clone();
        image.written_by = env!("CARGO_PKG_VERSION").to_string();
        image.saved_at = chrono::Utc::now().to_rfc3339();
        let body = serde_json::to_vec_pretty(&image)?;

        let staging = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&staging)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), bytes = body.len(), "Snapshot written");
        Ok(())
    }

    fn quarantine_path(&self) -> PathBuf {
        let secs = chrono::Utc::now().timestamp();
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", secs));
        PathBuf::from(name)
    }
}
