use crate::error::EconomyError;
use crate::model::{default_db, Db, DB_VERSION};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub const DB_PATH_ENV: &str = "GRIND_DB_PATH";

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `--db`, then `GRIND_DB_PATH`, then `$XDG_DATA_HOME/grind/db.json`,
/// falling back to `~/.local/share/grind/db.json`.
pub fn resolve_db_path(cli_db_path: Option<&str>) -> Result<PathBuf, EconomyError> {
    if let Some(p) = non_empty(cli_db_path.map(str::to_string)) {
        return Ok(PathBuf::from(p));
    }
    if let Some(p) = non_empty(std::env::var(DB_PATH_ENV).ok()) {
        return Ok(PathBuf::from(p));
    }

    let base = match non_empty(std::env::var("XDG_DATA_HOME").ok()) {
        Some(xdg) => PathBuf::from(xdg),
        None => {
            let home = non_empty(std::env::var("HOME").ok())
                .or_else(|| non_empty(std::env::var("USERPROFILE").ok()))
                .ok_or_else(|| EconomyError::io("cannot locate a data directory; pass --db"))?;
            Path::new(&home).join(".local").join("share")
        }
    };
    Ok(base.join("grind").join("db.json"))
}

fn validate_db_shape(db: &Db) -> Result<(), EconomyError> {
    if db.version != DB_VERSION {
        return Err(EconomyError::io(format!("unsupported data file version {}", db.version)));
    }
    if !db.meta.all_counters_valid() {
        return Err(EconomyError::io("data file corrupted: id counters"));
    }
    Ok(())
}

/// A missing file is a first run and yields the placeholder catalog.
pub fn read_db(db_path: &Path) -> Result<Db, EconomyError> {
    match fs::read_to_string(db_path) {
        Ok(txt) => {
            let db: Db = serde_json::from_str(&txt)
                .map_err(|e| EconomyError::io(format!("data file corrupted: {}", e)))?;
            validate_db_shape(&db)?;
            Ok(db)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %db_path.display(), "no data file yet; using defaults");
            Ok(default_db())
        }
        Err(e) => Err(EconomyError::io(format!("cannot read data file: {}", e))),
    }
}

fn parent_dir(db_path: &Path) -> Result<&Path, EconomyError> {
    match db_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
        Some(_) => Ok(Path::new(".")),
        None => Err(EconomyError::io("invalid data file path")),
    }
}

fn ensure_parent_dir(db_path: &Path) -> Result<(), EconomyError> {
    let dir = parent_dir(db_path)?;
    fs::create_dir_all(dir).map_err(|e| EconomyError::io(format!("cannot create data dir: {}", e)))?;

    #[cfg(unix)]
    {
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
    }

    Ok(())
}

/// Removes the lock file when the transaction ends, success or not.
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_path(db_path: &Path) -> PathBuf {
    let mut s = db_path.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

fn with_lock<R>(db_path: &Path, f: impl FnOnce() -> Result<R, EconomyError>) -> Result<R, EconomyError> {
    let path = lock_path(db_path);
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            #[cfg(unix)]
            {
                let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
            }
            let _ = write!(file, "{}", std::process::id());
            let _guard = LockGuard { path };
            f()
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(EconomyError::io(format!("data file is locked ({})", path.display())))
        }
        Err(e) => Err(EconomyError::io(format!("cannot lock data file: {}", e))),
    }
}

fn write_atomically(db_path: &Path, db: &Db) -> Result<(), EconomyError> {
    validate_db_shape(db)?;
    let dir = parent_dir(db_path)?;
    let tmp_path = dir.join(format!(".grind-db.tmp.{}", std::process::id()));
    let data = serde_json::to_string_pretty(db)
        .map_err(|e| EconomyError::io(format!("cannot encode data file: {}", e)))?
        + "\n";

    {
        let mut f = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| EconomyError::io(format!("cannot write data file: {}", e)))?;

        #[cfg(unix)]
        {
            let _ = f.set_permissions(fs::Permissions::from_mode(0o600));
        }

        f.write_all(data.as_bytes())
            .and_then(|_| f.sync_all())
            .map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                EconomyError::io(format!("cannot write data file: {}", e))
            })?;
    }

    fs::rename(&tmp_path, db_path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        EconomyError::io(format!("cannot replace data file: {}", e))
    })?;

    Ok(())
}

/// Runs `mutator` as a single transaction against the data file: read under a
/// lock file, mutate in memory, write a temp file and rename it over the
/// original. A mutator that fails leaves the file untouched.
pub fn update_db<R>(
    db_path: &Path,
    mutator: impl FnOnce(&mut Db) -> Result<R, EconomyError>,
) -> Result<R, EconomyError> {
    ensure_parent_dir(db_path)?;
    with_lock(db_path, || {
        let mut db = read_db(db_path)?;
        let out = mutator(&mut db)?;
        write_atomically(db_path, &db)?;
        tracing::debug!(path = %db_path.display(), ledger = db.ledger.len(), "transaction committed");
        Ok(out)
    })
}
