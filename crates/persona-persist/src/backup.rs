//! Online backup and offline restore of the database file.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::error::{PersistError, Result};

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Write a consistent snapshot of the live database to `dest`.
///
/// Safe while the server is running. Refuses to overwrite an existing file.
pub(crate) async fn vacuum_into(pool: &SqlitePool, dest: &Path) -> Result<()> {
    if tokio::fs::try_exists(dest).await? {
        return Err(PersistError::InvalidBackup(format!(
            "{} already exists",
            dest.display()
        )));
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    sqlx::query("VACUUM INTO ?")
        .bind(dest.to_string_lossy().into_owned())
        .execute(pool)
        .await?;

    info!(dest = %dest.display(), "Database backup written");
    Ok(())
}

/// Check that `path` starts with the SQLite file header.
pub async fn verify_sqlite_file(path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = [0u8; 16];

    match file.read_exact(&mut header).await {
        Ok(_) if &header == SQLITE_HEADER => Ok(()),
        Ok(_) => Err(PersistError::InvalidBackup(format!(
            "{} is not a SQLite database",
            path.display()
        ))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(PersistError::InvalidBackup(format!(
            "{} is too short to be a SQLite database",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Replace the database at `dest` with the backup at `src`.
///
/// Run only while no process has the database open. Without `force` an
/// existing `dest` is left untouched.
pub async fn restore_from(src: &Path, dest: &Path, force: bool) -> Result<()> {
    verify_sqlite_file(src).await?;

    if tokio::fs::try_exists(dest).await? {
        if !force {
            return Err(PersistError::InvalidBackup(format!(
                "{} already exists; use force to overwrite it",
                dest.display()
            )));
        }
        if same_file(src, dest).await? {
            return Err(PersistError::InvalidBackup(
                "backup and database are the same file".to_string(),
            ));
        }
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let staging = with_suffix(dest, ".restore");
    tokio::fs::copy(src, &staging).await?;
    tokio::fs::rename(&staging, dest).await?;

    // Journal files of the old database would be replayed over the restored one.
    for suffix in ["-wal", "-shm"] {
        let sidecar = with_suffix(dest, suffix);
        match tokio::fs::remove_file(&sidecar).await {
            Ok(()) => warn!(path = %sidecar.display(), "Removed stale journal file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    info!(src = %src.display(), dest = %dest.display(), "Database restored");
    Ok(())
}

async fn same_file(a: &Path, b: &Path) -> Result<bool> {
    let a = tokio::fs::canonicalize(a).await?;
    let b = tokio::fs::canonicalize(b).await?;
    Ok(a == b)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_suffix_appends_to_file_name() {
        assert_eq!(
            with_suffix(Path::new("/data/agno.db"), "-wal"),
            PathBuf::from("/data/agno.db-wal")
        );
    }

    #[tokio::test]
    async fn test_verify_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.db");
        tokio::fs::write(&path, b"SQLite").await.unwrap();

        let err = verify_sqlite_file(&path).await.unwrap_err();
        assert!(matches!(err, PersistError::InvalidBackup(_)));
    }
}
