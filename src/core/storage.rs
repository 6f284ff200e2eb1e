//! Purpose: Durable key-value storage backing the session store and preferences.
//! Exports: `KeyValueStorage`, `EncryptedFileStorage`, `PlainFileStorage`, `MemoryStorage`.
//! Role: Write-through mirror for in-memory state; never the source of truth after load.
//! Invariants: One file per key; file names are SHA-256 of the key (no user text on disk).
//! Invariants: Writes are atomic (temp file + rename) and serialized by an `fs2` lock.
//! Invariants: Encrypted entries are AES-256-GCM with the key name bound as associated data.
//! Invariants: `remove` of a missing key succeeds.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind, io_error_kind};
use aws_lc_rs::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const MASTER_KEY_FILE: &str = "master.key";
const MASTER_KEY_LEN: usize = 32;
const LOCK_FILE: &str = ".lock";

pub trait KeyValueStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, Error>;
    fn store(&self, key: &str, value: &str) -> Result<(), Error>;
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Directory of one-file-per-key entries with a shared advisory lock.
#[derive(Clone, Debug)]
struct EntryDir {
    dir: PathBuf,
    extension: &'static str,
}

impl EntryDir {
    fn open(dir: &Path, extension: &'static str) -> Result<Self, Error> {
        fs::create_dir_all(dir).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("failed to create storage directory")
                .with_path(dir)
                .with_source(err)
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            extension,
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        self.dir.join(format!("{hex}.{}", self.extension))
    }

    fn locked<R>(&self, f: impl FnOnce() -> Result<R, Error>) -> Result<R, Error> {
        let lock_path = self.dir.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| {
                Error::new(io_error_kind(&err))
                    .with_message("failed to open storage lock")
                    .with_path(&lock_path)
                    .with_source(err)
            })?;
        FileExt::lock_exclusive(&lock).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to lock storage")
                .with_path(&lock_path)
                .with_source(err)
        })?;
        let result = f();
        let _ = FileExt::unlock(&lock);
        result
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::new(io_error_kind(&err))
                .with_message("failed to read storage entry")
                .with_path(&path)
                .with_source(err)),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let path = self.entry_path(key);
        let tmp = path.with_extension(format!("{}.tmp", self.extension));
        write_private(&tmp, bytes)?;
        fs::rename(&tmp, &path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            Error::new(io_error_kind(&err))
                .with_message("failed to replace storage entry")
                .with_path(&path)
                .with_source(err)
        })
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::new(io_error_kind(&err))
                .with_message("failed to remove storage entry")
                .with_path(&path)
                .with_source(err)),
        }
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_message("failed to create storage file")
            .with_path(path)
            .with_source(err)
    })?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write storage file")
                .with_path(path)
                .with_source(err)
        })
}

/// Encrypted entries under `dir`, keyed by a master key stored beside them.
pub struct EncryptedFileStorage {
    entries: EntryDir,
    key: LessSafeKey,
}

impl EncryptedFileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let entries = EntryDir::open(dir.as_ref(), "enc")?;
        let key_bytes = entries.locked(|| load_or_create_master_key(&entries.dir))?;
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes).map_err(|_| {
            Error::new(ErrorKind::Corrupt)
                .with_message("master key rejected by cipher")
                .with_path(entries.dir.join(MASTER_KEY_FILE))
        })?;
        Ok(Self {
            entries,
            key: LessSafeKey::new(unbound),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.entries.dir
    }

    fn seal(&self, key: &str, plaintext: &str) -> Result<Vec<u8>, Error> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce_bytes).map_err(|err| {
            Error::new(ErrorKind::Internal).with_message(format!("failed to generate nonce: {err}"))
        })?;
        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(key.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("failed to encrypt entry"))?;
        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(sealed)
    }

    fn open_sealed(&self, key: &str, sealed: &[u8]) -> Result<String, Error> {
        let corrupt = || {
            Error::new(ErrorKind::Corrupt)
                .with_message("storage entry failed authentication")
                .with_path(self.entries.entry_path(key))
        };
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(corrupt());
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| corrupt())?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(key.as_bytes()), &mut in_out)
            .map_err(|_| corrupt())?;
        String::from_utf8(plaintext.to_vec()).map_err(|err| corrupt().with_source(err))
    }
}

impl fmt::Debug for EncryptedFileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileStorage")
            .field("dir", &self.entries.dir)
            .finish_non_exhaustive()
    }
}

impl KeyValueStorage for EncryptedFileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, Error> {
        match self.entries.read(key)? {
            Some(sealed) => self.open_sealed(key, &sealed).map(Some),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), Error> {
        let sealed = self.seal(key, value)?;
        self.entries.locked(|| self.entries.write(key, &sealed))
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.locked(|| self.entries.delete(key))
    }
}

fn load_or_create_master_key(dir: &Path) -> Result<Vec<u8>, Error> {
    let path = dir.join(MASTER_KEY_FILE);
    match fs::read(&path) {
        Ok(bytes) if bytes.len() == MASTER_KEY_LEN => return Ok(bytes),
        Ok(_) => {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("master key has unexpected length")
                .with_hint("Remove the storage directory to start a fresh session.")
                .with_path(&path));
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(Error::new(io_error_kind(&err))
                .with_message("failed to read master key")
                .with_path(&path)
                .with_source(err));
        }
    }

    let mut key = vec![0u8; MASTER_KEY_LEN];
    getrandom::fill(&mut key).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message(format!("failed to generate master key: {err}"))
    })?;
    write_private(&path, &key)?;
    tracing::debug!(path = %path.display(), "created storage master key");
    Ok(key)
}

/// Unencrypted JSON-text entries, for non-secret preferences.
#[derive(Clone, Debug)]
pub struct PlainFileStorage {
    entries: EntryDir,
}

impl PlainFileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self {
            entries: EntryDir::open(dir.as_ref(), "json")?,
        })
    }
}

impl KeyValueStorage for PlainFileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, Error> {
        match self.entries.read(key)? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("storage entry is not utf-8")
                    .with_path(self.entries.entry_path(key))
                    .with_source(err)
            }),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .locked(|| self.entries.write(key, value.as_bytes()))
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.locked(|| self.entries.delete(key))
    }
}

/// In-process storage; contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.guard().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), Error> {
        self.guard().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.guard().remove(key);
        Ok(())
    }
}
