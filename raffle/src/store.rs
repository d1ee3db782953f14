//! Storage for uploaded identity CSVs. Every upload is kept under its own
//! name and a `latest` pointer is rewritten on each upload.

use crate::config::{StoreBackend, UploadsConfig};
use crate::error::{Error, Result};
use derive_more::Display;
use redis::Client;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

const LATEST: &str = "latest";
const KEY_PREFIX: &str = "raffle:csv:";
const MAX_NAME_ATTEMPTS: usize = 64;

pub trait BlobStore: Send + Sync {
    /// Stores `data` under `name` unless the name is already taken.
    /// Returns whether anything was written.
    fn put(&self, name: &str, data: &[u8]) -> Result<bool>;
    fn set_latest(&self, name: &str) -> Result<()>;
    /// Contents of the blob the `latest` pointer names, if any.
    fn latest(&self) -> Result<Option<Vec<u8>>>;
}

pub fn open(config: &UploadsConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        StoreBackend::Fs => Arc::new(FsStore::new(config.dir.clone())),
        StoreBackend::Redis => Arc::new(RedisStore::new(&config.redis)?),
    };
    Ok(store)
}

/// Saves `data` as `{stem}.csv`, or `{stem}_{n}.csv` if that name is taken,
/// then points `latest` at it.
pub fn save_latest(store: &dyn BlobStore, stem: &str, data: &[u8]) -> Result<String> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = match attempt {
            0 => format!("{}.csv", stem),
            n => format!("{}_{}.csv", stem, n),
        };
        if store.put(&name, data)? {
            store.set_latest(&name)?;
            return Ok(name);
        }
    }
    Err(Error::Internal(format!("no free upload name for {}", stem)))
}

#[derive(Debug, Display)]
#[display(fmt = "fs {:?}", dir)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl BlobStore for FsStore {
    fn put(&self, name: &str, data: &[u8]) -> Result<bool> {
        fs::create_dir_all(&self.dir)?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(self.dir.join(name)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        file.write_all(data)?;
        Ok(true)
    }

    /// Each call writes its own temp file and renames it over the pointer.
    fn set_latest(&self, name: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(name.as_bytes())?;
        tmp.persist(self.dir.join(LATEST)).map_err(|e| e.error)?;
        Ok(())
    }

    fn latest(&self) -> Result<Option<Vec<u8>>> {
        let pointer = self.dir.join(LATEST);
        if !pointer.exists() {
            return Ok(None);
        }
        let name = fs::read_to_string(pointer)?;
        Ok(Some(fs::read(self.dir.join(name.trim()))?))
    }
}

#[derive(Debug, Display)]
#[display(fmt = "redis {}", endpoint)]
pub struct RedisStore {
    endpoint: String,
    client: Client,
}

impl RedisStore {
    /// connect to a redis server, e.g. `redis://127.0.0.1:6379/0`
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: Client::open(endpoint)?,
            endpoint: endpoint.to_string(),
        })
    }

    fn key(name: &str) -> String {
        format!("{}{}", KEY_PREFIX, name)
    }
}

impl BlobStore for RedisStore {
    fn put(&self, name: &str, data: &[u8]) -> Result<bool> {
        let mut conn = self.client.get_connection()?;
        let stored: Option<String> = redis::cmd("SET")
            .arg(Self::key(name))
            .arg(data)
            .arg("NX")
            .query(&mut conn)?;
        Ok(stored.is_some())
    }

    fn set_latest(&self, name: &str) -> Result<()> {
        let mut conn = self.client.get_connection()?;
        Ok(redis::cmd("SET").arg(Self::key(LATEST)).arg(name).query(&mut conn)?)
    }

    fn latest(&self) -> Result<Option<Vec<u8>>> {
        let mut conn = self.client.get_connection()?;
        let name: Option<String> = redis::cmd("GET").arg(Self::key(LATEST)).query(&mut conn)?;
        match name {
            Some(name) => Ok(redis::cmd("GET").arg(Self::key(&name)).query(&mut conn)?),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_store_has_no_latest_until_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("uploads"));
        assert!(store.latest().unwrap().is_none());
        store.put("a.csv", b"first").unwrap();
        assert!(store.latest().unwrap().is_none());
    }

    #[test]
    fn fs_store_latest_is_last_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        store.put("a.csv", b"first").unwrap();
        store.set_latest("a.csv").unwrap();
        store.put("b.csv", b"second").unwrap();
        store.set_latest("b.csv").unwrap();

        assert_eq!(store.latest().unwrap().as_deref(), Some(&b"second"[..]));
        assert_eq!(fs::read(dir.path().join("a.csv")).unwrap(), b"first");
    }

    #[test]
    fn put_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        assert!(store.put("a.csv", b"first").unwrap());
        assert!(!store.put("a.csv", b"second").unwrap());
        assert_eq!(fs::read(dir.path().join("a.csv")).unwrap(), b"first");
    }

    #[test]
    fn same_stem_gets_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        let first = save_latest(&store, "discord_data_1", b"first").unwrap();
        let second = save_latest(&store, "discord_data_1", b"second").unwrap();
        assert_eq!(first, "discord_data_1.csv");
        assert_eq!(second, "discord_data_1_1.csv");
        assert_eq!(fs::read(dir.path().join(&first)).unwrap(), b"first");
        assert_eq!(store.latest().unwrap().as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn concurrent_pointer_updates_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        let names: Vec<String> = (0..8).map(|i| format!("{}.csv", i)).collect();
        for name in &names {
            store.put(name, name.as_bytes()).unwrap();
        }

        let store = &store;
        for _ in 0..25 {
            let results: Vec<bool> = std::thread::scope(|s| {
                let handles: Vec<_> = names
                    .iter()
                    .map(|name| s.spawn(move || store.set_latest(name).is_ok()))
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            assert!(results.iter().all(|ok| *ok));
            let latest = store.latest().unwrap().unwrap();
            assert!(names.iter().any(|n| n.as_bytes() == latest.as_slice()));
        }
    }

    #[test]
    fn redis_keys_are_namespaced() {
        assert_eq!(RedisStore::key("latest"), "raffle:csv:latest");
        let store = RedisStore::new("redis://127.0.0.1:6379/0").unwrap();
        assert_eq!(store.to_string(), "redis redis://127.0.0.1:6379/0");
    }
}
