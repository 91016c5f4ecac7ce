//! Pairing store: chat id → partner chat id.
//!
//! Persisted as a flat JSON object (`{"100": 200, "200": 100}`), one entry
//! per direction. The file is the source of truth for mutations: each one
//! re-reads it under an exclusive lock, applies the change and writes it
//! back, so edits made meanwhile by another process (the `pairs` CLI)
//! survive. Lookups are served from memory.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tokio::sync::Mutex;

use crate::error::PairingStoreError;
use crate::telegram::ChatId;

type Pairs = HashMap<ChatId, ChatId>;

/// Result of [`PairingStore::set_pair`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Linked {
    /// Former partners of either side whose pairing was dissolved to make
    /// room for the new one.
    pub displaced: Vec<ChatId>,
}

/// In-memory pairing map backed by a locked JSON file.
///
/// One async mutex serializes the mutations of this process; the file lock
/// serializes them against other processes. File IO runs on the blocking
/// pool.
#[derive(Debug)]
pub struct PairingStore {
    path: PathBuf,
    pairs: Mutex<Pairs>,
}

impl PairingStore {
    /// Load the store from `path`.
    ///
    /// Never fails: a missing file yields an empty store and an unreadable
    /// or corrupt one is logged and treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let pairs = match read_pairs(&path) {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load pairs, starting empty"
                );
                HashMap::new()
            }
        };
        Self {
            path,
            pairs: Mutex::new(pairs),
        }
    }

    /// Load the store from `path`, surfacing read and parse errors.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PairingStoreError> {
        let path = path.into();
        let pairs = read_pairs(&path)?;
        Ok(Self {
            path,
            pairs: Mutex::new(pairs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current partner of `id`.
    pub async fn get_partner(&self, id: ChatId) -> Option<ChatId> {
        self.pairs.lock().await.get(&id).copied()
    }

    /// Number of active pairings.
    pub async fn pair_count(&self) -> usize {
        let pairs = self.pairs.lock().await;
        // Mirrored entries count once; a dangling one loaded from disk counts alone.
        pairs
            .iter()
            .filter(|(a, b)| a < b || pairs.get(*b) != Some(*a))
            .count()
    }

    /// Copy of the whole mapping, ordered by chat id.
    pub async fn snapshot(&self) -> BTreeMap<ChatId, ChatId> {
        self.pairs
            .lock()
            .await
            .iter()
            .map(|(a, b)| (*a, *b))
            .collect()
    }

    /// Pair `a` with `b`, replacing any previous pairing of either.
    ///
    /// A previous partner's entry is removed only while it still points
    /// back, so the mapping stays symmetric. Persistence failures are
    /// logged and leave the in-memory state mutated.
    pub async fn set_pair(&self, a: ChatId, b: ChatId) -> Result<Linked, PairingStoreError> {
        if a == b {
            return Err(PairingStoreError::SelfPairing(a));
        }

        let (linked, saved) = self.mutate(move |pairs| relink(pairs, a, b)).await?;
        if let Err(e) = saved {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to save pairs");
        }
        Ok(linked)
    }

    /// Dissolve the pairing of `a`. Returns the former partner, if any.
    ///
    /// Persistence failures are logged and leave the in-memory state mutated.
    pub async fn unlink(&self, a: ChatId) -> Option<ChatId> {
        let (partner, saved) = self.unlink_inner(a).await;
        if let Err(e) = saved {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to save pairs");
        }
        partner
    }

    /// Like [`unlink`](Self::unlink), but reports persistence failures.
    pub async fn try_unlink(&self, a: ChatId) -> Result<Option<ChatId>, PairingStoreError> {
        let (partner, saved) = self.unlink_inner(a).await;
        saved.map(|()| partner)
    }

    async fn unlink_inner(&self, a: ChatId) -> (Option<ChatId>, Result<(), PairingStoreError>) {
        match self.mutate(move |pairs| dissolve(pairs, a)).await {
            Ok(result) => result,
            Err(e) => (None, Err(e)),
        }
    }

    /// Apply `apply` to the current pairs and persist the result.
    ///
    /// The outer error means the file task died and nothing changed; the
    /// inner one is a persistence failure after the change was applied.
    async fn mutate<R, F>(
        &self,
        apply: F,
    ) -> Result<(R, Result<(), PairingStoreError>), PairingStoreError>
    where
        F: FnOnce(&mut Pairs) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut pairs = self.pairs.lock().await;
        let path = self.path.clone();
        let current = pairs.clone();
        let (updated, value, saved) =
            tokio::task::spawn_blocking(move || update_file(&path, current, apply))
                .await
                .map_err(|e| PairingStoreError::Task(e.to_string()))?;
        *pairs = updated;
        Ok((value, saved))
    }
}

fn relink(pairs: &mut Pairs, a: ChatId, b: ChatId) -> Linked {
    let mut displaced = Vec::new();
    for (id, new_partner) in [(a, b), (b, a)] {
        if let Some(old) = pairs.get(&id).copied()
            && old != new_partner
            && pairs.get(&old) == Some(&id)
        {
            pairs.remove(&old);
            displaced.push(old);
        }
    }
    pairs.insert(a, b);
    pairs.insert(b, a);
    Linked { displaced }
}

fn dissolve(pairs: &mut Pairs, a: ChatId) -> Option<ChatId> {
    let partner = pairs.remove(&a)?;
    if pairs.get(&partner) == Some(&a) {
        pairs.remove(&partner);
    }
    Some(partner)
}

/// Locked read-modify-write of the pairs file.
///
/// An empty or unparseable file is replaced by `fallback`. When the file
/// cannot be opened or locked, the change still lands on `fallback` and the
/// error is returned alongside.
fn update_file<R>(
    path: &Path,
    fallback: Pairs,
    apply: impl FnOnce(&mut Pairs) -> R,
) -> (Pairs, R, Result<(), PairingStoreError>) {
    let mut file = match open_locked(path) {
        Ok(file) => file,
        Err(e) => {
            let mut pairs = fallback;
            let value = apply(&mut pairs);
            return (pairs, value, Err(e));
        }
    };

    let mut pairs = match read_locked(&mut file) {
        Ok(Some(pairs)) => pairs,
        Ok(None) => fallback,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Unreadable pairs file, overwriting with in-memory state"
            );
            fallback
        }
    };
    let value = apply(&mut pairs);
    let written = write_locked(&mut file, &pairs);
    let unlocked = FileExt::unlock(&file).map_err(PairingStoreError::from);
    (pairs, value, written.and(unlocked))
}

fn open_locked(path: &Path) -> Result<fs::File, PairingStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

fn read_locked(file: &mut fs::File) -> Result<Option<Pairs>, PairingStoreError> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut content)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    parse_pairs(&content).map(Some)
}

fn write_locked(file: &mut fs::File, pairs: &Pairs) -> Result<(), PairingStoreError> {
    let on_disk: BTreeMap<String, ChatId> =
        pairs.iter().map(|(a, b)| (a.to_string(), *b)).collect();
    let json = serde_json::to_string_pretty(&on_disk)?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Read the pairs file. A missing file is an empty map.
fn read_pairs(path: &Path) -> Result<Pairs, PairingStoreError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_pairs(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Entries whose key or value is not an integer chat id, and self-pairings,
/// are skipped with a warning rather than failing the whole parse.
fn parse_pairs(content: &str) -> Result<Pairs, PairingStoreError> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(content)?;
    let mut pairs = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let id = key.trim().parse::<ChatId>().ok();
        let partner = match &value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse::<ChatId>().ok(),
            _ => None,
        };
        match (id, partner) {
            (Some(id), Some(partner)) if id != partner => {
                pairs.insert(id, partner);
            }
            _ => {
                tracing::warn!(key = %key, value = %value, "Skipping malformed pairs entry");
            }
        }
    }
    Ok(pairs)
}
