//! JSON-lines file packet store.
//!
//! One `StoredPacket` per line, appended and synced on every write. The
//! whole file is loaded at open so queries are served from memory.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use super::PacketStore;
use crate::domain::StoredPacket;
use crate::error::StoreError;

struct Inner {
    file: File,
    /// Length of the file up to the last complete record.
    len: u64,
    packets: Vec<StoredPacket>,
    ids: HashSet<u32>,
}

impl Inner {
    /// Cut the file back to the end of the last committed record.
    fn truncate_to_last_record(&self, path: &Path) {
        if let Err(e) = self.file.set_len(self.len) {
            tracing::error!("Failed to roll back {:?} to {} bytes: {}", path, self.len, e);
        }
    }
}

/// Packet store persisted to a JSON-lines file.
///
/// The file is exclusively locked for the lifetime of the store, so two
/// ingestion processes cannot append to the same file.
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

/// Records parsed from a store file.
#[derive(Debug)]
struct Loaded {
    packets: Vec<StoredPacket>,
    ids: HashSet<u32>,
    /// Byte length of the file once a torn final line is dropped.
    valid_len: usize,
}

impl FileStore {
    /// Open (or create) the store at `path` and load its contents.
    ///
    /// A torn final line left by an interrupted write is truncated away.
    /// Any other unparseable line fails the open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(io_err)?;

        lock_file_exclusive(&file, &path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(io_err)?;

        let loaded = parse_records(&path, &data)?;
        if loaded.valid_len < data.len() {
            tracing::warn!(
                "Dropping {} bytes of torn record at end of {:?}",
                data.len() - loaded.valid_len,
                path
            );
            file.set_len(loaded.valid_len as u64).map_err(io_err)?;
            file.sync_data().map_err(io_err)?;
        }

        tracing::info!("Loaded {} packets from {:?}", loaded.packets.len(), path);

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                len: loaded.valid_len as u64,
                packets: loaded.packets,
                ids: loaded.ids,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("{:?} lock poisoned", self.path)))
    }
}

/// Parse newline-terminated records.
///
/// The last non-blank line is treated as torn when it is unterminated or
/// does not parse; everything from its start is excluded from `valid_len`.
fn parse_records(path: &Path, data: &[u8]) -> Result<Loaded, StoreError> {
    let mut lines = Vec::new();
    let mut start = 0;
    while start < data.len() {
        let (end, next) = match data[start..].iter().position(|b| *b == b'\n') {
            Some(pos) => (start + pos, start + pos + 1),
            None => (data.len(), data.len()),
        };
        lines.push((start, end, next > end));
        start = next;
    }

    let is_blank = |&(start, end, _): &(usize, usize, bool)| {
        data[start..end].iter().all(u8::is_ascii_whitespace)
    };
    let last_record = lines.iter().rposition(|line| !is_blank(line));

    let mut loaded = Loaded {
        packets: Vec::new(),
        ids: HashSet::new(),
        valid_len: data.len(),
    };

    for (idx, line) in lines.iter().enumerate() {
        if is_blank(line) {
            continue;
        }
        let (start, end, terminated) = *line;
        let is_last = Some(idx) == last_record;

        let packet = match serde_json::from_slice::<StoredPacket>(&data[start..end]) {
            Ok(packet) if terminated => packet,
            Ok(_) => {
                loaded.valid_len = start;
                break;
            }
            Err(_) if is_last => {
                loaded.valid_len = start;
                break;
            }
            Err(source) => {
                return Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    source,
                })
            }
        };

        if !loaded.ids.insert(packet.id) {
            return Err(StoreError::DuplicateRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                id: packet.id,
            });
        }
        loaded.packets.push(packet);
    }

    Ok(loaded)
}

impl PacketStore for FileStore {
    /// Append and sync one line. On failure the file is cut back to its
    /// previous length so no partial or unsynced record survives.
    fn append(&self, packet: StoredPacket) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.ids.contains(&packet.id) {
            return Err(StoreError::DuplicateId(packet.id));
        }

        let mut line = serde_json::to_string(&packet)?;
        line.push('\n');

        let written = inner
            .file
            .write_all(line.as_bytes())
            .and_then(|()| inner.file.sync_data());

        if let Err(source) = written {
            inner.truncate_to_last_record(&self.path);
            return Err(StoreError::Io {
                path: self.path.clone(),
                source,
            });
        }

        inner.len += line.len() as u64;
        inner.ids.insert(packet.id);
        inner.packets.push(packet);
        Ok(())
    }

    fn all(&self) -> Result<Vec<StoredPacket>, StoreError> {
        Ok(self.lock()?.packets.clone())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.packets.len())
    }
}

/// Take a non-blocking exclusive lock on the store file (Unix only).
///
/// The lock is released when the file is closed.
#[cfg(unix)]
fn lock_file_exclusive(file: &File, path: &Path) -> Result<(), StoreError> {
    use libc::{flock, LOCK_EX, LOCK_NB};
    let fd = file.as_raw_fd();
    let result = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            return Err(StoreError::Locked(path.to_path_buf()));
        }
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: err,
        });
    }
    Ok(())
}

/// No-op lock for non-Unix platforms
#[cfg(not(unix))]
fn lock_file_exclusive(_file: &File, _path: &Path) -> Result<(), StoreError> {
    Ok(())
}
