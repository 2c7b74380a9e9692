//! Read access to module archives.
//!
//! An archive is either a zip file (jar) or an exploded directory with the
//! same layout. Archives are opened on first read, so creating one performs
//! no I/O.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

/// Upper bound on buffer space reserved from an entry's declared size.
const MAX_PREALLOCATION: u64 = 1024 * 1024;

/// Buffer space to reserve for an entry declaring `size` bytes. The declared
/// size comes from the archive header and is not trusted.
fn initial_capacity(size: u64) -> usize {
    size.min(MAX_PREALLOCATION) as usize
}

enum State {
    Unopened,
    Directory,
    Zip(Box<ZipArchive<File>>),
}

/// A lazily opened module archive.
pub struct Archive {
    path: PathBuf,
    state: Mutex<State>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive").field("path", &self.path).finish()
    }
}

impl Archive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(State::Unopened),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read entry `entry`, or `None` if the archive has no such entry.
    pub fn read(&self, entry: &str) -> io::Result<Option<Vec<u8>>> {
        let entry = entry.trim_start_matches('/');
        let mut state = self.state.lock();

        if let State::Unopened = *state {
            *state = self.open()?;
        }

        match &mut *state {
            State::Directory => self.read_from_directory(entry),
            State::Zip(zip) => match zip.by_name(entry) {
                Ok(mut file) => {
                    let mut bytes = Vec::with_capacity(initial_capacity(file.size()));
                    file.read_to_end(&mut bytes)?;
                    Ok(Some(bytes))
                }
                Err(ZipError::FileNotFound) => Ok(None),
                Err(e) => Err(io::Error::other(e)),
            },
            State::Unopened => unreachable!("archive opened above"),
        }
    }

    fn open(&self) -> io::Result<State> {
        if self.path.is_dir() {
            debug!("Opened directory archive {}", self.path.display());
            return Ok(State::Directory);
        }

        let file = File::open(&self.path)?;
        let zip = ZipArchive::new(file).map_err(|e| match e {
            ZipError::Io(io) => io,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        })?;
        debug!(
            "Opened zip archive {} ({} entries)",
            self.path.display(),
            zip.len()
        );
        Ok(State::Zip(Box::new(zip)))
    }

    fn read_from_directory(&self, entry: &str) -> io::Result<Option<Vec<u8>>> {
        let relative = Path::new(entry);
        // Entries must stay inside the directory.
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Ok(None);
        }

        let path = self.path.join(relative);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read(path).map(Some)
    }
}
