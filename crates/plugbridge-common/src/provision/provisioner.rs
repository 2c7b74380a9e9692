//! Install-if-absent provisioning of runtime libraries.

use crate::config::{BridgeConfig, LibrariesSection};
use crate::provision::error::{FetchError, ProvisionError, Result};
use crate::provision::http::{ArtifactFetcher, HttpFetcher};
use crate::provision::library::RuntimeLibrary;
use crate::provision::lock::with_download_lock;
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::PersistError;
use tracing::{debug, info, warn};

/// Mode of installed library files before the umask is applied.
#[cfg(unix)]
const INSTALLED_MODE: u32 = 0o644;

/// Libraries confirmed present on disk, each at an absolute path.
///
/// Only [`Provisioner::ensure`] builds one, so every entry was either found
/// non-empty or installed through the atomic path.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedSet {
    directory: PathBuf,
    libraries: IndexMap<RuntimeLibrary, PathBuf>,
}

impl ProvisionedSet {
    /// Library directory the set was provisioned into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Absolute path of `library`, if provisioned.
    pub fn path_of(&self, library: &RuntimeLibrary) -> Option<&Path> {
        self.libraries.get(library).map(PathBuf::as_path)
    }

    /// Whether `library` was provisioned.
    pub fn contains(&self, library: &RuntimeLibrary) -> bool {
        self.libraries.contains_key(library)
    }

    /// Provisioned libraries in request order.
    pub fn libraries(&self) -> impl Iterator<Item = (&RuntimeLibrary, &Path)> {
        self.libraries.iter().map(|(lib, path)| (lib, path.as_path()))
    }

    /// Library paths in request order.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.libraries.values().cloned().collect()
    }

    /// Whether `library` is provisioned and its file is still present.
    pub fn verify(&self, library: &RuntimeLibrary) -> bool {
        self.path_of(library).is_some_and(is_installed)
    }

    /// Number of provisioned libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// Whether nothing was provisioned.
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

/// On-disk state of one library, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStatus {
    /// The library being reported on.
    pub library: RuntimeLibrary,
    /// Where the library file is expected.
    pub path: PathBuf,
    /// Whether the file exists and is non-empty.
    pub installed: bool,
    /// File size in bytes, if a file exists.
    pub size: Option<u64>,
}

/// Ensures runtime libraries exist in a shared directory, fetching each one
/// at most once across threads and processes.
pub struct Provisioner {
    directory: PathBuf,
    repository: Option<String>,
    allow_non_atomic_install: bool,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl Provisioner {
    /// Create a provisioner that fetches through `fetcher`.
    pub fn new(config: &LibrariesSection, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self {
            directory: config.directory.clone(),
            repository: config.repository.clone(),
            allow_non_atomic_install: config.allow_non_atomic_install,
            fetcher,
        }
    }

    /// Create a provisioner backed by the HTTP fetcher.
    pub fn from_config(config: &BridgeConfig) -> std::result::Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&config.network)?;
        Ok(Self::new(&config.libraries, Arc::new(fetcher)))
    }

    /// Shared library directory, as configured.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Remote URL `library` is fetched from, honouring a configured mirror.
    pub fn source_url(&self, library: &RuntimeLibrary) -> String {
        match &self.repository {
            Some(repository) => library.url_in(repository),
            None => library.url(),
        }
    }

    /// Report on-disk state without locking or fetching.
    pub fn status(&self, libraries: &[RuntimeLibrary]) -> Vec<LibraryStatus> {
        libraries
            .iter()
            .map(|library| {
                let path = self.directory.join(library.file_name());
                let size = fs::metadata(&path)
                    .ok()
                    .filter(|m| m.is_file())
                    .map(|m| m.len());
                LibraryStatus {
                    library: *library,
                    installed: size.is_some_and(|s| s > 0),
                    size,
                    path,
                }
            })
            .collect()
    }

    /// Make sure every library in `libraries` is installed.
    ///
    /// Idempotent. Fails on the first library that cannot be installed; no
    /// partial set is returned.
    pub fn ensure(&self, libraries: &[RuntimeLibrary]) -> Result<ProvisionedSet> {
        let directory = self.prepare_directory()?;

        let mut installed = IndexMap::with_capacity(libraries.len());
        for library in libraries {
            let path = self.ensure_one(&directory, library)?;
            installed.insert(*library, path);
        }

        info!(
            "{} runtime librar{} ready in {}",
            installed.len(),
            if installed.len() == 1 { "y" } else { "ies" },
            directory.display()
        );

        Ok(ProvisionedSet {
            directory,
            libraries: installed,
        })
    }

    fn prepare_directory(&self) -> Result<PathBuf> {
        let directory_error = |source| ProvisionError::Directory {
            path: self.directory.clone(),
            source,
        };
        fs::create_dir_all(&self.directory).map_err(directory_error)?;
        fs::canonicalize(&self.directory).map_err(directory_error)
    }

    fn ensure_one(&self, directory: &Path, library: &RuntimeLibrary) -> Result<PathBuf> {
        let target = directory.join(library.file_name());
        if is_installed(&target) {
            debug!("{} already present at {}", library, target.display());
            return Ok(target);
        }

        with_download_lock(directory, || {
            // Another holder may have finished while we waited.
            if is_installed(&target) {
                debug!("{} installed by another process", library);
                return Ok(());
            }
            self.download(directory, library, &target)
        })?;

        Ok(target)
    }

    fn download(&self, directory: &Path, library: &RuntimeLibrary, target: &Path) -> Result<()> {
        let url = self.source_url(library);
        let file_name = library.file_name();
        info!("Downloading {}...", file_name);

        let io_error = |path: &Path, source| ProvisionError::Io {
            library: library.to_string(),
            path: path.to_path_buf(),
            source,
        };

        // The staging file lives beside the target so the final rename stays
        // on one filesystem. It is deleted on drop unless persisted.
        let prefix = format!(".{}.", file_name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".part");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Readable by every host process sharing the directory, subject
            // to the umask like a plainly created file.
            builder.permissions(fs::Permissions::from_mode(INSTALLED_MODE));
        }
        let mut staged = builder
            .tempfile_in(directory)
            .map_err(|e| io_error(directory, e))?;

        let received = self
            .fetcher
            .fetch(&url, staged.as_file_mut())
            .and_then(|received| match received {
                0 => Err(FetchError::Empty),
                n => Ok(n),
            })
            .map_err(|source| ProvisionError::Fetch {
                library: library.to_string(),
                url: url.clone(),
                source,
            })?;

        staged
            .as_file()
            .sync_all()
            .map_err(|e| io_error(staged.path(), e))?;

        match staged.persist(target) {
            Ok(_) => {
                info!("Installed {} ({} bytes)", file_name, received);
                Ok(())
            }
            Err(PersistError { error, file }) => {
                if !self.allow_non_atomic_install {
                    return Err(ProvisionError::Install {
                        library: library.to_string(),
                        path: target.to_path_buf(),
                        source: error,
                    });
                }

                warn!(
                    "Atomic rename failed for {} ({}); falling back to a non-atomic copy",
                    library, error
                );
                copy_into_place(file.path(), target).map_err(|source| {
                    ProvisionError::NonAtomicInstall {
                        library: library.to_string(),
                        path: target.to_path_buf(),
                        source,
                    }
                })?;
                info!("Installed {} ({} bytes, copied)", file_name, received);
                Ok(())
            }
        }
    }
}

/// Copy `source` onto `target`, removing whatever part of `target` was
/// written if the copy fails. Not crash-atomic.
fn copy_into_place(source: &Path, target: &Path) -> std::io::Result<()> {
    match fs::copy(source, target) {
        Ok(_) => Ok(()),
        Err(e) => {
            if fs::symlink_metadata(target).is_ok_and(|m| m.is_file()) {
                let _ = fs::remove_file(target);
            }
            Err(e)
        }
    }
}

/// A library file counts as installed when it exists and is non-empty.
fn is_installed(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}
