//! Resolving server-supplied file names to playable media under a root.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A media item located under the media root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResource {
    path: PathBuf,
    name: String,
}

impl MediaResource {
    pub fn new(path: PathBuf, name: impl Into<String>) -> Self {
        Self {
            path,
            name: name.into(),
        }
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name as the server sent it.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Why a file name could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No media root is configured, or it is not a directory.
    NoMediaRoot,
    /// The name is absolute, empty or climbs out of the root.
    InvalidPath(String),
    /// A path segment does not exist.
    NotFound { filename: String, segment: String },
    /// An intermediate segment exists but is not a directory.
    NotADirectory { filename: String, segment: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoMediaRoot => write!(f, "no media directory configured"),
            ResolveError::InvalidPath(name) => write!(f, "invalid file name: {}", name),
            ResolveError::NotFound { filename, segment } if filename == segment => {
                write!(f, "File not found: {}", filename)
            }
            ResolveError::NotFound { filename, segment } => {
                write!(f, "File not found: {} (missing {})", filename, segment)
            }
            ResolveError::NotADirectory { filename, segment } => {
                write!(f, "File not found: {} ({} is not a directory)", filename, segment)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Looks up media by name.
pub trait ResourceResolver: Send {
    fn resolve(&self, filename: &str, root: Option<&Path>) -> Result<MediaResource, ResolveError>;
}

/// Resolver over the local filesystem.
///
/// Tries the name as a direct child of the root first, then walks its
/// `/`-separated segments one directory at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsResolver;

impl FsResolver {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceResolver for FsResolver {
    fn resolve(&self, filename: &str, root: Option<&Path>) -> Result<MediaResource, ResolveError> {
        log::debug!(target: "playback", "Searching for file: {}", filename);

        let root = match root {
            Some(root) if root.is_dir() => root,
            Some(root) => {
                log::debug!(target: "playback", "Invalid media directory: {}", root.display());
                return Err(ResolveError::NoMediaRoot);
            }
            None => return Err(ResolveError::NoMediaRoot),
        };

        let segments = split_segments(filename)?;

        // Direct match in the root folder.
        if segments.len() == 1 {
            let direct = root.join(segments[0]);
            if direct.is_file() {
                log::debug!(target: "playback", "Found file directly: {}", direct.display());
                return Ok(MediaResource::new(direct, filename));
            }
            return Err(ResolveError::NotFound {
                filename: filename.to_string(),
                segment: segments[0].to_string(),
            });
        }

        let (target, dirs) = match segments.split_last() {
            Some(split) => split,
            None => return Err(ResolveError::InvalidPath(filename.to_string())),
        };

        let mut current = root.to_path_buf();
        for dir in dirs {
            current.push(dir);
            if !current.exists() {
                log::debug!(target: "playback", "Subdirectory not found: {}", dir);
                return Err(ResolveError::NotFound {
                    filename: filename.to_string(),
                    segment: dir.to_string(),
                });
            }
            if !current.is_dir() {
                return Err(ResolveError::NotADirectory {
                    filename: filename.to_string(),
                    segment: dir.to_string(),
                });
            }
        }

        current.push(target);
        if current.is_file() {
            log::debug!(target: "playback", "Found target file: {}", current.display());
            Ok(MediaResource::new(current, filename))
        } else {
            log::debug!(target: "playback", "Target file not found: {}", target);
            Err(ResolveError::NotFound {
                filename: filename.to_string(),
                segment: target.to_string(),
            })
        }
    }
}

/// Split on `/`, ignoring empty segments and `.`, rejecting anything that
/// could leave the root.
fn split_segments(filename: &str) -> Result<Vec<&str>, ResolveError> {
    let invalid = || ResolveError::InvalidPath(filename.to_string());

    if filename.starts_with('/') || Path::new(filename).is_absolute() {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    for segment in filename.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => segments.push(segment),
            _ => return Err(invalid()),
        }
    }

    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments)
}
