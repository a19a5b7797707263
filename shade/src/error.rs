use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::classfile::ClassError;
use crate::engine::OutputError;

/// Failure modes of a shading run. Anything not covered here (duplicate
/// classes, unparseable signatures) is downgraded to a warning instead.
#[derive(Debug, Error)]
pub enum ShadeError {
    #[error("failed to open input archive {}: {source}", .path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed archive {}: {source}", .path.display())]
    MalformedArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to read entry {entry} from {}: {source}", .archive.display())]
    EntryRead {
        archive: PathBuf,
        entry: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed class file {entry} in {}: {source}", .archive.display())]
    MalformedClass {
        archive: PathBuf,
        entry: String,
        #[source]
        source: ClassError,
    },
    #[error("resource transformer failed on {entry}: {source:#}")]
    Transform {
        entry: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to publish output archive {}: {source}", .path.display())]
    OutputPublish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
