use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("duplicate entry {0}")]
    Duplicate(String),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The single writer for the merged archive. Tracks every path written so
/// duplicates are rejected in exactly one place, and synthesizes parent
/// directory entries ahead of their children.
pub struct OutputJar {
    writer: ZipWriter<File>,
    written: HashSet<String>,
    preserve_timestamps: bool,
}

impl OutputJar {
    pub fn new(file: File, preserve_timestamps: bool) -> Self {
        Self {
            writer: ZipWriter::new(file),
            written: HashSet::new(),
            preserve_timestamps,
        }
    }

    /// All entries share this timestamp unless timestamps are preserved,
    /// which keeps repeated runs byte-identical. The first of February
    /// dodges timezone underflow at the DOS epoch.
    fn constant_time() -> DateTime {
        DateTime::from_date_and_time(1980, 2, 1, 0, 0, 0).unwrap_or_default()
    }

    fn entry_time(&self, original: Option<DateTime>) -> DateTime {
        if self.preserve_timestamps {
            original.unwrap_or_else(Self::constant_time)
        } else {
            Self::constant_time()
        }
    }

    pub fn put_file(
        &mut self,
        name: &str,
        data: &[u8],
        modified: Option<DateTime>,
    ) -> Result<(), OutputError> {
        if !self.written.insert(name.to_string()) {
            return Err(OutputError::Duplicate(name.to_string()));
        }
        self.add_parent_directories(name)?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(self.entry_time(modified))
            .unix_permissions(0o644);
        self.writer.start_file(name, options)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    fn add_parent_directories(&mut self, name: &str) -> Result<(), OutputError> {
        for (i, _) in name.match_indices('/') {
            let dir = &name[..=i];
            if self.written.insert(dir.to_string()) {
                let options = SimpleFileOptions::default()
                    .last_modified_time(self.entry_time(None))
                    .unix_permissions(0o755);
                self.writer.add_directory(&name[..i], options)?;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Result<(), OutputError> {
        self.writer.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn open(path: &std::path::Path) -> zip::ZipArchive<File> {
        zip::ZipArchive::new(File::open(path).unwrap()).unwrap()
    }

    #[test]
    fn duplicates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jar");
        let mut out = OutputJar::new(File::create(&path).unwrap(), false);
        out.put_file("a.txt", b"one", None).unwrap();
        let err = out.put_file("a.txt", b"two", None).unwrap_err();
        assert!(matches!(err, OutputError::Duplicate(name) if name == "a.txt"));
        out.finish().unwrap();
    }

    #[test]
    fn parent_directories_come_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jar");
        let mut out = OutputJar::new(File::create(&path).unwrap(), false);
        out.put_file("a/b/c.txt", b"x", None).unwrap();
        out.put_file("a/b/d.txt", b"y", None).unwrap();
        out.finish().unwrap();

        let mut archive = open(&path);
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a/", "a/b/", "a/b/c.txt", "a/b/d.txt"]);
    }

    #[test]
    fn timestamps_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jar");
        let mut out = OutputJar::new(File::create(&path).unwrap(), false);
        let stamp = DateTime::from_date_and_time(2021, 6, 15, 12, 30, 0).unwrap();
        out.put_file("a.txt", b"x", Some(stamp)).unwrap();
        out.finish().unwrap();

        let mut archive = open(&path);
        let entry = archive.by_index(0).unwrap();
        assert_eq!(entry.last_modified(), Some(OutputJar::constant_time()));
    }

    #[test]
    fn preserved_timestamps_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jar");
        let mut out = OutputJar::new(File::create(&path).unwrap(), true);
        let stamp = DateTime::from_date_and_time(2021, 6, 15, 12, 30, 0).unwrap();
        out.put_file("a.txt", b"x", Some(stamp)).unwrap();
        out.finish().unwrap();

        let mut archive = open(&path);
        let entry = archive.by_index(0).unwrap();
        assert_eq!(entry.last_modified(), Some(stamp));
    }

    #[test]
    fn contents_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jar");
        let mut out = OutputJar::new(File::create(&path).unwrap(), false);
        out.put_file("data.bin", b"payload", None).unwrap();
        out.finish().unwrap();

        let mut archive = open(&path);
        let mut entry = archive.by_name("data.bin").unwrap();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"payload");
    }
}
