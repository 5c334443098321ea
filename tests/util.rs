#![allow(dead_code)]

use dedup::data::{DirEntryInfo, EntryKind};
use dedup::lister::{DirectoryLister, FsLister};
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

/// A JPEG-looking blob of `len` bytes; different seeds give different content.
pub fn jpeg_bytes(seed: u8, len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    data.extend_from_slice(b"JFIF\x00\x01\x01");
    data.resize(len, seed);
    data
}

/// A PNG-looking blob of `len` bytes.
pub fn png_bytes(seed: u8, len: usize) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(b"\x00\x00\x00\x0DIHDR");
    data.resize(len, seed);
    data
}

/// An MP4-looking blob of `len` bytes.
pub fn mp4_bytes(seed: u8, len: usize) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypisom\x00\x00\x02\x00isomiso2");
    data.resize(len, seed);
    data
}

/// Sets up a temporary directory holding:
///
/// ```text
/// a.jpg       original
/// b.jpg       copy of a.jpg
/// c.png       unique image
/// readme.txt  not media
/// ```
pub fn media_fixture() -> io::Result<TempDir> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let original = jpeg_bytes(0x11, 4096);
    fs::write(root.join("a.jpg"), &original)?;
    fs::write(root.join("b.jpg"), &original)?;
    fs::write(root.join("c.png"), png_bytes(0x22, 2048))?;
    fs::write(
        root.join("readme.txt"),
        "These photos were exported from the camera roll.\n".repeat(10),
    )?;
    Ok(dir)
}

/// Lists the real directory plus regular-file entries that do not exist,
/// so every phantom entry fails to open during hashing.
pub struct PhantomLister {
    pub phantoms: Vec<String>,
}

impl DirectoryLister for PhantomLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut entries = FsLister.list(dir)?;
        for name in &self.phantoms {
            entries.push(DirEntryInfo::new(name.clone(), EntryKind::Regular));
        }
        Ok(entries)
    }
}
