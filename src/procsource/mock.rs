//! In-memory `FileSystem` for testing `LinuxProcSource` without touching
//! the real `/proc`.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::fs::FileSystem;

#[derive(Default)]
pub struct MockFs {
    files: Mutex<HashMap<PathBuf, String>>,
    links: Mutex<HashMap<PathBuf, PathBuf>>,
    dirs: Mutex<HashMap<PathBuf, Vec<PathBuf>>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), content.to_string());
    }

    pub fn set_link(&self, path: &str, target: &str) {
        self.links
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), PathBuf::from(target));
    }

    pub fn add_dir_entry(&self, dir: &str, entry: &str) {
        let dir_path = PathBuf::from(dir);
        let entry_path = dir_path.join(entry);
        self.dirs
            .lock()
            .unwrap()
            .entry(dir_path)
            .or_default()
            .push(entry_path);
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such mock file"))
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.links
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such mock link"))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.dirs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such mock dir"))
    }
}
