//! Access to files bundled with a plugin

use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source of the resources shipped inside a plugin
pub trait ResourceProvider: Send + Sync {
    /// Open a bundled resource by its relative name
    fn resource(&self, name: &str) -> Option<File>;

    /// Relative names of every bundled resource
    fn resources(&self) -> Vec<String>;
}

/// Resources stored in a directory on disk
#[derive(Debug, Clone)]
pub struct DiskResourceProvider {
    folder: PathBuf,
}

impl DiskResourceProvider {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn normalize(name: &str) -> String {
        name.replace('\\', "/").trim_start_matches('/').to_owned()
    }
}

impl ResourceProvider for DiskResourceProvider {
    fn resource(&self, name: &str) -> Option<File> {
        let name = Self::normalize(name);
        if name.split('/').any(|part| part == "..") {
            return None;
        }

        let path = self.folder.join(name);
        if !path.is_file() {
            return None;
        }
        File::open(path).ok()
    }

    fn resources(&self) -> Vec<String> {
        if !self.folder.is_dir() {
            return Vec::new();
        }

        WalkDir::new(&self.folder)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.folder)
                    .ok()
                    .map(|relative| relative.to_string_lossy().replace('\\', "/"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_disk_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lang")).unwrap();
        std::fs::write(dir.path().join("config.toml"), "enabled = true").unwrap();
        std::fs::write(dir.path().join("lang/en.txt"), "hello").unwrap();

        let provider = DiskResourceProvider::new(dir.path());
        assert_eq!(provider.resources(), vec!["config.toml", "lang/en.txt"]);

        let mut content = String::new();
        provider.resource("/lang/en.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");

        assert!(provider.resource("missing.txt").is_none());
        assert!(provider.resource("lang").is_none());
        assert!(provider.resource("../secret").is_none());
    }

    #[test]
    fn test_missing_folder() {
        let provider = DiskResourceProvider::new("/nonexistent/mirai/resources");
        assert!(provider.resources().is_empty());
    }
}
