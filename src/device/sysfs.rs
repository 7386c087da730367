//! Locating a device's sysfs directories.
//!
//! A class directory such as `/sys/class/tty` is mostly symlinks into
//! `/sys/devices`. The walk never follows a link in place: links that
//! resolve to directories are queued and walked after the tree that held
//! them. Directories are remembered by canonical path, so cyclic links end
//! the recursion.

use super::id::DeviceId;
use crate::port::error::PortError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const SYSFS_ROOT: &str = "/sys";
pub const SYSFS_CLASS: &str = "tty";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsLocator {
    root: PathBuf,
}

impl Default for SysfsLocator {
    fn default() -> Self {
        Self::new(SYSFS_ROOT)
    }
}

#[derive(Default)]
struct Walk {
    seen: HashSet<PathBuf>,
    found: Vec<PathBuf>,
}

impl SysfsLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class_dir(&self, class: &str) -> PathBuf {
        self.root.join("class").join(class)
    }

    /// Every directory under the class tree whose `dev` file reads `id`,
    /// in traversal order.
    pub fn locate(&self, class: &str, id: DeviceId) -> Vec<PathBuf> {
        let mut walk = Walk::default();
        walk.tree(&self.class_dir(class), id);
        walk.found
    }
}

impl Walk {
    fn tree(&mut self, start: &Path, id: DeviceId) {
        let start = match fs::canonicalize(start) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(path = %start.display(), error = %e, "sysfs start not reachable");
                return;
            }
        };
        let mut links = Vec::new();
        self.dir(&start, id, &mut links);
        for target in links {
            self.tree(&target, id);
        }
    }

    fn dir(&mut self, dir: &Path, id: DeviceId, links: &mut Vec<PathBuf>) {
        if !self.seen.insert(dir.to_path_buf()) {
            return;
        }
        let mut entries: Vec<_> = match fs::read_dir(dir) {
            Ok(rd) => rd.filter_map(Result::ok).collect(),
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "cannot list sysfs directory");
                return;
            }
        };
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            if kind.is_dir() {
                self.dir(&path, id, links);
            } else if kind.is_symlink() {
                match fs::canonicalize(&path) {
                    Ok(target) if target.is_dir() => links.push(target),
                    Ok(_) => {}
                    Err(e) => tracing::debug!(path = %path.display(), error = %e, "dangling sysfs link"),
                }
            } else if kind.is_file() && entry.file_name() == "dev" {
                match read_dev(&path) {
                    Ok(found) if found == id => self.found.push(dir.to_path_buf()),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("{e}"),
                }
            }
        }
    }
}

fn read_dev(path: &Path) -> Result<DeviceId, PortError> {
    let malformed = |message: String| PortError::MalformedInput {
        origin: path.display().to_string(),
        line: 1,
        message,
    };
    let text = fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
    text.parse().map_err(|e: PortError| malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::symlink;

    fn dev_file(dir: &Path, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("dev"), content).unwrap();
    }

    #[test]
    fn test_direct_match_and_link_match_with_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        let class = root.join("class/tty");
        let devices = root.join("devices/usb1/ttyUSB0");

        dev_file(&class.join("console"), "5:1\n");
        dev_file(&class.join("direct"), "188:0\n");
        dev_file(&devices.join("tty/ttyUSB0"), "188:0\n");
        dev_file(&devices.join("tty/other"), "188:1\n");
        fs::write(class.join("garbage"), "not a dev file").unwrap();
        dev_file(&class.join("broken"), "nonsense\n");

        symlink(&devices, class.join("ttyUSB0")).unwrap();
        // back to an ancestor of the class dir
        symlink(&root, devices.join("tty/up")).unwrap();
        symlink(root.join("nowhere"), class.join("dangling")).unwrap();

        let found = SysfsLocator::new(&root).locate("tty", DeviceId::new(188, 0));
        assert_eq!(
            found,
            vec![class.join("direct"), devices.join("tty/ttyUSB0")]
        );
    }

    #[test]
    fn test_missing_class_yields_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let found = SysfsLocator::new(tmp.path()).locate("tty", DeviceId::new(4, 64));
        assert!(found.is_empty());
    }

    #[test]
    fn test_self_referencing_link_terminates() {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        let class = root.join("class/tty");
        dev_file(&class.join("ttyS0"), "4:64");
        symlink(&class, class.join("loop")).unwrap();

        let found = SysfsLocator::new(&root).locate("tty", DeviceId::new(4, 64));
        assert_eq!(found, vec![class.join("ttyS0")]);
    }
}
