//! Major number to device-class name mapping.
//!
//! Built from `/proc/devices` and `/proc/misc`, whose interesting lines all
//! look like `"NNN name"`: a right-aligned three-column number, one space,
//! then the name. Anything else (headers, blank lines) is ignored; lines of
//! that shape whose number does not parse are logged and skipped.

use crate::port::error::PortError;
use once_cell::sync::{Lazy, OnceCell};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PROC_DEVICES: &str = "/proc/devices";
pub const PROC_MISC: &str = "/proc/misc";

/// Major number to class names, in registration order per major.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceClassMap {
    classes: BTreeMap<u32, Vec<String>>,
}

/// Classify one pseudo-file line.
///
/// `None` means the line is not an entry at all; `Some(Err)` means it has the
/// entry shape but the number is unusable.
pub fn parse_line(line: &str) -> Option<Result<(u32, &str), String>> {
    let bytes = line.as_bytes();
    if bytes.len() <= 4 || bytes[3] != b' ' {
        return None;
    }
    let number = line.get(..3)?.trim();
    let name = line.get(4..)?.trim();
    Some(
        number
            .parse::<u32>()
            .map(|major| (major, name))
            .map_err(|e| format!("bad device number {number:?}: {e}")),
    )
}

impl DeviceClassMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from every readable source; missing files contribute
    /// nothing.
    pub fn load<P: AsRef<Path>>(sources: &[P]) -> Self {
        let mut map = Self::new();
        for source in sources {
            let source = source.as_ref();
            match map.load_file(source) {
                Ok(n) => tracing::debug!(path = %source.display(), entries = n, "loaded device classes"),
                Err(e) => tracing::debug!(path = %source.display(), error = %e, "device class source unavailable"),
            }
        }
        map
    }

    pub fn load_file(&mut self, path: &Path) -> io::Result<usize> {
        let text = fs::read_to_string(path)?;
        Ok(self.parse_into(&path.display().to_string(), &text))
    }

    /// Register every entry in `text`. Returns how many were registered.
    pub fn parse_into(&mut self, origin: &str, text: &str) -> usize {
        let mut registered = 0;
        for (index, line) in text.lines().enumerate() {
            match parse_line(line) {
                None => {}
                Some(Ok((major, name))) => {
                    self.insert(major, name);
                    registered += 1;
                }
                Some(Err(message)) => {
                    let err = PortError::MalformedInput {
                        origin: origin.to_string(),
                        line: index + 1,
                        message,
                    };
                    tracing::warn!("{err}");
                }
            }
        }
        registered
    }

    /// Add `name` under `major` unless it is already registered there.
    pub fn insert(&mut self, major: u32, name: &str) {
        let names = self.classes.entry(major).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    pub fn names(&self, major: u32) -> Option<&[String]> {
        self.classes.get(&major).map(Vec::as_slice)
    }

    /// Registered names joined with `;`, or `<deviceClass#N>`.
    pub fn name(&self, major: u32) -> String {
        match self.classes.get(&major) {
            Some(names) => names.join(";"),
            None => format!("<deviceClass#{major}>"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[String])> {
        self.classes.iter().map(|(&major, names)| (major, names.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

static GLOBAL: Lazy<Arc<DeviceClassCache>> =
    Lazy::new(|| Arc::new(DeviceClassCache::new(vec![PROC_DEVICES.into(), PROC_MISC.into()])));

/// A [`DeviceClassMap`] built on first use and shared afterwards.
///
/// Concurrent first callers block until a single build finishes; every
/// later read is lock-free.
#[derive(Debug)]
pub struct DeviceClassCache {
    sources: Vec<PathBuf>,
    map: OnceCell<DeviceClassMap>,
}

impl DeviceClassCache {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            map: OnceCell::new(),
        }
    }

    /// A cache that is already populated.
    pub fn with_map(map: DeviceClassMap) -> Self {
        Self {
            sources: Vec::new(),
            map: OnceCell::with_value(map),
        }
    }

    /// The process-wide cache over the kernel's pseudo-files.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn map(&self) -> &DeviceClassMap {
        self.map.get_or_init(|| DeviceClassMap::load(&self.sources))
    }

    pub fn class_name(&self, major: u32) -> String {
        self.map().name(major)
    }

    pub fn is_loaded(&self) -> bool {
        self.map.get().is_some()
    }
}
