//! Group registry implementation
//!
//! Scans the master directory once and holds the resulting groups.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::format;

use super::config::RegistryConfig;
use super::group::ImageGroup;

/// Read-only map of group name to group
///
/// There is no insert or remove; the only way to get one is [`GroupRegistry::scan`]
/// (or [`GroupRegistry::from_groups`]), after which it is shared immutably.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, Arc<ImageGroup>>,
}

impl GroupRegistry {
    /// Build a registry from already-constructed groups
    pub fn from_groups(groups: impl IntoIterator<Item = ImageGroup>) -> Self {
        Self {
            groups: groups
                .into_iter()
                .map(|group| (group.name().to_string(), Arc::new(group)))
                .collect(),
        }
    }

    /// Scan `master` and register every subdirectory holding enough images
    ///
    /// Fails only if `master` itself cannot be listed. Subdirectories that
    /// cannot be read, or hold fewer than `config.min_images` recognized
    /// images, are logged and skipped.
    pub fn scan(master: impl AsRef<Path>, config: &RegistryConfig) -> Result<Self> {
        let master = master.as_ref();
        tracing::info!(path = %master.display(), "Scanning master directory");

        let mut groups = HashMap::new();

        for entry in WalkDir::new(master)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 || e.path() == Some(master) => {
                    return Err(Error::MasterDir {
                        path: master.to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if entry.depth() == 0 || !entry.file_type().is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(
                    path = %entry.path().display(),
                    "Skipping directory with non UTF-8 name"
                );
                continue;
            };

            if let Some(group) = scan_group(name, entry.path(), config) {
                groups.insert(group.name().to_string(), Arc::new(group));
            }
        }

        tracing::info!(groups = groups.len(), "Scan complete");

        Ok(Self { groups })
    }

    /// Look up a group by name
    pub fn get(&self, name: &str) -> Option<&Arc<ImageGroup>> {
        self.groups.get(name)
    }

    /// Number of registered groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when nothing can be served
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Scan one candidate directory; `None` if it does not qualify
fn scan_group(name: String, dir: &Path, config: &RegistryConfig) -> Option<ImageGroup> {
    let members = match list_images(dir) {
        Ok(members) => members,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Cannot list group directory");
            return None;
        }
    };

    if members.len() < config.min_images {
        tracing::warn!(
            path = %dir.display(),
            images = members.len(),
            min_images = config.min_images,
            "Invalid group: too few images"
        );
        return None;
    }

    let cache_dir = ensure_cache_dir(dir, &config.cache_dir_name);

    tracing::info!(
        group = %name,
        path = %dir.display(),
        images = members.len(),
        caching = cache_dir.is_some(),
        "Valid group"
    );

    Some(ImageGroup::new(name, dir.to_path_buf(), members, cache_dir))
}

/// Recognized image files directly inside `dir`, sorted by name
///
/// Fails only if `dir` itself cannot be listed. Entries that cannot be
/// inspected, such as dangling symlinks, are logged and skipped.
fn list_images(dir: &Path) -> std::result::Result<Vec<String>, walkdir::Error> {
    let mut members = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 || e.path() == Some(dir) => return Err(e),
            Err(e) => {
                tracing::warn!(group = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };

        if format::classify_path(file_name).is_some() {
            members.push(file_name.to_string());
        }
    }

    Ok(members)
}

/// Create the group's cache directory if needed
///
/// Failure disables caching for the group (logged as an error) rather than
/// aborting startup.
fn ensure_cache_dir(group_dir: &Path, cache_dir_name: &str) -> Option<PathBuf> {
    let cache_dir = group_dir.join(cache_dir_name);

    match std::fs::create_dir(&cache_dir) {
        Ok(()) => Some(cache_dir),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && cache_dir.is_dir() => Some(cache_dir),
        Err(e) => {
            tracing::error!(
                path = %cache_dir.display(),
                error = %e,
                "Cannot create cache directory, transcoding disabled for this group"
            );
            None
        }
    }
}
