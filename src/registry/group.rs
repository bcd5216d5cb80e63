//! A single servable image group

use std::path::{Path, PathBuf};

use rand::Rng;

/// One named collection of images
///
/// Only the registry scan constructs groups; there are no setters, so a group
/// looks the same for every request over the life of the process.
#[derive(Debug, Clone)]
pub struct ImageGroup {
    name: String,
    source_dir: PathBuf,
    members: Vec<String>,
    cache_dir: Option<PathBuf>,
}

impl ImageGroup {
    pub(super) fn new(
        name: String,
        source_dir: PathBuf,
        members: Vec<String>,
        cache_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            name,
            source_dir,
            members,
            cache_dir,
        }
    }

    /// Group name, also the URL path segment
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory the images live in
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// File names of the images, sorted
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for a registered group
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Cache directory, `None` if it could not be created at startup
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Whether transcoded artifacts can be stored for this group
    pub fn caching_enabled(&self) -> bool {
        self.cache_dir.is_some()
    }

    /// Full path of a member file
    pub fn member_path(&self, member: &str) -> PathBuf {
        self.source_dir.join(member)
    }

    /// Pick a member uniformly at random
    pub fn pick(&self) -> Option<&str> {
        if self.members.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..self.members.len());
        Some(&self.members[index])
    }
}
