//! Registry scan options

/// Default minimum number of images a directory needs to become a group
pub const DEFAULT_MIN_IMAGES: usize = 2;

/// Default name of the per-group cache directory
pub const DEFAULT_CACHE_DIR_NAME: &str = ".oneanime";

/// Options controlling the startup scan
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directories with fewer recognized images are dropped
    pub min_images: usize,

    /// Cache subdirectory created inside each group directory
    pub cache_dir_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            min_images: DEFAULT_MIN_IMAGES,
            cache_dir_name: DEFAULT_CACHE_DIR_NAME.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Set the minimum group size (at least 1)
    pub fn min_images(mut self, min: usize) -> Self {
        self.min_images = min.max(1);
        self
    }

    /// Set the cache directory name
    pub fn cache_dir_name(mut self, name: impl Into<String>) -> Self {
        self.cache_dir_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.min_images, 2);
        assert_eq!(config.cache_dir_name, ".oneanime");
    }

    #[test]
    fn test_min_images_floor() {
        let config = RegistryConfig::default().min_images(0);

        assert_eq!(config.min_images, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .min_images(5)
            .cache_dir_name(".cache");

        assert_eq!(config.min_images, 5);
        assert_eq!(config.cache_dir_name, ".cache");
    }
}
