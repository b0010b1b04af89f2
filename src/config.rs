use std::path::PathBuf;

use crate::fonts::{BUILTIN_FAMILY, FontBook};
use crate::model::EmbeddedFont;

/// How pages are fanned out to workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParallelMode {
    #[default]
    Sequential,
    /// Contiguous page chunks, each serialized and rendered by an isolated worker.
    Chunked { workers: usize },
    /// One surface per page, rendered concurrently over the shared layout.
    Threaded { workers: usize },
}

impl ParallelMode {
    pub fn workers(&self) -> usize {
        match self {
            ParallelMode::Sequential => 1,
            ParallelMode::Chunked { workers } | ParallelMode::Threaded { workers } => (*workers).max(1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypesetConfig {
    pub default_family: String,
    pub font_dirs: Vec<PathBuf>,
    pub scan_system_fonts: bool,
    pub parallel: ParallelMode,
    pub min_row_height: f32,
    pub tab_interval: f32,
    /// Pairwise kerning when a run does not say otherwise.
    pub kerning: bool,
}

impl Default for TypesetConfig {
    fn default() -> Self {
        Self {
            default_family: BUILTIN_FAMILY.to_string(),
            font_dirs: Vec::new(),
            scan_system_fonts: true,
            parallel: ParallelMode::Sequential,
            min_row_height: 12.0,
            tab_interval: 36.0, // 0.5 inches
            kerning: true,
        }
    }
}

impl TypesetConfig {
    /// Defaults plus `DOCXIDE_NO_FONT_SCAN` and `DOCXIDE_DEFAULT_FONT`.
    /// `DOCXIDE_FONTS` is read by the font scanner itself.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = std::env::var("DOCXIDE_NO_FONT_SCAN")
            && !matches!(val.trim(), "" | "0" | "false")
        {
            config.scan_system_fonts = false;
        }
        if let Ok(family) = std::env::var("DOCXIDE_DEFAULT_FONT")
            && !family.trim().is_empty()
        {
            config.default_family = family.trim().to_string();
        }
        config
    }

    /// Deterministic configuration: builtin metrics only.
    pub fn builtin() -> Self {
        Self {
            scan_system_fonts: false,
            ..Self::default()
        }
    }

    pub fn with_parallel(mut self, parallel: ParallelMode) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn font_book(&self, embedded: &[EmbeddedFont]) -> FontBook {
        let book = if self.scan_system_fonts {
            FontBook::system(&self.default_family, self.font_dirs.clone())
        } else if !self.font_dirs.is_empty() {
            FontBook::from_dirs(&self.default_family, self.font_dirs.clone())
        } else {
            FontBook::builtin()
        };
        book.with_embedded(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_at_least_one() {
        assert_eq!(ParallelMode::Chunked { workers: 0 }.workers(), 1);
        assert_eq!(ParallelMode::Threaded { workers: 4 }.workers(), 4);
        assert_eq!(ParallelMode::Sequential.workers(), 1);
    }

    #[test]
    fn builtin_config_never_scans() {
        let config = TypesetConfig::builtin();
        assert!(!config.scan_system_fonts);
        assert!(config.font_book(&[]).resolve("Arial", false, false).is_builtin());
    }
}
