//! Which file names are worth uploading.

use std::path::Path;

const IGNORED_NAMES: &[&str] = &[".DS_Store", "Thumbs.db"];
/// Compared case-insensitively, without the dot.
const IGNORED_EXTENSIONS: &[&str] = &["pyc", "log", "tmp"];
const IGNORED_PREFIXES: &[&str] = &["__pycache__", "."];

/// Rejects editor droppings, bytecode caches, logs and hidden files.
///
/// Hidden files include the completion sentinel `.done`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreFilter;

impl IgnoreFilter {
    pub fn is_ignored(&self, file_name: &str) -> bool {
        if file_name.is_empty() || IGNORED_NAMES.contains(&file_name) {
            return true;
        }
        if IGNORED_PREFIXES.iter().any(|p| file_name.starts_with(p)) {
            return true;
        }
        match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => IGNORED_EXTENSIONS
                .iter()
                .any(|ignored| ext.eq_ignore_ascii_case(ignored)),
            None => false,
        }
    }

    /// Check a full path by its final component. Paths without a UTF-8 file
    /// name are ignored.
    pub fn is_ignored_path(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.is_ignored(name),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_exact_names() {
        let f = IgnoreFilter;
        assert!(f.is_ignored(".DS_Store"));
        assert!(f.is_ignored("Thumbs.db"));
        assert!(!f.is_ignored("thumbs.db.png"));
    }

    #[test]
    fn ignores_extensions_in_any_case() {
        let f = IgnoreFilter;
        for name in ["mod.pyc", "run.log", "scratch.tmp", "RUN.LOG", "x.Tmp"] {
            assert!(f.is_ignored(name), "{name}");
        }
        assert!(!f.is_ignored("catalog.txt"));
        assert!(!f.is_ignored("log"));
    }

    #[test]
    fn ignores_prefixes() {
        let f = IgnoreFilter;
        assert!(f.is_ignored("__pycache__"));
        assert!(f.is_ignored("__pycache__x.png"));
        assert!(f.is_ignored(".done"));
        assert!(f.is_ignored(".env"));
    }

    #[test]
    fn accepts_ordinary_artifacts() {
        let f = IgnoreFilter;
        for name in ["chart.png", "report.pdf", "data.tar.gz", "README", "out_1.csv"] {
            assert!(!f.is_ignored(name), "{name}");
        }
    }

    #[test]
    fn is_total_and_deterministic() {
        let f = IgnoreFilter;
        let names = ["", "a", ".", "..", "a.", "a.b.c", "ß.png", "__", "x.PYC"];
        for name in names {
            assert_eq!(f.is_ignored(name), f.is_ignored(name), "{name}");
        }
        assert!(f.is_ignored(""));
    }

    #[test]
    fn path_uses_file_name() {
        let f = IgnoreFilter;
        assert!(f.is_ignored_path(Path::new("/app/.done")));
        assert!(!f.is_ignored_path(Path::new("/app/plot.png")));
        assert!(f.is_ignored_path(Path::new("/")));
    }
}
