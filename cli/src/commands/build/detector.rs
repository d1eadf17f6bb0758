//! # unibuild Project Detector
//!
//! File: cli/src/commands/build/detector.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Walks a directory tree and scores every directory against the language
//! registry. A directory is a project when at least one language produces a
//! candidate:
//!
//! - **Marker** candidate: one of the language's `project_files` sits directly in
//!   the directory. Confidence `global.marker_confidence` (0.9).
//! - **Pattern** candidate: at least `global.min_pattern_files` (3) regular files
//!   in the directory end with one of the language's source suffixes.
//!   Confidence `global.pattern_confidence` (0.6).
//!
//! The highest-confidence candidate becomes the project's language. Ties keep
//! registry order (languages sorted by id, markers before patterns). All
//! candidates are kept on the `DetectedProject` for reporting.
//!
//! ## Architecture
//!
//! - `ProjectDetector::detect` returns a lazy iterator over the tree. Directories
//!   named in `global.exclude_dirs` (e.g. `node_modules`, `.git`) are pruned by
//!   name and never descended into.
//! - `ProjectDetector::score` is the pure scoring step over a list of file names.
//! - Nested projects are reported independently; there is no deduplication.
//!
//! ## Examples
//!
//! ```rust
//! let detector = ProjectDetector::new(&registry);
//! for project in detector.detect(Path::new(".")) {
//!     println!("{} ({})", project.name, project.language);
//! }
//! ```
//!
use super::registry::LanguageRegistry;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One language's claim on a directory.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Candidate {
    pub language: String,
    pub confidence: f64,
    pub reason: String,
}

/// A directory recognised as a project.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DetectedProject {
    pub path: PathBuf,
    /// Directory basename.
    pub name: String,
    /// Language of the highest-confidence candidate.
    pub language: String,
    pub confidence: f64,
    /// Every candidate, highest confidence first.
    pub detected_languages: Vec<Candidate>,
}

pub struct ProjectDetector<'a> {
    registry: &'a LanguageRegistry,
}

impl<'a> ProjectDetector<'a> {
    pub fn new(registry: &'a LanguageRegistry) -> Self {
        ProjectDetector { registry }
    }

    /// Lazily yields every project under (and including) `root`, depth-first
    /// with siblings in file name order.
    ///
    /// `root` is canonicalized when possible so reported paths are absolute.
    /// Unreadable entries are logged and skipped.
    pub fn detect(&self, root: &Path) -> impl Iterator<Item = DetectedProject> + 'a {
        let root = fs::canonicalize(root).unwrap_or_else(|e| {
            warn!("Could not canonicalize {}: {}", root.display(), e);
            root.to_path_buf()
        });
        let registry = self.registry;
        let detector = ProjectDetector { registry };

        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !is_excluded(entry, &registry.global().exclude_dirs))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable path during detection: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(move |entry| detector.analyze_directory(entry.path()))
    }

    /// Scores a single directory using the regular files directly inside it.
    pub fn analyze_directory(&self, directory: &Path) -> Option<DetectedProject> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", directory.display(), e);
                return None;
            }
        };
        let mut file_names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        file_names.sort();

        let candidates = self.score(&file_names);
        let primary = candidates.first()?.clone();
        let name = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| directory.display().to_string());
        debug!(
            "{} -> {} ({:.0}%), {} candidate(s)",
            directory.display(),
            primary.language,
            primary.confidence * 100.0,
            candidates.len()
        );

        Some(DetectedProject {
            path: directory.to_path_buf(),
            name,
            language: primary.language,
            confidence: primary.confidence,
            detected_languages: candidates,
        })
    }

    /// Produces all candidates for a directory containing `file_names`,
    /// highest confidence first.
    pub fn score(&self, file_names: &[String]) -> Vec<Candidate> {
        let global = self.registry.global();
        let mut candidates = Vec::new();

        for lang in self.registry.languages() {
            let found: Vec<&str> = lang
                .project_files
                .iter()
                .filter(|pf| file_names.contains(pf))
                .map(String::as_str)
                .collect();
            if !found.is_empty() {
                candidates.push(Candidate {
                    language: lang.id.clone(),
                    confidence: global.marker_confidence,
                    reason: format!("Found project files: {}", found.join(", ")),
                });
            }
        }

        for lang in self.registry.languages() {
            let suffixes: Vec<String> = lang.suffixes().collect();
            let matching = file_names
                .iter()
                .filter(|name| suffixes.iter().any(|s| name.ends_with(s.as_str())))
                .count();
            if matching > 0 && matching >= global.min_pattern_files {
                candidates.push(Candidate {
                    language: lang.id.clone(),
                    confidence: global.pattern_confidence,
                    reason: format!("Found {} source files", matching),
                });
            }
        }

        // Stable: equal confidences keep registry order.
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }
}

fn is_excluded(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && exclude_dirs
            .iter()
            .any(|d| entry.file_name().to_string_lossy() == d.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config;
    use tempfile::tempdir;

    const REGISTRY: &str = r#"
        [languages.javascript]
        project_files = ["package.json"]
        file_patterns = ["*.js", "*.mjs"]

        [languages.python]
        project_files = ["pyproject.toml", "setup.py"]
        file_patterns = ["*.py"]

        [languages.rust]
        project_files = ["Cargo.toml"]
        file_patterns = ["*.rs"]
    "#;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::from_file(config::parse_registry(REGISTRY).unwrap())
    }

    fn names(files: &[&str]) -> Vec<String> {
        files.iter().map(|s| s.to_string()).collect()
    }

    fn touch(dir: &Path, files: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for f in files {
            fs::write(dir.join(f), "").unwrap();
        }
    }

    #[test]
    fn test_two_source_files_are_not_a_project() {
        let registry = registry();
        let detector = ProjectDetector::new(&registry);
        assert!(detector.score(&names(&["a.py", "b.py"])).is_empty());
    }

    #[test]
    fn test_three_source_files_are_a_pattern_candidate() {
        let registry = registry();
        let detector = ProjectDetector::new(&registry);
        let candidates = detector.score(&names(&["a.py", "b.py", "c.py", "README.md"]));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].language, "python");
        assert_eq!(candidates[0].confidence, 0.6);
        assert_eq!(candidates[0].reason, "Found 3 source files");
    }

    #[test]
    fn test_marker_wins_regardless_of_source_count() {
        let registry = registry();
        let detector = ProjectDetector::new(&registry);
        let candidates = detector.score(&names(&["Cargo.toml"]));
        assert_eq!(candidates[0].language, "rust");
        assert_eq!(candidates[0].confidence, 0.9);

        // Many JS files do not outrank a single marker.
        let candidates = detector.score(&names(&[
            "Cargo.toml", "a.js", "b.js", "c.js", "d.mjs",
        ]));
        assert_eq!(candidates[0].language, "rust");
        assert_eq!(candidates[0].confidence, 0.9);
        assert_eq!(candidates[1].language, "javascript");
        assert_eq!(candidates[1].reason, "Found 4 source files");
    }

    #[test]
    fn test_equal_confidence_keeps_registry_order() {
        let registry = registry();
        let detector = ProjectDetector::new(&registry);
        let candidates = detector.score(&names(&["setup.py", "package.json"]));
        let langs: Vec<_> = candidates.iter().map(|c| c.language.as_str()).collect();
        assert_eq!(langs, vec!["javascript", "python"]);
    }

    #[test]
    fn test_detect_walks_tree_and_prunes_noise() {
        let root = tempdir().unwrap();
        touch(&root.path().join("api"), &["Cargo.toml"]);
        touch(&root.path().join("web"), &["package.json"]);
        touch(&root.path().join("web/node_modules/dep"), &["package.json"]);
        touch(&root.path().join("scripts"), &["a.py", "b.py"]);
        touch(&root.path().join("tools"), &["a.py", "b.py", "c.py"]);

        let registry = registry();
        let detector = ProjectDetector::new(&registry);
        let mut found: Vec<_> = detector
            .detect(root.path())
            .map(|p| (p.name, p.language, p.confidence))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            found,
            vec![
                ("api".to_string(), "rust".to_string(), 0.9),
                ("tools".to_string(), "python".to_string(), 0.6),
                ("web".to_string(), "javascript".to_string(), 0.9),
            ]
        );
    }

    #[test]
    fn test_detect_includes_root_and_nested_projects() {
        let root = tempdir().unwrap();
        touch(root.path(), &["Cargo.toml"]);
        touch(&root.path().join("crates/inner"), &["Cargo.toml"]);

        let registry = registry();
        let detector = ProjectDetector::new(&registry);
        let projects: Vec<_> = detector.detect(root.path()).collect();
        assert_eq!(projects.len(), 2);
        assert!(projects.iter().all(|p| p.path.is_absolute()));
    }

    #[test]
    fn test_detect_order_is_sorted_by_path() {
        let root = tempdir().unwrap();
        for dir in ["zeta", "alpha", "mid", "alpha/nested", "beta"] {
            touch(&root.path().join(dir), &["Cargo.toml"]);
        }

        let registry = registry();
        let detector = ProjectDetector::new(&registry);
        let names: Vec<_> = detector.detect(root.path()).map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha", "nested", "beta", "mid", "zeta"]);
    }

    #[test]
    fn test_empty_registry_detects_nothing() {
        let root = tempdir().unwrap();
        touch(root.path(), &["Cargo.toml"]);
        let registry = LanguageRegistry::default();
        assert_eq!(ProjectDetector::new(&registry).detect(root.path()).count(), 0);
    }
}
