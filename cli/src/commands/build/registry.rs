//! # unibuild Language Registry
//!
//! File: cli/src/commands/build/registry.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Turns the raw `RegistryFile` read by `core::config` into the immutable
//! `LanguageRegistry` consumed by the detector and the orchestrator. Each
//! language is resolved here, once, into a `LanguageSpec` that also carries its
//! pre-build `LanguageHook`, so nothing downstream has to dispatch on language
//! name strings.
//!
//! The registry is shared read-only between build workers behind an `Arc`.
//!
use super::hooks::LanguageHook;
use crate::core::config::{self, GlobalConfig, RegistryFile};
use std::collections::BTreeMap;
use tracing::debug;

/// Detection signals and commands for one language.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageSpec {
    pub id: String,
    /// Definitive marker file names, in registry order.
    pub project_files: Vec<String>,
    /// Weak source suffix patterns, in registry order.
    pub file_patterns: Vec<String>,
    commands: BTreeMap<String, String>,
    pub hook: LanguageHook,
}

impl LanguageSpec {
    /// The command template for `operation`, or `None` if it is missing or blank.
    pub fn command(&self, operation: &str) -> Option<&str> {
        self.commands
            .get(operation)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// File name suffixes derived from `file_patterns` (`*.py` -> `.py`).
    pub fn suffixes(&self) -> impl Iterator<Item = String> + '_ {
        self.file_patterns
            .iter()
            .map(|p| p.replace('*', ""))
            .filter(|s| !s.is_empty())
    }
}

/// All known languages plus the orchestration settings they were loaded with.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    global: GlobalConfig,
    languages: Vec<LanguageSpec>,
}

impl LanguageRegistry {
    /// Loads the registry file (see `config::load_registry_file` for the search
    /// order). Never fails; a broken file yields an empty registry.
    pub fn load(explicit: Option<&str>) -> Self {
        Self::from_file(config::load_registry_file(explicit))
    }

    pub fn from_file(file: RegistryFile) -> Self {
        let languages = file
            .languages
            .into_iter()
            .map(|(id, entry)| {
                let hook = LanguageHook::for_language(&id);
                debug!("Registered language '{}' with {:?} hook", id, hook);
                LanguageSpec {
                    id,
                    project_files: entry.project_files,
                    file_patterns: entry.file_patterns,
                    commands: entry.commands,
                    hook,
                }
            })
            .collect();
        LanguageRegistry {
            global: file.global,
            languages,
        }
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// Mutable settings, used to apply command-line overrides after loading.
    pub fn global_mut(&mut self) -> &mut GlobalConfig {
        &mut self.global
    }

    /// Languages ordered by id.
    pub fn languages(&self) -> &[LanguageSpec] {
        &self.languages
    }

    pub fn get(&self, id: &str) -> Option<&LanguageSpec> {
        self.languages.iter().find(|l| l.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"
        [languages.python]
        project_files = ["pyproject.toml", "requirements.txt"]
        file_patterns = ["*.py"]
        [languages.python.commands]
        install = "pip install -r requirements.txt"
        lint = "   "

        [languages.go]
        project_files = ["go.mod"]
        file_patterns = ["*.go"]
    "#;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::from_file(config::parse_registry(REGISTRY).unwrap())
    }

    #[test]
    fn test_languages_are_ordered_by_id() {
        let ids: Vec<_> = registry().languages().iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, vec!["go", "python"]);
    }

    #[test]
    fn test_hooks_are_resolved_at_load() {
        let registry = registry();
        assert_eq!(registry.get("python").unwrap().hook, LanguageHook::Python);
        assert_eq!(registry.get("go").unwrap().hook, LanguageHook::Go);
    }

    #[test]
    fn test_blank_commands_are_absent() {
        let registry = registry();
        let python = registry.get("python").unwrap();
        assert_eq!(
            python.command("install"),
            Some("pip install -r requirements.txt")
        );
        assert_eq!(python.command("lint"), None);
        assert_eq!(python.command("package"), None);
    }

    #[test]
    fn test_suffixes_strip_wildcards() {
        let registry = registry();
        let suffixes: Vec<_> = registry.get("go").unwrap().suffixes().collect();
        assert_eq!(suffixes, vec![".go"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = LanguageRegistry::from_file(RegistryFile::default());
        assert!(registry.is_empty());
        assert!(registry.get("rust").is_none());
    }
}
