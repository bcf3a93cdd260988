//! View manifest parsing (C9, §4.9, §6). Accepts either a single declarative
//! YAML document or a directory tree whose children are level-numbered
//! subdirectories of view SQL files.

use curlake_core::Error;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A named SQL artifact plus its declared dependency set (§3: View definition).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: String,
    pub sql: String,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub views: Vec<ViewDefinition>,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    views: Vec<ManifestView>,
}

#[derive(Debug, Deserialize)]
struct ManifestView {
    name: String,
    sql: String,
    #[serde(default)]
    depends_on: Vec<String>,
}

impl Manifest {
    /// Parses the declarative document representation (§6 form (a)).
    pub fn from_document(text: &str) -> Result<Self, Error> {
        let doc: ManifestDocument =
            serde_yaml::from_str(text).map_err(|e| Error::InvalidManifest(format!("could not parse manifest: {e}")))?;
        let views = doc
            .views
            .into_iter()
            .map(|v| ViewDefinition {
                name: v.name,
                sql: v.sql,
                depends_on: v.depends_on,
            })
            .collect();
        Ok(Manifest { views })
    }

    /// Parses the directory-of-levels convention (§6 form (b)): subdirectory
    /// names are level numbers; a view's dependencies are the union of every
    /// view name declared at a strictly lower level, plus the base table.
    pub fn from_directory(root: &Path, base_table: &str) -> Result<Self, Error> {
        let mut level_dirs: Vec<(u32, std::path::PathBuf)> = Vec::new();
        let entries = std::fs::read_dir(root).map_err(|e| Error::io(root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Ok(level) = name.parse::<u32>() {
                level_dirs.push((level, entry.path()));
            }
        }
        level_dirs.sort_by_key(|(level, _)| *level);

        let mut views = Vec::new();
        let mut names_so_far: Vec<String> = vec![base_table.to_string()];
        for (_, dir) in level_dirs {
            let mut names_this_level = Vec::new();
            let dir_entries = std::fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))?;
            let mut files: Vec<std::path::PathBuf> = dir_entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().map(|ext| ext == "sql").unwrap_or(false))
                .collect();
            files.sort();
            for file in files {
                let name = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .ok_or_else(|| Error::InvalidManifest(format!("unreadable view file name: {}", file.display())))?;
                let sql = std::fs::read_to_string(&file).map_err(|e| Error::io(&file, e))?;
                views.push(ViewDefinition {
                    name: name.clone(),
                    sql,
                    depends_on: names_so_far.clone(),
                });
                names_this_level.push(name);
            }
            names_so_far.extend(names_this_level);
        }
        Ok(Manifest { views })
    }

    /// Computes a dependency-level grouping (§4.9 step 3): the base table is
    /// level 0; each view's level is one more than the maximum level among
    /// its dependencies. Returns `InvalidManifest` naming the cyclic views
    /// if the dependency graph is not a DAG.
    pub fn levels(&self, base_table: &str) -> Result<Vec<Vec<&ViewDefinition>>, Error> {
        let by_name: HashMap<&str, &ViewDefinition> = self.views.iter().map(|v| (v.name.as_str(), v)).collect();
        let mut resolved: HashMap<&str, u32> = HashMap::new();
        resolved.insert(base_table, 0);

        let mut remaining: HashSet<&str> = by_name.keys().copied().collect();
        let mut progress = true;
        while !remaining.is_empty() && progress {
            progress = false;
            let mut newly_resolved = Vec::new();
            for &name in &remaining {
                let view = by_name[name];
                if view.depends_on.iter().all(|dep| resolved.contains_key(dep.as_str())) {
                    let level = view
                        .depends_on
                        .iter()
                        .map(|dep| resolved.get(dep.as_str()).copied().unwrap_or(0))
                        .max()
                        .unwrap_or(0)
                        + 1;
                    newly_resolved.push((name, level));
                }
            }
            for (name, level) in newly_resolved {
                resolved.insert(name, level);
                remaining.remove(name);
                progress = true;
            }
        }

        if !remaining.is_empty() {
            let mut cyclic: Vec<&str> = remaining.into_iter().collect();
            cyclic.sort();
            return Err(Error::InvalidManifest(format!(
                "dependency cycle detected among views: {}",
                cyclic.join(", ")
            )));
        }

        let max_level = resolved.values().copied().max().unwrap_or(0);
        let mut levels: Vec<Vec<&ViewDefinition>> = vec![Vec::new(); max_level as usize + 1];
        for view in &self.views {
            let level = resolved[view.name.as_str()];
            levels[level as usize].push(view);
        }
        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str, deps: &[&str]) -> ViewDefinition {
        ViewDefinition {
            name: name.to_string(),
            sql: format!("SELECT * FROM {}", deps.first().unwrap_or(&"base")),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn parses_document_form() {
        let text = r#"
views:
  - name: monthly_spend
    sql: "SELECT 1"
    depends_on: [base]
  - name: monthly_spend_by_service
    sql: "SELECT 2"
    depends_on: [monthly_spend]
"#;
        let manifest = Manifest::from_document(text).unwrap();
        assert_eq!(manifest.views.len(), 2);
        assert_eq!(manifest.views[1].depends_on, vec!["monthly_spend"]);
    }

    #[test]
    fn levels_groups_by_dependency_depth() {
        let manifest = Manifest {
            views: vec![view("a", &["base"]), view("b", &["a"]), view("c", &["base"])],
        };
        let levels = manifest.levels("base").unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[1].len(), 2);
        assert_eq!(levels[2][0].name, "b");
    }

    #[test]
    fn cycle_is_rejected() {
        let manifest = Manifest {
            views: vec![view("a", &["b"]), view("b", &["a"])],
        };
        let err = manifest.levels("base").unwrap_err();
        match err {
            Error::InvalidManifest(msg) => {
                assert!(msg.contains('a'));
                assert!(msg.contains('b'));
            }
            other => panic!("expected InvalidManifest, got {other:?}"),
        }
    }

    #[test]
    fn directory_convention_depends_on_all_lower_levels() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("0")).unwrap();
        std::fs::create_dir_all(tmp.path().join("1")).unwrap();
        std::fs::write(tmp.path().join("0/monthly_spend.sql"), "SELECT 1").unwrap();
        std::fs::write(tmp.path().join("1/monthly_spend_by_service.sql"), "SELECT 2").unwrap();

        let manifest = Manifest::from_directory(tmp.path(), "base").unwrap();
        assert_eq!(manifest.views.len(), 2);
        let level1 = manifest
            .views
            .iter()
            .find(|v| v.name == "monthly_spend_by_service")
            .unwrap();
        assert_eq!(level1.depends_on, vec!["base".to_string(), "monthly_spend".to_string()]);
    }
}
