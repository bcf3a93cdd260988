//! Source resolver (C6, §4.6). Classifies a query target and decides the
//! physical backing (local cache vs remote) for SQL-based sources.

use curlake_core::Error;
use std::path::{Path, PathBuf};

const SQL_KEYWORDS: &[&str] = &[
    "select", "with", "from", "where", "group", "order", "having", "join",
];

/// Physical backing a SQL-based source will read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    Local,
    Remote,
}

/// The classified query target (§4.6).
#[derive(Debug, Clone)]
pub enum Source {
    /// A single existing columnar file, registered as a one-file table.
    DirectFile { path: PathBuf },
    /// SQL text, either typed inline or loaded from a stored query file,
    /// together with the physical backing chosen for the base table.
    Sql { text: String, backing: Backing },
}

/// Resolves `target` against the accepted columnar/SQL extensions and the
/// configured query-library root.
pub fn resolve(
    target: &str,
    accepted_columnar_extensions: &[&str],
    query_library_root: Option<&Path>,
    force_remote: bool,
    prefer_local: bool,
    cache_usable: bool,
) -> Result<Source, Error> {
    let backing = if force_remote {
        Backing::Remote
    } else if prefer_local && cache_usable {
        Backing::Local
    } else {
        Backing::Remote
    };

    if let Some(ext) = accepted_columnar_extensions
        .iter()
        .find(|ext| target.ends_with(*ext))
    {
        let _ = ext;
        let path = Path::new(target);
        if path.is_file() {
            return Ok(Source::DirectFile { path: path.to_path_buf() });
        }
    }

    if target.ends_with(".sql") {
        if let Some(root) = query_library_root {
            if let Some(path) = safe_join(root, target) {
                if path.is_file() {
                    let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                    return Ok(Source::Sql { text, backing });
                }
            }
        }
    }

    let lowered = target.to_ascii_lowercase();
    if SQL_KEYWORDS.iter().any(|kw| contains_word(&lowered, kw)) {
        return Ok(Source::Sql {
            text: target.to_string(),
            backing,
        });
    }

    Err(Error::validation(
        "invalid_query",
        format!("target {target:?} is neither an existing file nor recognizable SQL"),
    ))
}

/// Joins `target` onto `root`, refusing absolute paths and `..` components
/// so a stored-query target cannot escape the configured library root.
fn safe_join(root: &Path, target: &str) -> Option<PathBuf> {
    let target_path = Path::new(target);
    if target_path.is_absolute() {
        return None;
    }
    if target_path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return None;
    }
    Some(root.join(target_path))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric() && c != '_').any(|tok| tok == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sql_string_is_sql_source() {
        let source = resolve("SELECT * FROM base", &["parquet"], None, false, false, false).unwrap();
        assert!(matches!(source, Source::Sql { backing: Backing::Remote, .. }));
    }

    #[test]
    fn prefer_local_with_usable_cache_chooses_local() {
        let source = resolve("SELECT 1", &["parquet"], None, false, true, true).unwrap();
        assert!(matches!(source, Source::Sql { backing: Backing::Local, .. }));
    }

    #[test]
    fn force_remote_wins_over_prefer_local() {
        let source = resolve("SELECT 1", &["parquet"], None, true, true, true).unwrap();
        assert!(matches!(source, Source::Sql { backing: Backing::Remote, .. }));
    }

    #[test]
    fn direct_file_requires_existing_path() {
        let tmp = tempfile::NamedTempFile::with_suffix(".parquet").unwrap();
        let source = resolve(
            tmp.path().to_str().unwrap(),
            &[".parquet"],
            None,
            false,
            false,
            false,
        )
        .unwrap();
        assert!(matches!(source, Source::DirectFile { .. }));
    }

    #[test]
    fn unrecognizable_target_is_invalid() {
        assert!(resolve("not-a-query-at-all", &["parquet"], None, false, false, false).is_err());
    }

    #[test]
    fn stored_query_target_cannot_escape_library_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let outside = tempfile::NamedTempFile::with_suffix(".sql").unwrap();
        std::fs::write(outside.path(), "SELECT 1").unwrap();

        let absolute_target = outside.path().to_str().unwrap();
        assert!(safe_join(root, absolute_target).is_none());

        let traversal_target = "../escape.sql";
        assert!(safe_join(root, traversal_target).is_none());
    }
}
