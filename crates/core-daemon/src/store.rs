//! On-disk session store: persists a session's [`ScenarioDocument`] under
//! its workspace directory so `session list`/`create`/`delete` behave
//! sensibly across separate CLI invocations, with no long-lived daemon
//! process required to hold the registry in memory.

use crate::paths::Paths;
use anyhow::{Context, Result};
use core_model::ScenarioDocument;
use std::fs;

pub struct SavedSession {
    pub id: u32,
    pub doc: ScenarioDocument,
}

/// List every session with a persisted document, sorted by id.
pub fn list(paths: &Paths) -> Result<Vec<SavedSession>> {
    let dir = paths.sessions_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut sessions = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(id) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let doc_path = entry.path().join("session.json");
        if !doc_path.exists() {
            continue;
        }
        let contents = fs::read_to_string(&doc_path)
            .with_context(|| format!("reading {}", doc_path.display()))?;
        let doc = ScenarioDocument::from_json(&contents)
            .with_context(|| format!("parsing {}", doc_path.display()))?;
        sessions.push(SavedSession { id, doc });
    }
    sessions.sort_by_key(|s| s.id);
    Ok(sessions)
}

/// Allocate the lowest id with no existing directory and persist a new,
/// empty document for it.
pub fn create(paths: &Paths, name: &str) -> Result<SavedSession> {
    let existing = list(paths)?;
    let mut id = 1;
    for session in &existing {
        if session.id == id {
            id += 1;
        } else {
            break;
        }
    }
    let doc = ScenarioDocument::new(name);
    save(paths, id, &doc)?;
    Ok(SavedSession { id, doc })
}

pub fn save(paths: &Paths, id: u32, doc: &ScenarioDocument) -> Result<()> {
    let workspace = paths.session_workspace(id);
    fs::create_dir_all(&workspace)
        .with_context(|| format!("creating {}", workspace.display()))?;
    let json = doc.to_json().context("serializing scenario document")?;
    fs::write(paths.session_doc_path(id), json)
        .with_context(|| format!("writing {}", paths.session_doc_path(id).display()))?;
    Ok(())
}

/// Remove a session's workspace directory entirely. Returns `false` if it
/// didn't exist.
pub fn delete(paths: &Paths, id: u32) -> Result<bool> {
    let workspace = paths.session_workspace(id);
    if !workspace.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(&workspace)
        .with_context(|| format!("removing {}", workspace.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::Paths;
    use tempfile::tempdir;

    fn test_paths(root: &std::path::Path) -> Paths {
        Paths {
            libdir: root.join("lib"),
            confdir: root.join("conf"),
            data_dir: root.join("data"),
            state_dir: root.join("state"),
        }
    }

    #[test]
    fn create_allocates_lowest_free_id() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        let first = create(&paths, "alpha").unwrap();
        let second = create(&paths, "beta").unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        delete(&paths, 1).unwrap();
        let third = create(&paths, "gamma").unwrap();
        assert_eq!(third.id, 1);
    }

    #[test]
    fn list_is_empty_before_any_session_exists() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        assert!(list(&paths).unwrap().is_empty());
    }

    #[test]
    fn saved_sessions_round_trip() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        create(&paths, "roundtrip").unwrap();
        let sessions = list(&paths).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].doc.name, "roundtrip");
    }

    #[test]
    fn delete_reports_whether_session_existed() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        assert!(!delete(&paths, 42).unwrap());
        create(&paths, "one").unwrap();
        assert!(delete(&paths, 1).unwrap());
    }
}
