//! Command implementations backing the `core-daemon` CLI (§10.6): running
//! a session end to end, managing saved session documents, and validating
//! a scenario file without running it.

use crate::paths::Paths;
use crate::store;
use anyhow::{bail, Context, Result};
use core_engine::{SessionFsm, SessionRegistry};
use core_model::{ScenarioDocument, SessionState};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Drive a freshly created session through its full lifecycle: load an
/// optional scenario document, transition to `Runtime`, wait for either
/// `duration` to elapse or Ctrl-C, then tear down to `Shutdown`.
pub async fn cmd_run(paths: &Paths, scenario: Option<&Path>, duration: Option<u64>) -> Result<()> {
    let mut registry = SessionRegistry::new();
    let session_id = 1;
    let workspace = paths.session_workspace(session_id);
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("creating {}", workspace.display()))?;
    let handle = registry.create(session_id, workspace.display().to_string());

    if let Some(scenario_path) = scenario {
        let doc = load_scenario(scenario_path)?;
        info!(name = %doc.name, nodes = doc.nodes.len(), links = doc.links.len(), "loaded scenario");
        for node_doc in &doc.nodes {
            let mut node = core_model::Node::new(node_doc.id, node_doc.name.clone(), node_doc.node_type)
                .with_position(node_doc.position);
            if let Some(geo) = node_doc.geo {
                node = node.with_geo(geo);
            }
            handle.add_node(node).await?;
        }
        for link_doc in &doc.links {
            let mut link = core_model::Link::new(link_doc.id, link_doc.link_type, link_doc.node1, link_doc.node2);
            link.network_id = link_doc.network_id;
            link.options = link_doc.options;
            link.reverse_options = link_doc.reverse_options;
            handle.add_link(link).await?;
        }
    }

    for target in [
        SessionState::Configuration,
        SessionState::Instantiation,
        SessionState::Runtime,
    ] {
        handle.transition(target).await?;
        info!(session = session_id, state = ?target, "session transitioned");
    }

    match duration {
        Some(secs) => {
            info!(seconds = secs, "running for a fixed duration");
            sleep(Duration::from_secs(secs)).await;
        }
        None => {
            info!("running until interrupted; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
        }
    }

    for target in [SessionState::Datacollect, SessionState::Shutdown] {
        handle.transition(target).await?;
        info!(session = session_id, state = ?target, "session transitioned");
    }
    handle.shutdown().await?;
    Ok(())
}

pub fn cmd_session_list(paths: &Paths) -> Result<()> {
    let sessions = store::list(paths)?;
    if sessions.is_empty() {
        println!("no saved sessions");
        return Ok(());
    }
    println!("{:<6} {:<20} {:>6} {:>6}", "ID", "NAME", "NODES", "LINKS");
    for session in sessions {
        println!(
            "{:<6} {:<20} {:>6} {:>6}",
            session.id,
            session.doc.name,
            session.doc.nodes.len(),
            session.doc.links.len()
        );
    }
    Ok(())
}

pub fn cmd_session_create(paths: &Paths, name: &str) -> Result<()> {
    let saved = store::create(paths, name)?;
    println!("created session {} ({})", saved.id, saved.doc.name);
    Ok(())
}

pub fn cmd_session_delete(paths: &Paths, id: u32) -> Result<()> {
    if store::delete(paths, id)? {
        println!("deleted session {id}");
        Ok(())
    } else {
        bail!("no saved session with id {id}")
    }
}

/// Parse and validate a scenario file without instantiating anything,
/// exercising the same FSM rules a real run would hit immediately on
/// entering `Configuration`.
pub async fn cmd_scenario_open(path: &Path) -> Result<()> {
    let doc = load_scenario(path)?;
    let mut session = doc.to_session(0, "/dev/null");
    SessionFsm::validate_transition(&mut session, SessionState::Configuration)
        .context("scenario failed validation on entering Configuration")?;
    println!(
        "scenario '{}': {} node(s), {} link(s), valid",
        doc.name,
        doc.nodes.len(),
        doc.links.len()
    );
    Ok(())
}

fn load_scenario(path: &Path) -> Result<ScenarioDocument> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    ScenarioDocument::from_json(&contents).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_paths(root: &Path) -> Paths {
        Paths {
            libdir: root.join("lib"),
            confdir: root.join("conf"),
            data_dir: root.join("data"),
            state_dir: root.join("state"),
        }
    }

    #[test]
    fn session_lifecycle_create_list_delete() {
        let dir = tempdir().unwrap();
        let paths = test_paths(dir.path());
        cmd_session_create(&paths, "demo").unwrap();
        cmd_session_list(&paths).unwrap();
        cmd_session_delete(&paths, 1).unwrap();
        assert!(cmd_session_delete(&paths, 1).is_err());
    }

    #[tokio::test]
    async fn scenario_open_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(cmd_scenario_open(&path).await.is_err());
    }

    #[tokio::test]
    async fn scenario_open_accepts_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let doc = ScenarioDocument::new("empty");
        std::fs::write(&path, doc.to_json().unwrap()).unwrap();
        cmd_scenario_open(&path).await.unwrap();
    }
}
