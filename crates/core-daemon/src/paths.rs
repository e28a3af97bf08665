//! Control paths (§6): `LIBDIR`, `CONFDIR`, `CORE_DATA_DIR`, `CORE_STATE_DIR`
//! override built-in defaults when present in the environment.

use std::path::PathBuf;

/// Resolved filesystem layout for this invocation of the daemon/CLI.
#[derive(Clone, Debug)]
pub struct Paths {
    pub libdir: PathBuf,
    pub confdir: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Paths {
    pub fn from_env() -> Self {
        Self {
            libdir: env_or("LIBDIR", "/usr/local/lib/core"),
            confdir: env_or("CONFDIR", "/etc/core"),
            data_dir: env_or("CORE_DATA_DIR", "/usr/local/share/core"),
            state_dir: env_or("CORE_STATE_DIR", "/var/local/core"),
        }
    }

    /// Directory holding one subdirectory per saved session.
    pub fn sessions_dir(&self) -> PathBuf {
        self.state_dir.join("sessions")
    }

    /// A session's own workspace directory: rendered service files, logs,
    /// per-service state, and the `nodes` pty-mapping file live here.
    pub fn session_workspace(&self, session_id: u32) -> PathBuf {
        self.sessions_dir().join(session_id.to_string())
    }

    pub fn session_doc_path(&self, session_id: u32) -> PathBuf {
        self.session_workspace(session_id).join("session.json")
    }

    pub fn nodes_file(&self, session_id: u32) -> PathBuf {
        self.session_workspace(session_id).join("nodes")
    }
}

fn env_or(var: &str, default: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        std::env::remove_var("CORE_STATE_DIR");
        let paths = Paths::from_env();
        assert_eq!(paths.state_dir, PathBuf::from("/var/local/core"));
        assert_eq!(paths.sessions_dir(), PathBuf::from("/var/local/core/sessions"));
    }

    #[test]
    fn session_paths_are_scoped_by_id() {
        let paths = Paths { state_dir: PathBuf::from("/tmp/core-state"), ..Paths::from_env() };
        assert_eq!(paths.session_workspace(7), PathBuf::from("/tmp/core-state/sessions/7"));
        assert_eq!(paths.session_doc_path(7), PathBuf::from("/tmp/core-state/sessions/7/session.json"));
    }
}
