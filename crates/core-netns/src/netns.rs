//! Network namespace management (§4.2).
//!
//! Every network node (§wire::NodeType::is_network_node) gets exactly one
//! namespace, created and torn down via the `/var/run/netns/<name>`
//! convention so that it's also visible to `ip netns` for debugging. The
//! same convention lets [`Manager::exec`] and [`Manager::open_terminal`]
//! reach a node's namespace through `ip netns exec` rather than a
//! separate in-namespace command-server process.

use nix::mount::{mount, umount, MsFlags};
use nix::pty::openpty;
use nix::sched::{setns, CloneFlags};
use nix::unistd::getpid;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum NetNsError {
    #[error("Failed to create netns directory: {0}")]
    CreateDir(std::io::Error),
    
    #[error("Failed to create netns file: {0}")]
    CreateFile(std::io::Error),
    
    #[error("Failed to mount namespace: {0}")]
    Mount(nix::Error),
    
    #[error("Failed to enter namespace: {0}")]
    SetNs(nix::Error),
    
    #[error("Failed to open namespace file: {0}")]
    OpenNs(std::io::Error),
    
    #[error("Namespace '{0}' not found")]
    NotFound(String),
    
    #[error("Namespace '{0}' already exists")]
    AlreadyExists(String),
    
    #[error("Insufficient permissions (CAP_NET_ADMIN required)")]
    Permission,

    #[error("exec in namespace failed: {0}")]
    Exec(std::io::Error),

    #[error("pty allocation failed: {0}")]
    Pty(nix::Error),
}

/// Captured output of a non-interactive [`Manager::exec`] call.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub rc: i32,
}

/// An interactive shell opened in a node's namespace via
/// [`Manager::open_terminal`]. `master` is the PTY end the caller reads
/// from and writes to; `child` is the `ip netns exec <ns> <shell>`
/// process attached to the slave end.
pub struct TerminalHandle {
    pub master: OwnedFd,
    pub child: tokio::process::Child,
}

/// Network namespace manager
pub struct Manager {
    /// Map of namespace name to file descriptor
    namespaces: HashMap<String, File>,
    /// Base directory for namespace files
    base_dir: PathBuf,
}

impl Manager {
    /// Create a new namespace manager
    pub fn new() -> Result<Self, NetNsError> {
        let base_dir = PathBuf::from("/var/run/netns");
        
        // Ensure the base directory exists
        std::fs::create_dir_all(&base_dir)
            .map_err(NetNsError::CreateDir)?;
            
        Ok(Self {
            namespaces: HashMap::new(),
            base_dir,
        })
    }

    /// Create a new network namespace
    pub async fn create_namespace(&mut self, name: &str) -> Result<(), NetNsError> {
        if self.namespaces.contains_key(name) {
            return Err(NetNsError::AlreadyExists(name.to_string()));
        }

        let ns_path = self.base_dir.join(name);
        
        // Check if namespace file already exists
        if ns_path.exists() {
            return Err(NetNsError::AlreadyExists(name.to_string()));
        }

        debug!("Creating namespace: {}", name);

        // Create an empty file for the namespace
        fs::File::create(&ns_path)
            .await
            .map_err(NetNsError::CreateFile)?;

        // Get current process network namespace
        let current_ns_path = format!("/proc/{}/ns/net", getpid());
        
        // Bind mount current netns to the new file
        mount(
            Some(current_ns_path.as_str()),
            &ns_path,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(NetNsError::Mount)?;

        // Create a new network namespace by unsharing
        let clone_flags = CloneFlags::CLONE_NEWNET;
        
        // Fork and unshare in child, then bind mount the new namespace
        let result = tokio::task::spawn_blocking({
            let ns_path = ns_path.clone();
            let name = name.to_string();
            move || -> Result<(), NetNsError> {
                unsafe {
                    // Unshare network namespace
                    if nix::sched::unshare(clone_flags).is_err() {
                        return Err(NetNsError::Permission);
                    }
                }

                // Bind mount the new namespace
                let new_ns_path = format!("/proc/{}/ns/net", getpid());
                mount(
                    Some(new_ns_path.as_str()),
                    &ns_path,
                    None::<&str>,
                    MsFlags::MS_BIND,
                    None::<&str>,
                )
                .map_err(NetNsError::Mount)?;

                debug!("Successfully created namespace: {}", name);
                Ok(())
            }
        }).await.map_err(|e| NetNsError::CreateFile(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        result?;

        // Open the namespace file for later use
        let file = OpenOptions::new()
            .read(true)
            .open(&ns_path)
            .map_err(NetNsError::OpenNs)?;
            
        self.namespaces.insert(name.to_string(), file);
        info!("Created namespace: {}", name);
        
        Ok(())
    }

    /// Delete a network namespace
    pub async fn delete_namespace(&mut self, name: &str) -> Result<(), NetNsError> {
        let ns_path = self.base_dir.join(name);
        
        if !ns_path.exists() {
            return Err(NetNsError::NotFound(name.to_string()));
        }

        debug!("Deleting namespace: {}", name);

        // Remove from our tracking
        self.namespaces.remove(name);

        // Unmount the namespace
        if let Err(e) = umount(&ns_path) {
            warn!("Failed to unmount namespace {}: {}", name, e);
        }

        // Remove the file
        fs::remove_file(&ns_path)
            .await
            .map_err(NetNsError::CreateFile)?;

        info!("Deleted namespace: {}", name);
        Ok(())
    }

    /// Enter a network namespace for the current thread
    pub fn enter_namespace(&self, name: &str) -> Result<NamespaceGuard, NetNsError> {
        let file = self.namespaces.get(name)
            .ok_or_else(|| NetNsError::NotFound(name.to_string()))?;

        // Save current namespace
        let current_ns = OpenOptions::new()
            .read(true)
            .open("/proc/self/ns/net")
            .map_err(NetNsError::OpenNs)?;

        // Enter the target namespace
        setns(&file, CloneFlags::CLONE_NEWNET)
            .map_err(NetNsError::SetNs)?;

        debug!("Entered namespace: {}", name);

        Ok(NamespaceGuard {
            original_ns: current_ns,
            current_name: name.to_string(),
        })
    }

    /// Enter `name`'s namespace, run `f`, then restore the caller's
    /// original namespace regardless of what `f` returns. Used for
    /// in-process netlink work (veth/addr setup) that needs a handle
    /// bound to the target namespace rather than a subprocess.
    pub fn exec_in_namespace<F, T>(&self, name: &str, f: F) -> Result<T, NetNsError>
    where
        F: FnOnce() -> T,
    {
        let _guard = self.enter_namespace(name)?;
        Ok(f())
    }

    /// Get the file descriptor for a namespace
    pub fn get_namespace_fd(&self, name: &str) -> Result<RawFd, NetNsError> {
        let file = self.namespaces.get(name)
            .ok_or_else(|| NetNsError::NotFound(name.to_string()))?;
        Ok(file.as_raw_fd())
    }

    /// Check if a namespace exists
    pub fn namespace_exists(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// List all managed namespaces
    pub fn list_namespaces(&self) -> Vec<String> {
        self.namespaces.keys().cloned().collect()
    }

    /// Run `argv` inside `name`'s namespace (§4.2). `shell` joins `argv`
    /// into a single string and runs it through `sh -c` instead of
    /// exec'ing `argv[0]` directly. `stdin`, if given, is written and
    /// closed before the process's output is read. When `wait` is false
    /// the process is detached and `None` is returned immediately rather
    /// than blocking on its exit.
    pub async fn exec(
        &self,
        name: &str,
        argv: &[String],
        stdin: Option<&[u8]>,
        shell: bool,
        wait: bool,
    ) -> Result<Option<ExecOutput>, NetNsError> {
        if !self.namespaces.contains_key(name) {
            return Err(NetNsError::NotFound(name.to_string()));
        }
        if argv.is_empty() {
            return Err(NetNsError::Exec(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv")));
        }

        let mut cmd = tokio::process::Command::new("ip");
        cmd.arg("netns").arg("exec").arg(name);
        if shell {
            cmd.arg("sh").arg("-c").arg(argv.join(" "));
        } else {
            cmd.args(argv);
        }
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(NetNsError::Exec)?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input).await.map_err(NetNsError::Exec)?;
            }
        }

        if !wait {
            return Ok(None);
        }

        let output = child.wait_with_output().await.map_err(NetNsError::Exec)?;
        Ok(Some(ExecOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            rc: output.status.code().unwrap_or(-1),
        }))
    }

    /// Open an interactive `shell` in `name`'s namespace over a fresh
    /// PTY (§4.2).
    pub fn open_terminal(&self, name: &str, shell: &str) -> Result<TerminalHandle, NetNsError> {
        if !self.namespaces.contains_key(name) {
            return Err(NetNsError::NotFound(name.to_string()));
        }

        let pty = openpty(None, None).map_err(NetNsError::Pty)?;
        let slave_stdin = pty.slave.try_clone().map_err(NetNsError::Exec)?;
        let slave_stdout = pty.slave.try_clone().map_err(NetNsError::Exec)?;

        let child = tokio::process::Command::new("ip")
            .args(["netns", "exec", name, shell])
            .stdin(Stdio::from(slave_stdin))
            .stdout(Stdio::from(slave_stdout))
            .stderr(Stdio::from(pty.slave))
            .spawn()
            .map_err(NetNsError::Exec)?;

        Ok(TerminalHandle { master: pty.master, child })
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        // Clean up all namespaces on drop
        let names: Vec<String> = self.namespaces.keys().cloned().collect();
        for name in names {
            if let Err(e) = tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(self.delete_namespace(&name))
            }) {
                warn!("Failed to clean up namespace {}: {}", name, e);
            }
        }
    }
}

/// RAII guard for namespace entry/exit
pub struct NamespaceGuard {
    original_ns: File,
    current_name: String,
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        // Restore original namespace
        if let Err(e) = setns(&self.original_ns, CloneFlags::CLONE_NEWNET) {
            warn!("Failed to restore original namespace from {}: {}", self.current_name, e);
        } else {
            debug!("Restored original namespace from {}", self.current_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[cfg(feature = "sudo-tests")]
    async fn test_namespace_creation() -> Result<(), NetNsError> {
        let mut manager = Manager::new()?;
        
        // Create a test namespace
        manager.create_namespace("test-ns").await?;
        assert!(manager.namespace_exists("test-ns"));
        
        // Try to create duplicate - should fail
        assert!(manager.create_namespace("test-ns").await.is_err());
        
        // Delete the namespace
        manager.delete_namespace("test-ns").await?;
        assert!(!manager.namespace_exists("test-ns"));
        
        Ok(())
    }

    #[tokio::test]
    async fn exec_against_an_unknown_namespace_is_rejected() {
        let manager = Manager::new().unwrap();
        let result = manager.exec("no-such-ns", &["true".to_string()], None, false, true).await;
        assert!(matches!(result, Err(NetNsError::NotFound(_))));
    }

    #[test]
    fn open_terminal_against_an_unknown_namespace_is_rejected() {
        let manager = Manager::new().unwrap();
        assert!(matches!(manager.open_terminal("no-such-ns", "sh"), Err(NetNsError::NotFound(_))));
    }

    #[tokio::test]
    #[cfg(feature = "sudo-tests")]
    async fn test_namespace_entry() -> Result<(), NetNsError> {
        let mut manager = Manager::new()?;
        
        manager.create_namespace("test-entry").await?;
        
        // Execute something in the namespace
        let result = manager.exec_in_namespace("test-entry", || {
            // In here we're in the test namespace
            42
        })?;
        
        assert_eq!(result, 42);
        
        manager.delete_namespace("test-entry").await?;
        Ok(())
    }
}