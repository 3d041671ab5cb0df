//! Finding and running `kubectl`, for the commands that hand work off to it.
use crate::config::ConnectionOptions;

use serde_json::Value;

use std::env;
use std::ffi::OsString;
use std::fmt::{self, Display};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Directories searched after `$PATH`
const EXTRA_SEARCH_DIRS: &[&str] = &["/usr/local/bin", "/opt/tbx/bin"];

#[derive(Debug)]
pub enum KubectlError {
    NotFound,
    Spawn(PathBuf, io::Error),
    Io(io::Error),
    Serialize(serde_json::Error),
}

impl From<io::Error> for KubectlError {
    fn from(err: io::Error) -> KubectlError {
        KubectlError::Io(err)
    }
}
impl From<serde_json::Error> for KubectlError {
    fn from(err: serde_json::Error) -> KubectlError {
        KubectlError::Serialize(err)
    }
}

impl Display for KubectlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KubectlError::NotFound => f.write_str(
                "could not find kubectl executable anywhere in $PATH.\ninstall kubectl in $PATH or pass -K/path/to/kubectl.",
            ),
            KubectlError::Spawn(path, e) => write!(f, "cannot run {}: {}", path.display(), e),
            KubectlError::Io(e) => write!(f, "error communicating with kubectl: {}", e),
            KubectlError::Serialize(e) => write!(f, "cannot encode manifest: {}", e),
        }
    }
}

impl std::error::Error for KubectlError {}

/// Looks for `kubectl` (or `kubectl.exe`) in each directory in turn
pub fn find_in<I, P>(dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    dirs.into_iter().find_map(|dir| {
        ["kubectl", "kubectl.exe"]
            .iter()
            .map(|name| dir.as_ref().join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Looks for kubectl in `$PATH`, then in the usual install locations
pub fn find_kubectl() -> Option<PathBuf> {
    let path = env::var_os("PATH").unwrap_or_default();
    let dirs = env::split_paths(&path).chain(EXTRA_SEARCH_DIRS.iter().map(PathBuf::from));
    find_in(dirs)
}

/// Whether to apply a manifest or delete everything in it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyAction {
    Apply,
    Delete,
}

impl ApplyAction {
    fn as_str(self) -> &'static str {
        match self {
            ApplyAction::Apply => "apply",
            ApplyAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kubectl {
    path: PathBuf,
    connection_args: Vec<String>,
}

impl Kubectl {
    pub fn new(path: impl Into<PathBuf>, options: &ConnectionOptions) -> Kubectl {
        Kubectl {
            path: path.into(),
            connection_args: connection_args(options),
        }
    }

    /// Uses the kubectl given in the options, or else searches for one
    pub fn locate(options: &ConnectionOptions) -> Result<Kubectl, KubectlError> {
        let path = options
            .kubectl
            .clone()
            .or_else(find_kubectl)
            .ok_or(KubectlError::NotFound)?;
        log::debug!("Using kubectl at {}", path.display());
        Ok(Kubectl::new(path, options))
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// The full argument list for a kubectl subcommand, starting with the connection arguments
    pub fn args<I, S>(&self, args: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.connection_args
            .iter()
            .map(OsString::from)
            .chain(args.into_iter().map(Into::into))
            .collect()
    }

    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut command = Command::new(&self.path);
        command.args(self.args(args));
        command
    }

    /// Pipes the manifest to `kubectl apply -f -` (or `delete`), returning kubectl's exit code
    pub fn apply_manifest(&self, manifest: &Value, action: ApplyAction, dry_run: bool) -> Result<i32, KubectlError> {
        let mut args = vec![action.as_str()];
        if dry_run {
            args.push("--dry-run");
        }
        args.extend(["-f", "-"]);

        let body = serde_json::to_vec(manifest)?;
        log::info!("Running kubectl {}", args.join(" "));
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| KubectlError::Spawn(self.path.clone(), e))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(body.as_slice())?;
        }
        let status = child.wait()?;
        Ok(status.code().unwrap_or(1))
    }

    /// Runs kubectl with the terminal attached, returning its exit code
    pub fn run_interactive<I, S>(&self, args: I) -> Result<i32, KubectlError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let status = self
            .command(args)
            .status()
            .map_err(|e| KubectlError::Spawn(self.path.clone(), e))?;
        Ok(status.code().unwrap_or(1))
    }
}

/// The arguments that point kubectl at the same cluster and namespace kdtool is using
pub fn connection_args(options: &ConnectionOptions) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(context) = options.context.as_ref() {
        args.push(format!("--context={}", context));
    }
    if let Some(server) = options.server.as_ref() {
        args.push(format!("--server={}", server));
    }
    if let Some(token) = options.token.as_ref() {
        args.push(format!("--token={}", token));
    }
    if let Some(ca) = options.ca_certificate.as_ref() {
        args.push(format!("--certificate-authority={}", ca));
    }
    if !options.namespace.is_empty() {
        args.push(format!("--namespace={}", options.namespace));
    }
    args
}
