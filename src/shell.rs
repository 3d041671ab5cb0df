//! `kdtool shell` and `kdtool exec`: run a one-off pod that looks like the application's own
//! container (same image, environment and volumes) and attach to it through `kubectl run`.
use crate::client::ResourceClient;
use crate::kubectl::{Kubectl, KubectlError};
use crate::resource::{Container, Deployment};
use crate::status::{load_deployment, DeploymentLoadError};

use serde_json::{json, Value};

use std::fmt::{self, Display};

const SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const APP_CONTAINER_NAME: &str = "app";

/// What to run, and how
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShellOptions {
    /// image to run instead of the application's own
    pub image: Option<String>,
    /// command to run instead of a shell
    pub command: Option<Vec<String>>,
    /// allocate a terminal
    pub tty: bool,
}

impl ShellOptions {
    pub fn command(&self) -> Vec<String> {
        match self.command.as_ref() {
            Some(command) if !command.is_empty() => command.clone(),
            _ => vec![
                "/bin/sh".to_owned(),
                "-c".to_owned(),
                "exec /bin/bash || exec /bin/sh".to_owned(),
            ],
        }
    }
}

#[derive(Debug)]
pub enum ShellError {
    Load(DeploymentLoadError),
    NoAppContainer,
    NoImage(String),
    Random(openssl::error::ErrorStack),
    Kubectl(KubectlError),
}

impl From<DeploymentLoadError> for ShellError {
    fn from(err: DeploymentLoadError) -> ShellError {
        ShellError::Load(err)
    }
}
impl From<openssl::error::ErrorStack> for ShellError {
    fn from(err: openssl::error::ErrorStack) -> ShellError {
        ShellError::Random(err)
    }
}
impl From<KubectlError> for ShellError {
    fn from(err: KubectlError) -> ShellError {
        ShellError::Kubectl(err)
    }
}

impl Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShellError::Load(e) => Display::fmt(e, f),
            ShellError::NoAppContainer => f.write_str("could not find application container."),
            ShellError::NoImage(container) => {
                write!(f, "container {} has no image, use -i to give one", container)
            }
            ShellError::Random(e) => write!(f, "cannot generate pod name: {}", e),
            ShellError::Kubectl(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for ShellError {}

/// The application's container: the only one there is, or else the one named `app`
pub fn find_app_container(deployment: &Deployment) -> Option<&Container> {
    let containers = &deployment.spec.template.spec.containers;
    if containers.len() == 1 {
        return containers.first();
    }
    containers.iter().find(|c| c.name == APP_CONTAINER_NAME)
}

/// Four random lowercase letters or digits
pub fn random_suffix() -> Result<String, ShellError> {
    let mut bytes = [0u8; 4];
    openssl::rand::rand_bytes(&mut bytes)?;
    Ok(bytes
        .iter()
        .map(|b| SUFFIX_CHARS[*b as usize % SUFFIX_CHARS.len()] as char)
        .collect())
}

pub fn pod_name(deployment_name: &str, suffix: &str) -> String {
    format!("kdtool-{}-{}", deployment_name, suffix)
}

/// The pod spec passed to `kubectl run --overrides`. It carries over the environment and
/// volumes of the application container, so the pod sees what the application sees.
pub fn pod_override(
    deployment: &Deployment,
    app: &Container,
    pod_name: &str,
    image: &str,
    command: &[String],
    tty: bool,
) -> Value {
    let mut container = json!({
        "name": pod_name,
        "image": image,
        "command": command,
        "stdin": true,
        "stdinOnce": true,
        "tty": tty,
    });
    if let Some(env) = app.env.as_ref() {
        container["env"] = json!(env);
    }
    if let Some(env_from) = app.env_from.as_ref() {
        container["envFrom"] = json!(env_from);
    }
    if let Some(mounts) = app.volume_mounts.as_ref() {
        container["volumeMounts"] = json!(mounts);
    }

    let mut pod = json!({
        "spec": {
            "containers": [container],
        },
    });
    if let Some(volumes) = deployment.spec.template.spec.volumes.as_ref() {
        pod["spec"]["volumes"] = json!(volumes);
    }
    pod
}

/// Arguments for the `kubectl run` command that starts the pod. The trailing command is
/// ignored, since the override replaces it.
pub fn run_args(pod_name: &str, image: &str, overrides: &Value, tty: bool) -> Vec<String> {
    vec![
        "run".to_owned(),
        "--restart=Never".to_owned(),
        "--rm".to_owned(),
        (if tty { "-ti" } else { "-i" }).to_owned(),
        format!("--image={}", image),
        format!("--overrides={}", overrides),
        pod_name.to_owned(),
        "--".to_owned(),
        "/bin/false".to_owned(),
    ]
}

/// Starts the pod and waits for it to finish, returning kubectl's exit code
pub fn run<C: ResourceClient>(
    client: &C,
    kubectl: &Kubectl,
    namespace: &str,
    name: &str,
    options: &ShellOptions,
) -> Result<i32, ShellError> {
    let deployment = load_deployment(client, namespace, name)?;
    let app = find_app_container(&deployment).ok_or(ShellError::NoAppContainer)?;
    let image = options
        .image
        .as_deref()
        .or(app.image.as_deref())
        .ok_or_else(|| ShellError::NoImage(app.name.clone()))?;

    let pod_name = pod_name(deployment.metadata.name.as_str(), random_suffix()?.as_str());
    let overrides = pod_override(&deployment, app, pod_name.as_str(), image, &options.command(), options.tty);
    log::info!("Starting pod {} with image {}", pod_name, image);
    let code = kubectl.run_interactive(run_args(pod_name.as_str(), image, &overrides, options.tty))?;
    Ok(code)
}
