//! Just enough of the kubeconfig format to find a cluster and credentials for a context.
use super::{CAData, ClientConfig, Credentials};

use std::fmt::{self, Display};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug)]
pub enum KubeConfigError {
    Io(io::Error),
    Format(serde_yaml::Error),
    NoHomeDir,
    NotFound { what: &'static str, name: String },
    MissingCredentials(String),
    Incomplete(&'static str),
    Exec { command: String, message: String },
}

impl From<serde_yaml::Error> for KubeConfigError {
    fn from(err: serde_yaml::Error) -> KubeConfigError {
        KubeConfigError::Format(err)
    }
}

impl From<io::Error> for KubeConfigError {
    fn from(err: io::Error) -> KubeConfigError {
        KubeConfigError::Io(err)
    }
}

impl Display for KubeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KubeConfigError::Io(e) => write!(f, "cannot read kubeconfig: {}", e),
            KubeConfigError::Format(e) => write!(f, "invalid kubeconfig: {}", e),
            KubeConfigError::NoHomeDir => {
                f.write_str("cannot find ~/.kube/config: home directory unknown")
            }
            KubeConfigError::NotFound { what, name } => {
                write!(f, "kubeconfig has no {} named '{}'", what, name)
            }
            KubeConfigError::MissingCredentials(user) => write!(
                f,
                "kubeconfig user '{}' has no usable credentials (token, username/password, client certificate or exec)",
                user
            ),
            KubeConfigError::Incomplete(detail) => write!(f, "invalid kubeconfig: {}", detail),
            KubeConfigError::Exec { command, message } => {
                write!(f, "credential command {} failed: {}", command, message)
            }
        }
    }
}

impl std::error::Error for KubeConfigError {}

/// `$KUBECONFIG` (unless `honor_env` is false), else `~/.kube/config`
fn kubeconfig_path(honor_env: bool) -> Result<PathBuf, KubeConfigError> {
    if honor_env {
        if let Some(path) = std::env::var_os("KUBECONFIG") {
            return Ok(PathBuf::from(path));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or(KubeConfigError::NoHomeDir)
}

/// Loads the kubeconfig at `path` and resolves `context`, or the file's current context
pub(super) fn load_kubeconfig(
    user_agent: String,
    path: impl AsRef<Path>,
    context: Option<&str>,
) -> Result<ClientConfig, KubeConfigError> {
    let path = path.as_ref();
    let kubeconfig = KubeConfig::load_file(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    kubeconfig.resolve(user_agent, dir, context)
}

pub(crate) fn load_from_kubeconfig(
    user_agent: String,
    context: Option<&str>,
    honor_env: bool,
) -> Result<ClientConfig, KubeConfigError> {
    let path = kubeconfig_path(honor_env)?;
    log::debug!("Loading kubeconfig from {}", path.display());
    load_kubeconfig(user_agent, path, context)
}

/// Kubeconfig lists are all `{name, <payload>}` pairs
#[derive(Deserialize, Debug, PartialEq, Clone)]
struct Named<T> {
    name: String,
    #[serde(alias = "cluster", alias = "user", alias = "context")]
    value: T,
}

fn find_named<'a, T>(
    entries: &'a [Named<T>],
    what: &'static str,
    name: &str,
) -> Result<&'a T, KubeConfigError> {
    entries
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| &entry.value)
        .ok_or_else(|| KubeConfigError::NotFound {
            what,
            name: name.to_owned(),
        })
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    certificate_authority_data: Option<String>,
    certificate_authority: Option<PathBuf>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

impl ClusterEntry {
    /// Inline CA data wins over a CA file. Relative file paths are relative to the kubeconfig.
    fn ca_data(&self, kubeconfig_dir: &Path) -> Option<CAData> {
        if let Some(data) = self.certificate_authority_data.as_ref() {
            return Some(CAData::Contents(data.clone()));
        }
        self.certificate_authority
            .as_ref()
            .map(|path| CAData::File(kubeconfig_dir.join(path).to_string_lossy().into_owned()))
    }
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "kebab-case")]
struct UserEntry {
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    client_certificate_data: Option<String>,
    client_key_data: Option<String>,
    client_certificate: Option<String>,
    client_key: Option<String>,
    #[serde(rename = "as")]
    impersonate: Option<String>,
    #[serde(rename = "as-groups", default)]
    impersonate_groups: Vec<String>,
    exec: Option<ExecConfig>,
}

impl UserEntry {
    fn credentials(&self, user_name: &str) -> Result<Credentials, KubeConfigError> {
        if let Some(token) = self.token.as_ref() {
            return Ok(Credentials::bearer_token(token));
        }
        if let Some(username) = self.username.as_ref() {
            let password = self
                .password
                .as_ref()
                .ok_or(KubeConfigError::Incomplete("username given without a password"))?;
            return Ok(Credentials::basic(username, password));
        }
        if let Some(exec) = self.exec.as_ref() {
            return exec.run().map(|token| Credentials::bearer_token(&token));
        }
        if let Some(certificate_path) = self.client_certificate.as_ref() {
            let private_key_path = self
                .client_key
                .clone()
                .ok_or(KubeConfigError::Incomplete("client-certificate given without client-key"))?;
            return Ok(Credentials::PemPath {
                certificate_path: certificate_path.clone(),
                private_key_path,
            });
        }
        if let Some(certificate) = self.client_certificate_data.as_ref() {
            let private_key = self.client_key_data.clone().ok_or(KubeConfigError::Incomplete(
                "client-certificate-data given without client-key-data",
            ))?;
            return Ok(Credentials::Pem {
                certificate_base64: certificate.clone(),
                private_key_base64: private_key,
            });
        }
        Err(KubeConfigError::MissingCredentials(user_name.to_owned()))
    }
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct ExecEnv {
    name: String,
    value: String,
}

/// A credential plugin: a command that prints an `ExecCredential` with a token
#[derive(Deserialize, Debug, PartialEq, Clone)]
struct ExecConfig {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: Vec<ExecEnv>,
}

#[derive(Deserialize, Debug)]
struct ExecCredential {
    status: ExecCredentialStatus,
}

#[derive(Deserialize, Debug)]
struct ExecCredentialStatus {
    token: String,
}

impl ExecConfig {
    fn run(&self) -> Result<String, KubeConfigError> {
        log::debug!("Running credential command {}", self.command);
        let exec_error = |message: String| KubeConfigError::Exec {
            command: self.command.clone(),
            message,
        };
        let output = Command::new(self.command.as_str())
            .args(self.args.iter())
            .envs(self.env.iter().map(|var| (var.name.as_str(), var.value.as_str())))
            .output()
            .map_err(|e| exec_error(e.to_string()))?;
        if !output.status.success() {
            return Err(exec_error(format!("exited with {}", output.status)));
        }
        let credential: ExecCredential = serde_yaml::from_slice(output.stdout.as_slice())
            .map_err(|e| exec_error(format!("unexpected output: {}", e)))?;
        Ok(credential.status.token)
    }
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct ContextEntry {
    cluster: String,
    user: String,
}

/// A kubeconfig file, as far as kdtool needs it
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct KubeConfig {
    #[serde(rename = "current-context", default)]
    current_context: String,
    #[serde(default)]
    clusters: Vec<Named<ClusterEntry>>,
    #[serde(default)]
    users: Vec<Named<UserEntry>>,
    #[serde(default)]
    contexts: Vec<Named<ContextEntry>>,
}

impl KubeConfig {
    pub fn load_file(path: &Path) -> Result<KubeConfig, KubeConfigError> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// The connection for `context`, or for the current context if that's `None`.
    /// `kubeconfig_dir` anchors relative certificate paths.
    pub fn resolve(
        &self,
        user_agent: String,
        kubeconfig_dir: &Path,
        context: Option<&str>,
    ) -> Result<ClientConfig, KubeConfigError> {
        let context_name = context.unwrap_or(self.current_context.as_str());
        let context = find_named(&self.contexts, "context", context_name)?;
        let cluster = find_named(&self.clusters, "cluster", context.cluster.as_str())?;
        let user = find_named(&self.users, "user", context.user.as_str())?;
        log::debug!(
            "Using kubeconfig context {} (cluster {}, user {})",
            context_name,
            context.cluster,
            context.user
        );

        let mut config = ClientConfig::new(cluster.server.clone(), user.credentials(&context.user)?);
        config.user_agent = user_agent;
        config.ca_data = cluster.ca_data(kubeconfig_dir);
        config.impersonate = user.impersonate.clone();
        config.impersonate_groups = user.impersonate_groups.clone();
        config.verify_ssl_certs = !cluster.insecure_skip_tls_verify;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: staging
clusters:
- name: staging
  cluster:
    server: https://staging.example.com:6443
    certificate-authority: ./ca.crt
- name: production
  cluster:
    server: https://production.example.com:6443
    certificate-authority-data: LS0tLS1CRUdJTg==
contexts:
- name: staging
  context:
    cluster: staging
    user: deployer
- name: production
  context:
    cluster: production
    user: admin
    namespace: web
- name: broken
  context:
    cluster: production
    user: nobody
users:
- name: deployer
  user:
    token: abcdef
- name: admin
  user:
    username: admin
    password: hunter2
- name: nobody
  user: {}
"#;

    fn kubeconfig() -> KubeConfig {
        serde_yaml::from_str(KUBECONFIG).expect("failed to parse kubeconfig")
    }

    #[test]
    fn resolves_current_context_with_cluster_ca_file() {
        let conf = kubeconfig()
            .resolve("ua".to_owned(), Path::new("/home/me/.kube"), None)
            .expect("failed to resolve");
        assert_eq!("https://staging.example.com:6443", conf.api_server_endpoint);
        assert_eq!(
            Some(CAData::File("/home/me/.kube/./ca.crt".to_owned())),
            conf.ca_data
        );
        assert_eq!(Some("Bearer abcdef"), conf.credentials.authorization_header());
    }

    #[test]
    fn resolves_explicit_context() {
        let conf = kubeconfig()
            .resolve("ua".to_owned(), Path::new("/"), Some("production"))
            .expect("failed to resolve");
        assert_eq!("https://production.example.com:6443", conf.api_server_endpoint);
        assert_eq!(
            Some(CAData::Contents("LS0tLS1CRUdJTg==".to_owned())),
            conf.ca_data
        );
        assert_eq!(
            Some("Basic YWRtaW46aHVudGVyMg=="),
            conf.credentials.authorization_header()
        );
    }

    #[test]
    fn unknown_context_is_an_error() {
        let err = kubeconfig()
            .resolve("ua".to_owned(), Path::new("/"), Some("nope"))
            .unwrap_err();
        assert_eq!("kubeconfig has no context named 'nope'", err.to_string());
    }

    #[test]
    fn user_without_credentials_is_an_error() {
        let err = kubeconfig()
            .resolve("ua".to_owned(), Path::new("/"), Some("broken"))
            .unwrap_err();
        assert!(err.to_string().starts_with("kubeconfig user 'nobody' has no usable credentials"));
    }
}
