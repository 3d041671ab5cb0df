//! Connection configuration. `ConnectionOptions` holds what the user asked for on the command
//! line (or what GitLab CI put in the environment), and is used both to build the `ClientConfig`
//! for our own api requests and to build the connection arguments for kubectl. Both are
//! constructed once at startup and passed down to whatever needs them.
mod kubeconfig;

pub use self::kubeconfig::KubeConfigError;

use std::fmt::{self, Debug, Display};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "default";

/// Used when no kubeconfig could be loaded, which is where `kubectl proxy` listens by default
pub const FALLBACK_API_SERVER: &str = "http://localhost:8080";

pub const USER_AGENT: &str = concat!("kdtool/", env!("CARGO_PKG_VERSION"));

/// Certificate authority for verifying the api server, either as a path to a PEM file or as the
/// base64 encoded PEM content, as it appears in `certificate-authority-data` in a kubeconfig
#[derive(Debug, Clone, PartialEq)]
pub enum CAData {
    File(String),
    Contents(String),
}

#[derive(Clone, PartialEq)]
pub enum Credentials {
    /// No credentials at all, e.g. when talking to `kubectl proxy`
    Anonymous,
    /// The complete value of the `Authorization` header
    Header(String),
    Pem {
        certificate_base64: String,
        private_key_base64: String,
    },
    PemPath {
        certificate_path: String,
        private_key_path: String,
    },
}

impl Credentials {
    pub fn bearer_token(token: &str) -> Credentials {
        Credentials::Header(format!("Bearer {}", token.trim()))
    }

    pub fn basic(username: &str, password: &str) -> Credentials {
        let encoded = base64::encode(format!("{}:{}", username, password));
        Credentials::Header(format!("Basic {}", encoded))
    }

    pub fn authorization_header(&self) -> Option<&str> {
        match self {
            Credentials::Header(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // never print tokens or keys
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Header(_) => f.write_str("Header(<redacted>)"),
            Credentials::Pem { .. } => f.write_str("Pem(<redacted>)"),
            Credentials::PemPath {
                certificate_path, ..
            } => write!(f, "PemPath({})", certificate_path),
        }
    }
}

/// Everything the http client needs to know about how to reach and authenticate with the
/// api server
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_server_endpoint: String,
    pub credentials: Credentials,
    pub ca_data: Option<CAData>,
    pub user_agent: String,
    pub impersonate: Option<String>,
    pub impersonate_groups: Vec<String>,
    pub verify_ssl_certs: bool,
    /// Deadline for each individual request. `None` leaves it up to the transport
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_server_endpoint: impl Into<String>, credentials: Credentials) -> ClientConfig {
        ClientConfig {
            api_server_endpoint: api_server_endpoint.into(),
            credentials,
            ca_data: None,
            user_agent: USER_AGENT.to_owned(),
            impersonate: None,
            impersonate_groups: Vec::new(),
            verify_ssl_certs: true,
            timeout: None,
        }
    }

    /// Resolves the configuration for the given options. The kubeconfig is used as a base if it
    /// can be loaded; otherwise we fall back to an anonymous connection to localhost. The
    /// server, token and CA certificate from the options always take precedence.
    pub fn resolve(options: &ConnectionOptions) -> ClientConfig {
        let loaded = kubeconfig::load_from_kubeconfig(
            USER_AGENT.to_owned(),
            options.context.as_deref(),
            !options.ignore_kubeconfig_env,
        );
        let config = match loaded {
            Ok(config) => config,
            Err(err) => {
                log::warn!("could not load kubeconfig: {}", err);
                ClientConfig::new(FALLBACK_API_SERVER, Credentials::Anonymous)
            }
        };
        config.with_overrides(options)
    }

    pub fn with_overrides(mut self, options: &ConnectionOptions) -> ClientConfig {
        if let Some(server) = options.server.as_ref() {
            self.api_server_endpoint = server.clone();
        }
        if let Some(token) = options.token.as_ref() {
            self.credentials = Credentials::bearer_token(token);
        }
        if let Some(ca) = options.ca_certificate.as_ref() {
            self.ca_data = Some(CAData::File(ca.clone()));
        }
        self.timeout = options.timeout;
        self
    }
}

/// The connection related options shared by every command
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    pub namespace: String,
    pub server: Option<String>,
    pub token: Option<String>,
    pub ca_certificate: Option<String>,
    pub context: Option<String>,
    pub kubectl: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Set in GitLab mode, where `$KUBECONFIG` belongs to GitLab's own integration
    pub ignore_kubeconfig_env: bool,
}

impl Default for ConnectionOptions {
    fn default() -> ConnectionOptions {
        ConnectionOptions {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            server: None,
            token: None,
            ca_certificate: None,
            context: None,
            kubectl: None,
            timeout: None,
            ignore_kubeconfig_env: false,
        }
    }
}

impl ConnectionOptions {
    /// Takes the namespace, server, token and CA certificate from the variables set by GitLab
    /// CI's legacy Kubernetes integration. `lookup` returns the value of an environment variable.
    pub fn apply_gitlab_environment<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("KUBECONFIG").is_some() {
            log::warn!("argument -G/--gitlab specified but $KUBECONFIG is set in environment. since GitLab 9.4, the --gitlab option is no longer required and should be removed");
            log::warn!("$KUBECONFIG will be ignored and Kubernetes configuration will be taken from legacy GitLab environment configuration");
        }
        self.ignore_kubeconfig_env = true;

        let ca_certificate = if let Some(path) = lookup("KUBE_CA_PEM_FILE") {
            path
        } else if let Some(pem) = lookup("KUBE_CA_PEM") {
            let mut path = std::env::temp_dir();
            path.push(format!("kdtool-ca-{}.pem", std::process::id()));
            std::fs::write(&path, pem.as_bytes())?;
            path.to_string_lossy().into_owned()
        } else {
            return Err(ConfigError::NoCaCertificate);
        };

        let require = |name: &'static str| lookup(name).ok_or(ConfigError::MissingEnv(name));
        self.namespace = require("KUBE_NAMESPACE")?;
        self.server = Some(require("KUBE_URL")?);
        self.token = Some(require("KUBE_TOKEN")?);
        self.ca_certificate = Some(ca_certificate);
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingEnv(&'static str),
    NoCaCertificate,
    Io(io::Error),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> ConfigError {
        ConfigError::Io(err)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::MissingEnv(name) => write!(f, "--gitlab: missing ${} in environment", name),
            ConfigError::NoCaCertificate => {
                f.write_str("--gitlab: cannot determine Kubernetes CA certificate")
            }
            ConfigError::Io(e) => write!(f, "--gitlab: cannot write CA certificate: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
