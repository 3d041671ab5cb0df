use super::ObjectMeta;

use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Ports in services and ingress backends may be given either by number or by name
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

impl Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IntOrString::Int(i) => write!(f, "{}", i),
            IntOrString::String(s) => f.write_str(s),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Service {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<ServiceSpec>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ServiceSpec {
    #[serde(default)]
    pub selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub ports: Option<Vec<ServicePort>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ServicePort {
    #[serde(default)]
    pub name: Option<String>,
    pub port: i32,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(rename = "targetPort", default)]
    pub target_port: Option<IntOrString>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Ingress {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<IngressSpec>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct IngressSpec {
    #[serde(default)]
    pub rules: Option<Vec<IngressRule>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct IngressRule {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub http: Option<HttpIngressRuleValue>,
}

impl IngressRule {
    /// The backend of the first path of this rule, which for kdtool's own ingresses is the only one
    pub fn first_backend(&self) -> Option<&IngressBackend> {
        self.http
            .as_ref()
            .and_then(|http| http.paths.first())
            .map(|path| &path.backend)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HttpIngressRuleValue {
    #[serde(default)]
    pub paths: Vec<HttpIngressPath>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HttpIngressPath {
    #[serde(default)]
    pub path: Option<String>,
    pub backend: IngressBackend,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct IngressBackend {
    #[serde(rename = "serviceName", default)]
    pub service_name: Option<String>,
    #[serde(rename = "servicePort", default)]
    pub service_port: Option<IntOrString>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PersistentVolumeClaim {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: Option<PersistentVolumeClaimStatus>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PersistentVolumeClaimStatus {
    #[serde(rename = "accessModes", default)]
    pub access_modes: Option<Vec<String>>,
    #[serde(default)]
    pub capacity: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub phase: Option<String>,
}

impl PersistentVolumeClaimStatus {
    pub fn storage(&self) -> Option<&str> {
        self.capacity
            .as_ref()
            .and_then(|capacity| capacity.get("storage"))
            .map(String::as_str)
    }
}

/// A database provisioned by the Torchbox database operator
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Database {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<DatabaseSpec>,
    #[serde(default)]
    pub status: Option<DatabaseStatus>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct DatabaseSpec {
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(rename = "secretName", default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct DatabaseStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
}

/// Only the key names of a secret are ever looked at, never the values
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub data: Option<BTreeMap<String, String>>,
}

impl Secret {
    pub fn key_count(&self) -> usize {
        self.data.as_ref().map(BTreeMap::len).unwrap_or(0)
    }
}
