//! The Attached-Resource Registry: the list of auxiliary resources (services, ingresses, volumes,
//! databases and secrets) that were created alongside a deployment.
//!
//! None of these carry an owner reference back to the deployment, so the list is recorded
//! when the manifests are generated and stored on the deployment itself, as a JSON array of
//! `{"kind": ..., "name": ...}` objects in the `kdtool.torchbox.com/attached-resources`
//! annotation. The list is advisory: a missing or unreadable annotation means "no attached
//! resources", and individual entries that can't be understood are skipped.
use crate::k8s_types::{self, K8sType};
use crate::resource::{validate_name, ATTACHED_RESOURCES_ANNOTATION};

use serde_json::Value;

use std::fmt::{self, Display};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachedKind {
    Service,
    Ingress,
    Volume,
    Database,
    Secret,
}

impl AttachedKind {
    pub const ALL: [AttachedKind; 5] = [
        AttachedKind::Service,
        AttachedKind::Ingress,
        AttachedKind::Volume,
        AttachedKind::Database,
        AttachedKind::Secret,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttachedKind::Service => "service",
            AttachedKind::Ingress => "ingress",
            AttachedKind::Volume => "volume",
            AttachedKind::Database => "database",
            AttachedKind::Secret => "secret",
        }
    }

    /// The api type that a resource of this kind is stored as
    pub fn k8s_type(self) -> &'static K8sType {
        match self {
            AttachedKind::Service => k8s_types::core::v1::Service,
            AttachedKind::Ingress => k8s_types::extensions::v1beta1::Ingress,
            AttachedKind::Volume => k8s_types::core::v1::PersistentVolumeClaim,
            AttachedKind::Database => k8s_types::torchbox_com::v1::Database,
            AttachedKind::Secret => k8s_types::core::v1::Secret,
        }
    }
}

impl Display for AttachedKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<AttachedKind, String> {
        AttachedKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown kind '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachedResource {
    pub kind: AttachedKind,
    pub name: String,
}

impl AttachedResource {
    pub fn new(kind: AttachedKind, name: impl Into<String>) -> AttachedResource {
        AttachedResource {
            kind,
            name: name.into(),
        }
    }

    fn from_value(value: &Value) -> Result<AttachedResource, String> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| format!("missing '{}'", name))
        };
        let kind = field("kind")?.parse::<AttachedKind>()?;
        let name = field("name")?;
        validate_name(name).map_err(|e| e.to_string())?;
        Ok(AttachedResource::new(kind, name))
    }
}

impl Display for AttachedResource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

#[derive(Debug)]
pub enum RegistryError {
    Decode(serde_json::Error),
    NotAList,
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> RegistryError {
        RegistryError::Decode(err)
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegistryError::Decode(e) => write!(
                f,
                "could not decode {} annotation: {}",
                ATTACHED_RESOURCES_ANNOTATION, e
            ),
            RegistryError::NotAList => write!(
                f,
                "could not decode {} annotation: expected a list",
                ATTACHED_RESOURCES_ANNOTATION
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

/// The parsed registry, along with anything that had to be ignored while parsing it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Registry {
    entries: Vec<AttachedResource>,
    warnings: Vec<String>,
}

impl Registry {
    pub fn new(entries: Vec<AttachedResource>) -> Registry {
        Registry {
            entries,
            warnings: Vec::new(),
        }
    }

    /// Parses the annotation value, never failing. If the value can't be decoded at all, the
    /// result is empty and carries a warning.
    pub fn parse(annotation: Option<&str>) -> Registry {
        match Registry::parse_strict(annotation) {
            Ok(registry) => registry,
            Err(err) => {
                log::debug!("Ignoring attached resources: {}", err);
                Registry {
                    entries: Vec::new(),
                    warnings: vec![err.to_string()],
                }
            }
        }
    }

    /// Parses the annotation value, failing if it isn't a JSON list. Malformed entries within
    /// the list are still skipped.
    pub fn parse_strict(annotation: Option<&str>) -> Result<Registry, RegistryError> {
        let raw = match annotation {
            Some(raw) => raw,
            None => return Ok(Registry::default()),
        };
        let items = match serde_json::from_str::<Value>(raw)? {
            Value::Array(items) => items,
            _ => return Err(RegistryError::NotAList),
        };

        let mut registry = Registry::default();
        for (index, item) in items.iter().enumerate() {
            match AttachedResource::from_value(item) {
                Ok(resource) => registry.entries.push(resource),
                Err(reason) => {
                    let message = format!("skipping attached resource entry {}: {}", index, reason);
                    log::debug!("{}", message);
                    registry.warnings.push(message);
                }
            }
        }
        Ok(registry)
    }

    pub fn entries(&self) -> &[AttachedResource] {
        self.entries.as_slice()
    }

    pub fn warnings(&self) -> &[String] {
        self.warnings.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the entries into the annotation value, preserving their order
    pub fn to_annotation(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }
}
