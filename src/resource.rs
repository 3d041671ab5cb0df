//! Typed views of the Kubernetes resources kdtool works with.
//!
//! These are NOT complete definitions of the upstream API objects. Each struct only declares the
//! fields that something in kdtool actually reads, and every field the api server is allowed to
//! omit is an `Option` (or defaults to empty), so that a missing value surfaces as an explicit
//! "unknown" state at the point where it's rendered instead of a deserialization failure.
mod attached;
mod object_id;
mod workload;

pub use self::attached::{
    Database, DatabaseSpec, DatabaseStatus, HttpIngressPath, HttpIngressRuleValue, Ingress,
    IngressBackend, IngressRule, IngressSpec, IntOrString, PersistentVolumeClaim,
    PersistentVolumeClaimStatus, Secret, Service, ServicePort, ServiceSpec,
};
pub use self::object_id::{validate_name, InvalidName, ObjectId, ObjectIdRef};
pub use self::workload::{
    Container, ContainerState, ContainerStateWaiting, ContainerStatus, Deployment,
    DeploymentSpec, Pod, PodSpec, PodStatus, PodTemplateSpec, ReplicaSet, ReplicaSetCondition,
    ReplicaSetSpec, ReplicaSetStatus, Revision,
};

use serde_json::Value;

use std::collections::BTreeMap;

pub type JsonObject = serde_json::Map<String, Value>;

/// The annotation the deployment controller uses to number rollouts, on both deployments and
/// their replica sets
pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// The annotation on a deployment that holds the JSON encoded list of attached resources
pub const ATTACHED_RESOURCES_ANNOTATION: &str = "kdtool.torchbox.com/attached-resources";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(rename = "ownerReferences", default)]
    pub owner_references: Option<Vec<OwnerReference>>,
}

impl ObjectMeta {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    /// Returns true if any owner reference names a resource with the given kind and name.
    /// Namespaces aren't compared, since owners must always be in the same namespace as the
    /// resources they own.
    pub fn is_owned_by(&self, kind: &str, name: &str) -> bool {
        self.owner_references
            .iter()
            .flatten()
            .any(|owner| owner.kind == kind && owner.name == name)
    }

    /// Returns the id of this resource. The namespace is missing from some responses (and from
    /// hand-written fixtures), in which case `default_namespace` is used.
    pub fn object_id<'a>(&'a self, default_namespace: &'a str) -> ObjectIdRef<'a> {
        let namespace = self.namespace.as_deref().unwrap_or(default_namespace);
        ObjectIdRef::new(namespace, self.name.as_str())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OwnerReference {
    #[serde(rename = "apiVersion", default)]
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub controller: Option<bool>,
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct ListMeta {
    #[serde(rename = "resourceVersion")]
    pub resource_version: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ObjectList<T> {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> ObjectMeta {
        serde_json::from_value(value).expect("failed to deserialize metadata")
    }

    #[test]
    fn ownership_requires_matching_kind_and_name() {
        let subject = meta(json!({
            "name": "myapp-5d8f",
            "ownerReferences": [
                {"apiVersion": "extensions/v1beta1", "kind": "Deployment", "name": "myapp", "controller": true},
            ]
        }));
        assert!(subject.is_owned_by("Deployment", "myapp"));
        assert!(!subject.is_owned_by("Deployment", "otherapp"));
        assert!(!subject.is_owned_by("StatefulSet", "myapp"));
    }

    #[test]
    fn resource_without_owner_references_is_not_owned() {
        let subject = meta(json!({ "name": "orphan" }));
        assert!(!subject.is_owned_by("Deployment", "orphan"));
    }

    #[test]
    fn missing_annotations_are_none() {
        let subject = meta(json!({ "name": "myapp" }));
        assert_eq!(None, subject.annotation(REVISION_ANNOTATION));

        let subject = meta(json!({
            "name": "myapp",
            "annotations": { "deployment.kubernetes.io/revision": "3" }
        }));
        assert_eq!(Some("3"), subject.annotation(REVISION_ANNOTATION));
    }

    #[test]
    fn object_list_tolerates_missing_metadata_and_items() {
        let list: ObjectList<ObjectMeta> = serde_json::from_value(json!({})).unwrap();
        assert!(list.items.is_empty());
        assert_eq!(None, list.metadata.resource_version);
    }
}
