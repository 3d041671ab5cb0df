//! Reconstructs the live state of a deployment and renders it as the `kdtool status` report.
//!
//! Nothing in the api links a deployment to its pods directly. Replica sets declare the
//! deployment as their owner, and pods declare their replica set, so both levels are found by
//! listing everything in the namespace and filtering on owner references. Attached resources
//! carry no owner references at all, and are instead found through the registry annotation on
//! the deployment.
//!
//! Failing to read the deployment, or to list its replica sets or pods, fails the whole report.
//! Failing to read an attached resource only affects that resource's line.
mod attached;
mod owner;
mod render;

pub use self::attached::{lookup, lookup_all, AttachedStatus};
pub use self::owner::{find_owned_pods, find_owned_replica_sets};

use crate::client::{self, ResourceClient};
use crate::k8s_types::extensions;
use crate::registry::Registry;
use crate::resource::{
    Deployment, InvalidName, ObjectId, ObjectIdRef, Pod, ReplicaSet, Revision,
    ATTACHED_RESOURCES_ANNOTATION,
};

use std::fmt::{self, Display};
use std::io::{self, Write};

/// The deployment itself, or its replica sets or pods, could not be read
#[derive(Debug)]
pub enum DeploymentLoadError {
    InvalidName(InvalidName),
    Api { name: String, error: client::Error },
    /// the api answered with an object other than the one asked for
    NameMismatch { name: String, found: String },
}

impl DeploymentLoadError {
    pub fn is_not_found(&self) -> bool {
        match self {
            DeploymentLoadError::Api { error, .. } => error.is_not_found(),
            _ => false,
        }
    }
}

impl Display for DeploymentLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeploymentLoadError::InvalidName(e) => write!(f, "cannot load deployment: {}", e),
            DeploymentLoadError::Api { name, error } => {
                write!(f, "cannot load deployment {}: {}", name, error.message())
            }
            DeploymentLoadError::NameMismatch { name, found } => write!(
                f,
                "cannot load deployment {}: the api server returned '{}' instead",
                name, found
            ),
        }
    }
}

impl std::error::Error for DeploymentLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeploymentLoadError::InvalidName(e) => Some(e),
            DeploymentLoadError::Api { error, .. } => Some(error),
            DeploymentLoadError::NameMismatch { .. } => None,
        }
    }
}

/// Reads the named deployment, refusing names that can't address a single object and
/// anything the api returns under a different name
pub fn load_deployment<C: ResourceClient>(
    client: &C,
    namespace: &str,
    name: &str,
) -> Result<Deployment, DeploymentLoadError> {
    let id = ObjectIdRef::checked(namespace, name).map_err(DeploymentLoadError::InvalidName)?;
    let deployment: Deployment = client
        .get(extensions::v1beta1::Deployment, &id)
        .map_err(|error| DeploymentLoadError::Api {
            name: name.to_owned(),
            error,
        })?;
    if deployment.metadata.name != name {
        return Err(DeploymentLoadError::NameMismatch {
            name: name.to_owned(),
            found: deployment.metadata.name,
        });
    }
    Ok(deployment)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub deployment: ObjectId,
    pub generation: Revision,
    /// replica count from the deployment spec
    pub replicas: Option<i32>,
    pub replica_sets: Vec<ReplicaSetReport>,
    pub attached: Vec<AttachedStatus>,
    /// Non-fatal problems with the attached resources annotation. These are not part of the
    /// rendered report.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSetReport {
    pub name: String,
    pub revision: Revision,
    /// the replica set's revision is the deployment's current generation
    pub current: bool,
    /// readyReplicas is missing, or there's at least one replica failure
    pub error: bool,
    pub replicas: i32,
    pub ready_replicas: i32,
    pub failures: Vec<String>,
    /// (name, image) of each container in the pod template
    pub containers: Vec<(String, Option<String>)>,
    pub pods: Vec<PodReport>,
}

impl ReplicaSetReport {
    pub fn new(replica_set: &ReplicaSet, generation: &Revision, pods: &[Pod]) -> ReplicaSetReport {
        let revision = replica_set.revision();
        let failures = replica_set.failure_messages();
        let ready = replica_set.ready_replicas();
        ReplicaSetReport {
            name: replica_set.metadata.name.clone(),
            current: revision.matches(generation),
            error: ready.is_none() || !failures.is_empty(),
            revision,
            replicas: replica_set.replicas(),
            ready_replicas: ready.unwrap_or(0),
            failures,
            containers: replica_set
                .spec
                .template
                .spec
                .containers
                .iter()
                .map(|c| (c.name.clone(), c.image.clone()))
                .collect(),
            pods: pods.iter().map(PodReport::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodReport {
    pub name: String,
    pub phase: Option<String>,
    /// (reason, message) for each container that is waiting
    pub waiting: Vec<(Option<String>, Option<String>)>,
}

impl PodReport {
    pub fn new(pod: &Pod) -> PodReport {
        PodReport {
            name: pod.metadata.name.clone(),
            phase: pod.phase().map(str::to_owned),
            waiting: pod
                .waiting_containers()
                .map(|w| (w.reason.clone(), w.message.clone()))
                .collect(),
        }
    }
}

/// Builds the status report for the named deployment
pub fn build_report<C: ResourceClient>(
    client: &C,
    namespace: &str,
    name: &str,
) -> Result<StatusReport, DeploymentLoadError> {
    let load_error = |error: client::Error| DeploymentLoadError::Api {
        name: name.to_owned(),
        error,
    };

    let deployment = load_deployment(client, namespace, name)?;
    let deployment_id = ObjectIdRef::new(namespace, name);
    let generation = deployment.revision();

    let mut replica_sets = Vec::new();
    for replica_set in find_owned_replica_sets(client, &deployment_id).map_err(load_error)? {
        let pods = find_owned_pods(client, &replica_set.metadata.object_id(namespace))
            .map_err(load_error)?;
        replica_sets.push(ReplicaSetReport::new(&replica_set, &generation, &pods));
    }

    let registry = Registry::parse(deployment.metadata.annotation(ATTACHED_RESOURCES_ANNOTATION));
    let attached = lookup_all(client, deployment_id.namespace(), &registry);

    Ok(StatusReport {
        deployment: deployment_id.to_owned(),
        generation,
        replicas: deployment.spec.replicas,
        replica_sets,
        attached,
        warnings: registry.warnings().to_vec(),
    })
}

/// Runs `kdtool status`. The report goes to `out`, and warnings or the reason the deployment
/// couldn't be loaded go to `err`. Returns the exit code.
pub fn run<C, O, E>(client: &C, namespace: &str, name: &str, out: &mut O, err: &mut E) -> io::Result<i32>
where
    C: ResourceClient,
    O: Write,
    E: Write,
{
    match build_report(client, namespace, name) {
        Ok(report) => {
            write!(out, "{}", report)?;
            for warning in report.warnings.iter() {
                writeln!(err, "warning: {}", warning)?;
            }
            Ok(0)
        }
        Err(error) => {
            writeln!(err, "{}", error)?;
            Ok(1)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::k8s_types::core;
    use crate::testkit::FakeCluster;
    use serde_json::{json, Value};

    fn deployment(annotations: Value) -> Value {
        json!({
            "metadata": {"namespace": "web", "name": "myapp", "annotations": annotations},
            "spec": {"replicas": 2},
        })
    }

    fn replica_set(name: &str, revision: &str, replicas: i32, status: Value) -> Value {
        json!({
            "metadata": {
                "namespace": "web",
                "name": name,
                "annotations": {"deployment.kubernetes.io/revision": revision},
                "ownerReferences": [{"kind": "Deployment", "name": "myapp"}],
            },
            "spec": {
                "replicas": replicas,
                "template": {"spec": {"containers": [{"name": "app", "image": "myapp:3"}]}},
            },
            "status": status,
        })
    }

    #[test]
    fn revision_comparison_is_by_string() {
        let cluster = FakeCluster::new()
            .with(
                extensions::v1beta1::Deployment,
                deployment(json!({"deployment.kubernetes.io/revision": "2"})),
            )
            .with(
                extensions::v1beta1::ReplicaSet,
                replica_set("myapp-a", "02", 1, json!({"readyReplicas": 1})),
            )
            .with(
                extensions::v1beta1::ReplicaSet,
                replica_set("myapp-b", "2", 1, json!({"readyReplicas": 1})),
            );
        let report = build_report(&cluster, "web", "myapp").unwrap();
        let current = report
            .replica_sets
            .iter()
            .map(|rs| (rs.name.as_str(), rs.current))
            .collect::<Vec<_>>();
        assert_eq!(vec![("myapp-a", false), ("myapp-b", true)], current);
    }

    #[test]
    fn error_marker_requires_missing_ready_count_or_failure() {
        let failure = json!({
            "readyReplicas": 1,
            "conditions": [{
                "type": "ReplicaFailure",
                "status": "True",
                "reason": "FailedCreate",
                "message": "pods \"myapp-c-\" is forbidden: exceeded quota",
            }],
        });
        let cluster = FakeCluster::new()
            .with(extensions::v1beta1::Deployment, deployment(json!({})))
            .with(
                extensions::v1beta1::ReplicaSet,
                replica_set("myapp-a", "1", 3, json!({"readyReplicas": 1})),
            )
            .with(extensions::v1beta1::ReplicaSet, replica_set("myapp-b", "1", 1, json!({})))
            .with(extensions::v1beta1::ReplicaSet, replica_set("myapp-c", "1", 2, failure));
        let report = build_report(&cluster, "web", "myapp").unwrap();

        let errors = report
            .replica_sets
            .iter()
            .map(|rs| (rs.name.as_str(), rs.error, rs.ready_replicas))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![("myapp-a", false, 1), ("myapp-b", true, 0), ("myapp-c", true, 1)],
            errors
        );
        assert!(report.replica_sets[0].failures.is_empty());
        assert_eq!(
            vec!["pods \"myapp-c-\" is forbidden: exceeded quota".to_owned()],
            report.replica_sets[2].failures
        );
        assert_eq!(Revision::Unknown, report.generation);
    }

    #[test]
    fn missing_deployment_is_a_load_error() {
        let cluster = FakeCluster::new();
        let err = build_report(&cluster, "web", "myapp").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            "cannot load deployment myapp: deployments \"myapp\" not found",
            err.to_string()
        );
    }

    #[test]
    fn pod_list_failure_is_a_load_error() {
        let cluster = FakeCluster::new()
            .with(extensions::v1beta1::Deployment, deployment(json!({})))
            .with(
                extensions::v1beta1::ReplicaSet,
                replica_set("myapp-a", "1", 1, json!({"readyReplicas": 1})),
            )
            .fail_list(core::v1::Pod, "web", 403, "pods is forbidden");
        let err = build_report(&cluster, "web", "myapp").unwrap_err();
        assert_eq!("cannot load deployment myapp: pods is forbidden", err.to_string());
    }

    #[test]
    fn dot_names_are_refused_before_any_request() {
        let cluster = FakeCluster::new();
        for name in [".", "..", "x/../.."] {
            let err = build_report(&cluster, "web", name).unwrap_err();
            assert!(matches!(err, DeploymentLoadError::InvalidName(_)), "name: {}", name);
        }
        let err = build_report(&cluster, "..", "myapp").unwrap_err();
        assert!(matches!(err, DeploymentLoadError::InvalidName(_)));
        assert!(cluster.requests().is_empty());
    }

    #[test]
    fn object_returned_under_another_name_is_refused() {
        let list = json!({"kind": "DeploymentList", "metadata": {}, "items": []});
        let cluster = FakeCluster::new().with_at(
            extensions::v1beta1::Deployment,
            &ObjectIdRef::new("web", "myapp"),
            list,
        );
        let err = build_report(&cluster, "web", "myapp").unwrap_err();
        assert_eq!(
            "cannot load deployment myapp: the api server returned '' instead",
            err.to_string()
        );
        assert_eq!(1, cluster.requests().len());
    }

    #[test]
    fn undecodable_registry_is_a_warning() {
        let cluster = FakeCluster::new().with(
            extensions::v1beta1::Deployment,
            deployment(json!({"kdtool.torchbox.com/attached-resources": "not-json"})),
        );
        let report = build_report(&cluster, "web", "myapp").unwrap();
        assert!(report.attached.is_empty());
        assert_eq!(1, report.warnings.len());
    }
}
