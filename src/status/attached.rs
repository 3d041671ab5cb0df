use crate::client::ResourceClient;
use crate::registry::{AttachedKind, AttachedResource, Registry};
use crate::resource::{Database, Ingress, ObjectIdRef, PersistentVolumeClaim, Secret, Service};

/// The looked up state of a single attached resource
#[derive(Debug, Clone, PartialEq)]
pub enum AttachedStatus {
    Service(Service),
    Ingress(Ingress),
    Volume(PersistentVolumeClaim),
    Database(Database),
    Secret(Secret),
    /// The lookup failed. This only ever affects the one resource.
    Failed {
        resource: AttachedResource,
        message: String,
    },
}

impl AttachedStatus {
    pub fn kind(&self) -> AttachedKind {
        match self {
            AttachedStatus::Service(_) => AttachedKind::Service,
            AttachedStatus::Ingress(_) => AttachedKind::Ingress,
            AttachedStatus::Volume(_) => AttachedKind::Volume,
            AttachedStatus::Database(_) => AttachedKind::Database,
            AttachedStatus::Secret(_) => AttachedKind::Secret,
            AttachedStatus::Failed { resource, .. } => resource.kind,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AttachedStatus::Failed { .. })
    }
}

/// Reads a single attached resource. Failures are captured in the result rather than returned.
pub fn lookup<C: ResourceClient>(
    client: &C,
    namespace: &str,
    resource: &AttachedResource,
) -> AttachedStatus {
    let id = ObjectIdRef::new(namespace, resource.name.as_str());
    let k8s_type = resource.kind.k8s_type();
    let result = match resource.kind {
        AttachedKind::Service => client.get(k8s_type, &id).map(AttachedStatus::Service),
        AttachedKind::Ingress => client.get(k8s_type, &id).map(AttachedStatus::Ingress),
        AttachedKind::Volume => client.get(k8s_type, &id).map(AttachedStatus::Volume),
        AttachedKind::Database => client.get(k8s_type, &id).map(AttachedStatus::Database),
        AttachedKind::Secret => client.get(k8s_type, &id).map(AttachedStatus::Secret),
    };
    result.unwrap_or_else(|err| {
        log::debug!("Failed to look up attached {}: {}", resource, err);
        AttachedStatus::Failed {
            resource: resource.clone(),
            message: err.message(),
        }
    })
}

/// Looks up every resource in the registry, grouped by kind. Within a kind, registry order is kept.
pub fn lookup_all<C: ResourceClient>(
    client: &C,
    namespace: &str,
    registry: &Registry,
) -> Vec<AttachedStatus> {
    let mut entries = registry.entries().iter().collect::<Vec<_>>();
    entries.sort_by_key(|resource| resource.kind);
    entries
        .into_iter()
        .map(|resource| lookup(client, namespace, resource))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::k8s_types::{core, torchbox_com};
    use crate::testkit::FakeCluster;
    use serde_json::json;

    #[test]
    fn failed_lookup_does_not_stop_the_others() {
        let cluster = FakeCluster::new()
            .with(
                core::v1::Service,
                json!({"metadata": {"namespace": "web", "name": "myapp"}}),
            )
            .with(
                torchbox_com::v1::Database,
                json!({"metadata": {"namespace": "web", "name": "myapp"}, "spec": {"type": "postgresql"}}),
            );
        let registry = Registry::parse(Some(
            r#"[{"kind":"database","name":"myapp"},{"kind":"volume","name":"myapp-data"},{"kind":"service","name":"myapp"}]"#,
        ));

        let statuses = lookup_all(&cluster, "web", &registry);
        let kinds = statuses.iter().map(AttachedStatus::kind).collect::<Vec<_>>();
        assert_eq!(
            vec![AttachedKind::Service, AttachedKind::Volume, AttachedKind::Database],
            kinds
        );
        assert!(!statuses[0].is_failed());
        assert_eq!(
            AttachedStatus::Failed {
                resource: AttachedResource::new(AttachedKind::Volume, "myapp-data"),
                message: "persistentvolumeclaims \"myapp-data\" not found".to_owned(),
            },
            statuses[1]
        );
        assert!(matches!(statuses[2], AttachedStatus::Database(_)));
        assert_eq!(
            vec![
                "GET /api/v1/namespaces/web/services/myapp".to_owned(),
                "GET /api/v1/namespaces/web/persistentvolumeclaims/myapp-data".to_owned(),
                "GET /apis/torchbox.com/v1/namespaces/web/databases/myapp".to_owned(),
            ],
            cluster.requests()
        );
    }
}
