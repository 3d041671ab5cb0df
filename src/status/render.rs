use super::{AttachedStatus, PodReport, ReplicaSetReport, StatusReport};
use crate::resource::{Database, Ingress, PersistentVolumeClaim, Secret, Service};

use std::fmt::{self, Display, Formatter};

const UNKNOWN: &str = "?";

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or(UNKNOWN)
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "deployment {}:", self.deployment)?;
        let replicas = self
            .replicas
            .map(|r| r.to_string())
            .unwrap_or_else(|| UNKNOWN.to_owned());
        writeln!(
            f,
            "  current generation is {}, {} replicas configured, {} active replica sets",
            self.generation,
            replicas,
            self.replica_sets.len()
        )?;
        writeln!(f, "\n  active replicasets (status codes: * current, ! error):")?;
        for replica_set in self.replica_sets.iter() {
            Display::fmt(replica_set, f)?;
        }

        if !self.attached.is_empty() {
            writeln!(f, "\nattached resources:")?;
            let namespace = self.deployment.namespace();
            for status in self.attached.iter() {
                write_attached(f, namespace, status)?;
            }
        }
        Ok(())
    }
}

impl Display for ReplicaSetReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(
            f,
            "    {}{}generation {} is replicaset {}, {} replicas configured, {} ready",
            if self.current { '*' } else { ' ' },
            if self.error { '!' } else { ' ' },
            self.revision,
            self.name,
            self.replicas,
            self.ready_replicas
        )?;
        for (name, image) in self.containers.iter() {
            writeln!(f, "        container {}: image {}", name, or_unknown(image.as_deref()))?;
        }
        for failure in self.failures.iter() {
            writeln!(f, "        {}", failure)?;
        }
        for pod in self.pods.iter() {
            Display::fmt(pod, f)?;
        }
        Ok(())
    }
}

impl Display for PodReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "        pod {}: {}", self.name, or_unknown(self.phase.as_deref()))?;
        for (reason, message) in self.waiting.iter() {
            writeln!(
                f,
                "          {}: {}",
                or_unknown(reason.as_deref()),
                message.as_deref().unwrap_or("(no reason)")
            )?;
        }
        Ok(())
    }
}

fn write_attached(f: &mut Formatter, namespace: &str, status: &AttachedStatus) -> fmt::Result {
    match status {
        AttachedStatus::Service(service) => write_service(f, service),
        AttachedStatus::Ingress(ingress) => write_ingress(f, namespace, ingress),
        AttachedStatus::Volume(claim) => write_volume(f, claim),
        AttachedStatus::Database(database) => write_database(f, database),
        AttachedStatus::Secret(secret) => write_secret(f, secret),
        AttachedStatus::Failed { resource, message } => writeln!(
            f,
            "  {} {}: error: {}",
            resource.kind, resource.name, message
        ),
    }
}

fn write_service(f: &mut Formatter, service: &Service) -> fmt::Result {
    let selector = service
        .spec
        .iter()
        .flat_map(|spec| spec.selector.iter().flatten())
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(f, "  service {}: selector is ({})", service.metadata.name, selector)?;
    for port in service.spec.iter().flat_map(|spec| spec.ports.iter().flatten()) {
        let target = port
            .target_port
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| UNKNOWN.to_owned());
        writeln!(
            f,
            "    port {}: {}/{} -> {}",
            or_unknown(port.name.as_deref()),
            port.port,
            or_unknown(port.protocol.as_deref()),
            target
        )?;
    }
    Ok(())
}

fn write_ingress(f: &mut Formatter, namespace: &str, ingress: &Ingress) -> fmt::Result {
    writeln!(f, "  ingress {}:", ingress.metadata.name)?;
    let namespace = ingress.metadata.namespace.as_deref().unwrap_or(namespace);
    let rules = ingress.spec.iter().flat_map(|spec| spec.rules.iter().flatten());
    for rule in rules {
        let host = or_unknown(rule.host.as_deref());
        match rule.first_backend() {
            Some(backend) => {
                let port = backend
                    .service_port
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| UNKNOWN.to_owned());
                writeln!(
                    f,
                    "    http[s]://{} -> {}/{}:{}",
                    host,
                    namespace,
                    or_unknown(backend.service_name.as_deref()),
                    port
                )?;
            }
            None => writeln!(f, "    http[s]://{} -> (no backend)", host)?,
        }
    }
    Ok(())
}

fn write_volume(f: &mut Formatter, claim: &PersistentVolumeClaim) -> fmt::Result {
    match claim.status.as_ref() {
        Some(status) => {
            let modes = status
                .access_modes
                .as_ref()
                .map(|modes| modes.join(","))
                .unwrap_or_else(|| UNKNOWN.to_owned());
            writeln!(
                f,
                "  volume {}: mode is {}, size {}, phase {}",
                claim.metadata.name,
                modes,
                or_unknown(status.storage()),
                or_unknown(status.phase.as_deref())
            )
        }
        None => writeln!(f, "  volume {} is unknown (not provisioned)", claim.metadata.name),
    }
}

fn write_database(f: &mut Formatter, database: &Database) -> fmt::Result {
    let db_type = or_unknown(database.spec.as_ref().and_then(|spec| spec.type_.as_deref()));
    match database.status.as_ref() {
        Some(status) => writeln!(
            f,
            "  database {}: type {}, phase {} (on server {})",
            database.metadata.name,
            db_type,
            or_unknown(status.phase.as_deref()),
            or_unknown(status.server.as_deref())
        ),
        None => writeln!(
            f,
            "  database {}: type {}, unknown (not provisioned)",
            database.metadata.name, db_type
        ),
    }
}

fn write_secret(f: &mut Formatter, secret: &Secret) -> fmt::Result {
    writeln!(
        f,
        "  secret {}: type {}, {} keys",
        secret.metadata.name,
        or_unknown(secret.type_.as_deref()),
        secret.key_count()
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::{AttachedKind, AttachedResource};
    use crate::resource::{ObjectId, Revision};
    use serde_json::json;

    fn report(attached: Vec<AttachedStatus>) -> StatusReport {
        StatusReport {
            deployment: ObjectId::new("web", "myapp"),
            generation: Revision::Known("3".to_owned()),
            replicas: Some(2),
            replica_sets: vec![ReplicaSetReport {
                name: "myapp-5d8f".to_owned(),
                revision: Revision::Known("3".to_owned()),
                current: true,
                error: false,
                replicas: 2,
                ready_replicas: 1,
                failures: Vec::new(),
                containers: vec![("app".to_owned(), Some("myapp:3".to_owned()))],
                pods: vec![
                    PodReport {
                        name: "myapp-5d8f-a".to_owned(),
                        phase: Some("Running".to_owned()),
                        waiting: Vec::new(),
                    },
                    PodReport {
                        name: "myapp-5d8f-b".to_owned(),
                        phase: Some("Pending".to_owned()),
                        waiting: vec![(Some("ImagePullBackOff".to_owned()), None)],
                    },
                ],
            }],
            attached,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn replica_sets_and_pods_are_rendered() {
        let expected = "\
deployment web/myapp:
  current generation is 3, 2 replicas configured, 1 active replica sets

  active replicasets (status codes: * current, ! error):
    * generation 3 is replicaset myapp-5d8f, 2 replicas configured, 1 ready
        container app: image myapp:3
        pod myapp-5d8f-a: Running
        pod myapp-5d8f-b: Pending
          ImagePullBackOff: (no reason)
";
        assert_eq!(expected, report(Vec::new()).to_string());
    }

    #[test]
    fn stale_replica_set_with_failures() {
        let rs = ReplicaSetReport {
            name: "myapp-old".to_owned(),
            revision: Revision::Unknown,
            current: false,
            error: true,
            replicas: 1,
            ready_replicas: 0,
            failures: vec!["exceeded quota".to_owned()],
            containers: vec![("app".to_owned(), None)],
            pods: Vec::new(),
        };
        assert_eq!(
            "     !generation ? is replicaset myapp-old, 1 replicas configured, 0 ready\n        container app: image ?\n        exceeded quota\n",
            rs.to_string()
        );
    }

    #[test]
    fn attached_resources_are_rendered() {
        let service = serde_json::from_value(json!({
            "metadata": {"name": "myapp"},
            "spec": {
                "selector": {"app": "myapp", "tier": "web"},
                "ports": [{"name": "http", "port": 80, "protocol": "TCP", "targetPort": "http"}],
            },
        }))
        .unwrap();
        let ingress = serde_json::from_value(json!({
            "metadata": {"name": "myapp"},
            "spec": {"rules": [
                {"host": "myapp.example.com", "http": {"paths": [
                    {"backend": {"serviceName": "myapp", "servicePort": 80}}
                ]}},
                {"host": "static.example.com"},
            ]},
        }))
        .unwrap();
        let volume = serde_json::from_value(json!({
            "metadata": {"name": "myapp-data"},
            "status": {"accessModes": ["ReadWriteMany"], "capacity": {"storage": "1Gi"}, "phase": "Bound"},
        }))
        .unwrap();
        let database = serde_json::from_value(json!({
            "metadata": {"name": "myapp"},
            "spec": {"type": "postgresql"},
            "status": {"phase": "Ready", "server": "pg-1"},
        }))
        .unwrap();
        let secret = serde_json::from_value(json!({
            "metadata": {"name": "myapp"},
            "type": "Opaque",
            "data": {"SECRET_KEY": "eA==", "API_KEY": "eQ=="},
        }))
        .unwrap();

        let rendered = report(vec![
            AttachedStatus::Service(service),
            AttachedStatus::Ingress(ingress),
            AttachedStatus::Volume(volume),
            AttachedStatus::Failed {
                resource: AttachedResource::new(AttachedKind::Volume, "myapp-media"),
                message: "forbidden".to_owned(),
            },
            AttachedStatus::Database(database),
            AttachedStatus::Secret(secret),
        ])
        .to_string();

        let expected = "
attached resources:
  service myapp: selector is (app=myapp, tier=web)
    port http: 80/TCP -> http
  ingress myapp:
    http[s]://myapp.example.com -> web/myapp:80
    http[s]://static.example.com -> (no backend)
  volume myapp-data: mode is ReadWriteMany, size 1Gi, phase Bound
  volume myapp-media: error: forbidden
  database myapp: type postgresql, phase Ready (on server pg-1)
  secret myapp: type Opaque, 2 keys
";
        assert!(rendered.ends_with(expected), "got:\n{}", rendered);
    }

    #[test]
    fn unprovisioned_resources_are_marked() {
        let volume = serde_json::from_value(json!({"metadata": {"name": "myapp-data"}})).unwrap();
        let database = serde_json::from_value(json!({
            "metadata": {"name": "myapp"},
            "spec": {"type": "mysql"},
        }))
        .unwrap();
        let rendered = report(vec![
            AttachedStatus::Volume(volume),
            AttachedStatus::Database(database),
        ])
        .to_string();
        assert!(rendered.ends_with(
            "  volume myapp-data is unknown (not provisioned)\n  database myapp: type mysql, unknown (not provisioned)\n"
        ));
    }
}
