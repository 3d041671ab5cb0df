use kdtool::k8s_types::{core, extensions, torchbox_com};
use kdtool::status::{self, build_report};
use kdtool::testkit::FakeCluster;

use kdtool::serde_json::{json, Value};

fn deployment(attached: Option<&str>) -> Value {
    let mut annotations = json!({"deployment.kubernetes.io/revision": "3"});
    if let Some(attached) = attached {
        annotations["kdtool.torchbox.com/attached-resources"] = json!(attached);
    }
    json!({
        "metadata": {"namespace": "web", "name": "myapp", "annotations": annotations},
        "spec": {
            "replicas": 2,
            "template": {"spec": {"containers": [{"name": "app", "image": "myapp:3"}]}},
        },
    })
}

fn replica_set(name: &str, revision: &str, replicas: i32, ready: Option<i32>) -> Value {
    json!({
        "metadata": {
            "namespace": "web",
            "name": name,
            "annotations": {"deployment.kubernetes.io/revision": revision},
            "ownerReferences": [{"kind": "Deployment", "name": "myapp"}],
        },
        "spec": {
            "replicas": replicas,
            "template": {"spec": {"containers": [{"name": "app", "image": format!("myapp:{}", revision)}]}},
        },
        "status": {"readyReplicas": ready},
    })
}

fn pod(name: &str, owner: &str, phase: &str) -> Value {
    json!({
        "metadata": {
            "namespace": "web",
            "name": name,
            "ownerReferences": [{"kind": "ReplicaSet", "name": owner}],
        },
        "status": {"phase": phase},
    })
}

fn cluster(attached: Option<&str>) -> FakeCluster {
    FakeCluster::new()
        .with(extensions::v1beta1::Deployment, deployment(attached))
        .with(
            extensions::v1beta1::ReplicaSet,
            replica_set("myapp-a", "3", 2, Some(2)),
        )
        .with(
            extensions::v1beta1::ReplicaSet,
            replica_set("myapp-b", "2", 0, None),
        )
        .with(core::v1::Pod, pod("myapp-a-2", "myapp-a", "Running"))
        .with(core::v1::Pod, pod("myapp-a-1", "myapp-a", "Running"))
        .with(core::v1::Pod, pod("other-1", "other", "Running"))
}

const ROLLED_OUT: &str = "\
deployment web/myapp:
  current generation is 3, 2 replicas configured, 1 active replica sets

  active replicasets (status codes: * current, ! error):
    * generation 3 is replicaset myapp-a, 2 replicas configured, 2 ready
        container app: image myapp:3
        pod myapp-a-1: Running
        pod myapp-a-2: Running
";

#[test]
fn rolled_out_deployment_shows_only_active_replica_set() {
    let report = build_report(&cluster(None), "web", "myapp").unwrap();
    assert_eq!(ROLLED_OUT, report.to_string());
    assert!(report.warnings.is_empty());
}

#[test]
fn attached_resources_are_grouped_by_kind() {
    let attached = r#"[
        {"kind": "secret", "name": "myapp"},
        {"kind": "volume", "name": "myapp-data"},
        {"kind": "database", "name": "myapp"},
        {"kind": "service", "name": "myapp"}
    ]"#;
    let cluster = cluster(Some(attached))
        .with(
            core::v1::PersistentVolumeClaim,
            json!({"metadata": {"namespace": "web", "name": "myapp-data"}}),
        )
        .with(
            core::v1::Service,
            json!({
                "metadata": {"namespace": "web", "name": "myapp"},
                "spec": {
                    "selector": {"app": "myapp"},
                    "ports": [{"name": "http", "port": 80, "protocol": "TCP", "targetPort": 80}],
                },
            }),
        )
        .with(
            torchbox_com::v1::Database,
            json!({
                "metadata": {"namespace": "web", "name": "myapp"},
                "spec": {"type": "postgresql", "secretName": "myapp-database"},
                "status": {"phase": "Ready", "server": "pg-1"},
            }),
        );

    let report = build_report(&cluster, "web", "myapp").unwrap();
    let expected = format!(
        "{}{}",
        ROLLED_OUT,
        "
attached resources:
  service myapp: selector is (app=myapp)
    port http: 80/TCP -> 80
  volume myapp-data is unknown (not provisioned)
  database myapp: type postgresql, phase Ready (on server pg-1)
  secret myapp: error: secrets \"myapp\" not found
"
    );
    assert_eq!(expected, report.to_string());
    assert!(report.warnings.is_empty());
}

#[test]
fn undecodable_annotation_is_a_warning() {
    let report = build_report(&cluster(Some("not-json")), "web", "myapp").unwrap();
    assert_eq!(ROLLED_OUT, report.to_string());
    assert_eq!(1, report.warnings.len());
}

#[test]
fn missing_deployment_is_an_error() {
    let err = build_report(&FakeCluster::new(), "web", "myapp").unwrap_err();
    assert_eq!(
        "cannot load deployment myapp: deployments \"myapp\" not found",
        err.to_string()
    );
}

#[test]
fn lookup_failure_does_not_stop_the_report() {
    let attached = r#"[{"kind": "ingress", "name": "myapp"}]"#;
    let cluster = cluster(Some(attached)).fail_path(
        extensions::v1beta1::Ingress.resource_path(Some("web"), "myapp"),
        403,
        "Forbidden",
        "ingresses.extensions \"myapp\" is forbidden",
    );
    let report = build_report(&cluster, "web", "myapp").unwrap();
    assert!(report.to_string().ends_with(
        "\nattached resources:\n  ingress myapp: error: ingresses.extensions \"myapp\" is forbidden\n"
    ));
}

fn run_status(cluster: &FakeCluster, name: &str) -> (i32, String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = status::run(cluster, "web", name, &mut out, &mut err).unwrap();
    (code, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
}

#[test]
fn status_command_prints_report() {
    let (code, out, err) = run_status(&cluster(None), "myapp");
    assert_eq!(0, code);
    assert_eq!(ROLLED_OUT, out);
    assert_eq!("", err);
}

#[test]
fn status_command_warns_on_stderr() {
    let (code, out, err) = run_status(&cluster(Some("not-json")), "myapp");
    assert_eq!(0, code);
    assert_eq!(ROLLED_OUT, out);
    assert!(err.starts_with("warning: "), "{}", err);
    assert_eq!(1, err.lines().count());
}

#[test]
fn status_command_fails_with_one_line_for_missing_deployment() {
    let (code, out, err) = run_status(&FakeCluster::new(), "myapp");
    assert_eq!(1, code);
    assert_eq!("", out);
    assert_eq!("cannot load deployment myapp: deployments \"myapp\" not found\n", err);
}

#[test]
fn status_command_refuses_dot_names() {
    let cluster = cluster(None);
    let (code, out, err) = run_status(&cluster, ".");
    assert_eq!(1, code);
    assert_eq!("", out);
    assert!(err.starts_with("cannot load deployment: '.' is not a valid name"), "{}", err);
    assert!(cluster.requests().is_empty());
}
