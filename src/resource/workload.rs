use super::{ObjectMeta, REVISION_ANNOTATION};

use serde_json::Value;

use std::fmt::{self, Display};

/// The rollout number of a deployment or replica set, taken verbatim from the revision
/// annotation. Revisions are only ever compared as strings, so `"02"` and `"2"` are different
/// revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Known(String),
    Unknown,
}

impl Revision {
    pub fn from_meta(metadata: &ObjectMeta) -> Revision {
        metadata
            .annotation(REVISION_ANNOTATION)
            .map(|rev| Revision::Known(rev.to_owned()))
            .unwrap_or(Revision::Unknown)
    }

    /// The string form used both for display and for comparisons. An unknown revision is `?`,
    /// which means that a replica set with no revision is considered current for a deployment
    /// that has none either.
    pub fn as_str(&self) -> &str {
        match self {
            Revision::Known(rev) => rev.as_str(),
            Revision::Unknown => "?",
        }
    }

    pub fn matches(&self, other: &Revision) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
}

impl Deployment {
    pub fn revision(&self) -> Revision {
        Revision::from_meta(&self.metadata)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct DeploymentSpec {
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub template: PodTemplateSpec,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Value>>,
}

/// A container from a pod template. The env, envFrom and volumeMounts sections are only ever
/// copied as-is into another pod, so they're kept as raw json.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<Value>>,
    #[serde(rename = "envFrom", default, skip_serializing_if = "Option::is_none")]
    pub env_from: Option<Vec<Value>>,
    #[serde(rename = "volumeMounts", default, skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<Value>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReplicaSet {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReplicaSetSpec,
    #[serde(default)]
    pub status: Option<ReplicaSetStatus>,
}

impl ReplicaSet {
    pub fn revision(&self) -> Revision {
        Revision::from_meta(&self.metadata)
    }

    /// The declared replica count. The api server defaults this to 1 when it's not given.
    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1)
    }

    /// Replica sets that have been scaled down to zero by a rollout are retained as history, but
    /// are no longer active
    pub fn is_active(&self) -> bool {
        self.replicas() != 0
    }

    /// `None` when the controller hasn't reported a ready count, which happens both before the
    /// first status update and when no replicas are ready
    pub fn ready_replicas(&self) -> Option<i32> {
        self.status.as_ref().and_then(|status| status.ready_replicas)
    }

    /// Messages of all the `ReplicaFailure` conditions that are currently true
    pub fn failure_messages(&self) -> Vec<String> {
        self.status
            .iter()
            .flat_map(|status| status.conditions.iter().flatten())
            .filter(|condition| condition.type_ == "ReplicaFailure" && condition.status == "True")
            .map(|condition| {
                condition
                    .message
                    .clone()
                    .unwrap_or_else(|| condition.type_.clone())
            })
            .collect()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ReplicaSetSpec {
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub template: PodTemplateSpec,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ReplicaSetStatus {
    #[serde(rename = "readyReplicas", default)]
    pub ready_replicas: Option<i32>,
    #[serde(default)]
    pub conditions: Option<Vec<ReplicaSetCondition>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReplicaSetCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: Option<PodStatus>,
}

impl Pod {
    pub fn phase(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
    }

    /// Iterates the containers that are currently in the `waiting` state
    pub fn waiting_containers(&self) -> impl Iterator<Item = &ContainerStateWaiting> {
        self.status
            .iter()
            .flat_map(|status| status.container_statuses.iter().flatten())
            .filter_map(|cs| cs.state.as_ref().and_then(|state| state.waiting.as_ref()))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(rename = "containerStatuses", default)]
    pub container_statuses: Option<Vec<ContainerStatus>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub state: Option<ContainerState>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ContainerState {
    #[serde(default)]
    pub waiting: Option<ContainerStateWaiting>,
    #[serde(default)]
    pub running: Option<Value>,
    #[serde(default)]
    pub terminated: Option<Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ContainerStateWaiting {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn replica_set(value: Value) -> ReplicaSet {
        serde_json::from_value(value).expect("failed to deserialize replica set")
    }

    #[test]
    fn revisions_compare_as_strings() {
        let two = Revision::Known("2".to_owned());
        let zero_two = Revision::Known("02".to_owned());
        assert!(two.matches(&Revision::Known("2".to_owned())));
        assert!(!two.matches(&zero_two));
        assert!(!two.matches(&Revision::Unknown));
        assert!(Revision::Unknown.matches(&Revision::Unknown));
    }

    #[test]
    fn scaled_down_replica_set_is_inactive() {
        let rs = replica_set(json!({
            "metadata": { "name": "myapp-1" },
            "spec": { "replicas": 0 }
        }));
        assert!(!rs.is_active());
    }

    #[test]
    fn only_true_replica_failure_conditions_are_reported() {
        let rs = replica_set(json!({
            "metadata": { "name": "myapp-1" },
            "spec": { "replicas": 2 },
            "status": {
                "readyReplicas": 1,
                "conditions": [
                    { "type": "ReplicaFailure", "status": "True", "message": "pods \"myapp-1-x\" is forbidden: exceeded quota" },
                    { "type": "ReplicaFailure", "status": "False", "message": "old news" },
                    { "type": "Available", "status": "True", "message": "not a failure" },
                ]
            }
        }));
        assert_eq!(
            vec!["pods \"myapp-1-x\" is forbidden: exceeded quota".to_owned()],
            rs.failure_messages()
        );
        assert_eq!(Some(1), rs.ready_replicas());
    }

    #[test]
    fn waiting_containers_skips_running_ones() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "myapp-1-abcde" },
            "status": {
                "phase": "Pending",
                "containerStatuses": [
                    { "name": "web", "state": { "waiting": { "reason": "ImagePullBackOff" } } },
                    { "name": "redis", "state": { "running": { "startedAt": "2026-10-19T06:10:00Z" } } },
                ]
            }
        }))
        .unwrap();

        let waiting = pod.waiting_containers().collect::<Vec<_>>();
        assert_eq!(1, waiting.len());
        assert_eq!(Some("ImagePullBackOff"), waiting[0].reason.as_deref());
        assert_eq!(Some("Pending"), pod.phase());
    }
}
