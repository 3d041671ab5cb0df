//! An in-memory stand-in for the api server, for testing anything that takes a `ResourceClient`.
//!
//! Resources are stored as plain json, keyed by the same api path that a real request would
//! use, so a `FakeCluster` also checks that callers ask for the right types in the right
//! namespaces. Any path can be made to fail with a given status, and every request is logged
//! so tests can assert on what was (and wasn't) called.
use crate::client::{ApiError, Error, ResourceClient};
use crate::k8s_types::K8sType;
use crate::resource::{ListMeta, ObjectIdRef, ObjectList};

use serde::de::DeserializeOwned;
use serde_json::Value;

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Failure {
    code: u16,
    reason: String,
    message: String,
}

#[derive(Debug, Default)]
pub struct FakeCluster {
    resources: RefCell<Vec<(String, Value)>>,
    failures: HashMap<String, Failure>,
    requests: RefCell<Vec<String>>,
}

impl FakeCluster {
    pub fn new() -> FakeCluster {
        FakeCluster::default()
    }

    /// Adds a resource, taking its namespace and name from its metadata. Resources without a
    /// namespace are put in `default`.
    pub fn with(mut self, k8s_type: &K8sType, resource: Value) -> FakeCluster {
        self.insert(k8s_type, resource);
        self
    }

    pub fn insert(&mut self, k8s_type: &K8sType, resource: Value) {
        let path = {
            let metadata = &resource["metadata"];
            let namespace = metadata["namespace"].as_str().unwrap_or("default");
            let name = metadata["name"]
                .as_str()
                .expect("resources added to a FakeCluster must have a name");
            k8s_type.resource_path(Some(namespace), name)
        };
        let mut resources = self.resources.borrow_mut();
        resources.retain(|(existing, _)| *existing != path);
        resources.push((path, resource));
    }

    /// Makes every request to the given api path fail. The path is matched exactly, so use a
    /// collection path to fail list requests.
    pub fn fail_path(mut self, path: impl Into<String>, code: u16, reason: &str, message: &str) -> FakeCluster {
        self.failures.insert(
            path.into(),
            Failure {
                code,
                reason: reason.to_owned(),
                message: message.to_owned(),
            },
        );
        self
    }

    /// Stores a resource under the given name whatever its metadata says, the way a
    /// misbehaving proxy or a collection path would answer a get
    pub fn with_at(self, k8s_type: &K8sType, id: &ObjectIdRef<'_>, resource: Value) -> FakeCluster {
        let path = k8s_type.resource_path(Some(id.namespace()), id.name());
        {
            let mut resources = self.resources.borrow_mut();
            resources.retain(|(existing, _)| *existing != path);
            resources.push((path, resource));
        }
        self
    }

    pub fn fail_list(self, k8s_type: &K8sType, namespace: &str, code: u16, message: &str) -> FakeCluster {
        let path = k8s_type.collection_path(Some(namespace));
        self.fail_path(path, code, "", message)
    }

    /// Every request made so far, as `METHOD path`
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn contains(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> bool {
        let path = k8s_type.resource_path(Some(id.namespace()), id.name());
        self.resources.borrow().iter().any(|(p, _)| *p == path)
    }

    fn record(&self, method: &str, path: &str) -> Result<(), Error> {
        self.requests.borrow_mut().push(format!("{} {}", method, path));
        match self.failures.get(path) {
            Some(failure) => Err(Error::Api(ApiError {
                status: "Failure".to_owned(),
                message: failure.message.clone(),
                reason: failure.reason.clone(),
                code: failure.code,
            })),
            None => Ok(()),
        }
    }
}

fn not_found(k8s_type: &K8sType, name: &str) -> Error {
    Error::Api(ApiError {
        status: "Failure".to_owned(),
        message: format!("{} \"{}\" not found", k8s_type.plural_kind, name),
        reason: "NotFound".to_owned(),
        code: 404,
    })
}

impl ResourceClient for FakeCluster {
    fn get<T: DeserializeOwned>(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<T, Error> {
        let path = k8s_type.resource_path(Some(id.namespace()), id.name());
        self.record("GET", path.as_str())?;
        let resources = self.resources.borrow();
        let value = resources
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| not_found(k8s_type, id.name()))?;
        Ok(serde_json::from_value(value)?)
    }

    fn list<T: DeserializeOwned>(&self, k8s_type: &K8sType, namespace: &str) -> Result<ObjectList<T>, Error> {
        let collection = k8s_type.collection_path(Some(namespace));
        self.record("GET", collection.as_str())?;
        let prefix = format!("{}/", collection);
        let items = self
            .resources
            .borrow()
            .iter()
            .filter(|(path, _)| path.starts_with(prefix.as_str()))
            .map(|(_, value)| serde_json::from_value(value.clone()))
            .collect::<Result<Vec<T>, serde_json::Error>>()?;
        Ok(ObjectList {
            metadata: ListMeta::default(),
            items,
        })
    }

    fn delete(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<(), Error> {
        let path = k8s_type.resource_path(Some(id.namespace()), id.name());
        self.record("DELETE", path.as_str())?;
        self.resources.borrow_mut().retain(|(p, _)| *p != path);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::k8s_types::{core, extensions};
    use crate::resource::{Pod, Service};
    use serde_json::json;

    fn pod(namespace: &str, name: &str) -> Value {
        json!({"metadata": {"namespace": namespace, "name": name}})
    }

    #[test]
    fn list_is_scoped_to_type_and_namespace() {
        let cluster = FakeCluster::new()
            .with(core::v1::Pod, pod("web", "a"))
            .with(core::v1::Pod, pod("other", "b"))
            .with(core::v1::Service, pod("web", "c"))
            .with(core::v1::Pod, pod("web", "d"));

        let pods: ObjectList<Pod> = cluster.list(core::v1::Pod, "web").unwrap();
        let names = pods.items.iter().map(|p| p.metadata.name.as_str()).collect::<Vec<_>>();
        assert_eq!(vec!["a", "d"], names);
        assert_eq!(vec!["GET /api/v1/namespaces/web/pods".to_owned()], cluster.requests());
    }

    #[test]
    fn missing_resource_is_not_found() {
        let cluster = FakeCluster::new();
        let err = cluster
            .get::<Service>(core::v1::Service, &ObjectIdRef::new("web", "myapp"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!("services \"myapp\" not found", err.message());
    }

    #[test]
    fn failures_are_injected_by_path() {
        let cluster = FakeCluster::new()
            .with(core::v1::Pod, pod("web", "a"))
            .fail_list(extensions::v1beta1::ReplicaSet, "web", 403, "forbidden");
        assert!(cluster.list::<Pod>(core::v1::Pod, "web").is_ok());
        let err = cluster
            .list::<Value>(extensions::v1beta1::ReplicaSet, "web")
            .unwrap_err();
        assert!(err.is_http_status(403));
    }

    #[test]
    fn delete_removes_resource() {
        let cluster = FakeCluster::new().with(core::v1::Pod, pod("web", "a"));
        let id = ObjectIdRef::new("web", "a");
        assert!(cluster.contains(core::v1::Pod, &id));
        cluster.delete(core::v1::Pod, &id).unwrap();
        assert!(!cluster.contains(core::v1::Pod, &id));
        cluster.delete(core::v1::Pod, &id).unwrap();
    }
}
