use crate::client::{Error, ResourceClient};
use crate::k8s_types::{core, extensions};
use crate::resource::{ObjectIdRef, Pod, ReplicaSet};

/// Lists the active replica sets owned by the given deployment, sorted by name. Replica sets
/// that a rollout has scaled down to zero are left out, whatever else their state.
pub fn find_owned_replica_sets<C: ResourceClient>(
    client: &C,
    deployment: &ObjectIdRef<'_>,
) -> Result<Vec<ReplicaSet>, Error> {
    let list = client.list::<ReplicaSet>(extensions::v1beta1::ReplicaSet, deployment.namespace())?;
    let mut owned = list
        .items
        .into_iter()
        .filter(|rs| rs.metadata.is_owned_by("Deployment", deployment.name()))
        .filter(ReplicaSet::is_active)
        .collect::<Vec<_>>();
    owned.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    log::debug!(
        "Found {} active replica sets for deployment {}",
        owned.len(),
        deployment
    );
    Ok(owned)
}

/// Lists the pods owned by the given replica set, sorted by name
pub fn find_owned_pods<C: ResourceClient>(
    client: &C,
    replica_set: &ObjectIdRef<'_>,
) -> Result<Vec<Pod>, Error> {
    let list = client.list::<Pod>(core::v1::Pod, replica_set.namespace())?;
    let mut owned = list
        .items
        .into_iter()
        .filter(|pod| pod.metadata.is_owned_by("ReplicaSet", replica_set.name()))
        .collect::<Vec<_>>();
    owned.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    Ok(owned)
}
