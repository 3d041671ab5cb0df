use super::{Client, Error, ResourceClient};
use crate::config::ClientConfig;
use crate::k8s_types::K8sType;
use crate::resource::{ObjectIdRef, ObjectList};

use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Runtime};

use std::fmt::{self, Debug};
use std::future::Future;
use std::io;
use std::time::Duration;

/// A `ResourceClient` that runs each request to completion on its own single threaded runtime
/// before returning. Requests are never issued concurrently.
pub struct BlockingClient {
    client: Client,
    runtime: Runtime,
    timeout: Option<Duration>,
}

impl Debug for BlockingClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BlockingClient")
            .field("client", &self.client)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BlockingClient {
    pub fn new(config: ClientConfig) -> Result<BlockingClient, io::Error> {
        let timeout = config.timeout;
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let client = Client::new(config)?;
        Ok(BlockingClient {
            client,
            runtime,
            timeout,
        })
    }

    fn block_on<T, F>(&self, future: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match self.timeout {
            Some(limit) => self
                .runtime
                .block_on(async move { tokio::time::timeout(limit, future).await })
                .unwrap_or_else(|_| Err(Error::Timeout(limit))),
            None => self.runtime.block_on(future),
        }
    }
}

impl ResourceClient for BlockingClient {
    fn get<T: DeserializeOwned>(
        &self,
        k8s_type: &K8sType,
        id: &ObjectIdRef<'_>,
    ) -> Result<T, Error> {
        self.block_on(self.client.get_resource(k8s_type, id))
    }

    fn list<T: DeserializeOwned>(
        &self,
        k8s_type: &K8sType,
        namespace: &str,
    ) -> Result<ObjectList<T>, Error> {
        self.block_on(self.client.list_all(k8s_type, namespace))
    }

    fn delete(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<(), Error> {
        self.block_on(self.client.delete_resource(k8s_type, id))
    }
}
