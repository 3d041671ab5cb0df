//! kdtool deploys conventional web applications to Kubernetes, and reports on and removes
//! what it deployed.
//!
//! The interesting part is `status`, which reconstructs a deployment's live topology from owner
//! references (deployment, then replica sets, then pods) plus the attached resources recorded in
//! an annotation on the deployment, and renders it as a report:
//!
//! ```no_run
//! use kdtool::prelude::*;
//!
//! let options = ConnectionOptions::default();
//! let client = BlockingClient::new(ClientConfig::resolve(&options)).unwrap();
//! match kdtool::status::build_report(&client, "web", "myapp") {
//!     Ok(report) => print!("{}", report),
//!     Err(err) => eprintln!("{}", err),
//! }
//! ```
//!
//! Everything that talks to the cluster goes through the synchronous `ResourceClient` trait, so
//! it can be exercised against the in-memory `testkit::FakeCluster` (with the `testkit` feature).

#[macro_use]
extern crate serde_derive;

pub mod client;
pub mod config;
pub mod error;
pub mod k8s_types;
pub mod kubectl;
pub mod manifest;
pub mod registry;
pub mod resource;
pub mod shell;
pub mod status;
pub mod undeploy;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use serde_json;

pub mod prelude {
    pub use crate::client::{BlockingClient, ResourceClient};
    pub use crate::config::{ClientConfig, ConnectionOptions};
    pub use crate::error::Error;
    pub use crate::k8s_types::{self, K8sType};
    pub use crate::registry::{AttachedKind, AttachedResource, Registry};
    pub use crate::resource::{ObjectId, ObjectIdRef};
}
