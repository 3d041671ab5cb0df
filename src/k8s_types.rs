//! Static descriptions of every Kubernetes resource type kdtool reads, writes or deletes.
//!
//! The API groups here are the ones the manifests produced by `kdtool deploy` use, so that
//! the paths requested by `status` and `undeploy` line up with what was applied. In particular
//! deployments, replica sets and ingresses are addressed through `extensions/v1beta1`.
use std::fmt::{self, Display};

/// A basic description of a Kubernetes resource, with just enough information to build
/// request paths for it. You can define additional types simply by declaring a static:
///
/// ```no_run
/// use kdtool::k8s_types::K8sType;
///
/// #[allow(non_upper_case_globals)]
/// pub static Certificate: &K8sType = &K8sType {
///     api_version: "cert-manager.io/v1",
///     kind: "Certificate",
///     plural_kind: "certificates",
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct K8sType {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub plural_kind: &'static str,
}

impl K8sType {
    pub fn as_group_and_version(&self) -> (&str, &str) {
        match self.api_version.find('/') {
            Some(slash_idx) => (
                &self.api_version[..slash_idx],
                &self.api_version[(slash_idx + 1)..],
            ),
            None => ("", self.api_version),
        }
    }

    pub fn group(&self) -> &str {
        self.as_group_and_version().0
    }

    pub fn version(&self) -> &str {
        self.as_group_and_version().1
    }

    /// Returns the path of the collection of this type, either within the given namespace
    /// or cluster-wide, e.g. `/apis/extensions/v1beta1/namespaces/web/replicasets`
    pub fn collection_path(&self, namespace: Option<&str>) -> String {
        let mut path = if self.group().is_empty() {
            format!("/api/{}", self.version())
        } else {
            format!("/apis/{}/{}", self.group(), self.version())
        };
        if let Some(ns) = namespace {
            path.push_str("/namespaces/");
            path.push_str(ns);
        }
        path.push('/');
        path.push_str(self.plural_kind);
        path
    }

    /// Returns the path of a single named resource of this type
    pub fn resource_path(&self, namespace: Option<&str>, name: &str) -> String {
        let mut path = self.collection_path(namespace);
        path.push('/');
        path.push_str(name);
        path
    }
}

impl Display for K8sType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.plural_kind)
    }
}

macro_rules! k8s_type {
    ($ref_name:ident, $api_version:expr, $kind:expr, $plural_kind:expr) => {
        #[allow(non_upper_case_globals)]
        pub static $ref_name: &crate::k8s_types::K8sType = &crate::k8s_types::K8sType {
            api_version: $api_version,
            kind: $kind,
            plural_kind: $plural_kind,
        };
    };
}

macro_rules! def_types {
    (@nogroupmod, $group:expr, [
        $( $version:ident => [
            $( $kind:ident ~ $plural_kind:ident ),*
        ]),*
    ]) => {
        $(
            pub mod $version {
                $(
                    k8s_type!($kind, concat!($group, "/", stringify!($version)), stringify!($kind), stringify!($plural_kind));
                )*
            }
        )*
    };
    (@core => [
        $( $version:ident => [
            $( $kind:ident ~ $plural_kind:ident ),*
        ]),*
    ]) => {
        pub mod core {
            $(pub mod $version {
                $(
                    k8s_type!($kind, stringify!($version), stringify!($kind), stringify!($plural_kind));
                )*
            })*
        }
    }
}

def_types! {
    @core => [
        v1 => [
            Pod ~ pods,
            Service ~ services,
            Secret ~ secrets,
            PersistentVolumeClaim ~ persistentvolumeclaims
        ]
    ]
}

pub mod extensions {
    def_types! {
        @nogroupmod, "extensions", [
            v1beta1 => [
                Deployment ~ deployments,
                Ingress ~ ingresses,
                ReplicaSet ~ replicasets
            ]
        ]
    }
}

/// Custom resources served by the Torchbox database operator
pub mod torchbox_com {
    def_types! {
        @nogroupmod, "torchbox.com", [
            v1 => [
                Database ~ databases
            ]
        ]
    }
}
