//! Removes a deployment and, optionally, everything listed in its attached resources annotation.
//!
//! The deployment is always deleted first. Attached resources are only deleted with `--all`,
//! in the order they're listed in the annotation. Unlike `status`, an annotation that can't be
//! decoded is an error here, since it would otherwise silently leave resources behind.
use crate::client::{self, ResourceClient};
use crate::k8s_types::extensions;
use crate::registry::{AttachedKind, AttachedResource, Registry, RegistryError};
use crate::resource::{ObjectId, ObjectIdRef, ATTACHED_RESOURCES_ANNOTATION};
use crate::status::{load_deployment, DeploymentLoadError};

use std::fmt::{self, Display};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UndeployOptions {
    /// don't ask for confirmation
    pub force: bool,
    /// delete the attached resources as well
    pub all: bool,
}

#[derive(Debug)]
pub enum UndeployError {
    Load(DeploymentLoadError),
    Registry(RegistryError),
    Delete {
        kind: String,
        name: String,
        error: client::Error,
    },
    Io(io::Error),
}

impl From<DeploymentLoadError> for UndeployError {
    fn from(err: DeploymentLoadError) -> UndeployError {
        UndeployError::Load(err)
    }
}
impl From<RegistryError> for UndeployError {
    fn from(err: RegistryError) -> UndeployError {
        UndeployError::Registry(err)
    }
}
impl From<io::Error> for UndeployError {
    fn from(err: io::Error) -> UndeployError {
        UndeployError::Io(err)
    }
}

impl Display for UndeployError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UndeployError::Load(e) => Display::fmt(e, f),
            UndeployError::Registry(e) => write!(f, "error: {}", e),
            UndeployError::Delete { kind, name, error } => {
                write!(f, "error: cannot delete {} <{}>: {}", kind, name, error.message())
            }
            UndeployError::Io(e) => write!(f, "error: {}", e),
        }
    }
}

impl std::error::Error for UndeployError {}

#[derive(Debug, Clone, PartialEq)]
pub struct UndeployPlan {
    pub deployment: ObjectId,
    pub attached: Vec<AttachedResource>,
    pub delete_attached: bool,
}

impl UndeployPlan {
    /// Reads the deployment and its attached resources
    pub fn load<C: ResourceClient>(
        client: &C,
        namespace: &str,
        name: &str,
        delete_attached: bool,
    ) -> Result<UndeployPlan, UndeployError> {
        let deployment = load_deployment(client, namespace, name)?;
        let registry =
            Registry::parse_strict(deployment.metadata.annotation(ATTACHED_RESOURCES_ANNOTATION))?;
        for warning in registry.warnings() {
            log::warn!("{}", warning);
        }
        Ok(UndeployPlan {
            deployment: ObjectId::new(namespace, name),
            attached: registry.entries().to_vec(),
            delete_attached,
        })
    }

    /// Asks whether to go ahead. Only `y` or `yes` counts as agreement, and a closed input
    /// counts as no.
    pub fn confirm<R: BufRead, W: Write>(&self, mut input: R, output: &mut W) -> io::Result<bool> {
        write!(output, "continue [y/N]? ")?;
        output.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        let answer = answer.trim().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    /// Deletes the deployment, then the attached resources if the plan includes them. Stops at
    /// the first failure.
    pub fn execute<C: ResourceClient, W: Write>(
        &self,
        client: &C,
        output: &mut W,
    ) -> Result<(), UndeployError> {
        log::info!("Removing deployment {}", self.deployment);
        write!(output, "deleting deployment <{}>: ", self.deployment)?;
        let result = client.delete(extensions::v1beta1::Deployment, &self.deployment.as_id_ref());
        report_deletion(result, "deployment", self.deployment.name(), output)?;

        if !self.delete_attached {
            return Ok(());
        }
        for resource in self.attached.iter() {
            write!(output, "deleting {} <{}>: ", resource.kind, resource.name)?;
            let id = ObjectIdRef::new(self.deployment.namespace(), resource.name.as_str());
            let result = client.delete(resource.kind.k8s_type(), &id);
            report_deletion(result, resource.kind.as_str(), resource.name.as_str(), output)?;
        }
        Ok(())
    }
}

fn report_deletion<W: Write>(
    result: Result<(), client::Error>,
    kind: &str,
    name: &str,
    output: &mut W,
) -> Result<(), UndeployError> {
    match result {
        Ok(()) => {
            writeln!(output, "ok")?;
            Ok(())
        }
        Err(error) => {
            writeln!(output, "failed")?;
            Err(UndeployError::Delete {
                kind: kind.to_owned(),
                name: name.to_owned(),
                error,
            })
        }
    }
}

fn attached_note(kind: AttachedKind) -> &'static str {
    match kind {
        AttachedKind::Database => " (database will be dropped)",
        AttachedKind::Volume => " (contents will be deleted)",
        AttachedKind::Service | AttachedKind::Ingress | AttachedKind::Secret => "",
    }
}

impl Display for UndeployPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "\nthis deployment will be removed:")?;
        writeln!(f, "- {}", self.deployment)?;

        if !self.attached.is_empty() {
            if self.delete_attached {
                writeln!(f, "\nthe following attached resources will also be deleted:")?;
                for resource in self.attached.iter() {
                    writeln!(
                        f,
                        "- {}: {}{}",
                        resource.kind,
                        resource.name,
                        attached_note(resource.kind)
                    )?;
                }
            } else {
                writeln!(
                    f,
                    "\nthe following attached resources will NOT be deleted (use --all):"
                )?;
                for resource in self.attached.iter() {
                    writeln!(f, "- {}: {}", resource.kind, resource.name)?;
                }
            }
        }
        writeln!(f)
    }
}

/// Runs the whole undeploy command: load, show the plan, confirm and delete. Returns false if
/// the user declined.
pub fn run<C, R, W>(
    client: &C,
    namespace: &str,
    name: &str,
    options: UndeployOptions,
    input: R,
    output: &mut W,
) -> Result<bool, UndeployError>
where
    C: ResourceClient,
    R: BufRead,
    W: Write,
{
    let plan = UndeployPlan::load(client, namespace, name, options.all)?;
    write!(output, "{}", plan)?;

    if !options.force && !plan.confirm(input, output)? {
        writeln!(output, "okay, aborting")?;
        return Ok(false);
    }
    plan.execute(client, output)?;
    Ok(true)
}
