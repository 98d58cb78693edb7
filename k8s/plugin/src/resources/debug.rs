use crate::resources::{
    client::ClientSet,
    constant::DO_NOT_RECONCILE_LABEL,
    error::{is_already_exists, Error},
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::PostParams;
use maplit::btreemap;
use std::collections::BTreeMap;

/// How a daemon deployment is taken over: a debug copy or a maintenance copy.
/// Both replace the daemon with a sleeping pod holding the same volumes.
#[derive(Debug, Clone, Copy, PartialEq, strum_macros::AsRefStr, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PauseMode {
    Debug,
    Maintenance,
}

impl PauseMode {
    /// Name of the copy of the given deployment.
    pub fn copy_name(&self, deployment: &str) -> String {
        format!("{}-{}", self.original_name(deployment), self.as_ref())
    }
    /// Name of the original deployment, with or without the mode suffix.
    pub fn original_name<'a>(&self, deployment: &'a str) -> &'a str {
        deployment
            .strip_suffix(&format!("-{}", self.as_ref()))
            .unwrap_or(deployment)
    }
}

/// Label selector of the pods of a daemon deployment.
pub fn pod_selector(deployment: &Deployment) -> String {
    let template_labels = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.metadata.as_ref())
        .and_then(|meta| meta.labels.as_ref());
    if let Some(labels) = template_labels {
        if let (Some(daemon_type), Some(daemon_id)) =
            (labels.get("ceph_daemon_type"), labels.get("ceph_daemon_id"))
        {
            return format!("ceph_daemon_type={daemon_type},ceph_daemon_id={daemon_id}");
        }
    }
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.selector.match_labels.as_ref())
        .map(|labels| {
            labels
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

/// Label selector of the pods of the daemon itself, leaving out the pods of a sleeping copy.
pub fn daemon_pod_selector(deployment: &Deployment) -> String {
    let not_paused = format!("{DO_NOT_RECONCILE_LABEL}!=true");
    match pod_selector(deployment) {
        selector if selector.is_empty() => not_paused,
        selector => format!("{selector},{not_paused}"),
    }
}

/// Build the sleeping copy of a deployment.
pub fn paused_deployment(
    original: &Deployment,
    mode: PauseMode,
    alternate_image: Option<&str>,
) -> Result<Deployment, Error> {
    let name = original.metadata.name.clone().unwrap_or_default();
    let missing = |field: &str| Error::MissingField {
        resource: "deployment".to_string(),
        name: name.clone(),
        field: field.to_string(),
    };

    let mut copy = original.clone();
    copy.metadata.name = Some(mode.copy_name(&name));
    copy.metadata.resource_version = None;
    copy.metadata.uid = None;
    copy.metadata.creation_timestamp = None;
    copy.metadata.owner_references = None;
    copy.metadata.managed_fields = None;
    copy.metadata.generation = None;
    copy.metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(DO_NOT_RECONCILE_LABEL.to_string(), "true".to_string());
    copy.status = None;

    let spec = copy.spec.as_mut().ok_or_else(|| missing("spec"))?;
    spec.replicas = Some(1);
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(DO_NOT_RECONCILE_LABEL.to_string(), "true".to_string());

    let pod_spec = spec
        .template
        .spec
        .as_mut()
        .ok_or_else(|| missing("spec.template.spec"))?;
    let container = pod_spec
        .containers
        .first_mut()
        .ok_or_else(|| missing("spec.template.spec.containers"))?;
    if let Some(image) = alternate_image {
        tracing::info!("setting {mode} image to {image}");
        container.image = Some(image.to_string());
    }
    container.liveness_probe = None;
    container.startup_probe = None;
    container.command = Some(vec!["sleep".to_string(), "infinity".to_string()]);
    container.args = Some(vec![]);
    Ok(copy)
}

/// Replace the daemon of `deployment` with a sleeping copy and wait for it to run.
pub async fn start(
    client: &ClientSet,
    mode: PauseMode,
    deployment: &str,
    alternate_image: Option<&str>,
) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    let original = client.get_deployment(namespace, deployment).await?;
    tracing::info!("deployment {deployment} exists");
    let copy = paused_deployment(&original, mode, alternate_image)?;
    let copy_name = mode.copy_name(deployment);
    let selector = pod_selector(&original);
    let daemon_selector = daemon_pod_selector(&original);

    client
        .patch_deployment_labels(
            namespace,
            deployment,
            btreemap! { DO_NOT_RECONCILE_LABEL.to_string() => Some("true".to_string()) },
        )
        .await?;
    client.scale_deployment(namespace, deployment, 0).await?;
    tracing::info!("waiting for the pods of deployment {deployment} to be deleted");
    client
        .wait_for_pods_to_be_deleted(namespace, &daemon_selector)
        .await?;

    tracing::info!("setting {mode} command to main container");
    match client
        .namespaced::<Deployment>(namespace)
        .create(&PostParams::default(), &copy)
        .await
    {
        Ok(_) => tracing::info!("deployment {copy_name} created"),
        Err(error) if is_already_exists(&error) => {
            tracing::info!("deployment {copy_name} already exists")
        }
        Err(source) => {
            return Err(Error::CreateResource {
                resource: "deployment".to_string(),
                name: copy_name,
                source,
            })
        }
    }

    let pod = client.wait_for_pod_to_run(namespace, &selector).await?;
    tracing::info!(
        "pod {} is ready for {mode}",
        pod.metadata.name.unwrap_or_default()
    );
    Ok(())
}

/// Remove the sleeping copy and give the daemon back to the operator.
pub async fn stop(client: &ClientSet, mode: PauseMode, deployment: &str) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    let original = mode.original_name(deployment);
    let copy_name = mode.copy_name(original);

    tracing::info!("removing {mode} mode from deployment {original}");
    client.delete_deployment(namespace, &copy_name).await?;
    client
        .patch_deployment_labels(
            namespace,
            original,
            btreemap! { DO_NOT_RECONCILE_LABEL.to_string() => None },
        )
        .await?;
    client.scale_deployment(namespace, original, 1).await?;
    tracing::info!("successfully deleted {mode} deployment and restored deployment {original:?}");
    Ok(())
}
