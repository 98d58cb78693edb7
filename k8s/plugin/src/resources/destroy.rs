use crate::resources::{
    client::ClientSet,
    constant::TOOLBOX_DEPLOYMENT,
    crds::{CephResource, CustomResources},
    error::{is_not_found, DeleteResource, Error, GetResource, ListResources, PatchResource},
    utils::confirm,
};
use k8s_openapi::api::{apps::v1::Deployment, batch::v1::Job};
use kube::api::{DeleteParams, ListParams, PropagationPolicy};
use snafu::ResultExt;
use std::{collections::BTreeSet, time::Duration};

/// Interval between the checks for leftover pods.
const CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// How long leftover pods are pruned for.
const MAX_EXECUTION_TIME: Duration = Duration::from_secs(15 * 60);
/// Leftover pods listed on each check.
const MAX_DISPLAYED_PODS: usize = 10;

/// The patch which lets a terminating resource go away.
pub(crate) fn finalizer_patch(resource: &CephResource) -> serde_json::Value {
    if resource.is_ceph_cluster() {
        serde_json::json!({
            "spec": { "cleanupPolicy": { "confirmation": "yes-really-destroy-data" } }
        })
    } else {
        serde_json::json!({ "metadata": { "finalizers": null } })
    }
}

/// Delete every ceph custom resource of the namespace, forcing the stuck ones.
pub async fn delete_custom_resources(
    resources: &dyn CustomResources,
    namespace: &str,
) -> Result<(), Error> {
    for resource in CephResource::all() {
        tracing::info!("getting resource kind {resource}");
        let items = match resources.list_resources(&resource).await {
            Ok(items) => items,
            Err(error) if is_not_found(&error) => {
                tracing::info!("the server could not find the requested resource: {resource}");
                continue;
            }
            Err(error) => {
                return Err(error).context(ListResources {
                    resource: resource.plural(),
                    namespace,
                })
            }
        };
        if items.is_empty() {
            tracing::info!("resource {resource} was not found on the cluster");
            continue;
        }

        for item in items {
            let name = item.metadata.name.clone().unwrap_or_default();
            tracing::info!("removing resource {resource}: {name}");
            match resources.delete_resource(&resource, &name).await {
                Ok(()) => {}
                Err(error) if is_not_found(&error) => {
                    tracing::info!("{error}");
                    continue;
                }
                Err(error) => {
                    return Err(error).context(DeleteResource {
                        resource: resource.plural(),
                        name: name.as_str(),
                    });
                }
            }

            let remaining = match resources.get_resource(&resource, &name).await {
                Ok(item) => Some(item),
                Err(error) if is_not_found(&error) => None,
                Err(error) => {
                    return Err(error).context(GetResource {
                        resource: resource.plural(),
                        name: name.as_str(),
                    });
                }
            };
            if remaining.is_some() {
                tracing::info!(
                    "resource {name:?} is not yet deleted, applying patch to remove finalizer..."
                );
                match resources
                    .patch_resource(&resource, &name, &finalizer_patch(&resource))
                    .await
                {
                    Ok(()) => {}
                    Err(error) if is_not_found(&error) => {
                        tracing::info!("{error}");
                        continue;
                    }
                    Err(error) => {
                        return Err(error).context(PatchResource {
                            resource: resource.plural(),
                            name: name.as_str(),
                        });
                    }
                }
                if resource.is_ceph_cluster() {
                    tracing::info!("added cleanup policy to the cephcluster CR {name:?}");
                }
                match resources.delete_resource(&resource, &name).await {
                    Ok(()) => {}
                    Err(error) if is_not_found(&error) => {}
                    Err(error) => {
                        return Err(error).context(DeleteResource {
                            resource: resource.plural(),
                            name: name.as_str(),
                        });
                    }
                }
            }
            tracing::info!("resource {name} was deleted");
        }
    }
    Ok(())
}

async fn prune(client: &ClientSet, app: &str) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    let selector = format!("rook_cluster={namespace},app={app}");
    let params = ListParams::default().labels(&selector);

    let deployments = match client.namespaced::<Deployment>(namespace).list(&params).await {
        Ok(list) => list.items,
        Err(error) if is_not_found(&error) => vec![],
        Err(error) => {
            return Err(error).context(ListResources {
                resource: "deployments",
                namespace,
            })
        }
    };
    for deployment in deployments {
        let name = deployment.metadata.name.unwrap_or_default();
        tracing::info!("deployment {name} exists removing....");
        client.delete_deployment(namespace, &name).await?;
    }

    let jobs_api = client.namespaced::<Job>(namespace);
    let jobs = match jobs_api.list(&params).await {
        Ok(list) => list.items,
        Err(error) if is_not_found(&error) => vec![],
        Err(error) => {
            return Err(error).context(ListResources {
                resource: "jobs",
                namespace,
            })
        }
    };
    let delete_params = DeleteParams {
        grace_period_seconds: Some(0),
        propagation_policy: Some(PropagationPolicy::Foreground),
        ..Default::default()
    };
    for job in jobs {
        let name = job.metadata.name.unwrap_or_default();
        tracing::info!("job {name} exists removing....");
        match jobs_api.delete(&name, &delete_params).await {
            Ok(_) => {}
            Err(error) if is_not_found(&error) => {}
            Err(source) => {
                return Err(Error::DeleteResource {
                    resource: "job".to_string(),
                    name,
                    source,
                })
            }
        }
    }
    Ok(())
}

/// Wait for the pods of the cluster to go away, pruning what keeps them alive.
async fn ensure_cluster_is_empty(client: &ClientSet) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    let selector = format!("rook_cluster={namespace}");
    let deadline = tokio::time::Instant::now() + MAX_EXECUTION_TIME;
    tracing::info!("waiting to clean up resources");
    loop {
        tokio::time::sleep(CHECK_INTERVAL).await;
        if tokio::time::Instant::now() >= deadline {
            tracing::info!("timeout reached, exiting cleanup loop");
            return Ok(());
        }
        let pods = client.get_pods(namespace, &selector, "").await?;
        if pods.is_empty() {
            return Ok(());
        }
        tracing::info!("{} pods still alive, removing....", pods.len());
        for pod in pods.iter().take(MAX_DISPLAYED_PODS) {
            tracing::info!(
                "pod {} still alive",
                pod.metadata.name.as_deref().unwrap_or_default()
            );
        }
        let apps = pods
            .iter()
            .filter_map(|pod| pod.metadata.labels.as_ref()?.get("app").cloned())
            .collect::<BTreeSet<_>>();
        for app in apps {
            if let Err(error) = prune(client, &app).await {
                tracing::warn!(%error, "failed to prune the resources of {app}");
            }
        }
    }
}

/// Delete the ceph cluster and all its resources.
pub async fn destroy_cluster(client: &ClientSet) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    confirm(
        &format!("Are you sure you want to destroy the cluster in namespace {namespace:?}? If absolutely certain, enter: yes-really-destroy-cluster"),
        "yes-really-destroy-cluster",
    )?;
    delete_custom_resources(client, namespace).await?;
    client.delete_deployment(namespace, TOOLBOX_DEPLOYMENT).await?;
    ensure_cluster_is_empty(client).await?;
    tracing::info!("done");
    Ok(())
}
