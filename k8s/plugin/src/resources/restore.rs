use crate::resources::{
    client::ClientSet,
    constant::{OPERATOR_DEPLOYMENT, ROOK_WEBHOOK},
    crds::{CephResource, CustomResources},
    error::{is_not_found, CreateResource, Error, ListResources, PatchResource, UpdateResource},
    utils::confirm,
};
use k8s_openapi::{
    api::{
        admissionregistration::v1::ValidatingWebhookConfiguration,
        apps::v1::Deployment,
        core::v1::{ConfigMap, PersistentVolumeClaim, Secret, Service},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
    NamespaceResourceScope,
};
use kube::{
    api::{Api, DeleteParams, DynamicObject, ListParams, PostParams},
    Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use snafu::ResultExt;
use std::fmt::Debug;

/// The first terminating resource, with the given name if any.
pub fn find_deleted<'a>(items: &'a [DynamicObject], name: Option<&str>) -> Option<&'a DynamicObject> {
    items.iter().find(|item| {
        item.metadata.deletion_timestamp.is_some()
            && name.map_or(true, |name| item.metadata.name.as_deref() == Some(name))
    })
}

/// Drop the owner references pointing at `uid`, returning whether any was dropped.
pub fn strip_owner(meta: &mut ObjectMeta, uid: &str) -> bool {
    let Some(owners) = meta.owner_references.as_mut() else {
        return false;
    };
    let before = owners.len();
    owners.retain(|owner| owner.uid != uid);
    let stripped = owners.len() != before;
    if owners.is_empty() {
        meta.owner_references = None;
    }
    stripped
}

/// A copy of the resource which can be created again.
pub fn recreatable(item: &DynamicObject) -> DynamicObject {
    let mut item = item.clone();
    let meta = &mut item.metadata;
    meta.resource_version = None;
    meta.uid = None;
    meta.self_link = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.managed_fields = None;
    item
}

async fn remove_owner_refs<K>(client: &ClientSet, uid: &str) -> Result<(), Error>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
    <K as Resource>::DynamicType: Default,
{
    let namespace = client.cluster_namespace();
    let kind = K::kind(&Default::default()).to_lowercase();
    let api: Api<K> = client.namespaced(namespace);
    let items = api
        .list(&ListParams::default())
        .await
        .context(ListResources {
            resource: kind.as_str(),
            namespace,
        })?;
    for mut item in items.items {
        if !strip_owner(item.meta_mut(), uid) {
            continue;
        }
        let name = item.name_any();
        tracing::info!("removing owner references for {kind} {name}");
        api.replace(&name, &PostParams::default(), &item)
            .await
            .context(UpdateResource {
                resource: kind.as_str(),
                name: name.as_str(),
            })?;
        tracing::info!("removed ownerReference for {kind}: {name}");
    }
    Ok(())
}

async fn scale_down_operator(client: &ClientSet) -> Result<(), Error> {
    let namespace = client.operator_namespace();
    let Err(error) = client
        .scale_deployment(namespace, OPERATOR_DEPLOYMENT, 0)
        .await
    else {
        return Ok(());
    };
    let ready = match client.get_deployment(namespace, OPERATOR_DEPLOYMENT).await {
        Ok(deployment) => deployment
            .status
            .and_then(|status| status.ready_replicas)
            .unwrap_or_default(),
        Err(get_error) if get_error.is_not_found() => 0,
        Err(get_error) => return Err(get_error),
    };
    if ready != 0 {
        return Err(error);
    }
    Ok(())
}

/// Bring back a custom resource which is stuck deleting.
pub async fn restore_deleted(
    client: &ClientSet,
    crd: &str,
    name: Option<&str>,
) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    let resource = CephResource::lookup(crd);
    tracing::info!("detecting which resources to restore for crd {crd:?}");
    let items = client
        .list_resources(&resource)
        .await
        .context(ListResources {
            resource: resource.plural(),
            namespace,
        })?;
    if items.is_empty() {
        tracing::info!("no ceph CRDs found to restore");
        return Ok(());
    }
    let Some(item) = find_deleted(&items, name) else {
        tracing::info!("nothing to do here, no {crd:?} resources in deleted state");
        return Ok(());
    };
    let cr_name = item.name_any();
    let uid = item.metadata.uid.clone().unwrap_or_default();

    tracing::info!("restoring CR {cr_name}");
    confirm(
        &format!("The resource {cr_name} was found deleted. Do you want to restore it? yes | no"),
        "yes",
    )?;
    tracing::info!("proceeding with restoring deleting CR");

    tracing::info!("scaling down the operator");
    scale_down_operator(client).await?;

    tracing::info!("deleting validating webhook {ROOK_WEBHOOK} if present");
    match client
        .all::<ValidatingWebhookConfiguration>()
        .delete(ROOK_WEBHOOK, &DeleteParams::default())
        .await
    {
        Ok(_) => {}
        Err(error) if is_not_found(&error) => {}
        Err(source) => {
            return Err(Error::DeleteResource {
                resource: "validatingwebhookconfiguration".to_string(),
                name: ROOK_WEBHOOK.to_string(),
                source,
            })
        }
    }

    tracing::info!("removing ownerreferences from resources with matching uid {uid}");
    remove_owner_refs::<Secret>(client, &uid).await?;
    remove_owner_refs::<ConfigMap>(client, &uid).await?;
    remove_owner_refs::<Service>(client, &uid).await?;
    remove_owner_refs::<Deployment>(client, &uid).await?;
    remove_owner_refs::<PersistentVolumeClaim>(client, &uid).await?;

    tracing::info!("removing finalizers from {resource}/{cr_name}");
    client
        .patch_resource(
            &resource,
            &cr_name,
            &serde_json::json!({ "metadata": { "finalizers": null } }),
        )
        .await
        .context(PatchResource {
            resource: resource.plural(),
            name: cr_name.as_str(),
        })?;

    tracing::info!("re-creating the CR {resource} from dynamic resource");
    client
        .create_resource(&resource, &recreatable(item))
        .await
        .context(CreateResource {
            resource: resource.plural(),
            name: cr_name.as_str(),
        })?;

    tracing::info!("scaling up the operator");
    client
        .scale_deployment(client.operator_namespace(), OPERATOR_DEPLOYMENT, 1)
        .await?;
    tracing::info!("CR is successfully restored. Please watch the operator logs and check the crd");
    Ok(())
}
