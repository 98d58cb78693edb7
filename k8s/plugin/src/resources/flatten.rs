use crate::resources::{
    client::ClientSet,
    error::{Error, GetResource, ParseOutput},
    exec::{ceph, rbd, RemoteCommand},
};
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use serde::Deserialize;
use snafu::ResultExt;

#[derive(Deserialize)]
struct RbdInfo {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct RbdStatus {
    #[serde(default)]
    watchers: Vec<serde_json::Value>,
}

/// Check the pvc can be flattened, returning whether it was cloned from another pvc.
pub fn cloned_from_pvc(pvc: &PersistentVolumeClaim) -> Result<bool, Error> {
    let invalid = |reason: &str| Error::InvalidPvc {
        namespace: pvc.metadata.namespace.clone().unwrap_or_default(),
        name: pvc.metadata.name.clone().unwrap_or_default(),
        reason: reason.to_string(),
    };
    if pvc.metadata.deletion_timestamp.is_some() {
        return Err(invalid("it is deleting"));
    }
    let phase = pvc.status.as_ref().and_then(|status| status.phase.as_deref());
    if phase != Some("Bound") {
        return Err(invalid("it is not bound"));
    }
    let data_source = pvc
        .spec
        .as_ref()
        .and_then(|spec| spec.data_source.as_ref());
    match data_source.map(|source| source.kind.as_str()) {
        None => Ok(false),
        Some("PersistentVolumeClaim") => Ok(true),
        Some("VolumeSnapshot") => Ok(false),
        Some(_) => Err(invalid("it is not a cloned image")),
    }
}

/// Pool and image of the rbd volume backing a persistent volume.
pub fn volume_image(pv: &PersistentVolume) -> Result<(String, String), Error> {
    let name = pv.metadata.name.clone().unwrap_or_default();
    let attributes = pv
        .spec
        .as_ref()
        .and_then(|spec| spec.csi.as_ref())
        .and_then(|csi| csi.volume_attributes.as_ref());
    let attribute = |key: &str| {
        attributes
            .and_then(|attributes| attributes.get(key).cloned())
            .ok_or_else(|| Error::MissingField {
                resource: "persistentvolume".to_string(),
                name: name.clone(),
                field: format!("spec.csi.volumeAttributes.{key}"),
            })
    };
    Ok((attribute("pool")?, attribute("imageName")?))
}

async fn delete_temp_image(runner: &dyn RemoteCommand, pool: &str, image: &str) -> Result<(), Error> {
    let temp = format!("{image}-temp");
    let info = match rbd(runner, &["-p", pool, "info", &temp, "--format=json"]).await {
        Ok(info) => info,
        Err(error) => {
            tracing::error!(%error, "failed to run `rbd info` for rbd image {pool}/{temp}");
            return Ok(());
        }
    };
    let info: RbdInfo = serde_json::from_str(&info).context(ParseOutput {
        command: "rbd info",
    })?;

    tracing::info!("removing the temporary rbd image {pool}/{temp} if it exists");
    rbd(runner, &["-p", pool, "trash", "mv", &temp]).await?;
    if !info.id.is_empty() {
        let trashed = format!("{pool}/{}", info.id);
        ceph(runner, &["rbd", "task", "add", "trash", "remove", &trashed]).await?;
    }
    Ok(())
}

/// Flatten the image through the mgr, dropping the temporary clone image first.
pub async fn flatten_image(
    runner: &dyn RemoteCommand,
    pool: &str,
    image: &str,
    delete_temp: bool,
    allow_in_use: bool,
) -> Result<(), Error> {
    if !allow_in_use {
        let status = rbd(runner, &["-p", pool, "status", image, "--format=json"]).await?;
        let status: RbdStatus = serde_json::from_str(&status).context(ParseOutput {
            command: "rbd status",
        })?;
        if !status.watchers.is_empty() {
            return Err(Error::ImageInUse {
                pool: pool.to_string(),
                image: image.to_string(),
            });
        }
    }
    if delete_temp {
        delete_temp_image(runner, pool, image).await?;
    }
    tracing::info!("flattening the target rbd image {pool}/{image}");
    let target = format!("{pool}/{image}");
    ceph(runner, &["rbd", "task", "add", "flatten", &target]).await?;
    Ok(())
}

/// Flatten the rbd image of a cloned or restored pvc.
pub async fn flatten_rbd_pvc(
    client: &ClientSet,
    namespace: &str,
    pvc_name: &str,
    allow_in_use: bool,
) -> Result<(), Error> {
    let pvc = client
        .namespaced::<PersistentVolumeClaim>(namespace)
        .get(pvc_name)
        .await
        .context(GetResource {
            resource: "persistentvolumeclaim",
            name: pvc_name,
        })?;
    let delete_temp = cloned_from_pvc(&pvc)?;
    let pv_name = pvc
        .spec
        .as_ref()
        .and_then(|spec| spec.volume_name.clone())
        .unwrap_or_default();
    let pv = client
        .all::<PersistentVolume>()
        .get(&pv_name)
        .await
        .context(GetResource {
            resource: "persistentvolume",
            name: pv_name.as_str(),
        })?;
    let (pool, image) = volume_image(&pv)?;
    flatten_image(client, &pool, &image, delete_temp, allow_in_use).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::{
        api::core::v1::{
            CSIPersistentVolumeSource, PersistentVolumeClaimSpec, PersistentVolumeClaimStatus,
            PersistentVolumeSpec, TypedLocalObjectReference,
        },
        apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time},
    };
    use maplit::btreemap;

    fn pvc(phase: &str, source: Option<&str>) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some("rbd-pvc-clone".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                volume_name: Some("pvc-1234".to_string()),
                data_source: source.map(|kind| TypedLocalObjectReference {
                    kind: kind.to_string(),
                    name: "rbd-pvc".to_string(),
                    api_group: None,
                }),
                ..Default::default()
            }),
            status: Some(PersistentVolumeClaimStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn flattenable_pvcs() {
        assert!(cloned_from_pvc(&pvc("Bound", Some("PersistentVolumeClaim"))).unwrap());
        assert!(!cloned_from_pvc(&pvc("Bound", Some("VolumeSnapshot"))).unwrap());
        assert!(!cloned_from_pvc(&pvc("Bound", None)).unwrap());
        assert!(cloned_from_pvc(&pvc("Bound", Some("Secret"))).is_err());
        assert!(cloned_from_pvc(&pvc("Pending", Some("VolumeSnapshot"))).is_err());

        let mut deleting = pvc("Bound", None);
        deleting.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        let error = cloned_from_pvc(&deleting).unwrap_err();
        assert_eq!(
            error.to_string(),
            "PVC default/rbd-pvc-clone can't be flattened: it is deleting"
        );
    }

    #[test]
    fn csi_attributes() {
        let mut pv = PersistentVolume {
            metadata: ObjectMeta {
                name: Some("pvc-1234".to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                csi: Some(CSIPersistentVolumeSource {
                    driver: "rook-ceph.rbd.csi.ceph.com".to_string(),
                    volume_handle: "0001-0009-rook-ceph".to_string(),
                    volume_attributes: Some(btreemap! {
                        "pool".to_string() => "replicapool".to_string(),
                        "imageName".to_string() => "csi-vol-0c5b".to_string(),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: None,
        };
        assert_eq!(
            volume_image(&pv).unwrap(),
            ("replicapool".to_string(), "csi-vol-0c5b".to_string())
        );
        if let Some(csi) = pv.spec.as_mut().and_then(|spec| spec.csi.as_mut()) {
            csi.volume_attributes = None;
        }
        assert!(matches!(volume_image(&pv), Err(Error::MissingField { .. })));
    }
}
