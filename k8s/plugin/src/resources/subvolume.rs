use crate::resources::{
    client::{secret_value, ClientSet},
    constant::{CEPHFS_CSI_DRIVER, CSI_CLUSTER_CONFIG_KEY, MON_ENDPOINTS_CONFIG_MAP},
    crds::{CephCluster, VolumeSnapshotContent},
    error::{is_not_found, Error, ListResources, ParseClusterConfig, ParseOutput},
    exec::{to_strings, ExecTarget, RemoteCommand},
    utils::{print_table, table_printer, CreateRows, GetHeaderRow, OutputFormat, SUBVOLUME_HEADERS},
};
use k8s_openapi::api::core::v1::{PersistentVolume, Secret};
use kube::api::ListParams;
use prettytable::Row;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::BTreeSet;

/// Exit code of `ceph fs subvolume info` when a clone is still pending.
const EAGAIN: i32 = 11;
/// Subvolume state of a deleted subvolume whose snapshots were kept.
const SNAPSHOT_RETAINED: &str = "snapshot-retained";
/// Name prefix of the secrets with the cephfs provisioner credentials.
const CEPHFS_PROVISIONER_SECRET: &str = "rook-csi-cephfs-provisioner";
/// Rados namespace of the csi omap objects.
const CSI_RADOS_NAMESPACE: &str = "csi";

/// Whether a subvolume is still referenced from kubernetes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SubvolumeState {
    InUse,
    Stale,
    StaleWithSnapshot,
}

/// A cephfs subvolume, with its state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subvolume {
    pub filesystem: String,
    pub name: String,
    pub group: String,
    pub state: SubvolumeState,
}

impl CreateRows for Subvolume {
    fn create_rows(&self) -> Vec<Row> {
        vec![row![self.filesystem, self.name, self.group, self.state]]
    }
}

impl GetHeaderRow for Subvolume {
    fn get_header_row(&self) -> Row {
        (*SUBVOLUME_HEADERS).clone()
    }
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Filesystem {
    name: String,
    #[serde(default)]
    metadata_pool: String,
}

#[derive(Debug, Deserialize)]
struct SubvolumeInfo {
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct CsiClusterConfig {
    #[serde(default, rename = "clusterID")]
    cluster_id: String,
    #[serde(default)]
    monitors: Vec<String>,
}

/// The subvolume name of a cephfs subvolume path, such as
/// `/volumes/csi/csi-vol-6a99b552-fdcc-441d-b1e6-a522a85a503d/5f4e4caa-f835-41ba-83c1-5bbd57f6aedf`.
pub fn subvolume_name_from_path(path: &str) -> Option<&str> {
    path.split('/').nth(3)
}

/// The snapshot id of a csi snapshot handle, everything after the fifth `-`.
pub fn snapshot_handle_id(handle: &str) -> Option<&str> {
    let parts = handle.splitn(6, '-').collect::<Vec<_>>();
    match parts.as_slice() {
        [_, _, _, _, _, id] => Some(*id),
        _ => None,
    }
}

/// The csi id of a subvolume or snapshot name, everything after the second `-`.
pub fn csi_id(name: &str) -> Option<&str> {
    let parts = name.splitn(3, '-').collect::<Vec<_>>();
    match parts.as_slice() {
        [_, _, id] => Some(*id),
        _ => None,
    }
}

/// Omap object of a subvolume, `csi-vol-<id>` is kept in `csi.volume.<id>`.
pub fn volume_omap(subvolume: &str) -> Option<String> {
    csi_id(subvolume).map(|id| format!("csi.volume.{id}"))
}

/// Omap object of a snapshot, `csi-snap-<id>` is kept in `csi.snap.<id>`.
pub fn snapshot_omap(snapshot: &str) -> Option<String> {
    csi_id(snapshot).map(|id| format!("csi.snap.{id}"))
}

/// Subvolumes referenced by the cephfs persistent volumes.
pub fn referenced_subvolumes(pvs: &[PersistentVolume]) -> BTreeSet<String> {
    pvs.iter()
        .filter_map(|pv| pv.spec.as_ref()?.csi.as_ref())
        .filter(|csi| csi.driver.contains(CEPHFS_CSI_DRIVER))
        .filter_map(|csi| {
            let path = csi
                .volume_attributes
                .as_ref()
                .and_then(|attributes| attributes.get("subvolumePath"))
                .map(String::as_str)
                .unwrap_or_default();
            let name = subvolume_name_from_path(path);
            if name.is_none() {
                tracing::error!("failed to get name from subvolumepath: {path}");
            }
            name.map(ToString::to_string)
        })
        .collect()
}

/// Snapshot ids referenced by the cephfs volume snapshot contents.
pub fn referenced_snapshots(contents: &[VolumeSnapshotContent]) -> BTreeSet<String> {
    contents
        .iter()
        .filter(|content| content.spec.driver.contains(CEPHFS_CSI_DRIVER))
        .filter_map(|content| content.status.as_ref()?.snapshot_handle.as_deref())
        .filter_map(snapshot_handle_id)
        .map(ToString::to_string)
        .collect()
}

/// The first monitor of the last cluster of the csi cluster config.
pub fn external_mon(config: &str) -> Result<Option<String>, Error> {
    let clusters: Vec<CsiClusterConfig> =
        serde_json::from_str(config).context(ParseClusterConfig {
            name: MON_ENDPOINTS_CONFIG_MAP,
        })?;
    let mut mon = None;
    for cluster in clusters {
        match cluster.monitors.into_iter().next() {
            Some(first) if !first.is_empty() => mon = Some(first),
            _ => {
                return Err(Error::MissingField {
                    resource: "configmap".to_string(),
                    name: MON_ENDPOINTS_CONFIG_MAP.to_string(),
                    field: format!("monitors of clusterID {:?}", cluster.cluster_id),
                })
            }
        }
    }
    Ok(mon)
}

/// Arguments which point the ceph tools at an external cluster, if the cluster is external.
pub async fn external_args(client: &ClientSet) -> Result<Vec<String>, Error> {
    let namespace = client.cluster_namespace();
    let clusters = client
        .cluster_api::<CephCluster>()
        .list(&ListParams::default())
        .await
        .context(ListResources {
            resource: "cephclusters",
            namespace,
        })?;
    if !clusters.items.iter().any(|cluster| cluster.spec.external.enable) {
        return Ok(vec![]);
    }

    let secrets = client
        .cluster_api::<Secret>()
        .list(&ListParams::default())
        .await
        .context(ListResources {
            resource: "secrets",
            namespace,
        })?;
    let (mut admin_id, mut admin_key) = (String::new(), String::new());
    if let Some(secret) = secrets.items.iter().find(|secret| {
        secret
            .metadata
            .name
            .as_deref()
            .unwrap_or_default()
            .starts_with(CEPHFS_PROVISIONER_SECRET)
    }) {
        let name = secret.metadata.name.clone().unwrap_or_default();
        if secret.data.is_none() {
            return Err(Error::MissingField {
                resource: "secret".to_string(),
                name,
                field: "data".to_string(),
            });
        }
        admin_id = secret_value(secret, "adminID").unwrap_or_default();
        admin_key = secret_value(secret, "adminKey").unwrap_or_default();
    }

    let config = client
        .get_config_map_value(namespace, MON_ENDPOINTS_CONFIG_MAP, CSI_CLUSTER_CONFIG_KEY)
        .await?;
    let mon = external_mon(&config)?.unwrap_or_default();
    Ok(to_strings(&["-m", &mon, "--id", &admin_id, "--key", &admin_key]))
}

/// Runs the ceph and rados commands which manage the cephfs subvolumes.
pub struct Subvolumes<'a> {
    runner: &'a dyn RemoteCommand,
    extra_args: Vec<String>,
}

impl<'a> Subvolumes<'a> {
    /// Every command gets the `extra_args`, see `external_args`.
    pub fn new(runner: &'a dyn RemoteCommand, extra_args: Vec<String>) -> Self {
        Self { runner, extra_args }
    }

    async fn run(&self, command: &str, args: &[&str]) -> Result<String, Error> {
        let mut args = to_strings(args);
        args.extend(self.extra_args.iter().cloned());
        self.runner.run(&ExecTarget::Operator, command, &args).await
    }

    async fn ceph_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, Error> {
        let mut args = args.to_vec();
        args.extend(["--format", "json"]);
        let output = self.run("ceph", &args).await?;
        let command = format!("ceph {}", args.join(" "));
        serde_json::from_str(&output).context(ParseOutput { command })
    }

    async fn filesystems(&self) -> Result<Vec<Filesystem>, Error> {
        let filesystems: Vec<Filesystem> = self.ceph_json(&["fs", "ls"]).await?;
        if filesystems.is_empty() {
            return Err(Error::NoFilesystem {});
        }
        Ok(filesystems)
    }

    async fn metadata_pool(&self, fs: &str) -> Result<String, Error> {
        self.filesystems()
            .await?
            .into_iter()
            .find(|filesystem| filesystem.name == fs && !filesystem.metadata_pool.is_empty())
            .map(|filesystem| filesystem.metadata_pool)
            .ok_or_else(|| Error::MetadataPoolNotFound { fs: fs.to_string() })
    }

    async fn groups(&self, fs: &str) -> Result<Vec<Named>, Error> {
        let groups: Vec<Named> = self.ceph_json(&["fs", "subvolumegroup", "ls", fs]).await?;
        if groups.is_empty() {
            return Err(Error::NoSubvolumeGroup { fs: fs.to_string() });
        }
        Ok(groups)
    }

    async fn omap_value(&self, pool: &str, object: &str, key: &str) -> Result<String, Error> {
        let output = self
            .run(
                "rados",
                &[
                    "getomapval",
                    object,
                    key,
                    "-p",
                    pool,
                    "--namespace",
                    CSI_RADOS_NAMESPACE,
                    "/dev/stdout",
                ],
            )
            .await?;
        Ok(output.trim().to_string())
    }

    async fn rados_in_pool(&self, pool: &str, args: &[&str]) -> Result<(), Error> {
        let mut args = args.to_vec();
        args.extend(["-p", pool, "--namespace", CSI_RADOS_NAMESPACE]);
        self.run("rados", &args).await?;
        Ok(())
    }

    /// List the subvolumes of every filesystem and group, deleting their stale snapshots.
    pub async fn list(
        &self,
        referenced: &BTreeSet<String>,
        snapshot_ids: &BTreeSet<String>,
        stale_only: bool,
    ) -> Result<Vec<Subvolume>, Error> {
        let mut listed = vec![];
        for fs in self.filesystems().await? {
            let groups = match self.groups(&fs.name).await {
                Ok(groups) => groups,
                Err(error @ Error::NoSubvolumeGroup { .. }) => return Err(error),
                Err(error) => {
                    tracing::error!(%error, "failed to get subvolume groups");
                    continue;
                }
            };
            for group in groups {
                let subvolumes: Vec<Named> = match self
                    .ceph_json(&["fs", "subvolume", "ls", &fs.name, &group.name])
                    .await
                {
                    Ok(subvolumes) => subvolumes,
                    Err(error) => {
                        tracing::error!(%error, "failed to get subvolumes of {:?}", fs.name);
                        continue;
                    }
                };
                for subvolume in subvolumes {
                    let state = self
                        .classify(
                            &fs.name,
                            &subvolume.name,
                            &group.name,
                            referenced,
                            snapshot_ids,
                            stale_only,
                        )
                        .await?;
                    if let Some(state) = state {
                        listed.push(Subvolume {
                            filesystem: fs.name.clone(),
                            name: subvolume.name,
                            group: group.name.clone(),
                            state,
                        });
                    }
                }
            }
        }
        Ok(listed)
    }

    async fn classify(
        &self,
        fs: &str,
        subvolume: &str,
        group: &str,
        referenced: &BTreeSet<String>,
        snapshot_ids: &BTreeSet<String>,
        stale_only: bool,
    ) -> Result<Option<SubvolumeState>, Error> {
        let info: Result<SubvolumeInfo, _> = self
            .ceph_json(&["fs", "subvolume", "info", fs, subvolume, group])
            .await;
        let info = match info {
            Ok(info) => info,
            Err(Error::CommandFailed {
                code: Some(EAGAIN), ..
            }) => {
                tracing::warn!("Found pending clone: {subvolume:?}");
                tracing::warn!(
                    "Please delete the pending pv if any before deleting the subvolume {subvolume}"
                );
                tracing::warn!("To avoid stale resources, please scale down the cephfs deployment before deleting the subvolume.");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };

        if referenced.contains(subvolume) {
            return Ok((!stale_only).then_some(SubvolumeState::InUse));
        }
        if info.state == SNAPSHOT_RETAINED {
            return Ok(None);
        }
        if self.check_snapshots(fs, subvolume, group, snapshot_ids).await? {
            return Ok(Some(SubvolumeState::StaleWithSnapshot));
        }
        Ok(Some(SubvolumeState::Stale))
    }

    /// Whether the subvolume has snapshots, the ones no snapshot content refers to are deleted.
    async fn check_snapshots(
        &self,
        fs: &str,
        subvolume: &str,
        group: &str,
        snapshot_ids: &BTreeSet<String>,
    ) -> Result<bool, Error> {
        let snapshots: Vec<Named> = match self
            .ceph_json(&["fs", "subvolume", "snapshot", "ls", fs, subvolume, group])
            .await
        {
            Ok(snapshots) => snapshots,
            Err(error) => {
                tracing::error!(%error, "failed to get subvolume snapshots of {fs:?}/{subvolume:?}/{group:?}");
                return Ok(false);
            }
        };
        for snapshot in &snapshots {
            let referenced = csi_id(&snapshot.name).map_or(false, |id| snapshot_ids.contains(id));
            if !referenced {
                self.delete_snapshot(fs, subvolume, group, &snapshot.name)
                    .await?;
            }
        }
        Ok(!snapshots.is_empty())
    }

    async fn delete_snapshot(
        &self,
        fs: &str,
        subvolume: &str,
        group: &str,
        snapshot: &str,
    ) -> Result<(), Error> {
        tracing::info!("Deleting the omap object and key for snapshot {snapshot:?}");
        let pool = self.metadata_pool(fs).await?;
        if let Some(object) = snapshot_omap(snapshot) {
            let content = self.omap_value(&pool, &object, "csi.snapname").await?;
            self.rados_in_pool(&pool, &["rm", &object]).await?;
            tracing::info!("omap object:{object:?} deleted");
            if content.is_empty() {
                tracing::info!("No snapshot content found for snapshot");
            } else {
                let key = format!("csi.snap.{content}");
                self.rados_in_pool(&pool, &["rmomapkey", "csi.snaps.default", &key])
                    .await?;
                tracing::info!("omap key:{key:?} deleted");
            }
        }
        self.run(
            "ceph",
            &["fs", "subvolume", "snapshot", "rm", fs, subvolume, snapshot, group],
        )
        .await?;
        Ok(())
    }

    async fn nfs_export(&self, cluster: &str, subvolume_id: &str) -> Option<String> {
        let exports = match self.run("ceph", &["nfs", "export", "ls", cluster]).await {
            Ok(exports) if !exports.trim().is_empty() => exports,
            Ok(_) => {
                tracing::info!("No export path found for cluster {cluster}");
                return None;
            }
            Err(error) => {
                tracing::info!("No export path found for cluster {cluster}: {error}");
                return None;
            }
        };
        match serde_json::from_str::<Vec<String>>(&exports) {
            Ok(exports) => exports
                .into_iter()
                .filter(|export| export.contains(subvolume_id))
                .last(),
            Err(error) => {
                tracing::info!("failed to unmarshal export list: {error}");
                None
            }
        }
    }

    async fn delete_omap(&self, fs: &str, subvolume: &str) -> Result<(), Error> {
        tracing::info!("Deleting the omap object and key for subvolume {subvolume:?}");
        let pool = self.metadata_pool(fs).await?;
        let Some(object) = volume_omap(subvolume) else {
            return Ok(());
        };
        let subvolume_id = csi_id(subvolume).unwrap_or_default();

        let pv_key = match self.omap_value(&pool, &object, "csi.volname").await {
            Ok(pv) if !pv.is_empty() => Some(format!("csi.volume.{pv}")),
            Ok(_) => {
                tracing::info!("No PV found for subvolume {subvolume}");
                None
            }
            Err(error) => {
                tracing::info!("No PV found for subvolume {subvolume}: {error}");
                None
            }
        };

        let nfs_cluster = match self.omap_value(&pool, &object, "csi.nfs.cluster").await {
            Ok(cluster) if !cluster.is_empty() => Some(cluster),
            Ok(_) => None,
            Err(error) => {
                tracing::info!("nfs cluster not found for subvolume {subvolume}: {pool} {error}");
                None
            }
        };
        if let Some(cluster) = nfs_cluster {
            match self.nfs_export(&cluster, subvolume_id).await {
                Some(path) => {
                    self.run("ceph", &["nfs", "export", "delete", &cluster, &path])
                        .await?;
                    tracing::info!("nfs export: {cluster:?} {path:?} deleted");
                }
                None => tracing::info!("export path not found for subvol {subvolume:?}: {cluster:?}"),
            }
        }

        self.rados_in_pool(&pool, &["rm", &object]).await?;
        tracing::info!("omap object:{object:?} deleted");
        if let Some(key) = pv_key {
            self.rados_in_pool(&pool, &["rmomapkey", "csi.volumes.default", &key])
                .await?;
            tracing::info!("omap key:{key:?} deleted");
        }
        Ok(())
    }

    /// Delete a subvolume no persistent volume refers to, keeping its snapshots.
    pub async fn delete(
        &self,
        referenced: &BTreeSet<String>,
        subvolume: &str,
        fs: &str,
        group: &str,
    ) -> Result<(), Error> {
        if referenced.contains(subvolume) {
            tracing::info!("subvolume {fs}/{group}/{subvolume} is not stale");
            return Ok(());
        }
        self.delete_omap(fs, subvolume).await?;
        self.run(
            "ceph",
            &["fs", "subvolume", "rm", fs, subvolume, group, "--retain-snapshots"],
        )
        .await?;
        tracing::info!("subvolume {fs}/{group}/{subvolume} deleted");
        Ok(())
    }
}

async fn k8s_subvolumes(client: &ClientSet) -> Result<BTreeSet<String>, Error> {
    let pvs = client
        .all::<PersistentVolume>()
        .list(&ListParams::default())
        .await
        .context(ListResources {
            resource: "persistentvolumes",
            namespace: "",
        })?;
    Ok(referenced_subvolumes(&pvs.items))
}

async fn k8s_snapshots(client: &ClientSet) -> Result<BTreeSet<String>, Error> {
    match client
        .all::<VolumeSnapshotContent>()
        .list(&ListParams::default())
        .await
    {
        Ok(contents) => Ok(referenced_snapshots(&contents.items)),
        Err(error) if is_not_found(&error) => {
            tracing::info!("volumesnapshotcontents resource not found, skipping snapshot checks");
            Ok(BTreeSet::new())
        }
        Err(source) => Err(Error::ListResources {
            resource: "volumesnapshotcontents".to_string(),
            namespace: String::new(),
            source,
        }),
    }
}

/// Print the cephfs subvolumes and whether they're stale.
pub async fn ls(client: &ClientSet, stale_only: bool, output: &OutputFormat) -> Result<(), Error> {
    let referenced = k8s_subvolumes(client).await?;
    let snapshot_ids = k8s_snapshots(client).await?;
    let subvolumes = Subvolumes::new(client, external_args(client).await?);
    let listed = subvolumes
        .list(&referenced, &snapshot_ids, stale_only)
        .await?;
    if listed.is_empty() && output == &OutputFormat::Table {
        table_printer((*SUBVOLUME_HEADERS).clone(), vec![]);
        return Ok(());
    }
    print_table(output, listed)
}

/// Delete a stale cephfs subvolume.
pub async fn delete(client: &ClientSet, subvolume: &str, fs: &str, group: &str) -> Result<(), Error> {
    let referenced = k8s_subvolumes(client).await?;
    let subvolumes = Subvolumes::new(client, external_args(client).await?);
    subvolumes.delete(&referenced, subvolume, fs, group).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::crds::{VolumeSnapshotContentSpec, VolumeSnapshotContentStatus};
    use k8s_openapi::api::core::v1::{CSIPersistentVolumeSource, PersistentVolumeSpec};
    use maplit::btreemap;

    #[test]
    fn names_from_paths() {
        assert_eq!(
            subvolume_name_from_path(
                "/volumes/csi/csi-vol-6a99b552-fdcc-441d-b1e6-a522a85a503d/5f4e4caa-f835-41ba-83c1-5bbd57f6aedf"
            ),
            Some("csi-vol-6a99b552-fdcc-441d-b1e6-a522a85a503d")
        );
        assert_eq!(subvolume_name_from_path("/volumes/csi"), None);
        assert_eq!(subvolume_name_from_path(""), None);
    }

    #[test]
    fn snapshot_handles() {
        assert_eq!(
            snapshot_handle_id("0001-0009-rook-ceph-0000000000000001-17b95621-58e8-4676-bc6a-39e928f19d23"),
            Some("17b95621-58e8-4676-bc6a-39e928f19d23")
        );
        assert_eq!(snapshot_handle_id("0001-0009-rook"), None);
    }

    #[test]
    fn omap_names() {
        assert_eq!(
            volume_omap("csi-vol-427774b4-340b-11ed-8d66-0242ac110005").as_deref(),
            Some("csi.volume.427774b4-340b-11ed-8d66-0242ac110005")
        );
        assert_eq!(
            volume_omap("nfs-export-427774b4-340b-11ed-8d66-0242ac110005").as_deref(),
            Some("csi.volume.427774b4-340b-11ed-8d66-0242ac110005")
        );
        assert_eq!(
            volume_omap("csi-427774b4-340b-11ed-8d66-0242ac11000").as_deref(),
            Some("csi.volume.340b-11ed-8d66-0242ac11000")
        );
        assert_eq!(volume_omap("csi-427774b440b11ed8d660242ac11000"), None);
        assert_eq!(volume_omap(""), None);
        assert_eq!(
            snapshot_omap("csi-snap-17b95621-58e8").as_deref(),
            Some("csi.snap.17b95621-58e8")
        );
    }

    fn pv(driver: &str, path: &str) -> PersistentVolume {
        PersistentVolume {
            spec: Some(PersistentVolumeSpec {
                csi: Some(CSIPersistentVolumeSource {
                    driver: driver.to_string(),
                    volume_handle: "handle".to_string(),
                    volume_attributes: Some(btreemap! {
                        "subvolumePath".to_string() => path.to_string(),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn kubernetes_references() {
        let pvs = vec![
            pv("rook-ceph.cephfs.csi.ceph.com", "/volumes/csi/csi-vol-a/uuid"),
            pv("rook-ceph.rbd.csi.ceph.com", "/volumes/csi/csi-vol-b/uuid"),
            pv("rook-ceph.cephfs.csi.ceph.com", "/broken"),
            PersistentVolume::default(),
        ];
        assert_eq!(
            referenced_subvolumes(&pvs),
            BTreeSet::from(["csi-vol-a".to_string()])
        );

        let content = |driver: &str, handle: Option<&str>| {
            let mut content = VolumeSnapshotContent::new("snapcontent", VolumeSnapshotContentSpec {
                driver: driver.to_string(),
            });
            content.status = Some(VolumeSnapshotContentStatus {
                snapshot_handle: handle.map(ToString::to_string),
            });
            content
        };
        let contents = vec![
            content(
                "rook-ceph.cephfs.csi.ceph.com",
                Some("0001-0009-rook-ceph-0000000000000001-17b95621-58e8"),
            ),
            content("rook-ceph.cephfs.csi.ceph.com", None),
            content(
                "rook-ceph.rbd.csi.ceph.com",
                Some("0001-0009-rook-ceph-0000000000000001-aaaa"),
            ),
        ];
        assert_eq!(
            referenced_snapshots(&contents),
            BTreeSet::from(["17b95621-58e8".to_string()])
        );
    }

    #[test]
    fn external_monitors() {
        let config = r#"[
            {"clusterID":"rook-ceph","monitors":["10.0.0.1:6789","10.0.0.2:6789"]},
            {"clusterID":"other","monitors":["10.0.1.1:6789"]}
        ]"#;
        assert_eq!(external_mon(config).unwrap().as_deref(), Some("10.0.1.1:6789"));
        assert_eq!(external_mon("[]").unwrap(), None);
        assert!(matches!(
            external_mon(r#"[{"clusterID":"rook-ceph","monitors":[]}]"#),
            Err(Error::MissingField { .. })
        ));
        assert!(matches!(
            external_mon("not json"),
            Err(Error::ParseClusterConfig { .. })
        ));
    }

    #[test]
    fn subvolume_rows() {
        let subvolume = Subvolume {
            filesystem: "myfs".to_string(),
            name: "csi-vol-a".to_string(),
            group: "csi".to_string(),
            state: SubvolumeState::StaleWithSnapshot,
        };
        let row = &subvolume.create_rows()[0];
        assert_eq!(
            row.get_cell(3).map(|c| c.get_content()).as_deref(),
            Some("stale-with-snapshot")
        );
        assert_eq!(
            serde_json::to_value(&subvolume).unwrap()["state"],
            "stale-with-snapshot"
        );
    }
}
