use crate::resources::{
    client::ClientSet,
    constant::{CEPH_ROOK_GROUP, CEPH_ROOK_VERSION},
};
use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams},
    discovery::ApiResource,
    CustomResource,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The ceph custom resources managed by rook, in the order they are torn down.
const CEPH_RESOURCES: [(&str, &str); 17] = [
    ("cephclusters", "CephCluster"),
    ("cephblockpoolradosnamespaces", "CephBlockPoolRadosNamespace"),
    ("cephblockpools", "CephBlockPool"),
    ("cephbucketnotifications", "CephBucketNotification"),
    ("cephbuckettopics", "CephBucketTopic"),
    ("cephclients", "CephClient"),
    ("cephcosidrivers", "CephCOSIDriver"),
    ("cephfilesystemmirrors", "CephFilesystemMirror"),
    ("cephfilesystems", "CephFilesystem"),
    ("cephfilesystemsubvolumegroups", "CephFilesystemSubVolumeGroup"),
    ("cephnfses", "CephNFS"),
    ("cephobjectrealms", "CephObjectRealm"),
    ("cephobjectstores", "CephObjectStore"),
    ("cephobjectstoreusers", "CephObjectStoreUser"),
    ("cephobjectzonegroups", "CephObjectZoneGroup"),
    ("cephobjectzones", "CephObjectZone"),
    ("cephrbdmirrors", "CephRBDMirror"),
];

/// A rook custom resource type, addressed by its plural name.
#[derive(Debug, Clone, PartialEq)]
pub struct CephResource {
    plural: String,
    kind: String,
}

impl CephResource {
    /// All the known ceph resources.
    pub fn all() -> Vec<CephResource> {
        CEPH_RESOURCES
            .iter()
            .map(|(plural, kind)| CephResource {
                plural: plural.to_string(),
                kind: kind.to_string(),
            })
            .collect()
    }
    /// The CephCluster resource.
    pub fn ceph_clusters() -> CephResource {
        Self::lookup("cephclusters")
    }
    /// Find a known resource by its plural, singular or kind name.
    /// Unknown names are taken verbatim as the plural of a resource in the rook group.
    pub fn lookup(name: &str) -> CephResource {
        let wanted = name.to_lowercase();
        CEPH_RESOURCES
            .iter()
            .find(|(plural, kind)| {
                *plural == wanted
                    || kind.to_lowercase() == wanted
                    || format!("{wanted}s") == *plural
                    || format!("{wanted}es") == *plural
            })
            .map(|(plural, kind)| CephResource {
                plural: plural.to_string(),
                kind: kind.to_string(),
            })
            .unwrap_or_else(|| CephResource {
                kind: name.to_string(),
                plural: name.to_string(),
            })
    }
    /// Plural name, as used in the api paths.
    pub fn plural(&self) -> &str {
        &self.plural
    }
    /// Kind of the resource.
    pub fn kind(&self) -> &str {
        &self.kind
    }
    /// Whether this is the CephCluster resource.
    pub fn is_ceph_cluster(&self) -> bool {
        self.plural == "cephclusters"
    }
    /// Api resource for the dynamic api.
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: CEPH_ROOK_GROUP.to_string(),
            version: CEPH_ROOK_VERSION.to_string(),
            api_version: format!("{CEPH_ROOK_GROUP}/{CEPH_ROOK_VERSION}"),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

impl std::fmt::Display for CephResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.plural)
    }
}

/// Operations on the rook custom resources of the cluster namespace.
#[async_trait(?Send)]
pub trait CustomResources {
    async fn list_resources(
        &self,
        resource: &CephResource,
    ) -> Result<Vec<DynamicObject>, kube::Error>;
    async fn get_resource(
        &self,
        resource: &CephResource,
        name: &str,
    ) -> Result<DynamicObject, kube::Error>;
    async fn delete_resource(&self, resource: &CephResource, name: &str)
        -> Result<(), kube::Error>;
    async fn patch_resource(
        &self,
        resource: &CephResource,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error>;
    async fn create_resource(
        &self,
        resource: &CephResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error>;
}

impl ClientSet {
    fn dynamic_api(&self, resource: &CephResource) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.kube_client(),
            self.cluster_namespace(),
            &resource.api_resource(),
        )
    }
}

#[async_trait(?Send)]
impl CustomResources for ClientSet {
    async fn list_resources(
        &self,
        resource: &CephResource,
    ) -> Result<Vec<DynamicObject>, kube::Error> {
        let list = self
            .dynamic_api(resource)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn get_resource(
        &self,
        resource: &CephResource,
        name: &str,
    ) -> Result<DynamicObject, kube::Error> {
        self.dynamic_api(resource).get(name).await
    }

    async fn delete_resource(
        &self,
        resource: &CephResource,
        name: &str,
    ) -> Result<(), kube::Error> {
        self.dynamic_api(resource)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn patch_resource(
        &self,
        resource: &CephResource,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error> {
        self.dynamic_api(resource)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn create_resource(
        &self,
        resource: &CephResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error> {
        self.dynamic_api(resource)
            .create(&PostParams::default(), object)
            .await
    }
}

/// The parts of the CephBlockPool spec the plugin reads.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephBlockPool",
    plural = "cephblockpools",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CephBlockPoolSpec {
    /// Pool name when it differs from the resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub mirroring: MirroringSpec,
}

/// Rbd mirroring settings of a pool.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MirroringSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<MirroringPeerSpec>,
}

/// Secrets holding the bootstrap tokens of the peer clusters.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MirroringPeerSpec {
    #[serde(default)]
    pub secret_names: Vec<String>,
}

impl CephBlockPool {
    /// Name of the ceph pool backing this resource.
    pub fn pool_name(&self) -> String {
        self.spec
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.metadata.name.clone().unwrap_or_default())
    }
    /// First non-empty peer secret, if the pool is mirrored.
    pub fn mirroring_peer_secret(&self) -> Option<&str> {
        if !self.spec.mirroring.enabled {
            return None;
        }
        self.spec
            .mirroring
            .peers
            .as_ref()?
            .secret_names
            .iter()
            .map(String::as_str)
            .find(|name| !name.is_empty())
    }
}

/// A rados namespace within a block pool.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephBlockPoolRadosNamespace",
    plural = "cephblockpoolradosnamespaces",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CephBlockPoolRadosNamespaceSpec {
    /// Rados namespace name when it differs from the resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub block_pool_name: String,
}

impl CephBlockPoolRadosNamespace {
    /// Name of the rados namespace in ceph.
    pub fn namespace_name(&self) -> String {
        self.spec
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.metadata.name.clone().unwrap_or_default())
    }
}

/// The parts of the CephCluster spec the plugin reads.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephCluster",
    plural = "cephclusters",
    namespaced
)]
pub struct CephClusterSpec {
    #[serde(default)]
    pub external: ExternalSpec,
}

/// Whether the cluster is managed outside of this kubernetes cluster.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
pub struct ExternalSpec {
    #[serde(default)]
    pub enable: bool,
}

/// The parts of the csi VolumeSnapshotContent the plugin reads.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "snapshot.storage.k8s.io",
    version = "v1",
    kind = "VolumeSnapshotContent",
    plural = "volumesnapshotcontents",
    status = "VolumeSnapshotContentStatus"
)]
pub struct VolumeSnapshotContentSpec {
    #[serde(default)]
    pub driver: String,
}

/// Status of a VolumeSnapshotContent.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotContentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_handle: Option<String>,
}
