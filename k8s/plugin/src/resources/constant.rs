/// macros to define group used by the rook custom resources.
#[macro_export]
macro_rules! ceph_rook_group {
    () => {
        "ceph.rook.io"
    };
    ($s:literal) => {
        concat!(ceph_rook_group!(), "/", $s)
    };
}

/// Group of the rook custom resources.
pub(crate) const CEPH_ROOK_GROUP: &str = ceph_rook_group!();
/// Version of the rook custom resources.
pub(crate) const CEPH_ROOK_VERSION: &str = "v1";

/// Operator deployment name, also its app label and container.
pub(crate) const OPERATOR_DEPLOYMENT: &str = "rook-ceph-operator";
/// Label selector of the operator pod.
pub(crate) const OPERATOR_SELECTOR: &str = "app=rook-ceph-operator";
/// ConfigMap holding the operator settings.
pub(crate) const OPERATOR_CONFIG_MAP: &str = "rook-ceph-operator-config";
/// Annotation which triggers a rollout restart.
pub(crate) const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Toolbox deployment name, also its app label and container.
pub(crate) const TOOLBOX_DEPLOYMENT: &str = "rook-ceph-tools";
/// Label selector of the toolbox pod.
pub(crate) const TOOLBOX_SELECTOR: &str = "app=rook-ceph-tools";

/// ConfigMap with the mon endpoints.
pub(crate) const MON_ENDPOINTS_CONFIG_MAP: &str = "rook-ceph-mon-endpoints";
/// Key of the mon endpoints in `MON_ENDPOINTS_CONFIG_MAP`.
pub(crate) const MON_ENDPOINTS_KEY: &str = "data";
/// Key of the csi cluster config in `MON_ENDPOINTS_CONFIG_MAP`.
pub(crate) const CSI_CLUSTER_CONFIG_KEY: &str = "csi-cluster-config-json";
/// Secret with the mon keyring and cluster fsid.
pub(crate) const MON_SECRET: &str = "rook-ceph-mon";
/// Key of the fsid in `MON_SECRET`.
pub(crate) const MON_SECRET_FSID_KEY: &str = "fsid";
/// Name prefix of the mon deployments, services and pvcs.
pub(crate) const MON_PREFIX: &str = "rook-ceph-mon";
/// Container of the mon pods.
pub(crate) const MON_CONTAINER: &str = "mon";

/// Label which stops the operator from reconciling a deployment.
pub(crate) const DO_NOT_RECONCILE_LABEL: &str = ceph_rook_group!("do-not-reconcile");
/// Webhook that rejects edits to terminating custom resources.
pub(crate) const ROOK_WEBHOOK: &str = "rook-ceph-webhook";

/// Rook keeps the cluster config of each namespace here, in the operator pod.
pub(crate) fn ceph_config_path(cluster_namespace: &str) -> String {
    format!("/var/lib/rook/{cluster_namespace}/{cluster_namespace}.config")
}

/// Retries used when waiting on pods.
pub(crate) const POD_WAIT_ATTEMPTS: u32 = 60;
/// Interval between pod waits.
pub(crate) const POD_WAIT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// Csi driver suffix of the cephfs volumes.
pub(crate) const CEPHFS_CSI_DRIVER: &str = "cephfs.csi.ceph.com";
/// Pool created by the mgr which never holds images.
pub(crate) const BUILTIN_MGR_POOL: &str = "builtin-mgr";
