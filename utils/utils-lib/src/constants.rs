/// Various common constants used by the plugin.

/// The name of the product the plugin operates.
pub const PRODUCT_NAME: &str = "rook-ceph";

/// Default namespace of the CephCluster, also the operator's unless told otherwise.
pub const DEFAULT_CLUSTER_NAMESPACE: &str = "rook-ceph";

/// Environment variable which, when set to `true`, skips every interactive confirmation.
pub const SKIP_PROMPTS_ENV: &str = "ROOK_PLUGIN_SKIP_PROMPTS";

/// Environment variable to override the CephCluster namespace.
pub const CLUSTER_NAMESPACE_ENV: &str = "ROOK_CEPH_NAMESPACE";

/// Environment variable to override the operator namespace.
pub const OPERATOR_NAMESPACE_ENV: &str = "ROOK_OPERATOR_NAMESPACE";

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";
