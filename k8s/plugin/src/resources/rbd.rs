use crate::resources::{
    client::ClientSet,
    constant::BUILTIN_MGR_POOL,
    crds::{CephBlockPool, CephBlockPoolRadosNamespace},
    error::{Error, ListResources},
    exec::{rbd, RemoteCommand},
    utils::{optional_cell, print_table, CreateRows, GetHeaderRow, OutputFormat, RBD_IMAGE_HEADERS},
};
use kube::{api::ListParams, ResourceExt};
use prettytable::Row;
use serde::Serialize;
use snafu::ResultExt;

/// An rbd image of a block pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RbdImage {
    pub pool_name: String,
    /// None when the pool, or its namespace, has no image.
    pub image_name: Option<String>,
    pub namespace: Option<String>,
}

impl CreateRows for RbdImage {
    fn create_rows(&self) -> Vec<Row> {
        vec![row![
            self.pool_name,
            optional_cell(self.image_name.as_ref()),
            optional_cell(self.namespace.as_ref())
        ]]
    }
}

impl GetHeaderRow for RbdImage {
    fn get_header_row(&self) -> Row {
        (*RBD_IMAGE_HEADERS).clone()
    }
}

/// A block pool with the rados namespaces created in it.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolNamespaces {
    pub pool: String,
    pub namespaces: Vec<String>,
}

/// Group the rados namespaces under their block pool, skipping the mgr pool.
pub fn pool_namespaces(
    pools: &[CephBlockPool],
    namespaces: &[CephBlockPoolRadosNamespace],
) -> Vec<PoolNamespaces> {
    pools
        .iter()
        .filter(|pool| pool.name_any() != BUILTIN_MGR_POOL)
        .map(|pool| PoolNamespaces {
            pool: pool.pool_name(),
            namespaces: namespaces
                .iter()
                .filter(|namespace| namespace.spec.block_pool_name == pool.name_any())
                .map(CephBlockPoolRadosNamespace::namespace_name)
                .collect(),
        })
        .collect()
}

async fn images(
    runner: &dyn RemoteCommand,
    pool: &str,
    namespace: Option<&str>,
) -> Result<Vec<RbdImage>, Error> {
    let pool_arg = format!("--pool={pool}");
    let namespace_arg = namespace.map(|namespace| format!("--namespace={namespace}"));
    let mut args = vec!["ls", pool_arg.as_str()];
    if let Some(namespace_arg) = &namespace_arg {
        args.push(namespace_arg.as_str());
    }
    let output = rbd(runner, &args).await?;
    let image = |image_name: Option<String>| RbdImage {
        pool_name: pool.to_string(),
        image_name,
        namespace: namespace.map(ToString::to_string),
    };
    let images = output
        .split_whitespace()
        .map(|name| image(Some(name.to_string())))
        .collect::<Vec<_>>();
    if images.is_empty() {
        return Ok(vec![image(None)]);
    }
    Ok(images)
}

/// List the images of each pool, and of each of its rados namespaces.
pub async fn list_images(
    runner: &dyn RemoteCommand,
    pools: &[PoolNamespaces],
) -> Result<Vec<RbdImage>, Error> {
    let mut listed = vec![];
    for pool in pools {
        listed.extend(images(runner, &pool.pool, None).await?);
        for namespace in &pool.namespaces {
            listed.extend(images(runner, &pool.pool, Some(namespace)).await?);
        }
    }
    Ok(listed)
}

/// Print the rbd images of every block pool of the cluster.
pub async fn ls(client: &ClientSet, output: &OutputFormat) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    let pools = client
        .cluster_api::<CephBlockPool>()
        .list(&ListParams::default())
        .await
        .context(ListResources {
            resource: "cephblockpools",
            namespace,
        })?;
    let rados_namespaces = client
        .cluster_api::<CephBlockPoolRadosNamespace>()
        .list(&ListParams::default())
        .await
        .context(ListResources {
            resource: "cephblockpoolradosnamespaces",
            namespace,
        })?;
    let pools = pool_namespaces(&pools.items, &rados_namespaces.items);
    let images = list_images(client, &pools).await?;
    print_table(output, images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::crds::{CephBlockPoolRadosNamespaceSpec, CephBlockPoolSpec};

    #[test]
    fn namespaces_per_pool() {
        let pools = vec![
            CephBlockPool::new("builtin-mgr", CephBlockPoolSpec {
                name: Some(".mgr".to_string()),
                ..Default::default()
            }),
            CephBlockPool::new("replicapool", CephBlockPoolSpec::default()),
            CephBlockPool::new("ecpool", CephBlockPoolSpec::default()),
        ];
        let namespaces = vec![
            CephBlockPoolRadosNamespace::new("ns-a", CephBlockPoolRadosNamespaceSpec {
                name: None,
                block_pool_name: "replicapool".to_string(),
            }),
            CephBlockPoolRadosNamespace::new("ns-b", CephBlockPoolRadosNamespaceSpec {
                name: Some("tenant-b".to_string()),
                block_pool_name: "replicapool".to_string(),
            }),
            CephBlockPoolRadosNamespace::new("ns-c", CephBlockPoolRadosNamespaceSpec {
                name: None,
                block_pool_name: "missing".to_string(),
            }),
        ];
        assert_eq!(
            pool_namespaces(&pools, &namespaces),
            vec![
                PoolNamespaces {
                    pool: "replicapool".to_string(),
                    namespaces: vec!["ns-a".to_string(), "tenant-b".to_string()],
                },
                PoolNamespaces {
                    pool: "ecpool".to_string(),
                    namespaces: vec![],
                },
            ]
        );
    }

    #[test]
    fn image_rows() {
        let image = RbdImage {
            pool_name: "replicapool".to_string(),
            image_name: None,
            namespace: Some("ns-a".to_string()),
        };
        let row = &image.create_rows()[0];
        assert_eq!(row.get_cell(0).map(|c| c.get_content()).as_deref(), Some("replicapool"));
        assert_eq!(row.get_cell(1).map(|c| c.get_content()).as_deref(), Some("---"));
        assert_eq!(row.get_cell(2).map(|c| c.get_content()).as_deref(), Some("ns-a"));
        assert_eq!(image.get_header_row().len(), 3);
    }
}
