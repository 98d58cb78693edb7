use crate::resources::{
    constant::{POD_WAIT_ATTEMPTS, POD_WAIT_INTERVAL},
    error::{
        is_not_found, DeleteResource, Error, GetResource, InferConfig, KubeClient,
        KubeConfigLoad, KubeConfigRead, ListResources, NamespaceNotFound, PatchResource,
        ScaleDeployment, UpdateResource,
    },
};
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Namespace, Pod, Secret},
};
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client,
};
use snafu::ResultExt;
use std::{collections::BTreeMap, convert::TryFrom, path::PathBuf};

/// ClientSet is a wrapper of the kubernetes client and the namespaces of the rook operator
/// and of the ceph cluster.
#[derive(Clone)]
pub struct ClientSet {
    client: Client,
    operator_namespace: String,
    cluster_namespace: String,
}

impl ClientSet {
    /// Create a new ClientSet, from the config file if provided, otherwise with default.
    pub async fn new(
        kube_config_path: Option<PathBuf>,
        context: Option<String>,
        operator_namespace: String,
        cluster_namespace: String,
    ) -> Result<Self, Error> {
        let options = KubeConfigOptions {
            context,
            ..Default::default()
        };
        let config = match kube_config_path {
            Some(config_path) => {
                let kube_config = Kubeconfig::read_from(&config_path).context(KubeConfigRead {
                    path: config_path.clone(),
                })?;
                kube::Config::from_custom_kubeconfig(kube_config, &options)
                    .await
                    .context(KubeConfigLoad)?
            }
            None if options.context.is_some() => kube::Config::from_kubeconfig(&options)
                .await
                .context(KubeConfigLoad)?,
            None => kube::Config::infer().await.context(InferConfig)?,
        };
        let client = Client::try_from(config).context(KubeClient)?;
        Ok(Self::from_client(
            client,
            operator_namespace,
            cluster_namespace,
        ))
    }

    /// Create a new ClientSet from an existing client.
    pub fn from_client(client: Client, operator_namespace: String, cluster_namespace: String) -> Self {
        Self {
            client,
            operator_namespace,
            cluster_namespace,
        }
    }

    /// Get a clone of the inner `kube::Client`.
    pub fn kube_client(&self) -> Client {
        self.client.clone()
    }

    /// Namespace where the rook operator runs.
    pub fn operator_namespace(&self) -> &str {
        &self.operator_namespace
    }

    /// Namespace of the CephCluster.
    pub fn cluster_namespace(&self) -> &str {
        &self.cluster_namespace
    }

    /// Api for namespaced resources of the given namespace.
    pub fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Api for namespaced resources of the cluster namespace.
    pub fn cluster_api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        self.namespaced(&self.cluster_namespace)
    }

    /// Api for cluster scoped resources.
    pub fn all<K>(&self) -> Api<K>
    where
        K: kube::Resource,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }

    /// Both the operator and the cluster namespace must exist before running any command.
    pub async fn check_namespaces(&self) -> Result<(), Error> {
        let namespaces: Api<Namespace> = self.all();
        namespaces
            .get(&self.operator_namespace)
            .await
            .context(NamespaceNotFound {
                kind: "operator",
                namespace: &self.operator_namespace,
            })?;
        namespaces
            .get(&self.cluster_namespace)
            .await
            .context(NamespaceNotFound {
                kind: "cephCluster",
                namespace: &self.cluster_namespace,
            })?;
        Ok(())
    }

    /// Fetch list of pods associated to given label_selector & field_selector
    pub async fn get_pods(
        &self,
        namespace: &str,
        label_selector: &str,
        field_selector: &str,
    ) -> Result<Vec<Pod>, Error> {
        let mut list_params = ListParams::default()
            .labels(label_selector)
            .fields(field_selector)
            .limit(100);

        let mut pods: Vec<Pod> = vec![];

        let pods_api: Api<Pod> = self.namespaced(namespace);
        // Paginate to get 100 contents at a time
        loop {
            let mut result = pods_api.list(&list_params).await.context(ListResources {
                resource: format!("pods ({label_selector})"),
                namespace,
            })?;
            pods.append(&mut result.items);
            match result.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    list_params = list_params.continue_token(token.as_str())
                }
                _ => break,
            };
        }
        Ok(pods)
    }

    /// Wait for a running pod which is not being deleted, matching the label selector.
    pub async fn wait_for_pod_to_run(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Pod, Error> {
        for _ in 0 .. POD_WAIT_ATTEMPTS {
            let pods = self
                .get_pods(namespace, label_selector, "status.phase=Running")
                .await?;
            if let Some(pod) = pods
                .into_iter()
                .find(|pod| pod.metadata.deletion_timestamp.is_none())
            {
                return Ok(pod);
            }
            tracing::info!(
                "waiting for pod with label {label_selector:?} in namespace {namespace:?} to be running"
            );
            tokio::time::sleep(POD_WAIT_INTERVAL).await;
        }
        Err(Error::PodNotRunning {
            selector: label_selector.to_string(),
            namespace: namespace.to_string(),
        })
    }

    /// Wait until no pod matches the label selector.
    pub async fn wait_for_pods_to_be_deleted(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<(), Error> {
        for _ in 0 .. POD_WAIT_ATTEMPTS {
            if self.get_pods(namespace, label_selector, "").await?.is_empty() {
                return Ok(());
            }
            tracing::info!("waiting for pods with label {label_selector:?} to be deleted");
            tokio::time::sleep(POD_WAIT_INTERVAL).await;
        }
        Err(Error::Timeout {
            what: format!("pods with label {label_selector} to be deleted"),
            attempts: POD_WAIT_ATTEMPTS,
        })
    }

    /// Get a deployment.
    pub async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, Error> {
        self.namespaced::<Deployment>(namespace)
            .get(name)
            .await
            .context(GetResource {
                resource: "deployment",
                name,
            })
    }

    /// Set the replicas of a deployment through its scale subresource.
    pub async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        self.namespaced::<Deployment>(namespace)
            .patch_scale(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .context(ScaleDeployment { name, replicas })?;
        tracing::info!("deployment.apps/{name} scaled to {replicas}");
        Ok(())
    }

    /// Delete a deployment, a missing deployment is not an error.
    pub async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error> {
        tracing::info!("removing deployment {name}");
        self.delete_if_exists::<Deployment>(namespace, name).await
    }

    /// Delete a namespaced object, a missing object is not an error.
    pub async fn delete_if_exists<K>(&self, namespace: &str, name: &str) -> Result<(), Error>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let kind = K::kind(&Default::default()).to_lowercase();
        match self
            .namespaced::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(error) if is_not_found(&error) => {
                tracing::info!("the server could not find the requested {kind}: {name}");
                Ok(())
            }
            Err(source) => Err(Error::DeleteResource {
                resource: kind,
                name: name.to_string(),
                source,
            }),
        }
    }

    /// Merge patch a deployment's metadata labels, a `None` value removes the label.
    pub async fn patch_deployment_labels(
        &self,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, Option<String>>,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({ "metadata": { "labels": labels } });
        self.namespaced::<Deployment>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .context(PatchResource {
                resource: "deployment",
                name,
            })?;
        Ok(())
    }

    /// Get a configmap.
    pub async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, Error> {
        self.namespaced::<ConfigMap>(namespace)
            .get(name)
            .await
            .context(GetResource {
                resource: "configmap",
                name,
            })
    }

    /// Get a single key of a configmap.
    pub async fn get_config_map_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<String, Error> {
        let config_map = self.get_config_map(namespace, name).await?;
        config_map
            .data
            .and_then(|mut data| data.remove(key))
            .ok_or_else(|| Error::MissingField {
                resource: "configmap".to_string(),
                name: name.to_string(),
                field: format!("data.{key}"),
            })
    }

    /// Set a single key of a configmap, creating the data if needed.
    pub async fn update_config_map(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), Error> {
        let api = self.namespaced::<ConfigMap>(namespace);
        let mut config_map = self.get_config_map(namespace, name).await?;
        config_map
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        api.replace(name, &PostParams::default(), &config_map)
            .await
            .context(UpdateResource {
                resource: "configmap",
                name,
            })?;
        tracing::info!("configmap/{name} patched");
        Ok(())
    }

    /// Get a single key of a secret, as a string.
    pub async fn get_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<String, Error> {
        let secret = self
            .namespaced::<Secret>(namespace)
            .get(name)
            .await
            .context(GetResource {
                resource: "secret",
                name,
            })?;
        secret_value(&secret, key).ok_or_else(|| Error::MissingField {
            resource: "secret".to_string(),
            name: name.to_string(),
            field: format!("data.{key}"),
        })
    }
}

/// Get the decoded value of a secret key, `stringData` included.
pub(crate) fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| String::from_utf8_lossy(&value.0).to_string())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key).cloned())
        })
}
