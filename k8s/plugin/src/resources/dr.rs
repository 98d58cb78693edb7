use crate::resources::{
    client::ClientSet,
    crds::CephBlockPool,
    error::{DecodeToken, Error, ListResources, ParseToken},
    exec::{ceph, rbd},
};
use base64::Engine;
use kube::{api::ListParams, ResourceExt};
use serde::Deserialize;
use snafu::ResultExt;

/// Key of the bootstrap token in a peer secret.
const PEER_TOKEN_KEY: &str = "token";

/// How to reach the peer cluster, from an rbd mirroring bootstrap token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PeerToken {
    pub key: String,
    pub mon_host: String,
    pub client_id: String,
}

impl PeerToken {
    /// Decode the base64 json token held by the secret `name`.
    pub fn decode(name: &str, token: &str) -> Result<Self, Error> {
        let json = base64::engine::general_purpose::STANDARD
            .decode(token.trim())
            .context(DecodeToken { name })?;
        serde_json::from_slice(&json).context(ParseToken { name })
    }

    /// Arguments of `ceph` pointing at the peer cluster.
    pub fn status_args(&self, extra: &[String]) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            "--mon-host".to_string(),
            self.mon_host.clone(),
            "--id".to_string(),
            self.client_id.clone(),
            "--key".to_string(),
            self.key.clone(),
        ];
        if extra.is_empty() {
            args.extend(["--debug-ms".to_string(), "0".to_string()]);
        } else {
            args.extend(extra.iter().cloned());
        }
        args
    }
}

/// The last mirrored pool with a peer secret, and that secret.
pub fn mirrored_pool(pools: &[CephBlockPool]) -> Option<(&CephBlockPool, &str)> {
    pools
        .iter()
        .filter_map(|pool| pool.mirroring_peer_secret().map(|secret| (pool, secret)))
        .last()
}

/// Check the peer cluster and the mirroring daemon of the mirrored pool.
pub async fn health(client: &ClientSet, args: &[String]) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    tracing::info!("fetching the cephblockpools with mirroring enabled");
    let pools = client
        .cluster_api::<CephBlockPool>()
        .list(&ListParams::default())
        .await
        .context(ListResources {
            resource: "cephblockpools",
            namespace,
        })?;
    let Some((pool, secret)) = mirrored_pool(&pools.items) else {
        tracing::warn!("DR is not configured, cephblockpool with mirroring enabled not found");
        return Ok(());
    };
    tracing::info!("found {:?} cephblockpool with mirroring enabled", pool.name_any());

    let token = client
        .get_secret_value(namespace, secret, PEER_TOKEN_KEY)
        .await?;
    let token = PeerToken::decode(secret, &token)?;

    tracing::info!("running ceph status from peer cluster");
    let status_args = token.status_args(args);
    let status_args = status_args.iter().map(String::as_str).collect::<Vec<_>>();
    match ceph(client, &status_args).await {
        Ok(status) => tracing::info!("{}", status.trim_end()),
        Err(error) => {
            tracing::debug!(%error);
            tracing::warn!("failed to get ceph status from peer cluster, please check for network issues between the clusters");
            return Ok(());
        }
    }

    tracing::info!("running mirroring daemon health");
    let pool_name = pool.pool_name();
    match rbd(client, &["-p", &pool_name, "mirror", "pool", "status"]).await {
        Ok(status) => println!("{}", status.trim_end()),
        Err(error) => tracing::error!(%error, "failed to get the mirroring status"),
    }
    Ok(())
}
