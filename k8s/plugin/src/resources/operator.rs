use crate::resources::{
    client::ClientSet,
    constant::{OPERATOR_CONFIG_MAP, OPERATOR_DEPLOYMENT, RESTARTED_AT_ANNOTATION},
    error::{Error, PatchResource},
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams};
use snafu::ResultExt;

/// The pod template patch which makes the deployment roll out again.
pub(crate) fn restart_patch(restarted_at: &str) -> serde_json::Value {
    serde_json::json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": { RESTARTED_AT_ANNOTATION: restarted_at }
                }
            }
        }
    })
}

/// Restart the operator pod through a rollout of its deployment.
pub async fn restart(client: &ClientSet) -> Result<(), Error> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    client
        .namespaced::<Deployment>(client.operator_namespace())
        .patch(
            OPERATOR_DEPLOYMENT,
            &PatchParams::default(),
            &Patch::Strategic(restart_patch(&now)),
        )
        .await
        .context(PatchResource {
            resource: "deployment",
            name: OPERATOR_DEPLOYMENT,
        })?;
    tracing::info!("deployment.apps/{OPERATOR_DEPLOYMENT} restarted");
    Ok(())
}

/// Set an operator setting in its configmap.
pub async fn set(client: &ClientSet, key: &str, value: &str) -> Result<(), Error> {
    client
        .update_config_map(client.operator_namespace(), OPERATOR_CONFIG_MAP, key, value)
        .await
}

#[cfg(test)]
mod tests {
    use super::restart_patch;

    #[test]
    fn restart_annotation() {
        let patch = restart_patch("2024-01-02T03:04:05Z");
        assert_eq!(
            patch["spec"]["template"]["metadata"]["annotations"]["kubectl.kubernetes.io/restartedAt"],
            "2024-01-02T03:04:05Z"
        );
    }
}
