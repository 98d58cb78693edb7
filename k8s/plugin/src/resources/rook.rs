use crate::resources::{
    client::ClientSet,
    crds::{CephResource, CustomResources},
    error::{Error, ListResources},
    exec::{ceph, to_strings, ExecTarget, RemoteCommand},
    mons,
    utils::{confirm, is_pre_release, render, trim_go_version, OutputFormat},
};
use snafu::ResultExt;

/// Run `rook version` in the operator pod.
pub async fn version(runner: &dyn RemoteCommand) -> Result<String, Error> {
    let output = runner
        .run(&ExecTarget::Operator, "rook", &to_strings(&["version"]))
        .await?;
    Ok(trim_go_version(&output))
}

/// Check that the operator pod answers, warning about pre-release operators.
pub async fn verify_operator(runner: &dyn RemoteCommand) -> Result<(), Error> {
    let version = version(runner).await?;
    tracing::info!("{version}");
    if is_pre_release(&version) {
        tracing::warn!("rook version '{version}' is running a pre-release version of rook");
    }
    Ok(())
}

/// Which resources `rook status` reports on.
pub fn status_resources(resource: Option<&str>) -> Vec<CephResource> {
    match resource {
        Some("all") => CephResource::all(),
        Some(resource) => vec![CephResource::lookup(resource)],
        None => vec![CephResource::ceph_clusters()],
    }
}

/// The rendered status of each custom resource, with the resource name.
pub async fn status_reports(
    resources: &dyn CustomResources,
    namespace: &str,
    resource: &CephResource,
    output: &OutputFormat,
) -> Result<Vec<(String, String)>, Error> {
    let items = resources
        .list_resources(resource)
        .await
        .context(ListResources {
            resource: resource.plural(),
            namespace,
        })?;
    items
        .iter()
        .map(|item| {
            let name = item.metadata.name.clone().unwrap_or_default();
            let status = item
                .data
                .get("status")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            let rendered = render(output, &name, &status)?;
            Ok((name, rendered))
        })
        .collect()
}

/// Print the status of the ceph custom resources.
pub async fn status(
    client: &ClientSet,
    resource: Option<&str>,
    output: &OutputFormat,
) -> Result<(), Error> {
    for resource in status_resources(resource) {
        let reports =
            status_reports(client, client.cluster_namespace(), &resource, output).await?;
        if reports.is_empty() {
            tracing::info!("resource {resource} was not found on the cluster");
        }
        for (name, status) in reports {
            tracing::info!("{resource} {name}");
            println!("{}", status.trim_end());
        }
    }
    Ok(())
}

/// Shell script removing osds with the rook binary of the operator pod.
pub(crate) fn purge_osd_script(endpoints: &str, admin_key: &str, osd_ids: &str, force: bool) -> String {
    format!(
        "export ROOK_MON_ENDPOINTS={endpoints} ROOK_CEPH_USERNAME=client.admin ROOK_CEPH_SECRET={admin_key} ROOK_CONFIG_DIR=/var/lib/rook && rook ceph osd remove --osd-ids={osd_ids} --force-osd-removal={force}"
    )
}

/// Permanently remove osds from the cluster.
pub async fn purge_osd(client: &ClientSet, osd_ids: &str, force: bool) -> Result<(), Error> {
    confirm(
        &format!("Are you sure you want to purge osd.{osd_ids}? The OSD is *not* safe to destroy. This may cause data loss. If you are sure the OSD should be purged, enter 'yes-i-really-mean-it'"),
        "yes-i-really-mean-it",
    )?;
    verify_operator(client).await?;
    let endpoints = mons::endpoints_data(client).await?;
    let admin_key = ceph(client, &["auth", "print-key", "client.admin"]).await?;
    let admin_key = admin_key.trim();
    if admin_key.is_empty() {
        return Err(Error::CommandFailed {
            command: "ceph auth print-key client.admin".to_string(),
            code: None,
            message: "failed to get ceph key".to_string(),
        });
    }

    tracing::info!("running purge osd command");
    let script = purge_osd_script(&endpoints, admin_key, osd_ids, force);
    let output = client
        .run(
            &ExecTarget::Operator,
            "sh",
            &["-c".to_string(), script],
        )
        .await?;
    print!("{output}");
    Ok(())
}
