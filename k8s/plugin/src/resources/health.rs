use crate::resources::{
    client::ClientSet,
    error::{Error, ParseOutput},
    exec::{ceph, RemoteCommand},
};
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::BTreeSet;

/// Nodes the mons and the osds should be spread over.
const MIN_DAEMON_NODES: usize = 3;

/// The parts of `ceph -s --format json` the health check reads.
#[derive(Debug, Default, Deserialize)]
pub struct CephStatus {
    #[serde(default)]
    pub health: HealthStatus,
    #[serde(default)]
    pub pgmap: PgMap,
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PgMap {
    #[serde(default)]
    pub pgs_by_state: Vec<PgStateEntry>,
}

/// Number of placement groups in a given state.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PgStateEntry {
    pub state_name: String,
    pub count: u64,
}

/// Level a health finding is reported at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    fn log(&self, message: &str) {
        match self {
            Self::Info => tracing::info!("{message}"),
            Self::Warn => tracing::warn!("{message}"),
            Self::Error => tracing::error!("{message}"),
        }
    }
}

/// Severity of the overall ceph health, if it is a known one.
pub fn health_severity(status: &str) -> Option<Severity> {
    match status {
        "HEALTH_OK" => Some(Severity::Info),
        "HEALTH_WARN" => Some(Severity::Warn),
        "HEALTH_ERR" => Some(Severity::Error),
        _ => None,
    }
}

/// Severity of a placement group state.
pub fn pg_severity(state: &str) -> Severity {
    if state == "active+clean" {
        Severity::Info
    } else if ["down", "incomplete", "snaptrim_error"]
        .iter()
        .any(|bad| state.contains(bad))
    {
        Severity::Error
    } else {
        Severity::Warn
    }
}

/// Run `ceph -s` in the operator pod and decode it.
pub async fn ceph_status(runner: &dyn RemoteCommand) -> Result<CephStatus, Error> {
    let output = ceph(runner, &["-s", "--format", "json"]).await?;
    serde_json::from_str(&output).context(ParseOutput { command: "ceph -s" })
}

/// Number of distinct nodes the pods run on.
pub fn distinct_nodes(pods: &[Pod]) -> usize {
    pods.iter()
        .map(|pod| {
            pod.spec
                .as_ref()
                .and_then(|spec| spec.node_name.clone())
                .unwrap_or_default()
        })
        .collect::<BTreeSet<_>>()
        .len()
}

fn phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .unwrap_or_default()
}

/// A pod as `name phase namespace node`, tab separated.
pub fn pod_line(pod: &Pod) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        pod.metadata.name.as_deref().unwrap_or_default(),
        phase(pod),
        pod.metadata.namespace.as_deref().unwrap_or_default(),
        pod.spec
            .as_ref()
            .and_then(|spec| spec.node_name.as_deref())
            .unwrap_or_default()
    )
}

/// Split pods into the running or succeeded ones and the others.
pub fn split_by_phase(pods: Vec<Pod>) -> (Vec<Pod>, Vec<Pod>) {
    pods.into_iter()
        .partition(|pod| matches!(phase(pod), "Running" | "Succeeded"))
}

async fn check_pods_on_nodes(client: &ClientSet, daemon: &str) -> Result<(), Error> {
    tracing::info!(
        "checking if at least {MIN_DAEMON_NODES} {daemon} pods are running on different nodes"
    );
    let pods = client
        .get_pods(client.cluster_namespace(), &format!("app=rook-ceph-{daemon}"), "")
        .await?;
    if distinct_nodes(&pods) < MIN_DAEMON_NODES {
        tracing::warn!("at least {MIN_DAEMON_NODES} {daemon} pods should be running on different nodes");
    }
    for pod in &pods {
        println!("{}", pod_line(pod));
    }
    println!();
    Ok(())
}

async fn check_all_pods(client: &ClientSet) -> Result<(), Error> {
    let mut pods = client.get_pods(client.operator_namespace(), "", "").await?;
    if client.operator_namespace() != client.cluster_namespace() {
        pods.extend(client.get_pods(client.cluster_namespace(), "", "").await?);
    }
    let (running, not_running) = split_by_phase(pods);
    tracing::info!("pods that are in 'Running' or 'Succeeded' status");
    for pod in &running {
        println!("{}", pod_line(pod));
    }
    println!();
    tracing::warn!("pods that are 'Not' in 'Running' status");
    for pod in &not_running {
        println!("{}", pod_line(pod));
    }
    println!();
    Ok(())
}

/// Report on the overall health of the cluster.
pub async fn health(client: &ClientSet) -> Result<(), Error> {
    check_pods_on_nodes(client, "mon").await?;

    tracing::info!("checking mon quorum and ceph health details");
    let status = ceph_status(client).await?;
    if let Some(severity) = health_severity(&status.health.status) {
        severity.log(&status.health.status);
    }
    println!();

    check_pods_on_nodes(client, "osd").await?;
    check_all_pods(client).await?;

    tracing::info!("checking placement group status");
    for pg in &status.pgmap.pgs_by_state {
        pg_severity(&pg.state_name).log(&format!(
            "\tPgState: {}, PgCount: {}",
            pg.state_name, pg.count
        ));
    }
    println!();

    tracing::info!("checking if at least one mgr pod is running");
    let mgrs = client
        .get_pods(client.cluster_namespace(), "app=rook-ceph-mgr", "")
        .await?;
    if mgrs.is_empty() {
        tracing::warn!("at least one mgr pod should be running");
    }
    for pod in &mgrs {
        println!("{}", pod_line(pod));
    }
    Ok(())
}
