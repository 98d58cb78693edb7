//! Mon endpoints and the restoration of the mon quorum from a single healthy mon.

use crate::resources::{
    client::ClientSet,
    constant::{
        MON_CONTAINER, MON_ENDPOINTS_CONFIG_MAP, MON_ENDPOINTS_KEY, MON_PREFIX, MON_SECRET,
        MON_SECRET_FSID_KEY, OPERATOR_DEPLOYMENT, TOOLBOX_DEPLOYMENT, TOOLBOX_SELECTOR,
    },
    debug::{self, PauseMode},
    error::{Error, ParseOutput},
    exec::{to_strings, ExecTarget, RemoteCommand},
    utils::confirm,
};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use serde::Deserialize;
use snafu::ResultExt;
use std::{fmt, net::SocketAddr, time::Duration};

/// Where the monmap is edited inside the debug pod.
const MONMAP_PATH: &str = "/tmp/monmap";
/// Attempts made while waiting for the restored mon to answer.
const HEALTH_ATTEMPTS: u32 = 20;
/// Interval between the health attempts.
const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// A mon of the `rook-ceph-mon-endpoints` map.
#[derive(Debug, Clone, PartialEq)]
pub struct MonEndpoint {
    /// Mon id, empty for the legacy format which only lists addresses.
    pub name: String,
    pub address: SocketAddr,
}

impl MonEndpoint {
    /// Parse a `name=host:port` entry. IPv6 hosts must be bracketed.
    pub fn parse(entry: &str) -> Result<Self, Error> {
        let entry = entry.trim();
        let (name, endpoint) = match entry.split_once('=') {
            Some((name, endpoint)) => (name.trim(), endpoint.trim()),
            None => ("", entry),
        };
        let address = parse_address(endpoint)?;
        Ok(Self {
            name: name.to_string(),
            address,
        })
    }
}

impl fmt::Display for MonEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}={}", self.name, self.address)
        }
    }
}

/// Split an endpoint into a host, which must be an ip address, and a port.
pub fn parse_address(endpoint: &str) -> Result<SocketAddr, Error> {
    let invalid = |reason: String| Error::InvalidMonEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port".to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|error| invalid(format!("invalid port: {error}")))?;
    let host = match host.strip_prefix('[') {
        Some(bracketed) => bracketed
            .strip_suffix(']')
            .ok_or_else(|| invalid("unterminated bracket".to_string()))?,
        None if host.contains(':') => {
            return Err(invalid("ipv6 addresses must be bracketed".to_string()))
        }
        None => host,
    };
    let ip = host
        .parse()
        .map_err(|error| invalid(format!("invalid ip address '{host}': {error}")))?;
    Ok(SocketAddr::new(ip, port))
}

/// Parse the comma separated mon endpoints, keeping their order.
pub fn parse_endpoints(data: &str) -> Result<Vec<MonEndpoint>, Error> {
    data.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(MonEndpoint::parse)
        .collect()
}

/// Render the endpoints back into the configmap format.
pub fn format_endpoints(endpoints: &[MonEndpoint]) -> String {
    endpoints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// The mon addresses alone, as given to ceph's `--mon-host`.
pub fn mon_addresses(endpoints: &[MonEndpoint]) -> String {
    endpoints
        .iter()
        .map(|endpoint| endpoint.address.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Raw mon endpoints of the cluster.
pub async fn endpoints_data(client: &ClientSet) -> Result<String, Error> {
    client
        .get_config_map_value(
            client.cluster_namespace(),
            MON_ENDPOINTS_CONFIG_MAP,
            MON_ENDPOINTS_KEY,
        )
        .await
}

/// Print the mon addresses of the cluster.
pub async fn print_endpoints(client: &ClientSet) -> Result<(), Error> {
    let endpoints = parse_endpoints(&endpoints_data(client).await?)?;
    println!("{}", mon_addresses(&endpoints));
    Ok(())
}

/// Everything the quorum restoration needs, worked out before touching the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePlan {
    good: MonEndpoint,
    bad: Vec<String>,
    fsid: String,
}

impl RestorePlan {
    /// Split the endpoints into the mon to keep and the mons to discard.
    pub fn new(good_mon: &str, endpoints: &[MonEndpoint], fsid: &str) -> Result<Self, Error> {
        if let Some(nameless) = endpoints.iter().find(|endpoint| endpoint.name.is_empty()) {
            return Err(Error::InvalidMonEndpoint {
                endpoint: nameless.to_string(),
                reason: "missing mon name".to_string(),
            });
        }
        let good = endpoints
            .iter()
            .find(|endpoint| endpoint.name == good_mon)
            .cloned()
            .ok_or_else(|| Error::MonNotFound {
                id: good_mon.to_string(),
                endpoints: format_endpoints(endpoints),
            })?;
        if fsid.is_empty() {
            return Err(Error::MissingField {
                resource: "secret".to_string(),
                name: MON_SECRET.to_string(),
                field: MON_SECRET_FSID_KEY.to_string(),
            });
        }
        let bad = endpoints
            .iter()
            .filter(|endpoint| endpoint.name != good_mon)
            .map(|endpoint| endpoint.name.clone())
            .collect();
        Ok(Self {
            good,
            bad,
            fsid: fsid.to_string(),
        })
    }

    /// Id of the mon the quorum is restored to.
    pub fn good_mon(&self) -> &str {
        &self.good.name
    }

    /// Ids of the mons removed from the quorum.
    pub fn bad_mons(&self) -> &[String] {
        &self.bad
    }

    /// Deployment, service and pvc name of a mon.
    pub fn mon_resource(id: &str) -> String {
        format!("{MON_PREFIX}-{id}")
    }

    /// Selector of the debug pod of the good mon.
    pub fn debug_pod_selector(&self) -> String {
        format!("ceph_daemon_type=mon,ceph_daemon_id={}", self.good.name)
    }

    /// The endpoints left once the quorum is restored.
    pub fn restored_endpoints(&self) -> String {
        self.good.to_string()
    }

    fn mon_args(&self, action: &str) -> Vec<String> {
        let id = &self.good.name;
        vec![
            format!("--fsid={}", self.fsid),
            "--keyring=/etc/ceph/keyring-store/keyring".to_string(),
            "--log-to-stderr=true".to_string(),
            "--err-to-stderr=true".to_string(),
            "--mon-cluster-log-to-stderr=true".to_string(),
            "--log-stderr-prefix=debug".to_string(),
            "--default-log-to-file=false".to_string(),
            "--default-mon-cluster-log-to-file=false".to_string(),
            "--mon-host=$(ROOK_CEPH_MON_HOST)".to_string(),
            "--mon-initial-members=$(ROOK_CEPH_MON_INITIAL_MEMBERS)".to_string(),
            format!("--id={id}"),
            "--foreground".to_string(),
            format!("--public-addr={}", self.good.address.ip()),
            format!("--setuser-match-path=/var/lib/ceph/mon/ceph-{id}/store.db"),
            "--public-bind-addr=".to_string(),
            format!("--{action}-monmap={MONMAP_PATH}"),
        ]
    }

    /// The commands editing the monmap in the debug pod, in order.
    pub fn monmap_commands(&self) -> Vec<(&'static str, Vec<String>)> {
        let print = ("monmaptool", to_strings(&["--print", MONMAP_PATH]));
        let mut commands = vec![("ceph-mon", self.mon_args("extract")), print.clone()];
        commands.extend(
            self.bad
                .iter()
                .map(|bad| ("monmaptool", to_strings(&[MONMAP_PATH, "--rm", bad]))),
        );
        commands.push(("ceph-mon", self.mon_args("inject")));
        commands.push(print);
        commands
    }
}

#[derive(Deserialize)]
struct MonStatus {
    #[serde(default)]
    state: String,
}

/// The mon to restore from must be in quorum.
pub async fn validate_mon_is_up(runner: &dyn RemoteCommand, mon: &str) -> Result<(), Error> {
    let target = ExecTarget::labeled(format!("mon={mon}"), MON_CONTAINER);
    let args = vec![
        "daemon".to_string(),
        format!("mon.{mon}"),
        "mon_status".to_string(),
    ];
    let output = runner.run(&target, "ceph", &args).await?;
    let status: MonStatus = serde_json::from_str(&output).context(ParseOutput {
        command: "ceph daemon mon_status",
    })?;
    tracing::info!("mon {mon:?} state is {:?}", status.state);
    match status.state.as_str() {
        "leader" | "peon" => Ok(()),
        _ => Err(Error::MonNotHealthy {
            id: mon.to_string(),
            state: status.state,
        }),
    }
}

/// Rewrite the monmap of the good mon so that it's the only member left.
pub async fn update_mon_map(runner: &dyn RemoteCommand, plan: &RestorePlan) -> Result<(), Error> {
    tracing::info!("started debug pod, restoring the mon quorum in the debug pod");
    let target = ExecTarget::labeled(plan.debug_pod_selector(), MON_CONTAINER);
    for (command, args) in plan.monmap_commands() {
        tracing::info!("running {command} {}", args.last().map(String::as_str).unwrap_or(""));
        let output = runner.run(&target, command, &args).await?;
        if command == "monmaptool" && args.first().map(String::as_str) == Some("--print") {
            println!("{}", output.trim_end());
        }
    }
    tracing::info!("finished updating the monmap");
    Ok(())
}

/// Poll `ceph status` in the toolbox until the cluster reports any health.
pub async fn wait_for_health(
    runner: &dyn RemoteCommand,
    attempts: u32,
    interval: Duration,
) -> Result<(), Error> {
    let args = to_strings(&["status"]);
    for attempt in 1 ..= attempts {
        match runner.run(&ExecTarget::Toolbox, "ceph", &args).await {
            Ok(output)
                if ["HEALTH_OK", "HEALTH_WARN", "HEALTH_ERR"]
                    .iter()
                    .any(|health| output.contains(health)) =>
            {
                tracing::info!("finished waiting for ceph status");
                println!("{}", output.trim_end());
                return Ok(());
            }
            Ok(output) => tracing::info!("current ceph status output: {}", output.trim()),
            Err(error) => tracing::error!(%error, "failed to get the status of ceph cluster"),
        }
        tracing::info!("{attempt}: waiting for ceph status to confirm single mon quorum");
        tokio::time::sleep(interval).await;
    }
    Err(Error::Timeout {
        what: "mon quorum to respond".to_string(),
        attempts,
    })
}

/// Restore the mon quorum to `good_mon`, discarding every other mon.
pub async fn restore_quorum(client: &ClientSet, good_mon: &str) -> Result<(), Error> {
    let namespace = client.cluster_namespace();
    validate_mon_is_up(client, good_mon).await?;

    let endpoints = parse_endpoints(&endpoints_data(client).await?)?;
    for endpoint in &endpoints {
        tracing::info!("mon={}, endpoint={}", endpoint.name, endpoint.address);
    }
    let fsid = client
        .get_secret_value(namespace, MON_SECRET, MON_SECRET_FSID_KEY)
        .await?;
    let plan = RestorePlan::new(good_mon, &endpoints, fsid.trim())?;

    tracing::info!("check for the running toolbox");
    client.get_deployment(namespace, TOOLBOX_DEPLOYMENT).await?;
    client.wait_for_pod_to_run(namespace, TOOLBOX_SELECTOR).await?;

    tracing::info!(
        "restoring mon quorum to mon {good_mon} {}",
        plan.good.address.ip()
    );
    tracing::info!("the mons to discard are: {:?}", plan.bad_mons());
    tracing::info!("the cluster fsid is {fsid}");
    confirm(
        &format!(
            "Are you sure you want to restore the quorum to mon {good_mon}? If so, enter 'yes-really-restore'"
        ),
        "yes-really-restore",
    )?;
    tracing::info!("proceeding with restoring quorum");

    tracing::info!("waiting for operator pod to stop");
    client
        .scale_deployment(client.operator_namespace(), OPERATOR_DEPLOYMENT, 0)
        .await?;
    tracing::info!("waiting for bad mon pods to stop");
    for bad in plan.bad_mons() {
        client
            .scale_deployment(namespace, &RestorePlan::mon_resource(bad), 0)
            .await?;
    }

    debug::start(
        client,
        PauseMode::Debug,
        &RestorePlan::mon_resource(good_mon),
        None,
    )
    .await?;
    client
        .wait_for_pod_to_run(namespace, &plan.debug_pod_selector())
        .await?;
    update_mon_map(client, &plan).await?;

    tracing::info!("restoring the mons in the {MON_ENDPOINTS_CONFIG_MAP} configmap to the good mon");
    client
        .update_config_map(
            namespace,
            MON_ENDPOINTS_CONFIG_MAP,
            MON_ENDPOINTS_KEY,
            &plan.restored_endpoints(),
        )
        .await?;

    tracing::info!("stopping the debug pod for mon {good_mon}");
    debug::stop(client, PauseMode::Debug, &RestorePlan::mon_resource(good_mon)).await?;

    tracing::info!("check that the restored mon is responding");
    wait_for_health(client, HEALTH_ATTEMPTS, HEALTH_INTERVAL).await?;

    tracing::info!("purging the bad mons {:?}", plan.bad_mons());
    for bad in plan.bad_mons() {
        let name = RestorePlan::mon_resource(bad);
        tracing::info!("purging bad mon: {bad}");
        client.delete_deployment(namespace, &name).await?;
        client.delete_if_exists::<Service>(namespace, &name).await?;
        client
            .delete_if_exists::<PersistentVolumeClaim>(namespace, &name)
            .await?;
    }

    tracing::info!("mon quorum was successfully restored to mon {good_mon}");
    tracing::info!("only a single mon is currently running");
    confirm(
        "Enter 'continue' to start the operator and expand to full mon quorum again",
        "continue",
    )?;
    client
        .scale_deployment(client.operator_namespace(), OPERATOR_DEPLOYMENT, 1)
        .await
}
