#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

use std::path::PathBuf;
use utils::tracing_telemetry::{FmtLayer, FmtStyle, TracingTelemetry};

use crate::{
    operations::{Operations, PluginResult},
    resources::{
        client::ClientSet,
        debug::{self, PauseMode},
        destroy, dr, exec, flatten, health, mons, operator, rbd, restore, rook, subvolume,
        utils::OutputFormat,
        DrCommand, MonsArgs, MonsCommand, OperatorCommand, PauseCommand, RookCommand,
        SubvolumeCommand,
    },
};

pub mod operations;
pub mod resources;

/// Every plugin operation must implement this trait to become composable.
#[async_trait::async_trait(?Send)]
pub trait ExecuteOperation {
    type Args;
    type Error;
    async fn execute(&self, cli_args: &Self::Args) -> Result<(), Self::Error>;
}

#[derive(clap::Parser, Debug)]
pub struct CliArgs {
    /// Path to kubeconfig file.
    #[clap(global = true, long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use.
    #[clap(global = true, long)]
    pub context: Option<String>,

    /// Kubernetes namespace of the CephCluster.
    #[clap(global = true, long, short = 'n', env = utils::CLUSTER_NAMESPACE_ENV, default_value = utils::DEFAULT_CLUSTER_NAMESPACE)]
    pub namespace: String,

    /// Kubernetes namespace of the rook operator, defaults to the CephCluster namespace.
    #[clap(global = true, long, env = utils::OPERATOR_NAMESPACE_ENV)]
    pub operator_namespace: Option<String>,

    /// The Output, viz table, yaml, json.
    #[clap(global = true, default_value = OutputFormat::Table.as_ref(), short, long)]
    pub output: OutputFormat,

    /// Style of the log lines, viz compact, pretty, json.
    #[clap(global = true, long, default_value = FmtStyle::Compact.as_ref())]
    pub log_format: FmtStyle,
}

impl CliArgs {
    /// Initialize tracing, the logs go to stderr so they never mix with command output.
    pub fn init_tracing(&self) {
        TracingTelemetry::builder()
            .with_writer(FmtLayer::Stderr)
            .with_style(self.log_format)
            .with_colours(true)
            .with_timestamps(false)
            .with_targets(false)
            .init();
    }

    /// Namespace of the rook operator.
    pub fn operator_namespace(&self) -> &str {
        self.operator_namespace.as_deref().unwrap_or(&self.namespace)
    }

    /// Connect to the cluster and check both namespaces exist.
    pub async fn connect(&self) -> Result<Context, resources::Error> {
        let client = ClientSet::new(
            self.kubeconfig.clone(),
            self.context.clone(),
            self.operator_namespace().to_string(),
            self.namespace.clone(),
        )
        .await?;
        client.check_namespaces().await?;
        Ok(Context {
            client,
            output: self.output,
        })
    }
}

/// What the operations run with once connected.
pub struct Context {
    pub client: ClientSet,
    pub output: OutputFormat,
}

#[async_trait::async_trait(?Send)]
impl ExecuteOperation for Operations {
    type Args = CliArgs;
    type Error = crate::resources::Error;
    async fn execute(&self, cli_args: &CliArgs) -> PluginResult {
        let context = cli_args.connect().await?;
        let client = &context.client;
        match self {
            Operations::Ceph(args) => exec::passthrough(client, "ceph", &args.args).await,
            Operations::Rbd(args) if args.args == ["ls"] => rbd::ls(client, &context.output).await,
            Operations::Rbd(args) => exec::passthrough(client, "rbd", &args.args).await,
            Operations::Rados(args) => exec::passthrough(client, "rados", &args.args).await,
            Operations::Mons(args) => args.execute(&context).await,
            Operations::Debug(command) => pause(&context, PauseMode::Debug, command).await,
            Operations::Maintenance(command) => {
                pause(&context, PauseMode::Maintenance, command).await
            }
            Operations::Operator(command) => command.execute(&context).await,
            Operations::Rook(command) => command.execute(&context).await,
            Operations::DestroyCluster => destroy::destroy_cluster(client).await,
            Operations::RestoreDeleted(args) => {
                rook::verify_operator(client).await?;
                restore::restore_deleted(client, &args.crd, args.name.as_deref()).await
            }
            Operations::Health => health::health(client).await,
            Operations::FlattenRbdPvc(args) => {
                flatten::flatten_rbd_pvc(client, &args.pvc_namespace, &args.pvc, args.allow_in_use)
                    .await
            }
            Operations::Subvolume(command) => command.execute(&context).await,
            Operations::Dr(command) => command.execute(&context).await,
        }
    }
}

async fn pause(context: &Context, mode: PauseMode, command: &PauseCommand) -> PluginResult {
    let client = &context.client;
    rook::verify_operator(client).await?;
    match command {
        PauseCommand::Start {
            deployment,
            alternate_image,
        } => debug::start(client, mode, deployment, alternate_image.as_deref()).await,
        PauseCommand::Stop { deployment } => debug::stop(client, mode, deployment).await,
    }
}

#[async_trait::async_trait(?Send)]
impl ExecuteOperation for MonsArgs {
    type Args = Context;
    type Error = crate::resources::Error;
    async fn execute(&self, context: &Context) -> PluginResult {
        match &self.command {
            None => mons::print_endpoints(&context.client).await,
            Some(MonsCommand::RestoreQuorum { mon_id }) => {
                mons::restore_quorum(&context.client, mon_id).await
            }
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ExecuteOperation for OperatorCommand {
    type Args = Context;
    type Error = crate::resources::Error;
    async fn execute(&self, context: &Context) -> PluginResult {
        let client = &context.client;
        match self {
            OperatorCommand::Restart => {
                rook::verify_operator(client).await?;
                operator::restart(client).await
            }
            OperatorCommand::Set { key, value } => operator::set(client, key, value).await,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ExecuteOperation for RookCommand {
    type Args = Context;
    type Error = crate::resources::Error;
    async fn execute(&self, context: &Context) -> PluginResult {
        let client = &context.client;
        match self {
            RookCommand::Version => {
                println!("{}", rook::version(client).await?.trim_end());
                Ok(())
            }
            RookCommand::Status { resource, json } => {
                let output = if *json {
                    OutputFormat::Json
                } else {
                    context.output
                };
                rook::status(client, resource.as_deref(), &output).await
            }
            RookCommand::PurgeOsd { osd_ids, force } => {
                rook::purge_osd(client, osd_ids, *force).await
            }
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ExecuteOperation for SubvolumeCommand {
    type Args = Context;
    type Error = crate::resources::Error;
    async fn execute(&self, context: &Context) -> PluginResult {
        let client = &context.client;
        rook::verify_operator(client).await?;
        match self {
            SubvolumeCommand::Ls { stale } => {
                subvolume::ls(client, *stale, &context.output).await
            }
            SubvolumeCommand::Delete {
                subvolume,
                filesystem,
                subvolumegroup,
            } => subvolume::delete(client, subvolume, filesystem, subvolumegroup).await,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ExecuteOperation for DrCommand {
    type Args = Context;
    type Error = crate::resources::Error;
    async fn execute(&self, context: &Context) -> PluginResult {
        match self {
            DrCommand::Health(args) => dr::health(&context.client, &args.args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(clap::Parser, Debug)]
    struct TestCli {
        #[clap(subcommand)]
        operations: Operations,
        #[clap(flatten)]
        args: CliArgs,
    }

    fn parse(args: &[&str]) -> TestCli {
        TestCli::try_parse_from(std::iter::once("kubectl-rook-ceph").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn namespaces() {
        let cli = parse(&["health"]);
        assert_eq!(cli.args.namespace, "rook-ceph");
        assert_eq!(cli.args.operator_namespace(), "rook-ceph");
        assert_eq!(cli.args.output, OutputFormat::Table);

        let cli = parse(&["--operator-namespace", "rook-operator", "-n", "ceph", "health"]);
        assert_eq!(cli.args.namespace, "ceph");
        assert_eq!(cli.args.operator_namespace(), "rook-operator");
    }

    #[test]
    fn passthrough_arguments() {
        let cli = parse(&["ceph", "osd", "pool", "ls", "detail"]);
        match cli.operations {
            Operations::Ceph(args) => assert_eq!(args.args, ["osd", "pool", "ls", "detail"]),
            other => panic!("unexpected operation {other:?}"),
        }

        let cli = parse(&["-o", "json", "rbd", "ls"]);
        assert_eq!(cli.args.output, OutputFormat::Json);
        assert!(matches!(cli.operations, Operations::Rbd(args) if args.args == ["ls"]));
    }

    #[test]
    fn subcommands() {
        let cli = parse(&["debug", "start", "rook-ceph-osd-0", "--alternate-image", "quay.io/ceph/ceph:v18"]);
        assert!(matches!(
            cli.operations,
            Operations::Debug(PauseCommand::Start { deployment, alternate_image: Some(image) })
                if deployment == "rook-ceph-osd-0" && image == "quay.io/ceph/ceph:v18"
        ));

        let cli = parse(&["mons"]);
        assert!(matches!(cli.operations, Operations::Mons(MonsArgs { command: None })));

        let cli = parse(&["mons", "restore-quorum", "b"]);
        assert!(matches!(
            cli.operations,
            Operations::Mons(MonsArgs { command: Some(MonsCommand::RestoreQuorum { mon_id }) }) if mon_id == "b"
        ));

        let cli = parse(&["rook", "status", "all", "--json"]);
        assert!(matches!(
            cli.operations,
            Operations::Rook(RookCommand::Status { resource: Some(resource), json: true }) if resource == "all"
        ));

        let cli = parse(&["flatten-rbd-pvc", "rbd-pvc-clone", "--pvc-namespace", "apps"]);
        assert!(matches!(
            cli.operations,
            Operations::FlattenRbdPvc(args) if args.pvc_namespace == "apps" && !args.allow_in_use
        ));

        let cli = parse(&["subvolume", "ls", "--stale"]);
        assert!(matches!(cli.operations, Operations::Subvolume(SubvolumeCommand::Ls { stale: true })));

        assert!(TestCli::try_parse_from(["kubectl-rook-ceph", "subvolume", "delete", "csi-vol-1", "myfs"]).is_err());
    }
}
