use clap::Parser;
use plugin::{operations::Operations, ExecuteOperation};

#[derive(Parser, Debug)]
#[clap(name = utils::package_description!(), version = utils::version_info_str!())]
struct CliArgs {
    /// The operation to be performed.
    #[clap(subcommand)]
    operations: Operations,

    #[clap(flatten)]
    args: plugin::CliArgs,
}

impl CliArgs {
    fn args() -> Self {
        CliArgs::parse()
    }
}

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::args();
    cli_args.args.init_tracing();

    if let Err(error) = execute(cli_args).await {
        tracing::error!("{error:#}");
        std::process::exit(1);
    }
}

async fn execute(cli_args: CliArgs) -> anyhow::Result<()> {
    tokio::select! {
        shutdown = tokio::signal::ctrl_c() => {
            shutdown?;
            anyhow::bail!("interrupted")
        },
        result = cli_args.operations.execute(&cli_args.args) => Ok(result?),
    }
}
