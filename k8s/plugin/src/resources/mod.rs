pub mod client;
pub mod constant;
pub mod crds;
pub mod debug;
pub mod destroy;
pub mod dr;
pub mod error;
pub mod exec;
pub mod flatten;
pub mod health;
pub mod mons;
pub mod operator;
pub mod rbd;
pub mod restore;
pub mod rook;
pub mod subvolume;
pub mod utils;

pub use error::Error;

pub type DeploymentName = String;
pub type MonId = String;

/// Arguments handed over verbatim to a ceph tool.
#[derive(clap::Args, Debug)]
pub struct PassthroughArgs {
    /// Arguments of the command.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// The `mons` operations, printing the mon endpoints when none is given.
#[derive(clap::Args, Debug)]
pub struct MonsArgs {
    #[clap(subcommand)]
    pub command: Option<MonsCommand>,
}

#[derive(clap::Subcommand, Debug)]
pub enum MonsCommand {
    /// Restore the mon quorum from a single healthy mon, the other mons are removed.
    RestoreQuorum {
        /// Id of the healthy mon, e.g. `a`.
        mon_id: MonId,
    },
}

/// Start or stop a paused copy of a ceph daemon deployment.
#[derive(clap::Subcommand, Debug)]
pub enum PauseCommand {
    /// Scale down the deployment and start a copy of it which sleeps instead of running the
    /// daemon.
    Start {
        /// Name of the deployment, e.g. `rook-ceph-osd-0`.
        deployment: DeploymentName,
        /// Image to run in the copy instead of the daemon's image.
        #[clap(long)]
        alternate_image: Option<String>,
    },
    /// Remove the copy and scale the deployment back up.
    Stop {
        /// Name of the deployment, with or without the copy's suffix.
        deployment: DeploymentName,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum OperatorCommand {
    /// Restart the rook operator.
    Restart,
    /// Set a property of the operator configmap `rook-ceph-operator-config`.
    Set {
        /// Key of the property, e.g. `ROOK_LOG_LEVEL`.
        key: String,
        /// Value of the property.
        value: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum RookCommand {
    /// Print the version of the rook operator.
    Version,
    /// Print the status of the rook custom resources.
    Status {
        /// Resource to report on, `all` for every ceph resource. Defaults to `cephclusters`.
        resource: Option<String>,
        /// Print the status as json.
        #[clap(long)]
        json: bool,
    },
    /// Permanently remove OSDs from the cluster.
    PurgeOsd {
        /// Comma separated ids of the OSDs, e.g. `0,1`.
        osd_ids: String,
        /// Remove the OSDs even if it may cause data loss.
        #[clap(long)]
        force: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum SubvolumeCommand {
    /// List the cephfs subvolumes and whether they're in use.
    Ls {
        /// Only list the stale subvolumes.
        #[clap(long)]
        stale: bool,
    },
    /// Delete a stale subvolume, keeping its snapshots.
    Delete {
        /// Name of the subvolume.
        subvolume: String,
        /// Name of the filesystem.
        filesystem: String,
        /// Name of the subvolume group.
        subvolumegroup: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum DrCommand {
    /// Print the ceph status of the peer cluster and the mirroring status.
    Health(PassthroughArgs),
}

/// Flatten the rbd image of a pvc cloned from a pvc or restored from a snapshot.
#[derive(clap::Args, Debug)]
pub struct FlattenArgs {
    /// Name of the pvc.
    pub pvc: String,
    /// Namespace of the pvc.
    #[clap(long, default_value = "default")]
    pub pvc_namespace: String,
    /// Flatten the image even if it's mounted.
    #[clap(long)]
    pub allow_in_use: bool,
}

/// Bring back a custom resource which is stuck deleting.
#[derive(clap::Args, Debug)]
pub struct RestoreArgs {
    /// The custom resource, e.g. `cephclusters` or `CephFilesystem`.
    pub crd: String,
    /// Name of the resource, the first deleted one otherwise.
    pub name: Option<String>,
}

/// Plugin operation tests.
#[cfg(test)]
mod tests;
