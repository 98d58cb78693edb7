use crate::resources::{
    error::Error, DrCommand, FlattenArgs, MonsArgs, OperatorCommand, PassthroughArgs,
    PauseCommand, RestoreArgs, RookCommand, SubvolumeCommand,
};

/// Result wrapper for plugin commands.
pub type PluginResult = Result<(), Error>;

/// The types of operations that are supported.
#[derive(clap::Subcommand, Debug)]
pub enum Operations {
    /// Run a ceph command in the operator pod.
    Ceph(PassthroughArgs),
    /// Run an rbd command in the operator pod, `rbd ls` lists the images of every block pool.
    Rbd(PassthroughArgs),
    /// Run a rados command in the operator pod.
    Rados(PassthroughArgs),
    /// Print the mon endpoints, or restore the mon quorum.
    Mons(MonsArgs),
    /// 'Debug' ceph daemons, their deployment is replaced by a sleeping copy.
    #[clap(subcommand)]
    Debug(PauseCommand),
    /// 'Maintenance' of ceph daemons, their deployment is replaced by a sleeping copy.
    #[clap(subcommand)]
    Maintenance(PauseCommand),
    /// 'Operator' operations.
    #[clap(subcommand)]
    Operator(OperatorCommand),
    /// 'Rook' operations.
    #[clap(subcommand)]
    Rook(RookCommand),
    /// Delete the ceph cluster with all its custom resources.
    DestroyCluster,
    /// Restore a ceph custom resource which is stuck deleting.
    RestoreDeleted(RestoreArgs),
    /// Report on the health of the ceph cluster.
    Health,
    /// Flatten the rbd image of a cloned or restored pvc.
    FlattenRbdPvc(FlattenArgs),
    /// 'Subvolume' resources, the cephfs subvolumes.
    #[clap(subcommand)]
    Subvolume(SubvolumeCommand),
    /// 'Dr' operations, for rbd mirroring.
    #[clap(subcommand)]
    Dr(DrCommand),
}
