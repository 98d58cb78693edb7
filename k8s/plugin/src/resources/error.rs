use snafu::Snafu;
use std::path::PathBuf;

/// All errors returned when a plugin command fails.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub), context(suffix(false)))]
pub enum Error {
    /// Error when the kubeconfig file can't be read.
    #[snafu(display("Failed to read kubeconfig {}. Error {source}", path.display()))]
    KubeConfigRead {
        path: PathBuf,
        source: kube::config::KubeconfigError,
    },
    /// Error when the kubeconfig can't be turned into a client config.
    #[snafu(display("Failed to load kubeconfig. Error {source}"))]
    KubeConfigLoad {
        source: kube::config::KubeconfigError,
    },
    /// Error when no kubeconfig could be inferred from the environment.
    #[snafu(display("Failed to infer kubeconfig. Error {source}"))]
    InferConfig {
        source: kube::config::InferConfigError,
    },
    /// Error when the kubernetes client can't be created.
    #[snafu(display("Failed to create kubernetes client. Error {source}"))]
    KubeClient { source: kube::Error },
    /// Error when one of the namespaces the plugin works in is missing.
    #[snafu(display("{kind} namespace '{namespace}' does not exist. Error {source}"))]
    NamespaceNotFound {
        kind: String,
        namespace: String,
        source: kube::Error,
    },
    /// Error when listing kubernetes resources fails.
    #[snafu(display("Failed to list {resource} in namespace {namespace}. Error {source}"))]
    ListResources {
        resource: String,
        namespace: String,
        source: kube::Error,
    },
    /// Error when getting a kubernetes resource fails.
    #[snafu(display("Failed to get {resource} {name}. Error {source}"))]
    GetResource {
        resource: String,
        name: String,
        source: kube::Error,
    },
    /// Error when creating a kubernetes resource fails.
    #[snafu(display("Failed to create {resource} {name}. Error {source}"))]
    CreateResource {
        resource: String,
        name: String,
        source: kube::Error,
    },
    /// Error when updating a kubernetes resource fails.
    #[snafu(display("Failed to update {resource} {name}. Error {source}"))]
    UpdateResource {
        resource: String,
        name: String,
        source: kube::Error,
    },
    /// Error when patching a kubernetes resource fails.
    #[snafu(display("Failed to patch {resource} {name}. Error {source}"))]
    PatchResource {
        resource: String,
        name: String,
        source: kube::Error,
    },
    /// Error when deleting a kubernetes resource fails.
    #[snafu(display("Failed to delete {resource} {name}. Error {source}"))]
    DeleteResource {
        resource: String,
        name: String,
        source: kube::Error,
    },
    /// Error when scaling a deployment fails.
    #[snafu(display("Failed to scale deployment {name} to {replicas}. Error {source}"))]
    ScaleDeployment {
        name: String,
        replicas: i32,
        source: kube::Error,
    },
    /// Error when a resource lacks a field the plugin relies on.
    #[snafu(display("{resource} {name} has no {field}"))]
    MissingField {
        resource: String,
        name: String,
        field: String,
    },
    /// Error when no running pod matches the selector in time.
    #[snafu(display("No pod with labels matching {selector} in namespace {namespace}"))]
    PodNotRunning { selector: String, namespace: String },
    /// Error when no pod matches the selector at all.
    #[snafu(display("No pod with labels matching {selector} to run '{command}'"))]
    NoPodForCommand { selector: String, command: String },
    /// Error when the exec request is rejected.
    #[snafu(display("Failed to exec '{command}' in pod {pod}. Error {source}"))]
    PodExec {
        command: String,
        pod: String,
        source: kube::Error,
    },
    /// Error when reading the output streams of an exec fails.
    #[snafu(display("Failed to read output of '{command}'. Error {source}"))]
    ExecStream {
        command: String,
        source: std::io::Error,
    },
    /// Error when the background task of an exec doesn't complete.
    #[snafu(display("Failed to complete '{command}'. Error {message}"))]
    ExecTask { command: String, message: String },
    /// Error when the remote command exits unsuccessfully.
    #[snafu(display("Command '{command}' failed (exit code {}): {message}", code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },
    /// Error when a command's output can't be decoded.
    #[snafu(display("Failed to parse output of '{command}'. Error {source}"))]
    ParseOutput {
        command: String,
        source: serde_json::Error,
    },
    /// Error when a custom resource status can't be rendered as yaml.
    #[snafu(display("Failed to render {name} as yaml. Error {source}"))]
    RenderYaml {
        name: String,
        source: serde_yaml::Error,
    },
    /// Error when a custom resource status can't be rendered as json.
    #[snafu(display("Failed to render {name} as json. Error {source}"))]
    RenderJson {
        name: String,
        source: serde_json::Error,
    },
    /// Error when a mon endpoint is malformed.
    #[snafu(display("Invalid mon endpoint '{endpoint}': {reason}"))]
    InvalidMonEndpoint { endpoint: String, reason: String },
    /// Error when the requested mon is not in the endpoint map.
    #[snafu(display("Mon '{id}' is not found in the mon endpoints '{endpoints}'"))]
    MonNotFound { id: String, endpoints: String },
    /// Error when the mon to restore from is not in quorum.
    #[snafu(display("Mon '{id}' is in state '{state}', it must be either leader or peon"))]
    MonNotHealthy { id: String, state: String },
    /// Error when the user doesn't confirm an operation.
    #[snafu(display("Cancelled, expected '{expected}' but got '{answer}'"))]
    PromptCancelled { expected: String, answer: String },
    /// Error when reading the confirmation from stdin fails.
    #[snafu(display("Failed to read the confirmation. Error {source}"))]
    ReadAnswer { source: std::io::Error },
    /// Error when an operation doesn't converge in time.
    #[snafu(display("Timed out waiting for {what} after {attempts} attempts"))]
    Timeout { what: String, attempts: u32 },
    /// Error when a pvc can't be flattened.
    #[snafu(display("PVC {namespace}/{name} can't be flattened: {reason}"))]
    InvalidPvc {
        namespace: String,
        name: String,
        reason: String,
    },
    /// Error when an image is in use and in-use flattening is not allowed.
    #[snafu(display("Image {pool}/{image} has watchers, use --allow-in-use to flatten it anyway"))]
    ImageInUse { pool: String, image: String },
    /// Error when the peer token of a mirroring secret isn't base64.
    #[snafu(display("Failed to decode the peer token of secret {name}. Error {source}"))]
    DecodeToken {
        name: String,
        source: base64::DecodeError,
    },
    /// Error when the decoded peer token isn't the expected json.
    #[snafu(display("Failed to parse the peer token of secret {name}. Error {source}"))]
    ParseToken {
        name: String,
        source: serde_json::Error,
    },
    /// Error when the csi cluster config of the mon endpoints can't be parsed.
    #[snafu(display("Failed to parse csi cluster config of {name}. Error {source}"))]
    ParseClusterConfig {
        name: String,
        source: serde_json::Error,
    },
    /// Error when the filesystem has no metadata pool.
    #[snafu(display("Metadata pool not found for filesystem {fs}"))]
    MetadataPoolNotFound { fs: String },
    /// Error when the cluster has no cephfs filesystem.
    #[snafu(display("No filesystem found"))]
    NoFilesystem {},
    /// Error when a filesystem has no subvolume group.
    #[snafu(display("No subvolumegroups found for filesystem {fs}"))]
    NoSubvolumeGroup { fs: String },
}

impl Error {
    /// Whether the error was caused by the kubernetes api returning NotFound.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::GetResource { source, .. }
            | Self::DeleteResource { source, .. }
            | Self::PatchResource { source, .. }
            | Self::ListResources { source, .. }
            | Self::UpdateResource { source, .. }
            | Self::ScaleDeployment { source, .. } => is_not_found(source),
            _ => false,
        }
    }
}

/// Whether the kubernetes api returned NotFound.
pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

/// Whether the kubernetes api returned AlreadyExists.
pub fn is_already_exists(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 409)
}
