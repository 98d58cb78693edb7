use crate::resources::{
    client::ClientSet,
    constant::{
        ceph_config_path, OPERATOR_DEPLOYMENT, OPERATOR_SELECTOR, TOOLBOX_DEPLOYMENT,
        TOOLBOX_SELECTOR,
    },
    error::{Error, ExecStream, PodExec},
};
use async_trait::async_trait;
use k8s_openapi::{
    api::core::v1::Pod, apimachinery::pkg::apis::meta::v1::Status as ExecStatus,
};
use kube::api::{AttachParams, AttachedProcess};
use snafu::ResultExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// The pod a command is run in.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecTarget {
    /// The running rook operator pod.
    Operator,
    /// The running toolbox pod of the cluster namespace.
    Toolbox,
    /// The first pod of the cluster namespace matching the selector.
    Labeled { selector: String, container: String },
}

impl ExecTarget {
    /// Target the first pod matching the selector, in the given container.
    pub fn labeled(selector: impl Into<String>, container: impl Into<String>) -> Self {
        Self::Labeled {
            selector: selector.into(),
            container: container.into(),
        }
    }
    fn container(&self) -> &str {
        match self {
            Self::Operator => OPERATOR_DEPLOYMENT,
            Self::Toolbox => TOOLBOX_DEPLOYMENT,
            Self::Labeled { container, .. } => container,
        }
    }
}

/// Runs commands inside the pods of the ceph cluster, returning their stdout.
#[async_trait(?Send)]
pub trait RemoteCommand {
    async fn run(&self, target: &ExecTarget, command: &str, args: &[String])
        -> Result<String, Error>;
}

/// Shorthand for `ceph` in the operator pod.
pub async fn ceph(runner: &dyn RemoteCommand, args: &[&str]) -> Result<String, Error> {
    runner
        .run(&ExecTarget::Operator, "ceph", &to_strings(args))
        .await
}

/// Shorthand for `rbd` in the operator pod.
pub async fn rbd(runner: &dyn RemoteCommand, args: &[&str]) -> Result<String, Error> {
    runner
        .run(&ExecTarget::Operator, "rbd", &to_strings(args))
        .await
}

/// Run a ceph tool in the operator pod with the given arguments, printing its output.
pub async fn passthrough(
    runner: &dyn RemoteCommand,
    command: &str,
    args: &[String],
) -> Result<(), Error> {
    let output = runner.run(&ExecTarget::Operator, command, args).await?;
    print!("{output}");
    Ok(())
}

pub(crate) fn to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

/// Build the full command line for the target, the operator pod needs to be pointed at the
/// cluster's config and the ceph tools must not hang on an unreachable cluster.
pub fn build_command(
    target: &ExecTarget,
    cluster_namespace: &str,
    command: &str,
    args: &[String],
) -> Vec<String> {
    let mut cmd = Vec::with_capacity(args.len() + 3);
    cmd.push(command.to_string());
    cmd.extend(args.iter().cloned());
    match (target, command) {
        (ExecTarget::Toolbox, _) => cmd.push("--connect-timeout=10".to_string()),
        (ExecTarget::Operator, "ceph") => {
            cmd.push("--connect-timeout=10".to_string());
            cmd.push(format!("--conf={}", ceph_config_path(cluster_namespace)));
        }
        (ExecTarget::Operator, "rbd") => {
            cmd.push(format!("--conf={}", ceph_config_path(cluster_namespace)))
        }
        _ => {}
    }
    cmd
}

/// Exit code reported by the exec status, if any.
pub fn exit_code(status: &ExecStatus) -> Option<i32> {
    status
        .details
        .as_ref()?
        .causes
        .as_ref()?
        .iter()
        .find(|cause| cause.reason.as_deref() == Some("ExitCode"))
        .and_then(|cause| cause.message.as_deref())
        .and_then(|code| code.trim().parse().ok())
}

async fn read_stream(stream: Option<impl AsyncRead + Unpin>) -> std::io::Result<String> {
    let mut output = String::new();
    if let Some(mut stream) = stream {
        stream.read_to_string(&mut output).await?;
    }
    Ok(output)
}

impl ClientSet {
    async fn exec_pod(&self, target: &ExecTarget) -> Result<Pod, Error> {
        match target {
            ExecTarget::Operator => {
                self.wait_for_pod_to_run(self.operator_namespace(), OPERATOR_SELECTOR)
                    .await
            }
            ExecTarget::Toolbox => {
                self.wait_for_pod_to_run(self.cluster_namespace(), TOOLBOX_SELECTOR)
                    .await
            }
            ExecTarget::Labeled { selector, .. } => self
                .get_pods(self.cluster_namespace(), selector, "")
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::NoPodForCommand {
                    selector: selector.clone(),
                    command: String::new(),
                }),
        }
    }

    async fn attach(&self, process: &mut AttachedProcess, command: &str) -> Result<String, Error> {
        if let Some(mut stdin) = process.stdin() {
            stdin.shutdown().await.context(ExecStream { command })?;
        }
        let (stdout, stderr) = futures::join!(
            read_stream(process.stdout()),
            read_stream(process.stderr())
        );
        let stdout = stdout.context(ExecStream { command })?;
        let stderr = stderr.context(ExecStream { command })?;

        let status = match process.take_status() {
            Some(status) => status.await,
            None => None,
        };
        if let Some(status) = status.filter(|s| s.status.as_deref() != Some("Success")) {
            let message = if stderr.trim().is_empty() {
                status.message.clone().unwrap_or_default()
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::CommandFailed {
                command: command.to_string(),
                code: exit_code(&status),
                message,
            });
        }
        if !stderr.trim().is_empty() {
            eprintln!("{}", stderr.trim_end());
        }
        Ok(stdout)
    }
}

/// The output of a command, once its background exec task has completed.
fn finish<E: std::fmt::Display>(
    command: &str,
    output: Result<String, Error>,
    joined: Result<(), E>,
) -> Result<String, Error> {
    let output = output?;
    joined.map_err(|error| Error::ExecTask {
        command: command.to_string(),
        message: error.to_string(),
    })?;
    Ok(output)
}

#[async_trait(?Send)]
impl RemoteCommand for ClientSet {
    async fn run(
        &self,
        target: &ExecTarget,
        command: &str,
        args: &[String],
    ) -> Result<String, Error> {
        let cmd = build_command(target, self.cluster_namespace(), command, args);
        let pod = self.exec_pod(target).await.map_err(|error| match error {
            Error::NoPodForCommand { selector, .. } => Error::NoPodForCommand {
                selector,
                command: command.to_string(),
            },
            error => error,
        })?;
        let pod_name = pod.metadata.name.unwrap_or_default();
        let namespace = pod
            .metadata
            .namespace
            .unwrap_or_else(|| self.cluster_namespace().to_string());
        tracing::debug!(pod = %pod_name, command = %command, "running command");

        let params = AttachParams {
            container: Some(target.container().to_string()),
            stdin: true,
            stdout: true,
            stderr: true,
            tty: false,
            ..Default::default()
        };
        let mut process = self
            .namespaced::<Pod>(&namespace)
            .exec(&pod_name, cmd, &params)
            .await
            .context(PodExec {
                command,
                pod: &pod_name,
            })?;
        let result = self.attach(&mut process, command).await;
        let joined = process.join().await;
        finish(command, result, joined)
    }
}
