use crate::resources::{
    crds::{CephResource, CustomResources},
    destroy::delete_custom_resources,
    error::Error,
    exec::{ExecTarget, RemoteCommand},
    flatten::flatten_image,
    mons::{parse_endpoints, update_mon_map, validate_mon_is_up, wait_for_health, RestorePlan},
    rbd::{list_images, PoolNamespaces, RbdImage},
    rook::status_reports,
    subvolume::{Subvolume, SubvolumeState, Subvolumes},
    utils::OutputFormat,
};
use async_trait::async_trait;
use kube::{api::DynamicObject, core::ErrorResponse};
use std::{cell::RefCell, collections::BTreeSet, time::Duration};

fn api_error(code: u16) -> kube::Error {
    let reason = match code {
        404 => "NotFound",
        409 => "AlreadyExists",
        _ => "InternalError",
    };
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("the server responded with {reason}"),
        reason: reason.to_string(),
        code,
    })
}

fn command_failed(command: &str, code: i32) -> Error {
    Error::CommandFailed {
        command: command.to_string(),
        code: Some(code),
        message: "failed".to_string(),
    }
}

/// Records the commands it's asked to run, answering them through `respond`.
struct MockRunner<F> {
    calls: RefCell<Vec<(ExecTarget, String)>>,
    respond: F,
}

impl<F> MockRunner<F>
where
    F: Fn(&str) -> Result<String, Error>,
{
    fn new(respond: F) -> Self {
        Self {
            calls: RefCell::new(vec![]),
            respond,
        }
    }
    fn commands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }
    fn targets(&self) -> Vec<ExecTarget> {
        self.calls
            .borrow()
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }
}

#[async_trait(?Send)]
impl<F> RemoteCommand for MockRunner<F>
where
    F: Fn(&str) -> Result<String, Error>,
{
    async fn run(
        &self,
        target: &ExecTarget,
        command: &str,
        args: &[String],
    ) -> Result<String, Error> {
        let line = std::iter::once(command.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push((target.clone(), line.clone()));
        (self.respond)(&line)
    }
}

/// Answers every custom resource request the same way, with the given api error codes.
#[derive(Default)]
struct MockResources {
    items: Vec<DynamicObject>,
    list_error: Option<u16>,
    get_error: Option<u16>,
    delete_error: Option<u16>,
    patch_error: Option<u16>,
    calls: RefCell<Vec<String>>,
}

impl MockResources {
    fn with_items(names: &[&str]) -> Self {
        let resource = CephResource::lookup("cephblockpools").api_resource();
        Self {
            items: names
                .iter()
                .map(|name| DynamicObject::new(name, &resource))
                .collect(),
            ..Default::default()
        }
    }
    fn result(&self, error: Option<u16>) -> Result<(), kube::Error> {
        match error {
            Some(code) => Err(api_error(code)),
            None => Ok(()),
        }
    }
    fn calls_for(&self, resource: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.contains(&format!(" {resource}/")))
            .cloned()
            .collect()
    }
}

#[async_trait(?Send)]
impl CustomResources for MockResources {
    async fn list_resources(
        &self,
        resource: &CephResource,
    ) -> Result<Vec<DynamicObject>, kube::Error> {
        self.calls.borrow_mut().push(format!("list {resource}"));
        self.result(self.list_error)?;
        Ok(self.items.clone())
    }
    async fn get_resource(
        &self,
        resource: &CephResource,
        name: &str,
    ) -> Result<DynamicObject, kube::Error> {
        self.calls.borrow_mut().push(format!("get {resource}/{name}"));
        self.result(self.get_error)?;
        Ok(DynamicObject::new(name, &resource.api_resource()))
    }
    async fn delete_resource(
        &self,
        resource: &CephResource,
        name: &str,
    ) -> Result<(), kube::Error> {
        self.calls.borrow_mut().push(format!("delete {resource}/{name}"));
        self.result(self.delete_error)
    }
    async fn patch_resource(
        &self,
        resource: &CephResource,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error> {
        self.calls
            .borrow_mut()
            .push(format!("patch {resource}/{name} {patch}"));
        self.result(self.patch_error)
    }
    async fn create_resource(
        &self,
        resource: &CephResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error> {
        let name = object.metadata.name.clone().unwrap_or_default();
        self.calls.borrow_mut().push(format!("create {resource}/{name}"));
        Ok(object.clone())
    }
}

#[tokio::test]
async fn destroy_list_errors() {
    let resources = MockResources {
        list_error: Some(500),
        ..Default::default()
    };
    let result = delete_custom_resources(&resources, "rook-ceph").await;
    assert!(matches!(result, Err(Error::ListResources { .. })));
    assert_eq!(resources.calls.borrow().len(), 1);

    let resources = MockResources {
        list_error: Some(404),
        ..Default::default()
    };
    delete_custom_resources(&resources, "rook-ceph").await.unwrap();
    assert_eq!(resources.calls.borrow().len(), CephResource::all().len());

    let resources = MockResources::default();
    delete_custom_resources(&resources, "rook-ceph").await.unwrap();
    assert!(resources
        .calls
        .borrow()
        .iter()
        .all(|call| call.starts_with("list ")));
}

#[tokio::test]
async fn destroy_deleted_resources() {
    let resources = MockResources {
        delete_error: Some(404),
        ..MockResources::with_items(&["replicapool"])
    };
    delete_custom_resources(&resources, "rook-ceph").await.unwrap();
    assert_eq!(
        resources.calls_for("cephblockpools"),
        vec!["delete cephblockpools/replicapool"]
    );

    let resources = MockResources {
        get_error: Some(404),
        ..MockResources::with_items(&["replicapool"])
    };
    delete_custom_resources(&resources, "rook-ceph").await.unwrap();
    assert_eq!(
        resources.calls_for("cephblockpools"),
        vec![
            "delete cephblockpools/replicapool",
            "get cephblockpools/replicapool"
        ]
    );
}

#[tokio::test]
async fn destroy_stuck_resources() {
    let resources = MockResources::with_items(&["my-cluster"]);
    delete_custom_resources(&resources, "rook-ceph").await.unwrap();
    assert_eq!(
        resources.calls_for("cephclusters"),
        vec![
            "delete cephclusters/my-cluster",
            "get cephclusters/my-cluster",
            r#"patch cephclusters/my-cluster {"spec":{"cleanupPolicy":{"confirmation":"yes-really-destroy-data"}}}"#,
            "delete cephclusters/my-cluster",
        ]
    );
    assert_eq!(
        resources.calls_for("cephblockpools")[2],
        r#"patch cephblockpools/my-cluster {"metadata":{"finalizers":null}}"#
    );
}

#[tokio::test]
async fn destroy_patch_errors() {
    let resources = MockResources {
        patch_error: Some(500),
        ..MockResources::with_items(&["my-cluster"])
    };
    let result = delete_custom_resources(&resources, "rook-ceph").await;
    match result {
        Err(Error::PatchResource { resource, name, .. }) => {
            assert_eq!(resource, "cephclusters");
            assert_eq!(name, "my-cluster");
        }
        other => panic!("unexpected result {other:?}"),
    }

    let resources = MockResources {
        patch_error: Some(404),
        ..MockResources::with_items(&["my-cluster"])
    };
    delete_custom_resources(&resources, "rook-ceph").await.unwrap();
    assert_eq!(resources.calls_for("cephclusters").len(), 3);
}

#[tokio::test]
async fn destroy_delete_and_get_errors() {
    let resources = MockResources {
        delete_error: Some(500),
        ..MockResources::with_items(&["replicapool"])
    };
    let result = delete_custom_resources(&resources, "rook-ceph").await;
    assert!(matches!(
        result,
        Err(Error::DeleteResource { resource, name, .. })
            if resource == "cephclusters" && name == "replicapool"
    ));

    let resources = MockResources {
        get_error: Some(500),
        ..MockResources::with_items(&["replicapool"])
    };
    let result = delete_custom_resources(&resources, "rook-ceph").await;
    assert!(matches!(
        result,
        Err(Error::GetResource { resource, name, .. })
            if resource == "cephclusters" && name == "replicapool"
    ));
}

#[tokio::test]
async fn status_of_resources() {
    let resource = CephResource::ceph_clusters();
    let mut cluster = DynamicObject::new("my-cluster", &resource.api_resource());
    cluster.data = serde_json::json!({ "status": { "phase": "Ready" } });
    let resources = MockResources {
        items: vec![
            cluster,
            DynamicObject::new("new-cluster", &resource.api_resource()),
        ],
        ..Default::default()
    };

    let reports = status_reports(&resources, "rook-ceph", &resource, &OutputFormat::Yaml)
        .await
        .unwrap();
    assert_eq!(
        reports,
        vec![
            ("my-cluster".to_string(), "phase: Ready\n".to_string()),
            ("new-cluster".to_string(), "{}\n".to_string()),
        ]
    );

    let reports = status_reports(&resources, "rook-ceph", &resource, &OutputFormat::Json)
        .await
        .unwrap();
    assert_eq!(reports[0].1, "{\n  \"phase\": \"Ready\"\n}");
}

#[tokio::test]
async fn mon_state() {
    let runner = MockRunner::new(|_| Ok(r#"{"name":"a","rank":0,"state":"leader"}"#.to_string()));
    validate_mon_is_up(&runner, "a").await.unwrap();
    assert_eq!(runner.commands(), vec!["ceph daemon mon.a mon_status"]);
    assert_eq!(runner.targets(), vec![ExecTarget::labeled("mon=a", "mon")]);

    let runner = MockRunner::new(|_| Ok(r#"{"state":"probing"}"#.to_string()));
    assert!(matches!(
        validate_mon_is_up(&runner, "b").await,
        Err(Error::MonNotHealthy { state, .. }) if state == "probing"
    ));

    let runner = MockRunner::new(|_| Err(command_failed("ceph", 22)));
    assert!(validate_mon_is_up(&runner, "c").await.is_err());
}

#[tokio::test]
async fn monmap_update() {
    let endpoints = parse_endpoints("a=10.0.0.1:6789,b=10.0.0.2:6789,c=10.0.0.3:6789").unwrap();
    let plan = RestorePlan::new("b", &endpoints, "0c7d7c83-2a4c-4f8b-b3a4-0d4b5e4b7a52").unwrap();
    let runner = MockRunner::new(|_| Ok(String::new()));
    update_mon_map(&runner, &plan).await.unwrap();

    let commands = runner.commands();
    assert_eq!(commands.len(), 6);
    assert!(commands[0].starts_with("ceph-mon --fsid=0c7d7c83-2a4c-4f8b-b3a4-0d4b5e4b7a52"));
    assert!(commands[0].ends_with("--extract-monmap=/tmp/monmap"));
    assert_eq!(commands[1], "monmaptool --print /tmp/monmap");
    assert_eq!(commands[2], "monmaptool /tmp/monmap --rm a");
    assert_eq!(commands[3], "monmaptool /tmp/monmap --rm c");
    assert!(commands[4].contains("--public-addr=10.0.0.2"));
    assert!(commands[4].ends_with("--inject-monmap=/tmp/monmap"));
    assert_eq!(commands[5], "monmaptool --print /tmp/monmap");
    assert!(runner
        .targets()
        .iter()
        .all(|target| target == &ExecTarget::labeled("ceph_daemon_type=mon,ceph_daemon_id=b", "mon")));
}

#[tokio::test]
async fn monmap_update_stops_on_failure() {
    let endpoints = parse_endpoints("a=10.0.0.1:6789,b=10.0.0.2:6789").unwrap();
    let plan = RestorePlan::new("a", &endpoints, "fsid").unwrap();
    let runner = MockRunner::new(|line| {
        if line.starts_with("monmaptool /tmp/monmap --rm") {
            Err(command_failed("monmaptool", 1))
        } else {
            Ok(String::new())
        }
    });
    assert!(update_mon_map(&runner, &plan).await.is_err());
    assert_eq!(runner.commands().len(), 3);
}

#[tokio::test]
async fn health_after_restore() {
    let attempts = RefCell::new(0);
    let runner = MockRunner::new(|_| {
        *attempts.borrow_mut() += 1;
        match *attempts.borrow() {
            1 => Err(command_failed("ceph", 1)),
            2 => Ok("cluster:\n    health: UNKNOWN\n".to_string()),
            _ => Ok("cluster:\n    health: HEALTH_WARN\n".to_string()),
        }
    });
    wait_for_health(&runner, 5, Duration::ZERO).await.unwrap();
    assert_eq!(runner.commands(), vec!["ceph status"; 3]);
    assert_eq!(runner.targets()[0], ExecTarget::Toolbox);

    let runner = MockRunner::new(|_| Ok("cluster:\n    health: UNKNOWN\n".to_string()));
    assert!(matches!(
        wait_for_health(&runner, 3, Duration::ZERO).await,
        Err(Error::Timeout { attempts: 3, .. })
    ));
    assert_eq!(runner.commands().len(), 3);
}

#[tokio::test]
async fn rbd_images() {
    let runner = MockRunner::new(|line| match line {
        "rbd ls --pool=replicapool" => Ok("csi-vol-1\ncsi-vol-2\n".to_string()),
        "rbd ls --pool=replicapool --namespace=tenant" => Ok("csi-vol-3\n".to_string()),
        _ => Ok(String::new()),
    });
    let pools = vec![
        PoolNamespaces {
            pool: "replicapool".to_string(),
            namespaces: vec!["tenant".to_string()],
        },
        PoolNamespaces {
            pool: "ecpool".to_string(),
            namespaces: vec![],
        },
    ];
    let images = list_images(&runner, &pools).await.unwrap();
    let image = |pool: &str, image: Option<&str>, namespace: Option<&str>| RbdImage {
        pool_name: pool.to_string(),
        image_name: image.map(ToString::to_string),
        namespace: namespace.map(ToString::to_string),
    };
    assert_eq!(
        images,
        vec![
            image("replicapool", Some("csi-vol-1"), None),
            image("replicapool", Some("csi-vol-2"), None),
            image("replicapool", Some("csi-vol-3"), Some("tenant")),
            image("ecpool", None, None),
        ]
    );
}

#[tokio::test]
async fn flatten_in_use_images() {
    let runner = MockRunner::new(|_| {
        Ok(r#"{"watchers":[{"address":"10.244.0.1:0/3212871212","client":4123,"cookie":1}]}"#.to_string())
    });
    assert!(matches!(
        flatten_image(&runner, "replicapool", "csi-vol-1", false, false).await,
        Err(Error::ImageInUse { .. })
    ));
    assert_eq!(
        runner.commands(),
        vec!["rbd -p replicapool status csi-vol-1 --format=json"]
    );

    let runner = MockRunner::new(|_| Ok(String::new()));
    flatten_image(&runner, "replicapool", "csi-vol-1", false, true)
        .await
        .unwrap();
    assert_eq!(
        runner.commands(),
        vec!["ceph rbd task add flatten replicapool/csi-vol-1"]
    );
}

#[tokio::test]
async fn flatten_cloned_images() {
    let runner = MockRunner::new(|line| {
        if line.contains(" status ") {
            Ok(r#"{"watchers":[]}"#.to_string())
        } else if line.contains(" info ") {
            Ok(r#"{"name":"csi-vol-1-temp","id":"10f5c8b1d2a3"}"#.to_string())
        } else {
            Ok(String::new())
        }
    });
    flatten_image(&runner, "replicapool", "csi-vol-1", true, false)
        .await
        .unwrap();
    assert_eq!(
        runner.commands(),
        vec![
            "rbd -p replicapool status csi-vol-1 --format=json",
            "rbd -p replicapool info csi-vol-1-temp --format=json",
            "rbd -p replicapool trash mv csi-vol-1-temp",
            "ceph rbd task add trash remove replicapool/10f5c8b1d2a3",
            "ceph rbd task add flatten replicapool/csi-vol-1",
        ]
    );

    let runner = MockRunner::new(|line| {
        if line.contains(" info ") {
            Err(command_failed("rbd", 2))
        } else {
            Ok(String::new())
        }
    });
    flatten_image(&runner, "replicapool", "csi-vol-1", true, true)
        .await
        .unwrap();
    assert_eq!(
        runner.commands(),
        vec![
            "rbd -p replicapool info csi-vol-1-temp --format=json",
            "ceph rbd task add flatten replicapool/csi-vol-1",
        ]
    );
}

const EXTERNAL: &str = "-m 10.0.0.1:6789 --id csi-cephfs-provisioner --key secret";

fn external_args() -> Vec<String> {
    EXTERNAL.split(' ').map(ToString::to_string).collect()
}

fn subvolume_cluster(line: &str) -> Result<String, Error> {
    let line = line.trim_end_matches(EXTERNAL).trim_end();
    let output = match line {
        "ceph fs ls --format json" => {
            r#"[{"name":"myfs","metadata_pool":"myfs-metadata","data_pools":["myfs-replicated"]}]"#
        }
        "ceph fs subvolumegroup ls myfs --format json" => r#"[{"name":"csi"}]"#,
        "ceph fs subvolume ls myfs csi --format json" => {
            r#"[{"name":"csi-vol-inuse"},{"name":"csi-vol-stale"},{"name":"csi-vol-snap"},{"name":"csi-vol-retained"},{"name":"csi-vol-clone"}]"#
        }
        "ceph fs subvolume info myfs csi-vol-clone csi --format json" => {
            return Err(command_failed("ceph", 11))
        }
        "ceph fs subvolume info myfs csi-vol-retained csi --format json" => {
            r#"{"state":"snapshot-retained"}"#
        }
        "ceph fs subvolume snapshot ls myfs csi-vol-snap csi --format json" => {
            r#"[{"name":"csi-snap-keep"},{"name":"csi-snap-gone"}]"#
        }
        "rados getomapval csi.snap.gone csi.snapname -p myfs-metadata --namespace csi /dev/stdout" => {
            "snapcontent-1234\n"
        }
        _ if line.starts_with("ceph fs subvolume info") => r#"{"state":"complete"}"#,
        _ if line.starts_with("ceph fs subvolume snapshot ls") => "[]",
        _ => "",
    };
    Ok(output.to_string())
}

#[tokio::test]
async fn subvolume_listing() {
    let runner = MockRunner::new(subvolume_cluster);
    let subvolumes = Subvolumes::new(&runner, external_args());
    let referenced = BTreeSet::from(["csi-vol-inuse".to_string()]);
    let snapshots = BTreeSet::from(["keep".to_string()]);

    let listed = subvolumes
        .list(&referenced, &snapshots, false)
        .await
        .unwrap();
    let subvolume = |name: &str, state| Subvolume {
        filesystem: "myfs".to_string(),
        name: name.to_string(),
        group: "csi".to_string(),
        state,
    };
    assert_eq!(
        listed,
        vec![
            subvolume("csi-vol-inuse", SubvolumeState::InUse),
            subvolume("csi-vol-stale", SubvolumeState::Stale),
            subvolume("csi-vol-snap", SubvolumeState::StaleWithSnapshot),
        ]
    );

    let commands = runner.commands();
    assert!(commands.iter().all(|command| command.ends_with(EXTERNAL)));
    let removed = commands
        .iter()
        .filter(|command| {
            command.starts_with("rados rm")
                || command.starts_with("rados rmomapkey")
                || command.starts_with("ceph fs subvolume snapshot rm")
        })
        .map(|command| command.trim_end_matches(EXTERNAL).trim_end())
        .collect::<Vec<_>>();
    assert_eq!(
        removed,
        vec![
            "rados rm csi.snap.gone -p myfs-metadata --namespace csi",
            "rados rmomapkey csi.snaps.default csi.snap.snapcontent-1234 -p myfs-metadata --namespace csi",
            "ceph fs subvolume snapshot rm myfs csi-vol-snap csi-snap-gone csi",
        ]
    );

    let runner = MockRunner::new(subvolume_cluster);
    let subvolumes = Subvolumes::new(&runner, external_args());
    let stale = subvolumes
        .list(&referenced, &snapshots, true)
        .await
        .unwrap();
    assert!(stale.iter().all(|sv| sv.state != SubvolumeState::InUse));
    assert_eq!(stale.len(), 2);
}

#[tokio::test]
async fn subvolume_listing_errors() {
    let runner = MockRunner::new(|_| Ok("[]".to_string()));
    let subvolumes = Subvolumes::new(&runner, vec![]);
    assert!(matches!(
        subvolumes.list(&BTreeSet::new(), &BTreeSet::new(), false).await,
        Err(Error::NoFilesystem {})
    ));

    let runner = MockRunner::new(|line| {
        if line.starts_with("ceph fs subvolume info") {
            Err(command_failed("ceph", 2))
        } else {
            subvolume_cluster(line)
        }
    });
    let subvolumes = Subvolumes::new(&runner, vec![]);
    assert!(matches!(
        subvolumes.list(&BTreeSet::new(), &BTreeSet::new(), false).await,
        Err(Error::CommandFailed { code: Some(2), .. })
    ));
}

#[tokio::test]
async fn subvolume_deletion() {
    let id = "427774b4-340b-11ed-8d66-0242ac110005";
    let runner = MockRunner::new(move |line| {
        let output = if line.contains("getomapval csi.volume.") && line.contains("csi.volname") {
            "pvc-fca205e5\n".to_string()
        } else if line.contains("csi.nfs.cluster") {
            "my-nfs".to_string()
        } else if line.starts_with("ceph nfs export ls") {
            format!(r#"["/other","/nfs-{id}"]"#)
        } else if line.starts_with("ceph fs ls") {
            r#"[{"name":"myfs","metadata_pool":"myfs-metadata"}]"#.to_string()
        } else {
            String::new()
        };
        Ok(output)
    });
    let subvolumes = Subvolumes::new(&runner, vec![]);
    let subvolume = format!("csi-vol-{id}");

    let referenced = BTreeSet::from([subvolume.clone()]);
    subvolumes
        .delete(&referenced, &subvolume, "myfs", "csi")
        .await
        .unwrap();
    assert!(runner.commands().is_empty());

    subvolumes
        .delete(&BTreeSet::new(), &subvolume, "myfs", "csi")
        .await
        .unwrap();
    let commands = runner.commands();
    let mutations = commands
        .iter()
        .filter(|command| {
            !command.contains("getomapval") && !command.contains(" ls")
        })
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(
        mutations,
        vec![
            format!("ceph nfs export delete my-nfs /nfs-{id}"),
            format!("rados rm csi.volume.{id} -p myfs-metadata --namespace csi"),
            "rados rmomapkey csi.volumes.default csi.volume.pvc-fca205e5 -p myfs-metadata --namespace csi"
                .to_string(),
            format!("ceph fs subvolume rm myfs {subvolume} csi --retain-snapshots"),
        ]
    );
}

#[tokio::test]
async fn subvolume_without_metadata_pool() {
    let runner = MockRunner::new(|_| Ok(r#"[{"name":"otherfs","metadata_pool":"other"}]"#.to_string()));
    let subvolumes = Subvolumes::new(&runner, vec![]);
    assert!(matches!(
        subvolumes
            .delete(&BTreeSet::new(), "csi-vol-1234", "myfs", "csi")
            .await,
        Err(Error::MetadataPoolNotFound { fs }) if fs == "myfs"
    ));
}
