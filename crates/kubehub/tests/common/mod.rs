#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use shipyard_kubehub::{CommandOutput, CommandRunner, RunOptions};

/// Answers commands from a fixed script keyed by the space-joined argv.
/// Unscripted commands fail.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<(String, RunOptions)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self { Self::default() }

    pub fn ok(self, cmd: &str, stdout: &str) -> Self {
        self.responses.lock().unwrap().insert(cmd.to_string(), CommandOutput::ok(stdout));
        self
    }

    pub fn fail(self, cmd: &str, stderr: &str) -> Self {
        self.responses.lock().unwrap().insert(cmd.to_string(), CommandOutput::failed(stderr));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn count(&self, cmd: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(c, _)| c == cmd).count()
    }

    pub fn options(&self) -> Vec<RunOptions> {
        self.calls.lock().unwrap().iter().map(|(_, o)| o.clone()).collect()
    }
}

#[async_trait::async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, args: &[String], opts: &RunOptions) -> CommandOutput {
        let cmd = args.join(" ");
        self.calls.lock().unwrap().push((cmd.clone(), opts.clone()));
        self.responses
            .lock()
            .unwrap()
            .get(&cmd)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(format!("unscripted command: {}", cmd)))
    }
}

pub const ROOT_PATHS: &str = r#"{"paths":["/api","/api/v1","/apis","/apis/apps","/apis/apps/v1","/apis/events.k8s.io/v1","/healthz","/openapi/v2"]}"#;

pub const CORE_V1: &str = r#"{"kind":"APIResourceList","groupVersion":"v1","resources":[
  {"name":"pods","namespaced":true,"kind":"Pod","verbs":["create","delete","get","list","watch"]},
  {"name":"pods/log","namespaced":true,"kind":"Pod","verbs":["get"]},
  {"name":"configmaps","namespaced":true,"kind":"ConfigMap","verbs":["create","delete","get","list"]},
  {"name":"events","namespaced":true,"kind":"Event","verbs":["create","delete","get","list"]},
  {"name":"bindings","namespaced":true,"kind":"Binding","verbs":["create"]},
  {"name":"namespaces","namespaced":false,"kind":"Namespace","verbs":["create","delete","get","list"]},
  {"name":"nodes","namespaced":false,"kind":"Node","verbs":["create","delete","get","list"]},
  {"name":"nodeproxyoptions","namespaced":false,"kind":"NodeProxyOptions","verbs":["create","delete"]},
  {"name":"persistentvolumes","namespaced":false,"kind":"PersistentVolume","verbs":["create","delete","get","list"]}
]}"#;

pub const APPS_V1: &str = r#"{"kind":"APIResourceList","groupVersion":"apps/v1","resources":[
  {"name":"deployments","namespaced":true,"kind":"Deployment","verbs":["create","delete","get","list"]},
  {"name":"deployments/scale","namespaced":true,"kind":"Scale","verbs":["get","patch"]},
  {"name":"controllerrevisions","namespaced":true,"kind":"ControllerRevision","verbs":["create","delete","get"]}
]}"#;

pub const EVENTS_V1: &str = r#"{"kind":"APIResourceList","groupVersion":"events.k8s.io/v1","resources":[
  {"name":"events","namespaced":true,"kind":"Event","verbs":["create","delete","get","list"]}
]}"#;

pub const API_RESOURCES_NAMESPACED: &str = "\
NAME                  SHORTNAMES   APIGROUP   NAMESPACED   KIND                 VERBS
bindings                                      true         Binding              [create]
configmaps            cm                      true         ConfigMap            [create delete deletecollection get list patch update watch]
pods                  po                      true         Pod                  [create delete deletecollection get list patch update watch]
controllerrevisions                apps       true         ControllerRevision   [create delete deletecollection get list patch update watch]
deployments           deploy       apps       true         Deployment           [create delete deletecollection get list patch update watch]
cronjobs              cj           batch      true         CronJob              [create delete deletecollection get list patch update watch]
jobs                               batch      true         Job                  [create delete deletecollection get list patch update watch]
widgets                            acme.io    true         Widget               [create delete get list]
";

pub const API_VERSIONS: &str = "\
apps/v1
batch/v1
batch/v1beta1
events.k8s.io/v1
v1
";

pub fn path_cluster() -> ScriptedRunner {
    ScriptedRunner::new()
        .ok("get --raw /", ROOT_PATHS)
        .ok("get --raw /api/v1", CORE_V1)
        .ok("get --raw /apis/apps/v1", APPS_V1)
        .ok("get --raw /apis/events.k8s.io/v1", EVENTS_V1)
}

pub fn tabular_cluster() -> ScriptedRunner {
    ScriptedRunner::new()
        .ok("api-resources --namespaced=true", API_RESOURCES_NAMESPACED)
        .ok("api-versions", API_VERSIONS)
}
