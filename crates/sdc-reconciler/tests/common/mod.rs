//! In-memory collaborator fakes shared by the integration scenarios.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sdc_api::{
    Component, ComponentStatus, Resource, ResourceRef, ResourceSpec, ResourceStatus, SourceRef,
};
use sdc_model::{AccessSpec, ComponentDescriptor, DescriptorRef, Identity};
use sdc_reconciler::{
    generate_snapshot_name, ClusterClient, ComponentVersion, EventRecorder, ModelClient,
    ModelContext, ReconcilerOptions, ResourceAccess, ResourceReconciler, Severity, SnapshotWriter,
};

pub const INTERVAL_SECS: u64 = 600;

#[derive(Default)]
pub struct FakeCluster {
    pub components: Mutex<HashMap<(String, String), Component>>,
    pub descriptors: Mutex<HashMap<(String, String), ComponentDescriptor>>,
    pub patched: Mutex<Vec<Resource>>,
    pub fail_get_component: AtomicBool,
    pub fail_patch: AtomicBool,
}

impl FakeCluster {
    pub fn insert_component(&self, component: Component) {
        self.components.lock().unwrap().insert(
            (component.namespace.clone(), component.name.clone()),
            component,
        );
    }

    pub fn insert_descriptor(&self, reference: &DescriptorRef, descriptor: ComponentDescriptor) {
        self.descriptors.lock().unwrap().insert(
            (reference.namespace.clone(), reference.name.clone()),
            descriptor,
        );
    }

    pub fn patch_count(&self) -> usize {
        self.patched.lock().unwrap().len()
    }

    pub fn last_patched(&self) -> Resource {
        self.patched.lock().unwrap().last().cloned().unwrap()
    }
}

impl ClusterClient for FakeCluster {
    fn get_component(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Component>> {
        if self.fail_get_component.load(Ordering::SeqCst) {
            anyhow::bail!("cluster unavailable");
        }
        Ok(self
            .components
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    fn get_descriptor(
        &self,
        reference: &DescriptorRef,
    ) -> anyhow::Result<Option<ComponentDescriptor>> {
        Ok(self
            .descriptors
            .lock()
            .unwrap()
            .get(&(reference.namespace.clone(), reference.name.clone()))
            .cloned())
    }

    fn patch_status(&self, object: &Resource) -> anyhow::Result<()> {
        if self.fail_patch.load(Ordering::SeqCst) {
            anyhow::bail!("patch rejected");
        }
        self.patched.lock().unwrap().push(object.clone());
        Ok(())
    }
}

/// One named resource inside a fake component version.
#[derive(Clone)]
pub struct FakeResource {
    pub name: String,
    pub version: String,
    pub access: Option<AccessSpec>,
    /// Bytes returned by `get`, e.g. a plugin binary.
    pub blob: Vec<u8>,
    /// Files written by `download_to`, relative path to contents.
    pub files: Vec<(String, Vec<u8>)>,
    pub download_dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeResource {
    pub fn with_files(name: &str, files: Vec<(&str, &[u8])>) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            access: None,
            blob: Vec::new(),
            files: files
                .into_iter()
                .map(|(path, contents)| (path.to_string(), contents.to_vec()))
                .collect(),
            download_dirs: Arc::default(),
        }
    }

    pub fn with_blob(name: &str, blob: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            access: None,
            blob,
            files: Vec::new(),
            download_dirs: Arc::default(),
        }
    }
}

impl ResourceAccess for FakeResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn access(&self) -> anyhow::Result<AccessSpec> {
        self.access
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no access spec declared"))
    }

    fn get(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.blob.clone())
    }

    fn download_to(&self, dir: &Path) -> anyhow::Result<()> {
        self.download_dirs.lock().unwrap().push(dir.to_path_buf());
        for (path, contents) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, contents)?;
        }
        Ok(())
    }
}

pub struct FakeComponentVersion {
    pub version: String,
    pub resources: Mutex<HashMap<String, FakeResource>>,
}

impl FakeComponentVersion {
    pub fn new(version: &str, resources: Vec<FakeResource>) -> Arc<Self> {
        Arc::new(Self {
            version: version.to_string(),
            resources: Mutex::new(
                resources
                    .into_iter()
                    .map(|r| (r.name.clone(), r))
                    .collect(),
            ),
        })
    }
}

impl ComponentVersion for FakeComponentVersion {
    fn version(&self) -> &str {
        &self.version
    }

    fn get_resource(&self, name: &str) -> anyhow::Result<Box<dyn ResourceAccess>> {
        self.resources
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .map(|r| Box::new(r) as Box<dyn ResourceAccess>)
            .ok_or_else(|| anyhow::anyhow!("resource '{name}' not found"))
    }
}

type LookupLog = Arc<Mutex<Vec<(String, String, String)>>>;
type LookupTable = Arc<Mutex<HashMap<(String, String, String), Arc<FakeComponentVersion>>>>;

pub struct FakeModel {
    pub component_version: Arc<FakeComponentVersion>,
    pub middleware_components: LookupTable,
    pub lookups: LookupLog,
    pub fail_context: AtomicBool,
    pub fail_version: AtomicBool,
}

impl FakeModel {
    pub fn new(component_version: Arc<FakeComponentVersion>) -> Self {
        Self {
            component_version,
            middleware_components: Arc::default(),
            lookups: Arc::default(),
            fail_context: AtomicBool::new(false),
            fail_version: AtomicBool::new(false),
        }
    }

    pub fn host_middleware(
        &self,
        registry: &str,
        component: &str,
        version: &str,
        hosting: Arc<FakeComponentVersion>,
    ) {
        self.middleware_components.lock().unwrap().insert(
            (
                registry.to_string(),
                component.to_string(),
                version.to_string(),
            ),
            hosting,
        );
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

impl ModelClient for FakeModel {
    fn create_authenticated_context(
        &self,
        _component: &Component,
    ) -> anyhow::Result<Box<dyn ModelContext>> {
        if self.fail_context.load(Ordering::SeqCst) {
            anyhow::bail!("credentials not configured");
        }
        Ok(Box::new(FakeContext {
            table: self.middleware_components.clone(),
            lookups: self.lookups.clone(),
        }))
    }

    fn get_component_version(
        &self,
        _context: Option<&dyn ModelContext>,
        _component: &Component,
    ) -> anyhow::Result<Arc<dyn ComponentVersion>> {
        if self.fail_version.load(Ordering::SeqCst) {
            anyhow::bail!("registry unreachable");
        }
        Ok(self.component_version.clone())
    }
}

pub struct FakeContext {
    table: LookupTable,
    lookups: LookupLog,
}

impl ModelContext for FakeContext {
    fn lookup_component_version(
        &self,
        registry: &str,
        name: &str,
        version: &str,
    ) -> anyhow::Result<Arc<dyn ComponentVersion>> {
        self.lookups.lock().unwrap().push((
            registry.to_string(),
            name.to_string(),
            version.to_string(),
        ));
        self.table
            .lock()
            .unwrap()
            .get(&(registry.to_string(), name.to_string(), version.to_string()))
            .cloned()
            .map(|cv| cv as Arc<dyn ComponentVersion>)
            .ok_or_else(|| anyhow::anyhow!("component '{name}:{version}' not found in '{registry}'"))
    }
}

/// One recorded snapshot write, with the working directory contents
/// captured at write time.
pub struct SnapshotWrite {
    pub snapshot_name: String,
    pub identity: Identity,
    pub content_dir: PathBuf,
    pub files: BTreeMap<String, Vec<u8>>,
}

#[derive(Default)]
pub struct RecordingSnapshots {
    pub writes: Mutex<Vec<SnapshotWrite>>,
    pub fail: AtomicBool,
}

impl RecordingSnapshots {
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

impl SnapshotWriter for RecordingSnapshots {
    fn write(
        &self,
        owner: &Resource,
        content: &Path,
        identity: &Identity,
    ) -> anyhow::Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("snapshot store unavailable");
        }
        let mut files = BTreeMap::new();
        for entry in walk_files(content)? {
            let relative = entry
                .strip_prefix(content)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.insert(relative, std::fs::read(&entry)?);
        }
        self.writes.lock().unwrap().push(SnapshotWrite {
            snapshot_name: owner.status.snapshot_name.clone(),
            identity: identity.clone(),
            content_dir: content.to_path_buf(),
            files,
        });
        Ok(identity.digest())
    }
}

fn walk_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                stack.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}

pub struct RecordedEvent {
    pub severity: Severity,
    pub message: String,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Default)]
pub struct RecordingRecorder {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingRecorder {
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }
}

impl EventRecorder for RecordingRecorder {
    fn event(
        &self,
        _object: &Resource,
        severity: Severity,
        message: &str,
        metadata: Option<BTreeMap<String, String>>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            severity,
            message: message.to_string(),
            metadata,
        });
    }
}

/// Everything a scenario needs, wired to an in-memory world holding
/// one component, its root descriptor, and one `manifests` resource.
pub struct World {
    pub cluster: Arc<FakeCluster>,
    pub model: Arc<FakeModel>,
    pub snapshots: Arc<RecordingSnapshots>,
    pub recorder: Arc<RecordingRecorder>,
}

impl World {
    pub fn new() -> Self {
        let component_version = FakeComponentVersion::new(
            "v1.0.0",
            vec![FakeResource::with_files(
                "manifests",
                vec![("deploy.yaml", b"apiVersion: apps/v1\nkind: Deployment\n".as_slice())],
            )],
        );
        Self::with_component_version(component_version)
    }

    pub fn with_component_version(component_version: Arc<FakeComponentVersion>) -> Self {
        let cluster = Arc::new(FakeCluster::default());
        let descriptor_ref = DescriptorRef::new("app-descriptor", "default");
        cluster.insert_component(Component {
            name: "app".to_string(),
            namespace: "default".to_string(),
            status: ComponentStatus {
                reconciled_version: "v1.0.0".to_string(),
                component_descriptor: descriptor_ref.clone(),
            },
        });
        cluster.insert_descriptor(
            &descriptor_ref,
            ComponentDescriptor {
                name: "acme.org/app".to_string(),
                version: "v1.0.0".to_string(),
                resources: Vec::new(),
                references: Vec::new(),
            },
        );

        Self {
            cluster,
            model: Arc::new(FakeModel::new(component_version)),
            snapshots: Arc::new(RecordingSnapshots::default()),
            recorder: Arc::new(RecordingRecorder::default()),
        }
    }

    pub fn reconciler(&self) -> ResourceReconciler {
        ResourceReconciler::new(
            self.cluster.clone(),
            self.model.clone(),
            self.snapshots.clone(),
            self.recorder.clone(),
            ReconcilerOptions::default(),
        )
        .unwrap()
    }
}

/// A `Resource` object pointing at the world's component, with its
/// snapshot name already assigned.
pub fn resource_object() -> Resource {
    let mut object = new_resource_object();
    object.status.snapshot_name = generate_snapshot_name(&object.name, &object.namespace);
    object
}

/// A freshly created object: generation 1, empty status.
pub fn new_resource_object() -> Resource {
    Resource {
        name: "app-manifests".to_string(),
        namespace: "default".to_string(),
        generation: 1,
        spec: ResourceSpec {
            source_ref: SourceRef {
                name: "app".to_string(),
                namespace: None,
                resource_ref: ResourceRef {
                    name: "manifests".to_string(),
                    version: Some("1.0.0".to_string()),
                    extra_identity: BTreeMap::new(),
                    reference_path: Vec::new(),
                },
            },
            middleware: Vec::new(),
            suspend: false,
            interval_seconds: INTERVAL_SECS,
        },
        status: ResourceStatus::default(),
    }
}
