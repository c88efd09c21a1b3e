//! End-to-end pipeline tests against an in-memory fake cluster.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use serde_json::{json, Value};

use kapply_assets::MemorySource;
use kapply_core::{
    Applier, ApplierError, ApplierOptions, ApplyAction, CoreResult, DynamicClusterClient,
    OwnerObject, OwnerSpec, ResourceIdent, SchemaClient, SchemaStatus, SchemaSubmission,
};

/// In-memory stand-in for the API server, with the same conflict and
/// uid/resourceVersion behavior the engine relies on.
#[derive(Default)]
struct FakeCluster {
    objects: Mutex<HashMap<String, Value>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    /// Resource name whose create is always denied.
    reject_name: Option<String>,
}

impl FakeCluster {
    fn key(ident: &ResourceIdent) -> String {
        ident.to_string()
    }

    fn stored(&self, ident: &ResourceIdent) -> Option<Value> {
        self.objects.lock().unwrap().get(&Self::key(ident)).cloned()
    }

    fn conflict() -> ApplierError {
        ApplierError::Cluster(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "already exists".to_string(),
            reason: "AlreadyExists".to_string(),
            code: 409,
        }))
    }
}

#[async_trait]
impl DynamicClusterClient for FakeCluster {
    async fn get(&self, ident: &ResourceIdent) -> CoreResult<Option<Value>> {
        Ok(self.stored(ident))
    }

    async fn create(&self, ident: &ResourceIdent, body: &Value) -> CoreResult<Value> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.reject_name.as_deref() == Some(ident.name.as_str()) {
            return Err(ApplierError::Apply {
                ident: ident.to_string(),
                message: "admission denied".to_string(),
            });
        }
        let mut objects = self.objects.lock().unwrap();
        let key = Self::key(ident);
        if objects.contains_key(&key) {
            return Err(Self::conflict());
        }
        let mut stored = body.clone();
        stored["metadata"]["uid"] = json!(format!("uid-{}", ident.name));
        stored["metadata"]["resourceVersion"] = json!("1");
        objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, ident: &ResourceIdent, body: &Value) -> CoreResult<Value> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().unwrap();
        objects.insert(Self::key(ident), body.clone());
        Ok(body.clone())
    }
}

/// Schema client whose definitions establish immediately.
#[derive(Default)]
struct InstantSchema {
    submitted: Mutex<Vec<String>>,
}

#[async_trait]
impl SchemaClient for InstantSchema {
    async fn submit(&self, body: &Value) -> CoreResult<SchemaSubmission> {
        let name = body
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut submitted = self.submitted.lock().unwrap();
        if submitted.contains(&name) {
            return Ok(SchemaSubmission::AlreadyExists);
        }
        submitted.push(name);
        Ok(SchemaSubmission::Created)
    }

    async fn status(&self, _name: &str) -> CoreResult<SchemaStatus> {
        Ok(SchemaStatus {
            established: true,
            names_accepted: true,
            summary: "Established=True, NamesAccepted=True".to_string(),
        })
    }
}

fn configmap_assets() -> MemorySource {
    MemorySource::new().with_asset(
        "configmap.yaml",
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: {{name}}
  namespace: demo
data:
  content: {{content}}
",
    )
}

fn applier_over(cluster: Arc<FakeCluster>, schema: Arc<InstantSchema>) -> Applier {
    Applier::new(ApplierOptions {
        cluster: Some(cluster),
        schema: Some(schema),
        ..Default::default()
    })
    .unwrap()
}

fn persisted_namespace(name: &str, uid: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn renders_and_creates_configmap_without_owner() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema);

    let values = json!({"name": "file1", "content": "file1content"});
    let result = applier
        .apply_directly(&configmap_assets(), &["configmap.yaml"], &values)
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.outcomes[0].action, ApplyAction::Created);
    assert_eq!(result.outcomes[0].ident.name, "file1");

    let stored = cluster
        .stored(&result.outcomes[0].ident)
        .expect("object should be stored");
    assert_eq!(
        stored.pointer("/data/content"),
        Some(&json!("file1content"))
    );
    assert!(stored.pointer("/metadata/ownerReferences").is_none());
}

#[tokio::test]
async fn applying_twice_never_duplicates() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema);

    let values = json!({"name": "file1", "content": "file1content"});
    let first = applier
        .apply_directly(&configmap_assets(), &["configmap.yaml"], &values)
        .await
        .unwrap();
    let second = applier
        .apply_directly(&configmap_assets(), &["configmap.yaml"], &values)
        .await
        .unwrap();

    assert_eq!(first.outcomes[0].action, ApplyAction::Created);
    assert_eq!(second.outcomes[0].action, ApplyAction::Unchanged);
    assert_eq!(cluster.objects.lock().unwrap().len(), 1);
    assert_eq!(cluster.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn changed_values_update_in_place() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema);

    applier
        .apply_directly(
            &configmap_assets(),
            &["configmap.yaml"],
            &json!({"name": "file1", "content": "v1"}),
        )
        .await
        .unwrap();
    let second = applier
        .apply_directly(
            &configmap_assets(),
            &["configmap.yaml"],
            &json!({"name": "file1", "content": "v2"}),
        )
        .await
        .unwrap();

    assert_eq!(second.outcomes[0].action, ApplyAction::Updated);
    let stored = cluster.stored(&second.outcomes[0].ident).unwrap();
    assert_eq!(stored.pointer("/data/content"), Some(&json!("v2")));
    // Server identity survived the update.
    assert_eq!(stored.pointer("/metadata/uid"), Some(&json!("uid-file1")));
}

#[tokio::test]
async fn owner_reference_with_unset_flags_is_minimal() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = Applier::new(ApplierOptions {
        cluster: Some(cluster.clone()),
        schema: Some(schema),
        owner: Some(OwnerSpec {
            object: OwnerObject::typed(&persisted_namespace("my-ns-owner-1", "uid-owner-1")),
            controller: false,
            block_owner_deletion: false,
        }),
        ..Default::default()
    })
    .unwrap();

    let assets = MemorySource::new().with_asset(
        "ns.yaml",
        "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: my-ns\n",
    );
    let result = applier
        .apply_directly(&assets, &["ns.yaml"], &json!({}))
        .await
        .unwrap();
    assert!(result.succeeded());

    let stored = cluster.stored(&result.outcomes[0].ident).unwrap();
    let refs = stored
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .cloned()
        .unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].get("apiVersion"), Some(&json!("v1")));
    assert_eq!(refs[0].get("kind"), Some(&json!("Namespace")));
    assert_eq!(refs[0].get("name"), Some(&json!("my-ns-owner-1")));
    assert_eq!(refs[0].get("uid"), Some(&json!("uid-owner-1")));
    assert_eq!(refs[0].get("controller"), None);
    assert_eq!(refs[0].get("blockOwnerDeletion"), None);
}

#[tokio::test]
async fn owner_reference_with_set_flags_carries_true() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = Applier::new(ApplierOptions {
        cluster: Some(cluster.clone()),
        schema: Some(schema),
        owner: Some(OwnerSpec {
            object: OwnerObject::typed(&persisted_namespace("my-ns-owner-1", "uid-owner-1")),
            controller: true,
            block_owner_deletion: true,
        }),
        ..Default::default()
    })
    .unwrap();

    let assets = MemorySource::new().with_asset(
        "ns.yaml",
        "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: my-ns\n",
    );
    let result = applier
        .apply_directly(&assets, &["ns.yaml"], &json!({}))
        .await
        .unwrap();
    assert!(result.succeeded());

    let stored = cluster.stored(&result.outcomes[0].ident).unwrap();
    let refs = stored
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .cloned()
        .unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].get("controller"), Some(&json!(true)));
    assert_eq!(refs[0].get("blockOwnerDeletion"), Some(&json!(true)));
}

#[tokio::test]
async fn crd_establishes_before_instance_applies() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema.clone());

    let assets = MemorySource::new().with_asset(
        "stack.yaml",
        "\
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.io
spec:
  group: example.io
  names:
    kind: Widget
    plural: widgets
---
apiVersion: example.io/v1
kind: Widget
metadata:
  name: w1
  namespace: demo
spec:
  size: {{size}}
",
    );

    let result = applier
        .apply_custom_resources(&assets, &["stack.yaml"], &json!({"size": 2}))
        .await
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[0].ident.kind, "CustomResourceDefinition");
    assert_eq!(result.outcomes[0].action, ApplyAction::Created);
    assert_eq!(result.outcomes[1].ident.kind, "Widget");
    assert_eq!(result.outcomes[1].action, ApplyAction::Created);
    assert_eq!(
        *schema.submitted.lock().unwrap(),
        vec!["widgets.example.io".to_string()]
    );

    let widget = cluster.stored(&result.outcomes[1].ident).unwrap();
    assert_eq!(widget.pointer("/spec/size"), Some(&json!(2)));
}

#[tokio::test]
async fn malformed_document_aborts_before_any_mutation() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema);

    let assets = MemorySource::new().with_asset(
        "broken.yaml",
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: fine
---
metadata:
  name: missing-type-info
",
    );

    let err = applier
        .apply_directly(&assets, &["broken.yaml"], &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplierError::Decode(_)));
    assert_eq!(cluster.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_context_value_aborts_before_any_mutation() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema);

    let err = applier
        .apply_directly(
            &configmap_assets(),
            &["configmap.yaml"],
            &json!({"name": "file1"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApplierError::Render(_)));
    assert_eq!(cluster.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn aggregate_error_names_failed_resources() {
    let cluster = Arc::new(FakeCluster {
        reject_name: Some("denied".to_string()),
        ..Default::default()
    });
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema);

    let assets = MemorySource::new().with_asset(
        "cms.yaml",
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: denied
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: allowed
",
    );
    let result = applier
        .apply_directly(&assets, &["cms.yaml"], &json!({}))
        .await
        .unwrap();

    // The failure is recorded and the batch continued.
    assert_eq!(result.outcomes[0].action, ApplyAction::Failed);
    assert_eq!(result.outcomes[1].action, ApplyAction::Created);

    let err = result.ensure_success().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("1 of 2"));
    assert!(message.contains("denied"));
    assert!(message.contains("admission denied"));
}

#[tokio::test]
async fn render_templates_previews_without_applying() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let applier = applier_over(cluster.clone(), schema);

    let resources = applier
        .render_templates(
            &configmap_assets(),
            &["configmap.yaml"],
            &json!({"name": "file1", "content": "file1content"}),
        )
        .unwrap();

    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].ident.name, "file1");
    assert_eq!(cluster.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn template_functions_from_options_are_available() {
    let cluster = Arc::new(FakeCluster::default());
    let schema = Arc::new(InstantSchema::default());
    let mut functions: HashMap<String, kapply_templates::TemplateFn> = HashMap::new();
    functions.insert(
        "upper".to_string(),
        Arc::new(|args: &[String]| -> Result<String, String> { Ok(args[0].to_uppercase()) }),
    );
    let applier = Applier::new(ApplierOptions {
        cluster: Some(cluster.clone()),
        schema: Some(schema),
        functions,
        ..Default::default()
    })
    .unwrap();

    let assets = MemorySource::new().with_asset(
        "cm.yaml",
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: {{name}}
data:
  shout: {{upper(name)}}
",
    );
    let result = applier
        .apply_directly(&assets, &["cm.yaml"], &json!({"name": "file1"}))
        .await
        .unwrap();
    assert!(result.succeeded());

    let stored = cluster.stored(&result.outcomes[0].ident).unwrap();
    assert_eq!(stored.pointer("/data/shout"), Some(&json!("FILE1")));
}
