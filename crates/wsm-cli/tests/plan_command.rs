use std::fs;
use std::path::PathBuf;

use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::TempDir;

const WORKSPACE_ID: &str = "0d7c8d3e-4c1f-4a55-9a7e-2f3b6c1d9e01";

macro_rules! wsm {
    () => {
        assert_cmd::cargo::cargo_bin_cmd!("wsm")
    };
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

fn bucket(dir: &TempDir, bucket_name: &str) -> PathBuf {
    write(
        dir,
        "bucket.toml",
        &format!(
            r#"kind = "gcs_bucket"
bucket_name = "{bucket_name}"

[common]
workspace_id = "{WORKSPACE_ID}"
resource_id = "5b0e2f4a-9d61-4c0b-8e2a-7a3f1c6d8b02"
name = "analysis"
region = "us-east1"
"#
        ),
    )
}

fn shared_namespace(dir: &TempDir) -> PathBuf {
    write(
        dir,
        "namespace.toml",
        &format!(
            r#"kind = "kubernetes_namespace"
kubernetes_namespace = "analysis-ns"
kubernetes_service_account = "analysis-ksa"
managed_identity = "analysis-id"
databases = ["9c4e1a7b-3f2d-4e8a-b6c5-1d0f9e8a7b03"]

[common]
workspace_id = "{WORKSPACE_ID}"
resource_id = "2e6a9c1f-7b4d-4f3e-a8c2-6d5b0e1f9a04"
name = "analysis"
region = "eastus"
"#
        ),
    )
}

fn dataproc_cluster(dir: &TempDir) -> PathBuf {
    write(
        dir,
        "cluster.toml",
        &format!(
            r#"kind = "dataproc_cluster"
cluster_id = "analysis-cluster"
project_id = "analysis-project"

[common]
workspace_id = "{WORKSPACE_ID}"
resource_id = "7f3d2b1a-6c5e-4d9f-8a0b-3e2c1d4f5a06"
name = "analysis"
region = "us-central1"
"#
        ),
    )
}

#[test]
fn plan_bucket_create_lists_wrapped_steps() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = bucket(&dir, "analysis-bucket");

    wsm!()
        .args(["plan", "--resource"])
        .arg(&resource)
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(contains("create-gcs-bucket (create)"))
        .stdout(contains(" 1. store_resource_metadata"))
        .stdout(contains(" 2. get_gcp_cloud_context"))
        .stdout(contains(" 3. create_gcs_bucket"))
        .stdout(contains(" 4. gcs_bucket_cloud_sync"));
}

#[test]
fn plan_namespace_delete_follows_identity_and_database_branches() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = shared_namespace(&dir);

    wsm!()
        .args(["plan", "--operation", "delete", "--resource"])
        .arg(&resource)
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(contains("delete-kubernetes-namespace (delete)"))
        .stdout(contains(" 1. get_azure_cloud_context"))
        .stdout(contains(" 2. delete_policy_resource"))
        .stdout(contains(" 3. delete_kubernetes_namespace"))
        .stdout(contains(" 4. get_workspace_managed_identity"))
        .stdout(contains(" 5. delete_federated_credential"))
        .stdout(contains(" 6. delete_namespace_role"))
        .stdout(contains(" 7. delete_resource_metadata"));
}

#[test]
fn plan_namespace_revoke_access() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = shared_namespace(&dir);

    wsm!()
        .args(["plan", "--operation", "revoke-access", "--resource"])
        .arg(&resource)
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(contains("revoke-access-kubernetes-namespace (revoke-access)"))
        .stdout(contains("update_namespace_role_database_access"));
}

#[test]
fn plan_cluster_update_reads_inputs() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = dataproc_cluster(&dir);
    let inputs = write(
        &dir,
        "inputs.toml",
        r#"[update]
kind = "dataproc_cluster"
num_primary_workers = 4
"#,
    );

    wsm!()
        .args(["plan", "--operation", "update", "--resource"])
        .arg(&resource)
        .arg("--inputs")
        .arg(&inputs)
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(contains("validate_dataproc_cluster"))
        .stdout(contains("retrieve_dataproc_cluster_attributes"))
        .stdout(contains("update_dataproc_cluster"));
}

#[test]
fn plan_cluster_create_without_user_fails() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = dataproc_cluster(&dir);

    wsm!()
        .args(["plan", "--resource"])
        .arg(&resource)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("error: cannot plan flight"))
        .stderr(contains("caused by: flight input 'user' is missing"));
}

#[test]
fn plan_unsupported_operation_fails() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = bucket(&dir, "analysis-bucket");

    wsm!()
        .args(["plan", "--operation", "clone", "--resource"])
        .arg(&resource)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("gcs bucket resources do not support clone flights"));
}

#[test]
fn plan_invalid_descriptor_fails() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = bucket(&dir, "Not_A_Bucket");

    wsm!()
        .args(["plan", "--resource"])
        .arg(&resource)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("invalid bucket name 'Not_A_Bucket'"))
        .stdout(contains("store_resource_metadata").not());
}

#[test]
fn plan_missing_resource_file_fails() {
    let dir = TempDir::new().expect("create temp dir");

    wsm!()
        .args(["plan", "--resource", "missing.toml"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("failed to read 'missing.toml'"));
}

#[test]
fn plan_malformed_resource_fails() {
    let dir = TempDir::new().expect("create temp dir");
    let resource = write(&dir, "broken.toml", "kind = \"spaceship\"\n");

    wsm!()
        .args(["plan", "--resource"])
        .arg(&resource)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("failed to parse"))
        .stderr(contains("caused by:"));
}
