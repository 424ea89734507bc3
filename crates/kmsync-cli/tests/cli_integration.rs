use assert_cmd::Command;
use std::io::Write;

fn kmsync() -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kmsync");
    cmd.current_dir(workspace_root());
    cmd
}

fn workspace_root() -> &'static std::path::Path {
    use std::sync::OnceLock;

    static ROOT: OnceLock<std::path::PathBuf> = OnceLock::new();
    ROOT.get_or_init(|| {
        let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        for ancestor in manifest_dir.ancestors() {
            let cargo_toml = ancestor.join("Cargo.toml");
            if let Ok(content) = std::fs::read_to_string(&cargo_toml) {
                if content.contains("[workspace]") || content.contains("[workspace.") {
                    return ancestor.to_path_buf();
                }
            }
        }
        panic!(
            "Failed to locate workspace root from CARGO_MANIFEST_DIR={}",
            manifest_dir.display()
        );
    })
    .as_path()
}

fn minimal_plan_document(kotor_dir: &std::path::Path, mod_dir: &std::path::Path) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
kotor_install_root = "{kotor}"
mod_archive_dir = "{mods}"
"#,
        kotor = kotor_dir.display().to_string().replace('\\', "\\\\"),
        mods = mod_dir.display().to_string().replace('\\', "\\\\"),
    )
    .unwrap();
    file.flush().unwrap();
    file
}

fn isolated_app_data_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn test_cache_stats_on_empty_app_data_succeeds() {
    let app_data = isolated_app_data_dir();
    kmsync()
        .arg("--app-data-dir")
        .arg(app_data.path())
        .arg("cache")
        .arg("stats")
        .assert()
        .success()
        .stdout(predicates::str::contains("resource entries: 0"));
}

#[test]
fn test_cache_gc_on_empty_app_data_succeeds() {
    let app_data = isolated_app_data_dir();
    kmsync()
        .arg("--app-data-dir")
        .arg(app_data.path())
        .arg("cache")
        .arg("gc")
        .assert()
        .success();
}

#[test]
fn test_cache_quota_on_empty_app_data_succeeds() {
    let app_data = isolated_app_data_dir();
    kmsync()
        .arg("--app-data-dir")
        .arg(app_data.path())
        .arg("cache")
        .arg("quota")
        .arg("--max-bytes")
        .arg("1000000")
        .assert()
        .success();
}

#[test]
fn test_cache_clear_on_empty_app_data_succeeds() {
    let app_data = isolated_app_data_dir();
    kmsync()
        .arg("--app-data-dir")
        .arg(app_data.path())
        .arg("cache")
        .arg("clear")
        .assert()
        .success()
        .stdout(predicates::str::contains("removed 0 download-cache entries"));
}

#[test]
fn test_plan_with_no_components_is_clean_and_exits_zero() {
    let app_data = isolated_app_data_dir();
    let kotor_dir = tempfile::tempdir().unwrap();
    let mod_dir = tempfile::tempdir().unwrap();
    let plan_doc = minimal_plan_document(kotor_dir.path(), mod_dir.path());

    kmsync()
        .arg("--app-data-dir")
        .arg(app_data.path())
        .arg("plan")
        .arg(plan_doc.path())
        .assert()
        .success();
}

#[test]
fn test_plan_json_format_produces_valid_json() {
    let app_data = isolated_app_data_dir();
    let kotor_dir = tempfile::tempdir().unwrap();
    let mod_dir = tempfile::tempdir().unwrap();
    let plan_doc = minimal_plan_document(kotor_dir.path(), mod_dir.path());

    let output = kmsync()
        .arg("--app-data-dir")
        .arg(app_data.path())
        .arg("plan")
        .arg(plan_doc.path())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
        .expect("plan --format json must produce valid JSON");
    assert!(parsed.get("entries").is_some());
}

#[test]
fn test_plan_rejects_missing_document() {
    let app_data = isolated_app_data_dir();
    kmsync()
        .arg("--app-data-dir")
        .arg(app_data.path())
        .arg("plan")
        .arg("does-not-exist.toml")
        .assert()
        .failure();
}
