// tests/config_load.rs
use std::{env, fs, path::Path};

use tech_radar::config::{
    PipelineConfig, StorageBackend, ENV_BUCKET_NAME, ENV_PIPELINE_CONFIG_PATH,
};
use tech_radar::model::SourceKind;
use tech_radar::{Pipeline, PipelineError, Recovery};

#[test]
fn shipped_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/pipeline.toml");
    let cfg = PipelineConfig::load_from_file(&path).unwrap();
    let sources = cfg.sources();
    assert_eq!(sources.len(), 17);
    assert_eq!(sources.iter().filter(|s| s.kind.is_arxiv()).count(), 3);
    assert!(sources
        .iter()
        .any(|s| matches!(s.kind, SourceKind::DataEndpoint(_))));
    assert_eq!(cfg.weights.tech_release_boost, 200);
    assert_eq!(cfg.storage.backend, StorageBackend::Local);
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate cwd so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_PIPELINE_CONFIG_PATH);
    env::remove_var(ENV_BUCKET_NAME);

    // 1) nothing on disk: built-in defaults
    let d = PipelineConfig::load_default().unwrap();
    assert_eq!(d.sources().len(), 17);

    // 2) ./config/pipeline.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/pipeline.toml"),
        r#"sources = ["https://blogs.nvidia.com/"]"#,
    )
    .unwrap();
    let c = PipelineConfig::load_default().unwrap();
    assert_eq!(c.sources().len(), 1);

    // 3) env path wins
    let p_env = tmp.path().join("custom.toml");
    fs::write(
        &p_env,
        r#"
sources = ["https://a.example.com/", "https://b.example.com/"]
[extract]
batch_size = 4
"#,
    )
    .unwrap();
    env::set_var(ENV_PIPELINE_CONFIG_PATH, p_env.display().to_string());
    let e = PipelineConfig::load_default().unwrap();
    assert_eq!(e.sources().len(), 2);
    assert_eq!(e.extract.batch_size, 4);

    // 4) dangling env path is an error
    env::set_var(ENV_PIPELINE_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(PipelineConfig::load_default().is_err());

    env::remove_var(ENV_PIPELINE_CONFIG_PATH);
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn bucket_env_forces_s3() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_PIPELINE_CONFIG_PATH);

    env::set_var(ENV_BUCKET_NAME, "radar-bucket");
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.storage.backend, StorageBackend::S3);
    assert_eq!(cfg.storage.bucket.as_deref(), Some("radar-bucket"));

    env::set_var(ENV_BUCKET_NAME, "  ");
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.storage.backend, StorageBackend::Local);

    env::remove_var(ENV_BUCKET_NAME);
    env::set_current_dir(&old).unwrap();
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.toml");
    fs::write(&p, "sources = [").unwrap();
    let err = PipelineConfig::load_from_file(&p).unwrap_err();
    assert!(format!("{err:#}").contains("parsing pipeline config"));
}

#[test]
fn pipeline_refuses_unusable_config() {
    let mut cfg = PipelineConfig::default();
    cfg.storage.state_key = "  ".into();
    let err = Pipeline::from_config(cfg).err().expect("config must be rejected");
    let err = err.downcast_ref::<PipelineError>().expect("typed config error");
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(err.recovery(), Recovery::StopProcessing);
}
