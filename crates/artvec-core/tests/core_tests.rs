use figment::providers::{Format, Toml};
use figment::Figment;

use artvec_core::config::{Config, PipelineSettings, StoreSettings};
use artvec_core::error::PipelineError;
use artvec_core::types::{ArtObject, RunReport};

#[test]
fn missing_sections_fall_back_to_defaults() {
    let config = Config::from_figment(Figment::new());
    assert_eq!(config.pipeline().expect("pipeline"), PipelineSettings::default());
    assert_eq!(config.store().expect("store"), StoreSettings::default());
}

#[test]
fn toml_overrides_individual_fields() {
    let toml = r#"
        [pipeline]
        fetch_batch_size = 10
        embed_workers = 4

        [store]
        uri = "/tmp/artvec-test"
    "#;
    let config = Config::from_figment(Figment::new().merge(Toml::string(toml)));

    let pipeline = config.pipeline().expect("pipeline");
    assert_eq!(pipeline.fetch_batch_size, 10);
    assert_eq!(pipeline.embed_workers, 4);
    // untouched fields keep their defaults
    assert_eq!(pipeline.embed_batch_size, 8);

    let store = config.store().expect("store");
    assert_eq!(store.uri, "/tmp/artvec-test");
    assert_eq!(store.embeddings_table, "embeddings");
}

#[test]
fn zero_batch_size_is_rejected() {
    let settings = PipelineSettings { embed_batch_size: 0, ..PipelineSettings::default() };
    assert!(matches!(settings.validate(), Err(PipelineError::InvalidConfig(_))));
}

#[test]
fn resolved_uri_expands_env_vars() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::env::set_var("ARTVEC_TEST_STORE_ROOT", tmp.path());
    let store = StoreSettings { uri: "${ARTVEC_TEST_STORE_ROOT}/lancedb".to_string(), ..StoreSettings::default() };
    assert_eq!(store.resolved_uri(), tmp.path().join("lancedb").to_string_lossy());
}

#[test]
fn art_object_maps_to_work_item() {
    let object = ArtObject {
        id: 7,
        original_id: "SK-C-5".to_string(),
        image_url: "https://example.org/nightwatch=s0".to_string(),
        long_title: "The Night Watch".to_string(),
        artist: "Rembrandt van Rijn".to_string(),
    };
    let item = object.work_item();
    assert_eq!(item.id, 7);
    assert_eq!(item.source_url, object.image_url);
}

#[test]
fn report_submitted_counts_fetched_and_failed() {
    let report = RunReport { fetched: 21, failed_downloads: 2, embedded: 21, persisted: 21, ..RunReport::default() };
    assert_eq!(report.submitted(), 23);
}

#[test]
fn oversized_workers_and_result_queue_are_rejected() {
    let workers = PipelineSettings { embed_workers: usize::MAX, ..PipelineSettings::default() };
    assert!(matches!(workers.validate(), Err(PipelineError::InvalidConfig(_))));
    let queue = PipelineSettings { result_queue_capacity: Some(usize::MAX), ..PipelineSettings::default() };
    assert!(matches!(queue.validate(), Err(PipelineError::InvalidConfig(_))));
    // batch sizes are only bounded below
    let huge_batch = PipelineSettings { embed_batch_size: usize::MAX / 2, ..PipelineSettings::default() };
    assert!(huge_batch.validate().is_ok());
}
