//! Resumption, idempotence and interruption across runs

use crate::{load, pipeline, url_list_source, write_config, PlainTextExtractor};
use docket_harvest::config::restrict_sources;
use docket_harvest::harvest::RunStatus;
use docket_harvest::index::read_index;
use docket_harvest::{DocumentReference, Ledger, LedgerEntry, Pipeline};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pdf(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/pdf")
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let server = MockServer::start().await;
    for name in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}.pdf", name)))
            .respond_with(pdf(name))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        2,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf", "/b.pdf"]),
    );

    let first = pipeline(&config)
        .run(std::future::pending::<()>())
        .await
        .unwrap();
    let second = pipeline(&config)
        .run(std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(first.downloaded, 2);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.ledger_size, 2);
    assert_eq!(second.index.unwrap().documents, 2);
}

#[tokio::test]
async fn test_resume_from_existing_ledger() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(pdf("should not be fetched"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.pdf"))
        .respond_with(pdf("beta"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf", "/b.pdf"]),
    );
    let pipeline = pipeline(&config);
    pipeline.layout().prepare().unwrap();

    // Leftover state of an earlier, interrupted run
    let reference = DocumentReference {
        source_id: "logs".to_string(),
        source_label: "Flight Logs".to_string(),
        local_id: "a.pdf".to_string(),
        entry_number: "1".to_string(),
        description: "a".to_string(),
        retrieval_location: Url::parse(&format!("{}/a.pdf", server.uri())).unwrap(),
    };
    let mut ledger = Ledger::new(pipeline.layout().ledger_path());
    ledger.record(LedgerEntry::from_reference(&reference, "logs_1_a.pdf"));
    ledger.persist().unwrap();
    std::fs::write(
        pipeline.layout().artifacts_dir().join("logs_1_a.pdf"),
        "alpha from before",
    )
    .unwrap();

    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.downloaded, 1);

    let index = read_index(pipeline.layout().index_path()).unwrap();
    let contents: Vec<&str> = index.documents.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["alpha from before", "beta"]);
}

#[tokio::test]
async fn test_interrupt_saves_ledger_and_skips_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(pdf("alpha"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf"]),
    );
    let pipeline = pipeline(&config);

    let report = pipeline.run(std::future::ready(())).await.unwrap();

    assert_eq!(report.status, RunStatus::Interrupted);
    assert!(report.index.is_none());
    assert!(pipeline.layout().ledger_path().is_file());
    assert!(!pipeline.layout().index_path().exists());
}

#[tokio::test]
async fn test_interrupt_abandons_in_flight_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(pdf("slow").set_delay(std::time::Duration::from_secs(2)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/slow.pdf"]),
    );
    let pipeline = pipeline(&config);

    let report = pipeline
        .run(tokio::time::sleep(std::time::Duration::from_millis(200)))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Interrupted);
    assert_eq!(report.downloaded, 0);
    assert!(Ledger::load(pipeline.layout().ledger_path())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_index_only_rebuild_is_reproducible() {
    let server = MockServer::start().await;
    for name in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}.pdf", name)))
            .respond_with(pdf(name))
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf", "/b.pdf", "/c.pdf"]),
    );
    let pipeline = pipeline(&config);
    pipeline.run(std::future::pending::<()>()).await.unwrap();
    let first = read_index(pipeline.layout().index_path()).unwrap();

    std::fs::remove_file(pipeline.layout().index_path()).unwrap();
    let summary = pipeline.build_index(&[]).await.unwrap();
    let second = read_index(pipeline.layout().index_path()).unwrap();

    assert_eq!(summary.documents, 3);
    assert_eq!(first.documents, second.documents);
}

#[tokio::test]
async fn test_missing_artifact_is_reported_on_rebuild() {
    let server = MockServer::start().await;
    for name in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}.pdf", name)))
            .respond_with(pdf(name))
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf", "/b.pdf"]),
    );
    let pipeline = pipeline(&config);
    pipeline.harvest(std::future::pending::<()>()).await.unwrap();

    std::fs::remove_file(pipeline.layout().artifacts_dir().join("logs_1_a.pdf")).unwrap();
    let summary = pipeline.build_index(&[]).await.unwrap();

    assert_eq!(summary.documents, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].filename, "logs_1_a.pdf");
    assert!(summary.failures[0].reason.contains("missing"));
}

#[tokio::test]
async fn test_source_restriction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(pdf("alpha"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.pdf"))
        .respond_with(pdf("beta"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sources = format!(
        "{}\n{}",
        url_list_source("first", "First", &server.uri(), &["/a.pdf"]),
        url_list_source("second", "Second", &server.uri(), &["/b.pdf"])
    );
    let config_path = write_config(dir.path(), 1, &sources);

    let mut config = load(&config_path);
    restrict_sources(&mut config, &["second".to_string()]).unwrap();
    assert!(restrict_sources(&mut config, &["missing".to_string()]).is_err());

    let pipeline = Pipeline::new(config, "test-hash")
        .unwrap()
        .with_extractor(Arc::new(PlainTextExtractor));
    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    assert_eq!(report.downloaded, 1);
}
