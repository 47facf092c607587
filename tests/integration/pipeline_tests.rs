//! End-to-end harvest runs against mock document servers

use crate::{pipeline, url_list_source, write_config};
use docket_harvest::harvest::RunStatus;
use docket_harvest::index::read_index;
use docket_harvest::Ledger;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pdf(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/pdf")
}

async fn serve(server: &MockServer, at: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_blocked_document_does_not_stop_the_run() {
    let server = MockServer::start().await;
    serve(&server, "/a.pdf", pdf("alpha text")).await;
    serve(&server, "/b.pdf", ResponseTemplate::new(403)).await;
    serve(&server, "/c.pdf", pdf("gamma text")).await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf", "/b.pdf", "/c.pdf"]),
    );
    let pipeline = pipeline(&config);

    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "logs_2_b.pdf");

    let layout = pipeline.layout();
    assert!(layout.artifacts_dir().join("logs_1_a.pdf").is_file());
    assert!(!layout.artifacts_dir().join("logs_2_b.pdf").exists());
    assert!(layout.artifacts_dir().join("logs_3_c.pdf").is_file());

    let index = read_index(layout.index_path()).unwrap();
    assert_eq!(index.total_count, 2);
    let ids: Vec<u64> = index.documents.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(index.documents[0].content, "alpha text");
    assert_eq!(index.documents[0].source_label, "Flight Logs - Entry #1");
    assert_eq!(index.documents[1].filename, "logs_3_c.pdf");

    let statistics = std::fs::read_to_string(layout.statistics_path()).unwrap();
    assert!(statistics.contains("Total Documents: 2"));
    assert!(statistics.contains("Flight Logs: 2 documents"));
    assert!(statistics.contains("Failed Documents: 1"));

    let failure_log = std::fs::read_to_string(layout.failure_log_path()).unwrap();
    assert!(failure_log.contains("logs_2_b.pdf  [retrieval] blocked: HTTP 403"));

    let summary = std::fs::read_to_string(layout.summary_path()).unwrap();
    assert!(summary.contains("Config hash: test-hash"));
    assert!(summary.contains("Flight Logs (2 documents)"));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/a.pdf", pdf("alpha after retry")).await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf"]),
    );
    let pipeline = pipeline(&config);

    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert!(report.failed.is_empty());

    let index = read_index(pipeline.layout().index_path()).unwrap();
    assert_eq!(index.documents[0].content, "alpha after retry");
}

#[tokio::test]
async fn test_persistent_server_error_fails_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(ResponseTemplate::new(502))
        // First attempt plus max-retries = 3
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf"]),
    );
    let report = pipeline(&config)
        .run(std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].reason.contains("after 4 attempts"));
    assert_eq!(report.index.unwrap().documents, 0);
}

#[tokio::test]
async fn test_extraction_failure_is_isolated() {
    let server = MockServer::start().await;
    serve(&server, "/a.pdf", pdf("first")).await;
    serve(&server, "/b.pdf", pdf("%CORRUPT%")).await;
    serve(&server, "/c.pdf", pdf("third")).await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf", "/b.pdf", "/c.pdf"]),
    );
    let pipeline = pipeline(&config);

    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    // Retrieval succeeded for all three; only extraction failed for one
    assert_eq!(report.downloaded, 3);
    assert_eq!(report.ledger_size, 3);

    let summary = report.index.unwrap();
    assert_eq!(summary.documents, 2);
    assert_eq!(summary.failures.len(), 1);

    let index = read_index(pipeline.layout().index_path()).unwrap();
    let contents: Vec<&str> = index.documents.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "third"]);
    assert_eq!(index.documents[1].id, 2);

    let failure_log = std::fs::read_to_string(pipeline.layout().failure_log_path()).unwrap();
    assert!(failure_log.contains("logs_2_b.pdf  [extraction] unparsable PDF"));
}

#[tokio::test]
async fn test_challenge_page_is_blocked() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/a.pdf",
        ResponseTemplate::new(200).set_body_raw(
            b"<html><body>Please verify you are human</body></html>".to_vec(),
            "text/html",
        ),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        1,
        &url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf"]),
    );
    let pipeline = pipeline(&config);

    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].reason.contains("verification challenge"));
    assert!(Ledger::load(pipeline.layout().ledger_path())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_courtlistener_overlapping_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/docket-entries/"))
        .and(query_param("docket", "42"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": "more",
            "results": [
                {"entry_number": 1, "description": "Complaint",
                 "recap_documents": [{"id": 10, "filepath_local": "recap/10.pdf"}]},
                {"entry_number": 2, "description": "Answer",
                 "recap_documents": [{"id": 11, "filepath_local": "recap/11.pdf"}]}
            ]
        })))
        .mount(&server)
        .await;

    // The page boundary shifted: entry 2 is listed again
    Mock::given(method("GET"))
        .and(path("/api/docket-entries/"))
        .and(query_param("docket", "42"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [
                {"entry_number": 2, "description": "Answer",
                 "recap_documents": [{"id": 11, "filepath_local": "recap/11.pdf"}]},
                {"entry_number": 3, "description": "Order",
                 "recap_documents": [
                     {"id": 12, "filepath_local": "recap/12.pdf"},
                     {"id": 13}
                 ]}
            ]
        })))
        .mount(&server)
        .await;

    for id in [10, 11, 12] {
        Mock::given(method("GET"))
            .and(path(format!("/storage/recap/{}.pdf", id)))
            .respond_with(pdf(&format!("document {}", id)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let source = format!(
        "[[source]]\nid = \"giuffre\"\nlabel = \"Giuffre v. Maxwell\"\nkind = \"courtlistener\"\n\
         docket-id = 42\napi-base = \"{0}/api\"\nstorage-base = \"{0}/storage\"\n",
        server.uri()
    );
    let config = write_config(dir.path(), 4, &source);
    let pipeline = pipeline(&config);

    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.downloaded, 3);
    assert!(report.source_failures.is_empty());

    let ledger = Ledger::load(pipeline.layout().ledger_path()).unwrap();
    let mut filenames: Vec<&str> = ledger
        .entries()
        .iter()
        .map(|e| e.output_filename.as_str())
        .collect();
    filenames.sort();
    assert_eq!(
        filenames,
        vec![
            "giuffre_1_Complaint.pdf",
            "giuffre_2_Answer.pdf",
            "giuffre_3_Order.pdf"
        ]
    );

    let index = read_index(pipeline.layout().index_path()).unwrap();
    assert_eq!(index.total_count, 3);
    assert!(index
        .documents
        .iter()
        .all(|d| d.source_label.starts_with("Giuffre v. Maxwell - Entry #")));
}

#[tokio::test]
async fn test_failing_source_does_not_stop_other_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/docket-entries/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    serve(&server, "/a.pdf", pdf("alpha")).await;

    let dir = TempDir::new().unwrap();
    let sources = format!(
        "[[source]]\nid = \"broken\"\nlabel = \"Broken\"\nkind = \"courtlistener\"\n\
         docket-id = 1\napi-base = \"{0}/api\"\n\n{1}",
        server.uri(),
        url_list_source("logs", "Flight Logs", &server.uri(), &["/a.pdf"])
    );
    let config = write_config(dir.path(), 1, &sources);

    let report = pipeline(&config)
        .run(std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.source_failures.len(), 1);
    assert_eq!(report.source_failures[0].source_id, "broken");
}

#[tokio::test]
async fn test_html_listing_source() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/listing",
        ResponseTemplate::new(200).set_body_raw(
            br#"<html><body>
                <a href="/files/part-1.pdf">Part 1</a>
                <a href="files/part-2.pdf">Part 2</a>
                <a href="/about">About</a>
                <a href="/files/part-1.pdf#page=2">Part 1 again</a>
            </body></html>"#
                .to_vec(),
            "text/html",
        ),
    )
    .await;
    serve(&server, "/files/part-1.pdf", pdf("part one")).await;
    serve(&server, "/files/part-2.pdf", pdf("part two")).await;

    let dir = TempDir::new().unwrap();
    let source = format!(
        "[[source]]\nid = \"vault\"\nlabel = \"FBI Vault\"\nkind = \"html-listing\"\n\
         listing-url = \"{}/listing\"\nlink-pattern = \".pdf\"\n",
        server.uri()
    );
    let config = write_config(dir.path(), 1, &source);
    let pipeline = pipeline(&config);

    let report = pipeline.run(std::future::pending::<()>()).await.unwrap();

    assert_eq!(report.downloaded, 2);
    let index = read_index(pipeline.layout().index_path()).unwrap();
    let titles: Vec<&str> = index.documents.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["Part 1", "Part 2"]);
}
