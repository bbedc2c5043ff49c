//! End-to-end pipeline tests for batch-convert.
//!
//! A mockito server stands in for the external conversion service, serving
//! the three-call protocol (job creation with an upload form, status polls,
//! exported-file download) so the full orchestration path runs without
//! network access or a real credential.

use batch_convert::{
    archive, run_batch, BatchDir, ConversionRequest, ConvertConfig, ConvertError, JobError,
    SourceFile, TargetFormat,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

const CONVERTED_PAYLOAD: &[u8] = b"%PDF-1.4 converted";

/// A config pointed at the mock server, with fast polling so timeout tests
/// finish in milliseconds.
fn test_config(server: &mockito::Server) -> ConvertConfig {
    ConvertConfig::builder()
        .api_key("test-key")
        .api_base(server.url())
        .poll_interval_ms(10)
        .max_poll_attempts(5)
        .concurrency(4)
        .build()
        .unwrap()
}

fn request_of(names: &[&str], target: TargetFormat) -> ConversionRequest {
    ConversionRequest::new(
        names
            .iter()
            .map(|n| SourceFile::new(n.to_string(), format!("raw bytes of {n}").into_bytes()))
            .collect(),
        target,
    )
}

/// Job-creation response: one upload form plus the convert/export chain.
fn creation_body(server_url: &str, job_id: &str) -> String {
    serde_json::json!({
        "data": {
            "id": job_id,
            "status": "waiting",
            "tasks": [
                {
                    "operation": "import/upload",
                    "result": { "form": {
                        "url": format!("{server_url}/upload"),
                        "parameters": {
                            "key": format!("uploads/{job_id}"),
                            "policy": "signed-policy-token"
                        }
                    }}
                },
                { "operation": "convert" },
                { "operation": "export/url" }
            ]
        }
    })
    .to_string()
}

fn finished_body(server_url: &str, job_id: &str) -> String {
    serde_json::json!({
        "data": {
            "id": job_id,
            "status": "finished",
            "tasks": [
                { "operation": "import/upload", "status": "finished" },
                { "operation": "convert", "status": "finished" },
                {
                    "operation": "export/url",
                    "status": "finished",
                    "result": { "files": [
                        { "url": format!("{server_url}/files/out") }
                    ]}
                }
            ]
        }
    })
    .to_string()
}

fn errored_body(job_id: &str) -> String {
    serde_json::json!({
        "data": {
            "id": job_id,
            "status": "error",
            "tasks": [
                { "operation": "convert", "message": "invalid input file" }
            ]
        }
    })
    .to_string()
}

fn processing_body(job_id: &str) -> String {
    serde_json::json!({
        "data": { "id": job_id, "status": "processing", "tasks": [] }
    })
    .to_string()
}

/// Mock the whole happy path for any number of files sharing one job id.
async fn mock_happy_service(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
    let url = server.url();
    vec![
        server
            .mock("POST", "/jobs")
            .with_status(201)
            .with_body(creation_body(&url, "j1"))
            .create_async()
            .await,
        server
            .mock("POST", "/upload")
            .with_status(201)
            .create_async()
            .await,
        server
            .mock("GET", "/jobs/j1")
            .with_status(200)
            .with_body(finished_body(&url, "j1"))
            .create_async()
            .await,
        server
            .mock("GET", "/files/out")
            .with_status(200)
            .with_body(CONVERTED_PAYLOAD)
            .create_async()
            .await,
    ]
}

fn zip_entry_names(archive: &[u8]) -> Vec<String> {
    let zip = zip::ZipArchive::new(std::io::Cursor::new(archive.to_vec())).unwrap();
    zip.file_names().map(|s| s.to_string()).collect()
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_batch_produces_one_archive_entry_per_file() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = mock_happy_service(&mut server).await;
    let config = test_config(&server);

    let outcome = run_batch(request_of(&["a.png", "b.png", "c.png"], TargetFormat::Pdf), &config)
        .await
        .expect("batch should succeed");

    assert_eq!(outcome.succeeded.len(), 3);
    assert!(outcome.failed.is_empty());
    assert!(outcome.is_complete());
    assert_eq!(outcome.stats.total_files, 3);
    assert_eq!(outcome.stats.converted_files, 3);

    // Stage through scratch storage and archive, as the server does.
    let root = tempfile::tempdir().unwrap();
    let mut dir = BatchDir::allocate(root.path(), &outcome.batch_id).await.unwrap();
    for file in &outcome.succeeded {
        dir.persist(&file.output_name, &file.bytes).await.unwrap();
    }
    let entries = dir.read_all().await.unwrap();
    let archive_bytes = archive::assemble(&entries).unwrap();
    dir.release().await;

    let mut names = zip_entry_names(&archive_bytes);
    names.sort();
    assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);

    // Batch folder removed after the response is produced.
    assert!(!root.path().join(&outcome.batch_id).exists());
}

#[tokio::test]
async fn converted_bytes_come_from_the_export_download() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = mock_happy_service(&mut server).await;
    let config = test_config(&server);

    let outcome = run_batch(request_of(&["doc.docx"], TargetFormat::Pdf), &config)
        .await
        .unwrap();

    assert_eq!(outcome.succeeded[0].output_name, "doc.pdf");
    assert_eq!(outcome.succeeded[0].bytes, CONVERTED_PAYLOAD);
    assert_eq!(outcome.succeeded[0].source_filename, "doc.docx");
}

#[tokio::test]
async fn duplicate_base_names_are_disambiguated() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = mock_happy_service(&mut server).await;
    let config = test_config(&server);

    let outcome = run_batch(
        request_of(&["report.png", "report.jpg"], TargetFormat::Pdf),
        &config,
    )
    .await
    .unwrap();

    let names: Vec<&str> = outcome
        .succeeded
        .iter()
        .map(|f| f.output_name.as_str())
        .collect();
    assert_eq!(names, vec!["report.pdf", "report-2.pdf"]);
}

#[tokio::test]
async fn upload_forwards_service_form_parameters() {
    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let _create = server
        .mock("POST", "/jobs")
        .with_status(201)
        .with_body(creation_body(&url, "j1"))
        .create_async()
        .await;
    // The upload mock only matches when the multipart body carries both the
    // service-supplied form parameter and the file part; a request missing
    // either falls through and the conversion fails.
    let upload = server
        .mock("POST", "/upload")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex("signed-policy-token".into()),
            mockito::Matcher::Regex("uploads/j1".into()),
            mockito::Matcher::Regex(r#"name="file""#.into()),
            mockito::Matcher::Regex("photo.png".into()),
        ]))
        .with_status(201)
        .create_async()
        .await;
    let _poll = server
        .mock("GET", "/jobs/j1")
        .with_status(200)
        .with_body(finished_body(&url, "j1"))
        .create_async()
        .await;
    let _download = server
        .mock("GET", "/files/out")
        .with_status(200)
        .with_body(CONVERTED_PAYLOAD)
        .create_async()
        .await;

    let config = test_config(&server);
    let outcome = run_batch(request_of(&["photo.png"], TargetFormat::Pdf), &config)
        .await
        .expect("upload must have carried the form parameters");

    upload.assert_async().await;
    assert_eq!(outcome.succeeded.len(), 1);
}

// ── Per-file failure isolation ───────────────────────────────────────────────

/// Job creation that hands out "j1" to the first caller and "j2" to the
/// second, so two files in one batch can follow different poll fates.
async fn mock_two_job_creation(server: &mut mockito::ServerGuard) -> mockito::Mock {
    let url = server.url();
    let calls = Arc::new(AtomicUsize::new(0));
    server
        .mock("POST", "/jobs")
        .with_status(201)
        .with_body_from_request(move |_req| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let job_id = if n == 0 { "j1" } else { "j2" };
            creation_body(&url, job_id).into_bytes()
        })
        .create_async()
        .await
}

#[tokio::test]
async fn remote_job_error_is_isolated_to_its_file() {
    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let _create = mock_two_job_creation(&mut server).await;
    let _upload = server
        .mock("POST", "/upload")
        .with_status(201)
        .create_async()
        .await;
    let _poll_ok = server
        .mock("GET", "/jobs/j1")
        .with_status(200)
        .with_body(finished_body(&url, "j1"))
        .create_async()
        .await;
    let _poll_err = server
        .mock("GET", "/jobs/j2")
        .with_status(200)
        .with_body(errored_body("j2"))
        .create_async()
        .await;
    let _download = server
        .mock("GET", "/files/out")
        .with_status(200)
        .with_body(CONVERTED_PAYLOAD)
        .create_async()
        .await;

    // concurrency 1 keeps job-id assignment deterministic: a.png → j1.
    let config = ConvertConfig::builder()
        .api_key("test-key")
        .api_base(server.url())
        .poll_interval_ms(10)
        .max_poll_attempts(5)
        .concurrency(1)
        .build()
        .unwrap();

    let outcome = run_batch(request_of(&["a.png", "b.png"], TargetFormat::Pdf), &config)
        .await
        .expect("partial success is still success");

    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].output_name, "a.pdf");

    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].filename, "b.png");
    assert!(
        matches!(outcome.failed[0].error, JobError::Processing { .. }),
        "got: {:?}",
        outcome.failed[0].error
    );
}

#[tokio::test]
async fn poll_timeout_does_not_block_sibling_files() {
    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let _create = mock_two_job_creation(&mut server).await;
    let _upload = server
        .mock("POST", "/upload")
        .with_status(201)
        .create_async()
        .await;
    let _poll_ok = server
        .mock("GET", "/jobs/j1")
        .with_status(200)
        .with_body(finished_body(&url, "j1"))
        .create_async()
        .await;
    // j2 never leaves "processing"; the poll budget (5 × 10 ms) runs out.
    let _poll_stuck = server
        .mock("GET", "/jobs/j2")
        .with_status(200)
        .with_body(processing_body("j2"))
        .create_async()
        .await;
    let _download = server
        .mock("GET", "/files/out")
        .with_status(200)
        .with_body(CONVERTED_PAYLOAD)
        .create_async()
        .await;

    let config = ConvertConfig::builder()
        .api_key("test-key")
        .api_base(server.url())
        .poll_interval_ms(10)
        .max_poll_attempts(5)
        .concurrency(1)
        .build()
        .unwrap();

    let outcome = run_batch(request_of(&["a.png", "b.png"], TargetFormat::Pdf), &config)
        .await
        .unwrap();

    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].output_name, "a.pdf");
    assert!(matches!(
        outcome.failed[0].error,
        JobError::Timeout { attempts: 5, .. }
    ));
}

#[tokio::test]
async fn all_files_failing_aborts_the_batch() {
    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let _create = server
        .mock("POST", "/jobs")
        .with_status(201)
        .with_body(creation_body(&url, "j1"))
        .create_async()
        .await;
    let _upload = server
        .mock("POST", "/upload")
        .with_status(201)
        .create_async()
        .await;
    let _poll = server
        .mock("GET", "/jobs/j1")
        .with_status(200)
        .with_body(errored_body("j1"))
        .create_async()
        .await;

    let config = test_config(&server);
    let result = run_batch(request_of(&["a.png", "b.png"], TargetFormat::Pdf), &config).await;

    match result {
        Err(ConvertError::AllFilesFailed { total, first_error }) => {
            assert_eq!(total, 2);
            assert!(first_error.contains("invalid input file"), "got: {first_error}");
        }
        other => panic!("expected AllFilesFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_credential_surfaces_as_auth_failure() {
    let mut server = mockito::Server::new_async().await;

    let _create = server
        .mock("POST", "/jobs")
        .with_status(401)
        .with_body(r#"{"message":"Unauthenticated"}"#)
        .create_async()
        .await;

    let config = test_config(&server);
    let result = run_batch(request_of(&["a.png"], TargetFormat::Pdf), &config).await;

    match result {
        Err(ConvertError::AllFilesFailed { first_error, .. }) => {
            assert!(first_error.contains("401"), "got: {first_error}");
            // The credential itself must never leak into the message.
            assert!(!first_error.contains("test-key"), "got: {first_error}");
        }
        other => panic!("expected AllFilesFailed, got {other:?}"),
    }
}

// ── Validation and configuration: zero network side effects ─────────────────

#[tokio::test]
async fn empty_batch_makes_no_external_calls() {
    let mut server = mockito::Server::new_async().await;
    let jobs = server.mock("POST", "/jobs").expect(0).create_async().await;

    let config = test_config(&server);
    let result = run_batch(request_of(&[], TargetFormat::Pdf), &config).await;

    assert!(matches!(result, Err(ConvertError::EmptyBatch)));
    jobs.assert_async().await;
}

#[tokio::test]
async fn oversized_batch_makes_no_external_calls() {
    let mut server = mockito::Server::new_async().await;
    let jobs = server.mock("POST", "/jobs").expect(0).create_async().await;

    let names: Vec<String> = (0..21).map(|i| format!("f{i}.png")).collect();
    let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();

    let config = test_config(&server);
    let result = run_batch(request_of(&refs, TargetFormat::Pdf), &config).await;

    assert!(matches!(
        result,
        Err(ConvertError::BatchTooLarge { count: 21, max: 20 })
    ));
    jobs.assert_async().await;
}

#[tokio::test]
async fn missing_credential_makes_no_external_calls() {
    let mut server = mockito::Server::new_async().await;
    let jobs = server.mock("POST", "/jobs").expect(0).create_async().await;

    let config = ConvertConfig::builder()
        .api_base(server.url())
        .build()
        .unwrap();
    let result = run_batch(request_of(&["a.png"], TargetFormat::Pdf), &config).await;

    assert!(matches!(result, Err(ConvertError::MissingCredential)));
    jobs.assert_async().await;
}

// ── Cleanup discipline ───────────────────────────────────────────────────────

#[tokio::test]
async fn release_after_failure_path_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let mut dir = BatchDir::allocate(root.path(), "batch-test").await.unwrap();
    dir.persist("a.pdf", b"data").await.unwrap();

    dir.release().await;
    dir.release().await;

    assert!(!root.path().join("batch-test").exists());
}

#[tokio::test]
async fn dropped_handle_cleans_up_even_without_release() {
    let root = tempfile::tempdir().unwrap();
    let staged;
    {
        let dir = BatchDir::allocate(root.path(), "batch-dropped").await.unwrap();
        dir.persist("a.pdf", b"data").await.unwrap();
        staged = dir.path().to_path_buf();
        // Simulates a disconnecting client dropping the handler future.
    }
    assert!(!staged.exists());
}
