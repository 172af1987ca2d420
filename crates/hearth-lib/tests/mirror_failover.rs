use hearth_lib::game::installer::core::downloader::{part_path, DownloaderOptions};
use hearth_lib::game::installer::core::{BatchDownloader, DownloadTask, Mirror, MirrorSelection, TaskOutcome};
use hearth_lib::game::installer::types::CancelToken;
use hearth_lib::utils::hash::sha1_hex;
use hearth_lib::DownloadError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORIGIN: &str = "http://127.0.0.1:9/";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ordered(concurrency: usize) -> DownloaderOptions {
    DownloaderOptions {
        concurrency,
        mirror_selection: MirrorSelection::Ordered,
        ..Default::default()
    }
}

fn mirror_for(name: &str, server: &MockServer) -> Mirror {
    Mirror::new(name, server.uri()).with_rule(ORIGIN, format!("{}/", server.uri()))
}

#[tokio::test]
async fn failing_mirror_falls_through_to_next() {
    init_logging();
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&broken)
        .await;
    for i in 0..3 {
        Mock::given(method("GET"))
            .and(path(format!("/lib/{}.jar", i)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("jar-{}", i).into_bytes()))
            .expect(1)
            .mount(&healthy)
            .await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let tasks: Vec<DownloadTask> = (0..3)
        .map(|i| {
            DownloadTask::new(
                format!("lib{}", i),
                format!("{}lib/{}.jar", ORIGIN, i),
                tmp.path().join(format!("libraries/{}.jar", i)),
            )
            .with_sha1(sha1_hex(format!("jar-{}", i).as_bytes()))
        })
        .collect();

    let downloader = BatchDownloader::new(
        ordered(2),
        vec![mirror_for("broken", &broken), mirror_for("healthy", &healthy)],
    )
    .unwrap();
    let report = downloader.download_all(tasks, &CancelToken::never()).await;

    assert!(report.is_success(), "{:?}", report.tasks);
    assert_eq!(report.completed_count(), 3);
    for task in &report.tasks {
        match &task.outcome {
            TaskOutcome::Completed { source } => assert!(source.starts_with(&healthy.uri())),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    for i in 0..3 {
        let content = std::fs::read(tmp.path().join(format!("libraries/{}.jar", i))).unwrap();
        assert_eq!(content, format!("jar-{}", i).into_bytes());
    }
}

#[tokio::test]
async fn hash_mismatch_everywhere_leaves_nothing_behind() {
    init_logging();
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
            .expect(1)
            .mount(server)
            .await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("client.jar");
    // Nothing listens on the origin, so only the two mirrors answer
    let origin_mirrors = vec![mirror_for("first", &first), mirror_for("second", &second)];
    let task = DownloadTask::new("client", format!("{}client.jar", ORIGIN), &dest)
        .with_sha1(sha1_hex(b"genuine"));

    let downloader = BatchDownloader::new(ordered(1), origin_mirrors).unwrap();
    let report = downloader.download_all(vec![task], &CancelToken::never()).await;

    assert!(!report.is_success());
    match &report.tasks[0].outcome {
        TaskOutcome::Failed(DownloadError::Exhausted { name, attempts }) => {
            assert_eq!(name, "client");
            assert_eq!(*attempts, 3);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
}

#[test]
fn empty_batch_is_trivially_successful() {
    let downloader = BatchDownloader::new(ordered(4), vec![]).unwrap();
    let report = tokio_test::block_on(downloader.download_all(Vec::new(), &CancelToken::never()));
    assert!(report.is_success());
    assert!(report.tasks.is_empty());
}
