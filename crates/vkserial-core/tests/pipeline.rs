//! End-to-end runs against a mocked catalog, hosting page, API and CDN

use std::cell::RefCell;
use std::path::Path;

use tempfile::TempDir;
use vkserial_core::transfer::{EventSender, marker_path};
use vkserial_core::{
    ClientConfig, DownloadOrchestrator, EpisodeRange, EpisodeResolver, HttpTransfer,
    ResolverConfig, Result, RunOptions, SeriesDownloader, TransferEngine, TransferEvent,
    TransferRequest, TransferStats,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog(server: &MockServer, episodes: &[u32]) -> String {
    let options: String = episodes
        .iter()
        .map(|n| {
            format!(
                r#"<option value="{}/video_ext.php?oid=-7&id={}&hash=h{}|{}">Episode {}</option>"#,
                server.uri(),
                n,
                n,
                n,
                n
            )
        })
        .collect();
    format!(
        r#"<html><body>
            <div class="titlfull">Demo</div>
            <select id="video_vk">{}</select>
        </body></html>"#,
        options
    )
}

fn hosting_page(id: u32) -> String {
    format!(
        r#"<html><body><script>
            var params = {{"videos": "-7_{}", "sig": "sig{}", "access_token": "tok"}};
            params.callback = "cb" + "{}";
            loadPlayer(params);
        </script></body></html>"#,
        id, id, id
    )
}

async fn mount_series(server: &MockServer, episodes: &[u32]) {
    mount_catalog(server, episodes).await;
    mount_hosting(server, episodes).await;
}

async fn mount_catalog(server: &MockServer, episodes: &[u32]) {
    Mock::given(method("GET"))
        .and(path("/serial/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog(server, episodes)))
        .mount(server)
        .await;
}

async fn mount_hosting(server: &MockServer, episodes: &[u32]) {
    for id in episodes {
        Mock::given(method("GET"))
            .and(path("/video_ext.php"))
            .and(query_param("id", id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(hosting_page(*id)))
            .mount(server)
            .await;
    }
}

async fn mount_api(server: &MockServer, id: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/method/video.get"))
        .and(query_param("videos", format!("-7_{}", id)))
        .respond_with(response)
        .mount(server)
        .await;
}

fn files_response(id: u32, files: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(
        r#"cb{}({{"response":[1,{{"files":{}}}]}});"#,
        id, files
    ))
}

fn resolver(server: &MockServer) -> EpisodeResolver {
    EpisodeResolver::with_config(
        ClientConfig {
            max_retries: 0,
            ..ClientConfig::default()
        },
        ResolverConfig {
            hosting_base_url: format!("{}/video_ext.php", server.uri()),
            api_url: format!("{}/method/video.get", server.uri()),
            ..ResolverConfig::default()
        },
    )
    .unwrap()
}

fn options(root: &Path) -> RunOptions {
    RunOptions {
        plex_path: root.to_path_buf(),
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn downloads_resolved_episode_and_skips_failed_one() {
    let server = MockServer::start().await;
    mount_series(&server, &[1, 2]).await;
    mount_api(
        &server,
        1,
        files_response(
            1,
            &format!(
                r#"{{"mp4_360":"{0}/cdn/1-360.mp4","mp4_720":"{0}/cdn/1-720.mp4"}}"#,
                server.uri()
            ),
        ),
    )
    .await;
    mount_api(&server, 2, ResponseTemplate::new(500)).await;
    Mock::given(method("GET"))
        .and(path("/cdn/1-720.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"episode one".to_vec()))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let downloader = SeriesDownloader::with_parts(
        resolver(&server),
        DownloadOrchestrator::new(HttpTransfer::new().unwrap()),
    );

    let report = downloader
        .run(&format!("{}/serial/demo", server.uri()), &options(root.path()))
        .await
        .unwrap();

    assert_eq!(report.downloaded, vec![1]);
    assert_eq!(report.skipped, vec![2]);
    assert!(report.failed.is_empty());

    let season = root.path().join("Demo").join("Season 01");
    assert_eq!(
        std::fs::read(season.join("Demo - s01e01.mp4")).unwrap(),
        b"episode one"
    );
    assert!(!season.join("Demo - s01e02.mp4").exists());
    assert!(!marker_path(&season.join("Demo - s01e01.mp4")).exists());
}

#[tokio::test]
async fn range_filter_applies_before_hosting_requests() {
    let server = MockServer::start().await;
    mount_catalog(&server, &[1, 2, 3]).await;
    mount_hosting(&server, &[1, 3]).await;
    // Episode 2 is filtered out; its hosting page must never be requested
    Mock::given(method("GET"))
        .and(path("/video_ext.php"))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .named("hosting page for filtered episode")
        .mount(&server)
        .await;
    mount_api(&server, 1, files_response(1, "{}")).await;
    mount_api(&server, 3, files_response(3, "{}")).await;

    let root = TempDir::new().unwrap();
    let downloader = SeriesDownloader::with_parts(
        resolver(&server),
        DownloadOrchestrator::new(HttpTransfer::new().unwrap()),
    );
    let options = RunOptions {
        episode_range: Some(EpisodeRange::parse("1,3").unwrap()),
        ..options(root.path())
    };

    let report = downloader
        .run(&format!("{}/serial/demo", server.uri()), &options)
        .await
        .unwrap();

    // Empty quality lists: both selected episodes are skipped
    assert_eq!(report.skipped, vec![1, 3]);
    assert!(report.downloaded.is_empty());
}

#[tokio::test]
async fn catalog_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let downloader = SeriesDownloader::with_parts(
        resolver(&server),
        DownloadOrchestrator::new(HttpTransfer::new().unwrap()),
    );

    let result = downloader
        .run(&format!("{}/serial/demo", server.uri()), &options(root.path()))
        .await;
    assert!(result.is_err());
}

/// Records which entry point the orchestrator picked
#[derive(Default)]
struct RecordingEngine {
    calls: RefCell<Vec<(&'static str, String)>>,
}

impl RecordingEngine {
    async fn record(
        &self,
        kind: &'static str,
        request: &TransferRequest,
        events: &EventSender,
    ) -> Result<TransferStats> {
        let name = request
            .target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.borrow_mut().push((kind, name));
        let _ = events.send(TransferEvent::Finished { bytes: 0 });
        Ok(TransferStats::default())
    }
}

impl TransferEngine for RecordingEngine {
    async fn start(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats> {
        self.record("start", request, events).await
    }

    async fn resume(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats> {
        self.record("resume", request, events).await
    }
}

#[tokio::test]
async fn existing_marker_resumes_instead_of_starting() {
    let server = MockServer::start().await;
    mount_series(&server, &[6, 7]).await;
    for id in [6, 7] {
        mount_api(
            &server,
            id,
            files_response(id, &format!(r#"{{"mp4_480":"{}/cdn/{}.mp4"}}"#, server.uri(), id)),
        )
        .await;
    }

    let root = TempDir::new().unwrap();
    let season = root.path().join("Demo").join("Season 01");
    std::fs::create_dir_all(&season).unwrap();
    std::fs::write(marker_path(&season.join("Demo - s01e07.mp4")), "{}").unwrap();

    let downloader = SeriesDownloader::with_parts(
        resolver(&server),
        DownloadOrchestrator::new(RecordingEngine::default()),
    );
    let report = downloader
        .run(&format!("{}/serial/demo", server.uri()), &options(root.path()))
        .await
        .unwrap();

    assert_eq!(report.downloaded, vec![6, 7]);
    assert_eq!(
        *downloader.orchestrator().engine().calls.borrow(),
        vec![
            ("start", "Demo - s01e06.mp4".to_string()),
            ("resume", "Demo - s01e07.mp4".to_string()),
        ]
    );
}
