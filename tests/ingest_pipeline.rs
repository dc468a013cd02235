// tests/ingest_pipeline.rs
//
// End-to-end ingestion passes against canned listing pages, the in-memory
// store, and a recording push backend. Transport failures are served from a
// listener on 127.0.0.1; nothing leaves the machine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use notice_push::error::{AppError, Result};
use notice_push::models::{Config, Posting, PushConfig, Source, SourceStatus, posting_id};
use notice_push::pipeline::{Ingestor, purge_collection};
use notice_push::push::{PushMessage, PushService};
use notice_push::services::{Notifier, PostingRepository, SourceAdapter, TableAdapter, build_adapter};
use notice_push::storage::{DocumentStore, MemoryStore};
use notice_push::utils::http;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const COLLECTION: &str = "notices";

const FIRST_PAGE: &str = r##"
<table><tbody>
  <tr>
    <td>2</td>
    <td><a href="/list?act=view&amp;id=729895">행복주택 입주자 모집 새글</a></td>
    <td>2026-01-05</td><td>31</td>
  </tr>
  <tr>
    <td>1</td>
    <td><a href="#none" onclick="goView3('729895','/list?act=view&amp;id=729895')">행복주택 입주자 모집</a></td>
    <td>2026-01-05</td><td>31</td>
  </tr>
</tbody></table>
"##;

const SECOND_PAGE: &str = r#"
<table><tbody>
  <tr>
    <td>3</td>
    <td><a href="/list?id=42">공공디자인 용역 입찰 공고</a></td>
    <td>2026-01-09</td><td>0</td>
  </tr>
</tbody></table>
"#;

/// Records every message; optionally fails every send.
#[derive(Default)]
struct RecordingPush {
    fail: bool,
    sent: Mutex<Vec<PushMessage>>,
}

impl RecordingPush {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn messages(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushService for RecordingPush {
    async fn send(&self, message: &PushMessage) -> Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        if self.fail {
            return Err(AppError::push(&message.topic, "simulated outage"));
        }
        Ok(format!("projects/test/messages/{}", sent.len()))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Serves a fixed page through a real table adapter.
struct CannedPage {
    inner: TableAdapter,
    html: String,
}

#[async_trait]
impl SourceAdapter for CannedPage {
    fn source(&self) -> Source {
        self.inner.source()
    }

    async fn fetch(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    fn parse(&self, html: &str) -> Vec<Posting> {
        self.inner.parse(html)
    }
}

/// A source whose site is down.
struct Unreachable(Source);

#[async_trait]
impl SourceAdapter for Unreachable {
    fn source(&self) -> Source {
        self.0
    }

    async fn fetch(&self) -> Result<String> {
        Err(AppError::timeout("fetch https://example.org"))
    }

    fn parse(&self, _html: &str) -> Vec<Posting> {
        Vec::new()
    }
}

fn canned(source: Source, html: &str) -> Box<dyn SourceAdapter> {
    let config = Config::default();
    let mut source_config = config.source(source).unwrap().clone();
    source_config.list_url = "https://example.org".into();
    source_config.view_path_pattern = r#"['"](/[^'"]*\?[^'"]+)['"]"#.into();
    source_config.view_url_template = Some("https://example.org/list?act=view&id={id}".into());

    let inner = TableAdapter::new(
        &source_config,
        &config.cleaning,
        reqwest::Client::new(),
        "utf-8",
    )
    .unwrap();
    Box::new(CannedPage {
        inner,
        html: html.to_string(),
    })
}

/// Answers every connection on a local port with `response`, or holds the
/// connection open without answering when it is `None`. Returns a listing URL.
async fn local_board(response: Option<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                match response {
                    Some(bytes) => {
                        let _ = socket.write_all(&bytes).await;
                        let _ = socket.shutdown().await;
                    }
                    None => tokio::time::sleep(Duration::from_secs(30)).await,
                }
            });
        }
    });
    format!("http://{addr}/board.es?mid=a10601020000&bid=0034")
}

fn http_response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// A real LH adapter pointed at `list_url` with a one-second client timeout.
fn live_lh(list_url: &str) -> Box<dyn SourceAdapter> {
    let mut config = Config::default();
    config.crawler.timeout_secs = 1;
    let mut source_config = config.source(Source::Lh).unwrap().clone();
    source_config.list_url = list_url.to_string();
    let client = http::create_client(&config.crawler).unwrap();
    build_adapter(&config, &source_config, client).unwrap()
}

fn ingestor(store: Arc<MemoryStore>, push: Arc<RecordingPush>) -> Ingestor {
    Ingestor::new(
        PostingRepository::new(store, COLLECTION, Duration::from_secs(5)),
        Notifier::new(push, &PushConfig::default()),
        4,
    )
}

#[tokio::test]
async fn href_and_script_action_resolve_to_one_record() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());

    let report = ingestor(store.clone(), push.clone())
        .run(&[canned(Source::Lh, FIRST_PAGE)])
        .await;

    let lh = report.source(Source::Lh).unwrap();
    assert_eq!(lh.status, SourceStatus::Completed);
    assert_eq!(lh.candidates, 2);
    assert_eq!(lh.created, 1);
    assert_eq!(lh.duplicates, 1);
    assert_eq!(lh.notified, 1);

    let link = "https://example.org/list?act=view&id=729895";
    let record = store
        .get(COLLECTION, &posting_id(link))
        .await
        .unwrap()
        .expect("record stored under the hash of its link");
    assert_eq!(record.link, link);
    assert_eq!(record.title, "행복주택 입주자 모집");
    assert_eq!(record.date, "2026-01-05");

    let messages = push.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].title, "[LH 공모 알림]");
    assert_eq!(messages[0].body, "행복주택 입주자 모집");
    assert_eq!(messages[0].data["link"], link);
    assert_eq!(messages[0].data["source"], "LH");
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    let ingestor = ingestor(store.clone(), push.clone());

    ingestor.run(&[canned(Source::Lh, FIRST_PAGE)]).await;
    assert_eq!(push.count(), 1);

    let report = ingestor.run(&[canned(Source::Lh, FIRST_PAGE)]).await;
    assert_eq!(report.total_created(), 0);
    assert_eq!(report.total_duplicates(), 2);
    assert_eq!(report.total_notified(), 0);
    assert_eq!(push.count(), 1);
    assert_eq!(store.len(COLLECTION), 1);
}

#[tokio::test]
async fn new_posting_is_stored_and_notified_once() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    let ingestor = ingestor(store.clone(), push.clone());

    ingestor.run(&[canned(Source::Lh, FIRST_PAGE)]).await;
    let report = ingestor.run(&[canned(Source::Kams, SECOND_PAGE)]).await;

    let kams = report.source(Source::Kams).unwrap();
    assert_eq!(kams.created, 1);
    assert_eq!(kams.notified, 1);
    assert_eq!(push.count(), 2);

    let record = store
        .get(COLLECTION, &posting_id("https://example.org/list?id=42"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.source, Source::Kams);
    assert_eq!(push.messages()[1].data["source"], "KAMS");
}

#[tokio::test]
async fn failing_source_does_not_stop_the_others() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());

    let adapters = vec![
        Box::new(Unreachable(Source::Lh)) as Box<dyn SourceAdapter>,
        canned(Source::Kams, SECOND_PAGE),
        canned(Source::Seoul, FIRST_PAGE),
    ];
    let report = ingestor(store.clone(), push.clone()).run(&adapters).await;

    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.failed_sources(), 1);

    let lh = report.source(Source::Lh).unwrap();
    assert!(lh.is_failed());
    assert_eq!(lh.candidates, 0);

    assert_eq!(report.source(Source::Kams).unwrap().created, 1);
    assert_eq!(report.source(Source::Seoul).unwrap().created, 1);
    assert_eq!(push.count(), 2);
}

#[tokio::test]
async fn server_error_fails_only_that_source() {
    let url = local_board(Some(http_response("503 Service Unavailable", "text/html", b""))).await;
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());

    let adapters = vec![live_lh(&url), canned(Source::Kams, SECOND_PAGE)];
    let report = ingestor(store.clone(), push.clone()).run(&adapters).await;

    let lh = report.source(Source::Lh).unwrap();
    assert!(matches!(&lh.status, SourceStatus::Failed(reason) if reason.contains("503")));
    assert_eq!(lh.candidates, 0);

    let kams = report.source(Source::Kams).unwrap();
    assert_eq!(kams.status, SourceStatus::Completed);
    assert_eq!(kams.created, 1);
    assert_eq!(push.count(), 1);
    assert_eq!(store.len(COLLECTION), 1);
}

#[tokio::test]
async fn stalled_board_times_out_without_blocking_the_others() {
    let url = local_board(None).await;
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());

    let adapters = vec![live_lh(&url), canned(Source::Kams, SECOND_PAGE)];
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        ingestor(store.clone(), push.clone()).run(&adapters),
    )
    .await
    .expect("client timeout ends the stalled fetch");

    let lh = report.source(Source::Lh).unwrap();
    assert!(matches!(lh.status, SourceStatus::Failed(_)));
    assert_eq!(report.failed_sources(), 1);
    assert_eq!(report.source(Source::Kams).unwrap().created, 1);
    assert_eq!(push.count(), 1);
}

#[tokio::test]
async fn mislabelled_charset_is_decoded_from_the_page() {
    let page = "<table><tbody><tr>\
        <td>1024</td>\
        <td><a href=\"/board.es?mid=a10601020000&amp;bid=0034&amp;act=view&amp;list_no=729895\">행복주택 입주자 모집</a></td>\
        <td>LH</td><td>2026.01.05</td><td>12</td>\
        </tr></tbody></table>";
    let (body, _, _) = encoding_rs::EUC_KR.encode(page);
    let url = local_board(Some(http_response(
        "200 OK",
        "text/html; charset=ISO-8859-1",
        &body,
    )))
    .await;
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());

    let report = ingestor(store.clone(), push.clone()).run(&[live_lh(&url)]).await;
    assert_eq!(report.source(Source::Lh).unwrap().created, 1);

    let messages = push.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "행복주택 입주자 모집");
    assert!(messages[0].data["link"].ends_with("act=view&list_no=729895"));
}

#[tokio::test]
async fn notification_failure_keeps_the_record() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::failing());
    let ingestor = ingestor(store.clone(), push.clone());

    let report = ingestor.run(&[canned(Source::Kams, SECOND_PAGE)]).await;
    let kams = report.source(Source::Kams).unwrap();
    assert_eq!(kams.created, 1);
    assert_eq!(kams.notified, 0);
    assert_eq!(kams.notify_failures, 1);
    assert_eq!(store.len(COLLECTION), 1);

    // No retry on the next pass
    let report = ingestor.run(&[canned(Source::Kams, SECOND_PAGE)]).await;
    assert_eq!(report.total_duplicates(), 1);
    assert_eq!(push.count(), 1);
}

#[tokio::test]
async fn overlapping_runs_notify_once() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    let first = ingestor(store.clone(), push.clone());
    let second = ingestor(store.clone(), push.clone());

    let a = [canned(Source::Kams, SECOND_PAGE)];
    let b = [canned(Source::Kams, SECOND_PAGE)];
    let (ra, rb) = tokio::join!(first.run(&a), second.run(&b));

    assert_eq!(ra.total_created() + rb.total_created(), 1);
    assert_eq!(ra.total_duplicates() + rb.total_duplicates(), 1);
    assert_eq!(push.count(), 1);
    assert_eq!(store.len(COLLECTION), 1);
}

#[tokio::test]
async fn purge_deletes_in_batches() {
    let store = MemoryStore::new();
    for i in 0..25 {
        let posting = Posting {
            source: Source::Seoul,
            number: i.to_string(),
            title: format!("공고 {i}"),
            date: "2026-01-01".into(),
            link: format!("https://example.org/list?id={i}"),
        };
        store
            .create_if_absent(COLLECTION, &posting.id(), &posting)
            .await
            .unwrap();
    }

    let batches = purge_collection(&store, COLLECTION, 10).await.unwrap();
    assert_eq!(batches, vec![10, 10, 5]);
    assert!(store.stream_all(COLLECTION).await.unwrap().is_empty());
}
