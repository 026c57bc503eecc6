use crate::analyze::Analyzer;
use crate::config::FeedSource;
use crate::error::IngestError;
use crate::parse::parse_csv;
use crate::state::Event;
use crate::store::Store;
use crate::types::{Upload, ViolationRecord};
use failure::Error;
use log::{error, info, warn};
use tokio::sync::mpsc::Receiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Media,
}

/// CSV files are read locally; everything else is sent for analysis.
pub fn classify(file_name: &str) -> SourceKind {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        SourceKind::Csv
    } else {
        SourceKind::Media
    }
}

async fn read_feed(feed: &FeedSource) -> Result<Vec<u8>, Error> {
    match feed {
        FeedSource::File(path) => Ok(tokio::fs::read(path).await?),
        FeedSource::Http(url) => {
            let response = reqwest::get(url.clone()).await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        }
    }
}

pub struct Ingestor<A> {
    store: Store,
    analyzer: A,
    feed: FeedSource,
}

impl<A: Analyzer> Ingestor<A> {
    pub fn new(store: Store, analyzer: A, feed: FeedSource) -> Ingestor<A> {
        Ingestor {
            store,
            analyzer,
            feed,
        }
    }

    /// A missing or unreadable default feed just means there is no data yet;
    /// only a feed that reads but fails to parse is shown as an error.
    pub async fn load_default(&self) {
        match read_feed(&self.feed).await {
            Ok(data) => {
                info!("Loaded default feed {:?}", self.feed);
                self.ingest_csv(&data).await;
            }
            Err(e) => {
                warn!("Default feed {:?} unavailable, skipping: {}", self.feed, e);
                self.store.dispatch(Event::DefaultMissing).await;
            }
        }
    }

    /// Handles a file from either the picker or a drop. `None` (nothing
    /// chosen) leaves the state untouched.
    pub async fn handle_upload(&self, upload: Option<Upload>) {
        let upload = match upload {
            Some(u) => u,
            None => return,
        };
        info!(
            "Handling upload {} {:?} from {:?}",
            upload.id.to_simple(),
            upload.file_name,
            upload.origin
        );
        match classify(&upload.file_name) {
            SourceKind::Csv => self.ingest_csv(&upload.data).await,
            SourceKind::Media => self.ingest_media(&upload).await,
        }
    }

    async fn ingest_csv(&self, data: &[u8]) {
        match parse_csv(data) {
            Ok(rows) => {
                let total = rows.len();
                let records: Vec<_> = rows.iter().filter_map(ViolationRecord::from_csv_row).collect();
                info!("Parsed {} records ({} rows dropped)", records.len(), total - records.len());
                self.store.dispatch(Event::RecordsReplaced(records)).await;
            }
            Err(e) => {
                error!("Failed to parse CSV: {}", e);
                let message = IngestError::Csv(e.to_string()).to_string();
                self.store.dispatch(Event::CsvFailed(message)).await;
            }
        }
    }

    async fn ingest_media(&self, upload: &Upload) {
        self.store.dispatch(Event::AnalysisStarted).await;
        let result = self.analyzer.analyze(upload).await.and_then(|items| {
            items
                .iter()
                .map(ViolationRecord::from_api_item)
                .collect::<Result<Vec<_>, _>>()
        });
        match result {
            Ok(records) => {
                info!("Analysis of {:?} found {} violations", upload.file_name, records.len());
                self.store.dispatch(Event::AnalysisSucceeded(records)).await;
            }
            Err(e) => {
                error!("Analysis of {:?} failed: {}", upload.file_name, e);
                let message = IngestError::Analysis(e.to_string()).to_string();
                self.store.dispatch(Event::AnalysisFailed(message)).await;
            }
        }
    }
}

/// Loads the default feed, then drains the upload queue one file at a time.
/// Uploads are applied in arrival order, so a later upload's records always
/// land above an earlier one's.
pub async fn run<A: Analyzer>(ingestor: Ingestor<A>, mut rx: Receiver<Upload>) {
    ingestor.load_default().await;
    while let Some(upload) = rx.recv().await {
        ingestor.handle_upload(Some(upload)).await;
        ingestor.store.dispatch(Event::UploadSettled).await;
    }
    info!("Upload queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;
    use futures::future::{BoxFuture, FutureExt};
    use serde_json::{json, Value};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::channel;

    /// Replies with canned responses in order and records what it saw.
    #[derive(Clone, Default)]
    struct FakeAnalyzer {
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<String>>>,
        responses: Arc<Mutex<Vec<Result<Vec<Value>, String>>>>,
    }

    impl FakeAnalyzer {
        fn replying(responses: Vec<Result<Vec<Value>, String>>) -> FakeAnalyzer {
            FakeAnalyzer {
                responses: Arc::new(Mutex::new(responses)),
                ..FakeAnalyzer::default()
            }
        }
    }

    impl Analyzer for FakeAnalyzer {
        fn analyze<'a>(&'a self, upload: &'a Upload) -> BoxFuture<'a, Result<Vec<Value>, Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(upload.file_name.clone());
            let mut responses = self.responses.lock().unwrap();
            let response = if responses.is_empty() {
                Ok(vec![])
            } else {
                responses.remove(0)
            };
            async move { response.map_err(|e| format_err!("{}", e)) }.boxed()
        }
    }

    const CSV: &str = "Thời gian tải lên,Biển số xe,Đường dẫn hình ảnh\n\
                       2024-01-05 08:00:00,,http://x/a.jpg\n\
                       ,29A-111,http://x/b.jpg\n\
                       2024-01-06 09:00:00,30B-222,\n\
                       2024-01-06 10:00:00,30B-333,local/c.jpg\n";

    fn file(name: &str, data: &[u8]) -> Option<Upload> {
        Some(Upload::new(Origin::Picker, name, None, data.to_vec()))
    }

    fn ingestor(analyzer: FakeAnalyzer) -> Ingestor<FakeAnalyzer> {
        let feed = FeedSource::File(PathBuf::from("/nonexistent/violations.csv"));
        Ingestor::new(Store::new(), analyzer, feed)
    }

    fn item(time: &str, plate: &str) -> Value {
        json!({"time": time, "license_plate": plate, "cropped_image_url": "http://x/crop.jpg"})
    }

    #[test]
    fn classifies_by_suffix() {
        assert_eq!(classify("report.csv"), SourceKind::Csv);
        assert_eq!(classify("REPORT.CSV"), SourceKind::Csv);
        assert_eq!(classify("clip.mp4"), SourceKind::Media);
        assert_eq!(classify("photo.jpg"), SourceKind::Media);
        assert_eq!(classify("csv"), SourceKind::Media);
    }

    #[tokio::test]
    async fn csv_upload_never_calls_analyzer() {
        let analyzer = FakeAnalyzer::default();
        let ingestor = ingestor(analyzer.clone());
        ingestor.handle_upload(file("report.csv", CSV.as_bytes())).await;
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);

        let state = ingestor.store.snapshot().await;
        assert_eq!(state.records.len(), 2);
        assert_eq!(state.records[0].license_plate(), "Không xác định");
        assert_eq!(state.records[1].image_url(), "local/c.jpg");
        assert!(!state.uploading);
    }

    #[tokio::test]
    async fn media_upload_always_calls_analyzer() {
        let analyzer = FakeAnalyzer::replying(vec![Ok(vec![item("2024-01-07 11:00:00", "51F-999")])]);
        let ingestor = ingestor(analyzer.clone());
        ingestor.handle_upload(file("clip.mp4", b"...")).await;
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*analyzer.seen.lock().unwrap(), vec!["clip.mp4".to_string()]);
        let state = ingestor.store.snapshot().await;
        assert_eq!(state.records[0].date(), "2024-01-07");
        assert!(!state.uploading);
    }

    #[tokio::test]
    async fn nothing_selected_is_a_no_op() {
        let analyzer = FakeAnalyzer::default();
        let ingestor = ingestor(analyzer.clone());
        let before = ingestor.store.snapshot().await;
        ingestor.handle_upload(None).await;
        assert_eq!(ingestor.store.snapshot().await, before);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn analysis_results_go_before_existing_records() {
        let analyzer = FakeAnalyzer::replying(vec![Ok(vec![
            item("2024-01-07 11:00:00", "NEW1"),
            item("2024-01-07 11:00:05", "NEW2"),
        ])]);
        let ingestor = ingestor(analyzer);
        ingestor.handle_upload(file("report.csv", CSV.as_bytes())).await;
        ingestor.handle_upload(file("photo.jpg", b"...")).await;

        let state = ingestor.store.snapshot().await;
        let plates: Vec<_> = state.records.iter().map(|r| r.license_plate()).collect();
        assert_eq!(plates, vec!["NEW1", "NEW2", "Không xác định", "30B-333"]);
    }

    #[tokio::test]
    async fn empty_analysis_leaves_records_and_sets_notice() {
        let analyzer = FakeAnalyzer::replying(vec![Ok(vec![])]);
        let ingestor = ingestor(analyzer);
        ingestor.handle_upload(file("report.csv", CSV.as_bytes())).await;
        ingestor.handle_upload(file("photo.jpg", b"...")).await;

        let state = ingestor.store.snapshot().await;
        assert_eq!(state.records.len(), 2);
        assert!(state.empty_response);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn analysis_failure_surfaces_error_and_clears_uploading() {
        let analyzer = FakeAnalyzer::replying(vec![Err("connection refused".to_string())]);
        let ingestor = ingestor(analyzer);
        ingestor.handle_upload(file("clip.mov", b"...")).await;

        let state = ingestor.store.snapshot().await;
        assert_eq!(
            state.error.as_deref(),
            Some("Phân tích thất bại: connection refused")
        );
        assert!(!state.uploading);
    }

    #[tokio::test]
    async fn api_item_without_time_fails_the_analysis() {
        let analyzer = FakeAnalyzer::replying(vec![Ok(vec![
            item("2024-01-07 11:00:00", "OK"),
            json!({"license_plate": "NO-TIME"}),
        ])]);
        let ingestor = ingestor(analyzer);
        ingestor.handle_upload(file("clip.mp4", b"...")).await;

        let state = ingestor.store.snapshot().await;
        assert!(state.records.is_empty());
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn unparseable_csv_upload_is_an_error() {
        let ingestor = ingestor(FakeAnalyzer::default());
        ingestor.handle_upload(file("report.csv", b"a,b\n1,\xff\n")).await;
        let state = ingestor.store.snapshot().await;
        assert!(state.error.unwrap().starts_with("Không đọc được CSV: "));
    }

    #[tokio::test]
    async fn missing_default_feed_is_not_an_error() {
        let ingestor = ingestor(FakeAnalyzer::default());
        ingestor.load_default().await;
        let state = ingestor.store.snapshot().await;
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(state.records.is_empty());
    }

    fn http_feed(addr: std::net::SocketAddr) -> FeedSource {
        FeedSource::parse(&format!("http://{}/violations.csv", addr))
    }

    #[tokio::test]
    async fn default_feed_over_http() {
        use warp::Filter;
        let route = warp::path!("violations.csv").map(|| CSV);
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let ingestor = Ingestor::new(Store::new(), FakeAnalyzer::default(), http_feed(addr));
        ingestor.load_default().await;
        let state = ingestor.store.snapshot().await;
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.records.len(), 2);
        assert_eq!(state.records[1].license_plate(), "30B-333");
    }

    #[tokio::test]
    async fn default_feed_not_found_over_http_is_not_an_error() {
        use warp::http::StatusCode;
        use warp::Filter;
        let route = warp::any().map(|| warp::reply::with_status("missing", StatusCode::NOT_FOUND));
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let ingestor = Ingestor::new(Store::new(), FakeAnalyzer::default(), http_feed(addr));
        ingestor.load_default().await;
        let state = ingestor.store.snapshot().await;
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(state.records.is_empty());
    }

    #[tokio::test]
    async fn default_feed_from_file() {
        let mut feed = tempfile::NamedTempFile::new().unwrap();
        feed.write_all(CSV.as_bytes()).unwrap();
        let ingestor = Ingestor::new(
            Store::new(),
            FakeAnalyzer::default(),
            FeedSource::File(feed.path().to_path_buf()),
        );
        ingestor.load_default().await;
        let state = ingestor.store.snapshot().await;
        assert!(!state.loading);
        assert_eq!(state.records.len(), 2);
    }

    #[tokio::test]
    async fn default_feed_that_fails_to_parse_is_an_error() {
        let mut feed = tempfile::NamedTempFile::new().unwrap();
        feed.write_all(b"a,b\n\xff,1\n").unwrap();
        let ingestor = Ingestor::new(
            Store::new(),
            FakeAnalyzer::default(),
            FeedSource::File(feed.path().to_path_buf()),
        );
        ingestor.load_default().await;
        let state = ingestor.store.snapshot().await;
        assert!(!state.loading);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn queue_applies_uploads_in_arrival_order() {
        let analyzer = FakeAnalyzer::replying(vec![
            Ok(vec![item("2024-01-07 11:00:00", "FIRST")]),
            Ok(vec![item("2024-01-07 12:00:00", "SECOND")]),
        ]);
        let ingestor = ingestor(analyzer.clone());
        let store = ingestor.store.clone();
        let (tx, rx) = channel(4);
        store.dispatch(Event::UploadQueued).await;
        tx.send(Upload::new(Origin::Picker, "a.jpg", None, vec![])).await.unwrap();
        store.dispatch(Event::UploadQueued).await;
        tx.send(Upload::new(Origin::Drop, "b.jpg", None, vec![])).await.unwrap();
        drop(tx);
        run(ingestor, rx).await;

        assert_eq!(*analyzer.seen.lock().unwrap(), vec!["a.jpg".to_string(), "b.jpg".to_string()]);
        let state = store.snapshot().await;
        let plates: Vec<_> = state.records.iter().map(|r| r.license_plate()).collect();
        assert_eq!(plates, vec!["SECOND", "FIRST"]);
        assert!(!state.loading);
        assert_eq!(state.pending_uploads, 0);
    }
}
