use crate::types::ViolationRecord;
use std::collections::BTreeMap;

/// Everything the dashboard shows. There is exactly one of these per process,
/// owned by the store; it only changes through `reduce`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Newest uploads first.
    pub records: Vec<ViolationRecord>,
    pub search: String,
    pub loading: bool,
    pub error: Option<String>,
    pub uploading: bool,
    /// The latest analysis ran but found nothing.
    pub empty_response: bool,
    pub selected_media: Option<String>,
    /// Uploads accepted but not yet fully handled by the ingest worker.
    pub pending_uploads: usize,
}

impl ViewState {
    pub fn new() -> ViewState {
        ViewState {
            records: vec![],
            search: String::new(),
            loading: true,
            error: None,
            uploading: false,
            empty_response: false,
            selected_media: None,
            pending_uploads: 0,
        }
    }
}

impl Default for ViewState {
    fn default() -> ViewState {
        ViewState::new()
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    /// A CSV (default feed or uploaded) replaces the whole list.
    RecordsReplaced(Vec<ViolationRecord>),
    DefaultMissing,
    CsvFailed(String),
    AnalysisStarted,
    AnalysisSucceeded(Vec<ViolationRecord>),
    AnalysisFailed(String),
    SearchChanged(String),
    MediaSelected(String),
    MediaDismissed,
    ErrorDismissed,
    UploadQueued,
    UploadSettled,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RecordsReplaced(_) => "records_replaced",
            Event::DefaultMissing => "default_missing",
            Event::CsvFailed(_) => "csv_failed",
            Event::AnalysisStarted => "analysis_started",
            Event::AnalysisSucceeded(_) => "analysis_succeeded",
            Event::AnalysisFailed(_) => "analysis_failed",
            Event::SearchChanged(_) => "search_changed",
            Event::MediaSelected(_) => "media_selected",
            Event::MediaDismissed => "media_dismissed",
            Event::ErrorDismissed => "error_dismissed",
            Event::UploadQueued => "upload_queued",
            Event::UploadSettled => "upload_settled",
        }
    }
}

pub fn reduce(mut state: ViewState, event: Event) -> ViewState {
    match event {
        Event::RecordsReplaced(records) => {
            state.records = records;
            state.loading = false;
        }
        Event::DefaultMissing => state.loading = false,
        Event::CsvFailed(message) => {
            state.error = Some(message);
            state.loading = false;
        }
        Event::AnalysisStarted => state.uploading = true,
        Event::AnalysisSucceeded(records) => {
            state.uploading = false;
            if records.is_empty() {
                state.empty_response = true;
            } else {
                state.empty_response = false;
                let previous = std::mem::replace(&mut state.records, records);
                state.records.extend(previous);
            }
        }
        Event::AnalysisFailed(message) => {
            state.uploading = false;
            state.error = Some(message);
        }
        Event::SearchChanged(search) => state.search = search,
        Event::MediaSelected(url) => {
            if state.records.iter().any(|r| r.image_url() == url) {
                state.selected_media = Some(url);
            }
        }
        Event::MediaDismissed => state.selected_media = None,
        Event::ErrorDismissed => state.error = None,
        Event::UploadQueued => state.pending_uploads += 1,
        Event::UploadSettled => state.pending_uploads = state.pending_uploads.saturating_sub(1),
    }
    state
}

/// Records sharing one calendar date, in list order.
#[derive(Debug, PartialEq)]
pub struct DayGroup<'a> {
    pub date: &'a str,
    pub records: Vec<&'a ViolationRecord>,
}

#[derive(Debug, PartialEq)]
pub struct Board<'a> {
    pub groups: Vec<DayGroup<'a>>,
    pub search: &'a str,
    pub uploading: bool,
    pub pending_uploads: usize,
    pub empty_response: bool,
    pub selected_media: Option<&'a str>,
}

impl Board<'_> {
    pub fn has_data(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Something is still in flight, so the page should poll.
    pub fn busy(&self) -> bool {
        self.uploading || self.pending_uploads > 0
    }
}

/// What to draw, in precedence order: loading beats error beats the board.
#[derive(Debug, PartialEq)]
pub enum Screen<'a> {
    Loading,
    Failed(&'a str),
    Board(Board<'a>),
}

impl ViewState {
    pub fn filtered(&self) -> Vec<&ViolationRecord> {
        let needle = self.search.to_lowercase();
        self.records
            .iter()
            .filter(|r| {
                r.time().to_lowercase().contains(&needle)
                    || r.license_plate().to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Newest date first.
    pub fn grouped(&self) -> Vec<DayGroup<'_>> {
        let mut by_date: BTreeMap<&str, Vec<&ViolationRecord>> = BTreeMap::new();
        for record in self.filtered() {
            by_date.entry(record.date()).or_default().push(record);
        }
        by_date
            .into_iter()
            .rev()
            .map(|(date, records)| DayGroup { date, records })
            .collect()
    }

    pub fn screen(&self) -> Screen<'_> {
        if self.loading {
            return Screen::Loading;
        }
        if let Some(message) = &self.error {
            return Screen::Failed(message);
        }
        Screen::Board(Board {
            groups: self.grouped(),
            search: &self.search,
            uploading: self.uploading,
            pending_uploads: self.pending_uploads,
            empty_response: self.empty_response,
            selected_media: self.selected_media.as_deref(),
        })
    }
}
