/// Failures that end up in front of the user. The display text is what the
/// dashboard shows.
#[derive(Debug, Fail)]
pub enum IngestError {
    #[fail(display = "Không đọc được CSV: {}", _0)]
    Csv(String),
    #[fail(display = "Phân tích thất bại: {}", _0)]
    Analysis(String),
}
