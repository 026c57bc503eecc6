use failure::Error;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Plate shown when the source has none.
pub const UNKNOWN_PLATE: &str = "Không xác định";

pub const COLUMN_TIME: &str = "Thời gian tải lên";
pub const COLUMN_PLATE: &str = "Biển số xe";
pub const COLUMN_IMAGE: &str = "Đường dẫn hình ảnh";

/// One CSV data row, keyed by header name.
pub type Row = HashMap<String, String>;

/// A single violation, identical in shape whether it came from a CSV feed or
/// from the analysis endpoint. `date` is always the part of `time` before the
/// first space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    time: String,
    license_plate: String,
    image_url: String,
    date: String,
}

impl ViolationRecord {
    pub fn new(time: &str, license_plate: Option<&str>, image_url: &str) -> ViolationRecord {
        let date = match time.find(' ') {
            Some(i) => &time[..i],
            None => time,
        };
        ViolationRecord {
            time: time.to_string(),
            license_plate: match license_plate {
                Some(p) if !p.is_empty() => p.to_string(),
                _ => UNKNOWN_PLATE.to_string(),
            },
            image_url: image_url.to_string(),
            date: date.to_string(),
        }
    }

    /// Returns None for rows without a timestamp or image path; those rows
    /// are dropped from the feed.
    pub fn from_csv_row(row: &Row) -> Option<ViolationRecord> {
        let non_empty = |column: &str| row.get(column).filter(|v| !v.is_empty());
        let time = non_empty(COLUMN_TIME)?;
        let image_url = non_empty(COLUMN_IMAGE)?;
        Some(ViolationRecord::new(
            time,
            row.get(COLUMN_PLATE).map(String::as_str),
            image_url,
        ))
    }

    pub fn from_api_item(item: &Value) -> Result<ViolationRecord, Error> {
        let time = item["time"]
            .as_str()
            .ok_or_else(|| format_err!("Missing time field in {}", item))?;
        Ok(ViolationRecord::new(
            time,
            item["license_plate"].as_str(),
            item["cropped_image_url"].as_str().unwrap_or_default(),
        ))
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn license_plate(&self) -> &str {
        &self.license_plate
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    /// Hosted images get a thumbnail; anything else is a local path.
    pub fn is_remote(&self) -> bool {
        self.image_url.starts_with("http")
    }
}

pub fn is_video(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.ends_with(".mp4") || url.ends_with(".mov")
}

/// Where an upload was started from. Only used for logging; both paths are
/// handled identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Picker,
    Drop,
}

#[derive(Debug)]
pub struct Upload {
    pub id: Uuid,
    pub origin: Origin,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(origin: Origin, file_name: &str, content_type: Option<&str>, data: Vec<u8>) -> Upload {
        Upload {
            id: Uuid::new_v4(),
            origin,
            file_name: file_name.to_string(),
            content_type: content_type.map(str::to_string),
            data,
        }
    }
}
