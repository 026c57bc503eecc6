use crate::types::Row;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parses CSV text whose first line is a header into rows keyed by column
/// name. Blank lines are skipped; a row shorter than the header simply lacks
/// the trailing columns.
pub fn parse_csv(data: &[u8]) -> Result<Vec<Row>, csv::Error> {
    let data = data.strip_prefix(BOM).unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);
    let headers = reader.headers()?.clone();

    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.to_string(), value.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}
