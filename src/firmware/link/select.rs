use crate::firmware::types::ScanRecord;

/// Strongest record advertising `ssid`. Ties keep the earlier record, and
/// records for other networks are ignored even though a directed scan should
/// not return them.
pub fn strongest_candidate<'a>(records: &'a [ScanRecord], ssid: &str) -> Option<&'a ScanRecord> {
    records
        .iter()
        .filter(|record| record.ssid == ssid)
        .fold(None, |best: Option<&ScanRecord>, record| match best {
            Some(best) if best.rssi >= record.rssi => Some(best),
            _ => Some(record),
        })
}
