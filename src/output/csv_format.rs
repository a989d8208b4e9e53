//! CSV output formatting.

use crate::scanner::ProbeResult;
use std::io::Write;

/// Column names, in row order.
const CSV_HEADER: [&str; 5] = ["protocol", "port", "state", "service", "timestamp"];

/// Write the header record.
pub fn write_csv_header<W: Write>(wtr: &mut csv::Writer<W>) -> csv::Result<()> {
    wtr.write_record(CSV_HEADER)
}

/// Write one result as a CSV record and flush it.
pub fn write_csv_row<W: Write>(wtr: &mut csv::Writer<W>, result: &ProbeResult) -> csv::Result<()> {
    let port = result.port.to_string();
    let state = result.outcome().to_string();
    let timestamp = result.timestamp.to_rfc3339();

    wtr.write_record([
        result.protocol.as_str(),
        port.as_str(),
        state.as_str(),
        result.service.as_str(),
        timestamp.as_str(),
    ])?;
    wtr.flush()?;
    Ok(())
}
