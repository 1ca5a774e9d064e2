//! Audit export - transaction history as CSV
//!
//! One row per committed purchase, in commit order.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::ledger::TransactionRecord;

pub const HISTORY_HEADER: &str =
    "transaction_id,timestamp,sender,source,destination,item,amount,discounted_amount,memo,trace_id";

/// Writes transaction records to a CSV file
pub struct HistoryWriter<W: Write = BufWriter<File>> {
    out: W,
    entry_count: u64,
}

impl HistoryWriter {
    /// Create the file (truncating) and write the header
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> HistoryWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", HISTORY_HEADER)?;
        Ok(Self {
            out,
            entry_count: 0,
        })
    }

    pub fn write_record(&mut self, record: &TransactionRecord) -> io::Result<()> {
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{},{},{}",
            record.id,
            record.timestamp.to_rfc3339(),
            record.sender,
            record.source,
            record.destination,
            escape(&record.item),
            record.amount,
            record.discounted_amount,
            escape(&record.memo),
            escape(&record.trace_id),
        )?;
        self.entry_count += 1;
        Ok(())
    }

    pub fn write_all<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a TransactionRecord>,
    ) -> io::Result<u64> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(self.entry_count)
    }

    /// Get total number of records written
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Quote a free-text field when it would break the row.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{AccountId, TransactionId};
    use chrono::{TimeZone, Utc};

    fn record(item: &str, memo: &str) -> TransactionRecord {
        let alice = AccountId::from_label("alice").unwrap();
        TransactionRecord {
            id: TransactionId::new(),
            sender: alice,
            source: alice,
            destination: AccountId::from_label("shop").unwrap(),
            amount: 1_000,
            discounted_amount: 850,
            item: item.to_string(),
            memo: memo.to_string(),
            trace_id: "trace-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_writes_header_and_rows() {
        let mut writer = HistoryWriter::new(Vec::new()).unwrap();
        writer
            .write_all(&[record("sku-1", "order 1"), record("sku-2", "order 2")])
            .unwrap();
        assert_eq!(writer.entry_count(), 2);

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HISTORY_HEADER);
        assert!(lines[1].contains(",sku-1,1000,850,order 1,trace-1"));
    }

    #[test]
    fn test_free_text_is_quoted() {
        let mut writer = HistoryWriter::new(Vec::new()).unwrap();
        writer
            .write_record(&record("mug, large", "say \"hi\""))
            .unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(text.contains(",\"mug, large\",1000,850,\"say \"\"hi\"\"\",trace-1"));
    }
}
