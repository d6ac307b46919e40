// src/table/mod.rs
use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{io::Cursor, path::Path};

/// An in-memory CSV table: one header row plus data rows, everything kept as
/// strings. Tables are transient, living only for the duration of one
/// pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Parse raw CSV bytes. The first record is the header.
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(Cursor::new(bytes));

        let mut columns: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
            let fields: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            match columns {
                None => columns = Some(fields),
                Some(_) => rows.push(fields),
            }
        }

        let columns = columns.context("CSV input has no header row")?;
        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialize to CSV bytes, header first.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        wtr.write_record(&self.columns)
            .context("writing CSV header")?;
        for row in &self.rows {
            wtr.write_record(row).context("writing CSV row")?;
        }
        wtr.flush().context("flushing CSV writer")?;
        wtr.into_inner()
            .map_err(|e| anyhow::anyhow!("finishing CSV writer: {}", e.error()))
    }

    /// Write the table as a CSV file at `path`.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_csv_bytes()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("writing CSV to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() -> Result<()> {
        let data = b"a,b,c\n1,2,3\n4,5,6\n";
        let t = Table::from_csv(data)?;
        assert_eq!(t.columns, vec!["a", "b", "c"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1], vec!["4", "5", "6"]);
        Ok(())
    }

    #[test]
    fn quoted_commas_stay_in_one_field() -> Result<()> {
        let data = b"region,note\n\"Washington, DC\",ok\n";
        let t = Table::from_csv(data)?;
        assert_eq!(t.rows[0][0], "Washington, DC");
        Ok(())
    }

    #[test]
    fn round_trips_through_bytes() -> Result<()> {
        let t = Table::new(
            vec!["x".into(), "y".into()],
            vec![vec!["1".into(), "2".into()]],
        );
        let bytes = t.to_csv_bytes()?;
        assert_eq!(Table::from_csv(&bytes)?, t);
        Ok(())
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(Table::from_csv(b"").is_err());
    }

    #[test]
    fn writes_file_to_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.csv");
        let t = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into()]],
        );
        t.write_csv(&path)?;
        let read_back = Table::from_csv(&std::fs::read(&path)?)?;
        assert_eq!(read_back, t);
        Ok(())
    }
}
