//! CSV export for efficiency tables.

use std::io::Write;
use std::path::Path;

use crate::report::EfficiencyRow;
use crate::{TnpError, TnpResult};

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &["label", "total", "passed", "efficiency", "error"];

/// CSV exporter for efficiency rows.
#[derive(Debug, Clone, Default)]
pub struct EfficiencyExporter;

impl EfficiencyExporter {
    pub fn new() -> Self {
        EfficiencyExporter
    }

    /// Export rows to a CSV file, creating parent directories as needed.
    pub fn export(&self, rows: &[EfficiencyRow], output: &Path) -> TnpResult<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TnpError::io(format!("failed to create directory {}", parent.display()), e))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| TnpError::io(format!("failed to create file {}", output.display()), e))?;

        self.export_to_writer(rows, file)
    }

    pub fn export_to_stdout(&self, rows: &[EfficiencyRow]) -> TnpResult<()> {
        let stdout = std::io::stdout();
        let handle = stdout.lock();
        self.export_to_writer(rows, handle)
    }

    pub fn export_to_writer<W: Write>(&self, rows: &[EfficiencyRow], writer: W) -> TnpResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(CSV_HEADERS)
            .map_err(|e| TnpError::csv("failed to write CSV headers", e))?;

        for row in rows {
            csv_writer
                .write_record(&self.row_to_record(row))
                .map_err(|e| TnpError::csv("failed to write CSV row", e))?;
        }

        csv_writer
            .flush()
            .map_err(|e| TnpError::io("failed to flush CSV writer", e))?;

        Ok(())
    }

    fn row_to_record(&self, row: &EfficiencyRow) -> Vec<String> {
        vec![
            row.label.clone(),
            format!("{}", row.total),
            format!("{}", row.passed),
            row.efficiency.map(|v| format!("{:.6}", v)).unwrap_or_default(),
            row.error.map(|v| format!("{:.6}", v)).unwrap_or_default(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_to_writer() {
        let rows = vec![
            EfficiencyRow::new("W+1_RB1in_S01_Backward".into(), 10.0, 9.0),
            EfficiencyRow::new("RE+1_R2_CH01_A".into(), 0.0, 0.0),
        ];
        let mut buffer = Vec::new();
        EfficiencyExporter::new().export_to_writer(&rows, &mut buffer).unwrap();

        let csv_str = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = csv_str.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "label,total,passed,efficiency,error");
        assert_eq!(lines[1], "W+1_RB1in_S01_Backward,10,9,0.900000,0.094868");
        // empty bins leave efficiency blank
        assert_eq!(lines[2], "RE+1_R2_CH01_A,0,0,,");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("sub").join("eff.csv");
        EfficiencyExporter::new().export(&[], &output_path).unwrap();
        let contents = std::fs::read_to_string(&output_path).unwrap();
        assert_eq!(contents.trim_end(), "label,total,passed,efficiency,error");
    }
}
