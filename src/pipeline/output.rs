//! Result files: pretty JSON documents, JSONL chain records and CSV tables.
//!
//! K_i: CSV column names and the `;`-joined hypothesis cells are read by the
//! plotting and analysis scripts.

use crate::models::{ChainRecord, Hypothesis, Result, RevisionError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Write a pretty-printed JSON document.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| RevisionError::io("creating output file", e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| RevisionError::Internal(format!("Failed to serialize output: {}", e)))?;
    writer
        .flush()
        .map_err(|e| RevisionError::io("flushing output", e))
}

/// Write one chain record per line.
pub fn write_records_jsonl(path: &Path, records: &[ChainRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| RevisionError::io("creating output file", e))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        let json = serde_json::to_string(record).map_err(|e| {
            RevisionError::Internal(format!("Failed to serialize record: {}", e))
        })?;
        writeln!(writer, "{}", json).map_err(|e| RevisionError::io("writing output", e))?;
    }

    writer
        .flush()
        .map_err(|e| RevisionError::io("flushing output", e))
}

/// One chain as a flat CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCsvRow {
    pub trial_id: String,
    pub trial_type: String,
    pub condition: String,
    pub chain_index: usize,
    /// Features joined with `;`
    pub initial_hypothesis: String,
    /// Features joined with `;`
    pub final_hypothesis: String,
    pub final_length: usize,
    pub response_type: String,
    pub additive_moves: usize,
    pub subtractive_moves: usize,
    pub accuracy: f64,
}

impl From<&ChainRecord> for ChainCsvRow {
    fn from(record: &ChainRecord) -> Self {
        Self {
            trial_id: record.trial_id.clone(),
            trial_type: record.trial_type.clone(),
            condition: record.condition.clone(),
            chain_index: record.chain_index,
            initial_hypothesis: join_features(&record.initial_hypothesis),
            final_hypothesis: join_features(&record.final_hypothesis),
            final_length: record.final_length,
            response_type: record.response_type.to_string(),
            additive_moves: record.additive_moves,
            subtractive_moves: record.subtractive_moves,
            accuracy: record.accuracy,
        }
    }
}

fn join_features(hypothesis: &Hypothesis) -> String {
    hypothesis
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

fn csv_error(context: &str, err: csv::Error) -> RevisionError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => RevisionError::io(context, source),
        other => RevisionError::Internal(format!("{context}: {other:?}")),
    }
}

/// Write serializable rows as CSV with a header line.
///
/// Nothing is written for an empty row set, since the header comes from the
/// first row.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        warn!(path = %path.display(), "No rows to write, skipping CSV");
        return Ok(());
    }

    let mut writer =
        csv::Writer::from_path(path).map_err(|e| csv_error("creating CSV file", e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| csv_error("writing CSV row", e))?;
    }
    writer
        .flush()
        .map_err(|e| RevisionError::io("flushing CSV file", e))
}

/// Write one CSV row per chain.
pub fn write_records_csv(path: &Path, records: &[ChainRecord]) -> Result<()> {
    let rows: Vec<ChainCsvRow> = records.iter().map(ChainCsvRow::from).collect();
    write_csv(path, &rows)
}

/// File-system safe form of a condition label.
pub fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feature, ResponseType};
    use std::fs;
    use tempfile::TempDir;

    fn record(index: usize) -> ChainRecord {
        let initial: Hypothesis = [Feature::Circle].into_iter().collect();
        ChainRecord {
            trial_id: "t1".to_string(),
            trial_type: "additive".to_string(),
            condition: "c".to_string(),
            chain_index: index,
            final_hypothesis: initial.with(Feature::Red),
            initial_hypothesis: initial,
            final_length: 2,
            response_type: ResponseType::Additive,
            additive_moves: 1,
            subtractive_moves: 0,
            proposals: 3,
            accepted: 1,
            final_log_posterior: -1.45,
            accuracy: 1.0,
        }
    }

    #[test]
    fn test_jsonl_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chains.jsonl");
        write_records_jsonl(&path, &[record(0), record(1)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""response_type":"additive""#));
        assert!(lines[1].contains(r#""final_hypothesis":["circle","red"]"#));
        let parsed: ChainRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, record(1));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("p_add=0.5_steps=500_temp=1"), "p_add_0.5_steps_500_temp_1");
        assert_eq!(file_stem("a/b c"), "a_b_c");
    }

    #[test]
    fn test_records_csv_joins_hypotheses() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results_baseline.csv");
        write_records_csv(&path, &[record(0), record(1)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "trial_id,trial_type,condition,chain_index,initial_hypothesis,final_hypothesis,\
             final_length,response_type,additive_moves,subtractive_moves,accuracy"
        );

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<ChainCsvRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].chain_index, 1);
        assert_eq!(rows[1].initial_hypothesis, "circle");
        assert_eq!(rows[1].final_hypothesis, "circle;red");
        assert_eq!(rows[1].response_type, "additive");
        assert_eq!(rows[0], ChainCsvRow::from(&record(0)));
    }

    #[test]
    fn test_empty_csv_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.csv");
        write_records_csv(&path, &[]).unwrap();
        assert!(!path.exists());
    }
}
