//! CSV export of score histories.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::game::ScoreRecord;

/// Column header of the score export.
const HEADER: &str = "group_id,round_index,board_id,production_mw,consumption_mw,balance_mw,score_delta,total_score";

/// Exports score records to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_scores_csv(records: &[ScoreRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_scores_csv(records, buf)
}

/// Writes score records as CSV to any writer.
///
/// Rows keep the order of `records`. `total_score` is the running total of
/// the row's board up to and including that row; boards are told apart by
/// group as well as id, so equal board ids in two groups keep separate
/// totals.
///
/// # Arguments
///
/// * `records` - Score history, usually ordered by round then board
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_scores_csv(records: &[ScoreRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER.split(','))?;

    let mut totals = std::collections::HashMap::new();
    for r in records {
        let total = totals.entry((&r.group_id, &r.board_id)).or_insert(0i64);
        *total = total.saturating_add(r.score_delta);
        wtr.write_record(&[
            r.group_id.to_string(),
            r.round_index.to_string(),
            r.board_id.to_string(),
            r.production.to_string(),
            r.consumption.to_string(),
            r.balance.to_string(),
            r.score_delta.to_string(),
            total.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
