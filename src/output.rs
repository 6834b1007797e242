use std::{fs::File, io, path::Path};

use crate::{
    counters::CounterRow,
    error::{AppError, AppResult},
};

/// Create or truncate `path` and write `rows` to it as header-less CSV.
pub(crate) fn write_rows(path: &Path, rows: &[CounterRow]) -> AppResult<()> {
    let file = File::create(path).map_err(|source| AppError::File {
        path: path.to_path_buf(),
        source,
    })?;

    write_csv(file, rows)
}

pub(crate) fn write_csv<W: io::Write>(writer: W, rows: &[CounterRow]) -> AppResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush().map_err(csv::Error::from)?;

    Ok(())
}
