use crate::entry::{extract_entry, top_level_entries};
use crate::error::{JmdictError, Result};
use crate::models::{ConversionStats, EntryRow, XmlElement};
use crate::progress::{ProgressUpdate, Reporter};
use log::{debug, info};
use rusqlite::{Connection, OpenFlags, Statement, params};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

// --- Schema Definition ---

const CREATE_META_TABLE: &str = "
CREATE TABLE meta (
    key TEXT PRIMARY KEY,
    value TEXT
);";

const CREATE_ENTRY_TABLE: &str = "
CREATE TABLE entry (
    id INTEGER PRIMARY KEY, -- JMdict ent_seq
    kanji TEXT,
    reading TEXT,
    gloss TEXT,
    position TEXT
);";

/// License of the JMdict data, stored in the `meta` table.
pub const LICENSE: &str = "CC-BY-SA 3.0 Unported";
pub const META_KEY_LICENSE: &str = "license";
pub const META_KEY_CREATION_DATE: &str = "database date of creation";

const STAGE_CONVERTING: &str = "Converting entries";
/// How many entries pass between two progress updates.
const PROGRESS_INTERVAL: u64 = 500;

// --- Connection ---

/// Creates the (empty) output database file. Fails if anything already
/// exists at `path`; an existing database is never appended to.
pub fn create_output_file(path: &Path) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => JmdictError::OutputAlreadyExists(path.to_path_buf()),
            _ => JmdictError::Io(e),
        })?;
    Ok(())
}

/// Opens the file made by [`create_output_file`] as a database.
pub fn open_output_database(path: &Path) -> Result<Connection> {
    // SQLite treats the empty file as a new database.
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    // Increase cache size (adjust based on available memory and testing)
    conn.pragma_update(None, "cache_size", "-64000")?; // e.g., -64000 = 64MB
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}

// --- Initialization Function ---

/// Creates the `meta` and `entry` tables and writes the two metadata rows.
pub fn initialize_database(conn: &mut Connection, creation_date: &str) -> Result<()> {
    info!("Initializing database schema...");
    let tx = conn.transaction()?;

    tx.execute(CREATE_META_TABLE, [])?;
    tx.execute(CREATE_ENTRY_TABLE, [])?;

    tx.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)",
        params![META_KEY_LICENSE, LICENSE],
    )?;
    tx.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)",
        params![META_KEY_CREATION_DATE, creation_date],
    )?;

    tx.commit()?;
    debug!("Database schema created (creation date {}).", creation_date);
    Ok(())
}

// --- Data Population Function ---

/// Converts every top-level `<entry>` of `root` and inserts the kept rows.
///
/// All inserts run in one transaction; nothing is committed if an insert
/// fails or the progress callback asks to stop.
pub(crate) fn populate_database(
    conn: &mut Connection,
    root: &XmlElement,
    lang: Option<&str>,
    reporter: &mut Reporter,
) -> Result<ConversionStats> {
    info!("Populating database from parsed JMdict document...");
    let start_time = Instant::now();

    let total_entries = top_level_entries(root).count() as u64;
    if !reporter.report(ProgressUpdate::new_stage(STAGE_CONVERTING, Some(total_entries))) {
        return Err(JmdictError::Aborted);
    }

    let tx = conn.transaction()?;
    let mut stats = ConversionStats::default();
    {
        let mut entry_stmt = tx.prepare(
            "INSERT INTO entry (id, kanji, reading, gloss, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for entry in top_level_entries(root) {
            match extract_entry(entry, lang) {
                Some(row) => {
                    insert_entry(&mut entry_stmt, &row)?;
                    stats.converted += 1;
                }
                None => stats.not_converted += 1,
            }

            let current = stats.total();
            if current % PROGRESS_INTERVAL == 0 || current == total_entries {
                let keep_going = reporter.report(ProgressUpdate {
                    stage_description: STAGE_CONVERTING.to_string(),
                    current_item: current,
                    total_items: Some(total_entries),
                    message: Some(format!("{} converted", stats.converted)),
                });
                if !keep_going {
                    info!("Conversion aborted by progress callback after {} entries.", current);
                    return Err(JmdictError::Aborted);
                }
            }
        }
    }
    tx.commit()?;

    info!(
        "Database population complete ({} converted, {} not converted). Took {:.2?}",
        stats.converted,
        stats.not_converted,
        start_time.elapsed()
    );
    Ok(stats)
}

fn insert_entry(stmt: &mut Statement<'_>, row: &EntryRow) -> Result<()> {
    stmt.execute(params![row.id, row.kanji, row.reading, row.gloss, row.position])?;
    Ok(())
}
