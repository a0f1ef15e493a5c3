//! Converts the JMdict Japanese dictionary from XML into a compact SQLite
//! database with one gloss language per entry.

// Declare modules
pub mod data;
pub mod db;
pub mod entry;
pub mod error;
pub mod models;
pub mod parse;
pub mod progress;

// Re-export key types for easier use
pub use entry::{ENGLISH, normalize_language};
pub use error::{JmdictError, Result};
pub use models::{ConversionStats, EntryRow, XmlElement};
pub use progress::{ProgressCallback, ProgressUpdate};

use log::{info, warn};
use parse::parse_document;
use progress::Reporter;
use scopeguard::ScopeGuard;
use std::fs;
use std::path::Path;

const STAGE_PARSING: &str = "Parsing XML";

/// Options for a conversion.
#[derive(Debug, Default, Clone)]
pub struct ConvertOptions {
    /// Gloss language to keep (a JMdict `xml:lang` code such as `ger`).
    /// Entries without glosses in this language fall back to English.
    /// `None`, `""` and `"eng"` all keep every gloss.
    pub lang: Option<String>,
}

/// Converts the JMdict file at `input` into a new SQLite database at `output`.
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    lang: Option<&str>,
) -> Result<ConversionStats> {
    let options = ConvertOptions {
        lang: lang.map(str::to_string),
    };
    convert_with_options(input, output, &options, None)
}

/// Converts with explicit options and an optional progress callback.
///
/// The input is read and parsed before the output file is created, so a
/// missing or malformed input never leaves a file behind. If writing the
/// database fails, the incomplete output file is removed.
pub fn convert_with_options(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &ConvertOptions,
    progress: Option<ProgressCallback>,
) -> Result<ConversionStats> {
    let input = input.as_ref();
    let output = output.as_ref();
    let lang = normalize_language(options.lang.as_deref());
    info!(
        "Converting {:?} to {:?} (gloss language: {})",
        input,
        output,
        lang.as_deref().unwrap_or("all")
    );

    data::ensure_input_file(input)?;
    data::ensure_output_absent(output)?;

    let mut reporter = Reporter::new(progress);
    if !reporter.report(ProgressUpdate::new_stage(STAGE_PARSING, None)) {
        return Err(JmdictError::Aborted);
    }
    let root = {
        let xml = data::read_input(input)?;
        parse_document(&xml)?
    };
    let entry_count = entry::top_level_entries(&root).count() as u64;
    let keep_going = reporter.report(ProgressUpdate {
        stage_description: STAGE_PARSING.to_string(),
        current_item: 1,
        total_items: Some(1),
        message: Some(format!("{} entries", entry_count)),
    });
    if !keep_going {
        return Err(JmdictError::Aborted);
    }

    db::create_output_file(output)?;
    let cleanup = scopeguard::guard(output.to_path_buf(), |path| {
        warn!("Removing incomplete output file {:?}", path);
        if let Err(e) = fs::remove_file(&path) {
            warn!("Could not remove {:?}: {}", path, e);
        }
    });

    let stats = write_database(output, &root, lang.as_deref(), &mut reporter)?;
    ScopeGuard::into_inner(cleanup);

    info!(
        "Converted entries: {}, not converted entries: {}",
        stats.converted, stats.not_converted
    );
    Ok(stats)
}

/// Fills the freshly created output file and closes it.
fn write_database(
    output: &Path,
    root: &XmlElement,
    lang: Option<&str>,
    reporter: &mut Reporter,
) -> Result<ConversionStats> {
    let mut conn = db::open_output_database(output)?;
    db::initialize_database(&mut conn, &creation_date())?;
    let stats = db::populate_database(&mut conn, root, lang, reporter)?;
    conn.close().map_err(|(_, e)| JmdictError::Storage(e))?;
    Ok(stats)
}

/// Today's local date as `YYYY-MM-DD`.
pub fn creation_date() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
