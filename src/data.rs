//! Input file handling for JMdict.
//!
//! JMdict is published both as plain XML and gzip-compressed (`JMdict.gz`).
//! Compressed input is recognized by its magic bytes, not by its extension.

use crate::error::{JmdictError, Result};
use flate2::read::GzDecoder;
use log::info;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Checks that `path` exists and is a regular file.
pub fn ensure_input_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(JmdictError::InputNotFound(path.to_path_buf()))
    }
}

/// Checks that nothing exists at `path` yet.
pub fn ensure_output_absent(path: &Path) -> Result<()> {
    // symlink_metadata so a dangling symlink also counts as existing
    if path.symlink_metadata().is_ok() {
        Err(JmdictError::OutputAlreadyExists(path.to_path_buf()))
    } else {
        Ok(())
    }
}

/// Reads the whole input document into memory, decompressing it first if it
/// is gzip-compressed.
pub fn read_input(path: &Path) -> Result<String> {
    ensure_input_file(path)?;

    let mut reader = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 2];
    let is_gzip = match reader.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e.into()),
    };

    // Re-open rather than seek so the BufReader state stays simple.
    let mut file = BufReader::new(File::open(path)?);
    let mut content = String::new();
    let read_result = if is_gzip {
        info!("Decompressing gzip input {:?}...", path);
        GzDecoder::new(file).read_to_string(&mut content)
    } else {
        info!("Reading XML input {:?}...", path);
        file.read_to_string(&mut content)
    };

    match read_result {
        Ok(bytes) => {
            info!("Read {} bytes of XML.", bytes);
            Ok(content)
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Err(JmdictError::MalformedDocument(
            format!("input is not valid UTF-8 or gzip data: {}", e),
        )),
        Err(e) => Err(JmdictError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::{BufWriter, Write};
    use tempfile::tempdir;

    // Helper to create a gz file for testing decompression
    fn create_gz(path: &Path, content: &str) -> io::Result<()> {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(content.as_bytes())?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    #[test]
    fn test_read_plain_xml() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("JMdict.xml");
        fs::write(&path, "<JMdict>犬</JMdict>").unwrap();

        let content = read_input(&path).unwrap();
        assert_eq!(content, "<JMdict>犬</JMdict>");
    }

    #[test]
    fn test_read_gzip_input() {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = tempdir().expect("Failed to create temp dir");
        // No .gz extension: detection goes by content.
        let path = temp_dir.path().join("JMdict");
        create_gz(&path, "<JMdict><entry/></JMdict>").expect("Failed to create GZ");

        let content = read_input(&path).unwrap();
        assert_eq!(content, "<JMdict><entry/></JMdict>");
    }

    #[test]
    fn test_read_tiny_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("one-byte.xml");
        fs::write(&path, "x").unwrap();
        assert_eq!(read_input(&path).unwrap(), "x");
    }

    #[test]
    fn test_missing_and_directory_inputs() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing.xml");
        assert!(matches!(
            read_input(&missing),
            Err(JmdictError::InputNotFound(_))
        ));
        assert!(matches!(
            ensure_input_file(temp_dir.path()),
            Err(JmdictError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("latin1.xml");
        fs::write(&path, [b'<', b'a', b'>', 0xE9, b'<', b'/', b'a', b'>']).unwrap();
        assert!(matches!(
            read_input(&path),
            Err(JmdictError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_ensure_output_absent() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out.db");
        assert!(ensure_output_absent(&path).is_ok());
        fs::write(&path, "").unwrap();
        assert!(matches!(
            ensure_output_absent(&path),
            Err(JmdictError::OutputAlreadyExists(_))
        ));
    }
}
