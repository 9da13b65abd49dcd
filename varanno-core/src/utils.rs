use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = is_gzipped(path);
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    // call records and annotation tables have long lines
    let reader = BufReader::with_capacity(256 * 1024, file);

    Ok(reader)
}

/// Get a reader for either a gzipped, non-gzipped file, or stdin (`-`).
pub fn get_dynamic_reader_w_stdin(file_path_str: &str) -> Result<BufReader<Box<dyn Read>>> {
    if file_path_str == "-" {
        Ok(BufReader::new(Box::new(std::io::stdin()) as Box<dyn Read>))
    } else {
        get_dynamic_reader(Path::new(file_path_str))
    }
}

/// `.gz`, `.bgz` and `.bgzf` files all decode with a multi-member gzip reader.
pub fn is_gzipped(path: &Path) -> bool {
    matches!(
        path.extension().and_then(OsStr::to_str),
        Some("gz") | Some("bgz") | Some("bgzf")
    )
}

///
/// Strip a leading `chr` from a chromosome name. Only a true prefix is
/// removed, so `chrUn_KI270302v1` becomes `Un_KI270302v1` and `1` is kept.
///
pub fn strip_chr_prefix(chrom: &str) -> &str {
    chrom
        .strip_prefix("chr")
        .or_else(|| chrom.strip_prefix("CHR"))
        .unwrap_or(chrom)
}
