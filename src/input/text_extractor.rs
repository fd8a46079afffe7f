//! Text extraction from supported file formats

use crate::error::{ConvertError, Result};
use log::{debug, warn};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// Separator placed between consecutive PDF pages.
pub const PAGE_BREAK: &str = "\n\n";

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static INSTALL_QUIET_HOOK: Once = Once::new();

/// Wrap the process panic hook once so panics raised inside `quietly` are logged at debug
/// level instead of printed to stderr. Other panics still reach the previous hook.
fn install_quiet_hook() {
    INSTALL_QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if QUIET_PANICS.with(Cell::get) {
                debug!("Suppressed parser panic: {}", info);
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `f`, catching any panic without printing a trace for it.
fn quietly<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    install_quiet_hook();
    QUIET_PANICS.with(|quiet| quiet.set(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    QUIET_PANICS.with(|quiet| quiet.set(false));
    outcome
}

pub trait TextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        // pdf-extract panics on some malformed inputs instead of returning an error
        let outcome = quietly(|| pdf_extract::extract_text_from_mem_by_pages(bytes));

        let raw_pages = match outcome {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                return Err(ConvertError::Extraction(format!(
                    "Failed to extract text from PDF: {}",
                    e
                )))
            }
            Err(_) => {
                return Err(ConvertError::Extraction(
                    "PDF parser aborted on malformed content".to_string(),
                ))
            }
        };

        let pages = join_ready_pages(&raw_pages);
        debug!("Extracted {} page(s) from PDF", pages.len());

        let joined = pages.join(PAGE_BREAK);
        if joined.trim().is_empty() {
            return Err(ConvertError::Extraction(
                "PDF contains no extractable text (it may be scanned or image-based)".to_string(),
            ));
        }

        Ok(joined)
    }
}

/// Trim each page and drop blank ones, keeping page order.
fn join_ready_pages(pages: &[String]) -> Vec<&str> {
    pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect()
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        Ok(decode_text(bytes))
    }
}

/// Best-effort decoding: BOM sniffing, a UTF-16 null-byte heuristic, then lossy UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }

    if bytes.len() >= 4 && bytes.len() % 2 == 0 {
        let even_nulls = bytes.iter().step_by(2).filter(|&&b| b == 0).count();
        let odd_nulls = bytes.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
        if even_nulls > bytes.len() / 4 && even_nulls > odd_nulls {
            debug!("Detected BOM-less UTF-16BE text");
            return decode_utf16(bytes, u16::from_be_bytes);
        }
        if odd_nulls > bytes.len() / 4 && odd_nulls > even_nulls {
            debug!("Detected BOM-less UTF-16LE text");
            return decode_utf16(bytes, u16::from_le_bytes);
        }
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(
                "Text is not valid UTF-8 (first bad byte at {}); replacing undecodable sequences",
                e.valid_up_to()
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
