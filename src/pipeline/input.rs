//! Input resolution: validate a user-supplied path and load the document.
//!
//! Validation happens *before* lopdf parsing so callers get a precise error
//! (missing file, unreadable file, not a PDF) rather than a generic parse
//! failure. The `%PDF` magic-byte check catches the common case of pointing
//! the tool at an HTML error page saved with a `.pdf` name.

use crate::error::FormFillError;
use lopdf::Document;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` names a readable PDF file.
pub fn validate_pdf_path(path: &Path) -> Result<(), FormFillError> {
    if !path.exists() {
        return Err(FormFillError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic != b"%PDF" => Err(FormFillError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                }),
                Ok(()) => Ok(()),
                Err(_) => Err(FormFillError::NotAPdf {
                    path: path.to_path_buf(),
                    magic: [0; 4],
                }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(FormFillError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(FormFillError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Validate and parse the input PDF.
pub fn load_pdf(path: &Path) -> Result<Document, FormFillError> {
    validate_pdf_path(path)?;
    let doc = Document::load(path).map_err(|e| FormFillError::PdfParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    debug!(path = %path.display(), pages = doc.get_pages().len(), "loaded PDF");
    Ok(doc)
}

/// Derive the output path: the trailing 4-character extension is replaced
/// with `_filled` plus the original extension.
///
/// `forms/intake.pdf` → `forms/intake_filled.pdf`. Deterministic, so repeated
/// runs overwrite the same file instead of chaining suffixes.
pub fn derive_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // "x.pdf" style: 4 trailing characters are ".ext".
    let derived = match name.char_indices().nth_back(3) {
        Some((idx, '.')) => format!("{}_filled{}", &name[..idx], &name[idx..]),
        _ => format!("{name}_filled.pdf"),
    };
    input.with_file_name(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn output_path_inserts_suffix_before_extension() {
        assert_eq!(
            derive_output_path(Path::new("forms/intake.pdf")),
            PathBuf::from("forms/intake_filled.pdf")
        );
        assert_eq!(
            derive_output_path(Path::new("a.PDF")),
            PathBuf::from("a_filled.PDF")
        );
    }

    #[test]
    fn output_path_is_stable_across_runs() {
        let first = derive_output_path(Path::new("x.pdf"));
        let second = derive_output_path(Path::new("x.pdf"));
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = validate_pdf_path(Path::new("/nonexistent/nope.pdf"));
        assert!(matches!(err, Err(FormFillError::FileNotFound { .. })));
    }

    #[test]
    fn non_pdf_magic_is_reported() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"<html>not a pdf</html>").unwrap();
        let err = validate_pdf_path(tmp.path());
        assert!(matches!(err, Err(FormFillError::NotAPdf { .. })));
    }
}
