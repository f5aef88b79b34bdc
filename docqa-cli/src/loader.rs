//! Load plain-text, Markdown and PDF files from disk as [`Document`]s.

use std::path::Path;

use anyhow::{Context, anyhow, bail};
use docqa_rag::Document;
use tracing::{info, warn};
use walkdir::WalkDir;

/// File extensions the loader understands, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf"];

/// Load every supported file under `root`, sorted by path.
///
/// `root` may also name a single file. Each document's id is its path
/// relative to `root`. Files that cannot be read are logged and skipped.
pub fn load_documents(root: impl AsRef<Path>) -> anyhow::Result<Vec<Document>> {
    let root = root.as_ref();
    if !root.exists() {
        bail!("document path {} does not exist", root.display());
    }

    let mut files = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| extension(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let pages = match load_file(path) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "skipping file");
                continue;
            }
        };
        let id = path.strip_prefix(root).ok().filter(|p| !p.as_os_str().is_empty());
        let id = id.unwrap_or(path.as_path()).to_string_lossy().into_owned();
        for (page, text) in pages {
            let mut document = match page {
                Some(n) => Document::new(format!("{id}#page={n}"), text)
                    .with_metadata("page", n.to_string()),
                None => Document::new(id.clone(), text),
            };
            document = document.with_metadata("source", path.to_string_lossy().into_owned());
            document.source_uri = Some(format!("file://{}", path.display()));
            documents.push(document);
        }
    }

    info!(
        root = %root.display(),
        found = files.len(),
        loaded = documents.len(),
        "loaded documents"
    );
    Ok(documents)
}

fn extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Read one file. PDFs yield one entry per non-blank page, numbered from 1;
/// other files yield a single unnumbered entry.
fn load_file(path: &Path) -> anyhow::Result<Vec<(Option<usize>, String)>> {
    match extension(path).as_deref() {
        Some("pdf") => {
            let pages = catch_panic(|| {
                pdf_extract::extract_text_by_pages(path)
                    .with_context(|| format!("failed to extract text from {}", path.display()))
            })?;
            Ok(pages
                .into_iter()
                .enumerate()
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(i, text)| (Some(i + 1), text))
                .collect())
        }
        _ => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(vec![(None, text)])
        }
    }
}

/// Run `f`, turning a panic into an error. The PDF parser panics on some
/// malformed files.
fn catch_panic<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(anyhow!("parser panicked: {message}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_supported_files_sorted_by_path() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();

        fs::write(root.join("b.txt"), "The sun is a star.").unwrap();
        fs::write(root.join("nested/a.MD"), "# Stars\n\nStars emit light.").unwrap();
        fs::write(root.join("notes.json"), "{}").unwrap();

        let documents = load_documents(root).unwrap();
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b.txt", "nested/a.MD"]);
        assert_eq!(documents[0].text, "The sun is a star.");
        assert!(documents[0].metadata.contains_key("source"));
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("good.txt"), "fine").unwrap();
        fs::write(root.join("bad.txt"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let documents = load_documents(root).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "good.txt");
    }

    #[test]
    fn single_file_root_keeps_its_path_as_id() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("only.txt");
        fs::write(&file, "one").unwrap();

        let documents = load_documents(&file).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, file.to_string_lossy());
    }

    #[test]
    fn malformed_pdf_is_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("broken.pdf"), b"%PDF-1.4\nthis is not a real pdf").unwrap();
        fs::write(root.join("notes.txt"), "still here").unwrap();

        let documents = load_documents(root).unwrap();
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["notes.txt"]);
        assert!(!documents[0].metadata.contains_key("page"));
    }

    #[test]
    fn panics_become_errors() {
        let err = catch_panic::<()>(|| panic!("bad xref table")).unwrap_err();
        assert_eq!(err.to_string(), "parser panicked: bad xref table");

        let err = catch_panic::<()>(|| panic!("object {} missing", 7)).unwrap_err();
        assert_eq!(err.to_string(), "parser panicked: object 7 missing");

        assert_eq!(catch_panic(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(load_documents("/definitely/not/here").is_err());
    }
}
