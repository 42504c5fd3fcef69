//! Temporary fixture corpora.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Bytes written into every generated fixture file.
pub const FIXTURE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfixture";

/// Creates a corpus containing the given relative paths, e.g.
/// `["cats/a.jpg", "dogs/b.png"]`.
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn image_corpus(files: &[&str]) -> TempDir {
    let dir = tempfile::Builder::new()
        .prefix("load_test_corpus")
        .tempdir()
        .expect("Failed to create temporary corpus directory");
    for rel in files {
        write_fixture(dir.path(), rel);
    }
    dir
}

/// Writes one fixture file under `root`, creating parent directories.
pub fn write_fixture(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    fs::write(&path, FIXTURE_BYTES).expect("Failed to write fixture");
}
