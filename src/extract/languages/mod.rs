//! Language-specific extractor implementations.

mod go;
mod python;

pub use go::GoExtractor;
pub use python::PythonExtractor;

use super::UnitExtractor;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static storage for the Go extractor.
static GO_EXTRACTOR: OnceCell<GoExtractor> = OnceCell::new();

/// Static storage for the Python extractor.
static PYTHON_EXTRACTOR: OnceCell<PythonExtractor> = OnceCell::new();

/// Whether extractors have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register all available language extractors.
///
/// Call this once at startup before using extractors.
/// This is idempotent - calling it multiple times is safe.
pub fn register_extractors() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return; // Already registered
    }

    GO_EXTRACTOR.get_or_init(GoExtractor::new);
    PYTHON_EXTRACTOR.get_or_init(PythonExtractor::new);
}

/// Get an extractor for the given file extension.
///
/// Returns None if no extractor is registered for the extension.
pub fn get_extractor(ext: &str) -> Option<&'static dyn UnitExtractor> {
    // Ensure extractors are registered
    register_extractors();

    match ext {
        "go" => GO_EXTRACTOR.get().map(|e| e as &'static dyn UnitExtractor),
        "py" => PYTHON_EXTRACTOR
            .get()
            .map(|e| e as &'static dyn UnitExtractor),
        _ => None,
    }
}

/// Get all registered file extensions.
pub fn registered_extensions() -> &'static [&'static str] {
    &["go", "py"]
}
