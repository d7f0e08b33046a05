pub mod validator;
pub mod writer;

use std::path::Path;

pub use validator::validate_index;
pub use writer::build_index;

/// Live count of `.jpg` files directly inside a frame directory. An
/// unreadable directory counts as empty; existence is checked separately
/// where it matters.
pub(crate) fn count_jpeg_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
        })
        .count()
}
