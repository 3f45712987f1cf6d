//! Output-file lifecycle: append-open for continuation, collision-safe
//! creation for fresh runs.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Extension of the muxed output.
pub const OUTPUT_EXT: &str = "ts";

fn output_path(dir: &Path, base: &str) -> PathBuf {
    dir.join(format!("{base}.{OUTPUT_EXT}"))
}

/// Opens an existing `<base>.ts` for append (resumed run). Fails when the
/// file is missing so the caller can fall back to a fresh create.
pub fn open_continuation(dir: &Path, base: &str) -> io::Result<File> {
    OpenOptions::new().append(true).open(output_path(dir, base))
}

/// Creates `<base>.ts` for a fresh run, appending `(n)` to the base name
/// while it collides with an existing file. Returns the possibly-renamed
/// base name together with the open file.
pub fn create_fresh(dir: &Path, base: &str) -> io::Result<(String, File)> {
    let mut name = base.to_string();
    if output_path(dir, &name).exists() {
        let mut i = 1u32;
        loop {
            let candidate = format!("{base}({i})");
            if !output_path(dir, &candidate).exists() {
                name = candidate;
                break;
            }
            i += 1;
        }
    }
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(output_path(dir, &name))?;
    Ok((name, file))
}
