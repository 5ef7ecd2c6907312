//! Background JSON export worker.

use crate::cursor::DocumentCursor;
use crate::error::CoreResult;
use docdb_codec::to_json_string_pretty;
use docdb_storage::Store;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Pause between emitted records so the export never monopolizes the
/// device.
const RECORD_PAUSE: Duration = Duration::from_micros(100);

/// Entry point of the export worker thread.
pub(super) fn run_export(store: &Store, collection: &str, dir: &Path) {
    if let Err(err) = export_collection(store, collection, dir) {
        warn!(collection, dir = %dir.display(), error = %err, "export failed");
    }
}

/// Streams every document body into `<dir>/<collection>.json` as a
/// pretty-printed JSON array.
///
/// The array is written to a `.dump` file first and renamed into place
/// on success; on failure the dump is removed and no `.json` appears.
fn export_collection(store: &Store, collection: &str, dir: &Path) -> CoreResult<()> {
    fs::create_dir_all(dir)?;
    let dump_path = dir.join(format!("{collection}.dump"));
    let final_path = dir.join(format!("{collection}.json"));

    match write_dump(store, collection, &dump_path) {
        Ok(()) => {
            // Replace any previous export atomically.
            let _ = fs::remove_file(&final_path);
            fs::rename(&dump_path, &final_path)?;
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(&dump_path);
            Err(err)
        }
    }
}

fn write_dump(store: &Store, collection: &str, dump_path: &Path) -> CoreResult<()> {
    let file = fs::File::create(dump_path)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(b"[\n")?;

    let cursor = DocumentCursor::new(store.iter(collection)?);
    let mut first = true;
    for item in cursor {
        let doc = match item {
            Ok(doc) => doc,
            Err(err) => {
                warn!(collection, error = %err, "skipping unreadable document in export");
                continue;
            }
        };
        if !first {
            writer.write_all(b",\n")?;
        }
        first = false;
        writer.write_all(to_json_string_pretty(doc.data()).as_bytes())?;

        thread::sleep(RECORD_PAUSE);
    }

    writer.write_all(b"\n]")?;
    writer.flush()?;
    Ok(())
}
