//! export_gallery - write all stored annotated images back to disk
//!
//! Enumerates the annotated-image table in row order and decodes each blob
//! into a PNG file under the output directory. A corrupt row is reported and
//! skipped; the remaining rows still export.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pavewatch::{ResultStore, SqliteResultStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the result database.
    #[arg(long, env = "PAVEWATCH_DB_PATH", default_value = "pavewatch.db")]
    db_path: String,
    /// Directory the decoded images are written to.
    #[arg(long, default_value = "retrieved_images")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let store = SqliteResultStore::open(&args.db_path)
        .with_context(|| format!("open result store at {}", args.db_path))?;
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("create output directory {}", args.output.display()))?;

    let mut exported = 0u64;
    let mut failed = 0u64;
    for (row, decoded) in store.list()? {
        match decoded {
            Ok(frame) => {
                let path = args.output.join(format!("annotated_{}.png", row.0));
                frame
                    .to_rgb_image()
                    .save_with_format(&path, image::ImageFormat::Png)
                    .with_context(|| format!("write {}", path.display()))?;
                exported += 1;
            }
            Err(e) => {
                log::warn!("skipping {}: {:#}", row, e);
                failed += 1;
            }
        }
    }

    log::info!(
        "exported {} images to {} ({} unreadable)",
        exported,
        args.output.display(),
        failed
    );
    Ok(())
}
