use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use helix_save::api;
use helix_save::codec;
use helix_save::envelope;
use helix_save::fingerprint;

#[derive(Parser)]
#[command(name = "helix-repair", version = "1.0.0", about = "Diagnostics and repair for helix-save envelopes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode an envelope's payload and write it as indented JSON alongside it
    Export {
        path: PathBuf,
        /// Use the portable global key instead of the machine key
        #[arg(long)]
        portable: bool,
        /// Canonical type name the envelope was bound to (defaults to the
        /// generic JSON value type, i.e. no binding check)
        #[arg(long)]
        type_name: Option<String>,
    },
    /// Read a `<path>.json` sibling and write a fresh signed envelope at `<path>`
    Import {
        /// Path to the `.json` sibling, e.g. `state.bin.json`
        json_path: PathBuf,
        #[arg(long)]
        portable: bool,
        #[arg(long)]
        no_backup: bool,
        #[arg(long)]
        no_compress: bool,
        #[arg(long)]
        type_name: Option<String>,
    },
    /// Print header fields without decoding the payload or requiring a key
    Inspect { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    match Cli::parse().command {
        Commands::Export { path, portable, type_name } => export(&path, portable, type_name.as_deref()),
        Commands::Import { json_path, portable, no_backup, no_compress, type_name } => {
            import(&json_path, portable, !no_backup, !no_compress, type_name.as_deref())
        }
        Commands::Inspect { path } => inspect(&path),
    }
}

fn digest_for(type_name: Option<&str>) -> [u8; 32] {
    match type_name {
        Some(name) => fingerprint::of_name(name),
        None => fingerprint::of::<serde_json::Value>(),
    }
}

fn export(path: &Path, portable: bool, type_name: Option<&str>) -> anyhow::Result<()> {
    let digest = digest_for(type_name);
    let raw = api::extract_raw_payload_with_digest(path, &digest, portable)?;
    let value: serde_json::Value = serde_json::from_slice(&raw)?;

    let out_path = sibling_with_suffix(path, ".json");
    let pretty = serde_json::to_vec_pretty(&value)?;
    std::fs::write(&out_path, pretty)?;

    println!("Exported {} -> {}", path.display(), out_path.display());
    Ok(())
}

fn import(json_path: &Path, portable: bool, backup: bool, compress: bool, type_name: Option<&str>) -> anyhow::Result<()> {
    let digest = digest_for(type_name);
    let text = std::fs::read(json_path)?;
    let value: serde_json::Value = serde_json::from_slice(&text)?;

    let encoded = codec::encode(&value, compress)?;
    let target = strip_suffix(json_path, ".json");
    api::save_prebuilt_payload_with_digest(&target, &digest, &encoded.bytes, portable, backup, encoded.compressed)?;

    println!("Imported {} -> {}", json_path.display(), target.display());
    Ok(())
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)?;
    let header = envelope::summarize(&bytes)?;

    println!("── helix-save envelope ──────────────────────────────────");
    println!("  Path           {}", path.display());
    println!("  File size      {} B", bytes.len());
    println!("  Version        {}", header.version);
    println!("  Flags          {:#04x} (compressed: {})", header.flags, header.flags & envelope::FLAG_COMPRESSED != 0);
    println!("  Type digest    {}", hex::encode(header.type_digest));
    println!("  Timestamp      {} ns since epoch", header.timestamp);
    println!("  Payload length {} B", header.payload_len);
    Ok(())
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn strip_suffix(path: &Path, suffix: &str) -> PathBuf {
    let s = path.as_os_str().to_string_lossy();
    match s.strip_suffix(suffix) {
        Some(stripped) => PathBuf::from(stripped),
        None => path.to_path_buf(),
    }
}
