//! Image inspection commands

use anyhow::Result;
use cardforge_image::{get_image_info, validate_image};
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ImageCommands {
    /// Show dimensions, format and size of an image
    Info {
        path: PathBuf,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check that an image is readable and large enough
    Validate {
        path: PathBuf,

        #[arg(long, default_value = "512")]
        min_width: u32,

        #[arg(long, default_value = "512")]
        min_height: u32,
    },
}

pub fn run(cmd: ImageCommands) -> Result<()> {
    match cmd {
        ImageCommands::Info { path, format } => {
            let info = get_image_info(&path)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Image: {}", path.display());
                println!("  Size: {}x{}", info.width, info.height);
                println!("  Format: {}", info.format.as_deref().unwrap_or("unknown"));
                println!("  Bytes: {}", info.size_bytes);
            }
            Ok(())
        }
        ImageCommands::Validate {
            path,
            min_width,
            min_height,
        } => {
            let result = validate_image(&path, min_width, min_height);
            if result.valid {
                println!("{}: OK", path.display());
                Ok(())
            } else {
                println!("{}: {} issue(s)", path.display(), result.issues.len());
                for issue in &result.issues {
                    println!("  - {}", issue);
                }
                anyhow::bail!("validation failed for {}", path.display())
            }
        }
    }
}
