use crate::tvm::{Address, BocOptions, boc, deserialize_fift};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// tonutils-boc CLI
#[derive(Parser, Debug)]
#[command(name = "tonutils-boc")]
#[command(about = "Inspect and build TON bags of cells", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a bag of cells and print every root
    Decode {
        /// BOC in base64 (or hex with --hex)
        input: String,
        /// Treat input as hex
        #[arg(long)]
        hex: bool,
    },
    /// Build a bag of cells from a fift hex file
    Encode {
        /// File with x{...} lines
        file: PathBuf,
        /// Serialization options as JSON, e.g. {"has_index":true}
        #[arg(short = 'c', long)]
        config: Option<String>,
    },
    /// Print every form of an address
    Address {
        /// Raw (wc:hex) or user-friendly address
        address: String,
    },
}

#[derive(Serialize, Debug)]
struct RootReport {
    hash: String,
    depth: u16,
    level: u8,
    cell_type: String,
    fift: String,
}

#[derive(Serialize, Debug)]
struct AddressReport {
    raw: String,
    bounceable: String,
    non_bounceable: String,
    bounceable_test_only: String,
    non_bounceable_test_only: String,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Execute the command
    pub fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Decode { input, hex } => self.execute_decode(input, *hex),
            Commands::Encode { file, config } => self.execute_encode(file, config.as_deref()),
            Commands::Address { address } => self.execute_address(address),
        }
    }

    fn execute_decode(&self, input: &str, hex: bool) -> Result<()> {
        let input = input.trim();
        let roots = if hex {
            let data = hex::decode(input).context("input is not valid hex")?;
            boc::deserialize(&data)?
        } else {
            let data = STANDARD.decode(input).context("input is not valid base64")?;
            boc::deserialize(&data)?
        };
        log::info!("Decoded {} root(s)", roots.len());

        let reports = roots
            .iter()
            .map(|root| {
                Ok(RootReport {
                    hash: root.hash_hex(),
                    depth: root.depth(),
                    level: root.level(),
                    cell_type: root.cell_type().to_string(),
                    fift: root.to_fift_hex()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&reports)?);
        Ok(())
    }

    fn execute_encode(&self, file: &Path, config: Option<&str>) -> Result<()> {
        let options: BocOptions = match config {
            Some(json) => serde_json::from_str(json).context("invalid BOC options")?,
            None => BocOptions::default(),
        };
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let roots = deserialize_fift(&text)?;
        log::info!("Serializing {} root(s) with {:?}", roots.len(), options);

        let data = boc::serialize(&roots, &options)?;
        log::info!("BOC size: {} bytes", data.len());
        println!("{}", STANDARD.encode(&data));
        Ok(())
    }

    fn execute_address(&self, address: &str) -> Result<()> {
        let address: Address = address.trim().parse()?;
        let report = AddressReport {
            raw: address.to_raw(),
            bounceable: address.to_friendly(true, true, false),
            non_bounceable: address.to_friendly(true, false, false),
            bounceable_test_only: address.to_friendly(true, true, true),
            non_bounceable_test_only: address.to_friendly(true, false, true),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

