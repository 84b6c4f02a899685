mod properties;

use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::result::Result;

use clap::{Parser, Subcommand};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::*;

use idext_core::blocks::AllSolid;
use idext_core::config::Config;
use idext_core::storage::persistence::{PersistenceAdapter, Staging};
use idext_nbt::{Compound, NBTRead, NBTWrite, Tag};

use crate::properties::IdextProperties;

const PROPERTIES_FILENAME: &str = "idext.properties";

/// First byte of a zlib stream with the default window size
const ZLIB_MAGIC: u8 = 0x78;

/// Inspects and upgrades chunk records with wide block ids
#[derive(Parser)]
#[command(name = "idext")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file, defaults are used when it doesn't exist
    #[arg(global = true, short, long, default_value = PROPERTIES_FILENAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand)]
enum Command {
    /// Print the storage format and block counts of every section
    Inspect {
        /// Chunk record, zlib compressed or not
        file: PathBuf
    },

    /// Rewrite a chunk record with 16 bit block tags
    Upgrade {
        input: PathBuf,
        output: PathBuf
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Inspect { file } => inspect(&file, config),
        Command::Upgrade { input, output } => upgrade(&input, &output, config)
    }
}

fn load_config(path: &Path) -> Result<Config, Box<dyn Error>> {
    match fs::read_to_string(path) {
        Ok(v) => {
            let properties: IdextProperties = v.parse()?;
            Ok(properties.into())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No '{}' found, using the default settings", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into())
    }
}

fn inspect(path: &Path, config: Config) -> Result<(), Box<dyn Error>> {
    let (_, root) = read_record(path)?;
    let adapter = PersistenceAdapter::new(config, &AllSolid, Staging::Direct);

    let sections = root.get("Level")
        .and_then(Tag::as_compound)
        .and_then(|x| x.get("Sections"))
        .and_then(Tag::as_list)
        .unwrap_or(&[]);

    let loaded = adapter.load_chunk(&root)?;
    println!("chunk ({}, {})", loaded.chunk.coord.x, loaded.chunk.coord.z);

    for tag in sections.iter().filter_map(Tag::as_compound) {
        let y = match tag.get("Y").and_then(Tag::as_byte) {
            Some(v) => v,
            None => continue
        };

        let format = if tag.contains_key("Blocks16") {
            "16 bit"
        }
        else if tag.contains_key("Add") {
            "12 bit"
        }
        else if tag.contains_key("Blocks") {
            "8 bit"
        }
        else {
            "no blocks"
        };

        match loaded.chunk.data.section(y as usize) {
            Some(section) => println!(
                "section {:2}: {:9} blocks {:4} ticking {:4} max id {}",
                y,
                format,
                section.non_empty_count(),
                section.ticking_count(),
                section.block_ids().iter().max().copied().unwrap_or(0)),
            None => println!("section {:2}: {:9} skipped", y, format)
        }
    }

    for failure in &loaded.failures {
        println!("section {:2}: failed: {}", failure.y, failure.error);
    }

    Ok(())
}

fn upgrade(input: &Path, output: &Path, config: Config) -> Result<(), Box<dyn Error>> {
    let (name, root) = read_record(input)?;
    let adapter = PersistenceAdapter::new(config, &AllSolid, Staging::Direct);

    let loaded = adapter.load_chunk(&root)?;
    for failure in &loaded.failures {
        warn!("Section {} lost: {}", failure.y, failure.error);
    }

    let upgraded = adapter.save_chunk(&loaded.chunk);
    write_record(output, &name, &upgraded)?;

    info!("Upgraded {} sections of chunk ({}, {}) to '{}'",
        loaded.chunk.data.get_num_sections(),
        loaded.chunk.coord.x,
        loaded.chunk.coord.z,
        output.display());
    Ok(())
}

fn read_record(path: &Path) -> Result<(String, Compound), Box<dyn Error>> {
    let mut bytes = fs::read(path)?;
    if bytes.first() == Some(&ZLIB_MAGIC) {
        let mut inflated = Vec::new();
        ZlibDecoder::new(&bytes[..]).read_to_end(&mut inflated)?;
        bytes = inflated;
    }

    Ok((&bytes[..]).read_root()?)
}

fn write_record(path: &Path, name: &str, root: &Compound) -> Result<(), Box<dyn Error>> {
    let file = BufWriter::new(File::create(path)?);
    let mut zen = ZlibEncoder::new(file, Compression::default());
    zen.write_root(name, root)?;
    zen.finish()?.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_subcommands() {
        let cli = Cli::try_parse_from(["idext", "upgrade", "old.nbt", "new.nbt"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(PROPERTIES_FILENAME));
        match cli.command {
            Command::Upgrade { input, output } => {
                assert_eq!(input.as_path(), Path::new("old.nbt"));
                assert_eq!(output.as_path(), Path::new("new.nbt"));
            }
            Command::Inspect { .. } => panic!("expected upgrade")
        }

        let cli = Cli::try_parse_from(["idext", "inspect", "r.nbt", "--config", "other.properties"]).unwrap();
        assert_eq!(cli.config.as_path(), Path::new("other.properties"));
        assert!(matches!(cli.command, Command::Inspect { .. }));

        assert!(Cli::try_parse_from(["idext", "inspect"]).is_err());
        assert!(Cli::try_parse_from(["idext", "upgrade", "old.nbt"]).is_err());
        assert!(Cli::try_parse_from(["idext"]).is_err());
    }
}
