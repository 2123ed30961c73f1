use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ulink",
    about = "ulink: seek-free package linker",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Linker configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the summary and tables of a package
    Inspect(InspectArgs),
    /// List the compressed chunk table of a package
    Chunks(ChunksArgs),
    /// Write the uncompressed image of a package
    Decompress(DecompressArgs),
    /// Build a sample object graph and save it
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub names: bool,
    #[arg(long)]
    pub imports: bool,
    #[arg(long)]
    pub exports: bool,
    #[arg(long)]
    pub depends: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ChunksArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DecompressArgs {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Args)]
pub struct DemoArgs {
    pub output: PathBuf,
    /// Store the package chunk-compressed
    #[arg(long)]
    pub compress: bool,
    /// Prior version to conform against
    #[arg(long)]
    pub conform: Option<PathBuf>,
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inspect_sections() {
        let cli = Cli::try_parse_from(["ulink", "inspect", "Game.upk", "--names", "--exports"]).unwrap();
        if let Command::Inspect(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("Game.upk"));
            assert!(args.names && args.exports);
            assert!(!args.imports && !args.depends && !args.json);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_chunks_json() {
        let cli = Cli::try_parse_from(["ulink", "chunks", "Game.upk", "--json"]).unwrap();
        if let Command::Chunks(args) = cli.command {
            assert!(args.json);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_decompress() {
        let cli = Cli::try_parse_from(["ulink", "decompress", "in.upk", "out.upk"]).unwrap();
        if let Command::Decompress(args) = cli.command {
            assert_eq!(args.input, PathBuf::from("in.upk"));
            assert_eq!(args.output, PathBuf::from("out.upk"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_demo_with_conform() {
        let cli = Cli::try_parse_from(["ulink", "demo", "new.upk", "--compress", "--conform", "old.upk"]).unwrap();
        if let Command::Demo(args) = cli.command {
            assert!(args.compress);
            assert_eq!(args.conform, Some(PathBuf::from("old.upk")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["ulink", "--verbose", "--config", "ulink.toml", "chunks", "a.upk"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("ulink.toml")));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Cli::try_parse_from(["ulink", "inspect"]).is_err());
    }
}
