use std::fs;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use tracing::{debug, info};
use ulink_linker::{
    decompress_package, ConformSource, LinkerConfig, PackageIndex, PackageReader, PackageWriter,
    SaveContext, SaveOptions,
};
use ulink_object::{ObjectFlags, PackageFlags};

use crate::cli::*;
use crate::demo::build_demo_graph;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Chunks(args) => cmd_chunks(args),
        Command::Decompress(args) => cmd_decompress(args),
        Command::Demo(args) => cmd_demo(args, config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LinkerConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading linker configuration");
            LinkerConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))
        }
        None => Ok(LinkerConfig::default()),
    }
}

fn open(path: &Path) -> anyhow::Result<PackageReader> {
    PackageReader::open(path).with_context(|| format!("reading package {}", path.display()))
}

/// `"Name"` for an export or import index, `"null"` for 0.
fn index_label(reader: &PackageReader, index: PackageIndex) -> String {
    if index.is_null() {
        "null".to_string()
    } else {
        format!("{index} {}", reader.object_name(index))
    }
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let reader = open(&args.file)?;
    let summary = reader.summary();

    if args.json {
        let mut out = json!({
            "package": reader.root_name(),
            "summary": summary,
            "guid": summary.guid.to_hex(),
            "compressed": reader.file_summary().is_compressed(),
        });
        if args.names {
            out["names"] = serde_json::to_value(reader.name_entries())?;
        }
        if args.imports {
            out["imports"] = serde_json::to_value(reader.imports())?;
        }
        if args.exports {
            out["exports"] = serde_json::to_value(reader.exports())?;
        }
        if args.depends {
            let depends: Vec<Vec<i32>> = reader
                .depends()
                .iter()
                .map(|list| list.iter().map(|i| i.raw()).collect())
                .collect();
            out["depends"] = json!(depends);
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} {}", "Package".bold(), reader.root_name().yellow().bold());
    println!("  File version: {}  Engine version: {}", summary.file_version, summary.engine_version);
    println!("  Guid: {}", summary.guid.to_hex().cyan());
    println!("  Flags: {:#010x}", summary.package_flags);
    if !summary.folder_name.is_empty() {
        println!("  Folder: {}", summary.folder_name);
    }
    println!(
        "  Names: {}  Imports: {}  Exports: {}",
        summary.name_count.to_string().bold(),
        summary.import_count.to_string().bold(),
        summary.export_count.to_string().bold()
    );
    println!("  Header size: {} bytes", summary.total_header_size);
    println!("  Generations: {}", summary.generations.len());
    for (i, generation) in summary.generations.iter().enumerate() {
        println!(
            "    {}: exports {} names {} net objects {}",
            i, generation.export_count, generation.name_count, generation.net_object_count
        );
    }
    let file_summary = reader.file_summary();
    if file_summary.is_compressed() {
        println!(
            "  Compressed: {} chunks (flags {:#x})",
            file_summary.compressed_chunks.len(),
            file_summary.compression_flags
        );
    }
    if !reader.import_guids().is_empty() || !reader.export_guids().is_empty() {
        println!(
            "  Cross-level: {} import levels, {} export guids",
            reader.import_guids().len(),
            reader.export_guids().len()
        );
    }
    for thumbnail in reader.thumbnails() {
        println!(
            "  Thumbnail: {} {} at {}",
            thumbnail.class_name, thumbnail.object_path, thumbnail.offset
        );
    }

    if args.names {
        println!("\n{}", "Names".bold());
        for (i, entry) in reader.name_entries().iter().enumerate() {
            println!("  {:>4}  {:<32} {:#x}", i, entry.name, entry.flags.bits());
        }
    }
    if args.imports {
        println!("\n{}", "Imports".bold());
        for (i, import) in reader.imports().iter().enumerate() {
            println!(
                "  {:>4}  {}.{} {} (outer {})",
                PackageIndex::from_import(i).to_string().red(),
                import.class_package,
                import.class_name,
                import.object_name.bold(),
                index_label(&reader, import.outer_index)
            );
        }
    }
    if args.exports {
        println!("\n{}", "Exports".bold());
        for (i, export) in reader.exports().iter().enumerate() {
            let name = if export.object_name == "None" && export.serial_size == 0 {
                "(placeholder)".dimmed().to_string()
            } else {
                export.object_name.bold().to_string()
            };
            println!(
                "  {:>4}  {} {}  class {}  outer {}  size {} at {}",
                PackageIndex::from_export(i).to_string().green(),
                reader.export_class_name(i),
                name,
                index_label(&reader, export.class_index),
                index_label(&reader, export.outer_index),
                export.serial_size,
                export.serial_offset
            );
            if !export.super_index.is_null() {
                println!("          super {}", index_label(&reader, export.super_index));
            }
            if !export.archetype_index.is_null() {
                println!("          archetype {}", index_label(&reader, export.archetype_index));
            }
        }
    }
    if args.depends {
        println!("\n{}", "Depends".bold());
        for (i, list) in reader.depends().iter().enumerate() {
            let labels: Vec<String> = list.iter().map(|d| index_label(&reader, *d)).collect();
            println!(
                "  {:>4}  {}",
                PackageIndex::from_export(i).to_string().green(),
                if labels.is_empty() { "-".dimmed().to_string() } else { labels.join(", ") }
            );
        }
    }
    Ok(())
}

fn cmd_chunks(args: ChunksArgs) -> anyhow::Result<()> {
    let reader = open(&args.file)?;
    let summary = reader.file_summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary.compressed_chunks)?);
        return Ok(());
    }
    if !summary.is_compressed() {
        println!("{} is not compressed.", args.file.display());
        return Ok(());
    }
    println!(
        "{:>4}  {:>10} {:>10}  {:>10} {:>10}",
        "#", "raw off", "raw size", "comp off", "comp size"
    );
    let mut raw = 0u64;
    let mut packed = 0u64;
    for (i, chunk) in summary.compressed_chunks.iter().enumerate() {
        println!(
            "{:>4}  {:>10} {:>10}  {:>10} {:>10}",
            i,
            chunk.uncompressed_offset,
            chunk.uncompressed_size,
            chunk.compressed_offset,
            chunk.compressed_size
        );
        raw += chunk.uncompressed_size as u64;
        packed += chunk.compressed_size as u64;
    }
    println!(
        "{} {} chunks, {} → {} bytes",
        "✓".green(),
        summary.compressed_chunks.len(),
        raw,
        packed
    );
    Ok(())
}

fn cmd_decompress(args: DecompressArgs) -> anyhow::Result<()> {
    let data = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let image = decompress_package(&data)?;
    info!(input = %args.input.display(), raw = image.len(), "decompressed package");
    fs::write(&args.output, &image)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "{} Wrote {} ({} → {} bytes)",
        "✓".green().bold(),
        args.output.display(),
        data.len(),
        image.len()
    );
    Ok(())
}

fn cmd_demo(args: DemoArgs, config: LinkerConfig) -> anyhow::Result<()> {
    let (mut graph, package, root) = build_demo_graph()?;
    if args.compress {
        if let Some(data) = graph.package_data_mut(package) {
            data.flags.insert(PackageFlags::STORE_COMPRESSED);
        }
    }

    let mut source = args.conform.as_deref().map(open).transpose()?;
    let options = SaveOptions {
        base: Some(root),
        top_level_flags: ObjectFlags::STANDALONE,
        conform: source
            .as_mut()
            .map(|reader| reader as &mut dyn ConformSource),
        keep_dirty: false,
    };

    let mut writer = PackageWriter::new(config);
    let mut ctx = SaveContext::new();
    let report = writer
        .save(&mut ctx, &mut graph, package, &args.output, options)
        .with_context(|| format!("saving {}", args.output.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("{} Saved {}", "✓".green().bold(), report.path.display().to_string().bold());
    println!("  Package: {}", report.package.yellow());
    println!("  Guid: {}", report.guid.cyan());
    println!(
        "  Names: {}  Imports: {}  Exports: {}",
        report.names, report.imports, report.exports
    );
    if report.placeholders > 0 {
        println!("  Placeholders: {}", report.placeholders);
    }
    println!(
        "  Size: {} bytes{}",
        report.file_size,
        if report.compressed { " (compressed)" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo(dir: &Path, name: &str, compress: bool, conform: Option<&Path>) -> std::path::PathBuf {
        let output = dir.join(name);
        cmd_demo(
            DemoArgs {
                output: output.clone(),
                compress,
                conform: conform.map(Path::to_path_buf),
                json: false,
            },
            LinkerConfig::default(),
        )
        .unwrap();
        output
    }

    #[test]
    fn demo_package_inspects_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = demo(dir.path(), "Demo.upk", false, None);
        let reader = PackageReader::open(&path).unwrap();
        assert!(reader.exports().iter().any(|e| e.object_name == "Hero"));
        assert_eq!(reader.thumbnails().len(), 1);
        assert_eq!(reader.import_guids().len(), 1);
        assert_eq!(reader.import_guids()[0].level_name, "Level01");

        cmd_inspect(InspectArgs {
            file: path,
            names: true,
            imports: true,
            exports: true,
            depends: true,
            json: false,
        })
        .unwrap();
    }

    #[test]
    fn compressed_demo_decompresses() {
        let dir = tempfile::tempdir().unwrap();
        let path = demo(dir.path(), "Demo.upk", true, None);
        cmd_chunks(ChunksArgs { file: path.clone(), json: false }).unwrap();

        let output = dir.path().join("Demo.raw.upk");
        cmd_decompress(DecompressArgs { input: path.clone(), output: output.clone() }).unwrap();
        let plain = PackageReader::open(&output).unwrap();
        assert!(!plain.file_summary().is_compressed());
        assert_eq!(plain.exports(), PackageReader::open(&path).unwrap().exports());
    }

    #[test]
    fn conformed_demo_keeps_the_export_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = demo(dir.path(), "Demo.upk", false, None);
        let next_dir = dir.path().join("next");
        fs::create_dir_all(&next_dir).unwrap();
        let second = demo(&next_dir, "Demo.upk", false, Some(&first));

        let first = PackageReader::open(&first).unwrap();
        let second = PackageReader::open(&second).unwrap();
        assert_eq!(second.export_full_names("Demo"), first.export_full_names("Demo"));
        assert_eq!(second.summary().generations.len(), 2);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/ulink.toml"))).unwrap_err();
        assert!(err.to_string().contains("loading configuration"));
    }
}
