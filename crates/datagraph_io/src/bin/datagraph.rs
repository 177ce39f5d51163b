//! Datagraph CLI entry point.

use datagraph_foundation::EntityId;
use datagraph_io::{
    FileVersion, ReadOptions, WriteOptions, file_version, is_unknown_content, read_file_with, write_file_with,
    write_xdmf,
};
use datagraph_storage::{DataGraph, Payload};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    files: Vec<PathBuf>,
    show_help: bool,
    show_version: bool,
    preflight: bool,
    validate: bool,
    verbose: bool,
    convert: Option<PathBuf>,
    xdmf: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "-p" | "--preflight" => config.preflight = true,
            "-v" | "--verbose" => config.verbose = true,
            "--validate" => config.validate = true,
            "-o" | "--convert" => {
                i += 1;
                if i >= args.len() {
                    return Err("--convert requires a value".into());
                }
                config.convert = Some(PathBuf::from(&args[i]));
            }
            "--xdmf" => {
                i += 1;
                if i >= args.len() {
                    return Err("--xdmf requires a value".into());
                }
                config.xdmf = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}").into());
            }
            path => config.files.push(PathBuf::from(path)),
        }
        i += 1;
    }

    if config.preflight && config.convert.is_some() {
        return Err("--convert needs loaded data and cannot be combined with --preflight".into());
    }
    if (config.convert.is_some() || config.xdmf.is_some()) && config.files.len() != 1 {
        return Err("--convert and --xdmf take exactly one input file".into());
    }

    Ok(config)
}

fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_args(args)?;

    if config.show_help {
        print_help();
        return Ok(());
    }

    if config.show_version {
        println!("datagraph {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let default_level = if config.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if config.files.is_empty() {
        print_help();
        return Err("no input files".into());
    }

    let options = if config.preflight {
        ReadOptions::preflight()
    } else {
        ReadOptions::default()
    };

    for path in &config.files {
        let version = file_version(path)?;
        let graph = match read_file_with(path, &options) {
            Ok(graph) => graph,
            Err(e) if is_unknown_content(&e) => {
                return Err(format!("{}: {e} (written by a newer version?)", path.display()).into());
            }
            Err(e) => return Err(e.into()),
        };
        print_summary(path, version, &graph);

        if config.validate {
            validate(&graph)?;
        }

        if let Some(out) = &config.convert {
            write_file_with(&graph, out, &WriteOptions::default())?;
            println!("Wrote {}", out.display());
        }

        if let Some(out) = &config.xdmf {
            // Dataset references point into the current layout, so legacy
            // inputs have to be converted first.
            let (target, target_version) = match &config.convert {
                Some(converted) => (converted, FileVersion::Current),
                None => (path, version),
            };
            if target_version != FileVersion::Current {
                return Err("--xdmf on a legacy file needs --convert".into());
            }
            let file_name = target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or("input path has no file name")?;
            write_xdmf(out, &graph, &file_name)?;
            println!("Wrote {}", out.display());
        }
    }

    Ok(())
}

fn print_summary(path: &std::path::Path, version: FileVersion, graph: &DataGraph) {
    println!("\x1b[1;36m=== {} ===\x1b[0m", path.display());
    println!("Version: {version}");
    println!("Entities: {}", graph.len());
    println!("Next id: {}", graph.next_id());
    println!();
    for (name, &id) in graph.top_level() {
        print_entity(graph, name, id, 0);
    }
    println!();
}

fn print_entity(graph: &DataGraph, name: &str, id: EntityId, depth: usize) {
    let Ok(entity) = graph.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let detail = match entity.payload() {
        Payload::Array(a) | Payload::Scalar(a) => {
            format!(" {:?} x {:?}{}", a.tuple_shape(), a.component_shape(), not_loaded(a.is_loaded()))
        }
        Payload::List(l) => format!(" {:?} rows{}", l.tuple_shape(), not_loaded(l.is_loaded())),
        Payload::Strings(s) => format!(" {} strings{}", s.len(), not_loaded(s.is_loaded())),
        Payload::AttributeTable(t) => format!(" {:?}", t.tuple_shape()),
        Payload::Geometry(_) | Payload::Group => String::new(),
    };
    let shared = if entity.parent_count() > 1 { " \x1b[33m(shared)\x1b[0m" } else { "" };
    println!(
        "{indent}\x1b[1m{name}\x1b[0m \x1b[2m{id} {}\x1b[0m{detail}{shared}",
        entity.kind().type_name()
    );
    for (child_name, &child) in entity.children() {
        print_entity(graph, child_name, child, depth + 1);
    }
}

fn not_loaded(loaded: bool) -> &'static str {
    if loaded { "" } else { " (not loaded)" }
}

fn validate(graph: &DataGraph) -> Result<(), Box<dyn std::error::Error>> {
    let mut failures = 0;
    for id in graph.geometries() {
        if let Err(e) = graph.validate_geometry(id) {
            failures += 1;
            eprintln!("\x1b[33mInvalid geometry {id}: {e}\x1b[0m");
        }
    }
    if failures > 0 {
        return Err(format!("{failures} geometries failed validation").into());
    }
    println!("All geometries valid");
    Ok(())
}

fn print_help() {
    println!(
        "\x1b[1mDatagraph\x1b[0m - Entity graph container inspector

\x1b[1mUSAGE:\x1b[0m
    datagraph [OPTIONS] [FILES...]

\x1b[1mARGUMENTS:\x1b[0m
    [FILES...]    Container files to inspect

\x1b[1mOPTIONS:\x1b[0m
    -h, --help           Print help information
    -V, --version        Print version information
    -p, --preflight      Read structure and shapes only
    -v, --verbose        Enable debug logging (RUST_LOG overrides)
    --validate           Check every geometry's references
    -o, --convert PATH   Write the graph in the current layout
    --xdmf PATH          Write an XDMF description of the geometries

\x1b[1mEXAMPLES:\x1b[0m
    datagraph scan.dgraph                    Print the entity tree
    datagraph -p big.dgraph                  Inspect without loading data
    datagraph old.dgraph -o new.dgraph       Upgrade a legacy file
    datagraph mesh.dgraph --xdmf mesh.xdmf   Describe geometries for viewers"
    );
}
