//! abcstore - inspect scene archives.
//!
//! Every command takes one or more files; several files are read as
//! layers, the first being the base.
//!
//! ```bash
//! abcstore info scene.abc
//! abcstore tree base.abc fix.abc
//! abcstore props scene.abc --path /world/mesh
//! abcstore hash scene.abc --path /world
//! abcstore dump scene.abc --json > scene.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use abcstore::abc::{IArchive, IObject, IProperty, ReadOptions};
use abcstore::core::{PodArray, Sample, TimeSampling, TimeSamplingType};
use abcstore::geom::SchemaView;
use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "ABCSTORE_LOG";

#[derive(Parser, Debug)]
#[command(name = "abcstore")]
#[command(about = "Inspect layered scene archives")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Input {
    /// Archive files; more than one is a layered read
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Read through buffered IO instead of mapping the files
    #[arg(long)]
    no_mmap: bool,

    /// Skip the instance source check on open
    #[arg(long)]
    no_validate: bool,
}

impl Input {
    fn open(&self) -> anyhow::Result<IArchive> {
        let options = ReadOptions::new()
            .with_mmap(!self.no_mmap)
            .with_validate_instances(!self.no_validate);
        IArchive::open_layers_with(&self.files, options)
            .with_context(|| format!("failed to open {}", display_files(&self.files)))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive info, time samplings and layers
    Info(Input),
    /// Object hierarchy with schemas and instances
    Tree(Input),
    /// Property tree of one object
    Props {
        #[command(flatten)]
        input: Input,
        /// Full path of the object
        #[arg(short, long)]
        path: String,
    },
    /// Properties and children hashes
    Hash {
        #[command(flatten)]
        input: Input,
        /// Object to hash, the top object by default
        #[arg(short, long)]
        path: Option<String>,
        /// Also hash every descendant
        #[arg(short, long)]
        recursive: bool,
    },
    /// Everything, every sample
    Dump {
        #[command(flatten)]
        input: Input,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Info(input) => cmd_info(&input.open()?),
        Command::Tree(input) => cmd_tree(&input.open()?),
        Command::Props { input, path } => cmd_props(&input.open()?, &path),
        Command::Hash { input, path, recursive } => {
            cmd_hash(&input.open()?, path.as_deref().unwrap_or("/"), recursive)
        }
        Command::Dump { input, json } => {
            let archive = input.open()?;
            if json {
                let value = dump_json(&archive)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            } else {
                dump_text(&archive.top(), 0)
            }
        }
    }
}

fn display_files(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn find(archive: &IArchive, path: &str) -> anyhow::Result<IObject> {
    let object = archive.find_object(path)?;
    if !object.valid() {
        bail!("no object at {path}");
    }
    Ok(object)
}

fn describe_sampling(ts: &TimeSampling) -> String {
    match ts.sampling_type() {
        TimeSamplingType::Uniform { time_per_cycle, start_time } => {
            format!("uniform start={start_time} step={time_per_cycle}")
        }
        TimeSamplingType::Cyclic { time_per_cycle, times } => {
            format!("cyclic period={time_per_cycle} times={times:?}")
        }
        TimeSamplingType::Acyclic { times } => format!("acyclic {} times", times.len()),
    }
}

// ============================================================================
// info / tree / props / hash
// ============================================================================

fn cmd_info(archive: &IArchive) -> anyhow::Result<()> {
    let info = archive.archive_info();
    println!("Layers:          {}", archive.layer_count());
    for (path, layer) in archive.layer_paths().iter().zip(archive.layer_infos()) {
        println!("  {} ({})", path.display(), layer.app_name);
    }
    println!("Application:     {}", info.app_name);
    println!("Library version: {}", info.library_version);
    println!("Written:         {}", info.when_written);
    if !info.user_description.is_empty() {
        println!("Description:     {}", info.user_description);
    }
    println!("Format version:  {}", archive.format_version());
    println!("Digests:         {}", archive.has_digests());
    println!("Time samplings:  {}", archive.num_time_samplings());
    for (i, ts) in archive.time_samplings().enumerate() {
        let max = archive.max_num_samples_for_time_sampling_index(i).unwrap_or(0);
        println!("  [{i}] {} (max {max} samples)", describe_sampling(ts));
    }

    let mut objects = 0usize;
    let mut instances = 0usize;
    let mut stack = vec![archive.top()];
    while let Some(obj) = stack.pop() {
        objects += 1;
        if obj.is_instance_root() {
            instances += 1;
        }
        stack.extend(obj.children()?);
    }
    println!("Objects:         {objects} ({instances} instance roots)");
    Ok(())
}

fn cmd_tree(archive: &IArchive) -> anyhow::Result<()> {
    fn walk(obj: &IObject, depth: usize) -> anyhow::Result<()> {
        let indent = "  ".repeat(depth);
        let name = if obj.name().is_empty() { "/" } else { obj.name() };
        let mut line = format!("{indent}{name}");
        if let Some(view) = SchemaView::of(obj) {
            line.push_str(&format!(" [{view}]"));
        } else if let Some(schema) = obj.schema() {
            line.push_str(&format!(" [{schema}]"));
        }
        if let Some(source) = obj.instance_source_path() {
            line.push_str(&format!(" -> {source}"));
        }
        println!("{line}");
        for child in obj.children()? {
            walk(&child, depth + 1)?;
        }
        Ok(())
    }
    walk(&archive.top(), 0)
}

fn cmd_props(archive: &IArchive, path: &str) -> anyhow::Result<()> {
    fn walk(prop: &IProperty, depth: usize) -> anyhow::Result<()> {
        let indent = "  ".repeat(depth);
        match prop {
            IProperty::Compound(c) => {
                println!("{indent}{}/", c.name());
                for child in c.properties()? {
                    walk(&child, depth + 1)?;
                }
            }
            IProperty::Scalar(p) => println!(
                "{indent}{} scalar {} samples={} ts={}",
                p.name(),
                p.data_type(),
                p.num_samples(),
                p.time_sampling_index()
            ),
            IProperty::Array(p) => println!(
                "{indent}{} array {} samples={} ts={}",
                p.name(),
                p.data_type(),
                p.num_samples(),
                p.time_sampling_index()
            ),
        }
        Ok(())
    }
    let object = find(archive, path)?;
    println!("{}", object.full_name());
    for prop in object.properties()?.properties()? {
        walk(&prop, 1)?;
    }
    Ok(())
}

fn cmd_hash(archive: &IArchive, path: &str, recursive: bool) -> anyhow::Result<()> {
    fn print(obj: &IObject, recursive: bool) -> anyhow::Result<()> {
        let show = |d: Option<abcstore::core::Digest>| d.map_or_else(|| "-".to_string(), |d| d.to_hex());
        println!(
            "{}  props={}  children={}",
            obj.full_name(),
            show(obj.properties_hash()?),
            show(obj.children_hash()?)
        );
        if recursive {
            for child in obj.children()? {
                print(&child, recursive)?;
            }
        }
        Ok(())
    }
    if !archive.has_digests() {
        eprintln!("note: at least one layer records no digests");
    }
    print(&find(archive, path)?, recursive)
}

// ============================================================================
// dump
// ============================================================================

fn values_json(values: &PodArray) -> Value {
    match values {
        PodArray::Boolean(v) => json!(v),
        PodArray::Uint8(v) => json!(v),
        PodArray::Int8(v) => json!(v),
        PodArray::Uint16(v) => json!(v),
        PodArray::Int16(v) => json!(v),
        PodArray::Uint32(v) => json!(v),
        PodArray::Int32(v) => json!(v),
        PodArray::Uint64(v) => json!(v),
        PodArray::Int64(v) => json!(v),
        PodArray::Float16(v) => json!(v.iter().map(|h| h.to_f32()).collect::<Vec<_>>()),
        PodArray::Float32(v) => json!(v),
        PodArray::Float64(v) => json!(v),
        PodArray::String(v) | PodArray::Wstring(v) => json!(v),
    }
}

fn samples_json(samples: impl Iterator<Item = abcstore::Result<std::sync::Arc<Sample>>>) -> anyhow::Result<Value> {
    let mut out = Vec::new();
    for sample in samples {
        out.push(values_json(sample?.values()));
    }
    Ok(Value::Array(out))
}

fn property_json(prop: &IProperty) -> anyhow::Result<Value> {
    Ok(match prop {
        IProperty::Compound(c) => {
            let children = c
                .properties()?
                .iter()
                .map(property_json)
                .collect::<anyhow::Result<Vec<_>>>()?;
            json!({
                "name": c.name(),
                "kind": "compound",
                "metadata": c.meta_data().serialize(),
                "properties": children,
            })
        }
        IProperty::Scalar(p) => json!({
            "name": p.name(),
            "kind": "scalar",
            "dataType": p.data_type().to_string(),
            "metadata": p.meta_data().serialize(),
            "timeSampling": p.time_sampling_index(),
            "samples": samples_json(p.samples())?,
        }),
        IProperty::Array(p) => json!({
            "name": p.name(),
            "kind": "array",
            "dataType": p.data_type().to_string(),
            "metadata": p.meta_data().serialize(),
            "timeSampling": p.time_sampling_index(),
            "samples": samples_json(p.samples())?,
        }),
    })
}

fn object_json(obj: &IObject) -> anyhow::Result<Value> {
    let properties = obj
        .properties()?
        .properties()?
        .iter()
        .map(property_json)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let children = obj
        .children()?
        .iter()
        .map(object_json)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut value = json!({
        "name": obj.name(),
        "fullName": obj.full_name(),
        "metadata": obj.meta_data().serialize(),
        "properties": properties,
        "children": children,
    });
    if let Some(source) = obj.instance_source_path() {
        value["instanceSource"] = json!(source);
    }
    Ok(value)
}

fn dump_json(archive: &IArchive) -> anyhow::Result<Value> {
    let info = archive.archive_info();
    let samplings: Vec<Value> = archive
        .time_samplings()
        .enumerate()
        .map(|(i, ts)| {
            json!({
                "index": i,
                "sampling": describe_sampling(ts),
                "maxSamples": archive.max_num_samples_for_time_sampling_index(i),
            })
        })
        .collect();
    Ok(json!({
        "layers": archive.layer_paths().iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        "appName": info.app_name,
        "libraryVersion": info.library_version,
        "whenWritten": info.when_written,
        "userDescription": info.user_description,
        "timeSamplings": samplings,
        "top": object_json(&archive.top())?,
    }))
}

fn dump_text(obj: &IObject, depth: usize) -> anyhow::Result<()> {
    fn props(prop: &IProperty, depth: usize) -> anyhow::Result<()> {
        let indent = "  ".repeat(depth);
        match prop {
            IProperty::Compound(c) => {
                println!("{indent}.{}", c.name());
                for child in c.properties()? {
                    props(&child, depth + 1)?;
                }
            }
            IProperty::Scalar(p) => {
                for (i, s) in p.samples().enumerate() {
                    println!("{indent}{}[{i}] = {}", p.name(), values_json(s?.values()));
                }
            }
            IProperty::Array(p) => {
                for (i, s) in p.samples().enumerate() {
                    println!("{indent}{}[{i}] = {}", p.name(), values_json(s?.values()));
                }
            }
        }
        Ok(())
    }
    let indent = "  ".repeat(depth);
    println!("{indent}{} {{{}}}", obj.full_name(), obj.meta_data().serialize());
    for prop in obj.properties()?.properties()? {
        props(&prop, depth + 1)?;
    }
    for child in obj.children()? {
        dump_text(&child, depth + 1)?;
    }
    Ok(())
}
