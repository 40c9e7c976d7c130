use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;
use gdcl::config::Config;
use gdcl::dcl::{LifecycleDirective, Reconciler, Resource, ResourceSchema};
use gdcl::error::DclError;
use gdcl::gcp::auth::GcpCredentials;
use gdcl::gcp::client::{GcpClient, COMPUTE_ENDPOINT};
use gdcl::gcp::http::format_gcp_error;
use gdcl::resource::{get_all_resource_keys, get_resource, RestApi};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declarative client for GCP compute resources
#[derive(Parser, Debug)]
#[command(name = "gdcl", version, about, long_about = None)]
struct Args {
    /// GCP project to use when a manifest does not name one
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Location (region or `global`) to use when a manifest does not name one
    #[arg(short, long, global = true)]
    location: Option<String>,

    /// API base URL override
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Converge a resource to the manifest
    Apply {
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        lifecycle: LifecycleArgs,
    },
    /// Show the operations an apply would run
    Plan {
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        lifecycle: LifecycleArgs,
    },
    /// Fetch the resource named by the manifest
    Get {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete the resource named by the manifest
    Delete {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List every resource of a kind under a parent
    List {
        kind: String,
        /// Parent field, e.g. `--parent project=my-project`
        #[arg(long = "parent", value_parser = parse_key_val)]
        parent: Vec<(String, String)>,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Delete every resource of a kind under a parent
    DeleteAll {
        kind: String,
        #[arg(long = "parent", value_parser = parse_key_val)]
        parent: Vec<(String, String)>,
        /// Only delete resources whose name starts with this prefix
        #[arg(long)]
        name_prefix: Option<String>,
    },
    /// List supported resource kinds
    Kinds,
    /// Show the configuration, saving any of --project, --location, --endpoint given
    Config,
}

#[derive(ClapArgs, Debug, Default)]
struct LifecycleArgs {
    /// Fail instead of creating a missing resource
    #[arg(long)]
    block_creation: bool,
    /// Fail if the resource already exists
    #[arg(long)]
    block_acquire: bool,
    /// Fail instead of modifying an existing resource
    #[arg(long)]
    block_modification: bool,
}

impl LifecycleArgs {
    fn directives(&self) -> Vec<LifecycleDirective> {
        let mut out = Vec::new();
        if self.block_creation {
            out.push(LifecycleDirective::BlockCreation);
        }
        if self.block_acquire {
            out.push(LifecycleDirective::BlockAcquire);
        }
        if self.block_modification {
            out.push(LifecycleDirective::BlockModification);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

/// Manifest file: `kind` plus the desired fields under `spec`
#[derive(Debug, Deserialize)]
struct Manifest {
    kind: String,
    #[serde(default)]
    spec: serde_json::Value,
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gdcl {} started with log level: {:?}", gdcl::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gdcl").join("gdcl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gdcl").join("gdcl.log");
    }
    PathBuf::from("gdcl.log")
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got `{}`", s)),
    }
}

fn print_output(format: OutputFormat, value: &impl Serialize) -> Result<()> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn schema_for(kind: &str) -> Result<&'static ResourceSchema> {
    match get_resource(kind) {
        Some(def) => Ok(&def.schema),
        None => Err(DclError::UnknownKind(kind.to_string()).into()),
    }
}

/// Fill `project` and `location` from flags or config where the schema
/// has them and the resource leaves them unset
fn fill_scope(schema: &ResourceSchema, resource: &mut Resource, config: &Config) {
    if schema.field("project").is_some() && resource.get("project").is_none() {
        if let Some(project) = config.effective_project() {
            resource.set("project", project);
        }
    }
    if schema.field("location").is_some() && resource.get("location").is_none() {
        resource.set("location", config.effective_location());
    }
}

fn load_manifest(path: &Path, config: &Config) -> Result<(&'static ResourceSchema, Resource)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {:?}", path))?;
    let manifest: Manifest = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse manifest {:?}", path))?;
    if !manifest.spec.is_object() {
        bail!("manifest {:?}: `spec` must be a mapping", path);
    }

    let schema = schema_for(&manifest.kind)?;
    let mut resource = schema.decode(&manifest.spec);
    fill_scope(schema, &mut resource, config);
    Ok((schema, resource))
}

fn parent_resource(
    schema: &ResourceSchema,
    pairs: &[(String, String)],
    config: &Config,
) -> Resource {
    let map = pairs
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    let mut parent = schema.decode(&serde_json::Value::Object(map));
    fill_scope(schema, &mut parent, config);
    parent
}

async fn reconciler(
    schema: &ResourceSchema,
    config: &Config,
) -> Result<Reconciler<RestApi>> {
    let credentials = match std::env::var("GDCL_ACCESS_TOKEN") {
        Ok(token) => GcpCredentials::fixed(token),
        Err(_) => GcpCredentials::new().await?,
    };
    let endpoint = config.endpoint.as_deref().unwrap_or(COMPUTE_ENDPOINT);
    let client = GcpClient::with_credentials(credentials, endpoint)?;
    let api = RestApi::new(client, config.reconcile.operation_poll());
    Ok(Reconciler::new(api, schema.clone(), config.reconcile.clone()))
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();
    if args.project.is_some() {
        config.project_id = args.project.clone();
    }
    if args.location.is_some() {
        config.location = args.location.clone();
    }
    if args.endpoint.is_some() {
        config.endpoint = args.endpoint.clone();
    }

    match args.command {
        Command::Apply { file, lifecycle } => {
            let (schema, desired) = load_manifest(&file, &config)?;
            let reconciler = reconciler(schema, &config).await?;
            let state = reconciler.apply(&desired, &lifecycle.directives()).await?;
            print_output(args.output, &state.to_json())
        }
        Command::Plan { file, lifecycle } => {
            let (schema, desired) = load_manifest(&file, &config)?;
            let reconciler = reconciler(schema, &config).await?;
            let plan = reconciler.plan(&desired, &lifecycle.directives()).await?;
            print_output(args.output, &plan)
        }
        Command::Get { file } => {
            let (schema, desired) = load_manifest(&file, &config)?;
            let reconciler = reconciler(schema, &config).await?;
            let state = reconciler.get(&desired).await?;
            print_output(args.output, &state.to_json())
        }
        Command::Delete { file } => {
            let (schema, desired) = load_manifest(&file, &config)?;
            let reconciler = reconciler(schema, &config).await?;
            reconciler.delete(&desired).await?;
            eprintln!("Deleted {}", schema.describe(&desired));
            Ok(())
        }
        Command::List {
            kind,
            parent,
            page_size,
        } => {
            let schema = schema_for(&kind)?;
            if let Some(size) = page_size {
                config.reconcile.page_size = size;
            }
            let parent = parent_resource(schema, &parent, &config);
            let reconciler = reconciler(schema, &config).await?;
            let items: Vec<serde_json::Value> = reconciler
                .stream(&parent)
                .map_ok(|r| r.to_json())
                .try_collect()
                .await?;
            print_output(args.output, &items)
        }
        Command::DeleteAll {
            kind,
            parent,
            name_prefix,
        } => {
            let schema = schema_for(&kind)?;
            let parent = parent_resource(schema, &parent, &config);
            let reconciler = reconciler(schema, &config).await?;
            reconciler
                .delete_all(&parent, |r| match &name_prefix {
                    Some(prefix) => r.get_str("name").is_some_and(|n| n.starts_with(prefix)),
                    None => true,
                })
                .await?;
            Ok(())
        }
        Command::Kinds => {
            for kind in get_all_resource_keys() {
                if let Some(def) = get_resource(kind) {
                    println!("{:<28} {}", kind, def.display_name);
                }
            }
            Ok(())
        }
        Command::Config => {
            if args.project.is_some() || args.location.is_some() || args.endpoint.is_some() {
                config.save()?;
            }
            print_output(args.output, &config)
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        match err.downcast_ref::<DclError>() {
            Some(dcl) => eprintln!("Error: {}", format_gcp_error(dcl)),
            None => eprintln!("Error: {err:#}"),
        }
        tracing::error!("{:?}", err);
        std::process::exit(1);
    }
}
