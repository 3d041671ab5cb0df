use clap::{Args, Parser, Subcommand};
use env_logger::Env;

use kdtool::client::BlockingClient;
use kdtool::config::{ClientConfig, ConnectionOptions, DEFAULT_NAMESPACE};
use kdtool::error::{describe, Error};
use kdtool::kubectl::{ApplyAction, Kubectl};
use kdtool::manifest::{self, DeployOptions, Environment};
use kdtool::shell::{self, ShellOptions};
use kdtool::status;
use kdtool::undeploy::{self, UndeployOptions};

use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "kdtool", version, about = "Kubernetes deployment tool")]
struct Cli {
    /// kubectl binary to use
    #[arg(short = 'K', long, value_name = "PATH", global = true)]
    kubectl: Option<PathBuf>,

    /// Kubernetes namespace to work in
    #[arg(short = 'n', long, default_value = DEFAULT_NAMESPACE, global = true)]
    namespace: String,

    /// Kubernetes API server URL
    #[arg(short = 'S', long, value_name = "URL", global = true)]
    server: Option<String>,

    /// Kubernetes authentication token
    #[arg(short = 'T', long, global = true)]
    token: Option<String>,

    /// Kubernetes CA certificate file
    #[arg(short = 'C', long, value_name = "PATH", global = true)]
    ca_certificate: Option<String>,

    /// kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Take the cluster configuration from GitLab CI's environment
    #[arg(short = 'G', long, global = true)]
    gitlab: bool,

    /// Give up on api requests that take longer than this
    #[arg(long, value_name = "SECONDS", global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the status of a deployment and everything attached to it
    Status {
        /// deployment name
        name: String,
    },
    /// Delete a deployment, and optionally its attached resources
    Undeploy {
        /// don't ask for confirmation
        #[arg(short = 'f', long)]
        force: bool,
        /// also delete attached resources
        #[arg(short = 'A', long)]
        all: bool,
        /// deployment name
        name: String,
    },
    /// Deploy an application
    Deploy(DeployArgs),
    /// Start an interactive shell in a copy of the application's container
    Shell {
        /// command to run instead of a shell
        #[arg(short = 'c', long, value_name = "COMMAND")]
        command: Option<String>,
        /// image to run instead of the application's
        #[arg(short = 'i', long)]
        image: Option<String>,
        /// deployment name
        name: String,
    },
    /// Run a command in a copy of the application's container
    Exec {
        /// image to run instead of the application's
        #[arg(short = 'i', long)]
        image: Option<String>,
        /// deployment name
        name: String,
        /// command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[derive(Args)]
struct DeployArgs {
    /// Hostname to route to the application (may be repeated)
    #[arg(short = 'H', long = "hostname", value_name = "HOSTNAME")]
    hostnames: Vec<String>,

    /// Issue TLS certificates for the hostnames with ACME
    #[arg(short = 'A', long)]
    acme: bool,

    /// Deploy a hand-written manifest instead of generating one
    #[arg(short = 'M', long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    #[arg(short = 'r', long, default_value_t = 1)]
    replicas: i32,

    #[arg(short = 'P', long, default_value = "IfNotPresent", value_parser = ["IfNotPresent", "Always"])]
    image_pull_policy: String,

    /// Environment variable to set in the container (may be repeated)
    #[arg(short = 'e', long = "env", value_name = "VARNAME=VALUE", value_parser = manifest::parse_key_value)]
    env: Vec<(String, String)>,

    /// Secret environment variable to set in the container (may be repeated)
    #[arg(short = 's', long = "secret", value_name = "VARNAME=VALUE", value_parser = manifest::parse_key_value)]
    secrets: Vec<(String, String)>,

    /// Persistent volume to mount in the container (may be repeated)
    #[arg(short = 'v', long = "volume", value_name = "PATH")]
    volumes: Vec<String>,

    /// Port the application listens on
    #[arg(short = 'p', long, default_value_t = 80)]
    port: i32,

    /// Print the manifest as JSON instead of applying it
    #[arg(short = 'j', long)]
    json: bool,

    /// Delete everything in the manifest instead of applying it
    #[arg(short = 'U', long)]
    undeploy: bool,

    /// Ask kubectl not to change anything
    #[arg(long)]
    dry_run: bool,

    /// Attach a PostgreSQL server of this version
    #[arg(long, value_name = "VERSION")]
    postgres: Option<String>,

    /// Attach a Redis cache with this much memory
    #[arg(long, value_name = "SIZE")]
    redis_cache: Option<String>,

    /// Attach a database provisioned by the database controller
    #[arg(long, value_name = "TYPE")]
    database: Option<String>,

    #[arg(long, default_value = "64M")]
    memory_request: String,

    #[arg(long, default_value = "128M")]
    memory_limit: String,

    #[arg(long, default_value_t = 0.1)]
    cpu_request: f64,

    #[arg(long, default_value_t = 1.0)]
    cpu_limit: f64,

    /// image to deploy
    image: String,

    /// deployment name
    name: String,
}

impl DeployArgs {
    fn deploy_options(&self, namespace: &str) -> DeployOptions {
        let mut options = DeployOptions::new(self.image.as_str(), self.name.as_str(), namespace);
        options.replicas = self.replicas;
        options.image_pull_policy = self.image_pull_policy.clone();
        options.env = self.env.clone();
        options.secrets = self.secrets.clone();
        options.volumes = self.volumes.clone();
        options.hostnames = self.hostnames.clone();
        options.acme = self.acme;
        options.port = self.port;
        options.postgres = self.postgres.clone();
        options.redis_cache = self.redis_cache.clone();
        options.database = self.database.clone();
        options.memory_request = self.memory_request.clone();
        options.memory_limit = self.memory_limit.clone();
        options.cpu_request = self.cpu_request;
        options.cpu_limit = self.cpu_limit;
        options
    }

    /// Variables available to a hand-written manifest: the process environment, then the
    /// deployment's own settings, then anything given with `-e`
    fn template_environment(&self, namespace: &str) -> Environment {
        let mut env: Environment = std::env::vars().collect();
        env.insert("IMAGE".to_owned(), self.image.clone());
        env.insert("NAME".to_owned(), self.name.clone());
        env.insert("NAMESPACE".to_owned(), namespace.to_owned());
        env.extend(self.env.iter().cloned());
        env
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", describe(&*err));
            1
        }
    };
    process::exit(code);
}

fn connection_options(cli: &Cli) -> Result<ConnectionOptions, Error> {
    let mut options = ConnectionOptions {
        namespace: cli.namespace.clone(),
        server: cli.server.clone(),
        token: cli.token.clone(),
        ca_certificate: cli.ca_certificate.clone(),
        context: cli.context.clone(),
        kubectl: cli.kubectl.clone(),
        timeout: cli.timeout.map(Duration::from_secs),
        ignore_kubeconfig_env: false,
    };
    if cli.gitlab {
        options.apply_gitlab_environment(|name| std::env::var(name).ok())?;
    }
    Ok(options)
}

fn connect(options: &ConnectionOptions) -> Result<BlockingClient, Error> {
    let client = BlockingClient::new(ClientConfig::resolve(options))
        .map_err(|e| io::Error::new(e.kind(), format!("cannot create api client: {}", e)))?;
    Ok(client)
}

fn run(cli: Cli) -> Result<i32, Error> {
    let options = connection_options(&cli)?;
    let namespace = options.namespace.as_str();

    match &cli.command {
        Commands::Status { name } => {
            let client = connect(&options)?;
            let stdout = io::stdout();
            let stderr = io::stderr();
            let code = status::run(&client, namespace, name, &mut stdout.lock(), &mut stderr.lock())?;
            Ok(code)
        }
        Commands::Undeploy { force, all, name } => {
            let client = connect(&options)?;
            let undeploy_options = UndeployOptions {
                force: *force,
                all: *all,
            };
            let stdin = io::stdin();
            let stdout = io::stdout();
            undeploy::run(
                &client,
                namespace,
                name,
                undeploy_options,
                stdin.lock(),
                &mut stdout.lock(),
            )?;
            Ok(0)
        }
        Commands::Deploy(args) => {
            let manifest = match args.manifest.as_ref() {
                Some(path) => {
                    let env = args.template_environment(namespace);
                    manifest::manifest_list(manifest::load_manifest_file(path, &env)?)
                }
                None => manifest::build_manifest(&args.deploy_options(namespace))?,
            };
            if args.json {
                println!("{}", kdtool::serde_json::to_string_pretty(&manifest)?);
                return Ok(0);
            }
            let action = if args.undeploy {
                ApplyAction::Delete
            } else {
                ApplyAction::Apply
            };
            let kubectl = Kubectl::locate(&options)?;
            Ok(kubectl.apply_manifest(&manifest, action, args.dry_run)?)
        }
        Commands::Shell {
            command,
            image,
            name,
        } => {
            let shell_options = ShellOptions {
                image: image.clone(),
                command: command
                    .as_ref()
                    .map(|c| c.split(' ').filter(|s| !s.is_empty()).map(str::to_owned).collect()),
                tty: true,
            };
            run_shell(&options, name, &shell_options)
        }
        Commands::Exec {
            image,
            name,
            command,
        } => {
            let shell_options = ShellOptions {
                image: image.clone(),
                command: Some(command.clone()),
                tty: false,
            };
            run_shell(&options, name, &shell_options)
        }
    }
}

fn run_shell(options: &ConnectionOptions, name: &str, shell_options: &ShellOptions) -> Result<i32, Error> {
    let kubectl = Kubectl::locate(options)?;
    let client = connect(options)?;
    let code = shell::run(&client, &kubectl, options.namespace.as_str(), name, shell_options)?;
    Ok(code)
}
