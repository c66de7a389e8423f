use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "swarmctl")]
#[command(version, about = "Operator CLI for multi-environment Docker swarm stacks", long_about = None)]
pub struct Cli {
    /// Environment to operate on
    #[arg(long, global = true, default_value = "dev")]
    pub env: String,

    /// Skip the production confirmation prompt
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Stack config file
    #[arg(long, global = true, default_value = "stack-config.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the services declared for the selected environment
    Ls,

    /// Follow the logs of a service's running container
    Logs {
        service: String,
        /// Number of trailing lines to start from
        #[arg(long, default_value = "100")]
        tail: String,
    },

    /// Build images via docker-compose
    Build {
        #[arg(long)]
        dry_run: bool,
    },

    /// Pull images via docker-compose
    Pull {
        #[arg(long)]
        dry_run: bool,
    },

    /// Push built images to the registry
    Push {
        #[arg(long)]
        dry_run: bool,
    },

    /// Deploy the stack to the environment's swarm
    Deploy {
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the resolved compose configuration
    Config {
        #[arg(long)]
        dry_run: bool,
    },

    /// Build, push and deploy, stopping at the first failure
    Bpd {
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every service of the stack
    Rm,

    /// Open an interactive sh session in a service's container
    Sh {
        service: String,
        /// Command to run instead of an interactive shell
        cmd: Option<String>,
    },

    /// Open an interactive bash session in a service's container
    Bash {
        service: String,
        /// Command to run instead of an interactive shell
        cmd: Option<String>,
    },

    /// Attach to the main process of a service's container
    Attach { service: String },

    /// Run a command inside a service's running container
    Exec {
        /// Allocate a pseudo-TTY
        #[arg(short = 't')]
        tty: bool,
        /// Keep stdin open
        #[arg(short = 'i')]
        interactive: bool,
        service: String,
        cmd: String,
        /// Extra arguments passed to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show task state for the whole stack
    Ps,

    /// Print the environment the subprocess layer would receive
    Env,

    /// Run a command with the environment's variables applied
    Run {
        /// Print the command instead of executing it
        #[arg(long)]
        dry_run: bool,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },

    /// Show published ports for services (all declared ones by default)
    Ports { services: Vec<String> },

    /// Force a rolling restart of services
    #[command(name = "force_update")]
    ForceUpdate { services: Vec<String> },
}
