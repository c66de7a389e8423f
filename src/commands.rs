use crate::cli::Command;
use crate::error::Result;
use crate::proc::{run_cmd, run_shell};
use crate::router::locate_running_container;
use crate::state::{HostScope, StackState};
use bollard::container::LogOutput;
use bollard::errors::Error as DockerError;
use bollard::models::{Service, ServiceSpec};
use bollard::query_parameters::{
    InspectServiceOptions, LogsOptionsBuilder, UpdateServiceOptionsBuilder,
};
use futures_util::StreamExt;
use tracing::error;

/// Execute one verb against the selected environment and return the process
/// exit code.
pub async fn dispatch(state: &mut StackState, cmd: Command) -> Result<i32> {
    match cmd {
        Command::Ls => ls(state),
        Command::Logs { service, tail } => logs(state, &service, &tail).await,
        Command::Build { dry_run } => compose_passthrough(state, "build", dry_run).await,
        Command::Pull { dry_run } => compose_passthrough(state, "pull", dry_run).await,
        Command::Push { dry_run } => compose_passthrough(state, "push", dry_run).await,
        Command::Deploy { dry_run } => deploy(state, dry_run).await,
        Command::Config { dry_run } => compose_passthrough(state, "config", dry_run).await,
        Command::Bpd { dry_run } => bpd(state, dry_run).await,
        Command::Rm => rm(state).await,
        Command::Sh { service, cmd } => shell(state, &service, cmd.as_deref(), "sh").await,
        Command::Bash { service, cmd } => shell(state, &service, cmd.as_deref(), "bash").await,
        Command::Attach { service } => attach(state, &service).await,
        Command::Exec {
            tty,
            interactive,
            service,
            cmd,
            args,
        } => exec(state, tty, interactive, &service, &cmd, &args).await,
        Command::Ps => ps(state).await,
        Command::Env => print_env(state),
        Command::Run { dry_run, cmd } => run(state, dry_run, &cmd).await,
        Command::Ports { services } => ports(state, &services).await,
        Command::ForceUpdate { services } => force_update(state, &services).await,
    }
}

fn ls(state: &StackState) -> Result<i32> {
    println!("Available services:");
    for service in state.env.sorted_services() {
        println!("{service}");
    }
    Ok(0)
}

/// build/pull/push/config run against the base engine: images are built and
/// pushed from the operator's machine, not on the swarm.
async fn compose_passthrough(state: &StackState, verb: &str, dry_run: bool) -> Result<i32> {
    let env = state.command_env(HostScope::Base, true)?;
    let mut args = state.env.compose_file_args();
    args.push(verb.to_string());
    run_cmd(&state.compose_bin, &args, &env, dry_run).await
}

async fn deploy(state: &StackState, dry_run: bool) -> Result<i32> {
    let env = state.command_env(HostScope::Env, true)?;
    let mut args = vec!["stack".to_string(), "deploy".to_string()];
    args.extend(state.env.stack_file_args());
    args.push(state.env.stack_name.clone());
    args.push("--with-registry-auth".to_string());
    run_cmd(&state.docker_bin, &args, &env, dry_run).await
}

async fn bpd(state: &StackState, dry_run: bool) -> Result<i32> {
    let code = compose_passthrough(state, "build", dry_run).await?;
    if code != 0 {
        return Ok(code);
    }
    let code = compose_passthrough(state, "push", dry_run).await?;
    if code != 0 {
        return Ok(code);
    }
    deploy(state, dry_run).await
}

async fn logs(state: &mut StackState, service: &str, tail: &str) -> Result<i32> {
    let fqsn = state.env.full_service_name(service)?;
    let located = match locate_running_container(state, &fqsn).await? {
        Some(located) => located,
        None => {
            error!("No running container found");
            return Ok(1);
        }
    };

    let options = LogsOptionsBuilder::default()
        .follow(true)
        .stdout(true)
        .stderr(true)
        .tail(&normalize_tail(tail))
        .build();

    let mut stream = located.docker.logs(&located.container_id, Some(options));
    while let Some(chunk) = stream.next().await {
        match chunk? {
            LogOutput::StdOut { message }
            | LogOutput::StdErr { message }
            | LogOutput::Console { message } => {
                println!("{}", String::from_utf8_lossy(&message).trim_end());
            }
            LogOutput::StdIn { .. } => {}
        }
    }

    Ok(0)
}

/// Numeric tails are normalized; anything else ("all") passes through raw.
fn normalize_tail(tail: &str) -> String {
    match tail.trim().parse::<u64>() {
        Ok(count) => count.to_string(),
        Err(_) => tail.to_string(),
    }
}

async fn shell(
    state: &mut StackState,
    service: &str,
    cmd: Option<&str>,
    shell: &str,
) -> Result<i32> {
    let fqsn = state.env.full_service_name(service)?;
    let located = match locate_running_container(state, &fqsn).await? {
        Some(located) => located,
        None => {
            error!("No running container found");
            return Ok(1);
        }
    };

    println!("Attaching to '{}'", located.container_id);

    let mut args = vec![
        "exec".to_string(),
        "-ti".to_string(),
        located.container_id.clone(),
        shell.to_string(),
    ];
    if let Some(cmd) = cmd {
        args.push("-c".to_string());
        args.push(cmd.to_string());
    }

    let env = state.command_env(HostScope::Node(&located.target), false)?;
    run_cmd(&state.docker_bin, &args, &env, false).await
}

async fn attach(state: &mut StackState, service: &str) -> Result<i32> {
    let fqsn = state.env.full_service_name(service)?;
    let located = match locate_running_container(state, &fqsn).await? {
        Some(located) => located,
        None => {
            error!("No running container found");
            return Ok(1);
        }
    };

    println!("Attaching to '{}'", located.container_id);

    let args = vec!["attach".to_string(), located.container_id.clone()];
    let env = state.command_env(HostScope::Node(&located.target), false)?;
    run_cmd(&state.docker_bin, &args, &env, false).await
}

async fn exec(
    state: &mut StackState,
    tty: bool,
    interactive: bool,
    service: &str,
    cmd: &str,
    extra: &[String],
) -> Result<i32> {
    let fqsn = state.env.full_service_name(service)?;
    let located = match locate_running_container(state, &fqsn).await? {
        Some(located) => located,
        None => {
            error!("No running container found");
            return Ok(1);
        }
    };

    println!("Attaching to '{}'", located.container_id);

    let mut args = vec!["exec".to_string()];
    if tty {
        args.push("-t".to_string());
    }
    if interactive {
        args.push("-i".to_string());
    }
    args.push(located.container_id.clone());
    args.push(cmd.to_string());
    args.extend(extra.iter().cloned());

    let env = state.command_env(HostScope::Node(&located.target), false)?;
    run_cmd(&state.docker_bin, &args, &env, false).await
}

async fn ps(state: &StackState) -> Result<i32> {
    let env = state.command_env(HostScope::Env, false)?;
    let args = vec![
        "stack".to_string(),
        "ps".to_string(),
        state.env.stack_name.clone(),
    ];
    run_cmd(&state.docker_bin, &args, &env, false).await
}

fn print_env(state: &StackState) -> Result<i32> {
    let vars = state.command_env(HostScope::Base, true)?;
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort();
    for key in keys {
        println!("{}={}", key, vars[key]);
    }
    Ok(0)
}

async fn run(state: &StackState, dry_run: bool, cmd: &[String]) -> Result<i32> {
    let env = state.command_env(HostScope::Env, true)?;
    run_shell(&cmd.join(" "), &env, dry_run).await
}

async fn rm(state: &mut StackState) -> Result<i32> {
    let docker = state.env_docker()?;
    for service in state.env.sorted_services() {
        let fqsn = state.env.full_service_name(&service)?;
        let descriptor = docker
            .inspect_service(&fqsn, None::<InspectServiceOptions>)
            .await?;
        let id = descriptor.id.unwrap_or_default();
        println!("Removing {fqsn} - {id}");
        docker.delete_service(&fqsn).await?;
    }
    Ok(0)
}

async fn ports(state: &mut StackState, services: &[String]) -> Result<i32> {
    let names = if services.is_empty() {
        state.env.sorted_services()
    } else {
        services.to_vec()
    };

    let docker = state.env_docker()?;
    for service in &names {
        let fqsn = state.env.full_service_name(service)?;
        let descriptor = match docker
            .inspect_service(&fqsn, None::<InspectServiceOptions>)
            .await
        {
            Ok(descriptor) => descriptor,
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                error!("No service found");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        for line in service_port_lines(&fqsn, &descriptor) {
            println!("{line}");
        }
    }
    Ok(0)
}

/// Header plus one fixed-width row per published port. A service that
/// publishes nothing produces no output at all.
fn service_port_lines(fqsn: &str, service: &Service) -> Vec<String> {
    let ports = service
        .endpoint
        .as_ref()
        .and_then(|endpoint| endpoint.ports.as_deref())
        .unwrap_or_default();

    if ports.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![fqsn.to_string()];
    for port in ports {
        let protocol = port
            .protocol
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default();
        let published = port
            .published_port
            .map(|p| p.to_string())
            .unwrap_or_default();
        let target = port.target_port.map(|p| p.to_string()).unwrap_or_default();
        lines.push(format!("\t{protocol:>6}: {published:>6} -> {target:<6}"));
    }
    lines
}

async fn force_update(state: &mut StackState, services: &[String]) -> Result<i32> {
    let docker = state.env_docker()?;
    for service in services {
        let fqsn = state.env.full_service_name(service)?;
        let descriptor = match docker
            .inspect_service(&fqsn, None::<InspectServiceOptions>)
            .await
        {
            Ok(descriptor) => descriptor,
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                error!("No service found {fqsn}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let (version, spec) = force_update_spec(descriptor);
        let options = UpdateServiceOptionsBuilder::default().version(version).build();
        let response = docker.update_service(&fqsn, spec, options, None).await?;
        println!(
            "{}",
            serde_json::to_string(&response).map_err(anyhow::Error::from)?
        );
    }
    Ok(0)
}

/// Update payload for a rolling restart: the service's own spec with the
/// task template's force-update counter bumped, submitted at the version
/// the descriptor was read at.
fn force_update_spec(descriptor: Service) -> (i32, ServiceSpec) {
    let version = descriptor
        .version
        .as_ref()
        .and_then(|v| v.index)
        .unwrap_or_default() as i32;

    let mut spec = descriptor.spec.unwrap_or_default();
    let mut task_template = spec.task_template.unwrap_or_default();
    task_template.force_update = Some(task_template.force_update.unwrap_or_default() + 1);
    spec.task_template = Some(task_template);

    (version, spec)
}
