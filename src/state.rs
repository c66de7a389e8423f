use crate::config::{resolve_compose_bin, resolve_docker_bin, Environment};
use crate::docker::{DockerPool, NodeTarget};
use crate::env::load_env_files;
use crate::error::Result;
use bollard::Docker;
use std::collections::HashMap;

/// Which DOCKER_HOST a child process or API call sees.
#[derive(Debug, Clone, Copy)]
pub enum HostScope<'a> {
    /// The value captured at startup; build/push/config talk to the engine
    /// the operator's shell was pointed at.
    Base,
    /// The environment's configured override (or the local default when the
    /// environment declares none).
    Env,
    /// A specific node resolved by the router.
    Node(&'a NodeTarget),
}

/// Execution context threaded through every command. Owns the endpoint
/// cache and the values that used to live in ambient process globals.
pub struct StackState {
    pub env: Environment,
    pub base_docker_host: Option<String>,
    pub docker_bin: String,
    pub compose_bin: String,
    pub local_hostname: String,
    pub pool: DockerPool,
}

impl StackState {
    pub fn new(env: Environment) -> StackState {
        StackState {
            env,
            base_docker_host: std::env::var("DOCKER_HOST").ok(),
            docker_bin: resolve_docker_bin(),
            compose_bin: resolve_compose_bin(),
            local_hostname: local_hostname(),
            pool: DockerPool::new(),
        }
    }

    pub fn env_target(&self) -> NodeTarget {
        NodeTarget::from_uri(self.env.docker_host.as_deref())
    }

    /// Connection to the environment's manager endpoint.
    pub fn env_docker(&mut self) -> Result<Docker> {
        let target = self.env_target();
        self.pool.get(&target)
    }

    /// Compose the full environment for a child process: the process env,
    /// then declared env files (existing keys win), then the stack exports,
    /// with DOCKER_HOST forced to the scope's value last.
    pub fn command_env(
        &self,
        scope: HostScope<'_>,
        with_env_files: bool,
    ) -> Result<HashMap<String, String>> {
        let mut vars: HashMap<String, String> = std::env::vars().collect();

        if with_env_files {
            for (key, value) in load_env_files(&self.env.env_files)? {
                vars.entry(key).or_insert(value);
            }
        }

        for (key, value) in self.env.exports() {
            vars.insert(key, value);
        }

        let host = match scope {
            HostScope::Base => self.base_docker_host.clone(),
            HostScope::Env => self.env.docker_host.clone(),
            HostScope::Node(target) => target.uri().map(str::to_string),
        };
        match host {
            Some(host) => {
                vars.insert("DOCKER_HOST".to_string(), host);
            }
            None => {
                vars.remove("DOCKER_HOST");
            }
        }

        Ok(vars)
    }
}

fn local_hostname() -> String {
    #[cfg(unix)]
    {
        nix::unistd::gethostname()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_default()
    }
    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").unwrap_or_default()
    }
}
