use crate::error::{Error, Result};
use crate::prompt::Confirm;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One environment block of `stack-config.yml`, as written by the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub production: bool,
    #[serde(default)]
    pub docker_host: Option<String>,
    #[serde(default = "default_docker_user")]
    pub docker_user: String,
    #[serde(default)]
    pub stack_name: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub env_files: Vec<PathBuf>,
    #[serde(default)]
    pub compose_files: Vec<PathBuf>,
}

fn default_docker_user() -> String {
    "root".to_string()
}

/// Root config: `basename` plus the environment map. Loaded once, immutable
/// for the process lifetime. `root` is the directory the file was read from;
/// env-file and override paths resolve relative to it.
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    pub basename: String,
    pub environments: HashMap<String, EnvironmentSpec>,
    #[serde(skip)]
    pub root: PathBuf,
}

impl StackConfig {
    pub fn load(path: &Path) -> Result<StackConfig> {
        let raw = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg: StackConfig =
            serde_yaml::from_str(&raw).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(cfg)
    }
}

/// A selected deployment target. Never mutated after selection.
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub stack_name: String,
    pub production: bool,
    pub docker_host: Option<String>,
    pub docker_user: String,
    pub services: Vec<String>,
    pub env_files: Vec<PathBuf>,
    pub compose_files: Vec<PathBuf>,
}

impl Environment {
    fn resolve(cfg: &StackConfig, name: &str, spec: &EnvironmentSpec) -> Environment {
        let stack_name = spec
            .stack_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", cfg.basename, name));
        Environment {
            name: name.to_string(),
            stack_name,
            production: spec.production,
            docker_host: spec.docker_host.clone(),
            docker_user: spec.docker_user.clone(),
            services: spec.services.clone(),
            env_files: spec.env_files.iter().map(|p| cfg.root.join(p)).collect(),
            compose_files: spec.compose_files.iter().map(|p| cfg.root.join(p)).collect(),
        }
    }

    pub fn ensure_service(&self, service: &str) -> Result<()> {
        if self.services.iter().any(|s| s == service) {
            Ok(())
        } else {
            Err(Error::UnknownService(service.to_string()))
        }
    }

    /// Fully-qualified service name as registered with the orchestrator.
    /// Only valid for declared services.
    pub fn full_service_name(&self, service: &str) -> Result<String> {
        self.ensure_service(service)?;
        Ok(format!("{}_{}", self.stack_name, service))
    }

    pub fn sorted_services(&self) -> Vec<String> {
        let mut names = self.services.clone();
        names.sort();
        names
    }

    /// `-f <file>` pairs for docker-compose invocations.
    pub fn compose_file_args(&self) -> Vec<String> {
        self.file_args("-f")
    }

    /// `-c <file>` pairs for `docker stack deploy`.
    pub fn stack_file_args(&self) -> Vec<String> {
        self.file_args("-c")
    }

    fn file_args(&self, flag: &str) -> Vec<String> {
        let mut args = Vec::new();
        for file in &self.compose_files {
            args.push(flag.to_string());
            args.push(file.to_string_lossy().into_owned());
        }
        args
    }

    /// Variables exported into every child environment the subprocess layer
    /// composes. This is a documented contract: compose files reference
    /// STACK_NAME and STACK_ENV.
    pub fn exports(&self) -> [(String, String); 2] {
        [
            ("STACK_NAME".to_string(), self.stack_name.clone()),
            ("STACK_ENV".to_string(), self.name.clone()),
        ]
    }
}

/// Resolve `name` against the config. Production environments ask the
/// confirm collaborator first unless `assume_yes` suppresses the prompt.
pub fn select_environment(
    cfg: &StackConfig,
    name: &str,
    assume_yes: bool,
    confirm: &mut dyn Confirm,
) -> Result<Environment> {
    let spec = cfg
        .environments
        .get(name)
        .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))?;
    let env = Environment::resolve(cfg, name, spec);

    if env.production && !assume_yes {
        let confirmed = confirm.confirm("You are going to run on a PRODUCTION swarm. Confirm?")?;
        if !confirmed {
            return Err(Error::Aborted);
        }
    }

    Ok(env)
}

pub fn resolve_docker_bin() -> String {
    std::env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".to_string())
}

pub fn resolve_compose_bin() -> String {
    std::env::var("COMPOSE_BIN").unwrap_or_else(|_| "docker-compose".to_string())
}
