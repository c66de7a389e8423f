use crate::error::{Error, Result};
use bollard::{Docker, API_DEFAULT_VERSION};
use std::collections::HashMap;

/// Connection setup timeout, seconds. Established calls never time out.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Routing key for a control connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeTarget {
    /// Engine on this machine, default local socket.
    Local,
    /// Engine reachable at an explicit URI (ssh://, tcp://, http://, unix://).
    Remote(String),
}

impl NodeTarget {
    pub fn from_uri(uri: Option<&str>) -> NodeTarget {
        match uri {
            Some(uri) if !uri.is_empty() => NodeTarget::Remote(uri.to_string()),
            _ => NodeTarget::Local,
        }
    }

    pub fn ssh(user: &str, ip: &str) -> NodeTarget {
        NodeTarget::Remote(format!("ssh://{user}@{ip}"))
    }

    /// DOCKER_HOST value for subprocesses aimed at this target, if any.
    pub fn uri(&self) -> Option<&str> {
        match self {
            NodeTarget::Local => None,
            NodeTarget::Remote(uri) => Some(uri),
        }
    }
}

type Connector = Box<dyn Fn(&NodeTarget) -> Result<Docker> + Send>;

/// Process-lifetime cache of control connections, one per target. Entries
/// are never evicted. Bollard handles share their transport when cloned, so
/// handing out clones of a cached handle reuses the same connection.
pub struct DockerPool {
    connector: Connector,
    clients: HashMap<NodeTarget, Docker>,
}

impl DockerPool {
    pub fn new() -> DockerPool {
        DockerPool::with_connector(Box::new(connect))
    }

    /// The connector is injectable so tests can count constructions without
    /// a reachable engine.
    pub fn with_connector(connector: Connector) -> DockerPool {
        DockerPool {
            connector,
            clients: HashMap::new(),
        }
    }

    pub fn get(&mut self, target: &NodeTarget) -> Result<Docker> {
        if let Some(docker) = self.clients.get(target) {
            return Ok(docker.clone());
        }
        let docker = (self.connector)(target)?;
        self.clients.insert(target.clone(), docker.clone());
        Ok(docker)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.clients.len()
    }
}

fn connect(target: &NodeTarget) -> Result<Docker> {
    match target {
        NodeTarget::Local => Ok(Docker::connect_with_local_defaults()?),
        NodeTarget::Remote(uri) => connect_uri(uri),
    }
}

fn connect_uri(uri: &str) -> Result<Docker> {
    let docker = if uri.starts_with("ssh://") {
        // Key material comes from the agent, same as the docker CLI over ssh.
        Docker::connect_with_ssh(uri, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION, None)?
    } else if uri.starts_with("tcp://") || uri.starts_with("http://") {
        Docker::connect_with_http(uri, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
    } else if uri.starts_with("unix://") {
        Docker::connect_with_socket(uri, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
    } else {
        return Err(Error::UnsupportedHost(uri.to_string()));
    };
    Ok(docker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // HTTP handles do no I/O at construction, so the counter is exact even
    // with no engine anywhere near the test run.
    fn counting_pool(counter: Arc<AtomicUsize>) -> DockerPool {
        DockerPool::with_connector(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Docker::connect_with_http(
                "http://127.0.0.1:2375",
                1,
                API_DEFAULT_VERSION,
            )?)
        }))
    }

    #[test]
    fn one_connection_per_target() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = counting_pool(counter.clone());
        let target = NodeTarget::ssh("root", "10.0.0.7");

        pool.get(&target).unwrap();
        pool.get(&target).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn distinct_targets_get_distinct_connections() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = counting_pool(counter.clone());

        pool.get(&NodeTarget::Local).unwrap();
        pool.get(&NodeTarget::ssh("root", "10.0.0.7")).unwrap();
        pool.get(&NodeTarget::ssh("root", "10.0.0.8")).unwrap();
        pool.get(&NodeTarget::Local).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn ssh_targets_compose_user_and_ip() {
        let target = NodeTarget::ssh("deploy", "10.0.0.5");
        assert_eq!(target.uri(), Some("ssh://deploy@10.0.0.5"));
    }

    #[test]
    fn from_uri_maps_empty_to_local() {
        assert_eq!(NodeTarget::from_uri(None), NodeTarget::Local);
        assert_eq!(NodeTarget::from_uri(Some("")), NodeTarget::Local);
        assert_eq!(
            NodeTarget::from_uri(Some("tcp://10.0.0.2:2375")),
            NodeTarget::Remote("tcp://10.0.0.2:2375".to_string())
        );
        assert_eq!(NodeTarget::Local.uri(), None);
    }

    #[test]
    fn http_targets_construct_without_dialing() {
        connect_uri("tcp://10.0.0.2:2375").unwrap();
        connect_uri("http://10.0.0.2:2375").unwrap();
    }

    #[test]
    fn unknown_schemes_are_rejected() {
        let err = connect_uri("ftp://10.0.0.2").unwrap_err();
        assert!(matches!(err, Error::UnsupportedHost(_)));
    }
}
