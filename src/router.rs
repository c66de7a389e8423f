use crate::docker::NodeTarget;
use crate::error::Result;
use crate::state::StackState;
use bollard::models::{Node, Task, TaskState};
use bollard::query_parameters::{InspectContainerOptions, ListTasksOptionsBuilder};
use bollard::Docker;
use std::collections::HashMap;
use tracing::warn;

/// A service instance resolved to the node hosting it.
pub struct Located {
    pub container_id: String,
    pub target: NodeTarget,
    pub docker: Docker,
}

/// Find the single running container for `fqsn` and connect to the node it
/// is scheduled on. `Ok(None)` means nothing to act on right now (service
/// scaled to zero, or the task is mid-transition); callers report that and
/// stop the current command, it is not an error.
///
/// Exec, attach and log streaming must go through the node's own engine,
/// not the manager endpoint, which is why the resolved connection is scoped
/// to the node.
pub async fn locate_running_container(
    state: &mut StackState,
    fqsn: &str,
) -> Result<Option<Located>> {
    let env_docker = state.env_docker()?;

    let mut filters = HashMap::new();
    filters.insert("name".to_string(), vec![fqsn.to_string()]);
    filters.insert("desired-state".to_string(), vec!["running".to_string()]);
    let options = ListTasksOptionsBuilder::default().filters(&filters).build();
    let tasks = env_docker.list_tasks(Some(options)).await?;

    let (container_id, node_id) = match pick_running_task(&tasks, fqsn) {
        Some(picked) => picked,
        None => return Ok(None),
    };

    let node = env_docker.inspect_node(&node_id).await?;
    let target = match target_for_node(&node, &state.local_hostname, &state.env.docker_user) {
        Some(target) => target,
        None => {
            warn!("Node {node_id} has no reachable address");
            return Ok(None);
        }
    };

    let docker = state.pool.get(&target)?;

    // Inspect through the node-scoped connection: confirms the container is
    // actually visible on the engine we routed to.
    docker
        .inspect_container(&container_id, None::<InspectContainerOptions>)
        .await?;

    Ok(Some(Located {
        container_id,
        target,
        docker,
    }))
}

/// First task in the returned ordering wins; replicas beyond the first are
/// deliberately not considered. The task must be live: a task object caught
/// mid-transition carries a container ID that is not usable yet.
pub fn pick_running_task(tasks: &[Task], fqsn: &str) -> Option<(String, String)> {
    let task = match tasks.first() {
        Some(task) => task,
        None => {
            warn!("No running task found for {fqsn}");
            return None;
        }
    };

    let status = task.status.as_ref();
    if status.and_then(|s| s.state.as_ref()) != Some(&TaskState::RUNNING) {
        warn!("Task not running");
        return None;
    }

    let container_id = status
        .and_then(|s| s.container_status.as_ref())
        .and_then(|c| c.container_id.clone());
    match (container_id, task.node_id.clone()) {
        (Some(container_id), Some(node_id)) => Some((container_id, node_id)),
        _ => {
            warn!("Task has no usable container yet");
            None
        }
    }
}

/// IP the node is actually reachable at. Manager nodes self-report the
/// unspecified address; their manager-status address carries the real IP
/// plus the swarm port.
pub fn node_reachable_ip(node: &Node) -> Option<String> {
    let status_addr = node.status.as_ref().and_then(|s| s.addr.as_deref());
    match status_addr {
        Some("0.0.0.0") | None => node
            .manager_status
            .as_ref()
            .and_then(|m| m.addr.as_deref())
            .map(strip_port),
        Some(addr) => Some(addr.to_string()),
    }
}

fn strip_port(addr: &str) -> String {
    match addr.rsplit_once(':') {
        Some((host, _port)) => host.to_string(),
        None => addr.to_string(),
    }
}

/// Local when the node is this machine, SSH towards its resolved IP
/// otherwise. `None` when the node has no usable address at all.
pub fn target_for_node(node: &Node, local_hostname: &str, docker_user: &str) -> Option<NodeTarget> {
    let hostname = node
        .description
        .as_ref()
        .and_then(|d| d.hostname.as_deref());
    if hostname == Some(local_hostname) {
        return Some(NodeTarget::Local);
    }

    let ip = node_reachable_ip(node)?;
    Some(NodeTarget::ssh(docker_user, &ip))
}
