use crate::error::Result;
use colored::Colorize;
use std::collections::HashMap;
use tokio::process::Command;

/// Run a program with an explicit environment, inheriting the terminal.
/// Returns the child's exit code verbatim.
pub async fn run_cmd(
    program: &str,
    args: &[String],
    env: &HashMap<String, String>,
    dry_run: bool,
) -> Result<i32> {
    if dry_run {
        println!("{} {}", "dry-run:".yellow().bold(), render(program, args));
        return Ok(0);
    }

    let status = Command::new(program)
        .args(args)
        .env_clear()
        .envs(env)
        .status()
        .await?;
    Ok(status.code().unwrap_or(if status.success() { 0 } else { 1 }))
}

/// Run a free-form command line through the shell.
pub async fn run_shell(cmdline: &str, env: &HashMap<String, String>, dry_run: bool) -> Result<i32> {
    if dry_run {
        println!("{} {}", "dry-run:".yellow().bold(), cmdline);
        return Ok(0);
    }

    let status = shell_command(cmdline).env_clear().envs(env).status().await?;
    Ok(status.code().unwrap_or(if status.success() { 0 } else { 1 }))
}

#[cfg(unix)]
fn shell_command(cmdline: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-lc").arg(cmdline);
    cmd
}

#[cfg(not(unix))]
fn shell_command(cmdline: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(cmdline);
    cmd
}

fn render(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        if arg.contains(' ') {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_env() -> HashMap<String, String> {
        std::env::vars().collect()
    }

    #[test]
    fn render_quotes_args_with_spaces() {
        let args = vec!["exec".to_string(), "echo hello".to_string()];
        assert_eq!(render("docker", &args), "docker exec 'echo hello'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_codes_propagate_verbatim() {
        let args = vec!["-c".to_string(), "exit 7".to_string()];
        let code = run_cmd("sh", &args, &plain_env(), false).await.unwrap();
        assert_eq!(code, 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_runner_propagates_exit_codes() {
        let code = run_shell("exit 3", &plain_env(), false).await.unwrap();
        assert_eq!(code, 3);

        let code = run_shell("true", &plain_env(), false).await.unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn dry_run_never_executes() {
        let code = run_cmd("definitely-not-a-binary", &[], &plain_env(), true)
            .await
            .unwrap();
        assert_eq!(code, 0);

        let code = run_shell("definitely-not-a-binary", &plain_env(), true)
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn children_see_the_composed_environment_only() {
        let mut env = plain_env();
        env.insert("SWARMCTL_PROC_TEST".to_string(), "visible".to_string());
        let args = vec![
            "-c".to_string(),
            "test \"$SWARMCTL_PROC_TEST\" = visible".to_string(),
        ];
        let code = run_cmd("sh", &args, &env, false).await.unwrap();
        assert_eq!(code, 0);
    }
}
