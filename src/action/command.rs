//! Custom actions backed by external commands.
//!
//! A definition file `sign-request.action.yaml`:
//!
//! ```yaml
//! command: python3 sign.py --mode strict
//! timeoutMs: 5000
//! ```
//!
//! registers the action `sign_request`. The command runs in the definition
//! file's directory, receives `{"config": ..., "context": ...}` on stdin and
//! its stdout becomes the action's value (JSON when parseable, else text).

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Action, ActionContext, ActionRegistry, ActionSource};
use crate::{Error, Result};

/// Suffix marking an action definition file (before the extension).
const ACTION_SUFFIX: &str = ".action";

/// Recognised definition file extensions.
const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

const fn default_timeout_ms() -> u64 {
    30_000
}

/// On-disk definition of a command action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandActionDefinition {
    /// Command line, split with shell-word rules
    pub command: String,

    /// Kill the command after this many milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

/// Derive the registered name from a definition path.
///
/// `actions/Sign-Request.action.yaml` -> `sign_request`. Returns `None` for
/// files without a recognised extension.
#[must_use]
pub fn action_name_from_path(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?.to_ascii_lowercase();
    let (stem, extension) = file_name.rsplit_once('.')?;
    if !EXTENSIONS.contains(&extension) {
        return None;
    }
    let stem = stem.strip_suffix(ACTION_SUFFIX).unwrap_or(stem);
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace('-', "_"))
}

/// Action that runs an external program.
#[derive(Debug)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandAction {
    /// Build from a definition; `working_dir` is where the command runs.
    pub fn from_definition(
        definition: &CommandActionDefinition,
        working_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut words = shlex::split(&definition.command)
            .ok_or_else(|| Error::Config(format!("Unparseable command: {}", definition.command)))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| Error::Config("Action command is empty".to_string()))?;

        Ok(Self {
            program,
            args: words.collect(),
            working_dir,
            timeout: Duration::from_millis(definition.timeout_ms),
        })
    }

    /// Read a definition file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read action file '{}': {e}", path.display()))
        })?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let definition: CommandActionDefinition = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Invalid action file '{}': {e}", path.display()))
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("Invalid action file '{}': {e}", path.display()))
            })?
        };
        Self::from_definition(&definition, path.parent().map(Path::to_path_buf))
    }
}

#[async_trait]
impl Action for CommandAction {
    async fn invoke(&self, config: &Value, context: &ActionContext) -> Result<Value> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.working_dir.as_ref().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::InvalidInput(format!("failed to start '{}': {e}", self.program)))?;

        let payload = serde_json::to_vec(&json!({
            "config": config,
            "context": context.to_value(),
        }))?;

        // Feed stdin while collecting output; a program that never reads
        // stdin may exit before the payload is written.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&payload).await {
                    Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };
        let run = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                Error::InvalidInput(format!(
                    "'{}' timed out after {}ms",
                    self.program,
                    self.timeout.as_millis()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::InvalidInput(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim().chars().take(500).collect::<String>()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        debug!(program = %self.program, bytes = output.stdout.len(), "Command action finished");
        Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
    }
}

fn is_definition_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_ascii_lowercase().contains(ACTION_SUFFIX))
        && action_name_from_path(path).is_some()
}

/// Register custom actions from files or directories.
///
/// Directories are scanned (non-recursively) for `*.action.{json,yaml,yml}`;
/// explicitly named files are loaded regardless of the `.action` suffix.
/// Returns the number of actions registered.
pub fn load_custom_actions(registry: &mut ActionRegistry, paths: &[PathBuf]) -> Result<usize> {
    let mut count = 0;

    for path in paths {
        let files: Vec<PathBuf> = if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| {
                    Error::Config(format!("Failed to read actions directory '{}': {e}", path.display()))
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_definition_file(p))
                .collect();
            entries.sort();
            entries
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            return Err(Error::Config(format!("Action path not found: {}", path.display())));
        };

        for file in files {
            let name = action_name_from_path(&file).ok_or_else(|| {
                Error::Config(format!("Cannot derive an action name from '{}'", file.display()))
            })?;
            let action = CommandAction::load(&file)?;
            let source = ActionSource::File(std::fs::canonicalize(&file).unwrap_or(file));
            registry.register(name.clone(), source.clone(), Arc::new(action))?;
            info!(action = %name, source = %source, "Loaded custom action");
            count += 1;
        }
    }

    Ok(count)
}
