//! A provider over one in-memory submodel, driven by [`Command`]s.

use crate::command::Command;
use crate::config::CliConfig;
use crate::demo;
use aas_vab_core::{MemoryStore, VabResult};
use aas_vab_provider::SubmodelProvider;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Render the outcome of one command as a report line.
pub fn report(command: &str, outcome: VabResult<Value>) -> Value {
    match outcome {
        Ok(result) => json!({"command": command, "result": result}),
        Err(err) => json!({
            "command": command,
            "error": err.kind(),
            "message": err.message(),
        }),
    }
}

/// Provider session.
pub struct Session {
    provider: SubmodelProvider,
}

impl Session {
    /// Serve `store` on the current runtime.
    pub fn new(store: Arc<MemoryStore>, config: &CliConfig) -> Self {
        Self {
            provider: SubmodelProvider::with_config(store, Handle::current(), &config.provider),
        }
    }

    /// Serve the configured submodel file, or the demo submodel.
    ///
    /// # Errors
    ///
    /// Returns error if the submodel cannot be loaded.
    pub fn open(config: &CliConfig) -> Result<Self> {
        let store = match config.load_submodel()? {
            Some(submodel) => {
                MemoryStore::with_submodel(&submodel).context("Failed to load submodel")?
            }
            None => demo::store()?,
        };
        Ok(Self::new(Arc::new(store), config))
    }

    /// The provider serving this session.
    pub fn provider(&self) -> &SubmodelProvider {
        &self.provider
    }

    /// Execute one command.
    ///
    /// Verbs without a result yield `null`.
    pub async fn execute(&self, command: &Command) -> VabResult<Value> {
        match command {
            Command::Read(path) => self.provider.read(path),
            Command::Write(path, value) => {
                self.provider.write(path, value.clone()).map(|()| Value::Null)
            }
            Command::Create(path, element) => {
                self.provider.create(path, element.clone()).map(|()| Value::Null)
            }
            Command::Delete(path) => self.provider.delete(path).map(|()| Value::Null),
            Command::Invoke(path, args) => self.provider.invoke(path, args)?.into_value(),
            Command::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Value::Null)
            }
        }
    }

    /// Execute a script, writing one report line per command to `out`.
    ///
    /// Returns the number of commands that failed.
    ///
    /// # Errors
    ///
    /// Returns error on a line that does not parse, or if `out` fails.
    pub async fn run_script(&self, script: &str, out: &mut impl Write) -> Result<usize> {
        let mut failures = 0;
        for (number, line) in script.lines().enumerate() {
            let Some(command) =
                Command::parse_line(line).with_context(|| format!("Line {}", number + 1))?
            else {
                continue;
            };
            let outcome = self.execute(&command).await;
            if outcome.is_err() {
                failures += 1;
            }
            writeln!(out, "{}", report(line.trim(), outcome))?;
        }
        tracing::debug!(failures, "Script finished");
        Ok(failures)
    }
}
