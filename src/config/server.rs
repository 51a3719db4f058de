use super::defaults::DEFAULT_SERVER_NAME;
use super::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// How to launch the MCP tool server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            workdir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct RawServer {
    name: Option<String>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    workdir: Option<String>,
}

impl TryFrom<RawServer> for ServerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawServer) -> Result<Self, Self::Error> {
        let name = raw.name.unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());
        let command = raw
            .command
            .filter(|command| !command.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCommand {
                server: name.clone(),
            })?;

        Ok(Self {
            name,
            command: PathBuf::from(expand(&command)),
            args: raw.args.iter().map(|arg| expand(arg)).collect(),
            env: raw.env,
            workdir: raw.workdir.map(|dir| PathBuf::from(expand(&dir))),
        })
    }
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
