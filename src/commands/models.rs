//! Typed arguments for the local model registry client (`ollama`).

use crate::command_runner::CommandArgs;

/// `ollama pull <model>`
#[derive(Debug, Clone)]
pub struct PullModelArgs {
    pub model: String,
}

impl CommandArgs for PullModelArgs {
    fn program(&self) -> &'static str {
        "ollama"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["pull".to_string(), self.model.clone()]
    }
}

/// `ollama list`, read-only; used to confirm a pull.
#[derive(Debug, Clone, Default)]
pub struct ListModelsArgs;

impl CommandArgs for ListModelsArgs {
    fn program(&self) -> &'static str {
        "ollama"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["list".to_string()]
    }

    fn is_destructive(&self) -> bool {
        false
    }
}

/// Does `ollama list` output contain `model`?
///
/// The first column is `name:tag`; a bare name matches the `latest` tag.
pub fn listing_contains(listing: &str, model: &str) -> bool {
    let wanted = if model.contains(':') {
        model.to_string()
    } else {
        format!("{}:latest", model)
    };
    listing
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name == wanted)
}
