//! Typed arguments for URL downloads (`curl`).

use crate::command_runner::CommandArgs;
use std::path::PathBuf;

/// `curl --fail --location --continue-at - --output <dest> <url>`
///
/// Resumes partial files left by an earlier attempt.
#[derive(Debug, Clone)]
pub struct FetchUrlArgs {
    pub url: String,
    pub destination: PathBuf,
}

impl CommandArgs for FetchUrlArgs {
    fn program(&self) -> &'static str {
        "curl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--fail".to_string(),
            "--location".to_string(),
            "--silent".to_string(),
            "--show-error".to_string(),
            "--continue-at".to_string(),
            "-".to_string(),
            "--output".to_string(),
            self.destination.display().to_string(),
            self.url.clone(),
        ]
    }
}
