//! Interactive confirmation prompts.
//!
//! These are the run's only cancellation points: once a stage has started
//! nothing asks again.

use crate::error::Result;
use std::io::{self, BufRead, Write};

/// Asks the operator a question and returns the typed answer.
pub trait Confirmer {
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Reads answers from stdin, prompting on stderr.
#[derive(Debug, Default)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "{} ", prompt)?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Answers every question with the same text (`--yes`).
#[derive(Debug, Clone)]
pub struct FixedAnswer(pub String);

impl Confirmer for FixedAnswer {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        tracing::debug!("Auto-answering '{}' with '{}'", prompt, self.0);
        Ok(self.0.clone())
    }
}

/// Yes/no question. Anything other than y/yes counts as no.
pub fn confirm_yes_no(confirmer: &mut dyn Confirmer, prompt: &str) -> Result<bool> {
    let answer = confirmer.ask(&format!("{} [y/N]", prompt))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// The operator must type `expected` exactly.
pub fn confirm_exact(confirmer: &mut dyn Confirmer, prompt: &str, expected: &str) -> Result<bool> {
    let answer = confirmer.ask(prompt)?;
    Ok(answer == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<&'static str>);

    impl Confirmer for Scripted {
        fn ask(&mut self, _prompt: &str) -> Result<String> {
            Ok(self.0.pop_front().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_yes_no() {
        let mut c = Scripted(VecDeque::from(["y", "YES", "", "nope"]));
        assert!(confirm_yes_no(&mut c, "go?").unwrap());
        assert!(confirm_yes_no(&mut c, "go?").unwrap());
        assert!(!confirm_yes_no(&mut c, "go?").unwrap());
        assert!(!confirm_yes_no(&mut c, "go?").unwrap());
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let mut c = Scripted(VecDeque::from(["ERASE", "erase", " ERASE"]));
        assert!(confirm_exact(&mut c, "type ERASE", "ERASE").unwrap());
        assert!(!confirm_exact(&mut c, "type ERASE", "ERASE").unwrap());
        assert!(!confirm_exact(&mut c, "type ERASE", "ERASE").unwrap());
    }

    #[test]
    fn test_fixed_answer() {
        let mut c = FixedAnswer("y".to_string());
        assert!(confirm_yes_no(&mut c, "proceed?").unwrap());
    }
}
