//! Confirmation callback used before destructive operations

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;

/// Asks the operator whether a destructive step may proceed
#[async_trait]
pub trait Confirmation: Send + Sync {
    /// Returns `true` to proceed
    async fn confirm(&self, prompt: &str) -> bool;
}

#[async_trait]
impl<F> Confirmation for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Prompts on stdout and waits for a line on stdin.
///
/// An empty line or one starting with `y` confirms. Anything else, or a
/// closed stdin, declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmation;

impl StdinConfirmation {
    fn accepts(answer: &str) -> bool {
        let answer = answer.trim();
        answer.is_empty() || answer.to_ascii_lowercase().starts_with('y')
    }

    async fn print_prompt(prompt: &str) -> std::io::Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await
    }
}

#[async_trait]
impl Confirmation for StdinConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        if let Err(e) = Self::print_prompt(prompt).await {
            error!("Failed to write confirmation prompt: {e}");
            return false;
        }

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(0) => false,
            Ok(_) => Self::accepts(&line),
            Err(e) => {
                error!("Failed to read confirmation: {e}");
                false
            }
        }
    }
}
