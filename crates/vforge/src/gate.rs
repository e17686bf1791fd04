//! Interactive pause point after failed attempts

use async_trait::async_trait;
use coordination::{FailureCheckpoint, InterventionDecision, InterventionGate};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// Map an operator reply onto a decision; anything unrecognized proceeds
pub fn parse_decision(reply: &str) -> InterventionDecision {
    match reply.trim().to_ascii_lowercase().as_str() {
        "r" | "reload" => InterventionDecision::Reload,
        "q" | "quit" | "abort" => InterventionDecision::Abort,
        _ => InterventionDecision::Proceed,
    }
}

/// Asks the operator, one line per failure
pub struct LineGate<R> {
    input: Mutex<R>,
}

pub type StdinGate = LineGate<BufReader<Stdin>>;

impl StdinGate {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> LineGate<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> InterventionGate for LineGate<R> {
    async fn on_failure(&self, checkpoint: FailureCheckpoint<'_>) -> InterventionDecision {
        match checkpoint.working_copy {
            Some(copy) => eprintln!(
                "\nAttempt {} of {} failed. Edit {} or {} if you like.\n\
                 [Enter] let the agent repair, [r] reload edited files, [q] abort: ",
                checkpoint.attempt + 1,
                checkpoint.unit,
                copy.design_path().display(),
                copy.test_path().display()
            ),
            None => eprintln!(
                "\nAttempt {} of {} failed. [Enter] let the agent repair, [q] abort: ",
                checkpoint.attempt + 1,
                checkpoint.unit
            ),
        }

        let mut reply = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut reply).await {
            // EOF: nobody is at the terminal
            Ok(0) => InterventionDecision::Proceed,
            Ok(_) => parse_decision(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read operator input; proceeding");
                InterventionDecision::Proceed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::Verdict;

    #[test]
    fn test_parse_decision() {
        assert_eq!(parse_decision("\n"), InterventionDecision::Proceed);
        assert_eq!(parse_decision("R\n"), InterventionDecision::Reload);
        assert_eq!(parse_decision(" q "), InterventionDecision::Abort);
        assert_eq!(parse_decision("whatever"), InterventionDecision::Proceed);
    }

    #[tokio::test]
    async fn test_reads_one_line_per_failure() {
        let gate = LineGate::new(&b"r\nq\n"[..]);
        let verdict = Verdict::testbench_failure("FAIL");
        let checkpoint = FailureCheckpoint {
            unit: "alu",
            attempt: 0,
            verdict: &verdict,
            working_copy: None,
        };
        assert_eq!(gate.on_failure(checkpoint).await, InterventionDecision::Reload);
        assert_eq!(gate.on_failure(checkpoint).await, InterventionDecision::Abort);
        // Input exhausted
        assert_eq!(gate.on_failure(checkpoint).await, InterventionDecision::Proceed);
    }
}
