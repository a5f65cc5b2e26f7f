// Safety acknowledgment gate.
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::config::{SafetyConfig, SafetyPolicy};
use crate::errors::{ScreenLoopError, ScreenLoopResult};
use crate::planner::types::{ActionDescriptor, PendingAction, SafetyCheck};

/// Decides which pending safety checks are acknowledged before an action runs.
///
/// The returned checks are echoed verbatim in the next request. Returning
/// `SafetyViolation` stops the session before the action executes.
#[async_trait]
pub trait SafetyGate: Send + Sync {
    async fn acknowledge(&self, pending: &PendingAction) -> ScreenLoopResult<Vec<SafetyCheck>>;
}

/// Acknowledges every check without asking anyone.
pub struct AutoAcknowledge;

#[async_trait]
impl SafetyGate for AutoAcknowledge {
    async fn acknowledge(&self, pending: &PendingAction) -> ScreenLoopResult<Vec<SafetyCheck>> {
        if !pending.pending_safety_checks.is_empty() {
            tracing::info!(
                call_id = %pending.call_id,
                count = pending.pending_safety_checks.len(),
                "auto-acknowledging safety checks"
            );
        }
        Ok(pending.pending_safety_checks.clone())
    }
}

/// A human (or stand-in) who rules on a single check.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(
        &self,
        check: &SafetyCheck,
        action: &ActionDescriptor,
    ) -> ScreenLoopResult<bool>;
}

/// Routes selected checks to an `Approver`; the rest are auto-acknowledged.
pub struct PromptGate<A> {
    approver: A,
    /// Check codes needing a decision. Empty means all of them.
    require_approval_for: Vec<String>,
}

impl<A: Approver> PromptGate<A> {
    pub fn new(approver: A, require_approval_for: Vec<String>) -> Self {
        Self { approver, require_approval_for }
    }

    fn needs_approval(&self, check: &SafetyCheck) -> bool {
        if self.require_approval_for.is_empty() {
            return true;
        }
        check
            .code
            .as_ref()
            .is_some_and(|code| self.require_approval_for.iter().any(|r| r == code))
    }
}

#[async_trait]
impl<A: Approver> SafetyGate for PromptGate<A> {
    async fn acknowledge(&self, pending: &PendingAction) -> ScreenLoopResult<Vec<SafetyCheck>> {
        let mut acknowledged = Vec::with_capacity(pending.pending_safety_checks.len());
        for check in &pending.pending_safety_checks {
            if self.needs_approval(check) {
                tracing::info!(
                    call_id = %pending.call_id,
                    check = %check.id,
                    "asking for approval"
                );
                if !self.approver.approve(check, &pending.action).await? {
                    tracing::warn!(
                        check = %check.id,
                        reason = %check.reason(),
                        "safety check rejected"
                    );
                    return Err(ScreenLoopError::SafetyViolation(format!(
                        "{} ({})",
                        check.id,
                        check.reason()
                    )));
                }
            } else {
                tracing::info!(check = %check.id, "auto-acknowledged (not in approval list)");
            }
            acknowledged.push(check.clone());
        }
        Ok(acknowledged)
    }
}

/// Asks on the terminal: the check goes to stderr, the answer is read from `input`.
///
/// One reader is kept for the whole session so buffered answers carry over
/// from one check to the next.
pub struct ConsoleApprover<R = BufReader<Stdin>> {
    input: Mutex<R>,
}

impl ConsoleApprover {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ConsoleApprover<R> {
    pub fn from_reader(input: R) -> Self {
        Self { input: Mutex::new(input) }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Approver for ConsoleApprover<R> {
    async fn approve(
        &self,
        check: &SafetyCheck,
        action: &ActionDescriptor,
    ) -> ScreenLoopResult<bool> {
        eprintln!(
            "\nSafety check {}: {}\n  pending action: {}\nProceed? [y/N] ",
            check.id,
            check.reason(),
            action.to_value()
        );
        let mut line = String::new();
        self.input.lock().await.read_line(&mut line).await?;
        Ok(is_affirmative(&line))
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn gate_from_config(cfg: &SafetyConfig) -> Box<dyn SafetyGate> {
    match cfg.policy {
        SafetyPolicy::Auto => Box::new(AutoAcknowledge),
        SafetyPolicy::Prompt => Box::new(PromptGate::new(
            ConsoleApprover::stdin(),
            cfg.require_approval_for.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{checks, pending};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        answer: bool,
        asked: AtomicUsize,
    }

    impl Fixed {
        fn new(answer: bool) -> Self {
            Self { answer, asked: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Approver for Fixed {
        async fn approve(
            &self,
            _check: &SafetyCheck,
            _action: &ActionDescriptor,
        ) -> ScreenLoopResult<bool> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    fn with_checks(n: usize) -> PendingAction {
        let mut p = pending("call_1", ActionDescriptor::Wait);
        p.pending_safety_checks = checks(n);
        p
    }

    #[tokio::test]
    async fn auto_gate_returns_every_check() {
        for n in [0, 1, 3] {
            let acked = AutoAcknowledge.acknowledge(&with_checks(n)).await.unwrap();
            assert_eq!(acked, checks(n));
        }
    }

    #[tokio::test]
    async fn prompt_gate_asks_for_each_check_when_list_is_empty() {
        let gate = PromptGate::new(Fixed::new(true), vec![]);
        let acked = gate.acknowledge(&with_checks(3)).await.unwrap();
        assert_eq!(acked.len(), 3);
        assert_eq!(gate.approver.asked.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn prompt_gate_only_asks_about_listed_codes() {
        let gate = PromptGate::new(Fixed::new(false), vec!["sensitive_domain".into()]);
        let acked = gate.acknowledge(&with_checks(2)).await.unwrap();
        assert_eq!(acked, checks(2));
        assert_eq!(gate.approver.asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejection_is_a_safety_violation() {
        let gate = PromptGate::new(Fixed::new(false), vec![]);
        let err = gate.acknowledge(&with_checks(1)).await.unwrap_err();
        assert!(matches!(err, ScreenLoopError::SafetyViolation(_)));
    }

    #[tokio::test]
    async fn console_answers_pasted_together_apply_to_successive_checks() {
        let approver = ConsoleApprover::from_reader(BufReader::new(&b"y\nyes\nn\n"[..]));
        let all = checks(3);
        let mut answers = Vec::new();
        for check in &all {
            answers.push(approver.approve(check, &ActionDescriptor::Wait).await.unwrap());
        }
        assert_eq!(answers, vec![true, true, false]);
        // End of input counts as a refusal.
        assert!(!approver.approve(&all[0], &ActionDescriptor::Wait).await.unwrap());
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("nope"));
    }
}
