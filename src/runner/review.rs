//! Non-blocking code-review pass over a freshly opened PR.

use std::time::Duration;

use crate::runner::executor::{ExecuteResult, Executor, ExecutorError};
use crate::runner::shutdown::ShutdownToken;

/// Runs a second agent invocation with a review-oriented prompt. Review
/// outcomes are reported but never fail the card.
pub struct Reviewer {
    executor: Executor,
}

impl Reviewer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            executor: Executor::new().command(command, args),
        }
    }

    pub async fn review(
        &self,
        pr_url: &str,
        timeout: Duration,
        cancel: ShutdownToken,
    ) -> Result<ExecuteResult, ExecutorError> {
        self.executor
            .run(&review_prompt(pr_url), Some(timeout), cancel)
            .await
    }
}

pub fn review_prompt(pr_url: &str) -> String {
    format!(
        r#"You are a code reviewer. Review the pull request at: {pr_url}

Steps:
1. Run "gh pr diff" to see the full diff of the PR
2. Analyze the changes for:
   - Bugs or logic errors
   - Security vulnerabilities
   - Performance issues
   - Code style and readability
   - Missing error handling
   - Test coverage gaps
3. Post your review using "gh pr review" with appropriate comments

If the changes look good, approve the PR:
  gh pr review --approve --body "your summary"

If there are issues, request changes:
  gh pr review --request-changes --body "your summary"

Be concise and actionable in your feedback. Focus on substantive issues, not style nitpicks."#
    )
}
