//! The reasoning-service boundary.
//!
//! When a stage fails, the remediation engine asks an [`Advisor`] for a
//! corrective script. The reply is an ordered sequence of [`ReplyItem`]s:
//! tool invocations the service made while thinking (journaled, skipped)
//! and textual messages, the first of which carries the script.

mod openai;

pub use openai::OpenAiAdvisor;

use crate::errors::RemedyError;
use async_trait::async_trait;

/// One item of an advisor reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyItem {
    /// An auxiliary tool the service invoked (e.g. a web search).
    /// Not actionable here; recorded for the journal.
    ToolInvocation {
        /// Tool kind, e.g. `web_search_call`.
        kind: String,
        /// Service-assigned invocation id.
        id: String,
        /// Invocation status as reported by the service.
        status: String,
    },
    /// A textual message. The first one in a reply supplies the script.
    Message {
        /// Message text, used verbatim as the remediation script.
        text: String,
    },
}

/// Produces corrective scripts for failed stages.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Asks the service for a script that fixes `error` in `stage`.
    ///
    /// Transport and protocol failures surface as [`RemedyError`]; the
    /// caller treats them the same as a failed remediation and does not
    /// retry the call.
    async fn propose_fix(&self, stage: &str, error: &str) -> Result<Vec<ReplyItem>, RemedyError>;
}

/// Renders the remediation request as a natural-language prompt.
///
/// The zero-exit-status instruction is load-bearing: the engine decides
/// "fixed" purely from the script's exit code.
#[must_use]
pub fn render_prompt(stage: &str, error: &str, shell_name: &str) -> String {
    format!(
        "Provisioning stage '{stage}' failed with the following error:\n\
         {error}\n\
         Reply with a {shell_name} script that corrects the problem on this \
         machine and exits with status 0 on success. Reply with the script \
         only, no commentary."
    )
}
