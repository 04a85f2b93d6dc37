//! Prompt envelope construction
//!
//! Test text goes to the agent wrapped in a fixed instruction block that
//! asks for a JSON verdict. The request is a soft contract; nothing here
//! checks the content or what comes back.

use chrono::{DateTime, SecondsFormat, Utc};

const INSTRUCTIONS: &str = "\
You are executing an automated end-to-end test. Carry out every step listed \
under \"Test Steps\" in order, using the tools available to you. Do not skip \
steps and do not assume the outcome of a step you have not performed. If a \
step cannot be completed, stop and report the failure.

When you are done, respond with a single JSON object of this shape and \
nothing else:

{
  \"success\": boolean,
  \"steps_completed\": [\"description of each step you completed, in order\"],
  \"observations\": \"what you observed while running the test\",
  \"final_status\": \"short summary of the final state\"
}";

/// The full instruction text for one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEnvelope {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl PromptEnvelope {
    /// Envelope stamped with the current time
    pub fn new(content: &str) -> Self {
        Self::at(content, Utc::now())
    }

    /// Envelope stamped with a given time
    pub fn at(content: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            content: content.to_string(),
        }
    }

    /// Render the prompt text
    pub fn render(&self) -> String {
        let prompt = format!(
            "Current time: {}\n\n{}\n\nTest Steps:\n{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            INSTRUCTIONS,
            self.content
        );
        prompt.trim().to_string()
    }
}

/// Build the prompt for a test, stamped with the current time
pub fn build_prompt(content: &str) -> String {
    PromptEnvelope::new(content).render()
}

/// Build the prompt for a test with an explicit timestamp
pub fn build_prompt_at(content: &str, timestamp: DateTime<Utc>) -> String {
    PromptEnvelope::at(content, timestamp).render()
}
