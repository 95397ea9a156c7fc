use std::collections::VecDeque;

use tsdb_reconcile::Confirm;

/// Answers prompts from a fixed script and records every prompt it was shown.
///
/// Once the script runs out every further prompt is declined.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    prompts: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    /// Declines everything.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Scripted answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().unwrap_or(false)
    }
}
