//! Planner agent: an optional short plan generated before the first attempt.

use anyhow::{Context, Result};
use tracing::instrument;

use crate::io::backend::Backend;
use crate::io::prompt::PromptEngine;

pub struct Planner<B> {
    backend: B,
    prompts: PromptEngine,
}

impl<B: Backend> Planner<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            prompts: PromptEngine::new(),
        }
    }

    #[instrument(skip_all)]
    pub fn create_plan(&self, task: &str) -> Result<String> {
        let prompt = self.prompts.render_planner(task)?;
        let plan = self.backend.generate(&prompt).context("generate plan")?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::backend::BackendError;
    use crate::test_support::ScriptedBackend;

    #[test]
    fn returns_backend_plan() {
        let backend = ScriptedBackend::new(vec![Ok("1. a\n2. b\n3. c".to_string())]);
        let plan = Planner::new(&backend).create_plan("Sort").expect("plan");
        assert_eq!(plan, "1. a\n2. b\n3. c");
        assert!(backend.prompts()[0].contains("Sort"));
    }

    #[test]
    fn backend_failure_is_an_error() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::Failed("down".to_string()))]);
        let err = Planner::new(&backend).create_plan("Sort").unwrap_err();
        assert!(format!("{err:#}").contains("down"));
    }
}
