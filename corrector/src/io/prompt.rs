//! Prompt rendering for the executor, validator, and planner agents.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

const EXECUTOR_TEMPLATE: &str = include_str!("prompts/executor.md");
const VALIDATOR_TEMPLATE: &str = include_str!("prompts/validator.md");
const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");

/// Correction section of an execution prompt.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionContext<'a> {
    pub feedback: &'a str,
    pub hint: Option<&'a str>,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("executor", EXECUTOR_TEMPLATE)
            .expect("executor template should be valid");
        env.add_template("validator", VALIDATOR_TEMPLATE)
            .expect("validator template should be valid");
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        Self { env }
    }

    pub fn render_executor(
        &self,
        task: &str,
        plan: Option<&str>,
        correction: Option<&CorrectionContext<'_>>,
    ) -> Result<String> {
        let template = self.env.get_template("executor")?;
        let rendered = template.render(context! {
            task => task.trim(),
            plan => plan.map(str::trim).filter(|s| !s.is_empty()),
            correction => correction,
        })?;
        Ok(rendered)
    }

    pub fn render_validator(&self, task: &str, output: &str) -> Result<String> {
        let template = self.env.get_template("validator")?;
        let rendered = template.render(context! {
            task => task.trim(),
            output => output,
        })?;
        Ok(rendered)
    }

    pub fn render_planner(&self, task: &str) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! { task => task.trim() })?;
        Ok(rendered)
    }
}
