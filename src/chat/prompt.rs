//! Prompt templates for the relay using Handlebars. User names and
//! message text are only ever template values, never templates.

use std::fmt;

use anyhow::Result;
use handlebars::{Handlebars, no_escape};
use serde_json::json;

use super::models::Turn;

#[derive(Debug)]
pub enum Prompt {
    SystemInstruction,
    RelayContext,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const RELAY_CONTEXT_PROMPT: &str =
    "{{system_instruction}}\n\n{{#each turns}}{{role}}: {{text}}\n{{/each}}";

/// Renders the single prompt string sent to the generation API: the
/// personalized system instruction followed by one `role: text` line
/// per turn.
pub struct RelayPrompt {
    registry: Handlebars<'static>,
}

impl RelayPrompt {
    pub fn new(system_instruction: &str) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // These are plain text prompts, not HTML
        registry.register_escape_fn(no_escape);
        registry.register_template_string(
            &Prompt::SystemInstruction.to_string(),
            system_instruction,
        )?;
        registry
            .register_template_string(&Prompt::RelayContext.to_string(), RELAY_CONTEXT_PROMPT)?;
        Ok(Self { registry })
    }

    pub fn system_instruction(&self, user_name: &str) -> Result<String> {
        let out = self.registry.render(
            &Prompt::SystemInstruction.to_string(),
            &json!({ "user_name": user_name }),
        )?;
        Ok(out)
    }

    pub fn render(&self, user_name: &str, turns: &[Turn]) -> Result<String> {
        let system_instruction = self.system_instruction(user_name)?;
        let out = self.registry.render(
            &Prompt::RelayContext.to_string(),
            &json!({
                "system_instruction": system_instruction,
                "turns": turns,
            }),
        )?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_SYSTEM_INSTRUCTION;

    #[test]
    fn test_render_personalizes_and_lists_turns() {
        let prompt = RelayPrompt::new("Help {{user_name}}.").unwrap();
        let turns = vec![Turn::user("hello"), Turn::assistant("hi"), Turn::user("how?")];
        let out = prompt.render("Ann", &turns).unwrap();
        assert_eq!(out, "Help Ann.\n\nuser: hello\nassistant: hi\nuser: how?\n");
    }

    #[test]
    fn test_values_are_not_escaped_or_evaluated() {
        let prompt = RelayPrompt::new("Help {{user_name}}.").unwrap();
        let turns = vec![Turn::user("<b>{{user_name}}</b> & co")];
        let out = prompt.render("O'Neil", &turns).unwrap();
        assert_eq!(out, "Help O'Neil.\n\nuser: <b>{{user_name}}</b> & co\n");
    }

    #[test]
    fn test_default_instruction_mentions_user() {
        let prompt = RelayPrompt::new(DEFAULT_SYSTEM_INSTRUCTION).unwrap();
        let out = prompt.system_instruction("Ann").unwrap();
        assert!(out.contains("You help Ann with"));
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        assert!(RelayPrompt::new("Help {{#if}}").is_err());
    }
}
