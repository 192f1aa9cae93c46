//! Workflow documentation export.
//!
//! Reflects a [`MachineDefinition`] into plain serializable data, and renders
//! it as Markdown for operators.

use super::machine::MachineDefinition;
use crate::core::Entity;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDoc {
    pub id: String,
    pub name: String,
    pub description: String,
    pub initial: bool,
    pub terminal: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionDoc {
    pub name: String,
    pub description: String,
    pub sources: Vec<String>,
    pub target: String,
    pub automatic: bool,
    pub conditions: Vec<String>,
    pub permission: Option<String>,
    pub effects: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerDoc {
    pub watch: String,
    pub conditions: Vec<String>,
    pub effects: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub kind: String,
    pub states: Vec<StateDoc>,
    pub transitions: Vec<TransitionDoc>,
    pub triggers: Vec<TriggerDoc>,
}

impl MachineDefinition {
    pub fn document(&self) -> WorkflowDocument {
        // Effect descriptions are rendered against a blank entity of this kind.
        let example = Entity::new(self.kind.clone(), 0);

        WorkflowDocument {
            kind: self.kind.clone(),
            states: self
                .states
                .iter()
                .map(|state| StateDoc {
                    id: state.id.to_string(),
                    name: state.name.clone(),
                    description: state.description.clone(),
                    initial: state.is_initial,
                    terminal: state.is_terminal,
                })
                .collect(),
            transitions: self
                .transitions
                .iter()
                .map(|t| TransitionDoc {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    sources: t.sources.iter().map(ToString::to_string).collect(),
                    target: t.target.to_string(),
                    automatic: t.automatic,
                    conditions: t
                        .conditions
                        .iter()
                        .map(|c| c.description().to_string())
                        .collect(),
                    permission: t.permission.as_ref().map(|p| p.description().to_string()),
                    effects: t.effects.iter().map(|e| e.describe(&example)).collect(),
                })
                .collect(),
            triggers: self
                .triggers
                .iter()
                .map(|trigger| TriggerDoc {
                    watch: trigger.watch.to_string(),
                    conditions: trigger
                        .conditions
                        .iter()
                        .map(|c| c.description().to_string())
                        .collect(),
                    effects: trigger
                        .effects
                        .iter()
                        .map(|e| e.describe(&example))
                        .collect(),
                })
                .collect(),
        }
    }
}

impl WorkflowDocument {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_markdown(&mut out);
        out
    }

    fn write_markdown(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# {}", self.kind)?;
        writeln!(out)?;
        writeln!(out, "## States")?;
        writeln!(out)?;
        for state in &self.states {
            let mut flags = Vec::new();
            if state.initial {
                flags.push("initial");
            }
            if state.terminal {
                flags.push("terminal");
            }
            write!(out, "- **{}** (`{}`)", state.name, state.id)?;
            if !flags.is_empty() {
                write!(out, " _{}_", flags.join(", "))?;
            }
            if !state.description.is_empty() {
                write!(out, ": {}", state.description)?;
            }
            writeln!(out)?;
        }

        writeln!(out)?;
        writeln!(out, "## Transitions")?;
        for transition in &self.transitions {
            writeln!(out)?;
            writeln!(out, "### {}", transition.name)?;
            writeln!(out)?;
            if !transition.description.is_empty() {
                writeln!(out, "{}", transition.description)?;
                writeln!(out)?;
            }
            writeln!(
                out,
                "- From: {}",
                transition.sources.join(", ")
            )?;
            writeln!(out, "- To: {}", transition.target)?;
            writeln!(
                out,
                "- Mode: {}",
                if transition.automatic { "automatic" } else { "manual" }
            )?;
            if let Some(permission) = &transition.permission {
                writeln!(out, "- Permission: {permission}")?;
            }
            write_list(out, "Conditions", &transition.conditions)?;
            write_list(out, "Effects", &transition.effects)?;
        }

        if !self.triggers.is_empty() {
            writeln!(out)?;
            writeln!(out, "## Triggers")?;
            for trigger in &self.triggers {
                writeln!(out)?;
                writeln!(out, "### When {}", trigger.watch)?;
                writeln!(out)?;
                write_list(out, "Conditions", &trigger.conditions)?;
                write_list(out, "Effects", &trigger.effects)?;
            }
        }
        Ok(())
    }
}

fn write_list(out: &mut String, title: &str, items: &[String]) -> std::fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "- {title}:")?;
    for item in items {
        writeln!(out, "  - {item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::builder::{MachineBuilder, TransitionBuilder};
    use crate::core::{Permission, State};
    use crate::effects::SetField;
    use crate::triggers::Trigger;

    fn definition() -> super::MachineDefinition {
        MachineBuilder::new("deed")
            .state(State::new("draft", "Draft").initial())
            .state(State::new("open", "Open").describe("Visible to everyone"))
            .state(State::new("expired", "Expired").terminal())
            .transition(
                TransitionBuilder::new("publish")
                    .describe("Make the deed visible")
                    .from("draft")
                    .to("open")
                    .when("has a title", |e, _| !e.is_blank("title"))
                    .permission(Permission::owner("owner").or(Permission::staff()))
                    .effect(SetField::new("published", true)),
            )
            .transition(TransitionBuilder::new("expire").from("open").to("expired").automatic())
            .trigger(Trigger::field("end").effect(SetField::clear("reminder")))
            .build()
            .unwrap()
    }

    #[test]
    fn document_reflects_every_part() {
        let document = definition().document();

        assert_eq!(document.kind, "deed");
        assert_eq!(document.states.len(), 3);
        assert!(document.states[0].initial);
        assert!(document.states[2].terminal);

        let publish = &document.transitions[0];
        assert_eq!(publish.sources, ["draft"]);
        assert_eq!(publish.target, "open");
        assert_eq!(publish.conditions, ["has a title"]);
        assert_eq!(publish.permission.as_deref(), Some("is owner or is staff"));
        assert_eq!(publish.effects, ["Set published to true"]);
        assert!(document.transitions[1].automatic);
        assert_eq!(document.transitions[1].permission, None);

        assert_eq!(document.triggers[0].watch, "end changed");
        assert_eq!(document.triggers[0].effects, ["Clear reminder"]);
    }

    #[test]
    fn markdown_lists_states_transitions_and_triggers() {
        let markdown = definition().document().to_markdown();

        assert!(markdown.starts_with("# deed\n\n## States\n"));
        assert!(markdown.contains("- **Draft** (`draft`) _initial_\n"));
        assert!(markdown.contains("- **Open** (`open`): Visible to everyone\n"));
        assert!(markdown.contains("### publish\n\nMake the deed visible\n"));
        assert!(markdown.contains("- From: draft\n- To: open\n- Mode: manual\n"));
        assert!(markdown.contains("- Conditions:\n  - has a title\n"));
        assert!(markdown.contains("- Mode: automatic\n"));
        assert!(markdown.contains("## Triggers\n\n### When end changed\n"));
    }
}
