//! Interactive relationship wizard.
//!
//! `SelectOrigin → SelectType → SelectTarget → Configure → Confirm → Execute
//! → Done`, with `Cancelled` reachable from every prompt. All prompts come
//! before `Execute`, so declining anywhere leaves the project untouched.
//! Answers supplied on the command line (`Preset`) skip their prompt.
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};

use super::report::RelationReport;
use super::{RelationType, RelationshipConfig, Side};
use crate::error::{FamError, Result};
use crate::naming;
use crate::registry::EntityDescriptor;

/// Source of the operator's answers. `None` means the prompt was dismissed.
pub trait Prompter {
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> Result<Option<usize>>;
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<Option<bool>>;
    fn show(&mut self, lines: &[String]);
}

/// Terminal prompts; Esc or `q` cancels.
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl Default for DialoguerPrompter {
    fn default() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompter for DialoguerPrompter {
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> Result<Option<usize>> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()
            .map_err(|e| FamError::Prompt(e.to_string()))
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<Option<bool>> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact_opt()
            .map_err(|e| FamError::Prompt(e.to_string()))
    }

    fn show(&mut self, lines: &[String]) {
        println!();
        for line in lines {
            println!("  {line}");
        }
        println!();
    }
}

/// Answers given up front.
#[derive(Debug, Clone, Default)]
pub struct Preset {
    pub origin: Option<String>,
    pub target: Option<String>,
    pub kind: Option<RelationType>,
    pub fk_side: Option<Side>,
    /// Skip the final confirmation, and the key-side prompt of a
    /// one-to-one relationship.
    pub assume_yes: bool,
}

#[derive(Debug)]
pub enum WizardState {
    SelectOrigin,
    SelectType {
        origin: usize,
    },
    SelectTarget {
        origin: usize,
        kind: RelationType,
    },
    Configure {
        origin: usize,
        kind: RelationType,
        target: usize,
    },
    Confirm(Box<RelationshipConfig>),
    Execute(Box<RelationshipConfig>),
    Done(RelationReport),
    Cancelled,
}

#[derive(Debug)]
pub enum WizardOutcome {
    Done(RelationReport),
    Cancelled,
}

pub struct RelationWizard<'a, P: Prompter> {
    entities: &'a [EntityDescriptor],
    preset: Preset,
    prompter: P,
}

impl<'a, P: Prompter> RelationWizard<'a, P> {
    pub fn new(entities: &'a [EntityDescriptor], preset: Preset, prompter: P) -> Result<Self> {
        if entities.len() < 2 {
            return Err(FamError::NotEnoughEntities {
                found: entities.len(),
            });
        }
        Ok(Self {
            entities,
            preset,
            prompter,
        })
    }

    /// Drive the machine to a terminal state. `execute` runs exactly once,
    /// and only after confirmation.
    pub fn run<F>(mut self, mut execute: F) -> Result<WizardOutcome>
    where
        F: FnMut(&RelationshipConfig) -> Result<RelationReport>,
    {
        let mut state = WizardState::SelectOrigin;
        loop {
            state = match state {
                WizardState::Done(report) => return Ok(WizardOutcome::Done(report)),
                WizardState::Cancelled => return Ok(WizardOutcome::Cancelled),
                other => self.step(other, &mut execute)?,
            };
        }
    }

    pub fn step(
        &mut self,
        state: WizardState,
        execute: &mut dyn FnMut(&RelationshipConfig) -> Result<RelationReport>,
    ) -> Result<WizardState> {
        let next = match state {
            WizardState::SelectOrigin => {
                let origin = match self.preset.origin.clone() {
                    Some(name) => Some(self.lookup(&name)?),
                    None => {
                        let items: Vec<String> = self.entities.iter().map(|e| e.name.clone()).collect();
                        self.prompter.select("Origin entity", &items, 0)?
                    }
                };
                match origin {
                    Some(origin) => WizardState::SelectType { origin },
                    None => WizardState::Cancelled,
                }
            }

            WizardState::SelectType { origin } => {
                let kind = match self.preset.kind {
                    Some(kind) => Some(kind),
                    None => {
                        let name = &self.entities[origin].name;
                        let items: Vec<String> = RelationType::ALL
                            .iter()
                            .map(|k| format!("{k:<13} {}", k.describe(name, "<target>")))
                            .collect();
                        self.prompter
                            .select("Relationship type", &items, 0)?
                            .map(|i| RelationType::ALL[i])
                    }
                };
                match kind {
                    Some(kind) => WizardState::SelectTarget { origin, kind },
                    None => WizardState::Cancelled,
                }
            }

            WizardState::SelectTarget { origin, kind } => {
                let target = match self.preset.target.clone() {
                    Some(name) => {
                        let idx = self.lookup(&name)?;
                        if idx == origin {
                            return Err(FamError::SelfRelation(name));
                        }
                        Some(idx)
                    }
                    None => {
                        let candidates: Vec<usize> = (0..self.entities.len()).filter(|&i| i != origin).collect();
                        let items: Vec<String> =
                            candidates.iter().map(|&i| self.entities[i].name.clone()).collect();
                        self.prompter
                            .select("Target entity", &items, 0)?
                            .map(|i| candidates[i])
                    }
                };
                match target {
                    Some(target) => WizardState::Configure {
                        origin,
                        kind,
                        target,
                    },
                    None => WizardState::Cancelled,
                }
            }

            WizardState::Configure {
                origin,
                kind,
                target,
            } => {
                let fk_side = match (kind, self.preset.fk_side) {
                    // Unattended runs take the default side.
                    (RelationType::OneToOne, None) if self.preset.assume_yes => Some(Side::Target),
                    (RelationType::OneToOne, None) => match self.ask_fk_side(origin, target)? {
                        Some(side) => Some(side),
                        None => return Ok(WizardState::Cancelled),
                    },
                    (_, side) => side,
                };
                let config = RelationshipConfig::new(
                    self.entities[origin].clone(),
                    self.entities[target].clone(),
                    kind,
                    fk_side,
                )?;
                WizardState::Confirm(Box::new(config))
            }

            WizardState::Confirm(config) => {
                self.prompter.show(&config.describe());
                let accepted = if self.preset.assume_yes {
                    Some(true)
                } else {
                    self.prompter.confirm("Apply this relationship?", true)?
                };
                match accepted {
                    Some(true) => WizardState::Execute(config),
                    _ => WizardState::Cancelled,
                }
            }

            WizardState::Execute(config) => WizardState::Done(execute(&config)?),

            terminal @ (WizardState::Done(_) | WizardState::Cancelled) => terminal,
        };
        Ok(next)
    }

    fn lookup(&self, raw: &str) -> Result<usize> {
        let name = naming::normalize_entity_name(raw)?;
        self.entities
            .iter()
            .position(|e| e.name == name)
            .ok_or(FamError::UnknownEntity(name))
    }

    fn ask_fk_side(&mut self, origin: usize, target: usize) -> Result<Option<Side>> {
        let origin = &self.entities[origin].name;
        let target = &self.entities[target].name;
        let items = vec![
            format!("{target} holds {}", naming::id_field(origin)),
            format!("{origin} holds {}", naming::id_field(target)),
        ];
        Ok(self
            .prompter
            .select("Which entity holds the foreign key?", &items, 0)?
            .map(|i| if i == 0 { Side::Target } else { Side::Origin }))
    }
}
