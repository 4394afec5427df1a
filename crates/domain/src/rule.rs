//! Rules: group → triggers → actions.
//!
//! A [`SetSpeedEvent`] is the unit of configuration: a named [`Group`], one
//! or more ([`ActionData`]) pairs of an optional override group and the
//! [`Action`]s to run for it, and the [`Trigger`]s that decide *when* those
//! actions run. Bindings created from a rule are keyed by the rule's name
//! only, so a rule can be removed without dangling references.

mod action;
mod trigger;

pub use action::{Action, StateEntry};
pub use trigger::{InitMethod, SignalKind, TimerConf, TimerType, Trigger};

use serde::{Deserialize, Serialize};

use crate::group::Group;

/// A named rule: group, actions and triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSpeedEvent {
    pub name: String,
    #[serde(default)]
    pub group: Group,
    #[serde(default)]
    pub actions: Vec<ActionData>,
    pub triggers: Vec<Trigger>,
}

impl SetSpeedEvent {
    /// Create a builder for constructing a [`SetSpeedEvent`].
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SetSpeedEventBuilder {
        SetSpeedEventBuilder {
            name: name.into(),
            group: Group::default(),
            actions: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// The (group, actions) pairs triggers are bound to.
    ///
    /// An action set with an empty override group uses the rule's group.
    /// A rule without actions still binds its triggers once, to its group.
    pub fn bindings(&self) -> Vec<(&Group, &[Action])> {
        if self.actions.is_empty() {
            return vec![(&self.group, &[])];
        }
        self.actions
            .iter()
            .map(|data| {
                let group = if data.group.is_empty() {
                    &self.group
                } else {
                    &data.group
                };
                (group, data.actions.as_slice())
            })
            .collect()
    }
}

/// Actions to run against a group, overriding the rule's group when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionData {
    #[serde(default)]
    pub group: Group,
    pub actions: Vec<Action>,
}

/// Step-by-step builder for [`SetSpeedEvent`].
#[derive(Debug)]
pub struct SetSpeedEventBuilder {
    name: String,
    group: Group,
    actions: Vec<ActionData>,
    triggers: Vec<Trigger>,
}

impl SetSpeedEventBuilder {
    #[must_use]
    pub fn group(mut self, group: Group) -> Self {
        self.group = group;
        self
    }

    /// Add actions bound to the rule's own group.
    #[must_use]
    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.actions.push(ActionData {
            group: Group::default(),
            actions,
        });
        self
    }

    /// Add actions bound to an override group.
    #[must_use]
    pub fn actions_for(mut self, group: Group, actions: Vec<Action>) -> Self {
        self.actions.push(ActionData { group, actions });
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use]
    pub fn build(self) -> SetSpeedEvent {
        SetSpeedEvent {
            name: self.name,
            group: self.group,
            actions: self.actions,
            triggers: self.triggers,
        }
    }
}
