use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::nfa::{Automaton, StateId};
use crate::regex::Token;

/// A compiled automaton in the shape consumed by renderers: state ids,
/// start and accept state, and transitions keyed by state id and then by
/// symbol, with `""` standing for epsilon.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Report {
    pub initial: StateId,
    #[serde(rename = "final")]
    pub accept: StateId,
    pub states: Vec<StateId>,
    pub transitions: BTreeMap<String, BTreeMap<String, Vec<StateId>>>,
    pub regex: String,
    pub postfix: Vec<String>,
}

impl Report {
    pub fn new(regex: &str, postfix: &[Token], nfa: &Automaton) -> Report {
        let states: Vec<StateId> = nfa.states().collect();
        let transitions: BTreeMap<String, BTreeMap<String, Vec<StateId>>> = states
            .iter()
            .map(|&state| {
                let by_symbol: BTreeMap<String, Vec<StateId>> = nfa
                    .transitions()
                    .from_state(state)
                    .into_iter()
                    .flatten()
                    .map(|(on, targets)| (on.wire_key(), targets.iter().cloned().collect()))
                    .collect();
                (state.to_string(), by_symbol)
            })
            .collect();

        Report {
            initial: nfa.start(),
            accept: nfa.accept(),
            states,
            transitions,
            regex: regex.to_string(),
            postfix: postfix.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
