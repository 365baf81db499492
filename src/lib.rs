/*! Compiles regular expressions into nondeterministic finite automata.

The supported syntax is small: literals, `*` (Kleene closure), `+`
(alternation), `.` (concatenation, usually implicit) and parentheses. Any
character other than these five is a literal.

Compilation happens in three steps:

1. [`regex::add_concatenation`] makes every concatenation explicit, so
   `a(b+c)` becomes `a.(b+c)`.
2. [`regex::to_postfix`] reorders the expression into postfix form with a
   shunting-yard pass, e.g. `a b c + .`.
3. [`nfa::build_automaton`] evaluates the postfix sequence with a stack of
   automaton fragments, following [Thompson's construction][1].

[1]: https://en.wikipedia.org/wiki/Thompson%27s_construction
*/

use std::collections::BTreeSet;

use log::debug;
use serde::Deserialize;
use thiserror::Error;

pub use nfa::{build_automaton, Automaton, BuildError, StateId, Symbol, Transitions};
pub use regex::{add_concatenation, to_postfix, to_postfix_with, Operator, ParenPolicy, ParseError, Token};
pub use wire::Report;

pub mod nfa;
pub mod regex;
pub mod wire;

#[derive(Error, Debug)]
pub enum Error {
    /// The input was empty or only whitespace.
    #[error("regex cannot be empty")]
    EmptyRegex,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Compilation settings.
#[derive(Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Report unbalanced parentheses instead of dropping them.
    pub strict_parens: bool,
    /// Symbols the automaton is declared over. Literals used by the regex
    /// are always added.
    pub alphabet: BTreeSet<char>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strict_parens: false,
            alphabet: ['0', '1'].into_iter().collect(),
        }
    }
}

impl Config {
    pub fn with_strict_parens(mut self, yes: bool) -> Self {
        self.strict_parens = yes;
        self
    }

    pub fn with_alphabet<I: IntoIterator<Item = char>>(mut self, alphabet: I) -> Self {
        self.alphabet = alphabet.into_iter().collect();
        self
    }

    pub fn paren_policy(&self) -> ParenPolicy {
        if self.strict_parens {
            ParenPolicy::Strict
        } else {
            ParenPolicy::Lenient
        }
    }

    pub fn from_json(s: &str) -> Result<Config, Error> {
        Ok(serde_json::from_str(s)?)
    }
}

/// The output of both compilation stages for one regex.
#[derive(Debug, Clone)]
pub struct Compiled {
    /// The regex with surrounding whitespace removed.
    pub regex: String,
    pub postfix: Vec<Token>,
    pub nfa: Automaton,
}

impl Compiled {
    pub fn report(&self) -> Report {
        Report::new(&self.regex, &self.postfix, &self.nfa)
    }
}

/// Runs both stages on `regex`. Surrounding whitespace is ignored; an empty
/// regex is an error here even though [`build_automaton`] accepts an empty
/// sequence.
pub fn compile_nfa(regex: &str, config: &Config) -> Result<Compiled, Error> {
    let regex = regex.trim();
    if regex.is_empty() {
        return Err(Error::EmptyRegex);
    }
    let postfix = to_postfix_with(regex, config.paren_policy())?;
    let nfa = build_automaton(&postfix, &config.alphabet)?;
    debug!("compiled {:?} into {} states", regex, nfa.num_states());
    Ok(Compiled {
        regex: regex.to_string(),
        postfix,
        nfa,
    })
}

/// Like [`compile_nfa`], but describes the result as a [`Report`].
pub fn compile(regex: &str, config: &Config) -> Result<Report, Error> {
    Ok(compile_nfa(regex, config)?.report())
}
