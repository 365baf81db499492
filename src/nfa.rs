use std::collections::btree_map::{self, Entry};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bit_set::BitSet;
use log::{debug, trace, warn};
use thiserror::Error;

use crate::regex::{Operator, Token};

pub type StateId = usize;

/// What a transition consumes.
#[derive(PartialOrd, Ord, PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Symbol {
    /// Consumes nothing.
    Epsilon,
    Char(char),
}

impl Symbol {
    /// The key used for this symbol in serialized transition maps.
    pub fn wire_key(&self) -> String {
        match *self {
            Symbol::Epsilon => String::new(),
            Symbol::Char(c) => c.to_string(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Symbol::Epsilon => write!(f, "ε"),
            Symbol::Char(c) => write!(f, "{}", c),
        }
    }
}

/// A nondeterministic transition relation: for every state, the set of
/// states reachable on each symbol.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Transitions {
    map: BTreeMap<StateId, BTreeMap<Symbol, BTreeSet<StateId>>>,
}

impl Transitions {
    pub fn new() -> Transitions {
        Transitions { map: BTreeMap::new() }
    }

    pub fn add(&mut self, from: StateId, on: Symbol, to: StateId) {
        self.map.entry(from).or_default().entry(on).or_default().insert(to);
    }

    /// Makes sure `state` has an entry, even if it has no outgoing edges.
    pub fn touch(&mut self, state: StateId) {
        self.map.entry(state).or_default();
    }

    /// Unions `other` into `self`, destination sets included.
    pub fn merge(&mut self, other: Transitions) {
        for (from, by_symbol) in other.map {
            match self.map.entry(from) {
                Entry::Vacant(view) => {
                    view.insert(by_symbol);
                }
                Entry::Occupied(mut view) => {
                    let mine = view.get_mut();
                    for (on, targets) in by_symbol {
                        mine.entry(on).or_default().extend(targets);
                    }
                }
            }
        }
    }

    pub fn get(&self, from: StateId, on: Symbol) -> Option<&BTreeSet<StateId>> {
        self.map.get(&from).and_then(|m| m.get(&on))
    }

    pub fn from_state(&self, from: StateId) -> Option<&BTreeMap<Symbol, BTreeSet<StateId>>> {
        self.map.get(&from)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, StateId, BTreeMap<Symbol, BTreeSet<StateId>>> {
        self.map.iter()
    }

    /// Number of (from, symbol, to) edges.
    pub fn len(&self) -> usize {
        self.map.values().flat_map(|m| m.values()).map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An epsilon-NFA with a single start and a single accepting state.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Automaton {
    states: BitSet,
    alphabet: BTreeSet<char>,
    transitions: Transitions,
    start: StateId,
    accept: StateId,
}

impl Automaton {
    /// State ids in ascending order.
    pub fn states(&self) -> bit_set::Iter<'_, u32> {
        self.states.iter()
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn contains_state(&self, state: StateId) -> bool {
        self.states.contains(state)
    }

    pub fn alphabet(&self) -> &BTreeSet<char> {
        &self.alphabet
    }

    pub fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn accept(&self) -> StateId {
        self.accept
    }

    /// Destinations of `state` on `on`; empty if there are none.
    pub fn targets(&self, state: StateId, on: Symbol) -> impl Iterator<Item = StateId> + '_ {
        self.transitions.get(state, on).into_iter().flatten().cloned()
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Initial: {}, Final: {}", self.start, self.accept)?;
        for state in self.states() {
            write!(f, "  {}: {{", state)?;
            if let Some(by_symbol) = self.transitions.from_state(state) {
                for (i, (on, targets)) in by_symbol.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {:?}", on.wire_key(), targets.iter().collect::<Vec<_>>())?;
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

#[derive(Error, PartialEq, Eq, Debug, Clone)]
pub enum BuildError {
    /// An operator did not find enough operands on the stack.
    #[error("'{operator}' at position {position} needs {needed} operand(s), found {found}")]
    InvalidPostfix {
        operator: char,
        position: usize,
        needed: usize,
        found: usize,
    },
    /// Parentheses have no meaning in postfix order.
    #[error("unexpected '{token}' at position {position} in postfix sequence")]
    UnexpectedToken { token: Token, position: usize },
}

/// A partially built sub-automaton. Owns its states and edges until a
/// composition rule consumes it.
#[derive(Debug)]
struct Fragment {
    entry: StateId,
    exit: StateId,
    states: BitSet,
    transitions: Transitions,
}

impl Fragment {
    fn absorb(&mut self, other: Fragment) {
        self.states.union_with(&other.states);
        self.transitions.merge(other.transitions);
    }
}

struct Builder {
    next_state: StateId,
    stack: Vec<Fragment>,
}

impl Builder {
    fn new() -> Builder {
        Builder { next_state: 0, stack: Vec::new() }
    }

    fn unique_state(&mut self) -> StateId {
        let s = self.next_state;
        self.next_state += 1;
        s
    }

    /// A fragment holding two fresh states and no edges.
    fn fresh(&mut self) -> Fragment {
        let entry = self.unique_state();
        let exit = self.unique_state();
        let mut states = BitSet::new();
        states.insert(entry);
        states.insert(exit);
        let mut transitions = Transitions::new();
        transitions.touch(entry);
        transitions.touch(exit);
        Fragment { entry, exit, states, transitions }
    }

    fn require(&self, op: Operator, position: usize, needed: usize) -> Result<(), BuildError> {
        let found = self.stack.len();
        if found < needed {
            return Err(BuildError::InvalidPostfix {
                operator: op.as_char(),
                position,
                needed,
                found,
            });
        }
        Ok(())
    }

    fn pop(&mut self, op: Operator, position: usize, needed: usize) -> Result<Fragment, BuildError> {
        match self.stack.pop() {
            Some(frag) => Ok(frag),
            None => Err(BuildError::InvalidPostfix {
                operator: op.as_char(),
                position,
                needed,
                found: 0,
            }),
        }
    }

    fn literal(&mut self, c: char) {
        let mut frag = self.fresh();
        frag.transitions.add(frag.entry, Symbol::Char(c), frag.exit);
        trace!("literal {:?}: {} -> {}", c, frag.entry, frag.exit);
        self.stack.push(frag);
    }

    fn empty(&mut self) {
        let mut frag = self.fresh();
        frag.transitions.add(frag.entry, Symbol::Epsilon, frag.exit);
        trace!("empty: {} -> {}", frag.entry, frag.exit);
        self.stack.push(frag);
    }

    fn concat(mut left: Fragment, right: Fragment) -> Fragment {
        left.transitions.add(left.exit, Symbol::Epsilon, right.entry);
        trace!("concat: {} -> {}", left.exit, right.entry);
        let exit = right.exit;
        left.absorb(right);
        left.exit = exit;
        left
    }

    fn alternate(&mut self, left: Fragment, right: Fragment) -> Fragment {
        let mut frag = self.fresh();
        frag.transitions.add(frag.entry, Symbol::Epsilon, left.entry);
        frag.transitions.add(frag.entry, Symbol::Epsilon, right.entry);
        frag.transitions.add(left.exit, Symbol::Epsilon, frag.exit);
        frag.transitions.add(right.exit, Symbol::Epsilon, frag.exit);
        trace!("alternate: {} -> ({} | {}) -> {}", frag.entry, left.entry, right.entry, frag.exit);
        frag.absorb(left);
        frag.absorb(right);
        frag
    }

    fn closure(&mut self, inner: Fragment) -> Fragment {
        let mut frag = self.fresh();
        frag.transitions.add(frag.entry, Symbol::Epsilon, inner.entry);
        frag.transitions.add(frag.entry, Symbol::Epsilon, frag.exit);
        frag.transitions.add(inner.exit, Symbol::Epsilon, inner.entry);
        frag.transitions.add(inner.exit, Symbol::Epsilon, frag.exit);
        trace!("closure: {} -> ({})* -> {}", frag.entry, inner.entry, frag.exit);
        frag.absorb(inner);
        frag
    }

    fn step(&mut self, position: usize, token: Token) -> Result<(), BuildError> {
        let op = match token {
            Token::Literal(c) => {
                self.literal(c);
                return Ok(());
            }
            Token::Empty => {
                self.empty();
                return Ok(());
            }
            Token::Op(op) => op,
        };
        let frag = match op {
            Operator::Concat | Operator::Alt => {
                self.require(op, position, 2)?;
                // The operand pushed last is the right-hand one.
                let right = self.pop(op, position, 2)?;
                let left = self.pop(op, position, 2)?;
                if op == Operator::Concat {
                    Builder::concat(left, right)
                } else {
                    self.alternate(left, right)
                }
            }
            Operator::Star => {
                let inner = self.pop(op, position, 1)?;
                self.closure(inner)
            }
            Operator::Open | Operator::Close => {
                return Err(BuildError::UnexpectedToken { token, position });
            }
        };
        self.stack.push(frag);
        Ok(())
    }

    /// Collapses the stack into a single fragment. More than one fragment
    /// is left only when the input lacked concatenation operators.
    fn finish(mut self) -> Option<Fragment> {
        if self.stack.len() > 1 {
            warn!("{} fragments left after postfix scan; concatenating them", self.stack.len());
        }
        while self.stack.len() > 1 {
            let right = self.stack.pop()?;
            let left = self.stack.pop()?;
            self.stack.push(Builder::concat(left, right));
        }
        self.stack.pop()
    }
}

/// Builds an NFA from a postfix token sequence using Thompson's
/// construction.
///
/// Literal fragments are two states joined by the literal, and an empty
/// group is two states joined by an epsilon edge. Concatenation
/// links the left exit to the right entry with an epsilon edge; alternation
/// and closure each wrap their operands between two fresh states. The
/// resulting alphabet is `alphabet` plus every literal in `postfix`.
///
/// An empty sequence gives a single state that is both start and accept.
pub fn build_automaton(postfix: &[Token], alphabet: &BTreeSet<char>) -> Result<Automaton, BuildError> {
    let mut builder = Builder::new();
    for (position, &token) in postfix.iter().enumerate() {
        builder.step(position, token)?;
    }

    let mut alphabet = alphabet.clone();
    alphabet.extend(postfix.iter().filter_map(|t| match *t {
        Token::Literal(c) => Some(c),
        Token::Empty | Token::Op(_) => None,
    }));

    let automaton = match builder.finish() {
        Some(frag) => {
            let mut transitions = frag.transitions;
            for state in frag.states.iter() {
                transitions.touch(state);
            }
            Automaton {
                states: frag.states,
                alphabet,
                transitions,
                start: frag.entry,
                accept: frag.exit,
            }
        }
        None => {
            let mut states = BitSet::new();
            states.insert(0);
            let mut transitions = Transitions::new();
            transitions.touch(0);
            Automaton { states, alphabet, transitions, start: 0, accept: 0 }
        }
    };

    debug!(
        "built automaton with {} states and {} transitions",
        automaton.num_states(),
        automaton.transitions.len()
    );
    Ok(automaton)
}
