//! Screen navigation for interactive front ends, as an explicit transition
//! table. Pairs missing from the table leave the state unchanged.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavState {
    Search,
    Pages,
    Examples,
    Edit,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavEvent {
    Submit,
    Back,
    Tab,
    ToggleHelp,
}

const TRANSITIONS: &[(NavState, NavEvent, NavState)] = &[
    (NavState::Search, NavEvent::Submit, NavState::Pages),
    (NavState::Pages, NavEvent::Submit, NavState::Examples),
    (NavState::Pages, NavEvent::Back, NavState::Search),
    (NavState::Examples, NavEvent::Back, NavState::Pages),
    (NavState::Examples, NavEvent::Tab, NavState::Edit),
    (NavState::Edit, NavEvent::Back, NavState::Examples),
    (NavState::Help, NavEvent::Back, NavState::Search),
    (NavState::Help, NavEvent::ToggleHelp, NavState::Search),
    (NavState::Search, NavEvent::ToggleHelp, NavState::Help),
    (NavState::Pages, NavEvent::ToggleHelp, NavState::Help),
    (NavState::Examples, NavEvent::ToggleHelp, NavState::Help),
    (NavState::Edit, NavEvent::ToggleHelp, NavState::Help),
];

impl NavState {
    pub fn next(self, event: NavEvent) -> NavState {
        TRANSITIONS
            .iter()
            .find(|(from, on, _)| *from == self && *on == event)
            .map(|(_, _, to)| *to)
            .unwrap_or(self)
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavState::Search => "search",
            NavState::Pages => "pages",
            NavState::Examples => "examples",
            NavState::Edit => "edit",
            NavState::Help => "help",
        };
        f.write_str(name)
    }
}

/// Current screen plus the event history that led there.
#[derive(Debug, Clone)]
pub struct Navigator {
    state: NavState,
    history: Vec<NavEvent>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            state: NavState::Search,
            history: Vec::new(),
        }
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn history(&self) -> &[NavEvent] {
        &self.history
    }

    /// Apply `event`; returns true when the screen changed.
    pub fn handle(&mut self, event: NavEvent) -> bool {
        let next = self.state.next(event);
        self.history.push(event);
        let changed = next != self.state;
        self.state = next;
        changed
    }
}
