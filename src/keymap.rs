// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use crate::Action;
use crossterm::event::KeyCode;
use std::collections::HashMap;

#[derive(Clone, Debug, Eq, Hash, PartialOrd, PartialEq)]
pub enum Key {
    Char(char),
    Code(KeyCode),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Code(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyMap {
    bindings: HashMap<Key, Action>,
}

impl Default for KeyMap {
    /// Returns the default keymap. Letters bind both cases to the same
    /// action.
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(Key::Char('q'), Action::Quit);
        bindings.insert(Key::Char('Q'), Action::Quit);
        bindings.insert(Key::Char('r'), Action::ReverseSorting);
        bindings.insert(Key::Char('R'), Action::ReverseSorting);
        bindings.insert(Key::Char('i'), Action::ToggleHideInactive);
        bindings.insert(Key::Char('I'), Action::ToggleHideInactive);
        bindings.insert(Key::Char('z'), Action::ToggleHideZero);
        bindings.insert(Key::Char('Z'), Action::ToggleHideZero);
        bindings.insert(Key::Char('e'), Action::ToggleHideEmpty);
        bindings.insert(Key::Char('E'), Action::ToggleHideEmpty);
        bindings.insert(Key::Code(KeyCode::Left), Action::SortKeyPrev);
        bindings.insert(Key::Code(KeyCode::Right), Action::SortKeyNext);
        bindings.insert(Key::Code(KeyCode::Home), Action::SortKeyFirst);
        bindings.insert(Key::Code(KeyCode::End), Action::SortKeyLast);

        Self { bindings }
    }
}

impl KeyMap {
    /// Returns an empty KeyMap.
    pub fn empty() -> KeyMap {
        KeyMap {
            bindings: HashMap::new(),
        }
    }

    /// Maps the Key to an Action; unbound keys are no-ops.
    pub fn action(&self, key: &Key) -> Action {
        self.bindings.get(key).copied().unwrap_or(Action::None)
    }

    /// Inserts a Key mapping for an Action.
    pub fn insert(&mut self, key: Key, action: Action) {
        self.bindings.insert(key, action);
    }
}
