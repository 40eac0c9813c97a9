//! Interactive dialog collaborator.
//!
//! The manager never talks to the terminal directly. Every prompt goes through
//! [`Dialog`], so the CLI can plug in a terminal implementation and tests can
//! replay scripted answers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DialogError {
    /// The user backed out of the prompt (Ctrl-C, Ctrl-D).
    #[error("cancelled by user")]
    Cancelled,
    #[error("dialog I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("dialog failed: {0}")]
    Backend(String),
}

/// One entry of a radio list or check list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceItem {
    pub tag: String,
    pub description: String,
    pub selected: bool,
}

impl ChoiceItem {
    pub fn new(tag: &str, description: &str, selected: bool) -> Self {
        Self {
            tag: tag.to_string(),
            description: description.to_string(),
            selected,
        }
    }
}

pub trait Dialog {
    /// Single choice among `items`. Returns the chosen tag.
    fn radiolist(
        &mut self,
        text: &str,
        items: &[ChoiceItem],
        title: &str,
    ) -> Result<String, DialogError>;

    /// Any number of choices among `items`. Returns the chosen tags in list order.
    fn checklist(
        &mut self,
        text: &str,
        items: &[ChoiceItem],
        title: &str,
    ) -> Result<Vec<String>, DialogError>;

    /// Free text input, pre-filled with `init`.
    fn inputbox(&mut self, text: &str, init: &str) -> Result<String, DialogError>;

    /// Positive integer input, pre-filled with `init`.
    fn integer_inputbox(&mut self, text: &str, init: &str) -> Result<u32, DialogError>;

    fn message(&mut self, text: &str, title: &str) -> Result<(), DialogError>;

    /// Long text in a scrollable viewer.
    fn scrollbox(&mut self, text: &str, title: &str) -> Result<(), DialogError>;
}

/// Scripted dialog used by tests: replays queued answers and records what was shown.
#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Debug, Clone)]
    pub enum Answer {
        Choice(String),
        Choices(Vec<String>),
        Text(String),
        /// Accept whatever the prompt was pre-filled with.
        Keep,
        Integer(u32),
        Cancel,
    }

    #[derive(Debug, Default)]
    pub struct ScriptedDialog {
        answers: VecDeque<Answer>,
        /// (title, text) of every message box.
        pub messages: Vec<(String, String)>,
        /// (title, text) of every scroll box.
        pub scrolls: Vec<(String, String)>,
        /// Initial value offered by each text / integer prompt.
        pub prefills: Vec<String>,
        /// Pre-selected tags offered by each radio list.
        pub preselected: Vec<String>,
    }

    impl ScriptedDialog {
        pub fn new(answers: Vec<Answer>) -> Self {
            Self {
                answers: answers.into(),
                ..Self::default()
            }
        }

        pub fn remaining(&self) -> usize {
            self.answers.len()
        }

        fn next(&mut self) -> Result<Answer, DialogError> {
            match self.answers.pop_front() {
                Some(Answer::Cancel) => Err(DialogError::Cancelled),
                Some(answer) => Ok(answer),
                None => Err(DialogError::Backend("script exhausted".into())),
            }
        }
    }

    impl Dialog for ScriptedDialog {
        fn radiolist(
            &mut self,
            _text: &str,
            items: &[ChoiceItem],
            _title: &str,
        ) -> Result<String, DialogError> {
            if let Some(item) = items.iter().find(|i| i.selected) {
                self.preselected.push(item.tag.clone());
            }
            match self.next()? {
                Answer::Choice(tag) => Ok(tag),
                other => Err(DialogError::Backend(format!("unexpected answer {other:?}"))),
            }
        }

        fn checklist(
            &mut self,
            _text: &str,
            _items: &[ChoiceItem],
            _title: &str,
        ) -> Result<Vec<String>, DialogError> {
            match self.next()? {
                Answer::Choices(tags) => Ok(tags),
                other => Err(DialogError::Backend(format!("unexpected answer {other:?}"))),
            }
        }

        fn inputbox(&mut self, _text: &str, init: &str) -> Result<String, DialogError> {
            self.prefills.push(init.to_string());
            match self.next()? {
                Answer::Text(text) => Ok(text),
                Answer::Keep => Ok(init.to_string()),
                other => Err(DialogError::Backend(format!("unexpected answer {other:?}"))),
            }
        }

        fn integer_inputbox(&mut self, _text: &str, init: &str) -> Result<u32, DialogError> {
            self.prefills.push(init.to_string());
            match self.next()? {
                Answer::Integer(n) => Ok(n),
                Answer::Keep => init
                    .parse()
                    .map_err(|_| DialogError::Backend(format!("bad prefill '{init}'"))),
                other => Err(DialogError::Backend(format!("unexpected answer {other:?}"))),
            }
        }

        fn message(&mut self, text: &str, title: &str) -> Result<(), DialogError> {
            self.messages.push((title.to_string(), text.to_string()));
            Ok(())
        }

        fn scrollbox(&mut self, text: &str, title: &str) -> Result<(), DialogError> {
            self.scrolls.push((title.to_string(), text.to_string()));
            Ok(())
        }
    }
}
