//! Line-oriented terminal implementation of [`Dialog`].

use std::io::IsTerminal;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use vigil_core::{ChoiceItem, Dialog, DialogError};

pub struct TerminalDialog {
    editor: DefaultEditor,
    backtitle: String,
    skin: termimad::MadSkin,
    #[cfg(unix)]
    saved_term: Option<nix::sys::termios::Termios>,
}

impl TerminalDialog {
    pub fn new(backtitle: &str) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            backtitle: backtitle.to_string(),
            skin: termimad::MadSkin::default(),
            #[cfg(unix)]
            saved_term: nix::sys::termios::tcgetattr(std::io::stdin()).ok(),
        })
    }

    fn header(&self, title: &str) {
        println!();
        if !self.backtitle.is_empty() {
            self.skin.print_text(&format!("*{}*", self.backtitle));
        }
        if !title.is_empty() {
            self.skin.print_text(&format!("## {title}"));
        }
    }

    fn read(&mut self, prompt: &str, initial: &str) -> Result<String, DialogError> {
        match self.editor.readline_with_initial(prompt, (initial, "")) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                Err(DialogError::Cancelled)
            }
            Err(ReadlineError::Io(e)) => Err(DialogError::Io(e)),
            Err(e) => Err(DialogError::Backend(e.to_string())),
        }
    }

    fn print_items(items: &[ChoiceItem], radio: bool) {
        for (i, item) in items.iter().enumerate() {
            let mark = match (radio, item.selected) {
                (true, true) => "(*)",
                (true, false) => "( )",
                (false, true) => "[x]",
                (false, false) => "[ ]",
            };
            println!("  {}) {mark} {:<16} {}", i + 1, item.tag, item.description);
        }
    }
}

#[cfg(unix)]
impl Drop for TerminalDialog {
    fn drop(&mut self) {
        if let Some(ref saved) = self.saved_term {
            let _ = nix::sys::termios::tcsetattr(
                std::io::stdin(),
                nix::sys::termios::SetArg::TCSADRAIN,
                saved,
            );
        }
    }
}

/// Resolve one token of a list answer (1-based number or tag) to an index.
fn resolve_choice(items: &[ChoiceItem], token: &str) -> Option<usize> {
    if let Ok(n) = token.parse::<usize>() {
        return (1..=items.len()).contains(&n).then(|| n - 1);
    }
    items.iter().position(|i| i.tag.eq_ignore_ascii_case(token))
}

fn parse_checklist(items: &[ChoiceItem], answer: &str) -> Option<Vec<usize>> {
    let mut picked = Vec::new();
    for token in answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let idx = resolve_choice(items, token)?;
        if !picked.contains(&idx) {
            picked.push(idx);
        }
    }
    picked.sort_unstable();
    Some(picked)
}

fn parse_positive(answer: &str) -> Option<u32> {
    answer.parse::<u32>().ok().filter(|n| *n > 0)
}

impl Dialog for TerminalDialog {
    fn radiolist(
        &mut self,
        text: &str,
        items: &[ChoiceItem],
        title: &str,
    ) -> Result<String, DialogError> {
        self.header(title);
        println!("{text}");
        Self::print_items(items, true);
        let initial = items
            .iter()
            .position(|i| i.selected)
            .map(|i| (i + 1).to_string())
            .unwrap_or_default();
        loop {
            let answer = self.read("> ", &initial)?;
            match resolve_choice(items, &answer) {
                Some(idx) => return Ok(items[idx].tag.clone()),
                None => println!("Enter a number between 1 and {}.", items.len()),
            }
        }
    }

    fn checklist(
        &mut self,
        text: &str,
        items: &[ChoiceItem],
        title: &str,
    ) -> Result<Vec<String>, DialogError> {
        self.header(title);
        println!("{text} (comma separated)");
        Self::print_items(items, false);
        let initial = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.selected)
            .map(|(i, _)| (i + 1).to_string())
            .collect::<Vec<_>>()
            .join(",");
        loop {
            let answer = self.read("> ", &initial)?;
            match parse_checklist(items, &answer) {
                Some(picked) => {
                    return Ok(picked.into_iter().map(|i| items[i].tag.clone()).collect())
                }
                None => println!("Unknown option in '{answer}'."),
            }
        }
    }

    fn inputbox(&mut self, text: &str, init: &str) -> Result<String, DialogError> {
        println!();
        println!("{text}");
        self.read("> ", init)
    }

    fn integer_inputbox(&mut self, text: &str, init: &str) -> Result<u32, DialogError> {
        println!();
        println!("{text}");
        loop {
            let answer = self.read("> ", init)?;
            match parse_positive(&answer) {
                Some(n) => return Ok(n),
                None => println!("Enter a positive whole number."),
            }
        }
    }

    fn message(&mut self, text: &str, title: &str) -> Result<(), DialogError> {
        self.header(title);
        println!("{}", text.trim_start_matches('\n'));
        self.read("[Enter] ", "").map(|_| ())
    }

    fn scrollbox(&mut self, text: &str, title: &str) -> Result<(), DialogError> {
        self.header(title);
        let lines: Vec<&str> = text.lines().collect();
        if !std::io::stdout().is_terminal() {
            println!("{text}");
            return Ok(());
        }

        let (_, height) = termimad::terminal_size();
        let page = usize::from(height).saturating_sub(4).max(5);
        for (n, chunk) in lines.chunks(page).enumerate() {
            for line in chunk {
                println!("{line}");
            }
            let last = (n + 1) * page >= lines.len();
            let prompt = if last { "[Enter] " } else { "-- more -- [Enter / q] " };
            let answer = self.read(prompt, "")?;
            if last || answer.eq_ignore_ascii_case("q") {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<ChoiceItem> {
        vec![
            ChoiceItem::new("minutes", "Time expressed in minutes", true),
            ChoiceItem::new("hours", "Time expressed in hours", false),
            ChoiceItem::new("days", "Time expressed in days", false),
        ]
    }

    #[test]
    fn test_resolve_by_number_and_tag() {
        let items = items();
        assert_eq!(resolve_choice(&items, "2"), Some(1));
        assert_eq!(resolve_choice(&items, "DAYS"), Some(2));
        assert_eq!(resolve_choice(&items, "0"), None);
        assert_eq!(resolve_choice(&items, "4"), None);
        assert_eq!(resolve_choice(&items, "weeks"), None);
    }

    #[test]
    fn test_parse_checklist() {
        let items = items();
        assert_eq!(parse_checklist(&items, "3, 1"), Some(vec![0, 2]));
        assert_eq!(parse_checklist(&items, "hours 2"), Some(vec![1]));
        assert_eq!(parse_checklist(&items, ""), Some(vec![]));
        assert_eq!(parse_checklist(&items, "1,9"), None);
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("15"), Some(15));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("-3"), None);
        assert_eq!(parse_positive("ten"), None);
    }
}
