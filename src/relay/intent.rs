//! Keyword intent routing.

use std::fmt;

/// What an inbound message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    AskUsername,
    CashIn,
    Confirm,
    SplitRecharge,
    SingleRecharge,
    Cashout,
    Support,
    Fallback,
}

/// Classify a message. First match wins, in this order:
/// greeting, username, cash.app link, literal "yes", split, game name,
/// cashout, support, fallback.
pub fn classify(text: &str) -> Intent {
    let text = text.trim().to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&["hi", "hello"]) {
        Intent::Greeting
    } else if has(&["username"]) {
        Intent::AskUsername
    } else if has(&["cash.app"]) {
        Intent::CashIn
    } else if text == "yes" {
        Intent::Confirm
    } else if has(&["split"]) {
        Intent::SplitRecharge
    } else if has(&["gamea", "gameb"]) {
        Intent::SingleRecharge
    } else if has(&["cashout"]) {
        Intent::Cashout
    } else if has(&["support", "help", "issue"]) {
        Intent::Support
    } else {
        Intent::Fallback
    }
}

/// Supported games.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Game {
    GameA,
    GameB,
}

/// Words that can sit between a game name and the username.
const FILLER: &[&str] = &["username", "user", "name", "is", "for", "on", "in", "to", "as", "-"];

impl Game {
    fn keyword(self) -> &'static str {
        match self {
            Game::GameA => "gamea",
            Game::GameB => "gameb",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Game::GameA => "GameA",
            Game::GameB => "GameB",
        }
    }

    /// First game mentioned in `text`, GameA taking priority.
    pub fn find(text: &str) -> Option<Game> {
        let text = text.to_lowercase();
        [Game::GameA, Game::GameB]
            .into_iter()
            .find(|g| text.contains(g.keyword()))
    }

    /// The word after this game's name, skipping filler and dollar amounts.
    pub fn username_in(self, text: &str) -> Option<String> {
        let words: Vec<&str> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| matches!(c, ':' | ',' | ';' | '.' | '!' | '?')))
            .filter(|w| !w.is_empty())
            .collect();

        let start = words
            .iter()
            .position(|w| w.to_lowercase().contains(self.keyword()))?;

        words[start + 1..]
            .iter()
            .find(|w| !w.starts_with('$') && !FILLER.contains(&w.to_lowercase().as_str()))
            .map(|w| w.to_string())
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
