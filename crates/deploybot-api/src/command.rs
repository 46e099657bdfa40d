//! Slash command grammar.
//!
//! `/deploy` with no text asks for status, `help` prints usage,
//! `done` (or `finish`) ends the caller's deployment, and any other text
//! starts a deployment with that text as its subject.

/// A parsed `/deploy` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Status,
    Help,
    Finish,
    Start(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Self {
        match text.trim() {
            "" => Command::Status,
            t if t.eq_ignore_ascii_case("help") => Command::Help,
            t if t.eq_ignore_ascii_case("done") || t.eq_ignore_ascii_case("finish") => {
                Command::Finish
            }
            subject => Command::Start(subject),
        }
    }
}

pub const USAGE: &str = "Usage:\n\
    • `/deploy <subject>` announce that you are deploying <subject>\n\
    • `/deploy done` announce that your deployment has finished\n\
    • `/deploy` show who is deploying right now\n\
    • `/deploy help` show this message";
