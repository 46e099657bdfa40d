//! Channel topic banner shown while a deployment is in progress.
//!
//! The banner is prepended to the existing topic as
//! `:warning: <@U123> is deploying api v2 | original topic` and stripped
//! again on finish.

use deploybot_state::Deployment;

const MARKER: &str = ":warning:";
const SEPARATOR: &str = " | ";

/// `topic` with the banner for `deployment` in front, replacing any banner
/// already there.
pub fn decorate(topic: &str, deployment: &Deployment) -> String {
    // A `|` in the subject would be mistaken for the separator when stripping.
    let banner = format!(
        "{MARKER} <@{}> is deploying {}",
        deployment.operator.id,
        deployment.subject.replace('|', "/")
    );
    match undecorate(topic) {
        "" => banner,
        rest => format!("{banner}{SEPARATOR}{rest}"),
    }
}

/// `topic` with a leading deploy banner removed, if it has one.
pub fn undecorate(topic: &str) -> &str {
    if !topic.starts_with(MARKER) {
        return topic;
    }
    match topic.find(SEPARATOR) {
        Some(i) => &topic[i + SEPARATOR.len()..],
        None => "",
    }
}
