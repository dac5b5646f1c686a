//! Commit message derivation for completed plan tasks.

/// Splits a cleaned title into heading and description.
const TITLE_SEPARATOR: &str = " - ";

/// Message for one task commit: a subject plus an optional body paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub subject: String,
    pub body: Option<String>,
}

impl CommitMessage {
    /// Full message as git would store it.
    pub fn render(&self) -> String {
        match &self.body {
            Some(body) => format!("{}\n\n{}", self.subject, body),
            None => self.subject.clone(),
        }
    }
}

/// Build the commit message for task `number` from its raw title.
///
/// `**Setup** - install deps` with scope `ralph` and number 2 becomes
/// subject `ralph: task 2 - Setup` and body `install deps`.
pub fn task_commit_message(scope: &str, number: usize, raw_title: &str) -> CommitMessage {
    let cleaned = raw_title.replace("**", "");
    let cleaned = cleaned.trim();
    let (heading, body) = match cleaned.split_once(TITLE_SEPARATOR) {
        Some((heading, description)) => {
            let description = description.trim();
            (
                heading.trim(),
                (!description.is_empty()).then(|| description.to_string()),
            )
        }
        None => (cleaned, None),
    };
    CommitMessage {
        subject: format!("{scope}: task {number} - {heading}"),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_bold_heading_and_description() {
        let msg = task_commit_message("ralph", 2, "**Setup** - install deps");
        assert_eq!(msg.subject, "ralph: task 2 - Setup");
        assert_eq!(msg.body.as_deref(), Some("install deps"));
        assert_eq!(msg.render(), "ralph: task 2 - Setup\n\ninstall deps");
    }

    #[test]
    fn title_without_separator_has_no_body() {
        let msg = task_commit_message("ralph", 7, "Write release notes");
        assert_eq!(msg.subject, "ralph: task 7 - Write release notes");
        assert_eq!(msg.body, None);
    }

    #[test]
    fn only_first_separator_splits() {
        let msg = task_commit_message("plan", 1, "API - add routes - and tests");
        assert_eq!(msg.subject, "plan: task 1 - API");
        assert_eq!(msg.body.as_deref(), Some("add routes - and tests"));
    }

    #[test]
    fn hyphenated_words_are_not_separators() {
        let msg = task_commit_message("ralph", 3, "Add end-to-end tests");
        assert_eq!(msg.subject, "ralph: task 3 - Add end-to-end tests");
        assert_eq!(msg.body, None);
    }
}
