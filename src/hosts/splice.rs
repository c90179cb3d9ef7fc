//! Replacement and removal of a single `Host` block inside config text
//!
//! The scan is a two-state machine over the lines of the file. Lines outside
//! the target block are copied untouched; the target block is dropped and the
//! replacement, if any, is emitted once at the point where the block ends.

use super::parser::host_patterns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InsideTarget,
}

#[derive(Debug)]
struct Splicer<'a> {
    alias: &'a str,
    state: State,
    /// Trimmed replacement; taken on first emission.
    pending: Option<&'a str>,
    out: Vec<&'a str>,
}

impl<'a> Splicer<'a> {
    fn new(alias: &'a str, replacement: &'a str) -> Self {
        let replacement = replacement.trim();
        Self {
            alias,
            state: State::Outside,
            pending: (!replacement.is_empty()).then_some(replacement),
            out: Vec::new(),
        }
    }

    fn feed(&mut self, line: &'a str) {
        if let Some(patterns) = host_patterns(line) {
            if patterns.contains(&self.alias) {
                self.state = State::InsideTarget;
                return;
            }
            if self.state == State::InsideTarget {
                self.leave_block();
            }
        }

        if self.state == State::Outside {
            self.out.push(line);
        }
    }

    fn leave_block(&mut self) {
        self.state = State::Outside;
        if let Some(replacement) = self.pending.take() {
            self.out.push(replacement);
            self.out.push("");
        }
    }

    fn finish(mut self) -> String {
        if self.state == State::InsideTarget {
            self.leave_block();
        }
        self.out.join("\n")
    }
}

/// Replace the block for `alias` with `replacement`, or delete it when the
/// replacement is empty.
///
/// A `Host` line matches when any of its patterns equals `alias`. When several
/// blocks match, every one of them is dropped and the replacement lands where
/// the first run of matching blocks ends.
pub fn splice_block(text: &str, alias: &str, replacement: &str) -> String {
    let mut splicer = Splicer::new(alias, replacement);
    for line in text.split('\n') {
        splicer.feed(line);
    }
    splicer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::{format_block, lookup_by_alias, parse_entries, HostEntry};

    const CONFIG: &str = "# managed by hand
Host *
    ServerAliveInterval 60

Host keep
    HostName keep.example.com

Host edit
    HostName old.example.com
    User olduser

Host tail
    User last
";

    #[test]
    fn test_replace_middle_block_preserves_surroundings() {
        let replacement = format_block(&HostEntry::new("edit").with_host_name("new.example.com"));
        let result = splice_block(CONFIG, "edit", &replacement);

        assert_eq!(
            result,
            "# managed by hand
Host *
    ServerAliveInterval 60

Host keep
    HostName keep.example.com

Host edit
    HostName new.example.com

Host tail
    User last
"
        );
    }

    #[test]
    fn test_replace_last_block() {
        let replacement = format_block(&HostEntry::new("tail").with_user("first"));
        let result = splice_block(CONFIG, "tail", &replacement);

        assert!(result.starts_with(&CONFIG[..CONFIG.find("Host tail").unwrap()]));
        assert!(result.ends_with("Host tail\n    User first\n"));
    }

    #[test]
    fn test_delete_block() {
        let result = splice_block(CONFIG, "edit", "");

        assert!(lookup_by_alias(&result, "edit").is_err());
        assert!(!result.contains("old.example.com"));
        assert!(result.contains("Host keep\n    HostName keep.example.com\n\nHost tail"));
    }

    #[test]
    fn test_delete_keeps_wildcard_block() {
        let result = splice_block(CONFIG, "keep", "");
        assert!(result.contains("Host *\n    ServerAliveInterval 60\n"));
    }

    #[test]
    fn test_splice_is_idempotent() {
        for alias in ["keep", "edit", "tail"] {
            let replacement = format_block(&HostEntry::new(alias).with_port("2022"));
            let once = splice_block(CONFIG, alias, &replacement);
            let twice = splice_block(&once, alias, &replacement);
            assert_eq!(once, twice, "alias {alias}");
            assert_eq!(once.matches(&format!("Host {alias}\n")).count(), 1);
        }
    }

    #[test]
    fn test_splice_without_trailing_blank_line_is_idempotent() {
        let text = "Host a\n    User x\nHost b\n    User y";
        let replacement = format_block(&HostEntry::new("a").with_user("z"));

        let once = splice_block(text, "a", &replacement);
        assert_eq!(once, "Host a\n    User z\n\nHost b\n    User y");
        assert_eq!(splice_block(&once, "a", &replacement), once);
    }

    #[test]
    fn test_round_trip_through_parse_and_format() {
        let original = parse_entries(CONFIG)
            .into_iter()
            .find(|e| e.alias == "edit")
            .unwrap()
            .with_option("ProxyJump", "bastion");

        let result = splice_block(CONFIG, "edit", &format_block(&original));
        let reparsed = lookup_by_alias(&result, "edit").unwrap();

        assert_eq!(reparsed, original);
        for other in ["keep", "tail"] {
            assert_eq!(
                lookup_by_alias(&result, other).unwrap(),
                lookup_by_alias(CONFIG, other).unwrap()
            );
        }
    }

    #[test]
    fn test_multi_pattern_line_matches_any_token() {
        let text = "Host web web.prod\n    User www\n\nHost db\n    User pg\n";
        let result = splice_block(text, "web.prod", "");
        assert_eq!(result, "Host db\n    User pg\n");
    }

    #[test]
    fn test_absent_alias_is_a_no_op() {
        let replacement = format_block(&HostEntry::new("ghost").with_user("nobody"));
        assert_eq!(splice_block(CONFIG, "ghost", &replacement), CONFIG);
    }

    #[test]
    fn test_replacement_emitted_once_for_adjacent_matches() {
        let text = "Host a\n    User one\nHost a b\n    User two\nHost c\n    User three\n";
        let replacement = format_block(&HostEntry::new("a").with_user("new"));

        let result = splice_block(text, "a", &replacement);
        assert_eq!(result, "Host a\n    User new\n\nHost c\n    User three\n");
    }
}
