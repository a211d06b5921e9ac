//! Control-mode line parser
//!
//! Notifications start with `%`. Replies to commands arrive between
//! `%begin <time> <number> <flags>` and a matching `%end` or `%error`; the
//! lines in between are the command's output, never pane output.

use super::escape::unescape;

/// What one control-mode line means to the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Output bytes from a pane, unescaped
    Output { pane_id: String, data: Vec<u8> },
    /// A command reply: body lines, or the error text
    Reply(Result<Vec<String>, String>),
    /// Focus or layout may have moved
    FocusHint,
    /// The control client is detaching
    Exit(Option<String>),
}

/// Stateful parser; tracks whether a reply is open
#[derive(Debug, Default)]
pub struct ControlParser {
    reply: Option<OpenReply>,
}

#[derive(Debug)]
struct OpenReply {
    /// `<time> <number>` from `%begin`, matched against the closing line
    tag: String,
    body: Vec<String>,
}

impl ControlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a `%begin` is waiting for its `%end`/`%error`
    pub fn in_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Feed one line (without its newline)
    pub fn feed(&mut self, line: &[u8]) -> Option<ControlEvent> {
        if let Some(reply) = self.reply.as_mut() {
            for (keyword, ok) in [(&b"%end "[..], true), (&b"%error "[..], false)] {
                if line.starts_with(keyword) && reply_tag(&line[keyword.len()..]) == reply.tag {
                    let body = std::mem::take(&mut reply.body);
                    self.reply = None;
                    return Some(ControlEvent::Reply(if ok {
                        Ok(body)
                    } else {
                        Err(body.join("\n"))
                    }));
                }
            }
            reply.body.push(String::from_utf8_lossy(line).into_owned());
            return None;
        }

        let (keyword, rest) = split_word(line);
        match keyword {
            b"%begin" => {
                self.reply = Some(OpenReply {
                    tag: reply_tag(rest),
                    body: Vec::new(),
                });
                None
            }
            b"%output" => {
                let (pane, data) = split_word(rest);
                pane_output(pane, data)
            }
            b"%extended-output" => {
                let (pane, rest) = split_word(rest);
                // <age> [reserved...] : <data>
                let sep = rest.windows(3).position(|w| w == b" : ")?;
                pane_output(pane, &rest[sep + 3..])
            }
            b"%exit" => {
                let reason = String::from_utf8_lossy(rest).trim().to_string();
                Some(ControlEvent::Exit((!reason.is_empty()).then_some(reason)))
            }
            b"%window-pane-changed" | b"%session-window-changed" | b"%layout-change" => {
                Some(ControlEvent::FocusHint)
            }
            _ => None,
        }
    }
}

fn pane_output(pane: &[u8], data: &[u8]) -> Option<ControlEvent> {
    if pane.first() != Some(&b'%') {
        return None;
    }
    Some(ControlEvent::Output {
        pane_id: String::from_utf8_lossy(pane).into_owned(),
        data: unescape(data),
    })
}

/// First space-separated word and the remainder after the space
fn split_word(line: &[u8]) -> (&[u8], &[u8]) {
    match line.iter().position(|b| *b == b' ') {
        Some(i) => (&line[..i], &line[i + 1..]),
        None => (line, &[]),
    }
}

fn reply_tag(fields: &[u8]) -> String {
    let text = String::from_utf8_lossy(fields);
    text.split(' ').take(2).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut ControlParser, lines: &[&[u8]]) -> Vec<ControlEvent> {
        lines.iter().filter_map(|l| parser.feed(l)).collect()
    }

    // ==================== Output ====================

    #[test]
    fn test_output_is_unescaped() {
        let mut parser = ControlParser::new();
        assert_eq!(
            parser.feed(br"%output %3 hi\015\012\033[1m"),
            Some(ControlEvent::Output {
                pane_id: "%3".into(),
                data: b"hi\r\n\x1b[1m".to_vec(),
            })
        );
    }

    #[test]
    fn test_output_keeps_spaces_in_data() {
        let mut parser = ControlParser::new();
        assert_eq!(
            parser.feed(b"%output %1 a b  c"),
            Some(ControlEvent::Output {
                pane_id: "%1".into(),
                data: b"a b  c".to_vec(),
            })
        );
    }

    #[test]
    fn test_extended_output() {
        let mut parser = ControlParser::new();
        assert_eq!(
            parser.feed(br"%extended-output %7 1200 : late\n"),
            Some(ControlEvent::Output {
                pane_id: "%7".into(),
                data: b"late\n".to_vec(),
            })
        );
        assert_eq!(parser.feed(b"%extended-output %7 1200"), None);
    }

    // ==================== Replies ====================

    #[test]
    fn test_reply_body_is_collected_not_streamed() {
        let mut parser = ControlParser::new();
        let events = feed_all(
            &mut parser,
            &[
                b"%begin 1700000000 12 1",
                b"%output %1 not-output",
                b"line two",
                b"%end 1700000000 12 1",
                b"%output %1 real",
            ],
        );
        assert_eq!(
            events,
            vec![
                ControlEvent::Reply(Ok(vec!["%output %1 not-output".into(), "line two".into()])),
                ControlEvent::Output {
                    pane_id: "%1".into(),
                    data: b"real".to_vec()
                },
            ]
        );
        assert!(!parser.in_reply());
    }

    #[test]
    fn test_error_reply() {
        let mut parser = ControlParser::new();
        let events = feed_all(
            &mut parser,
            &[b"%begin 5 3 1", b"can't find pane: %9", b"%error 5 3 1"],
        );
        assert_eq!(
            events,
            vec![ControlEvent::Reply(Err("can't find pane: %9".into()))]
        );
    }

    #[test]
    fn test_end_with_other_tag_is_body() {
        let mut parser = ControlParser::new();
        let events = feed_all(
            &mut parser,
            &[b"%begin 5 3 1", b"%end 9 9 9", b"%end 5 3 1"],
        );
        assert_eq!(events, vec![ControlEvent::Reply(Ok(vec!["%end 9 9 9".into()]))]);
    }

    // ==================== Notifications ====================

    #[test]
    fn test_exit_and_focus_hints() {
        let mut parser = ControlParser::new();
        assert_eq!(parser.feed(b"%exit"), Some(ControlEvent::Exit(None)));
        assert_eq!(
            parser.feed(b"%exit server exited"),
            Some(ControlEvent::Exit(Some("server exited".into())))
        );
        assert_eq!(
            parser.feed(b"%window-pane-changed @1 %2"),
            Some(ControlEvent::FocusHint)
        );
        assert_eq!(
            parser.feed(b"%session-window-changed $0 @3"),
            Some(ControlEvent::FocusHint)
        );
        assert_eq!(parser.feed(b"%layout-change @1 abcd"), Some(ControlEvent::FocusHint));
    }

    #[test]
    fn test_unknown_lines_ignored() {
        let mut parser = ControlParser::new();
        assert_eq!(parser.feed(b"%sessions-changed"), None);
        assert_eq!(parser.feed(b"%window-add @4"), None);
        assert_eq!(parser.feed(b"stray text"), None);
        assert_eq!(parser.feed(b""), None);
    }
}
