const DEFAULT_DELIMITER: &str = ";";
const DELIMITER_DIRECTIVE: &str = "DELIMITER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Tracks `BEGIN`/`END` nesting of a `CREATE [TEMP] TRIGGER` statement so
/// the delimiters inside its body do not end the statement.
#[derive(Debug, Default)]
struct TriggerBody {
    leading: Vec<String>,
    is_trigger: bool,
    depth: usize,
}

impl TriggerBody {
    fn observe(&mut self, word: &str) {
        let upper = word.to_ascii_uppercase();
        if self.leading.len() < 3 {
            self.leading.push(upper.clone());
            self.is_trigger = starts_trigger(&self.leading);
        }
        if !self.is_trigger {
            return;
        }
        match upper.as_str() {
            "BEGIN" => self.depth += 1,
            "CASE" if self.depth > 0 => self.depth += 1,
            "END" if self.depth > 0 => self.depth -= 1,
            _ => {}
        }
    }

    fn is_open(&self) -> bool {
        self.is_trigger && self.depth > 0
    }
}

fn starts_trigger(words: &[String]) -> bool {
    match words {
        [create, trigger, ..] if create == "CREATE" && trigger == "TRIGGER" => true,
        [create, temp, trigger, ..] => {
            create == "CREATE" && (temp == "TEMP" || temp == "TEMPORARY") && trigger == "TRIGGER"
        }
        _ => false,
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Splits a raw script into trimmed statements.
///
/// Delimiters inside quoted strings, quoted identifiers and comments are
/// ignored. Comments are dropped from the output. A `DELIMITER <token>` line
/// switches the active delimiter. Native trigger bodies
/// (`CREATE TRIGGER ... BEGIN ...; END;`) stay in one statement.
pub fn split_sql_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut delimiter = DEFAULT_DELIMITER.to_string();
    let mut current = String::new();
    let mut scan = Scan::Code;
    let mut trigger = TriggerBody::default();
    let mut index = 0;

    while index < script.len() {
        let rest = &script[index..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        match scan {
            Scan::Code => {
                if current.trim().is_empty() {
                    if let Some((consumed, next)) = parse_delimiter_directive(rest) {
                        current.clear();
                        trigger = TriggerBody::default();
                        delimiter = next;
                        index += consumed;
                        continue;
                    }
                }
                if rest.starts_with(delimiter.as_str()) {
                    if trigger.is_open() {
                        current.push_str(&delimiter);
                    } else {
                        push_statement(&mut statements, &mut current);
                        trigger = TriggerBody::default();
                    }
                    index += delimiter.len();
                    continue;
                }
                if (ch.is_ascii_alphabetic() || ch == '_')
                    && !current.ends_with(is_word_char)
                {
                    let len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
                    let word = &rest[..len];
                    trigger.observe(word);
                    current.push_str(word);
                    index += len;
                    continue;
                }
                if rest.starts_with("--") || ch == '#' {
                    scan = Scan::LineComment;
                } else if rest.starts_with("/*") {
                    scan = Scan::BlockComment;
                    index += 2;
                    continue;
                } else {
                    if matches!(ch, '\'' | '"' | '`') {
                        scan = Scan::Quoted(ch);
                    }
                    current.push(ch);
                }
                index += ch.len_utf8();
            }
            Scan::Quoted(quote) => {
                current.push(ch);
                index += ch.len_utf8();
                if ch == quote {
                    // doubled quote is an escaped quote, not a terminator
                    if script[index..].starts_with(quote) {
                        current.push(quote);
                        index += quote.len_utf8();
                    } else {
                        scan = Scan::Code;
                    }
                }
            }
            Scan::LineComment => {
                if ch == '\n' {
                    current.push('\n');
                    scan = Scan::Code;
                }
                index += ch.len_utf8();
            }
            Scan::BlockComment => {
                if rest.starts_with("*/") {
                    current.push(' ');
                    scan = Scan::Code;
                    index += 2;
                } else {
                    index += ch.len_utf8();
                }
            }
        }
    }

    push_statement(&mut statements, &mut current);
    statements
}

fn parse_delimiter_directive(rest: &str) -> Option<(usize, String)> {
    let keyword = rest.get(..DELIMITER_DIRECTIVE.len())?;
    if !keyword.eq_ignore_ascii_case(DELIMITER_DIRECTIVE) {
        return None;
    }

    let after = &rest[DELIMITER_DIRECTIVE.len()..];
    if !after.starts_with(|ch: char| ch == ' ' || ch == '\t') {
        return None;
    }

    let line_len = after.find('\n').map(|pos| pos + 1).unwrap_or(after.len());
    let token = after[..line_len].trim();
    if token.is_empty() {
        return None;
    }
    Some((DELIMITER_DIRECTIVE.len() + line_len, token.to_string()))
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}
