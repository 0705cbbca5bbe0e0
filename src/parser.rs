use std::fmt;

/// Most stages one pipeline may have. Exceeding this is a parse error,
/// never a runtime fault.
pub const MAX_STAGES: usize = 64;

/// Most argv entries one stage may have.
pub const MAX_ARGS: usize = 128;

/// One pipeline stage: the program with its arguments, plus any explicit
/// redirections. Consumed by the launcher when the stage is spawned.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stage {
    pub argv: Vec<String>,
    pub infile: Option<String>,
    pub outfile: Option<String>,
    pub out_append: bool,
    pub errfile: Option<String>,
}

/// A parsed command line: one or more stages joined by `|`, with the
/// literal line kept for job status reporting.
#[derive(Debug, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub line: String,
    pub background: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Redirect operator with no following filename.
    MissingTarget(&'static str),
    /// A `|` with nothing before or after it.
    EmptyStage,
    TooManyStages,
    TooManyArgs,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingTarget(op) => write!(f, "syntax error: {op} without file"),
            ParseError::EmptyStage => write!(f, "syntax error near '|'"),
            ParseError::TooManyStages => write!(f, "too many pipeline stages (max {MAX_STAGES})"),
            ParseError::TooManyArgs => write!(f, "too many arguments (max {MAX_ARGS})"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Pad redirect and pipe operators with spaces so a plain whitespace
/// split yields them as standalone tokens (`echo hi>out` → `echo hi > out`).
fn space_operators(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c @ ('|' | '<') => {
                out.push(' ');
                out.push(c);
                out.push(' ');
            }
            '>' => {
                if chars.get(i + 1) == Some(&'>') {
                    out.push_str(" >> ");
                    i += 1;
                } else {
                    out.push_str(" > ");
                }
            }
            '2' if chars.get(i + 1) == Some(&'>') => {
                out.push_str(" 2> ");
                i += 1;
            }
            c => out.push(c),
        }
        i += 1;
    }

    out
}

fn redirect_target(
    tokens: &[String],
    index: usize,
    op: &'static str,
) -> Result<String, ParseError> {
    tokens
        .get(index)
        .cloned()
        .ok_or(ParseError::MissingTarget(op))
}

/// Parse one input line into a pipeline. `Ok(None)` means there was
/// nothing to run (blank line, or a lone `&`).
pub fn parse(input: &str) -> Result<Option<Pipeline>, ParseError> {
    let line = input.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let spaced = space_operators(line);
    let mut tokens: Vec<String> = spaced.split_whitespace().map(str::to_string).collect();

    // A trailing `&` requests background mode; anywhere else it is an
    // ordinary argument.
    let background = tokens.last().is_some_and(|t| t == "&");
    if background {
        tokens.pop();
    }
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut stages: Vec<Stage> = vec![Stage::default()];
    let mut i = 0;
    while i < tokens.len() {
        let stage = stages.last_mut().unwrap();
        match tokens[i].as_str() {
            "|" => {
                if stage.argv.is_empty() {
                    return Err(ParseError::EmptyStage);
                }
                if stages.len() >= MAX_STAGES {
                    return Err(ParseError::TooManyStages);
                }
                stages.push(Stage::default());
            }
            "<" => {
                i += 1;
                stage.infile = Some(redirect_target(&tokens, i, "<")?);
            }
            ">" => {
                i += 1;
                stage.outfile = Some(redirect_target(&tokens, i, ">")?);
                stage.out_append = false;
            }
            ">>" => {
                i += 1;
                stage.outfile = Some(redirect_target(&tokens, i, ">>")?);
                stage.out_append = true;
            }
            "2>" => {
                i += 1;
                stage.errfile = Some(redirect_target(&tokens, i, "2>")?);
            }
            arg => {
                if stage.argv.len() >= MAX_ARGS {
                    return Err(ParseError::TooManyArgs);
                }
                stage.argv.push(arg.to_string());
            }
        }
        i += 1;
    }

    if stages.last().unwrap().argv.is_empty() {
        return Err(ParseError::EmptyStage);
    }

    // Display text is the literal line minus the background marker.
    let display = if background {
        line.trim_end_matches('&').trim_end().to_string()
    } else {
        line.to_string()
    };

    Ok(Some(Pipeline {
        stages,
        line: display,
        background,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &str) -> Pipeline {
        parse(input).unwrap().unwrap()
    }

    #[test]
    fn simple_command() {
        let p = parse_one("echo hello world");
        assert_eq!(p.stages.len(), 1);
        assert_eq!(p.stages[0].argv, vec!["echo", "hello", "world"]);
        assert!(!p.background);
        assert_eq!(p.line, "echo hello world");
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   \t ").unwrap(), None);
        assert_eq!(parse("&").unwrap(), None);
    }

    #[test]
    fn three_stage_pipeline() {
        let p = parse_one("cat f | sort | uniq -c");
        assert_eq!(p.stages.len(), 3);
        assert_eq!(p.stages[0].argv, vec!["cat", "f"]);
        assert_eq!(p.stages[1].argv, vec!["sort"]);
        assert_eq!(p.stages[2].argv, vec!["uniq", "-c"]);
    }

    #[test]
    fn unspaced_operators_become_tokens() {
        let p = parse_one("echo hi>out.txt");
        assert_eq!(p.stages[0].argv, vec!["echo", "hi"]);
        assert_eq!(p.stages[0].outfile.as_deref(), Some("out.txt"));
        assert!(!p.stages[0].out_append);

        let p = parse_one("sort<data|head -1");
        assert_eq!(p.stages.len(), 2);
        assert_eq!(p.stages[0].infile.as_deref(), Some("data"));
    }

    #[test]
    fn append_and_stderr_redirects() {
        let p = parse_one("cmd >> log.txt 2> err.txt");
        assert_eq!(p.stages[0].outfile.as_deref(), Some("log.txt"));
        assert!(p.stages[0].out_append);
        assert_eq!(p.stages[0].errfile.as_deref(), Some("err.txt"));
    }

    #[test]
    fn trailing_ampersand_sets_background() {
        let p = parse_one("sleep 5 &");
        assert!(p.background);
        assert_eq!(p.stages[0].argv, vec!["sleep", "5"]);
        assert_eq!(p.line, "sleep 5");
    }

    #[test]
    fn ampersand_mid_line_is_an_argument() {
        let p = parse_one("echo a & b");
        assert!(!p.background);
        assert_eq!(p.stages[0].argv, vec!["echo", "a", "&", "b"]);
    }

    #[test]
    fn missing_redirect_target_is_error() {
        assert_eq!(parse("echo >").unwrap_err(), ParseError::MissingTarget(">"));
        assert_eq!(parse("sort <").unwrap_err(), ParseError::MissingTarget("<"));
        assert_eq!(
            parse("cmd 2>").unwrap_err(),
            ParseError::MissingTarget("2>")
        );
    }

    #[test]
    fn empty_stage_is_error() {
        assert_eq!(parse("a | | b").unwrap_err(), ParseError::EmptyStage);
        assert_eq!(parse("| b").unwrap_err(), ParseError::EmptyStage);
        assert_eq!(parse("a |").unwrap_err(), ParseError::EmptyStage);
    }

    #[test]
    fn stage_cap_is_enforced() {
        let line = vec!["x"; MAX_STAGES + 1].join(" | ");
        assert_eq!(parse(&line).unwrap_err(), ParseError::TooManyStages);

        let line = vec!["x"; MAX_STAGES].join(" | ");
        assert_eq!(parse(&line).unwrap().unwrap().stages.len(), MAX_STAGES);
    }

    #[test]
    fn arg_cap_is_enforced() {
        let line = vec!["a"; MAX_ARGS + 1].join(" ");
        assert_eq!(parse(&line).unwrap_err(), ParseError::TooManyArgs);
    }

    #[test]
    fn redirect_on_pipeline_stage() {
        let p = parse_one("cat < in.txt | tr a b > out.txt");
        assert_eq!(p.stages[0].infile.as_deref(), Some("in.txt"));
        assert_eq!(p.stages[1].outfile.as_deref(), Some("out.txt"));
    }
}
