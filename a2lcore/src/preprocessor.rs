use crate::A2lError;
use crate::linemap::{LineMap, RawLineMap};
use crate::loader::{self, Encoding};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PreprocessorError {
    #[error("{filename}:{line}: included file {incname} was not found")]
    IncludeNotFound {
        filename: String,
        line: u32,
        incname: String,
    },

    #[error("{filename}:{line}: file {incname} includes itself")]
    CircularInclude {
        filename: String,
        line: u32,
        incname: String,
    },

    #[error("{filename}:{line}: Include directive was not followed by a filename")]
    IncompleteInclude { filename: String, line: u32 },

    #[error("{filename}:{line}: Failed to load included file {incname}: {cause}")]
    IncludeLoadError {
        filename: String,
        line: u32,
        incname: String,
        cause: Box<A2lError>,
    },

    #[error("{filename}:{line}: Block comment was not closed before the end of input was reached")]
    UnclosedComment { filename: String, line: u32 },

    #[error("line {line}: {section} section was not closed before the end of input was reached")]
    UnterminatedSection { section: String, line: u32 },
}

/// The output of the line scanner: comment-free text with all includes resolved
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// one entry per output line
    pub lines: Vec<String>,
    /// maps each output line back to its source
    pub line_map: LineMap,
}

// state of the comment stripper that carries over from one line to the next
#[derive(Debug, Default)]
struct CommentState {
    in_block_comment: bool,
    in_string: bool,
    comment_start: u32,
}

struct LineScanner<'a> {
    encoding: Encoding,
    include_paths: &'a [PathBuf],
    // canonical names of all files that are currently being processed
    include_stack: Vec<PathBuf>,
    output: Vec<String>,
    raw_map: RawLineMap,
}

/// preprocess an a2l file
///
/// Comments are removed and `/include` directives are replaced by the content of the included file.
///
/// # Errors
///
/// Loading the top level file can fail with `FileOpenError`, `FileReadError` or `EncodingError`. All
/// other problems are reported as [`A2lError::PreprocessorError`].
pub fn preprocess_file(
    path: &Path,
    encoding: Encoding,
    include_paths: &[PathBuf],
) -> Result<Preprocessed, A2lError> {
    let text = loader::load(path, encoding)?;
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let mut scanner = LineScanner::new(encoding, include_paths);
    scanner.include_stack.push(canonical.clone());
    let name = canonical.to_string_lossy().to_string();
    scanner.scan_text(&text, &name, Some(&canonical))?;
    Ok(scanner.finish())
}

/// preprocess a2l text that is held in memory
///
/// `name` is used as the file name in the line map and in error messages.
/// Relative includes are resolved against the working directory and the include paths.
///
/// # Errors
///
/// Any problem with comments or include files is reported as [`A2lError::PreprocessorError`].
pub fn preprocess_str(
    text: &str,
    name: &str,
    encoding: Encoding,
    include_paths: &[PathBuf],
) -> Result<Preprocessed, A2lError> {
    let mut scanner = LineScanner::new(encoding, include_paths);
    scanner.scan_text(text, name, None)?;
    Ok(scanner.finish())
}

/// remove all comments from a text
///
/// Line comments are truncated, block comments inside a line are replaced by
/// spaces and block comment lines become empty, so the number of lines stays the same.
/// Comment markers inside string literals are ignored.
#[must_use]
pub fn strip_comments(text: &str) -> String {
    let mut state = CommentState::default();
    text.lines()
        .map(|line| strip_line_comments(line, &mut state))
        .collect::<Vec<_>>()
        .join("\n")
}

impl<'a> LineScanner<'a> {
    fn new(encoding: Encoding, include_paths: &'a [PathBuf]) -> Self {
        Self {
            encoding,
            include_paths,
            include_stack: Vec::new(),
            output: Vec::new(),
            raw_map: RawLineMap::new(),
        }
    }

    fn finish(self) -> Preprocessed {
        Preprocessed {
            lines: self.output,
            line_map: LineMap::build(self.raw_map),
        }
    }

    // the line number that the next output line will get
    fn next_output_line(&self) -> u32 {
        self.output.len() as u32 + 1
    }

    // scan_text()
    // strip the comments of every line and splice in the content of included files
    fn scan_text(
        &mut self,
        text: &str,
        filename: &str,
        location: Option<&Path>,
    ) -> Result<(), A2lError> {
        let mut state = CommentState::default();
        let mut span_start = self.next_output_line();
        let mut span_rel_start = 0;

        for (idx, raw_line) in text.lines().enumerate() {
            let line = idx as u32 + 1;
            let starts_in_string = state.in_string;
            if !state.in_block_comment {
                state.comment_start = line;
            }
            let cleaned = strip_line_comments(raw_line, &mut state);

            let directive = if starts_in_string {
                None
            } else {
                parse_include_directive(&cleaned).map_err(|()| {
                    preprocessor_error(PreprocessorError::IncompleteInclude {
                        filename: filename.to_string(),
                        line,
                    })
                })?
            };

            if let Some((incname, remainder)) = directive {
                // the directive line itself stays in the output, so that the numbering of the
                // includer continues seamlessly after the included content
                self.output.push(remainder);
                self.raw_map
                    .add_span(filename, span_start, self.next_output_line(), span_rel_start);

                self.include_file(&incname, filename, line, location)?;

                span_start = self.next_output_line();
                span_rel_start = line;
            } else {
                self.output.push(cleaned);
            }
        }

        if state.in_block_comment {
            return Err(preprocessor_error(PreprocessorError::UnclosedComment {
                filename: filename.to_string(),
                line: state.comment_start,
            }));
        }

        self.raw_map
            .add_span(filename, span_start, self.next_output_line(), span_rel_start);
        Ok(())
    }

    // include_file()
    // locate, load and scan one included file
    fn include_file(
        &mut self,
        incname: &str,
        filename: &str,
        line: u32,
        location: Option<&Path>,
    ) -> Result<(), A2lError> {
        let Some(incpath) = loader::resolve_include(incname, location, self.include_paths) else {
            return Err(preprocessor_error(PreprocessorError::IncludeNotFound {
                filename: filename.to_string(),
                line,
                incname: incname.to_string(),
            }));
        };
        let canonical = incpath.canonicalize().unwrap_or(incpath);

        if self.include_stack.contains(&canonical) {
            return Err(preprocessor_error(PreprocessorError::CircularInclude {
                filename: filename.to_string(),
                line,
                incname: incname.to_string(),
            }));
        }

        let inctext = loader::load(&canonical, self.encoding).map_err(|err| {
            preprocessor_error(PreprocessorError::IncludeLoadError {
                filename: filename.to_string(),
                line,
                incname: incname.to_string(),
                cause: Box::new(err),
            })
        })?;

        let incfilename = canonical.to_string_lossy().to_string();
        self.include_stack.push(canonical.clone());
        let result = self.scan_text(&inctext, &incfilename, Some(&canonical));
        self.include_stack.pop();
        result
    }
}

fn preprocessor_error(preprocessor_error: PreprocessorError) -> A2lError {
    A2lError::PreprocessorError { preprocessor_error }
}

// strip_line_comments()
// Remove the comments from one line.
// If a line comment and a block comment both start on the line, the one that starts first wins.
fn strip_line_comments(line: &str, state: &mut CommentState) -> String {
    let bytes = line.as_bytes();
    let datalen = bytes.len();
    let mut out = String::with_capacity(datalen);
    let mut bytepos = 0;

    if state.in_block_comment {
        match line.find("*/") {
            Some(endpos) => {
                out.push_str(&blank(&line[..endpos + 2]));
                bytepos = endpos + 2;
                state.in_block_comment = false;
            }
            None => return String::new(),
        }
    }

    let mut copypos = bytepos;
    while bytepos < datalen {
        let c = bytes[bytepos];
        if state.in_string {
            if c == b'\\' {
                // skip the escaped character
                bytepos += 2;
                continue;
            }
            if c == b'"' {
                if bytepos + 1 < datalen && bytes[bytepos + 1] == b'"' {
                    // "" is an escaped quote
                    bytepos += 2;
                    continue;
                }
                state.in_string = false;
            }
            bytepos += 1;
        } else if c == b'"' {
            state.in_string = true;
            bytepos += 1;
        } else if bytes[bytepos..].starts_with(b"//") {
            out.push_str(&line[copypos..bytepos]);
            copypos = datalen;
            break;
        } else if bytes[bytepos..].starts_with(b"/*") {
            out.push_str(&line[copypos..bytepos]);
            if let Some(endpos) = line[bytepos + 2..].find("*/") {
                let endpos = bytepos + 2 + endpos + 2;
                out.push_str(&blank(&line[bytepos..endpos]));
                bytepos = endpos;
                copypos = endpos;
            } else {
                state.in_block_comment = true;
                copypos = datalen;
                break;
            }
        } else {
            bytepos += 1;
        }
    }
    if copypos < datalen {
        out.push_str(&line[copypos..]);
    }

    out
}

// one space per character of the comment, so that columns after the comment are unchanged
fn blank(text: &str) -> String {
    " ".repeat(text.chars().count())
}

// parse_include_directive()
// If the line is an include directive, return the file name and the replacement text for the line.
// The replacement keeps anything that follows the file name.
fn parse_include_directive(line: &str) -> Result<Option<(String, String)>, ()> {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix("/include") else {
        return Ok(None);
    };
    if rest.starts_with(|c: char| !c.is_whitespace() && c != '"') {
        // e.g. "/includes" is not a directive
        return Ok(None);
    }

    let rest = rest.trim_start();
    let (incname, remainder) = if let Some(quoted) = rest.strip_prefix('"') {
        let endpos = quoted.find('"').ok_or(())?;
        (&quoted[..endpos], &quoted[endpos + 1..])
    } else {
        let endpos = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (&rest[..endpos], &rest[endpos..])
    };
    if incname.is_empty() {
        return Err(());
    }

    let mut replacement = String::new();
    if !remainder.trim().is_empty() {
        let prefix_len = line.chars().count() - remainder.chars().count();
        replacement = " ".repeat(prefix_len);
        replacement.push_str(remainder);
    }

    Ok(Some((incname.to_string(), replacement)))
}

/*************************************************************************************************/

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strip(line: &str) -> String {
        let mut state = CommentState::default();
        strip_line_comments(line, &mut state)
    }

    #[test]
    fn line_comments() {
        assert_eq!(strip("abc // comment"), "abc ");
        assert_eq!(strip("// comment"), "");
        assert_eq!(strip("abc"), "abc");
        assert_eq!(strip(r#"  "http://example.com" x"#), r#"  "http://example.com" x"#);
    }

    #[test]
    fn block_comments() {
        assert_eq!(strip("a /* x */ b"), "a         b");
        assert_eq!(strip("a/**/b"), "a    b");
        assert_eq!(strip(r#""/* not a comment */""#), r#""/* not a comment */""#);
        assert_eq!(strip(r#""a "" /* b" c"#), r#""a "" /* b" c"#);
        assert_eq!(strip(r#""a \" /* b" c"#), r#""a \" /* b" c"#);
    }

    #[test]
    fn first_marker_wins() {
        // the line comment starts first, so the block comment never opens
        let mut state = CommentState::default();
        assert_eq!(strip_line_comments("a // b /* c", &mut state), "a ");
        assert!(!state.in_block_comment);

        // the block comment starts first and contains the line comment marker
        let mut state = CommentState::default();
        assert_eq!(strip_line_comments("a /* b // c */ d", &mut state), "a              d");
        assert!(!state.in_block_comment);
    }

    #[test]
    fn multiline_block_comment() {
        let mut state = CommentState::default();
        assert_eq!(strip_line_comments("abc /* start", &mut state), "abc ");
        assert!(state.in_block_comment);
        assert_eq!(strip_line_comments("middle // x", &mut state), "");
        assert!(state.in_block_comment);
        assert_eq!(strip_line_comments("end */ def", &mut state), "       def");
        assert!(!state.in_block_comment);
    }

    #[test]
    fn strip_is_idempotent() {
        let text = "a /* b */ c // d\n/* e\nf */ g \"h // i\"\nj";
        let once = strip_comments(text);
        let twice = strip_comments(&once);
        assert_eq!(once, twice);
        assert_eq!(once.lines().count(), text.lines().count());
    }

    #[test]
    fn include_directive() {
        assert_eq!(
            parse_include_directive(r#"/include "abc.a2l""#),
            Ok(Some(("abc.a2l".to_string(), String::new())))
        );
        assert_eq!(
            parse_include_directive("  /include abc/def.a2l  "),
            Ok(Some(("abc/def.a2l".to_string(), String::new())))
        );
        assert_eq!(parse_include_directive("/begin A2ML"), Ok(None));
        assert_eq!(parse_include_directive("/includes x"), Ok(None));
        assert_eq!(parse_include_directive("/include"), Err(()));
        assert_eq!(parse_include_directive(r#"/include "abc"#), Err(()));
        let (_, remainder) = parse_include_directive(r#"/include "x" END"#)
            .unwrap()
            .unwrap();
        assert_eq!(remainder, "             END");
    }

    #[test]
    fn unclosed_comment() {
        let result = preprocess_str("a\n/* b\nc", "test", Encoding::Latin1, &[]);
        assert!(matches!(
            result,
            Err(A2lError::PreprocessorError {
                preprocessor_error: PreprocessorError::UnclosedComment { line: 2, .. }
            })
        ));
    }

    #[test]
    fn preprocess_with_includes() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.a2l");
        std::fs::write(&main, "line1\n/include \"sub/inc.a2l\"\nline3 // c\nline4\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let inc = dir.path().join("sub").join("inc.a2l");
        std::fs::write(&inc, "inc1\n/* inc2 */\ninc3").unwrap();

        let result = preprocess_file(&main, Encoding::Latin1, &[]).unwrap();
        assert_eq!(
            result.lines,
            vec!["line1", "", "inc1", "          ", "inc3", "line3 ", "line4"]
        );

        let main_name = main.canonicalize().unwrap().to_string_lossy().to_string();
        let inc_name = inc.canonicalize().unwrap().to_string_lossy().to_string();
        let map = &result.line_map;
        assert_eq!(map.lookup(1).unwrap(), (main_name.as_str(), 1));
        assert_eq!(map.lookup(2).unwrap(), (main_name.as_str(), 2));
        assert_eq!(map.lookup(3).unwrap(), (inc_name.as_str(), 1));
        assert_eq!(map.lookup(5).unwrap(), (inc_name.as_str(), 3));
        assert_eq!(map.lookup(6).unwrap(), (main_name.as_str(), 3));
        assert_eq!(map.lookup(7).unwrap(), (main_name.as_str(), 4));
        assert!(map.lookup(8).is_err());
    }

    #[test]
    fn repeated_include() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.a2l");
        std::fs::write(&main, "/include inc.a2l\n/include inc.a2l\n").unwrap();
        let inc = dir.path().join("inc.a2l");
        std::fs::write(&inc, "a\nb").unwrap();

        let result = preprocess_file(&main, Encoding::Latin1, &[]).unwrap();
        assert_eq!(result.lines, vec!["", "a", "b", "", "a", "b"]);
        let inc_name = inc.canonicalize().unwrap().to_string_lossy().to_string();
        assert_eq!(result.line_map.lookup(5).unwrap(), (inc_name.as_str(), 1));
        assert_eq!(result.line_map.lookup(6).unwrap(), (inc_name.as_str(), 2));
    }

    #[test]
    fn include_via_search_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("common.a2l"), "common").unwrap();
        let result = preprocess_str(
            "/include \"common.a2l\"",
            "test",
            Encoding::Latin1,
            &[dir.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(result.lines, vec!["", "common"]);

        let result = preprocess_str("/include \"common.a2l\"", "test", Encoding::Latin1, &[]);
        assert!(matches!(
            result,
            Err(A2lError::PreprocessorError {
                preprocessor_error: PreprocessorError::IncludeNotFound { line: 1, .. }
            })
        ));
    }

    #[test]
    fn circular_include() {
        let dir = tempdir().unwrap();
        let file_a = dir.path().join("a.a2l");
        let file_b = dir.path().join("b.a2l");
        std::fs::write(&file_a, "a\n/include \"b.a2l\"").unwrap();
        std::fs::write(&file_b, "b\n/include \"a.a2l\"").unwrap();

        let result = preprocess_file(&file_a, Encoding::Latin1, &[]);
        assert!(matches!(
            result,
            Err(A2lError::PreprocessorError {
                preprocessor_error: PreprocessorError::CircularInclude { line: 2, .. }
            })
        ));
    }

    #[test]
    fn include_with_invalid_encoding() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.a2l");
        std::fs::write(&main, "/include \"inc.a2l\"").unwrap();
        std::fs::write(dir.path().join("inc.a2l"), [0x41u8, 0xff]).unwrap();

        let result = preprocess_file(&main, Encoding::Utf8, &[]);
        assert!(matches!(
            result,
            Err(A2lError::PreprocessorError {
                preprocessor_error: PreprocessorError::IncludeLoadError { .. }
            })
        ));
        // the same bytes are valid Latin-1
        let result = preprocess_file(&main, Encoding::Latin1, &[]).unwrap();
        assert_eq!(result.lines[1], "A\u{ff}");
    }
}
