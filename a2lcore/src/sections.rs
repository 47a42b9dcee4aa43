use crate::A2lError;
use crate::preprocessor::PreprocessorError;
use crate::tokenizer::is_identchar;
use std::collections::BTreeMap;

// keyword pairs that open and close the embedded sections
const A2ML_KEYWORDS: [&str; 2] = ["A2ML", "A3ML"];
const IF_DATA_KEYWORD: [&str; 1] = ["IF_DATA"];

/// A position in the preprocessed text: one-based line, zero-based column counted in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

/// The half-open range `[start, end)` that an `IF_DATA` section occupies in the preprocessed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionSpan {
    pub start: TextPosition,
    pub end: TextPosition,
}

/// the text of one `IF_DATA` block, from `/begin IF_DATA` up to and including `/end IF_DATA`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfDataSection {
    pub span: SectionSpan,
    pub text: String,
}

/// All `IF_DATA` sections of a file, keyed by their position
#[derive(Debug, Clone, Default)]
pub struct IfDataSections {
    sections: BTreeMap<SectionSpan, IfDataSection>,
}

/// The content of the `A2ML` block(s) of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A2mlSection {
    /// the line of the preprocessed text on which the first `A2ML` block starts
    pub start_line: u32,
    /// the text between `/begin A2ML` and `/end A2ML`
    pub text: String,
}

/// The main text with all embedded sections removed, and the sections themselves
#[derive(Debug, Clone)]
pub struct ExtractedSections {
    /// the main text. It has exactly as many lines as the input
    pub lines: Vec<String>,
    pub a2ml: Option<A2mlSection>,
    pub if_data: IfDataSections,
}

enum Mode {
    Default,
    A2ml {
        keyword: &'static str,
        start_line: u32,
    },
    IfData {
        start: TextPosition,
        parts: Vec<String>,
    },
}

impl IfDataSections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: IfDataSection) {
        self.sections.insert(section.span, section);
    }

    #[must_use]
    pub fn get(&self, span: &SectionSpan) -> Option<&IfDataSection> {
        self.sections.get(span)
    }

    /// find the section that covers the given position
    #[must_use]
    pub fn section_at(&self, line: u32, column: u32) -> Option<&IfDataSection> {
        let pos = TextPosition { line, column };
        let key = SectionSpan {
            start: pos,
            end: TextPosition {
                line: u32::MAX,
                column: u32::MAX,
            },
        };
        let (_, section) = self.sections.range(..=key).next_back()?;
        (pos < section.span.end).then_some(section)
    }

    /// all sections that start on a line in the range `first..=last`
    ///
    /// This associates `IF_DATA` blocks with the enclosing a2l element that spans these lines.
    pub fn in_lines(&self, first: u32, last: u32) -> impl Iterator<Item = &IfDataSection> {
        self.sections
            .values()
            .filter(move |section| (first..=last).contains(&section.span.start.line))
    }

    /// iterate over the sections in the order in which they appear in the text
    pub fn iter(&self) -> impl Iterator<Item = &IfDataSection> {
        self.sections.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<'a> IntoIterator for &'a IfDataSections {
    type Item = &'a IfDataSection;
    type IntoIter = std::collections::btree_map::Values<'a, SectionSpan, IfDataSection>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.values()
    }
}

/// split the `A2ML` and `IF_DATA` sections out of the preprocessed text
///
/// The main text keeps a `/begin A2ML` ... `/end A2ML` frame with an empty body, while
/// every `IF_DATA` block is replaced by whitespace.
///
/// If `strict` is set, a section that is still open at the end of the input is an error.
/// Otherwise the incomplete section is dropped and a warning is added to `log_msgs`.
///
/// # Errors
///
/// [`PreprocessorError::UnterminatedSection`] in strict mode
pub fn extract_sections(
    lines: &[String],
    strict: bool,
    log_msgs: &mut Vec<A2lError>,
) -> Result<ExtractedSections, A2lError> {
    let mut mode = Mode::Default;
    let mut output = Vec::with_capacity(lines.len());
    let mut a2ml: Option<A2mlSection> = None;
    let mut a2ml_text = String::new();
    let mut if_data = IfDataSections::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx as u32 + 1;
        let mut out = String::with_capacity(line.len());
        let mut bytepos = 0;

        loop {
            match &mut mode {
                Mode::Default => {
                    let next_a2ml = find_keyword_pair(line, bytepos, "/begin", &A2ML_KEYWORDS);
                    let next_ifdata = find_keyword_pair(line, bytepos, "/begin", &IF_DATA_KEYWORD);
                    match (next_a2ml, next_ifdata) {
                        (Some((start, end, keyword)), ifdata)
                            if ifdata.is_none_or(|(ifdata_start, _, _)| start < ifdata_start) =>
                        {
                            out.push_str(&line[bytepos..start]);
                            out.push_str("/begin A2ML");
                            if a2ml.is_none() {
                                a2ml = Some(A2mlSection {
                                    start_line: line_no,
                                    text: String::new(),
                                });
                            }
                            mode = Mode::A2ml {
                                keyword,
                                start_line: line_no,
                            };
                            bytepos = end;
                        }
                        (_, Some((start, keyword_end, _))) => {
                            out.push_str(&line[bytepos..start]);
                            let start_pos = TextPosition {
                                line: line_no,
                                column: char_column(line, start),
                            };
                            if let Some((_, end, _)) =
                                find_keyword_pair(line, keyword_end, "/end", &IF_DATA_KEYWORD)
                            {
                                // single line section: blank exactly the extracted text
                                let text = &line[start..end];
                                out.push_str(&blank(text));
                                if_data.insert(IfDataSection {
                                    span: SectionSpan {
                                        start: start_pos,
                                        end: TextPosition {
                                            line: line_no,
                                            column: char_column(line, end),
                                        },
                                    },
                                    text: text.to_string(),
                                });
                                bytepos = end;
                            } else {
                                mode = Mode::IfData {
                                    start: start_pos,
                                    parts: vec![line[start..].trim_end().to_string()],
                                };
                                break;
                            }
                        }
                        _ => {
                            out.push_str(&line[bytepos..]);
                            break;
                        }
                    }
                }
                Mode::A2ml { keyword, .. } => {
                    if let Some((start, end, _)) = find_keyword_pair(line, bytepos, "/end", &[*keyword])
                    {
                        a2ml_text.push_str(&line[bytepos..start]);
                        if let Some(section) = &mut a2ml {
                            section.text.push_str(&a2ml_text);
                        }
                        a2ml_text.clear();
                        out.push_str(&blank(&line[bytepos..start]));
                        // the main text keeps the A2ML frame around an empty body, not a blank line
                        out.push_str("/end A2ML");
                        mode = Mode::Default;
                        bytepos = end;
                    } else {
                        a2ml_text.push_str(&line[bytepos..]);
                        a2ml_text.push('\n');
                        break;
                    }
                }
                Mode::IfData { start, parts } => {
                    if let Some((_, end, _)) =
                        find_keyword_pair(line, bytepos, "/end", &IF_DATA_KEYWORD)
                    {
                        parts.push(line[..end].trim().to_string());
                        let span = SectionSpan {
                            start: *start,
                            end: TextPosition {
                                line: line_no,
                                column: char_column(line, end),
                            },
                        };
                        if_data.insert(IfDataSection {
                            span,
                            text: parts.join("\n"),
                        });
                        out.push_str(&blank(&line[..end]));
                        mode = Mode::Default;
                        bytepos = end;
                    } else {
                        // empty lines are kept so that line numbers inside the section stay valid
                        parts.push(line.trim().to_string());
                        break;
                    }
                }
            }
        }

        output.push(out);
    }

    let unterminated = match &mode {
        Mode::Default => None,
        Mode::A2ml { start_line, .. } => Some(("A2ML", *start_line)),
        Mode::IfData { start, .. } => Some(("IF_DATA", start.line)),
    };
    if let Some((section, line)) = unterminated {
        if matches!(mode, Mode::A2ml { .. }) && a2ml.as_ref().is_some_and(|s| s.text.is_empty()) {
            a2ml = None;
        }
        let error = A2lError::PreprocessorError {
            preprocessor_error: PreprocessorError::UnterminatedSection {
                section: section.to_string(),
                line,
            },
        };
        if strict {
            return Err(error);
        }
        log_msgs.push(error);
    }

    Ok(ExtractedSections {
        lines: output,
        a2ml,
        if_data,
    })
}

// find_keyword_pair()
// find the next occurrence of "<first> <second>" at or after bytepos, where <first> and <second> are
// separated by at least one whitespace character and <second> is one of the given alternatives.
// Returns the start and end byte offsets of the match, and the matched alternative.
fn find_keyword_pair(
    line: &str,
    bytepos: usize,
    first: &str,
    second: &[&'static str],
) -> Option<(usize, usize, &'static str)> {
    let mut searchpos = bytepos;
    while let Some(offset) = line[searchpos..].find(first) {
        let start = searchpos + offset;
        let after_first = start + first.len();
        let rest = &line[after_first..];
        let trimmed = rest.trim_start();
        if trimmed.len() < rest.len() {
            let keyword_start = after_first + (rest.len() - trimmed.len());
            for keyword in second {
                if let Some(tail) = trimmed.strip_prefix(keyword) {
                    if !tail.bytes().next().is_some_and(is_identchar) {
                        return Some((start, keyword_start + keyword.len(), keyword));
                    }
                }
            }
        }
        searchpos = after_first;
    }
    None
}

fn char_column(line: &str, bytepos: usize) -> u32 {
    line[..bytepos].chars().count() as u32
}

fn blank(text: &str) -> String {
    " ".repeat(text.chars().count())
}

/*************************************************************************************************/
