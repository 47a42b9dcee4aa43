use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenizerError {
    #[error("Input text \"{tokentext}...\" was not recognized as a token")]
    InvalidToken { line: u32, tokentext: String },

    #[error("Invalid numerical constant \"{tokentext}\"")]
    InvalidNumericalConstant { line: u32, tokentext: String },

    #[error("Block comment was not closed before the end of input was reached")]
    UnclosedComment { line: u32 },

    #[error("String was not closed before the end of input was reached")]
    UnclosedString { line: u32 },

    #[error("There is no whitespace separating the input tokens")]
    MissingWhitespace { line: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfDataTokenType {
    Begin,
    End,
    Ident,
    Int,
    Hex,
    Float,
    String,
    Comment,
    Whitespace,
}

/// Whitespace and comments are kept in the token list on the hidden channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Default,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfDataToken {
    pub ttype: IfDataTokenType,
    pub channel: Channel,
    pub startpos: usize,
    pub endpos: usize,
    /// one-based line in the tokenized text
    pub line: u32,
    /// zero-based column, counted in characters
    pub column: u32,
}

/// A cursor over the default channel tokens of a text
///
/// The position can be saved with `get_tokenpos()` and restored with `set_tokenpos()`
/// in order to backtrack.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    input: &'a str,
    tokens: Vec<IfDataToken>,
    visible: Vec<usize>,
    pos: usize,
}

// tokenize()
// Split the text into tokens. Every byte of the input belongs to exactly one token.
pub fn tokenize(input: &str) -> Result<Vec<IfDataToken>, TokenizerError> {
    let filebytes = input.as_bytes();
    let datalen = filebytes.len();

    let mut tokens: Vec<IfDataToken> = Vec::with_capacity(datalen / 8);
    let mut bytepos = 0;
    let mut separated = true;
    let mut line = 1;
    let mut line_start = 0;

    while bytepos < datalen {
        let startpos = bytepos;
        let startline = line;
        let column = input[line_start..startpos].chars().count() as u32;

        let ttype = if filebytes[bytepos].is_ascii_whitespace() {
            separated = true;
            while bytepos < datalen && filebytes[bytepos].is_ascii_whitespace() {
                bytepos += 1;
            }
            IfDataTokenType::Whitespace
        } else if filebytes[bytepos..].starts_with(b"/*") {
            separated = true;
            bytepos = skip_block_comment(filebytes, bytepos + 2)
                .map_err(|()| TokenizerError::UnclosedComment { line })?;
            IfDataTokenType::Comment
        } else if filebytes[bytepos..].starts_with(b"//") {
            separated = true;
            while bytepos < datalen && filebytes[bytepos] != b'\n' {
                bytepos += 1;
            }
            IfDataTokenType::Comment
        } else if filebytes[bytepos..].starts_with(b"/begin") {
            separator_check(separated, line)?;
            bytepos += 6;
            separated = false;
            IfDataTokenType::Begin
        } else if filebytes[bytepos..].starts_with(b"/end") {
            separator_check(separated, line)?;
            bytepos += 4;
            separated = false;
            IfDataTokenType::End
        } else if filebytes[bytepos] == b'"' {
            separator_check(separated, line)?;
            bytepos = find_string_end(filebytes, bytepos + 1)
                .map_err(|()| TokenizerError::UnclosedString { line })?;
            separated = false;
            IfDataTokenType::String
        } else if !filebytes[bytepos].is_ascii_digit() && is_identchar(filebytes[bytepos]) {
            separator_check(separated, line)?;
            while bytepos < datalen && is_identchar(filebytes[bytepos]) {
                bytepos += 1;
            }
            separated = false;
            IfDataTokenType::Ident
        } else if filebytes[bytepos] == b'-' || is_numchar(filebytes[bytepos]) {
            // a number, in any format (integer, floating point or hexadecimal)
            separator_check(separated, line)?;
            bytepos += 1;
            while bytepos < datalen && is_numchar(filebytes[bytepos]) {
                bytepos += 1;
            }
            separated = false;
            if bytepos < datalen && is_identchar(filebytes[bytepos]) {
                // an identifier that starts with a number is not standard compliant, but it is accepted
                while bytepos < datalen && is_identchar(filebytes[bytepos]) {
                    bytepos += 1;
                }
                IfDataTokenType::Ident
            } else {
                classify_number(&input[startpos..bytepos]).ok_or_else(|| {
                    TokenizerError::InvalidNumericalConstant {
                        line,
                        tokentext: input[startpos..bytepos].to_string(),
                    }
                })?
            }
        } else {
            let endpos = (startpos + 10).min(datalen);
            return Err(TokenizerError::InvalidToken {
                line,
                tokentext: String::from_utf8_lossy(&filebytes[startpos..endpos]).into(),
            });
        };

        // keep the line count accurate for multi-line whitespace, comments and strings
        for (offset, c) in filebytes[startpos..bytepos].iter().enumerate() {
            if *c == b'\n' {
                line += 1;
                line_start = startpos + offset + 1;
            }
        }

        let channel = match ttype {
            IfDataTokenType::Whitespace | IfDataTokenType::Comment => Channel::Hidden,
            _ => Channel::Default,
        };
        tokens.push(IfDataToken {
            ttype,
            channel,
            startpos,
            endpos: bytepos,
            line: startline,
            column,
        });
    }

    Ok(tokens)
}

// classify_number()
// Decide if the text of a number token is a hex value, a decimal integer or a float.
// Detailed validation happens when the value is converted.
fn classify_number(text: &str) -> Option<IfDataTokenType> {
    if text == "-" || text == "+" || text.eq_ignore_ascii_case("0x") {
        None
    } else if text.starts_with("0x") || text.starts_with("0X") {
        Some(IfDataTokenType::Hex)
    } else if text.contains(['.', 'e', 'E']) {
        Some(IfDataTokenType::Float)
    } else {
        Some(IfDataTokenType::Int)
    }
}

// skip_block_comment
// finds the first byte position after the end of a block comment
fn skip_block_comment(filebytes: &[u8], mut bytepos: usize) -> Result<usize, ()> {
    let datalen = filebytes.len();

    bytepos += 1;
    while bytepos < datalen && !(filebytes[bytepos - 1] == b'*' && filebytes[bytepos] == b'/') {
        bytepos += 1;
    }

    if bytepos >= datalen {
        return Err(());
    }

    // filebytes[bytepos] is the closing '/'
    Ok(bytepos + 1)
}

// find_string_end
// finds the first byte position after the closing quote of a string.
// Quotes inside the string are escaped either as "" or as \"
fn find_string_end(filebytes: &[u8], mut bytepos: usize) -> Result<usize, ()> {
    let datalen = filebytes.len();
    while bytepos < datalen {
        match filebytes[bytepos] {
            b'\\' => bytepos += 2,
            b'"' if filebytes.get(bytepos + 1) == Some(&b'"') => bytepos += 2,
            b'"' => return Ok(bytepos + 1),
            _ => bytepos += 1,
        }
    }
    Err(())
}

// separator_check
// generate an error message if there is no whitespace (or a comment) separating two tokens
fn separator_check(separated: bool, line: u32) -> Result<(), TokenizerError> {
    if !separated {
        return Err(TokenizerError::MissingWhitespace { line });
    }
    Ok(())
}

// is_identchar()
// is this char allowed in an identifier
pub(crate) fn is_identchar(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'.' || c == b'[' || c == b']' || c == b'_'
}

// is_numchar()
// in addition to decimal format, numbers can also be written as hex, or as floats with exponents
// this expands the set of allowable characters beyond is_ascii_hexdigit()
fn is_numchar(c: u8) -> bool {
    c.is_ascii_hexdigit() || c == b'x' || c == b'X' || c == b'.' || c == b'+' || c == b'-'
}

impl TokenizerError {
    /// the line in the tokenized text where the error was found
    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            TokenizerError::InvalidToken { line, .. }
            | TokenizerError::InvalidNumericalConstant { line, .. }
            | TokenizerError::UnclosedComment { line }
            | TokenizerError::UnclosedString { line }
            | TokenizerError::MissingWhitespace { line } => *line,
        }
    }
}

impl<'a> TokenCursor<'a> {
    /// tokenize the input and place the cursor before the first visible token
    ///
    /// # Errors
    ///
    /// A [`TokenizerError`] if the input can't be split into tokens
    pub fn new(input: &'a str) -> Result<Self, TokenizerError> {
        let tokens = tokenize(input)?;
        let visible = tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| token.channel == Channel::Default)
            .map(|(idx, _)| idx)
            .collect();
        Ok(Self {
            input,
            tokens,
            visible,
            pos: 0,
        })
    }

    /// get the next visible token and advance the cursor
    pub fn next(&mut self) -> Option<IfDataToken> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    #[must_use]
    pub fn peek(&self) -> Option<IfDataToken> {
        self.peek_nth(0)
    }

    /// look `n` visible tokens ahead without moving the cursor
    #[must_use]
    pub fn peek_nth(&self, n: usize) -> Option<IfDataToken> {
        self.visible
            .get(self.pos + n)
            .map(|&idx| self.tokens[idx])
    }

    #[must_use]
    pub fn get_tokenpos(&self) -> usize {
        self.pos
    }

    pub fn set_tokenpos(&mut self, newpos: usize) {
        self.pos = newpos.min(self.visible.len());
    }

    #[must_use]
    pub fn get_token_text(&self, token: &IfDataToken) -> &'a str {
        &self.input[token.startpos..token.endpos]
    }

    /// the line of the most recently consumed token
    #[must_use]
    pub fn last_line(&self) -> u32 {
        self.pos
            .checked_sub(1)
            .and_then(|prev| self.visible.get(prev))
            .map_or(1, |&idx| self.tokens[idx].line)
    }

    /// all tokens, including the hidden ones
    #[must_use]
    pub fn tokens(&self) -> &[IfDataToken] {
        &self.tokens
    }
}

/*************************************************************************************************/
