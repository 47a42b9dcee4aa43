use crate::amltypes::PredefinedKind;
use std::borrow::Cow;
use thiserror::Error;

/// A syntax error in an A2ML schema
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("A2ML line {line}: {message}")]
pub struct A2mlSyntaxError {
    /// the line inside the A2ML text, starting at 1
    pub line: u32,
    pub message: String,
}

// tokenizer types
#[derive(Debug, Clone, PartialEq)]
enum TokenType {
    Semicolon,
    Comma,
    OpenCurlyBracket,
    ClosedCurlyBracket,
    OpenSquareBracket,
    ClosedSquareBracket,
    OpenRoundBracket,
    ClosedRoundBracket,
    Repeat,
    Equals,
    Predefined(PredefinedKind),
    Block,
    Enum,
    Struct,
    Taggedstruct,
    Taggedunion,
    Constant(i64),
    Identifier(String),
    Tag(String),
}

#[derive(Debug, Clone, PartialEq)]
struct A2mlToken {
    ttype: TokenType,
    line: u32,
}

/// The parse tree of an A2ML schema
#[derive(Debug, Clone, PartialEq)]
pub struct A2mlFile {
    pub declarations: Vec<DeclarationNode>,
}

/// `declaration = type_definition ";" | block_definition ";"`
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationNode {
    TypeDefinition(TypeNameNode),
    BlockDefinition(BlockDefinitionNode),
}

/// A type as it is written in the schema
///
/// Named types are written either with a body in `{}` or as a bare name that refers
/// to a declaration elsewhere. In the second case `body` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNameNode {
    Predefined(PredefinedKind),
    Enum {
        name: Option<String>,
        body: Option<Vec<EnumeratorNode>>,
    },
    Struct {
        name: Option<String>,
        body: Option<Vec<MemberNode>>,
    },
    TaggedStruct {
        name: Option<String>,
        body: Option<Vec<TaggedStructMemberNode>>,
    },
    TaggedUnion {
        name: Option<String>,
        body: Option<Vec<TaggedItemNode>>,
    },
}

/// `member = type_name [ array_specifier ]`
#[derive(Debug, Clone, PartialEq)]
pub struct MemberNode {
    pub type_name: TypeNameNode,
    pub array_specifier: Vec<u32>,
}

/// `enumerator = keyword [ "=" constant ]`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumeratorNode {
    pub tag: String,
    pub constant: Option<i64>,
}

/// `taggedstruct_definition = tag [ member ] | tag "(" member ")*"`
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedDefinitionNode {
    pub tag: String,
    pub member: Option<MemberNode>,
    /// set for the form `tag "(" member ")*"`
    pub multiple: bool,
}

/// `block_definition = "block" tag member | "block" tag "(" member ")*"`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDefinitionNode {
    pub tag: String,
    pub member: MemberNode,
    /// set for the form `"block" tag "(" member ")*"`
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaggedItemNode {
    Definition(TaggedDefinitionNode),
    Block(BlockDefinitionNode),
}

/// `taggedstruct_member = item ";" | "(" item ")*;"`
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedStructMemberNode {
    pub item: TaggedItemNode,
    pub multiple: bool,
}

struct A2mlTokenIter<'a> {
    tokens: &'a [A2mlToken],
    pos: usize,
}

// tokenize_a2ml()
// Tokenize the text of the a2ml section
fn tokenize_a2ml(input: &str) -> Result<Vec<A2mlToken>, A2mlSyntaxError> {
    let mut amltokens = Vec::<A2mlToken>::new();
    let input_bytes = input.as_bytes();
    let datalen = input_bytes.len();
    let mut bytepos = 0;
    let mut line = 1;

    while bytepos < datalen {
        let startpos = bytepos;
        let c = input_bytes[bytepos];

        let ttype = if c.is_ascii_whitespace() {
            /* skip whitespace */
            while bytepos < datalen && input_bytes[bytepos].is_ascii_whitespace() {
                if input_bytes[bytepos] == b'\n' {
                    line += 1;
                }
                bytepos += 1;
            }
            continue;
        } else if input_bytes[bytepos..].starts_with(b"/*") {
            /* skip a block comment */
            bytepos += 2; // just past the initial "/*"
            let startline = line;
            while bytepos < datalen && !input_bytes[bytepos..].starts_with(b"*/") {
                if input_bytes[bytepos] == b'\n' {
                    line += 1;
                }
                bytepos += 1;
            }

            if bytepos >= datalen {
                let errtxt = make_errtxt(startpos, input_bytes);
                return Err(A2mlSyntaxError {
                    line: startline,
                    message: format!("unclosed block comment starting with \"{errtxt}\""),
                });
            }

            // chomp the closing "*/"
            bytepos += 2;
            continue;
        } else if input_bytes[bytepos..].starts_with(b"//") {
            /* skip a line comment; the '\n' is handled as whitespace */
            while bytepos < datalen && input_bytes[bytepos] != b'\n' {
                bytepos += 1;
            }
            continue;
        } else if c == b'"' {
            tokenize_tag(input, &mut bytepos, line)?
        } else if c == b';' {
            bytepos += 1;
            TokenType::Semicolon
        } else if c == b',' {
            bytepos += 1;
            TokenType::Comma
        } else if c == b'{' {
            bytepos += 1;
            TokenType::OpenCurlyBracket
        } else if c == b'}' {
            bytepos += 1;
            TokenType::ClosedCurlyBracket
        } else if c == b'[' {
            bytepos += 1;
            TokenType::OpenSquareBracket
        } else if c == b']' {
            bytepos += 1;
            TokenType::ClosedSquareBracket
        } else if c == b'(' {
            bytepos += 1;
            TokenType::OpenRoundBracket
        } else if c == b')' {
            bytepos += 1;
            TokenType::ClosedRoundBracket
        } else if c == b'*' {
            bytepos += 1;
            TokenType::Repeat
        } else if c == b'=' {
            bytepos += 1;
            TokenType::Equals
        } else if c.is_ascii_digit()
            || (c == b'-' && input_bytes.get(bytepos + 1).is_some_and(u8::is_ascii_digit))
        {
            // tokenize a number, either decimal or hexadecimal
            tokenize_number(input, &mut bytepos, line)?
        } else if c.is_ascii_alphabetic() || c == b'_' {
            // a keyword (int, long, etc.) or an identifier, both of which are non-quoted text
            tokenize_keyword_ident(input, &mut bytepos)
        } else {
            let errtxt = make_errtxt(startpos, input_bytes);
            return Err(A2mlSyntaxError {
                line,
                message: format!("Unable to tokenize: {errtxt}..."),
            });
        };
        amltokens.push(A2mlToken { ttype, line });
    }

    Ok(amltokens)
}

fn tokenize_tag(input: &str, bytepos: &mut usize, line: u32) -> Result<TokenType, A2mlSyntaxError> {
    let input_bytes = input.as_bytes();
    let datalen = input_bytes.len();
    let startpos = *bytepos;

    *bytepos += 1;
    while *bytepos < datalen && input_bytes[*bytepos] != b'"' && input_bytes[*bytepos] != b'\n' {
        *bytepos += 1;
    }
    /* tag - it is enclosed in double quotes, but contains neither spaces nor escape characters */
    if *bytepos < datalen && input_bytes[*bytepos] == b'"' {
        let tag = &input[(startpos + 1)..*bytepos];
        *bytepos += 1;
        Ok(TokenType::Tag(tag.to_string()))
    } else {
        let errtxt = make_errtxt(startpos, input_bytes);
        Err(A2mlSyntaxError {
            line,
            message: format!("unclosed tag string starting with {errtxt}"),
        })
    }
}

fn tokenize_number(input: &str, bytepos: &mut usize, line: u32) -> Result<TokenType, A2mlSyntaxError> {
    let input_bytes = input.as_bytes();
    let datalen = input_bytes.len();
    let startpos = *bytepos;

    if input_bytes[*bytepos] == b'-' {
        *bytepos += 1;
    }
    while *bytepos < datalen {
        let c = input_bytes[*bytepos];
        if !c.is_ascii_alphanumeric() && c != b'_' {
            break;
        }
        *bytepos += 1;
    }
    let num_text = &input[startpos..*bytepos];
    let (negative, unsigned_text) = match num_text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, num_text),
    };
    let parsed = if let Some(hexval) = unsigned_text
        .strip_prefix("0x")
        .or_else(|| unsigned_text.strip_prefix("0X"))
    {
        // hex constant
        i64::from_str_radix(hexval, 16).ok()
    } else {
        // not hex format -> must be decimal
        unsigned_text.parse::<i64>().ok()
    };
    match parsed {
        Some(number) if negative => Ok(TokenType::Constant(-number)),
        Some(number) => Ok(TokenType::Constant(number)),
        None => Err(A2mlSyntaxError {
            line,
            message: format!("Invalid sequence in AML: {num_text}"),
        }),
    }
}

fn tokenize_keyword_ident(input: &str, bytepos: &mut usize) -> TokenType {
    let input_bytes = input.as_bytes();
    let datalen = input_bytes.len();
    let startpos = *bytepos;
    while *bytepos < datalen {
        let c = input_bytes[*bytepos];
        if !c.is_ascii_alphanumeric() && c != b'_' {
            break;
        }
        *bytepos += 1;
    }
    let kw_or_ident = &input[startpos..*bytepos];
    match kw_or_ident {
        "char" => TokenType::Predefined(PredefinedKind::Char),
        "int" => TokenType::Predefined(PredefinedKind::Int),
        "long" => TokenType::Predefined(PredefinedKind::Long),
        "int64" => TokenType::Predefined(PredefinedKind::Int64),
        "uint" => TokenType::Predefined(PredefinedKind::UInt),
        "uchar" => TokenType::Predefined(PredefinedKind::UChar),
        "ulong" => TokenType::Predefined(PredefinedKind::ULong),
        "uint64" => TokenType::Predefined(PredefinedKind::UInt64),
        "double" => TokenType::Predefined(PredefinedKind::Double),
        "float" => TokenType::Predefined(PredefinedKind::Float),
        "block" => TokenType::Block,
        "enum" => TokenType::Enum,
        "struct" => TokenType::Struct,
        "taggedstruct" => TokenType::Taggedstruct,
        "taggedunion" => TokenType::Taggedunion,
        _ => TokenType::Identifier(kw_or_ident.to_string()),
    }
}

fn make_errtxt(pos: usize, input_bytes: &[u8]) -> Cow<'_, str> {
    let endpos = (pos + 16).min(input_bytes.len());
    // the end might be in the middle of a utf-8 sequence, so from_utf8_lossy is needed
    String::from_utf8_lossy(&input_bytes[pos..endpos])
}

/// parse the text of an A2ML block into a parse tree
///
/// The text is the content between `/begin A2ML` and `/end A2ML`. Named types that
/// are referenced before or without being declared are accepted here, they are only
/// resolved when `IF_DATA` is interpreted.
///
/// # Errors
///
/// An [`A2mlSyntaxError`] for the first token that does not fit the A2ML grammar
pub fn parse_a2ml(input: &str) -> Result<A2mlFile, A2mlSyntaxError> {
    let tokens = tokenize_a2ml(input)?;
    let mut tok_iter = A2mlTokenIter {
        tokens: &tokens,
        pos: 0,
    };
    let mut declarations = Vec::new();

    // at the top level the applicable grammar rule is
    //    declaration = type_definition ";" | block_definition ";"
    while let Some(tok) = tok_iter.next() {
        let declaration = match &tok.ttype {
            TokenType::Block => DeclarationNode::BlockDefinition(parse_aml_block(&mut tok_iter)?),
            TokenType::Predefined(_)
            | TokenType::Enum
            | TokenType::Struct
            | TokenType::Taggedstruct
            | TokenType::Taggedunion => {
                DeclarationNode::TypeDefinition(parse_aml_type(&mut tok_iter, tok)?)
            }
            _ => {
                return Err(A2mlSyntaxError {
                    line: tok.line,
                    message: format!("found unexpected token {:?}", tok.ttype),
                });
            }
        };
        require_token_type(&mut tok_iter, &TokenType::Semicolon)?;
        declarations.push(declaration);
    }

    Ok(A2mlFile { declarations })
}

// parse_aml_type()
// Implements the grammar rules
//    type_name = predefined_type_name | struct_type_name | taggedstruct_type_name | taggedunion_type_name | enum_type_name
//    predefined_type_name = "char" | "int" | "long" | "int64" | "uchar" | "uint" | "ulong" | "uint64" | "double" | "float"
fn parse_aml_type(
    tok_iter: &mut A2mlTokenIter,
    tok_start: &A2mlToken,
) -> Result<TypeNameNode, A2mlSyntaxError> {
    match &tok_start.ttype {
        TokenType::Predefined(kind) => Ok(TypeNameNode::Predefined(*kind)),
        TokenType::Enum => parse_aml_type_enum(tok_iter),
        TokenType::Struct => {
            let (name, body) = parse_aml_type_body(tok_iter, "struct", parse_aml_struct_member)?;
            Ok(TypeNameNode::Struct { name, body })
        }
        TokenType::Taggedstruct => {
            let (name, body) =
                parse_aml_type_body(tok_iter, "taggedstruct", parse_aml_taggedstruct_member)?;
            Ok(TypeNameNode::TaggedStruct { name, body })
        }
        TokenType::Taggedunion => {
            let (name, body) =
                parse_aml_type_body(tok_iter, "taggedunion", parse_aml_taggedunion_member)?;
            Ok(TypeNameNode::TaggedUnion { name, body })
        }
        _ => Err(A2mlSyntaxError {
            line: tok_start.line,
            message: format!("unexpected token {:?} in type declaration", tok_start.ttype),
        }),
    }
}

// parse_aml_type_enum()
// Parses enum definitions according to the grammar:
//    enum_type_name = "enum" [ identifier ] "{" enumerator_list "}" | "enum" identifier
//    enumerator_list = enumerator | enumerator "," enumerator_list
//    enumerator = keyword [ "=" constant ]
fn parse_aml_type_enum(tok_iter: &mut A2mlTokenIter) -> Result<TypeNameNode, A2mlSyntaxError> {
    let name = parse_optional_name(tok_iter);
    if !check_body_follows(tok_iter, name.as_deref(), "enum")? {
        return Ok(TypeNameNode::Enum { name, body: None });
    }

    require_token_type(tok_iter, &TokenType::OpenCurlyBracket)?;
    let mut enumerators = Vec::new();
    if let Some(TokenType::ClosedCurlyBracket) = tok_iter.peek() {
        tok_iter.next();
        return Ok(TypeNameNode::Enum {
            name,
            body: Some(enumerators),
        });
    }
    loop {
        let tag = require_tag(tok_iter)?;
        let mut token = nexttoken(tok_iter)?;
        /* optionally each enum item may include a constant. */
        let mut constant = None;
        if token.ttype == TokenType::Equals {
            constant = Some(require_constant(tok_iter)?);
            token = nexttoken(tok_iter)?;
        }
        enumerators.push(EnumeratorNode {
            tag: tag.to_string(),
            constant,
        });
        match token.ttype {
            TokenType::Comma => {
                // tolerate a trailing comma before the closing bracket
                if let Some(TokenType::ClosedCurlyBracket) = tok_iter.peek() {
                    tok_iter.next();
                    break;
                }
            }
            TokenType::ClosedCurlyBracket => break,
            _ => {
                return Err(A2mlSyntaxError {
                    line: token.line,
                    message: format!("unexpected token type {:?} in enum list", token.ttype),
                });
            }
        }
    }

    Ok(TypeNameNode::Enum {
        name,
        body: Some(enumerators),
    })
}

// parse_aml_type_body()
// Shared by struct, taggedstruct and taggedunion, which all have the form
//    xxx_type_name = "xxx" [ identifier ] "{" [ xxx_member_list ] "}" | "xxx" identifier
// Each member is terminated by a ";"
fn parse_aml_type_body<T>(
    tok_iter: &mut A2mlTokenIter,
    keyword: &str,
    parse_member: fn(&mut A2mlTokenIter) -> Result<T, A2mlSyntaxError>,
) -> Result<(Option<String>, Option<Vec<T>>), A2mlSyntaxError> {
    let name = parse_optional_name(tok_iter);
    if !check_body_follows(tok_iter, name.as_deref(), keyword)? {
        return Ok((name, None));
    }

    require_token_type(tok_iter, &TokenType::OpenCurlyBracket)?;
    let mut members = Vec::new();
    while tok_iter.peek() != Some(&TokenType::ClosedCurlyBracket) {
        members.push(parse_member(tok_iter)?);
        require_token_type(tok_iter, &TokenType::Semicolon)?;
    }
    require_token_type(tok_iter, &TokenType::ClosedCurlyBracket)?;

    Ok((name, Some(members)))
}

// check_body_follows()
// A named type is either followed by its definition enclosed in {}, or it is a reference
// to a type that is declared elsewhere. An anonymous type must always have a body.
fn check_body_follows(
    tok_iter: &A2mlTokenIter,
    name: Option<&str>,
    keyword: &str,
) -> Result<bool, A2mlSyntaxError> {
    match (tok_iter.peek(), name) {
        (Some(TokenType::OpenCurlyBracket), _) => Ok(true),
        (_, Some(_)) => Ok(false),
        (_, None) => Err(A2mlSyntaxError {
            line: tok_iter.line(),
            message: format!(
                "expected either an identifier or an opening bracket after keyword {keyword}."
            ),
        }),
    }
}

// parse_aml_struct_member()
//    struct_member = member ";"
fn parse_aml_struct_member(tok_iter: &mut A2mlTokenIter) -> Result<MemberNode, A2mlSyntaxError> {
    parse_aml_member(tok_iter)
}

// parse_aml_taggedstruct_member()
// Parses taggedstruct members according to the grammar:
//    taggedstruct_member = taggedstruct_definition ";" | "(" taggedstruct_definition ")*;" | block_definition ";" | "(" block_definition ")*;"
fn parse_aml_taggedstruct_member(
    tok_iter: &mut A2mlTokenIter,
) -> Result<TaggedStructMemberNode, A2mlSyntaxError> {
    let multiple = if let Some(TokenType::OpenRoundBracket) = tok_iter.peek() {
        tok_iter.next();
        true
    } else {
        false
    };

    let item = parse_aml_tagged_item(tok_iter)?;

    if multiple {
        require_token_type(tok_iter, &TokenType::ClosedRoundBracket)?;
        require_token_type(tok_iter, &TokenType::Repeat)?;
    }

    Ok(TaggedStructMemberNode { item, multiple })
}

// parse_aml_taggedunion_member()
//    tagged_union_member = tag [ member ] ";" | block_definition ";"
fn parse_aml_taggedunion_member(
    tok_iter: &mut A2mlTokenIter,
) -> Result<TaggedItemNode, A2mlSyntaxError> {
    parse_aml_tagged_item(tok_iter)
}

fn parse_aml_tagged_item(tok_iter: &mut A2mlTokenIter) -> Result<TaggedItemNode, A2mlSyntaxError> {
    let tok = nexttoken(tok_iter)?;
    match &tok.ttype {
        TokenType::Block => Ok(TaggedItemNode::Block(parse_aml_block(tok_iter)?)),
        TokenType::Tag(tag) => {
            let (member, multiple) = parse_aml_tagged_def(tok_iter)?;
            Ok(TaggedItemNode::Definition(TaggedDefinitionNode {
                tag: tag.clone(),
                member,
                multiple,
            }))
        }
        _ => Err(A2mlSyntaxError {
            line: tok.line,
            message: format!(
                "invalid token type {:?} while attempting to parse a tagged member",
                tok.ttype
            ),
        }),
    }
}

// parse_aml_block()
// The keyword "block" has already been consumed:
//    block_definition = "block" tag type_name | "block" tag "(" member ")*"
fn parse_aml_block(tok_iter: &mut A2mlTokenIter) -> Result<BlockDefinitionNode, A2mlSyntaxError> {
    let tag = require_tag(tok_iter)?.to_string();
    let line = tok_iter.line();
    match parse_aml_tagged_def(tok_iter)? {
        (Some(member), multiple) => Ok(BlockDefinitionNode {
            tag,
            member,
            multiple,
        }),
        (None, _) => Err(A2mlSyntaxError {
            line,
            message: format!("block \"{tag}\" has no type"),
        }),
    }
}

// parse_aml_tagged_def()
// Parses the part of a taggedstruct definition that follows the tag:
//    taggedstruct_definition = tag [ member ] | tag "(" member ")*"
// A tag without a member is followed directly by ";" or by the ")" of an enclosing repetition
fn parse_aml_tagged_def(
    tok_iter: &mut A2mlTokenIter,
) -> Result<(Option<MemberNode>, bool), A2mlSyntaxError> {
    match tok_iter.peek() {
        Some(TokenType::Semicolon | TokenType::ClosedRoundBracket) => Ok((None, false)),
        Some(TokenType::OpenRoundBracket) => {
            tok_iter.next();
            let member = parse_aml_member(tok_iter)?;
            require_token_type(tok_iter, &TokenType::ClosedRoundBracket)?;
            require_token_type(tok_iter, &TokenType::Repeat)?;
            Ok((Some(member), true))
        }
        _ => Ok((Some(parse_aml_member(tok_iter)?), false)),
    }
}

// parse_aml_member()
// Parse a member of some other data structure. Each member could potentially have an arbitrary number of array dimensions
//    member = type_name [ array_specifier ]
//    array_specifier = "[" constant "]" | "[" constant "]" array_specifier
fn parse_aml_member(tok_iter: &mut A2mlTokenIter) -> Result<MemberNode, A2mlSyntaxError> {
    let tok_start = nexttoken(tok_iter)?;
    let type_name = parse_aml_type(tok_iter, tok_start)?;
    let mut array_specifier = Vec::new();

    while let Some(TokenType::OpenSquareBracket) = tok_iter.peek() {
        /* get the array dim */
        require_token_type(tok_iter, &TokenType::OpenSquareBracket)?;
        let line = tok_iter.line();
        let dim = require_constant(tok_iter)?;
        require_token_type(tok_iter, &TokenType::ClosedSquareBracket)?;
        let dim = u32::try_from(dim).map_err(|_| A2mlSyntaxError {
            line,
            message: format!("invalid array dimension {dim}"),
        })?;
        array_specifier.push(dim);
    }

    Ok(MemberNode {
        type_name,
        array_specifier,
    })
}

// parse_optional_name()
// For enums, structs, taggedstructs and taggedunions the typename is optional.
// Called at the beginning of parsing one of these data strucutres, this function checks if the next token is a type name and returns it
fn parse_optional_name(tok_iter: &mut A2mlTokenIter) -> Option<String> {
    if let Some(TokenType::Identifier(ident)) = tok_iter.peek() {
        let ident = ident.clone();
        tok_iter.next();
        Some(ident)
    } else {
        None
    }
}

// require_token_type()
// get the next token, which is required to be of the provided type
fn require_token_type(
    tok_iter: &mut A2mlTokenIter,
    reference: &TokenType,
) -> Result<(), A2mlSyntaxError> {
    let token = nexttoken(tok_iter)?;
    if token.ttype != *reference {
        return Err(A2mlSyntaxError {
            line: token.line,
            message: format!("expected token of type {reference:?}, got {:?}", token.ttype),
        });
    }
    Ok(())
}

// require_tag()
// get the content of the next token, which is required to be a tag
fn require_tag<'a>(tok_iter: &mut A2mlTokenIter<'a>) -> Result<&'a str, A2mlSyntaxError> {
    let token = nexttoken(tok_iter)?;
    match &token.ttype {
        TokenType::Tag(tag) => Ok(tag),
        tok => Err(A2mlSyntaxError {
            line: token.line,
            message: format!("incorrect token type {tok:?} where tag was expected"),
        }),
    }
}

// require_constant()
// get the content of the next token, which is required to be a constant
fn require_constant(tok_iter: &mut A2mlTokenIter) -> Result<i64, A2mlSyntaxError> {
    let token = nexttoken(tok_iter)?;
    match &token.ttype {
        TokenType::Constant(c) => Ok(*c),
        tok => Err(A2mlSyntaxError {
            line: token.line,
            message: format!("incorrect token type {tok:?} where a constant was expected"),
        }),
    }
}

// nexttoken
// get the next token from the iterator and centralize the handling of potential None-values
fn nexttoken<'a>(tok_iter: &mut A2mlTokenIter<'a>) -> Result<&'a A2mlToken, A2mlSyntaxError> {
    let line = tok_iter.line();
    tok_iter.next().ok_or_else(|| A2mlSyntaxError {
        line,
        message: "unexpected end of input".to_string(),
    })
}

impl<'a> A2mlTokenIter<'a> {
    fn next(&mut self) -> Option<&'a A2mlToken> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn peek(&self) -> Option<&'a TokenType> {
        self.tokens.get(self.pos).map(|token| &token.ttype)
    }

    // the line of the next token, or of the last token at the end of the input
    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |token| token.line)
    }
}
