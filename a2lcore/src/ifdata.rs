use crate::amlbuilder::AmlSchema;
use crate::amltypes::{
    AmlType, BlockDefinition, Category, Enumeration, Member, PredefinedKind, StructType,
    TaggedItem, TaggedStructDefinition, TaggedStructType, TaggedUnion,
};
use crate::linemap::LineMap;
use crate::sections::IfDataSection;
use crate::taglist::{TagList, Tagged};
use crate::tokenizer::{IfDataToken, IfDataTokenType, TokenCursor, TokenizerError};
use num_traits::{NumCast, PrimInt, ToPrimitive};
use thiserror::Error;

// pseudo file name for positions that can't be mapped to a source file
const PREPROCESSED: &str = "(preprocessed)";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IfDataError {
    #[error("{filename}:{line}: expected {expected}, got \"{actual}\" inside block {block} starting on line {block_line}")]
    UnexpectedToken {
        filename: String,
        line: u32,
        expected: String,
        actual: String,
        block: String,
        block_line: u32,
    },

    #[error("{filename}:{line}: encountered the end of the input while not done parsing block {block} starting on line {block_line}")]
    EndOfStream {
        filename: String,
        line: u32,
        block: String,
        block_line: u32,
    },

    #[error("{filename}:{line}: {category} {identifier} was referenced but not defined")]
    UnresolvedReference {
        filename: String,
        line: u32,
        category: Category,
        identifier: String,
    },

    #[error("{filename}:{line}: {construct} can't be used to interpret IF_DATA")]
    UnsupportedConstruct {
        filename: String,
        line: u32,
        construct: String,
    },

    #[error("{filename}:{line}: Unknown element {tag} found inside block {block} starting on line {block_line}")]
    UnknownTag {
        filename: String,
        line: u32,
        tag: String,
        block: String,
        block_line: u32,
    },

    #[error("{filename}:{line}: Wrong end tag {tag} found at the end of block {block} starting on line {block_line}")]
    IncorrectEndTag {
        filename: String,
        line: u32,
        tag: String,
        block: String,
        block_line: u32,
    },

    #[error("{filename}:{line}: string \"{numstr}\" could not be interpreted as a value of type {kind}")]
    MalformedNumber {
        filename: String,
        line: u32,
        numstr: String,
        kind: PredefinedKind,
    },

    #[error("{filename}:{line}: expected an enum value, but \"{enumtxt}\" is not part of the enum (located inside block {block} starting on line {block_line})")]
    InvalidEnumValue {
        filename: String,
        line: u32,
        enumtxt: String,
        block: String,
        block_line: u32,
    },

    #[error("{filename}:{line}: unexpected \"{text}\" after the end of the IF_DATA block")]
    AdditionalTokens {
        filename: String,
        line: u32,
        text: String,
    },

    #[error("{filename}:{line}: {tokenizer_error}")]
    TokenizerError {
        filename: String,
        line: u32,
        tokenizer_error: TokenizerError,
    },

    #[error("The A2ML schema does not contain a block \"IF_DATA\"")]
    MissingIfDataRoot,
}

/// The value of one item of a tagged struct
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedValue {
    Single(IfDataValue),
    /// all occurrences of a tag that may be repeated, in input order
    Multiple(Vec<IfDataValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfDataTaggedItem {
    pub tag: String,
    pub value: TaggedValue,
}

/// The content of an `IF_DATA` block, shaped by the A2ML schema
#[derive(Debug, Clone, PartialEq)]
pub enum IfDataValue {
    /// a tag without data
    None,
    /// any of the signed integer types
    Int { value: i64, is_hex: bool },
    /// any of the unsigned integer types
    UInt { value: u64, is_hex: bool },
    Float(f64),
    String(String),
    EnumItem(String),
    /// arrays and repeated members
    Sequence(Vec<IfDataValue>),
    Struct(Vec<IfDataValue>),
    TaggedStruct(TagList<IfDataTaggedItem>),
    TaggedUnion {
        tag: String,
        value: Box<IfDataValue>,
    },
    Block {
        tag: String,
        value: Box<IfDataValue>,
    },
}

/// Interprets the text of `IF_DATA` sections according to an A2ML schema
///
/// The interpreter only reads the schema, so one interpreter can be shared by
/// several threads that each work on different sections.
#[derive(Debug, Clone, Copy)]
pub struct IfDataInterpreter<'a> {
    schema: &'a AmlSchema,
    line_map: Option<&'a LineMap>,
    strict_enums: bool,
}

// describes the current parser context, giving the name of the current element and its line number
#[derive(Debug, Clone)]
struct ParseContext {
    element: String,
    line: u32,
}

struct InterpreterState<'a, 't> {
    schema: &'a AmlSchema,
    line_map: Option<&'a LineMap>,
    strict_enums: bool,
    cursor: TokenCursor<'t>,
    // the preprocessed line on which the interpreted text starts
    first_line: u32,
}

impl<'a> IfDataInterpreter<'a> {
    #[must_use]
    pub fn new(schema: &'a AmlSchema) -> Self {
        Self {
            schema,
            line_map: None,
            strict_enums: false,
        }
    }

    /// report error positions in the original files instead of the preprocessed text
    #[must_use]
    pub fn with_line_map(self, line_map: &'a LineMap) -> Self {
        Self {
            line_map: Some(line_map),
            ..self
        }
    }

    /// reject enum values that are not declared in the enumeration
    #[must_use]
    pub fn with_strict_enums(self, strict_enums: bool) -> Self {
        Self {
            strict_enums,
            ..self
        }
    }

    /// interpret one extracted `IF_DATA` section
    ///
    /// # Errors
    ///
    /// An [`IfDataError`] if the text does not match the schema. There is no partial result.
    pub fn parse_section(&self, section: &IfDataSection) -> Result<IfDataValue, IfDataError> {
        self.parse_at(&section.text, section.span.start.line)
    }

    /// interpret a complete `/begin IF_DATA ... /end IF_DATA` text
    ///
    /// # Errors
    ///
    /// An [`IfDataError`] if the text does not match the schema
    pub fn parse_text(&self, text: &str) -> Result<IfDataValue, IfDataError> {
        self.parse_at(text, 1)
    }

    fn parse_at(&self, text: &str, first_line: u32) -> Result<IfDataValue, IfDataError> {
        let cursor = match TokenCursor::new(text) {
            Ok(cursor) => cursor,
            Err(tokenizer_error) => {
                let (filename, line) =
                    map_position(self.line_map, first_line, tokenizer_error.line());
                return Err(IfDataError::TokenizerError {
                    filename,
                    line,
                    tokenizer_error,
                });
            }
        };
        let root = self
            .schema
            .if_data_root
            .as_ref()
            .ok_or(IfDataError::MissingIfDataRoot)?;

        let mut state = InterpreterState {
            schema: self.schema,
            line_map: self.line_map,
            strict_enums: self.strict_enums,
            cursor,
            first_line,
        };
        let context = ParseContext {
            element: root.tag.clone(),
            line: 1,
        };
        let value = state.parse_block(root, &context)?;

        // the root block must cover the entire text
        if let Some(token) = state.cursor.peek() {
            let (filename, line) = state.position(token.line);
            return Err(IfDataError::AdditionalTokens {
                filename,
                line,
                text: state.cursor.get_token_text(&token).to_string(),
            });
        }

        Ok(value)
    }
}

impl<'a, 't> InterpreterState<'a, 't> {
    // parse_block()
    // a block is enclosed in /begin <tag> ... /end <tag> and contains exactly one value of the block's type
    fn parse_block(
        &mut self,
        block: &'a BlockDefinition,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        self.expect_token(context, IfDataTokenType::Begin)?;
        let ident = self.expect_token(context, IfDataTokenType::Ident)?;
        let tag = self.cursor.get_token_text(&ident);
        if tag != block.tag {
            return Err(self.unexpected_token(context, &ident, &block.tag));
        }
        let newcontext = ParseContext {
            element: block.tag.clone(),
            line: ident.line,
        };

        let value = match &block.member {
            Some(member) if block.multiple => self.parse_repeated(member, &newcontext)?,
            Some(member) => self.parse_member(member, &newcontext)?,
            None => self.parse_type(&block.type_name.type_, &newcontext)?,
        };

        self.parse_block_end(&newcontext)?;

        Ok(IfDataValue::Block {
            tag: block.tag.clone(),
            value: Box::new(value),
        })
    }

    // parse_block_end()
    // make sure that blocks that started with /begin end with /end and the same tag
    fn parse_block_end(&mut self, context: &ParseContext) -> Result<(), IfDataError> {
        match self.get_next_tag(context)? {
            Some((tag, _, line)) => {
                let (filename, line) = self.position(line);
                Err(IfDataError::UnknownTag {
                    filename,
                    line,
                    tag: tag.to_string(),
                    block: context.element.clone(),
                    block_line: self.position(context.line).1,
                })
            }
            None => {
                self.expect_token(context, IfDataTokenType::End)?;
                let endident = self.expect_token(context, IfDataTokenType::Ident)?;
                let endtag = self.cursor.get_token_text(&endident);
                if endtag != context.element {
                    let (filename, line) = self.position(endident.line);
                    return Err(IfDataError::IncorrectEndTag {
                        filename,
                        line,
                        tag: endtag.to_string(),
                        block: context.element.clone(),
                        block_line: self.position(context.line).1,
                    });
                }
                Ok(())
            }
        }
    }

    // parse_type()
    // dispatch by the kind of the (resolved) type
    fn parse_type(
        &mut self,
        aml_type: &'a AmlType,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        match self.resolve(aml_type)? {
            AmlType::Predefined(predefined) => self.parse_predefined(predefined.kind, context),
            AmlType::Enumeration(enumeration) => self.parse_enum(enumeration, context),
            AmlType::Struct(structtype) => self.parse_struct(structtype, context),
            AmlType::TaggedStruct(taggedstruct) => self.parse_taggedstruct(taggedstruct, context),
            AmlType::TaggedUnion(taggedunion) => self.parse_taggedunion(taggedunion, context),
            AmlType::Referrer(referrer) => {
                let (filename, line) = self.position(self.cursor.last_line());
                Err(IfDataError::UnsupportedConstruct {
                    filename,
                    line,
                    construct: format!(
                        "a reference to {} {} that resolves to another reference",
                        referrer.category, referrer.identifier
                    ),
                })
            }
        }
    }

    fn resolve(&self, aml_type: &'a AmlType) -> Result<&'a AmlType, IfDataError> {
        match aml_type {
            AmlType::Referrer(referrer) => self
                .schema
                .registry
                .get(referrer.category, &referrer.identifier)
                .ok_or_else(|| {
                    let (filename, line) = self.position(self.cursor.last_line());
                    IfDataError::UnresolvedReference {
                        filename,
                        line,
                        category: referrer.category,
                        identifier: referrer.identifier.clone(),
                    }
                }),
            _ => Ok(aml_type),
        }
    }

    // parse_member()
    // a member is a type with optional array dimensions
    fn parse_member(
        &mut self,
        member: &'a Member,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        self.parse_array(&member.type_name.type_, &member.array_specifier, context)
    }

    // parse_array()
    // Arrays of char and uchar are strings, all other arrays contain one value per element.
    // Multi-dimensional arrays become nested sequences, with the first dimension outermost.
    fn parse_array(
        &mut self,
        aml_type: &'a AmlType,
        dims: &[u32],
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let Some((dim, inner_dims)) = dims.split_first() else {
            return self.parse_type(aml_type, context);
        };
        if inner_dims.is_empty() {
            if let AmlType::Predefined(predefined) = self.resolve(aml_type)? {
                if predefined.kind.is_char() {
                    return self.parse_string(context);
                }
            }
        }

        let mut items = Vec::with_capacity(*dim as usize);
        for _ in 0..*dim {
            items.push(self.parse_array(aml_type, inner_dims, context)?);
        }
        Ok(IfDataValue::Sequence(items))
    }

    // parse_repeated()
    // "(member)*": parse the member as often as possible. The attempt that fails is undone.
    fn parse_repeated(
        &mut self,
        member: &'a Member,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let mut items = Vec::new();
        let mut checkpoint = self.cursor.get_tokenpos();
        while let Ok(item) = self.parse_member(member, context) {
            if self.cursor.get_tokenpos() == checkpoint {
                // nothing was consumed, so the next attempt would not get any further
                break;
            }
            items.push(item);
            checkpoint = self.cursor.get_tokenpos();
        }
        self.cursor.set_tokenpos(checkpoint);
        Ok(IfDataValue::Sequence(items))
    }

    // parse_struct()
    // struct members are positional and all of them are required
    fn parse_struct(
        &mut self,
        structtype: &'a StructType,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let mut items = Vec::with_capacity(structtype.members.len());
        for member in &structtype.members {
            items.push(self.parse_member(member, context)?);
        }
        Ok(IfDataValue::Struct(items))
    }

    // parse_taggedstruct()
    // parse tagged items until the next tag is not part of this taggedstruct
    fn parse_taggedstruct(
        &mut self,
        taggedstruct: &'a TaggedStructType,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let mut result = TagList::<IfDataTaggedItem>::new();
        while let Some((tag, is_block, _)) = self.get_next_tag(context)? {
            let Some(member) = taggedstruct.members.get(tag) else {
                break;
            };
            if matches!(member.item, TaggedItem::Block(_)) != is_block {
                break;
            }
            let value = self.parse_tagged_item(&member.item, context)?;

            if member.multiple {
                if let Some(IfDataTaggedItem {
                    value: TaggedValue::Multiple(values),
                    ..
                }) = result.get_mut(tag)
                {
                    values.push(value);
                } else {
                    result.insert(IfDataTaggedItem {
                        tag: tag.to_string(),
                        value: TaggedValue::Multiple(vec![value]),
                    });
                }
            } else {
                // a repeated occurrence replaces the earlier one
                result.insert(IfDataTaggedItem {
                    tag: tag.to_string(),
                    value: TaggedValue::Single(value),
                });
            }
        }

        Ok(IfDataValue::TaggedStruct(result))
    }

    // parse_taggedunion()
    // exactly one of the members of the taggedunion must be present
    fn parse_taggedunion(
        &mut self,
        taggedunion: &'a TaggedUnion,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let Some((tag, is_block, line)) = self.get_next_tag(context)? else {
            let token = self.get_token(context)?;
            return Err(self.unexpected_token(context, &token, "a tag"));
        };
        let Some(member) = taggedunion.members.get(tag) else {
            let (filename, line) = self.position(line);
            return Err(IfDataError::UnknownTag {
                filename,
                line,
                tag: tag.to_string(),
                block: context.element.clone(),
                block_line: self.position(context.line).1,
            });
        };
        if matches!(member.item, TaggedItem::Block(_)) != is_block {
            let token = self.get_token(context)?;
            let expected = if is_block {
                format!("the tag {tag} without /begin")
            } else {
                format!("/begin {tag}")
            };
            return Err(self.unexpected_token(context, &token, &expected));
        }

        let value = self.parse_tagged_item(&member.item, context)?;
        Ok(IfDataValue::TaggedUnion {
            tag: member.tag().to_string(),
            value: Box::new(value),
        })
    }

    // parse_tagged_item()
    // parse the tag and the data of an item of a taggedstruct or taggedunion
    fn parse_tagged_item(
        &mut self,
        item: &'a TaggedItem,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        match item {
            TaggedItem::Block(block) => self.parse_block(block, context),
            TaggedItem::Definition(definition) => self.parse_tagged_definition(definition, context),
        }
    }

    fn parse_tagged_definition(
        &mut self,
        definition: &'a TaggedStructDefinition,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let ident = self.expect_token(context, IfDataTokenType::Ident)?;
        let newcontext = ParseContext {
            element: definition.tag.clone(),
            line: ident.line,
        };
        match &definition.member {
            None => Ok(IfDataValue::None),
            Some(member) if definition.multiple => self.parse_repeated(member, &newcontext),
            Some(member) => self.parse_member(member, &newcontext),
        }
    }

    // get_next_tag()
    // Peek at the tag of the next item of a taggedstruct or taggedunion. Nothing is consumed.
    // The tag is either a bare identifier or the identifier that follows /begin.
    fn get_next_tag(
        &self,
        context: &ParseContext,
    ) -> Result<Option<(&'t str, bool, u32)>, IfDataError> {
        match self.cursor.peek() {
            Some(IfDataToken {
                ttype: IfDataTokenType::Begin,
                ..
            }) => match self.cursor.peek_nth(1) {
                Some(
                    token @ IfDataToken {
                        ttype: IfDataTokenType::Ident,
                        ..
                    },
                ) => Ok(Some((self.cursor.get_token_text(&token), true, token.line))),
                // an Identifier must follow after a /begin
                Some(token) => Err(self.unexpected_token(context, &token, "an identifier")),
                None => Err(self.end_of_stream(context)),
            },
            Some(
                token @ IfDataToken {
                    ttype: IfDataTokenType::Ident,
                    ..
                },
            ) => Ok(Some((self.cursor.get_token_text(&token), false, token.line))),
            _ => Ok(None),
        }
    }

    fn parse_predefined(
        &mut self,
        kind: PredefinedKind,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let token = self.get_token(context)?;
        let is_number = matches!(
            token.ttype,
            IfDataTokenType::Int | IfDataTokenType::Hex | IfDataTokenType::Float
        );
        if !is_number {
            return Err(self.unexpected_token(context, &token, &format!("a value of type {kind}")));
        }
        let text = self.cursor.get_token_text(&token);

        let value = match kind {
            PredefinedKind::Char => signed_value(parse_integer::<i8>(text)),
            PredefinedKind::Int => signed_value(parse_integer::<i16>(text)),
            PredefinedKind::Long => signed_value(parse_integer::<i32>(text)),
            PredefinedKind::Int64 => signed_value(parse_integer::<i64>(text)),
            PredefinedKind::UChar => unsigned_value(parse_integer::<u8>(text)),
            PredefinedKind::UInt => unsigned_value(parse_integer::<u16>(text)),
            PredefinedKind::ULong => unsigned_value(parse_integer::<u32>(text)),
            PredefinedKind::UInt64 => unsigned_value(parse_integer::<u64>(text)),
            PredefinedKind::Float => parse_float(text)
                .map(|value| <f64 as From<f32>>::from(value as f32))
                .map(IfDataValue::Float),
            PredefinedKind::Double => parse_float(text).map(IfDataValue::Float),
        };

        value.ok_or_else(|| {
            let (filename, line) = self.position(token.line);
            IfDataError::MalformedNumber {
                filename,
                line,
                numstr: text.to_string(),
                kind,
            }
        })
    }

    // parse_string()
    // char arrays are written as a quoted string. A bare identifier is accepted as well.
    fn parse_string(&mut self, context: &ParseContext) -> Result<IfDataValue, IfDataError> {
        let token = self.get_token(context)?;
        let text = self.cursor.get_token_text(&token);
        match token.ttype {
            IfDataTokenType::String => {
                let inner = text
                    .strip_prefix('"')
                    .and_then(|text| text.strip_suffix('"'))
                    .unwrap_or(text);
                Ok(IfDataValue::String(unescape_string(inner)))
            }
            IfDataTokenType::Ident => Ok(IfDataValue::String(text.to_string())),
            _ => Err(self.unexpected_token(context, &token, "a string")),
        }
    }

    fn parse_enum(
        &mut self,
        enumeration: &'a Enumeration,
        context: &ParseContext,
    ) -> Result<IfDataValue, IfDataError> {
        let token = self.expect_token(context, IfDataTokenType::Ident)?;
        let enumtxt = self.cursor.get_token_text(&token);
        if self.strict_enums && !enumeration.enumerators.contains_key(enumtxt) {
            let (filename, line) = self.position(token.line);
            return Err(IfDataError::InvalidEnumValue {
                filename,
                line,
                enumtxt: enumtxt.to_string(),
                block: context.element.clone(),
                block_line: self.position(context.line).1,
            });
        }
        Ok(IfDataValue::EnumItem(enumtxt.to_string()))
    }

    // get_token
    // get one token from the cursor. Running out of tokens is always an error
    fn get_token(&mut self, context: &ParseContext) -> Result<IfDataToken, IfDataError> {
        self.cursor
            .next()
            .ok_or_else(|| self.end_of_stream(context))
    }

    // expect_token get a token which has to be of a particular type (hence: expect)
    fn expect_token(
        &mut self,
        context: &ParseContext,
        token_type: IfDataTokenType,
    ) -> Result<IfDataToken, IfDataError> {
        let token = self.get_token(context)?;
        if token.ttype != token_type {
            let expected = match token_type {
                IfDataTokenType::Begin => "/begin",
                IfDataTokenType::End => "/end",
                IfDataTokenType::Ident => "an identifier",
                _ => "a value",
            };
            return Err(self.unexpected_token(context, &token, expected));
        }
        Ok(token)
    }

    fn unexpected_token(
        &self,
        context: &ParseContext,
        token: &IfDataToken,
        expected: &str,
    ) -> IfDataError {
        let (filename, line) = self.position(token.line);
        IfDataError::UnexpectedToken {
            filename,
            line,
            expected: expected.to_string(),
            actual: self.cursor.get_token_text(token).to_string(),
            block: context.element.clone(),
            block_line: self.position(context.line).1,
        }
    }

    fn end_of_stream(&self, context: &ParseContext) -> IfDataError {
        let (filename, line) = self.position(self.cursor.last_line());
        IfDataError::EndOfStream {
            filename,
            line,
            block: context.element.clone(),
            block_line: self.position(context.line).1,
        }
    }

    fn position(&self, line: u32) -> (String, u32) {
        map_position(self.line_map, self.first_line, line)
    }
}

// map_position()
// convert a line of the interpreted text to a file name and line.
// The line map is used if it is available and knows the line, otherwise the preprocessed line is reported.
fn map_position(line_map: Option<&LineMap>, first_line: u32, line: u32) -> (String, u32) {
    let abs_line = first_line + line.saturating_sub(1);
    match line_map.map(|line_map| line_map.lookup(abs_line)) {
        Some(Ok((filename, line))) => (filename.to_string(), line),
        _ => (PREPROCESSED.to_string(), abs_line),
    }
}

// parse_integer()
// Parse an integer of type T from a decimal or hex text.
// Hex values are parsed as unsigned values with the width of T. For signed types the
// bit pattern is then interpreted as two's complement, so 0xFFFF is -1 as an i16.
fn parse_integer<T>(text: &str) -> Option<(T, bool)>
where
    T: PrimInt,
{
    if let Some(hexval) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        let raw = u64::from_str_radix(hexval, 16).ok()?;
        let bits = T::zero().count_zeros();
        if bits < 64 && raw >> bits != 0 {
            return None;
        }
        let value = if T::min_value() < T::zero() {
            let shift = 64 - bits;
            <T as NumCast>::from(((raw << shift) as i64) >> shift)?
        } else {
            <T as NumCast>::from(raw)?
        };
        Some((value, true))
    } else {
        let value = T::from_str_radix(text, 10).ok()?;
        Some((value, false))
    }
}

fn signed_value<T: ToPrimitive>(parsed: Option<(T, bool)>) -> Option<IfDataValue> {
    let (value, is_hex) = parsed?;
    Some(IfDataValue::Int {
        value: value.to_i64()?,
        is_hex,
    })
}

fn unsigned_value<T: ToPrimitive>(parsed: Option<(T, bool)>) -> Option<IfDataValue> {
    let (value, is_hex) = parsed?;
    Some(IfDataValue::UInt {
        value: value.to_u64()?,
        is_hex,
    })
}

// parse_float()
// some vendor tools write float values as hex when they are actually integers
fn parse_float(text: &str) -> Option<f64> {
    if let Some(hexval) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hexval, 16).ok().map(|num| num as f64)
    } else {
        text.parse::<f64>().ok()
    }
}

fn unescape_string(text: &str) -> String {
    /* first check if any unescaping is needed at all */
    if text.chars().any(|c| c == '\\' || c == '"') {
        let mut output = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            let escaped = match (c, chars.peek()) {
                ('\\' | '"', Some('"')) => Some('"'),
                ('\\', Some('\'')) => Some('\''),
                ('\\', Some('\\')) => Some('\\'),
                ('\\', Some('n')) => Some('\n'),
                ('\\', Some('r')) => Some('\r'),
                ('\\', Some('t')) => Some('\t'),
                _ => None,
            };
            if let Some(escaped) = escaped {
                output.push(escaped);
                chars.next();
            } else {
                output.push(c);
            }
        }
        output
    } else {
        text.to_owned()
    }
}

impl Tagged for IfDataTaggedItem {
    fn tag(&self) -> &str {
        &self.tag
    }
}

impl TaggedValue {
    /// the value of a tag that occurs once, or the last value of a repeated tag
    #[must_use]
    pub fn last(&self) -> Option<&IfDataValue> {
        match self {
            TaggedValue::Single(value) => Some(value),
            TaggedValue::Multiple(values) => values.last(),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[IfDataValue] {
        match self {
            TaggedValue::Single(value) => std::slice::from_ref(value),
            TaggedValue::Multiple(values) => values,
        }
    }
}

impl IfDataValue {
    /// the content of a block, tagged union, or any other value unchanged
    #[must_use]
    pub fn inner(&self) -> &IfDataValue {
        match self {
            IfDataValue::Block { value, .. } | IfDataValue::TaggedUnion { value, .. } => value,
            _ => self,
        }
    }

    /// look up a tag in a tagged struct
    #[must_use]
    pub fn get_tagged(&self, tag: &str) -> Option<&TaggedValue> {
        if let IfDataValue::TaggedStruct(items) = self {
            items.get(tag).map(|item| &item.value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IfDataValue::Int { value, .. } => Some(*value),
            IfDataValue::UInt { value, .. } => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            IfDataValue::String(text) | IfDataValue::EnumItem(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn items(&self) -> Option<&[IfDataValue]> {
        match self {
            IfDataValue::Sequence(items) | IfDataValue::Struct(items) => Some(items),
            _ => None,
        }
    }
}

/*************************************************************************************************/
