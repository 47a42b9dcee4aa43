//! a2lcore reads the embedded sub-languages of a2l files.
//!
//! Loading a file runs the following pipeline:
//!
//! - the preprocessor strips comments and splices in `/include`d files, recording a line map
//!   that leads back to the original file and line
//! - the `A2ML` block and all `IF_DATA` blocks are extracted from the preprocessed text
//! - the `A2ML` text is parsed and converted into a type model
//! - each `IF_DATA` block can then be interpreted according to that type model
//!
//! # Example
//!
//! ```rust
//! # use a2lcore::{IfDataValue, LoadOptions};
//! let text = r#"
//! /begin A2ML
//!     block "IF_DATA" taggedunion { "XCP" struct { uint; char[16]; }; };
//! /end A2ML
//! /begin IF_DATA XCP 42 "text" /end IF_DATA
//! "#;
//! let (document, _log_msgs) = a2lcore::load_from_string(text, &LoadOptions::default()).unwrap();
//! let section = document.if_data.iter().next().unwrap();
//! let value = document.interpret_if_data(section).unwrap();
//! assert!(matches!(value, IfDataValue::Block { .. }));
//! ```

mod a2ml;
mod amlbuilder;
mod amltypes;
mod ifdata;
mod linemap;
mod loader;
mod preprocessor;
mod sections;
mod taglist;
mod tokenizer;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use a2ml::{
    A2mlFile, A2mlSyntaxError, BlockDefinitionNode, DeclarationNode, EnumeratorNode,
    MemberNode, TaggedDefinitionNode, TaggedItemNode, TaggedStructMemberNode, TypeNameNode,
    parse_a2ml,
};
pub use amlbuilder::{AmlModelBuilder, AmlSchema};
pub use amltypes::*;
pub use ifdata::{IfDataError, IfDataInterpreter, IfDataTaggedItem, IfDataValue, TaggedValue};
pub use linemap::{LineMap, LineMapEntry, LineMapError, RawLineMap};
pub use loader::Encoding;
pub use preprocessor::{
    Preprocessed, PreprocessorError, preprocess_file, preprocess_str, strip_comments,
};
pub use sections::{
    A2mlSection, ExtractedSections, IfDataSection, IfDataSections, SectionSpan, TextPosition,
    extract_sections,
};
pub use taglist::{TagList, Tagged};
pub use tokenizer::{
    Channel, IfDataToken, IfDataTokenType, TokenCursor, TokenizerError, tokenize,
};

/// The environment variable that conventionally holds the include search path
pub const INCLUDE_PATH_ENV: &str = "A2L_INCLUDE_PATH";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum A2lError {
    /// `FileOpenError`: An `IoError` that occurred while loading a file
    #[error("Failed to load {filename}: {ioerror}")]
    FileOpenError {
        filename: PathBuf,
        ioerror: std::io::Error,
    },

    /// `FileReadError`: An `IoError` that occurred while reading from a file
    #[error("Could not read from {filename}: {ioerror}")]
    FileReadError {
        filename: PathBuf,
        ioerror: std::io::Error,
    },

    /// `EncodingError`: The file content is not valid in the requested encoding
    #[error("{filename}: invalid data for the selected encoding at byte offset {position}")]
    EncodingError { filename: PathBuf, position: usize },

    /// `PreprocessorError`: Failed to strip comments, resolve includes or extract sections
    #[error("Preprocessor error: {preprocessor_error}")]
    PreprocessorError {
        preprocessor_error: PreprocessorError,
    },

    /// `A2mlError`: The `A2ML` block of the file could not be parsed
    #[error("{filename}:{line}: the A2ML block could not be parsed: {a2ml_error}")]
    A2mlError {
        filename: String,
        line: u32,
        a2ml_error: A2mlSyntaxError,
    },

    /// `A2mlWithoutIfData`: The `A2ML` block of the file can't be used to interpret `IF_DATA`
    #[error("{filename}:{line}: the A2ML block does not declare a block \"IF_DATA\"")]
    A2mlWithoutIfData { filename: String, line: u32 },

    /// `InvalidBuiltinA2mlSpec`: Parse error while processing a built-in a2ml specification
    #[error("Failed to load built-in a2ml specification: {a2ml_error}")]
    InvalidBuiltinA2mlSpec { a2ml_error: A2mlSyntaxError },

    /// `IfDataError`: The content of an `IF_DATA` block does not match the schema
    #[error("IF_DATA error: {if_data_error}")]
    IfDataError { if_data_error: IfDataError },
}

/// Settings for [`load`] and [`load_from_string`]
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// encoding of the main file and of all included files
    pub encoding: Encoding,
    /// additional directories that are searched for `/include`d files
    pub include_paths: Vec<PathBuf>,
    /// If strict loading is enabled, warnings become errors.
    pub strict: bool,
    /// reject enum values that are not declared in the A2ML enumeration
    pub strict_enums: bool,
    /// A2ML text that is tried before the `A2ML` block of the file
    pub a2ml_spec: Option<String>,
}

/// The result of loading an a2l file
#[derive(Debug, Clone)]
pub struct A2lDocument {
    /// the preprocessed text without the content of the `A2ML` and `IF_DATA` blocks
    pub text: String,
    pub line_map: LineMap,
    pub a2ml: Option<A2mlSection>,
    pub if_data: IfDataSections,
    /// the schema built from the `A2ML` block of the file
    pub file_schema: Option<AmlSchema>,
    /// the schema built from [`LoadOptions::a2ml_spec`]
    pub builtin_schema: Option<AmlSchema>,
    strict_enums: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            include_paths: Vec::new(),
            strict: true,
            strict_enums: false,
            a2ml_spec: None,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_encoding(self, encoding: Encoding) -> Self {
        Self { encoding, ..self }
    }

    #[must_use]
    pub fn with_include_paths(self, include_paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths,
            ..self
        }
    }

    /// append the directories listed in the environment variable `var`
    ///
    /// The list uses the path separator of the platform. A missing variable adds nothing.
    #[must_use]
    pub fn with_include_paths_from_env(mut self, var: &str) -> Self {
        if let Some(value) = std::env::var_os(var) {
            self.include_paths.extend(
                std::env::split_paths(&value).filter(|path| !path.as_os_str().is_empty()),
            );
        }
        self
    }

    #[must_use]
    pub fn with_strict(self, strict: bool) -> Self {
        Self { strict, ..self }
    }

    #[must_use]
    pub fn with_strict_enums(self, strict_enums: bool) -> Self {
        Self {
            strict_enums,
            ..self
        }
    }

    #[must_use]
    pub fn with_a2ml_spec(self, a2ml_spec: impl Into<String>) -> Self {
        Self {
            a2ml_spec: Some(a2ml_spec.into()),
            ..self
        }
    }
}

/**
Load an a2l file

All `/include`d files are loaded as well, using the same encoding.
The returned `Vec<A2lError>` contains the warnings that were generated while loading.

# Example
```
# use a2lcore::LoadOptions;
match a2lcore::load("example.a2l", &LoadOptions::default()) {
    Ok((document, log_messages)) => {/* do something with it*/},
    Err(error_message) => println!("{error_message}")
}
```

# Errors

An `A2lError` provides details information if loading the file fails.
 */
pub fn load<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> Result<(A2lDocument, Vec<A2lError>), A2lError> {
    let preprocessed =
        preprocessor::preprocess_file(path.as_ref(), options.encoding, &options.include_paths)?;
    load_impl(preprocessed, options)
}

/**
Load a2l data stored in a string

Relative includes are resolved against the working directory and the include paths of the `options`.

# Errors

An `A2lError` provides details information if loading the data fails.
 */
pub fn load_from_string(
    a2ldata: &str,
    options: &LoadOptions,
) -> Result<(A2lDocument, Vec<A2lError>), A2lError> {
    let preprocessed = preprocessor::preprocess_str(
        a2ldata,
        "(input)",
        options.encoding,
        &options.include_paths,
    )?;
    load_impl(preprocessed, options)
}

fn load_impl(
    preprocessed: Preprocessed,
    options: &LoadOptions,
) -> Result<(A2lDocument, Vec<A2lError>), A2lError> {
    let mut log_msgs = Vec::<A2lError>::new();
    let Preprocessed { lines, line_map } = preprocessed;

    let extracted = sections::extract_sections(&lines, options.strict, &mut log_msgs)?;

    // a built-in A2ML schema that was passed as a string is parsed here
    let builtin_schema = match &options.a2ml_spec {
        Some(spec) => Some(
            AmlSchema::from_a2ml(spec)
                .map_err(|a2ml_error| A2lError::InvalidBuiltinA2mlSpec { a2ml_error })?,
        ),
        None => None,
    };

    let mut file_schema = None;
    if let Some(a2ml) = &extracted.a2ml {
        match AmlSchema::from_a2ml(&a2ml.text) {
            Ok(schema) => {
                if schema.if_data_root.is_none() {
                    let (filename, line) = map_line(&line_map, a2ml.start_line);
                    log_msgs.push(A2lError::A2mlWithoutIfData { filename, line });
                }
                file_schema = Some(schema);
            }
            Err(a2ml_error) => {
                let (filename, line) =
                    map_line(&line_map, a2ml.start_line + a2ml_error.line.saturating_sub(1));
                error_or_log(
                    &mut log_msgs,
                    options.strict,
                    A2lError::A2mlError {
                        filename,
                        line,
                        a2ml_error,
                    },
                )?;
            }
        }
    }

    let document = A2lDocument {
        text: extracted.lines.join("\n"),
        line_map,
        a2ml: extracted.a2ml,
        if_data: extracted.if_data,
        file_schema,
        builtin_schema,
        strict_enums: options.strict_enums,
    };

    Ok((document, log_msgs))
}

fn error_or_log(
    log_msgs: &mut Vec<A2lError>,
    strict: bool,
    err: A2lError,
) -> Result<(), A2lError> {
    if strict {
        Err(err)
    } else {
        log_msgs.push(err);
        Ok(())
    }
}

fn map_line(line_map: &LineMap, line: u32) -> (String, u32) {
    match line_map.lookup(line) {
        Ok((filename, line)) => (filename.to_string(), line),
        Err(_) => ("(preprocessed)".to_string(), line),
    }
}

impl A2lDocument {
    /// interpret one `IF_DATA` section of this document
    ///
    /// The built-in schema is tried first, then the schema from the `A2ML` block of the file.
    /// If both fail, the error of the last attempt is returned.
    ///
    /// # Errors
    ///
    /// [`IfDataError::MissingIfDataRoot`] if no schema can interpret `IF_DATA`, otherwise
    /// the error that prevented the interpretation.
    pub fn interpret_if_data(&self, section: &IfDataSection) -> Result<IfDataValue, IfDataError> {
        let mut result = Err(IfDataError::MissingIfDataRoot);
        for schema in self.schemas() {
            let interpreter = IfDataInterpreter::new(schema)
                .with_line_map(&self.line_map)
                .with_strict_enums(self.strict_enums);
            result = interpreter.parse_section(section);
            if result.is_ok() {
                break;
            }
        }
        result
    }

    /// interpret every `IF_DATA` section, in the order of their positions
    ///
    /// A failure only affects the section in which it occurs.
    #[must_use]
    pub fn interpret_all(&self) -> Vec<(SectionSpan, Result<IfDataValue, IfDataError>)> {
        self.if_data
            .iter()
            .map(|section| (section.span, self.interpret_if_data(section)))
            .collect()
    }

    // schemas that have an IF_DATA entry point, in the order in which they are tried
    fn schemas(&self) -> impl Iterator<Item = &AmlSchema> {
        self.builtin_schema
            .iter()
            .chain(self.file_schema.iter())
            .filter(|schema| schema.if_data_root.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    static A2L_TEXT: &str = r#"ASAP2_VERSION 1 71
/begin PROJECT p ""
  /begin MODULE m ""
    /begin A2ML
      struct Protocol { uint; uint; };
      block "IF_DATA" taggedunion {
        "XCP" taggedstruct { block "PROTOCOL_LAYER" struct Protocol; };
      };
    /end A2ML
    /begin IF_DATA XCP /begin PROTOCOL_LAYER 1 2 /end PROTOCOL_LAYER /end IF_DATA
    /begin IF_DATA XCP
      /begin PROTOCOL_LAYER 3 x
      /end PROTOCOL_LAYER
    /end IF_DATA
  /end MODULE
/end PROJECT
"#;

    #[test]
    fn load_and_interpret() {
        let (document, log_msgs) = load_from_string(A2L_TEXT, &LoadOptions::default()).unwrap();
        assert!(log_msgs.is_empty());
        assert!(document.file_schema.is_some());
        assert!(document.builtin_schema.is_none());
        assert_eq!(document.if_data.len(), 2);
        assert_eq!(document.text.lines().count(), 16);
        assert!(!document.text.contains("PROTOCOL_LAYER"));

        let results = document.interpret_all();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.start.line, 10);
        assert!(results[0].1.is_ok());
        let Err(error) = &results[1].1 else {
            panic!("expected an error");
        };
        assert!(matches!(
            error,
            IfDataError::UnexpectedToken { filename, line: 12, .. } if filename == "(input)"
        ));
    }

    #[test]
    fn builtin_spec_first() {
        // the built-in spec reads the protocol layer as a single uint, so only the file's own A2ML matches
        let options = LoadOptions::new().with_a2ml_spec(
            r#"block "IF_DATA" taggedunion { "XCP" taggedstruct { block "PROTOCOL_LAYER" uint; }; };"#,
        );
        let (document, _) = load_from_string(A2L_TEXT, &options).unwrap();
        assert!(document.builtin_schema.is_some());
        let section = document.if_data.iter().next().unwrap();
        assert!(document.interpret_if_data(section).is_ok());

        let options = LoadOptions::new().with_a2ml_spec("struct {");
        let result = load_from_string(A2L_TEXT, &options);
        assert!(matches!(result, Err(A2lError::InvalidBuiltinA2mlSpec { .. })));
    }

    #[test]
    fn a2ml_warnings() {
        let text = "/begin A2ML struct { uint /end A2ML\n/begin IF_DATA XCP /end IF_DATA";
        let result = load_from_string(text, &LoadOptions::default());
        assert!(matches!(result, Err(A2lError::A2mlError { line: 1, .. })));

        let options = LoadOptions::new().with_strict(false);
        let (document, log_msgs) = load_from_string(text, &options).unwrap();
        assert_eq!(log_msgs.len(), 1);
        assert!(document.file_schema.is_none());
        let section = document.if_data.iter().next().unwrap();
        assert!(matches!(
            document.interpret_if_data(section),
            Err(IfDataError::MissingIfDataRoot)
        ));

        let text = "/begin A2ML struct S { uint; }; /end A2ML";
        let (document, log_msgs) = load_from_string(text, &LoadOptions::default()).unwrap();
        assert!(document.file_schema.is_some());
        assert!(matches!(log_msgs[0], A2lError::A2mlWithoutIfData { .. }));
    }

    #[test]
    fn unterminated_section() {
        let text = "/begin MODULE m \"\"\n/begin IF_DATA XCP 1 2\n";
        let result = load_from_string(text, &LoadOptions::default());
        assert!(matches!(
            result,
            Err(A2lError::PreprocessorError {
                preprocessor_error: PreprocessorError::UnterminatedSection { line: 2, .. }
            })
        ));

        let options = LoadOptions::new().with_strict(false);
        let (document, log_msgs) = load_from_string(text, &options).unwrap();
        assert_eq!(log_msgs.len(), 1);
        assert!(document.if_data.is_empty());
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();

        // create a file in a temp directory and load it
        let path = dir.path().join("test.a2l");
        std::fs::write(&path, A2L_TEXT).unwrap();

        let (document, _) = load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(document.if_data.len(), 2);
        let Err(error) = &document.interpret_all()[1].1 else {
            panic!("expected an error");
        };
        let filename = path.canonicalize().unwrap().to_string_lossy().to_string();
        assert!(error.to_string().starts_with(&format!("{filename}:12: ")));

        let result = load(dir.path().join("missing.a2l"), &LoadOptions::default());
        assert!(matches!(result, Err(A2lError::FileOpenError { .. })));
    }

    #[test]
    fn options() {
        let options = LoadOptions::default();
        assert!(options.strict);
        assert!(!options.strict_enums);
        assert_eq!(options.encoding, Encoding::Latin1);

        let options = LoadOptions::new()
            .with_encoding(Encoding::Utf8)
            .with_include_paths(vec![PathBuf::from("inc")])
            .with_include_paths_from_env("A2LCORE_TEST_UNSET_VARIABLE")
            .with_strict_enums(true);
        assert_eq!(options.encoding, Encoding::Utf8);
        assert_eq!(options.include_paths, vec![PathBuf::from("inc")]);
        assert!(options.strict_enums);
    }
}
