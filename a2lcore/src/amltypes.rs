use crate::taglist::{TagList, Tagged};
use fnv::FnvHashMap;
use std::fmt::Display;

/// The scalar types of A2ML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedKind {
    Char,
    Int,
    Long,
    Int64,
    UChar,
    UInt,
    ULong,
    UInt64,
    Float,
    Double,
}

/// The kinds of A2ML types that can be declared with a name and referenced elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    StructType,
    TaggedStructType,
    TaggedUnion,
    Enumeration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredefinedType {
    pub kind: PredefinedKind,
}

/// one tag of an enumeration and its numeric value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerator {
    pub tag: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    pub name: Option<String>,
    pub enumerators: TagList<Enumerator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: Option<String>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedStructType {
    pub name: Option<String>,
    /// members in declaration order, indexed by tag
    pub members: TagList<TaggedStructMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedUnion {
    pub name: Option<String>,
    /// members in declaration order, indexed by tag
    pub members: TagList<TaggedUnionMember>,
}

/// A use of a type, optionally as an array
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub type_name: TypeName,
    /// the array dimensions, outermost first. Empty if the member is not an array
    pub array_specifier: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    /// the tag of the enclosing tagged item or block, if any
    pub tag: Option<String>,
    pub name: Option<String>,
    pub type_: AmlType,
}

/// A reference by name to a type that is declared elsewhere
///
/// The target is looked up in the [`TypeRegistry`] when it is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referrer {
    pub category: Category,
    pub identifier: String,
}

/// `block "TAG" ...`, which is written as `/begin TAG ... /end TAG` in the a2l file
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDefinition {
    pub tag: String,
    pub type_name: TypeName,
    /// set for the forms `block "TAG" (member)*` and `block "TAG" type[dim]`
    pub member: Option<Member>,
    /// the member may repeat inside the block
    pub multiple: bool,
}

/// `"TAG" member` or `"TAG" (member)*` inside a taggedstruct or taggedunion
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedStructDefinition {
    pub tag: String,
    /// `None` for a tag that carries no data
    pub member: Option<Member>,
    /// the member may repeat after a single occurrence of the tag
    pub multiple: bool,
}

/// the two alternatives that can be selected by a tag
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedItem {
    Definition(TaggedStructDefinition),
    Block(BlockDefinition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedStructMember {
    pub item: TaggedItem,
    /// the whole tagged item may occur several times
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedUnionMember {
    pub item: TaggedItem,
}

/// Every type that can appear in an A2ML schema
#[derive(Debug, Clone, PartialEq)]
pub enum AmlType {
    Predefined(PredefinedType),
    Enumeration(Enumeration),
    Struct(StructType),
    TaggedStruct(TaggedStructType),
    TaggedUnion(TaggedUnion),
    Referrer(Referrer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub type_name: TypeName,
}

/// a top level declaration of an A2ML schema
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Block(BlockDefinition),
    Type(TypeDefinition),
}

/// All named types of one schema, keyed by category and name
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: FnvHashMap<(Category, String), AmlType>,
}

impl PredefinedKind {
    /// the A2ML keyword for this type
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            PredefinedKind::Char => "char",
            PredefinedKind::Int => "int",
            PredefinedKind::Long => "long",
            PredefinedKind::Int64 => "int64",
            PredefinedKind::UChar => "uchar",
            PredefinedKind::UInt => "uint",
            PredefinedKind::ULong => "ulong",
            PredefinedKind::UInt64 => "uint64",
            PredefinedKind::Float => "float",
            PredefinedKind::Double => "double",
        }
    }

    /// char and uchar arrays are strings
    #[must_use]
    pub fn is_char(self) -> bool {
        matches!(self, PredefinedKind::Char | PredefinedKind::UChar)
    }
}

impl Display for PredefinedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Category::StructType => "struct",
            Category::TaggedStructType => "taggedstruct",
            Category::TaggedUnion => "taggedunion",
            Category::Enumeration => "enum",
        };
        f.write_str(text)
    }
}

impl Tagged for Enumerator {
    fn tag(&self) -> &str {
        &self.tag
    }
}

impl Tagged for TaggedStructMember {
    fn tag(&self) -> &str {
        self.item.tag()
    }
}

impl Tagged for TaggedUnionMember {
    fn tag(&self) -> &str {
        self.item.tag()
    }
}

impl Enumeration {
    /// build an enumeration from its enumerators in declaration order
    ///
    /// Enumerators without an explicit constant are numbered automatically, see [`renumber_enumerators`].
    #[must_use]
    pub fn new(name: Option<String>, entries: &[(String, Option<i64>)]) -> Self {
        let enumerators = renumber_enumerators(entries)
            .into_iter()
            .map(|(tag, value)| Enumerator { tag, value })
            .collect();
        Self { name, enumerators }
    }

    #[must_use]
    pub fn value(&self, tag: &str) -> Option<i64> {
        self.enumerators.get(tag).map(|enumerator| enumerator.value)
    }
}

/// assign values to enumerators without an explicit constant
///
/// Each unlabeled enumerator gets one more than the highest value assigned or
/// seen before it, and the first unlabeled enumerator of a list without any
/// constants gets 0. Explicit constants are kept unchanged.
#[must_use]
pub fn renumber_enumerators(entries: &[(String, Option<i64>)]) -> Vec<(String, i64)> {
    let mut highest: Option<i64> = None;
    entries
        .iter()
        .map(|(tag, constant)| {
            let value = match constant {
                Some(constant) => *constant,
                None => highest.map_or(0, |highest| highest + 1),
            };
            highest = Some(highest.map_or(value, |highest| highest.max(value)));
            (tag.clone(), value)
        })
        .collect()
}

impl TaggedStructType {
    #[must_use]
    pub fn new(name: Option<String>, members: Vec<TaggedStructMember>) -> Self {
        Self {
            name,
            members: members.into_iter().collect(),
        }
    }
}

impl TaggedUnion {
    #[must_use]
    pub fn new(name: Option<String>, members: Vec<TaggedUnionMember>) -> Self {
        Self {
            name,
            members: members.into_iter().collect(),
        }
    }
}

impl TaggedItem {
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            TaggedItem::Definition(definition) => &definition.tag,
            TaggedItem::Block(block) => &block.tag,
        }
    }

    #[must_use]
    pub fn taggedstruct_definition(&self) -> Option<&TaggedStructDefinition> {
        if let TaggedItem::Definition(definition) = self {
            Some(definition)
        } else {
            None
        }
    }

    #[must_use]
    pub fn block_definition(&self) -> Option<&BlockDefinition> {
        if let TaggedItem::Block(block) = self {
            Some(block)
        } else {
            None
        }
    }
}

impl AmlType {
    /// the category under which a named type of this kind is registered
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            AmlType::Predefined(_) => None,
            AmlType::Enumeration(_) => Some(Category::Enumeration),
            AmlType::Struct(_) => Some(Category::StructType),
            AmlType::TaggedStruct(_) => Some(Category::TaggedStructType),
            AmlType::TaggedUnion(_) => Some(Category::TaggedUnion),
            AmlType::Referrer(referrer) => Some(referrer.category),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            AmlType::Predefined(_) => None,
            AmlType::Enumeration(Enumeration { name, .. })
            | AmlType::Struct(StructType { name, .. })
            | AmlType::TaggedStruct(TaggedStructType { name, .. })
            | AmlType::TaggedUnion(TaggedUnion { name, .. }) => name.as_deref(),
            AmlType::Referrer(referrer) => Some(&referrer.identifier),
        }
    }

    /// a short description of the type for messages
    #[must_use]
    pub fn describe(&self) -> String {
        match (self, self.name()) {
            (AmlType::Predefined(predefined), _) => predefined.kind.to_string(),
            (AmlType::Referrer(referrer), _) => {
                format!("reference to {} {}", referrer.category, referrer.identifier)
            }
            (_, Some(name)) => format!("{} {name}", self.category_text()),
            (_, None) => format!("anonymous {}", self.category_text()),
        }
    }

    fn category_text(&self) -> String {
        self.category()
            .map_or_else(String::new, |category| category.to_string())
    }
}

impl Declaration {
    #[must_use]
    pub fn block_definition(&self) -> Option<&BlockDefinition> {
        if let Declaration::Block(block) = self {
            Some(block)
        } else {
            None
        }
    }

    #[must_use]
    pub fn type_definition(&self) -> Option<&TypeDefinition> {
        if let Declaration::Type(typedef) = self {
            Some(typedef)
        } else {
            None
        }
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// store a named type
    ///
    /// Anonymous types and referrers are not stored. A type that is registered again
    /// under the same category and name replaces the earlier one, which is returned.
    pub fn register(&mut self, aml_type: &AmlType) -> Option<AmlType> {
        if matches!(aml_type, AmlType::Referrer(_)) {
            return None;
        }
        let category = aml_type.category()?;
        let name = aml_type.name()?;
        self.types
            .insert((category, name.to_string()), aml_type.clone())
    }

    #[must_use]
    pub fn get(&self, category: Category, name: &str) -> Option<&AmlType> {
        self.types.get(&(category, name.to_string()))
    }

    /// follow a referrer to the type it names. Any other type is returned unchanged.
    #[must_use]
    pub fn resolve<'a>(&'a self, aml_type: &'a AmlType) -> Option<&'a AmlType> {
        match aml_type {
            AmlType::Referrer(referrer) => self.get(referrer.category, &referrer.identifier),
            _ => Some(aml_type),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(list: &[(&str, Option<i64>)]) -> Vec<(String, Option<i64>)> {
        list.iter()
            .map(|(tag, constant)| (tag.to_string(), *constant))
            .collect()
    }

    #[test]
    fn renumber_without_constants() {
        let enumeration = Enumeration::new(
            None,
            &entries(&[("PARITY_NONE", None), ("PARITY_ODD", None), ("PARITY_EVEN", None)]),
        );
        assert_eq!(enumeration.value("PARITY_NONE"), Some(0));
        assert_eq!(enumeration.value("PARITY_ODD"), Some(1));
        assert_eq!(enumeration.value("PARITY_EVEN"), Some(2));
    }

    #[test]
    fn renumber_from_explicit_start() {
        let enumeration = Enumeration::new(
            None,
            &entries(&[
                ("NO_CHECKSUM", Some(10)),
                ("CHECKSUM_BYTE", None),
                ("CHECKSUM_WORD", None),
            ]),
        );
        let values: Vec<i64> = enumeration.enumerators.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![10, 11, 12]);
    }

    #[test]
    fn renumber_with_gaps() {
        let result = renumber_enumerators(&entries(&[
            ("UNIT_1NS", Some(0)),
            ("UNIT_10NS", Some(1)),
            ("UNIT_100NS", None),
            ("UNIT_1US", Some(30)),
            ("UNIT_10US", Some(4)),
            ("UNIT_100US", Some(5)),
            ("UNIT_1MS", Some(6)),
            ("UNIT_10MS", Some(7)),
            ("UNIT_100MS", Some(8)),
            ("UNIT_1S", Some(9)),
        ]));
        let values: Vec<i64> = result.iter().map(|(_, value)| *value).collect();
        assert_eq!(values, vec![0, 1, 2, 30, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn renumber_after_out_of_order_constants() {
        let result = renumber_enumerators(&entries(&[("A", Some(5)), ("B", Some(1)), ("C", None)]));
        assert_eq!(result[2], ("C".to_string(), 6));
    }

    #[test]
    fn registry_last_wins() {
        let mut registry = TypeRegistry::new();
        let first = AmlType::Struct(StructType {
            name: Some("S".to_string()),
            members: vec![],
        });
        let second = AmlType::Struct(StructType {
            name: Some("S".to_string()),
            members: vec![Member {
                type_name: TypeName {
                    tag: None,
                    name: None,
                    type_: AmlType::Predefined(PredefinedType {
                        kind: PredefinedKind::Long,
                    }),
                },
                array_specifier: vec![],
            }],
        });
        assert!(registry.register(&first).is_none());
        assert_eq!(registry.register(&second), Some(first));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(Category::StructType, "S"), Some(&second));
        assert!(registry.get(Category::TaggedStructType, "S").is_none());

        // anonymous types and referrers are never registered
        let anonymous = AmlType::Struct(StructType {
            name: None,
            members: vec![],
        });
        assert!(registry.register(&anonymous).is_none());
        let referrer = AmlType::Referrer(Referrer {
            category: Category::StructType,
            identifier: "S".to_string(),
        });
        assert!(registry.register(&referrer).is_none());
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.resolve(&referrer), Some(&second));
        assert_eq!(registry.resolve(&anonymous), Some(&anonymous));
        let missing = AmlType::Referrer(Referrer {
            category: Category::Enumeration,
            identifier: "S".to_string(),
        });
        assert!(registry.resolve(&missing).is_none());
    }

    #[test]
    fn describe_types() {
        let predefined = AmlType::Predefined(PredefinedType {
            kind: PredefinedKind::UInt64,
        });
        assert_eq!(predefined.describe(), "uint64");
        let tu = AmlType::TaggedUnion(TaggedUnion::new(Some("Daq".to_string()), vec![]));
        assert_eq!(tu.describe(), "taggedunion Daq");
        let ts = AmlType::TaggedStruct(TaggedStructType::new(None, vec![]));
        assert_eq!(ts.describe(), "anonymous taggedstruct");
    }
}
