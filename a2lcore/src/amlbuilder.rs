use crate::a2ml::{
    A2mlFile, A2mlSyntaxError, BlockDefinitionNode, DeclarationNode, MemberNode,
    TaggedItemNode, TypeNameNode, parse_a2ml,
};
use crate::amltypes::{
    AmlType, BlockDefinition, Category, Declaration, Enumeration, Member, PredefinedType,
    Referrer, StructType, TaggedItem, TaggedStructDefinition, TaggedStructMember,
    TaggedStructType, TaggedUnion, TaggedUnionMember, TypeDefinition, TypeName, TypeRegistry,
};

/// A complete A2ML schema: the declarations, all named types, and the `IF_DATA` entry point
#[derive(Debug, Clone)]
pub struct AmlSchema {
    pub declarations: Vec<Declaration>,
    pub registry: TypeRegistry,
    /// the last top level `block "IF_DATA"`
    pub if_data_root: Option<BlockDefinition>,
}

/// Converts an A2ML parse tree into the AML type model
///
/// Every node is converted after its children. Named types with a body are registered
/// as they are completed, while named types without a body become a [`Referrer`].
#[derive(Debug, Default)]
pub struct AmlModelBuilder {
    registry: TypeRegistry,
    if_data_root: Option<BlockDefinition>,
}

impl AmlModelBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// build the schema for a parse tree
    #[must_use]
    pub fn build(file: &A2mlFile) -> AmlSchema {
        let mut builder = Self::new();
        let declarations = file
            .declarations
            .iter()
            .map(|decl| builder.build_declaration(decl))
            .collect();

        AmlSchema {
            declarations,
            registry: builder.registry,
            if_data_root: builder.if_data_root,
        }
    }

    fn build_declaration(&mut self, decl: &DeclarationNode) -> Declaration {
        match decl {
            DeclarationNode::TypeDefinition(type_name) => Declaration::Type(TypeDefinition {
                type_name: self.build_type_name(type_name, None),
            }),
            DeclarationNode::BlockDefinition(block) => {
                let block = self.build_block(block);
                if block.tag == "IF_DATA" {
                    self.if_data_root = Some(block.clone());
                }
                Declaration::Block(block)
            }
        }
    }

    // build_block()
    // The type of a block is always available in type_name. The member is only kept
    // for the forms that carry more than a plain type: "(member)*" and arrays.
    fn build_block(&mut self, block: &BlockDefinitionNode) -> BlockDefinition {
        let member = self.build_member(&block.member, Some(&block.tag));
        let type_name = member.type_name.clone();
        let member = (block.multiple || !member.array_specifier.is_empty()).then_some(member);
        BlockDefinition {
            tag: block.tag.clone(),
            type_name,
            member,
            multiple: block.multiple,
        }
    }

    fn build_member(&mut self, member: &MemberNode, tag: Option<&str>) -> Member {
        Member {
            type_name: self.build_type_name(&member.type_name, tag),
            array_specifier: member.array_specifier.clone(),
        }
    }

    fn build_type_name(&mut self, node: &TypeNameNode, tag: Option<&str>) -> TypeName {
        let (name, type_) = match node {
            TypeNameNode::Predefined(kind) => {
                (None, AmlType::Predefined(PredefinedType { kind: *kind }))
            }
            TypeNameNode::Enum { name, body } => {
                let type_ = match body {
                    Some(enumerators) => {
                        let entries: Vec<(String, Option<i64>)> = enumerators
                            .iter()
                            .map(|e| (e.tag.clone(), e.constant))
                            .collect();
                        AmlType::Enumeration(Enumeration::new(name.clone(), &entries))
                    }
                    None => make_referrer(Category::Enumeration, name.as_deref()),
                };
                (name.clone(), type_)
            }
            TypeNameNode::Struct { name, body } => {
                let type_ = match body {
                    Some(members) => AmlType::Struct(StructType {
                        name: name.clone(),
                        members: members
                            .iter()
                            .map(|member| self.build_member(member, None))
                            .collect(),
                    }),
                    None => make_referrer(Category::StructType, name.as_deref()),
                };
                (name.clone(), type_)
            }
            TypeNameNode::TaggedStruct { name, body } => {
                let type_ = match body {
                    Some(members) => {
                        let members = members
                            .iter()
                            .map(|member| TaggedStructMember {
                                item: self.build_tagged_item(&member.item),
                                multiple: member.multiple,
                            })
                            .collect();
                        AmlType::TaggedStruct(TaggedStructType::new(name.clone(), members))
                    }
                    None => make_referrer(Category::TaggedStructType, name.as_deref()),
                };
                (name.clone(), type_)
            }
            TypeNameNode::TaggedUnion { name, body } => {
                let type_ = match body {
                    Some(members) => {
                        let members = members
                            .iter()
                            .map(|item| TaggedUnionMember {
                                item: self.build_tagged_item(item),
                            })
                            .collect();
                        AmlType::TaggedUnion(TaggedUnion::new(name.clone(), members))
                    }
                    None => make_referrer(Category::TaggedUnion, name.as_deref()),
                };
                (name.clone(), type_)
            }
        };

        self.registry.register(&type_);
        TypeName {
            tag: tag.map(str::to_string),
            name,
            type_,
        }
    }

    fn build_tagged_item(&mut self, item: &TaggedItemNode) -> TaggedItem {
        match item {
            TaggedItemNode::Definition(definition) => {
                TaggedItem::Definition(TaggedStructDefinition {
                    tag: definition.tag.clone(),
                    member: definition
                        .member
                        .as_ref()
                        .map(|member| self.build_member(member, Some(&definition.tag))),
                    multiple: definition.multiple,
                })
            }
            TaggedItemNode::Block(block) => TaggedItem::Block(self.build_block(block)),
        }
    }
}

// make_referrer()
// the parser only produces a bodiless type if it has a name
fn make_referrer(category: Category, name: Option<&str>) -> AmlType {
    AmlType::Referrer(Referrer {
        category,
        identifier: name.unwrap_or_default().to_string(),
    })
}

impl AmlSchema {
    /// parse A2ML text and build the schema in one step
    ///
    /// # Errors
    ///
    /// An [`A2mlSyntaxError`] if the text can't be parsed
    pub fn from_a2ml(text: &str) -> Result<Self, A2mlSyntaxError> {
        let file = parse_a2ml(text)?;
        Ok(AmlModelBuilder::build(&file))
    }

    /// look through a referrer to the type it names
    #[must_use]
    pub fn resolve<'a>(&'a self, aml_type: &'a AmlType) -> Option<&'a AmlType> {
        self.registry.resolve(aml_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amltypes::PredefinedKind;

    #[test]
    fn build_registers_named_types() {
        let schema = AmlSchema::from_a2ml(
            r#"
            taggedstruct Common {
                "VERSION" uint;
                ("ITEM" ulong)*;
            };
            struct S {
                taggedstruct Common;
                enum Mode { "A", "B" = 5, "C" };
            };
            block "IF_DATA" struct S;
            "#,
        )
        .unwrap();

        assert_eq!(schema.registry.len(), 3);
        let common = schema
            .registry
            .get(Category::TaggedStructType, "Common")
            .unwrap();
        let AmlType::TaggedStruct(common_ts) = common else {
            panic!("expected a taggedstruct");
        };
        assert_eq!(common_ts.members.tags().collect::<Vec<_>>(), vec!["VERSION", "ITEM"]);
        assert!(common_ts.members.get("ITEM").unwrap().multiple);

        let Some(AmlType::Enumeration(mode)) = schema.registry.get(Category::Enumeration, "Mode")
        else {
            panic!("expected an enum");
        };
        assert_eq!(mode.value("A"), Some(0));
        assert_eq!(mode.value("C"), Some(6));

        // the bodiless use of Common inside S is a referrer that resolves to the declaration
        let Some(AmlType::Struct(s)) = schema.registry.get(Category::StructType, "S") else {
            panic!("expected a struct");
        };
        let first = &s.members[0].type_name.type_;
        assert_eq!(
            first,
            &AmlType::Referrer(Referrer {
                category: Category::TaggedStructType,
                identifier: "Common".to_string()
            })
        );
        assert_eq!(schema.resolve(first), Some(common));

        let root = schema.if_data_root.as_ref().unwrap();
        assert_eq!(root.tag, "IF_DATA");
        assert_eq!(root.type_name.tag.as_deref(), Some("IF_DATA"));
        assert_eq!(root.type_name.name.as_deref(), Some("S"));
        assert!(matches!(root.type_name.type_, AmlType::Referrer(_)));
        assert!(root.member.is_none());
        assert_eq!(schema.declarations.len(), 3);
        assert!(schema.declarations[2].block_definition().is_some());
        assert!(schema.declarations[0].type_definition().is_some());
    }

    #[test]
    fn build_last_declaration_wins() {
        let schema = AmlSchema::from_a2ml(
            r#"
            struct S { uint; };
            struct S { double; double; };
            block "IF_DATA" uint;
            block "IF_DATA" (struct S)*;
            "#,
        )
        .unwrap();
        let Some(AmlType::Struct(s)) = schema.registry.get(Category::StructType, "S") else {
            panic!("expected a struct");
        };
        assert_eq!(s.members.len(), 2);

        let root = schema.if_data_root.unwrap();
        assert!(root.multiple);
        let member = root.member.unwrap();
        assert_eq!(member.type_name.name.as_deref(), Some("S"));
    }

    #[test]
    fn build_tagged_items() {
        let schema = AmlSchema::from_a2ml(
            r#"
            block "IF_DATA" taggedunion {
                "FLAG";
                "VALUE" uint[2];
                block "BLK" taggedstruct { "X" float; };
            };
            "#,
        )
        .unwrap();
        let root = schema.if_data_root.unwrap();
        let AmlType::TaggedUnion(tu) = &root.type_name.type_ else {
            panic!("expected a taggedunion");
        };
        assert!(tu.name.is_none());
        // anonymous types are not registered
        assert!(schema.registry.is_empty());

        let flag = tu.members.get("FLAG").unwrap();
        assert!(flag.item.taggedstruct_definition().unwrap().member.is_none());

        let value = tu.members.get("VALUE").unwrap();
        let value_member = value.item.taggedstruct_definition().unwrap().member.as_ref().unwrap();
        assert_eq!(value_member.array_specifier, vec![2]);
        assert_eq!(value_member.type_name.tag.as_deref(), Some("VALUE"));
        assert_eq!(
            value_member.type_name.type_,
            AmlType::Predefined(PredefinedType {
                kind: PredefinedKind::UInt
            })
        );

        let blk = tu.members.get("BLK").unwrap().item.block_definition().unwrap();
        assert!(matches!(blk.type_name.type_, AmlType::TaggedStruct(_)));
    }
}
