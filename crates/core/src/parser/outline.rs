use super::utils::{last_path_segment, node_line};
use tree_sitter::{Node, Tree};

/// A `impl Trait for Type` block found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitImpl {
    /// Last segment of the trait path, generics removed
    pub trait_name: String,
    pub self_type: String,
    /// Names of the functions defined in the impl body, in source order
    pub methods: Vec<String>,
    pub line: u32,
}

impl TraitImpl {
    pub fn defines(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// Item-level summary of a source file.
///
/// Only items reachable through the file and inline `mod` blocks are
/// collected; anything inside comments, strings or function bodies is not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOutline {
    pub structs: Vec<String>,
    pub trait_impls: Vec<TraitImpl>,
    pub has_errors: bool,
}

impl SourceOutline {
    pub fn from_tree(tree: &Tree, source: &str) -> Self {
        let mut outline = SourceOutline {
            has_errors: tree.root_node().has_error(),
            ..Default::default()
        };
        outline.visit_items(&tree.root_node(), source);
        outline
    }

    pub fn find_impl(&self, trait_name: &str) -> Option<&TraitImpl> {
        self.trait_impls
            .iter()
            .find(|imp| imp.trait_name == trait_name)
    }

    pub fn has_struct(&self) -> bool {
        !self.structs.is_empty()
    }

    fn visit_items(&mut self, node: &Node, source: &str) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "struct_item" => {
                    if let Some(name) = field_text(&child, "name", source) {
                        self.structs.push(name.to_string());
                    }
                }
                "impl_item" => {
                    if let Some(imp) = trait_impl(&child, source) {
                        self.trait_impls.push(imp);
                    }
                }
                "mod_item" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        self.visit_items(&body, source);
                    }
                }
                _ => {}
            }
        }
    }
}

fn trait_impl(node: &Node, source: &str) -> Option<TraitImpl> {
    // Inherent impls have no trait field
    let trait_path = field_text(node, "trait", source)?;
    let self_type = field_text(node, "type", source).unwrap_or_default();

    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for item in body.named_children(&mut cursor) {
            if item.kind() == "function_item" {
                if let Some(name) = field_text(&item, "name", source) {
                    methods.push(name.to_string());
                }
            }
        }
    }

    Some(TraitImpl {
        trait_name: last_path_segment(trait_path).to_string(),
        self_type: self_type.to_string(),
        methods,
        line: node_line(node),
    })
}

fn field_text<'a>(node: &Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field)?
        .utf8_text(source.as_bytes())
        .ok()
}

#[cfg(test)]
mod tests {
    use crate::parser::RustParser;

    #[test]
    fn test_inherent_impl_is_ignored() {
        let mut parser = RustParser::new().unwrap();
        let outline = parser
            .outline("struct A; impl A { fn new() -> Self { A } }")
            .unwrap();
        assert!(outline.trait_impls.is_empty());
        assert_eq!(outline.structs, vec!["A".to_string()]);
    }

    #[test]
    fn test_items_in_comments_and_strings_are_ignored() {
        let mut parser = RustParser::new().unwrap();
        let source = r#"
// impl GameModule for Fake {}
/* struct Hidden; */
const DOC: &str = "impl GameModule for AlsoFake {}";
"#;
        let outline = parser.outline(source).unwrap();
        assert!(outline.find_impl("GameModule").is_none());
        assert!(!outline.has_struct());
    }

    #[test]
    fn test_items_inside_inline_modules() {
        let mut parser = RustParser::new().unwrap();
        let source = r#"
mod game {
    pub struct Board;
    impl gdk_api::GameModule for Board {
        fn game_id(&self) -> String { String::new() }
    }
}
"#;
        let outline = parser.outline(source).unwrap();
        let imp = outline.find_impl("GameModule").unwrap();
        assert_eq!(imp.self_type, "Board");
        assert!(imp.defines("game_id"));
        assert_eq!(imp.line, 4);
        assert!(outline.has_struct());
    }

    #[test]
    fn test_generic_trait_path() {
        let mut parser = RustParser::new().unwrap();
        let outline = parser
            .outline("impl<'a> api::GameMetadata<'a> for Info<'a> { fn game_name(&self) {} }")
            .unwrap();
        let imp = outline.find_impl("GameMetadata").unwrap();
        assert_eq!(imp.self_type, "Info<'a>");
        assert_eq!(imp.methods, vec!["game_name".to_string()]);
    }
}
