use crate::{
    error::{Error, Result},
    parser::outline::SourceOutline,
};
use tree_sitter::Parser;

pub struct RustParser {
    parser: Parser,
}

impl RustParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| Error::TreeSitterError(format!("Failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &str) -> Result<tree_sitter::Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| Error::ParseError("Failed to parse source code".to_string()))
    }

    /// Collect the structs and trait impls declared in `source`
    pub fn outline(&mut self, source: &str) -> Result<SourceOutline> {
        let tree = self.parse(source)?;
        Ok(SourceOutline::from_tree(&tree, source))
    }
}
