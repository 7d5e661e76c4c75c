use tree_sitter::Node;

/// 1-based line on which the node starts
pub fn node_line(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Last segment of a (possibly generic) type path:
/// `gdk_api::GameModule<T>` becomes `GameModule`.
pub fn last_path_segment(path: &str) -> &str {
    let without_generics = path.split('<').next().unwrap_or(path).trim();
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_path_segment() {
        assert_eq!(last_path_segment("GameModule"), "GameModule");
        assert_eq!(last_path_segment("gdk_api::GameModule"), "GameModule");
        assert_eq!(last_path_segment("crate::api::Meta<'a, T>"), "Meta");
        assert_eq!(last_path_segment("::gdk_api::GameMetadata"), "GameMetadata");
    }
}
