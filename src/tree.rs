//! Document Tree - Owned XML-like nodes
//!
//! Children are owned by their parent. Upward traversal uses node paths
//! (child indices from the root) instead of parent pointers, so splicing a
//! range of siblings never leaves a dangling reference behind.

/// Child indices from a root node down to a descendant. The empty path is the root.
pub type NodePath = Vec<usize>;

/// Element name of the synthetic container used to expand detached node runs.
pub const FRAGMENT: &str = "#fragment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn element(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element {
            name: name.into(),
            attributes: vec![],
            children,
        }
    }

    pub fn element_with_attributes(
        name: impl Into<String>,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    ) -> Self {
        Node::Element {
            name: name.into(),
            attributes,
            children,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub(crate) fn fragment(children: Vec<Node>) -> Self {
        Node::element(FRAGMENT, children)
    }

    /// Element name, `None` for text nodes
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Element { name, .. } => Some(name),
            Node::Text(_) => None,
        }
    }

    pub fn is_element(&self, expected: &str) -> bool {
        self.name() == Some(expected)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(value) => Some(value),
            Node::Element { .. } => None,
        }
    }

    pub fn attributes(&self) -> &[(String, String)] {
        match self {
            Node::Element { attributes, .. } => attributes,
            Node::Text(_) => &[],
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            Node::Text(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Element { children, .. } => Some(children),
            Node::Text(_) => None,
        }
    }

    pub fn into_children(self) -> Vec<Node> {
        match self {
            Node::Element { children, .. } => children,
            Node::Text(_) => vec![],
        }
    }

    pub fn get(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children().get(index))
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &index in path {
            node = node.children_mut()?.get_mut(index)?;
        }
        Some(node)
    }

    /// Concatenated text of every descendant text node, in document order
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(value) => out.push_str(value),
            Node::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Text nodes in document order, with their paths relative to `self`.
    ///
    /// With `container` set, only text nodes whose direct parent is an element
    /// of that name are returned. Nested fragments hold finished output and
    /// are skipped.
    pub fn texts(&self, container: Option<&str>) -> Vec<(NodePath, &str)> {
        let mut found = vec![];
        let mut path = vec![];
        self.collect_texts(container, None, &mut path, &mut found);
        found
    }

    fn collect_texts<'a>(
        &'a self,
        container: Option<&str>,
        parent: Option<&str>,
        path: &mut NodePath,
        found: &mut Vec<(NodePath, &'a str)>,
    ) {
        match self {
            Node::Text(value) => {
                if container.map_or(true, |c| parent == Some(c)) {
                    found.push((path.clone(), value.as_str()));
                }
            }
            Node::Element { name, children, .. } => {
                for (index, child) in children.iter().enumerate() {
                    if child.is_element(FRAGMENT) {
                        continue;
                    }
                    path.push(index);
                    child.collect_texts(container, Some(name), path, found);
                    path.pop();
                }
            }
        }
    }

    /// Applies `f` to every text node [`Node::texts`] would select, in document
    /// order, stopping at the first error.
    pub fn try_for_each_text_mut<E>(
        &mut self,
        container: Option<&str>,
        f: &mut impl FnMut(&mut String) -> Result<(), E>,
    ) -> Result<(), E> {
        self.visit_texts_mut(container, None, f)
    }

    fn visit_texts_mut<E>(
        &mut self,
        container: Option<&str>,
        parent: Option<&str>,
        f: &mut impl FnMut(&mut String) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Node::Text(value) => {
                if container.map_or(true, |c| parent == Some(c)) {
                    f(value)?;
                }
                Ok(())
            }
            Node::Element { name, children, .. } => {
                for child in children.iter_mut() {
                    if child.is_element(FRAGMENT) {
                        continue;
                    }
                    child.visit_texts_mut(container, Some(name.as_str()), f)?;
                }
                Ok(())
            }
        }
    }

    /// Replaces every nested fragment by its children
    pub(crate) fn flatten_fragments(&mut self) {
        let Some(children) = self.children_mut() else { return };
        if !children.iter().any(|c| c.is_element(FRAGMENT)) {
            children.iter_mut().for_each(Node::flatten_fragments);
            return;
        }
        let mut flattened = Vec::with_capacity(children.len());
        for mut child in children.drain(..) {
            child.flatten_fragments();
            if child.is_element(FRAGMENT) {
                flattened.extend(child.into_children());
            } else {
                flattened.push(child);
            }
        }
        *children = flattened;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::element(
            "body",
            vec![
                Node::element("p", vec![Node::element("t", vec![Node::text("a")])]),
                Node::element(
                    "p",
                    vec![
                        Node::text("loose"),
                        Node::element("t", vec![Node::text("b")]),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_get_by_path() {
        let tree = sample();
        assert_eq!(tree.get(&[]).and_then(Node::name), Some("body"));
        assert_eq!(tree.get(&[1, 1, 0]).and_then(Node::as_text), Some("b"));
        assert!(tree.get(&[2]).is_none());
        assert!(tree.get(&[0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_texts_respect_container() {
        let tree = sample();
        let all: Vec<_> = tree.texts(None).into_iter().map(|(_, t)| t).collect();
        assert_eq!(all, vec!["a", "loose", "b"]);

        let contained = tree.texts(Some("t"));
        assert_eq!(contained.len(), 2);
        assert_eq!(contained[1], (vec![1, 1, 0], "b"));
    }

    #[test]
    fn test_text_content_in_document_order() {
        assert_eq!(sample().text_content(), "alooseb");
    }

    #[test]
    fn test_fragments_are_skipped_then_flattened() {
        let mut tree = Node::element(
            "body",
            vec![
                Node::element("p", vec![Node::text("{a}")]),
                Node::fragment(vec![
                    Node::element("p", vec![Node::text("{done}")]),
                    Node::fragment(vec![Node::element("p", vec![Node::text("{inner}")])]),
                ]),
            ],
        );
        let seen: Vec<_> = tree.texts(None).into_iter().map(|(_, t)| t).collect();
        assert_eq!(seen, vec!["{a}"]);

        tree.flatten_fragments();
        assert_eq!(
            tree,
            Node::element(
                "body",
                vec![
                    Node::element("p", vec![Node::text("{a}")]),
                    Node::element("p", vec![Node::text("{done}")]),
                    Node::element("p", vec![Node::text("{inner}")]),
                ],
            )
        );
    }

    #[test]
    fn test_mutating_texts() {
        let mut tree = sample();
        let result: Result<(), ()> = tree.try_for_each_text_mut(Some("t"), &mut |value| {
            value.make_ascii_uppercase();
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(tree.text_content(), "AlooseB");
    }
}
