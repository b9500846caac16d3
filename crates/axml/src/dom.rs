use std::collections::HashMap;

use smallvec::SmallVec;

use crate::structs::TypedValue;

/// Sentinel element name for character-data children
pub const TEXT_NAME: &str = "#text";

/// A parsed XML document: the element tree plus the namespace mappings seen
/// while reading it
#[derive(Debug, Default)]
pub struct Document {
    /// Missing when the file carried no elements
    pub root: Option<Element>,

    /// Namespace prefix to URI; end-namespace chunks do not remove entries
    pub namespaces: HashMap<String, String>,
}

/// One decoded attribute with its typed value
#[derive(Debug)]
pub struct Attribute {
    pub name: String,
    pub namespace: Option<String>,

    /// Decoded typed value
    pub value: TypedValue,

    /// Original unparsed string when the file carried one
    pub raw: Option<String>,

    /// Entry of the document id-table at this attribute's name index
    pub resource_id: Option<u32>,
}

impl Attribute {
    /// String content of the attribute: the string value itself, or the raw
    /// form for non-string typed values
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            TypedValue::String(s) => Some(s),
            _ => self.raw.as_deref(),
        }
    }
}

/// One element of the tree. Text nodes appear as children named [`TEXT_NAME`]
/// carrying their payload in `text`.
#[derive(Debug)]
pub struct Element {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: SmallVec<[Attribute; 8]>,
    pub children: Vec<Element>,

    /// Set only on `#text` children
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Element {
        Element {
            name: name.into(),
            namespace,
            attributes: SmallVec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Synthetic character-data child
    pub fn new_text(data: impl Into<String>) -> Element {
        Element {
            name: TEXT_NAME.to_owned(),
            namespace: None,
            attributes: SmallVec::new(),
            children: Vec::new(),
            text: Some(data.into()),
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.name == TEXT_NAME
    }

    /// First attribute with the given local name, any namespace
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// String content of the named attribute
    #[inline]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(Attribute::as_str)
    }

    /// Child elements with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first traversal over the whole subtree, this element included
    pub fn descendants(&self) -> impl Iterator<Item = &Element> {
        let mut stack = vec![self];

        std::iter::from_fn(move || {
            let element = stack.pop()?;
            for child in element.children.iter().rev() {
                stack.push(child);
            }
            Some(element)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        let mut root = Element::new("manifest", None);
        let mut app = Element::new("application", None);
        app.children.push(Element::new("activity", None));
        app.children.push(Element::new_text("hello"));
        root.children.push(app);
        root
    }

    #[test]
    fn children_named_filters() {
        let root = sample();
        assert_eq!(root.children_named("application").count(), 1);
        assert_eq!(root.children_named("activity").count(), 0);
    }

    #[test]
    fn descendants_walk_in_document_order() {
        let root = sample();
        let names: Vec<&str> = root.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["manifest", "application", "activity", "#text"]);
    }

    #[test]
    fn text_sentinel() {
        let root = sample();
        let text = root.children[0].children_named(TEXT_NAME).next().unwrap();
        assert!(text.is_text());
        assert_eq!(text.text.as_deref(), Some("hello"));
    }
}
