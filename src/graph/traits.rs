//! Generic child lookup over GraphML elements

/// Anything that looks like an XML element: named attributes plus text content
pub trait Element {
    /// Value of a named attribute, if the element carries it
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Text content of the element (empty for childless elements)
    fn text(&self) -> &str;
}

/// Find the first child whose `attr_name` attribute equals `attr_value`
/// (case-insensitive) and return its text content.
///
/// Children lacking the attribute are skipped, the scan never aborts.
/// Search is not recursive.
///
/// For a node holding
/// `<data key="label">JUN</data><data key="type">Protein</data>`,
/// `find_child_text(&node.data, "key", "label")` returns `Some("JUN")`.
pub fn find_child_text<'a, E, I>(children: I, attr_name: &str, attr_value: &str) -> Option<&'a str>
where
    E: Element + 'a,
    I: IntoIterator<Item = &'a E>,
{
    children
        .into_iter()
        .find(|child| {
            child
                .attribute(attr_name)
                .is_some_and(|v| eq_ignore_case(v, attr_value))
        })
        .map(|child| child.text())
}

/// Unicode-aware case-insensitive comparison without allocating
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Child {
        attrs: Vec<(&'static str, &'static str)>,
        text: &'static str,
    }

    impl Element for Child {
        fn attribute(&self, name: &str) -> Option<&str> {
            self.attrs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
        }

        fn text(&self) -> &str {
            self.text
        }
    }

    #[test]
    fn test_skips_children_without_attribute() {
        let children = vec![
            Child {
                attrs: vec![],
                text: "\n    ",
            },
            Child {
                attrs: vec![("other", "label")],
                text: "nope",
            },
            Child {
                attrs: vec![("key", "LABEL")],
                text: "JUN",
            },
            Child {
                attrs: vec![("key", "label")],
                text: "second",
            },
        ];

        assert_eq!(find_child_text(&children, "key", "label"), Some("JUN"));
        assert_eq!(find_child_text(&children, "key", "missing"), None);
    }

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case("Percent_Mutated", "PERCENT_MUTATED"));
        assert!(eq_ignore_case("ÉGFR", "égfr"));
        assert!(!eq_ignore_case("egfr", "egf"));
    }
}
