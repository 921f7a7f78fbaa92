//! Child order of container elements
//!
//! Containers keep their modelled children in typed vectors (`data`,
//! `nodes`, `edges`, ...). A layout records how those children and any
//! markup the model does not interpret were interleaved in the source, so
//! rendering can put everything back where it was.
//!
//! An empty layout means the canonical order: data, keys, nodes, edges,
//! then a nested graph. Children without a slot (for example entries added
//! by annotation) are rendered after the layout is exhausted, but before a
//! nested graph.

/// One child position in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Data,
    Key,
    Node,
    Edge,
    Graph,
    /// Markup kept verbatim (compact XML, whitespace-only text dropped)
    Raw(String),
}

impl Slot {
    fn rank(&self) -> Option<u8> {
        match self {
            Slot::Data => Some(0),
            Slot::Key => Some(1),
            Slot::Node => Some(2),
            Slot::Edge => Some(3),
            Slot::Graph => Some(4),
            Slot::Raw(_) => None,
        }
    }
}

/// True when rendering without a layout produces the same order
pub(crate) fn is_canonical(slots: &[Slot]) -> bool {
    slots.iter().all(|s| s.rank().is_some())
        && slots.windows(2).all(|w| w[0].rank() <= w[1].rank())
}

/// Drop the slots of `kind` whose flag in `keep` is false.
///
/// `keep[i]` belongs to the i-th slot of that kind; slots beyond `keep` stay.
pub(crate) fn retain_kind(slots: &mut Vec<Slot>, kind: &Slot, keep: &[bool]) {
    let mut idx = 0;
    slots.retain(|slot| {
        if slot != kind {
            return true;
        }
        let kept = keep.get(idx).copied().unwrap_or(true);
        idx += 1;
        kept
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        assert!(is_canonical(&[]));
        assert!(is_canonical(&[Slot::Data, Slot::Node, Slot::Node, Slot::Edge]));
        assert!(is_canonical(&[Slot::Key, Slot::Graph]));
        assert!(!is_canonical(&[Slot::Node, Slot::Edge, Slot::Node]));
        assert!(!is_canonical(&[Slot::Raw("<desc/>".to_string())]));
        assert!(!is_canonical(&[Slot::Graph, Slot::Data]));
    }

    #[test]
    fn test_retain_kind() {
        let mut slots = vec![
            Slot::Node,
            Slot::Edge,
            Slot::Node,
            Slot::Raw("<!--x-->".to_string()),
            Slot::Node,
        ];
        retain_kind(&mut slots, &Slot::Node, &[true, false]);
        assert_eq!(
            slots,
            vec![
                Slot::Node,
                Slot::Edge,
                Slot::Raw("<!--x-->".to_string()),
                Slot::Node
            ]
        );
    }
}
