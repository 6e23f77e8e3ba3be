use crate::xml::{Element, Node};

/// Removes every `script` element and every comment node below `fragment`,
/// recursively and in place. Element names are matched case-insensitively.
///
/// Running it a second time is a no-op.
pub fn sanitize(fragment: &mut Element) {
    let mut removed = 0usize;
    fragment.remove_nodes_where(&mut |node: &Node| {
        let strip = match node {
            Node::Comment(_) => true,
            Node::Element(el) => el.name.eq_ignore_ascii_case("script"),
            _ => false,
        };
        removed += usize::from(strip);
        strip
    });
    if removed > 0 {
        tracing::trace!(removed = removed, "Sanitized HTML fragment");
    }
}
