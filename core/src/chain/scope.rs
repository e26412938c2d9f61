//! LIFO of loop openers, so an `END_*` command can find its way back.

use super::node::NodeId;

#[derive(Debug, Default)]
pub struct ScopeStack {
    entries: Vec<NodeId>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: NodeId) {
        self.entries.push(node);
    }

    pub fn pop(&mut self) -> Option<NodeId> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_reverse_push_order() {
        let mut stack = ScopeStack::new();
        stack.push(3);
        stack.push(7);
        stack.push(7);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop(), Some(7));
        assert_eq!(stack.pop(), Some(7));
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }
}
