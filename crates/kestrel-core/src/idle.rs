//! Idle timers and the dynamic-link graph between textures.
//!
//! Links are undirected: linking `a` to `b` also links `b` to `a`. Touching
//! a texture resets the timer of every texture reachable from it. Traversal
//! keeps a visited set, so cycles are harmless.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::texture::TextureId;

#[derive(Debug, Default)]
pub struct IdleTracker {
    unused: HashMap<TextureId, f32>,
    links: HashMap<TextureId, HashSet<TextureId>>,
}

impl IdleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symmetric link. Self-links are ignored.
    pub fn add_link(&mut self, a: TextureId, b: TextureId) -> bool {
        if a == b {
            return false;
        }
        let added = self.links.entry(a).or_default().insert(b);
        self.links.entry(b).or_default().insert(a);
        added
    }

    pub fn remove_link(&mut self, a: TextureId, b: TextureId) -> bool {
        let removed = self.unlink_one(a, b);
        self.unlink_one(b, a);
        removed
    }

    fn unlink_one(&mut self, from: TextureId, to: TextureId) -> bool {
        let Some(peers) = self.links.get_mut(&from) else {
            return false;
        };
        let removed = peers.remove(&to);
        if peers.is_empty() {
            self.links.remove(&from);
        }
        removed
    }

    pub fn links_of(&self, id: TextureId) -> Vec<TextureId> {
        self.links
            .get(&id)
            .map(|peers| peers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forget a texture: its timer and every link touching it.
    pub fn remove(&mut self, id: TextureId) {
        self.unused.remove(&id);
        if let Some(peers) = self.links.remove(&id) {
            for peer in peers {
                self.unlink_one(peer, id);
            }
        }
    }

    /// `id` and everything transitively linked to it.
    pub fn component(&self, id: TextureId) -> Vec<TextureId> {
        let mut visited = HashSet::from([id]);
        let mut order = vec![id];
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(peers) = self.links.get(&current) else {
                continue;
            };
            for &peer in peers {
                if visited.insert(peer) {
                    order.push(peer);
                    queue.push_back(peer);
                }
            }
        }
        order
    }

    /// Reset the unused timer of `id` and its whole link component.
    pub fn touch(&mut self, id: TextureId) {
        for member in self.component(id) {
            self.unused.insert(member, 0.0);
        }
    }

    /// Add `dt` seconds to the timer of `id` and return the new value.
    pub fn advance(&mut self, id: TextureId, dt: f32) -> f32 {
        let timer = self.unused.entry(id).or_insert(0.0);
        *timer += dt;
        *timer
    }

    pub fn unused_time(&self, id: TextureId) -> f32 {
        self.unused.get(&id).copied().unwrap_or(0.0)
    }

    pub fn clear_timer(&mut self, id: TextureId) {
        self.unused.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: TextureId = TextureId(1);
    const B: TextureId = TextureId(2);
    const C: TextureId = TextureId(3);
    const D: TextureId = TextureId(4);

    #[test]
    fn links_are_symmetric() {
        let mut idle = IdleTracker::new();
        assert!(idle.add_link(A, B));
        assert!(!idle.add_link(B, A));
        assert_eq!(idle.links_of(A), vec![B]);
        assert_eq!(idle.links_of(B), vec![A]);
        assert!(idle.remove_link(B, A));
        assert!(idle.links_of(A).is_empty());
        assert!(idle.links_of(B).is_empty());
    }

    #[test]
    fn self_link_ignored() {
        let mut idle = IdleTracker::new();
        assert!(!idle.add_link(A, A));
        assert!(idle.links_of(A).is_empty());
    }

    #[test]
    fn component_survives_cycles() {
        let mut idle = IdleTracker::new();
        idle.add_link(A, B);
        idle.add_link(B, C);
        idle.add_link(C, A);
        let mut comp = idle.component(B);
        comp.sort_by_key(|id| id.0);
        assert_eq!(comp, vec![A, B, C]);
        assert_eq!(idle.component(D), vec![D]);
    }

    #[test]
    fn touch_resets_component() {
        let mut idle = IdleTracker::new();
        idle.add_link(A, B);
        idle.advance(A, 3.0);
        idle.advance(B, 5.0);
        idle.advance(C, 1.0);
        idle.touch(B);
        assert_eq!(idle.unused_time(A), 0.0);
        assert_eq!(idle.unused_time(B), 0.0);
        assert_eq!(idle.unused_time(C), 1.0);
    }

    #[test]
    fn remove_drops_links_both_ways() {
        let mut idle = IdleTracker::new();
        idle.add_link(A, B);
        idle.add_link(A, C);
        idle.remove(A);
        assert!(idle.links_of(B).is_empty());
        assert!(idle.links_of(C).is_empty());
        assert_eq!(idle.component(B), vec![B]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn component_is_symmetric(
                edges in proptest::collection::vec((0u64..8, 0u64..8), 0..24),
                start in 0u64..8,
            ) {
                let mut idle = IdleTracker::new();
                for (a, b) in &edges {
                    idle.add_link(TextureId(*a), TextureId(*b));
                }
                let comp = idle.component(TextureId(start));
                for member in &comp {
                    let back = idle.component(*member);
                    prop_assert!(back.contains(&TextureId(start)));
                    prop_assert_eq!(back.len(), comp.len());
                }
            }
        }
    }
}
