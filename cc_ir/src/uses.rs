//! The use-list machinery behind `replace_all_uses_with` (data model 3.1,
//! invariant in 4.1: "every operand edge is mirrored by a use-list entry").
//!
//! Each `Use` is a node in an intrusive doubly-linked list, one list per
//! value, exactly like LLVM's `Use`/`Value::use_begin`. The difference from
//! the pointer-based original is that the list lives in one flat arena and
//! links are `UseId`s rather than pointers; the head pointer for a given
//! value's list is stored on that value's own data (`ConstData`,
//! `Instruction`, ...), not here, so every mutation threads the head through
//! as `&mut Option<UseId>`. Removing a use never compacts the arena --
//! stale slots are simply never reachable from any live head, the same
//! trade-off `Arena` makes everywhere else in this crate.

use crate::entities::{UseId, UserRef, ValueRef};

pub struct Use {
    pub value: ValueRef,
    pub user: UserRef,
    pub operand_idx: u32,
    prev: Option<UseId>,
    next: Option<UseId>,
}

#[derive(Default)]
pub struct UsePool {
    data: Vec<Use>,
}

impl UsePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links a new use at the head of the list rooted at `*head`.
    pub fn insert(
        &mut self,
        head: &mut Option<UseId>,
        value: ValueRef,
        user: UserRef,
        operand_idx: u32,
    ) -> UseId {
        let id = UseId::new(self.data.len());
        let old_head = *head;
        if let Some(next_id) = old_head {
            self.data[next_id.index()].prev = Some(id);
        }
        self.data.push(Use {
            value,
            user,
            operand_idx,
            prev: None,
            next: old_head,
        });
        *head = Some(id);
        id
    }

    /// Unlinks `id` from the list rooted at `*head`. `id` itself is left in
    /// the arena (dead) and must not be reused.
    pub fn remove(&mut self, head: &mut Option<UseId>, id: UseId) {
        let (prev, next) = {
            let u = &self.data[id.index()];
            (u.prev, u.next)
        };
        match prev {
            Some(p) => self.data[p.index()].next = next,
            None => *head = next,
        }
        if let Some(n) = next {
            self.data[n.index()].prev = prev;
        }
    }

    pub fn get(&self, id: UseId) -> &Use {
        &self.data[id.index()]
    }

    pub fn get_mut(&mut self, id: UseId) -> &mut Use {
        &mut self.data[id.index()]
    }

    pub fn set_value(&mut self, id: UseId, value: ValueRef) {
        self.data[id.index()].value = value;
    }

    /// Moves every use currently on `old_head`'s list onto `new_head`'s
    /// list, rewriting each use's `value` to `new_value` along the way.
    /// This is the core of `replace_all_uses_with`: operand lists on the
    /// user side never change, only which value a `Use` points at.
    pub fn transplant(&mut self, old_head: &mut Option<UseId>, new_head: &mut Option<UseId>, new_value: ValueRef) {
        let mut ids = Vec::new();
        let mut cur = *old_head;
        while let Some(id) = cur {
            cur = self.data[id.index()].next;
            ids.push(id);
        }
        for &id in &ids {
            self.data[id.index()].value = new_value;
        }
        if let Some(&first) = ids.first() {
            let last = *ids.last().unwrap();
            self.data[last.index()].next = *new_head;
            if let Some(nh) = *new_head {
                self.data[nh.index()].prev = Some(last);
            }
            self.data[first.index()].prev = None;
            *new_head = Some(first);
        }
        *old_head = None;
    }

    pub fn iter_list(&self, head: Option<UseId>) -> UseIter<'_> {
        UseIter { pool: self, cur: head }
    }

    pub fn count(&self, head: Option<UseId>) -> usize {
        self.iter_list(head).count()
    }
}

pub struct UseIter<'a> {
    pool: &'a UsePool,
    cur: Option<UseId>,
}

impl<'a> Iterator for UseIter<'a> {
    type Item = UseId;

    fn next(&mut self) -> Option<UseId> {
        let cur = self.cur?;
        self.cur = self.pool.get(cur).next;
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ArgRef, InstRef};

    #[test]
    fn insert_and_remove_maintain_list_order() {
        let mut pool = UsePool::new();
        let mut head = None;
        let v = ValueRef::Arg(ArgRef::new(0));
        let u0 = pool.insert(&mut head, v, UserRef::Inst(InstRef::new(0)), 0);
        let u1 = pool.insert(&mut head, v, UserRef::Inst(InstRef::new(1)), 0);
        assert_eq!(pool.count(head), 2);

        pool.remove(&mut head, u0);
        assert_eq!(pool.count(head), 1);
        assert_eq!(pool.iter_list(head).next(), Some(u1));

        pool.remove(&mut head, u1);
        assert_eq!(head, None);
    }

    use proptest::{prop_assert_eq, proptest};

    proptest! {
        /// Every insert grows the list by one live entry and every remove
        /// shrinks it by one; `iter_list`/`count` never drift from that
        /// running total no matter what order inserts and removes arrive in.
        #[test]
        fn list_length_tracks_live_inserts_minus_removes(ops in proptest::collection::vec(0..2usize, 0..64)) {
            let mut pool = UsePool::new();
            let mut head = None;
            let v = ValueRef::Arg(ArgRef::new(0));
            let mut live: Vec<UseId> = Vec::new();
            let mut next_operand_idx = 0u32;

            for op in ops {
                if op == 0 || live.is_empty() {
                    let id = pool.insert(&mut head, v, UserRef::Inst(InstRef::new(0)), next_operand_idx);
                    next_operand_idx += 1;
                    live.push(id);
                } else {
                    let id = live.swap_remove(0);
                    pool.remove(&mut head, id);
                }
                prop_assert_eq!(pool.count(head), live.len());
                let listed: std::collections::HashSet<_> = pool.iter_list(head).collect();
                let expected: std::collections::HashSet<_> = live.iter().copied().collect();
                prop_assert_eq!(listed, expected);
            }
        }
    }
}
