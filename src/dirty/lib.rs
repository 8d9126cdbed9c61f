//! `DirtyTracker`: the pair (S, V) of spec §3/§4.2 — a `HashSet` for
//! O(1) membership and a `Vec` for insertion-ordered, deterministic replay.
//! No direct analogue in `garage`; grounded on the original
//! `ReplicationModule`'s `dirtySet`/`dirtyVec` pair
//! (`original_source/src/server/ReplicationModule.hh`/`.cc`).

use std::collections::HashSet;

use repl_util::Address;

#[derive(Default)]
pub struct DirtyTracker {
	set: HashSet<Address>,
	order: Vec<Address>,
}

impl DirtyTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Mark `addr` dirty if it isn't already. O(1) amortized.
	pub fn mark(&mut self, addr: Address) {
		if self.set.insert(addr) {
			self.order.push(addr);
		}
	}

	/// Current length of the insertion-ordered sequence.
	pub fn snapshot_len(&self) -> usize {
		self.order.len()
	}

	/// The i-th address inserted. Defined for `0 <= i < snapshot_len()`.
	pub fn addr_at(&self, i: usize) -> Address {
		self.order[i]
	}

	/// Empty both the set and the order vector.
	pub fn clear(&mut self) {
		self.set.clear();
		self.order.clear();
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn contains(&self, addr: Address) -> bool {
		self.set.contains(&addr)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn mark_dedups_and_preserves_insertion_order() {
		let mut t = DirtyTracker::new();
		t.mark(100);
		t.mark(200);
		t.mark(100); // duplicate, should not append again
		t.mark(50);

		assert_eq!(t.snapshot_len(), 3);
		assert_eq!(t.addr_at(0), 100);
		assert_eq!(t.addr_at(1), 200);
		assert_eq!(t.addr_at(2), 50);
	}

	#[test]
	fn set_and_vec_stay_in_sync() {
		let mut t = DirtyTracker::new();
		for addr in [10, 20, 10, 30, 20, 40] {
			t.mark(addr);
		}
		// Invariant 3: |V| == |S| and V is a permutation of S.
		let mut from_vec: Vec<_> = (0..t.snapshot_len()).map(|i| t.addr_at(i)).collect();
		from_vec.sort_unstable();
		let mut from_set: Vec<_> = [10, 20, 30, 40].to_vec();
		from_set.sort_unstable();
		assert_eq!(from_vec, from_set);
	}

	#[test]
	fn clear_empties_both_structures() {
		let mut t = DirtyTracker::new();
		t.mark(1);
		t.mark(2);
		t.clear();
		assert_eq!(t.snapshot_len(), 0);
		assert!(t.is_empty());
		assert!(!t.contains(1));
	}
}
