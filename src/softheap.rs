use std::ptr::NonNull;

use crate::error::SoftHeapError;

/// The relative tolerance within which two heaps' epsilons are considered
/// compatible for melding (see [`SoftHeap::meld`]).
const EPSILON_TOLERANCE: f64 = 0.001;

/// Returned by [`SoftHeap::meld`] when the two input heaps' epsilons
/// disagree by more than [`EPSILON_TOLERANCE`]. The mismatch check runs
/// before either heap's rootlist is touched, so both heaps are handed back
/// here rather than dropped, letting the caller retry or inspect them.
///
/// `Debug` and `Display` are implemented by hand rather than derived, since
/// a derived `Debug` would require `T: Debug` just to report two `f64`s.
pub struct MeldError<T> {
    heap_a: SoftHeap<T>,
    heap_b: SoftHeap<T>,
    epsilon_a: f64,
    epsilon_b: f64,
}

impl<T> MeldError<T> {
    /// Consumes this error, returning the two heaps originally passed to
    /// `meld`, in the same (self, other) order.
    pub fn into_heaps(self) -> (SoftHeap<T>, SoftHeap<T>) {
        (self.heap_a, self.heap_b)
    }

    /// The two epsilon values found incompatible.
    pub fn epsilons(&self) -> (f64, f64) {
        (self.epsilon_a, self.epsilon_b)
    }
}

impl<T> std::fmt::Debug for MeldError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeldError")
            .field("epsilon_a", &self.epsilon_a)
            .field("epsilon_b", &self.epsilon_b)
            .finish()
    }
}

impl<T> std::fmt::Display for MeldError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot meld soft heaps with mismatched epsilon: {} vs {}",
            self.epsilon_a, self.epsilon_b
        )
    }
}

impl<T> std::error::Error for MeldError<T> {}

/// An approximate min-priority queue.
///
/// A soft heap trades exact ordering for speed: given an error parameter
/// `epsilon` in `(0, 1)`, any sequence of operations containing `n` inserts
/// will let at most `floor(epsilon * n)` items travel through the heap with
/// an inflated ("corrupted") working priority, in exchange for amortized
/// `O(1)` [`insert`](SoftHeap::insert), [`meld`](SoftHeap::meld), and
/// amortized `O(1)` [`extract_min`](SoftHeap::extract_min). The construction
/// follows the Kaplan-Zwick binary-tree variant of the soft heap rather than
/// Chazelle's original binomial-tree formulation.
#[derive(Debug)]
pub struct SoftHeap<T> {
    first: Option<NonNull<Tree<T>>>,
    rank: i32,
    epsilon: f64,
    r: i32,
}

/// A binary tree in a soft heap's rootlist.
///
/// Wired to its predecessor and successor in the rootlist (which have rank
/// less than and greater than this tree's rank, respectively), and carries
/// `sufmin`, a non-owning reference to the tree of minimum root ckey among
/// itself and every tree after it in the rootlist.
#[derive(Debug)]
struct Tree<T> {
    root: NonNull<Node<T>>,
    rank: i32,
    prev: Option<NonNull<Tree<T>>>,
    next: Option<NonNull<Tree<T>>>,
    sufmin: NonNull<Tree<T>>,
}

/// A node in a soft heap tree.
///
/// Holds a `ckey` (an upper bound on the true priority of every item in its
/// list), its rank, a target occupancy `size`, the current list length
/// `nelems`, and up to two children. A node is a leaf iff both children are
/// absent.
#[derive(Debug)]
struct Node<T> {
    ckey: T,
    rank: i32,
    size: usize,
    nelems: usize,
    first: Option<NonNull<ListCell<T>>>,
    last: Option<NonNull<ListCell<T>>>,
    left: Option<NonNull<Node<T>>>,
    right: Option<NonNull<Node<T>>>,
}

/// A single item living in a [`Node`]'s doubly linked list.
#[derive(Debug)]
struct ListCell<T> {
    elem: T,
    prev: Option<NonNull<ListCell<T>>>,
    next: Option<NonNull<ListCell<T>>>,
}

/// Returns `r(epsilon) = ceil(log2(1/epsilon)) + 5`, the largest node rank
/// guaranteed to hold only uncorrupted elements.
#[inline]
fn r_of_epsilon(epsilon: f64) -> i32 {
    (1.0 / epsilon).log2().ceil() as i32 + 5
}

/// Returns the target occupancy of a node of the given `rank`, given the
/// occupancy of its (same-rank-minus-one) child and the heap's `r`.
#[inline]
fn next_size(rank: i32, child_size: usize, r: i32) -> usize {
    if rank <= r {
        1
    } else {
        // ceil((3 * child_size + 1) / 2)
        (3 * child_size + 2) / 2
    }
}

#[inline]
fn leaf<T>(x: &Node<T>) -> bool {
    x.left.is_none() && x.right.is_none()
}

#[inline]
fn swap_lr<T>(x: &mut Node<T>) {
    std::mem::swap(&mut x.left, &mut x.right);
}

/// Appends a new cell holding `elem` to the end of the list whose current
/// tail is `listend`.
unsafe fn addcell<T>(elem: T, listend: Option<NonNull<ListCell<T>>>) -> NonNull<ListCell<T>> {
    let cell = Box::new(ListCell {
        elem,
        prev: listend,
        next: None,
    });
    let cell = NonNull::new_unchecked(Box::into_raw(cell));
    if let Some(tail) = listend {
        (*tail.as_ptr()).next = Some(cell);
    }
    cell
}

/// Builds a rank-0 node containing exactly `elem`. Its ckey matches `elem`,
/// since that element is the only thing in its list.
unsafe fn make_node<T: Clone>(elem: T) -> NonNull<Node<T>> {
    let node = Box::new(Node {
        ckey: elem.clone(),
        rank: 0,
        size: 1,
        nelems: 1,
        first: None,
        last: None,
        left: None,
        right: None,
    });
    let node = NonNull::new_unchecked(Box::into_raw(node));
    let cell = addcell(elem, None);
    (*node.as_ptr()).first = Some(cell);
    (*node.as_ptr()).last = Some(cell);
    node
}

/// Builds a rank-0 tree containing exactly `elem`.
unsafe fn make_tree<T: Clone>(elem: T) -> NonNull<Tree<T>> {
    let node = make_node(elem);
    let tree = Box::new(Tree {
        root: node,
        rank: 0,
        prev: None,
        next: None,
        // Temporary self-reference; every tree always counts itself as its
        // own suffix-min candidate until update_suffix_min says otherwise.
        sufmin: NonNull::dangling(),
    });
    let tree = NonNull::new_unchecked(Box::into_raw(tree));
    (*tree.as_ptr()).sufmin = tree;
    tree
}

/// Moves the entire item list of `src` onto the end of `dst`'s list and
/// transfers `src`'s element count, leaving `src`'s list empty.
unsafe fn move_list<T>(src: NonNull<Node<T>>, dst: NonNull<Node<T>>) {
    debug_assert!((*src.as_ptr()).first.is_some(), "move_list: src must be nonempty");

    let src_first = (*src.as_ptr()).first;
    if let Some(dst_last) = (*dst.as_ptr()).last {
        (*dst_last.as_ptr()).next = src_first;
    }
    if (*dst.as_ptr()).first.is_none() {
        (*dst.as_ptr()).first = src_first;
    }
    if let Some(first) = src_first {
        (*first.as_ptr()).prev = (*dst.as_ptr()).last;
    }
    (*dst.as_ptr()).last = (*src.as_ptr()).last;

    (*dst.as_ptr()).nelems += (*src.as_ptr()).nelems;
    (*src.as_ptr()).nelems = 0;
    (*src.as_ptr()).first = None;
    (*src.as_ptr()).last = None;
}

/// Repairs a deficient node by repeatedly stealing the smaller-ckey child's
/// list until `x` is full enough or has become a leaf.
unsafe fn sift<T: Ord + Clone>(x: NonNull<Node<T>>) {
    loop {
        let xp = x.as_ptr();
        if (*xp).nelems >= (*xp).size || leaf(&*xp) {
            return;
        }

        // Normalize so the smaller-ckey (or only) child is on the left; an
        // absent child is treated as having +infinity ckey.
        let swap = match ((*xp).left, (*xp).right) {
            (None, _) => true,
            (Some(l), Some(r)) => (*l.as_ptr()).ckey > (*r.as_ptr()).ckey,
            (Some(_), None) => false,
        };
        if swap {
            swap_lr(&mut *xp);
        }

        // x is not a leaf, so after normalizing, left must be present.
        let left = (*xp).left.unwrap();
        move_list(left, x);
        (*xp).ckey = (*left.as_ptr()).ckey.clone();

        if leaf(&*left.as_ptr()) {
            drop(Box::from_raw(left.as_ptr()));
            (*xp).left = None;
        } else {
            sift(left);
        }
    }
}

/// Merges two equal-rank nodes into a fresh, rank-incremented node and fills
/// it by sifting through its new children.
unsafe fn combine<T: Ord + Clone>(x: NonNull<Node<T>>, y: NonNull<Node<T>>, r: i32) -> NonNull<Node<T>> {
    let rank = (*x.as_ptr()).rank + 1;
    let size = next_size(rank, (*x.as_ptr()).size, r);
    let z = Box::new(Node {
        // Placeholder; sift() below always runs (size >= 1 > nelems == 0)
        // and overwrites this before it is ever read.
        ckey: (*x.as_ptr()).ckey.clone(),
        rank,
        size,
        nelems: 0,
        first: None,
        last: None,
        left: Some(x),
        right: Some(y),
    });
    let z = NonNull::new_unchecked(Box::into_raw(z));
    sift(z);
    z
}

/// Splices `inserted` into `heap`'s rootlist immediately before `successor`.
unsafe fn insert_tree<T>(heap: &mut SoftHeap<T>, inserted: NonNull<Tree<T>>, successor: NonNull<Tree<T>>) {
    (*inserted.as_ptr()).next = Some(successor);
    let succ_prev = (*successor.as_ptr()).prev;
    match succ_prev {
        None => heap.first = Some(inserted),
        Some(p) => (*p.as_ptr()).next = Some(inserted),
    }
    (*inserted.as_ptr()).prev = succ_prev;
    (*successor.as_ptr()).prev = Some(inserted);
}

/// Unlinks `removed` from `heap`'s rootlist. Does not free `removed`.
unsafe fn remove_tree<T>(heap: &mut SoftHeap<T>, removed: NonNull<Tree<T>>) {
    let prev = (*removed.as_ptr()).prev;
    let next = (*removed.as_ptr()).next;
    match prev {
        None => heap.first = next,
        Some(p) => (*p.as_ptr()).next = next,
    }
    if let Some(n) = next {
        (*n.as_ptr()).prev = prev;
    }
}

/// Recomputes the `sufmin` pointers of `t` and every tree preceding it in
/// the rootlist.
unsafe fn update_suffix_min<T: Ord>(t: NonNull<Tree<T>>) {
    let mut cur = Some(t);
    while let Some(c) = cur {
        let next = (*c.as_ptr()).next;
        (*c.as_ptr()).sufmin = match next {
            None => c,
            Some(n) => {
                let n_sufmin = (*n.as_ptr()).sufmin;
                let c_ckey = &(*(*c.as_ptr()).root.as_ptr()).ckey;
                let n_ckey = &(*(*n_sufmin.as_ptr()).root.as_ptr()).ckey;
                if c_ckey <= n_ckey {
                    c
                } else {
                    n_sufmin
                }
            }
        };
        cur = (*c.as_ptr()).prev;
    }
}

/// Splices every tree of `a` into `b`'s rootlist, keeping rank order.
/// Precondition: `a.rank <= b.rank`. Leaves `a` emptied of trees.
unsafe fn merge_into<T>(a: &mut SoftHeap<T>, b: &mut SoftHeap<T>) {
    let mut curr_a = a.first;
    let mut curr_b = b.first;

    while let Some(ta) = curr_a {
        let mut tb = curr_b.expect(
            "merge_into: B must contain a tree of rank >= any tree of A, since rank(A) <= rank(B)",
        );
        while (*tb.as_ptr()).rank < (*ta.as_ptr()).rank {
            tb = (*tb.as_ptr()).next.expect(
                "merge_into: B must contain a tree of rank >= current A tree, since rank(A) <= rank(B)",
            );
        }
        curr_b = Some(tb);

        let next_a = (*ta.as_ptr()).next;
        insert_tree(b, ta, tb);
        curr_a = next_a;
    }

    a.first = None;
}

/// Runs the binomial-style carry pass over `heap`'s rootlist, combining
/// adjacent equal-rank trees until no further carries are possible. Returns
/// the last tree visited (for `update_suffix_min`).
unsafe fn repeated_combine<T: Ord + Clone>(
    heap: &mut SoftHeap<T>,
    smaller_rank: i32,
    r: i32,
) -> NonNull<Tree<T>> {
    let mut curr = heap.first.expect("repeated_combine: heap must be nonempty");

    loop {
        let next = match (*curr.as_ptr()).next {
            None => break,
            Some(n) => n,
        };

        let two = (*curr.as_ptr()).rank == (*next.as_ptr()).rank;
        let three = two
            && match (*next.as_ptr()).next {
                Some(nn) => (*curr.as_ptr()).rank == (*nn.as_ptr()).rank,
                None => false,
            };

        if !two {
            if (*curr.as_ptr()).rank > smaller_rank {
                break;
            }
            curr = next;
        } else if !three {
            let x = (*curr.as_ptr()).root;
            let y = (*next.as_ptr()).root;
            let z = combine(x, y, r);
            (*curr.as_ptr()).root = z;
            (*curr.as_ptr()).rank = (*z.as_ptr()).rank;
            remove_tree(heap, next);
            drop(Box::from_raw(next.as_ptr()));
            // The promoted tree may now equal its new successor in rank, so
            // curr is not advanced.
        } else {
            curr = next;
        }
    }

    if (*curr.as_ptr()).rank > heap.rank {
        heap.rank = (*curr.as_ptr()).rank;
    }
    update_suffix_min(curr);
    curr
}

/// Pops and returns the first element of `x`'s list.
unsafe fn extract_elem<T>(x: NonNull<Node<T>>) -> T {
    let xp = x.as_ptr();
    let todelete = (*xp)
        .first
        .expect("extract_elem: x must be nonempty (nelems > 0 implies first.is_some())");
    let cell = Box::from_raw(todelete.as_ptr());

    (*xp).first = cell.next;
    match (*xp).first {
        Some(new_first) => {
            if (*new_first.as_ptr()).next.is_none() {
                (*xp).last = Some(new_first);
            }
            (*new_first.as_ptr()).prev = None;
        }
        None => (*xp).last = None,
    }
    (*xp).nelems -= 1;
    cell.elem
}

impl<T: Ord + Clone> SoftHeap<T> {
    /// Creates an empty soft heap with error parameter `epsilon`.
    ///
    /// # Errors
    /// Returns [`SoftHeapError::InvalidEpsilon`] unless `0.0 < epsilon < 1.0`.
    pub fn new(epsilon: f64) -> Result<Self, SoftHeapError> {
        if !(epsilon > 0.0 && epsilon < 1.0) {
            return Err(SoftHeapError::InvalidEpsilon(epsilon));
        }
        Ok(Self {
            first: None,
            rank: -1,
            epsilon,
            r: r_of_epsilon(epsilon),
        })
    }

    /// Creates a soft heap with error parameter `epsilon` containing only
    /// `elem`.
    ///
    /// # Errors
    /// Returns [`SoftHeapError::InvalidEpsilon`] unless `0.0 < epsilon < 1.0`.
    pub fn singleton(elem: T, epsilon: f64) -> Result<Self, SoftHeapError> {
        let mut heap = Self::new(epsilon)?;
        heap.first = Some(unsafe { make_tree(elem) });
        heap.rank = 0;
        Ok(heap)
    }

    /// Returns `true` if and only if this heap contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Returns this heap's error parameter.
    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Inserts `elem` into the heap. Never fails: `self` was already built
    /// with a valid epsilon, so any internal meld this performs cannot hit
    /// [`MeldError`].
    pub fn insert(&mut self, elem: T) {
        if self.is_empty() {
            self.first = Some(unsafe { make_tree(elem) });
            self.rank = 0;
            return;
        }

        let singleton = Self::singleton(elem, self.epsilon)
            .expect("insert: self.epsilon was already validated when self was constructed");
        let current = self.take();
        *self = current
            .meld(singleton)
            .expect("insert: melding a heap with its own epsilon cannot mismatch");
    }

    /// Destructively merges `self` and `other` into a single heap and
    /// returns it. Both inputs are consumed on success.
    ///
    /// # Errors
    /// Returns [`MeldError`] if the two heaps' epsilons differ by more than
    /// a 0.1% relative tolerance. Neither heap's rootlist has been touched
    /// yet at that point, so the error hands both heaps back to the caller
    /// unmodified via [`MeldError::into_heaps`] instead of dropping them.
    pub fn meld(self, other: Self) -> Result<Self, MeldError<T>> {
        let max_eps = self.epsilon.max(other.epsilon);
        let min_eps = self.epsilon.min(other.epsilon);
        if 1.0 - min_eps / max_eps > EPSILON_TOLERANCE {
            return Err(MeldError {
                epsilon_a: self.epsilon,
                epsilon_b: other.epsilon,
                heap_a: self,
                heap_b: other,
            });
        }

        let (mut lower, mut higher) = if self.rank <= other.rank {
            (self, other)
        } else {
            (other, self)
        };

        unsafe {
            merge_into(&mut lower, &mut higher);
            if higher.first.is_some() {
                repeated_combine(&mut higher, lower.rank, higher.r);
            }
        }

        Ok(higher)
    }

    /// Extracts and returns an element of (approximately) minimum priority.
    ///
    /// # Errors
    /// Returns [`SoftHeapError::ExtractFromEmpty`] if the heap is empty.
    pub fn extract_min(&mut self) -> Result<T, SoftHeapError> {
        self.extract_min_with_ckey().map(|(elem, _ckey)| elem)
    }

    /// Extracts and returns an element along with the *working priority*
    /// (ckey) it was traveling under — an upper bound on its true priority.
    ///
    /// # Errors
    /// Returns [`SoftHeapError::ExtractFromEmpty`] if the heap is empty.
    pub fn extract_min_with_ckey(&mut self) -> Result<(T, T), SoftHeapError> {
        let first = self.first.ok_or(SoftHeapError::ExtractFromEmpty)?;

        unsafe {
            let t = (*first.as_ptr()).sufmin;
            let x = (*t.as_ptr()).root;

            let elem = extract_elem(x);
            let ckey = (*x.as_ptr()).ckey.clone();

            if (*x.as_ptr()).nelems <= (*x.as_ptr()).size / 2 {
                if !leaf(&*x.as_ptr()) {
                    sift(x);
                    update_suffix_min(t);
                } else if (*x.as_ptr()).nelems == 0 {
                    drop(Box::from_raw(x.as_ptr()));
                    remove_tree(self, t);

                    let t_next = (*t.as_ptr()).next;
                    let t_prev = (*t.as_ptr()).prev;
                    if t_next.is_none() {
                        self.rank = match t_prev {
                            None => -1,
                            Some(p) => (*p.as_ptr()).rank,
                        };
                    }
                    if let Some(p) = t_prev {
                        update_suffix_min(p);
                    }
                    drop(Box::from_raw(t.as_ptr()));
                }
                // else: a leaf with residual items needs no structural
                // repair; the next extract will deal with it.
            }

            Ok((elem, ckey))
        }
    }

    /// Swaps `self` out for an empty placeholder heap of the same epsilon,
    /// returning the original. Used internally to move `self` by value into
    /// [`SoftHeap::meld`] from methods that only borrow `&mut self`.
    fn take(&mut self) -> Self {
        std::mem::replace(
            self,
            Self {
                first: None,
                rank: -1,
                epsilon: self.epsilon,
                r: self.r,
            },
        )
    }
}

impl<T> Drop for SoftHeap<T> {
    fn drop(&mut self) {
        unsafe fn drop_list<T>(mut cell: Option<NonNull<ListCell<T>>>) {
            while let Some(c) = cell {
                let next = (*c.as_ptr()).next;
                drop(Box::from_raw(c.as_ptr()));
                cell = next;
            }
        }

        unsafe fn drop_node<T>(x: Option<NonNull<Node<T>>>) {
            if let Some(n) = x {
                drop_node((*n.as_ptr()).left.take());
                drop_node((*n.as_ptr()).right.take());
                drop_list((*n.as_ptr()).first.take());
                drop(Box::from_raw(n.as_ptr()));
            }
        }

        unsafe {
            let mut t = self.first.take();
            while let Some(tree) = t {
                let next = (*tree.as_ptr()).next;
                drop_node(Some((*tree.as_ptr()).root));
                drop(Box::from_raw(tree.as_ptr()));
                t = next;
            }
        }
    }
}
