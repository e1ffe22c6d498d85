#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate computes constraint rankings for Optimality Theory datasets,
//! in the partial-order variant of the framework described by these papers:
//!
//! - Prince and Smolensky, *Optimality Theory: Constraint Interaction in
//!   Generative Grammar*, 1993/2004
//! - Anttila and Cho, *Variation and change in Optimality Theory*, 1998
//! - Djalali, *A constructive solution to the ranking problem in Partial
//!   Order Optimality Theory*, 2017
//!
//! Given a tableau of candidates with violation vectors and optimality
//! judgments, the engine enumerates every strict partial order over the
//! constraint set, filters the orders down to the grammars consistent with
//! the judgments, and derives entailment relations and counting statistics
//! over the surviving grammar set.
//!
//! The number of partial orders grows much faster than `n!`, so the engine
//! supports small constraint sets only (up to [`MAX_CONSTRAINTS`]). Order
//! spaces are expensive to enumerate and cheap to reuse; [`SpaceCache`]
//! holds one space per constraint count and can persist them.

use lasso::{Rodeo, Spur};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::SortedIterator;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io;
use std::mem::take;
use thiserror::Error;

/// The largest supported constraint set.
///
/// Six constraints already give 130,023 partial orders; the enumeration is
/// super-exponential and a seventh constraint is out of practical reach.
pub const MAX_CONSTRAINTS: u8 = 6;

/// Errors reported by the ranking engine.
///
/// An empty compatible grammar set is never an error; contradictory
/// optimality judgments legitimately rule out every ranking, and the
/// statistics degrade to zero counts and percentages.
#[derive(Debug, Error)]
pub enum Error {
    /// A constraint count outside `1..=MAX_CONSTRAINTS`.
    #[error("unsupported constraint count {n}, expected 1 through {max}", max = MAX_CONSTRAINTS)]
    InvalidConstraintCount {
        /// The rejected count.
        n: usize,
    },

    /// An order space and a dataset with different constraint counts were
    /// combined.
    #[error("order space covers {space} constraints but the dataset has {dataset}")]
    ArityMismatch {
        /// Arity of the order space.
        space: u8,
        /// Arity of the dataset or ranking.
        dataset: u8,
    },

    /// An a-priori ranking that is not a strict partial order over the
    /// dataset's constraints.
    #[error("malformed a priori ranking: {0}")]
    MalformedAprioriRanking(String),

    /// A constraint list that cannot label a tableau.
    #[error("invalid constraint labels: {0}")]
    InvalidConstraintLabels(String),

    /// A candidate row that does not fit its input group.
    #[error("inconsistent candidate grouping: {0}")]
    InconsistentCandidateGrouping(String),

    /// A persisted order space that could not be read or written.
    #[error("order space codec: {0}")]
    Codec(#[from] bincode::Error),
}

fn check_arity(n: usize) -> Result<u8, Error> {
    if n == 0 || n > usize::from(MAX_CONSTRAINTS) {
        Err(Error::InvalidConstraintCount { n })
    } else {
        Ok(n as u8)
    }
}

// Rankings live on a fixed 6x6 adjacency grid so that the bit layout does
// not depend on the constraint count.
const GRID: u32 = 6;
const ROW: u64 = 0x3f;
const DIAG: u64 =
    (1u64 << 0) | (1u64 << 7) | (1u64 << 14) | (1u64 << 21) | (1u64 << 28) | (1u64 << 35);

fn bit(dominator: u8, dominated: u8) -> u64 {
    1u64 << ((u32::from(dominator) - 1) * GRID + (u32::from(dominated) - 1))
}

/// Transitive closure of an adjacency mask over the first `n` constraints.
/// A cycle shows up as a set bit on the diagonal.
fn close(mut bits: u64, n: u8) -> u64 {
    for via in 0..u32::from(n) {
        let via_row = (bits >> (via * GRID)) & ROW;
        for from in 0..u32::from(n) {
            if bits & (1 << (from * GRID + via)) != 0 {
                bits |= via_row << (from * GRID);
            }
        }
    }
    bits
}

/// A strict partial order over the constraints `1..=n`, stored as its
/// transitive closure.
///
/// A pair `(a, b)` means constraint `a` dominates constraint `b`. The
/// closure is the representation used for refinement tests; the transitive
/// reduction, which is what a reader wants to see, is derived on demand by
/// [`Ranking::reduction_pairs`]. A ranking with every pair of constraints
/// comparable is a total order, the grammar shape of classical Optimality
/// Theory.
///
/// ```
/// use poot::Ranking;
///
/// let r = Ranking::from_pairs(3, &[(1, 2), (2, 3)]).unwrap();
/// assert!(r.dominates(1, 3));
/// assert_eq!(r.size(), 3);
/// assert!(r.is_total());
///
/// assert!(Ranking::from_pairs(2, &[(1, 2), (2, 1)]).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ranking {
    n: u8,
    bits: u64,
}

impl Ranking {
    /// Creates the empty ranking, under which no constraint dominates any
    /// other.
    pub fn empty(n: u8) -> Result<Self, Error> {
        let n = check_arity(usize::from(n))?;
        Ok(Ranking { n, bits: 0 })
    }

    /// Creates a ranking from dominance pairs `(dominator, dominated)`,
    /// closing the relation transitively.
    ///
    /// Pairs may be given in any order, and closure pairs may be included
    /// or omitted freely. Returns an error if an index falls outside
    /// `1..=n` or if the closed relation contains a cycle.
    pub fn from_pairs(n: u8, pairs: &[(u8, u8)]) -> Result<Self, Error> {
        let n = check_arity(usize::from(n))?;
        let mut bits = 0u64;
        for &(a, b) in pairs {
            if a == 0 || b == 0 || a > n || b > n {
                return Err(Error::MalformedAprioriRanking(format!(
                    "constraint index ({}, {}) out of range 1..={}",
                    a, b, n
                )));
            }
            bits |= bit(a, b);
        }
        let bits = close(bits, n);
        if bits & DIAG != 0 {
            return Err(Error::MalformedAprioriRanking(
                "dominance relation is cyclic".to_string(),
            ));
        }
        Ok(Ranking { n, bits })
    }

    /// The number of constraints this ranking is defined over.
    pub fn n(&self) -> u8 {
        self.n
    }

    /// The number of pairs in the transitive closure.
    pub fn size(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Returns `true` if every pair of constraints is comparable.
    ///
    /// A total order over `n` constraints has exactly `n * (n - 1) / 2`
    /// closure pairs.
    pub fn is_total(&self) -> bool {
        self.size() == usize::from(self.n) * usize::from(self.n - 1) / 2
    }

    /// Returns `true` if `dominator` outranks `dominated`.
    ///
    /// # Panics
    ///
    /// Panics if either index is outside `1..=n`.
    pub fn dominates(&self, dominator: u8, dominated: u8) -> bool {
        assert!(dominator >= 1 && dominator <= self.n);
        assert!(dominated >= 1 && dominated <= self.n);
        self.bits & bit(dominator, dominated) != 0
    }

    /// Returns `true` if this ranking preserves every dominance of
    /// `coarser`, i.e. its closure is a superset of the other's.
    ///
    /// Every ranking refines the empty ranking; a total order is refined
    /// only by itself.
    pub fn refines(&self, coarser: &Ranking) -> bool {
        self.n == coarser.n && self.bits & coarser.bits == coarser.bits
    }

    /// The closure pairs `(dominator, dominated)` in ascending order.
    pub fn pairs(&self) -> SmallVec<[(u8, u8); 16]> {
        let mut pairs = SmallVec::new();
        for a in 1..=self.n {
            for b in 1..=self.n {
                if self.bits & bit(a, b) != 0 {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }

    /// The cover pairs of the transitive reduction, in ascending order.
    ///
    /// A closure pair `(a, b)` is a cover unless some third constraint sits
    /// between the two.
    pub fn reduction_pairs(&self) -> SmallVec<[(u8, u8); 16]> {
        self.pairs()
            .into_iter()
            .filter(|&(a, b)| {
                !(1..=self.n)
                    .any(|k| k != a && k != b && self.dominates(a, k) && self.dominates(k, b))
            })
            .collect()
    }

    /// Constraint indices sorted from highest-ranked to lowest, breaking
    /// ties by index. For a total order the dominated-counts are all
    /// distinct and the sequence is the ranking itself.
    fn dominance_order(&self) -> SmallVec<[u8; 6]> {
        let mut order: SmallVec<[u8; 6]> = (1..=self.n).collect();
        order.sort_by_key(|&c| {
            Reverse(((self.bits >> ((u32::from(c) - 1) * GRID)) & ROW).count_ones())
        });
        order
    }
}

impl fmt::Debug for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.pairs()).finish()
    }
}

/// The set of all strict partial orders over a fixed number of constraints.
///
/// Orders are enumerated once, in a deterministic sequence, each stored as
/// a closed [`Ranking`]. The space for `n` constraints holds every distinct
/// acyclic relation, from the empty ranking up through all `n!` total
/// orders.
///
/// ```
/// use poot::OrderSpace;
///
/// let space = OrderSpace::build(3).unwrap();
/// assert_eq!(space.len(), 19);
/// assert_eq!(space.num_total_orders(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpace {
    n: u8,
    orders: Vec<Ranking>,
    totals: Vec<u32>,
}

impl OrderSpace {
    /// Enumerates every strict partial order on `n` labeled constraints.
    ///
    /// Works by incremental extension: each order on `k - 1` constraints is
    /// extended with constraint `k` placed above one subset of the existing
    /// constraints and below a disjoint subset, the result is closed, and
    /// duplicates and cyclic placements are discarded. Every order on `k`
    /// constraints restricts to an order on `k - 1` of them, so the sweep
    /// is exhaustive.
    pub fn build(n: u8) -> Result<OrderSpace, Error> {
        let n = check_arity(usize::from(n))?;

        // One constraint admits only the empty relation.
        let mut masks: Vec<u64> = vec![0];
        for k in 2..=n {
            let prev = take(&mut masks);
            let mut seen: HashSet<u64> = HashSet::with_capacity(prev.len() * 8);
            let members: u32 = (1 << (k - 1)) - 1;
            for &base in &prev {
                for above in 0..=members {
                    // Whatever is not above k may go below it.
                    let rest = members & !above;
                    let mut below = rest;
                    loop {
                        let mut bits = base;
                        for e in 1..k {
                            if above & (1 << (e - 1)) != 0 {
                                bits |= bit(e, k);
                            }
                            if below & (1 << (e - 1)) != 0 {
                                bits |= bit(k, e);
                            }
                        }
                        let closed = close(bits, k);
                        if closed & DIAG == 0 && seen.insert(closed) {
                            masks.push(closed);
                        }
                        if below == 0 {
                            break;
                        }
                        below = (below - 1) & rest;
                    }
                }
            }
        }

        let total_size = usize::from(n) * usize::from(n - 1) / 2;
        let mut orders = Vec::with_capacity(masks.len());
        let mut totals = Vec::new();
        for (index, bits) in masks.into_iter().enumerate() {
            if bits.count_ones() as usize == total_size {
                totals.push(index as u32);
            }
            orders.push(Ranking { n, bits });
        }
        Ok(OrderSpace { n, orders, totals })
    }

    /// The constraint count this space was built for.
    pub fn n(&self) -> u8 {
        self.n
    }

    /// The number of partial orders in the space.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// The number of total orders in the space, always `n!`.
    pub fn num_total_orders(&self) -> usize {
        self.totals.len()
    }

    /// Iterates over every order in enumeration sequence.
    pub fn iter(&self) -> impl Iterator<Item = &Ranking> + '_ {
        self.orders.iter()
    }

    /// Iterates over the total orders in enumeration sequence.
    pub fn total_orders(&self) -> impl Iterator<Item = &Ranking> + '_ {
        self.totals.iter().map(move |&i| &self.orders[i as usize])
    }

    /// Counts the total orders refining the given ranking, its linear
    /// extensions within this space.
    ///
    /// A total order's rank volume is 1; the empty ranking's is `n!`.
    ///
    /// ```
    /// use poot::{OrderSpace, Ranking};
    ///
    /// let space = OrderSpace::build(3).unwrap();
    /// let empty = Ranking::empty(3).unwrap();
    /// assert_eq!(space.rank_volume(&empty), 6);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the ranking was built for a different constraint count.
    pub fn rank_volume(&self, ranking: &Ranking) -> usize {
        assert_eq!(self.n, ranking.n());
        self.total_orders().filter(|t| t.refines(ranking)).count()
    }

    /// Sorts rankings ascending by the given key, keeping enumeration
    /// order among ties.
    ///
    /// # Panics
    ///
    /// Panics under [`SortBy::RankVolume`] if a ranking was built for a
    /// different constraint count.
    pub fn sort_rankings(&self, rankings: &mut [Ranking], by: SortBy) {
        match by {
            SortBy::Size => rankings.sort_by_key(|r| r.size()),
            SortBy::RankVolume => rankings.sort_by_cached_key(|r| self.rank_volume(r)),
        }
    }
}

/// An explicit cache of order spaces keyed by constraint count.
///
/// Enumeration is the expensive step of the whole pipeline, so deployments
/// warm one of these up front (or load a persisted copy) and then share it
/// read-only. Nothing here locks; build before sharing.
///
/// ```
/// use poot::SpaceCache;
///
/// let mut cache = SpaceCache::new();
/// assert_eq!(cache.space(3).unwrap().len(), 19);
///
/// let mut buf = Vec::new();
/// cache.write_to(&mut buf).unwrap();
/// let warm = SpaceCache::read_from(buf.as_slice()).unwrap();
/// assert_eq!(warm.get(3).map(|s| s.len()), Some(19));
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SpaceCache {
    spaces: HashMap<u8, OrderSpace>,
}

impl SpaceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        SpaceCache::default()
    }

    /// Returns the space for `n` constraints, enumerating it on first use.
    pub fn space(&mut self, n: u8) -> Result<&OrderSpace, Error> {
        check_arity(usize::from(n))?;
        if !self.spaces.contains_key(&n) {
            let space = OrderSpace::build(n)?;
            self.spaces.insert(n, space);
        }
        Ok(&self.spaces[&n])
    }

    /// Returns the space for `n` constraints if it is already cached.
    pub fn get(&self, n: u8) -> Option<&OrderSpace> {
        self.spaces.get(&n)
    }

    /// Inserts a pre-built space, replacing any cached one of the same
    /// arity.
    pub fn insert(&mut self, space: OrderSpace) {
        self.spaces.insert(space.n(), space);
    }

    /// Serializes every cached space to the writer.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), Error> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Reads a cache previously written with [`SpaceCache::write_to`].
    pub fn read_from<R: io::Read>(reader: R) -> Result<SpaceCache, Error> {
        Ok(bincode::deserialize_from(reader)?)
    }
}

struct Candidate {
    input: Spur,
    output: Spur,
    violations: SmallVec<[u32; 6]>,
}

struct InputGroup {
    input: Spur,
    members: Vec<usize>,
    // Flagged optima as a bitmask over member positions.
    flagged: u64,
}

/// An Optimality Theory tableau: a constraint list and candidates grouped
/// by input form.
///
/// Each candidate pairs an input with an output, carries one violation
/// count per constraint, and is flagged optimal or not. Candidates with
/// the same input compete with each other and with nobody else; groups
/// form in first-seen order, and rows of one group need not be adjacent.
///
/// ```
/// use poot::Dataset;
///
/// let mut dset = Dataset::new("tiny", &["Faith", "Onset"]).unwrap();
/// dset.add_candidate("ta", "ta", true, &[0, 1]).unwrap();
/// dset.add_candidate("ta", "da", false, &[1, 0]).unwrap();
/// assert_eq!(dset.num_constraints(), 2);
/// assert_eq!(dset.num_candidates(), 2);
/// ```
pub struct Dataset {
    name: String,
    constraints: Vec<String>,
    forms: Rodeo,
    candidates: Vec<Candidate>,
    groups: Vec<InputGroup>,
    group_of: HashMap<Spur, usize>,
}

impl Dataset {
    /// Creates an empty tableau over the given constraint labels.
    ///
    /// Labels must be distinct and non-empty, and there must be between
    /// one and [`MAX_CONSTRAINTS`] of them.
    pub fn new(name: &str, constraints: &[&str]) -> Result<Dataset, Error> {
        check_arity(constraints.len())?;
        for (i, label) in constraints.iter().enumerate() {
            if label.is_empty() {
                return Err(Error::InvalidConstraintLabels(format!(
                    "constraint {} has an empty label",
                    i + 1
                )));
            }
            if constraints[..i].contains(label) {
                return Err(Error::InvalidConstraintLabels(format!(
                    "duplicate constraint label \"{}\"",
                    label
                )));
            }
        }
        Ok(Dataset {
            name: name.to_string(),
            constraints: constraints.iter().map(|s| s.to_string()).collect(),
            forms: Rodeo::new(),
            candidates: Vec::new(),
            groups: Vec::new(),
            group_of: HashMap::new(),
        })
    }

    /// Adds one candidate row.
    ///
    /// The violation vector must have one entry per constraint, the output
    /// must not repeat within its input group, and a group may hold at
    /// most 64 candidates.
    pub fn add_candidate(
        &mut self,
        input: &str,
        output: &str,
        optimal: bool,
        violations: &[u32],
    ) -> Result<&mut Self, Error> {
        if violations.len() != self.constraints.len() {
            return Err(Error::InconsistentCandidateGrouping(format!(
                "candidate \"{}\" of input \"{}\" has {} violation counts for {} constraints",
                output,
                input,
                violations.len(),
                self.constraints.len()
            )));
        }
        let input = self.forms.get_or_intern(input);
        let output = self.forms.get_or_intern(output);

        let group_index = match self.group_of.get(&input) {
            Some(&g) => g,
            None => {
                self.groups.push(InputGroup {
                    input,
                    members: Vec::new(),
                    flagged: 0,
                });
                self.group_of.insert(input, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        {
            let candidates = &self.candidates;
            let group = &self.groups[group_index];
            if group
                .members
                .iter()
                .any(|&m| candidates[m].output == output)
            {
                return Err(Error::InconsistentCandidateGrouping(format!(
                    "input \"{}\" lists output \"{}\" twice",
                    self.forms.resolve(&input),
                    self.forms.resolve(&output)
                )));
            }
            if group.members.len() >= 64 {
                return Err(Error::InconsistentCandidateGrouping(format!(
                    "input \"{}\" has more than 64 candidates",
                    self.forms.resolve(&input)
                )));
            }
        }

        let group = &mut self.groups[group_index];
        if optimal {
            group.flagged |= 1 << group.members.len();
        }
        group.members.push(self.candidates.len());
        self.candidates.push(Candidate {
            input,
            output,
            violations: SmallVec::from_slice(violations),
        });
        Ok(self)
    }

    /// The tableau's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The constraint labels, in ranking-index order.
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    /// The constraint count.
    pub fn num_constraints(&self) -> u8 {
        self.constraints.len() as u8
    }

    /// The number of candidate rows.
    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// The number of input groups.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Builds an a-priori ranking from `(dominator, dominated)` label
    /// pairs.
    ///
    /// Unknown labels and cyclic relations are rejected; the result is a
    /// closed [`Ranking`] suitable for restricting
    /// [`RankingEvaluator::compatible_rankings`].
    pub fn apriori_from_pairs(&self, pairs: &[(&str, &str)]) -> Result<Ranking, Error> {
        let mut indexed = Vec::with_capacity(pairs.len());
        for &(dominator, dominated) in pairs {
            indexed.push((
                self.constraint_index(dominator)?,
                self.constraint_index(dominated)?,
            ));
        }
        Ranking::from_pairs(self.num_constraints(), &indexed)
    }

    fn constraint_index(&self, label: &str) -> Result<u8, Error> {
        match self.constraints.iter().position(|c| c == label) {
            Some(i) => Ok(i as u8 + 1),
            None => Err(Error::MalformedAprioriRanking(format!(
                "unknown constraint \"{}\"",
                label
            ))),
        }
    }

    /// Renders a ranking's transitive reduction with this tableau's
    /// constraint labels, e.g. `{(c1, c2), (c1, c3)}`.
    ///
    /// The empty ranking renders as `{ }`.
    ///
    /// # Panics
    ///
    /// Panics if the ranking was built for a different constraint count.
    pub fn ranking_to_string(&self, ranking: &Ranking) -> String {
        assert_eq!(self.num_constraints(), ranking.n());
        let pairs = ranking.reduction_pairs();
        if pairs.is_empty() {
            return "{ }".to_string();
        }
        let inner: Vec<String> = pairs
            .iter()
            .map(|&(a, b)| {
                format!(
                    "({}, {})",
                    self.constraints[usize::from(a) - 1],
                    self.constraints[usize::from(b) - 1]
                )
            })
            .collect();
        format!("{{{}}}", inner.join(", "))
    }

    fn outcome_label(&self, candidate: &Candidate) -> String {
        format!(
            "{}, {}",
            self.forms.resolve(&candidate.input),
            self.forms.resolve(&candidate.output)
        )
    }

    /// Every group must name at least one winner.
    fn validate_groups(&self) -> Result<(), Error> {
        for group in &self.groups {
            if group.flagged == 0 {
                return Err(Error::InconsistentCandidateGrouping(format!(
                    "no candidate of input \"{}\" is marked optimal",
                    self.forms.resolve(&group.input)
                )));
            }
        }
        Ok(())
    }
}

/// Search the whole order space or just the total orders.
///
/// `Total` is classical Optimality Theory, where every grammar linearly
/// orders the constraints. `Partial` admits any partial order and so can
/// model free variation, where one input legitimately surfaces as more
/// than one output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    /// Consider total orders only.
    Total,
    /// Consider every partial order, total orders included.
    Partial,
}

/// Sort keys for a compatible grammar list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortBy {
    /// Ascending closure size, a proxy for how refined the order is.
    Size,
    /// Ascending [`OrderSpace::rank_volume`].
    RankVolume,
}

/// Entailment mappings keyed and valued by `"input, output"` strings.
pub type Entailments = BTreeMap<String, Vec<String>>;

/// Per-candidate counts over the total-order refinements of one grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCotStats {
    /// The candidate's output form.
    pub output: String,
    /// How many refinements make this candidate optimal.
    pub num_cot: usize,
    /// The same count as a percentage of all refinements.
    pub per_cot: f64,
}

/// Aggregate counts over a compatible grammar set.
///
/// "Poot" counts partial orders, "cot" counts the total orders among them.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Compatible partial orders.
    pub num_poots: usize,
    /// Partial orders in the whole space.
    pub num_total_poots: usize,
    /// `num_poots` as a percentage of `num_total_poots`.
    pub percent_poots: f64,
    /// Compatible total orders.
    pub num_cots: usize,
    /// Total orders in the whole space, always `n!`.
    pub num_total_cots: usize,
    /// `num_cots` as a percentage of `num_total_cots`.
    pub percent_cots: f64,
}

/// `part` as a percentage of `total`, with an empty total reading as zero
/// rather than a division error.
///
/// ```
/// use poot::percent;
///
/// assert_eq!(percent(11, 44), 25.0);
/// assert_eq!(percent(0, 0), 0.0);
/// ```
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Returns `true` if candidate `a` beats candidate `b`: on the
/// highest-ranked constraint where their violation counts differ, `a`
/// violates less. Ties recurse to the next distinguishing constraint, and
/// identical vectors beat nothing.
fn more_harmonic(order: &[u8], a: &[u32], b: &[u32]) -> bool {
    for &c in order {
        let (va, vb) = (a[usize::from(c) - 1], b[usize::from(c) - 1]);
        if va != vb {
            return va < vb;
        }
    }
    false
}

fn is_subset(a: &[u32], b: &[u32]) -> bool {
    a.len() <= b.len()
        && a.iter()
            .copied()
            .assume_sorted_by_item()
            .intersection(b.iter().copied().assume_sorted_by_item())
            .eq(a.iter().copied())
}

/// Holds the precomputed state for evaluating one dataset against one
/// order space.
///
/// Construction runs the classical evaluation of every input group under
/// every total order in the space, once. Everything else, grammar
/// filtering, entailments, and counting statistics, is derived from those
/// winner sets.
///
/// ```
/// use poot::{Dataset, OrderKind, OrderSpace, Ranking, RankingEvaluator};
///
/// let space = OrderSpace::build(2).unwrap();
/// let mut dset = Dataset::new("tiny", &["Faith", "Onset"]).unwrap();
/// dset.add_candidate("ta", "ta", true, &[0, 1]).unwrap();
/// dset.add_candidate("ta", "da", false, &[1, 0]).unwrap();
///
/// let eval = RankingEvaluator::new(&space, &dset).unwrap();
/// let compatible = eval.compatible_rankings(OrderKind::Partial, None).unwrap();
/// assert_eq!(compatible, vec![Ranking::from_pairs(2, &[(1, 2)]).unwrap()]);
/// ```
pub struct RankingEvaluator<'a> {
    space: &'a OrderSpace,
    dataset: &'a Dataset,
    // winners[t][g]: optimal members of group g under the t-th total
    // order, as a bitmask over member positions.
    winners: Vec<Vec<u64>>,
}

impl<'a> RankingEvaluator<'a> {
    /// Prepares an evaluator, computing the classical winner set of every
    /// input group under every total order.
    ///
    /// Fails if the space and dataset disagree on arity or if some input
    /// group names no optimal candidate.
    pub fn new(space: &'a OrderSpace, dataset: &'a Dataset) -> Result<Self, Error> {
        if space.n() != dataset.num_constraints() {
            return Err(Error::ArityMismatch {
                space: space.n(),
                dataset: dataset.num_constraints(),
            });
        }
        dataset.validate_groups()?;

        let mut winners = Vec::with_capacity(space.num_total_orders());
        for total in space.total_orders() {
            let order = total.dominance_order();
            let mut by_group = Vec::with_capacity(dataset.groups.len());
            for group in &dataset.groups {
                let mut mask = 0u64;
                for (pos, &a) in group.members.iter().enumerate() {
                    let va = &dataset.candidates[a].violations;
                    let beaten = group.members.iter().any(|&b| {
                        b != a && more_harmonic(&order, &dataset.candidates[b].violations, va)
                    });
                    if !beaten {
                        mask |= 1 << pos;
                    }
                }
                by_group.push(mask);
            }
            winners.push(by_group);
        }
        Ok(RankingEvaluator {
            space,
            dataset,
            winners,
        })
    }

    /// The order space this evaluator searches.
    pub fn space(&self) -> &OrderSpace {
        self.space
    }

    fn check_arity_of(&self, ranking: Option<&Ranking>) -> Result<(), Error> {
        if let Some(r) = ranking {
            if r.n() != self.space.n() {
                return Err(Error::ArityMismatch {
                    space: self.space.n(),
                    dataset: r.n(),
                });
            }
        }
        Ok(())
    }

    /// A ranking licenses a candidate when some total-order refinement
    /// makes it a classical winner. Returns the licensed set per group.
    fn licensed(&self, ranking: &Ranking) -> Vec<u64> {
        let mut licensed = vec![0u64; self.dataset.groups.len()];
        for (t, total) in self.space.total_orders().enumerate() {
            if total.refines(ranking) {
                for (g, mask) in self.winners[t].iter().enumerate() {
                    licensed[g] |= mask;
                }
            }
        }
        licensed
    }

    fn matches_flags(&self, licensed: &[u64]) -> bool {
        licensed
            .iter()
            .zip(&self.dataset.groups)
            .all(|(&mask, group)| mask == group.flagged)
    }

    /// Filters the order space down to the grammars compatible with the
    /// dataset's optimality judgments.
    ///
    /// A grammar is compatible when, for every input group, the set of
    /// candidates it licenses equals the set flagged optimal. With
    /// [`OrderKind::Total`] only total orders are searched and licensing
    /// is plain classical evaluation. An a-priori ranking restricts the
    /// search to its refinements.
    ///
    /// The result keeps enumeration order and may legitimately be empty;
    /// sort it with [`OrderSpace::sort_rankings`].
    pub fn compatible_rankings(
        &self,
        kind: OrderKind,
        apriori: Option<&Ranking>,
    ) -> Result<Vec<Ranking>, Error> {
        self.check_arity_of(apriori)?;
        let allowed = |r: &Ranking| apriori.map_or(true, |ap| r.refines(ap));

        let mut compatible = Vec::new();
        match kind {
            OrderKind::Total => {
                for (t, total) in self.space.total_orders().enumerate() {
                    if allowed(total) && self.matches_flags(&self.winners[t]) {
                        compatible.push(*total);
                    }
                }
            }
            OrderKind::Partial => {
                for ranking in self.space.iter() {
                    if allowed(ranking) && self.matches_flags(&self.licensed(ranking)) {
                        compatible.push(*ranking);
                    }
                }
            }
        }
        Ok(compatible)
    }

    /// Counting statistics for a compatible grammar set, safe on an empty
    /// one.
    pub fn statistics(&self, compatible: &[Ranking]) -> Statistics {
        let num_poots = compatible.len();
        let num_total_poots = self.space.len();
        let num_cots = compatible.iter().filter(|r| r.is_total()).count();
        let num_total_cots = self.space.num_total_orders();
        Statistics {
            num_poots,
            num_total_poots,
            percent_poots: percent(num_poots, num_total_poots),
            num_cots,
            num_total_cots,
            percent_cots: percent(num_cots, num_total_cots),
        }
    }

    /// For each input, the share of the grammar's total-order refinements
    /// under which each competing output wins.
    ///
    /// Inputs and outputs come back sorted. Counts cover every candidate,
    /// zeros included, so each winner tally is out of the same refinement
    /// count.
    pub fn cot_stats_by_candidate(
        &self,
        ranking: &Ranking,
    ) -> Result<BTreeMap<String, Vec<CandidateCotStats>>, Error> {
        self.check_arity_of(Some(ranking))?;

        let refinements: Vec<usize> = self
            .space
            .total_orders()
            .enumerate()
            .filter(|(_, t)| t.refines(ranking))
            .map(|(t, _)| t)
            .collect();

        let mut stats = BTreeMap::new();
        for (g, group) in self.dataset.groups.iter().enumerate() {
            let mut rows = Vec::with_capacity(group.members.len());
            for (pos, &member) in group.members.iter().enumerate() {
                let num_cot = refinements
                    .iter()
                    .filter(|&&t| self.winners[t][g] & (1 << pos) != 0)
                    .count();
                rows.push(CandidateCotStats {
                    output: self
                        .dataset
                        .forms
                        .resolve(&self.dataset.candidates[member].output)
                        .to_string(),
                    num_cot,
                    per_cot: percent(num_cot, refinements.len()),
                });
            }
            rows.sort_by(|a, b| a.output.cmp(&b.output));
            stats.insert(self.dataset.forms.resolve(&group.input).to_string(), rows);
        }
        Ok(stats)
    }

    /// The entailment relation between candidate outcomes.
    ///
    /// Outcome A entails outcome B when every total order making A optimal
    /// also makes B optimal, so the relation is reflexive and mutual
    /// entailment marks outcomes the grammars cannot tell apart. With an
    /// a-priori ranking, only its refinements are considered. Candidates
    /// with no competitor generate no comparisons and are skipped, as are
    /// outcomes no considered order makes optimal.
    pub fn entailments(&self, apriori: Option<&Ranking>) -> Result<Entailments, Error> {
        self.check_arity_of(apriori)?;

        let cots: Vec<usize> = self
            .space
            .total_orders()
            .enumerate()
            .filter(|(_, t)| apriori.map_or(true, |ap| t.refines(ap)))
            .map(|(t, _)| t)
            .collect();

        // One winner set per outcome, as a sorted list of positions into
        // the restricted total-order sequence.
        let mut labels = Vec::new();
        let mut winner_sets: Vec<Vec<u32>> = Vec::new();
        for (g, group) in self.dataset.groups.iter().enumerate() {
            if group.members.len() < 2 {
                continue;
            }
            for (pos, &member) in group.members.iter().enumerate() {
                let wins: Vec<u32> = cots
                    .iter()
                    .enumerate()
                    .filter(|&(_, &t)| self.winners[t][g] & (1 << pos) != 0)
                    .map(|(i, _)| i as u32)
                    .collect();
                if !wins.is_empty() {
                    labels.push(self.dataset.outcome_label(&self.dataset.candidates[member]));
                    winner_sets.push(wins);
                }
            }
        }

        let mut entailments = BTreeMap::new();
        for (a, wins_a) in winner_sets.iter().enumerate() {
            let mut entailed: Vec<String> = winner_sets
                .iter()
                .enumerate()
                .filter(|(_, wins_b)| is_subset(wins_a, wins_b))
                .map(|(b, _)| labels[b].clone())
                .collect();
            entailed.sort();
            entailments.insert(labels[a].clone(), entailed);
        }
        Ok(entailments)
    }

    /// The global entailments together with the ones contributed by the
    /// a-priori ranking alone.
    ///
    /// The second mapping holds exactly the entailment edges present under
    /// the a-priori restriction but absent globally, and is empty when no
    /// a-priori ranking is given.
    pub fn compute_entailments(
        &self,
        apriori: Option<&Ranking>,
    ) -> Result<(Entailments, Entailments), Error> {
        let global = self.entailments(None)?;
        let delta = match apriori {
            None => Entailments::new(),
            Some(ap) => {
                let restricted = self.entailments(Some(ap))?;
                subtract_entailments(restricted, &global)
            }
        };
        Ok((global, delta))
    }
}

/// Keeps the edges of `restricted` that `global` lacks.
fn subtract_entailments(restricted: Entailments, global: &Entailments) -> Entailments {
    let mut delta = Entailments::new();
    for (key, entailed) in restricted {
        let already: &[String] = global.get(&key).map_or(&[], |v| v.as_slice());
        let fresh: Vec<String> = entailed
            .into_iter()
            .filter(|e| !already.contains(e))
            .collect();
        if !fresh.is_empty() {
            delta.insert(key, fresh);
        }
    }
    delta
}
