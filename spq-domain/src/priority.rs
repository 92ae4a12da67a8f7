use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

// ---

use super::error::{Result, SpqError};
use super::packet::FlowId;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Service precedence of a flow at one scheduling element.
///
/// Numerically lower values are served first: a queued packet of priority 1
/// always goes out before any packet of priority 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(i64);

// ---

impl Priority {
    // ---
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw priority value.
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PrioritySpec
// ---------------------------------------------------------------------------

/// Operator-supplied priority assignment.
///
/// Either form is accepted; [`PriorityTable::new`] normalizes both into the
/// same runtime structure so nothing downstream branches on the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrioritySpec {
    // ---
    /// Element `i` is the priority of flow `i`.
    ByIndex(Vec<Priority>),

    /// Explicit flow id → priority pairs.
    ByFlow(BTreeMap<FlowId, Priority>),
}

// ---

impl PrioritySpec {
    // ---
    pub fn by_index(priorities: impl IntoIterator<Item = i64>) -> Self {
        Self::ByIndex(priorities.into_iter().map(Priority).collect())
    }

    pub fn by_flow(pairs: impl IntoIterator<Item = (FlowId, i64)>) -> Self {
        Self::ByFlow(pairs.into_iter().map(|(f, p)| (f, Priority(p))).collect())
    }
}

// ---

/// Parses `"1,100"` as [`PrioritySpec::ByIndex`] and `"0=1,1=10"` as
/// [`PrioritySpec::ByFlow`]. Mixing the two forms is rejected.
impl FromStr for PrioritySpec {
    type Err = SpqError;

    fn from_str(s: &str) -> Result<Self> {
        // ---
        let invalid = |reason: String| SpqError::InvalidPrioritySpec {
            spec: s.to_string(),
            reason,
        };

        let items: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return Err(SpqError::EmptyPriorities);
        }

        let mapped = items.iter().filter(|item| item.contains('=')).count();
        if mapped == 0 {
            let priorities = items
                .iter()
                .map(|item| {
                    item.parse::<i64>()
                        .map(Priority)
                        .map_err(|e| invalid(format!("{item:?}: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::ByIndex(priorities));
        }
        if mapped != items.len() {
            return Err(invalid("mixes indexed and flow=priority entries".into()));
        }

        let mut pairs = BTreeMap::new();
        for item in items {
            let (flow, prio) = item
                .split_once('=')
                .ok_or_else(|| invalid(format!("{item:?}: expected flow=priority")))?;
            let flow: FlowId = flow
                .trim()
                .parse()
                .map_err(|e| invalid(format!("flow {flow:?}: {e}")))?;
            let prio: i64 = prio
                .trim()
                .parse()
                .map_err(|e| invalid(format!("priority {prio:?}: {e}")))?;
            if pairs.insert(flow, Priority(prio)).is_some() {
                return Err(invalid(format!("flow {flow} assigned twice")));
            }
        }
        Ok(Self::ByFlow(pairs))
    }
}

// ---------------------------------------------------------------------------
// PriorityTable
// ---------------------------------------------------------------------------

/// Resolved priority assignment: a `flow_id → priority` function plus the
/// fixed order in which distinct priorities are scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    // ---
    by_flow: HashMap<FlowId, Priority>,

    /// Distinct priorities, most urgent first.
    order: Vec<Priority>,
}

// ---

impl PriorityTable {
    // ---
    /// Normalize either form. Fails if no flow is assigned a priority.
    pub fn new(spec: &PrioritySpec) -> Result<Self> {
        // ---
        let by_flow: HashMap<FlowId, Priority> = match spec {
            PrioritySpec::ByIndex(list) => list
                .iter()
                .enumerate()
                .map(|(flow, &prio)| (flow as FlowId, prio))
                .collect(),
            PrioritySpec::ByFlow(map) => map.iter().map(|(&f, &p)| (f, p)).collect(),
        };
        if by_flow.is_empty() {
            return Err(SpqError::EmptyPriorities);
        }

        let order = by_flow
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self { by_flow, order })
    }

    // ---

    /// Priority of `flow_id`, or [`SpqError::UnmappedFlow`].
    pub fn resolve(&self, flow_id: FlowId) -> Result<Priority> {
        self.by_flow
            .get(&flow_id)
            .copied()
            .ok_or(SpqError::UnmappedFlow { flow_id })
    }

    /// Scan order: every distinct configured priority, most urgent first.
    pub fn order(&self) -> &[Priority] {
        &self.order
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn index_form_resolves_by_position() {
        // ---
        let table = PriorityTable::new(&PrioritySpec::by_index([1, 100])).unwrap();

        assert_eq!(table.resolve(0).unwrap(), Priority::new(1));
        assert_eq!(table.resolve(1).unwrap(), Priority::new(100));
        assert_eq!(table.order(), &[Priority::new(1), Priority::new(100)]);
    }

    // ---

    #[test]
    fn both_forms_normalize_to_the_same_table() {
        // ---
        let indexed = PriorityTable::new(&PrioritySpec::by_index([10, 1, 10])).unwrap();
        let mapped =
            PriorityTable::new(&PrioritySpec::by_flow([(0, 10), (1, 1), (2, 10)])).unwrap();

        assert_eq!(indexed, mapped);
        assert_eq!(mapped.order(), &[Priority::new(1), Priority::new(10)]);
        assert_eq!(mapped.resolve(2).unwrap(), Priority::new(10));
    }

    // ---

    #[test]
    fn order_is_ascending_regardless_of_declaration_order() {
        // ---
        let table = PriorityTable::new(&PrioritySpec::by_flow([(7, 5), (3, -2), (9, 40)])).unwrap();
        let order: Vec<i64> = table.order().iter().map(|p| p.value()).collect();

        assert_eq!(order, vec![-2, 5, 40]);
        assert!(Priority::new(-2) < Priority::new(5));
    }

    // ---

    #[test]
    fn unmapped_flow_is_a_configuration_error() {
        // ---
        let table = PriorityTable::new(&PrioritySpec::by_flow([(0, 1)])).unwrap();
        let err = table.resolve(4).unwrap_err();

        assert_eq!(err, SpqError::UnmappedFlow { flow_id: 4 });
        assert!(err.is_configuration());
    }

    // ---

    #[test]
    fn empty_specs_are_rejected() {
        // ---
        let empty_list = PrioritySpec::ByIndex(Vec::new());
        let empty_map = PrioritySpec::ByFlow(BTreeMap::new());

        assert_eq!(PriorityTable::new(&empty_list), Err(SpqError::EmptyPriorities));
        assert_eq!(PriorityTable::new(&empty_map), Err(SpqError::EmptyPriorities));
    }

    // ---

    #[test]
    fn parses_both_textual_forms() {
        // ---
        assert_eq!(
            "1, 100".parse::<PrioritySpec>().unwrap(),
            PrioritySpec::by_index([1, 100])
        );
        assert_eq!(
            "0=1,1=10".parse::<PrioritySpec>().unwrap(),
            PrioritySpec::by_flow([(0, 1), (1, 10)])
        );
    }

    // ---

    #[test]
    fn rejects_malformed_text() {
        // ---
        for bad in ["1,0=2", "a,b", "0=x", "1=2,1=3"] {
            let err = bad.parse::<PrioritySpec>().unwrap_err();
            assert!(
                matches!(err, SpqError::InvalidPrioritySpec { .. }),
                "{bad:?} gave {err:?}"
            );
        }
        assert_eq!(" , ".parse::<PrioritySpec>(), Err(SpqError::EmptyPriorities));
    }
}
