//! Context assembly: the prior-step outputs a generation call may see.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use stepgen_store::{OutputStore, StepId};

/// One prior step's recorded output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub step: StepId,
    pub text: String,
}

/// Everything a generation call is allowed to see about earlier steps.
///
/// Entries are strictly before the target step and in ascending step order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextBundle {
    problem_description: Option<String>,
    entries: Vec<ContextEntry>,
}

impl ContextBundle {
    pub fn problem_description(&self) -> Option<&str> {
        self.problem_description.as_deref()
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn steps(&self) -> Vec<StepId> {
        self.entries.iter().map(|e| e.step).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.problem_description.is_none() && self.entries.is_empty()
    }
}

/// Build the context bundle for `target`.
///
/// Outputs for `target` or any later step are dropped. If the same step
/// appears twice the last text wins. A blank problem description is treated
/// as absent.
pub fn assemble<I>(target: StepId, available: I, problem_description: Option<&str>) -> ContextBundle
where
    I: IntoIterator<Item = (StepId, String)>,
{
    let mut ordered = BTreeMap::new();
    for (step, text) in available {
        if step < target {
            ordered.insert(step, text);
        } else {
            debug!(%step, %target, "ignoring output that is not before the target step");
        }
    }

    ContextBundle {
        problem_description: problem_description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        entries: ordered
            .into_iter()
            .map(|(step, text)| ContextEntry { step, text })
            .collect(),
    }
}

/// Load every recorded output strictly before `target`.
///
/// Missing outputs are omitted. Read failures are logged and treated as
/// missing so a damaged earlier output never blocks a later step.
pub fn collect_prior_outputs(store: &dyn OutputStore, target: StepId) -> Vec<(StepId, String)> {
    target
        .predecessors()
        .filter_map(|step| match store.load_output(step) {
            Ok(Some(text)) => Some((step, text)),
            Ok(None) => None,
            Err(e) => {
                warn!(%step, error = %e, "could not read prior output; omitting from context");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: u32) -> StepId {
        StepId::new(n).unwrap()
    }

    #[test]
    fn drops_target_and_later_steps() {
        let outputs = vec![
            (step(4), "four".to_string()),
            (step(1), "one".to_string()),
            (step(3), "three".to_string()),
            (step(2), "two".to_string()),
        ];
        let bundle = assemble(step(3), outputs, None);
        assert_eq!(bundle.steps(), vec![step(1), step(2)]);
        assert_eq!(bundle.entries()[0].text, "one");
    }

    #[test]
    fn first_step_has_no_context_entries() {
        let bundle = assemble(step(1), vec![(step(1), "self".to_string())], Some("todo app"));
        assert!(bundle.entries().is_empty());
        assert_eq!(bundle.problem_description(), Some("todo app"));
    }

    #[test]
    fn gaps_are_silently_omitted() {
        let bundle = assemble(step(5), vec![(step(1), "a".into()), (step(3), "c".into())], None);
        assert_eq!(bundle.steps(), vec![step(1), step(3)]);
    }

    #[test]
    fn blank_problem_description_is_absent() {
        let bundle = assemble(step(2), Vec::new(), Some("   \n"));
        assert!(bundle.problem_description().is_none());
        assert!(bundle.is_empty());
    }

    #[test]
    fn never_includes_target_or_later_for_any_target() {
        let all: Vec<(StepId, String)> = (1..=8).map(|n| (step(n), format!("out{n}"))).collect();
        for t in 1..=8 {
            let bundle = assemble(step(t), all.clone(), None);
            assert!(bundle.steps().iter().all(|s| *s < step(t)));
            assert_eq!(bundle.entries().len(), (t - 1) as usize);
        }
    }
}
