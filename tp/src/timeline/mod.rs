//! TimelineMutator - structural edits on a plan's time slots
//!
//! Every operation is pure: it takes the current plan, works on a copy and
//! returns the new plan only if the copy still passes [`Plan::validate`].
//! A failed edit leaves the caller's plan untouched. Nothing here talks to
//! providers or touches pricing; callers reprice after a successful edit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Activity, ClockTime, Plan, PlanError};

/// Timeline edit failures
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("time slot {0} does not exist")]
    UnknownSlot(String),

    #[error("slot {slot} has no option {index} (it has {len})")]
    IndexOutOfRange { slot: String, index: usize, len: usize },

    #[error("slot {0} must keep at least one option")]
    LastOption(String),

    #[error("invalid time window {start}-{end}")]
    InvalidWindow { start: ClockTime, end: ClockTime },

    #[error("window {start}-{end} overlaps slot {other}")]
    Overlap {
        start: ClockTime,
        end: ClockTime,
        other: String,
    },

    #[error("source and destination are the same slot {0}")]
    SameSlot(String),

    #[error("stale edit: {0}")]
    Conflict(String),

    #[error(transparent)]
    Invalid(#[from] PlanError),
}

impl TimelineError {
    /// Edits that target something that no longer exists in its expected form
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UnknownSlot(_) | Self::Conflict(_))
    }
}

/// One timeline edit, as accepted at the service boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TimelineEdit {
    Reorder {
        from_slot_id: String,
        to_slot_id: String,
        activity_index: usize,
    },
    Remove {
        slot_id: String,
        activity_index: usize,
    },
    Retime {
        slot_id: String,
        start: ClockTime,
        end: ClockTime,
    },
    Select {
        slot_id: String,
        index: usize,
    },
    Replace {
        slot_id: String,
        index: usize,
        activity: Activity,
        /// Id the option at `index` must still have
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_id: Option<String>,
    },
}

impl TimelineEdit {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reorder { .. } => "reorder",
            Self::Remove { .. } => "remove",
            Self::Retime { .. } => "retime",
            Self::Select { .. } => "select",
            Self::Replace { .. } => "replace",
        }
    }

    /// Whether the edit can change which options count as chosen
    pub fn changes_selection(&self) -> bool {
        !matches!(self, Self::Retime { .. })
    }
}

/// Apply any edit
pub fn apply(plan: &Plan, edit: &TimelineEdit) -> Result<Plan, TimelineError> {
    debug!(op = edit.name(), "apply: called");
    match edit {
        TimelineEdit::Reorder {
            from_slot_id,
            to_slot_id,
            activity_index,
        } => reorder(plan, from_slot_id, to_slot_id, *activity_index),
        TimelineEdit::Remove { slot_id, activity_index } => remove(plan, slot_id, *activity_index),
        TimelineEdit::Retime { slot_id, start, end } => retime(plan, slot_id, *start, *end),
        TimelineEdit::Select { slot_id, index } => select_alternative(plan, slot_id, *index),
        TimelineEdit::Replace {
            slot_id,
            index,
            activity,
            expected_id,
        } => replace_activity(plan, slot_id, *index, activity.clone(), expected_id.as_deref()),
    }
}

fn position(plan: &Plan, slot_id: &str) -> Result<usize, TimelineError> {
    plan.time_slots
        .iter()
        .position(|s| s.id == slot_id)
        .ok_or_else(|| TimelineError::UnknownSlot(slot_id.to_string()))
}

fn check_index(plan: &Plan, pos: usize, index: usize) -> Result<(), TimelineError> {
    let slot = &plan.time_slots[pos];
    if index >= slot.options.len() {
        return Err(TimelineError::IndexOutOfRange {
            slot: slot.id.clone(),
            index,
            len: slot.options.len(),
        });
    }
    Ok(())
}

/// Keep `selected` pointing at the same option after `removed` is taken out
fn shift_selection(selected: Option<usize>, removed: usize) -> Option<usize> {
    match selected {
        Some(s) if s == removed => None,
        Some(s) if s > removed => Some(s - 1),
        other => other,
    }
}

fn commit(mut next: Plan) -> Result<Plan, TimelineError> {
    next.validate()?;
    next.revision += 1;
    Ok(next)
}

/// Move one option from a slot to the end of another slot's options
pub fn reorder(plan: &Plan, from_slot_id: &str, to_slot_id: &str, activity_index: usize) -> Result<Plan, TimelineError> {
    debug!(%from_slot_id, %to_slot_id, activity_index, "reorder: called");
    let from = position(plan, from_slot_id)?;
    let to = position(plan, to_slot_id)?;
    if from == to {
        return Err(TimelineError::SameSlot(from_slot_id.to_string()));
    }
    check_index(plan, from, activity_index)?;
    if plan.time_slots[from].options.len() == 1 {
        return Err(TimelineError::LastOption(from_slot_id.to_string()));
    }

    let mut next = plan.clone();
    let source = &mut next.time_slots[from];
    let moved = source.options.remove(activity_index);
    source.selected = shift_selection(source.selected, activity_index);
    next.time_slots[to].options.push(moved);
    commit(next)
}

/// Delete one option; the slot must keep at least one
pub fn remove(plan: &Plan, slot_id: &str, activity_index: usize) -> Result<Plan, TimelineError> {
    debug!(%slot_id, activity_index, "remove: called");
    let pos = position(plan, slot_id)?;
    check_index(plan, pos, activity_index)?;
    if plan.time_slots[pos].options.len() == 1 {
        return Err(TimelineError::LastOption(slot_id.to_string()));
    }

    let mut next = plan.clone();
    let slot = &mut next.time_slots[pos];
    slot.options.remove(activity_index);
    slot.selected = shift_selection(slot.selected, activity_index);
    commit(next)
}

/// Move a slot to a new window on the same day
pub fn retime(plan: &Plan, slot_id: &str, start: ClockTime, end: ClockTime) -> Result<Plan, TimelineError> {
    debug!(%slot_id, %start, %end, "retime: called");
    let pos = position(plan, slot_id)?;
    if start >= end {
        return Err(TimelineError::InvalidWindow { start, end });
    }
    let day = plan.time_slots[pos].day;
    if let Some(other) = plan
        .time_slots
        .iter()
        .find(|s| s.day == day && s.id != slot_id && s.overlaps(start, end))
    {
        return Err(TimelineError::Overlap {
            start,
            end,
            other: other.id.clone(),
        });
    }

    let mut next = plan.clone();
    let slot = &mut next.time_slots[pos];
    slot.start_time = start;
    slot.end_time = end;
    next.sort_slots();
    commit(next)
}

/// Choose which option of a slot counts as selected
pub fn select_alternative(plan: &Plan, slot_id: &str, index: usize) -> Result<Plan, TimelineError> {
    debug!(%slot_id, index, "select_alternative: called");
    let pos = position(plan, slot_id)?;
    check_index(plan, pos, index)?;

    let mut next = plan.clone();
    next.time_slots[pos].selected = Some(index);
    commit(next)
}

/// Substitute the option at `index` wholesale
///
/// When `expected_id` is given, the option currently at `index` must still
/// carry that id; otherwise someone edited the slot in between and the
/// replacement is refused as a conflict.
pub fn replace_activity(
    plan: &Plan,
    slot_id: &str,
    index: usize,
    activity: Activity,
    expected_id: Option<&str>,
) -> Result<Plan, TimelineError> {
    debug!(%slot_id, index, ?expected_id, "replace_activity: called");
    let pos = position(plan, slot_id)?;
    let slot = &plan.time_slots[pos];
    let current = slot.options.get(index).ok_or_else(|| {
        TimelineError::Conflict(format!(
            "slot {} no longer has option {} (it has {})",
            slot_id,
            index,
            slot.options.len()
        ))
    })?;
    if let Some(expected) = expected_id
        && current.id != expected
    {
        return Err(TimelineError::Conflict(format!(
            "option {} of slot {} is now {} instead of {}",
            index, slot_id, current.id, expected
        )));
    }

    let mut next = plan.clone();
    next.time_slots[pos].options[index] = activity;
    commit(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use crate::domain::plan::fixtures::{activity, sample_plan};
    use proptest::prelude::*;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_reorder_moves_between_slots() {
        let plan = sample_plan();
        let from = plan.time_slots[0].id.clone();
        let to = plan.time_slots[2].id.clone();
        let moved_id = plan.time_slots[0].options[1].id.clone();

        let next = reorder(&plan, &from, &to, 1).unwrap();
        assert_eq!(next.slot(&from).unwrap().options.len(), 2);
        assert_eq!(next.slot(&to).unwrap().options.len(), 4);
        assert_eq!(next.slot(&to).unwrap().options[3].id, moved_id);
        assert_eq!(next.slot(&to).unwrap().day, plan.slot(&to).unwrap().day);
        assert_eq!(next.revision, plan.revision + 1);
    }

    #[test]
    fn test_reorder_rejects_bad_targets() {
        let plan = sample_plan();
        let a = plan.time_slots[0].id.clone();
        let b = plan.time_slots[1].id.clone();
        assert!(matches!(reorder(&plan, "nope", &b, 0), Err(TimelineError::UnknownSlot(_))));
        assert!(matches!(reorder(&plan, &a, "nope", 0), Err(TimelineError::UnknownSlot(_))));
        assert!(matches!(
            reorder(&plan, &a, &b, 3),
            Err(TimelineError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
        assert!(matches!(reorder(&plan, &a, &a, 0), Err(TimelineError::SameSlot(_))));
    }

    #[test]
    fn test_remove_adjusts_selection() {
        let plan = sample_plan();
        let id = plan.time_slots[0].id.clone();

        let selected = select_alternative(&plan, &id, 2).unwrap();
        let next = remove(&selected, &id, 0).unwrap();
        assert_eq!(next.slot(&id).unwrap().selected, Some(1));

        let next = remove(&selected, &id, 2).unwrap();
        assert_eq!(next.slot(&id).unwrap().selected, None);
        assert_eq!(next.slot(&id).unwrap().chosen().unwrap().id, plan.time_slots[0].options[0].id);
    }

    #[test]
    fn test_remove_last_option_fails() {
        let plan = sample_plan();
        let id = plan.time_slots[0].id.clone();
        let plan = remove(&plan, &id, 0).unwrap();
        let plan = remove(&plan, &id, 0).unwrap();
        assert!(matches!(remove(&plan, &id, 0), Err(TimelineError::LastOption(_))));
        assert_eq!(plan.slot(&id).unwrap().options.len(), 1);
    }

    #[test]
    fn test_retime() {
        let plan = sample_plan();
        let id = plan.time_slots[0].id.clone();

        let next = retime(&plan, &id, t("08:00"), t("11:30")).unwrap();
        assert_eq!(next.slot(&id).unwrap().start_time, t("08:00"));
        assert_eq!(next.slot(&id).unwrap().id, id);

        assert!(matches!(
            retime(&plan, &id, t("11:00"), t("10:00")),
            Err(TimelineError::InvalidWindow { .. })
        ));
        assert!(matches!(
            retime(&plan, &id, t("11:00"), t("11:00")),
            Err(TimelineError::InvalidWindow { .. })
        ));
        assert!(matches!(
            retime(&plan, &id, t("09:00"), t("13:00")),
            Err(TimelineError::Overlap { .. })
        ));
    }

    #[test]
    fn test_retime_past_neighbour_reorders_day() {
        let plan = sample_plan();
        let morning = plan.time_slots[0].id.clone();
        let next = retime(&plan, &morning, t("15:00"), t("17:00")).unwrap();
        let day1: Vec<&str> = next.slots_on_day(1).map(|s| s.id.as_str()).collect();
        assert_eq!(day1, vec![plan.time_slots[1].id.as_str(), morning.as_str()]);
    }

    #[test]
    fn test_select_alternative() {
        let plan = sample_plan();
        let id = plan.time_slots[3].id.clone();
        let next = select_alternative(&plan, &id, 1).unwrap();
        assert_eq!(next.slot(&id).unwrap().selected, Some(1));

        let err = select_alternative(&next, &id, 9).unwrap_err();
        assert!(!err.is_conflict());
        assert_eq!(next.slot(&id).unwrap().selected, Some(1));
    }

    #[test]
    fn test_replace_activity_guards() {
        let plan = sample_plan();
        let id = plan.time_slots[0].id.clone();
        let original = plan.time_slots[0].options[1].id.clone();
        let new = activity("fresh", Category::Culture);

        let next = replace_activity(&plan, &id, 1, new.clone(), Some(&original)).unwrap();
        assert_eq!(next.slot(&id).unwrap().options[1], new);

        // Same guard again: option 1 is no longer the original
        let err = replace_activity(&next, &id, 1, new.clone(), Some(&original)).unwrap_err();
        assert!(err.is_conflict());

        let err = replace_activity(&plan, &id, 7, new.clone(), None).unwrap_err();
        assert!(err.is_conflict());
        let err = replace_activity(&plan, "gone", 0, new, None).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_apply_dispatch() {
        let plan = sample_plan();
        let edit = TimelineEdit::Select {
            slot_id: plan.time_slots[0].id.clone(),
            index: 2,
        };
        let next = apply(&plan, &edit).unwrap();
        assert_eq!(next.time_slots[0].selected, Some(2));
        assert!(edit.changes_selection());

        let json = serde_json::to_value(&edit).unwrap();
        assert_eq!(json["op"], "select");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Retime { slot: usize, start: u16, len: u16 },
        Remove { slot: usize, index: usize },
        Select { slot: usize, index: usize },
        Reorder { from: usize, to: usize, index: usize },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..6, 0u16..1440, 1u16..300).prop_map(|(slot, start, len)| Op::Retime { slot, start, len }),
            (0usize..6, 0usize..5).prop_map(|(slot, index)| Op::Remove { slot, index }),
            (0usize..6, 0usize..5).prop_map(|(slot, index)| Op::Select { slot, index }),
            (0usize..6, 0usize..6, 0usize..5).prop_map(|(from, to, index)| Op::Reorder { from, to, index }),
        ]
    }

    proptest! {
        #[test]
        fn prop_edits_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let mut plan = sample_plan();
            let ids: Vec<String> = plan.time_slots.iter().map(|s| s.id.clone()).collect();
            for op in ops {
                let result = match op {
                    Op::Retime { slot, start, len } => retime(
                        &plan,
                        &ids[slot],
                        ClockTime::from_minutes(start),
                        ClockTime::from_minutes(start.saturating_add(len)),
                    ),
                    Op::Remove { slot, index } => remove(&plan, &ids[slot], index),
                    Op::Select { slot, index } => select_alternative(&plan, &ids[slot], index),
                    Op::Reorder { from, to, index } => reorder(&plan, &ids[from], &ids[to], index),
                };
                match result {
                    Ok(next) => {
                        prop_assert!(next.validate().is_ok());
                        prop_assert_eq!(next.revision, plan.revision + 1);
                        plan = next;
                    }
                    Err(_) => prop_assert!(plan.validate().is_ok()),
                }
                for slot in &plan.time_slots {
                    prop_assert!(!slot.options.is_empty());
                }
                let total: usize = plan.time_slots.iter().map(|s| s.options.len()).sum();
                prop_assert!(total <= 18);
            }
        }
    }
}
