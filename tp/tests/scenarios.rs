//! End-to-end scenarios through the trip service
//!
//! Everything runs offline: rule-based intent parsing, the template gateway
//! and an in-memory store.

use chrono::NaiveDate;
use tempfile::TempDir;
use tripplanner::config::Config;
use tripplanner::domain::{Activity, Category, Permission, SlotPatch, SuggestionStatus};
use tripplanner::error::PlannerError;
use tripplanner::service::TripService;
use tripplanner::sharing::{Access, NewSuggestion, ReviewAction};
use tripplanner::timeline::TimelineEdit;

fn service() -> TripService {
    TripService::in_memory(Config::default()).expect("Failed to build service")
}

fn berlin() -> SlotPatch {
    SlotPatch {
        origin: Some("Istanbul".into()),
        destination: Some("Berlin".into()),
        start_date: NaiveDate::from_ymd_opt(2025, 11, 20),
        end_date: NaiveDate::from_ymd_opt(2025, 11, 23),
        adults: Some(2),
        ..Default::default()
    }
}

fn replacement(id: &str) -> Activity {
    Activity {
        id: id.to_string(),
        title: format!("Suggested {id}"),
        description: "A friend's pick".into(),
        duration: None,
        price: Some(12.0),
        location: None,
        rating: None,
        category: Some(Category::Culture),
        booking_url: None,
    }
}

fn suggestion(slot: &str, index: usize, id: &str) -> NewSuggestion {
    NewSuggestion {
        day: 2,
        time_slot_id: slot.to_string(),
        activity_index: index,
        original_activity: None,
        suggested_activity: replacement(id),
        reason: None,
        suggested_by_id: "friend".into(),
        suggested_by_name: "Sam".into(),
    }
}

// =============================================================================
// Conversation
// =============================================================================

#[tokio::test]
async fn test_origin_and_destination_only_asks_for_dates() {
    let service = service();
    let outcome = service.start_conversation("From Istanbul to Berlin").await.unwrap();

    assert!(outcome.needs_more_info);
    assert!(outcome.plan.is_none());
    assert!(!outcome.complete);
    assert!(outcome.assistant_text.to_lowercase().contains("dates"));
}

#[tokio::test]
async fn test_full_details_in_one_message_yield_plan() {
    let service = service();
    let outcome = service
        .start_conversation("From Istanbul to Berlin, 2025-11-20 to 2025-11-23, 2 adults")
        .await
        .unwrap();

    assert!(outcome.complete);
    assert!(!outcome.needs_more_info);
    let plan = outcome.plan.expect("plan");
    assert_eq!(plan.total_days, 3);
    assert_eq!(plan.destination, "Berlin");
    plan.validate().unwrap();
    assert!(plan.time_slots.iter().all(|s| (1..=3).contains(&s.day)));
}

#[tokio::test]
async fn test_revision_through_conversation_keeps_invariants() {
    let service = service();
    let first = service
        .start_conversation("From Istanbul to Berlin, 2025-11-20 to 2025-11-23, 2 adults")
        .await
        .unwrap();
    let before = first.plan.unwrap();

    let kept = service
        .continue_conversation(&first.session_id, "no changes please")
        .await
        .unwrap();
    let kept_plan = kept.plan.unwrap();
    kept_plan.validate().unwrap();
    assert_eq!(kept_plan.revision, before.revision);

    let relaxed = service
        .continue_conversation(&first.session_id, "make day 2 more relaxed")
        .await
        .unwrap();
    let relaxed_plan = relaxed.plan.unwrap();
    relaxed_plan.validate().unwrap();
    assert!(relaxed_plan.slots_on_day(2).count() < before.slots_on_day(2).count());
}

// =============================================================================
// Timeline
// =============================================================================

#[tokio::test]
async fn test_reorder_moves_one_option() {
    let service = service();
    let outcome = service.plan_direct(berlin()).await.unwrap();
    let plan = outcome.plan.unwrap();
    let from = plan.time_slots[0].clone();
    let to = plan.time_slots[1].clone();

    let next = service
        .edit(
            &outcome.session_id,
            &TimelineEdit::Reorder {
                from_slot_id: from.id.clone(),
                to_slot_id: to.id.clone(),
                activity_index: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(next.slot(&from.id).unwrap().options.len(), from.options.len() - 1);
    assert_eq!(next.slot(&to.id).unwrap().options.len(), to.options.len() + 1);
    next.validate().unwrap();
}

#[tokio::test]
async fn test_failed_select_leaves_plan_untouched() {
    let service = service();
    let outcome = service.plan_direct(berlin()).await.unwrap();
    let plan = outcome.plan.unwrap();
    let slot = &plan.time_slots[0];

    let err = service
        .edit(
            &outcome.session_id,
            &TimelineEdit::Select {
                slot_id: slot.id.clone(),
                index: slot.options.len(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::Validation(_)));
    assert_eq!(service.plan(&outcome.session_id).await.unwrap(), plan);
}

// =============================================================================
// Sharing
// =============================================================================

#[tokio::test]
async fn test_view_link_cannot_suggest() {
    let service = service();
    let outcome = service.plan_direct(berlin()).await.unwrap();
    let plan = outcome.plan.unwrap();
    let share = service
        .create_share(&outcome.session_id, "owner", "Olivia", Permission::View, false, None)
        .await
        .unwrap();

    let err = service
        .create_suggestion(&share.token, suggestion(&plan.time_slots[0].id, 0, "museum"))
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::Permission(_)));
}

#[tokio::test]
async fn test_second_stale_acceptance_conflicts() {
    let service = service();
    let outcome = service.plan_direct(berlin()).await.unwrap();
    let plan = outcome.plan.unwrap();
    let slot = plan.slots_on_day(2).next().unwrap().id.clone();
    let share = service
        .create_share(&outcome.session_id, "owner", "Olivia", Permission::Suggest, false, Some(7))
        .await
        .unwrap();

    let first = service
        .create_suggestion(&share.token, suggestion(&slot, 0, "first"))
        .await
        .unwrap();
    let second = service
        .create_suggestion(&share.token, suggestion(&slot, 0, "second"))
        .await
        .unwrap();

    let owner = Access::Owner("owner".into());
    service
        .review_suggestion(&owner, &first.id, ReviewAction::Accept, None)
        .await
        .unwrap();
    let err = service
        .review_suggestion(&owner, &second.id, ReviewAction::Accept, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::Conflict(_)));

    let pending = service
        .list_suggestions(&outcome.session_id, Some(SuggestionStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.suggestions.len(), 1);
    assert_eq!(pending.suggestions[0].id, second.id);

    // The snapshot behind the link did not move
    let view = service.read_share(&share.token).await.unwrap();
    assert_eq!(view.plan.slot(&slot).unwrap().options[0], plan.slot(&slot).unwrap().options[0]);
    assert_eq!(view.suggestions.len(), 2);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.storage.path = temp_dir.path().join("store").to_string_lossy().into_owned();

    let session_id = {
        let service = TripService::open(config.clone()).unwrap();
        let outcome = service.plan_direct(berlin()).await.unwrap();
        service
            .create_share(&outcome.session_id, "owner", "Olivia", Permission::Edit, true, None)
            .await
            .unwrap();
        outcome.session_id
    };

    let service = TripService::open(config).unwrap();
    let plan = service.plan(&session_id).await.unwrap();
    assert_eq!(plan.total_days, 3);
    assert_eq!(service.list_shares(&session_id).await.unwrap().len(), 1);
}
