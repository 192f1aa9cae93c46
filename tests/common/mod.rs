//! Shared workflow fixtures: activities with contributors and an organizer.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use lifecycle::builder::{MachineBuilder, RegistryBuilder, TransitionBuilder};
use lifecycle::core::{Condition, Context, Entity, EntityRef, Permission, State};
use lifecycle::effects::{
    EffectError, HookEffect, NotificationEffect, RelatedTransitionEffect, Relation, SetField,
    TransitionEffect,
};
use lifecycle::notify::MemoryNotifier;
use lifecycle::registry::{MachineDefinition, Registry};
use lifecycle::runtime::{Engine, MemoryStore};
use lifecycle::triggers::Trigger;
use lifecycle::Settings;
use serde_json::json;
use std::sync::Arc;

pub const OWNER: u64 = 7;
pub const STAFF: u64 = 1;

fn end_passed() -> Condition {
    Condition::new("end date has passed", |activity, ctx| {
        activity
            .get_datetime("end")
            .is_some_and(|end| end < ctx.now())
    })
}

fn accepted_contributors(activity: &Entity, ctx: &Context<'_>) -> usize {
    ctx.related("contributor", "activity", activity.id())
        .iter()
        .filter(|c| c.status().is_some_and(|s| s.as_str() == "accepted"))
        .count()
}

fn has_accepted_contributors() -> Condition {
    Condition::new("has accepted contributors", |activity, ctx| {
        accepted_contributors(activity, ctx) > 0
    })
}

pub fn activity() -> MachineDefinition {
    MachineBuilder::new("activity")
        .state(State::new("draft", "Draft").initial().describe("Being written by its owner"))
        .state(State::new("submitted", "Submitted").describe("Waiting for review"))
        .state(State::new("open", "Open").describe("Accepting contributors"))
        .state(State::new("succeeded", "Succeeded").terminal())
        .state(State::new("rejected", "Rejected").terminal())
        .state(State::new("expired", "Expired").terminal())
        .transition(
            TransitionBuilder::new("submit")
                .describe("Send the activity for review")
                .from("draft")
                .to("submitted")
                .when("has a title", |a, _| !a.is_blank("title"))
                .when("has a description", |a, _| !a.is_blank("description"))
                .permission(Permission::owner("owner")),
        )
        .transition(
            TransitionBuilder::new("approve")
                .from("submitted")
                .to("open")
                .permission(Permission::staff())
                .effect(
                    HookEffect::new("record_reviewer", "Record who approved the activity")
                        .pre_save(|activity, ctx| {
                            if let Some(actor) = ctx.actor() {
                                activity.set("reviewer", actor.id);
                            }
                            Ok(())
                        }),
                )
                .effect(NotificationEffect::to_field("activity_approved", "owner")),
        )
        .transition(
            TransitionBuilder::new("reject")
                .from("submitted")
                .to("rejected")
                .permission(Permission::staff())
                .effect(
                    RelatedTransitionEffect::new(Relation::children("organizer", "activity"), "fail")
                        .required(),
                )
                .effect(NotificationEffect::to_field("activity_rejected", "owner")),
        )
        .transition(
            TransitionBuilder::new("succeed")
                .from("open")
                .to("succeeded")
                .automatic()
                .condition(end_passed())
                .condition(has_accepted_contributors())
                .effect(RelatedTransitionEffect::new(
                    Relation::children("contributor", "activity"),
                    "succeed",
                ))
                .effect(
                    NotificationEffect::to_field("activity_succeeded", "owner").with_context(
                        |activity| json!({ "title": activity.get_str("title") }),
                    ),
                ),
        )
        .transition(
            TransitionBuilder::new("expire")
                .from("open")
                .to("expired")
                .automatic()
                .condition(end_passed())
                .condition(has_accepted_contributors().negate())
                .effect(NotificationEffect::to_field("activity_expired", "owner")),
        )
        .transition(
            TransitionBuilder::new("close")
                .describe("End an open-ended activity early")
                .from("open")
                .to("succeeded")
                .condition(has_accepted_contributors())
                .when("has no end date", |a, _| a.is_blank("end"))
                .permission(Permission::owner("owner").or(Permission::staff()))
                .effect(RelatedTransitionEffect::new(
                    Relation::children("contributor", "activity"),
                    "succeed",
                )),
        )
        .trigger(
            Trigger::field("end")
                .effect(TransitionEffect::new("succeed"))
                .effect(TransitionEffect::new("expire")),
        )
        .build()
        .unwrap()
}

/// States and transitions shared by every kind of contribution.
pub fn contribution() -> MachineDefinition {
    MachineBuilder::new("contribution")
        .state(State::new("new", "New").initial())
        .state(State::new("succeeded", "Succeeded").terminal())
        .state(State::new("failed", "Failed").terminal())
        .transition(
            TransitionBuilder::new("succeed")
                .from("new")
                .to("succeeded")
                .automatic(),
        )
        .transition(
            TransitionBuilder::new("fail")
                .from("new")
                .from("succeeded")
                .to("failed")
                .automatic(),
        )
        .build()
        .unwrap()
}

pub fn contributor() -> MachineDefinition {
    MachineBuilder::new("contributor")
        .extend(&contribution())
        .state(State::new("accepted", "Accepted"))
        .transition(
            TransitionBuilder::new("accept")
                .from("new")
                .to("accepted")
                .permission(Permission::staff())
                .effect(NotificationEffect::to_field("contributor_accepted", "user")),
        )
        .override_transition(
            TransitionBuilder::new("succeed")
                .from("accepted")
                .to("succeeded")
                .automatic()
                .effect(NotificationEffect::to_field("contributor_succeeded", "user")),
        )
        .trigger(Trigger::created().effect(SetField::computed(
            "joined",
            "Record the join time",
            |_, ctx| json!(ctx.now().to_rfc3339()),
        )))
        .build()
        .unwrap()
}

/// The organizer's own contribution. Its `fail` refuses to run on
/// organizers flagged with `payout_locked`.
pub fn organizer() -> MachineDefinition {
    MachineBuilder::new("organizer")
        .extend(&contribution())
        .override_transition(
            TransitionBuilder::new("fail")
                .from("new")
                .from("succeeded")
                .to("failed")
                .automatic()
                .effect(
                    HookEffect::new("release_payout", "Release the organizer payout").pre_save(
                        |organizer, _| {
                            if organizer.get_bool("payout_locked") == Some(true) {
                                return Err(EffectError::Failed("payout is locked".to_string()));
                            }
                            organizer.set("payout_released", true);
                            Ok(())
                        },
                    ),
                ),
        )
        .build()
        .unwrap()
}

pub fn registry() -> Registry {
    RegistryBuilder::new()
        .register(activity())
        .register(contributor())
        .register(organizer())
        .build()
        .unwrap()
}

pub fn engine() -> (Engine, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let engine = Engine::new(registry(), Settings::default()).with_notifier(notifier.clone());
    (engine, notifier)
}

pub fn activity_ref(id: u64) -> EntityRef {
    EntityRef::new("activity", id)
}

pub fn draft(id: u64) -> Entity {
    Entity::new("activity", id)
        .with("owner", OWNER)
        .with("title", "Beach cleanup")
        .with("description", "Bring gloves")
}

pub fn yesterday() -> String {
    (Utc::now() - Duration::days(1)).to_rfc3339()
}

pub fn next_week() -> String {
    (Utc::now() + Duration::days(7)).to_rfc3339()
}

/// Store with one activity in `status` and the given contributor states.
pub fn seeded(status: &str, contributors: &[&str]) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert(draft(1).with_status(status));
    for (index, state) in contributors.iter().enumerate() {
        let id = index as u64 + 1;
        store.insert(
            Entity::new("contributor", id)
                .with("activity", 1)
                .with("user", 100 + id)
                .with_status(*state),
        );
    }
    store
}
