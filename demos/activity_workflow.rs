//! Activity Workflow
//!
//! This example walks one volunteering activity through its lifecycle.
//!
//! Key concepts:
//! - Workflows declared as data (states, guarded transitions, effects)
//! - Manual transitions checked against conditions and permissions
//! - Field changes firing triggers that re-evaluate automatic transitions
//! - Cascades to related contributors in the same unit of work
//! - Previews and workflow documentation
//!
//! Run with: cargo run --example activity_workflow

use chrono::{Duration, Utc};
use lifecycle::builder::{MachineBuilder, RegistryBuilder, TransitionBuilder};
use lifecycle::core::{Actor, Condition, Entity, EntityRef, Lookup, Permission, State};
use lifecycle::effects::{NotificationEffect, RelatedTransitionEffect, Relation, TransitionEffect};
use lifecycle::notify::MemoryNotifier;
use lifecycle::registry::{MachineDefinition, Registry};
use lifecycle::runtime::{Engine, FsmError, MemoryStore};
use lifecycle::triggers::Trigger;
use lifecycle::Settings;
use std::sync::Arc;

fn end_passed() -> Condition {
    Condition::new("end date has passed", |activity, ctx| {
        activity
            .get_datetime("end")
            .is_some_and(|end| end < ctx.now())
    })
}

fn has_contributors() -> Condition {
    Condition::new("has contributors", |activity, ctx| {
        !ctx.related("contributor", "activity", activity.id()).is_empty()
    })
}

fn activity() -> Result<MachineDefinition, Box<dyn std::error::Error>> {
    let definition = MachineBuilder::new("activity")
        .state(State::new("draft", "Draft").initial())
        .state(State::new("open", "Open"))
        .state(State::new("succeeded", "Succeeded").terminal())
        .transition(
            TransitionBuilder::new("publish")
                .describe("Open the activity for contributors")
                .from("draft")
                .to("open")
                .when("has a title", |a, _| !a.is_blank("title"))
                .permission(Permission::owner("owner").or(Permission::staff())),
        )
        .transition(
            TransitionBuilder::new("succeed")
                .from("open")
                .to("succeeded")
                .automatic()
                .condition(end_passed())
                .condition(has_contributors())
                .effect(RelatedTransitionEffect::new(
                    Relation::children("contributor", "activity"),
                    "succeed",
                ))
                .effect(NotificationEffect::to_field("activity_succeeded", "owner")),
        )
        .trigger(Trigger::field("end").effect(TransitionEffect::new("succeed")))
        .build()?;
    Ok(definition)
}

fn contributor() -> Result<MachineDefinition, Box<dyn std::error::Error>> {
    let definition = MachineBuilder::new("contributor")
        .state(State::new("new", "New").initial())
        .state(State::new("succeeded", "Succeeded").terminal())
        .transition(
            TransitionBuilder::new("succeed")
                .from("new")
                .to("succeeded")
                .automatic()
                .effect(NotificationEffect::to_field("contributor_succeeded", "user")),
        )
        .build()?;
    Ok(definition)
}

fn registry() -> Result<Registry, Box<dyn std::error::Error>> {
    let registry = RegistryBuilder::new()
        .register(activity()?)
        .register(contributor()?)
        .build()?;
    Ok(registry)
}

fn status(store: &MemoryStore, entity: &EntityRef) -> String {
    store
        .get(entity)
        .and_then(|e| e.status().map(ToString::to_string))
        .unwrap_or_default()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Activity Workflow ===\n");

    let notifier = Arc::new(MemoryNotifier::new());
    let engine = Engine::new(registry()?, Settings::default()).with_notifier(notifier.clone());
    let mut store = MemoryStore::new();

    let owner = Actor::user(7);
    let stranger = Actor::user(8);
    let beach = EntityRef::new("activity", 1);

    engine.create(&mut store, Entity::new("activity", 1).with("owner", 7), Some(&owner))?;
    println!("Created {beach} in state '{}'", status(&store, &beach));

    println!("\nPublishing without a title:");
    match engine.apply(&mut store, &beach, "publish", Some(&owner)) {
        Err(FsmError::ConditionNotMet { condition, .. }) => {
            println!("  ✗ Rejected: condition not met: {condition}")
        }
        other => println!("  Unexpected: {other:?}"),
    }

    let titled = store
        .get(&beach)
        .ok_or("activity disappeared")?
        .with("title", "Beach cleanup");
    engine.save(&mut store, titled, Some(&owner))?;

    println!("\nPublishing as someone else:");
    if let Err(error) = engine.apply(&mut store, &beach, "publish", Some(&stranger)) {
        println!("  ✗ {error}");
    }

    println!("\nPublishing as the owner:");
    engine.apply(&mut store, &beach, "publish", Some(&owner))?;
    println!("  ✓ {beach} is now '{}'", status(&store, &beach));

    for id in 1..=2 {
        engine.create(
            &mut store,
            Entity::new("contributor", id).with("activity", 1).with("user", 100 + id),
            None,
        )?;
    }
    println!("  Two contributors joined");

    println!("\nPreview of 'succeed':");
    for planned in engine.preview(&store, &beach, "succeed")? {
        println!("  {}- {} ({})", "  ".repeat(planned.depth), planned.description, planned.entity);
    }

    println!("\nMoving the end date into the past:");
    let ended = store
        .get(&beach)
        .ok_or("activity disappeared")?
        .with("end", (Utc::now() - Duration::days(1)).to_rfc3339());
    let outcome = engine.save(&mut store, ended, Some(&owner))?;
    println!("  ✓ {beach} is now '{}'", status(&store, &beach));
    for entry in &outcome.audit {
        println!(
            "  [Audit] {} '{}': {} -> {}",
            entry.entity,
            entry.transition,
            entry.from.as_ref().map(ToString::to_string).unwrap_or_default(),
            entry.to
        );
    }

    println!("\nNotifications sent:");
    for template in notifier.templates() {
        println!("  {template}");
    }

    let report = engine.sweep(&mut store, "activity")?;
    println!(
        "\nSweep examined {} activities and applied {} transitions",
        report.examined,
        report.applied.len()
    );

    println!("\n=== Workflow documentation ===\n");
    if let Some(definition) = engine.registry().machine("activity") {
        println!("{}", definition.document().to_markdown());
    }

    Ok(())
}
