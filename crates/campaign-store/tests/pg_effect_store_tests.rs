//! Integration tests for `PgEffectStore`. Require `DATABASE_URL`.

use campaign_core::error::DomainError;
use campaign_core::model::{AppliedEffectInstance, PoolWrite, SourceKind};
use campaign_core::repository::{EffectStore, TurnScope};
use campaign_store::PgEffectStore;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

async fn seed_character(pool: &PgPool) -> Uuid {
    let character_id = Uuid::new_v4();
    sqlx::query("INSERT INTO characters (id, name) VALUES ($1, 'Aria')")
        .bind(character_id)
        .execute(pool)
        .await
        .unwrap();
    character_id
}

async fn seed_effect(pool: &PgPool, deleted: bool) -> Uuid {
    let effect_id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO effects (id, name, damage_type, stacking_policy, base_duration_turns, deleted_at)
        VALUES ($1, 'Burn', 'MAGIC', 'STACK', 3, $2)
        ",
    )
    .bind(effect_id)
    .bind(deleted.then(Utc::now))
    .execute(pool)
    .await
    .unwrap();
    effect_id
}

async fn seed_pool(pool: &PgPool, character_id: Uuid, name: &str) -> Uuid {
    let pool_id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO resource_pools (id, character_id, name, current_value, max_value, bonus_value)
        VALUES ($1, $2, $3, 10, 20, 0)
        ",
    )
    .bind(pool_id)
    .bind(character_id)
    .bind(name)
    .execute(pool)
    .await
    .unwrap();
    pool_id
}

fn instance(character_id: Uuid, effect_id: Uuid, duration: i32) -> AppliedEffectInstance {
    AppliedEffectInstance {
        id: Uuid::new_v4(),
        character_id,
        effect_id,
        source_kind: SourceKind::Skill,
        source_id: None,
        duration_remaining: duration,
        started_at_turn: 1,
        expires_at_turn: 1 + duration,
        stacks: 1,
        cached_magnitude: 2.0,
        deleted_at: None,
    }
}

// --- catalog ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_load_effect_returns_modifiers_in_position_order(pool: PgPool) {
    let effect_id = seed_effect(&pool, false).await;
    for (position, name) in [(1, "MP"), (0, "HP")] {
        sqlx::query(
            r"
            INSERT INTO effect_modifiers (id, effect_id, component_kind, component_name, operation, position)
            VALUES ($1, $2, 'RESOURCE_POOL', $3, 'ADD', $4)
            ",
        )
        .bind(Uuid::new_v4())
        .bind(effect_id)
        .bind(name)
        .bind(position)
        .execute(&pool)
        .await
        .unwrap();
    }
    let store = PgEffectStore::new(pool);

    let mut tx = store.begin().await.unwrap();
    let effect = tx.load_effect(effect_id).await.unwrap().unwrap();

    assert_eq!(effect.base_duration_turns, 3);
    let names: Vec<_> = effect.modifiers.iter().map(|m| m.component_name.as_str()).collect();
    assert_eq!(names, ["HP", "MP"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_load_effect_skips_soft_deleted(pool: PgPool) {
    let effect_id = seed_effect(&pool, true).await;
    let store = PgEffectStore::new(pool);

    let mut tx = store.begin().await.unwrap();

    assert!(tx.load_effect(effect_id).await.unwrap().is_none());
}

// --- pools and attributes ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_write_pool_updates_only_given_fields(pool: PgPool) {
    let character_id = seed_character(&pool).await;
    let pool_id = seed_pool(&pool, character_id, "HP").await;
    let store = PgEffectStore::new(pool);

    let mut tx = store.begin().await.unwrap();
    tx.write_pool(&PoolWrite {
        pool_id,
        current: Some(-3.0),
        max: None,
        bonus: Some(4.0),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let pools = tx.load_pools(character_id).await.unwrap();
    assert_eq!(pools.len(), 1);
    assert!((pools[0].current + 3.0).abs() < f64::EPSILON);
    assert!((pools[0].max - 20.0).abs() < f64::EPSILON);
    assert!((pools[0].bonus - 4.0).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_add_equipment_delta_upserts_and_accumulates(pool: PgPool) {
    let character_id = seed_character(&pool).await;
    let attribute_id = Uuid::new_v4();
    sqlx::query("INSERT INTO attributes (id, name) VALUES ($1, 'Strength')")
        .bind(attribute_id)
        .execute(&pool)
        .await
        .unwrap();
    let store = PgEffectStore::new(pool);

    let mut tx = store.begin().await.unwrap();
    tx.add_equipment_delta(character_id, attribute_id, 2).await.unwrap();
    tx.add_equipment_delta(character_id, attribute_id, 3).await.unwrap();
    let rows = tx.load_character_attributes(character_id).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].equipment_delta, 5);
    assert_eq!(rows[0].total(), 5);
}

// --- applied effects ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_second_live_instance_is_a_concurrency_conflict(pool: PgPool) {
    let character_id = seed_character(&pool).await;
    let effect_id = seed_effect(&pool, false).await;
    let store = PgEffectStore::new(pool);

    let mut tx = store.begin().await.unwrap();
    tx.insert_instance(&instance(character_id, effect_id, 3))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .insert_instance(&instance(character_id, effect_id, 3))
        .await;

    match result.unwrap_err() {
        DomainError::ConcurrencyConflict {
            character_id: id,
            source_kind,
            ..
        } => {
            assert_eq!(id, character_id);
            assert_eq!(source_kind, SourceKind::Skill);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_dropped_transaction_rolls_back(pool: PgPool) {
    let character_id = seed_character(&pool).await;
    let effect_id = seed_effect(&pool, false).await;
    let store = PgEffectStore::new(pool);

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_instance(&instance(character_id, effect_id, 3))
            .await
            .unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    assert!(tx.list_live_instances(character_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_active_instance_respects_window(pool: PgPool) {
    let character_id = seed_character(&pool).await;
    let effect_id = seed_effect(&pool, false).await;
    let store = PgEffectStore::new(pool);
    let live = instance(character_id, effect_id, 3);

    let mut tx = store.begin().await.unwrap();
    tx.insert_instance(&live).await.unwrap();
    let covered = tx
        .find_active_instance(character_id, effect_id, SourceKind::Skill, 4)
        .await
        .unwrap();
    let stale = tx
        .find_active_instance(character_id, effect_id, SourceKind::Skill, 5)
        .await
        .unwrap();
    let retired = tx
        .retire_stale_instances(character_id, effect_id, SourceKind::Skill, 5, Utc::now())
        .await
        .unwrap();

    assert_eq!(covered.map(|i| i.id), Some(live.id));
    assert!(stale.is_none());
    assert_eq!(retired, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_turn_advance_counts_updates_and_retirements(pool: PgPool) {
    let character_id = seed_character(&pool).await;
    let store = PgEffectStore::new(pool.clone());

    let mut tx = store.begin().await.unwrap();
    for duration in [1, 2, 0] {
        let effect_id = seed_effect(&pool, false).await;
        tx.insert_instance(&instance(character_id, effect_id, duration))
            .await
            .unwrap();
    }
    let updated = tx
        .decrement_durations(TurnScope::Character(character_id))
        .await
        .unwrap();
    let retired = tx
        .retire_exhausted(TurnScope::All, Utc::now())
        .await
        .unwrap();
    let live = tx.list_live_instances(character_id).await.unwrap();

    assert_eq!(updated, 2);
    assert_eq!(retired, 2);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].duration_remaining, 1);
}
