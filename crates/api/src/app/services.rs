//! Backend wiring: ledger store + number allocator behind the orchestrator.
//!
//! The handlers only ever see [`AppServices`]; which backend sits behind it is
//! decided once at startup. With `DATABASE_URL` set the ledger lives in
//! Postgres, otherwise everything stays in memory (dev/test).

use std::sync::Arc;

use sqlx::PgPool;

use tradebook_infra::{
    AtomicNumberAllocator, FulfillmentOrchestrator, InMemoryLedgerStore, LedgerStore,
    NumberAllocator, PostgresLedgerStore, PostgresNumberAllocator,
};

/// Orchestrator over type-erased backends so handlers stay backend-agnostic.
pub type Orchestrator = FulfillmentOrchestrator<Arc<dyn LedgerStore>, Arc<dyn NumberAllocator>>;

pub struct AppServices {
    pub orchestrator: Orchestrator,
}

pub async fn build_services() -> AppServices {
    match std::env::var("DATABASE_URL") {
        Ok(url) => build_postgres_services(&url).await,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory ledger (documents are volatile)");
            build_in_memory_services()
        }
    }
}

pub fn build_in_memory_services() -> AppServices {
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let numbers: Arc<dyn NumberAllocator> = Arc::new(AtomicNumberAllocator::new());

    AppServices {
        orchestrator: FulfillmentOrchestrator::new(store, numbers),
    }
}

async fn build_postgres_services(database_url: &str) -> AppServices {
    let pool = PgPool::connect(database_url)
        .await
        .expect("failed to connect to Postgres");

    let store = PostgresLedgerStore::new(pool.clone());
    store
        .ensure_schema()
        .await
        .expect("failed to prepare ledger schema");

    let store: Arc<dyn LedgerStore> = Arc::new(store);
    let numbers: Arc<dyn NumberAllocator> = Arc::new(PostgresNumberAllocator::new(pool));

    AppServices {
        orchestrator: FulfillmentOrchestrator::new(store, numbers),
    }
}
