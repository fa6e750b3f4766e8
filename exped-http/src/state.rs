use std::sync::Arc;

use tracing::info;

use exped_core::FormService;
use exped_store::{Fixture, InMemoryRecordStore, PostgrestRecordStore, RecordStore, StoreError, CASE_ID_COLUMN};

use crate::config::{Config, StoreConfig};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FormService>,
}

impl AppState {
    pub fn new(service: FormService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let (store, id_column): (Arc<dyn RecordStore>, String) = match &config.store {
            StoreConfig::Memory { fixture } => {
                let store = InMemoryRecordStore::new();
                if let Some(path) = fixture {
                    info!("Seeding memory store from {}", path.display());
                    store.load(Fixture::from_path(path)?).await?;
                }
                (Arc::new(store) as Arc<dyn RecordStore>, CASE_ID_COLUMN.to_string())
            }
            StoreConfig::Postgrest(pg) => {
                info!("Using PostgREST store at {}", pg.url);
                (
                    Arc::new(PostgrestRecordStore::new(pg.clone())) as Arc<dyn RecordStore>,
                    pg.case_id_column.clone(),
                )
            }
        };

        Ok(Self::new(FormService::with_id_column(store, id_column)))
    }
}
