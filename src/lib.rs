// Базовые модули
pub mod consts;
pub mod config;
pub mod error;
pub mod metrics;
pub mod lock;
pub mod util;

// Данные: таблица документов + правило сравнения полей
pub mod matcher;
pub mod table;

// Снапшоты: имена, хранилище, реестр, менеджер, retention, recovery
pub mod snapshots;

// Фоновый таймер снапшотов
pub mod scheduler;

// HTTP (tiny_http): document API + exporter
pub mod server;

// Сборка всего вместе
pub mod store;

// Удобные реэкспорты
pub use config::{CloudConfig, RetentionPolicy};
pub use error::StoreError;
pub use store::{Cloudbase, Phase};
pub use table::{DocumentTable, TableMap};
