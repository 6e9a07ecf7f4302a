pub mod key;

use sea_orm::DatabaseConnection;

pub type Db = DatabaseConnection;

pub use key::{KeyStorage, sqlite::SqliteKeyStorage};
