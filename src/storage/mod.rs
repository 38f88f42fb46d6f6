pub mod key;

use sea_orm::DatabaseConnection;

pub type Db = DatabaseConnection;

// 重导出常用类型
pub use key::{KeyStorage, SqliteKeyStorage};
