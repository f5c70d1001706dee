mod sea_orm;

pub use self::sea_orm::*;
