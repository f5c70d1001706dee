use crate::{EntityDef, RelationDef};

pub fn def() -> EntityDef {
    EntityDef::new("users")
        .relation(RelationDef::has_one("profile", "profiles").foreign_key("user_id"))
        .relation(RelationDef::has_many("posts", "posts").foreign_key("author_id"))
}
