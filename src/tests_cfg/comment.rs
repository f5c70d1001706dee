use crate::{EntityDef, RelationDef};

pub fn def() -> EntityDef {
    EntityDef::new("comments")
        .relation(RelationDef::belongs_to("author", "users").foreign_key("user_id"))
}
