use crate::{EntityDef, RelationDef};

pub fn def() -> EntityDef {
    EntityDef::new("news")
        .relation(RelationDef::belongs_to("post", "posts").foreign_key("post_id"))
}
