use crate::EntityDef;

pub fn def() -> EntityDef {
    EntityDef::new("tags").unique(["slug"])
}
