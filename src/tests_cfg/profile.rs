use crate::EntityDef;

pub fn def() -> EntityDef {
    EntityDef::new("profiles").unique(["user_id"])
}
