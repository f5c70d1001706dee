use crate::{EntityDef, PivotDef, RelationDef};

pub const PIVOT_TABLE: &str = "posts_tags";

pub fn def() -> EntityDef {
    EntityDef::new("posts")
        .relation(RelationDef::belongs_to("author", "users").foreign_key("author_id"))
        .relation(RelationDef::has_one("news", "news").foreign_key("post_id"))
        .relation(RelationDef::has_many("comments", "comments").foreign_key("post_id"))
        .relation(
            RelationDef::belongs_to_many("tags", "tags").via(
                PivotDef::new(PIVOT_TABLE, "post_id", "tag_id")
                    .order_by("sort_order")
                    .id_column("id"),
            ),
        )
}
