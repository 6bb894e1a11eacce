/// One embedded SQL migration
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// Oldest first; ids are never reused or reordered
pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_initial_schema",
    sql: include_str!("../../migrations/001_initial_schema.sql"),
}];
