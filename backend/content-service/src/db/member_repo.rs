use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberRow {
    pub phone: String,
    pub first_name: String,
    pub alias: Option<String>,
    pub role: String,
    pub is_admin: bool,
}

impl MemberRow {
    /// The alias when one is set, otherwise the first name.
    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .unwrap_or(&self.first_name)
    }
}

pub async fn find_by_phone(pool: &PgPool, phone: &str) -> Result<Option<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        "SELECT phone, first_name, alias, role, is_admin FROM members WHERE phone = $1",
    )
    .bind(phone)
    .fetch_optional(pool)
    .await
}
