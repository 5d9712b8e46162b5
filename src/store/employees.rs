use crate::model::employee::Employee;
use sqlx::MySqlPool;

/// Full registry feed. Read-only to this service; the index is rebuilt
/// from scratch on every load rather than patched incrementally.
pub async fn load_registry(pool: &MySqlPool) -> Result<Vec<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, employee_code, first_name, last_name, email, phone, department, branch
        FROM employees
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
}
