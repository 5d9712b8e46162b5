use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row of the employee registry feed. The sync core reads this table,
/// it never writes it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department": "Engineering",
        "branch": "Dhaka HQ"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    /// Primary identifier; what the terminal is supposed to be enrolled with.
    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    /// Contact number; some terminals end up enrolled with this instead.
    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "Dhaka HQ", nullable = true)]
    pub branch: Option<String>,
}
