use crate::model::employee::Employee;
use std::collections::HashMap;

/// Canonical form for identifier comparison. Devices report ids as
/// numbers or strings interchangeably; the registry stores codes and
/// contact numbers with inconsistent padding and case. Everything is
/// compared in this form, nowhere else.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        // Zero-padded numeric ids ("007") and their plain form ("7") are
        // the same identifier.
        let stripped = trimmed.trim_start_matches('0');
        if stripped.is_empty() { "0".to_string() } else { stripped.to_string() }
    } else {
        trimmed.to_lowercase()
    }
}

/// Immutable multi-key snapshot over one registry load. Rebuilt wholesale
/// whenever a fresh listing is supplied and swapped in; never mutated, so
/// the scan fallbacks need no locking.
pub struct EmployeeIndex {
    employees: Vec<Employee>,
    by_code: HashMap<String, usize>,
    by_contact: HashMap<String, usize>,
    by_email: HashMap<String, usize>,
}

impl EmployeeIndex {
    pub fn build(employees: Vec<Employee>) -> Self {
        let mut by_code = HashMap::with_capacity(employees.len());
        let mut by_contact = HashMap::with_capacity(employees.len());
        let mut by_email = HashMap::with_capacity(employees.len());

        for (i, emp) in employees.iter().enumerate() {
            // First writer wins so duplicate registry rows cannot flip an
            // already-indexed identifier.
            by_code.entry(normalize_key(&emp.employee_code)).or_insert(i);
            if let Some(phone) = &emp.phone {
                if !phone.trim().is_empty() {
                    by_contact.entry(normalize_key(phone)).or_insert(i);
                }
            }
            if !emp.email.trim().is_empty() {
                by_email.entry(normalize_key(&emp.email)).or_insert(i);
            }
        }

        Self {
            employees,
            by_code,
            by_contact,
            by_email,
        }
    }

    /// Lookup by primary identifier. `key` must already be normalized.
    pub fn by_code(&self, key: &str) -> Option<&Employee> {
        self.by_code.get(key).map(|&i| &self.employees[i])
    }

    /// Lookup by contact number. `key` must already be normalized.
    pub fn by_contact(&self, key: &str) -> Option<&Employee> {
        self.by_contact.get(key).map(|&i| &self.employees[i])
    }

    /// Lookup by email. `key` must already be normalized.
    pub fn by_email(&self, key: &str) -> Option<&Employee> {
        self.by_email.get(key).map(|&i| &self.employees[i])
    }

    /// Full employee slice for the linear-scan fallback strategies.
    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{EmployeeIndex, normalize_key};
    use crate::model::employee::Employee;

    pub(crate) fn employee(id: u64, code: &str, phone: Option<&str>, email: &str) -> Employee {
        Employee {
            id,
            employee_code: code.to_string(),
            first_name: format!("First{id}"),
            last_name: format!("Last{id}"),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            department: None,
            branch: None,
        }
    }

    #[test]
    fn normalize_strips_numeric_padding_and_case() {
        assert_eq!(normalize_key("007"), "7");
        assert_eq!(normalize_key(" 7 "), "7");
        assert_eq!(normalize_key("000"), "0");
        assert_eq!(normalize_key("EMP-007"), "emp-007");
        assert_eq!(normalize_key("John.Doe@Company.com"), "john.doe@company.com");
    }

    #[test]
    fn index_resolves_all_three_key_spaces() {
        let idx = EmployeeIndex::build(vec![
            employee(1, "7", Some("+880171000001"), "a@x.com"),
            employee(2, "EMP-008", None, "b@x.com"),
        ]);
        assert_eq!(idx.by_code("7").map(|e| e.id), Some(1));
        assert_eq!(idx.by_code("emp-008").map(|e| e.id), Some(2));
        assert_eq!(idx.by_contact("+880171000001").map(|e| e.id), Some(1));
        assert_eq!(idx.by_email("b@x.com").map(|e| e.id), Some(2));
        assert!(idx.by_code("9").is_none());
    }

    #[test]
    fn duplicate_keys_keep_the_first_row() {
        let idx = EmployeeIndex::build(vec![
            employee(1, "7", None, "a@x.com"),
            employee(2, "007", None, "b@x.com"),
        ]);
        assert_eq!(idx.by_code("7").map(|e| e.id), Some(1));
        assert_eq!(idx.len(), 2);
    }
}
