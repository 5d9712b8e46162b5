use crate::model::attendance::ResolutionMethod;
use crate::model::employee::Employee;
use crate::sync::index::{EmployeeIndex, normalize_key};
use std::collections::HashMap;
use std::fmt;

/// Outcome of matching one punch against the registry snapshot.
pub struct Resolution<'a> {
    pub employee: Option<&'a Employee>,
    pub method: ResolutionMethod,
}

/// Per-strategy hit counts across one resolution batch. Rendered into the
/// sync status message so operators can see which identifier encodings
/// their terminals actually use.
#[derive(Debug, Default, Clone)]
pub struct ResolutionStats {
    counts: HashMap<ResolutionMethod, u64>,
}

const METHOD_ORDER: [ResolutionMethod; 6] = [
    ResolutionMethod::DirectIdMap,
    ResolutionMethod::EmployeeNoIdMap,
    ResolutionMethod::ContactMap,
    ResolutionMethod::IdScan,
    ResolutionMethod::ContactScan,
    ResolutionMethod::None,
];

impl ResolutionStats {
    pub fn record(&mut self, method: ResolutionMethod) {
        *self.counts.entry(method).or_insert(0) += 1;
    }

    pub fn count(&self, method: ResolutionMethod) -> u64 {
        self.counts.get(&method).copied().unwrap_or(0)
    }

    pub fn matched(&self) -> u64 {
        METHOD_ORDER
            .iter()
            .filter(|m| **m != ResolutionMethod::None)
            .map(|m| self.count(*m))
            .sum()
    }

    pub fn unmatched(&self) -> u64 {
        self.count(ResolutionMethod::None)
    }
}

impl fmt::Display for ResolutionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for method in METHOD_ORDER {
            let n = self.count(method);
            if n == 0 {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{method}: {n}")?;
            first = false;
        }
        if first {
            write!(f, "no punches resolved")?;
        }
        Ok(())
    }
}

/// Matches device-supplied identifiers to employee records with a
/// prioritized strategy cascade; cheap exact-map lookups first, linear
/// scans as the thorough slow path. Ambiguity never fails a punch: the
/// first strategy that matches wins.
pub struct Resolver {
    stats: ResolutionStats,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            stats: ResolutionStats::default(),
        }
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    pub fn resolve<'a>(
        &mut self,
        device_user_id: &str,
        employee_no: Option<&str>,
        index: &'a EmployeeIndex,
    ) -> Resolution<'a> {
        let resolution = resolve_once(device_user_id, employee_no, index);
        self.stats.record(resolution.method);
        resolution
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_once<'a>(
    device_user_id: &str,
    employee_no: Option<&str>,
    index: &'a EmployeeIndex,
) -> Resolution<'a> {
    let id_key = normalize_key(device_user_id);
    let no_key = employee_no.map(normalize_key).filter(|k| !k.is_empty());

    // 1. Device id against the primary-identifier map.
    if let Some(emp) = index.by_code(&id_key) {
        return found(emp, ResolutionMethod::DirectIdMap);
    }

    // 2. Some devices put the primary identifier in the "number" field.
    if let Some(no_key) = &no_key {
        if let Some(emp) = index.by_code(no_key) {
            return found(emp, ResolutionMethod::EmployeeNoIdMap);
        }
        // 3. Contact number encoded into the device.
        if let Some(emp) = index.by_contact(no_key) {
            return found(emp, ResolutionMethod::ContactMap);
        }
    }

    // 4. Thorough slow path: primary identifier against either input.
    for emp in index.employees() {
        let code = normalize_key(&emp.employee_code);
        if code == id_key || Some(&code) == no_key.as_ref() {
            return found(emp, ResolutionMethod::IdScan);
        }
    }

    // 5. Contact number against either input.
    for emp in index.employees() {
        if let Some(phone) = &emp.phone {
            let contact = normalize_key(phone);
            if !contact.is_empty() && (contact == id_key || Some(&contact) == no_key.as_ref()) {
                return found(emp, ResolutionMethod::ContactScan);
            }
        }
    }

    Resolution {
        employee: None,
        method: ResolutionMethod::None,
    }
}

fn found<'a>(employee: &'a Employee, method: ResolutionMethod) -> Resolution<'a> {
    Resolution {
        employee: Some(employee),
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::Resolver;
    use crate::model::attendance::ResolutionMethod;
    use crate::sync::index::EmployeeIndex;
    use crate::sync::index::tests::employee;

    #[test]
    fn device_id_map_match_wins_over_contact_match() {
        // Employee 1 matches by primary id, employee 2's contact number
        // matches the secondary identifier. Priority says employee 1.
        let idx = EmployeeIndex::build(vec![
            employee(1, "7", None, "a@x.com"),
            employee(2, "EMP-002", Some("555123"), "b@x.com"),
        ]);
        let mut resolver = Resolver::new();
        let r = resolver.resolve("7", Some("555123"), &idx);
        assert_eq!(r.employee.map(|e| e.id), Some(1));
        assert_eq!(r.method, ResolutionMethod::DirectIdMap);
    }

    #[test]
    fn employee_no_carrying_the_primary_id_matches_second() {
        let idx = EmployeeIndex::build(vec![employee(3, "EMP-003", None, "c@x.com")]);
        let mut resolver = Resolver::new();
        let r = resolver.resolve("42", Some("EMP-003"), &idx);
        assert_eq!(r.employee.map(|e| e.id), Some(3));
        assert_eq!(r.method, ResolutionMethod::EmployeeNoIdMap);
    }

    #[test]
    fn contact_number_matches_third() {
        let idx = EmployeeIndex::build(vec![employee(4, "EMP-004", Some("555999"), "d@x.com")]);
        let mut resolver = Resolver::new();
        let r = resolver.resolve("42", Some("555999"), &idx);
        assert_eq!(r.employee.map(|e| e.id), Some(4));
        assert_eq!(r.method, ResolutionMethod::ContactMap);
    }

    #[test]
    fn contact_scan_catches_device_id_holding_a_phone_number() {
        // Contact number arriving in the device id field is invisible to
        // the maps (they key id→code, no→code, no→contact) and only the
        // scan path finds it.
        let idx = EmployeeIndex::build(vec![employee(5, "EMP-005", Some("555777"), "e@x.com")]);
        let mut resolver = Resolver::new();
        let r = resolver.resolve("555777", None, &idx);
        assert_eq!(r.employee.map(|e| e.id), Some(5));
        assert_eq!(r.method, ResolutionMethod::ContactScan);
    }

    #[test]
    fn numeric_identifiers_compare_in_canonical_form() {
        let idx = EmployeeIndex::build(vec![employee(6, "007", None, "f@x.com")]);
        let mut resolver = Resolver::new();
        let r = resolver.resolve("7", None, &idx);
        assert_eq!(r.employee.map(|e| e.id), Some(6));
        assert_eq!(r.method, ResolutionMethod::DirectIdMap);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let idx = EmployeeIndex::build(vec![employee(1, "7", None, "a@x.com")]);
        let mut resolver = Resolver::new();
        let r = resolver.resolve("999", None, &idx);
        assert!(r.employee.is_none());
        assert_eq!(r.method, ResolutionMethod::None);
    }

    #[test]
    fn stats_accumulate_per_method() {
        let idx = EmployeeIndex::build(vec![
            employee(1, "7", None, "a@x.com"),
            employee(2, "EMP-002", Some("555123"), "b@x.com"),
        ]);
        let mut resolver = Resolver::new();
        resolver.resolve("7", None, &idx);
        resolver.resolve("7", None, &idx);
        resolver.resolve("42", Some("555123"), &idx);
        resolver.resolve("999", None, &idx);

        let stats = resolver.stats();
        assert_eq!(stats.count(ResolutionMethod::DirectIdMap), 2);
        assert_eq!(stats.count(ResolutionMethod::ContactMap), 1);
        assert_eq!(stats.unmatched(), 1);
        assert_eq!(stats.matched(), 3);

        let rendered = stats.to_string();
        assert!(rendered.contains("direct-id-map: 2"));
        assert!(rendered.contains("none: 1"));
    }
}
